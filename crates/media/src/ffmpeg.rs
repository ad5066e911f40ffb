//! Last-frame extraction via ffmpeg/ffprobe.
//!
//! The extracted frame anchors visual continuity for a node's children, so
//! extraction must be deterministic: the container is probed once, the seek
//! timestamp is a fixed function of the probed duration, and the ffmpeg
//! invocation is fixed given that timestamp. There is no fallback anchor —
//! when extraction fails the node fails.

use std::path::Path;

use serde::Deserialize;

/// Error type for probing and frame extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("ffprobe/ffmpeg binary not found: {0}")]
    BinaryNotFound(std::io::Error),

    #[error("ffprobe/ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("video file not found: {0}")]
    VideoNotFound(String),

    #[error("video has zero or unparseable duration: {0}")]
    ZeroDuration(String),

    #[error("no frame could be decoded near the end of: {0}")]
    NoFrameProduced(String),
}

/// Seconds backed off from the end for the primary seek.
const END_OFFSET_SECS: f64 = 0.10;

/// `-sseof` offset of the single fallback attempt.
const FALLBACK_SSEOF_SECS: f64 = -0.25;

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// Top-level ffprobe JSON output (`-print_format json -show_format -show_streams`).
#[derive(Debug, Deserialize)]
pub struct FfprobeOutput {
    #[serde(default)]
    pub streams: Vec<FfprobeStream>,
    pub format: FfprobeFormat,
}

/// The stream fields last-frame extraction cares about.
#[derive(Debug, Deserialize)]
pub struct FfprobeStream {
    pub codec_type: Option<String>,
    pub duration: Option<String>,
}

/// Format-level metadata from ffprobe.
#[derive(Debug, Deserialize)]
pub struct FfprobeFormat {
    pub duration: Option<String>,
}

// ---------------------------------------------------------------------------
// Extractor seam
// ---------------------------------------------------------------------------

/// Produces the still image used as the next clip's visual anchor.
#[async_trait::async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Extract the final decodable frame of `video_path` into `frame_path`,
    /// scaled to `width x height`.
    async fn extract_last_frame(
        &self,
        video_path: &Path,
        frame_path: &Path,
        width: u32,
        height: u32,
    ) -> Result<(), ExtractionError>;
}

/// Production extractor shelling out to ffmpeg/ffprobe.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegExtractor;

#[async_trait::async_trait]
impl FrameExtractor for FfmpegExtractor {
    async fn extract_last_frame(
        &self,
        video_path: &Path,
        frame_path: &Path,
        width: u32,
        height: u32,
    ) -> Result<(), ExtractionError> {
        if !video_path.exists() {
            return Err(ExtractionError::VideoNotFound(
                video_path.to_string_lossy().to_string(),
            ));
        }

        let probe = probe_video(video_path).await?;
        let duration = parse_duration(&probe);
        if duration <= 0.0 {
            return Err(ExtractionError::ZeroDuration(
                video_path.to_string_lossy().to_string(),
            ));
        }

        let ts = seek_timestamp(duration);
        let primary = run_ffmpeg(
            &["-y", "-ss", &format!("{ts:.3}")],
            video_path,
            frame_path,
            width,
            height,
        )
        .await;

        match primary {
            Ok(()) if frame_exists(frame_path).await => return Ok(()),
            Ok(()) => {
                tracing::debug!(video = %video_path.display(), "primary seek produced no frame");
            }
            Err(e) => {
                tracing::debug!(video = %video_path.display(), error = %e, "primary seek failed");
            }
        }

        // Single fallback: seek relative to end of file.
        run_ffmpeg(
            &["-y", "-sseof", &format!("{FALLBACK_SSEOF_SECS:.2}")],
            video_path,
            frame_path,
            width,
            height,
        )
        .await?;

        if frame_exists(frame_path).await {
            Ok(())
        } else {
            Err(ExtractionError::NoFrameProduced(
                video_path.to_string_lossy().to_string(),
            ))
        }
    }
}

// ---------------------------------------------------------------------------
// ffmpeg / ffprobe invocation
// ---------------------------------------------------------------------------

/// Run `ffprobe` on a video file and return the parsed JSON output.
pub async fn probe_video(path: &Path) -> Result<FfprobeOutput, ExtractionError> {
    if !path.exists() {
        return Err(ExtractionError::VideoNotFound(
            path.to_string_lossy().to_string(),
        ));
    }

    let output = tokio::process::Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .await
        .map_err(ExtractionError::BinaryNotFound)?;

    if !output.status.success() {
        return Err(ExtractionError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str::<FfprobeOutput>(&stdout)
        .map_err(|e| ExtractionError::ParseError(format!("{e}: {stdout}")))
}

/// Decode one frame with the given seek arguments, scaled to `WxH`.
async fn run_ffmpeg(
    seek_args: &[&str],
    video_path: &Path,
    frame_path: &Path,
    width: u32,
    height: u32,
) -> Result<(), ExtractionError> {
    let output = tokio::process::Command::new("ffmpeg")
        .args(seek_args)
        .arg("-i")
        .arg(video_path)
        .args(["-vframes", "1", "-s", &format!("{width}x{height}"), "-q:v", "2"])
        .arg(frame_path)
        .output()
        .await
        .map_err(ExtractionError::BinaryNotFound)?;

    if !output.status.success() {
        return Err(ExtractionError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }
    Ok(())
}

async fn frame_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Primary seek position for a clip of the given duration.
pub fn seek_timestamp(duration_secs: f64) -> f64 {
    (duration_secs - END_OFFSET_SECS).max(0.0)
}

/// Parse the video duration in seconds from ffprobe output.
pub fn parse_duration(probe: &FfprobeOutput) -> f64 {
    // Format-level duration first.
    if let Some(d) = &probe.format.duration {
        if let Ok(secs) = d.parse::<f64>() {
            return secs;
        }
    }
    // Fall back to the first video stream's duration.
    if let Some(stream) = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
    {
        if let Some(d) = &stream.duration {
            if let Ok(secs) = d.parse::<f64>() {
                return secs;
            }
        }
    }
    0.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- seek_timestamp --

    #[test]
    fn seek_backs_off_from_the_end() {
        assert!((seek_timestamp(8.0) - 7.9).abs() < 1e-9);
    }

    #[test]
    fn seek_clamps_at_zero_for_tiny_clips() {
        assert_eq!(seek_timestamp(0.05), 0.0);
        assert_eq!(seek_timestamp(0.0), 0.0);
    }

    #[test]
    fn seek_is_deterministic() {
        assert_eq!(seek_timestamp(11.84), seek_timestamp(11.84));
    }

    // -- parse_duration --

    #[test]
    fn duration_from_format() {
        let probe = FfprobeOutput {
            streams: vec![],
            format: FfprobeFormat {
                duration: Some("8.02".to_string()),
            },
        };
        assert!((parse_duration(&probe) - 8.02).abs() < 1e-9);
    }

    #[test]
    fn duration_falls_back_to_video_stream() {
        let probe = FfprobeOutput {
            streams: vec![
                FfprobeStream {
                    codec_type: Some("audio".into()),
                    duration: Some("99.0".into()),
                },
                FfprobeStream {
                    codec_type: Some("video".into()),
                    duration: Some("7.96".into()),
                },
            ],
            format: FfprobeFormat { duration: None },
        };
        assert!((parse_duration(&probe) - 7.96).abs() < 1e-9);
    }

    #[test]
    fn unparseable_duration_is_zero() {
        let probe = FfprobeOutput {
            streams: vec![],
            format: FfprobeFormat {
                duration: Some("N/A".to_string()),
            },
        };
        assert_eq!(parse_duration(&probe), 0.0);
    }

    #[test]
    fn missing_duration_is_zero() {
        let probe = FfprobeOutput {
            streams: vec![],
            format: FfprobeFormat { duration: None },
        };
        assert_eq!(parse_duration(&probe), 0.0);
    }

    #[test]
    fn ffprobe_json_shape_parses() {
        let raw = r#"{
            "streams": [
                {"codec_type": "video", "duration": "8.008000", "width": 1280}
            ],
            "format": {"duration": "8.031000", "format_name": "mov,mp4"}
        }"#;
        let probe: FfprobeOutput = serde_json::from_str(raw).unwrap();
        assert!((parse_duration(&probe) - 8.031).abs() < 1e-6);
    }

    // -- extractor --

    #[tokio::test]
    async fn missing_video_is_rejected_before_any_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.mp4");
        let frame = dir.path().join("frame.jpg");
        let err = FfmpegExtractor
            .extract_last_frame(&missing, &frame, 1280, 720)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::VideoNotFound(_)));
    }
}
