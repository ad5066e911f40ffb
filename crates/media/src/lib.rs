//! Media persistence for generated clips and their extracted last frames.
//!
//! [`store::MediaStore`] owns the on-disk layout and hands out canonical
//! RELATIVE keys — absolute paths are derived at the edges and never stored.
//! [`ffmpeg`] houses the [`ffmpeg::FrameExtractor`] seam and its production
//! implementation shelling out to ffmpeg/ffprobe.

pub mod ffmpeg;
pub mod store;

pub use ffmpeg::{ExtractionError, FfmpegExtractor, FrameExtractor};
pub use store::{MediaError, MediaStore};
