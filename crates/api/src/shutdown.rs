//! Graceful shutdown with a bounded drain.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Drive `server` to completion, bounding the drain after shutdown fires.
///
/// Until `shutdown` is cancelled the server runs freely. Once it fires,
/// in-flight connections get at most `drain` to finish before the server
/// future is dropped. Returns `Ok(true)` for a clean finish, `Ok(false)`
/// when the deadline cut the drain short.
pub async fn drain_within<F, E>(
    server: F,
    shutdown: CancellationToken,
    drain: Duration,
) -> Result<bool, E>
where
    F: Future<Output = Result<(), E>>,
{
    let mut server = std::pin::pin!(server);

    tokio::select! {
        result = &mut server => result.map(|()| true),
        () = shutdown.cancelled() => {
            match tokio::time::timeout(drain, &mut server).await {
                Ok(result) => result.map(|()| true),
                Err(_) => Ok(false),
            }
        }
    }
}
