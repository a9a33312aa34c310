use std::{future::Future, time::Duration};

use crate::error::Result;

/// Await on a future for a maximum amount of time before returning an error. A `None` timeout
/// waits indefinitely.
pub(crate) async fn timeout<F: Future>(timeout: Option<Duration>, future: F) -> Result<F::Output> {
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, future)
            .await
            .map_err(|_| std::io::ErrorKind::TimedOut.into()),
        None => Ok(future.await),
    }
}
