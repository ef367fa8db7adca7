use std::{future::Future, io};

use tokio::runtime::Builder;
use tracing::debug;

/// Drives `future` on a fresh multi-threaded runtime and returns as soon as it
/// completes.
///
/// Blocking tasks still running at that point (a generation abandoned at its
/// deadline) are detached instead of joined, so the process can exit.
pub fn block_on_detached<F: Future>(future: F) -> io::Result<F::Output> {
    let runtime = Builder::new_multi_thread().enable_all().build()?;
    let output = runtime.block_on(future);
    debug!("releasing runtime");
    runtime.shutdown_background();
    Ok(output)
}
