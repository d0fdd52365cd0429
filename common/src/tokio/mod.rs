pub use tokio::{select, sync, task, time};

use std::future::Future;

use log::trace;
use tokio::task::JoinHandle;

// Spawn a named background task
// The name is only used for tracing when the task starts and ends
pub fn spawn_task<F, S>(name: S, future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
    S: Into<String>,
{
    let name = name.into();
    if log::log_enabled!(log::Level::Trace) {
        trace!("Spawning task: {}", name);
    }

    tokio::spawn(async move {
        let output = future.await;
        if log::log_enabled!(log::Level::Trace) {
            trace!("Task {} has finished", name);
        }
        output
    })
}
