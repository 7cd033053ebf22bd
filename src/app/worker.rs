use std::sync::mpsc;
use std::time::Duration;

use gtk4::glib;

const WORKER_RESULT_POLL_INTERVAL: Duration = Duration::from_millis(24);

/// Runs `work` on its own thread and hands the result back on the main loop.
/// Grabs and notification waits block, so they never run on the GTK thread.
pub(super) fn spawn_worker<T, W, H>(work: W, on_result: H)
where
    T: Send + 'static,
    W: FnOnce() -> T + Send + 'static,
    H: FnOnce(T) + 'static,
{
    let (tx, rx) = mpsc::channel::<T>();
    std::thread::spawn(move || {
        let _ = tx.send(work());
    });

    let mut on_result = Some(on_result);
    glib::timeout_add_local(WORKER_RESULT_POLL_INTERVAL, move || match rx.try_recv() {
        Ok(result) => {
            if let Some(handler) = on_result.take() {
                handler(result);
            }
            glib::ControlFlow::Break
        }
        Err(mpsc::TryRecvError::Empty) => glib::ControlFlow::Continue,
        Err(mpsc::TryRecvError::Disconnected) => {
            tracing::warn!("worker exited without a result");
            glib::ControlFlow::Break
        }
    });
}

/// Same as [`spawn_worker`] but starts the thread only after `delay` has passed on
/// the main loop, so hidden windows are gone before the grab starts.
pub(super) fn spawn_worker_after<T, W, H>(delay: Duration, work: W, on_result: H)
where
    T: Send + 'static,
    W: FnOnce() -> T + Send + 'static,
    H: FnOnce(T) + 'static,
{
    if delay.is_zero() {
        spawn_worker(work, on_result);
        return;
    }
    glib::timeout_add_local_once(delay, move || spawn_worker(work, on_result));
}
