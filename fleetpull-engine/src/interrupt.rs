//! Ctrl-c handling: the first press drains, the second quits.

use std::io;

use tokio::sync::{broadcast, mpsc};

use crate::stop::{StopReason, StopSignal};

/// Exit status after a forced quit, as shells report SIGINT.
pub const FORCED_EXIT_CODE: i32 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupts {
    /// The run shut down on its own, drained or not.
    Finished,
    /// A second ctrl-c arrived while in-flight pulls were still running.
    Forced,
}

/// Forward every ctrl-c to a channel. Once installed, the process no longer
/// dies on SIGINT, so the forwarder keeps listening for the whole run.
pub fn ctrl_c_events() -> mpsc::UnboundedReceiver<io::Result<()>> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        loop {
            let event = tokio::signal::ctrl_c().await;
            let failed = event.is_err();
            if tx.send(event).is_err() || failed {
                break;
            }
        }
    });
    rx
}

/// Raise [`StopReason::Interrupted`] on the first event and report
/// [`Interrupts::Forced`] on the second. Returns when the run shuts down.
pub async fn watch_interrupts(
    mut events: mpsc::UnboundedReceiver<io::Result<()>>,
    stop: StopSignal,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Interrupts {
    let mut presses = 0u32;
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => return Interrupts::Finished,
            event = events.recv() => match event {
                Some(Ok(())) => {
                    presses += 1;
                    if presses > 1 {
                        return Interrupts::Forced;
                    }
                    tracing::info!("received ctrl-c, finishing in-flight pulls (press again to quit)");
                    stop.trigger(StopReason::Interrupted);
                }
                Some(Err(err)) => {
                    tracing::warn!(error = %err, "ctrl-c handler unavailable");
                    let _ = shutdown_rx.recv().await;
                    return Interrupts::Finished;
                }
                None => {
                    let _ = shutdown_rx.recv().await;
                    return Interrupts::Finished;
                }
            }
        }
    }
}
