//! Per-session frame worker.
//!
//! Drains one session's frame queue in arrival order. Detection is CPU-bound
//! and runs on the blocking pool so the transport keeps accepting frames.

use std::sync::Arc;

use gestura_bus::FrameReceiver;
use gestura_events::SessionId;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::pipeline::GesturePipeline;

/// Log a metrics snapshot every this many frames.
const STATUS_LOG_INTERVAL: u64 = 100;

/// Controls a running session worker.
pub struct SessionWorker {
    cancel_token: CancellationToken,
    handle: JoinHandle<u64>,
}

impl SessionWorker {
    /// Cancel the worker and wait for the in-flight frame to finish.
    ///
    /// Returns the number of frames the worker processed.
    pub async fn stop(self) -> u64 {
        self.cancel_token.cancel();
        match self.handle.await {
            Ok(frames) => frames,
            Err(e) => {
                tracing::warn!(error = %e, "Session worker panicked");
                0
            }
        }
    }

    /// Wait for the worker to exit on its own (queue closed).
    pub async fn join(self) -> u64 {
        self.handle.await.unwrap_or_default()
    }
}

/// Spawn the worker task for one session.
pub fn spawn_session_worker(
    pipeline: Arc<GesturePipeline>,
    session: SessionId,
    mut receiver: FrameReceiver,
) -> SessionWorker {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.child_token();

    let handle = tokio::spawn(async move {
        tracing::debug!(%session, "Session worker started");
        let mut frames_processed = 0u64;

        loop {
            let packet = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tracing::debug!(%session, "Session worker cancelled");
                    break;
                }
                packet = receiver.recv() => packet,
            };

            let Some(packet) = packet else {
                tracing::debug!(%session, "Frame queue closed, stopping worker");
                break;
            };

            let pipeline_ref = Arc::clone(&pipeline);
            let session_ref = session.clone();
            let seq = packet.seq;
            let queued_ms = packet.queued_for().as_millis() as u64;
            let outcome = tokio::task::spawn_blocking(move || {
                pipeline_ref.process_frame(&session_ref, &packet.message)
            })
            .await;

            match outcome {
                Ok(outcome) => {
                    tracing::trace!(%session, seq, queued_ms, ?outcome, "Frame processed")
                }
                Err(e) => tracing::warn!(%session, seq, error = %e, "Frame task failed"),
            }

            frames_processed += 1;
            if frames_processed % STATUS_LOG_INTERVAL == 0 {
                tracing::debug!(
                    %session,
                    frames_processed,
                    gaps = receiver.gaps_detected(),
                    status = ?pipeline.status().snapshot(),
                    "Session worker progress"
                );
            }
        }

        tracing::debug!(%session, frames_processed, "Session worker stopped");
        frames_processed
    });

    SessionWorker {
        cancel_token,
        handle,
    }
}
