//! WebSocket transport. One connection is one session.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use gestura_application::{spawn_session_worker, GesturePipeline};
use gestura_bus::{FrameQueue, FrameQueueConfig, FrameSender};
use gestura_events::{event_names, Envelope, EventEmitter, EventTarget, SessionId};
use gestura_intake::FrameMessage;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::registry::SessionRegistry;

/// Client-to-server messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Frame(FrameMessage),
    Status,
}

impl InboundMessage {
    /// Parse a text frame. Anything unrecognized yields `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let envelope: Envelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring unparseable message");
                return None;
            }
        };

        match envelope.event.as_str() {
            event_names::FRAME => {
                // A frame without a usable body still counts as a frame; intake rejects it.
                let frame = serde_json::from_value(envelope.data).unwrap_or_default();
                Some(Self::Frame(frame))
            }
            event_names::STATUS => Some(Self::Status),
            other => {
                tracing::debug!(event = other, "Ignoring unknown event");
                None
            }
        }
    }
}

/// Everything a connection needs.
pub struct ServerContext {
    pub pipeline: Arc<GesturePipeline>,
    pub registry: Arc<SessionRegistry>,
    pub queue_config: FrameQueueConfig,
}

/// Accept connections until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    ctx: Arc<ServerContext>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "Listening for WebSocket connections");

    loop {
        let accepted = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                tracing::info!("Shutting down listener");
                break;
            }
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                let ctx = Arc::clone(&ctx);
                let token = shutdown.child_token();
                tokio::spawn(async move {
                    handle_connection(stream, peer, ctx, token).await;
                });
            }
            Err(e) => tracing::warn!(error = %e, "Failed to accept connection"),
        }
    }

    Ok(())
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: Arc<ServerContext>,
    shutdown: CancellationToken,
) {
    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::debug!(%peer, error = %e, "WebSocket handshake failed");
            return;
        }
    };

    let session = SessionId::new_v4();
    // A per-session strategy loads a model here, which must stay off the runtime threads.
    let opened = {
        let pipeline = Arc::clone(&ctx.pipeline);
        let session = session.clone();
        tokio::task::spawn_blocking(move || pipeline.open_session(&session)).await
    };
    match opened {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!(%session, %peer, error = %e, "Failed to open session");
            return;
        }
        Err(e) => {
            tracing::warn!(%session, %peer, error = %e, "Session setup task failed");
            return;
        }
    }
    tracing::info!(%session, %peer, "Client connected");

    let (mut sink, mut incoming) = ws.split();
    let mut outbound = ctx.registry.register(session.clone());

    let mut queue = FrameQueue::with_status(ctx.queue_config.clone(), ctx.pipeline.status());
    let frames = queue.sender();
    let Some(receiver) = queue.take_receiver() else {
        ctx.registry.unregister(&session);
        ctx.pipeline.close_session(&session);
        return;
    };
    let worker = spawn_session_worker(Arc::clone(&ctx.pipeline), session.clone(), receiver);

    let writer = tokio::spawn(async move {
        while let Some(text) = outbound.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    loop {
        let message = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            message = incoming.next() => message,
        };

        match message {
            Some(Ok(Message::Text(text))) => handle_text(&ctx, &session, &frames, &text),
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::debug!(%session, error = %e, "WebSocket read failed");
                break;
            }
        }
    }

    // Teardown: stop accepting frames, let the in-flight frame finish, then release state.
    frames.close();
    ctx.registry.unregister(&session);
    let processed = worker.stop().await;
    ctx.pipeline.close_session(&session);
    let _ = writer.await;

    tracing::info!(%session, processed, dropped = frames.dropped_frames(), "Client disconnected");
}

fn handle_text(ctx: &ServerContext, session: &SessionId, frames: &FrameSender, text: &str) {
    match InboundMessage::parse(text) {
        Some(InboundMessage::Frame(frame)) => {
            frames.send(frame);
        }
        Some(InboundMessage::Status) => {
            let status = ctx.pipeline.mic_status();
            match serde_json::to_value(status) {
                Ok(payload) => ctx.registry.emit(
                    &EventTarget::Session(session.clone()),
                    event_names::MIC_STATUS,
                    payload,
                ),
                Err(e) => tracing::warn!(%session, error = %e, "Failed to encode mic status"),
            }
        }
        None => {}
    }
}
