//! Gesture event server.
//!
//! Wires the configured landmark model, the gesture pipeline and the
//! WebSocket transport together.

pub mod config;
pub mod registry;
pub mod transport;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use gestura_application::GesturePipeline;
use gestura_bus::FrameQueueConfig;
use gestura_gestures::GesturePolicies;
use gestura_hand_model::OnnxHandLandmarker;
use gestura_landmarks::{
    DetectorConfig, HandLandmarker, LandmarkError, LandmarkerFactory, LandmarkerProvider,
    NullLandmarker, StrategyKind,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use config::{ConfigError, ServerConfig};
pub use registry::SessionRegistry;
pub use transport::{InboundMessage, ServerContext};

/// Factory for the configured landmark model.
pub fn landmarker_factory(config: &ServerConfig) -> LandmarkerFactory {
    match &config.model_path {
        Some(path) => {
            let path = path.clone();
            Arc::new(move || {
                OnnxHandLandmarker::load(&path)
                    .map(|model| Box::new(model) as Box<dyn HandLandmarker>)
                    .map_err(LandmarkError::from)
            })
        }
        None => {
            tracing::warn!("No model_path configured, hands will never be detected");
            Arc::new(|| Ok(Box::new(NullLandmarker) as Box<dyn HandLandmarker>))
        }
    }
}

/// Detector settings adjusted for the sharing strategy.
///
/// Tracking reuses the previous frame's hand region, which is meaningless when
/// one instance sees frames from several sessions.
pub fn effective_detector_config(config: &ServerConfig) -> DetectorConfig {
    let mut detector = config.detector;
    if detector.tracking && config.strategy != StrategyKind::PerSession {
        tracing::warn!(
            strategy = ?config.strategy,
            "Tracking needs a per-session model, disabling it"
        );
        detector.tracking = false;
    }
    detector
}

/// Build the landmark provider. A configured model that fails to load is fatal.
pub fn build_provider(config: &ServerConfig) -> anyhow::Result<LandmarkerProvider> {
    let factory = landmarker_factory(config);

    // Per-session instances load lazily; load one up front so a bad path fails at startup.
    if config.strategy == StrategyKind::PerSession && config.model_path.is_some() {
        factory().context("failed to load hand landmark model")?;
    }

    LandmarkerProvider::new(config.strategy, config.pool_size, factory)
        .context("failed to load hand landmark model")
}

pub fn build_pipeline(
    config: &ServerConfig,
    registry: Arc<SessionRegistry>,
) -> anyhow::Result<GesturePipeline> {
    let provider = build_provider(config)?;
    tracing::info!(
        strategy = ?config.strategy,
        instances = provider.instance_count(),
        "Landmark model ready"
    );

    Ok(GesturePipeline::new(Arc::new(provider), registry)
        .with_detector_config(effective_detector_config(config))
        .with_policies(GesturePolicies::from_settings(&config.gestures)))
}

/// A bound server, ready to accept connections.
pub struct Server {
    listener: TcpListener,
    ctx: Arc<ServerContext>,
}

impl Server {
    /// Load the model and bind the configured address.
    pub async fn bind(config: &ServerConfig) -> anyhow::Result<Self> {
        let registry = Arc::new(SessionRegistry::new());
        let pipeline = build_pipeline(config, Arc::clone(&registry))?;
        let addr = config.bind_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;

        Ok(Self::from_parts(
            listener,
            pipeline,
            registry,
            FrameQueueConfig {
                capacity: config.queue_capacity,
            },
        ))
    }

    /// Assemble a server from an already-bound listener and pipeline.
    ///
    /// `registry` must be the emitter the pipeline was built with.
    pub fn from_parts(
        listener: TcpListener,
        pipeline: GesturePipeline,
        registry: Arc<SessionRegistry>,
        queue_config: FrameQueueConfig,
    ) -> Self {
        Self {
            listener,
            ctx: Arc::new(ServerContext {
                pipeline: Arc::new(pipeline),
                registry,
                queue_config,
            }),
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn context(&self) -> Arc<ServerContext> {
        Arc::clone(&self.ctx)
    }

    pub async fn serve(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        transport::serve(self.listener, self.ctx, shutdown).await?;
        Ok(())
    }
}

/// Run until Ctrl-C.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let server = Server::bind(&config).await?;
    let shutdown = CancellationToken::new();

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received Ctrl-C"),
            Err(e) => tracing::warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
        signal_token.cancel();
    });

    server.serve(shutdown).await
}
