//! Server configuration: TOML file plus environment overrides.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use gestura_gestures::GestureSettings;
use gestura_landmarks::{DetectorConfig, StrategyKind};
use serde::{Deserialize, Serialize};

/// Environment variable naming the config file when no CLI argument is given.
pub const CONFIG_ENV: &str = "GESTURA_CONFIG";
/// Overrides `bind`.
pub const BIND_ENV: &str = "GESTURA_BIND";
/// Overrides `model_path`.
pub const MODEL_ENV: &str = "GESTURA_MODEL";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid bind address {0:?}")]
    InvalidBind(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Hand landmark ONNX model. Without it no hand is ever found.
    pub model_path: Option<PathBuf>,
    pub detector: DetectorConfig,
    pub strategy: StrategyKind,
    /// Instances kept by the `pool` strategy.
    pub pool_size: usize,
    /// Frames buffered per session before the oldest is dropped.
    pub queue_capacity: usize,
    pub gestures: GestureSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
            model_path: None,
            detector: DetectorConfig::default(),
            strategy: StrategyKind::default(),
            pool_size: 2,
            queue_capacity: gestura_bus::DEFAULT_QUEUE_CAPACITY,
            gestures: GestureSettings::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Resolve the full configuration.
    ///
    /// The file comes from `cli_path` or `GESTURA_CONFIG`; with neither, defaults
    /// are used. Environment overrides are applied last.
    pub fn resolve<F>(cli_path: Option<PathBuf>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = cli_path.or_else(|| env(CONFIG_ENV).map(PathBuf::from));
        let mut config = match &path {
            Some(path) => {
                tracing::info!(path = %path.display(), "Loading config");
                Self::load(path)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides(env);
        config.validate()?;
        Ok(config)
    }

    pub fn from_env(cli_path: Option<PathBuf>) -> Result<Self> {
        Self::resolve(cli_path, |key| std::env::var(key).ok())
    }

    pub fn apply_env_overrides<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = env(BIND_ENV).filter(|v| !v.trim().is_empty()) {
            self.bind = bind.trim().to_string();
        }
        if let Some(model) = env(MODEL_ENV).filter(|v| !v.trim().is_empty()) {
            self.model_path = Some(PathBuf::from(model.trim()));
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind
            .parse()
            .map_err(|_| ConfigError::InvalidBind(self.bind.clone()))
    }

    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gestura_gestures::Classifier;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind, "0.0.0.0:5000");
        assert_eq!(config.strategy, StrategyKind::Shared);
        assert_eq!(config.pool_size, 2);
        assert_eq!(config.queue_capacity, 4);
        assert!(config.model_path.is_none());
        assert!(config.gestures.is_empty());
    }

    #[test]
    fn test_parse_full_file() {
        let config = ServerConfig::from_toml_str(
            r#"
            bind = "127.0.0.1:6000"
            model_path = "/models/hand_landmark.onnx"
            strategy = "pool"
            pool_size = 3
            queue_capacity = 2

            [detector]
            tracking = true
            min_detection_confidence = 0.7

            [gestures.thumbs]
            cooldown_secs = 1.0

            [gestures.pinky_up]
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.bind, "127.0.0.1:6000");
        assert_eq!(config.strategy, StrategyKind::Pool);
        assert_eq!(config.pool_size, 3);
        assert_eq!(config.queue_capacity, 2);
        assert!(config.detector.tracking);
        assert_eq!(config.detector.max_hands, 1);
        assert_eq!(
            config.gestures[&Classifier::Thumbs].cooldown_secs,
            Some(1.0)
        );
        assert_eq!(config.gestures[&Classifier::PinkyUp].enabled, Some(false));
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let result = ServerConfig::from_toml_str(r#"strategy = "round_robin""#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"strategy = "per_session""#).unwrap();

        let config = ServerConfig::resolve(Some(file.path().to_path_buf()), env_from(&[])).unwrap();
        assert_eq!(config.strategy, StrategyKind::PerSession);
    }

    #[test]
    fn test_config_path_from_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gestura.toml");
        std::fs::write(&path, "queue_capacity = 9\n").unwrap();

        let path_str = path.to_string_lossy().to_string();
        let config = ServerConfig::resolve(None, env_from(&[(CONFIG_ENV, &path_str)])).unwrap();
        assert_eq!(config.queue_capacity, 9);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = ServerConfig::resolve(
            Some(PathBuf::from("/nonexistent/gestura.toml")),
            env_from(&[]),
        );
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"bind = "127.0.0.1:7000""#).unwrap();

        let config = ServerConfig::resolve(
            Some(file.path().to_path_buf()),
            env_from(&[(BIND_ENV, "127.0.0.1:7100"), (MODEL_ENV, "/tmp/hand.onnx")]),
        )
        .unwrap();
        assert_eq!(config.bind, "127.0.0.1:7100");
        assert_eq!(config.model_path, Some(PathBuf::from("/tmp/hand.onnx")));
    }

    #[test]
    fn test_invalid_bind_rejected() {
        let result = ServerConfig::resolve(None, env_from(&[(BIND_ENV, "not-an-address")]));
        assert!(matches!(result, Err(ConfigError::InvalidBind(_))));
    }
}
