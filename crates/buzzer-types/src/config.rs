use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{BuzzerError, Result};

pub const DEFAULT_MAX_PARTICIPANTS: usize = 4;
pub const DEFAULT_RATE_BUFFER_SIZE: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub max_participants: usize,
    /// Empty means any device name is accepted.
    pub allowed_names: Vec<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_participants: DEFAULT_MAX_PARTICIPANTS,
            allowed_names: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub buffer_size: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_RATE_BUFFER_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub channel_capacity: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub command_queue: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command_queue: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpsConfig {
    pub log_level: String,
    pub journal_capacity: usize,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            journal_capacity: 512,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuzzerConfig {
    pub registry: RegistryConfig,
    pub metrics: MetricsConfig,
    pub network: NetworkConfig,
    pub engine: EngineConfig,
    pub ops: OpsConfig,
}

impl BuzzerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            BuzzerError::Configuration(format!(
                "unable to read config file {}: {err}",
                path_ref.display()
            ))
        })?;
        toml::from_str(&contents).map_err(|err| {
            BuzzerError::Configuration(format!(
                "failed to parse config file {}: {err}",
                path_ref.display()
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.registry.max_participants == 0 {
            return Err(BuzzerError::Configuration(
                "registry.max_participants must be greater than zero".into(),
            ));
        }
        if self.registry.allowed_names.len() > self.registry.max_participants {
            return Err(BuzzerError::Configuration(format!(
                "registry.allowed_names lists {} names but max_participants is {}",
                self.registry.allowed_names.len(),
                self.registry.max_participants
            )));
        }
        if self.metrics.buffer_size < 2 {
            return Err(BuzzerError::Configuration(
                "metrics.buffer_size must be at least 2".into(),
            ));
        }
        if self.network.channel_capacity == 0 {
            return Err(BuzzerError::Configuration(
                "network.channel_capacity must be greater than zero".into(),
            ));
        }
        if self.engine.command_queue == 0 {
            return Err(BuzzerError::Configuration(
                "engine.command_queue must be greater than zero".into(),
            ));
        }
        if self.ops.journal_capacity == 0 {
            return Err(BuzzerError::Configuration(
                "ops.journal_capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn load_buzzer_config_from_file() {
        let temp_path = std::env::temp_dir().join("buzzer-config-test.toml");
        let config = BuzzerConfig {
            registry: RegistryConfig {
                max_participants: 3,
                allowed_names: vec!["BUZZ-A".into(), "BUZZ-B".into()],
            },
            metrics: MetricsConfig { buffer_size: 5 },
            network: NetworkConfig {
                channel_capacity: 32,
            },
            engine: EngineConfig { command_queue: 64 },
            ops: OpsConfig {
                log_level: "debug".into(),
                journal_capacity: 16,
            },
        };

        let doc = toml::to_string(&config).expect("serialize config");
        fs::write(&temp_path, doc).expect("write temp config");

        let loaded = BuzzerConfig::from_file(&temp_path).expect("load config");
        assert_eq!(loaded.registry.max_participants, 3);
        assert_eq!(loaded.registry.allowed_names, config.registry.allowed_names);
        assert_eq!(loaded.metrics.buffer_size, 5);
        assert_eq!(loaded.ops.log_level, "debug");
        fs::remove_file(&temp_path).expect("cleanup temp config");
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let loaded: BuzzerConfig = toml::from_str("[metrics]\nbuffer_size = 6\n").unwrap();
        assert_eq!(loaded.metrics.buffer_size, 6);
        assert_eq!(loaded.registry.max_participants, DEFAULT_MAX_PARTICIPANTS);
        assert!(loaded.registry.allowed_names.is_empty());
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn unreadable_file_is_a_configuration_error() {
        let err = BuzzerConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, BuzzerError::Configuration(_)));
    }

    #[test]
    fn validate_configuration_rules() {
        let mut config = BuzzerConfig::default();
        assert!(config.validate().is_ok());

        config.registry.max_participants = 0;
        assert!(config.validate().is_err());
        config.registry.max_participants = 1;
        config.registry.allowed_names = vec!["a".into(), "b".into()];
        assert!(config.validate().is_err());
        config.registry.max_participants = 4;
        config.metrics.buffer_size = 1;
        assert!(config.validate().is_err());
        config.metrics.buffer_size = 2;
        config.network.channel_capacity = 0;
        assert!(config.validate().is_err());
        config.network.channel_capacity = 8;
        config.engine.command_queue = 0;
        assert!(config.validate().is_err());
        config.engine.command_queue = 8;
        config.ops.journal_capacity = 0;
        assert!(config.validate().is_err());
        config.ops.journal_capacity = 8;
        assert!(config.validate().is_ok());
    }
}
