use std::{fs, path::Path};

use anyhow::{Context, Result};
use buzzer_orchestrator::{EngineHandle, RaceControl};
use serde::Deserialize;
use tracing::{info, warn};

/// Scripted sequence of transport and operator inputs.
#[derive(Debug, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    AllowNames {
        names: Vec<String>,
    },
    Admit {
        address: String,
        name: String,
    },
    Remove {
        address: String,
    },
    Monitor {
        address: String,
    },
    Start,
    Stop,
    Notify {
        address: String,
        #[serde(default)]
        payload: Vec<u8>,
        /// Seconds; defaults to the engine's monotonic clock.
        at: Option<f64>,
    },
}

impl Scenario {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("unable to read scenario {}", path_ref.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("failed to parse scenario {}", path_ref.display()))
    }

    /// Feeds every step to the engine. Admission refusals are logged and the
    /// scenario continues, as an operator would.
    pub async fn play(&self, handle: &EngineHandle) -> Result<()> {
        info!(
            "playing scenario {} ({} steps)",
            self.name.as_deref().unwrap_or("<unnamed>"),
            self.steps.len()
        );
        for step in &self.steps {
            match step.clone() {
                Step::AllowNames { names } => {
                    if let Err(err) = handle.configure_allowed_names(names).await {
                        warn!("allow-list rejected: {err}");
                    }
                }
                Step::Admit { address, name } => {
                    if let Err(err) = handle.admit(address.as_str(), &name).await {
                        warn!("admission of {address} failed: {err}");
                    }
                }
                Step::Remove { address } => {
                    handle.remove(address).await?;
                }
                Step::Monitor { address } => handle.start_monitoring(address),
                Step::Start => handle.start_race().await?,
                Step::Stop => handle.stop_race().await?,
                Step::Notify {
                    address,
                    payload,
                    at,
                } => match at {
                    Some(timestamp) => handle.notify(address, &payload, timestamp).await?,
                    None => handle.notify_now(address, &payload).await?,
                },
            }
        }
        Ok(())
    }
}
