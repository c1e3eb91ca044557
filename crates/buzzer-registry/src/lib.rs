//! Admission bookkeeping for participating button devices.

use std::{collections::BTreeMap, sync::Arc};

use buzzer_types::{
    config::RegistryConfig,
    device::{DeviceAddress, Participant},
    AdmissionError,
};
use tracing::{debug, info, warn};

/// Successful admission outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admitted(Participant),
    /// The address was already present; carries the name it was admitted with.
    AlreadyAdmitted(Participant),
}

impl Admission {
    pub fn participant(&self) -> &Participant {
        match self {
            Admission::Admitted(p) | Admission::AlreadyAdmitted(p) => p,
        }
    }
}

pub type AdmissionResult = Result<Admission, AdmissionError>;

/// Read-only participation predicate consulted before accepting device input.
pub trait AdmissionGate {
    fn is_admitted(&self, address: &DeviceAddress) -> bool;
    fn name_of(&self, address: &DeviceAddress) -> Option<&str>;
}

/// Bounded, name-filtered set of admitted devices.
///
/// Mutated by a single owner. Concurrent readers use [`RegistrySnapshot`].
#[derive(Debug, Clone)]
pub struct ConnectionRegistry {
    capacity: usize,
    allowed_names: Vec<String>,
    entries: BTreeMap<DeviceAddress, String>,
}

impl ConnectionRegistry {
    pub fn new(config: &RegistryConfig) -> Result<Self, AdmissionError> {
        let mut registry = Self::with_capacity(config.max_participants);
        registry.configure_allowed_names(config.allowed_names.clone())?;
        Ok(registry)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            allowed_names: Vec::new(),
            entries: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn allowed_names(&self) -> &[String] {
        &self.allowed_names
    }

    pub fn admit(&mut self, address: DeviceAddress, name: &str) -> AdmissionResult {
        if let Some(existing) = self.entries.get(&address) {
            debug!("{} already admitted as {}", address, existing);
            return Ok(Admission::AlreadyAdmitted(Participant {
                address,
                name: existing.clone(),
            }));
        }
        if self.entries.len() >= self.capacity {
            warn!("refusing {}: registry full ({})", address, self.capacity);
            return Err(AdmissionError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        if !self.name_allowed(name) {
            warn!("refusing {}: name {:?} not allow-listed", address, name);
            return Err(AdmissionError::NotTarget { name: name.into() });
        }

        info!("admitted {} ({})", address, name);
        self.entries.insert(address.clone(), name.to_string());
        Ok(Admission::Admitted(Participant {
            address,
            name: name.to_string(),
        }))
    }

    /// Returns the removed participant, if any.
    pub fn remove(&mut self, address: &DeviceAddress) -> Option<Participant> {
        let name = self.entries.remove(address)?;
        info!("removed {} ({})", address, name);
        Some(Participant {
            address: address.clone(),
            name,
        })
    }

    /// Replaces the allow-list. An empty list accepts any name.
    pub fn configure_allowed_names(&mut self, names: Vec<String>) -> Result<(), AdmissionError> {
        if names.len() > self.capacity {
            return Err(AdmissionError::TooManyNames {
                given: names.len(),
                capacity: self.capacity,
            });
        }
        self.allowed_names = names
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        debug!("allow-list now {:?}", self.allowed_names);
        Ok(())
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.entries
            .iter()
            .map(|(address, name)| Participant {
                address: address.clone(),
                name: name.clone(),
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            entries: Arc::new(self.entries.clone()),
        }
    }

    fn name_allowed(&self, name: &str) -> bool {
        self.allowed_names.is_empty() || self.allowed_names.iter().any(|allowed| allowed == name)
    }
}

/// Immutable, cheaply cloneable view of the admitted set.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    entries: Arc<BTreeMap<DeviceAddress, String>>,
}

impl RegistrySnapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AdmissionGate for ConnectionRegistry {
    fn is_admitted(&self, address: &DeviceAddress) -> bool {
        self.entries.contains_key(address)
    }

    fn name_of(&self, address: &DeviceAddress) -> Option<&str> {
        self.entries.get(address).map(String::as_str)
    }
}

impl AdmissionGate for RegistrySnapshot {
    fn is_admitted(&self, address: &DeviceAddress) -> bool {
        self.entries.contains_key(address)
    }

    fn name_of(&self, address: &DeviceAddress) -> Option<&str> {
        self.entries.get(address).map(String::as_str)
    }
}
