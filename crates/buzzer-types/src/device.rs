use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque, stable identity of a physical button device.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Trailing characters of the address, handy for compact displays.
    pub fn short(&self) -> &str {
        let start = self
            .0
            .char_indices()
            .rev()
            .nth(4)
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        &self.0[start..]
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceAddress {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for DeviceAddress {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// An admitted participant as seen by readers of the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub address: DeviceAddress,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_address_keeps_last_five_chars() {
        let address = DeviceAddress::new("AA:BB:CC:DD:EE:FF");
        assert_eq!(address.short(), "EE:FF");
        assert_eq!(DeviceAddress::new("abc").short(), "abc");
    }

    #[test]
    fn serializes_as_plain_string() {
        let address = DeviceAddress::new("dev-1");
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, "\"dev-1\"");
    }
}
