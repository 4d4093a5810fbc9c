//! Inventory of the remote machine.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OperatingSystem {
    pub name: String,
    pub version: String,
    pub arch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Processor {
    pub vendor: String,
    pub model: String,
    pub packages: u32,
    pub cores: u32,
    pub threads: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MemoryModule {
    pub location: String,
    pub manufacturer: String,
    /// Bytes.
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Monitor {
    pub name: String,
    pub width_mm: u32,
    pub height_mm: u32,
}

/// System report sent by the host on request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SystemInfo {
    pub computer_name: String,
    pub domain: String,
    pub operating_system: OperatingSystem,
    pub processor: Processor,
    pub memory: Vec<MemoryModule>,
    pub monitors: Vec<Monitor>,
}

impl SystemInfo {
    /// Sum of all installed memory modules in bytes.
    pub fn total_memory(&self) -> u64 {
        self.memory.iter().map(|m| m.size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_memory_sums_modules() {
        let info = SystemInfo {
            memory: vec![
                MemoryModule {
                    size: 8 << 30,
                    ..Default::default()
                },
                MemoryModule {
                    size: 4 << 30,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(info.total_memory(), 12 << 30);
    }

    #[test]
    fn serializes_as_json_report() {
        let info = SystemInfo {
            computer_name: "build-07".into(),
            ..Default::default()
        };
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"computer_name\":\"build-07\""));
        let back: SystemInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
    }
}
