use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_CONCURRENCY: usize = 4;

/// HTTP behaviour when talking to pack sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Maximum number of packs fetched at the same time. Kept low by default
    /// so vendor servers don't rate-limit us.
    pub concurrency: usize,
    pub timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    /// Abort a transfer that makes no progress for this long.
    pub low_speed_timeout_secs: Option<u64>,
    /// Disable every timeout above.
    pub no_timeouts: bool,
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout_secs: Some(300),
            connect_timeout_secs: Some(30),
            low_speed_timeout_secs: Some(60),
            no_timeouts: false,
            user_agent: concat!("cmpack/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl NetworkConfig {
    fn duration(&self, secs: Option<u64>) -> Option<Duration> {
        if self.no_timeouts {
            return None;
        }
        secs.map(Duration::from_secs)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.duration(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.duration(self.connect_timeout_secs)
    }

    pub fn low_speed_timeout(&self) -> Option<Duration> {
        self.duration(self.low_speed_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let network = NetworkConfig::default();
        assert_eq!(network.concurrency, 4);
        assert_eq!(network.timeout(), Some(Duration::from_secs(300)));
        assert_eq!(network.connect_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(network.low_speed_timeout(), Some(Duration::from_secs(60)));
        assert!(network.user_agent.starts_with("cmpack/"));
    }

    #[test]
    fn test_no_timeouts_overrides_everything() {
        let network = NetworkConfig {
            no_timeouts: true,
            ..NetworkConfig::default()
        };
        assert_eq!(network.timeout(), None);
        assert_eq!(network.connect_timeout(), None);
        assert_eq!(network.low_speed_timeout(), None);
    }
}
