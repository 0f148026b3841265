//! Relay server configuration.

use std::time::Duration;

use crate::SummsyncError;

/// Environment variable holding the listen address.
pub const ENV_BIND: &str = "SUMMSYNC_BIND";
/// Environment variable holding the idle timeout in whole seconds.
pub const ENV_IDLE_TIMEOUT: &str = "SUMMSYNC_IDLE_TIMEOUT_SECS";

/// Settings for a [`RelayServer`](crate::RelayServer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Address to listen on, e.g. `0.0.0.0:8080`.
    pub bind_addr: String,
    /// A connection that sends nothing for this long is dropped. Joined
    /// participants broadcast every tick, so silence means they're gone.
    pub idle_timeout: Duration,
    /// Frames queued per connection before fan-out starts dropping them.
    pub outbound_buffer: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            idle_timeout: Duration::from_secs(15),
            outbound_buffer: 64,
        }
    }
}

impl RelayConfig {
    /// Defaults overridden by `SUMMSYNC_BIND` and
    /// `SUMMSYNC_IDLE_TIMEOUT_SECS` where set.
    pub fn from_env() -> Result<Self, SummsyncError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SummsyncError> {
        let mut config = Self::default();
        if let Some(addr) = lookup(ENV_BIND) {
            config.bind_addr = addr;
        }
        if let Some(raw) = lookup(ENV_IDLE_TIMEOUT) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                SummsyncError::Config(format!("{ENV_IDLE_TIMEOUT} must be whole seconds, got {raw:?}"))
            })?;
            if secs == 0 {
                return Err(SummsyncError::Config(format!("{ENV_IDLE_TIMEOUT} must be positive")));
            }
            config.idle_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        let config = RelayConfig::from_lookup(env(&[])).unwrap();
        assert_eq!(config, RelayConfig::default());
        assert_eq!(config.idle_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_environment_overrides() {
        let config = RelayConfig::from_lookup(env(&[
            (ENV_BIND, "0.0.0.0:9000"),
            (ENV_IDLE_TIMEOUT, " 30 "),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.idle_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_bad_idle_timeout_is_rejected() {
        for raw in ["soon", "-1", "0"] {
            let err = RelayConfig::from_lookup(env(&[(ENV_IDLE_TIMEOUT, raw)])).unwrap_err();
            assert!(matches!(err, SummsyncError::Config(_)), "{raw}");
        }
    }
}
