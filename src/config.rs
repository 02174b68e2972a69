// Elector configuration and timing invariants

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default bounds for the randomized startup delay (30-45 seconds)
pub const DEFAULT_MIN_INITIAL_DELAY: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_INITIAL_DELAY: Duration = Duration::from_secs(45);

/// Default interval between election cycles (1 minute)
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Default lease TTL (2 minutes)
pub const DEFAULT_LEASE_TIMEOUT: Duration = Duration::from_secs(120);

/// Default key under which the lease record lives
pub const DEFAULT_LOCK_KEY: &str = "leader_lock";

/// Default store namespace/table for the lease record
pub const DEFAULT_NAMESPACE: &str = "default";

/// Tunable timing parameters for an [`Elector`](crate::Elector).
///
/// Override individual fields with struct-update syntax:
///
/// ```
/// use leaselock::ElectorConfig;
/// use std::time::Duration;
///
/// let config = ElectorConfig {
///     check_interval: Duration::from_secs(15),
///     lease_timeout: Duration::from_secs(45),
///     ..ElectorConfig::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectorConfig {
    /// Lower bound of the randomized startup delay
    pub min_initial_delay: Duration,

    /// Upper bound of the randomized startup delay
    pub max_initial_delay: Duration,

    /// How often an election cycle runs once the startup delay has elapsed
    pub check_interval: Duration,

    /// TTL written with the lease record; the lease expires if not renewed
    /// within this window
    pub lease_timeout: Duration,

    /// Store key the lease record is written under
    pub lock_key: String,

    /// Store namespace (table, keyspace, prefix) holding the lease record
    pub namespace: String,
}

impl Default for ElectorConfig {
    fn default() -> Self {
        Self {
            min_initial_delay: DEFAULT_MIN_INITIAL_DELAY,
            max_initial_delay: DEFAULT_MAX_INITIAL_DELAY,
            check_interval: DEFAULT_CHECK_INTERVAL,
            lease_timeout: DEFAULT_LEASE_TIMEOUT,
            lock_key: DEFAULT_LOCK_KEY.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl ElectorConfig {
    /// Check the timing invariants.
    ///
    /// `check_interval` must stay below `lease_timeout`, otherwise the lease
    /// can expire before the next renewal attempt and leadership flickers on
    /// every cycle.
    pub fn validate(&self) -> Result<()> {
        if self.check_interval.is_zero() {
            return Err(Error::InvalidConfig {
                reason: "check_interval must be non-zero".to_string(),
            });
        }
        if self.check_interval >= self.lease_timeout {
            return Err(Error::InvalidConfig {
                reason: format!(
                    "check_interval ({:?}) must be shorter than lease_timeout ({:?})",
                    self.check_interval, self.lease_timeout
                ),
            });
        }
        if self.min_initial_delay > self.max_initial_delay {
            return Err(Error::InvalidConfig {
                reason: format!(
                    "min_initial_delay ({:?}) exceeds max_initial_delay ({:?})",
                    self.min_initial_delay, self.max_initial_delay
                ),
            });
        }
        if self.lock_key.is_empty() {
            return Err(Error::InvalidConfig {
                reason: "lock_key must not be empty".to_string(),
            });
        }
        if self.namespace.is_empty() {
            return Err(Error::InvalidConfig {
                reason: "namespace must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ElectorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_initial_delay, Duration::from_secs(30));
        assert_eq!(config.max_initial_delay, Duration::from_secs(45));
        assert_eq!(config.check_interval, Duration::from_secs(60));
        assert_eq!(config.lease_timeout, Duration::from_secs(120));
        assert_eq!(config.lock_key, "leader_lock");
        assert_eq!(config.namespace, "default");
    }

    #[test]
    fn test_check_interval_must_undercut_lease_timeout() {
        let config = ElectorConfig {
            check_interval: Duration::from_secs(120),
            lease_timeout: Duration::from_secs(120),
            ..ElectorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_delay_bounds_must_be_ordered() {
        let config = ElectorConfig {
            min_initial_delay: Duration::from_secs(60),
            max_initial_delay: Duration::from_secs(45),
            ..ElectorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_equal_delay_bounds_are_allowed() {
        let config = ElectorConfig {
            min_initial_delay: Duration::from_secs(30),
            max_initial_delay: Duration::from_secs(30),
            ..ElectorConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_check_interval_rejected() {
        let config = ElectorConfig {
            check_interval: Duration::ZERO,
            ..ElectorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_key_rejected() {
        let config = ElectorConfig {
            lock_key: String::new(),
            ..ElectorConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
