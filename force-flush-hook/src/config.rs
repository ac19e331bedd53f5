//! Hook configuration types
//!
//! The only knob is what to report for lifecycle events other than process
//! attach. The exported entry points use [`HookConfig::compiled`]; the library
//! API accepts any configuration.

use crate::types::HookError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Result reported for detach and thread events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetachPolicy {
    /// Report failure for every non-attach event
    #[default]
    Reject,
    /// Report success for every non-attach event
    Accept,
}

impl FromStr for DetachPolicy {
    type Err = HookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" | "literal" => Ok(DetachPolicy::Reject),
            "accept" | "conventional" => Ok(DetachPolicy::Accept),
            other => Err(HookError::UnknownPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for DetachPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetachPolicy::Reject => write!(f, "reject"),
            DetachPolicy::Accept => write!(f, "accept"),
        }
    }
}

/// Configuration for the load hook
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookConfig {
    /// What non-attach events report
    #[serde(default)]
    pub detach_policy: DetachPolicy,
}

impl HookConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration baked into the exported entry points
    pub const fn compiled() -> Self {
        if cfg!(feature = "conventional-detach") {
            Self {
                detach_policy: DetachPolicy::Accept,
            }
        } else {
            Self {
                detach_policy: DetachPolicy::Reject,
            }
        }
    }

    /// Builder method: set the detach policy
    pub fn with_detach_policy(mut self, policy: DetachPolicy) -> Self {
        self.detach_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parsing() {
        assert_eq!("reject".parse::<DetachPolicy>().unwrap(), DetachPolicy::Reject);
        assert_eq!("Literal".parse::<DetachPolicy>().unwrap(), DetachPolicy::Reject);
        assert_eq!(" accept ".parse::<DetachPolicy>().unwrap(), DetachPolicy::Accept);
        assert_eq!("conventional".parse::<DetachPolicy>().unwrap(), DetachPolicy::Accept);

        let err = "sometimes".parse::<DetachPolicy>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown detach policy: sometimes");
    }

    #[test]
    fn test_defaults() {
        assert_eq!(HookConfig::new().detach_policy, DetachPolicy::Reject);

        let config = HookConfig::new().with_detach_policy(DetachPolicy::Accept);
        assert_eq!(config.detach_policy, DetachPolicy::Accept);
    }

    #[cfg(not(feature = "conventional-detach"))]
    #[test]
    fn test_compiled_is_literal() {
        assert_eq!(HookConfig::compiled().detach_policy, DetachPolicy::Reject);
    }

    #[test]
    fn test_serde_names() {
        let config: HookConfig = serde_json::from_str(r#"{"detach_policy":"accept"}"#).unwrap();
        assert_eq!(config.detach_policy, DetachPolicy::Accept);

        let config: HookConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.detach_policy, DetachPolicy::Reject);
    }
}
