//! World construction settings

use serde::{Deserialize, Serialize};

use crate::error::{EcsError, Result};

/// Tunables for a [`World`](crate::World).
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use signet_ecs::WorldConfig;
///
/// let config = WorldConfig::from_json_str(r#"{ "max_archetypes": 64 }"#).unwrap();
/// assert_eq!(config.max_archetypes, 64);
/// assert_eq!(config.signature_bits, WorldConfig::default().signature_bits);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Initial capacity of each archetype's member set
    pub archetype_capacity: usize,
    /// Initial bit capacity of query signatures
    pub signature_bits: usize,
    /// Upper bound on distinct archetypes, the root included
    pub max_archetypes: usize,
    /// Initial capacity of the archetype list
    pub archetype_reserve: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            archetype_capacity: 64,
            signature_bits: 64,
            max_archetypes: 10_000,
            archetype_reserve: 64,
        }
    }
}

impl WorldConfig {
    /// Parse from JSON, filling omitted fields with defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The root archetype alone needs one slot.
    pub fn validate(&self) -> Result<()> {
        if self.max_archetypes == 0 {
            return Err(EcsError::ConfigError(
                "max_archetypes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
