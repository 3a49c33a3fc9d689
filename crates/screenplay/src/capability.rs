//! Typed capability registry
//!
//! Abilities are a closed set, so the registry is keyed by the `Capability`
//! tag rather than by runtime type. One instance per tag; registering a tag
//! again replaces the previous instance.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ability::Ability;
use crate::error::{ScreenplayError, ScreenplayResult};

/// Tag identifying an ability variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Web,
    Api,
}

impl Capability {
    /// Human-readable ability name used in diagnostics
    pub fn ability_name(&self) -> &'static str {
        match self {
            Capability::Web => "WebAbility",
            Capability::Api => "ApiAbility",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.ability_name())
    }
}

/// Abilities granted to one actor for one scenario
#[derive(Default)]
pub struct CapabilityRegistry {
    abilities: BTreeMap<Capability, Ability>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an ability under its own capability tag.
    /// Returns the instance it replaced, if any.
    pub fn register(&mut self, ability: impl Into<Ability>) -> Option<Ability> {
        let ability = ability.into();
        let capability = ability.capability();
        debug!("Registering {}", capability);
        let replaced = self.abilities.insert(capability, ability);
        if replaced.is_some() {
            debug!("{} replaced an earlier registration", capability);
        }
        replaced
    }

    pub fn resolve(&self, capability: Capability) -> ScreenplayResult<&Ability> {
        self.abilities
            .get(&capability)
            .ok_or(ScreenplayError::CapabilityNotFound(capability))
    }

    pub fn resolve_mut(&mut self, capability: Capability) -> ScreenplayResult<&mut Ability> {
        self.abilities
            .get_mut(&capability)
            .ok_or(ScreenplayError::CapabilityNotFound(capability))
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.abilities.contains_key(&capability)
    }

    /// Registered tags in key order
    pub fn capabilities(&self) -> Vec<Capability> {
        self.abilities.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.abilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.abilities.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Ability> {
        self.abilities.values()
    }

    /// Close every ability. Each close is attempted even when an earlier one
    /// failed; failures are logged, never returned.
    pub async fn close_all(&mut self) {
        for (capability, ability) in self.abilities.iter_mut() {
            if let Err(e) = ability.close().await {
                warn!("Failed to close {}: {}", capability, e);
            }
        }
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("capabilities", &self.capabilities())
            .finish()
    }
}
