//! Actors

use screenplay_common::EvidenceArtifact;
use tracing::info;

use crate::ability::{Ability, AbilityKind, LastOperation};
use crate::capability::CapabilityRegistry;
use crate::error::{ScreenplayError, ScreenplayResult};
use crate::question::Question;
use crate::task::Task;

/// A named participant acting through the abilities it was granted.
///
/// The actor owns its registry for the scenario. Verbs take `&mut self`, so
/// two verbs can never overlap on the same ability.
#[derive(Debug)]
pub struct Actor {
    name: String,
    registry: CapabilityRegistry,
}

impl Actor {
    pub fn new(name: impl Into<String>, registry: CapabilityRegistry) -> ScreenplayResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ScreenplayError::InvalidActor(
                "actor name must not be empty".to_string(),
            ));
        }
        Ok(Self { name, registry })
    }

    /// An actor with no abilities yet
    pub fn named(name: impl Into<String>) -> ScreenplayResult<Self> {
        Self::new(name, CapabilityRegistry::new())
    }

    /// Grant an ability, replacing any earlier one of the same kind
    pub fn who_can(mut self, ability: impl Into<Ability>) -> Self {
        self.registry.register(ability);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// The ability of kind `A`. Its absence is a wiring defect reported as
    /// `MissingAbility`.
    pub fn ability<A: AbilityKind>(&mut self) -> ScreenplayResult<&mut A> {
        let missing = || ScreenplayError::MissingAbility {
            actor: self.name.clone(),
            capability: A::CAPABILITY,
        };
        match self.registry.resolve_mut(A::CAPABILITY) {
            Ok(ability) => A::from_ability_mut(ability).ok_or_else(missing),
            Err(_) => Err(missing()),
        }
    }

    /// Shared view of the ability of kind `A`
    pub fn ability_ref<A: AbilityKind>(&self) -> ScreenplayResult<&A> {
        self.registry
            .resolve(A::CAPABILITY)
            .ok()
            .and_then(A::from_ability)
            .ok_or_else(|| ScreenplayError::MissingAbility {
                actor: self.name.clone(),
                capability: A::CAPABILITY,
            })
    }

    pub fn has_ability<A: AbilityKind>(&self) -> bool {
        self.registry.has(A::CAPABILITY)
    }

    pub async fn execute<T: Task + ?Sized>(&mut self, task: &T) -> ScreenplayResult<()> {
        info!("[{}] executing: {}", self.name, task.description());
        task.perform_as(self).await
    }

    pub async fn answer<Q: Question + ?Sized>(&mut self, question: &Q) -> ScreenplayResult<Q::Answer> {
        info!("[{}] asking: {}", self.name, question.description());
        question.answered_by(self).await
    }

    /// Most recent operation across all abilities that recorded one
    pub fn last_operations(&self) -> Vec<(&'static str, &LastOperation)> {
        self.registry
            .iter()
            .filter_map(|ability| ability.last_operation().map(|op| (ability.name(), op)))
            .collect()
    }

    /// Evidence recorded by every ability so far
    pub fn evidence(&self) -> Vec<EvidenceArtifact> {
        self.registry
            .iter()
            .flat_map(|ability| ability.evidence().iter().cloned())
            .collect()
    }

    /// Close every granted ability; failures are logged, never returned
    pub async fn dismiss(&mut self) {
        self.registry.close_all().await;
    }
}
