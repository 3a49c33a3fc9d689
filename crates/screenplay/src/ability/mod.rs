//! Abilities: the closed set of sessions an actor can act through

use serde::{Deserialize, Serialize};
use screenplay_common::EvidenceArtifact;

use crate::capability::Capability;
use crate::error::ScreenplayResult;

mod api;
mod web;

pub use api::ApiAbility;
pub use web::{SessionState, WebAbility};

/// Metadata about the most recent verb, kept for diagnostics and evidence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LastOperation {
    /// Verb or HTTP method
    pub method: String,
    /// Selector, URL or endpoint the verb acted on
    pub target: String,
    /// Text typed or request body sent
    pub payload: Option<String>,
    /// HTTP status code, when the verb got one
    pub status: Option<u16>,
    /// Outcome summary, including the error message of a failed verb
    pub result: Option<String>,
    /// Raw response body
    pub raw_response: Option<String>,
}

/// An ability granted to an actor
#[derive(Debug)]
pub enum Ability {
    Web(WebAbility),
    Api(ApiAbility),
}

impl Ability {
    pub fn capability(&self) -> Capability {
        match self {
            Ability::Web(_) => Capability::Web,
            Ability::Api(_) => Capability::Api,
        }
    }

    pub fn name(&self) -> &'static str {
        self.capability().ability_name()
    }

    pub fn last_operation(&self) -> Option<&LastOperation> {
        match self {
            Ability::Web(web) => web.last_operation(),
            Ability::Api(api) => api.last_operation(),
        }
    }

    pub fn evidence(&self) -> &[EvidenceArtifact] {
        match self {
            Ability::Web(web) => web.evidence(),
            Ability::Api(api) => api.evidence(),
        }
    }

    /// Release the underlying session. Idempotent.
    pub async fn close(&mut self) -> ScreenplayResult<()> {
        match self {
            Ability::Web(web) => web.close().await,
            Ability::Api(api) => api.close().await,
        }
    }
}

impl From<WebAbility> for Ability {
    fn from(ability: WebAbility) -> Self {
        Ability::Web(ability)
    }
}

impl From<ApiAbility> for Ability {
    fn from(ability: ApiAbility) -> Self {
        Ability::Api(ability)
    }
}

/// Concrete ability types an actor can be asked for
pub trait AbilityKind: Sized {
    const CAPABILITY: Capability;

    fn from_ability(ability: &Ability) -> Option<&Self>;

    fn from_ability_mut(ability: &mut Ability) -> Option<&mut Self>;
}

impl AbilityKind for WebAbility {
    const CAPABILITY: Capability = Capability::Web;

    fn from_ability(ability: &Ability) -> Option<&Self> {
        match ability {
            Ability::Web(web) => Some(web),
            _ => None,
        }
    }

    fn from_ability_mut(ability: &mut Ability) -> Option<&mut Self> {
        match ability {
            Ability::Web(web) => Some(web),
            _ => None,
        }
    }
}

impl AbilityKind for ApiAbility {
    const CAPABILITY: Capability = Capability::Api;

    fn from_ability(ability: &Ability) -> Option<&Self> {
        match ability {
            Ability::Api(api) => Some(api),
            _ => None,
        }
    }

    fn from_ability_mut(ability: &mut Ability) -> Option<&mut Self> {
        match ability {
            Ability::Api(api) => Some(api),
            _ => None,
        }
    }
}
