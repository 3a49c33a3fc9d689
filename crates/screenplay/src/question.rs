//! Questions: read-only probes an actor answers

use async_trait::async_trait;

use crate::actor::Actor;
use crate::error::ScreenplayResult;

/// A query about application state. Answering may wait for the page but
/// never changes it.
#[async_trait]
pub trait Question: Send + Sync {
    type Answer: Send;

    fn description(&self) -> String;

    async fn answered_by(&self, actor: &mut Actor) -> ScreenplayResult<Self::Answer>;
}
