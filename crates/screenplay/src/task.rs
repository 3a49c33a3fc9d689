//! Tasks: actions an actor performs

use async_trait::async_trait;

use crate::actor::Actor;
use crate::error::ScreenplayResult;

/// A business action. Holds its parameters and nothing else, so the same
/// value can be performed any number of times.
#[async_trait]
pub trait Task: Send + Sync {
    fn description(&self) -> String;

    async fn perform_as(&self, actor: &mut Actor) -> ScreenplayResult<()>;
}

/// Child tasks performed in order through the actor. The first failure
/// stops the sequence and is returned as is.
pub struct Sequence {
    description: String,
    tasks: Vec<Box<dyn Task>>,
}

impl Sequence {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            tasks: Vec::new(),
        }
    }

    pub fn then(mut self, task: impl Task + 'static) -> Self {
        self.tasks.push(Box::new(task));
        self
    }

    pub fn push(&mut self, task: Box<dyn Task>) {
        self.tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl FromIterator<Box<dyn Task>> for Sequence {
    fn from_iter<I: IntoIterator<Item = Box<dyn Task>>>(iter: I) -> Self {
        Self {
            description: "Sequence".to_string(),
            tasks: iter.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Task for Sequence {
    fn description(&self) -> String {
        self.description.clone()
    }

    async fn perform_as(&self, actor: &mut Actor) -> ScreenplayResult<()> {
        for task in &self.tasks {
            actor.execute(task.as_ref()).await?;
        }
        Ok(())
    }
}
