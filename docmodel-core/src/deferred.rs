//! Deferred command queues.
//!
//! A [`Deferred`] records persistence commands against a document or a result
//! collection without running them. [`Deferred::exec`] replays the queue one command
//! at a time, in the order recorded, and stops at the first failure. Commands that
//! already ran are not undone.
//!
//! # Example
//!
//! ```ignore
//! user.deferred()
//!     .update(doc! { "name": "Bob" })
//!     .populate("friends")
//!     .exec()
//!     .await?;
//! ```

use async_trait::async_trait;
use bson::Document as BsonDocument;
use tracing::debug;

use crate::{document::Document, error::ModelResult, results::Results};

/// A recorded persistence command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Populate(String),
    Save,
    Update(BsonDocument),
    Remove,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Populate(_) => "populate",
            Command::Save => "save",
            Command::Update(_) => "update",
            Command::Remove => "remove",
        }
    }
}

/// A target commands can be replayed against.
#[async_trait]
pub trait Deferrable: Send {
    async fn apply(&mut self, command: Command) -> ModelResult<()>;
}

#[async_trait]
impl Deferrable for Document {
    async fn apply(&mut self, command: Command) -> ModelResult<()> {
        match command {
            Command::Populate(path) => self.populate(&path).await,
            Command::Save => self.save().await,
            Command::Update(data) => self.update(data).await,
            Command::Remove => self.remove().await,
        }
    }
}

#[async_trait]
impl Deferrable for Results {
    async fn apply(&mut self, command: Command) -> ModelResult<()> {
        match command {
            Command::Populate(path) => self.populate(&path).await,
            Command::Save => self.save().await,
            Command::Update(data) => self.update(data).await,
            Command::Remove => self.remove().await,
        }
    }
}

/// A queue of commands bound to a target.
#[derive(Debug)]
pub struct Deferred<'a, T: Deferrable> {
    target: &'a mut T,
    queue: Vec<Command>,
}

impl<'a, T: Deferrable> Deferred<'a, T> {
    pub fn new(target: &'a mut T) -> Self {
        Self {
            target,
            queue: Vec::new(),
        }
    }

    pub fn populate(self, path: impl Into<String>) -> Self {
        self.push(Command::Populate(path.into()))
    }

    pub fn save(self) -> Self {
        self.push(Command::Save)
    }

    pub fn update(self, data: BsonDocument) -> Self {
        self.push(Command::Update(data))
    }

    pub fn remove(self) -> Self {
        self.push(Command::Remove)
    }

    pub fn commands(&self) -> &[Command] {
        &self.queue
    }

    /// Runs the recorded commands in order.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing command; later commands do not run.
    pub async fn exec(self) -> ModelResult<()> {
        let total = self.queue.len();

        for (position, command) in self.queue.into_iter().enumerate() {
            debug!(command = command.name(), position, total, "running deferred command");
            self.target.apply(command).await?;
        }

        Ok(())
    }

    fn push(mut self, command: Command) -> Self {
        self.queue.push(command);
        self
    }
}
