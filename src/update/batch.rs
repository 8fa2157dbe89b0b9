use serde::{Deserialize, Serialize};

use crate::update::command::ModificationCommand;

/// Limits applied while packing commands into batches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    pub max_batch_size: usize,
    #[serde(default)]
    pub max_parameters: Option<usize>,
    #[serde(default)]
    pub singular: bool,
}

impl BatchConfig {
    /// One command per batch.
    pub fn singular() -> Self {
        Self {
            max_batch_size: 1,
            max_parameters: None,
            singular: true,
        }
    }

    pub fn with_max_batch_size(max_batch_size: usize) -> Self {
        Self {
            max_batch_size,
            ..Self::default()
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 100,
            max_parameters: None,
            singular: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CommandBatch {
    config: BatchConfig,
    commands: Vec<ModificationCommand>,
    parameters: usize,
}

impl CommandBatch {
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            commands: Vec::new(),
            parameters: 0,
        }
    }

    pub fn can_add(&self, command: &ModificationCommand) -> bool {
        if self.commands.is_empty() {
            return true;
        }
        if self.config.singular || self.commands.len() >= self.config.max_batch_size.max(1) {
            return false;
        }
        match self.config.max_parameters {
            Some(max) => self.parameters + command.parameter_count() <= max,
            None => true,
        }
    }

    /// Appends `command` unless the batch is full. An empty batch always accepts.
    pub fn add_command(&mut self, command: ModificationCommand) -> bool {
        self.try_add(command).is_ok()
    }

    /// Like [`CommandBatch::add_command`], but hands a rejected command back.
    pub fn try_add(&mut self, command: ModificationCommand) -> Result<(), ModificationCommand> {
        if !self.can_add(&command) {
            return Err(command);
        }
        self.parameters += command.parameter_count();
        self.commands.push(command);
        Ok(())
    }

    pub fn commands(&self) -> &[ModificationCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters
    }

    pub fn config(&self) -> BatchConfig {
        self.config
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BatchFactory {
    config: BatchConfig,
}

impl BatchFactory {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    pub fn create(&self) -> CommandBatch {
        CommandBatch::new(self.config)
    }

    pub fn config(&self) -> BatchConfig {
        self.config
    }
}
