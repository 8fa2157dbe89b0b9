use std::fmt::Write as _;

use serde::Serialize;

use crate::{connection::Parameter, sql::value::SqlValue};

/// Rendered statement text plus its bound parameters.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GeneratedSql {
    pub text: String,
    pub parameters: Vec<Parameter>,
}

/// Text accumulator for one statement.
#[derive(Clone, Debug, Default)]
pub struct CommandBuilder {
    text: String,
    parameters: Vec<Parameter>,
}

impl CommandBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, fragment: &str) -> &mut Self {
        self.text.push_str(fragment);
        self
    }

    pub fn append_fmt(&mut self, args: std::fmt::Arguments<'_>) -> &mut Self {
        let _ = self.text.write_fmt(args);
        self
    }

    pub fn append_line(&mut self, fragment: &str) -> &mut Self {
        self.text.push_str(fragment);
        self.text.push('\n');
        self
    }

    /// Binds `value` under the already rendered `name`. A name is bound once.
    pub fn add_parameter(&mut self, name: &str, value: SqlValue) -> &mut Self {
        if !self.parameters.iter().any(|p| p.name == name) {
            self.parameters.push(Parameter {
                name: name.to_string(),
                value,
            });
        }
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn build(self) -> GeneratedSql {
        GeneratedSql {
            text: self.text,
            parameters: self.parameters,
        }
    }
}

/// Hands out a fresh [`CommandBuilder`] for every generated statement.
pub trait CommandBuilderFactory: Send + Sync {
    fn create(&self) -> CommandBuilder;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultCommandBuilderFactory;

impl CommandBuilderFactory for DefaultCommandBuilderFactory {
    fn create(&self) -> CommandBuilder {
        CommandBuilder::new()
    }
}
