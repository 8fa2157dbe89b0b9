use std::{fmt::Write as _, fs, sync::Arc};

use crate::{
    config::{DialectKind, OrmConfig},
    conventions::ModelBuilder,
    errors::OrmGraphError,
    graph,
    metadata::{Model, ModelDeclaration},
    query::{Query, QueryCompiler},
    sql::{DdlGenerator, SqlGenerator},
};

const COMMANDS: [&str; 4] = ["validate", "order", "ddl", "select"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandLineConfig {
    pub model: String,
    pub dialect: DialectKind,
    pub command: String,
    pub entity: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub includes: Vec<String>,
}

impl CommandLineConfig {
    pub fn from_args(args: &[&str]) -> Result<Self, String> {
        let mut model = None;
        let mut dialect = DialectKind::Sqlite;
        let mut command = String::from("validate");
        let mut entity = None;
        let mut limit = None;
        let mut offset = None;
        let mut includes = Vec::new();
        let mut iter = args.iter().skip(1);
        while let Some(arg) = iter.next() {
            let mut value = |flag: &str| {
                iter.next()
                    .map(|v| v.to_string())
                    .ok_or_else(|| format!("{flag} requires a value"))
            };
            match *arg {
                "--model" => model = Some(value("--model")?),
                "--dialect" => {
                    dialect = DialectKind::parse(&value("--dialect")?).map_err(|e| e.to_string())?;
                }
                "--command" => command = value("--command")?,
                "--entity" => entity = Some(value("--entity")?),
                "--limit" => limit = Some(parse_count("--limit", &value("--limit")?)?),
                "--offset" => offset = Some(parse_count("--offset", &value("--offset")?)?),
                "--include" => includes.push(value("--include")?),
                other if other.starts_with('-') => {
                    return Err(format!("unknown flag {other}"));
                }
                other => command = other.to_string(),
            }
        }
        if !COMMANDS.contains(&command.as_str()) {
            return Err(format!("unknown command {command}"));
        }
        let model = model.ok_or_else(|| "--model is required".to_string())?;
        if command == "select" && entity.is_none() {
            return Err("select requires --entity".to_string());
        }
        Ok(Self {
            model,
            dialect,
            command,
            entity,
            limit,
            offset,
            includes,
        })
    }

    pub fn help() -> &'static str {
        "Usage: ormgraph --model FILE [--dialect sqlite|sqlserver] \
         [--command validate|order|ddl|select] [--entity NAME] [--limit N] \
         [--offset N] [--include PATH]...\n"
    }
}

fn parse_count(flag: &str, text: &str) -> Result<u64, String> {
    text.parse()
        .map_err(|_| format!("{flag} expects a non-negative integer, got '{text}'"))
}

/// Reads a JSON model declaration and builds it with the default conventions.
pub fn load_model(path: &str) -> Result<Arc<Model>, OrmGraphError> {
    let text = fs::read_to_string(path)
        .map_err(|e| OrmGraphError::invalid_argument(format!("cannot read {path}: {e}")))?;
    let declaration = ModelDeclaration::from_json_str(&text)?;
    let mut builder = ModelBuilder::default();
    builder.declare_model(&declaration)?;
    builder.build()
}

/// Runs the configured command and returns what it prints.
pub fn run(config: &CommandLineConfig) -> Result<String, OrmGraphError> {
    let model = load_model(&config.model)?;
    let dialect = OrmConfig::new(config.dialect).dialect();
    let mut out = String::new();
    match config.command.as_str() {
        "validate" => {
            let _ = writeln!(
                out,
                "model valid: {} entities",
                model.entity_ids().len()
            );
        }
        "order" => {
            for entity in graph::dependency_order(&model)? {
                let _ = writeln!(out, "{}", model.entity(entity)?.name);
            }
        }
        "ddl" => {
            out.push_str(&DdlGenerator::new(&dialect).create_script(&model)?);
        }
        "select" => {
            let entity = config
                .entity
                .as_deref()
                .ok_or_else(|| OrmGraphError::invalid_argument("select requires an entity"))?;
            let mut query = Query::from(entity);
            for include in &config.includes {
                query = query.include(include)?;
            }
            if let Some(offset) = config.offset {
                query = query.skip(offset);
            }
            if let Some(limit) = config.limit {
                query = query.take(limit);
            }
            let compiled = QueryCompiler::new(&model).compile(&query)?;
            for statement in compiled.generate(&SqlGenerator::new(&dialect))? {
                let _ = writeln!(out, "{}{}", statement.text, dialect.batch_command_separator());
            }
        }
        other => {
            return Err(OrmGraphError::invalid_argument(format!("unknown command {other}")));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_select_flags() {
        let cfg = CommandLineConfig::from_args(&[
            "ormgraph",
            "--model",
            "m.json",
            "--dialect",
            "sqlserver",
            "--command",
            "select",
            "--entity",
            "Customer",
            "--limit",
            "10",
            "--include",
            "Orders",
        ])
        .expect("parse");
        assert_eq!(cfg.dialect, DialectKind::SqlServer);
        assert_eq!(cfg.limit, Some(10));
        assert_eq!(cfg.includes, vec!["Orders".to_string()]);
    }

    #[test]
    fn test_usage_errors() {
        assert!(CommandLineConfig::from_args(&["ormgraph", "--command", "ddl"]).is_err());
        assert!(CommandLineConfig::from_args(&["ormgraph", "--model", "m", "--limit", "x"]).is_err());
        assert!(CommandLineConfig::from_args(&["ormgraph", "--model", "m", "select"]).is_err());
        assert!(CommandLineConfig::from_args(&["ormgraph", "--model", "m", "--bogus"]).is_err());
    }
}
