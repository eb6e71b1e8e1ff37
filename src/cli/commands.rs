//! CLI command implementations
//!
//! Every command builds its answer as a JSON value; `run_command` writes it
//! as the single response line. Each invocation loads its own in-memory
//! catalog from the configuration file.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::datastore::MemoryCatalog;
use crate::execution::{self, Context};
use crate::expr::{parse, Bindings, Expression};
use crate::observability::{Logger, MetricsRegistry, Severity};
use crate::plan::{decode, encode, IndexDefinition, Operator};
use crate::planner::{sarg_for, AccessPlanner, ExplainPlan, SelectOptions};

use super::args::{Cli, Command};
use super::config::Config;
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};

/// Arguments of the `query` command
#[derive(Debug, Clone, Default)]
pub struct QueryArgs {
    pub keyspace: String,
    pub predicate: Option<String>,
    pub alias: Option<String>,
    pub limit: Option<usize>,
    pub distinct: bool,
    pub params: Vec<String>,
}

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    Logger::set_min_severity(if cli.verbose {
        Severity::Info
    } else {
        Severity::Error
    });

    match run_command(cli.command) {
        Ok(data) => write_response(data),
        Err(err) => {
            write_error(&err)?;
            Err(err)
        }
    }
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<Value> {
    match cmd {
        Command::Sarg { key, predicate } => sarg(&key, &predicate),
        Command::Explain {
            config,
            keyspace,
            predicate,
            alias,
            text,
        } => explain(&config, &keyspace, predicate.as_deref(), alias.as_deref(), text),
        Command::Query {
            config,
            keyspace,
            predicate,
            alias,
            limit,
            distinct,
            params,
        } => query(
            &config,
            QueryArgs {
                keyspace,
                predicate,
                alias,
                limit,
                distinct,
                params,
            },
        ),
        Command::CreateIndex {
            config,
            keyspace,
            name,
            keys,
            condition,
        } => create_index(&config, &keyspace, &name, &keys, condition.as_deref()),
    }
}

/// Spans for one index key, or `null` when the predicate cannot bound it
pub fn sarg(key: &str, predicate: &str) -> CliResult<Value> {
    let key = parse(key)?;
    let predicate = parse(predicate)?;
    let spans = sarg_for(&key, &predicate);
    Ok(json!({
        "sargable": spans.is_some(),
        "spans": serde_json::to_value(spans)?,
    }))
}

/// Plan for a query, as plan JSON or as indented text lines
pub fn explain(
    config_path: &Path,
    keyspace: &str,
    predicate: Option<&str>,
    alias: Option<&str>,
    text: bool,
) -> CliResult<Value> {
    let config = Config::load(config_path)?;
    let catalog = config.build_catalog()?;
    let predicate = predicate.map(parse).transpose()?;

    let planner = AccessPlanner::new(&catalog);
    let plan = planner.plan_select(
        &config.namespace,
        keyspace,
        alias,
        predicate.as_ref(),
        &SelectOptions::default(),
    )?;

    if text {
        let explain = ExplainPlan::from_plan(&plan)?;
        return Ok(json!(explain.lines()));
    }
    Ok(plan.to_json()?)
}

/// Runs a query and returns every matching document
pub fn query(config_path: &Path, args: QueryArgs) -> CliResult<Value> {
    let config = Config::load(config_path)?;
    let catalog = config.build_catalog()?;
    let metrics = Arc::new(MetricsRegistry::new());

    let predicate = args.predicate.as_deref().map(parse).transpose()?;
    let options = SelectOptions {
        distinct: args.distinct,
        limit: args.limit.map(|n| Expression::constant(json!(n))),
    };
    let planner = AccessPlanner::new(&catalog).with_metrics(Arc::clone(&metrics));
    let plan = planner.plan_select(
        &config.namespace,
        &args.keyspace,
        args.alias.as_deref(),
        predicate.as_ref(),
        &options,
    )?;
    let plan = ship(&plan, &catalog)?;

    let ctx = Context::new(config.context_options())
        .with_bindings(bindings(&args.params)?)
        .with_metrics(Arc::clone(&metrics));
    let mut items = block_on(execution::run(&plan, Arc::new(ctx)))??;

    // The limit only reaches the scan when no residual filter follows it.
    if let Some(limit) = args.limit {
        items.truncate(limit);
    }

    log_metrics(&metrics);
    Ok(Value::Array(items))
}

/// Plans and runs one index creation against the configured catalog
pub fn create_index(
    config_path: &Path,
    keyspace: &str,
    name: &str,
    keys: &[String],
    condition: Option<&str>,
) -> CliResult<Value> {
    let config = Config::load(config_path)?;
    let catalog = config.build_catalog()?;

    let keys = keys.iter().map(|k| parse(k)).collect::<Result<Vec<_>, _>>()?;
    let mut definition = IndexDefinition::new(name, keys);
    if let Some(condition) = condition {
        definition = definition.with_condition(parse(condition)?);
    }

    let plan = AccessPlanner::new(&catalog).plan_create_index(&config.namespace, keyspace, definition)?;
    let plan = ship(&plan, &catalog)?;
    let ctx = Context::new(config.context_options());
    block_on(execution::run(&plan, Arc::new(ctx)))??;

    Ok(json!({
        "keyspace": keyspace,
        "index": name,
        "created": !config.readonly,
    }))
}

/// Encodes and decodes a plan, as a coordinator handing it to a worker does
fn ship(plan: &Operator, catalog: &MemoryCatalog) -> CliResult<Operator> {
    let text = encode(plan)?;
    Ok(decode(&text, catalog)?)
}

/// Named parameters from `name=<json>` arguments. Values that are not JSON
/// are taken as strings.
fn bindings(params: &[String]) -> CliResult<Bindings> {
    let mut bindings = Bindings::new();
    for param in params {
        let (name, raw) = param.split_once('=').ok_or_else(|| {
            CliError::invalid_argument(format!("Parameter '{}' is not name=value", param))
        })?;
        if name.is_empty() {
            return Err(CliError::invalid_argument(format!(
                "Parameter '{}' has no name",
                param
            )));
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        bindings = bindings.with_named(name, value);
    }
    Ok(bindings)
}

fn block_on<F: std::future::Future>(future: F) -> CliResult<F::Output> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::io_error(format!("Failed to create tokio runtime: {}", e)))?;
    Ok(rt.block_on(future))
}

fn log_metrics(metrics: &MetricsRegistry) {
    let snapshot = metrics.snapshot();
    let operators = snapshot.operators_run.to_string();
    let items = snapshot.items_produced.to_string();
    let fallbacks = snapshot.sarg_fallbacks.to_string();
    Logger::info(
        "QUERY_METRICS",
        &[
            ("operators_run", operators.as_str()),
            ("items_produced", items.as_str()),
            ("sarg_fallbacks", fallbacks.as_str()),
        ],
    );
}

#[cfg(test)]
mod tests {
    use super::super::errors::CliErrorCode;
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_config(temp_dir: &TempDir, readonly: bool) -> std::path::PathBuf {
        let config_path = temp_dir.path().join("docquery.json");
        let config = json!({
            "readonly": readonly,
            "keyspaces": [{
                "name": "people",
                "documents": {
                    "p1": {"name": "ann", "age": 25},
                    "p2": {"name": "bob", "age": 31},
                    "p3": {"name": "cat", "age": 35},
                    "p4": {"name": "dan", "age": 42}
                },
                "indexes": [{"name": "by_age", "keys": ["age"]}]
            }]
        });
        fs::write(&config_path, config.to_string()).unwrap();
        config_path
    }

    fn args(predicate: Option<&str>) -> QueryArgs {
        QueryArgs {
            keyspace: "people".into(),
            predicate: predicate.map(str::to_string),
            ..QueryArgs::default()
        }
    }

    #[test]
    fn test_sarg_command() {
        let out = sarg("age", "age > 5 AND age < 10").unwrap();
        assert_eq!(out["sargable"], json!(true));
        assert_eq!(out["spans"][0]["range"]["inclusion"], json!("NEITHER"));

        let out = sarg("age", "name = 'x'").unwrap();
        assert_eq!(out, json!({"sargable": false, "spans": null}));
    }

    #[test]
    fn test_sarg_rejects_bad_expression() {
        let err = sarg("age", "age >").unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::InvalidArgument);
    }

    #[test]
    fn test_explain_uses_index() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = create_config(&temp_dir, false);

        let plan = explain(&config_path, "people", Some("age > 30"), None, false).unwrap();
        assert_eq!(plan["#operator"], json!("Filter"));
        assert_eq!(plan["child"]["child"]["#operator"], json!("IndexScan"));
        assert_eq!(plan["child"]["child"]["index"], json!("by_age"));

        let lines = explain(&config_path, "people", Some("age > 30"), Some("p"), true).unwrap();
        assert!(lines[0].as_str().unwrap().starts_with("Filter"));
    }

    #[test]
    fn test_query_filters_documents() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = create_config(&temp_dir, false);

        let out = query(&config_path, args(Some("age > 30 AND age <= 40"))).unwrap();
        let names: Vec<&str> = out
            .as_array()
            .unwrap()
            .iter()
            .map(|doc| doc["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["bob", "cat"]);
    }

    #[test]
    fn test_query_with_parameter_alias_and_limit() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = create_config(&temp_dir, false);

        let mut query_args = args(Some("p.age >= $min"));
        query_args.alias = Some("p".into());
        query_args.params = vec!["min=30".into()];
        query_args.limit = Some(2);

        let out = query(&config_path, query_args).unwrap();
        assert_eq!(out, json!([
            {"p": {"name": "bob", "age": 31}},
            {"p": {"name": "cat", "age": 35}}
        ]));
    }

    #[test]
    fn test_query_unknown_keyspace() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = create_config(&temp_dir, false);

        let mut query_args = args(None);
        query_args.keyspace = "nope".into();
        let err = query(&config_path, query_args).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::PlanFailed);
        assert_eq!(err.cause(), Some("DQ_KEYSPACE_NOT_FOUND"));
    }

    #[test]
    fn test_bad_parameter() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = create_config(&temp_dir, false);

        let mut query_args = args(None);
        query_args.params = vec!["novalue".into()];
        let err = query(&config_path, query_args).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::InvalidArgument);
    }

    #[test]
    fn test_create_index_respects_readonly() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = create_config(&temp_dir, true);
        let out = create_index(&config_path, "people", "by_name", &["name".into()], None).unwrap();
        assert_eq!(out["created"], json!(false));

        let temp_dir = TempDir::new().unwrap();
        let config_path = create_config(&temp_dir, false);
        let out = create_index(&config_path, "people", "by_name", &["name".into()], None).unwrap();
        assert_eq!(out["created"], json!(true));

        let err = create_index(&config_path, "people", "by_age", &["age".into()], None).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::QueryFailed);
        assert_eq!(err.cause(), Some("DQ_INDEX_EXISTS"));
    }
}
