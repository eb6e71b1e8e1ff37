//! Plan JSON
//!
//! Every node is an object with a `#operator` discriminator and its own
//! fields. Expressions travel as text. Storage objects travel as names and
//! are re-resolved through a `Catalog` on decode, so a decoded plan always
//! reflects live catalog state.
//!
//! ```text
//! {"#operator":"IndexScan","index":"ix_age","namespace":"default",
//!  "keyspace":"people","using":"gsi","spans":[...],"limit":"10"}
//! ```

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::errors::{PlanError, PlanResult};
use super::operators::{
    Alias, CreateIndex, Fetch, Filter, IndexDefinition, IndexScan, IntersectAll, Operator,
    OperatorKind, PrimaryScan, UnionAll,
};
use super::visitor::PlanVisitor;
use crate::datastore::{Catalog, IndexType, Keyspace};
use crate::expr::{parse, stringify, Expression};
use crate::observability::Logger;
use crate::planner::Spans;

/// Discriminator key
pub const OPERATOR_KEY: &str = "#operator";

impl Operator {
    pub fn to_json(&self) -> PlanResult<Value> {
        self.accept(&mut Encoder)
    }

    /// Rebuilds a plan, resolving every storage reference through `catalog`
    pub fn from_json(value: &Value, catalog: &dyn Catalog) -> PlanResult<Operator> {
        Decoder { catalog }.decode(value)
    }
}

/// Plan as JSON text
pub fn encode(plan: &Operator) -> PlanResult<String> {
    Ok(serde_json::to_string(&plan.to_json()?)?)
}

/// Plan from JSON text
pub fn decode(text: &str, catalog: &dyn Catalog) -> PlanResult<Operator> {
    let result = serde_json::from_str::<Value>(text)
        .map_err(PlanError::from)
        .and_then(|value| Operator::from_json(&value, catalog));
    if let Err(err) = &result {
        let reason = err.to_string();
        Logger::warn(
            "PLAN_DECODE_FAILED",
            &[("code", err.code()), ("reason", reason.as_str())],
        );
    }
    result
}

// ==================
// Encoding
// ==================

struct Encoder;

fn node(kind: OperatorKind) -> Map<String, Value> {
    let mut obj = Map::new();
    obj.insert(OPERATOR_KEY.into(), json!(kind.name()));
    obj
}

fn texts(exprs: &[Expression]) -> Value {
    Value::Array(exprs.iter().map(|e| Value::String(stringify(e))).collect())
}

fn put_keyspace(obj: &mut Map<String, Value>, keyspace: &dyn Keyspace) {
    obj.insert("namespace".into(), json!(keyspace.namespace()));
    obj.insert("keyspace".into(), json!(keyspace.name()));
}

fn put_text(obj: &mut Map<String, Value>, key: &str, expr: Option<&Expression>) {
    if let Some(expr) = expr {
        obj.insert(key.into(), Value::String(stringify(expr)));
    }
}

impl PlanVisitor for Encoder {
    type Output = Value;

    fn visit_index_scan(&mut self, op: &IndexScan) -> PlanResult<Value> {
        let mut obj = node(OperatorKind::IndexScan);
        obj.insert("index".into(), json!(op.index.name()));
        put_keyspace(&mut obj, op.keyspace.as_ref());
        obj.insert("using".into(), json!(op.using().as_str()));
        obj.insert("spans".into(), serde_json::to_value(&op.spans)?);
        if op.distinct {
            obj.insert("distinct".into(), json!(true));
        }
        put_text(&mut obj, "limit", op.limit.as_ref());
        if !op.covers.is_empty() {
            obj.insert("covers".into(), texts(&op.covers));
        }
        Ok(Value::Object(obj))
    }

    fn visit_primary_scan(&mut self, op: &PrimaryScan) -> PlanResult<Value> {
        let mut obj = node(OperatorKind::PrimaryScan);
        put_keyspace(&mut obj, op.keyspace.as_ref());
        put_text(&mut obj, "limit", op.limit.as_ref());
        Ok(Value::Object(obj))
    }

    fn visit_fetch(&mut self, op: &Fetch) -> PlanResult<Value> {
        let mut obj = node(OperatorKind::Fetch);
        put_keyspace(&mut obj, op.keyspace.as_ref());
        if let Some(alias) = &op.alias {
            obj.insert("as".into(), json!(alias));
        }
        obj.insert("child".into(), op.child.accept(self)?);
        Ok(Value::Object(obj))
    }

    fn visit_filter(&mut self, op: &Filter) -> PlanResult<Value> {
        let mut obj = node(OperatorKind::Filter);
        obj.insert("condition".into(), json!(stringify(&op.condition)));
        if let Some(alias) = &op.alias {
            obj.insert("as".into(), json!(alias));
        }
        obj.insert("child".into(), op.child.accept(self)?);
        Ok(Value::Object(obj))
    }

    fn visit_intersect_all(&mut self, op: &IntersectAll) -> PlanResult<Value> {
        let mut obj = node(OperatorKind::IntersectAll);
        obj.insert("first".into(), op.first.accept(self)?);
        obj.insert("second".into(), op.second.accept(self)?);
        Ok(Value::Object(obj))
    }

    fn visit_union_all(&mut self, op: &UnionAll) -> PlanResult<Value> {
        let mut obj = node(OperatorKind::UnionAll);
        let children = op
            .children
            .iter()
            .map(|child| child.accept(self))
            .collect::<PlanResult<Vec<_>>>()?;
        obj.insert("children".into(), Value::Array(children));
        Ok(Value::Object(obj))
    }

    fn visit_alias(&mut self, op: &Alias) -> PlanResult<Value> {
        let mut obj = node(OperatorKind::Alias);
        obj.insert("alias".into(), json!(op.alias));
        Ok(Value::Object(obj))
    }

    fn visit_create_index(&mut self, op: &CreateIndex) -> PlanResult<Value> {
        let def = &op.definition;
        let mut obj = node(OperatorKind::CreateIndex);
        put_keyspace(&mut obj, op.keyspace.as_ref());
        obj.insert("index".into(), json!(def.name));
        put_text(&mut obj, "partition", def.partition.as_ref());
        obj.insert("keys".into(), texts(&def.keys));
        put_text(&mut obj, "where", def.condition.as_ref());
        obj.insert("using".into(), json!(def.using.as_str()));
        Ok(Value::Object(obj))
    }
}

// ==================
// Decoding
// ==================

#[derive(Deserialize)]
struct IndexScanFields {
    index: String,
    namespace: String,
    keyspace: String,
    #[serde(default)]
    using: IndexType,
    spans: Spans,
    #[serde(default)]
    distinct: bool,
    limit: Option<String>,
    #[serde(default)]
    covers: Vec<String>,
}

#[derive(Deserialize)]
struct PrimaryScanFields {
    namespace: String,
    keyspace: String,
    limit: Option<String>,
}

#[derive(Deserialize)]
struct FetchFields {
    namespace: String,
    keyspace: String,
    #[serde(rename = "as")]
    alias: Option<String>,
    child: Value,
}

#[derive(Deserialize)]
struct FilterFields {
    condition: String,
    #[serde(rename = "as")]
    alias: Option<String>,
    child: Value,
}

#[derive(Deserialize)]
struct IntersectAllFields {
    first: Value,
    second: Value,
}

#[derive(Deserialize)]
struct UnionAllFields {
    children: Vec<Value>,
}

#[derive(Deserialize)]
struct AliasFields {
    alias: String,
}

#[derive(Deserialize)]
struct CreateIndexFields {
    namespace: String,
    keyspace: String,
    index: String,
    partition: Option<String>,
    #[serde(default)]
    keys: Vec<String>,
    #[serde(rename = "where")]
    condition: Option<String>,
    #[serde(default)]
    using: IndexType,
}

fn fields<T: DeserializeOwned>(value: &Value) -> PlanResult<T> {
    Ok(T::deserialize(value)?)
}

fn expression(field: &'static str, text: &str) -> PlanResult<Expression> {
    parse(text).map_err(|e| PlanError::expression(field, e))
}

fn optional_expression(field: &'static str, text: Option<&str>) -> PlanResult<Option<Expression>> {
    text.map(|t| expression(field, t)).transpose()
}

fn expressions(field: &'static str, texts: &[String]) -> PlanResult<Vec<Expression>> {
    texts.iter().map(|t| expression(field, t)).collect()
}

struct Decoder<'c> {
    catalog: &'c dyn Catalog,
}

impl Decoder<'_> {
    fn decode(&self, value: &Value) -> PlanResult<Operator> {
        let obj = value
            .as_object()
            .ok_or_else(|| PlanError::Json(format!("plan node must be an object, got {}", value)))?;
        let name = match obj.get(OPERATOR_KEY) {
            None => return Err(PlanError::MissingOperator),
            Some(Value::String(name)) => name,
            Some(other) => return Err(PlanError::UnknownOperator(other.to_string())),
        };
        let kind =
            OperatorKind::from_name(name).ok_or_else(|| PlanError::UnknownOperator(name.clone()))?;

        let op = match kind {
            OperatorKind::IndexScan => {
                let f: IndexScanFields = fields(value)?;
                let keyspace = self.catalog.keyspace(&f.namespace, &f.keyspace)?;
                let index = keyspace.indexer(f.using)?.index_by_name(&f.index)?;
                Operator::IndexScan(IndexScan {
                    keyspace,
                    index,
                    spans: f.spans,
                    distinct: f.distinct,
                    limit: optional_expression("limit", f.limit.as_deref())?,
                    covers: expressions("covers", &f.covers)?,
                })
            }
            OperatorKind::PrimaryScan => {
                let f: PrimaryScanFields = fields(value)?;
                Operator::PrimaryScan(PrimaryScan {
                    keyspace: self.catalog.keyspace(&f.namespace, &f.keyspace)?,
                    limit: optional_expression("limit", f.limit.as_deref())?,
                })
            }
            OperatorKind::Fetch => {
                let f: FetchFields = fields(value)?;
                Operator::Fetch(Fetch {
                    keyspace: self.catalog.keyspace(&f.namespace, &f.keyspace)?,
                    alias: f.alias,
                    child: Arc::new(self.decode(&f.child)?),
                })
            }
            OperatorKind::Filter => {
                let f: FilterFields = fields(value)?;
                Operator::Filter(Filter {
                    condition: expression("condition", &f.condition)?,
                    alias: f.alias,
                    child: Arc::new(self.decode(&f.child)?),
                })
            }
            OperatorKind::IntersectAll => {
                let f: IntersectAllFields = fields(value)?;
                Operator::IntersectAll(IntersectAll {
                    first: Arc::new(self.decode(&f.first)?),
                    second: Arc::new(self.decode(&f.second)?),
                })
            }
            OperatorKind::UnionAll => {
                let f: UnionAllFields = fields(value)?;
                let children = f
                    .children
                    .iter()
                    .map(|child| self.decode(child).map(Arc::new))
                    .collect::<PlanResult<Vec<_>>>()?;
                Operator::UnionAll(UnionAll { children })
            }
            OperatorKind::Alias => {
                let f: AliasFields = fields(value)?;
                Operator::Alias(Alias { alias: f.alias })
            }
            OperatorKind::CreateIndex => {
                let f: CreateIndexFields = fields(value)?;
                let keyspace: Arc<dyn Keyspace> = self.catalog.keyspace(&f.namespace, &f.keyspace)?;
                let definition = IndexDefinition {
                    name: f.index,
                    partition: optional_expression("partition", f.partition.as_deref())?,
                    keys: expressions("keys", &f.keys)?,
                    condition: optional_expression("where", f.condition.as_deref())?,
                    using: f.using,
                };
                Operator::CreateIndex(CreateIndex::new(keyspace, definition))
            }
        };
        Ok(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::MemoryCatalog;
    use crate::planner::Span;

    fn catalog() -> MemoryCatalog {
        let catalog = MemoryCatalog::new();
        let ks = catalog.add_keyspace("default", "people").unwrap();
        ks.create_index("ix_age", None, &[parse("age").unwrap()], None, IndexType::Gsi)
            .unwrap();
        catalog
    }

    fn scan(catalog: &MemoryCatalog) -> IndexScan {
        let keyspace = catalog.keyspace("default", "people").unwrap();
        let index = keyspace
            .indexer(IndexType::Gsi)
            .unwrap()
            .index_by_name("ix_age")
            .unwrap();
        IndexScan::new(keyspace, index, vec![Span::point(Expression::constant(json!(30)))])
    }

    #[test]
    fn test_index_scan_fields() {
        let catalog = catalog();
        let op = Operator::IndexScan(scan(&catalog).with_limit(parse("10").unwrap()));
        let json = op.to_json().unwrap();
        assert_eq!(json["#operator"], "IndexScan");
        assert_eq!(json["index"], "ix_age");
        assert_eq!(json["namespace"], "default");
        assert_eq!(json["keyspace"], "people");
        assert_eq!(json["using"], "gsi");
        assert_eq!(json["limit"], "10");
        assert_eq!(json["spans"][0]["range"]["inclusion"], "BOTH");
        assert!(json.get("distinct").is_none());
        assert!(json.get("covers").is_none());
    }

    #[test]
    fn test_distinct_only_when_true() {
        let catalog = catalog();
        let op = Operator::IndexScan(scan(&catalog).with_distinct(true));
        assert_eq!(op.to_json().unwrap()["distinct"], true);
    }

    #[test]
    fn test_alias_encoding() {
        let op = Operator::Alias(Alias::new("p"));
        assert_eq!(op.to_json().unwrap(), json!({"#operator": "Alias", "alias": "p"}));
    }

    #[test]
    fn test_missing_and_unknown_operator() {
        let catalog = catalog();
        assert_eq!(
            decode(r#"{"alias":"p"}"#, &catalog),
            Err(PlanError::MissingOperator)
        );
        assert_eq!(
            decode(r##"{"#operator":"Sort"}"##, &catalog),
            Err(PlanError::UnknownOperator("Sort".into()))
        );
        assert_eq!(decode("[1,", &catalog).unwrap_err().code(), "DQ_PLAN_JSON");
    }

    #[test]
    fn test_unknown_operator_nested_in_child() {
        let catalog = catalog();
        let text = r##"{"#operator":"IntersectAll",
            "first":{"#operator":"Alias","alias":"a"},
            "second":{"#operator":"Mystery"}}"##;
        assert_eq!(
            decode(text, &catalog),
            Err(PlanError::UnknownOperator("Mystery".into()))
        );
    }

    #[test]
    fn test_unresolvable_references() {
        let catalog = catalog();
        let base = json!({
            "#operator": "IndexScan", "index": "ix_age", "namespace": "default",
            "keyspace": "people", "using": "gsi", "spans": []
        });

        let mut no_keyspace = base.clone();
        no_keyspace["keyspace"] = json!("nobody");
        assert_eq!(
            Operator::from_json(&no_keyspace, &catalog).unwrap_err().code(),
            "DQ_KEYSPACE_NOT_FOUND"
        );

        let mut no_index = base.clone();
        no_index["index"] = json!("ix_missing");
        assert_eq!(
            Operator::from_json(&no_index, &catalog).unwrap_err().code(),
            "DQ_INDEX_NOT_FOUND"
        );

        let mut no_indexer = base;
        no_indexer["using"] = json!("view");
        assert_eq!(
            Operator::from_json(&no_indexer, &catalog).unwrap_err().code(),
            "DQ_INDEX_TYPE_UNSUPPORTED"
        );
    }

    #[test]
    fn test_bad_expression_text() {
        let catalog = catalog();
        let value = json!({
            "#operator": "Filter", "condition": "age >",
            "child": {"#operator": "Alias", "alias": "p"}
        });
        assert!(matches!(
            Operator::from_json(&value, &catalog),
            Err(PlanError::Expression { field: "condition", .. })
        ));
    }

    #[test]
    fn test_optional_fields_absent() {
        let catalog = catalog();
        let value = json!({
            "#operator": "IndexScan", "index": "ix_age", "namespace": "default",
            "keyspace": "people", "spans": []
        });
        let Operator::IndexScan(scan) = Operator::from_json(&value, &catalog).unwrap() else {
            panic!("expected IndexScan");
        };
        assert!(!scan.distinct);
        assert!(scan.limit.is_none());
        assert!(scan.covers.is_empty());
        assert_eq!(scan.using(), IndexType::Gsi);
    }
}
