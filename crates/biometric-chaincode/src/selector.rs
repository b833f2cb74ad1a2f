//! JSON selector queries over world-state documents.
//!
//! Accepts the Mango-style dialect the peer's state database understands:
//! `{"selector": {...}, "limit": n, "skip": n}`. Selectors are compiled once
//! and evaluated per document. Values that are not JSON never match.

use crate::stub::StubError;
use serde_json::{Map, Value};
use std::cmp::Ordering;

#[derive(Clone, Debug, PartialEq)]
enum Condition {
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
    Field { path: Vec<String>, op: FieldOp },
}

#[derive(Clone, Debug, PartialEq)]
enum FieldOp {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    Exists(bool),
    In(Vec<Value>),
    Nin(Vec<Value>),
}

/// A parsed rich query.
#[derive(Clone, Debug, PartialEq)]
pub struct RichQuery {
    condition: Condition,
    limit: Option<usize>,
    skip: usize,
}

impl RichQuery {
    pub fn parse(raw: &str) -> Result<Self, StubError> {
        let doc: Value = serde_json::from_str(raw)
            .map_err(|e| StubError::InvalidQuery(format!("query is not JSON: {e}")))?;
        let obj = doc
            .as_object()
            .ok_or_else(|| invalid("query must be a JSON object"))?;

        let selector = obj
            .get("selector")
            .ok_or_else(|| invalid("missing selector"))?
            .as_object()
            .ok_or_else(|| invalid("selector must be an object"))?;

        Ok(Self {
            condition: compile_selector(selector)?,
            limit: count_field(obj, "limit")?,
            skip: count_field(obj, "skip")?.unwrap_or(0),
        })
    }

    pub fn matches(&self, doc: &Value) -> bool {
        eval(&self.condition, doc)
    }

    /// Match raw stored bytes; anything that is not JSON is skipped.
    pub fn matches_bytes(&self, raw: &[u8]) -> bool {
        serde_json::from_slice::<Value>(raw)
            .map(|doc| self.matches(&doc))
            .unwrap_or(false)
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn skip(&self) -> usize {
        self.skip
    }
}

fn invalid(msg: impl Into<String>) -> StubError {
    StubError::InvalidQuery(msg.into())
}

fn count_field(obj: &Map<String, Value>, name: &str) -> Result<Option<usize>, StubError> {
    match obj.get(name) {
        None => Ok(None),
        Some(v) => v
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| invalid(format!("{name} must be a non-negative integer"))),
    }
}

fn compile_selector(obj: &Map<String, Value>) -> Result<Condition, StubError> {
    let mut parts = Vec::with_capacity(obj.len());
    for (key, value) in obj {
        if let Some(op) = key.strip_prefix('$') {
            parts.push(compile_combinator(op, value)?);
        } else {
            let path = key.split('.').map(str::to_string).collect();
            parts.push(compile_field(path, value)?);
        }
    }
    Ok(flatten(parts))
}

fn compile_combinator(op: &str, value: &Value) -> Result<Condition, StubError> {
    match op {
        "and" | "or" => {
            let items = value
                .as_array()
                .ok_or_else(|| invalid(format!("${op} expects an array")))?;
            let mut conds = Vec::with_capacity(items.len());
            for item in items {
                let sub = item
                    .as_object()
                    .ok_or_else(|| invalid(format!("${op} items must be objects")))?;
                conds.push(compile_selector(sub)?);
            }
            Ok(if op == "and" {
                Condition::And(conds)
            } else {
                Condition::Or(conds)
            })
        }
        "not" => {
            let sub = value
                .as_object()
                .ok_or_else(|| invalid("$not expects an object"))?;
            Ok(Condition::Not(Box::new(compile_selector(sub)?)))
        }
        other => Err(invalid(format!("unsupported operator ${other}"))),
    }
}

fn compile_field(path: Vec<String>, value: &Value) -> Result<Condition, StubError> {
    let obj = match value {
        Value::Object(obj) if !obj.is_empty() => obj,
        other => {
            return Ok(Condition::Field {
                path,
                op: FieldOp::Eq(other.clone()),
            })
        }
    };

    let mut parts = Vec::with_capacity(obj.len());
    for (key, arg) in obj {
        let Some(op) = key.strip_prefix('$') else {
            // Nested field: {"a": {"b": 1}} is a.b == 1.
            let mut nested = path.clone();
            nested.push(key.clone());
            parts.push(compile_field(nested, arg)?);
            continue;
        };
        let op = match op {
            "eq" => FieldOp::Eq(arg.clone()),
            "ne" => FieldOp::Ne(arg.clone()),
            "gt" => FieldOp::Gt(arg.clone()),
            "gte" => FieldOp::Gte(arg.clone()),
            "lt" => FieldOp::Lt(arg.clone()),
            "lte" => FieldOp::Lte(arg.clone()),
            "exists" => FieldOp::Exists(
                arg.as_bool()
                    .ok_or_else(|| invalid("$exists expects a boolean"))?,
            ),
            "in" => FieldOp::In(array_arg("$in", arg)?),
            "nin" => FieldOp::Nin(array_arg("$nin", arg)?),
            "not" => {
                parts.push(Condition::Not(Box::new(compile_field(path.clone(), arg)?)));
                continue;
            }
            other => return Err(invalid(format!("unsupported operator ${other}"))),
        };
        parts.push(Condition::Field {
            path: path.clone(),
            op,
        });
    }
    Ok(flatten(parts))
}

fn array_arg(op: &str, arg: &Value) -> Result<Vec<Value>, StubError> {
    arg.as_array()
        .cloned()
        .ok_or_else(|| invalid(format!("{op} expects an array")))
}

fn flatten(mut parts: Vec<Condition>) -> Condition {
    if parts.len() == 1 {
        parts.remove(0)
    } else {
        Condition::And(parts)
    }
}

fn lookup<'d>(doc: &'d Value, path: &[String]) -> Option<&'d Value> {
    path.iter().try_fold(doc, |cur, seg| cur.as_object()?.get(seg))
}

fn eval(cond: &Condition, doc: &Value) -> bool {
    match cond {
        Condition::And(parts) => parts.iter().all(|c| eval(c, doc)),
        Condition::Or(parts) => parts.iter().any(|c| eval(c, doc)),
        Condition::Not(inner) => !eval(inner, doc),
        Condition::Field { path, op } => {
            let found = lookup(doc, path);
            match (op, found) {
                (FieldOp::Exists(want), v) => v.is_some() == *want,
                (_, None) => false,
                (FieldOp::Eq(x), Some(v)) => values_equal(v, x),
                (FieldOp::Ne(x), Some(v)) => !values_equal(v, x),
                (FieldOp::Gt(x), Some(v)) => compare(v, x) == Some(Ordering::Greater),
                (FieldOp::Gte(x), Some(v)) => matches!(
                    compare(v, x),
                    Some(Ordering::Greater | Ordering::Equal)
                ),
                (FieldOp::Lt(x), Some(v)) => compare(v, x) == Some(Ordering::Less),
                (FieldOp::Lte(x), Some(v)) => {
                    matches!(compare(v, x), Some(Ordering::Less | Ordering::Equal))
                }
                (FieldOp::In(xs), Some(v)) => xs.iter().any(|x| values_equal(v, x)),
                (FieldOp::Nin(xs), Some(v)) => !xs.iter().any(|x| values_equal(v, x)),
            }
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

/// Ordering only within one JSON type; mixed types are incomparable.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn q(raw: &str) -> RichQuery {
        RichQuery::parse(raw).unwrap()
    }

    #[test]
    fn test_implicit_equality() {
        let query = q(r#"{"selector":{"KeyBiometric":"u42_facial_Veridas"}}"#);
        assert!(query.matches(&json!({"KeyBiometric":"u42_facial_Veridas","Token":"t1"})));
        assert!(!query.matches(&json!({"KeyBiometric":"u43_facial_Veridas"})));
        assert!(!query.matches(&json!({"Token":"t1"})));
    }

    #[test]
    fn test_range_operators_on_strings_and_numbers() {
        let query = q(r#"{"selector":{"ExpiredDate":{"$gte":"2026-01-01","$lt":"2027-01-01"}}}"#);
        assert!(query.matches(&json!({"ExpiredDate":"2026-06-30"})));
        assert!(!query.matches(&json!({"ExpiredDate":"2027-01-01"})));

        let query = q(r#"{"selector":{"score":{"$gt":1}}}"#);
        assert!(query.matches(&json!({"score":1.5})));
        assert!(!query.matches(&json!({"score":"2"})));
    }

    #[test]
    fn test_combinators_and_membership() {
        let query = q(r#"{"selector":{"$or":[
            {"ProviderBiometric":{"$in":["Veridas","Facephi"]}},
            {"$and":[{"ProviderBiometric":"Local"},{"TypeBiometric":{"$ne":"voice"}}]}
        ]}}"#);
        assert!(query.matches(&json!({"ProviderBiometric":"Facephi"})));
        assert!(query.matches(&json!({"ProviderBiometric":"Local","TypeBiometric":"facial"})));
        assert!(!query.matches(&json!({"ProviderBiometric":"Local","TypeBiometric":"voice"})));

        let query = q(r#"{"selector":{"$not":{"TypeBiometric":"voice"}}}"#);
        assert!(query.matches(&json!({"TypeBiometric":"facial"})));
        assert!(!query.matches(&json!({"TypeBiometric":"voice"})));
    }

    #[test]
    fn test_exists_and_nested_paths() {
        let query = q(r#"{"selector":{"meta.device":{"$exists":true},"meta":{"rev":2}}}"#);
        assert!(query.matches(&json!({"meta":{"device":"x","rev":2}})));
        assert!(!query.matches(&json!({"meta":{"rev":2}})));

        let query = q(r#"{"selector":{"ActivationDate":{"$exists":false}}}"#);
        assert!(query.matches(&json!({"Token":"t"})));
    }

    #[test]
    fn test_non_json_values_never_match() {
        let query = q(r#"{"selector":{}}"#);
        assert!(query.matches_bytes(br#"{"a":1}"#));
        assert!(!query.matches_bytes(b"\x00raw"));
    }

    #[test]
    fn test_limit_and_skip() {
        let query = q(r#"{"selector":{},"limit":2,"skip":1}"#);
        assert_eq!(query.limit(), Some(2));
        assert_eq!(query.skip(), 1);
    }

    #[test]
    fn test_rejects_malformed_queries() {
        for raw in [
            "not json",
            "[]",
            r#"{"limit":1}"#,
            r#"{"selector":"Token"}"#,
            r#"{"selector":{"Token":{"$regex":"^t"}}}"#,
            r#"{"selector":{"$nor":[]}}"#,
            r#"{"selector":{"Token":{"$in":"t1"}}}"#,
            r#"{"selector":{},"limit":-1}"#,
        ] {
            assert!(
                matches!(RichQuery::parse(raw), Err(StubError::InvalidQuery(_))),
                "accepted {raw}"
            );
        }
    }
}
