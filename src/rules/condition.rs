use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::error::RuleError;
use crate::model::Params;

/// Host-supplied predicate over a context map.
pub type Predicate = Arc<dyn Fn(&Params) -> bool + Send + Sync>;

/// How a plain condition list combines its children.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Strategy {
    #[default]
    All,
    Any,
}

impl Strategy {
    /// `"any"` (case-insensitive) selects `Any`; everything else is `All`.
    pub fn parse(name: &str) -> Self {
        if name.eq_ignore_ascii_case("any") {
            Strategy::Any
        } else {
            Strategy::All
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::All => "all",
            Strategy::Any => "any",
        }
    }
}

/// Comparison operator of a `{key, op, value}` leaf.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    In,
    NotIn,
}

impl Operator {
    pub fn parse(name: &str) -> Result<Self, RuleError> {
        Ok(match name.to_ascii_lowercase().as_str() {
            "eq" => Operator::Eq,
            "ne" => Operator::Ne,
            "gt" => Operator::Gt,
            "gte" => Operator::Gte,
            "lt" => Operator::Lt,
            "lte" => Operator::Lte,
            "contains" => Operator::Contains,
            "in" => Operator::In,
            "not_in" => Operator::NotIn,
            _ => return Err(RuleError::UnknownOperator(name.to_string())),
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Contains => "contains",
            Operator::In => "in",
            Operator::NotIn => "not_in",
        }
    }
}

/// A predicate tree.
#[derive(Clone)]
pub enum Condition {
    /// Host predicate, invoked directly.
    Callable(Predicate),
    /// Single `{key, op, value}` comparison.
    Leaf {
        key: String,
        op: Operator,
        value: Value,
    },
    /// Flat map: every entry must equal the context value under the same key.
    Equality(Params),
    /// `{any: [...]}`: at least one child holds.
    Any(Vec<Condition>),
    /// `{all: [...]}`: every child holds.
    All(Vec<Condition>),
    /// Plain list, combined with the owning rule's strategy.
    List(Vec<Condition>),
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Callable(_) => f.write_str("Callable(..)"),
            Condition::Leaf { key, op, value } => f
                .debug_struct("Leaf")
                .field("key", key)
                .field("op", op)
                .field("value", value)
                .finish(),
            Condition::Equality(map) => f.debug_tuple("Equality").field(map).finish(),
            Condition::Any(c) => f.debug_tuple("Any").field(c).finish(),
            Condition::All(c) => f.debug_tuple("All").field(c).finish(),
            Condition::List(c) => f.debug_tuple("List").field(c).finish(),
        }
    }
}

impl Condition {
    pub fn callable<F>(f: F) -> Self
    where
        F: Fn(&Params) -> bool + Send + Sync + 'static,
    {
        Condition::Callable(Arc::new(f))
    }

    pub fn leaf(key: impl Into<String>, op: Operator, value: Value) -> Self {
        Condition::Leaf {
            key: key.into(),
            op,
            value,
        }
    }

    /// Parse the JSON form of a predicate tree.
    ///
    /// Object keys are checked in order `any`, `all`, `key`; any other object is
    /// an equality map. Arrays become strategy-combined lists.
    pub fn from_value(value: &Value) -> Result<Self, RuleError> {
        match value {
            Value::Object(obj) => {
                if let Some(children) = obj.get("any") {
                    return Ok(Condition::Any(parse_children(children, "any")?));
                }
                if let Some(children) = obj.get("all") {
                    return Ok(Condition::All(parse_children(children, "all")?));
                }
                if let Some(key) = obj.get("key") {
                    let key = match key {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    let op = match obj.get("op") {
                        None | Some(Value::Null) => Operator::Eq,
                        Some(Value::String(s)) => Operator::parse(s)?,
                        Some(other) => return Err(RuleError::UnknownOperator(other.to_string())),
                    };
                    let value = obj.get("value").cloned().unwrap_or(Value::Null);
                    return Ok(Condition::Leaf { key, op, value });
                }
                Ok(Condition::Equality(obj.clone()))
            }
            Value::Array(items) => Ok(Condition::List(
                items
                    .iter()
                    .map(Condition::from_value)
                    .collect::<Result<_, _>>()?,
            )),
            other => Err(RuleError::InvalidCondition(other.to_string())),
        }
    }

    /// Evaluate against `context`. Children of combinators are evaluated with
    /// `All` semantics for nested plain lists.
    pub fn evaluate(&self, context: &Params, strategy: Strategy) -> bool {
        match self {
            Condition::Callable(f) => f(context),
            Condition::Any(children) => children
                .iter()
                .any(|c| c.evaluate(context, Strategy::All)),
            Condition::All(children) => children
                .iter()
                .all(|c| c.evaluate(context, Strategy::All)),
            Condition::List(children) => match strategy {
                Strategy::Any => children
                    .iter()
                    .any(|c| c.evaluate(context, Strategy::All)),
                Strategy::All => children
                    .iter()
                    .all(|c| c.evaluate(context, Strategy::All)),
            },
            Condition::Equality(expected) => expected
                .iter()
                .all(|(k, v)| values_equal(context.get(k).unwrap_or(&Value::Null), v)),
            Condition::Leaf { key, op, value } => evaluate_leaf(context.get(key), *op, value),
        }
    }

    /// JSON form; callables render as the string `"<callable>"`.
    pub fn to_value(&self) -> Value {
        match self {
            Condition::Callable(_) => Value::String("<callable>".into()),
            Condition::Leaf { key, op, value } => {
                let mut obj = Map::new();
                obj.insert("key".into(), Value::String(key.clone()));
                obj.insert("op".into(), Value::String(op.as_str().into()));
                obj.insert("value".into(), value.clone());
                Value::Object(obj)
            }
            Condition::Equality(map) => Value::Object(map.clone()),
            Condition::Any(c) => wrap("any", c),
            Condition::All(c) => wrap("all", c),
            Condition::List(c) => Value::Array(c.iter().map(Condition::to_value).collect()),
        }
    }
}

fn wrap(name: &str, children: &[Condition]) -> Value {
    let mut obj = Map::new();
    obj.insert(
        name.into(),
        Value::Array(children.iter().map(Condition::to_value).collect()),
    );
    Value::Object(obj)
}

fn parse_children(value: &Value, name: &str) -> Result<Vec<Condition>, RuleError> {
    value
        .as_array()
        .ok_or_else(|| RuleError::InvalidCondition(format!("'{name}' must be a list")))?
        .iter()
        .map(Condition::from_value)
        .collect()
}

fn evaluate_leaf(actual: Option<&Value>, op: Operator, expected: &Value) -> bool {
    let actual = actual.filter(|v| !v.is_null());
    match op {
        Operator::Eq => values_equal(actual.unwrap_or(&Value::Null), expected),
        Operator::Ne => !values_equal(actual.unwrap_or(&Value::Null), expected),
        Operator::Gt => compare(actual, expected) == Some(Ordering::Greater),
        Operator::Gte => matches!(
            compare(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::Lt => compare(actual, expected) == Some(Ordering::Less),
        Operator::Lte => matches!(
            compare(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Operator::Contains => match actual {
            Some(container) => membership(expected, container).unwrap_or(false),
            None => false,
        },
        Operator::In => {
            if expected.is_null() {
                return false;
            }
            membership(actual.unwrap_or(&Value::Null), expected).unwrap_or(false)
        }
        Operator::NotIn => {
            if expected.is_null() {
                return false;
            }
            membership(actual.unwrap_or(&Value::Null), expected)
                .map(|found| !found)
                .unwrap_or(false)
        }
    }
}

/// Equality where numbers compare by value (`1 == 1.0`).
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Total order between like-typed scalars; `None` for missing or mixed types.
fn compare(actual: Option<&Value>, expected: &Value) -> Option<Ordering> {
    match (actual?, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Whether `needle` is a member of `container`; `None` when the question is
/// not meaningful for the pair of types.
fn membership(needle: &Value, container: &Value) -> Option<bool> {
    match container {
        Value::Array(items) => Some(items.iter().any(|item| values_equal(item, needle))),
        Value::String(haystack) => needle.as_str().map(|n| haystack.contains(n)),
        Value::Object(map) => needle.as_str().map(|n| map.contains_key(n)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(v: Value) -> Params {
        v.as_object().cloned().unwrap()
    }

    fn eval(cond: Value, context: Value) -> bool {
        Condition::from_value(&cond)
            .unwrap()
            .evaluate(&ctx(context), Strategy::All)
    }

    #[test]
    fn comparison_operators() {
        let c = json!({"n": 5, "s": "hello", "tags": ["a", "b"]});
        assert!(eval(json!({"key": "n", "op": "gt", "value": 4}), c.clone()));
        assert!(eval(json!({"key": "n", "op": "gte", "value": 5.0}), c.clone()));
        assert!(!eval(json!({"key": "n", "op": "lt", "value": 5}), c.clone()));
        assert!(eval(json!({"key": "n", "op": "lte", "value": 5}), c.clone()));
        assert!(eval(json!({"key": "n", "value": 5}), c.clone()));
        assert!(eval(json!({"key": "n", "op": "ne", "value": 6}), c.clone()));
        assert!(eval(json!({"key": "s", "op": "contains", "value": "ell"}), c.clone()));
        assert!(eval(json!({"key": "tags", "op": "contains", "value": "b"}), c.clone()));
        assert!(eval(json!({"key": "s", "op": "in", "value": ["hello", "x"]}), c.clone()));
        assert!(eval(json!({"key": "s", "op": "not_in", "value": ["x"]}), c.clone()));
    }

    #[test]
    fn missing_values_never_order_or_contain() {
        let c = json!({"n": null});
        assert!(!eval(json!({"key": "n", "op": "gt", "value": 1}), c.clone()));
        assert!(!eval(json!({"key": "missing", "op": "lte", "value": 1}), c.clone()));
        assert!(!eval(json!({"key": "missing", "op": "contains", "value": "a"}), c.clone()));
        assert!(!eval(json!({"key": "n", "op": "in"}), c.clone()));
        assert!(!eval(json!({"key": "n", "op": "not_in"}), c.clone()));
        assert!(eval(json!({"key": "missing", "op": "eq", "value": null}), c));
    }

    #[test]
    fn mixed_types_do_not_order() {
        assert!(!eval(json!({"key": "n", "op": "gt", "value": "1"}), json!({"n": 5})));
    }

    #[test]
    fn combinators_and_equality_maps() {
        let c = json!({"app": "editor", "mode": "insert", "count": 2});
        assert!(eval(json!({"app": "editor", "mode": "insert"}), c.clone()));
        assert!(!eval(json!({"app": "editor", "mode": "normal"}), c.clone()));
        assert!(eval(
            json!({"any": [{"app": "browser"}, {"key": "count", "op": "gte", "value": 2}]}),
            c.clone()
        ));
        assert!(!eval(
            json!({"all": [{"app": "editor"}, {"key": "count", "op": "gt", "value": 2}]}),
            c.clone()
        ));
        assert!(eval(json!({"all": [{"any": [{"mode": "x"}, {"mode": "insert"}]}]}), c));
    }

    #[test]
    fn plain_lists_follow_strategy() {
        let cond = Condition::from_value(&json!([{"a": 1}, {"b": 2}])).unwrap();
        let c = ctx(json!({"a": 1, "b": 3}));
        assert!(!cond.evaluate(&c, Strategy::All));
        assert!(cond.evaluate(&c, Strategy::Any));
    }

    #[test]
    fn callables_invoke_directly() {
        let cond = Condition::callable(|c| c.contains_key("ready"));
        assert!(cond.evaluate(&ctx(json!({"ready": true})), Strategy::All));
        assert!(!cond.evaluate(&ctx(json!({})), Strategy::All));
        assert_eq!(cond.to_value(), json!("<callable>"));
    }

    #[test]
    fn rejects_unknown_operator_and_scalars() {
        assert_eq!(
            Condition::from_value(&json!({"key": "a", "op": "matches"})).unwrap_err(),
            RuleError::UnknownOperator("matches".into())
        );
        assert!(Condition::from_value(&json!(42)).is_err());
        assert!(Condition::from_value(&json!({"any": 3})).is_err());
    }
}
