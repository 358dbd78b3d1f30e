use serde_json::{Map, Value};
use tracing::{debug, trace};

use super::condition::{Condition, Strategy};
use crate::error::RuleError;
use crate::model::Params;
use crate::model::action::{id_from_value, new_id};

/// A named predicate over a context map.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub condition: Condition,
    pub strategy: Strategy,
    pub priority: i64,
    pub enabled: bool,
    pub meta: Params,
}

impl Rule {
    pub fn new(id: impl Into<String>, condition: Condition) -> Self {
        Self {
            id: id.into(),
            condition,
            strategy: Strategy::All,
            priority: 0,
            enabled: true,
            meta: Params::new(),
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Parse a rule descriptor.
    ///
    /// `condition` (or its alias `conditions`) is required and must be truthy;
    /// `id` is generated when absent.
    pub fn from_value(value: &Value) -> Result<Self, RuleError> {
        let obj = value.as_object().ok_or(RuleError::NotAnObject)?;
        let raw = [obj.get("condition"), obj.get("conditions")]
            .into_iter()
            .flatten()
            .find(|v| is_truthy(v))
            .ok_or(RuleError::MissingCondition)?;
        let condition = Condition::from_value(raw)?;

        let id = obj.get("id").and_then(id_from_value).unwrap_or_else(new_id);
        let strategy = match obj.get("strategy") {
            None | Some(Value::Null) => Strategy::All,
            Some(Value::String(s)) => Strategy::parse(s),
            Some(_) => return Err(RuleError::InvalidField("strategy")),
        };
        let priority = match obj.get("priority") {
            None | Some(Value::Null) => 0,
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
                .ok_or(RuleError::InvalidField("priority"))?,
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map_err(|_| RuleError::InvalidField("priority"))?,
            Some(_) => return Err(RuleError::InvalidField("priority")),
        };
        let enabled = obj.get("enabled").map_or(true, is_truthy);
        let meta = obj
            .get("meta")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        Ok(Self {
            id,
            condition,
            strategy,
            priority,
            enabled,
            meta,
        })
    }

    /// A rule matches iff it is enabled and its condition holds.
    pub fn matches(&self, context: &Params) -> bool {
        self.enabled && self.condition.evaluate(context, self.strategy)
    }

    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("id".into(), Value::String(self.id.clone()));
        obj.insert("condition".into(), self.condition.to_value());
        obj.insert("strategy".into(), Value::String(self.strategy.as_str().into()));
        obj.insert("priority".into(), Value::from(self.priority));
        obj.insert("enabled".into(), Value::Bool(self.enabled));
        obj.insert("meta".into(), Value::Object(self.meta.clone()));
        Value::Object(obj)
    }
}

/// Owns a set of rules and evaluates them on demand.
#[derive(Debug, Default, Clone)]
pub struct RuleEngine {
    rules: Vec<Rule>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and add a rule descriptor, returning the stored rule.
    pub fn add_rule(&mut self, descriptor: &Value) -> Result<&Rule, RuleError> {
        let rule = Rule::from_value(descriptor)?;
        Ok(self.add(rule))
    }

    /// Add an already-built rule.
    pub fn add(&mut self, rule: Rule) -> &Rule {
        debug!(target: "autotool::rules", id = %rule.id, priority = rule.priority, "Rule added");
        self.rules.push(rule);
        let last = self.rules.len() - 1;
        &self.rules[last]
    }

    /// Remove every rule with the given id; returns whether any was removed.
    pub fn remove_rule(&mut self, rule_id: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.id != rule_id);
        before != self.rules.len()
    }

    /// Matching rules, ordered by descending priority then ascending id.
    pub fn evaluate(&self, context: &Params) -> Vec<&Rule> {
        let mut matches: Vec<&Rule> = self.rules.iter().filter(|r| r.matches(context)).collect();
        matches.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        trace!(target: "autotool::rules", matched = matches.len(), total = self.rules.len(), "Rules evaluated");
        matches
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Truthiness of a descriptor flag: null, false, zero and empty values are false.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
