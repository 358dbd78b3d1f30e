//! Rule engine for conditional automation.
//!
//! A [`Rule`] pairs a predicate tree ([`Condition`]) with a priority; the
//! [`RuleEngine`] returns the enabled rules whose condition holds for a context,
//! ordered by descending priority and then ascending id so that rule application
//! is deterministic.

pub mod condition;
pub mod engine;

pub use condition::{Condition, Operator, Predicate, Strategy};
pub use engine::{Rule, RuleEngine};
