//! Boolean expressions over parameters, kept as data.
//!
//! Conditions are compiled into the rendered document and evaluated by the
//! provisioning backend at deploy time. Nothing here ever computes a truth
//! value; the renderer only checks that every condition a node names is
//! declared in the same template.

use super::value::Value;

/// Maximum operand count the backend accepts for `Fn::And` / `Fn::Or`.
pub const MAX_OPERANDS: usize = 10;

/// Minimum operand count for `Fn::And` / `Fn::Or`.
pub const MIN_OPERANDS: usize = 2;

/// A condition expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// All operands hold
    And(Vec<Condition>),
    /// Any operand holds
    Or(Vec<Condition>),
    /// Negation
    Not(Box<Condition>),
    /// Two values are equal
    Equals(Value, Value),
    /// Another named condition in the same template
    Named(String),
}

impl Condition {
    /// Conjunction of the given operands.
    pub fn and(operands: impl IntoIterator<Item = Condition>) -> Self {
        Self::And(operands.into_iter().collect())
    }

    /// Disjunction of the given operands.
    pub fn or(operands: impl IntoIterator<Item = Condition>) -> Self {
        Self::Or(operands.into_iter().collect())
    }

    /// Negation of `inner`.
    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Condition) -> Self {
        Self::Not(Box::new(inner))
    }

    /// Equality between two values.
    pub fn equals(left: impl Into<Value>, right: impl Into<Value>) -> Self {
        Self::Equals(left.into(), right.into())
    }

    /// Reference to another named condition.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Holds when `value` is not the empty string.
    pub fn is_set(value: impl Into<Value>) -> Self {
        Self::not(Self::equals(value, ""))
    }

    /// Names of every condition this expression refers to, depth first.
    pub fn named_conditions(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.walk(&mut |c| {
            if let Self::Named(name) = c {
                names.push(name.as_str());
            }
        });
        names
    }

    fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Condition)) {
        visit(self);
        match self {
            Self::And(operands) | Self::Or(operands) => {
                for operand in operands {
                    operand.walk(visit);
                }
            }
            Self::Not(inner) => inner.walk(visit),
            Self::Equals(..) | Self::Named(_) => {}
        }
    }
}
