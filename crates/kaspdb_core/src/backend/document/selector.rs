//! Mango-style selectors and their evaluation.
//!
//! Evaluation is three-valued: a comparison against a missing or null field
//! is unknown rather than false, `NOT unknown` stays unknown, and only
//! documents whose selector is definitely true match. This gives the same
//! row sets as SQL `WHERE` evaluation on the relational backend.

use crate::clause::{Clause, ClauseTree, Comparator, Connective};
use crate::error::{CoreError, CoreResult};
use crate::schema::{FieldType, Schema};
use kaspdb_value::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Field comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectorOp {
    /// `$eq`
    Eq,
    /// `$ne`
    Ne,
    /// `$lt`
    Lt,
    /// `$lte`
    Lte,
    /// `$gt`
    Gt,
    /// `$gte`
    Gte,
}

impl SelectorOp {
    fn from_comparator(op: Comparator) -> Option<Self> {
        match op {
            Comparator::Equal => Some(Self::Eq),
            Comparator::NotEqual => Some(Self::Ne),
            Comparator::LessThan => Some(Self::Lt),
            Comparator::LessOrEqual => Some(Self::Lte),
            Comparator::GreaterThan => Some(Self::Gt),
            Comparator::GreaterOrEqual => Some(Self::Gte),
            Comparator::IsNull | Comparator::IsNotNull | Comparator::Contains => None,
        }
    }

    /// Returns the Mango operator name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Ne => "$ne",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Lte => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Gte => ordering != Ordering::Less,
        }
    }
}

/// A document-store query predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Matches every document.
    All,
    /// Compares a field with a native operand.
    Field {
        /// Field name, `_id` for the document id.
        field: String,
        /// Operator.
        op: SelectorOp,
        /// Operand in document-native representation.
        operand: Value,
    },
    /// Field is missing or null.
    IsNull(String),
    /// Field holds a value.
    IsNotNull(String),
    /// `$and`
    And(Vec<Selector>),
    /// `$or`
    Or(Vec<Selector>),
    /// `$not`
    Not(Box<Selector>),
}

/// Field name under which document ids are addressed.
pub const ID_FIELD: &str = "_id";

impl Selector {
    /// Translates a clause tree.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedPredicate`] for substring matches and
    /// for ordering comparisons on enumeration fields, which are stored as
    /// text and would not order by code.
    pub fn from_tree(backend: &'static str, tree: &ClauseTree) -> CoreResult<Self> {
        tree.root()
            .map_or(Ok(Self::All), |root| Self::from_clause(backend, root))
    }

    fn from_clause(backend: &'static str, clause: &Clause) -> CoreResult<Self> {
        match clause {
            Clause::Compare {
                field,
                field_type,
                op,
                operand,
            } => {
                let name = if *field == Schema::PRIMARY_KEY {
                    ID_FIELD.to_string()
                } else {
                    (*field).to_string()
                };
                match op {
                    Comparator::IsNull => Ok(Self::IsNull(name)),
                    Comparator::IsNotNull => Ok(Self::IsNotNull(name)),
                    Comparator::Contains => {
                        Err(CoreError::unsupported_predicate(backend, clause.to_string()))
                    }
                    op if op.is_ordering() && matches!(field_type, FieldType::Enum(_)) => {
                        Err(CoreError::unsupported_predicate(backend, clause.to_string()))
                    }
                    op => SelectorOp::from_comparator(*op)
                        .map(|op| Self::Field {
                            field: name,
                            op,
                            operand: native(operand),
                        })
                        .ok_or_else(|| {
                            CoreError::unsupported_predicate(backend, clause.to_string())
                        }),
                }
            }
            Clause::Group {
                connective,
                children,
            } => {
                let mut children = children
                    .iter()
                    .map(|c| Self::from_clause(backend, c))
                    .collect::<CoreResult<Vec<_>>>()?;
                match connective {
                    Connective::And => Ok(Self::And(children)),
                    Connective::Or => Ok(Self::Or(children)),
                    Connective::Not => children
                        .pop()
                        .map(|child| Self::Not(Box::new(child)))
                        .ok_or_else(|| CoreError::invalid_operation("NOT without a clause")),
                }
            }
        }
    }

    /// Returns true if the document definitely satisfies the selector.
    #[must_use]
    pub fn matches(&self, id: &str, body: &BTreeMap<String, Value>) -> bool {
        self.evaluate(id, body) == Some(true)
    }

    /// Three-valued evaluation; `None` is unknown.
    #[must_use]
    pub fn evaluate(&self, id: &str, body: &BTreeMap<String, Value>) -> Option<bool> {
        let lookup = |field: &str| -> Option<Value> {
            if field == ID_FIELD {
                return Some(Value::Text(id.to_string()));
            }
            match body.get(field) {
                None | Some(Value::Null | Value::Unset) => None,
                Some(value) => Some(value.clone()),
            }
        };
        match self {
            Self::All => Some(true),
            Self::Field { field, op, operand } => {
                lookup(field).map(|value| op.holds(compare_native(&value, operand)))
            }
            Self::IsNull(field) => Some(lookup(field).is_none()),
            Self::IsNotNull(field) => Some(lookup(field).is_some()),
            Self::And(children) => {
                let mut result = Some(true);
                for child in children {
                    match child.evaluate(id, body) {
                        Some(false) => return Some(false),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                result
            }
            Self::Or(children) => {
                let mut result = Some(false);
                for child in children {
                    match child.evaluate(id, body) {
                        Some(true) => return Some(true),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                result
            }
            Self::Not(child) => child.evaluate(id, body).map(|b| !b),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, name: &str, children: &[Selector]) -> fmt::Result {
            write!(f, "{{\"{name}\": [")?;
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{child}")?;
            }
            f.write_str("]}")
        }

        match self {
            Self::All => f.write_str("{}"),
            Self::Field { field, op, operand } => {
                write!(f, "{{\"{field}\": {{\"{}\": {operand}}}}}", op.name())
            }
            Self::IsNull(field) => write!(f, "{{\"{field}\": {{\"$eq\": null}}}}"),
            Self::IsNotNull(field) => write!(f, "{{\"{field}\": {{\"$ne\": null}}}}"),
            Self::And(children) => list(f, "$and", children),
            Self::Or(children) => list(f, "$or", children),
            Self::Not(child) => write!(f, "{{\"$not\": {child}}}"),
        }
    }
}

/// Converts a value to the representation stored in documents: integers
/// widen to 64 bits and enumeration members become their text.
#[must_use]
pub fn native(value: &Value) -> Value {
    match value {
        Value::Int32(n) => Value::Int64(i64::from(*n)),
        Value::UInt32(n) => Value::Int64(i64::from(*n)),
        Value::UInt64(n) => i64::try_from(*n).map_or(Value::UInt64(*n), Value::Int64),
        Value::Enum(e) => Value::Text(e.text.clone()),
        other => other.clone(),
    }
}

/// Integers compare numerically across kinds; everything else by value order.
fn compare_native(a: &Value, b: &Value) -> Ordering {
    fn wide(v: &Value) -> Option<i128> {
        match v {
            Value::Int32(n) => Some(i128::from(*n)),
            Value::UInt32(n) => Some(i128::from(*n)),
            Value::Int64(n) => Some(i128::from(*n)),
            Value::UInt64(n) => Some(i128::from(*n)),
            _ => None,
        }
    }
    match (wide(a), wide(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}
