//! Backend-neutral predicate trees.
//!
//! A [`ClauseBuilder`] is bound to one [`Schema`]. Every leaf is checked
//! when it is added: the field must exist and the operand must fit the
//! field's declared type. A finished [`ClauseTree`] is immutable and can be
//! reused for any number of queries against the same schema.
//!
//! ```rust,ignore
//! let mut builder = ClauseBuilder::new(HsmKey::schema());
//! builder
//!     .add_equals("policy_id", policy.id())?
//!     .add_comparison("bits", Comparator::GreaterOrEqual, 2048u32)?;
//! let tree = builder.build();
//! ```

use crate::error::{CoreError, CoreResult};
use crate::schema::{FieldType, Schema};
use kaspdb_value::{Value, ValueError};
use std::fmt;

/// Leaf comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterOrEqual,
    /// Field holds null.
    IsNull,
    /// Field holds a value.
    IsNotNull,
    /// Text field contains the operand as a substring.
    Contains,
}

impl Comparator {
    /// Returns the conventional symbol for this operator.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::LessOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterOrEqual => ">=",
            Self::IsNull => "is null",
            Self::IsNotNull => "is not null",
            Self::Contains => "contains",
        }
    }

    /// Returns true for `<`, `<=`, `>` and `>=`.
    #[must_use]
    pub const fn is_ordering(self) -> bool {
        matches!(
            self,
            Self::LessThan | Self::LessOrEqual | Self::GreaterThan | Self::GreaterOrEqual
        )
    }

    /// Returns true if the operator ignores its operand.
    #[must_use]
    pub const fn is_null_test(self) -> bool {
        matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Logical connective of an interior node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connective {
    /// All children hold.
    And,
    /// At least one child holds.
    Or,
    /// The single child does not hold.
    Not,
}

impl fmt::Display for Connective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => f.write_str("AND"),
            Self::Or => f.write_str("OR"),
            Self::Not => f.write_str("NOT"),
        }
    }
}

/// One node of a clause tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// Leaf comparison of one field against an operand.
    Compare {
        /// Field name (a declared field or the primary key).
        field: &'static str,
        /// Declared type of the field.
        field_type: FieldType,
        /// Operator.
        op: Comparator,
        /// Operand, already coerced to the field type. `Null` for null tests.
        operand: Value,
    },
    /// Interior node combining child clauses.
    Group {
        /// How the children combine.
        connective: Connective,
        /// Ordered children.
        children: Vec<Clause>,
    },
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::Compare { field, op, .. } if op.is_null_test() => write!(f, "{field} {op}"),
            Clause::Compare {
                field, op, operand, ..
            } => write!(f, "{field} {op} {operand}"),
            Clause::Group {
                connective: Connective::Not,
                children,
            } => {
                f.write_str("NOT ")?;
                children.iter().try_for_each(|c| write!(f, "({c})"))
            }
            Clause::Group {
                connective,
                children,
            } => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {connective} ")?;
                    }
                    write!(f, "({child})")?;
                }
                Ok(())
            }
        }
    }
}

/// A finished predicate bound to one schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClauseTree {
    schema: &'static Schema,
    root: Option<Clause>,
}

impl ClauseTree {
    /// A tree matching every record of the schema.
    #[must_use]
    pub fn all(schema: &'static Schema) -> Self {
        Self { schema, root: None }
    }

    /// A tree matching the record with the given primary key.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` cannot be a key.
    pub fn by_id(schema: &'static Schema, id: impl Into<Value>) -> CoreResult<Self> {
        let mut builder = ClauseBuilder::new(schema);
        builder.add_equals(Schema::PRIMARY_KEY, id)?;
        Ok(builder.build())
    }

    /// Returns the schema this tree was built for.
    #[must_use]
    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    /// Returns the root node, `None` for a tree matching everything.
    #[must_use]
    pub fn root(&self) -> Option<&Clause> {
        self.root.as_ref()
    }

    /// Returns true if the tree has no predicate.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Checks that the tree was built for `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] for a tree of another schema.
    pub fn ensure_schema(&self, schema: &Schema) -> CoreResult<()> {
        if self.schema.name() == schema.name() {
            Ok(())
        } else {
            Err(CoreError::invalid_operation(format!(
                "clause built for {} used with {}",
                self.schema.name(),
                schema.name()
            )))
        }
    }
}

impl fmt::Display for ClauseTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.root {
            Some(root) => write!(f, "{root}"),
            None => f.write_str("<all>"),
        }
    }
}

/// Incremental, validating builder for [`ClauseTree`].
///
/// Clauses added at top level are combined with AND.
#[derive(Debug, Clone)]
pub struct ClauseBuilder {
    schema: &'static Schema,
    clauses: Vec<Clause>,
}

impl ClauseBuilder {
    /// Starts an empty tree for `schema`.
    #[must_use]
    pub fn new(schema: &'static Schema) -> Self {
        Self {
            schema,
            clauses: Vec::new(),
        }
    }

    /// Builds a validated leaf without adding it, for use inside connectives.
    ///
    /// Comparing with null is rewritten: `= null` becomes [`Comparator::IsNull`]
    /// and `!= null` becomes [`Comparator::IsNotNull`].
    ///
    /// # Errors
    ///
    /// [`CoreError::UnknownField`] for an undeclared field,
    /// [`CoreError::FieldKindMismatch`] or [`CoreError::InvalidEnumText`] for
    /// an operand that does not fit the field, [`CoreError::InvalidOperation`]
    /// for ordering against null.
    pub fn leaf(&self, field: &str, op: Comparator, operand: impl Into<Value>) -> CoreResult<Clause> {
        let (field, field_type) = self.schema.resolve(field)?;
        let operand = operand.into();

        let op = match (op, &operand) {
            (op, _) if op.is_null_test() => op,
            (_, Value::Unset) => return Err(ValueError::NotSet.into()),
            (Comparator::Equal, Value::Null) => Comparator::IsNull,
            (Comparator::NotEqual, Value::Null) => Comparator::IsNotNull,
            (op, Value::Null) => {
                return Err(CoreError::invalid_operation(format!(
                    "{field} {op} null has no meaning"
                )));
            }
            (op, _) => op,
        };
        if op.is_null_test() {
            return Ok(Clause::Compare {
                field,
                field_type,
                op,
                operand: Value::Null,
            });
        }

        let operand = self.coerce_operand(field, field_type, op, operand)?;
        Ok(Clause::Compare {
            field,
            field_type,
            op,
            operand,
        })
    }

    /// Builds a validated interior node without adding it.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidOperation`] if `Not` does not have exactly one
    /// child or `And`/`Or` have none; any leaf error for children that do
    /// not belong to this schema.
    pub fn group(&self, connective: Connective, children: Vec<Clause>) -> CoreResult<Clause> {
        match (connective, children.len()) {
            (Connective::Not, 1) => {}
            (Connective::Not, n) => {
                return Err(CoreError::invalid_operation(format!(
                    "NOT takes exactly one clause, got {n}"
                )));
            }
            (_, 0) => {
                return Err(CoreError::invalid_operation(format!(
                    "{connective} needs at least one clause"
                )));
            }
            _ => {}
        }
        children.iter().try_for_each(|child| self.check(child))?;
        Ok(Clause::Group {
            connective,
            children,
        })
    }

    /// Adds `field = value`.
    ///
    /// # Errors
    ///
    /// See [`ClauseBuilder::leaf`].
    pub fn add_equals(&mut self, field: &str, value: impl Into<Value>) -> CoreResult<&mut Self> {
        self.add_comparison(field, Comparator::Equal, value)
    }

    /// Adds `field <op> value`.
    ///
    /// # Errors
    ///
    /// See [`ClauseBuilder::leaf`].
    pub fn add_comparison(
        &mut self,
        field: &str,
        op: Comparator,
        value: impl Into<Value>,
    ) -> CoreResult<&mut Self> {
        let clause = self.leaf(field, op, value)?;
        self.clauses.push(clause);
        Ok(self)
    }

    /// Adds a connective over the given children.
    ///
    /// # Errors
    ///
    /// See [`ClauseBuilder::group`].
    pub fn add_connective(
        &mut self,
        connective: Connective,
        children: Vec<Clause>,
    ) -> CoreResult<&mut Self> {
        let clause = self.group(connective, children)?;
        self.clauses.push(clause);
        Ok(self)
    }

    /// Finishes the tree.
    #[must_use]
    pub fn build(mut self) -> ClauseTree {
        let root = match self.clauses.len() {
            0 => None,
            1 => self.clauses.pop(),
            _ => Some(Clause::Group {
                connective: Connective::And,
                children: self.clauses,
            }),
        };
        ClauseTree {
            schema: self.schema,
            root,
        }
    }

    fn coerce_operand(
        &self,
        field: &'static str,
        field_type: FieldType,
        op: Comparator,
        operand: Value,
    ) -> CoreResult<Value> {
        let actual = operand.kind();
        let mismatch = |expected: String| CoreError::FieldKindMismatch {
            entity: self.schema.name(),
            field: field.to_string(),
            expected,
            actual,
        };

        if op == Comparator::Contains {
            return match (field_type, operand) {
                (FieldType::Text, operand @ Value::Text(_)) => Ok(operand),
                _ => Err(mismatch("text for contains".to_string())),
            };
        }
        if let (FieldType::Enum(set), Value::Text(text)) = (field_type, &operand) {
            return Ok(Value::Enum(set.value_of_text(text)?));
        }
        field_type
            .coerce(operand)
            .ok_or_else(|| mismatch(field_type.to_string()))
    }

    fn check(&self, clause: &Clause) -> CoreResult<()> {
        match clause {
            Clause::Compare {
                field, op, operand, ..
            } => {
                if self.leaf(field, *op, operand.clone())? != *clause {
                    return Err(CoreError::invalid_operation(format!(
                        "clause {clause} does not match schema {}",
                        self.schema.name()
                    )));
                }
                Ok(())
            }
            Clause::Group {
                connective,
                children,
            } => self.group(*connective, children.clone()).map(|_| ()),
        }
    }
}
