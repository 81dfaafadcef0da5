use std::fmt;
use std::ops::{BitAnd, BitOr, Not};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::data_type::DataType;
use crate::value::Value;

/// Whether a variable may hold the null value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nullity(bool);

pub const NULLABLE: Nullity = Nullity(true);

impl Nullity {
    pub const fn new(nullable: bool) -> Self {
        Nullity(nullable)
    }

    pub const fn nullable(self) -> bool {
        self.0
    }
}

impl Not for Nullity {
    type Output = Nullity;

    fn not(self) -> Nullity {
        Nullity(!self.0)
    }
}

impl BitAnd for Nullity {
    type Output = Nullity;

    fn bitand(self, other: Nullity) -> Nullity {
        Nullity(self.0 && other.0)
    }
}

impl BitOr for Nullity {
    type Output = Nullity;

    fn bitor(self, other: Nullity) -> Nullity {
        Nullity(self.0 || other.0)
    }
}

impl fmt::Display for Nullity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 {
            f.write_str("nullable")
        } else {
            f.write_str("not null")
        }
    }
}

/// Comparison operators usable inside variable predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

/// Quantifiers combining several predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantifier {
    All,
    Any,
}

/// A structured predicate describing an invariant of a variable.
///
/// The tree is finite and exclusively owned by its criteria; there are no
/// references back into the declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Comparison(Comparison),
    Negation(Box<Predicate>),
    Quantification(Quantification),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub operator: ComparisonOperator,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantification {
    pub quantifier: Quantifier,
    pub operands: Vec<Predicate>,
}

impl Predicate {
    pub fn comparison(operator: ComparisonOperator, value: Value) -> Self {
        Predicate::Comparison(Comparison { operator, value })
    }

    pub fn negation(operand: Predicate) -> Self {
        Predicate::Negation(Box::new(operand))
    }

    pub fn quantification(quantifier: Quantifier, operands: Vec<Predicate>) -> Self {
        Predicate::Quantification(Quantification {
            quantifier,
            operands,
        })
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Comparison(c) => {
                let op = match c.operator {
                    ComparisonOperator::Equal => "=",
                    ComparisonOperator::NotEqual => "<>",
                    ComparisonOperator::Less => "<",
                    ComparisonOperator::LessEqual => "<=",
                    ComparisonOperator::Greater => ">",
                    ComparisonOperator::GreaterEqual => ">=",
                };
                write!(f, "{} {}", op, c.value)
            }
            Predicate::Negation(operand) => write!(f, "not({operand})"),
            Predicate::Quantification(q) => {
                let name = match q.quantifier {
                    Quantifier::All => "all",
                    Quantifier::Any => "any",
                };
                write!(f, "{name}(")?;
                for (index, operand) in q.operands.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{operand}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Criteria of a variable declaration: its nullity plus an optional
/// structured predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criteria {
    nullity: Nullity,
    predicate: Option<Box<Predicate>>,
}

impl Criteria {
    pub fn new(nullity: Nullity, predicate: Option<Predicate>) -> Self {
        Criteria {
            nullity,
            predicate: predicate.map(Box::new),
        }
    }

    /// A criteria that pins the variable to a single constant value.
    pub fn constant(value: Value) -> Self {
        Criteria {
            nullity: Nullity::new(false),
            predicate: Some(Box::new(Predicate::comparison(
                ComparisonOperator::Equal,
                value,
            ))),
        }
    }

    pub fn nullity(&self) -> Nullity {
        self.nullity
    }

    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_deref()
    }

    /// The constant value of the variable, if its predicate pins one.
    pub fn constant_value(&self) -> Option<&Value> {
        match self.predicate.as_deref() {
            Some(Predicate::Comparison(Comparison {
                operator: ComparisonOperator::Equal,
                value,
            })) => Some(value),
            _ => None,
        }
    }
}

impl Default for Criteria {
    fn default() -> Self {
        Criteria {
            nullity: NULLABLE,
            predicate: None,
        }
    }
}

/// An external (host) variable declaration.
#[derive(Debug)]
pub struct VariableDeclaration {
    name: String,
    data_type: Arc<DataType>,
    criteria: Criteria,
}

impl VariableDeclaration {
    pub fn new(name: impl Into<String>, data_type: Arc<DataType>, criteria: Criteria) -> Self {
        VariableDeclaration {
            name: name.into(),
            data_type,
            criteria,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &Arc<DataType> {
        &self.data_type
    }

    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nullity_algebra() {
        let nullable = Nullity::new(true);
        let strict = Nullity::new(false);
        assert_eq!(!nullable, strict);
        assert_eq!(nullable & strict, strict);
        assert_eq!(nullable & nullable, nullable);
        assert_eq!(nullable | strict, nullable);
        assert_eq!(strict | strict, strict);
    }

    #[test]
    fn constant_criteria_expose_their_value() {
        let criteria = Criteria::constant(Value::Int4(42));
        assert!(!criteria.nullity().nullable());
        assert_eq!(criteria.constant_value(), Some(&Value::Int4(42)));
    }

    #[test]
    fn non_equality_predicates_are_not_constants() {
        let criteria = Criteria::new(
            NULLABLE,
            Some(Predicate::comparison(ComparisonOperator::Less, Value::Int4(10))),
        );
        assert_eq!(criteria.constant_value(), None);
    }

    #[test]
    fn negation_wraps_its_operand() {
        let p = Predicate::negation(Predicate::comparison(
            ComparisonOperator::Equal,
            Value::Int4(0),
        ));
        assert_eq!(p.to_string(), "not(= 0)");
        match p {
            Predicate::Negation(inner) => {
                assert_eq!(
                    *inner,
                    Predicate::comparison(ComparisonOperator::Equal, Value::Int4(0))
                );
            }
            _ => panic!("expected negation"),
        }
    }

    #[test]
    fn quantification_holds_operands_in_order() {
        let p = Predicate::quantification(
            Quantifier::All,
            vec![
                Predicate::comparison(ComparisonOperator::GreaterEqual, Value::Int4(0)),
                Predicate::comparison(ComparisonOperator::Less, Value::Int4(100)),
            ],
        );
        assert_eq!(p.to_string(), "all(>= 0, < 100)");
    }
}
