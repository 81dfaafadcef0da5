//! Scalar expressions.
//!
//! Every node carries an [`ExprId`] stamped at construction; the analyzer's
//! expression table is keyed by this identity, so cloning a node (for plan
//! surgery) keeps its resolved type while newly built nodes resolve afresh.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::binding::VariableDescriptor;
use crate::catalog::function::{AggregateFunctionDeclaration, FunctionDeclaration};
use crate::diagnostics::Region;
use crate::types::data_type::DataType;
use crate::value::Value;

static NEXT_EXPR_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a scalar expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(u64);

impl ExprId {
    fn fresh() -> Self {
        ExprId(NEXT_EXPR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Plus,
    SignInversion,
    Length,
    ConditionalNot,
    IsNull,
    IsTrue,
    IsFalse,
    IsUnknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Concat,
    ConditionalAnd,
    ConditionalOr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl ComparisonOperator {
    /// The operator with its operands swapped.
    pub fn transpose(self) -> Self {
        match self {
            ComparisonOperator::Less => ComparisonOperator::Greater,
            ComparisonOperator::LessEqual => ComparisonOperator::GreaterEqual,
            ComparisonOperator::Greater => ComparisonOperator::Less,
            ComparisonOperator::GreaterEqual => ComparisonOperator::LessEqual,
            other => other,
        }
    }

    /// Whether the operator orders its operands rather than only testing
    /// equality.
    pub fn is_ordering(self) -> bool {
        !matches!(
            self,
            ComparisonOperator::Equal | ComparisonOperator::NotEqual
        )
    }
}

#[derive(Debug, Clone)]
pub struct Immediate {
    pub id: ExprId,
    pub region: Option<Region>,
    pub value: Value,
    pub data_type: Arc<DataType>,
}

#[derive(Debug, Clone)]
pub struct VariableReference {
    pub id: ExprId,
    pub region: Option<Region>,
    pub variable: VariableDescriptor,
}

#[derive(Debug, Clone)]
pub struct Unary {
    pub id: ExprId,
    pub region: Option<Region>,
    pub operator: UnaryOperator,
    pub operand: Box<ScalarExpr>,
}

#[derive(Debug, Clone)]
pub struct Cast {
    pub id: ExprId,
    pub region: Option<Region>,
    pub operand: Box<ScalarExpr>,
    pub data_type: Arc<DataType>,
}

#[derive(Debug, Clone)]
pub struct Binary {
    pub id: ExprId,
    pub region: Option<Region>,
    pub operator: BinaryOperator,
    pub left: Box<ScalarExpr>,
    pub right: Box<ScalarExpr>,
}

#[derive(Debug, Clone)]
pub struct Compare {
    pub id: ExprId,
    pub region: Option<Region>,
    pub operator: ComparisonOperator,
    pub left: Box<ScalarExpr>,
    pub right: Box<ScalarExpr>,
}

#[derive(Debug, Clone)]
pub struct MatchExpr {
    pub id: ExprId,
    pub region: Option<Region>,
    pub input: Box<ScalarExpr>,
    pub pattern: Box<ScalarExpr>,
    pub escape: Box<ScalarExpr>,
}

#[derive(Debug, Clone)]
pub struct Alternative {
    pub condition: ScalarExpr,
    pub body: ScalarExpr,
}

#[derive(Debug, Clone)]
pub struct Conditional {
    pub id: ExprId,
    pub region: Option<Region>,
    pub alternatives: Vec<Alternative>,
    pub default_expression: Option<Box<ScalarExpr>>,
}

#[derive(Debug, Clone)]
pub struct Coalesce {
    pub id: ExprId,
    pub region: Option<Region>,
    pub alternatives: Vec<ScalarExpr>,
}

#[derive(Debug, Clone)]
pub struct LetDeclarator {
    pub variable: VariableDescriptor,
    pub value: ScalarExpr,
}

#[derive(Debug, Clone)]
pub struct Let {
    pub id: ExprId,
    pub region: Option<Region>,
    pub variables: Vec<LetDeclarator>,
    pub body: Box<ScalarExpr>,
}

#[derive(Debug, Clone)]
pub struct FunctionCall {
    pub id: ExprId,
    pub region: Option<Region>,
    pub function: Arc<FunctionDeclaration>,
    pub arguments: Vec<ScalarExpr>,
}

#[derive(Debug, Clone)]
pub struct AggregateFunctionCall {
    pub id: ExprId,
    pub region: Option<Region>,
    pub function: Arc<AggregateFunctionDeclaration>,
    pub arguments: Vec<ScalarExpr>,
}

/// A scalar expression tree.
#[derive(Debug, Clone)]
pub enum ScalarExpr {
    Immediate(Immediate),
    VariableReference(VariableReference),
    Unary(Unary),
    Cast(Cast),
    Binary(Binary),
    Compare(Compare),
    Match(MatchExpr),
    Conditional(Conditional),
    Coalesce(Coalesce),
    Let(Let),
    FunctionCall(FunctionCall),
    AggregateFunctionCall(AggregateFunctionCall),
}

impl ScalarExpr {
    pub fn immediate(value: Value, data_type: Arc<DataType>) -> Self {
        ScalarExpr::Immediate(Immediate {
            id: ExprId::fresh(),
            region: None,
            value,
            data_type,
        })
    }

    pub fn variable(variable: VariableDescriptor) -> Self {
        ScalarExpr::VariableReference(VariableReference {
            id: ExprId::fresh(),
            region: None,
            variable,
        })
    }

    pub fn unary(operator: UnaryOperator, operand: ScalarExpr) -> Self {
        ScalarExpr::Unary(Unary {
            id: ExprId::fresh(),
            region: None,
            operator,
            operand: Box::new(operand),
        })
    }

    pub fn cast(operand: ScalarExpr, data_type: Arc<DataType>) -> Self {
        ScalarExpr::Cast(Cast {
            id: ExprId::fresh(),
            region: None,
            operand: Box::new(operand),
            data_type,
        })
    }

    pub fn binary(operator: BinaryOperator, left: ScalarExpr, right: ScalarExpr) -> Self {
        ScalarExpr::Binary(Binary {
            id: ExprId::fresh(),
            region: None,
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn compare(operator: ComparisonOperator, left: ScalarExpr, right: ScalarExpr) -> Self {
        ScalarExpr::Compare(Compare {
            id: ExprId::fresh(),
            region: None,
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn match_expr(input: ScalarExpr, pattern: ScalarExpr, escape: ScalarExpr) -> Self {
        ScalarExpr::Match(MatchExpr {
            id: ExprId::fresh(),
            region: None,
            input: Box::new(input),
            pattern: Box::new(pattern),
            escape: Box::new(escape),
        })
    }

    pub fn conditional(
        alternatives: Vec<Alternative>,
        default_expression: Option<ScalarExpr>,
    ) -> Self {
        ScalarExpr::Conditional(Conditional {
            id: ExprId::fresh(),
            region: None,
            alternatives,
            default_expression: default_expression.map(Box::new),
        })
    }

    pub fn coalesce(alternatives: Vec<ScalarExpr>) -> Self {
        ScalarExpr::Coalesce(Coalesce {
            id: ExprId::fresh(),
            region: None,
            alternatives,
        })
    }

    pub fn let_expr(variables: Vec<LetDeclarator>, body: ScalarExpr) -> Self {
        ScalarExpr::Let(Let {
            id: ExprId::fresh(),
            region: None,
            variables,
            body: Box::new(body),
        })
    }

    pub fn function_call(function: Arc<FunctionDeclaration>, arguments: Vec<ScalarExpr>) -> Self {
        ScalarExpr::FunctionCall(FunctionCall {
            id: ExprId::fresh(),
            region: None,
            function,
            arguments,
        })
    }

    pub fn aggregate_function_call(
        function: Arc<AggregateFunctionDeclaration>,
        arguments: Vec<ScalarExpr>,
    ) -> Self {
        ScalarExpr::AggregateFunctionCall(AggregateFunctionCall {
            id: ExprId::fresh(),
            region: None,
            function,
            arguments,
        })
    }

    pub fn with_region(mut self, region: Region) -> Self {
        *self.region_mut() = Some(region);
        self
    }

    pub fn id(&self) -> ExprId {
        match self {
            ScalarExpr::Immediate(e) => e.id,
            ScalarExpr::VariableReference(e) => e.id,
            ScalarExpr::Unary(e) => e.id,
            ScalarExpr::Cast(e) => e.id,
            ScalarExpr::Binary(e) => e.id,
            ScalarExpr::Compare(e) => e.id,
            ScalarExpr::Match(e) => e.id,
            ScalarExpr::Conditional(e) => e.id,
            ScalarExpr::Coalesce(e) => e.id,
            ScalarExpr::Let(e) => e.id,
            ScalarExpr::FunctionCall(e) => e.id,
            ScalarExpr::AggregateFunctionCall(e) => e.id,
        }
    }

    pub fn region(&self) -> Option<Region> {
        match self {
            ScalarExpr::Immediate(e) => e.region,
            ScalarExpr::VariableReference(e) => e.region,
            ScalarExpr::Unary(e) => e.region,
            ScalarExpr::Cast(e) => e.region,
            ScalarExpr::Binary(e) => e.region,
            ScalarExpr::Compare(e) => e.region,
            ScalarExpr::Match(e) => e.region,
            ScalarExpr::Conditional(e) => e.region,
            ScalarExpr::Coalesce(e) => e.region,
            ScalarExpr::Let(e) => e.region,
            ScalarExpr::FunctionCall(e) => e.region,
            ScalarExpr::AggregateFunctionCall(e) => e.region,
        }
    }

    fn region_mut(&mut self) -> &mut Option<Region> {
        match self {
            ScalarExpr::Immediate(e) => &mut e.region,
            ScalarExpr::VariableReference(e) => &mut e.region,
            ScalarExpr::Unary(e) => &mut e.region,
            ScalarExpr::Cast(e) => &mut e.region,
            ScalarExpr::Binary(e) => &mut e.region,
            ScalarExpr::Compare(e) => &mut e.region,
            ScalarExpr::Match(e) => &mut e.region,
            ScalarExpr::Conditional(e) => &mut e.region,
            ScalarExpr::Coalesce(e) => &mut e.region,
            ScalarExpr::Let(e) => &mut e.region,
            ScalarExpr::FunctionCall(e) => &mut e.region,
            ScalarExpr::AggregateFunctionCall(e) => &mut e.region,
        }
    }

    /// The literal `true` of type boolean; used by rewriters to blank out a
    /// filter condition.
    pub fn literal_true(data_type: Arc<DataType>) -> Self {
        ScalarExpr::immediate(Value::Boolean(true), data_type)
    }

    /// Whether this expression is the literal boolean `true`.
    pub fn is_literal_true(&self) -> bool {
        matches!(
            self,
            ScalarExpr::Immediate(Immediate {
                value: Value::Boolean(true),
                ..
            })
        )
    }

    /// The referenced variable, if this node is a plain reference.
    pub fn as_variable(&self) -> Option<&VariableDescriptor> {
        match self {
            ScalarExpr::VariableReference(reference) => Some(&reference.variable),
            _ => None,
        }
    }

    /// Splits a conjunction tree into its atomic terms, left to right.
    pub fn decompose_conjunction(self) -> Vec<ScalarExpr> {
        match self {
            ScalarExpr::Binary(Binary {
                operator: BinaryOperator::ConditionalAnd,
                left,
                right,
                ..
            }) => {
                let mut terms = left.decompose_conjunction();
                terms.extend(right.decompose_conjunction());
                terms
            }
            other => vec![other],
        }
    }

    /// Joins terms back into a left-associative conjunction; `None` when
    /// there are no terms.
    pub fn conjoin(terms: Vec<ScalarExpr>) -> Option<ScalarExpr> {
        let mut iterator = terms.into_iter();
        let first = iterator.next()?;
        Some(iterator.fold(first, |accumulator, term| {
            ScalarExpr::binary(BinaryOperator::ConditionalAnd, accumulator, term)
        }))
    }
}

impl fmt::Display for ScalarExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarExpr::Immediate(e) => write!(f, "{}", e.value),
            ScalarExpr::VariableReference(e) => write!(f, "{}", e.variable),
            ScalarExpr::Unary(e) => {
                let name = match e.operator {
                    UnaryOperator::Plus => "+",
                    UnaryOperator::SignInversion => "-",
                    UnaryOperator::Length => "length",
                    UnaryOperator::ConditionalNot => "not",
                    UnaryOperator::IsNull => "is_null",
                    UnaryOperator::IsTrue => "is_true",
                    UnaryOperator::IsFalse => "is_false",
                    UnaryOperator::IsUnknown => "is_unknown",
                };
                write!(f, "{name}({})", e.operand)
            }
            ScalarExpr::Cast(e) => write!(f, "cast({} as {})", e.operand, e.data_type),
            ScalarExpr::Binary(e) => {
                let name = match e.operator {
                    BinaryOperator::Add => "+",
                    BinaryOperator::Subtract => "-",
                    BinaryOperator::Multiply => "*",
                    BinaryOperator::Divide => "/",
                    BinaryOperator::Remainder => "%",
                    BinaryOperator::Concat => "||",
                    BinaryOperator::ConditionalAnd => "and",
                    BinaryOperator::ConditionalOr => "or",
                };
                write!(f, "({} {name} {})", e.left, e.right)
            }
            ScalarExpr::Compare(e) => {
                let name = match e.operator {
                    ComparisonOperator::Equal => "=",
                    ComparisonOperator::NotEqual => "<>",
                    ComparisonOperator::Less => "<",
                    ComparisonOperator::LessEqual => "<=",
                    ComparisonOperator::Greater => ">",
                    ComparisonOperator::GreaterEqual => ">=",
                };
                write!(f, "({} {name} {})", e.left, e.right)
            }
            ScalarExpr::Match(e) => write!(f, "match({}, {}, {})", e.input, e.pattern, e.escape),
            ScalarExpr::Conditional(e) => {
                f.write_str("case")?;
                for alternative in &e.alternatives {
                    write!(f, " when {} then {}", alternative.condition, alternative.body)?;
                }
                if let Some(default_expression) = &e.default_expression {
                    write!(f, " else {default_expression}")?;
                }
                f.write_str(" end")
            }
            ScalarExpr::Coalesce(e) => {
                f.write_str("coalesce(")?;
                for (index, alternative) in e.alternatives.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{alternative}")?;
                }
                f.write_str(")")
            }
            ScalarExpr::Let(e) => {
                f.write_str("let ")?;
                for (index, declarator) in e.variables.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} = {}", declarator.variable, declarator.value)?;
                }
                write!(f, " in {}", e.body)
            }
            ScalarExpr::FunctionCall(e) => {
                write!(f, "{}(", e.function.name())?;
                for (index, argument) in e.arguments.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{argument}")?;
                }
                f.write_str(")")
            }
            ScalarExpr::AggregateFunctionCall(e) => {
                write!(f, "{}(", e.function.name())?;
                for (index, argument) in e.arguments.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{argument}")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::repository::default_repository;

    #[test]
    fn fresh_nodes_get_distinct_identities() {
        let repo = default_repository();
        let a = ScalarExpr::immediate(Value::Int4(1), repo.get(DataType::Int4));
        let b = ScalarExpr::immediate(Value::Int4(1), repo.get(DataType::Int4));
        assert_ne!(a.id(), b.id());
        // clones keep the identity of the original
        assert_eq!(a.id(), a.clone().id());
    }

    #[test]
    fn conjunction_round_trip() {
        let repo = default_repository();
        let t = |v: i32| ScalarExpr::immediate(Value::Int4(v), repo.get(DataType::Int4));
        let conjunction = ScalarExpr::binary(
            BinaryOperator::ConditionalAnd,
            ScalarExpr::binary(BinaryOperator::ConditionalAnd, t(1), t(2)),
            t(3),
        );
        let terms = conjunction.decompose_conjunction();
        assert_eq!(terms.len(), 3);
        let rebuilt = ScalarExpr::conjoin(terms).unwrap();
        assert_eq!(rebuilt.to_string(), "((1 and 2) and 3)");
    }

    #[test]
    fn comparison_transposition() {
        assert_eq!(
            ComparisonOperator::Less.transpose(),
            ComparisonOperator::Greater
        );
        assert_eq!(
            ComparisonOperator::LessEqual.transpose(),
            ComparisonOperator::GreaterEqual
        );
        assert_eq!(
            ComparisonOperator::Equal.transpose(),
            ComparisonOperator::Equal
        );
        assert!(ComparisonOperator::Less.is_ordering());
        assert!(!ComparisonOperator::NotEqual.is_ordering());
    }
}
