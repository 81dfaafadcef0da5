//! Disjunction-range decomposition.
//!
//! For a filter whose condition is a top-level disjunction, per-column range
//! hints are extracted from both disjuncts and union-merged; conjunctions
//! intersect-merge. The resulting bounds become additional conjunctive
//! terms that tighten the original predicate without changing its result.

use std::sync::Arc;

use log::debug;

use crate::binding::{VariableDescriptor, VariableKind};
use crate::expr::{Binary, BinaryOperator, Compare, ComparisonOperator, ScalarExpr};
use crate::optimizer::optimizer_pass::{OptimizerPass, OptimizerResult, PlanContext};
use crate::optimizer::range_hint::{BoundType, BoundValue, RangeHintEntry, RangeHintMap};
use crate::optimizer::transformed::Transformed;
use crate::plan::relational::{Filter, RelationalPlan, rebuild_with_inputs};

pub struct DecomposeDisjunctionRange;

impl DecomposeDisjunctionRange {
    pub fn new() -> Self {
        DecomposeDisjunctionRange
    }
}

impl OptimizerPass for DecomposeDisjunctionRange {
    fn optimize(
        &self,
        plan: Arc<RelationalPlan>,
        ctx: &mut PlanContext<'_>,
    ) -> OptimizerResult<Transformed<Arc<RelationalPlan>>> {
        rewrite(&plan, ctx)
    }
}

fn rewrite(
    plan: &Arc<RelationalPlan>,
    ctx: &mut PlanContext<'_>,
) -> OptimizerResult<Transformed<Arc<RelationalPlan>>> {
    if let RelationalPlan::Filter(filter) = plan.as_ref() {
        let input_tf = rewrite(&filter.input, ctx)?;
        let terms = collect_range_terms(&filter.condition);
        if terms.is_empty() {
            return Ok(rebuild_with_inputs(plan, vec![input_tf]));
        }
        debug!("disjunction decomposition adds {} range terms", terms.len());
        let mut condition = filter.condition.clone();
        for term in terms {
            condition = ScalarExpr::binary(BinaryOperator::ConditionalAnd, condition, term);
        }
        return Ok(Transformed::Yes(Arc::new(RelationalPlan::Filter(Filter {
            input: input_tf.into_inner(),
            condition,
        }))));
    }
    let inputs = plan.inputs();
    let mut transformed = Vec::with_capacity(inputs.len());
    for input in inputs {
        transformed.push(rewrite(input, ctx)?);
    }
    Ok(rebuild_with_inputs(plan, transformed))
}

/// Extracts additional conjunctive terms from a top-level disjunction;
/// empty when the expression has no disjunctive range structure.
pub fn collect_range_terms(expression: &ScalarExpr) -> Vec<ScalarExpr> {
    let ScalarExpr::Binary(Binary {
        operator: BinaryOperator::ConditionalOr,
        ..
    }) = expression
    else {
        return Vec::new();
    };
    let mut hints = dispatch(expression);
    to_terms(&mut hints)
}

fn dispatch(expression: &ScalarExpr) -> RangeHintMap {
    match expression {
        ScalarExpr::Binary(Binary {
            operator: BinaryOperator::ConditionalOr,
            left,
            right,
            ..
        }) => {
            // disjunction: the range must cover both sides
            let mut hints = dispatch(left);
            hints.union_merge(dispatch(right));
            hints
        }
        ScalarExpr::Binary(Binary {
            operator: BinaryOperator::ConditionalAnd,
            left,
            right,
            ..
        }) => {
            // conjunction: both constraints apply
            let mut hints = dispatch(left);
            hints.intersect_merge(dispatch(right));
            hints
        }
        ScalarExpr::Compare(compare) => dispatch_compare(compare),
        _ => RangeHintMap::new(),
    }
}

fn dispatch_compare(compare: &Compare) -> RangeHintMap {
    if compare.operator == ComparisonOperator::NotEqual {
        return RangeHintMap::new();
    }
    if let Some(column) = column_of(&compare.left) {
        return extract(column, &compare.right, compare.operator);
    }
    if let Some(column) = column_of(&compare.right) {
        return extract(column, &compare.left, compare.operator.transpose());
    }
    RangeHintMap::new()
}

fn column_of(expression: &ScalarExpr) -> Option<&VariableDescriptor> {
    let variable = expression.as_variable()?;
    (variable.kind() == VariableKind::StreamVariable).then_some(variable)
}

fn extract(
    column: &VariableDescriptor,
    operand: &ScalarExpr,
    comparator: ComparisonOperator,
) -> RangeHintMap {
    let mut hints = RangeHintMap::new();
    match operand {
        ScalarExpr::Immediate(immediate) => {
            let entry = hints.get(column);
            apply_immediate(entry, immediate, comparator);
        }
        ScalarExpr::VariableReference(reference)
            if reference.variable.kind() == VariableKind::ExternalVariable =>
        {
            let entry = hints.get(column);
            apply_variable(entry, &reference.variable, comparator);
        }
        _ => {}
    }
    hints
}

fn apply_immediate(
    entry: &mut RangeHintEntry,
    value: &crate::expr::Immediate,
    comparator: ComparisonOperator,
) {
    match comparator {
        ComparisonOperator::Equal => {
            entry.intersect_lower_immediate(value, true);
            entry.intersect_upper_immediate(value, true);
        }
        // column < value
        ComparisonOperator::Less => entry.intersect_upper_immediate(value, false),
        // column > value
        ComparisonOperator::Greater => entry.intersect_lower_immediate(value, false),
        // column <= value
        ComparisonOperator::LessEqual => entry.intersect_upper_immediate(value, true),
        // column >= value
        ComparisonOperator::GreaterEqual => entry.intersect_lower_immediate(value, true),
        ComparisonOperator::NotEqual => {}
    }
}

fn apply_variable(
    entry: &mut RangeHintEntry,
    value: &VariableDescriptor,
    comparator: ComparisonOperator,
) {
    match comparator {
        ComparisonOperator::Equal => {
            entry.intersect_lower_variable(value, true);
            entry.intersect_upper_variable(value, true);
        }
        ComparisonOperator::Less => entry.intersect_upper_variable(value, false),
        ComparisonOperator::Greater => entry.intersect_lower_variable(value, false),
        ComparisonOperator::LessEqual => entry.intersect_upper_variable(value, true),
        ComparisonOperator::GreaterEqual => entry.intersect_lower_variable(value, true),
        ComparisonOperator::NotEqual => {}
    }
}

fn to_terms(hints: &mut RangeHintMap) -> Vec<ScalarExpr> {
    let mut results = Vec::new();
    for (column, mut entry) in hints.consume() {
        if entry.lower_type() != BoundType::Infinity {
            let inclusive = entry.lower_type() == BoundType::Inclusive;
            if let Some(value) = entry.take_lower() {
                // lower bound renders as (value <= column) / (value < column)
                results.push(ScalarExpr::compare(
                    if inclusive {
                        ComparisonOperator::LessEqual
                    } else {
                        ComparisonOperator::Less
                    },
                    to_expression(value),
                    ScalarExpr::variable(column.clone()),
                ));
            }
        }
        if entry.upper_type() != BoundType::Infinity {
            let inclusive = entry.upper_type() == BoundType::Inclusive;
            if let Some(value) = entry.take_upper() {
                // upper bound renders as (column <= value) / (column < value)
                results.push(ScalarExpr::compare(
                    if inclusive {
                        ComparisonOperator::LessEqual
                    } else {
                        ComparisonOperator::Less
                    },
                    ScalarExpr::variable(column.clone()),
                    to_expression(value),
                ));
            }
        }
    }
    results
}

fn to_expression(value: BoundValue) -> ScalarExpr {
    match value {
        BoundValue::Immediate(immediate) => {
            ScalarExpr::immediate(immediate.value, immediate.data_type)
        }
        BoundValue::Variable(variable) => ScalarExpr::variable(variable),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Immediate as ImmediateExpr;
    use crate::optimizer::optimizer_pass::PlanContext;
    use crate::plan::relational::Values;
    use crate::types::data_type::DataType;
    use crate::types::repository::default_repository;
    use crate::value::Value;

    fn imm(value: i32) -> ScalarExpr {
        ScalarExpr::immediate(Value::Int4(value), default_repository().get(DataType::Int4))
    }

    fn cmp(
        operator: ComparisonOperator,
        left: ScalarExpr,
        right: ScalarExpr,
    ) -> ScalarExpr {
        ScalarExpr::compare(operator, left, right)
    }

    fn and(left: ScalarExpr, right: ScalarExpr) -> ScalarExpr {
        ScalarExpr::binary(BinaryOperator::ConditionalAnd, left, right)
    }

    fn or(left: ScalarExpr, right: ScalarExpr) -> ScalarExpr {
        ScalarExpr::binary(BinaryOperator::ConditionalOr, left, right)
    }

    fn value_of(expression: &ScalarExpr) -> Option<i32> {
        match expression {
            ScalarExpr::Immediate(ImmediateExpr {
                value: Value::Int4(v),
                ..
            }) => Some(*v),
            _ => None,
        }
    }

    #[test]
    fn disjunction_of_conjunctions_yields_merged_bounds() {
        let c0 = VariableDescriptor::stream("c0");
        let c1 = VariableDescriptor::stream("c1");
        let condition = or(
            and(
                cmp(ComparisonOperator::Equal, ScalarExpr::variable(c0.clone()), imm(1)),
                cmp(ComparisonOperator::Less, ScalarExpr::variable(c1.clone()), imm(10)),
            ),
            and(
                cmp(ComparisonOperator::Equal, ScalarExpr::variable(c0.clone()), imm(2)),
                cmp(ComparisonOperator::Less, ScalarExpr::variable(c1.clone()), imm(5)),
            ),
        );
        let terms = collect_range_terms(&condition);
        assert_eq!(terms.len(), 3);

        // 1 <= c0
        let ScalarExpr::Compare(first) = &terms[0] else {
            panic!("expected a comparison");
        };
        assert_eq!(first.operator, ComparisonOperator::LessEqual);
        assert_eq!(value_of(&first.left), Some(1));
        assert_eq!(first.right.as_variable(), Some(&c0));

        // c0 <= 2
        let ScalarExpr::Compare(second) = &terms[1] else {
            panic!("expected a comparison");
        };
        assert_eq!(second.operator, ComparisonOperator::LessEqual);
        assert_eq!(second.left.as_variable(), Some(&c0));
        assert_eq!(value_of(&second.right), Some(2));

        // c1 < 10: the union of the two upper bounds
        let ScalarExpr::Compare(third) = &terms[2] else {
            panic!("expected a comparison");
        };
        assert_eq!(third.operator, ComparisonOperator::Less);
        assert_eq!(third.left.as_variable(), Some(&c1));
        assert_eq!(value_of(&third.right), Some(10));
    }

    #[test]
    fn one_sided_columns_disappear_from_the_union() {
        let c0 = VariableDescriptor::stream("c0");
        let c1 = VariableDescriptor::stream("c1");
        let condition = or(
            cmp(ComparisonOperator::Equal, ScalarExpr::variable(c0), imm(1)),
            cmp(ComparisonOperator::Less, ScalarExpr::variable(c1), imm(5)),
        );
        assert!(collect_range_terms(&condition).is_empty());
    }

    #[test]
    fn not_equal_and_conjunctive_roots_produce_nothing() {
        let c0 = VariableDescriptor::stream("c0");
        let not_equal = or(
            cmp(
                ComparisonOperator::NotEqual,
                ScalarExpr::variable(c0.clone()),
                imm(1),
            ),
            cmp(
                ComparisonOperator::NotEqual,
                ScalarExpr::variable(c0.clone()),
                imm(2),
            ),
        );
        assert!(collect_range_terms(&not_equal).is_empty());

        let conjunctive = and(
            cmp(ComparisonOperator::Less, ScalarExpr::variable(c0), imm(1)),
            imm(1),
        );
        assert!(collect_range_terms(&conjunctive).is_empty());
    }

    #[test]
    fn transposed_comparisons_bound_the_column_on_the_right() {
        let c0 = VariableDescriptor::stream("c0");
        // (5 < c0) or (1 < c0)  ==>  1 < c0
        let condition = or(
            cmp(ComparisonOperator::Less, imm(5), ScalarExpr::variable(c0.clone())),
            cmp(ComparisonOperator::Less, imm(1), ScalarExpr::variable(c0.clone())),
        );
        let terms = collect_range_terms(&condition);
        assert_eq!(terms.len(), 1);
        let ScalarExpr::Compare(bound) = &terms[0] else {
            panic!("expected a comparison");
        };
        assert_eq!(bound.operator, ComparisonOperator::Less);
        assert_eq!(value_of(&bound.left), Some(1));
        assert_eq!(bound.right.as_variable(), Some(&c0));
    }

    #[test]
    fn filter_conditions_gain_the_generated_terms() {
        let c0 = VariableDescriptor::stream("c0");
        let condition = or(
            cmp(ComparisonOperator::Equal, ScalarExpr::variable(c0.clone()), imm(1)),
            cmp(ComparisonOperator::Equal, ScalarExpr::variable(c0.clone()), imm(9)),
        );
        let filter = Arc::new(RelationalPlan::Filter(Filter {
            input: Arc::new(RelationalPlan::Values(Values {
                columns: vec![],
                rows: vec![],
            })),
            condition,
        }));
        let mut ctx = PlanContext::new(default_repository());
        let result = DecomposeDisjunctionRange::new()
            .optimize(filter, &mut ctx)
            .unwrap();
        assert!(result.is_yes());
        let RelationalPlan::Filter(rewritten) = result.into_inner().as_ref().clone() else {
            panic!("expected a filter");
        };
        let terms = rewritten.condition.decompose_conjunction();
        // original predicate plus 1 <= c0 and c0 <= 9
        assert_eq!(terms.len(), 3);
    }
}
