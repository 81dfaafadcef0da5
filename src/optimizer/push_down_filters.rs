//! Push-down of selections.
//!
//! Filter conditions are decomposed along AND into atomic terms; each term
//! moves to the deepest operator whose output still defines every variable
//! the term references. The emptied filter keeps the literal `true` so a
//! later pass can drop it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::debug;

use crate::binding::{VariableDescriptor, VariableKind};
use crate::expr::{ExprId, ScalarExpr};
use crate::optimizer::optimizer_pass::{OptimizerPass, OptimizerResult, PlanContext};
use crate::optimizer::transformed::Transformed;
use crate::plan::relational::{
    Aggregate, Buffer, Difference, Distinct, Filter, Identify, Intersection, Join, JoinFind,
    JoinKind, JoinScan, Limit, Project, RelationalPlan, SetQuantifier, Union,
};
use crate::types::data_type::DataType;
use crate::types::repository::TypeRepository;

pub struct PushDownFilters;

impl PushDownFilters {
    pub fn new() -> Self {
        PushDownFilters
    }
}

impl OptimizerPass for PushDownFilters {
    fn optimize(
        &self,
        plan: Arc<RelationalPlan>,
        ctx: &mut PlanContext<'_>,
    ) -> OptimizerResult<Transformed<Arc<RelationalPlan>>> {
        let (new_plan, leftover) = sink(&plan, Vec::new(), ctx.repository)?;
        let new_plan = wrap_terms(new_plan, leftover);
        if Arc::ptr_eq(&new_plan, &plan) {
            Ok(Transformed::No(plan))
        } else {
            Ok(Transformed::Yes(new_plan))
        }
    }
}

fn wrap_terms(plan: Arc<RelationalPlan>, terms: Vec<ScalarExpr>) -> Arc<RelationalPlan> {
    match ScalarExpr::conjoin(terms) {
        Some(condition) => Arc::new(RelationalPlan::Filter(Filter {
            input: plan,
            condition,
        })),
        None => plan,
    }
}

/// Pushes `terms` as deep as possible into `plan`. Terms the subtree cannot
/// host are handed back to the caller.
fn sink(
    plan: &Arc<RelationalPlan>,
    terms: Vec<ScalarExpr>,
    repo: &TypeRepository,
) -> OptimizerResult<(Arc<RelationalPlan>, Vec<ScalarExpr>)> {
    match plan.as_ref() {
        RelationalPlan::Filter(filter) => sink_filter(plan, filter, terms, repo),

        RelationalPlan::Project(project) => {
            let introduced: HashSet<u64> = project.columns.iter().map(|c| c.variable.id()).collect();
            let (stay, push): (Vec<_>, Vec<_>) = terms
                .into_iter()
                .partition(|term| term_variables(term).iter().any(|v| introduced.contains(v)));
            let (new_input, kept) = sink(&project.input, push, repo)?;
            let node = if Arc::ptr_eq(&new_input, &project.input) {
                Arc::clone(plan)
            } else {
                Arc::new(RelationalPlan::Project(Project {
                    input: new_input,
                    columns: project.columns.clone(),
                }))
            };
            Ok((node, stay.into_iter().chain(kept).collect()))
        }

        RelationalPlan::Identify(identify) => {
            let (stay, push): (Vec<_>, Vec<_>) = terms
                .into_iter()
                .partition(|term| term_variables(term).contains(&identify.variable.id()));
            let (new_input, kept) = sink(&identify.input, push, repo)?;
            let node = if Arc::ptr_eq(&new_input, &identify.input) {
                Arc::clone(plan)
            } else {
                Arc::new(RelationalPlan::Identify(Identify {
                    input: new_input,
                    ..identify.clone()
                }))
            };
            Ok((node, stay.into_iter().chain(kept).collect()))
        }

        RelationalPlan::Buffer(buffer) => {
            let (new_input, kept) = sink(&buffer.input, terms, repo)?;
            let node = if Arc::ptr_eq(&new_input, &buffer.input) {
                Arc::clone(plan)
            } else {
                Arc::new(RelationalPlan::Buffer(Buffer { input: new_input }))
            };
            Ok((node, kept))
        }

        RelationalPlan::Join(join) => sink_join(plan, join, terms, repo),

        RelationalPlan::JoinFind(join_find) => {
            let left_defined = variable_ids(&join_find.left);
            let (push, stay): (Vec<_>, Vec<_>) = terms
                .into_iter()
                .partition(|term| is_subset(&term_variables(term), &left_defined));
            let (new_left, kept) = sink(&join_find.left, push, repo)?;
            let node = if Arc::ptr_eq(&new_left, &join_find.left) {
                Arc::clone(plan)
            } else {
                Arc::new(RelationalPlan::JoinFind(JoinFind {
                    left: new_left,
                    ..join_find.clone()
                }))
            };
            Ok((node, stay.into_iter().chain(kept).collect()))
        }

        RelationalPlan::JoinScan(join_scan) => {
            let left_defined = variable_ids(&join_scan.left);
            let (push, stay): (Vec<_>, Vec<_>) = terms
                .into_iter()
                .partition(|term| is_subset(&term_variables(term), &left_defined));
            let (new_left, kept) = sink(&join_scan.left, push, repo)?;
            let node = if Arc::ptr_eq(&new_left, &join_scan.left) {
                Arc::clone(plan)
            } else {
                Arc::new(RelationalPlan::JoinScan(JoinScan {
                    left: new_left,
                    ..join_scan.clone()
                }))
            };
            Ok((node, stay.into_iter().chain(kept).collect()))
        }

        RelationalPlan::Aggregate(aggregate) => {
            let keys: HashSet<u64> = aggregate.group_keys.iter().map(|k| k.id()).collect();
            let (push, stay): (Vec<_>, Vec<_>) = terms
                .into_iter()
                .partition(|term| is_subset(&term_variables(term), &keys));
            let (new_input, kept) = sink(&aggregate.input, push, repo)?;
            let node = if Arc::ptr_eq(&new_input, &aggregate.input) {
                Arc::clone(plan)
            } else {
                Arc::new(RelationalPlan::Aggregate(Aggregate {
                    input: new_input,
                    ..aggregate.clone()
                }))
            };
            Ok((node, stay.into_iter().chain(kept).collect()))
        }

        RelationalPlan::Distinct(distinct) => {
            // group-key terms are duplicated: a copy goes upstream, the
            // original stays downstream
            let keys: HashSet<u64> = distinct.group_keys.iter().map(|k| k.id()).collect();
            let push: Vec<ScalarExpr> = terms
                .iter()
                .filter(|term| is_subset(&term_variables(term), &keys))
                .cloned()
                .collect();
            let (new_input, kept) = sink(&distinct.input, push, repo)?;
            let node = if Arc::ptr_eq(&new_input, &distinct.input) {
                Arc::clone(plan)
            } else {
                Arc::new(RelationalPlan::Distinct(Distinct {
                    input: new_input,
                    group_keys: distinct.group_keys.clone(),
                }))
            };
            Ok((node, terms.into_iter().chain(kept).collect()))
        }

        RelationalPlan::Limit(limit) => {
            if limit.group_keys.is_empty() {
                // a global limit admits no push-down at all
                let (new_input, kept) = sink(&limit.input, Vec::new(), repo)?;
                let node = if Arc::ptr_eq(&new_input, &limit.input) {
                    Arc::clone(plan)
                } else {
                    Arc::new(RelationalPlan::Limit(Limit {
                        input: new_input,
                        ..limit.clone()
                    }))
                };
                return Ok((node, terms.into_iter().chain(kept).collect()));
            }
            let keys: HashSet<u64> = limit.group_keys.iter().map(|k| k.id()).collect();
            let push: Vec<ScalarExpr> = terms
                .iter()
                .filter(|term| is_subset(&term_variables(term), &keys))
                .cloned()
                .collect();
            let (new_input, kept) = sink(&limit.input, push, repo)?;
            let node = if Arc::ptr_eq(&new_input, &limit.input) {
                Arc::clone(plan)
            } else {
                Arc::new(RelationalPlan::Limit(Limit {
                    input: new_input,
                    ..limit.clone()
                }))
            };
            Ok((node, terms.into_iter().chain(kept).collect()))
        }

        RelationalPlan::Union(union) => sink_union(plan, union, terms, repo),

        RelationalPlan::Intersection(intersection) => {
            let left_defined = variable_ids(&intersection.left);
            let (push, stay): (Vec<_>, Vec<_>) = terms
                .into_iter()
                .partition(|term| is_subset(&term_variables(term), &left_defined));
            let (new_left, kl) = sink(&intersection.left, push, repo)?;
            let (new_right, kr) = sink(&intersection.right, Vec::new(), repo)?;
            let node = if Arc::ptr_eq(&new_left, &intersection.left)
                && Arc::ptr_eq(&new_right, &intersection.right)
            {
                Arc::clone(plan)
            } else {
                Arc::new(RelationalPlan::Intersection(Intersection {
                    left: new_left,
                    right: new_right,
                    ..intersection.clone()
                }))
            };
            Ok((node, stay.into_iter().chain(kl).chain(kr).collect()))
        }

        RelationalPlan::Difference(difference) => {
            let left_defined = variable_ids(&difference.left);
            let (push, stay): (Vec<_>, Vec<_>) = terms
                .into_iter()
                .partition(|term| is_subset(&term_variables(term), &left_defined));
            let (new_left, kl) = sink(&difference.left, push, repo)?;
            let (new_right, kr) = sink(&difference.right, Vec::new(), repo)?;
            let node = if Arc::ptr_eq(&new_left, &difference.left)
                && Arc::ptr_eq(&new_right, &difference.right)
            {
                Arc::clone(plan)
            } else {
                Arc::new(RelationalPlan::Difference(Difference {
                    left: new_left,
                    right: new_right,
                    ..difference.clone()
                }))
            };
            Ok((node, stay.into_iter().chain(kl).chain(kr).collect()))
        }

        // sources and take operators: the terms land right here
        _ if plan.inputs().is_empty() => Ok((wrap_terms(Arc::clone(plan), terms), Vec::new())),

        // remaining single-input operators are no hosts for selections
        _ => {
            let inputs = plan.inputs();
            let mut transformed = Vec::with_capacity(inputs.len());
            let mut kept = Vec::new();
            for input in &inputs {
                let (new_input, mut leftover) = sink(input, Vec::new(), repo)?;
                kept.append(&mut leftover);
                transformed.push(if Arc::ptr_eq(&new_input, input) {
                    Transformed::No(new_input)
                } else {
                    Transformed::Yes(new_input)
                });
            }
            let node = crate::plan::relational::rebuild_with_inputs(plan, transformed).into_inner();
            Ok((node, terms.into_iter().chain(kept).collect()))
        }
    }
}

fn sink_filter(
    plan: &Arc<RelationalPlan>,
    filter: &Filter,
    terms: Vec<ScalarExpr>,
    repo: &TypeRepository,
) -> OptimizerResult<(Arc<RelationalPlan>, Vec<ScalarExpr>)> {
    let mut merged = filter.condition.clone().decompose_conjunction();
    merged.retain(|term| !term.is_literal_true());
    let original: Vec<ExprId> = merged.iter().map(ScalarExpr::id).collect();
    merged.extend(terms);
    let (new_input, kept) = sink(&filter.input, merged, repo)?;

    let unchanged = Arc::ptr_eq(&new_input, &filter.input)
        && kept.len() == original.len()
        && kept.iter().map(ScalarExpr::id).eq(original.iter().copied());
    if unchanged {
        return Ok((Arc::clone(plan), Vec::new()));
    }
    debug!("push-down rewrote filter; {} terms remain in place", kept.len());
    let condition = ScalarExpr::conjoin(kept)
        .unwrap_or_else(|| ScalarExpr::literal_true(repo.get(DataType::Boolean)));
    Ok((
        Arc::new(RelationalPlan::Filter(Filter {
            input: new_input,
            condition,
        })),
        Vec::new(),
    ))
}

fn sink_join(
    plan: &Arc<RelationalPlan>,
    join: &Join,
    terms: Vec<ScalarExpr>,
    repo: &TypeRepository,
) -> OptimizerResult<(Arc<RelationalPlan>, Vec<ScalarExpr>)> {
    match join.kind {
        JoinKind::Inner => {
            let left_defined = variable_ids(&join.left);
            let right_defined = variable_ids(&join.right);
            let mut left_terms = Vec::new();
            let mut right_terms = Vec::new();
            let mut condition_terms = Vec::new();
            for term in terms {
                let vars = term_variables(&term);
                if is_subset(&vars, &left_defined) {
                    left_terms.push(term);
                } else if is_subset(&vars, &right_defined) {
                    right_terms.push(term);
                } else {
                    condition_terms.push(term);
                }
            }
            let (new_left, kl) = sink(&join.left, left_terms, repo)?;
            let (new_right, kr) = sink(&join.right, right_terms, repo)?;
            condition_terms.extend(kl);
            condition_terms.extend(kr);

            let inputs_unchanged =
                Arc::ptr_eq(&new_left, &join.left) && Arc::ptr_eq(&new_right, &join.right);
            if condition_terms.is_empty() && inputs_unchanged {
                return Ok((Arc::clone(plan), Vec::new()));
            }
            let condition = if condition_terms.is_empty() {
                join.condition.clone()
            } else {
                let mut all = Vec::with_capacity(condition_terms.len() + 1);
                if let Some(existing) = &join.condition {
                    all.push(existing.clone());
                }
                all.extend(condition_terms);
                ScalarExpr::conjoin(all)
            };
            Ok((
                Arc::new(RelationalPlan::Join(Join {
                    left: new_left,
                    right: new_right,
                    condition,
                    ..join.clone()
                })),
                Vec::new(),
            ))
        }
        JoinKind::LeftOuter => {
            // right-only and mixed terms would change the padded rows
            let left_defined = variable_ids(&join.left);
            let (push, stay): (Vec<_>, Vec<_>) = terms
                .into_iter()
                .partition(|term| is_subset(&term_variables(term), &left_defined));
            let (new_left, kl) = sink(&join.left, push, repo)?;
            let (new_right, kr) = sink(&join.right, Vec::new(), repo)?;
            let node =
                if Arc::ptr_eq(&new_left, &join.left) && Arc::ptr_eq(&new_right, &join.right) {
                    Arc::clone(plan)
                } else {
                    Arc::new(RelationalPlan::Join(Join {
                        left: new_left,
                        right: new_right,
                        ..join.clone()
                    }))
                };
            Ok((node, stay.into_iter().chain(kl).chain(kr).collect()))
        }
        JoinKind::FullOuter => {
            let (new_left, kl) = sink(&join.left, Vec::new(), repo)?;
            let (new_right, kr) = sink(&join.right, Vec::new(), repo)?;
            let node =
                if Arc::ptr_eq(&new_left, &join.left) && Arc::ptr_eq(&new_right, &join.right) {
                    Arc::clone(plan)
                } else {
                    Arc::new(RelationalPlan::Join(Join {
                        left: new_left,
                        right: new_right,
                        ..join.clone()
                    }))
                };
            Ok((node, terms.into_iter().chain(kl).chain(kr).collect()))
        }
    }
}

fn sink_union(
    plan: &Arc<RelationalPlan>,
    union: &Union,
    terms: Vec<ScalarExpr>,
    repo: &TypeRepository,
) -> OptimizerResult<(Arc<RelationalPlan>, Vec<ScalarExpr>)> {
    let mut left_terms = Vec::new();
    let mut right_terms = Vec::new();
    let mut stay = Vec::new();
    if union.quantifier == SetQuantifier::All {
        let left_map: HashMap<u64, VariableDescriptor> = union
            .mappings
            .iter()
            .filter_map(|m| m.left.clone().map(|v| (m.destination.id(), v)))
            .collect();
        let right_map: HashMap<u64, VariableDescriptor> = union
            .mappings
            .iter()
            .filter_map(|m| m.right.clone().map(|v| (m.destination.id(), v)))
            .collect();
        for term in terms {
            match (
                substitute_variables(&term, &left_map),
                substitute_variables(&term, &right_map),
            ) {
                (Some(left_term), Some(right_term)) => {
                    left_terms.push(left_term);
                    right_terms.push(right_term);
                }
                _ => stay.push(term),
            }
        }
    } else {
        stay = terms;
    }
    let (new_left, kl) = sink(&union.left, left_terms, repo)?;
    let (new_right, kr) = sink(&union.right, right_terms, repo)?;
    let node = if Arc::ptr_eq(&new_left, &union.left) && Arc::ptr_eq(&new_right, &union.right) {
        Arc::clone(plan)
    } else {
        Arc::new(RelationalPlan::Union(Union {
            left: new_left,
            right: new_right,
            ..union.clone()
        }))
    };
    Ok((node, stay.into_iter().chain(kl).chain(kr).collect()))
}

fn variable_ids(plan: &RelationalPlan) -> HashSet<u64> {
    plan.output_variables().iter().map(|v| v.id()).collect()
}

fn is_subset(vars: &HashSet<u64>, defined: &HashSet<u64>) -> bool {
    vars.iter().all(|v| defined.contains(v))
}

/// Non-external variables a term references, skipping let-bound locals.
fn term_variables(expr: &ScalarExpr) -> HashSet<u64> {
    let mut out = HashSet::new();
    let mut bound = Vec::new();
    collect_term_variables(expr, &mut bound, &mut out);
    out
}

fn collect_term_variables(expr: &ScalarExpr, bound: &mut Vec<u64>, out: &mut HashSet<u64>) {
    match expr {
        ScalarExpr::Immediate(_) => {}
        ScalarExpr::VariableReference(reference) => {
            let id = reference.variable.id();
            if reference.variable.kind() != VariableKind::ExternalVariable && !bound.contains(&id) {
                out.insert(id);
            }
        }
        ScalarExpr::Unary(e) => collect_term_variables(&e.operand, bound, out),
        ScalarExpr::Cast(e) => collect_term_variables(&e.operand, bound, out),
        ScalarExpr::Binary(e) => {
            collect_term_variables(&e.left, bound, out);
            collect_term_variables(&e.right, bound, out);
        }
        ScalarExpr::Compare(e) => {
            collect_term_variables(&e.left, bound, out);
            collect_term_variables(&e.right, bound, out);
        }
        ScalarExpr::Match(e) => {
            collect_term_variables(&e.input, bound, out);
            collect_term_variables(&e.pattern, bound, out);
            collect_term_variables(&e.escape, bound, out);
        }
        ScalarExpr::Conditional(e) => {
            for alternative in &e.alternatives {
                collect_term_variables(&alternative.condition, bound, out);
                collect_term_variables(&alternative.body, bound, out);
            }
            if let Some(default_expression) = &e.default_expression {
                collect_term_variables(default_expression, bound, out);
            }
        }
        ScalarExpr::Coalesce(e) => {
            for alternative in &e.alternatives {
                collect_term_variables(alternative, bound, out);
            }
        }
        ScalarExpr::Let(e) => {
            let depth = bound.len();
            for declarator in &e.variables {
                collect_term_variables(&declarator.value, bound, out);
                bound.push(declarator.variable.id());
            }
            collect_term_variables(&e.body, bound, out);
            bound.truncate(depth);
        }
        ScalarExpr::FunctionCall(e) => {
            for argument in &e.arguments {
                collect_term_variables(argument, bound, out);
            }
        }
        ScalarExpr::AggregateFunctionCall(e) => {
            for argument in &e.arguments {
                collect_term_variables(argument, bound, out);
            }
        }
    }
}

/// Rewrites a term over union output columns into one over a branch's own
/// columns; `None` when some column has no mapping on that branch.
fn substitute_variables(
    expr: &ScalarExpr,
    mapping: &HashMap<u64, VariableDescriptor>,
) -> Option<ScalarExpr> {
    match expr {
        ScalarExpr::Immediate(e) => Some(ScalarExpr::immediate(
            e.value.clone(),
            Arc::clone(&e.data_type),
        )),
        ScalarExpr::VariableReference(reference) => {
            if reference.variable.kind() == VariableKind::ExternalVariable {
                return Some(ScalarExpr::variable(reference.variable.clone()));
            }
            mapping
                .get(&reference.variable.id())
                .map(|variable| ScalarExpr::variable(variable.clone()))
        }
        ScalarExpr::Unary(e) => Some(ScalarExpr::unary(
            e.operator,
            substitute_variables(&e.operand, mapping)?,
        )),
        ScalarExpr::Cast(e) => Some(ScalarExpr::cast(
            substitute_variables(&e.operand, mapping)?,
            Arc::clone(&e.data_type),
        )),
        ScalarExpr::Binary(e) => Some(ScalarExpr::binary(
            e.operator,
            substitute_variables(&e.left, mapping)?,
            substitute_variables(&e.right, mapping)?,
        )),
        ScalarExpr::Compare(e) => Some(ScalarExpr::compare(
            e.operator,
            substitute_variables(&e.left, mapping)?,
            substitute_variables(&e.right, mapping)?,
        )),
        ScalarExpr::Match(e) => Some(ScalarExpr::match_expr(
            substitute_variables(&e.input, mapping)?,
            substitute_variables(&e.pattern, mapping)?,
            substitute_variables(&e.escape, mapping)?,
        )),
        ScalarExpr::Coalesce(e) => {
            let mut alternatives = Vec::with_capacity(e.alternatives.len());
            for alternative in &e.alternatives {
                alternatives.push(substitute_variables(alternative, mapping)?);
            }
            Some(ScalarExpr::coalesce(alternatives))
        }
        ScalarExpr::Conditional(e) => {
            let mut alternatives = Vec::with_capacity(e.alternatives.len());
            for alternative in &e.alternatives {
                alternatives.push(crate::expr::Alternative {
                    condition: substitute_variables(&alternative.condition, mapping)?,
                    body: substitute_variables(&alternative.body, mapping)?,
                });
            }
            let default_expression = match &e.default_expression {
                Some(default_expression) => Some(substitute_variables(default_expression, mapping)?),
                None => None,
            };
            Some(ScalarExpr::conditional(alternatives, default_expression))
        }
        ScalarExpr::FunctionCall(e) => {
            let mut arguments = Vec::with_capacity(e.arguments.len());
            for argument in &e.arguments {
                arguments.push(substitute_variables(argument, mapping)?);
            }
            Some(ScalarExpr::function_call(Arc::clone(&e.function), arguments))
        }
        // let-bound locals and aggregates do not cross a union boundary
        ScalarExpr::Let(_) | ScalarExpr::AggregateFunctionCall(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::table::{ColumnDeclaration, IndexDeclaration, TableDeclaration};
    use crate::expr::{BinaryOperator, ComparisonOperator};
    use crate::optimizer::optimizer_pass::PlanContext;
    use crate::plan::relational::{
        ColumnMapping, Emit, EmitColumn, Scan, ScanBound, UnionMapping,
    };
    use crate::types::repository::default_repository;
    use crate::value::Value;

    fn scan_fixture(name: &str) -> (Arc<RelationalPlan>, Vec<VariableDescriptor>) {
        let repo = default_repository();
        let c0 = Arc::new(ColumnDeclaration::new("c0", repo.get(DataType::Int8)));
        let c1 = Arc::new(ColumnDeclaration::new("c1", repo.get(DataType::Int8)));
        let table = Arc::new(TableDeclaration::new(name, vec![c0, c1]));
        let index = Arc::new(IndexDeclaration::primary_of(table, &["c0"]));
        let columns: Vec<ColumnMapping> = index
            .table()
            .columns()
            .iter()
            .map(|column| {
                ColumnMapping::new(
                    VariableDescriptor::table_column(Arc::clone(column)),
                    VariableDescriptor::stream(column.name()),
                )
            })
            .collect();
        let outputs = columns.iter().map(|c| c.destination.clone()).collect();
        let scan = Arc::new(RelationalPlan::Scan(Scan {
            source: index,
            columns,
            lower: ScanBound::unbound(),
            upper: ScanBound::unbound(),
            limit: None,
        }));
        (scan, outputs)
    }

    fn var(descriptor: &VariableDescriptor) -> ScalarExpr {
        ScalarExpr::variable(descriptor.clone())
    }

    fn eq_const(descriptor: &VariableDescriptor, value: i32) -> ScalarExpr {
        ScalarExpr::compare(
            ComparisonOperator::Equal,
            var(descriptor),
            ScalarExpr::immediate(Value::Int4(value), default_repository().get(DataType::Int4)),
        )
    }

    fn run(plan: Arc<RelationalPlan>) -> Transformed<Arc<RelationalPlan>> {
        let mut ctx = PlanContext::new(default_repository());
        PushDownFilters::new().optimize(plan, &mut ctx).unwrap()
    }

    #[test]
    fn filter_moves_to_the_scan_side() {
        let (scan, outputs) = scan_fixture("t");
        let condition = ScalarExpr::compare(
            ComparisonOperator::Less,
            var(&outputs[0]),
            var(&outputs[1]),
        );
        let condition_id = condition.id();
        let filter = Arc::new(RelationalPlan::Filter(Filter {
            input: Arc::clone(&scan),
            condition,
        }));
        let emit = Arc::new(RelationalPlan::Emit(Emit {
            input: filter,
            columns: vec![EmitColumn {
                source: outputs[0].clone(),
                name: None,
            }],
        }));

        let result = run(emit);
        assert!(result.is_yes());
        let plan = result.into_inner();
        let RelationalPlan::Emit(emit) = plan.as_ref() else {
            panic!("expected emit at the root");
        };
        let RelationalPlan::Filter(original_slot) = emit.input.as_ref() else {
            panic!("expected the original filter slot");
        };
        assert!(original_slot.condition.is_literal_true());
        let RelationalPlan::Filter(moved) = original_slot.input.as_ref() else {
            panic!("expected the pushed filter above the scan");
        };
        assert_eq!(moved.condition.id(), condition_id);
        assert!(Arc::ptr_eq(&moved.input, &scan));
    }

    #[test]
    fn inner_join_splits_terms_between_side_and_condition() {
        let (scan_left, left) = scan_fixture("l");
        let (scan_right, right) = scan_fixture("r");
        let join = Arc::new(RelationalPlan::Join(Join::on_condition(
            Arc::clone(&scan_left),
            Arc::clone(&scan_right),
            JoinKind::Inner,
            None,
        )));
        let mixed = ScalarExpr::compare(
            ComparisonOperator::Equal,
            var(&left[0]),
            var(&right[0]),
        );
        let mixed_id = mixed.id();
        let left_only = eq_const(&left[0], 1);
        let left_only_id = left_only.id();
        let filter = Arc::new(RelationalPlan::Filter(Filter {
            input: join,
            condition: ScalarExpr::binary(BinaryOperator::ConditionalAnd, mixed, left_only),
        }));

        let plan = run(filter).into_inner();
        let RelationalPlan::Filter(original_slot) = plan.as_ref() else {
            panic!("expected the original filter slot");
        };
        assert!(original_slot.condition.is_literal_true());
        let RelationalPlan::Join(join) = original_slot.input.as_ref() else {
            panic!("expected the join below the emptied filter");
        };
        assert_eq!(join.condition.as_ref().map(ScalarExpr::id), Some(mixed_id));
        let RelationalPlan::Filter(left_filter) = join.left.as_ref() else {
            panic!("expected a filter above the left scan");
        };
        assert_eq!(left_filter.condition.id(), left_only_id);
        assert!(Arc::ptr_eq(&left_filter.input, &scan_left));
        assert!(Arc::ptr_eq(&join.right, &scan_right));
    }

    #[test]
    fn left_outer_join_keeps_right_terms_downstream() {
        let (scan_left, left) = scan_fixture("l");
        let (scan_right, right) = scan_fixture("r");
        let join = Arc::new(RelationalPlan::Join(Join::on_condition(
            scan_left,
            scan_right,
            JoinKind::LeftOuter,
            None,
        )));
        let right_only = eq_const(&right[0], 1);
        let right_only_id = right_only.id();
        let left_only = eq_const(&left[0], 2);
        let left_only_id = left_only.id();
        let filter = Arc::new(RelationalPlan::Filter(Filter {
            input: join,
            condition: ScalarExpr::binary(BinaryOperator::ConditionalAnd, right_only, left_only),
        }));

        let plan = run(filter).into_inner();
        let RelationalPlan::Filter(original_slot) = plan.as_ref() else {
            panic!("expected the filter to survive");
        };
        // the right-side term stays downstream of the join
        assert_eq!(original_slot.condition.id(), right_only_id);
        let RelationalPlan::Join(join) = original_slot.input.as_ref() else {
            panic!("expected the join");
        };
        assert!(join.condition.is_none());
        let RelationalPlan::Filter(left_filter) = join.left.as_ref() else {
            panic!("expected the left-only term above the left input");
        };
        assert_eq!(left_filter.condition.id(), left_only_id);
    }

    #[test]
    fn full_outer_join_admits_no_push_down() {
        let (scan_left, left) = scan_fixture("l");
        let (scan_right, _) = scan_fixture("r");
        let join = Arc::new(RelationalPlan::Join(Join::on_condition(
            scan_left,
            scan_right,
            JoinKind::FullOuter,
            None,
        )));
        let filter = Arc::new(RelationalPlan::Filter(Filter {
            input: join,
            condition: eq_const(&left[0], 1),
        }));
        let result = run(Arc::clone(&filter));
        assert!(!result.is_yes());
        assert!(Arc::ptr_eq(&result.into_inner(), &filter));
    }

    #[test]
    fn distinct_duplicates_group_key_terms() {
        let (scan, outputs) = scan_fixture("t");
        let distinct = Arc::new(RelationalPlan::Distinct(Distinct {
            input: Arc::clone(&scan),
            group_keys: outputs.clone(),
        }));
        let term = eq_const(&outputs[0], 1);
        let term_id = term.id();
        let filter = Arc::new(RelationalPlan::Filter(Filter {
            input: distinct,
            condition: term,
        }));

        let plan = run(filter).into_inner();
        let RelationalPlan::Filter(downstream) = plan.as_ref() else {
            panic!("expected the downstream copy");
        };
        assert_eq!(downstream.condition.id(), term_id);
        let RelationalPlan::Distinct(distinct) = downstream.input.as_ref() else {
            panic!("expected the distinct");
        };
        let RelationalPlan::Filter(upstream) = distinct.input.as_ref() else {
            panic!("expected the upstream copy");
        };
        assert_eq!(upstream.condition.id(), term_id);
        assert!(Arc::ptr_eq(&upstream.input, &scan));
    }

    #[test]
    fn global_limit_blocks_push_down() {
        let (scan, outputs) = scan_fixture("t");
        let limit = Arc::new(RelationalPlan::Limit(Limit {
            input: scan,
            count: Some(10),
            group_keys: vec![],
            sort_keys: vec![],
        }));
        let filter = Arc::new(RelationalPlan::Filter(Filter {
            input: limit,
            condition: eq_const(&outputs[0], 1),
        }));
        let result = run(Arc::clone(&filter));
        assert!(!result.is_yes());
    }

    #[test]
    fn union_all_pushes_substituted_terms_into_both_branches() {
        let (scan_left, left) = scan_fixture("l");
        let (scan_right, right) = scan_fixture("r");
        let destination = VariableDescriptor::stream("d0");
        let union = Arc::new(RelationalPlan::Union(Union {
            left: Arc::clone(&scan_left),
            right: Arc::clone(&scan_right),
            quantifier: SetQuantifier::All,
            mappings: vec![UnionMapping {
                left: Some(left[0].clone()),
                right: Some(right[0].clone()),
                destination: destination.clone(),
            }],
        }));
        let filter = Arc::new(RelationalPlan::Filter(Filter {
            input: union,
            condition: eq_const(&destination, 7),
        }));

        let plan = run(filter).into_inner();
        let RelationalPlan::Filter(original_slot) = plan.as_ref() else {
            panic!("expected the original filter slot");
        };
        assert!(original_slot.condition.is_literal_true());
        let RelationalPlan::Union(union) = original_slot.input.as_ref() else {
            panic!("expected the union");
        };
        let RelationalPlan::Filter(left_filter) = union.left.as_ref() else {
            panic!("expected a filter in the left branch");
        };
        let ScalarExpr::Compare(compare) = &left_filter.condition else {
            panic!("expected a comparison");
        };
        assert_eq!(compare.left.as_variable(), Some(&left[0]));
        let RelationalPlan::Filter(right_filter) = union.right.as_ref() else {
            panic!("expected a filter in the right branch");
        };
        let ScalarExpr::Compare(compare) = &right_filter.condition else {
            panic!("expected a comparison");
        };
        assert_eq!(compare.left.as_variable(), Some(&right[0]));
    }

    #[test]
    fn stacked_filters_merge_into_one_upstream_filter() {
        let (scan, outputs) = scan_fixture("t");
        let inner_term = eq_const(&outputs[0], 1);
        let inner_id = inner_term.id();
        let outer_term = eq_const(&outputs[1], 2);
        let outer_id = outer_term.id();
        let inner = Arc::new(RelationalPlan::Filter(Filter {
            input: scan,
            condition: inner_term,
        }));
        let outer = Arc::new(RelationalPlan::Filter(Filter {
            input: inner,
            condition: outer_term,
        }));

        let plan = run(outer).into_inner();
        let RelationalPlan::Filter(outer_slot) = plan.as_ref() else {
            panic!("expected the outer filter slot");
        };
        assert!(outer_slot.condition.is_literal_true());
        let RelationalPlan::Filter(inner_slot) = outer_slot.input.as_ref() else {
            panic!("expected the inner filter slot");
        };
        assert!(inner_slot.condition.is_literal_true());
        let RelationalPlan::Filter(merged) = inner_slot.input.as_ref() else {
            panic!("expected the merged filter above the scan");
        };
        let ids: Vec<_> = merged
            .condition
            .clone()
            .decompose_conjunction()
            .iter()
            .map(ScalarExpr::id)
            .collect();
        // the inner filter's own terms precede the merged-in downstream terms
        assert_eq!(ids, vec![inner_id, outer_id]);
    }
}
