//! Removal of `filter(true)` nodes left behind by push-down.

use std::sync::Arc;

use crate::optimizer::optimizer_pass::{OptimizerPass, OptimizerResult, PlanContext};
use crate::optimizer::transformed::Transformed;
use crate::plan::relational::{RelationalPlan, rebuild_with_inputs};

pub struct RemoveTrivialFilters;

impl RemoveTrivialFilters {
    pub fn new() -> Self {
        RemoveTrivialFilters
    }
}

impl OptimizerPass for RemoveTrivialFilters {
    fn optimize(
        &self,
        plan: Arc<RelationalPlan>,
        _ctx: &mut PlanContext<'_>,
    ) -> OptimizerResult<Transformed<Arc<RelationalPlan>>> {
        Ok(rewrite(&plan))
    }
}

fn rewrite(plan: &Arc<RelationalPlan>) -> Transformed<Arc<RelationalPlan>> {
    if let RelationalPlan::Filter(filter) = plan.as_ref() {
        if filter.condition.is_literal_true() {
            return Transformed::Yes(rewrite(&filter.input).into_inner());
        }
    }
    let inputs = plan.inputs();
    let mut transformed = Vec::with_capacity(inputs.len());
    for input in inputs {
        transformed.push(rewrite(input));
    }
    rebuild_with_inputs(plan, transformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ScalarExpr;
    use crate::optimizer::optimizer_pass::PlanContext;
    use crate::plan::relational::{Filter, Values};
    use crate::types::data_type::DataType;
    use crate::types::repository::default_repository;
    use crate::value::Value;

    #[test]
    fn trivial_filters_are_removed_recursively() {
        let repo = default_repository();
        let source = Arc::new(RelationalPlan::Values(Values {
            columns: vec![],
            rows: vec![],
        }));
        let inner = Arc::new(RelationalPlan::Filter(Filter {
            input: Arc::clone(&source),
            condition: ScalarExpr::literal_true(repo.get(DataType::Boolean)),
        }));
        let kept = Arc::new(RelationalPlan::Filter(Filter {
            input: inner,
            condition: ScalarExpr::immediate(Value::Boolean(false), repo.get(DataType::Boolean)),
        }));
        let outer = Arc::new(RelationalPlan::Filter(Filter {
            input: kept,
            condition: ScalarExpr::literal_true(repo.get(DataType::Boolean)),
        }));

        let mut ctx = PlanContext::new(repo);
        let result = RemoveTrivialFilters::new().optimize(outer, &mut ctx).unwrap();
        assert!(result.is_yes());
        let plan = result.into_inner();
        let RelationalPlan::Filter(filter) = plan.as_ref() else {
            panic!("the non-trivial filter must survive");
        };
        assert!(!filter.condition.is_literal_true());
        assert!(Arc::ptr_eq(&filter.input, &source));
    }

    #[test]
    fn plans_without_trivial_filters_are_untouched() {
        let repo = default_repository();
        let source = Arc::new(RelationalPlan::Values(Values {
            columns: vec![],
            rows: vec![],
        }));
        let filter = Arc::new(RelationalPlan::Filter(Filter {
            input: source,
            condition: ScalarExpr::immediate(Value::Boolean(false), repo.get(DataType::Boolean)),
        }));
        let mut ctx = PlanContext::new(repo);
        let result = RemoveTrivialFilters::new()
            .optimize(Arc::clone(&filter), &mut ctx)
            .unwrap();
        assert!(!result.is_yes());
        assert!(Arc::ptr_eq(&result.into_inner(), &filter));
    }
}
