//! Plan rewriters: selection push-down, disjunction-range decomposition,
//! trivial-filter removal, and the lowering of intermediate plans into
//! step plans with explicit exchanges.

use std::sync::Arc;

use crate::plan::relational::RelationalPlan;

pub mod collect_exchange_steps;
pub mod decompose_disjunction_range;
pub mod errors;
pub mod optimizer_pass;
pub mod push_down_filters;
pub mod range_hint;
pub mod remove_trivial_filters;
pub mod transformed;

pub use collect_exchange_steps::{
    CollectExchangeStepsOptions, JoinStrategy, PlanRef, RuntimeFeatures, collect_exchange_steps,
};
pub use decompose_disjunction_range::DecomposeDisjunctionRange;
pub use errors::OptimizerError;
pub use optimizer_pass::{OptimizerPass, OptimizerResult, PlanContext};
pub use push_down_filters::PushDownFilters;
pub use remove_trivial_filters::RemoveTrivialFilters;
pub use transformed::Transformed;

/// Runs the structural rewrites that precede exchange collection.
pub fn optimize(
    plan: Arc<RelationalPlan>,
    ctx: &mut PlanContext<'_>,
) -> OptimizerResult<Arc<RelationalPlan>> {
    let push_down_filters = PushDownFilters::new();
    let transformed_plan = push_down_filters.optimize(plan, ctx)?;
    let plan = transformed_plan.into_inner();

    let decompose_disjunction_range = DecomposeDisjunctionRange::new();
    let transformed_plan = decompose_disjunction_range.optimize(plan, ctx)?;
    let plan = transformed_plan.into_inner();

    let remove_trivial_filters = RemoveTrivialFilters::new();
    let transformed_plan = remove_trivial_filters.optimize(plan, ctx)?;
    Ok(transformed_plan.into_inner())
}
