use std::sync::Arc;

use crate::optimizer::errors::OptimizerError;
use crate::optimizer::transformed::Transformed;
use crate::plan::relational::RelationalPlan;
use crate::types::repository::TypeRepository;

pub type OptimizerResult<T> = Result<T, OptimizerError>;

/// Shared state handed to every optimizer pass.
pub struct PlanContext<'a> {
    pub repository: &'a TypeRepository,
}

impl<'a> PlanContext<'a> {
    pub fn new(repository: &'a TypeRepository) -> Self {
        PlanContext { repository }
    }
}

pub trait OptimizerPass {
    fn optimize(
        &self,
        plan: Arc<RelationalPlan>,
        ctx: &mut PlanContext<'_>,
    ) -> OptimizerResult<Transformed<Arc<RelationalPlan>>>;
}
