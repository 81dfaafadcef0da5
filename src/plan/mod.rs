//! The plan data model: relational operators (intermediate and step forms),
//! exchange steps, and top-level statements.

pub mod relational;
pub mod statement;
pub mod step;

pub use relational::RelationalPlan;
pub use statement::Statement;
pub use step::{Exchange, ExchangeKind, Step, StepGraph, StepId};
