use std::fmt::Display;

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum Pass {
    PushDownFilters,
    DecomposeDisjunctionRange,
    CollectExchangeSteps,
    RemoveTrivialFilters,
}

impl Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pass::PushDownFilters => write!(f, "PushDownFilters"),
            Pass::DecomposeDisjunctionRange => write!(f, "DecomposeDisjunctionRange"),
            Pass::CollectExchangeSteps => write!(f, "CollectExchangeSteps"),
            Pass::RemoveTrivialFilters => write!(f, "RemoveTrivialFilters"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum OptimizerError {
    #[error("{pass}: join endpoints declare no equality keys for the cogroup strategy")]
    MissingEqualityKeys { pass: Pass },
    #[error("{pass}: broadcast strategy requires key endpoints on the join")]
    MissingBroadcastKeys { pass: Pass },
    #[error("{pass}: step operator {operator} is not expected in an intermediate plan")]
    UnexpectedStepOperator { pass: Pass, operator: String },
    #[error("{pass}: column {column} is not produced by the operator input")]
    UnknownColumn { pass: Pass, column: String },
}
