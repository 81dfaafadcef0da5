use std::fmt;
use std::sync::Arc;

use crate::catalog::function::{AggregateFunctionDeclaration, FunctionDeclaration};
use crate::catalog::table::ColumnDeclaration;
use crate::catalog::variable::VariableDeclaration;
use crate::expr::ExprId;
use crate::types::data_type::DataType;

/// The semantic meaning bound to a variable descriptor.
///
/// Declarations are held by non-owning shared handles into the catalog;
/// scalar expressions are referenced by their stamped identity and looked up
/// through the expression table.
#[derive(Debug, Clone, Default)]
pub enum VariableResolution {
    #[default]
    Unresolved,
    Unknown(Arc<DataType>),
    ScalarExpression(ExprId),
    TableColumn(Arc<ColumnDeclaration>),
    External(Arc<VariableDeclaration>),
    FunctionCall(Arc<FunctionDeclaration>),
    Aggregation(Arc<AggregateFunctionDeclaration>),
}

impl VariableResolution {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, VariableResolution::Unresolved)
    }

    pub fn as_table_column(&self) -> Option<&Arc<ColumnDeclaration>> {
        match self {
            VariableResolution::TableColumn(column) => Some(column),
            _ => None,
        }
    }
}

impl PartialEq for VariableResolution {
    fn eq(&self, other: &Self) -> bool {
        use VariableResolution::*;
        match (self, other) {
            (Unresolved, Unresolved) => true,
            (Unknown(a), Unknown(b)) => a == b,
            (ScalarExpression(a), ScalarExpression(b)) => a == b,
            (TableColumn(a), TableColumn(b)) => Arc::ptr_eq(a, b),
            (External(a), External(b)) => Arc::ptr_eq(a, b),
            (FunctionCall(a), FunctionCall(b)) => Arc::ptr_eq(a, b),
            (Aggregation(a), Aggregation(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for VariableResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableResolution::Unresolved => f.write_str("unresolved"),
            VariableResolution::Unknown(ty) => write!(f, "unknown({ty})"),
            VariableResolution::ScalarExpression(id) => write!(f, "scalar_expression({id})"),
            VariableResolution::TableColumn(column) => write!(f, "table_column({})", column.name()),
            VariableResolution::External(declaration) => {
                write!(f, "external({})", declaration.name())
            }
            VariableResolution::FunctionCall(declaration) => {
                write!(f, "function_call({})", declaration.name())
            }
            VariableResolution::Aggregation(declaration) => {
                write!(f, "aggregation({})", declaration.name())
            }
        }
    }
}
