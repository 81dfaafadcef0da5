use std::sync::Arc;

use crate::types::data_type::DataType;

/// A scalar function declaration provided by the function catalog.
#[derive(Debug)]
pub struct FunctionDeclaration {
    definition_id: u64,
    name: String,
    return_type: Arc<DataType>,
    parameter_types: Vec<Arc<DataType>>,
}

impl FunctionDeclaration {
    pub fn new(
        definition_id: u64,
        name: impl Into<String>,
        return_type: Arc<DataType>,
        parameter_types: Vec<Arc<DataType>>,
    ) -> Self {
        FunctionDeclaration {
            definition_id,
            name: name.into(),
            return_type,
            parameter_types,
        }
    }

    pub fn definition_id(&self) -> u64 {
        self.definition_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn return_type(&self) -> &Arc<DataType> {
        &self.return_type
    }

    pub fn parameter_types(&self) -> &[Arc<DataType>] {
        &self.parameter_types
    }
}

/// An aggregate function declaration.
///
/// `incremental` marks functions whose partial results can be combined, so
/// the planner may pre-aggregate them inside an exchange.
#[derive(Debug)]
pub struct AggregateFunctionDeclaration {
    definition_id: u64,
    name: String,
    return_type: Arc<DataType>,
    parameter_types: Vec<Arc<DataType>>,
    incremental: bool,
}

impl AggregateFunctionDeclaration {
    pub fn new(
        definition_id: u64,
        name: impl Into<String>,
        return_type: Arc<DataType>,
        parameter_types: Vec<Arc<DataType>>,
        incremental: bool,
    ) -> Self {
        AggregateFunctionDeclaration {
            definition_id,
            name: name.into(),
            return_type,
            parameter_types,
            incremental,
        }
    }

    pub fn definition_id(&self) -> u64 {
        self.definition_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn return_type(&self) -> &Arc<DataType> {
        &self.return_type
    }

    pub fn parameter_types(&self) -> &[Arc<DataType>] {
        &self.parameter_types
    }

    pub fn incremental(&self) -> bool {
        self.incremental
    }
}
