use std::collections::HashMap;
use std::sync::Arc;

use crate::binding::resolution::VariableResolution;
use crate::binding::{BindingError, VariableDescriptor};
use crate::expr::ExprId;
use crate::types::data_type::DataType;

/// Resolved types of scalar expressions, keyed by expression identity.
///
/// Insertion is monotonic within one analysis run; rebinding with a
/// different type without `overwrite` is a programming error, not a
/// diagnostic.
#[derive(Debug, Default)]
pub struct ExpressionTable {
    entries: HashMap<ExprId, Arc<DataType>>,
}

impl ExpressionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, id: ExprId) -> Option<Arc<DataType>> {
        self.entries.get(&id).cloned()
    }

    pub fn bind(
        &mut self,
        id: ExprId,
        ty: Arc<DataType>,
        overwrite: bool,
    ) -> Result<Arc<DataType>, BindingError> {
        if let Some(existing) = self.entries.get(&id) {
            if *existing == ty {
                return Ok(ty);
            }
            if !overwrite {
                return Err(BindingError::ExpressionRebind {
                    existing: existing.to_string(),
                    incoming: ty.to_string(),
                });
            }
        }
        self.entries.insert(id, Arc::clone(&ty));
        Ok(ty)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolutions of variable descriptors.
#[derive(Debug, Default)]
pub struct VariableTable {
    entries: HashMap<VariableDescriptor, VariableResolution>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, variable: &VariableDescriptor) -> Option<VariableResolution> {
        self.entries.get(variable).cloned()
    }

    pub fn bind(
        &mut self,
        variable: &VariableDescriptor,
        resolution: VariableResolution,
        overwrite: bool,
    ) -> Result<VariableResolution, BindingError> {
        if let Some(existing) = self.entries.get(variable) {
            if *existing == resolution {
                return Ok(resolution);
            }
            if !overwrite {
                return Err(BindingError::VariableRebind {
                    variable: variable.to_string(),
                });
            }
        }
        self.entries.insert(variable.clone(), resolution.clone());
        Ok(resolution)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ScalarExpr;
    use crate::types::repository::default_repository;
    use crate::value::Value;

    #[test]
    fn expression_bind_is_monotonic() {
        let repo = default_repository();
        let mut table = ExpressionTable::new();
        let expr = ScalarExpr::immediate(Value::Int4(1), repo.get(DataType::Int4));
        let id = expr.id();

        table.bind(id, repo.get(DataType::Int4), false).unwrap();
        // rebinding with an equal type is a no-op
        table.bind(id, repo.get(DataType::Int4), false).unwrap();
        assert_eq!(table.len(), 1);

        let err = table.bind(id, repo.get(DataType::Int8), false).unwrap_err();
        assert!(matches!(err, BindingError::ExpressionRebind { .. }));

        table.bind(id, repo.get(DataType::Int8), true).unwrap();
        assert_eq!(*table.find(id).unwrap(), DataType::Int8);
    }

    #[test]
    fn variable_bind_checks_resolution_equality() {
        let repo = default_repository();
        let mut table = VariableTable::new();
        let variable = VariableDescriptor::stream("v");

        table
            .bind(
                &variable,
                VariableResolution::Unknown(repo.get(DataType::Int4)),
                false,
            )
            .unwrap();
        table
            .bind(
                &variable,
                VariableResolution::Unknown(repo.get(DataType::Int4)),
                false,
            )
            .unwrap();

        let err = table
            .bind(
                &variable,
                VariableResolution::Unknown(repo.get(DataType::Int8)),
                false,
            )
            .unwrap_err();
        assert!(matches!(err, BindingError::VariableRebind { .. }));

        table
            .bind(
                &variable,
                VariableResolution::Unknown(repo.get(DataType::Int8)),
                true,
            )
            .unwrap();
        assert_eq!(table.len(), 1);
    }
}
