use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::function::FunctionDeclaration;
use crate::catalog::variable::Criteria;
use crate::types::data_type::DataType;
use crate::value::Value;

/// A sequence generator referenced by column defaults.
#[derive(Debug)]
pub struct SequenceDeclaration {
    name: String,
}

impl SequenceDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        SequenceDeclaration { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// The default-value clause of a table column.
#[derive(Debug, Clone, Default)]
pub enum ColumnValue {
    #[default]
    None,
    Immediate(Value),
    Sequence(Arc<SequenceDeclaration>),
    Function(Arc<FunctionDeclaration>),
}

#[derive(Debug)]
pub struct ColumnDeclaration {
    name: String,
    data_type: Arc<DataType>,
    criteria: Criteria,
    default_value: ColumnValue,
}

impl ColumnDeclaration {
    pub fn new(name: impl Into<String>, data_type: Arc<DataType>) -> Self {
        ColumnDeclaration {
            name: name.into(),
            data_type,
            criteria: Criteria::default(),
            default_value: ColumnValue::None,
        }
    }

    pub fn with_criteria(mut self, criteria: Criteria) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn with_default_value(mut self, default_value: ColumnValue) -> Self {
        self.default_value = default_value;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &Arc<DataType> {
        &self.data_type
    }

    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    pub fn default_value(&self) -> &ColumnValue {
        &self.default_value
    }
}

#[derive(Debug)]
pub struct TableDeclaration {
    name: String,
    columns: Vec<Arc<ColumnDeclaration>>,
}

impl TableDeclaration {
    pub fn new(name: impl Into<String>, columns: Vec<Arc<ColumnDeclaration>>) -> Self {
        TableDeclaration {
            name: name.into(),
            columns,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Arc<ColumnDeclaration>] {
        &self.columns
    }

    pub fn find_column(&self, name: &str) -> Option<&Arc<ColumnDeclaration>> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// Whether the given column declaration belongs to this table.
    pub fn owns_column(&self, column: &Arc<ColumnDeclaration>) -> bool {
        self.columns.iter().any(|c| Arc::ptr_eq(c, column))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascendant,
    Descendant,
}

/// Access paths an index supports: `scan` for range access, `find` for
/// point access.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexFeatures {
    pub primary: bool,
    pub scan: bool,
    pub find: bool,
}

impl IndexFeatures {
    pub fn full() -> Self {
        IndexFeatures {
            primary: true,
            scan: true,
            find: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexKey {
    pub column: Arc<ColumnDeclaration>,
    pub direction: SortDirection,
}

impl IndexKey {
    pub fn new(column: Arc<ColumnDeclaration>) -> Self {
        IndexKey {
            column,
            direction: SortDirection::Ascendant,
        }
    }
}

#[derive(Debug)]
pub struct IndexDeclaration {
    name: String,
    table: Arc<TableDeclaration>,
    keys: Vec<IndexKey>,
    features: IndexFeatures,
}

impl IndexDeclaration {
    pub fn new(
        name: impl Into<String>,
        table: Arc<TableDeclaration>,
        keys: Vec<IndexKey>,
        features: IndexFeatures,
    ) -> Self {
        IndexDeclaration {
            name: name.into(),
            table,
            keys,
            features,
        }
    }

    /// The primary index of a table, keyed by the given column names.
    pub fn primary_of(table: Arc<TableDeclaration>, key_names: &[&str]) -> Self {
        let keys = key_names
            .iter()
            .filter_map(|name| table.find_column(name).cloned())
            .map(IndexKey::new)
            .collect();
        IndexDeclaration {
            name: table.name().to_string(),
            table,
            keys,
            features: IndexFeatures::full(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &Arc<TableDeclaration> {
        &self.table
    }

    pub fn keys(&self) -> &[IndexKey] {
        &self.keys
    }

    pub fn features(&self) -> IndexFeatures {
        self.features
    }
}
