//! Variable descriptors and the resolutions bound to them.
//!
//! A descriptor is an opaque identity: two descriptors compare equal iff
//! they denote the same underlying binding, regardless of how often they
//! were cloned into plan nodes.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use crate::catalog::table::ColumnDeclaration;
use crate::catalog::variable::VariableDeclaration;

mod resolution;
mod tables;

pub use resolution::VariableResolution;
pub use tables::{ExpressionTable, VariableTable};

static NEXT_VARIABLE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    TableColumn,
    ExchangeColumn,
    FrameVariable,
    StreamVariable,
    LocalVariable,
    ExternalVariable,
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableKind::TableColumn => f.write_str("table_column"),
            VariableKind::ExchangeColumn => f.write_str("exchange_column"),
            VariableKind::FrameVariable => f.write_str("frame_variable"),
            VariableKind::StreamVariable => f.write_str("stream_variable"),
            VariableKind::LocalVariable => f.write_str("local_variable"),
            VariableKind::ExternalVariable => f.write_str("external_variable"),
        }
    }
}

#[derive(Debug)]
enum VariableInfo {
    TableColumn(Arc<ColumnDeclaration>),
    ExchangeColumn(String),
    FrameVariable(String),
    StreamVariable(String),
    LocalVariable(String),
    ExternalVariable(Arc<VariableDeclaration>),
}

/// An opaque handle denoting a variable binding in a plan.
#[derive(Debug, Clone)]
pub struct VariableDescriptor {
    id: u64,
    info: Arc<VariableInfo>,
}

impl VariableDescriptor {
    fn fresh(info: VariableInfo) -> Self {
        VariableDescriptor {
            id: NEXT_VARIABLE_ID.fetch_add(1, Ordering::Relaxed),
            info: Arc::new(info),
        }
    }

    pub fn stream(label: impl Into<String>) -> Self {
        Self::fresh(VariableInfo::StreamVariable(label.into()))
    }

    pub fn frame(label: impl Into<String>) -> Self {
        Self::fresh(VariableInfo::FrameVariable(label.into()))
    }

    pub fn local(label: impl Into<String>) -> Self {
        Self::fresh(VariableInfo::LocalVariable(label.into()))
    }

    pub fn exchange(label: impl Into<String>) -> Self {
        Self::fresh(VariableInfo::ExchangeColumn(label.into()))
    }

    pub fn table_column(column: Arc<ColumnDeclaration>) -> Self {
        Self::fresh(VariableInfo::TableColumn(column))
    }

    pub fn external(declaration: Arc<VariableDeclaration>) -> Self {
        Self::fresh(VariableInfo::ExternalVariable(declaration))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> VariableKind {
        match self.info.as_ref() {
            VariableInfo::TableColumn(_) => VariableKind::TableColumn,
            VariableInfo::ExchangeColumn(_) => VariableKind::ExchangeColumn,
            VariableInfo::FrameVariable(_) => VariableKind::FrameVariable,
            VariableInfo::StreamVariable(_) => VariableKind::StreamVariable,
            VariableInfo::LocalVariable(_) => VariableKind::LocalVariable,
            VariableInfo::ExternalVariable(_) => VariableKind::ExternalVariable,
        }
    }

    pub fn label(&self) -> &str {
        match self.info.as_ref() {
            VariableInfo::TableColumn(column) => column.name(),
            VariableInfo::ExchangeColumn(label)
            | VariableInfo::FrameVariable(label)
            | VariableInfo::StreamVariable(label)
            | VariableInfo::LocalVariable(label) => label,
            VariableInfo::ExternalVariable(declaration) => declaration.name(),
        }
    }

    /// The table column this descriptor denotes, if any.
    pub fn as_table_column(&self) -> Option<&Arc<ColumnDeclaration>> {
        match self.info.as_ref() {
            VariableInfo::TableColumn(column) => Some(column),
            _ => None,
        }
    }

    /// The external variable declaration this descriptor denotes, if any.
    pub fn as_external(&self) -> Option<&Arc<VariableDeclaration>> {
        match self.info.as_ref() {
            VariableInfo::ExternalVariable(declaration) => Some(declaration),
            _ => None,
        }
    }

    /// Like [`Self::as_table_column`], but a kind mismatch is a structural error.
    pub fn require_table_column(&self) -> Result<&Arc<ColumnDeclaration>, BindingError> {
        self.as_table_column().ok_or(BindingError::KindMismatch {
            expected: VariableKind::TableColumn,
            actual: self.kind(),
        })
    }
}

impl PartialEq for VariableDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for VariableDescriptor {}

impl Hash for VariableDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for VariableDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.label(), self.id)
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum BindingError {
    #[error("descriptor kind mismatch: expected {expected}, found {actual}")]
    KindMismatch {
        expected: VariableKind,
        actual: VariableKind,
    },
    #[error("expression is already bound to a different type: {existing} vs {incoming}")]
    ExpressionRebind { existing: String, incoming: String },
    #[error("variable {variable} is already bound to a different resolution")]
    VariableRebind { variable: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::data_type::DataType;
    use crate::types::repository::default_repository;

    #[test]
    fn clones_denote_the_same_binding() {
        let a = VariableDescriptor::stream("c0");
        let b = a.clone();
        assert_eq!(a, b);
        let c = VariableDescriptor::stream("c0");
        assert_ne!(a, c);
    }

    #[test]
    fn extraction_checks_the_kind() {
        let column = Arc::new(ColumnDeclaration::new(
            "c0",
            default_repository().get(DataType::Int4),
        ));
        let descriptor = VariableDescriptor::table_column(column.clone());
        assert!(Arc::ptr_eq(descriptor.require_table_column().unwrap(), &column));

        let stream = VariableDescriptor::stream("v");
        assert_eq!(
            stream.require_table_column().unwrap_err(),
            BindingError::KindMismatch {
                expected: VariableKind::TableColumn,
                actual: VariableKind::StreamVariable,
            }
        );
    }
}
