use std::sync::Arc;

use crate::binding::VariableDescriptor;
use crate::catalog::table::{IndexDeclaration, TableDeclaration};
use crate::expr::ScalarExpr;
use crate::plan::step::StepGraph;

/// Bulk insertion of literal tuples into a table.
#[derive(Debug)]
pub struct WriteStatement {
    pub destination: Arc<IndexDeclaration>,
    pub columns: Vec<VariableDescriptor>,
    pub tuples: Vec<Vec<ScalarExpr>>,
}

#[derive(Debug)]
pub struct CreateTable {
    pub definition: Arc<TableDeclaration>,
    pub primary_key: Option<Arc<IndexDeclaration>>,
}

#[derive(Debug)]
pub struct CreateIndex {
    pub definition: Arc<IndexDeclaration>,
}

/// A top-level statement handed to the analyzer.
#[derive(Debug)]
pub enum Statement {
    /// Runs a step-based execution plan.
    Execute(StepGraph),
    Write(WriteStatement),
    CreateTable(CreateTable),
    CreateIndex(CreateIndex),
    DropTable(Arc<TableDeclaration>),
    DropIndex(Arc<IndexDeclaration>),
    GrantTable(Arc<TableDeclaration>),
    RevokeTable(Arc<TableDeclaration>),
    Empty,
}
