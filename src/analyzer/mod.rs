//! The resolution driver.
//!
//! [`ExpressionAnalyzer`] owns the two side tables and the diagnostics
//! accumulator. Resolution is memoized by expression identity and by
//! variable descriptor, so repeated calls are idempotent and the tables only
//! grow within one run. Structural violations (wrong descriptor kinds,
//! malformed plans) surface as [`AnalyzerError`]; user-visible typing
//! problems become [`Diagnostic`] records while resolution continues.

use std::sync::Arc;

use thiserror::Error;

use crate::binding::{
    BindingError, ExpressionTable, VariableDescriptor, VariableKind, VariableResolution,
    VariableTable,
};
use crate::diagnostics::Diagnostic;
use crate::expr::ScalarExpr;
use crate::plan::relational::RelationalPlan;
use crate::plan::statement::Statement;
use crate::plan::step::{Step, StepGraph};
use crate::types::data_type::DataType;
use crate::types::repository::TypeRepository;

mod engine;

use engine::Engine;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AnalyzerError {
    #[error("invalid variable: expected {expected}, found {actual}")]
    InvalidVariable {
        expected: VariableKind,
        actual: VariableKind,
    },
    #[error("invalid table column: {column}")]
    InvalidTableColumn { column: String },
    #[error(transparent)]
    Binding(#[from] BindingError),
}

pub type AnalyzerResult<T> = Result<T, AnalyzerError>;

#[derive(Debug, Default)]
pub struct ExpressionAnalyzer {
    expressions: ExpressionTable,
    variables: VariableTable,
    diagnostics: Vec<Diagnostic>,
    allow_unresolved: bool,
}

impl ExpressionAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expressions(&self) -> &ExpressionTable {
        &self.expressions
    }

    pub fn variables(&self) -> &VariableTable {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariableTable {
        &mut self.variables
    }

    pub fn allow_unresolved(&self) -> bool {
        self.allow_unresolved
    }

    /// When set, references to still-unbound variables stay silently
    /// unresolved instead of producing a diagnostic.
    pub fn set_allow_unresolved(&mut self, allow: bool) -> &mut Self {
        self.allow_unresolved = allow;
        self
    }

    /// Resolves a scalar expression to its type, memoized by expression
    /// identity.
    pub fn resolve_expression(
        &mut self,
        expression: &ScalarExpr,
        validate: bool,
        repository: &TypeRepository,
    ) -> AnalyzerResult<Arc<DataType>> {
        self.engine(validate, repository).resolve_scalar(expression)
    }

    /// Resolves a relational operator; with `recursive`, upstream inputs are
    /// resolved first (each shared node exactly once).
    ///
    /// Returns `false` when a fatal resolution failure makes the downstream
    /// bindings meaningless.
    pub fn resolve_relation(
        &mut self,
        plan: &Arc<RelationalPlan>,
        validate: bool,
        recursive: bool,
        repository: &TypeRepository,
    ) -> AnalyzerResult<bool> {
        self.engine(validate, repository)
            .resolve_relation(plan, recursive)
    }

    /// Resolves one step of a step plan (a process resolves its whole
    /// relational sub-graph).
    pub fn resolve_step(
        &mut self,
        step: &Step,
        validate: bool,
        repository: &TypeRepository,
    ) -> AnalyzerResult<bool> {
        self.engine(validate, repository).resolve_step(step)
    }

    /// Resolves a step-plan graph, visiting every step after its upstream
    /// dependencies.
    pub fn resolve_step_graph(
        &mut self,
        graph: &StepGraph,
        validate: bool,
        repository: &TypeRepository,
    ) -> AnalyzerResult<bool> {
        self.engine(validate, repository).resolve_step_graph(graph)
    }

    pub fn resolve_statement(
        &mut self,
        statement: &Statement,
        validate: bool,
        repository: &TypeRepository,
    ) -> AnalyzerResult<bool> {
        self.engine(validate, repository)
            .resolve_statement(statement)
    }

    /// Looks up the type a resolution stands for.
    pub fn inspect(&self, resolution: &VariableResolution) -> Option<Arc<DataType>> {
        inspect_with(&self.expressions, resolution)
    }

    /// Looks up the resolved type of a variable.
    pub fn inspect_variable(&self, variable: &VariableDescriptor) -> Option<Arc<DataType>> {
        let resolution = self.variables.find(variable)?;
        self.inspect(&resolution)
    }

    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn clear_diagnostics(&mut self) {
        self.diagnostics.clear();
    }

    fn engine<'a>(&'a mut self, validate: bool, repository: &'a TypeRepository) -> Engine<'a> {
        Engine::new(
            &mut self.expressions,
            &mut self.variables,
            &mut self.diagnostics,
            repository,
            validate,
            self.allow_unresolved,
        )
    }
}

pub(crate) fn inspect_with(
    expressions: &ExpressionTable,
    resolution: &VariableResolution,
) -> Option<Arc<DataType>> {
    match resolution {
        VariableResolution::Unresolved => None,
        VariableResolution::Unknown(ty) => Some(Arc::clone(ty)),
        VariableResolution::ScalarExpression(id) => expressions.find(*id),
        VariableResolution::TableColumn(column) => Some(Arc::clone(column.data_type())),
        VariableResolution::External(declaration) => Some(Arc::clone(declaration.data_type())),
        VariableResolution::FunctionCall(declaration) => Some(Arc::clone(declaration.return_type())),
        VariableResolution::Aggregation(declaration) => Some(Arc::clone(declaration.return_type())),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::function::{AggregateFunctionDeclaration, FunctionDeclaration};
    use crate::catalog::table::{
        ColumnDeclaration, ColumnValue, IndexDeclaration, IndexFeatures, IndexKey,
        TableDeclaration,
    };
    use crate::diagnostics::DiagnosticCode;
    use crate::expr::{BinaryOperator, ComparisonOperator, LetDeclarator, UnaryOperator};
    use crate::plan::relational::{
        AggregateColumn, CogroupSource, ColumnMapping, Offer, RelationalPlan, Scan, ScanBound,
        SearchKey, SetQuantifier, TakeCogroup, Union, UnionMapping, Values,
    };
    use crate::plan::statement::{CreateIndex, CreateTable, WriteStatement};
    use crate::plan::step::{Exchange, ExchangeKind, GroupExchange};
    use crate::types::data_type::TypeCategory;
    use crate::types::repository::default_repository;
    use crate::value::Value;

    fn repo() -> &'static TypeRepository {
        default_repository()
    }

    fn stream_of(analyzer: &mut ExpressionAnalyzer, label: &str, ty: DataType) -> VariableDescriptor {
        let variable = VariableDescriptor::stream(label);
        analyzer
            .variables_mut()
            .bind(
                &variable,
                VariableResolution::Unknown(repo().get(ty)),
                false,
            )
            .unwrap();
        variable
    }

    fn immediate(value: i32) -> ScalarExpr {
        ScalarExpr::immediate(Value::Int4(value), repo().get(DataType::Int4))
    }

    fn sample_index() -> Arc<IndexDeclaration> {
        let k = Arc::new(ColumnDeclaration::new("k", repo().get(DataType::Int8)));
        let v = Arc::new(ColumnDeclaration::new(
            "v",
            repo().get(DataType::character(true, None)),
        ));
        let table = Arc::new(TableDeclaration::new("t0", vec![k, v]));
        Arc::new(IndexDeclaration::primary_of(table, &["k"]))
    }

    fn scan_of(index: &Arc<IndexDeclaration>) -> (Arc<RelationalPlan>, Vec<VariableDescriptor>) {
        let columns: Vec<ColumnMapping> = index
            .table()
            .columns()
            .iter()
            .map(|column| {
                ColumnMapping::new(
                    VariableDescriptor::table_column(Arc::clone(column)),
                    VariableDescriptor::stream(column.name()),
                )
            })
            .collect();
        let outputs = columns.iter().map(|c| c.destination.clone()).collect();
        let scan = Arc::new(RelationalPlan::Scan(Scan {
            source: Arc::clone(index),
            columns,
            lower: ScanBound::unbound(),
            upper: ScanBound::unbound(),
            limit: None,
        }));
        (scan, outputs)
    }

    #[test]
    fn compare_of_equal_int_columns_is_boolean() {
        let mut analyzer = ExpressionAnalyzer::new();
        let a = stream_of(&mut analyzer, "a", DataType::Int4);
        let b = stream_of(&mut analyzer, "b", DataType::Int4);
        let expr = ScalarExpr::compare(
            ComparisonOperator::Equal,
            ScalarExpr::variable(a),
            ScalarExpr::variable(b),
        );
        let ty = analyzer.resolve_expression(&expr, true, repo()).unwrap();
        assert_eq!(*ty, DataType::Boolean);
        assert!(!analyzer.has_diagnostics());
    }

    #[test]
    fn ordering_comparison_of_blobs_is_diagnosed() {
        let mut analyzer = ExpressionAnalyzer::new();
        let a = stream_of(&mut analyzer, "a", DataType::Blob);
        let b = stream_of(&mut analyzer, "b", DataType::Blob);
        let expr = ScalarExpr::compare(
            ComparisonOperator::Less,
            ScalarExpr::variable(a),
            ScalarExpr::variable(b),
        );
        let ty = analyzer.resolve_expression(&expr, true, repo()).unwrap();
        assert_eq!(*ty, DataType::Boolean);
        assert_eq!(analyzer.diagnostics().len(), 1);
        assert_eq!(
            analyzer.diagnostics()[0].code,
            DiagnosticCode::UnsupportedType
        );
    }

    #[test]
    fn decimal_addition_keeps_the_wider_scale() {
        let mut analyzer = ExpressionAnalyzer::new();
        let a = stream_of(&mut analyzer, "a", DataType::decimal(Some(10), Some(2)));
        let b = stream_of(&mut analyzer, "b", DataType::decimal(Some(20), Some(0)));
        let expr = ScalarExpr::binary(
            BinaryOperator::Add,
            ScalarExpr::variable(a),
            ScalarExpr::variable(b),
        );
        let ty = analyzer.resolve_expression(&expr, true, repo()).unwrap();
        assert_eq!(*ty, DataType::decimal(None, Some(2)));
        assert!(!analyzer.has_diagnostics());
    }

    #[test]
    fn decimal_multiplication_drops_precision_and_scale() {
        let mut analyzer = ExpressionAnalyzer::new();
        let a = stream_of(&mut analyzer, "a", DataType::decimal(Some(10), Some(2)));
        let b = stream_of(&mut analyzer, "b", DataType::decimal(Some(20), Some(5)));
        let expr = ScalarExpr::binary(
            BinaryOperator::Multiply,
            ScalarExpr::variable(a),
            ScalarExpr::variable(b),
        );
        let ty = analyzer.resolve_expression(&expr, true, repo()).unwrap();
        assert_eq!(*ty, DataType::decimal(None, None));
    }

    #[test]
    fn concat_sums_known_lengths() {
        let mut analyzer = ExpressionAnalyzer::new();
        let a = stream_of(&mut analyzer, "a", DataType::character(true, Some(10)));
        let b = stream_of(&mut analyzer, "b", DataType::character(true, Some(20)));
        let expr = ScalarExpr::binary(
            BinaryOperator::Concat,
            ScalarExpr::variable(a),
            ScalarExpr::variable(b),
        );
        let ty = analyzer.resolve_expression(&expr, true, repo()).unwrap();
        assert_eq!(*ty, DataType::character(true, Some(30)));
        assert!(!analyzer.has_diagnostics());
    }

    #[test]
    fn resolution_is_idempotent_and_monotonic() {
        let mut analyzer = ExpressionAnalyzer::new();
        let a = stream_of(&mut analyzer, "a", DataType::Int4);
        let expr = ScalarExpr::unary(UnaryOperator::SignInversion, ScalarExpr::variable(a));
        let first = analyzer.resolve_expression(&expr, true, repo()).unwrap();
        let entries = analyzer.expressions().len();
        let second = analyzer.resolve_expression(&expr, true, repo()).unwrap();
        assert_eq!(first, second);
        assert_eq!(analyzer.expressions().len(), entries);
        assert!(!analyzer.has_diagnostics());
    }

    #[test]
    fn unbound_stream_variable_is_diagnosed_once() {
        let mut analyzer = ExpressionAnalyzer::new();
        let expr = ScalarExpr::variable(VariableDescriptor::stream("ghost"));
        let ty = analyzer.resolve_expression(&expr, true, repo()).unwrap();
        assert!(ty.is_error());
        assert_eq!(analyzer.diagnostics().len(), 1);
        assert_eq!(
            analyzer.diagnostics()[0].code,
            DiagnosticCode::UnresolvedVariable
        );
    }

    #[test]
    fn allow_unresolved_defers_instead_of_diagnosing() {
        let mut analyzer = ExpressionAnalyzer::new();
        analyzer.set_allow_unresolved(true);
        let expr = ScalarExpr::variable(VariableDescriptor::stream("ghost"));
        let ty = analyzer.resolve_expression(&expr, true, repo()).unwrap();
        assert_eq!(*ty, DataType::Pending);
        assert!(!analyzer.has_diagnostics());

        // downstream arithmetic keeps propagating the deferral
        let sum = ScalarExpr::binary(BinaryOperator::Add, expr, immediate(1));
        let ty = analyzer.resolve_expression(&sum, true, repo()).unwrap();
        assert_eq!(ty.category(), TypeCategory::Unresolved);
        assert!(!analyzer.has_diagnostics());
    }

    #[test]
    fn inconsistent_immediate_is_diagnosed() {
        let mut analyzer = ExpressionAnalyzer::new();
        let expr = ScalarExpr::immediate(Value::character("X"), repo().get(DataType::Int4));
        let ty = analyzer.resolve_expression(&expr, true, repo()).unwrap();
        assert!(ty.is_error());
        assert_eq!(
            analyzer.diagnostics()[0].code,
            DiagnosticCode::InconsistentType
        );
    }

    #[test]
    fn conditional_folds_alternatives() {
        let mut analyzer = ExpressionAnalyzer::new();
        let flag = stream_of(&mut analyzer, "flag", DataType::Boolean);
        let expr = ScalarExpr::conditional(
            vec![crate::expr::Alternative {
                condition: ScalarExpr::variable(flag),
                body: immediate(1),
            }],
            Some(ScalarExpr::immediate(
                Value::Int8(2),
                repo().get(DataType::Int8),
            )),
        );
        let ty = analyzer.resolve_expression(&expr, true, repo()).unwrap();
        assert_eq!(*ty, DataType::Int8);
        assert!(!analyzer.has_diagnostics());
    }

    #[test]
    fn coalesce_rejects_mixed_categories() {
        let mut analyzer = ExpressionAnalyzer::new();
        let expr = ScalarExpr::coalesce(vec![
            immediate(1),
            ScalarExpr::immediate(Value::character("x"), repo().get(DataType::character(true, None))),
        ]);
        let ty = analyzer.resolve_expression(&expr, true, repo()).unwrap();
        assert!(ty.is_error());
        assert_eq!(
            analyzer.diagnostics()[0].code,
            DiagnosticCode::InconsistentType
        );
    }

    #[test]
    fn let_binds_declarators_for_the_body() {
        let mut analyzer = ExpressionAnalyzer::new();
        let local = VariableDescriptor::local("x");
        let expr = ScalarExpr::let_expr(
            vec![LetDeclarator {
                variable: local.clone(),
                value: immediate(1),
            }],
            ScalarExpr::variable(local.clone()),
        );
        let ty = analyzer.resolve_expression(&expr, true, repo()).unwrap();
        assert_eq!(*ty, DataType::Int4);
        assert_eq!(*analyzer.inspect_variable(&local).unwrap(), DataType::Int4);
    }

    #[test]
    fn function_calls_check_arity_and_argument_types() {
        let mut analyzer = ExpressionAnalyzer::new();
        let f = Arc::new(FunctionDeclaration::new(
            1,
            "f",
            repo().get(DataType::Int4),
            vec![repo().get(DataType::Int8)],
        ));

        let good = ScalarExpr::function_call(Arc::clone(&f), vec![immediate(1)]);
        let ty = analyzer.resolve_expression(&good, true, repo()).unwrap();
        assert_eq!(*ty, DataType::Int4);
        assert!(!analyzer.has_diagnostics());

        let wrong_count = ScalarExpr::function_call(Arc::clone(&f), vec![]);
        analyzer.resolve_expression(&wrong_count, true, repo()).unwrap();
        assert_eq!(
            analyzer.diagnostics()[0].code,
            DiagnosticCode::InconsistentElements
        );
        analyzer.clear_diagnostics();

        let wrong_type = ScalarExpr::function_call(
            f,
            vec![ScalarExpr::immediate(
                Value::character("x"),
                repo().get(DataType::character(true, None)),
            )],
        );
        analyzer.resolve_expression(&wrong_type, true, repo()).unwrap();
        assert_eq!(
            analyzer.diagnostics()[0].code,
            DiagnosticCode::InconsistentType
        );
    }

    #[test]
    fn cast_always_yields_its_target() {
        let mut analyzer = ExpressionAnalyzer::new();
        let castable = ScalarExpr::cast(
            ScalarExpr::immediate(Value::character("2024-01-01"), repo().get(DataType::character(true, None))),
            repo().get(DataType::Date),
        );
        let ty = analyzer.resolve_expression(&castable, true, repo()).unwrap();
        assert_eq!(*ty, DataType::Date);
        assert!(!analyzer.has_diagnostics());

        let blob = stream_of(&mut analyzer, "b", DataType::Blob);
        let refused = ScalarExpr::cast(
            ScalarExpr::variable(blob),
            repo().get(DataType::character(true, None)),
        );
        let ty = analyzer.resolve_expression(&refused, true, repo()).unwrap();
        assert_eq!(*ty, DataType::character(true, None));
        assert_eq!(
            analyzer.diagnostics()[0].code,
            DiagnosticCode::UnsupportedType
        );
    }

    #[test]
    fn values_rows_must_match_the_column_count() {
        let mut analyzer = ExpressionAnalyzer::new();
        let c0 = VariableDescriptor::stream("c0");
        let plan = Arc::new(RelationalPlan::Values(Values {
            columns: vec![c0],
            rows: vec![vec![immediate(1), immediate(2)]],
        }));
        let resolved = analyzer.resolve_relation(&plan, true, false, repo()).unwrap();
        assert!(!resolved);
        assert_eq!(
            analyzer.diagnostics()[0].code,
            DiagnosticCode::InconsistentElements
        );
        assert_eq!(analyzer.diagnostics()[0].message, "too many values");
    }

    #[test]
    fn values_columns_unify_across_rows() {
        let mut analyzer = ExpressionAnalyzer::new();
        let c0 = VariableDescriptor::stream("c0");
        let plan = Arc::new(RelationalPlan::Values(Values {
            columns: vec![c0.clone()],
            rows: vec![
                vec![immediate(1)],
                vec![ScalarExpr::immediate(
                    Value::Int8(2),
                    repo().get(DataType::Int8),
                )],
            ],
        }));
        let resolved = analyzer.resolve_relation(&plan, true, false, repo()).unwrap();
        assert!(resolved);
        assert_eq!(*analyzer.inspect_variable(&c0).unwrap(), DataType::Int8);
    }

    #[test]
    fn scan_binds_columns_to_their_table_columns() {
        let mut analyzer = ExpressionAnalyzer::new();
        let index = sample_index();
        let (scan, outputs) = scan_of(&index);
        let resolved = analyzer.resolve_relation(&scan, true, true, repo()).unwrap();
        assert!(resolved);
        assert!(!analyzer.has_diagnostics());
        assert_eq!(*analyzer.inspect_variable(&outputs[0]).unwrap(), DataType::Int8);
        assert_eq!(
            *analyzer.inspect_variable(&outputs[1]).unwrap(),
            DataType::character(true, None)
        );
    }

    #[test]
    fn scan_boundary_keys_must_be_assignment_convertible() {
        let mut analyzer = ExpressionAnalyzer::new();
        let index = sample_index();
        let key_column = VariableDescriptor::table_column(Arc::clone(&index.keys()[0].column));
        let columns = vec![ColumnMapping::new(
            VariableDescriptor::table_column(Arc::clone(&index.table().columns()[0])),
            VariableDescriptor::stream("k"),
        )];
        let scan = Arc::new(RelationalPlan::Scan(Scan {
            source: Arc::clone(&index),
            columns,
            lower: ScanBound::unbound(),
            upper: ScanBound::new(
                vec![SearchKey {
                    variable: key_column,
                    value: ScalarExpr::immediate(
                        Value::character("oops"),
                        repo().get(DataType::character(true, None)),
                    ),
                }],
                crate::plan::relational::BoundKind::Inclusive,
            ),
            limit: None,
        }));
        let resolved = analyzer.resolve_relation(&scan, true, false, repo()).unwrap();
        assert!(!resolved);
        assert_eq!(
            analyzer.diagnostics()[0].code,
            DiagnosticCode::InconsistentType
        );
    }

    #[test]
    fn union_distinct_with_one_bound_large_side_diagnoses_and_still_binds() {
        let mut analyzer = ExpressionAnalyzer::new();
        let left = stream_of(&mut analyzer, "l", DataType::Clob);
        let destination = VariableDescriptor::stream("d");
        let empty = Arc::new(RelationalPlan::Values(Values {
            columns: vec![],
            rows: vec![],
        }));
        let union = Arc::new(RelationalPlan::Union(Union {
            left: Arc::clone(&empty),
            right: empty,
            quantifier: SetQuantifier::Distinct,
            mappings: vec![UnionMapping {
                left: Some(left),
                right: None,
                destination: destination.clone(),
            }],
        }));
        let resolved = analyzer.resolve_relation(&union, true, false, repo()).unwrap();
        assert!(resolved);
        assert_eq!(
            analyzer.diagnostics()[0].code,
            DiagnosticCode::UnsupportedType
        );
        assert_eq!(*analyzer.inspect_variable(&destination).unwrap(), DataType::Clob);
    }

    #[test]
    fn union_of_both_sides_unifies_the_destination() {
        let mut analyzer = ExpressionAnalyzer::new();
        let left = stream_of(&mut analyzer, "l", DataType::Int4);
        let right = stream_of(&mut analyzer, "r", DataType::Int8);
        let destination = VariableDescriptor::stream("d");
        let empty = Arc::new(RelationalPlan::Values(Values {
            columns: vec![],
            rows: vec![],
        }));
        let union = Arc::new(RelationalPlan::Union(Union {
            left: Arc::clone(&empty),
            right: empty,
            quantifier: SetQuantifier::All,
            mappings: vec![UnionMapping {
                left: Some(left),
                right: Some(right),
                destination: destination.clone(),
            }],
        }));
        let resolved = analyzer.resolve_relation(&union, true, false, repo()).unwrap();
        assert!(resolved);
        assert_eq!(*analyzer.inspect_variable(&destination).unwrap(), DataType::Int8);
    }

    #[test]
    fn take_cogroup_widens_group_keys_on_every_source() {
        let mut analyzer = ExpressionAnalyzer::new();
        let left_key = VariableDescriptor::exchange("k");
        let right_key = VariableDescriptor::exchange("k");
        analyzer
            .variables_mut()
            .bind(
                &left_key,
                VariableResolution::Unknown(repo().get(DataType::Int4)),
                false,
            )
            .unwrap();
        analyzer
            .variables_mut()
            .bind(
                &right_key,
                VariableResolution::Unknown(repo().get(DataType::Int8)),
                false,
            )
            .unwrap();
        let left = Arc::new(Exchange::new(ExchangeKind::Group(GroupExchange {
            columns: vec![left_key.clone()],
            group_keys: vec![left_key.clone()],
            sort_keys: vec![],
            limit: None,
        })));
        let right = Arc::new(Exchange::new(ExchangeKind::Group(GroupExchange {
            columns: vec![right_key.clone()],
            group_keys: vec![right_key.clone()],
            sort_keys: vec![],
            limit: None,
        })));
        let take = Arc::new(RelationalPlan::TakeCogroup(TakeCogroup {
            groups: vec![
                CogroupSource {
                    source: left,
                    columns: vec![],
                },
                CogroupSource {
                    source: right,
                    columns: vec![],
                },
            ],
        }));
        let resolved = analyzer.resolve_relation(&take, true, false, repo()).unwrap();
        assert!(resolved);
        assert_eq!(*analyzer.inspect_variable(&left_key).unwrap(), DataType::Int8);
        assert_eq!(*analyzer.inspect_variable(&right_key).unwrap(), DataType::Int8);
    }

    #[test]
    fn offer_union_binding_unifies_with_the_existing_resolution() {
        let mut analyzer = ExpressionAnalyzer::new();
        let first = stream_of(&mut analyzer, "a", DataType::Int4);
        let second = stream_of(&mut analyzer, "b", DataType::Int8);
        let destination = VariableDescriptor::exchange("c");
        let exchange = Arc::new(Exchange::new(ExchangeKind::Forward(
            crate::plan::step::ForwardExchange {
                columns: vec![destination.clone()],
                limit: None,
            },
        )));
        let empty = Arc::new(RelationalPlan::Values(Values {
            columns: vec![],
            rows: vec![],
        }));
        let offer_first = Arc::new(RelationalPlan::Offer(Offer {
            input: Arc::clone(&empty),
            destination: Arc::clone(&exchange),
            columns: vec![ColumnMapping::new(first, destination.clone())],
        }));
        let offer_second = Arc::new(RelationalPlan::Offer(Offer {
            input: empty,
            destination: exchange,
            columns: vec![ColumnMapping::new(second, destination.clone())],
        }));
        assert!(analyzer.resolve_relation(&offer_first, true, false, repo()).unwrap());
        assert_eq!(*analyzer.inspect_variable(&destination).unwrap(), DataType::Int4);
        assert!(analyzer.resolve_relation(&offer_second, true, false, repo()).unwrap());
        assert_eq!(*analyzer.inspect_variable(&destination).unwrap(), DataType::Int8);
        assert!(!analyzer.has_diagnostics());
    }

    #[test]
    fn aggregate_checks_arguments_and_binds_destinations() {
        let mut analyzer = ExpressionAnalyzer::new();
        let value = stream_of(&mut analyzer, "v", DataType::Int4);
        let key = stream_of(&mut analyzer, "k", DataType::Int8);
        let destination = VariableDescriptor::stream("sum");
        let sum = Arc::new(AggregateFunctionDeclaration::new(
            1,
            "sum",
            repo().get(DataType::Int8),
            vec![repo().get(DataType::Int8)],
            true,
        ));
        let empty = Arc::new(RelationalPlan::Values(Values {
            columns: vec![],
            rows: vec![],
        }));
        let aggregate = Arc::new(RelationalPlan::Aggregate(crate::plan::relational::Aggregate {
            input: empty,
            group_keys: vec![key],
            columns: vec![AggregateColumn {
                function: sum,
                arguments: vec![value],
                destination: destination.clone(),
            }],
        }));
        let resolved = analyzer
            .resolve_relation(&aggregate, true, false, repo())
            .unwrap();
        assert!(resolved);
        assert_eq!(*analyzer.inspect_variable(&destination).unwrap(), DataType::Int8);
    }

    #[test]
    fn write_statement_reports_each_inconsistent_tuple_element() {
        let mut analyzer = ExpressionAnalyzer::new();
        let index = sample_index();
        let columns: Vec<VariableDescriptor> = index
            .table()
            .columns()
            .iter()
            .map(|column| VariableDescriptor::table_column(Arc::clone(column)))
            .collect();
        let statement = Statement::Write(WriteStatement {
            destination: Arc::clone(&index),
            columns,
            tuples: vec![vec![
                immediate(1),
                ScalarExpr::immediate(Value::Boolean(true), repo().get(DataType::Boolean)),
            ]],
        });
        let resolved = analyzer.resolve_statement(&statement, true, repo()).unwrap();
        assert!(resolved);
        assert_eq!(analyzer.diagnostics().len(), 1);
        assert_eq!(
            analyzer.diagnostics()[0].code,
            DiagnosticCode::InconsistentType
        );
    }

    #[test]
    fn write_statement_rejects_short_tuples() {
        let mut analyzer = ExpressionAnalyzer::new();
        let index = sample_index();
        let columns: Vec<VariableDescriptor> = index
            .table()
            .columns()
            .iter()
            .map(|column| VariableDescriptor::table_column(Arc::clone(column)))
            .collect();
        let statement = Statement::Write(WriteStatement {
            destination: index,
            columns,
            tuples: vec![vec![immediate(1)]],
        });
        let resolved = analyzer.resolve_statement(&statement, true, repo()).unwrap();
        assert!(!resolved);
        assert_eq!(analyzer.diagnostics()[0].message, "too short values");
    }

    #[test]
    fn create_table_with_mismatched_default_fails() {
        let mut analyzer = ExpressionAnalyzer::new();
        let column = Arc::new(
            ColumnDeclaration::new("c0", repo().get(DataType::Int4))
                .with_default_value(ColumnValue::Immediate(Value::character("X"))),
        );
        let table = Arc::new(TableDeclaration::new("t", vec![column]));
        let statement = Statement::CreateTable(CreateTable {
            definition: table,
            primary_key: None,
        });
        let resolved = analyzer.resolve_statement(&statement, true, repo()).unwrap();
        assert!(!resolved);
        assert_eq!(analyzer.diagnostics().len(), 1);
        assert_eq!(
            analyzer.diagnostics()[0].code,
            DiagnosticCode::InconsistentType
        );
    }

    #[test]
    fn create_table_sequence_defaults_need_wide_integers() {
        let mut analyzer = ExpressionAnalyzer::new();
        let sequence = Arc::new(crate::catalog::table::SequenceDeclaration::new("s"));
        let narrow = Arc::new(
            ColumnDeclaration::new("c0", repo().get(DataType::Int2))
                .with_default_value(ColumnValue::Sequence(Arc::clone(&sequence))),
        );
        let wide = Arc::new(
            ColumnDeclaration::new("c1", repo().get(DataType::Int8))
                .with_default_value(ColumnValue::Sequence(sequence)),
        );
        let table = Arc::new(TableDeclaration::new("t", vec![narrow, wide]));
        let statement = Statement::CreateTable(CreateTable {
            definition: table,
            primary_key: None,
        });
        let resolved = analyzer.resolve_statement(&statement, true, repo()).unwrap();
        assert!(!resolved);
        assert_eq!(analyzer.diagnostics().len(), 1);
    }

    #[test]
    fn create_index_requires_order_comparable_scan_keys() {
        let mut analyzer = ExpressionAnalyzer::new();
        let column = Arc::new(ColumnDeclaration::new("c0", repo().get(DataType::Blob)));
        let table = Arc::new(TableDeclaration::new("t", vec![Arc::clone(&column)]));
        let index = Arc::new(IndexDeclaration::new(
            "i",
            table,
            vec![IndexKey::new(column)],
            IndexFeatures {
                primary: false,
                scan: true,
                find: true,
            },
        ));
        let statement = Statement::CreateIndex(CreateIndex { definition: index });
        let resolved = analyzer.resolve_statement(&statement, true, repo()).unwrap();
        assert!(!resolved);
        assert_eq!(
            analyzer.diagnostics()[0].code,
            DiagnosticCode::UnsupportedType
        );
        assert!(analyzer.diagnostics()[0]
            .message
            .starts_with("index key must be order comparable"));
    }

    #[test]
    fn drop_and_grant_statements_are_no_ops() {
        let mut analyzer = ExpressionAnalyzer::new();
        let index = sample_index();
        let table = Arc::clone(index.table());
        assert!(analyzer
            .resolve_statement(&Statement::DropTable(Arc::clone(&table)), true, repo())
            .unwrap());
        assert!(analyzer
            .resolve_statement(&Statement::DropIndex(index), true, repo())
            .unwrap());
        assert!(analyzer
            .resolve_statement(&Statement::GrantTable(Arc::clone(&table)), true, repo())
            .unwrap());
        assert!(analyzer
            .resolve_statement(&Statement::RevokeTable(table), true, repo())
            .unwrap());
        assert!(analyzer.resolve_statement(&Statement::Empty, true, repo()).unwrap());
        assert!(!analyzer.has_diagnostics());
    }
}
