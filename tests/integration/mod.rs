//! End-to-end pipeline: build a logical plan over a small catalog, resolve
//! it, rewrite it, lower it to a step plan, and resolve the result.

use std::sync::Arc;

use relmill::analyzer::ExpressionAnalyzer;
use relmill::binding::VariableDescriptor;
use relmill::catalog::function::AggregateFunctionDeclaration;
use relmill::catalog::table::{ColumnDeclaration, IndexDeclaration, TableDeclaration};
use relmill::expr::{BinaryOperator, ComparisonOperator, ScalarExpr};
use relmill::optimizer::{
    CollectExchangeStepsOptions, OptimizerPass, PlanContext, PushDownFilters,
    collect_exchange_steps, optimize,
};
use relmill::plan::relational::{
    Aggregate, AggregateColumn, ColumnMapping, Emit, EmitColumn, Filter, Join, JoinKind,
    RelationalPlan, Scan, ScanBound,
};
use relmill::plan::step::Step;
use relmill::types::data_type::DataType;
use relmill::types::repository::default_repository;
use relmill::value::Value;

fn scan_fixture(name: &str) -> (Arc<RelationalPlan>, Vec<VariableDescriptor>) {
    let repo = default_repository();
    let c0 = Arc::new(ColumnDeclaration::new("c0", repo.get(DataType::Int8)));
    let c1 = Arc::new(ColumnDeclaration::new("c1", repo.get(DataType::Int8)));
    let table = Arc::new(TableDeclaration::new(name, vec![c0, c1]));
    let index = Arc::new(IndexDeclaration::primary_of(table, &["c0"]));
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
        source: index,
        columns,
        lower: ScanBound::unbound(),
        upper: ScanBound::unbound(),
        limit: None,
    }));
    (scan, outputs)
}

fn assert_no_intermediate(plan: &RelationalPlan) {
    assert!(
        !plan.is_intermediate_only(),
        "intermediate operator survived exchange collection"
    );
    for input in plan.inputs() {
        assert_no_intermediate(input);
    }
}

#[test]
fn analyze_rewrite_and_lower_an_aggregation_pipeline() {
    let _ = env_logger::builder().is_test(true).try_init();
    let repo = default_repository();
    let (scan, outputs) = scan_fixture("orders");

    // ((c0 = 1 and c1 < 10) or (c0 = 2 and c1 < 5)) over the scan
    let imm = |v: i64| ScalarExpr::immediate(Value::Int8(v), repo.get(DataType::Int8));
    let var = |d: &VariableDescriptor| ScalarExpr::variable(d.clone());
    let disjunct = |key: i64, bound: i64| {
        ScalarExpr::binary(
            BinaryOperator::ConditionalAnd,
            ScalarExpr::compare(ComparisonOperator::Equal, var(&outputs[0]), imm(key)),
            ScalarExpr::compare(ComparisonOperator::Less, var(&outputs[1]), imm(bound)),
        )
    };
    let condition = ScalarExpr::binary(
        BinaryOperator::ConditionalOr,
        disjunct(1, 10),
        disjunct(2, 5),
    );
    let filter = Arc::new(RelationalPlan::Filter(Filter {
        input: scan,
        condition,
    }));

    let sum = Arc::new(AggregateFunctionDeclaration::new(
        7,
        "sum",
        repo.get(DataType::Int8),
        vec![repo.get(DataType::Int8)],
        true,
    ));
    let total = VariableDescriptor::stream("total");
    let aggregate = Arc::new(RelationalPlan::Aggregate(Aggregate {
        input: filter,
        group_keys: vec![outputs[0].clone()],
        columns: vec![AggregateColumn {
            function: sum,
            arguments: vec![outputs[1].clone()],
            destination: total.clone(),
        }],
    }));
    let emit = Arc::new(RelationalPlan::Emit(Emit {
        input: aggregate,
        columns: vec![
            EmitColumn {
                source: outputs[0].clone(),
                name: Some("key".to_string()),
            },
            EmitColumn {
                source: total.clone(),
                name: Some("total".to_string()),
            },
        ],
    }));

    // resolve the intermediate plan
    let mut analyzer = ExpressionAnalyzer::new();
    let resolved = analyzer.resolve_relation(&emit, true, true, repo).unwrap();
    assert!(resolved, "{:?}", analyzer.diagnostics());
    assert!(!analyzer.has_diagnostics());
    assert_eq!(*analyzer.inspect_variable(&total).unwrap(), DataType::Int8);
    let expressions_after_first = analyzer.expressions().len();

    // structural rewrites
    let mut ctx = PlanContext::new(repo);
    let rewritten = optimize(emit, &mut ctx).unwrap();

    // the rewritten plan resolves with the same analyzer and adds no
    // diagnostics: push-down and decomposition preserve well-typedness
    let resolved = analyzer
        .resolve_relation(&rewritten, true, true, repo)
        .unwrap();
    assert!(resolved, "{:?}", analyzer.diagnostics());
    assert!(!analyzer.has_diagnostics());
    assert!(analyzer.expressions().len() >= expressions_after_first);

    // lowering to the step plan
    let graph = collect_exchange_steps(&rewritten, &CollectExchangeStepsOptions::default()).unwrap();
    assert!(graph.exchanges().count() >= 1);
    for process in graph.processes() {
        assert_no_intermediate(&process.operators);
        let mut sources = Vec::new();
        process.operators.collect_exchange_sources(&mut sources);
        for exchange in sources {
            assert!(
                graph.contains(exchange.id()),
                "take source must reference an exchange of the same graph"
            );
        }
    }

    // every step resolves in upstream order
    let resolved = analyzer.resolve_step_graph(&graph, true, repo).unwrap();
    assert!(resolved, "{:?}", analyzer.diagnostics());
    assert!(!analyzer.has_diagnostics());
}

#[test]
fn join_pipeline_survives_push_down_and_resolution() {
    let repo = default_repository();
    let (scan_left, left) = scan_fixture("l");
    let (scan_right, right) = scan_fixture("r");

    let join = Arc::new(RelationalPlan::Join(Join::on_condition(
        scan_left,
        scan_right,
        JoinKind::Inner,
        None,
    )));
    let predicate = ScalarExpr::binary(
        BinaryOperator::ConditionalAnd,
        ScalarExpr::compare(
            ComparisonOperator::Equal,
            ScalarExpr::variable(left[0].clone()),
            ScalarExpr::variable(right[0].clone()),
        ),
        ScalarExpr::compare(
            ComparisonOperator::Equal,
            ScalarExpr::variable(left[0].clone()),
            ScalarExpr::immediate(Value::Int8(1), repo.get(DataType::Int8)),
        ),
    );
    let filter = Arc::new(RelationalPlan::Filter(Filter {
        input: join,
        condition: predicate,
    }));

    let mut ctx = PlanContext::new(repo);
    let rewritten = PushDownFilters::new()
        .optimize(filter, &mut ctx)
        .unwrap()
        .into_inner();

    let mut analyzer = ExpressionAnalyzer::new();
    let resolved = analyzer
        .resolve_relation(&rewritten, true, true, repo)
        .unwrap();
    assert!(resolved, "{:?}", analyzer.diagnostics());
    assert!(!analyzer.has_diagnostics());

    // the join took over the cross-side equality
    let RelationalPlan::Filter(slot) = rewritten.as_ref() else {
        panic!("expected the emptied filter at the root");
    };
    assert!(slot.condition.is_literal_true());
    let RelationalPlan::Join(join) = slot.input.as_ref() else {
        panic!("expected the join");
    };
    assert!(join.condition.is_some());

    // repeated resolution is idempotent
    let before = analyzer.expressions().len();
    analyzer
        .resolve_relation(&rewritten, true, true, repo)
        .unwrap();
    assert_eq!(analyzer.expressions().len(), before);
    assert!(!analyzer.has_diagnostics());
}

#[test]
fn step_graph_display_lists_processes_and_exchanges() {
    let (scan, outputs) = scan_fixture("t");
    let distinct = Arc::new(RelationalPlan::Distinct(
        relmill::plan::relational::Distinct {
            input: scan,
            group_keys: outputs,
        },
    ));
    let graph = collect_exchange_steps(&distinct, &CollectExchangeStepsOptions::default()).unwrap();
    let rendered = graph.to_string();
    assert!(rendered.contains("exchange(group)"));
    assert!(rendered.contains("process"));

    let order = graph.sort_from_upstream();
    assert_eq!(order.len(), graph.steps().len());
    // the consuming process comes last
    let last = order.last().unwrap();
    assert!(matches!(**last, Step::Process(_)));
}
