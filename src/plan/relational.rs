use std::fmt;
use std::sync::Arc;

use crate::binding::VariableDescriptor;
use crate::catalog::function::AggregateFunctionDeclaration;
use crate::catalog::table::{IndexDeclaration, SortDirection};
use crate::expr::ScalarExpr;
use crate::plan::step::{Exchange, StepId};
use crate::types::data_type::DataType;

/// A relational operator tree.
///
/// Intermediate (logical) operators and step (physical) operators share one
/// sum; exchange collection replaces the intermediate-only operators with
/// their step counterparts. Inputs are upstream: resolving an operator
/// requires its inputs to be resolved first.
#[derive(Debug, Clone)]
pub enum RelationalPlan {
    Scan(Scan),
    Find(Find),
    Values(Values),

    Join(Join),
    JoinFind(JoinFind),
    JoinScan(JoinScan),

    Project(Project),
    Filter(Filter),
    Identify(Identify),
    Buffer(Buffer),

    Aggregate(Aggregate),
    Distinct(Distinct),
    Limit(Limit),

    Union(Union),
    Intersection(Intersection),
    Difference(Difference),

    Emit(Emit),
    WriteTable(WriteTable),

    TakeFlat(TakeFlat),
    TakeGroup(TakeGroup),
    TakeCogroup(TakeCogroup),
    Offer(Offer),

    JoinGroup(JoinGroup),
    AggregateGroup(AggregateGroup),
    IntersectionGroup(IntersectionGroup),
    DifferenceGroup(DifferenceGroup),
    Flatten(Flatten),
}

/// Mapping from a source column to the variable it is exposed as.
#[derive(Debug, Clone)]
pub struct ColumnMapping {
    pub source: VariableDescriptor,
    pub destination: VariableDescriptor,
}

impl ColumnMapping {
    pub fn new(source: VariableDescriptor, destination: VariableDescriptor) -> Self {
        ColumnMapping {
            source,
            destination,
        }
    }
}

/// A point-access key: the indexed column and the value looked up.
#[derive(Debug, Clone)]
pub struct SearchKey {
    pub variable: VariableDescriptor,
    pub value: ScalarExpr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    Unbound,
    Inclusive,
    Exclusive,
}

/// One endpoint of a range access.
#[derive(Debug, Clone)]
pub struct ScanBound {
    pub keys: Vec<SearchKey>,
    pub kind: BoundKind,
}

impl ScanBound {
    pub fn unbound() -> Self {
        ScanBound {
            keys: Vec::new(),
            kind: BoundKind::Unbound,
        }
    }

    pub fn new(keys: Vec<SearchKey>, kind: BoundKind) -> Self {
        ScanBound { keys, kind }
    }
}

#[derive(Debug, Clone)]
pub struct Scan {
    pub source: Arc<IndexDeclaration>,
    pub columns: Vec<ColumnMapping>,
    pub lower: ScanBound,
    pub upper: ScanBound,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Find {
    pub source: Arc<IndexDeclaration>,
    pub columns: Vec<ColumnMapping>,
    pub keys: Vec<SearchKey>,
}

#[derive(Debug, Clone)]
pub struct Values {
    pub columns: Vec<VariableDescriptor>,
    pub rows: Vec<Vec<ScalarExpr>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    LeftOuter,
    FullOuter,
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinKind::Inner => f.write_str("inner"),
            JoinKind::LeftOuter => f.write_str("left_outer"),
            JoinKind::FullOuter => f.write_str("full_outer"),
        }
    }
}

/// One key position of a join endpoint: the right-side column probed with a
/// value computed over the left side.
#[derive(Debug, Clone)]
pub struct JoinKey {
    pub variable: VariableDescriptor,
    pub value: ScalarExpr,
}

#[derive(Debug, Clone)]
pub struct JoinBound {
    pub keys: Vec<JoinKey>,
    pub kind: BoundKind,
}

impl JoinBound {
    pub fn unbound() -> Self {
        JoinBound {
            keys: Vec::new(),
            kind: BoundKind::Unbound,
        }
    }

    pub fn new(keys: Vec<JoinKey>, kind: BoundKind) -> Self {
        JoinBound { keys, kind }
    }
}

#[derive(Debug, Clone)]
pub struct Join {
    pub left: Arc<RelationalPlan>,
    pub right: Arc<RelationalPlan>,
    pub kind: JoinKind,
    pub lower: JoinBound,
    pub upper: JoinBound,
    pub condition: Option<ScalarExpr>,
}

impl Join {
    /// A join with a pure boolean condition and no key endpoints.
    pub fn on_condition(
        left: Arc<RelationalPlan>,
        right: Arc<RelationalPlan>,
        kind: JoinKind,
        condition: Option<ScalarExpr>,
    ) -> Self {
        Join {
            left,
            right,
            kind,
            lower: JoinBound::unbound(),
            upper: JoinBound::unbound(),
            condition,
        }
    }

    /// The shared prefix of both endpoints where left and right columns are
    /// equated: pairs of (left variable, right variable).
    pub fn equality_prefix(&self) -> Vec<(VariableDescriptor, VariableDescriptor)> {
        if self.lower.kind != BoundKind::Inclusive || self.upper.kind != BoundKind::Inclusive {
            return Vec::new();
        }
        let mut pairs = Vec::new();
        for (lower, upper) in self.lower.keys.iter().zip(self.upper.keys.iter()) {
            if lower.variable != upper.variable {
                break;
            }
            let (Some(left_lower), Some(left_upper)) =
                (lower.value.as_variable(), upper.value.as_variable())
            else {
                break;
            };
            if left_lower != left_upper {
                break;
            }
            pairs.push((left_lower.clone(), lower.variable.clone()));
        }
        pairs
    }

    /// Whether the endpoints express only equality keys.
    pub fn is_equality_only(&self) -> bool {
        let prefix = self.equality_prefix();
        !prefix.is_empty()
            && prefix.len() == self.lower.keys.len()
            && prefix.len() == self.upper.keys.len()
    }
}

/// What a probing join reads: a storage index or a broadcast exchange.
#[derive(Debug, Clone)]
pub enum RelationSource {
    Index(Arc<IndexDeclaration>),
    Exchange(Arc<Exchange>),
}

#[derive(Debug, Clone)]
pub struct JoinFind {
    pub left: Arc<RelationalPlan>,
    pub kind: JoinKind,
    pub source: RelationSource,
    pub columns: Vec<ColumnMapping>,
    pub keys: Vec<SearchKey>,
    pub condition: Option<ScalarExpr>,
}

#[derive(Debug, Clone)]
pub struct JoinScan {
    pub left: Arc<RelationalPlan>,
    pub kind: JoinKind,
    pub source: RelationSource,
    pub columns: Vec<ColumnMapping>,
    pub lower: ScanBound,
    pub upper: ScanBound,
    pub condition: Option<ScalarExpr>,
}

#[derive(Debug, Clone)]
pub struct ProjectColumn {
    pub value: ScalarExpr,
    pub variable: VariableDescriptor,
}

#[derive(Debug, Clone)]
pub struct Project {
    pub input: Arc<RelationalPlan>,
    pub columns: Vec<ProjectColumn>,
}

#[derive(Debug, Clone)]
pub struct Filter {
    pub input: Arc<RelationalPlan>,
    pub condition: ScalarExpr,
}

#[derive(Debug, Clone)]
pub struct Identify {
    pub input: Arc<RelationalPlan>,
    pub variable: VariableDescriptor,
    pub row_id_type: Arc<DataType>,
}

#[derive(Debug, Clone)]
pub struct Buffer {
    pub input: Arc<RelationalPlan>,
}

#[derive(Debug, Clone)]
pub struct AggregateColumn {
    pub function: Arc<AggregateFunctionDeclaration>,
    pub arguments: Vec<VariableDescriptor>,
    pub destination: VariableDescriptor,
}

#[derive(Debug, Clone)]
pub struct Aggregate {
    pub input: Arc<RelationalPlan>,
    pub group_keys: Vec<VariableDescriptor>,
    pub columns: Vec<AggregateColumn>,
}

#[derive(Debug, Clone)]
pub struct Distinct {
    pub input: Arc<RelationalPlan>,
    pub group_keys: Vec<VariableDescriptor>,
}

#[derive(Debug, Clone)]
pub struct SortKey {
    pub variable: VariableDescriptor,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn ascendant(variable: VariableDescriptor) -> Self {
        SortKey {
            variable,
            direction: SortDirection::Ascendant,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Limit {
    pub input: Arc<RelationalPlan>,
    pub count: Option<u64>,
    pub group_keys: Vec<VariableDescriptor>,
    pub sort_keys: Vec<SortKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetQuantifier {
    All,
    Distinct,
}

#[derive(Debug, Clone)]
pub struct UnionMapping {
    pub left: Option<VariableDescriptor>,
    pub right: Option<VariableDescriptor>,
    pub destination: VariableDescriptor,
}

#[derive(Debug, Clone)]
pub struct Union {
    pub left: Arc<RelationalPlan>,
    pub right: Arc<RelationalPlan>,
    pub quantifier: SetQuantifier,
    pub mappings: Vec<UnionMapping>,
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub left: VariableDescriptor,
    pub right: VariableDescriptor,
}

#[derive(Debug, Clone)]
pub struct Intersection {
    pub left: Arc<RelationalPlan>,
    pub right: Arc<RelationalPlan>,
    pub quantifier: SetQuantifier,
    pub key_pairs: Vec<KeyPair>,
}

#[derive(Debug, Clone)]
pub struct Difference {
    pub left: Arc<RelationalPlan>,
    pub right: Arc<RelationalPlan>,
    pub quantifier: SetQuantifier,
    pub key_pairs: Vec<KeyPair>,
}

#[derive(Debug, Clone)]
pub struct EmitColumn {
    pub source: VariableDescriptor,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Emit {
    pub input: Arc<RelationalPlan>,
    pub columns: Vec<EmitColumn>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone)]
pub struct WriteMapping {
    pub source: VariableDescriptor,
    pub destination: VariableDescriptor,
}

#[derive(Debug, Clone)]
pub struct WriteTable {
    pub input: Arc<RelationalPlan>,
    pub kind: WriteKind,
    pub destination: Arc<IndexDeclaration>,
    pub keys: Vec<WriteMapping>,
    pub columns: Vec<WriteMapping>,
}

#[derive(Debug, Clone)]
pub struct TakeFlat {
    pub source: Arc<Exchange>,
    pub columns: Vec<ColumnMapping>,
}

#[derive(Debug, Clone)]
pub struct TakeGroup {
    pub source: Arc<Exchange>,
    pub columns: Vec<ColumnMapping>,
}

#[derive(Debug, Clone)]
pub struct CogroupSource {
    pub source: Arc<Exchange>,
    pub columns: Vec<ColumnMapping>,
}

#[derive(Debug, Clone)]
pub struct TakeCogroup {
    pub groups: Vec<CogroupSource>,
}

#[derive(Debug, Clone)]
pub struct Offer {
    pub input: Arc<RelationalPlan>,
    pub destination: Arc<Exchange>,
    pub columns: Vec<ColumnMapping>,
}

/// Joins the co-grouped inputs produced by a take_cogroup.
#[derive(Debug, Clone)]
pub struct JoinGroup {
    pub input: Arc<RelationalPlan>,
    pub kind: JoinKind,
    pub condition: Option<ScalarExpr>,
}

/// Aggregates whole groups produced by a group exchange.
#[derive(Debug, Clone)]
pub struct AggregateGroup {
    pub input: Arc<RelationalPlan>,
    pub columns: Vec<AggregateColumn>,
}

#[derive(Debug, Clone)]
pub struct IntersectionGroup {
    pub input: Arc<RelationalPlan>,
}

#[derive(Debug, Clone)]
pub struct DifferenceGroup {
    pub input: Arc<RelationalPlan>,
}

#[derive(Debug, Clone)]
pub struct Flatten {
    pub input: Arc<RelationalPlan>,
}

impl RelationalPlan {
    /// Upstream inputs of this operator, left to right.
    pub fn inputs(&self) -> Vec<&Arc<RelationalPlan>> {
        match self {
            RelationalPlan::Scan(_)
            | RelationalPlan::Find(_)
            | RelationalPlan::Values(_)
            | RelationalPlan::TakeFlat(_)
            | RelationalPlan::TakeGroup(_)
            | RelationalPlan::TakeCogroup(_) => Vec::new(),
            RelationalPlan::Join(op) => vec![&op.left, &op.right],
            RelationalPlan::JoinFind(op) => vec![&op.left],
            RelationalPlan::JoinScan(op) => vec![&op.left],
            RelationalPlan::Project(op) => vec![&op.input],
            RelationalPlan::Filter(op) => vec![&op.input],
            RelationalPlan::Identify(op) => vec![&op.input],
            RelationalPlan::Buffer(op) => vec![&op.input],
            RelationalPlan::Aggregate(op) => vec![&op.input],
            RelationalPlan::Distinct(op) => vec![&op.input],
            RelationalPlan::Limit(op) => vec![&op.input],
            RelationalPlan::Union(op) => vec![&op.left, &op.right],
            RelationalPlan::Intersection(op) => vec![&op.left, &op.right],
            RelationalPlan::Difference(op) => vec![&op.left, &op.right],
            RelationalPlan::Emit(op) => vec![&op.input],
            RelationalPlan::WriteTable(op) => vec![&op.input],
            RelationalPlan::Offer(op) => vec![&op.input],
            RelationalPlan::JoinGroup(op) => vec![&op.input],
            RelationalPlan::AggregateGroup(op) => vec![&op.input],
            RelationalPlan::IntersectionGroup(op) => vec![&op.input],
            RelationalPlan::DifferenceGroup(op) => vec![&op.input],
            RelationalPlan::Flatten(op) => vec![&op.input],
        }
    }

    /// Whether this operator only exists in intermediate plans and must be
    /// lowered away by exchange collection.
    pub fn is_intermediate_only(&self) -> bool {
        matches!(
            self,
            RelationalPlan::Join(_)
                | RelationalPlan::Aggregate(_)
                | RelationalPlan::Distinct(_)
                | RelationalPlan::Limit(_)
                | RelationalPlan::Union(_)
                | RelationalPlan::Intersection(_)
                | RelationalPlan::Difference(_)
        )
    }

    /// The variables this operator's output defines, upstream definitions
    /// included, deduplicated in first-seen order.
    pub fn output_variables(&self) -> Vec<VariableDescriptor> {
        let mut result = Vec::new();
        let mut seen = std::collections::HashSet::new();
        self.collect_output_variables(&mut result, &mut seen);
        result
    }

    fn collect_output_variables(
        &self,
        result: &mut Vec<VariableDescriptor>,
        seen: &mut std::collections::HashSet<u64>,
    ) {
        let push = |variable: &VariableDescriptor,
                        result: &mut Vec<VariableDescriptor>,
                        seen: &mut std::collections::HashSet<u64>| {
            if seen.insert(variable.id()) {
                result.push(variable.clone());
            }
        };
        match self {
            RelationalPlan::Scan(op) => {
                for column in &op.columns {
                    push(&column.destination, result, seen);
                }
            }
            RelationalPlan::Find(op) => {
                for column in &op.columns {
                    push(&column.destination, result, seen);
                }
            }
            RelationalPlan::Values(op) => {
                for column in &op.columns {
                    push(column, result, seen);
                }
            }
            RelationalPlan::Join(op) => {
                op.left.collect_output_variables(result, seen);
                op.right.collect_output_variables(result, seen);
            }
            RelationalPlan::JoinFind(op) => {
                op.left.collect_output_variables(result, seen);
                for column in &op.columns {
                    push(&column.destination, result, seen);
                }
            }
            RelationalPlan::JoinScan(op) => {
                op.left.collect_output_variables(result, seen);
                for column in &op.columns {
                    push(&column.destination, result, seen);
                }
            }
            RelationalPlan::Project(op) => {
                op.input.collect_output_variables(result, seen);
                for column in &op.columns {
                    push(&column.variable, result, seen);
                }
            }
            RelationalPlan::Filter(op) => op.input.collect_output_variables(result, seen),
            RelationalPlan::Identify(op) => {
                op.input.collect_output_variables(result, seen);
                push(&op.variable, result, seen);
            }
            RelationalPlan::Buffer(op) => op.input.collect_output_variables(result, seen),
            RelationalPlan::Aggregate(op) => {
                for key in &op.group_keys {
                    push(key, result, seen);
                }
                for column in &op.columns {
                    push(&column.destination, result, seen);
                }
            }
            RelationalPlan::Distinct(op) => op.input.collect_output_variables(result, seen),
            RelationalPlan::Limit(op) => op.input.collect_output_variables(result, seen),
            RelationalPlan::Union(op) => {
                for mapping in &op.mappings {
                    push(&mapping.destination, result, seen);
                }
            }
            RelationalPlan::Intersection(op) => op.left.collect_output_variables(result, seen),
            RelationalPlan::Difference(op) => op.left.collect_output_variables(result, seen),
            RelationalPlan::Emit(op) => op.input.collect_output_variables(result, seen),
            RelationalPlan::WriteTable(op) => op.input.collect_output_variables(result, seen),
            RelationalPlan::TakeFlat(op) => {
                for column in &op.columns {
                    push(&column.destination, result, seen);
                }
            }
            RelationalPlan::TakeGroup(op) => {
                for column in &op.columns {
                    push(&column.destination, result, seen);
                }
            }
            RelationalPlan::TakeCogroup(op) => {
                for group in &op.groups {
                    for column in &group.columns {
                        push(&column.destination, result, seen);
                    }
                }
            }
            RelationalPlan::Offer(op) => {
                for column in &op.columns {
                    push(&column.destination, result, seen);
                }
            }
            RelationalPlan::JoinGroup(op) => op.input.collect_output_variables(result, seen),
            RelationalPlan::AggregateGroup(op) => {
                op.input.collect_output_variables(result, seen);
                for column in &op.columns {
                    push(&column.destination, result, seen);
                }
            }
            RelationalPlan::IntersectionGroup(op) => op.input.collect_output_variables(result, seen),
            RelationalPlan::DifferenceGroup(op) => op.input.collect_output_variables(result, seen),
            RelationalPlan::Flatten(op) => op.input.collect_output_variables(result, seen),
        }
    }

    /// Exchanges this subtree reads from.
    pub fn collect_exchange_sources(&self, out: &mut Vec<Arc<Exchange>>) {
        match self {
            RelationalPlan::TakeFlat(op) => out.push(Arc::clone(&op.source)),
            RelationalPlan::TakeGroup(op) => out.push(Arc::clone(&op.source)),
            RelationalPlan::TakeCogroup(op) => {
                for group in &op.groups {
                    out.push(Arc::clone(&group.source));
                }
            }
            RelationalPlan::JoinFind(op) => {
                if let RelationSource::Exchange(exchange) = &op.source {
                    out.push(Arc::clone(exchange));
                }
            }
            RelationalPlan::JoinScan(op) => {
                if let RelationSource::Exchange(exchange) = &op.source {
                    out.push(Arc::clone(exchange));
                }
            }
            _ => {}
        }
        for input in self.inputs() {
            input.collect_exchange_sources(out);
        }
    }

    /// Exchanges this subtree offers into.
    pub fn collect_exchange_destinations(&self, out: &mut Vec<Arc<Exchange>>) {
        if let RelationalPlan::Offer(op) = self {
            out.push(Arc::clone(&op.destination));
        }
        for input in self.inputs() {
            input.collect_exchange_destinations(out);
        }
    }

    fn kind_name(&self) -> String {
        match self {
            RelationalPlan::Scan(op) => format!("Scan({})", op.source.name()),
            RelationalPlan::Find(op) => format!("Find({})", op.source.name()),
            RelationalPlan::Values(op) => format!("Values({} rows)", op.rows.len()),
            RelationalPlan::Join(op) => format!("Join({})", op.kind),
            RelationalPlan::JoinFind(op) => format!("JoinFind({})", op.kind),
            RelationalPlan::JoinScan(op) => format!("JoinScan({})", op.kind),
            RelationalPlan::Project(_) => "Project".to_string(),
            RelationalPlan::Filter(op) => format!("Filter({})", op.condition),
            RelationalPlan::Identify(_) => "Identify".to_string(),
            RelationalPlan::Buffer(_) => "Buffer".to_string(),
            RelationalPlan::Aggregate(_) => "Aggregate".to_string(),
            RelationalPlan::Distinct(_) => "Distinct".to_string(),
            RelationalPlan::Limit(_) => "Limit".to_string(),
            RelationalPlan::Union(_) => "Union".to_string(),
            RelationalPlan::Intersection(_) => "Intersection".to_string(),
            RelationalPlan::Difference(_) => "Difference".to_string(),
            RelationalPlan::Emit(_) => "Emit".to_string(),
            RelationalPlan::WriteTable(op) => format!("Write({})", op.destination.name()),
            RelationalPlan::TakeFlat(op) => format!("TakeFlat({})", op.source.id()),
            RelationalPlan::TakeGroup(op) => format!("TakeGroup({})", op.source.id()),
            RelationalPlan::TakeCogroup(_) => "TakeCogroup".to_string(),
            RelationalPlan::Offer(op) => format!("Offer({})", op.destination.id()),
            RelationalPlan::JoinGroup(op) => format!("JoinGroup({})", op.kind),
            RelationalPlan::AggregateGroup(_) => "AggregateGroup".to_string(),
            RelationalPlan::IntersectionGroup(_) => "IntersectionGroup".to_string(),
            RelationalPlan::DifferenceGroup(_) => "DifferenceGroup".to_string(),
            RelationalPlan::Flatten(_) => "Flatten".to_string(),
        }
    }

    fn fmt_with_tree(
        &self,
        f: &mut fmt::Formatter<'_>,
        prefix: &str,
        is_last: bool,
        is_root: bool,
    ) -> fmt::Result {
        let (branch, next_prefix) = if is_last {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };
        if is_root {
            writeln!(f, "{}", self.kind_name())?;
        } else {
            writeln!(f, "{}{}{}", prefix, branch, self.kind_name())?;
        }
        let children = self.inputs();
        let n = children.len();
        for (index, child) in children.into_iter().enumerate() {
            child.fmt_with_tree(
                f,
                &format!("{}{}", prefix, next_prefix),
                index + 1 == n,
                false,
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for RelationalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_with_tree(f, "", true, true)
    }
}

/// Rebuilds a node whose inputs were possibly replaced; the payload is
/// cloned only when at least one input actually changed.
pub fn rebuild_with_inputs(
    plan: &Arc<RelationalPlan>,
    new_inputs: Vec<crate::optimizer::transformed::Transformed<Arc<RelationalPlan>>>,
) -> crate::optimizer::transformed::Transformed<Arc<RelationalPlan>> {
    use crate::optimizer::transformed::Transformed;
    if new_inputs.len() != plan.inputs().len() || new_inputs.iter().all(|tf| !tf.is_yes()) {
        return Transformed::No(Arc::clone(plan));
    }
    let mut inputs = new_inputs.into_iter().map(Transformed::into_inner);
    let mut next = || inputs.next().unwrap_or_else(|| Arc::clone(plan));
    let rebuilt = match plan.as_ref() {
        RelationalPlan::Scan(_)
        | RelationalPlan::Find(_)
        | RelationalPlan::Values(_)
        | RelationalPlan::TakeFlat(_)
        | RelationalPlan::TakeGroup(_)
        | RelationalPlan::TakeCogroup(_) => return Transformed::No(Arc::clone(plan)),
        RelationalPlan::Join(op) => RelationalPlan::Join(Join {
            left: next(),
            right: next(),
            ..op.clone()
        }),
        RelationalPlan::JoinFind(op) => RelationalPlan::JoinFind(JoinFind {
            left: next(),
            ..op.clone()
        }),
        RelationalPlan::JoinScan(op) => RelationalPlan::JoinScan(JoinScan {
            left: next(),
            ..op.clone()
        }),
        RelationalPlan::Project(op) => RelationalPlan::Project(Project {
            input: next(),
            columns: op.columns.clone(),
        }),
        RelationalPlan::Filter(op) => RelationalPlan::Filter(Filter {
            input: next(),
            condition: op.condition.clone(),
        }),
        RelationalPlan::Identify(op) => RelationalPlan::Identify(Identify {
            input: next(),
            ..op.clone()
        }),
        RelationalPlan::Buffer(_) => RelationalPlan::Buffer(Buffer { input: next() }),
        RelationalPlan::Aggregate(op) => RelationalPlan::Aggregate(Aggregate {
            input: next(),
            ..op.clone()
        }),
        RelationalPlan::Distinct(op) => RelationalPlan::Distinct(Distinct {
            input: next(),
            group_keys: op.group_keys.clone(),
        }),
        RelationalPlan::Limit(op) => RelationalPlan::Limit(Limit {
            input: next(),
            ..op.clone()
        }),
        RelationalPlan::Union(op) => RelationalPlan::Union(Union {
            left: next(),
            right: next(),
            ..op.clone()
        }),
        RelationalPlan::Intersection(op) => RelationalPlan::Intersection(Intersection {
            left: next(),
            right: next(),
            ..op.clone()
        }),
        RelationalPlan::Difference(op) => RelationalPlan::Difference(Difference {
            left: next(),
            right: next(),
            ..op.clone()
        }),
        RelationalPlan::Emit(op) => RelationalPlan::Emit(Emit {
            input: next(),
            columns: op.columns.clone(),
        }),
        RelationalPlan::WriteTable(op) => RelationalPlan::WriteTable(WriteTable {
            input: next(),
            ..op.clone()
        }),
        RelationalPlan::Offer(op) => RelationalPlan::Offer(Offer {
            input: next(),
            ..op.clone()
        }),
        RelationalPlan::JoinGroup(op) => RelationalPlan::JoinGroup(JoinGroup {
            input: next(),
            ..op.clone()
        }),
        RelationalPlan::AggregateGroup(op) => RelationalPlan::AggregateGroup(AggregateGroup {
            input: next(),
            columns: op.columns.clone(),
        }),
        RelationalPlan::IntersectionGroup(_) => {
            RelationalPlan::IntersectionGroup(IntersectionGroup { input: next() })
        }
        RelationalPlan::DifferenceGroup(_) => {
            RelationalPlan::DifferenceGroup(DifferenceGroup { input: next() })
        }
        RelationalPlan::Flatten(_) => RelationalPlan::Flatten(Flatten { input: next() }),
    };
    Transformed::Yes(Arc::new(rebuilt))
}

#[allow(unused)]
pub(crate) fn exchange_id_of(source: &RelationSource) -> Option<StepId> {
    match source {
        RelationSource::Exchange(exchange) => Some(exchange.id()),
        RelationSource::Index(_) => None,
    }
}
