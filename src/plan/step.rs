use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::binding::VariableDescriptor;
use crate::plan::relational::{AggregateColumn, RelationalPlan, SortKey};

static NEXT_STEP_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a step (process or exchange) inside a step plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepId(u64);

impl StepId {
    fn fresh() -> Self {
        StepId(NEXT_STEP_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// An unordered pipe between processes, optionally limited globally.
#[derive(Debug, Clone)]
pub struct ForwardExchange {
    pub columns: Vec<VariableDescriptor>,
    pub limit: Option<u64>,
}

/// A partitioning exchange: rows are grouped by key, optionally sorted and
/// limited per group.
#[derive(Debug, Clone)]
pub struct GroupExchange {
    pub columns: Vec<VariableDescriptor>,
    pub group_keys: Vec<VariableDescriptor>,
    pub sort_keys: Vec<SortKey>,
    pub limit: Option<u64>,
}

/// An all-to-all exchange whose whole dataset is replicated to consumers.
#[derive(Debug, Clone)]
pub struct BroadcastExchange {
    pub columns: Vec<VariableDescriptor>,
}

/// A pre-aggregating exchange for incrementally combinable aggregations.
#[derive(Debug, Clone)]
pub struct AggregateExchange {
    pub source_columns: Vec<VariableDescriptor>,
    pub group_keys: Vec<VariableDescriptor>,
    pub aggregations: Vec<AggregateColumn>,
}

#[derive(Debug, Clone)]
pub enum ExchangeKind {
    Forward(ForwardExchange),
    Group(GroupExchange),
    Broadcast(BroadcastExchange),
    Aggregate(AggregateExchange),
    Discard,
}

impl ExchangeKind {
    fn name(&self) -> &'static str {
        match self {
            ExchangeKind::Forward(_) => "forward",
            ExchangeKind::Group(_) => "group",
            ExchangeKind::Broadcast(_) => "broadcast",
            ExchangeKind::Aggregate(_) => "aggregate",
            ExchangeKind::Discard => "discard",
        }
    }
}

/// A data-routing node of the step plan, shared between the graph and the
/// offer / take operators that bind to it.
#[derive(Debug)]
pub struct Exchange {
    id: StepId,
    kind: ExchangeKind,
}

impl Exchange {
    pub fn new(kind: ExchangeKind) -> Self {
        Exchange {
            id: StepId::fresh(),
            kind,
        }
    }

    pub fn id(&self) -> StepId {
        self.id
    }

    pub fn kind(&self) -> &ExchangeKind {
        &self.kind
    }

    pub fn as_group(&self) -> Option<&GroupExchange> {
        match &self.kind {
            ExchangeKind::Group(group) => Some(group),
            _ => None,
        }
    }

    /// The columns the exchange transports.
    pub fn columns(&self) -> &[VariableDescriptor] {
        match &self.kind {
            ExchangeKind::Forward(exchange) => &exchange.columns,
            ExchangeKind::Group(exchange) => &exchange.columns,
            ExchangeKind::Broadcast(exchange) => &exchange.columns,
            ExchangeKind::Aggregate(exchange) => &exchange.source_columns,
            ExchangeKind::Discard => &[],
        }
    }
}

/// A unit of the step plan executing a relational sub-graph without
/// inter-exchange communication.
#[derive(Debug, Clone)]
pub struct Process {
    pub id: StepId,
    pub operators: Arc<RelationalPlan>,
}

#[derive(Debug, Clone)]
pub enum Step {
    Process(Process),
    Exchange(Arc<Exchange>),
}

impl Step {
    pub fn id(&self) -> StepId {
        match self {
            Step::Process(process) => process.id,
            Step::Exchange(exchange) => exchange.id(),
        }
    }
}

/// The step-plan graph. Topology is derived from the offer destinations and
/// take sources inside each process, so steps carry no back-pointers.
#[derive(Debug, Default)]
pub struct StepGraph {
    steps: Vec<Step>,
}

impl StepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_process(&mut self, operators: Arc<RelationalPlan>) -> StepId {
        let id = StepId::fresh();
        self.steps.push(Step::Process(Process { id, operators }));
        id
    }

    pub fn add_exchange(&mut self, kind: ExchangeKind) -> Arc<Exchange> {
        let exchange = Arc::new(Exchange::new(kind));
        self.steps.push(Step::Exchange(Arc::clone(&exchange)));
        exchange
    }

    /// Registers an exchange created outside the graph.
    pub fn adopt_exchange(&mut self, exchange: Arc<Exchange>) {
        self.steps.push(Step::Exchange(exchange));
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn processes(&self) -> impl Iterator<Item = &Process> {
        self.steps.iter().filter_map(|step| match step {
            Step::Process(process) => Some(process),
            Step::Exchange(_) => None,
        })
    }

    pub fn exchanges(&self) -> impl Iterator<Item = &Arc<Exchange>> {
        self.steps.iter().filter_map(|step| match step {
            Step::Exchange(exchange) => Some(exchange),
            Step::Process(_) => None,
        })
    }

    pub fn contains(&self, id: StepId) -> bool {
        self.steps.iter().any(|step| step.id() == id)
    }

    /// Steps ordered such that every upstream dependency precedes its
    /// consumers.
    pub fn sort_from_upstream(&self) -> Vec<&Step> {
        let index_of: HashMap<StepId, usize> = self
            .steps
            .iter()
            .enumerate()
            .map(|(index, step)| (step.id(), index))
            .collect();
        let mut downstream: Vec<Vec<usize>> = vec![Vec::new(); self.steps.len()];
        let mut incoming: Vec<usize> = vec![0; self.steps.len()];

        let mut connect = |from: StepId, to: StepId| {
            if let (Some(&f), Some(&t)) = (index_of.get(&from), index_of.get(&to)) {
                downstream[f].push(t);
                incoming[t] += 1;
            }
        };
        for (index, step) in self.steps.iter().enumerate() {
            if let Step::Process(process) = step {
                let mut sources = Vec::new();
                process.operators.collect_exchange_sources(&mut sources);
                for exchange in sources {
                    connect(exchange.id(), self.steps[index].id());
                }
                let mut destinations = Vec::new();
                process
                    .operators
                    .collect_exchange_destinations(&mut destinations);
                for exchange in destinations {
                    connect(self.steps[index].id(), exchange.id());
                }
            }
        }

        let mut ready: Vec<usize> = (0..self.steps.len())
            .filter(|&index| incoming[index] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.steps.len());
        let mut emitted = vec![false; self.steps.len()];
        while let Some(index) = ready.pop() {
            emitted[index] = true;
            order.push(&self.steps[index]);
            for &next in &downstream[index] {
                incoming[next] -= 1;
                if incoming[next] == 0 {
                    ready.push(next);
                }
            }
        }
        for (index, step) in self.steps.iter().enumerate() {
            if !emitted[index] {
                order.push(step);
            }
        }
        order
    }
}

impl fmt::Display for StepGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            match step {
                Step::Process(process) => {
                    writeln!(f, "{}: process", process.id)?;
                    write!(f, "{}", process.operators)?;
                }
                Step::Exchange(exchange) => {
                    writeln!(f, "{}: exchange({})", exchange.id(), exchange.kind().name())?;
                }
            }
        }
        Ok(())
    }
}
