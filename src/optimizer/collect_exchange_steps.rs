//! Lowering of intermediate plans into step plans.
//!
//! Every intermediate-only operator (join, aggregate, distinct, limit,
//! union, intersection, difference) is replaced by exchange steps and their
//! step-form counterparts; everything between two exchanges lands in one
//! process. Offers write a stream column into a fresh exchange column, and
//! takes map it back to the original descriptor, so operators downstream of
//! an exchange keep referring to the variables they were built with.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::binding::VariableDescriptor;
use crate::optimizer::errors::{OptimizerError, Pass};
use crate::optimizer::optimizer_pass::OptimizerResult;
use crate::optimizer::transformed::Transformed;
use crate::plan::relational::{
    Aggregate, AggregateColumn, AggregateGroup, BoundKind, CogroupSource, ColumnMapping, Difference,
    DifferenceGroup, Distinct, Flatten, Intersection, IntersectionGroup, Join, JoinBound, JoinFind,
    JoinGroup, JoinScan, Limit, Offer, RelationSource, RelationalPlan, ScanBound, SearchKey,
    SetQuantifier, SortKey, TakeCogroup, TakeFlat, TakeGroup, Union, rebuild_with_inputs,
};
use crate::plan::step::{
    AggregateExchange, BroadcastExchange, Exchange, ExchangeKind, ForwardExchange, GroupExchange,
    StepGraph,
};

/// How an intermediate join is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinStrategy {
    /// Both inputs are partitioned by the join keys and co-grouped.
    Cogroup,
    /// The right input is replicated and probed from the left side.
    Broadcast,
}

/// Runtime features that gate lowering decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeFeatures {
    /// Allows pre-aggregating exchanges for incrementally combinable
    /// aggregations.
    pub aggregate_exchange: bool,
}

impl Default for RuntimeFeatures {
    fn default() -> Self {
        RuntimeFeatures {
            aggregate_exchange: true,
        }
    }
}

/// Identity of an operator inside a plan tree, for the strategy map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlanRef(usize);

impl PlanRef {
    pub fn of(plan: &Arc<RelationalPlan>) -> Self {
        PlanRef(Arc::as_ptr(plan) as usize)
    }
}

#[derive(Debug, Default)]
pub struct CollectExchangeStepsOptions {
    pub join_strategies: HashMap<PlanRef, JoinStrategy>,
    pub default_join_strategy: Option<JoinStrategy>,
    pub features: RuntimeFeatures,
}

impl CollectExchangeStepsOptions {
    fn strategy_for(&self, plan: &Arc<RelationalPlan>) -> JoinStrategy {
        self.join_strategies
            .get(&PlanRef::of(plan))
            .copied()
            .or(self.default_join_strategy)
            .unwrap_or(JoinStrategy::Cogroup)
    }
}

/// Rewrites an intermediate plan into a step plan of processes and
/// exchanges.
pub fn collect_exchange_steps(
    plan: &Arc<RelationalPlan>,
    options: &CollectExchangeStepsOptions,
) -> OptimizerResult<StepGraph> {
    let mut collector = Collector {
        graph: StepGraph::new(),
        options,
    };
    let root = collector.lower(plan)?;
    collector.graph.add_process(root);
    debug!(
        "exchange collection produced {} steps",
        collector.graph.steps().len()
    );
    Ok(collector.graph)
}

/// Pairs each stream column with the exchange column standing in for it.
struct SideColumns {
    originals: Vec<VariableDescriptor>,
    exchanges: Vec<VariableDescriptor>,
    by_original: HashMap<u64, VariableDescriptor>,
}

impl SideColumns {
    fn new(originals: Vec<VariableDescriptor>) -> Self {
        let exchanges: Vec<VariableDescriptor> = originals
            .iter()
            .map(|v| VariableDescriptor::exchange(v.label()))
            .collect();
        let by_original = originals
            .iter()
            .zip(exchanges.iter())
            .map(|(o, e)| (o.id(), e.clone()))
            .collect();
        SideColumns {
            originals,
            exchanges,
            by_original,
        }
    }

    fn offer_mappings(&self) -> Vec<ColumnMapping> {
        self.originals
            .iter()
            .zip(self.exchanges.iter())
            .map(|(o, e)| ColumnMapping::new(o.clone(), e.clone()))
            .collect()
    }

    fn take_mappings(&self) -> Vec<ColumnMapping> {
        self.originals
            .iter()
            .zip(self.exchanges.iter())
            .map(|(o, e)| ColumnMapping::new(e.clone(), o.clone()))
            .collect()
    }

    fn exchange_of(&self, original: &VariableDescriptor) -> OptimizerResult<VariableDescriptor> {
        self.by_original.get(&original.id()).cloned().ok_or_else(|| {
            OptimizerError::UnknownColumn {
                pass: Pass::CollectExchangeSteps,
                column: original.to_string(),
            }
        })
    }
}

struct Collector<'a> {
    graph: StepGraph,
    options: &'a CollectExchangeStepsOptions,
}

impl Collector<'_> {
    fn lower(&mut self, plan: &Arc<RelationalPlan>) -> OptimizerResult<Arc<RelationalPlan>> {
        match plan.as_ref() {
            RelationalPlan::Join(join) => match self.options.strategy_for(plan) {
                JoinStrategy::Cogroup => self.lower_join_cogroup(join),
                JoinStrategy::Broadcast => self.lower_join_broadcast(join),
            },
            RelationalPlan::Aggregate(aggregate) => self.lower_aggregate(aggregate),
            RelationalPlan::Distinct(distinct) => self.lower_distinct(distinct),
            RelationalPlan::Limit(limit) => self.lower_limit(limit),
            RelationalPlan::Union(union) => self.lower_union(union),
            RelationalPlan::Intersection(intersection) => self.lower_intersection(intersection),
            RelationalPlan::Difference(difference) => self.lower_difference(difference),

            RelationalPlan::TakeFlat(_)
            | RelationalPlan::TakeGroup(_)
            | RelationalPlan::TakeCogroup(_)
            | RelationalPlan::Offer(_)
            | RelationalPlan::JoinGroup(_)
            | RelationalPlan::AggregateGroup(_)
            | RelationalPlan::IntersectionGroup(_)
            | RelationalPlan::DifferenceGroup(_)
            | RelationalPlan::Flatten(_) => Err(OptimizerError::UnexpectedStepOperator {
                pass: Pass::CollectExchangeSteps,
                operator: format!("{plan}").lines().next().unwrap_or_default().to_string(),
            }),

            // the remaining operators stay inside their process
            _ => {
                let inputs = plan.inputs();
                let mut transformed = Vec::with_capacity(inputs.len());
                for input in &inputs {
                    let lowered = self.lower(input)?;
                    transformed.push(if Arc::ptr_eq(&lowered, input) {
                        Transformed::No(lowered)
                    } else {
                        Transformed::Yes(lowered)
                    });
                }
                Ok(rebuild_with_inputs(plan, transformed).into_inner())
            }
        }
    }

    /// Closes a fragment into a process that offers its rows to `exchange`.
    fn close_with_offer(
        &mut self,
        fragment: Arc<RelationalPlan>,
        exchange: &Arc<Exchange>,
        columns: Vec<ColumnMapping>,
    ) {
        let offer = Arc::new(RelationalPlan::Offer(Offer {
            input: fragment,
            destination: Arc::clone(exchange),
            columns,
        }));
        self.graph.add_process(offer);
    }

    fn lower_join_cogroup(&mut self, join: &Join) -> OptimizerResult<Arc<RelationalPlan>> {
        let pairs = join.equality_prefix();
        if pairs.is_empty() {
            return Err(OptimizerError::MissingEqualityKeys {
                pass: Pass::CollectExchangeSteps,
            });
        }
        let left_lowered = self.lower(&join.left)?;
        let right_lowered = self.lower(&join.right)?;
        let left_side = SideColumns::new(join.left.output_variables());
        let right_side = SideColumns::new(join.right.output_variables());

        let left_keys = pairs
            .iter()
            .map(|(left, _)| left_side.exchange_of(left))
            .collect::<OptimizerResult<Vec<_>>>()?;
        let right_keys = pairs
            .iter()
            .map(|(_, right)| right_side.exchange_of(right))
            .collect::<OptimizerResult<Vec<_>>>()?;

        let left_exchange = self.graph.add_exchange(ExchangeKind::Group(GroupExchange {
            columns: left_side.exchanges.clone(),
            group_keys: left_keys,
            sort_keys: Vec::new(),
            limit: None,
        }));
        let right_exchange = self.graph.add_exchange(ExchangeKind::Group(GroupExchange {
            columns: right_side.exchanges.clone(),
            group_keys: right_keys,
            sort_keys: Vec::new(),
            limit: None,
        }));
        self.close_with_offer(left_lowered, &left_exchange, left_side.offer_mappings());
        self.close_with_offer(right_lowered, &right_exchange, right_side.offer_mappings());

        let take = Arc::new(RelationalPlan::TakeCogroup(TakeCogroup {
            groups: vec![
                CogroupSource {
                    source: left_exchange,
                    columns: left_side.take_mappings(),
                },
                CogroupSource {
                    source: right_exchange,
                    columns: right_side.take_mappings(),
                },
            ],
        }));
        Ok(Arc::new(RelationalPlan::JoinGroup(JoinGroup {
            input: take,
            kind: join.kind,
            condition: join.condition.clone(),
        })))
    }

    fn lower_join_broadcast(&mut self, join: &Join) -> OptimizerResult<Arc<RelationalPlan>> {
        let right_lowered = self.lower(&join.right)?;
        let right_side = SideColumns::new(join.right.output_variables());
        let broadcast = self
            .graph
            .add_exchange(ExchangeKind::Broadcast(BroadcastExchange {
                columns: right_side.exchanges.clone(),
            }));
        self.close_with_offer(right_lowered, &broadcast, right_side.offer_mappings());

        let left_lowered = self.lower(&join.left)?;
        if join.is_equality_only() {
            let keys = join
                .lower
                .keys
                .iter()
                .map(|key| {
                    Ok(SearchKey {
                        variable: right_side.exchange_of(&key.variable)?,
                        value: key.value.clone(),
                    })
                })
                .collect::<OptimizerResult<Vec<_>>>()?;
            return Ok(Arc::new(RelationalPlan::JoinFind(JoinFind {
                left: left_lowered,
                kind: join.kind,
                source: RelationSource::Exchange(broadcast),
                columns: right_side.take_mappings(),
                keys,
                condition: join.condition.clone(),
            })));
        }
        if join.lower.kind == BoundKind::Unbound && join.upper.kind == BoundKind::Unbound {
            return Err(OptimizerError::MissingBroadcastKeys {
                pass: Pass::CollectExchangeSteps,
            });
        }
        let lower = self.map_bound(&join.lower, &right_side)?;
        let upper = self.map_bound(&join.upper, &right_side)?;
        Ok(Arc::new(RelationalPlan::JoinScan(JoinScan {
            left: left_lowered,
            kind: join.kind,
            source: RelationSource::Exchange(broadcast),
            columns: right_side.take_mappings(),
            lower,
            upper,
            condition: join.condition.clone(),
        })))
    }

    /// Endpoint key columns and inclusiveness carry over to the probe.
    fn map_bound(&self, bound: &JoinBound, side: &SideColumns) -> OptimizerResult<ScanBound> {
        let keys = bound
            .keys
            .iter()
            .map(|key| {
                Ok(SearchKey {
                    variable: side.exchange_of(&key.variable)?,
                    value: key.value.clone(),
                })
            })
            .collect::<OptimizerResult<Vec<_>>>()?;
        Ok(ScanBound::new(keys, bound.kind))
    }

    fn lower_aggregate(&mut self, aggregate: &Aggregate) -> OptimizerResult<Arc<RelationalPlan>> {
        let input_lowered = self.lower(&aggregate.input)?;
        let side = SideColumns::new(aggregate.input.output_variables());
        let group_keys = aggregate
            .group_keys
            .iter()
            .map(|key| side.exchange_of(key))
            .collect::<OptimizerResult<Vec<_>>>()?;

        let incremental = aggregate
            .columns
            .iter()
            .all(|column| column.function.incremental());
        if self.options.features.aggregate_exchange && incremental {
            // pre-aggregate inside the exchange, flatten the groups after
            let destinations: Vec<(VariableDescriptor, VariableDescriptor)> = aggregate
                .columns
                .iter()
                .map(|column| {
                    (
                        column.destination.clone(),
                        VariableDescriptor::exchange(column.destination.label()),
                    )
                })
                .collect();
            let aggregations = aggregate
                .columns
                .iter()
                .zip(destinations.iter())
                .map(|(column, (_, destination))| {
                    Ok(AggregateColumn {
                        function: Arc::clone(&column.function),
                        arguments: column
                            .arguments
                            .iter()
                            .map(|argument| side.exchange_of(argument))
                            .collect::<OptimizerResult<Vec<_>>>()?,
                        destination: destination.clone(),
                    })
                })
                .collect::<OptimizerResult<Vec<_>>>()?;
            let exchange = self
                .graph
                .add_exchange(ExchangeKind::Aggregate(AggregateExchange {
                    source_columns: side.exchanges.clone(),
                    group_keys: group_keys.clone(),
                    aggregations,
                }));
            self.close_with_offer(input_lowered, &exchange, side.offer_mappings());

            let take_columns = group_keys
                .iter()
                .zip(aggregate.group_keys.iter())
                .map(|(exchange_key, original)| {
                    ColumnMapping::new(exchange_key.clone(), original.clone())
                })
                .chain(
                    destinations
                        .iter()
                        .map(|(original, exchange_column)| {
                            ColumnMapping::new(exchange_column.clone(), original.clone())
                        }),
                )
                .collect();
            let take = Arc::new(RelationalPlan::TakeGroup(TakeGroup {
                source: exchange,
                columns: take_columns,
            }));
            return Ok(Arc::new(RelationalPlan::Flatten(Flatten { input: take })));
        }

        // full aggregation per group downstream of a group exchange
        let exchange = self.graph.add_exchange(ExchangeKind::Group(GroupExchange {
            columns: side.exchanges.clone(),
            group_keys,
            sort_keys: Vec::new(),
            limit: None,
        }));
        self.close_with_offer(input_lowered, &exchange, side.offer_mappings());
        let take = Arc::new(RelationalPlan::TakeGroup(TakeGroup {
            source: exchange,
            columns: side.take_mappings(),
        }));
        Ok(Arc::new(RelationalPlan::AggregateGroup(AggregateGroup {
            input: take,
            columns: aggregate.columns.clone(),
        })))
    }

    fn lower_distinct(&mut self, distinct: &Distinct) -> OptimizerResult<Arc<RelationalPlan>> {
        let input_lowered = self.lower(&distinct.input)?;
        let side = SideColumns::new(distinct.input.output_variables());
        let group_keys = distinct
            .group_keys
            .iter()
            .map(|key| side.exchange_of(key))
            .collect::<OptimizerResult<Vec<_>>>()?;
        let exchange = self.graph.add_exchange(ExchangeKind::Group(GroupExchange {
            columns: side.exchanges.clone(),
            group_keys,
            sort_keys: Vec::new(),
            limit: Some(1),
        }));
        self.close_with_offer(input_lowered, &exchange, side.offer_mappings());
        let take = Arc::new(RelationalPlan::TakeGroup(TakeGroup {
            source: exchange,
            columns: side.take_mappings(),
        }));
        Ok(Arc::new(RelationalPlan::Flatten(Flatten { input: take })))
    }

    fn lower_limit(&mut self, limit: &Limit) -> OptimizerResult<Arc<RelationalPlan>> {
        let input_lowered = self.lower(&limit.input)?;
        let side = SideColumns::new(limit.input.output_variables());

        if limit.group_keys.is_empty() && limit.sort_keys.is_empty() {
            let exchange = self
                .graph
                .add_exchange(ExchangeKind::Forward(ForwardExchange {
                    columns: side.exchanges.clone(),
                    limit: limit.count,
                }));
            self.close_with_offer(input_lowered, &exchange, side.offer_mappings());
            return Ok(Arc::new(RelationalPlan::TakeFlat(TakeFlat {
                source: exchange,
                columns: side.take_mappings(),
            })));
        }

        let group_keys = limit
            .group_keys
            .iter()
            .map(|key| side.exchange_of(key))
            .collect::<OptimizerResult<Vec<_>>>()?;
        let sort_keys = limit
            .sort_keys
            .iter()
            .map(|key| {
                Ok(SortKey {
                    variable: side.exchange_of(&key.variable)?,
                    direction: key.direction,
                })
            })
            .collect::<OptimizerResult<Vec<_>>>()?;
        let exchange = self.graph.add_exchange(ExchangeKind::Group(GroupExchange {
            columns: side.exchanges.clone(),
            group_keys,
            sort_keys,
            limit: limit.count,
        }));
        self.close_with_offer(input_lowered, &exchange, side.offer_mappings());
        let take = Arc::new(RelationalPlan::TakeGroup(TakeGroup {
            source: exchange,
            columns: side.take_mappings(),
        }));
        Ok(Arc::new(RelationalPlan::Flatten(Flatten { input: take })))
    }

    fn lower_union(&mut self, union: &Union) -> OptimizerResult<Arc<RelationalPlan>> {
        let left_lowered = self.lower(&union.left)?;
        let right_lowered = self.lower(&union.right)?;

        let destinations: Vec<VariableDescriptor> = union
            .mappings
            .iter()
            .map(|mapping| mapping.destination.clone())
            .collect();
        let exchange_columns: Vec<VariableDescriptor> = destinations
            .iter()
            .map(|destination| VariableDescriptor::exchange(destination.label()))
            .collect();
        let left_offers: Vec<ColumnMapping> = union
            .mappings
            .iter()
            .zip(exchange_columns.iter())
            .filter_map(|(mapping, exchange_column)| {
                mapping
                    .left
                    .clone()
                    .map(|source| ColumnMapping::new(source, exchange_column.clone()))
            })
            .collect();
        let right_offers: Vec<ColumnMapping> = union
            .mappings
            .iter()
            .zip(exchange_columns.iter())
            .filter_map(|(mapping, exchange_column)| {
                mapping
                    .right
                    .clone()
                    .map(|source| ColumnMapping::new(source, exchange_column.clone()))
            })
            .collect();
        let take_columns: Vec<ColumnMapping> = exchange_columns
            .iter()
            .zip(destinations.iter())
            .map(|(exchange_column, destination)| {
                ColumnMapping::new(exchange_column.clone(), destination.clone())
            })
            .collect();

        match union.quantifier {
            SetQuantifier::All => {
                let exchange = self
                    .graph
                    .add_exchange(ExchangeKind::Forward(ForwardExchange {
                        columns: exchange_columns,
                        limit: None,
                    }));
                self.close_with_offer(left_lowered, &exchange, left_offers);
                self.close_with_offer(right_lowered, &exchange, right_offers);
                Ok(Arc::new(RelationalPlan::TakeFlat(TakeFlat {
                    source: exchange,
                    columns: take_columns,
                })))
            }
            SetQuantifier::Distinct => {
                let exchange = self.graph.add_exchange(ExchangeKind::Group(GroupExchange {
                    columns: exchange_columns.clone(),
                    group_keys: exchange_columns,
                    sort_keys: Vec::new(),
                    limit: Some(1),
                }));
                self.close_with_offer(left_lowered, &exchange, left_offers);
                self.close_with_offer(right_lowered, &exchange, right_offers);
                let take = Arc::new(RelationalPlan::TakeGroup(TakeGroup {
                    source: exchange,
                    columns: take_columns,
                }));
                Ok(Arc::new(RelationalPlan::Flatten(Flatten { input: take })))
            }
        }
    }

    fn lower_intersection(
        &mut self,
        intersection: &Intersection,
    ) -> OptimizerResult<Arc<RelationalPlan>> {
        let take = self.lower_cogrouped_set_operation(
            &intersection.left,
            &intersection.right,
            &intersection.key_pairs,
            intersection.quantifier,
        )?;
        Ok(Arc::new(RelationalPlan::IntersectionGroup(
            IntersectionGroup { input: take },
        )))
    }

    fn lower_difference(&mut self, difference: &Difference) -> OptimizerResult<Arc<RelationalPlan>> {
        let take = self.lower_cogrouped_set_operation(
            &difference.left,
            &difference.right,
            &difference.key_pairs,
            difference.quantifier,
        )?;
        Ok(Arc::new(RelationalPlan::DifferenceGroup(DifferenceGroup {
            input: take,
        })))
    }

    fn lower_cogrouped_set_operation(
        &mut self,
        left: &Arc<RelationalPlan>,
        right: &Arc<RelationalPlan>,
        key_pairs: &[crate::plan::relational::KeyPair],
        quantifier: SetQuantifier,
    ) -> OptimizerResult<Arc<RelationalPlan>> {
        let left_lowered = self.lower(left)?;
        let right_lowered = self.lower(right)?;
        let left_side = SideColumns::new(left.output_variables());
        let right_side = SideColumns::new(right.output_variables());

        let left_keys = key_pairs
            .iter()
            .map(|pair| left_side.exchange_of(&pair.left))
            .collect::<OptimizerResult<Vec<_>>>()?;
        let right_keys = key_pairs
            .iter()
            .map(|pair| right_side.exchange_of(&pair.right))
            .collect::<OptimizerResult<Vec<_>>>()?;

        let limit = match quantifier {
            SetQuantifier::All => None,
            SetQuantifier::Distinct => Some(1),
        };
        let left_exchange = self.graph.add_exchange(ExchangeKind::Group(GroupExchange {
            columns: left_side.exchanges.clone(),
            group_keys: left_keys,
            sort_keys: Vec::new(),
            limit,
        }));
        let right_exchange = self.graph.add_exchange(ExchangeKind::Group(GroupExchange {
            columns: right_side.exchanges.clone(),
            group_keys: right_keys,
            sort_keys: Vec::new(),
            limit,
        }));
        self.close_with_offer(left_lowered, &left_exchange, left_side.offer_mappings());
        self.close_with_offer(right_lowered, &right_exchange, right_side.offer_mappings());

        Ok(Arc::new(RelationalPlan::TakeCogroup(TakeCogroup {
            groups: vec![
                CogroupSource {
                    source: left_exchange,
                    columns: left_side.take_mappings(),
                },
                CogroupSource {
                    source: right_exchange,
                    columns: right_side.take_mappings(),
                },
            ],
        })))
    }
}
