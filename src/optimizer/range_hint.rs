//! Per-column value-range hints.
//!
//! Each entry tracks a lower and an upper endpoint, each being infinity, an
//! inclusive bound, or an exclusive bound over an immediate constant or a
//! host-variable reference. Intersection shrinks the range; union widens it,
//! collapsing to infinity whenever the two bounds are incomparable.

use std::collections::HashMap;

use crate::binding::VariableDescriptor;
use crate::expr::Immediate;
use crate::types::repository::default_repository;
use crate::value::compare::{CompareResult, compare};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundType {
    Infinity,
    Inclusive,
    Exclusive,
}

impl BoundType {
    fn of(inclusive: bool) -> Self {
        if inclusive {
            BoundType::Inclusive
        } else {
            BoundType::Exclusive
        }
    }
}

/// A bound value: a constant or an external (host) variable.
#[derive(Debug, Clone)]
pub enum BoundValue {
    Immediate(Immediate),
    Variable(VariableDescriptor),
}

fn compare_immediate(left: &Immediate, right: &Immediate) -> CompareResult {
    // check if two values are potentially comparable at all
    let unified = crate::types::conversion::unifying_conversion(
        &left.data_type,
        &right.data_type,
        default_repository(),
    );
    if unified.is_error() {
        return CompareResult::Undefined;
    }
    compare(&left.value, &right.value)
}

#[derive(Debug, Clone, Default)]
pub struct RangeHintEntry {
    lower_type: Option<BoundType>,
    lower_value: Option<BoundValue>,
    upper_type: Option<BoundType>,
    upper_value: Option<BoundValue>,
}

impl RangeHintEntry {
    pub fn lower_type(&self) -> BoundType {
        self.lower_type.unwrap_or(BoundType::Infinity)
    }

    pub fn upper_type(&self) -> BoundType {
        self.upper_type.unwrap_or(BoundType::Infinity)
    }

    pub fn lower_value(&self) -> Option<&BoundValue> {
        self.lower_value.as_ref()
    }

    pub fn upper_value(&self) -> Option<&BoundValue> {
        self.upper_value.as_ref()
    }

    pub fn take_lower(&mut self) -> Option<BoundValue> {
        self.lower_value.take()
    }

    pub fn take_upper(&mut self) -> Option<BoundValue> {
        self.upper_value.take()
    }

    /// Whether both endpoints are infinity.
    pub fn is_empty(&self) -> bool {
        self.lower_type() == BoundType::Infinity && self.upper_type() == BoundType::Infinity
    }

    pub fn intersect_lower_immediate(&mut self, value: &Immediate, inclusive: bool) {
        if self.lower_type() == BoundType::Infinity {
            self.lower_type = Some(BoundType::of(inclusive));
            self.lower_value = Some(BoundValue::Immediate(value.clone()));
            return;
        }
        let Some(BoundValue::Immediate(existing)) = &self.lower_value else {
            // keep the host variable
            return;
        };
        match compare_immediate(existing, value) {
            CompareResult::Undefined => {}
            CompareResult::Equal => {
                // current == incoming < column: may tighten inclusiveness
                if self.lower_type() == BoundType::Inclusive && !inclusive {
                    self.lower_type = Some(BoundType::Exclusive);
                    self.lower_value = Some(BoundValue::Immediate(value.clone()));
                }
            }
            CompareResult::Less => {
                // current < incoming: shrink bound
                self.lower_type = Some(BoundType::of(inclusive));
                self.lower_value = Some(BoundValue::Immediate(value.clone()));
            }
            CompareResult::Greater => {}
        }
    }

    pub fn intersect_lower_variable(&mut self, value: &VariableDescriptor, inclusive: bool) {
        let same_variable = matches!(
            &self.lower_value,
            Some(BoundValue::Variable(existing)) if existing == value
        );
        if self.lower_type() == BoundType::Infinity
            || !matches!(&self.lower_value, Some(BoundValue::Variable(_)))
        {
            self.lower_type = Some(BoundType::of(inclusive));
            self.lower_value = Some(BoundValue::Variable(value.clone()));
            return;
        }
        if !same_variable {
            return;
        }
        if self.lower_type() == BoundType::Inclusive && !inclusive {
            self.lower_type = Some(BoundType::Exclusive);
        }
    }

    pub fn intersect_upper_immediate(&mut self, value: &Immediate, inclusive: bool) {
        if self.upper_type() == BoundType::Infinity {
            self.upper_type = Some(BoundType::of(inclusive));
            self.upper_value = Some(BoundValue::Immediate(value.clone()));
            return;
        }
        let Some(BoundValue::Immediate(existing)) = &self.upper_value else {
            return;
        };
        match compare_immediate(existing, value) {
            CompareResult::Undefined => {}
            CompareResult::Equal => {
                // current == incoming > column: may tighten inclusiveness
                if self.upper_type() == BoundType::Inclusive && !inclusive {
                    self.upper_type = Some(BoundType::Exclusive);
                    self.upper_value = Some(BoundValue::Immediate(value.clone()));
                }
            }
            CompareResult::Less => {}
            CompareResult::Greater => {
                // current > incoming: shrink bound
                self.upper_type = Some(BoundType::of(inclusive));
                self.upper_value = Some(BoundValue::Immediate(value.clone()));
            }
        }
    }

    pub fn intersect_upper_variable(&mut self, value: &VariableDescriptor, inclusive: bool) {
        let same_variable = matches!(
            &self.upper_value,
            Some(BoundValue::Variable(existing)) if existing == value
        );
        if self.upper_type() == BoundType::Infinity
            || !matches!(&self.upper_value, Some(BoundValue::Variable(_)))
        {
            self.upper_type = Some(BoundType::of(inclusive));
            self.upper_value = Some(BoundValue::Variable(value.clone()));
            return;
        }
        if !same_variable {
            return;
        }
        if self.upper_type() == BoundType::Inclusive && !inclusive {
            self.upper_type = Some(BoundType::Exclusive);
        }
    }

    pub fn union_lower_immediate(&mut self, value: &Immediate, inclusive: bool) {
        if self.lower_type() == BoundType::Infinity {
            return;
        }
        let Some(BoundValue::Immediate(existing)) = &self.lower_value else {
            // different bound value kinds are not comparable
            self.clear_lower();
            return;
        };
        match compare_immediate(existing, value) {
            CompareResult::Undefined => self.clear_lower(),
            CompareResult::Equal => {
                // existing == incoming: may loosen inclusiveness
                if self.lower_type() == BoundType::Exclusive && inclusive {
                    self.lower_type = Some(BoundType::Inclusive);
                    self.lower_value = Some(BoundValue::Immediate(value.clone()));
                }
            }
            CompareResult::Less => {}
            CompareResult::Greater => {
                // existing > incoming: widen bound
                self.lower_type = Some(BoundType::of(inclusive));
                self.lower_value = Some(BoundValue::Immediate(value.clone()));
            }
        }
    }

    pub fn union_lower_variable(&mut self, value: &VariableDescriptor, inclusive: bool) {
        if self.lower_type() == BoundType::Infinity {
            return;
        }
        let same_variable = matches!(
            &self.lower_value,
            Some(BoundValue::Variable(existing)) if existing == value
        );
        if !same_variable {
            self.clear_lower();
            return;
        }
        if self.lower_type() == BoundType::Exclusive && inclusive {
            self.lower_type = Some(BoundType::Inclusive);
            self.lower_value = Some(BoundValue::Variable(value.clone()));
        }
    }

    pub fn union_upper_immediate(&mut self, value: &Immediate, inclusive: bool) {
        if self.upper_type() == BoundType::Infinity {
            return;
        }
        let Some(BoundValue::Immediate(existing)) = &self.upper_value else {
            self.clear_upper();
            return;
        };
        match compare_immediate(existing, value) {
            CompareResult::Undefined => self.clear_upper(),
            CompareResult::Equal => {
                if self.upper_type() == BoundType::Exclusive && inclusive {
                    self.upper_type = Some(BoundType::Inclusive);
                    self.upper_value = Some(BoundValue::Immediate(value.clone()));
                }
            }
            CompareResult::Less => {
                // existing < incoming: widen bound
                self.upper_type = Some(BoundType::of(inclusive));
                self.upper_value = Some(BoundValue::Immediate(value.clone()));
            }
            CompareResult::Greater => {}
        }
    }

    pub fn union_upper_variable(&mut self, value: &VariableDescriptor, inclusive: bool) {
        if self.upper_type() == BoundType::Infinity {
            return;
        }
        let same_variable = matches!(
            &self.upper_value,
            Some(BoundValue::Variable(existing)) if existing == value
        );
        if !same_variable {
            self.clear_upper();
            return;
        }
        if self.upper_type() == BoundType::Exclusive && inclusive {
            self.upper_type = Some(BoundType::Inclusive);
            self.upper_value = Some(BoundValue::Variable(value.clone()));
        }
    }

    fn clear_lower(&mut self) {
        self.lower_type = Some(BoundType::Infinity);
        self.lower_value = None;
    }

    fn clear_upper(&mut self) {
        self.upper_type = Some(BoundType::Infinity);
        self.upper_value = None;
    }

    pub fn intersect_merge(&mut self, other: RangeHintEntry) {
        if other.lower_type() != BoundType::Infinity {
            match other.lower_value {
                Some(BoundValue::Immediate(ref value)) => self.intersect_lower_immediate(
                    value,
                    other.lower_type == Some(BoundType::Inclusive),
                ),
                Some(BoundValue::Variable(ref value)) => self.intersect_lower_variable(
                    value,
                    other.lower_type == Some(BoundType::Inclusive),
                ),
                None => {}
            }
        }
        if other.upper_type() != BoundType::Infinity {
            match other.upper_value {
                Some(BoundValue::Immediate(value)) => self.intersect_upper_immediate(
                    &value,
                    other.upper_type == Some(BoundType::Inclusive),
                ),
                Some(BoundValue::Variable(value)) => self.intersect_upper_variable(
                    &value,
                    other.upper_type == Some(BoundType::Inclusive),
                ),
                None => {}
            }
        }
    }

    pub fn union_merge(&mut self, other: RangeHintEntry) {
        if other.lower_type() == BoundType::Infinity {
            self.clear_lower();
        } else {
            match other.lower_value {
                Some(BoundValue::Immediate(ref value)) => self
                    .union_lower_immediate(value, other.lower_type == Some(BoundType::Inclusive)),
                Some(BoundValue::Variable(ref value)) => self
                    .union_lower_variable(value, other.lower_type == Some(BoundType::Inclusive)),
                None => self.clear_lower(),
            }
        }
        if other.upper_type() == BoundType::Infinity {
            self.clear_upper();
        } else {
            match other.upper_value {
                Some(BoundValue::Immediate(value)) => self
                    .union_upper_immediate(&value, other.upper_type == Some(BoundType::Inclusive)),
                Some(BoundValue::Variable(value)) => self
                    .union_upper_variable(&value, other.upper_type == Some(BoundType::Inclusive)),
                None => self.clear_upper(),
            }
        }
    }
}

/// Range hints per column descriptor.
#[derive(Debug, Default)]
pub struct RangeHintMap {
    entries: HashMap<u64, (VariableDescriptor, RangeHintEntry)>,
}

impl RangeHintMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &VariableDescriptor) -> bool {
        self.entries
            .get(&key.id())
            .is_some_and(|(_, entry)| !entry.is_empty())
    }

    pub fn get(&mut self, key: &VariableDescriptor) -> &mut RangeHintEntry {
        &mut self
            .entries
            .entry(key.id())
            .or_insert_with(|| (key.clone(), RangeHintEntry::default()))
            .1
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(|(_, entry)| entry.is_empty())
    }

    /// Drains the non-empty entries, ordered by column identity for
    /// deterministic output.
    pub fn consume(&mut self) -> Vec<(VariableDescriptor, RangeHintEntry)> {
        let mut drained: Vec<_> = self
            .entries
            .drain()
            .map(|(_, pair)| pair)
            .filter(|(_, entry)| !entry.is_empty())
            .collect();
        drained.sort_by_key(|(variable, _)| variable.id());
        drained
    }

    pub fn intersect_merge(&mut self, mut other: RangeHintMap) {
        for (variable, entry) in other.consume() {
            self.get(&variable).intersect_merge(entry);
        }
    }

    pub fn union_merge(&mut self, mut other: RangeHintMap) {
        // entries absent from either side disappear
        for (_, (variable, entry)) in self.entries.iter_mut() {
            if !other.contains(variable) {
                *entry = RangeHintEntry::default();
            }
        }
        for (variable, entry) in other.consume() {
            self.get(&variable).union_merge(entry);
        }
    }
}
