// SPDX-License-Identifier: MIT OR Apache-2.0

//! Added and removed values of multi-valued attributes.
use crate::entry::Operation;

/// Values added to and removed from a multi-valued attribute.
///
/// Both lists keep the order in which values were first seen and never contain duplicates. A
/// value is never both added and removed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delta<T> {
    pub added: Vec<T>,
    pub removed: Vec<T>,
}

impl<T> Default for Delta<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
        }
    }
}

impl<T> Delta<T>
where
    T: Clone + PartialEq,
{
    /// Delta only adding the given values.
    pub fn adding(values: Vec<T>) -> Self {
        let mut delta = Self::default();
        for value in values {
            push_unique(&mut delta.added, value);
        }
        delta
    }

    /// Delta only removing the given values.
    pub fn removing(values: Vec<T>) -> Self {
        let mut delta = Self::default();
        for value in values {
            push_unique(&mut delta.removed, value);
        }
        delta
    }

    /// Difference between two complete value sets.
    pub fn between(old: &[T], new: &[T]) -> Self {
        let mut delta = Self::default();
        for value in new {
            if !old.contains(value) {
                push_unique(&mut delta.added, value.clone());
            }
        }
        for value in old {
            if !new.contains(value) {
                push_unique(&mut delta.removed, value.clone());
            }
        }
        delta
    }

    /// Folds ordered add, delete and replace directives over the currently known values.
    ///
    /// The baseline is whatever is known about the attribute before the change, possibly nothing.
    /// Later directives observe the effect of earlier ones. A `delete` without values removes
    /// every known value, a `replace` removes known values which are not re-supplied.
    pub fn from_modifications<I>(baseline: &[T], directives: I) -> Self
    where
        I: IntoIterator<Item = (Operation, Vec<T>)>,
    {
        let mut delta = Self::default();

        for (operation, values) in directives {
            match operation {
                Operation::Add => {
                    for value in values {
                        delta.add(baseline, value);
                    }
                }
                Operation::Delete if values.is_empty() => {
                    for value in delta.current(baseline) {
                        delta.remove(value);
                    }
                }
                Operation::Delete => {
                    for value in values {
                        delta.remove(value);
                    }
                }
                Operation::Replace => {
                    for value in delta.current(baseline) {
                        if !values.contains(&value) {
                            delta.remove(value);
                        }
                    }
                    for value in values {
                        delta.add(baseline, value);
                    }
                }
            }
        }

        delta
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// All affected values, added ones first.
    pub fn added_and_removed(&self) -> Vec<T> {
        self.added.iter().chain(&self.removed).cloned().collect()
    }

    /// Applies the delta, resulting in `(values ∪ added) − removed` without duplicates.
    ///
    /// Returns `true` if the values changed.
    pub fn apply_to(&self, values: &mut Vec<T>) -> bool {
        let before = values.len();
        values.retain(|value| !self.removed.contains(value));
        let mut changed = values.len() != before;

        for value in &self.added {
            if !values.contains(value) {
                values.push(value.clone());
                changed = true;
            }
        }

        changed
    }

    /// Values known after the directives folded so far.
    fn current(&self, baseline: &[T]) -> Vec<T> {
        baseline
            .iter()
            .filter(|value| !self.removed.contains(value))
            .chain(self.added.iter())
            .cloned()
            .collect()
    }

    fn add(&mut self, baseline: &[T], value: T) {
        self.removed.retain(|removed| removed != &value);

        // Re-adding a removed baseline value only restores it.
        if !baseline.contains(&value) {
            push_unique(&mut self.added, value);
        }
    }

    fn remove(&mut self, value: T) {
        self.added.retain(|added| added != &value);
        push_unique(&mut self.removed, value);
    }
}

fn push_unique<T: PartialEq>(values: &mut Vec<T>, value: T) {
    if !values.contains(&value) {
        values.push(value);
    }
}
