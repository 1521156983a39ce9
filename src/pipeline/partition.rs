// src/pipeline/partition.rs
//! Position bookkeeping between the sparse input order and the dense accepted subset.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Index into the accepted subset.
    Accepted(usize),
    /// Index into the rejected list.
    Rejected(usize),
}

#[derive(Debug, Clone, Default)]
pub struct Partition {
    slots: Vec<Slot>,
    accepted: Vec<usize>,
    rejected: Vec<usize>,
}

impl Partition {
    /// One entry per input item, in input order.
    pub fn from_decisions<I: IntoIterator<Item = bool>>(decisions: I) -> Self {
        let mut p = Partition::default();
        for (pos, accepted) in decisions.into_iter().enumerate() {
            if accepted {
                p.slots.push(Slot::Accepted(p.accepted.len()));
                p.accepted.push(pos);
            } else {
                p.slots.push(Slot::Rejected(p.rejected.len()));
                p.rejected.push(pos);
            }
        }
        p
    }

    /// Original positions of accepted items; subset index `i` maps to `accepted()[i]`.
    pub fn accepted(&self) -> &[usize] {
        &self.accepted
    }

    pub fn rejected(&self) -> &[usize] {
        &self.rejected
    }

    #[cfg(test)]
    fn slot(&self, position: usize) -> Option<Slot> {
        self.slots.get(position).copied()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Merge per-subset values back into input order. `rejected[j]` belongs to
    /// `self.rejected()[j]`, `accepted[i]` to `self.accepted()[i]`.
    /// Returns `None` if either list has the wrong length.
    pub fn restitch<T>(&self, rejected: Vec<T>, accepted: Vec<T>) -> Option<Vec<T>> {
        if rejected.len() != self.rejected.len() || accepted.len() != self.accepted.len() {
            return None;
        }
        let mut rejected: Vec<Option<T>> = rejected.into_iter().map(Some).collect();
        let mut accepted: Vec<Option<T>> = accepted.into_iter().map(Some).collect();
        self.slots
            .iter()
            .map(|slot| match *slot {
                Slot::Accepted(i) => accepted.get_mut(i).and_then(Option::take),
                Slot::Rejected(j) => rejected.get_mut(j).and_then(Option::take),
            })
            .collect()
    }
}
