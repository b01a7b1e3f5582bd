//! Networks paired with their error, the unit every search compares.

use crate::error::Result;
use crate::evaluate::{self, SequenceModel};
use crate::sequence::ChordSequence;

use std::cmp::Ordering;

/// A network paired with its summed error on some sequence.
///
/// Ordering compares errors only, lower first.
#[derive(Clone, Debug)]
pub struct Scored<N> {
    network: N,
    error: f64,
}

impl<N> Scored<N> {
    pub fn new(network: N, error: f64) -> Self {
        Scored { network, error }
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn error(&self) -> f64 {
        self.error
    }

    pub fn into_network(self) -> N {
        self.network
    }

    /// Keeps `self` unless `other` has a strictly lower error.
    pub fn better_of(self, other: Scored<N>) -> Scored<N> {
        if other.error < self.error {
            other
        } else {
            self
        }
    }
}

impl<N: SequenceModel> Scored<N> {
    /// Scores `network` against `sequence`, priming it with the first `start`
    /// elements.
    pub fn evaluate(mut network: N, sequence: &ChordSequence, start: usize) -> Result<Self> {
        let error = evaluate::error_sum(&mut network, sequence, start)?;
        Ok(Scored { network, error })
    }
}

impl<N> PartialEq for Scored<N> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<N> Eq for Scored<N> {}

impl<N> PartialOrd for Scored<N> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<N> Ord for Scored<N> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.error.total_cmp(&other.error)
    }
}
