//! Scoring stateful models against target sequences.

use crate::error::Result;
use crate::matrix::{self, Mat};
use crate::sequence::ChordSequence;

/// A model that consumes a sequence one element at a time, carrying state
/// from one element to the next.
pub trait SequenceModel {
    /// Clears the carried state and starts a new sequence described by
    /// `infos`.
    fn start(&mut self, infos: &Mat) -> Result<()>;

    /// Advances the carried state with `element`.
    fn observe(&mut self, element: &Mat) -> Result<()>;

    /// Predicts the next element from the current state, without advancing
    /// it.
    fn predict(&self) -> Result<Mat>;
}

/// Sums the prediction error of `model` over `sequence`.
///
/// The first `start` elements only prime the model's state. Every later
/// element is first predicted and scored by its mean absolute difference from
/// the target, then the target itself (not the prediction) is observed, so
/// one bad guess does not derail the rest of the sequence.
pub fn error_sum<M>(model: &mut M, sequence: &ChordSequence, start: usize) -> Result<f64>
where
    M: SequenceModel + ?Sized,
{
    model.start(sequence.infos())?;
    let mut error = 0.0;
    for (i, target) in sequence.chords().iter().enumerate() {
        if i >= start {
            let predicted = model.predict()?;
            matrix::expect_row(&predicted, target.ncols(), "predicted chord")?;
            error += matrix::mean_abs_diff(target, &predicted);
        }
        model.observe(target)?;
    }
    Ok(error)
}
