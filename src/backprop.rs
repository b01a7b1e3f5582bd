//! Gradient descent on a single gate.
//!
//! Gradients are derived by hand, layer by layer, from a forward `Trace`. The
//! update for each layer is `delta = -rate * [h, 1]^T . signal`, applied
//! together with `momentum` times the previous update.

use crate::error::{Error, Result};
use crate::gate::Gate;
use crate::matrix::{self, Mat};

use itertools::multizip;

/// Backpropagation with momentum.
///
/// Holds the previous weight update of every layer, so one instance should be
/// used with one gate for the duration of its training.
#[derive(Clone, Debug)]
pub struct Backpropagation {
    learning_rate: f64,
    momentum: f64,
    last_deltas: Vec<Mat>,
}

impl Backpropagation {
    pub fn new(learning_rate: f64, momentum: f64) -> Self {
        Backpropagation {
            learning_rate,
            momentum,
            last_deltas: Vec::new(),
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn momentum(&self) -> f64 {
        self.momentum
    }

    /// Forgets the previous update, so the next step carries no momentum.
    pub fn reset(&mut self) {
        self.last_deltas.clear();
    }

    /// Trains `gate` on a single example and returns the mean absolute error
    /// of the prediction made before the update.
    pub fn train(&mut self, gate: &mut Gate, input: &Mat, ideal: &Mat) -> Result<f64> {
        check_example(gate, input, ideal)?;
        let (deltas, error) = self.deltas(gate, input, ideal)?;
        self.apply(gate, deltas);
        Ok(error)
    }

    /// Trains `gate` on a batch, summing every example's update into a single
    /// step. Returns the mean of the per-example errors.
    pub fn train_batch(&mut self, gate: &mut Gate, inputs: &[Mat], ideals: &[Mat]) -> Result<f64> {
        if inputs.len() != ideals.len() {
            return Err(Error::length("batch ideals", inputs.len(), ideals.len()));
        }
        for (input, ideal) in inputs.iter().zip(ideals) {
            check_example(gate, input, ideal)?;
        }
        if inputs.is_empty() {
            return Ok(0.0);
        }

        let mut total: Vec<Mat> = gate.weights().iter().map(|w| Mat::zeros(w.dim())).collect();
        let mut error = 0.0;
        for (input, ideal) in inputs.iter().zip(ideals) {
            let (deltas, e) = self.deltas(gate, input, ideal)?;
            for (sum, delta) in total.iter_mut().zip(&deltas) {
                *sum += delta;
            }
            error += e;
        }
        self.apply(gate, total);
        Ok(error / inputs.len() as f64)
    }

    /// Computes the weight update for every layer without applying it.
    fn deltas(&self, gate: &Gate, input: &Mat, ideal: &Mat) -> Result<(Vec<Mat>, f64)> {
        let trace = gate.compute_with_trace(input)?;
        let activator = gate.activator();
        let weights = gate.weights();
        let last = weights.len() - 1;
        let rate = -self.learning_rate;

        // Deltas are collected from the output layer backwards.
        let mut deltas = Vec::with_capacity(weights.len());
        let mut signal = (&trace.output - ideal) * &activator.derivative(&trace.output_unactivated);
        deltas.push(matrix::with_bias(&trace.hidden[last]).t().dot(&signal) * rate);
        for layer in (0..last).rev() {
            // The bias column has no upstream neuron to receive its error.
            let propagated = matrix::without_last_column(&signal.dot(&weights[layer + 1].t()));
            signal = propagated * &activator.derivative(&trace.hidden_unactivated[layer + 1]);
            deltas.push(matrix::with_bias(&trace.hidden[layer]).t().dot(&signal) * rate);
        }
        deltas.reverse();

        Ok((deltas, matrix::mean_abs_diff(ideal, &trace.output)))
    }

    fn apply(&mut self, gate: &mut Gate, deltas: Vec<Mat>) {
        let shapes_match = self.last_deltas.len() == deltas.len()
            && self.last_deltas.iter().zip(&deltas).all(|(l, d)| l.dim() == d.dim());
        if !shapes_match {
            self.last_deltas = deltas.iter().map(|d| Mat::zeros(d.dim())).collect();
        }

        let momentum = self.momentum;
        for (weight, delta, last) in multizip((gate.weights_mut().iter_mut(), &deltas, &self.last_deltas)) {
            *weight += delta;
            weight.scaled_add(momentum, last);
        }
        self.last_deltas = deltas;
    }
}

fn check_example(gate: &Gate, input: &Mat, ideal: &Mat) -> Result<()> {
    matrix::expect_row(input, gate.input_len(), "training input")?;
    matrix::expect_row(ideal, gate.output_len(), "training ideal")
}
