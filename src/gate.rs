//! A multi-layer feed-forward gate.
//!
//! A gate is a stack of fully connected layers that all share a single
//! activation function. Each layer's weights are stored as one matrix with an
//! extra bias row, so a layer from `n` to `m` neurons is an `(n + 1) x m`
//! matrix and a forward step is `activate([x, 1] . W)`.

use crate::activator::Activator;
use crate::error::{Error, Result};
use crate::matrix::{self, Mat};
use crate::search::Perturb;
use crate::utils::{Back, Front};

use rand::Rng;
use serde_derive::{Deserialize, Serialize};

/// A feed-forward gate.
///
/// Deserialization checks the layer shapes the same way construction does.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "RawGate")]
pub struct Gate {
    /// The activation function applied after every layer.
    activator: Activator,
    /// One bias-augmented weight matrix per layer.
    weights: Vec<Mat>,
}

/// Every intermediate value of a forward pass, as needed for backpropagation.
#[derive(Clone, Debug)]
pub struct Trace {
    /// Unactivated output of each layer but the last. Entry 0 is the raw
    /// input.
    pub hidden_unactivated: Vec<Mat>,
    /// Activated output of each layer but the last, without bias. Entry 0 is
    /// the raw input.
    pub hidden: Vec<Mat>,
    /// Unactivated output of the final layer.
    pub output_unactivated: Mat,
    /// Activated output of the final layer.
    pub output: Mat,
}

impl Gate {
    /// Creates a new gate with Xavier-initialized weights drawn from the
    /// thread-local random source.
    ///
    /// Arguments:
    ///
    ///  * `activator` - the activation function used by every layer.
    ///  * `inputs` - the number of inputs to the gate.
    ///  * `outputs` - the number of outputs from the gate.
    ///  * `hidden` - the width of each hidden layer. May be empty.
    pub fn new(activator: Activator, inputs: usize, outputs: usize, hidden: &[usize]) -> Result<Self> {
        Gate::new_with_rng(&mut rand::thread_rng(), activator, inputs, outputs, hidden)
    }

    /// Like `new`, drawing the initial weights from `rng`.
    pub fn new_with_rng<R: Rng + ?Sized>(
        rng: &mut R,
        activator: Activator,
        inputs: usize,
        outputs: usize,
        hidden: &[usize],
    ) -> Result<Self> {
        let mut sizes = Vec::with_capacity(hidden.len() + 2);
        sizes.push(inputs);
        sizes.extend_from_slice(hidden);
        sizes.push(outputs);
        if let Some(index) = sizes.iter().position(|&size| size == 0) {
            return Err(Error::Dimension {
                context: "layer size",
                expected: "at least 1 neuron".to_string(),
                found: format!("0 neurons in layer {}", index),
            });
        }

        let weights = sizes
            .windows(2)
            .map(|pair| {
                let rows = pair[0] + 1;
                matrix::gaussian(rng, rows, pair[1], 2.0 / rows as f64)
            })
            .collect();
        Ok(Gate { activator, weights })
    }

    /// Creates a gate with `hidden_layers` hidden layers whose widths are
    /// interpolated linearly between `inputs` and `outputs`.
    pub fn auto(activator: Activator, inputs: usize, outputs: usize, hidden_layers: usize) -> Result<Self> {
        Gate::auto_with_rng(&mut rand::thread_rng(), activator, inputs, outputs, hidden_layers)
    }

    /// Like `auto`, drawing the initial weights from `rng`.
    pub fn auto_with_rng<R: Rng + ?Sized>(
        rng: &mut R,
        activator: Activator,
        inputs: usize,
        outputs: usize,
        hidden_layers: usize,
    ) -> Result<Self> {
        let hidden = interpolated_widths(inputs, outputs, hidden_layers);
        Gate::new_with_rng(rng, activator, inputs, outputs, &hidden)
    }

    /// Returns a copy of this gate with uniform noise from
    /// `[-magnitude, magnitude]` added to every weight, using the thread-local
    /// random source.
    pub fn perturbed(&self, magnitude: f64) -> Self {
        self.perturbed_with(&mut rand::thread_rng(), magnitude)
    }

    /// Like `perturbed`, drawing the noise from `rng`.
    pub fn perturbed_with<R: Rng + ?Sized>(&self, rng: &mut R, magnitude: f64) -> Self {
        let mut clone = self.clone();
        for weight in &mut clone.weights {
            matrix::perturb(weight, rng, magnitude);
        }
        clone
    }

    /// Returns the number of inputs to this gate.
    pub fn input_len(&self) -> usize {
        self.weights.front().nrows() - 1
    }

    /// Returns the number of outputs from this gate.
    pub fn output_len(&self) -> usize {
        self.weights.back().ncols()
    }

    /// Returns the number of layers, hidden layers plus the output layer.
    pub fn layer_count(&self) -> usize {
        self.weights.len()
    }

    pub fn activator(&self) -> Activator {
        self.activator
    }

    /// The bias-augmented weight matrix of every layer.
    pub fn weights(&self) -> &[Mat] {
        &self.weights
    }

    pub(crate) fn weights_mut(&mut self) -> &mut [Mat] {
        &mut self.weights
    }

    /// Total number of weights across all layers, bias rows included.
    pub fn neuron_count(&self) -> usize {
        self.weights.iter().map(|w| w.nrows() * w.ncols()).sum()
    }

    /// Feeds the `1 x inputs` row vector `input` through the gate, returning
    /// the `1 x outputs` activated output.
    pub fn compute(&self, input: &Mat) -> Result<Mat> {
        matrix::expect_row(input, self.input_len(), "gate input")?;
        let last = self.weights.len() - 1;
        let mut hidden = matrix::with_bias(input);
        for weight in &self.weights[..last] {
            hidden = matrix::with_bias(&self.activator.activate(&hidden.dot(weight)));
        }
        Ok(self.activator.activate(&hidden.dot(&self.weights[last])))
    }

    /// Feeds `input` through the gate, keeping every intermediate value.
    pub fn compute_with_trace(&self, input: &Mat) -> Result<Trace> {
        matrix::expect_row(input, self.input_len(), "gate input")?;
        let last = self.weights.len() - 1;
        let mut hidden_unactivated = Vec::with_capacity(self.weights.len());
        let mut hidden = Vec::with_capacity(self.weights.len());
        hidden_unactivated.push(input.clone());
        hidden.push(input.clone());
        for (i, weight) in self.weights[..last].iter().enumerate() {
            let unactivated = matrix::with_bias(&hidden[i]).dot(weight);
            hidden.push(self.activator.activate(&unactivated));
            hidden_unactivated.push(unactivated);
        }
        let output_unactivated = matrix::with_bias(hidden.back()).dot(&self.weights[last]);
        let output = self.activator.activate(&output_unactivated);
        Ok(Trace {
            hidden_unactivated,
            hidden,
            output_unactivated,
            output,
        })
    }

    /// Convenience wrapper around `compute` for plain slices.
    pub fn run(&self, input: &[f64]) -> Result<Vec<f64>> {
        let output = self.compute(&matrix::row(input))?;
        Ok(output.iter().cloned().collect())
    }
}

impl Perturb for Gate {
    fn perturb<R: Rng + ?Sized>(&self, rng: &mut R, magnitude: f64) -> Self {
        self.perturbed_with(rng, magnitude)
    }
}

/// A gate as stored, before its layers are checked.
#[derive(Deserialize)]
struct RawGate {
    activator: Activator,
    weights: Vec<Mat>,
}

impl TryFrom<RawGate> for Gate {
    type Error = Error;

    fn try_from(raw: RawGate) -> Result<Self> {
        check_layers(&raw.weights)?;
        Ok(Gate {
            activator: raw.activator,
            weights: raw.weights,
        })
    }
}

/// Every layer needs a bias row plus at least one input, at least one
/// output, and as many inputs as the previous layer has outputs.
fn check_layers(weights: &[Mat]) -> Result<()> {
    if weights.is_empty() {
        return Err(Error::Dimension {
            context: "gate weights",
            expected: "at least 1 layer".to_string(),
            found: "0 layers".to_string(),
        });
    }
    for (index, weight) in weights.iter().enumerate() {
        if weight.nrows() < 2 || weight.ncols() < 1 {
            return Err(Error::Dimension {
                context: "gate layer",
                expected: "at least 2x1".to_string(),
                found: format!("{}x{} in layer {}", weight.nrows(), weight.ncols(), index),
            });
        }
    }
    for (index, pair) in weights.windows(2).enumerate() {
        if pair[0].ncols() + 1 != pair[1].nrows() {
            return Err(Error::Dimension {
                context: "gate layer",
                expected: format!("{} rows in layer {}", pair[0].ncols() + 1, index + 1),
                found: format!("{} rows", pair[1].nrows()),
            });
        }
    }
    Ok(())
}

/// Hidden layer widths stepping linearly from `inputs` towards `outputs`.
fn interpolated_widths(inputs: usize, outputs: usize, hidden_layers: usize) -> Vec<usize> {
    (0..hidden_layers)
        .map(|i| {
            let x = (i as f64 + 1.0) / (hidden_layers as f64 + 1.0);
            (x * outputs as f64 + (1.0 - x) * inputs as f64).round() as usize
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn gate(hidden: &[usize]) -> Gate {
        let mut rng = StdRng::seed_from_u64(42);
        Gate::new_with_rng(&mut rng, Activator::TanH, 3, 2, hidden).unwrap()
    }

    #[test]
    fn layer_shapes() {
        let g = gate(&[4, 5]);
        let shapes: Vec<_> = g.weights().iter().map(|w| w.dim()).collect();
        assert_eq!(shapes, vec![(4, 4), (5, 5), (6, 2)]);
        assert_eq!(g.input_len(), 3);
        assert_eq!(g.output_len(), 2);
        assert_eq!(g.layer_count(), 3);
        assert_eq!(g.neuron_count(), 16 + 25 + 12);
    }

    #[test]
    fn no_hidden_layers() {
        let g = gate(&[]);
        assert_eq!(g.layer_count(), 1);
        assert_eq!(g.weights()[0].dim(), (4, 2));
        assert_eq!(g.compute(&matrix::row(&[1.0, 2.0, 3.0])).unwrap().dim(), (1, 2));
    }

    #[test]
    fn empty_layer() {
        assert!(matches!(
            Gate::new(Activator::Sigmoid, 2, 1, &[3, 0]),
            Err(Error::Dimension { context: "layer size", .. })
        ));
        assert!(matches!(
            Gate::new(Activator::TanH, 2, 1, &[0]),
            Err(Error::Dimension { .. })
        ));
        assert!(Gate::new(Activator::Sigmoid, 0, 1, &[]).is_err());
        assert!(Gate::new(Activator::Sigmoid, 1, 0, &[]).is_err());
    }

    #[test]
    fn auto_widths() {
        assert_eq!(interpolated_widths(10, 2, 3), vec![8, 6, 4]);
        assert_eq!(interpolated_widths(4, 4, 2), vec![4, 4]);
        assert!(interpolated_widths(4, 1, 0).is_empty());
        let g = Gate::auto(Activator::Sigmoid, 10, 2, 3).unwrap();
        assert_eq!(g.weights()[1].dim(), (9, 6));
    }

    #[test]
    fn output_width() {
        let g = gate(&[4]);
        let out = g.compute(&matrix::row(&[0.5, -0.5, 1.0])).unwrap();
        assert_eq!(out.dim(), (1, 2));
        assert!(out.iter().all(|v| v.abs() < 1.0));
        assert_eq!(g.run(&[0.5, -0.5, 1.0]).unwrap().len(), 2);
    }

    #[test]
    fn wrong_input_size() {
        let g = gate(&[4]);
        assert!(matches!(
            g.compute(&matrix::row(&[1.0, 2.0])),
            Err(Error::Dimension { .. })
        ));
        assert!(g.compute(&Mat::zeros((2, 3))).is_err());
        assert!(g.compute_with_trace(&matrix::row(&[1.0; 4])).is_err());
    }

    #[test]
    fn trace_matches_compute() {
        let g = gate(&[4, 3]);
        let input = matrix::row(&[0.1, 0.7, -2.0]);
        let direct = g.compute(&input).unwrap();
        let trace = g.compute_with_trace(&input).unwrap();
        assert_eq!(trace.output, direct);
        assert_eq!(g.activator().activate(&trace.output_unactivated), direct);
        assert_eq!(trace.hidden.len(), 3);
        assert_eq!(trace.hidden[0], input);
        assert_eq!(trace.hidden_unactivated[0], input);
        let rederived = g
            .activator()
            .activate(&matrix::with_bias(&trace.hidden[2]).dot(&g.weights()[2]));
        assert_eq!(rederived, direct);
    }

    #[test]
    fn zero_magnitude_clone_is_identical() {
        let g = gate(&[4]);
        let mut rng = StdRng::seed_from_u64(1);
        let clone = g.perturbed_with(&mut rng, 0.0);
        let input = matrix::row(&[0.3, 0.2, 0.1]);
        assert_eq!(clone.compute(&input).unwrap(), g.compute(&input).unwrap());
        assert_eq!(g.perturbed(0.0).weights(), g.weights());
    }

    #[test]
    fn perturbed_clone_stays_within_magnitude() {
        let g = gate(&[4]);
        let mut rng = StdRng::seed_from_u64(9);
        let clone = g.perturbed_with(&mut rng, 0.1);
        for (a, b) in g.weights().iter().zip(clone.weights()) {
            assert_eq!(a.dim(), b.dim());
            assert!((a - b).iter().all(|d| d.abs() <= 0.1 + 1e-12));
        }
        assert_ne!(clone.weights(), g.weights());
    }

    #[test]
    fn seeded_streams_are_reproducible() {
        let g = gate(&[4]);
        let a = g.perturbed_with(&mut StdRng::seed_from_u64(5), 0.5);
        let b = g.perturbed_with(&mut StdRng::seed_from_u64(5), 0.5);
        assert_eq!(a.weights(), b.weights());
    }

    #[test]
    fn serializes_as_a_unit() {
        let g = gate(&[4]);
        let json = serde_json::to_string(&g).unwrap();
        let back: Gate = serde_json::from_str(&json).unwrap();
        let input = matrix::row(&[1.0, 0.0, -1.0]);
        assert_eq!(back.compute(&input).unwrap(), g.compute(&input).unwrap());
    }

    #[test]
    fn deserialization_checks_layers() {
        let load = |value: serde_json::Value| serde_json::from_value::<Gate>(value);

        let empty = serde_json::json!({ "activator": "TanH", "weights": [] });
        assert!(load(empty).is_err());

        let mismatched = serde_json::json!({
            "activator": "TanH",
            "weights": [Mat::zeros((4, 4)), Mat::zeros((6, 1))],
        });
        assert!(load(mismatched).is_err());

        let no_inputs = serde_json::json!({
            "activator": "TanH",
            "weights": [Mat::zeros((1, 2))],
        });
        assert!(load(no_inputs).is_err());

        let fitting = serde_json::json!({
            "activator": "TanH",
            "weights": [Mat::zeros((4, 4)), Mat::zeros((5, 1))],
        });
        let g = load(fitting).unwrap();
        assert_eq!(g.input_len(), 3);
        assert_eq!(g.compute(&matrix::row(&[1.0, 2.0, 3.0])).unwrap(), matrix::row(&[0.0]));
    }
}
