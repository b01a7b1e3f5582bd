//! Utilities for training gates with gradient descent.

use crate::backprop::Backpropagation;
use crate::error::{Error, Result};
use crate::gate::Gate;
use crate::matrix::{self, Mat};

use std::time::{Duration, Instant};
use tracing::info;

/// A builder for training a gate with backpropagation.
#[derive(Debug)]
pub struct Trainer {
    gate: Gate,
    learning_mode: LearningMode,
    learning_rate: f64,
    momentum: f64,
    logging: Logging,
    stop_condition: StopCondition,
}

impl Trainer {
    /// Creates a new Trainer instance.
    ///
    /// The trainer is initialized with some default values. These defaults are:
    ///
    /// * A stochastic learning mode.
    /// * A learning rate of 0.1.
    /// * A momentum of 0.9.
    /// * Stops after 1000 training iterations.
    /// * Logs on training completion.
    pub fn new(gate: Gate) -> Self {
        Trainer {
            gate,
            learning_mode: LearningMode::Stochastic,
            learning_rate: 0.1,
            momentum: 0.9,
            logging: Logging::Completion,
            stop_condition: StopCondition::Iterations(1000),
        }
    }

    /// Sets the `LearningMode` to use for training.
    pub fn learning_mode(mut self, mode: LearningMode) -> Self {
        self.learning_mode = mode;
        self
    }

    /// Sets the learning rate to use during gradient descent.
    pub fn learning_rate(mut self, rate: f64) -> Self {
        self.learning_rate = rate;
        self
    }

    /// Sets the fraction of the previous update carried into the next one.
    pub fn momentum(mut self, momentum: f64) -> Self {
        self.momentum = momentum;
        self
    }

    /// Sets the type of logging to be emitted during training.
    pub fn logging(mut self, logging: Logging) -> Self {
        self.logging = logging;
        self
    }

    /// Sets the condition to finish training.
    pub fn stop_condition<C>(mut self, condition: C) -> Self
    where
        C: Into<StopCondition>,
    {
        self.stop_condition = condition.into();
        self
    }

    /// Trains the gate using the provided labelled data.
    ///
    /// The provided `examples` should be a list of labelled data, where each
    /// element takes the form `(gate input, expected output)`.
    ///
    /// Returns:
    ///   The trained gate, or an error if an example does not fit the gate or
    ///   the batch size is invalid. Nothing is trained in the error case.
    pub fn train<I, O>(mut self, examples: &[(I, O)]) -> Result<Gate>
    where
        I: AsRef<[f64]>,
        O: AsRef<[f64]>,
    {
        let (inputs, ideals) = self.validate(examples)?;
        let mut backprop = Backpropagation::new(self.learning_rate, self.momentum);

        let batch_size = match self.learning_mode {
            LearningMode::Stochastic => 1,
            LearningMode::Batch(size) => size,
        };
        let start_time = Instant::now();
        let mut iteration = 0;
        let mut training_error;
        loop {
            training_error = 0.0;
            let mut batches = 0;
            for (input, ideal) in inputs.chunks(batch_size).zip(ideals.chunks(batch_size)) {
                training_error += if batch_size == 1 {
                    backprop.train(&mut self.gate, &input[0], &ideal[0])?
                } else {
                    backprop.train_batch(&mut self.gate, input, ideal)?
                };
                batches += 1;
            }
            if batches > 0 {
                training_error /= batches as f64;
            }
            iteration += 1;

            self.logging.iteration(iteration, training_error);
            if self
                .stop_condition
                .should_stop(iteration, training_error, start_time)
            {
                break;
            }
        }
        self.logging
            .completion(iteration, training_error, start_time);
        Ok(self.gate)
    }

    /// Converts the examples into row vectors, returning an error if any does
    /// not fit the gate.
    fn validate<I, O>(&self, examples: &[(I, O)]) -> Result<(Vec<Mat>, Vec<Mat>)>
    where
        I: AsRef<[f64]>,
        O: AsRef<[f64]>,
    {
        if let LearningMode::Batch(batch_size) = self.learning_mode {
            if batch_size == 0 || batch_size > examples.len() {
                return Err(Error::BatchSize {
                    size: batch_size,
                    examples: examples.len(),
                });
            }
        }
        let mut inputs = Vec::with_capacity(examples.len());
        let mut ideals = Vec::with_capacity(examples.len());
        for (input, ideal) in examples {
            let input = matrix::row(input.as_ref());
            let ideal = matrix::row(ideal.as_ref());
            matrix::expect_row(&input, self.gate.input_len(), "training input")?;
            matrix::expect_row(&ideal, self.gate.output_len(), "training ideal")?;
            inputs.push(input);
            ideals.push(ideal);
        }
        Ok((inputs, ideals))
    }
}

/// The learning mode to use for training
#[derive(Copy, Clone, Debug)]
pub enum LearningMode {
    /// Apply weight updates after every training example
    Stochastic,
    /// Apply weights updates in batches of the provided size
    ///
    /// Must be less than the total number of training instances.
    Batch(usize),
}

/// Logging frequency to use during training
#[derive(Copy, Clone, Debug)]
pub enum Logging {
    /// No logs will be emitted
    Silent,
    /// A summary will be emitted at completion
    Completion,
    /// A summary will be emitted after every `n` training iterations
    Iterations(usize),
}

impl Logging {
    /// Performs logging at the current `iteration` of training.
    pub(crate) fn iteration(&self, iteration: usize, training_error: f64) {
        use self::Logging::*;
        if let Iterations(freq) = *self {
            if freq > 0 && iteration % freq == 0 {
                info!(iteration, error = training_error, "training progress");
            }
        }
    }

    /// Performs logging at the end of training.
    pub(crate) fn completion(
        &self,
        iterations: usize,
        training_error: f64,
        start_time: Instant,
    ) {
        if let Logging::Silent = *self {
            return;
        }
        info!(
            iterations,
            error = training_error,
            seconds = start_time.elapsed().as_secs_f64(),
            "training complete"
        );
    }
}

/// When to stop training
#[derive(Copy, Clone, Debug)]
pub enum StopCondition {
    /// Stops after the provided number of training iterations
    Iterations(usize),
    /// Stops when the training error drops below the provided threshold
    ErrorThreshold(f64),
    /// Stops after the provided duration
    Duration(Duration),
}

impl From<Duration> for StopCondition {
    fn from(duration: Duration) -> StopCondition {
        StopCondition::Duration(duration)
    }
}

impl StopCondition {
    /// Returns true of training is complete.
    fn should_stop(
        &self,
        iteration: usize,
        training_error: f64,
        start_time: Instant,
    ) -> bool {
        match *self {
            StopCondition::Iterations(iterations) => iteration >= iterations,
            StopCondition::ErrorThreshold(threshold) => training_error < threshold,
            StopCondition::Duration(duration) => start_time.elapsed() > duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activator::Activator;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const XOR: [([f64; 2], [f64; 1]); 4] = [
        ([0.0, 0.0], [0.0]),
        ([0.0, 1.0], [1.0]),
        ([1.0, 0.0], [1.0]),
        ([1.0, 1.0], [0.0]),
    ];

    fn gate(inputs: usize, outputs: usize) -> Gate {
        let mut rng = StdRng::seed_from_u64(21);
        Gate::new_with_rng(&mut rng, Activator::Sigmoid, inputs, outputs, &[3]).unwrap()
    }

    #[test]
    fn wrong_input_size() {
        let examples = [([0.0, 0.0], [0.0])];
        assert!(Trainer::new(gate(1, 1)).train(&examples[..]).is_err());
    }

    #[test]
    fn wrong_output_size() {
        let examples = [([0.0], [0.0, 0.0])];
        assert!(Trainer::new(gate(1, 1)).train(&examples[..]).is_err());
    }

    #[test]
    fn too_large_batch_size() {
        let examples = [([0.0], [0.0])];
        assert!(matches!(
            Trainer::new(gate(1, 1))
                .learning_mode(LearningMode::Batch(2))
                .train(&examples[..]),
            Err(Error::BatchSize { size: 2, examples: 1 })
        ));
    }

    #[test]
    fn empty_batch_size() {
        let examples = [([0.0], [0.0])];
        assert!(Trainer::new(gate(1, 1))
            .learning_mode(LearningMode::Batch(0))
            .train(&examples[..])
            .is_err());
    }

    #[test]
    fn trains_xor() {
        let network = Trainer::new(gate(2, 1))
            .learning_rate(0.5)
            .momentum(0.9)
            .logging(Logging::Silent)
            .stop_condition(StopCondition::Iterations(20_000))
            .train(&XOR[..])
            .unwrap();
        for (input, expected) in XOR.iter() {
            let output = network.run(input).unwrap();
            assert!((output[0] - expected[0]).abs() < 0.5, "{:?} -> {:?}", input, output);
        }
    }

    #[test]
    fn stops_on_error_threshold() {
        let examples = [([0.5], [0.5])];
        // Any error is below an infinite threshold, so one pass suffices.
        let trained = Trainer::new(gate(1, 1))
            .logging(Logging::Silent)
            .stop_condition(StopCondition::ErrorThreshold(f64::INFINITY))
            .train(&examples[..]);
        assert!(trained.is_ok());
    }

    #[test]
    fn stops_after_duration() {
        let examples = [([0.5], [0.5])];
        let trained = Trainer::new(gate(1, 1))
            .learning_mode(LearningMode::Batch(1))
            .stop_condition(Duration::from_millis(1))
            .train(&examples[..]);
        assert!(trained.is_ok());
    }
}
