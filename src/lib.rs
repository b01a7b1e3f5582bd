//! Small neural networks for composing chord sequences.
//!
//! A [`Gate`](gate::Gate) is a fully connected feed-forward network. Gates
//! can be trained by gradient descent through a [`Trainer`](trainer::Trainer),
//! or combined four at a time into a recurrent
//! [`Composer`](composer::Composer) and trained by stochastic
//! [`Search`](search::Search) against a [`ChordSequence`](sequence::ChordSequence).
//!
//! # Example
//!
//! Let's train a simple gate to compute the XOR function:
//!
//! ```
//! # use cadence::activator::Activator;
//! # use cadence::gate::Gate;
//! # use cadence::trainer::*;
//! # use rand::rngs::StdRng;
//! # use rand::SeedableRng;
//! // Create examples of the XOR function
//! let examples = [([0.0, 0.0], [0.0]),
//!                 ([0.0, 1.0], [1.0]),
//!                 ([1.0, 0.0], [1.0]),
//!                 ([1.0, 1.0], [0.0])];
//!
//! // Train a gate using those examples
//! let mut rng = StdRng::seed_from_u64(21);
//! let gate = Gate::new_with_rng(&mut rng, Activator::Sigmoid, 2, 1, &[3]).unwrap();
//! let gate = Trainer::new(gate)
//!     .learning_rate(0.5)
//!     .logging(Logging::Silent)
//!     .stop_condition(StopCondition::Iterations(20000))
//!     .train(&examples[..])
//!     .unwrap();
//!
//! // And verify the gate correctly computes XOR!
//! fn classify(out: Vec<f64>) -> bool {
//!     out[0] > 0.5
//! }
//! assert_eq!(classify(gate.run(&[0.0, 0.0]).unwrap()), false);
//! assert_eq!(classify(gate.run(&[0.0, 1.0]).unwrap()), true);
//! assert_eq!(classify(gate.run(&[1.0, 0.0]).unwrap()), true);
//! assert_eq!(classify(gate.run(&[1.0, 1.0]).unwrap()), false);
//! ```

pub mod activator;
pub mod backprop;
pub mod composer;
pub mod error;
pub mod evaluate;
pub mod gate;
pub mod matrix;
pub mod scored;
pub mod search;
pub mod sequence;
pub mod trainer;

mod utils;

pub use crate::error::{Error, Result};
