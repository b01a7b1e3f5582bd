//! Training by stochastic search.
//!
//! Search strategies never touch a network's weights in place. Every epoch
//! they clone the incumbent with random noise added to its weights, score the
//! clones on a sequence, and keep whichever network scores lowest. The noise
//! magnitude shrinks linearly to zero over the run.
//!
//! The parallel strategies fork one worker per processing unit each epoch and
//! join all of them before selecting, so an epoch never starts until the
//! previous one has fully finished. Each worker owns a random stream seeded
//! once from the search seed, which keeps seeded runs reproducible.
//!
//! A failed epoch ends the search. The error comes back as a `SearchError`
//! carrying the incumbent from before that epoch.

mod annealing;
mod genetic;
mod simulated;

use crate::error::{Error, Result};
use crate::evaluate::SequenceModel;
use crate::scored::Scored;
use crate::sequence::ChordSequence;
use crate::trainer::Logging;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt::Debug;
use std::thread;
use std::time::Instant;
use tracing::{debug, warn};

/// A network that can produce randomly perturbed copies of itself.
pub trait Perturb: Sized {
    /// Returns a copy with uniform noise from `[-magnitude, magnitude]` added
    /// to every weight, drawn from `rng`.
    fn perturb<R: Rng + ?Sized>(&self, rng: &mut R, magnitude: f64) -> Self;
}

/// The search strategy to train with.
#[derive(Copy, Clone, Debug)]
pub enum Strategy {
    /// One perturbed candidate per epoch, on the calling thread.
    SimulatedAnnealing,
    /// One perturbed candidate per worker per epoch.
    Annealing,
    /// A chain of `generations` candidates per worker per epoch, each
    /// perturbed from the one before.
    GeneticAnnealing { generations: usize },
}

/// The result of a search.
#[derive(Debug)]
pub struct SearchOutcome<N> {
    /// The best network found and its error.
    pub best: Scored<N>,
    /// The incumbent error before the first epoch, then after every epoch.
    pub history: Vec<f64>,
}

/// A search that stopped on an error.
#[derive(Debug, thiserror::Error)]
#[error("search stopped after {} epochs: {error}", .history.len().saturating_sub(1))]
pub struct SearchError<N: Debug> {
    /// What stopped the search.
    #[source]
    pub error: Error,
    /// The incumbent when the search stopped, `None` if the initial network
    /// could not be scored.
    pub best: Option<Scored<N>>,
    /// The incumbent error before the first epoch, then after every completed
    /// epoch.
    pub history: Vec<f64>,
}

impl<N: Debug> From<SearchError<N>> for Error {
    fn from(err: SearchError<N>) -> Error {
        err.error
    }
}

pub type SearchResult<N> = std::result::Result<SearchOutcome<N>, SearchError<N>>;

/// A builder for training a network by stochastic search.
#[derive(Debug)]
pub struct Search<N> {
    network: N,
    strategy: Strategy,
    magnitude: f64,
    iterations: usize,
    context: usize,
    workers: Option<usize>,
    seed: Option<u64>,
    logging: Logging,
}

impl<N> Search<N>
where
    N: SequenceModel + Perturb + Debug + Send + Sync,
{
    /// Creates a new Search instance.
    ///
    /// The search is initialized with some default values. These defaults
    /// are:
    ///
    /// * Parallel annealing.
    /// * An initial magnitude of 0.1.
    /// * Runs for 100 epochs.
    /// * No context-only elements.
    /// * One worker per available processing unit.
    /// * A seed drawn from the operating system.
    /// * Logs on training completion.
    pub fn new(network: N) -> Self {
        Search {
            network,
            strategy: Strategy::Annealing,
            magnitude: 0.1,
            iterations: 100,
            context: 0,
            workers: None,
            seed: None,
            logging: Logging::Completion,
        }
    }

    /// Sets the search strategy.
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the noise magnitude of the first epoch.
    pub fn magnitude(mut self, magnitude: f64) -> Self {
        self.magnitude = magnitude;
        self
    }

    /// Sets the number of epochs.
    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Sets how many leading sequence elements only prime the network's
    /// state, without being scored.
    pub fn context(mut self, context: usize) -> Self {
        self.context = context;
        self
    }

    /// Sets the number of workers forked per epoch by the parallel
    /// strategies.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Seeds every random stream used by the search.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the type of logging to be emitted during training.
    pub fn logging(mut self, logging: Logging) -> Self {
        self.logging = logging;
        self
    }

    /// Trains the network against `sequence`.
    ///
    /// Returns:
    ///   The best network found, or the first error raised while scoring a
    ///   candidate along with the best network found before it. A panicking
    ///   worker is reported as `Error::WorkerPanicked` once every other worker
    ///   of its epoch has finished.
    pub fn train(self, sequence: &ChordSequence) -> SearchResult<N> {
        let start_time = Instant::now();
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let job = Job {
            sequence,
            context: self.context,
            magnitude: self.magnitude,
            iterations: self.iterations,
            logging: self.logging,
        };
        let incumbent = job.evaluate(self.network).map_err(|error| SearchError {
            error,
            best: None,
            history: Vec::new(),
        })?;
        let workers = self.workers.unwrap_or_else(available_workers).max(1);

        let outcome = match self.strategy {
            Strategy::SimulatedAnnealing => simulated::run(incumbent, &job, &mut rng)?,
            Strategy::Annealing => {
                let mut streams = worker_streams(&mut rng, workers);
                annealing::run(incumbent, &job, &mut streams)?
            }
            Strategy::GeneticAnnealing { generations } => {
                let mut streams = worker_streams(&mut rng, workers);
                genetic::run(incumbent, &job, &mut streams, generations.max(1))?
            }
        };
        self.logging
            .completion(self.iterations, outcome.best.error(), start_time);
        Ok(outcome)
    }
}

/// Ends a search on `error`, handing back the incumbent and its history.
fn interrupted<N: Debug>(error: Error, incumbent: Scored<N>, history: Vec<f64>) -> SearchError<N> {
    SearchError {
        error,
        best: Some(incumbent),
        history,
    }
}

/// Everything an epoch needs besides the incumbent.
struct Job<'a> {
    sequence: &'a ChordSequence,
    context: usize,
    magnitude: f64,
    iterations: usize,
    logging: Logging,
}

impl<'a> Job<'a> {
    /// Noise magnitude for `epoch`, decaying linearly towards zero.
    fn magnitude_at(&self, epoch: usize) -> f64 {
        (self.iterations - epoch) as f64 * self.magnitude / self.iterations as f64
    }

    fn evaluate<N: SequenceModel>(&self, network: N) -> Result<Scored<N>> {
        Scored::evaluate(network, self.sequence, self.context)
    }

    /// Records the incumbent error at the end of `epoch`.
    fn finish_epoch<N>(&self, epoch: usize, incumbent: &Scored<N>, history: &mut Vec<f64>) {
        history.push(incumbent.error());
        self.logging.iteration(epoch + 1, incumbent.error());
    }
}

fn available_workers() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Derives one independent stream per worker from `rng`.
fn worker_streams(rng: &mut StdRng, workers: usize) -> Vec<StdRng> {
    (0..workers).map(|_| StdRng::seed_from_u64(rng.gen())).collect()
}

/// Runs `work` once per stream, each on its own thread, and waits for all of
/// them.
///
/// Every worker sees the same incumbent and returns its own candidate. If any
/// worker fails, the remaining ones are still joined and the first failure by
/// worker index is returned instead of the candidates.
fn fork_join<N, F>(epoch: usize, incumbent: &Scored<N>, streams: &mut [StdRng], work: F) -> Result<Vec<Scored<N>>>
where
    N: Send + Sync,
    F: Fn(&Scored<N>, &mut StdRng) -> Result<Scored<N>> + Sync,
{
    let work = &work;
    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = streams
            .iter_mut()
            .map(|rng| scope.spawn(move || work(incumbent, rng)))
            .collect();
        handles.into_iter().map(|handle| handle.join()).collect()
    });

    let mut candidates = Vec::with_capacity(results.len());
    let mut failure = None;
    for (worker, result) in results.into_iter().enumerate() {
        match result {
            Ok(Ok(candidate)) => {
                debug!(epoch, worker, error = candidate.error(), "candidate scored");
                candidates.push(candidate);
            }
            Ok(Err(err)) => {
                warn!(epoch, worker, %err, "search worker failed");
                failure.get_or_insert(err);
            }
            Err(_) => {
                warn!(epoch, worker, "search worker panicked");
                failure.get_or_insert(Error::WorkerPanicked { epoch, worker });
            }
        }
    }
    match failure {
        Some(err) => Err(err),
        None => Ok(candidates),
    }
}

/// Keeps the incumbent unless a candidate beats it. Ties go to the incumbent,
/// then to the lowest worker index.
fn select<N>(incumbent: Scored<N>, candidates: Vec<Scored<N>>) -> Scored<N> {
    candidates.into_iter().fold(incumbent, Scored::better_of)
}

#[cfg(test)]
mod test_support {
    use super::Perturb;
    use crate::error::Result;
    use crate::evaluate::SequenceModel;
    use crate::matrix::{self, Mat};
    use crate::sequence::ChordSequence;

    use rand::distributions::Uniform;
    use rand::Rng;

    /// A stateless model that always predicts the same row.
    #[derive(Clone, Debug)]
    pub struct Constant(pub Mat);

    impl SequenceModel for Constant {
        fn start(&mut self, _: &Mat) -> Result<()> {
            Ok(())
        }

        fn observe(&mut self, _: &Mat) -> Result<()> {
            Ok(())
        }

        fn predict(&self) -> Result<Mat> {
            Ok(self.0.clone())
        }
    }

    impl Perturb for Constant {
        fn perturb<R: Rng + ?Sized>(&self, rng: &mut R, magnitude: f64) -> Self {
            let noise = Uniform::new_inclusive(-magnitude, magnitude);
            Constant(self.0.mapv(|v| v + rng.sample(noise)))
        }
    }

    pub fn target() -> ChordSequence {
        ChordSequence::from_rows(&[], &[[0.25, 0.75, 0.5]; 6]).unwrap()
    }

    pub fn start() -> Constant {
        Constant(matrix::row(&[0.0, 0.0, 0.0]))
    }

    pub fn assert_non_increasing(history: &[f64]) {
        for pair in history.windows(2) {
            assert!(pair[1] <= pair[0], "{:?}", history);
        }
    }
}
