//! Single-threaded simulated annealing.

use super::{interrupted, Job, Perturb, SearchOutcome, SearchResult};
use crate::evaluate::SequenceModel;
use crate::scored::Scored;

use rand::rngs::StdRng;
use std::fmt::Debug;

/// Perturbs the incumbent once per epoch, keeping the copy only if it scores
/// strictly lower.
pub(super) fn run<N>(mut incumbent: Scored<N>, job: &Job, rng: &mut StdRng) -> SearchResult<N>
where
    N: SequenceModel + Perturb + Debug,
{
    let mut history = Vec::with_capacity(job.iterations + 1);
    history.push(incumbent.error());
    for epoch in 0..job.iterations {
        let candidate = incumbent.network().perturb(rng, job.magnitude_at(epoch));
        let candidate = match job.evaluate(candidate) {
            Ok(candidate) => candidate,
            Err(error) => return Err(interrupted(error, incumbent, history)),
        };
        incumbent = incumbent.better_of(candidate);
        job.finish_epoch(epoch, &incumbent, &mut history);
    }
    Ok(SearchOutcome {
        best: incumbent,
        history,
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::trainer::Logging;
    use rand::SeedableRng;

    #[test]
    fn keeps_only_improvements() {
        let seq = target();
        let job = Job {
            sequence: &seq,
            context: 0,
            magnitude: 0.4,
            iterations: 30,
            logging: Logging::Silent,
        };
        let incumbent = job.evaluate(start()).unwrap();
        let initial = incumbent.error();
        let outcome = run(incumbent, &job, &mut StdRng::seed_from_u64(4)).unwrap();
        assert_eq!(outcome.history[0], initial);
        assert_eq!(outcome.history.len(), 31);
        assert_non_increasing(&outcome.history);
        assert!(outcome.best.error() < initial);
    }
}
