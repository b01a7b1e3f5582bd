//! Thread-parallel annealing.

use super::{fork_join, interrupted, select, Job, Perturb, SearchOutcome, SearchResult};
use crate::evaluate::SequenceModel;
use crate::scored::Scored;

use rand::rngs::StdRng;
use std::fmt::Debug;

/// Each epoch, every worker perturbs the incumbent once from its own stream.
/// The lowest scoring of the candidates and the incumbent carries over.
pub(super) fn run<N>(mut incumbent: Scored<N>, job: &Job, streams: &mut [StdRng]) -> SearchResult<N>
where
    N: SequenceModel + Perturb + Debug + Send + Sync,
{
    let mut history = Vec::with_capacity(job.iterations + 1);
    history.push(incumbent.error());
    for epoch in 0..job.iterations {
        let magnitude = job.magnitude_at(epoch);
        let candidates = match fork_join(epoch, &incumbent, streams, |parent, rng| {
            job.evaluate(parent.network().perturb(rng, magnitude))
        }) {
            Ok(candidates) => candidates,
            Err(error) => return Err(interrupted(error, incumbent, history)),
        };
        incumbent = select(incumbent, candidates);
        job.finish_epoch(epoch, &incumbent, &mut history);
    }
    Ok(SearchOutcome {
        best: incumbent,
        history,
    })
}
