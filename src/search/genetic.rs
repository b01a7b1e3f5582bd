//! Genetic annealing: a short random walk per worker per epoch.

use super::{fork_join, interrupted, select, Job, Perturb, SearchOutcome, SearchResult};
use crate::error::Result;
use crate::evaluate::SequenceModel;
use crate::scored::Scored;

use rand::rngs::StdRng;
use std::fmt::Debug;

/// Each epoch, every worker grows a chain of `generations` networks from the
/// incumbent, each one a perturbed copy of the previous, and reports the
/// best of its chain. The lowest scoring chain best or the incumbent carries
/// over.
pub(super) fn run<N>(
    mut incumbent: Scored<N>,
    job: &Job,
    streams: &mut [StdRng],
    generations: usize,
) -> SearchResult<N>
where
    N: SequenceModel + Perturb + Debug + Send + Sync,
{
    let mut history = Vec::with_capacity(job.iterations + 1);
    history.push(incumbent.error());
    for epoch in 0..job.iterations {
        let magnitude = job.magnitude_at(epoch);
        let candidates = match fork_join(epoch, &incumbent, streams, |parent, rng| {
            family(parent, job, rng, magnitude, generations)
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

/// Walks `generations` perturbations away from `parent`, returning the best
/// network met on the way.
fn family<N>(parent: &Scored<N>, job: &Job, rng: &mut StdRng, magnitude: f64, generations: usize) -> Result<Scored<N>>
where
    N: SequenceModel + Perturb,
{
    let mut latest = job.evaluate(parent.network().perturb(rng, magnitude))?;
    let mut best: Option<Scored<N>> = None;
    for _ in 1..generations {
        let child = job.evaluate(latest.network().perturb(rng, magnitude))?;
        best = Some(match best {
            Some(best) => best.better_of(latest),
            None => latest,
        });
        latest = child;
    }
    Ok(match best {
        Some(best) => best.better_of(latest),
        None => latest,
    })
}
