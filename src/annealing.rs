use crate::chromosome::Genes;
use crate::cost::CostEvaluator;
use crate::genetic_algo::Mutation;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnealConfig {
    pub iterations: u64,
    pub initial_temperature: f64,
    /// Iterations over which the temperature drops by a factor of e
    pub cooling: f64,
    pub report_every: u64,
    pub seed: u64,
}

impl Default for AnnealConfig {
    fn default() -> Self {
        Self {
            iterations: 10_000_000,
            initial_temperature: 1000.0,
            cooling: 2e6,
            report_every: 100_000,
            seed: 8855,
        }
    }
}

impl AnnealConfig {
    pub fn temperature(&self, iteration: u64) -> f64 {
        self.initial_temperature * (-(iteration as f64) / self.cooling).exp()
    }
}

#[derive(Clone, Debug)]
pub struct AnnealReport {
    pub iteration: u64,
    pub temperature: f64,
    pub cost: f64,
    /// Share of the last reporting window's proposals accepted downhill
    pub downhill: f64,
    /// Share accepted uphill
    pub uphill: f64,
}

// Proposals are drawn with equal chance from these
const PROPOSALS: [Mutation; 3] = [Mutation::RandomDay, Mutation::Swap, Mutation::Rotate];

/// Simulated annealing on a single assignment with Metropolis acceptance.
///
/// Returns the final assignment and its cost. `report` is called every
/// `report_every` iterations.
pub fn anneal(
    evaluator: &CostEvaluator,
    mut genes: Genes,
    config: &AnnealConfig,
    mut report: impl FnMut(&AnnealReport),
) -> (Genes, f64) {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut cost = evaluator.evaluate(&genes);
    let (mut downhill, mut uphill) = (0u64, 0u64);

    for iteration in 0..config.iterations {
        let temperature = config.temperature(iteration);
        let proposal = PROPOSALS
            .choose(&mut rng)
            .expect("proposals are not empty")
            .apply(genes.clone(), evaluator.table(), &mut rng);

        let proposal_cost = evaluator.evaluate(&proposal);
        if proposal_cost < cost {
            genes = proposal;
            cost = proposal_cost;
            downhill += 1;
        } else if rng.gen::<f64>() < ((cost - proposal_cost) / temperature).exp() {
            genes = proposal;
            cost = proposal_cost;
            uphill += 1;
        }

        if config.report_every > 0 && iteration % config.report_every == 0 {
            let window = config.report_every as f64;
            report(&AnnealReport {
                iteration,
                temperature,
                cost,
                downhill: downhill as f64 / window,
                uphill: uphill as f64 / window,
            });
            downhill = 0;
            uphill = 0;
        }
    }

    (genes, cost)
}
