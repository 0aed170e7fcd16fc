use crate::chromosome::{Chromosome, Genes, NUM_DAYS, NUM_FAMILIES};
use crate::config::PoolConfig;
use crate::cost::CostEvaluator;
use crate::error::{Error, Result};
use crate::genetic_algo::{survivor_ranks, tournament};
use crate::io;
use crate::preferences::PreferenceTable;
use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;
use std::collections::HashSet;
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::instrument;

/// A fixed-size pool of chromosomes evolved one generation at a time.
///
/// Between calls the members are sorted by cost, so the first one is the best
/// solution found so far. All randomness comes from one generator seeded from
/// the config, which makes runs reproducible.
#[derive(Debug)]
pub struct Population {
    pub(crate) config: PoolConfig,
    pub(crate) evaluator: CostEvaluator,
    rng: StdRng,
    survivor_ranks: Vec<usize>,
    pub(crate) members: Vec<Chromosome>,
    generation: usize,
}

impl Population {
    /// Creates an empty population. Fill it with [`populate`](Self::populate),
    /// [`load`](Self::load) or [`set_members`](Self::set_members).
    pub fn new(config: PoolConfig, table: Arc<PreferenceTable>) -> Result<Self> {
        config.validate()?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let survivor_ranks = survivor_ranks(
            config.capacity,
            config.survival,
            config.truncation(),
            &mut rng,
        )?;
        tracing::debug!(ranks = ?survivor_ranks, "Drew survivor ranks");

        Ok(Self {
            evaluator: CostEvaluator::new(table),
            members: Vec::with_capacity(config.capacity),
            config,
            rng,
            survivor_ranks,
            generation: 0,
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &CostEvaluator {
        &self.evaluator
    }

    pub fn members(&self) -> &[Chromosome] {
        &self.members
    }

    pub fn best(&self) -> Option<&Chromosome> {
        self.members.first()
    }

    pub fn survivor_ranks(&self) -> &[usize] {
        &self.survivor_ranks
    }

    /// Number of generations evolved so far.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Cost at the given quantile of the population, 0 being the best.
    pub fn cost_at(&self, quantile: f64) -> Option<f64> {
        let last = self.members.len().checked_sub(1)?;
        let index = ((quantile * self.members.len() as f64).round() as usize).min(last);
        Some(self.members[index].cost())
    }

    /// Replaces the members with `population`, scoring and sorting it.
    pub fn set_members(&mut self, population: Vec<Genes>) -> Result<()> {
        if population.len() != self.config.capacity {
            return Err(Error::PopulationSize {
                expected: self.config.capacity,
                found: population.len(),
            });
        }
        if let Some(genes) = population.iter().find(|genes| genes.len() != NUM_FAMILIES) {
            return Err(Error::AssignmentCount {
                expected: NUM_FAMILIES,
                found: genes.len(),
            });
        }

        let evaluator = &self.evaluator;
        self.members = population
            .into_par_iter()
            .map(|genes| Chromosome::evaluated(genes, evaluator))
            .collect();
        self.sort();
        Ok(())
    }

    /// Fills the population with random feasible assignments, each greedily
    /// refined by moving families to their best preferred day.
    #[instrument(level = "info", skip(self), fields(capacity = self.config.capacity))]
    pub fn populate(&mut self) {
        let seeds: Vec<u64> = (0..self.config.capacity).map(|_| self.rng.gen()).collect();
        let evaluator = &self.evaluator;
        self.members = seeds
            .into_par_iter()
            .map(|seed| random_chromosome(evaluator, &mut StdRng::seed_from_u64(seed)))
            .collect();
        self.sort();

        if let (Some(best), Some(worst)) = (self.members.first(), self.members.last()) {
            tracing::info!(best = best.cost(), worst = worst.cost(), "Generated initial population");
        }
    }

    /// Loads the population from headerless CSV, one assignment per line.
    #[instrument(level = "info", skip_all)]
    pub fn load<R: Read>(&mut self, reader: R) -> Result<()> {
        let population = io::read_population(reader)?;
        self.set_members(population)
    }

    pub fn save<W: Write>(&self, writer: W) -> Result<()> {
        io::write_population(self.members.iter().map(Chromosome::genes), writer)
    }

    /// Performs one generation: breeds children until `capacity` new, feasible
    /// and distinct ones are collected, then picks survivors by rank from the
    /// parents and children together.
    ///
    /// # Panics
    ///
    /// Panics if the population has not been filled yet.
    #[instrument(level = "debug", skip(self), fields(generation = self.generation))]
    pub fn evolve(&mut self) {
        assert!(
            !self.members.is_empty(),
            "populate or load the population before evolving"
        );
        let capacity = self.config.capacity;
        let mut known: HashSet<u32> = self.members.iter().map(Chromosome::hash).collect();
        let mut children: Vec<Chromosome> = Vec::with_capacity(2 * capacity + 1);
        let mut rejected = 0usize;

        while children.len() < capacity {
            let missing = capacity - children.len();
            let mut batch = Vec::with_capacity(missing + 1);
            while batch.len() < missing {
                let (child_1, child_2) = self.breed();
                batch.push(child_1);
                batch.push(child_2);
            }

            // Scoring is the expensive part; the order of `batch` is kept so
            // that deduplication stays deterministic.
            let evaluator = &self.evaluator;
            let scored: Vec<Chromosome> = batch
                .into_par_iter()
                .map(|genes| Chromosome::evaluated(genes, evaluator))
                .collect();

            for child in scored {
                if child.is_feasible() && known.insert(child.hash()) {
                    children.push(child);
                } else {
                    rejected += 1;
                }
            }
        }

        children.append(&mut self.members);
        children.sort_by(|a, b| a.cost().total_cmp(&b.cost()));

        let mut ranks = self.survivor_ranks.iter().copied().peekable();
        self.members = children
            .into_iter()
            .enumerate()
            .filter_map(|(rank, chromosome)| {
                ranks.next_if_eq(&rank).map(|_| chromosome)
            })
            .collect();

        self.generation += 1;
        tracing::debug!(
            rejected,
            best = self.members[0].cost(),
            "Generation complete"
        );
    }

    /// Evolves until `terminate` returns true. It is called before every
    /// generation with the current population.
    pub fn evolve_until(&mut self, mut terminate: impl FnMut(&Population) -> bool) {
        while !terminate(self) {
            self.evolve();
        }
    }

    fn sort(&mut self) {
        self.members.sort_by(|a, b| a.cost().total_cmp(&b.cost()));
    }

    fn breed(&mut self) -> (Genes, Genes) {
        let size = self.config.tournament_size;
        let first = tournament(&self.members, size, None, &mut self.rng);
        let second = tournament(&self.members, size, Some(first), &mut self.rng);

        let parent_1 = self.members[first].genes();
        let parent_2 = self.members[second].genes();
        let (child_1, child_2) = if self.rng.gen_bool(self.config.crossover_prob) {
            self.config.crossover.apply(parent_1, parent_2, &mut self.rng)
        } else {
            (parent_1.to_vec(), parent_2.to_vec())
        };

        (self.mutate(child_1), self.mutate(child_2))
    }

    fn mutate(&mut self, genes: Genes) -> Genes {
        if !self.rng.gen_bool(self.config.mutation_prob) {
            return genes;
        }

        let mutation = *self
            .config
            .mutations
            .choose(&mut self.rng)
            .expect("config has at least one mutation");
        mutation.apply(genes, self.evaluator.table(), &mut self.rng)
    }
}

fn random_chromosome(evaluator: &CostEvaluator, rng: &mut StdRng) -> Chromosome {
    let mut genes: Genes = vec![0; NUM_FAMILIES];
    let mut cost = f64::INFINITY;
    while !cost.is_finite() {
        for day in genes.iter_mut() {
            *day = rng.gen_range(1..=NUM_DAYS as u8);
        }
        cost = evaluator.evaluate(&genes);
    }

    let mut order: Vec<usize> = (0..NUM_FAMILIES).collect();
    order.shuffle(rng);

    for family in order {
        let candidates = evaluator.scan_preferred(&genes, family);
        let preferences = evaluator.table().preferences(family);
        for (rank, &candidate) in candidates.iter().enumerate() {
            if candidate < cost {
                cost = candidate;
                genes[family] = preferences[rank];
            }
        }
    }

    Chromosome::evaluated(genes, evaluator)
}
