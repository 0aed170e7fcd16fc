use crate::error::{Error, Result};
use crate::genetic_algo::{Crossover, Mutation};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Survival scales at or below this value select survivors by plain
/// truncation instead of sampling ranks.
pub const TRUNCATION_SCALE: f64 = 0.1;

/// Parameters of the generational engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Number of chromosomes kept between generations
    pub capacity: usize,
    pub tournament_size: usize,
    pub crossover_prob: f64,
    pub crossover: Crossover,
    /// Chance that a child gets exactly one mutation
    pub mutation_prob: f64,
    /// Mutation operators to draw from, uniformly
    pub mutations: Vec<Mutation>,
    /// Decay length of survivor rank weights, relative to the capacity
    pub survival: f64,
    pub seed: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 50,
            tournament_size: 2,
            crossover_prob: 0.5,
            crossover: Crossover::SinglePoint,
            mutation_prob: 1.0,
            mutations: Mutation::ALL.to_vec(),
            survival: 0.5,
            seed: 717,
        }
    }
}

impl PoolConfig {
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref()).map_err(serde_json::Error::io)?;
        let config: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn truncation(&self) -> bool {
        self.survival <= TRUNCATION_SCALE
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity < 2 {
            return Err(Error::Config(format!(
                "capacity must be at least 2, got {}",
                self.capacity
            )));
        }
        // The second parent is drawn from everyone but the first one.
        if self.tournament_size == 0 || self.tournament_size >= self.capacity {
            return Err(Error::Config(format!(
                "tournament size must be in 1..{}, got {}",
                self.capacity, self.tournament_size
            )));
        }
        for (name, p) in [
            ("crossover probability", self.crossover_prob),
            ("mutation probability", self.mutation_prob),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::Config(format!("{name} must be in [0, 1], got {p}")));
            }
        }
        if self.crossover_prob == 0.0 && self.mutation_prob == 0.0 {
            return Err(Error::Config(
                "children would always be clones of their parents".to_string(),
            ));
        }
        if self.mutations.is_empty() {
            return Err(Error::Config("no mutation operator enabled".to_string()));
        }
        if !self.survival.is_finite() || self.survival < 0.0 {
            return Err(Error::Config(format!(
                "survival scale must be a non-negative number, got {}",
                self.survival
            )));
        }
        Ok(())
    }
}
