//! Genetic search for a low-cost assignment of 5000 families to 100 days of
//! Santa's workshop.
//!
//! [`PreferenceTable`] holds the family data, [`CostEvaluator`] scores
//! assignments, and [`Population`] evolves a pool of [`Chromosome`]s and
//! repairs its best members with rule-based local search.

pub mod annealing;
pub mod chromosome;
pub mod config;
pub mod cost;
pub mod demo_data;
pub mod error;
pub mod genetic_algo;
pub mod improve;
pub mod io;
pub mod population;
pub mod preferences;
pub mod visualization;

pub use chromosome::{Chromosome, Genes, NUM_DAYS, NUM_FAMILIES};
pub use config::PoolConfig;
pub use cost::CostEvaluator;
pub use error::{Error, Result};
pub use genetic_algo::{Crossover, Mutation};
pub use population::Population;
pub use preferences::{Family, PreferenceTable, NUM_CHOICES};
