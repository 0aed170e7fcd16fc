use crate::chromosome::{Chromosome, Genes, NUM_DAYS};
use crate::error::{Error, Result};
use crate::preferences::{PreferenceTable, NUM_CHOICES};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Crossover {
    /// Splice the parents at one random family index
    SinglePoint,
    /// Take every gene from either parent with equal chance
    Uniform,
}

impl Crossover {
    pub fn apply<R: Rng + ?Sized>(self, parent_1: &[u8], parent_2: &[u8], rng: &mut R) -> (Genes, Genes) {
        match self {
            Crossover::SinglePoint => {
                let crossover_point = rng.gen_range(0..parent_1.len());
                single_point_crossover(parent_1, parent_2, crossover_point)
            }
            Crossover::Uniform => uniform_crossover(parent_1, parent_2, rng),
        }
    }
}

/// First child takes the genes before `crossover_point` from the first
/// parent and the rest from the second one; the second child the opposite.
pub fn single_point_crossover(parent_1: &[u8], parent_2: &[u8], crossover_point: usize) -> (Genes, Genes) {
    let mut genes_1 = Vec::with_capacity(parent_1.len());
    let mut genes_2 = Vec::with_capacity(parent_2.len());

    genes_1.extend_from_slice(&parent_1[..crossover_point]);
    genes_2.extend_from_slice(&parent_2[..crossover_point]);
    genes_1.extend_from_slice(&parent_2[crossover_point..]);
    genes_2.extend_from_slice(&parent_1[crossover_point..]);

    (genes_1, genes_2)
}

pub fn uniform_crossover<R: Rng + ?Sized>(parent_1: &[u8], parent_2: &[u8], rng: &mut R) -> (Genes, Genes) {
    parent_1
        .iter()
        .zip(parent_2)
        .map(|(&a, &b)| if rng.gen_bool(0.5) { (a, b) } else { (b, a) })
        .unzip()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Mutation {
    /// Move one family to one of its preferred days
    PreferredDay,
    /// Move one family to any day
    RandomDay,
    /// Exchange the days of two families
    Swap,
    /// Rotate the days of three families
    Rotate,
    /// Move one family to a preferred day and fill the day it left with a
    /// family that also wants it
    PreferredWithBackfill,
}

impl Mutation {
    pub const ALL: [Mutation; 5] = [
        Mutation::PreferredDay,
        Mutation::RandomDay,
        Mutation::Swap,
        Mutation::Rotate,
        Mutation::PreferredWithBackfill,
    ];

    pub fn apply<R: Rng + ?Sized>(self, mut genes: Genes, table: &PreferenceTable, rng: &mut R) -> Genes {
        let families = genes.len();
        match self {
            Mutation::PreferredDay => {
                let family = rng.gen_range(0..families);
                genes[family] = table.preferences(family)[rng.gen_range(0..NUM_CHOICES)];
            }
            Mutation::RandomDay => {
                let family = rng.gen_range(0..families);
                genes[family] = rng.gen_range(1..=NUM_DAYS as u8);
            }
            Mutation::Swap => {
                let f1 = rng.gen_range(0..families);
                let f2 = rng.gen_range(0..families);
                genes.swap(f1, f2);
            }
            Mutation::Rotate => {
                let f1 = rng.gen_range(0..families);
                let f2 = rng.gen_range(0..families);
                let f3 = rng.gen_range(0..families);
                let day = genes[f1];
                genes[f1] = genes[f2];
                genes[f2] = genes[f3];
                genes[f3] = day;
            }
            Mutation::PreferredWithBackfill => {
                let family = rng.gen_range(0..families);
                let vacated = genes[family];
                genes[family] = table.preferences(family)[rng.gen_range(0..NUM_CHOICES)];

                if let Some(&other) = table.families_preferring(vacated).choose(rng) {
                    if other != family {
                        genes[other] = vacated;
                    }
                }
            }
        }
        genes
    }
}

/// Runs one tournament over `population` and returns the index of the winner.
///
/// Contestants are distinct; `skip` excludes one member from the draw.
pub fn tournament<R: Rng + ?Sized>(
    population: &[Chromosome],
    size: usize,
    skip: Option<usize>,
    rng: &mut R,
) -> usize {
    let candidates = population.len() - usize::from(skip.is_some());
    rand::seq::index::sample(rng, candidates, size)
        .into_iter()
        .map(|i| match skip {
            Some(skipped) if i >= skipped => i + 1,
            _ => i,
        })
        .min_by(|&a, &b| {
            population[a]
                .cost()
                .total_cmp(&population[b].cost())
                .then(a.cmp(&b))
        })
        .expect("tournament has at least one contestant")
}

/// Ranks of the pooled, sorted parents and children that survive into the
/// next generation.
///
/// With truncation this is just `0..capacity`. Otherwise `capacity - 1` ranks
/// are sampled without replacement from `1..2 * capacity` with weights
/// decaying as `exp(-rank / (scale * capacity))`, and rank 0 is always kept.
pub fn survivor_ranks<R: Rng + ?Sized>(
    capacity: usize,
    scale: f64,
    truncation: bool,
    rng: &mut R,
) -> Result<Vec<usize>> {
    if truncation {
        return Ok((0..capacity).collect());
    }

    let decay = scale * capacity as f64;
    let candidates: Vec<usize> = (1..2 * capacity).collect();
    let mut ranks: Vec<usize> = candidates
        .choose_multiple_weighted(rng, capacity - 1, |&rank| (-(rank as f64) / decay).exp())
        .map_err(|e| Error::Config(format!("cannot sample survivor ranks: {e}")))?
        .copied()
        .collect();

    ranks.push(0);
    ranks.sort_unstable();
    Ok(ranks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chromosome::NUM_FAMILIES;
    use crate::cost::CostEvaluator;
    use crate::demo_data::uniform_table;
    use rand::rngs::StdRng;
    use std::sync::Arc;

    fn parents() -> (Genes, Genes) {
        (vec![1; NUM_FAMILIES], vec![2; NUM_FAMILIES])
    }

    #[test]
    fn crossover_at_zero_swaps_parents() {
        let (p1, p2) = parents();
        let (c1, c2) = single_point_crossover(&p1, &p2, 0);
        assert_eq!(c1, p2);
        assert_eq!(c2, p1);
    }

    #[test]
    fn crossover_at_end_keeps_parents() {
        let (p1, p2) = parents();
        let (c1, c2) = single_point_crossover(&p1, &p2, NUM_FAMILIES);
        assert_eq!(c1, p1);
        assert_eq!(c2, p2);
    }

    #[test]
    fn crossover_splices_at_the_point() {
        let (p1, p2) = parents();
        let (c1, c2) = single_point_crossover(&p1, &p2, 10);
        assert!(c1[..10].iter().all(|&d| d == 1) && c1[10..].iter().all(|&d| d == 2));
        assert!(c2[..10].iter().all(|&d| d == 2) && c2[10..].iter().all(|&d| d == 1));
    }

    #[test]
    fn uniform_children_are_complementary() {
        let (p1, p2) = parents();
        let mut rng = StdRng::seed_from_u64(1);
        let (c1, c2) = uniform_crossover(&p1, &p2, &mut rng);
        assert!(c1.iter().zip(&c2).all(|(&a, &b)| a + b == 3));
        assert!(c1.contains(&1) && c1.contains(&2));
    }

    #[test]
    fn mutations_touch_at_most_three_families() {
        let table = uniform_table();
        let genes: Genes = (0..NUM_FAMILIES).map(|id| (id % NUM_DAYS) as u8 + 1).collect();
        let mut rng = StdRng::seed_from_u64(2);
        for mutation in Mutation::ALL {
            for _ in 0..50 {
                let mutant = mutation.apply(genes.clone(), &table, &mut rng);
                let changed = mutant.iter().zip(&genes).filter(|(a, b)| a != b).count();
                assert!(changed <= 3, "{mutation:?} changed {changed} genes");
                assert!(mutant.iter().all(|&d| (1..=NUM_DAYS as u8).contains(&d)));
            }
        }
    }

    #[test]
    fn preferred_day_stays_on_the_wish_list() {
        let table = uniform_table();
        let genes: Genes = vec![100; NUM_FAMILIES];
        let mut rng = StdRng::seed_from_u64(3);
        let mutant = Mutation::PreferredDay.apply(genes.clone(), &table, &mut rng);
        let (family, &day) = mutant
            .iter()
            .enumerate()
            .find(|(id, &d)| d != genes[*id])
            .unwrap_or((0, &mutant[0]));
        assert!(day == 100 || table.family(family).rank_of(day).is_some());
    }

    #[test]
    fn backfill_moves_a_family_onto_the_vacated_day() {
        let table = uniform_table();
        let genes: Genes = (0..NUM_FAMILIES).map(|id| (id % NUM_DAYS) as u8 + 1).collect();
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..50 {
            let mutant = Mutation::PreferredWithBackfill.apply(genes.clone(), &table, &mut rng);
            let changed: Vec<usize> = (0..NUM_FAMILIES).filter(|&id| mutant[id] != genes[id]).collect();
            if changed.len() == 2 {
                let [a, b] = [changed[0], changed[1]];
                // One of the two took the other's old day.
                assert!(mutant[a] == genes[b] || mutant[b] == genes[a]);
            }
        }
    }

    #[test]
    fn tournament_never_picks_the_skipped_member() {
        let evaluator = CostEvaluator::new(Arc::new(uniform_table()));
        let genes: Genes = (0..NUM_FAMILIES).map(|id| (id % NUM_DAYS) as u8 + 1).collect();
        let population: Vec<Chromosome> = (0..3)
            .map(|_| Chromosome::evaluated(genes.clone(), &evaluator))
            .collect();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..100 {
            assert_ne!(tournament(&population, 2, Some(1), &mut rng), 1);
        }
    }

    #[test]
    fn full_tournament_picks_the_best() {
        let evaluator = CostEvaluator::new(Arc::new(uniform_table()));
        let best: Genes = (0..NUM_FAMILIES).map(|id| (id % NUM_DAYS) as u8 + 1).collect();
        let mut worse = best.clone();
        worse[0] = 2;
        let population = vec![
            Chromosome::evaluated(worse.clone(), &evaluator),
            Chromosome::evaluated(best, &evaluator),
            Chromosome::evaluated(worse, &evaluator),
        ];
        let mut rng = StdRng::seed_from_u64(6);
        assert_eq!(tournament(&population, 3, None, &mut rng), 1);
    }

    #[test]
    fn truncation_ranks_are_the_identity() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(survivor_ranks(5, 0.0, true, &mut rng).unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn sampled_ranks_are_sorted_unique_and_keep_the_best() {
        let mut rng = StdRng::seed_from_u64(8);
        let ranks = survivor_ranks(20, 0.5, false, &mut rng).unwrap();
        assert_eq!(ranks.len(), 20);
        assert_eq!(ranks[0], 0);
        assert!(ranks.windows(2).all(|w| w[0] < w[1]));
        assert!(ranks.iter().all(|&r| r < 40));
    }
}
