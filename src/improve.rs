//! Rule-based repair of a single solution.
//!
//! Instead of random mutations, the repair looks at the families that pay
//! the most for their placement and tries to move them up their wish lists,
//! making room by moving other families that would also be happier. Every
//! candidate is scored with the full evaluator and only strict improvements
//! are kept.

use crate::chromosome::{Chromosome, Genes, NUM_FAMILIES};
use crate::cost::{CostEvaluator, MAX_OCCUPANCY};
use crate::population::Population;
use crate::preferences::NUM_CHOICES;
use itertools::{iproduct, Itertools};
use rayon::prelude::*;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use tracing::instrument;

// Families to reassign and their new days
type Move = Vec<(usize, u8)>;

impl Population {
    /// Repairs member `index` by relocating its `k` costliest families, alone
    /// or together with one other family.
    ///
    /// Returns the index and cost of the repaired solution. A cheaper solution
    /// moves up in the population, so follow-up repairs must use the returned
    /// index.
    #[instrument(level = "info", skip(self))]
    pub fn improve(&mut self, k: usize, index: usize) -> (usize, f64) {
        self.repair(k, index, |evaluator, genes, cost, family| {
            relocate_alone(evaluator, genes, cost, family)
                || relocate_with_partner(evaluator, genes, cost, family)
        })
    }

    /// Like [`improve`](Self::improve), but the day a costly family leaves is
    /// taken over by a pair of other families.
    #[instrument(level = "info", skip(self))]
    pub fn improve_two_for_one(&mut self, k: usize, index: usize) -> (usize, f64) {
        self.repair(k, index, relocate_with_two_partners)
    }

    fn repair<F>(&mut self, k: usize, index: usize, mut step: F) -> (usize, f64)
    where
        F: FnMut(&CostEvaluator, &mut Genes, &mut f64, usize) -> bool,
    {
        let member = &self.members[index];
        let before = member.cost();
        let mut genes = member.genes().to_vec();
        let mut cost = before;

        let mut moved = 0;
        for family in costliest_families(&self.evaluator, &genes, k) {
            if step(&self.evaluator, &mut genes, &mut cost, family) {
                moved += 1;
            }
        }

        if moved == 0 {
            tracing::debug!(cost = before, "No improving move found");
            return (index, before);
        }

        let repaired = Chromosome::evaluated(genes, &self.evaluator);
        let after = repaired.cost();
        self.members.remove(index);
        let position = self
            .members
            .partition_point(|member| member.cost().total_cmp(&after).is_le());
        self.members.insert(position, repaired);

        tracing::info!(moved, before, after, from = index, to = position, "Repaired solution");
        (position, after)
    }
}

/// The `k` families with the highest preference cost, costliest first.
///
/// Families that already sit on their first choice are never returned.
pub fn costliest_families(evaluator: &CostEvaluator, genes: &[u8], k: usize) -> Vec<usize> {
    if k == 0 {
        return Vec::new();
    }

    let mut heap: BinaryHeap<Reverse<(i64, usize)>> = BinaryHeap::with_capacity(k + 1);
    for family in 0..NUM_FAMILIES {
        let cost = evaluator.family_cost(family, genes[family]);
        if cost == 0 {
            continue;
        }
        if heap.len() < k {
            heap.push(Reverse((cost, family)));
        } else if heap.peek().is_some_and(|Reverse((cheapest, _))| cost > *cheapest) {
            heap.pop();
            heap.push(Reverse((cost, family)));
        }
    }

    heap.into_iter()
        .map(|Reverse(entry)| entry)
        .sorted_unstable_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)))
        .map(|(_, family)| family)
        .collect()
}

fn current_rank(evaluator: &CostEvaluator, genes: &[u8], family: usize) -> usize {
    evaluator
        .table()
        .family(family)
        .rank_of(genes[family])
        .unwrap_or(NUM_CHOICES)
}

// Families other than `excluded` that rank `day` better than their current day.
// Partners that would lose rank by moving are never tried.
fn partners_for(evaluator: &CostEvaluator, genes: &[u8], day: u8, excluded: usize) -> Vec<usize> {
    let table = evaluator.table();
    (0..NUM_CHOICES)
        .flat_map(|rank| table.families_for(day, rank).iter().map(move |&other| (rank, other)))
        .filter(|&(rank, other)| other != excluded && current_rank(evaluator, genes, other) > rank)
        .map(|(_, other)| other)
        .collect()
}

// Scores every move and applies the cheapest one if it beats `cost`. Ties go
// to the move listed first.
fn apply_best(evaluator: &CostEvaluator, genes: &mut Genes, cost: &mut f64, moves: Vec<Move>) -> bool {
    let base: &[u8] = genes;
    let best = moves
        .par_iter()
        .enumerate()
        .map(|(i, changes)| {
            let mut trial = base.to_vec();
            for &(family, day) in changes {
                trial[family] = day;
            }
            (evaluator.evaluate(&trial), i)
        })
        .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    match best {
        Some((best_cost, i)) if best_cost < *cost => {
            for &(family, day) in &moves[i] {
                genes[family] = day;
            }
            *cost = best_cost;
            true
        }
        _ => false,
    }
}

fn relocate_alone(evaluator: &CostEvaluator, genes: &mut Genes, cost: &mut f64, family: usize) -> bool {
    let rank = current_rank(evaluator, genes, family);
    let moves = evaluator.table().preferences(family)[..rank]
        .iter()
        .map(|&day| vec![(family, day)])
        .collect();

    apply_best(evaluator, genes, cost, moves)
}

fn relocate_with_partner(evaluator: &CostEvaluator, genes: &mut Genes, cost: &mut f64, family: usize) -> bool {
    let rank = current_rank(evaluator, genes, family);
    if rank == 0 {
        return false;
    }

    let vacated = genes[family];
    let partners = partners_for(evaluator, genes, vacated, family);
    let moves = iproduct!(&evaluator.table().preferences(family)[..rank], &partners)
        .map(|(&day, &other)| vec![(family, day), (other, vacated)])
        .collect();

    apply_best(evaluator, genes, cost, moves)
}

fn relocate_with_two_partners(evaluator: &CostEvaluator, genes: &mut Genes, cost: &mut f64, family: usize) -> bool {
    let rank = current_rank(evaluator, genes, family);
    if rank == 0 {
        return false;
    }

    let table = evaluator.table();
    let vacated = genes[family];
    let left_behind = evaluator.occupancy(genes)[vacated as usize - 1] - table.family(family).size;
    let room = MAX_OCCUPANCY.saturating_sub(left_behind);

    let partners = partners_for(evaluator, genes, vacated, family);
    let pairs: Vec<(usize, usize)> = partners
        .into_iter()
        .tuple_combinations()
        .filter(|&(a, b)| table.family(a).size + table.family(b).size <= room)
        .collect();

    let moves = iproduct!(&table.preferences(family)[..rank], &pairs)
        .map(|(&day, &(a, b))| vec![(family, day), (a, vacated), (b, vacated)])
        .collect();

    apply_best(evaluator, genes, cost, moves)
}
