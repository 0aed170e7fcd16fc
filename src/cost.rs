//! Scoring of assignments.
//!
//! The cost of an assignment is the sum of an accounting part, which depends
//! only on how many people visit on each day, and a preference part, which
//! depends on how far down its wish list each family was placed. Any day with
//! fewer than [`MIN_OCCUPANCY`] or more than [`MAX_OCCUPANCY`] visitors makes
//! the whole assignment infeasible, which is reported as `f64::INFINITY`.
//!
//! All constants below are the competition's scoring rule and must not be
//! tuned.

use crate::chromosome::{NUM_DAYS, NUM_FAMILIES};
use crate::preferences::{Family, PreferenceTable, NUM_CHOICES};
use std::sync::Arc;

pub const MIN_OCCUPANCY: u32 = 125;
pub const MAX_OCCUPANCY: u32 = 300;

/// People visiting on each day, index 0 is day 1.
pub type Occupancy = [u32; NUM_DAYS];

/// Preference penalty for a family of `size` members placed on its choice
/// `rank`, where `None` means a day outside the preference list.
pub fn choice_penalty(rank: Option<usize>, size: u32) -> i64 {
    let size = size as i64;
    match rank {
        Some(0) => 0,
        Some(1) => 50,
        Some(2) => 50 + 9 * size,
        Some(3) => 100 + 9 * size,
        Some(4) => 200 + 9 * size,
        Some(5) => 200 + 18 * size,
        Some(6) => 300 + 18 * size,
        Some(7) => 300 + 36 * size,
        Some(8) => 400 + 36 * size,
        Some(9) => 500 + (36 + 199) * size,
        _ => 500 + (36 + 398) * size,
    }
}

pub fn is_feasible_day(n: u32) -> bool {
    (MIN_OCCUPANCY..=MAX_OCCUPANCY).contains(&n)
}

/// Accounting cost of a feasible occupancy.
///
/// Days are visited from the last to the first and each one is compared with
/// the day visited just before it; the last day is compared with itself.
pub fn accounting_cost(occupancy: &Occupancy) -> f64 {
    let mut cost = 0.0;
    let mut n_prev = occupancy[NUM_DAYS - 1];
    for &n in occupancy.iter().rev() {
        let diff = (n as i64 - n_prev as i64).abs();
        cost += (n as f64 - MIN_OCCUPANCY as f64) / 400.0
            * (n as f64).powf(0.5 + diff as f64 / 50.0);
        n_prev = n;
    }
    cost
}

/// The cost split into its parts, for reporting.
#[derive(Clone, Debug)]
pub struct CostBreakdown {
    pub occupancy: Occupancy,
    pub feasible: bool,
    pub accounting: f64,
    pub preference: i64,
    /// Number of families placed on each choice rank, the last slot counts
    /// families outside their preference list.
    pub choices: [usize; NUM_CHOICES + 1],
}

impl CostBreakdown {
    pub fn total(&self) -> f64 {
        if self.feasible {
            self.accounting + self.preference as f64
        } else {
            f64::INFINITY
        }
    }
}

#[derive(Clone, Debug)]
pub struct CostEvaluator {
    table: Arc<PreferenceTable>,
}

impl CostEvaluator {
    pub fn new(table: Arc<PreferenceTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &PreferenceTable {
        &self.table
    }

    pub fn family_cost(&self, family: usize, day: u8) -> i64 {
        penalty(self.table.family(family), day)
    }

    pub fn occupancy(&self, genes: &[u8]) -> Occupancy {
        debug_assert_eq!(genes.len(), NUM_FAMILIES);
        let mut occupancy = [0u32; NUM_DAYS];
        for family in self.table.families() {
            occupancy[genes[family.id] as usize - 1] += family.size;
        }
        occupancy
    }

    pub fn preference_cost(&self, genes: &[u8]) -> i64 {
        self.table
            .families()
            .iter()
            .map(|family| penalty(family, genes[family.id]))
            .sum()
    }

    /// Full cost of an assignment, `f64::INFINITY` when infeasible.
    pub fn evaluate(&self, genes: &[u8]) -> f64 {
        let occupancy = self.occupancy(genes);
        if !occupancy.iter().all(|&n| is_feasible_day(n)) {
            return f64::INFINITY;
        }

        accounting_cost(&occupancy) + self.preference_cost(genes) as f64
    }

    pub fn breakdown(&self, genes: &[u8]) -> CostBreakdown {
        let occupancy = self.occupancy(genes);
        let feasible = occupancy.iter().all(|&n| is_feasible_day(n));

        let mut choices = [0usize; NUM_CHOICES + 1];
        for family in self.table.families() {
            let rank = family.rank_of(genes[family.id]).unwrap_or(NUM_CHOICES);
            choices[rank] += 1;
        }

        CostBreakdown {
            occupancy,
            feasible,
            accounting: accounting_cost(&occupancy),
            preference: self.preference_cost(genes),
            choices,
        }
    }

    /// Cost of moving `family` to each of the days `1..=100` while every other
    /// family stays put. Entry `d - 1` holds the cost for day `d`.
    pub fn scan_days(&self, genes: &[u8], family: usize) -> [f64; NUM_DAYS] {
        let baseline = Baseline::new(self, genes, family);
        std::array::from_fn(|i| baseline.cost_at(i as u8 + 1))
    }

    /// Like [`scan_days`](Self::scan_days) but only for the family's preferred
    /// days, in preference order.
    pub fn scan_preferred(&self, genes: &[u8], family: usize) -> [f64; NUM_CHOICES] {
        let baseline = Baseline::new(self, genes, family);
        let preferences = self.table.preferences(family);
        std::array::from_fn(|rank| baseline.cost_at(preferences[rank]))
    }
}

fn penalty(family: &Family, day: u8) -> i64 {
    choice_penalty(family.rank_of(day), family.size)
}

// Everything about an assignment except one family, computed once so that the
// family can be tried on many days cheaply.
struct Baseline<'a> {
    family: &'a Family,
    occupancy: Occupancy,
    preference: i64,
    // Whether no single relocation can make the assignment feasible
    blocked: bool,
    // The only day below the minimum, if any; the family must land there
    underpopulated: Option<usize>,
}

impl<'a> Baseline<'a> {
    fn new(evaluator: &'a CostEvaluator, genes: &[u8], family: usize) -> Self {
        let family = evaluator.table.family(family);
        let current = genes[family.id];

        let mut occupancy = evaluator.occupancy(genes);
        occupancy[current as usize - 1] -= family.size;
        let preference = evaluator.preference_cost(genes) - penalty(family, current);

        let overpopulated = occupancy.iter().any(|&n| n > MAX_OCCUPANCY);
        let mut under = occupancy
            .iter()
            .enumerate()
            .filter(|(_, &n)| n < MIN_OCCUPANCY)
            .map(|(day, _)| day);
        let underpopulated = under.next();
        let blocked = overpopulated || under.next().is_some();

        Self {
            family,
            occupancy,
            preference,
            blocked,
            underpopulated,
        }
    }

    fn cost_at(&self, day: u8) -> f64 {
        if self.blocked {
            return f64::INFINITY;
        }

        let index = day as usize - 1;
        if self.underpopulated.is_some_and(|under| under != index) {
            return f64::INFINITY;
        }

        let mut occupancy = self.occupancy;
        occupancy[index] += self.family.size;
        if !is_feasible_day(occupancy[index]) {
            return f64::INFINITY;
        }

        accounting_cost(&occupancy) + (self.preference + penalty(self.family, day)) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo_data::{synthetic_table, uniform_table};

    fn uniform_genes() -> Vec<u8> {
        (0..NUM_FAMILIES).map(|id| (id % NUM_DAYS) as u8 + 1).collect()
    }

    #[test]
    fn penalty_table_matches_scoring_rule() {
        let expected = [0, 50, 86, 136, 236, 272, 372, 444, 544, 1440, 2236];
        for (rank, &cost) in expected.iter().enumerate() {
            let rank = (rank < NUM_CHOICES).then_some(rank);
            assert_eq!(choice_penalty(rank, 4), cost, "rank {rank:?}");
        }
    }

    #[test]
    fn flat_occupancy_costs_only_the_base_term() {
        let occupancy = [200u32; NUM_DAYS];
        let expected = NUM_DAYS as f64 * (75.0 / 400.0) * 200f64.sqrt();
        assert!((accounting_cost(&occupancy) - expected).abs() < 1e-9);
    }

    #[test]
    fn last_day_is_compared_with_itself() {
        let mut occupancy = [200u32; NUM_DAYS];
        occupancy[NUM_DAYS - 1] = 250;
        // Day 100 sees no jump, day 99 sees a jump of 50.
        let expected = (98.0 * 75.0 / 400.0) * 200f64.sqrt()
            + (125.0 / 400.0) * 250f64.sqrt()
            + (75.0 / 400.0) * 200f64.powf(1.5);
        assert!((accounting_cost(&occupancy) - expected).abs() < 1e-9);
    }

    #[test]
    fn uniform_assignment_on_first_choices() {
        let evaluator = CostEvaluator::new(Arc::new(uniform_table()));
        let genes = uniform_genes();

        assert_eq!(evaluator.preference_cost(&genes), 0);
        let expected = accounting_cost(&[200; NUM_DAYS]);
        assert_eq!(evaluator.evaluate(&genes), expected);
        assert!(evaluator.evaluate(&genes).is_finite());
    }

    #[test]
    fn any_underpopulated_day_is_infeasible() {
        let evaluator = CostEvaluator::new(Arc::new(uniform_table()));
        let mut genes = uniform_genes();
        // 19 families of four leave day 1, which keeps 124 visitors.
        let on_day_one: Vec<usize> = (0..NUM_FAMILIES).filter(|id| id % NUM_DAYS == 0).collect();
        for &id in on_day_one.iter().take(19) {
            genes[id] = 2;
        }
        assert_eq!(evaluator.occupancy(&genes)[0], 124);
        assert_eq!(evaluator.evaluate(&genes), f64::INFINITY);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let table = synthetic_table(7);
        let evaluator = CostEvaluator::new(Arc::new(table));
        let genes: Vec<u8> = evaluator
            .table()
            .families()
            .iter()
            .map(|family| family.preferences[0])
            .collect();
        assert_eq!(evaluator.evaluate(&genes), evaluator.evaluate(&genes));
    }

    #[test]
    fn breakdown_counts_choices() {
        let evaluator = CostEvaluator::new(Arc::new(uniform_table()));
        let mut genes = uniform_genes();
        genes[0] = 3;
        let breakdown = evaluator.breakdown(&genes);
        assert_eq!(breakdown.choices[0], NUM_FAMILIES - 1);
        assert_eq!(breakdown.choices[2], 1);
        assert_eq!(breakdown.preference, choice_penalty(Some(2), 4));
        assert_eq!(breakdown.total(), evaluator.evaluate(&genes));
    }

    #[test]
    fn scan_matches_full_evaluation() {
        let evaluator = CostEvaluator::new(Arc::new(uniform_table()));
        let genes = uniform_genes();
        for family in [0, 1234, 4999] {
            let scan = evaluator.scan_days(&genes, family);
            for day in 1..=NUM_DAYS as u8 {
                let mut moved = genes.clone();
                moved[family] = day;
                assert_eq!(scan[day as usize - 1], evaluator.evaluate(&moved), "day {day}");
            }
        }
    }

    #[test]
    fn scan_is_all_infinite_with_two_short_days() {
        let evaluator = CostEvaluator::new(Arc::new(uniform_table()));
        let mut genes = uniform_genes();
        // Empty days 1 and 2 into day 50.
        for id in 0..NUM_FAMILIES {
            if genes[id] <= 2 {
                genes[id] = 50;
            }
        }
        let scan = evaluator.scan_days(&genes, 10);
        assert!(scan.iter().all(|cost| cost.is_infinite()));
    }

    #[test]
    fn scan_fills_the_single_short_day() {
        let evaluator = CostEvaluator::new(Arc::new(uniform_table()));
        let mut genes = uniform_genes();
        // Day 1 ends up at 124 after moving family 0 and 18 others to day 2.
        let on_day_one: Vec<usize> = (0..NUM_FAMILIES).filter(|id| id % NUM_DAYS == 0).collect();
        for &id in on_day_one.iter().take(19) {
            genes[id] = 2;
        }
        let scan = evaluator.scan_days(&genes, 0);
        let mut fixed = genes.clone();
        fixed[0] = 1;
        assert_eq!(scan[0], evaluator.evaluate(&fixed));
        assert!(scan[0].is_finite());
        assert!(scan[1..].iter().all(|cost| cost.is_infinite()));
    }

    // Families 1..=26 join day 1, which then holds 304 visitors.
    fn crowded_first_day() -> Vec<u8> {
        let mut genes = uniform_genes();
        for id in 1..=26 {
            genes[id] = 1;
        }
        genes
    }

    #[test]
    fn any_overpopulated_day_is_infeasible() {
        let evaluator = CostEvaluator::new(Arc::new(uniform_table()));
        let genes = crowded_first_day();
        assert_eq!(evaluator.occupancy(&genes)[0], MAX_OCCUPANCY + 4);
        assert_eq!(evaluator.evaluate(&genes), f64::INFINITY);
        assert!(!evaluator.breakdown(&genes).feasible);
    }

    #[test]
    fn scan_is_all_infinite_when_another_day_stays_crowded() {
        let evaluator = CostEvaluator::new(Arc::new(uniform_table()));
        let genes = crowded_first_day();
        // Family 3005 is on day 6, so day 1 stays at 304 wherever it goes.
        assert_eq!(genes[3005], 6);
        assert!(evaluator.scan_days(&genes, 3005).iter().all(|cost| cost.is_infinite()));
    }

    #[test]
    fn scan_lets_the_crowding_family_leave() {
        let evaluator = CostEvaluator::new(Arc::new(uniform_table()));
        let genes = crowded_first_day();
        // Without family 3000 day 1 is back at 300.
        assert_eq!(genes[3000], 1);
        let scan = evaluator.scan_days(&genes, 3000);

        assert!(scan[0].is_infinite());
        for day in 2..=NUM_DAYS as u8 {
            let mut moved = genes.clone();
            moved[3000] = day;
            let cost = scan[day as usize - 1];
            assert!(cost.is_finite(), "day {day}");
            assert_eq!(cost, evaluator.evaluate(&moved), "day {day}");
        }
    }

    #[test]
    fn scan_preferred_follows_preference_order() {
        let evaluator = CostEvaluator::new(Arc::new(uniform_table()));
        let genes = uniform_genes();
        let preferred = evaluator.scan_preferred(&genes, 7);
        let all = evaluator.scan_days(&genes, 7);
        for (rank, &day) in evaluator.table().preferences(7).iter().enumerate() {
            assert_eq!(preferred[rank], all[day as usize - 1]);
        }
    }
}
