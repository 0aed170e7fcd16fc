use crate::cost::CostEvaluator;
use std::fmt;

/// Number of days a family can be assigned to. Days are numbered from 1.
pub const NUM_DAYS: usize = 100;

/// Number of families in every assignment.
pub const NUM_FAMILIES: usize = 5000;

/// Day assigned to each family, indexed by family id.
pub type Genes = Vec<u8>;

// A single solution to the problem: one day per family plus its cost.
//
// The cost is computed when the chromosome is created and the genes can't be
// changed afterwards, so the two never disagree.
#[derive(Clone, Debug, PartialEq)]
pub struct Chromosome {
    genes: Genes,
    cost: f64,
}

impl Chromosome {
    /// Scores `genes` and wraps them into a chromosome.
    pub fn evaluated(genes: Genes, evaluator: &CostEvaluator) -> Self {
        let cost = evaluator.evaluate(&genes);
        Self { genes, cost }
    }

    pub fn genes(&self) -> &[u8] {
        &self.genes
    }

    pub fn into_genes(self) -> Genes {
        self.genes
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn is_feasible(&self) -> bool {
        self.cost.is_finite()
    }

    pub fn day_of(&self, family: usize) -> u8 {
        self.genes[family]
    }

    pub fn hash(&self) -> u32 {
        genes_hash(&self.genes)
    }
}

/// 32-bit content hash of an assignment, used to spot duplicates.
///
/// Boost's `hash_combine` folded over the days, seeded with the family count.
pub fn genes_hash(genes: &[u8]) -> u32 {
    let mut seed = NUM_FAMILIES as u32;
    for &day in genes {
        seed ^= (day as u32)
            .wrapping_add(0x9e37_79b9)
            .wrapping_add(seed << 6)
            .wrapping_add(seed >> 2);
    }
    seed
}

impl fmt::Display for Chromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut days = self.genes.iter();
        if let Some(first) = days.next() {
            write!(f, "{first}")?;
        }
        for day in days {
            write!(f, " {day}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_depends_only_on_contents() {
        let a: Genes = (0..NUM_FAMILIES).map(|i| (i % NUM_DAYS) as u8 + 1).collect();
        let b = a.clone();
        assert_eq!(genes_hash(&a), genes_hash(&b));
        assert_eq!(genes_hash(&a), genes_hash(&a));
    }

    #[test]
    fn hash_is_sensitive_to_gene_order() {
        let mut a: Genes = vec![1; NUM_FAMILIES];
        a[0] = 2;
        let mut b: Genes = vec![1; NUM_FAMILIES];
        b[1] = 2;
        assert_ne!(genes_hash(&a), genes_hash(&b));
    }

    #[test]
    fn hash_of_empty_genes_is_the_seed() {
        assert_eq!(genes_hash(&[]), NUM_FAMILIES as u32);
    }
}
