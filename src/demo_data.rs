use crate::chromosome::{NUM_DAYS, NUM_FAMILIES};
use crate::preferences::{Family, PreferenceTable, NUM_CHOICES};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use std::io::Write;

// Relative frequency of family sizes 2..=8
const SIZE_WEIGHTS: [u32; 7] = [20, 19, 19, 15, 12, 9, 6];

/// Families of four whose choices are consecutive days starting at
/// `id % 100 + 1`. Placing every family on its first choice gives each day
/// exactly 200 visitors.
pub fn uniform_table() -> PreferenceTable {
    let families = (0..NUM_FAMILIES)
        .map(|id| Family {
            id,
            size: 4,
            preferences: std::array::from_fn(|rank| ((id + rank) % NUM_DAYS) as u8 + 1),
        })
        .collect();

    PreferenceTable::new(families).expect("uniform families are valid")
}

/// Random but reproducible families resembling the competition data: sizes
/// between 2 and 8, choices scattered around a favourite day.
pub fn synthetic_families(seed: u64) -> Vec<Family> {
    let mut rng = StdRng::seed_from_u64(seed);
    let sizes = WeightedIndex::new(SIZE_WEIGHTS).expect("weights are positive");

    (0..NUM_FAMILIES)
        .map(|id| {
            let favourite = rng.gen_range(1..=NUM_DAYS) as f64;
            let spread = Normal::new(favourite, 15.0).expect("spread is positive");

            let mut preferences = [0u8; NUM_CHOICES];
            preferences[0] = favourite as u8;
            let mut filled = 1;
            while filled < NUM_CHOICES {
                let day = spread.sample(&mut rng).round().clamp(1.0, NUM_DAYS as f64) as u8;
                if !preferences[..filled].contains(&day) {
                    preferences[filled] = day;
                    filled += 1;
                }
            }

            Family {
                id,
                size: sizes.sample(&mut rng) as u32 + 2,
                preferences,
            }
        })
        .collect()
}

pub fn synthetic_table(seed: u64) -> PreferenceTable {
    PreferenceTable::new(synthetic_families(seed)).expect("synthetic families are valid")
}

/// Writes families in the `family_data.csv` layout.
pub fn write_families<W: Write>(families: &[Family], writer: W) -> csv::Result<()> {
    let mut writer = csv::Writer::from_writer(writer);

    let mut header = vec!["family_id".to_string()];
    header.extend((0..NUM_CHOICES).map(|rank| format!("choice_{rank}")));
    header.push("n_people".to_string());
    writer.write_record(&header)?;

    for family in families {
        let mut record = vec![family.id.to_string()];
        record.extend(family.preferences.iter().map(|day| day.to_string()));
        record.push(family.size.to_string());
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_data_is_reproducible() {
        assert_eq!(synthetic_families(3), synthetic_families(3));
        assert_ne!(synthetic_families(3), synthetic_families(4));
    }

    #[test]
    fn synthetic_sizes_stay_in_range() {
        let families = synthetic_families(11);
        assert!(families.iter().all(|family| (2..=8).contains(&family.size)));
    }

    #[test]
    fn written_families_load_back() {
        let families = synthetic_families(5);
        let mut buffer = Vec::new();
        write_families(&families, &mut buffer).unwrap();

        let table = PreferenceTable::from_reader(buffer.as_slice()).unwrap();
        assert_eq!(table.families(), families.as_slice());
    }
}
