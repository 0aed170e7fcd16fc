use crate::chromosome::{NUM_DAYS, NUM_FAMILIES};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::instrument;

/// Length of every family's preference list.
pub const NUM_CHOICES: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Family {
    pub id: usize,
    /// Number of family members
    pub size: u32,
    /// Preferred days, most preferred first
    pub preferences: [u8; NUM_CHOICES],
}

impl Family {
    /// Position of `day` in the preference list, `None` if not listed.
    pub fn rank_of(&self, day: u8) -> Option<usize> {
        self.preferences.iter().position(|&d| d == day)
    }
}

// One row of `family_data.csv`.
#[derive(Debug, Deserialize)]
struct FamilyRecord {
    family_id: usize,
    choice_0: u32,
    choice_1: u32,
    choice_2: u32,
    choice_3: u32,
    choice_4: u32,
    choice_5: u32,
    choice_6: u32,
    choice_7: u32,
    choice_8: u32,
    choice_9: u32,
    n_people: u32,
}

impl FamilyRecord {
    fn choices(&self) -> [u32; NUM_CHOICES] {
        [
            self.choice_0,
            self.choice_1,
            self.choice_2,
            self.choice_3,
            self.choice_4,
            self.choice_5,
            self.choice_6,
            self.choice_7,
            self.choice_8,
            self.choice_9,
        ]
    }

    fn into_family(self) -> Result<Family> {
        let mut preferences = [0u8; NUM_CHOICES];
        for (slot, day) in preferences.iter_mut().zip(self.choices()) {
            if day == 0 || day as usize > NUM_DAYS {
                return Err(Error::DayOutOfRange {
                    family: self.family_id,
                    day,
                    max: NUM_DAYS,
                });
            }
            *slot = day as u8;
        }

        Ok(Family {
            id: self.family_id,
            size: self.n_people,
            preferences,
        })
    }
}

// Families that list one particular day, grouped by the rank they give it.
#[derive(Clone, Debug, Default)]
struct DayIndex {
    by_rank: [Vec<usize>; NUM_CHOICES],
    any_rank: Vec<usize>,
}

/// Family data plus the day → rank → families inverse index.
///
/// Built once and read-only afterwards.
#[derive(Clone, Debug)]
pub struct PreferenceTable {
    families: Vec<Family>,
    days: Vec<DayIndex>,
}

impl PreferenceTable {
    /// Validates `families` and builds the inverse index.
    ///
    /// Families may come in any order, but their ids must cover `0..5000`
    /// exactly once.
    pub fn new(mut families: Vec<Family>) -> Result<Self> {
        if families.len() != NUM_FAMILIES {
            return Err(Error::FamilyCount {
                expected: NUM_FAMILIES,
                found: families.len(),
            });
        }

        families.sort_unstable_by_key(|family| family.id);
        for (expected, family) in families.iter().enumerate() {
            if family.id != expected {
                return Err(Error::FamilyId {
                    expected,
                    found: family.id,
                });
            }
            if family.size == 0 {
                return Err(Error::EmptyFamily { family: family.id });
            }
            for (rank, &day) in family.preferences.iter().enumerate() {
                if day == 0 || day as usize > NUM_DAYS {
                    return Err(Error::DayOutOfRange {
                        family: family.id,
                        day: day as u32,
                        max: NUM_DAYS,
                    });
                }
                if family.preferences[..rank].contains(&day) {
                    return Err(Error::DuplicatePreference {
                        family: family.id,
                        day,
                    });
                }
            }
        }

        let mut days = vec![DayIndex::default(); NUM_DAYS];
        for family in families.iter() {
            for (rank, &day) in family.preferences.iter().enumerate() {
                let index = &mut days[day as usize - 1];
                index.by_rank[rank].push(family.id);
                index.any_rank.push(family.id);
            }
        }

        Ok(Self { families, days })
    }

    /// Reads a `family_id,choice_0..choice_9,n_people` CSV with a header row.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut families = Vec::with_capacity(NUM_FAMILIES);
        for record in reader.deserialize::<FamilyRecord>() {
            families.push(record?.into_family()?);
        }

        Self::new(families)
    }

    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref()).map_err(csv::Error::from)?;
        let table = Self::from_reader(file)?;
        tracing::info!(families = table.families.len(), "Loaded family data");
        Ok(table)
    }

    pub fn families(&self) -> &[Family] {
        &self.families
    }

    pub fn family(&self, id: usize) -> &Family {
        &self.families[id]
    }

    pub fn preferences(&self, id: usize) -> &[u8; NUM_CHOICES] {
        &self.families[id].preferences
    }

    /// Families that list `day` at exactly `rank`.
    pub fn families_for(&self, day: u8, rank: usize) -> &[usize] {
        &self.days[day as usize - 1].by_rank[rank]
    }

    /// Families that list `day` at any rank.
    pub fn families_preferring(&self, day: u8) -> &[usize] {
        &self.days[day as usize - 1].any_rank
    }
}
