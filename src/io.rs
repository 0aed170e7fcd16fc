//! CSV persistence of assignments.
//!
//! A single solution is stored as `family_id,assigned_day` rows with a header.
//! A population is stored without a header, one assignment per line, each line
//! listing the days of families `0..5000` in order.

use crate::chromosome::{Genes, NUM_DAYS, NUM_FAMILIES};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

#[derive(Debug, Serialize, Deserialize)]
struct AssignmentRecord {
    family_id: usize,
    assigned_day: u32,
}

pub fn read_solution<R: Read>(reader: R) -> Result<Genes> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut genes: Vec<Option<u8>> = vec![None; NUM_FAMILIES];
    let mut found = 0;
    for record in reader.deserialize::<AssignmentRecord>() {
        let AssignmentRecord {
            family_id,
            assigned_day,
        } = record?;
        found += 1;

        if family_id >= NUM_FAMILIES {
            return Err(Error::UnknownFamily {
                found: family_id,
                max: NUM_FAMILIES - 1,
            });
        }
        let day = check_day(family_id, assigned_day)?;
        if genes[family_id].replace(day).is_some() {
            return Err(Error::DuplicateAssignment { family: family_id });
        }
    }

    genes
        .into_iter()
        .collect::<Option<Genes>>()
        .ok_or(Error::AssignmentCount {
            expected: NUM_FAMILIES,
            found,
        })
}

pub fn write_solution<W: Write>(genes: &[u8], writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for (family_id, &day) in genes.iter().enumerate() {
        writer.serialize(AssignmentRecord {
            family_id,
            assigned_day: day as u32,
        })?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn read_population<R: Read>(reader: R) -> Result<Vec<Genes>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut population = Vec::new();
    for record in reader.deserialize::<Vec<u32>>() {
        let days = record?;
        if days.len() != NUM_FAMILIES {
            return Err(Error::AssignmentCount {
                expected: NUM_FAMILIES,
                found: days.len(),
            });
        }
        let genes = days
            .into_iter()
            .enumerate()
            .map(|(family, day)| check_day(family, day))
            .collect::<Result<Genes>>()?;
        population.push(genes);
    }

    Ok(population)
}

pub fn write_population<'a, W, I>(population: I, writer: W) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    for genes in population {
        writer.write_record(genes.iter().map(|day| day.to_string()))?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

fn check_day(family: usize, day: u32) -> Result<u8> {
    if day == 0 || day as usize > NUM_DAYS {
        return Err(Error::DayOutOfRange {
            family,
            day,
            max: NUM_DAYS,
        });
    }
    Ok(day as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_genes() -> Genes {
        (0..NUM_FAMILIES).map(|id| (id * 7 % NUM_DAYS) as u8 + 1).collect()
    }

    #[test]
    fn solution_survives_a_write_and_read() {
        let genes = sample_genes();
        let mut buffer = Vec::new();
        write_solution(&genes, &mut buffer).unwrap();

        assert!(buffer.starts_with(b"family_id,assigned_day\n0,1\n"));
        assert_eq!(read_solution(buffer.as_slice()).unwrap(), genes);
    }

    #[test]
    fn missing_family_is_rejected() {
        let mut csv = String::from("family_id,assigned_day\n");
        for id in 0..NUM_FAMILIES - 1 {
            csv.push_str(&format!("{id},1\n"));
        }
        assert!(matches!(
            read_solution(csv.as_bytes()),
            Err(Error::AssignmentCount { found: 4999, .. })
        ));
    }

    #[test]
    fn repeated_family_is_rejected() {
        let csv = "family_id,assigned_day\n0,1\n0,2\n";
        assert!(matches!(
            read_solution(csv.as_bytes()),
            Err(Error::DuplicateAssignment { family: 0 })
        ));
    }

    #[test]
    fn family_beyond_the_last_id_is_rejected() {
        let csv = "family_id,assigned_day\n5000,1\n";
        let error = read_solution(csv.as_bytes()).unwrap_err();
        assert!(matches!(error, Error::UnknownFamily { found: 5000, max: 4999 }));
        assert_eq!(error.to_string(), "unknown family 5000: ids run from 0 to 4999");
    }

    #[test]
    fn population_lines_keep_their_order() {
        let first = sample_genes();
        let second: Genes = first.iter().rev().copied().collect();
        let mut buffer = Vec::new();
        write_population([first.as_slice(), second.as_slice()], &mut buffer).unwrap();

        let population = read_population(buffer.as_slice()).unwrap();
        assert_eq!(population, vec![first, second]);
    }

    #[test]
    fn short_population_line_is_rejected() {
        assert!(matches!(
            read_population("1,2,3\n".as_bytes()),
            Err(Error::AssignmentCount { found: 3, .. })
        ));
    }
}
