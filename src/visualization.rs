use crate::chromosome::NUM_DAYS;
use crate::cost::{MAX_OCCUPANCY, MIN_OCCUPANCY};
use crate::preferences::{PreferenceTable, NUM_CHOICES};
use plotters::prelude::*;
use std::error::Error;
use std::path::Path;

/// Visitors per day split by the choice rank they were granted. Row `d - 1`
/// is day `d`; the last column counts people outside their wish list.
pub fn occupancy_by_choice(table: &PreferenceTable, genes: &[u8]) -> Vec<[u32; NUM_CHOICES + 1]> {
    let mut occupancy = vec![[0u32; NUM_CHOICES + 1]; NUM_DAYS];
    for family in table.families() {
        let day = genes[family.id];
        let rank = family.rank_of(day).unwrap_or(NUM_CHOICES);
        occupancy[day as usize - 1][rank] += family.size;
    }
    occupancy
}

/// Number of people granted each choice rank.
pub fn people_by_choice(occupancy: &[[u32; NUM_CHOICES + 1]]) -> [u32; NUM_CHOICES + 1] {
    let mut total = [0u32; NUM_CHOICES + 1];
    for day in occupancy {
        for (sum, n) in total.iter_mut().zip(day) {
            *sum += n;
        }
    }
    total
}

/// Stacked bars of visitors per day, colored by choice rank, with the
/// occupancy bounds drawn as lines.
pub fn plot_occupancy(
    occupancy: &[[u32; NUM_CHOICES + 1]],
    output_path: &Path,
) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(output_path, (1600, 900)).into_drawing_area();
    root.fill(&WHITE)?;

    let max_occupancy = occupancy
        .iter()
        .map(|day| day.iter().sum::<u32>())
        .max()
        .unwrap_or(0)
        .max(MAX_OCCUPANCY)
        + 20;

    let mut chart = ChartBuilder::on(&root)
        .caption("Occupancy", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(1u32..NUM_DAYS as u32 + 1, 0u32..max_occupancy)?;

    chart
        .configure_mesh()
        .x_desc("Day")
        .y_desc("Occupancy")
        .x_labels(20)
        .draw()?;

    for (index, day) in occupancy.iter().enumerate() {
        let day_number = index as u32 + 1;
        let mut bottom = 0;
        for (rank, &n) in day.iter().enumerate() {
            if n == 0 {
                continue;
            }
            chart.draw_series(std::iter::once(Rectangle::new(
                [(day_number, bottom), (day_number + 1, bottom + n)],
                Palette99::pick(rank).filled(),
            )))?;
            bottom += n;
        }
    }

    for bound in [MIN_OCCUPANCY, MAX_OCCUPANCY] {
        chart.draw_series(LineSeries::new(
            [(1, bound), (NUM_DAYS as u32 + 1, bound)],
            BLACK.stroke_width(1),
        ))?;
    }

    root.present()?;
    tracing::info!(path = %output_path.display(), "Occupancy chart saved");
    Ok(())
}

/// Bar chart of how many people got each choice.
pub fn plot_choices(totals: &[u32; NUM_CHOICES + 1], output_path: &Path) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(output_path, (1000, 700)).into_drawing_area();
    root.fill(&WHITE)?;

    let max_people = totals.iter().copied().max().unwrap_or(0);

    let mut chart = ChartBuilder::on(&root)
        .caption("Granted choices", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(
            (0u32..NUM_CHOICES as u32 + 1).into_segmented(),
            0u32..max_people + max_people / 10 + 1,
        )?;

    chart
        .configure_mesh()
        .x_desc("Choice")
        .y_desc("Number of people")
        .draw()?;

    chart.draw_series(
        Histogram::vertical(&chart)
            .style(BLUE.filled())
            .margin(5)
            .data(
                totals
                    .iter()
                    .enumerate()
                    .map(|(rank, &n)| (rank as u32, n)),
            ),
    )?;

    root.present()?;
    tracing::info!(path = %output_path.display(), "Choice chart saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chromosome::NUM_FAMILIES;
    use crate::demo_data::uniform_table;

    #[test]
    fn occupancy_is_split_by_rank() {
        let table = uniform_table();
        let mut genes: Vec<u8> = (0..NUM_FAMILIES).map(|id| (id % NUM_DAYS) as u8 + 1).collect();
        genes[0] = 2; // second choice
        genes[1] = 90; // not listed

        let occupancy = occupancy_by_choice(&table, &genes);
        assert_eq!(occupancy[0][0], 196);
        assert_eq!(occupancy[1][0], 196);
        assert_eq!(occupancy[1][1], 4);
        assert_eq!(occupancy[89][NUM_CHOICES], 4);

        let totals = people_by_choice(&occupancy);
        assert_eq!(totals[0], 4 * (NUM_FAMILIES as u32 - 2));
        assert_eq!(totals[1], 4);
        assert_eq!(totals[NUM_CHOICES], 4);
    }
}
