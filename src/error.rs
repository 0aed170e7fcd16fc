/// Errors raised while building the optimizer from external input.
///
/// Everything here is fatal at startup. Infeasible assignments are not errors,
/// they are reported as an infinite cost.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("malformed JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected {expected} families, found {found}")]
    FamilyCount { expected: usize, found: usize },
    #[error("family ids must be contiguous: found id {found} where {expected} was expected")]
    FamilyId { expected: usize, found: usize },
    #[error("unknown family {found}: ids run from 0 to {max}")]
    UnknownFamily { found: usize, max: usize },
    #[error("family {family}: day {day} is outside 1..={max}")]
    DayOutOfRange { family: usize, day: u32, max: usize },
    #[error("family {family}: day {day} appears twice in the preference list")]
    DuplicatePreference { family: usize, day: u8 },
    #[error("family {family} has no members")]
    EmptyFamily { family: usize },
    #[error("expected {expected} assignments, found {found}")]
    AssignmentCount { expected: usize, found: usize },
    #[error("family {family} is assigned more than once")]
    DuplicateAssignment { family: usize },
    #[error("expected {expected} chromosomes, found {found}")]
    PopulationSize { expected: usize, found: usize },
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
