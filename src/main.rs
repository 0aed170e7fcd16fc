use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rand::prelude::*;
use rand::rngs::StdRng;
use santa_workshop::annealing::{anneal, AnnealConfig};
use santa_workshop::demo_data::{synthetic_families, write_families};
use santa_workshop::visualization::{occupancy_by_choice, people_by_choice, plot_choices, plot_occupancy};
use santa_workshop::{
    io, Chromosome, CostEvaluator, Crossover, Genes, Mutation, PoolConfig, Population, PreferenceTable,
    NUM_CHOICES, NUM_DAYS, NUM_FAMILIES,
};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about = "Assigns families to workshop days with a genetic algorithm")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Evolve a population of assignments
    Optimize(OptimizeArgs),
    /// Improve a single assignment with simulated annealing
    Anneal(AnnealArgs),
    /// Print the cost of a solution
    Score(ScoreArgs),
    /// Draw occupancy and choice charts for a solution
    Plot(PlotArgs),
    /// Write a synthetic family data file
    Demo(DemoArgs),
}

#[derive(Debug, Args)]
struct OptimizeArgs {
    /// CSV file with family data
    #[arg(long, default_value = "family_data.csv")]
    families: PathBuf,
    /// File with initial population
    #[arg(short, long)]
    population: Option<PathBuf>,
    /// JSON file with engine parameters; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of generations
    #[arg(short, long, default_value_t = 5000)]
    num: usize,
    /// Size of the population
    #[arg(long)]
    size: Option<usize>,
    /// Tournament size
    #[arg(short, long)]
    tournament: Option<usize>,
    /// Crossover probability
    #[arg(short, long)]
    crossover: Option<f64>,
    /// Crossover operator
    #[arg(long, value_enum)]
    crossover_kind: Option<Crossover>,
    /// Mutation probability
    #[arg(short, long)]
    mutation: Option<f64>,
    /// Enabled mutation operators, comma separated
    #[arg(long, value_enum, value_delimiter = ',')]
    mutations: Vec<Mutation>,
    /// Relative exponential for surviving ranks
    #[arg(short, long)]
    survival: Option<f64>,
    #[arg(long)]
    seed: Option<u64>,
    /// Enable rule-based improvement
    #[arg(short, long)]
    improve: bool,
    /// Run rule-based improvement for all solutions before evolving
    #[arg(long)]
    improve_all: bool,
    #[arg(long, default_value = "snapshots")]
    snapshots: PathBuf,
    /// Where to save the best solution
    #[arg(short, long, default_value = "best.csv")]
    output: PathBuf,
}

#[derive(Debug, Args)]
struct AnnealArgs {
    #[arg(long, default_value = "family_data.csv")]
    families: PathBuf,
    /// Solution to start from; a random assignment otherwise
    #[arg(long)]
    start: Option<PathBuf>,
    #[arg(short, long, default_value_t = 10_000_000)]
    iterations: u64,
    #[arg(long, default_value_t = 8855)]
    seed: u64,
    #[arg(short, long, default_value = "best.csv")]
    output: PathBuf,
}

#[derive(Debug, Args)]
struct ScoreArgs {
    solution: PathBuf,
    #[arg(long, default_value = "family_data.csv")]
    families: PathBuf,
}

#[derive(Debug, Args)]
struct PlotArgs {
    /// Solution CSV, or population CSV when --index is given
    input: PathBuf,
    /// Index of a solution in a population file
    #[arg(short, long)]
    index: Option<usize>,
    #[arg(long, default_value = "family_data.csv")]
    families: PathBuf,
    /// Output directory for figures
    #[arg(short, long, default_value = "fig")]
    output: PathBuf,
}

#[derive(Debug, Args)]
struct DemoArgs {
    #[arg(default_value = "family_data.csv")]
    output: PathBuf,
    #[arg(long, default_value_t = 2019)]
    seed: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Cli::parse().command {
        Command::Optimize(args) => optimize(args),
        Command::Anneal(args) => run_anneal(args),
        Command::Score(args) => score(args),
        Command::Plot(args) => plot(args),
        Command::Demo(args) => demo(args),
    }
}

fn load_table(path: &Path) -> Result<Arc<PreferenceTable>> {
    let table = PreferenceTable::from_path(path)
        .with_context(|| format!("failed to load family data from {}", path.display()))?;
    Ok(Arc::new(table))
}

fn read_solution(path: &Path) -> Result<Genes> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    io::read_solution(BufReader::new(file)).with_context(|| format!("failed to read {}", path.display()))
}

fn write_solution(genes: &[u8], path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    io::write_solution(genes, BufWriter::new(file))?;
    Ok(())
}

fn save_population(population: &Population, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    population.save(BufWriter::new(file))?;
    Ok(())
}

fn pool_config(args: &OptimizeArgs) -> Result<PoolConfig> {
    let mut config = match &args.config {
        Some(path) => PoolConfig::from_json_path(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?,
        None => PoolConfig::default(),
    };

    if let Some(size) = args.size {
        config.capacity = size;
    }
    if let Some(tournament) = args.tournament {
        config.tournament_size = tournament;
    }
    if let Some(crossover) = args.crossover {
        config.crossover_prob = crossover;
    }
    if let Some(kind) = args.crossover_kind {
        config.crossover = kind;
    }
    if let Some(mutation) = args.mutation {
        config.mutation_prob = mutation;
    }
    if !args.mutations.is_empty() {
        config.mutations = args.mutations.clone();
    }
    if let Some(survival) = args.survival {
        config.survival = survival;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    config.validate()?;
    Ok(config)
}

fn report(population: &Population) {
    let quantile = |q: f64| population.cost_at(q).unwrap_or(f64::INFINITY);
    let best = quantile(0.0);
    println!(
        "{} - Losses: {} (best), +{} (25%), +{} (median), +{} (75%)",
        format!("Generation {:6}", population.generation()).bold().red(),
        best.round(),
        (quantile(0.25) - best).round(),
        (quantile(0.5) - best).round(),
        (quantile(0.75) - best).round(),
    );
}

fn optimize(args: OptimizeArgs) -> Result<()> {
    let config = pool_config(&args)?;
    let table = load_table(&args.families)?;
    let mut population = Population::new(config, table)?;

    fs::create_dir_all(&args.snapshots)
        .with_context(|| format!("failed to create {}", args.snapshots.display()))?;

    match &args.population {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading population");
            let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
            population.load(BufReader::new(file))?;
        }
        None => {
            tracing::info!("Generating initial population");
            population.populate();
            let path = args.snapshots.join("start.csv");
            save_population(&population, &path)?;
            tracing::info!(path = %path.display(), "Initial population saved");
        }
    }

    if args.improve_all {
        for index in 0..population.members().len() {
            population.improve(NUM_FAMILIES, index);
        }
        for index in 0..10.min(population.members().len()) {
            population.improve_two_for_one(10, index);
        }
    }

    let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    tracing::info!(stamp, "Starting run");

    let mut rng = StdRng::seed_from_u64(6881);
    let mut last_repaired = population.best().map(Chromosome::hash);

    for generation in 1..=args.num {
        population.evolve();
        if generation % 1000 != 0 && generation != args.num {
            continue;
        }

        report(&population);

        if args.improve {
            // Repairing the same best solution twice finds nothing new, so
            // pick another member in that case.
            let hash = population.best().map(Chromosome::hash);
            let size = population.members().len();
            let index = if hash == last_repaired {
                rng.gen_range(1..size)
            } else {
                last_repaired = hash;
                0
            };

            let (index, _) = population.improve(500, index);
            println!("  Loss after improvement: {}", population.cost_at(0.0).unwrap_or(f64::INFINITY).round());

            if generation % 5000 == 0 {
                let (index, _) = population.improve(NUM_FAMILIES, index);
                population.improve_two_for_one(10, index);
                println!(
                    "  Loss after full improvement: {}",
                    population.cost_at(0.0).unwrap_or(f64::INFINITY).round()
                );
            }
        }

        if generation == args.num || generation % 25_000 == 0 {
            let best = population.cost_at(0.0).unwrap_or(f64::INFINITY);
            let path = args
                .snapshots
                .join(format!("{stamp}_{generation:06}_{}.csv", best.round()));
            save_population(&population, &path)?;
        }
    }

    let Some(best) = population.best() else {
        bail!("population is empty");
    };
    println!("Best loss achieved: {}", best.cost().round());
    write_solution(best.genes(), &args.output)
}

fn run_anneal(args: AnnealArgs) -> Result<()> {
    let evaluator = CostEvaluator::new(load_table(&args.families)?);
    let config = AnnealConfig {
        iterations: args.iterations,
        seed: args.seed,
        ..Default::default()
    };

    let genes = match &args.start {
        Some(path) => read_solution(path)?,
        None => {
            let mut rng = StdRng::seed_from_u64(args.seed);
            (0..NUM_FAMILIES).map(|_| rng.gen_range(1..=NUM_DAYS as u8)).collect()
        }
    };

    let (genes, cost) = anneal(&evaluator, genes, &config, |r| {
        println!(
            "{}, temperature {:.3}\n  Loss: {}, frac. downhill: {}, frac. uphill: {}",
            format!("Iteration {}", r.iteration).bold().red(),
            r.temperature,
            r.cost.round(),
            r.downhill,
            r.uphill,
        );
    });

    println!("Best loss achieved: {cost}");
    write_solution(&genes, &args.output)
}

fn score(args: ScoreArgs) -> Result<()> {
    let evaluator = CostEvaluator::new(load_table(&args.families)?);
    let genes = read_solution(&args.solution)?;
    let breakdown = evaluator.breakdown(&genes);

    if !breakdown.feasible {
        let bad_days: Vec<usize> = breakdown
            .occupancy
            .iter()
            .enumerate()
            .filter(|(_, &n)| !santa_workshop::cost::is_feasible_day(n))
            .map(|(day, _)| day + 1)
            .collect();
        println!("{} days out of bounds: {bad_days:?}", "Infeasible:".bold().red());
    }
    println!("Accounting cost:  {:.2}", breakdown.accounting);
    println!("Preference cost:  {}", breakdown.preference);
    println!("Total cost:       {:.2}", breakdown.total());
    for (rank, count) in breakdown.choices.iter().enumerate() {
        let label = if rank == NUM_CHOICES { "other".to_string() } else { format!("choice {rank}") };
        println!("  {label:>9}: {count} families");
    }
    Ok(())
}

fn plot(args: PlotArgs) -> Result<()> {
    let table = load_table(&args.families)?;
    let genes = match args.index {
        Some(index) => {
            let file = File::open(&args.input).with_context(|| format!("failed to open {}", args.input.display()))?;
            let mut population = io::read_population(BufReader::new(file))?;
            if index >= population.len() {
                bail!("population has {} solutions, no index {index}", population.len());
            }
            population.swap_remove(index)
        }
        None => read_solution(&args.input)?,
    };

    fs::create_dir_all(&args.output).with_context(|| format!("failed to create {}", args.output.display()))?;
    let occupancy = occupancy_by_choice(&table, &genes);
    plot_occupancy(&occupancy, &args.output.join("occupancy.png"))
        .map_err(|e| anyhow::anyhow!("failed to draw occupancy chart: {e}"))?;
    plot_choices(&people_by_choice(&occupancy), &args.output.join("choices.png"))
        .map_err(|e| anyhow::anyhow!("failed to draw choice chart: {e}"))?;
    Ok(())
}

fn demo(args: DemoArgs) -> Result<()> {
    let families = synthetic_families(args.seed);
    let file = File::create(&args.output).with_context(|| format!("failed to create {}", args.output.display()))?;
    write_families(&families, BufWriter::new(file))?;
    tracing::info!(path = %args.output.display(), families = families.len(), "Synthetic family data written");
    Ok(())
}
