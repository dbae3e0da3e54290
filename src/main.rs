use anyhow::Result;
use citydb::build::{read_stats, run_build, BuildConfig, BuildReport};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "citydb")]
#[command(about = "Build a searchable SQLite database of cities from GeoNames dumps")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the database from the reference files
    Build(BuildArgs),
    /// Print row counts of a built database
    Stats(StatsArgs),
}

#[derive(Args)]
struct BuildArgs {
    /// Directory containing countryInfo.txt, countryinfo_alts.txt and cities15000.txt
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Output directory for the database
    #[arg(short, long, default_value = "out")]
    output_dir: PathBuf,

    /// Include foreign-language country and city names
    #[arg(short, long)]
    full: bool,
}

#[derive(Args)]
struct StatsArgs {
    /// Path to a database produced by `build`
    #[arg(long)]
    db: PathBuf,
}

fn run_build_cmd(args: BuildArgs) -> Result<()> {
    let config = BuildConfig {
        data_dir: args.data_dir,
        output_dir: args.output_dir,
        use_foreign_names: args.full,
    };

    info!(full = config.use_foreign_names, "Starting build");
    let start = Instant::now();
    let report = run_build(&config)?;
    let duration = start.elapsed();

    if !report.stats.is_consistent() {
        warn!("Output may be incomplete, check the source data");
    }
    print_summary(&report, duration);

    Ok(())
}

fn print_summary(report: &BuildReport, duration: Duration) {
    let stats = &report.stats;
    let lines: [(&str, String); 10] = [
        ("Database", report.db_path.display().to_string()),
        ("Build time", format!("{:.2}s", duration.as_secs_f64())),
        ("Cities read", stats.cities_read.to_string()),
        ("Cities inserted", stats.cities_inserted.to_string()),
        ("Countries", stats.countries.to_string()),
        ("States", stats.states.to_string()),
        ("Timezones", stats.timezones.to_string()),
        ("Country aliases", stats.country_aliases.to_string()),
        ("City aliases", stats.city_aliases.to_string()),
        ("Max name tokens", stats.max_name_tokens.to_string()),
    ];

    println!();
    println!("=== Summary ===");
    for (label, value) in &lines {
        println!("{:<20}{}", format!("{}:", label), value);
    }
}

fn run_stats_cmd(args: StatsArgs) -> Result<()> {
    for (table, rows) in read_stats(&args.db)? {
        println!("{:<24}{}", table, rows);
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let result = match cli.command {
        Commands::Build(args) => run_build_cmd(args),
        Commands::Stats(args) => run_stats_cmd(args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
