use anyhow::{bail, Context, Result};
use chrono::{Duration, NaiveDateTime};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use airplay_match::aggregate::{representatives, top_n, DEFAULT_LOOKBACK_HOURS, DEFAULT_TOP_LIMIT};
use airplay_match::catalog::SqliteCatalog;
use airplay_match::matcher::{MatchConfig, MatchEngine, DEFAULT_MAX_RESULTS};
use airplay_match::models::{CatalogCandidate, RawObservation, TimeWindow, TrackObservation};
use airplay_match::progress::{create_progress_bar, create_spinner, format_duration, log_progress};
use airplay_match::query::build_queries;
use airplay_match::safety::{validate_output_path, CATALOG_PATTERN};
use airplay_match::scoring::ACCEPT_THRESHOLD;
use airplay_match::window::{resolve, split_live, time_span};

#[derive(Parser)]
#[command(name = "airplay-match")]
#[command(about = "Select, rank and match radio airplay observations against a music catalog")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the observations that fall inside a time window
    Window {
        observations: PathBuf,
        #[command(flatten)]
        window: WindowArgs,
        #[command(flatten)]
        clock: ClockArgs,
    },
    /// Rank titles by play count over a rolling lookback
    Top {
        observations: PathBuf,
        #[arg(long, default_value_t = DEFAULT_LOOKBACK_HOURS)]
        lookback_hours: u32,
        #[arg(long, default_value_t = DEFAULT_TOP_LIMIT)]
        limit: usize,
        #[command(flatten)]
        clock: ClockArgs,
    },
    /// Match observations against a local catalog index
    Match(MatchArgs),
    /// Build a local catalog index from a JSON list of candidates
    Index {
        candidates: PathBuf,
        output: PathBuf,
        /// Hide progress bars, log progress lines instead
        #[arg(long)]
        log_only: bool,
    },
}

#[derive(Args)]
struct ClockArgs {
    /// Reference time as "YYYY-MM-DD HH:MM" (default: local time)
    #[arg(long)]
    now: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    Morning,
    Evening,
}

#[derive(Args)]
struct WindowArgs {
    /// Rolling lookback in hours
    #[arg(long, conflicts_with_all = ["from", "preset"])]
    hours: Option<u32>,
    /// Start of a same-day clock range (HH:MM)
    #[arg(long, requires = "to", conflicts_with = "preset")]
    from: Option<String>,
    /// End of a same-day clock range (HH:MM)
    #[arg(long, requires = "from")]
    to: Option<String>,
    #[arg(long, value_enum)]
    preset: Option<Preset>,
}

#[derive(Args)]
struct MatchArgs {
    observations: PathBuf,
    #[arg(long)]
    catalog: PathBuf,
    #[command(flatten)]
    window: WindowArgs,
    #[command(flatten)]
    clock: ClockArgs,
    /// Match the top-ranked titles instead of the window selection
    #[arg(long, conflicts_with_all = ["hours", "from", "preset"])]
    top: bool,
    #[arg(long, default_value_t = ACCEPT_THRESHOLD)]
    threshold: f64,
    #[arg(long, default_value_t = DEFAULT_MAX_RESULTS)]
    max_results: usize,
    /// Extra attempts per strategy when a search call fails
    #[arg(long, default_value_t = 0)]
    retries: u32,
    /// Write matching statistics as JSON
    #[arg(long)]
    stats: Option<PathBuf>,
    /// Hide progress bars, log progress lines instead
    #[arg(long)]
    log_only: bool,
}

impl ClockArgs {
    fn resolve(&self) -> Result<NaiveDateTime> {
        match &self.now {
            Some(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
                .with_context(|| format!("Invalid --now '{}', expected YYYY-MM-DD HH:MM", s)),
            None => Ok(chrono::Local::now().naive_local()),
        }
    }
}

impl WindowArgs {
    /// Defaults to the last hour when no window flag is given.
    fn window(&self) -> Result<TimeWindow> {
        if let Some(preset) = self.preset {
            return Ok(match preset {
                Preset::Morning => TimeWindow::morning(),
                Preset::Evening => TimeWindow::evening(),
            });
        }
        if let (Some(from), Some(to)) = (&self.from, &self.to) {
            return Ok(TimeWindow::parse_between(from, to)?);
        }
        Ok(TimeWindow::last_hours(self.hours.unwrap_or(1)))
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("Failed to parse {}", path.display()))
}

fn select(
    observations: &[RawObservation],
    window: &TimeWindow,
    now: NaiveDateTime,
) -> Result<Vec<TrackObservation>> {
    let selection = resolve(observations, window, now)?;
    info!(
        selected = selection.tracks.len(),
        skipped = selection.skipped.len(),
        "Resolved window {:?}",
        window
    );
    Ok(selection.tracks)
}

fn run_window(path: &Path, window: &WindowArgs, clock: &ClockArgs) -> Result<()> {
    let now = clock.resolve()?;
    let observations: Vec<RawObservation> = read_json(path)?;

    if let Some((earliest, latest)) = time_span(&observations, now) {
        info!("Observations span {} to {}", earliest.format("%H:%M"), latest.format("%H:%M"));
    }

    let tracks = select(&observations, &window.window()?, now)?;
    println!("{}", serde_json::to_string_pretty(&tracks)?);
    Ok(())
}

fn run_top(path: &Path, lookback_hours: u32, limit: usize, clock: &ClockArgs) -> Result<()> {
    let now = clock.resolve()?;
    let observations: Vec<RawObservation> = read_json(path)?;
    let ranked = top_n(
        &observations,
        Duration::hours(i64::from(lookback_hours)),
        now,
        limit,
    );
    println!("{}", serde_json::to_string_pretty(&ranked)?);
    Ok(())
}

fn run_match(args: &MatchArgs) -> Result<()> {
    let start = Instant::now();
    let now = args.clock.resolve()?;
    let observations: Vec<RawObservation> = read_json(&args.observations)?;

    let tracks = if args.top {
        representatives(top_n(
            &observations,
            Duration::hours(i64::from(DEFAULT_LOOKBACK_HOURS)),
            now,
            DEFAULT_TOP_LIMIT,
        ))
    } else {
        select(&observations, &args.window.window()?, now)?
    };

    let (now_playing, _) = split_live(&tracks);
    if let Some(live) = &now_playing {
        info!("Now playing: {}", live.title);
    }

    let catalog = SqliteCatalog::open(&args.catalog)
        .with_context(|| format!("Failed to open catalog {}", args.catalog.display()))?;
    let config = MatchConfig {
        accept_threshold: args.threshold,
        max_results: args.max_results,
        retries_per_strategy: args.retries,
        ..MatchConfig::default()
    };
    let engine = MatchEngine::new(catalog, config);

    let queries = build_queries(&tracks);
    let total = queries.len() as u64;
    let pb = create_progress_bar(total, "Matching", args.log_only);
    let report = engine.match_all_with(&queries, |i, _| {
        pb.inc(1);
        log_progress("Matching", i as u64 + 1, total, 10, args.log_only);
    });
    pb.finish_and_clear();

    for id in &report.matched_ids {
        println!("{}", id);
    }

    let stats = &report.stats;
    eprintln!("\n{:=<60}", "");
    eprintln!("Matching complete!");
    eprintln!("  Queries: {}", stats.total_queries);
    eprintln!(
        "  Matched: {} ({:.2}%)",
        stats.total_matches,
        stats.match_rate()
    );
    eprintln!(
        "    title+artist: {}, title: {}, artist: {}",
        stats.title_artist_matches, stats.title_only_matches, stats.artist_only_matches
    );
    eprintln!("  Unmatched: {}", stats.total_unmatched);
    eprintln!("  Search failures: {}", stats.search_failures);
    eprintln!("  Elapsed: {}", format_duration(start.elapsed()));
    eprintln!("{:=<60}", "");

    if let Some(path) = &args.stats {
        stats
            .write_to_file(path)
            .with_context(|| format!("Failed to write stats to {}", path.display()))?;
        info!("Wrote stats to {}", path.display());
    }
    Ok(())
}

fn run_index(candidates_path: &Path, output: &Path, log_only: bool) -> Result<()> {
    validate_output_path(output, CATALOG_PATTERN, &[candidates_path])?;
    let start = Instant::now();

    let candidates: Vec<CatalogCandidate> = read_json(candidates_path)?;
    if candidates.is_empty() {
        bail!("No candidates in {}", candidates_path.display());
    }
    info!("Loaded {} candidates", candidates.len());

    if output.exists() {
        std::fs::remove_file(output).context("Failed to remove existing output file")?;
    }

    let mut catalog = SqliteCatalog::create(output)
        .with_context(|| format!("Failed to create catalog {}", output.display()))?;
    let written = catalog.insert_candidates(&candidates)?;

    let spinner = create_spinner("Building search index", log_only);
    catalog.rebuild_index()?;
    catalog.optimize()?;
    spinner.finish_and_clear();

    let file_size = std::fs::metadata(output)?.len();
    eprintln!("\n{:=<60}", "");
    eprintln!("Index complete!");
    eprintln!("  Tracks: {}", written);
    eprintln!("  Output size: {:.2} MB", file_size as f64 / 1_048_576.0);
    eprintln!("  Elapsed: {}", format_duration(start.elapsed()));
    eprintln!("{:=<60}", "");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "airplay_match=info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Command::Window {
            observations,
            window,
            clock,
        } => run_window(observations, window, clock),
        Command::Top {
            observations,
            lookback_hours,
            limit,
            clock,
        } => run_top(observations, *lookback_hours, *limit, clock),
        Command::Match(args) => run_match(args),
        Command::Index {
            candidates,
            output,
            log_only,
        } => run_index(candidates, output, *log_only),
    }
}
