mod live;
mod logic;
mod scenarios;
mod storage;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use univa_game::{Catalog, EconomyConfig};

use live::{LiveOptions, run_live};
use logic::{GameplayStrategy, LogicTester, ScenarioResult};
use scenarios::{get_all_scenarios, get_scenario, list_scenarios};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RunMode {
    /// Scripted scenarios over simulated time (fast, no wall clock)
    Simulate,
    /// Real-time play with auto-save to the save directory
    Live,
}

#[derive(Debug, Parser)]
#[command(name = "univa-sim", version = "0.1.0")]
#[command(about = "Headless driver for the Univa Idle engine - scenario simulation and live play")]
struct Args {
    /// Run mode: simulate (scenarios) or live (real time)
    #[arg(long, value_enum, default_value_t = RunMode::Simulate)]
    mode: RunMode,

    /// Scenarios to run (comma-separated, or "all")
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 1)]
    iterations: usize,

    /// Override the tick delta (seconds) of every scenario
    #[arg(long)]
    step: Option<f64>,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Economy tunables as JSON; missing fields keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    // Live-mode options
    /// Directory holding the save files (live mode)
    #[arg(long, default_value = "target/univa-save")]
    save_dir: PathBuf,

    /// Player policy for live mode
    #[arg(long, value_enum, default_value_t = GameplayStrategy::Greedy)]
    strategy: GameplayStrategy,

    /// Stop live mode after this many wall-clock seconds (default: until Ctrl-C)
    #[arg(long)]
    duration: Option<f64>,

    /// Wall-clock milliseconds between live ticks
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,

    /// Run-clock seconds per wall-clock second in live mode
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    /// Wall-clock seconds between forced saves in live mode
    #[arg(long, default_value_t = 30)]
    save_every: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    announce_banner();

    let config = load_config(args.config.as_deref())?;
    let catalog = univa_game::catalog();

    match args.mode {
        RunMode::Simulate => {
            let start_time = Instant::now();
            let results = run_simulations(&args, catalog, &config)?;
            write_reports(&args, &results, start_time)?;
            if results.iter().any(|r| !r.passed) {
                std::process::exit(1);
            }
        }
        RunMode::Live => {
            let options = live_options(&args)?;
            println!(
                "{} {} (save dir {})",
                "🛰️  Live session:".bright_yellow().bold(),
                options.strategy,
                options.save_dir.display()
            );
            let report = run_live(&options, catalog, config).await?;
            println!(
                "🏁 Stopped after {} ticks at clock {:.1}s, reach {:.3e}{}",
                report.ticks,
                report.clock,
                report.reach,
                if report.interrupted { " (interrupted)" } else { "" }
            );
        }
    }

    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(output_target.writer(), "  {key:20} - {description}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🎮 Univa Simulator".bright_cyan().bold());
    println!("{}", "==================".cyan());
}

fn load_config(path: Option<&Path>) -> Result<EconomyConfig> {
    let Some(path) = path else {
        return Ok(EconomyConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config: EconomyConfig = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid config in {}", path.display()))?;
    Ok(config)
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

fn expand_scenarios(scenarios_arg: &str) -> Vec<String> {
    let mut scenarios = split_csv(scenarios_arg);
    if scenarios.iter().any(|s| s == "all") {
        scenarios.retain(|s| s != "all");
        for scenario in get_all_scenarios() {
            if !scenarios.iter().any(|s| s == scenario.name) {
                scenarios.push(scenario.name.to_string());
            }
        }
    }
    scenarios
}

fn parse_seeds(seeds_arg: &str) -> Result<Vec<u64>> {
    split_csv(seeds_arg)
        .iter()
        .map(|token| {
            token
                .parse::<u64>()
                .with_context(|| format!("invalid seed `{token}`"))
        })
        .collect()
}

fn run_simulations(
    args: &Args,
    catalog: Arc<Catalog>,
    config: &EconomyConfig,
) -> Result<Vec<ScenarioResult>> {
    let seeds = parse_seeds(&args.seeds)?;
    if let Some(step) = args.step
        && !(step.is_finite() && step > 0.0)
    {
        bail!("--step must be a positive number of seconds (got {step})");
    }

    println!("{}", "🧠 Running Simulations".bright_yellow().bold());
    println!("{}", "-".repeat(30).yellow());

    let tester = LogicTester::new(catalog, config.clone(), args.verbose);
    let mut results = Vec::new();
    for scenario_name in expand_scenarios(&args.scenarios) {
        let Some(mut scenario) = get_scenario(&scenario_name) else {
            println!("{} Unknown scenario: {}", "⚠️".yellow(), scenario_name.red());
            continue;
        };
        if let Some(step) = args.step {
            scenario.plan = scenario.plan.with_step(step);
        }
        results.extend(tester.run_scenario(&scenario, &seeds, args.iterations));
    }
    Ok(results)
}

fn live_options(args: &Args) -> Result<LiveOptions> {
    if !(args.speed.is_finite() && args.speed > 0.0) {
        bail!("--speed must be positive (got {})", args.speed);
    }
    if args.tick_ms == 0 || args.save_every == 0 {
        bail!("--tick-ms and --save-every must be at least 1");
    }
    let duration = match args.duration {
        Some(secs) if secs.is_finite() && secs >= 0.0 => Some(Duration::from_secs_f64(secs)),
        Some(secs) => bail!("--duration must be a non-negative number of seconds (got {secs})"),
        None => None,
    };
    let seed = parse_seeds(&args.seeds)?.first().copied().unwrap_or_default();
    Ok(LiveOptions {
        save_dir: args.save_dir.clone(),
        strategy: args.strategy,
        seed,
        tick: Duration::from_millis(args.tick_ms),
        speed: args.speed,
        save_every: Duration::from_secs(args.save_every),
        duration,
        quiet: false,
    })
}

fn write_reports(args: &Args, results: &[ScenarioResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => logic::reports::generate_json_report(&mut output_target, results)?,
        "markdown" => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# Univa Simulation Results\n\n_No scenarios executed._"
                )?;
            } else {
                logic::reports::generate_markdown_report(&mut output_target, results)?;
            }
        }
        _ => {
            if results.is_empty() {
                writeln!(&mut output_target, "No scenarios executed.")?;
            } else {
                logic::reports::generate_console_report(
                    &mut output_target,
                    results,
                    start_time.elapsed(),
                )?;
            }
        }
    }

    if args.report != "json" {
        writeln!(&mut output_target)?;
        writeln!(&mut output_target, "🏁 Total time: {:?}", start_time.elapsed())?;
    }
    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
