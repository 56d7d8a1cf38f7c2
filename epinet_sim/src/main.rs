//! EpiNet Simulator CLI
//!
//! Run deterministic epidemic scenarios, or serve the HTTP API.

use clap::Parser;
use epinet_core::MetricsMode;
use epinet_service::{OsSeedContext, ParameterBounds, ServiceConfig, SessionRegistry};
use epinet_sim::{ScenarioId, ScenarioResult, ScenarioRunner};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// EpiNet deterministic simulation CLI
#[derive(Parser, Debug)]
#[command(name = "epinet-sim")]
#[command(about = "Run SIR epidemic scenarios on random networks", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (baseline, saturation, dormant, no_spread, no_recovery, fragmented,
    /// dense, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive seeds to test
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Step limit, overriding each scenario's own
    #[arg(long)]
    steps: Option<u64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON summary on stdout
    #[arg(long)]
    json: bool,

    /// Export per-step frames of a single scenario to a JSON file
    #[arg(long)]
    export: Option<String>,

    /// Serve the HTTP API on this address instead of running scenarios
    #[arg(long)]
    serve: Option<String>,

    /// Only enforce the core parameter domain when serving
    #[arg(long)]
    unrestricted: bool,

    /// Most live sessions when serving; the least recently used is evicted
    #[arg(long, default_value = "256")]
    max_sessions: usize,

    /// Metrics mode: recompute or cached
    #[arg(long, default_value = "recompute")]
    metrics_mode: String,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

fn serve(args: &Args, addr: &str, metrics_mode: MetricsMode) -> ExitCode {
    let config = ServiceConfig {
        bind_addr: addr.to_string(),
        bounds: if args.unrestricted {
            ParameterBounds::unrestricted()
        } else {
            ParameterBounds::default()
        },
        metrics_mode,
        max_sessions: args.max_sessions,
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
        let registry = Arc::new(SessionRegistry::new(OsSeedContext::new(), &config));
        epinet_service::serve(listener, registry).await
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Server on {} stopped: {}", config.bind_addr, e);
            ExitCode::FAILURE
        }
    }
}

fn run_export(runner: &ScenarioRunner, scenario: ScenarioId, path: &str) -> ExitCode {
    info!("Running {} with export to: {}", scenario.name(), path);

    let (result, export) = runner.run_exported(scenario);
    if let Err(e) = export.write_to_file(path) {
        error!("{}", e);
        return ExitCode::FAILURE;
    }
    info!("Exported {} frames to {}", export.frames.len(), path);

    if result.passed {
        info!("✓ {} (seed={}) PASSED", scenario.name(), runner.seed());
        ExitCode::SUCCESS
    } else {
        error!(
            "✗ {} FAILED: {}",
            scenario.name(),
            result.failure_reason.as_deref().unwrap_or("unknown")
        );
        ExitCode::FAILURE
    }
}

fn print_json_summary(results: &[ScenarioResult], failed: usize) -> bool {
    let summary = serde_json::json!({
        "total": results.len(),
        "passed": results.len() - failed,
        "failed": failed,
        "results": results.iter().map(|r| {
            serde_json::json!({
                "scenario": r.scenario.name(),
                "seed": r.seed,
                "passed": r.passed,
                "steps": r.steps,
                "final": {
                    "susceptible": r.final_susceptible,
                    "infected": r.final_infected,
                    "recovered": r.final_recovered,
                },
                "metrics": r.metrics,
                "failure_reason": r.failure_reason,
            })
        }).collect::<Vec<_>>(),
    });

    match serde_json::to_string_pretty(&summary) {
        Ok(text) => {
            println!("{}", text);
            true
        }
        Err(e) => {
            error!("Failed to encode summary: {}", e);
            false
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let metrics_mode: MetricsMode = match args.metrics_mode.parse() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(addr) = &args.serve {
        return serve(&args, addr, metrics_mode);
    }

    if !args.json {
        info!("EpiNet Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        match args.scenario.parse() {
            Ok(scenario) => vec![scenario],
            Err(e) => {
                eprintln!("Error: {}", e);
                let names: Vec<&str> = ScenarioId::all().iter().map(ScenarioId::name).collect();
                eprintln!("Available scenarios: {}, all", names.join(", "));
                return ExitCode::FAILURE;
            }
        }
    };

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1)
    } else {
        args.seed
    };

    let make_runner = |seed: u64| {
        let runner = ScenarioRunner::new(seed).with_metrics_mode(metrics_mode);
        match args.steps {
            Some(steps) => runner.with_max_steps(steps),
            None => runner,
        }
    };

    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 {
            eprintln!("Error: --export only supports a single scenario, not 'all'");
            return ExitCode::FAILURE;
        }
        return run_export(&make_runner(base_seed), scenarios[0], export_path);
    }

    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = make_runner(seed);

        for scenario in &scenarios {
            let result = runner.run(*scenario);

            if !args.json {
                if result.passed {
                    info!(
                        "✓ {} (seed={}) PASSED: {} steps, peak {} infected at t={}, \
                         attack rate {:.1}%",
                        scenario.name(),
                        seed,
                        result.steps,
                        result.metrics.peak_infected,
                        result.metrics.peak_step,
                        result.metrics.attack_rate * 100.0
                    );
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }

            if !result.passed {
                failed_count += 1;
            }
            all_results.push(result);
        }
    }

    let total = all_results.len();

    if args.json {
        if !print_json_summary(&all_results, failed_count) {
            return ExitCode::FAILURE;
        }
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);
            for result in all_results.iter().filter(|r| !r.passed) {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario.name(),
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    if failed_count > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
