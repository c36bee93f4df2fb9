//! agentflow CLI Entry Point
//!
//! Inspects and simulates agent workflows.
//!
//! # Usage
//!
//! ```bash
//! # Print the level-by-level execution plan
//! agentflow feature.yaml --plan
//!
//! # Report every structural problem without failing fast
//! agentflow feature.yaml --check
//!
//! # Simulate a run
//! agentflow feature.yaml --dry-run
//!
//! # Preview what a failing step would take down with it
//! agentflow feature.yaml --dry-run --fail step2a
//! ```

use std::env;
use std::process::ExitCode;

use log::{error, info, warn};

use agentflow::execution::{DryRunRunner, Engine, EngineConfig};
use agentflow::scheduler::TopologicalScheduler;
use agentflow::workflow::{load_workflow_graph, quick_validate, read_workflow, validate_workflow};
use agentflow::{APP_NAME, VERSION};

/// Default maximum parallel steps.
fn default_max_parallel() -> usize {
    num_cpus::get().max(1)
}

/// What the CLI should do with the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Plan,
    Check,
    DryRun,
}

/// Command-line configuration parsed from arguments.
#[derive(Debug)]
struct Config {
    workflow_path: Option<String>,
    mode: Mode,
    fail_steps: Vec<String>,
    max_parallel: usize,
    stop_on_failure: bool,
    verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workflow_path: None,
            mode: Mode::Plan,
            fail_steps: Vec::new(),
            max_parallel: default_max_parallel(),
            stop_on_failure: false,
            verbose: false,
        }
    }
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME, VERSION);
    println!("Dependency-Graph Scheduler for Agent Workflows");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: agentflow [OPTIONS] <WORKFLOW_FILE>");
    println!();
    println!("Arguments:");
    println!("  <WORKFLOW_FILE>     Path to workflow YAML file");
    println!();
    println!("Options:");
    println!("  --plan              Print the execution plan (default)");
    println!("  --check             Report every validation finding");
    println!("  --dry-run           Simulate a run without invoking agents");
    println!("  --fail ID           Make step ID fail during the dry run (repeatable)");
    println!("  --stop-on-failure   Cancel pending steps when a required step fails");
    println!(
        "  --parallel N        Maximum parallel steps (default: {})",
        default_max_parallel()
    );
    println!("  --verbose           Enable debug logging");
    println!("  --help              Show this help message");
    println!("  --version           Show version information");
    println!();
    println!("Examples:");
    println!("  agentflow feature.yaml");
    println!("  agentflow feature.yaml --check");
    println!("  agentflow feature.yaml --dry-run --fail review --parallel 2");
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--plan" => config.mode = Mode::Plan,
            "--check" => config.mode = Mode::Check,
            "--dry-run" => config.mode = Mode::DryRun,
            "--stop-on-failure" => config.stop_on_failure = true,
            "--verbose" | "-v" => config.verbose = true,
            "--fail" => {
                i += 1;
                if i >= args.len() {
                    return Err("--fail requires a step id".to_string());
                }
                config.fail_steps.push(args[i].clone());
            }
            "--parallel" => {
                i += 1;
                if i >= args.len() {
                    return Err("--parallel requires a number argument".to_string());
                }
                config.max_parallel = match args[i].parse::<usize>() {
                    Ok(n) if n > 0 => n,
                    _ => return Err(format!("Invalid parallel value: {}", args[i])),
                };
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                if config.workflow_path.is_some() {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                config.workflow_path = Some(arg.clone());
            }
        }
        i += 1;
    }

    if config.workflow_path.is_none() {
        return Err("Missing <WORKFLOW_FILE> argument".to_string());
    }

    Ok(config)
}

/// Prints the level plan.
fn print_plan(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (_, graph) = load_workflow_graph(path)?;
    println!("{}", TopologicalScheduler::new(&graph).render_plan()?);
    Ok(())
}

/// Prints every finding, then fails if the workflow cannot run.
fn check_workflow(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let workflow = read_workflow(path)?;

    let findings = quick_validate(&workflow);
    if findings.is_empty() {
        println!("No problems found in {} steps", workflow.len());
    } else {
        println!("{} findings:", findings.len());
        for finding in &findings {
            println!("  - {}", finding);
        }
    }
    println!();

    validate_workflow(&workflow)?;
    info!("Workflow '{}' can run", path);
    Ok(())
}

/// Simulates a run with the dry-run runner.
fn simulate(config: &Config, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (workflow, graph) = load_workflow_graph(path)?;

    let mut runner = DryRunRunner::new();
    for id in &config.fail_steps {
        if workflow.get_step(id).is_none() {
            warn!("--fail names unknown step '{}'", id);
        }
        runner = runner.fail_step(id.as_str());
    }

    let engine = Engine::new(graph, runner).with_config(EngineConfig {
        max_parallel: config.max_parallel,
        dry_run: true,
        stop_on_critical_failure: config.stop_on_failure,
    });

    let report = engine.run()?;

    println!("{}", report.timeline.gantt_chart());
    println!("{}", report.summary);

    if !report.succeeded() {
        return Err(format!(
            "Workflow failed: required steps failed: {}",
            report.summary.critical.join(", ")
        )
        .into());
    }

    Ok(())
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    setup_logging(config.verbose);
    print_banner();

    let path = config.workflow_path.clone().unwrap_or_default();

    if !config.fail_steps.is_empty() && config.mode != Mode::DryRun {
        warn!("--fail only applies to --dry-run; ignoring");
    }

    let result = match config.mode {
        Mode::Plan => print_plan(&path),
        Mode::Check => check_workflow(&path),
        Mode::DryRun => {
            info!("Mode: DRY RUN (agents will not be invoked)");
            simulate(&config, &path)
        }
    };

    result.map_err(|e| {
        error!("{}", e);
        e
    })
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
