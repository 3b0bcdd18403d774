use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use formula::{Context, Engine, EngineOptions, Value, render_error};
use miette::{IntoDiagnostic, Result, WrapErr, miette};
use tracing::debug;

/// Formula - evaluate sandboxed business formulas
#[derive(Parser, Debug)]
#[command(name = "formula")]
#[command(about = "Evaluate or validate Formula scripts", long_about = None)]
struct Args {
    /// Bind NAME to the result of evaluating EXPR (repeatable)
    #[arg(long = "var", value_name = "NAME=EXPR")]
    vars: Vec<String>,

    /// Disable the wall-clock budget
    #[arg(long, conflicts_with = "max_time")]
    no_time_limit: bool,

    /// Wall-clock budget in seconds
    #[arg(long, value_name = "SECS")]
    max_time: Option<f64>,

    /// Reject assignment statements
    #[arg(long)]
    read_only: bool,

    /// Only check that the script parses
    #[arg(long)]
    validate: bool,

    /// Print the output of print_message after the result
    #[arg(long)]
    log: bool,

    /// Read the script from a file
    #[arg(short = 'f', long = "file", conflicts_with = "script")]
    file: Option<PathBuf>,

    /// Script to evaluate (if not provided, reads from stdin)
    script: Option<String>,
}

fn read_script(args: &Args) -> Result<String> {
    if let Some(script) = &args.script {
        return Ok(script.clone());
    }
    if let Some(path) = &args.file {
        return std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to read {}", path.display()));
    }
    let mut script = String::new();
    std::io::stdin()
        .read_to_string(&mut script)
        .into_diagnostic()
        .wrap_err("failed to read script from stdin")?;
    Ok(script)
}

fn build_engine(args: &Args) -> Result<Engine> {
    let mut options = EngineOptions::default();
    if args.no_time_limit {
        options.execution.check_time = false;
    }
    if let Some(secs) = args.max_time {
        options.execution.max_time = Duration::try_from_secs_f64(secs)
            .map_err(|_| miette!("--max-time must be a non-negative number of seconds"))?;
    }
    options.execution.allow_assign = !args.read_only;
    Ok(Engine::new(options))
}

/// Evaluate each `--var` in order. Later expressions see earlier names.
fn bind_vars(engine: &Engine, vars: &[String]) -> Result<Vec<(String, Value)>> {
    let mut names: Vec<(String, Value)> = Vec::with_capacity(vars.len());
    for var in vars {
        let (name, expr) = var
            .split_once('=')
            .ok_or_else(|| miette!("--var expects NAME=EXPR, got '{var}'"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(miette!("--var expects NAME=EXPR, got '{var}'"));
        }
        let bound: Vec<(&str, Value)> = names
            .iter()
            .map(|(n, v)| (n.as_str(), v.clone()))
            .collect();
        let value = engine.evaluate(expr, &bound).map_err(|e| {
            render_error(&e, expr);
            miette!("could not evaluate --var {name}")
        })?;
        debug!(name, value = %value.repr(), "Bound variable");
        names.retain(|(n, _)| n != name);
        names.push((name.to_string(), value));
    }
    Ok(names)
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging subscriber
    use tracing_subscriber::{EnvFilter, fmt};

    // Use RUST_LOG to control the log level. Default to WARN if not set.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn"))
        .into_diagnostic()?;

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let script = read_script(&args)?;
    let engine = build_engine(&args)?;

    if args.validate {
        if let Err(e) = engine.parse(&script) {
            render_error(&e, &script);
            std::process::exit(1);
        }
        println!("valid");
        return Ok(());
    }

    let names = bind_vars(&engine, &args.vars)?;
    let names: Vec<(&str, Value)> = names
        .iter()
        .map(|(n, v)| (n.as_str(), v.clone()))
        .collect();

    let outcome = if args.log {
        engine.evaluate_with_log(&script, &names, Context::with_log())
    } else {
        engine
            .evaluate(&script, &names)
            .map(|value| (value, String::new()))
    };

    match outcome {
        Ok((value, log)) => {
            println!("{}", value.repr());
            if args.log && !log.is_empty() {
                print!("{log}");
            }
            Ok(())
        }
        Err(e) => {
            render_error(&e, &script);
            std::process::exit(1);
        }
    }
}
