//! CLI command implementations.

use std::path::Path;

use anyhow::{Context, Result, bail};
use engine::io::config::{EngineConfig, load_config, write_config};
use engine::{ExecutionContext, Transport};
use tracing::{debug, info};

use crate::exit_codes;
use crate::report::{exit_code, render_json, render_text, summarize};
use crate::run::run_scenarios;
use crate::suite::Suite;

/// Print every scenario of a suite as its canonical string.
pub fn list(suite_path: &Path) -> Result<i32> {
    let suite = Suite::load(suite_path)?;
    for scenario in &suite.scenarios {
        println!("{scenario}");
    }
    Ok(exit_codes::OK)
}

/// Validate a suite without touching any transport.
pub fn check(suite_path: &Path) -> Result<i32> {
    let suite = Suite::load(suite_path)?;
    match &suite.description {
        Some(description) => println!(
            "ok: {} ({} scenarios): {description}",
            suite.name,
            suite.scenarios.len()
        ),
        None => println!("ok: {} ({} scenarios)", suite.name, suite.scenarios.len()),
    }
    Ok(exit_codes::OK)
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions<'a> {
    pub config: Option<&'a Path>,
    pub transports: Vec<Transport>,
    pub fail_fast: bool,
    pub json: bool,
}

/// Run a suite and print its report. The exit code reflects the verdicts.
pub fn run(suite_path: &Path, options: &RunOptions<'_>) -> Result<i32> {
    let suite = Suite::load(suite_path)?;
    let cfg = resolve_config(options.config)?;
    let scenarios: Vec<_> = suite
        .scenarios
        .iter()
        .copied()
        .filter(|scenario| {
            options.transports.is_empty() || options.transports.contains(&scenario.transport())
        })
        .collect();
    debug!(
        suite = %suite.name,
        selected = scenarios.len(),
        total = suite.scenarios.len(),
        "suite loaded"
    );

    let context = ExecutionContext::from_config(&cfg);
    info!(suite = %suite.name, scenarios = scenarios.len(), "starting run");
    let results = run_scenarios(&scenarios, &context, options.fail_fast);
    let summary = summarize(&suite.name, results);
    if options.json {
        print!("{}", render_json(&summary)?);
    } else {
        print!("{}", render_text(&summary));
    }
    Ok(exit_code(&summary))
}

/// An explicitly named config must exist; otherwise built-in defaults apply.
fn resolve_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            if !path.exists() {
                bail!("config {} not found", path.display());
            }
            load_config(path)
        }
        None => {
            let cfg = EngineConfig::default();
            cfg.validate().context("default config")?;
            Ok(cfg)
        }
    }
}

/// Write the default config, refusing to replace an existing file unless forced.
pub fn init_config(path: &Path, force: bool) -> Result<i32> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &EngineConfig::default())?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}
