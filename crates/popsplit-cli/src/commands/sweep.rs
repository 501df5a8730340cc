use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use popsplit_algo::{
    save_sweep_result, sweep_lambda, PartitionSolver, SweepResult, SweepStatus, TracingObserver,
};
use popsplit_cli::SweepArgs;
use popsplit_core::{PopsplitConfig, SweepConfig};
use tabwriter::TabWriter;
use tracing::info;

use crate::commands::util::load_graph;

fn apply_overrides(args: &SweepArgs, mut config: SweepConfig) -> SweepConfig {
    if let Some(step) = args.lambda_step {
        config.lambda_step = step;
    }
    if let Some(max) = args.lambda_max {
        config.lambda_max = max;
    }
    if let Some(target) = args.target_fraction {
        config.target_fraction = target;
    }
    if args.warm_start {
        config.warm_start = true;
    }
    if let Some(workers) = args.max_workers {
        config.max_workers = workers;
    }
    if let Some(iterations) = args.max_iterations {
        config.max_iterations = iterations;
    }
    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    config
}

fn print_table(result: &SweepResult) -> Result<()> {
    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "LAMBDA\tMU\tFRACTION\tUNITS\tPARTS\tITERATIONS\tCONVERGED")?;
    for entry in result.results.values() {
        let partition = &entry.search.result;
        writeln!(
            writer,
            "{:.2}\t{:.6}\t{:.4}\t{}\t{}\t{}\t{}",
            entry.lambda,
            partition.mu,
            partition.population_fraction,
            partition.num_selected(),
            partition.num_components,
            entry.search.iterations,
            if entry.converged() { "yes" } else { "no" }
        )?;
    }
    for failure in &result.failures {
        writeln!(writer, "{:.2}\t-\t-\t-\t-\t-\tfailed: {}", failure.lambda, failure.error)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn handle(args: &SweepArgs, config: PopsplitConfig) -> Result<()> {
    let sweep_config = apply_overrides(args, config.sweep);
    let (_, attrs) = load_graph(&args.units, &config.geometry)?;
    let solver = PartitionSolver::from_kind(sweep_config.backend);
    info!(
        backend = solver.backend_name(),
        lambdas = sweep_config.lambda_values().len(),
        "starting sweep"
    );

    let result = sweep_lambda(&solver, &attrs, None, &sweep_config, &TracingObserver)
        .context("tension sweep aborted")?;
    save_sweep_result(&result, &args.out)
        .with_context(|| format!("writing sweep to {}", args.out.display()))?;

    print_table(&result)?;
    let status = result.status();
    println!(
        "Sweep {}: {} iterations in {:.2}s, written to {}",
        status.label(),
        result.total_iterations,
        result.total_elapsed_seconds,
        args.out.display()
    );

    match status {
        SweepStatus::FullyConverged => Ok(()),
        _ if args.skip_failures => Ok(()),
        SweepStatus::PartiallyConverged { flagged, failed } => bail!(
            "{} λ value(s) did not converge and {} failed; rerun with --skip-failures to accept",
            flagged.len(),
            failed.len()
        ),
        SweepStatus::Aborted { reason } => bail!("sweep aborted: {reason}"),
    }
}
