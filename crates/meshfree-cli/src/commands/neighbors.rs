use super::build_scene;
use crate::cli::NeighborsArgs;
use crate::config::builder::{Overrides, build_config};
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use meshfree::engine::progress::ProgressReporter;
use meshfree::engine::tasks::neighbors::NeighborCensus;
use meshfree::workflows;
use std::path::Path;
use tracing::info;

pub fn run(args: NeighborsArgs, threads: Option<usize>) -> Result<()> {
    let overrides = Overrides {
        threads,
        radius: args.radius,
        verify: args.verify,
        set_values: &args.set_values,
    };
    let app = build_config(&args.config, &overrides)?;
    let mut scene = build_scene(&app)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    info!("Invoking the neighbor census workflow...");
    let census = workflows::neighbors::run(
        &mut scene.workspace,
        scene.system,
        &app.solver,
        &app.neighbors,
        &reporter,
    )?;

    println!(
        "Neighbor census of {} particle(s) within radius {}: min {}, max {}, mean {:.3}",
        census.counts.len(),
        app.neighbors.radius,
        census.min(),
        census.max(),
        census.mean()
    );
    if app.neighbors.verify {
        println!("✓ Grid counts match the all-pairs scan.");
    }

    if let Some(output) = &args.output {
        write_counts(output, &census)?;
        println!("Counts written to: {}", output.display());
    }
    Ok(())
}

fn write_counts(path: &Path, census: &NeighborCensus) -> Result<()> {
    let csv_error = |e: csv::Error| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    writer
        .write_record(["particle", "neighbors"])
        .map_err(csv_error)?;
    for (particle, count) in census.counts.iter().enumerate() {
        writer
            .write_record([particle.to_string(), count.to_string()])
            .map_err(csv_error)?;
    }
    writer.flush()?;
    Ok(())
}
