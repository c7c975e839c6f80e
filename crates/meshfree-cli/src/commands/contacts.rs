use super::build_scene;
use crate::cli::ContactsArgs;
use crate::config::builder::{Overrides, build_config};
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use meshfree::core::pairs::io::{read_csv, write_csv};
use meshfree::engine::error::EngineError;
use meshfree::engine::progress::ProgressReporter;
use meshfree::workflows;
use tracing::{debug, info};

pub fn run(args: ContactsArgs, threads: Option<usize>) -> Result<()> {
    if args.pairs.as_ref() == Some(&args.output) {
        return Err(CliError::Argument(
            "--pairs and --output must name different files".to_string(),
        ));
    }
    let overrides = Overrides {
        threads,
        set_values: &args.set_values,
        ..Default::default()
    };
    let app = build_config(&args.config, &overrides)?;
    let mut scene = build_scene(&app)?;

    if let Some(path) = &args.pairs {
        info!("Loading existing contacts from {:?}", path);
        let pairs = read_csv(
            &app.contacts.pairs_name,
            path,
            Some((app.contacts.alpha, app.contacts.beta)),
        )?;
        println!("Resuming from {} existing contact(s).", pairs.len());
        scene
            .workspace
            .add_pair_list(scene.system, pairs)
            .map_err(EngineError::from)?;
    }

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    info!("Invoking the contact refresh workflow...");
    let result = workflows::contacts::run(
        &mut scene.workspace,
        scene.system,
        &scene.diameter,
        &app.contacts,
        args.reorder,
        &reporter,
    )?;
    if let Some(permutation) = &result.permutation {
        debug!(?permutation, "Applied spatial permutation (new -> old).");
    }

    let report = result.report;
    println!(
        "Contacts: {} formed, {} engaged, {} disengaged, {} removed, {} active.",
        report.formed, report.engaged, report.disengaged, report.removed, report.active
    );

    if let Some(id) = report.pairs {
        let pairs = scene.workspace.pairs(id).map_err(EngineError::from)?;
        write_csv(pairs, &args.output)?;
        println!("✓ Contacts written to: {}", args.output.display());
    }
    Ok(())
}
