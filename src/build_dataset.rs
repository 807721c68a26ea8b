use clap::Parser;
use log::{error, info};
use std::process::ExitCode;

use kpt2yolo::utils::create_progress_bar;
use kpt2yolo::{assemble_dataset, Catalog, DatasetArgs};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = DatasetArgs::parse();

    let layout = args.layout();
    if !layout.data_dir.exists() {
        error!(
            "The specified data_dir does not exist: {}",
            layout.data_dir.display()
        );
        return ExitCode::FAILURE;
    }

    let catalog_path = layout.catalog_path(args.metadata.as_deref());
    info!("Loading catalog {}", catalog_path.display());
    let catalog = match Catalog::from_path(&catalog_path) {
        Ok(catalog) => catalog,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("Sequences to sample: {} (train + val)", catalog.targets().count());

    let strategy = args.link_mode.strategy();
    let pb = create_progress_bar(catalog.targets().count() as u64, "Link");

    match assemble_dataset(
        &catalog,
        &layout,
        &args.output_dir,
        args.step,
        strategy.as_ref(),
        &pb,
    ) {
        Ok((stats, yaml_path)) => {
            pb.finish_with_message("Linking complete");
            stats.print_summary(args.step);
            info!("Manifest written to {}", yaml_path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            pb.abandon();
            error!("Failed to assemble dataset: {}", e);
            ExitCode::FAILURE
        }
    }
}
