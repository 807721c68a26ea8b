use clap::Parser;
use log::{error, info};
use std::process::ExitCode;

use kpt2yolo::utils::create_progress_bar;
use kpt2yolo::{convert_catalog, Catalog, CatalogEntry, ConvertArgs};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = ConvertArgs::parse();

    let layout = args.layout();
    if !layout.data_dir.exists() {
        error!(
            "The specified data_dir does not exist: {}",
            layout.data_dir.display()
        );
        return ExitCode::FAILURE;
    }

    if args.workers > 0 {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(args.workers)
            .build_global()
        {
            error!("Failed to configure worker pool: {}", e);
            return ExitCode::FAILURE;
        }
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

    let targets: Vec<&CatalogEntry> = catalog.targets().map(|(entry, _)| entry).collect();
    info!(
        "Converting {} sequences (train + val) of {} catalog rows",
        targets.len(),
        catalog.len()
    );

    let pb = create_progress_bar(targets.len() as u64, "Convert");
    let report = convert_catalog(&targets, &layout, &args.options(), &pb);
    pb.finish_with_message("Conversion complete");

    report.print_summary();
    ExitCode::SUCCESS
}
