use clap::Parser;
use log::error;
use std::process::ExitCode;

use kpt2yolo::{prepare_training, TrainArgs};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = TrainArgs::parse();

    let plan = match prepare_training(&args.config, &args.trainer) {
        Ok(plan) => plan,
        Err(e) => {
            error!("Failed to prepare training: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.dry_run {
        println!("{}", plan.command_line());
        return ExitCode::SUCCESS;
    }

    match plan.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
