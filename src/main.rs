use autofiler::cli::{Cli, run_cli};
use autofiler::logging::{self, LogConfig};
use autofiler::output::OutputFormatter;
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_config = LogConfig::new(cli.verbose, cli.log_dir.clone());
    if let Err(e) = logging::init(&log_config) {
        // Console output still works without the file sink.
        OutputFormatter::warning(&format!("Logging disabled: {}", e));
    }

    match run_cli(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            OutputFormatter::error(&e);
            ExitCode::FAILURE
        }
    }
}
