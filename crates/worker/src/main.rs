use std::process::ExitCode;

use clap::Parser;

fn main() -> anyhow::Result<ExitCode> {
    let cli = crm_worker::Cli::parse();
    crm_observability::init_with(cli.log_format(), "info");

    let succeeded = crm_worker::run(cli)?;
    Ok(if succeeded { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
