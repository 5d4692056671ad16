use clap::Parser;

mod commands;
mod tty;

use commands::{config, deploy, doctor, migration, status, GlobalArgs};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "deckhand")]
#[command(version = VERSION)]
#[command(about = "CLI for building, pushing, and deploying container images to EKS")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Build, push, and roll out the configured image
    Deploy(deploy::DeployArgs),
    /// Check tools, configuration, and manifest
    Doctor(doctor::DoctorArgs),
    /// Show pod and service status for the deployed workload
    Status(status::StatusArgs),
    /// Manage deckhand configuration
    Config(config::ConfigArgs),
    /// Scaffold database migration revision files
    Migration(migration::MigrationArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let global = GlobalArgs {};

    let (json_result, exit_code) = commands::run_json(cli.command, &global);

    if let Err(err) = deckhand::output::print_json_result(json_result) {
        eprintln!("deckhand: failed to write response: {}", err);
        return std::process::ExitCode::from(1);
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
