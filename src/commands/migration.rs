use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::Path;

use deckhand::config;
use deckhand::migration;

use super::CmdResult;

#[derive(Args)]
pub struct MigrationArgs {
    #[command(subcommand)]
    command: MigrationCommand,
}

#[derive(Subcommand)]
enum MigrationCommand {
    /// Scaffold a new revision file chained onto the current head
    New {
        /// Revision title (becomes the file name slug)
        title: String,

        /// Branch label for the revision (repeatable)
        #[arg(long = "branch-label")]
        branch_labels: Vec<String>,

        /// Revision this one depends on (repeatable)
        #[arg(long = "depends-on")]
        depends_on: Vec<String>,
    },
}

#[derive(Serialize)]
pub struct MigrationOutput {
    pub command: &'static str,
    pub revision: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub down_revision: Option<String>,
    pub path: String,
}

pub fn run(args: MigrationArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<MigrationOutput> {
    match args.command {
        MigrationCommand::New {
            title,
            branch_labels,
            depends_on,
        } => {
            let cfg = config::load();
            let dir = cfg.migrations.versions_dir_expanded();

            let created =
                migration::new_revision(Path::new(&dir), &title, &branch_labels, &depends_on)?;

            deckhand::log_status!("migration", "Created {}", created.path.display());

            Ok((
                MigrationOutput {
                    command: "migration.new",
                    revision: created.revision,
                    down_revision: created.down_revision,
                    path: created.path.display().to_string(),
                },
                0,
            ))
        }
    }
}
