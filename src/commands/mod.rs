pub type CmdResult<T> = deckhand::Result<(T, i32)>;

pub(crate) struct GlobalArgs {}

pub mod config;
pub mod deploy;
pub mod doctor;
pub mod migration;
pub mod status;

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        deckhand::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (deckhand::Result<serde_json::Value>, i32) {
    crate::tty::status("deckhand is working...");

    match command {
        crate::Commands::Deploy(args) => dispatch!(args, global, deploy),
        crate::Commands::Doctor(args) => dispatch!(args, global, doctor),
        crate::Commands::Status(args) => dispatch!(args, global, status),
        crate::Commands::Config(args) => dispatch!(args, global, config),
        crate::Commands::Migration(args) => dispatch!(args, global, migration),
    }
}
