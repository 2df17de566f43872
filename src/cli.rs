pub mod commands;

pub use commands::{
    Cli, Commands, GatherArgs, execute_partial_command, execute_report_command,
};
