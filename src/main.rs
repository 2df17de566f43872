use clap::Parser;
use covgather::cli::{Cli, Commands, execute_partial_command, execute_report_command};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Report(args) => {
            execute_report_command(&args)?;
        }
        Commands::Partial(args) => {
            execute_partial_command(&args)?;
        }
    }

    Ok(())
}
