mod cli;
mod paths;
mod run;
mod settings;
mod sources;

use anyhow::Result;
use cli::{Command, ConfigArgs, RunArgs};
use settings::Settings;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Config(args)) => handle_config_command(&cli.run, args),
        None => run::run(cli.run),
    }
}

fn handle_config_command(run_args: &RunArgs, args: ConfigArgs) -> Result<()> {
    let settings = Settings::resolve(run_args)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&settings.config)?);
    } else {
        print!("{}", settings.config.to_toml_string()?);
    }
    Ok(())
}
