//! One-shot commands against the configured thermostats
//!
//! Prints a JSON object keyed by host with each thermostat's result.

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::process::ExitCode;
use std::sync::Arc;
use thermolog::{
    device::{session::DeviceCommand, DeviceSession, HttpDeviceConnector},
    logging::{init_logging, LogConfig},
    DeviceArgs, DeviceSettings, Result,
};

#[derive(Parser, Debug)]
#[command(name = "thermolog-cli")]
#[command(about = "Query or command thermostats")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(flatten)]
    device: DeviceArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Print the decoded status
    Status,
    /// Switch away mode
    Away { state: Toggle },
    /// Lock or unlock the keypad
    Keylock { state: Toggle },
    /// Set the target temperature until the next comfort level
    Temperature { value: f64 },
    /// Hold a target temperature for some hours
    Hold { value: f64, hours: u32 },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Toggle {
    On,
    Off,
}

impl From<Toggle> for bool {
    fn from(toggle: Toggle) -> Self {
        matches!(toggle, Toggle::On)
    }
}

impl From<Command> for DeviceCommand {
    fn from(command: Command) -> Self {
        match command {
            Command::Status => DeviceCommand::Status,
            Command::Away { state } => DeviceCommand::Away(state.into()),
            Command::Keylock { state } => DeviceCommand::Keylock(state.into()),
            Command::Temperature { value } => DeviceCommand::Temperature(value),
            Command::Hold { value, hours } => DeviceCommand::Hold { value, hours },
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
    };

    let Some(command) = cli.command else {
        let _ = Cli::command().print_help();
        return ExitCode::SUCCESS;
    };

    match run(&cli.device, command.into()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("thermolog-cli: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn run(args: &DeviceArgs, command: DeviceCommand) -> Result<()> {
    let settings = DeviceSettings::resolve(args)?;
    let _guard = init_logging(&LogConfig::default())?;

    let connector = HttpDeviceConnector::new(settings.device_timeout)?;
    let session = DeviceSession::new(
        Arc::new(connector),
        settings.credential.clone(),
        settings.device_timeout,
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let results = runtime.block_on(session.execute_all(&settings.hosts, command));

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
