//! send_alarm - submit one alarm to the remote backend and exit
//!
//! Used when commissioning a site to check credentials and event ids. A
//! successful standard alarm also archives the latest frame from the store.

use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};

use watchpost::{
    store, AlarmCommand, AlarmSubmitter, RemoteAlarmClient, SubmissionOutcome, WatchpostConfig,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Kind {
    Standard,
    Sos,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Send a single watchpost alarm")]
struct Args {
    /// Which configured event to trigger.
    #[arg(long, value_enum, default_value = "standard")]
    kind: Kind,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = WatchpostConfig::load()?;
    let shared = store::connect(&config.store)?;
    let client = RemoteAlarmClient::from_config(&config, shared)?;

    let command = match args.kind {
        Kind::Standard => AlarmCommand::Standard,
        Kind::Sos => AlarmCommand::Sos,
    };
    match client.submit(command) {
        SubmissionOutcome::Triggered { frame } => {
            match frame {
                Some(path) => println!("alarm triggered, frame saved to {}", path.display()),
                None => println!("alarm triggered"),
            }
            Ok(())
        }
        SubmissionOutcome::AlreadyActive => {
            println!("alarm already active");
            Ok(())
        }
        other => Err(anyhow!("alarm not triggered: {:?}", other)),
    }
}
