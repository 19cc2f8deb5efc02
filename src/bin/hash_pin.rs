//! hash_pin - produce an argon2 PHC string for a panel secret
//!
//! The output goes into `secrets.arm_toggle`, `secrets.sos` or
//! `secrets.resize` of the watchpost configuration.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::BufRead;
use zeroize::Zeroizing;

use watchpost::panel::{hash_secret, MAX_PIN_DIGITS};

#[derive(Parser, Debug)]
#[command(author, version, about = "Hash a watchpost panel PIN")]
struct Args {
    /// PIN to hash. Read from stdin when omitted.
    pin: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let pin = Zeroizing::new(match args.pin {
        Some(pin) => pin,
        None => {
            let mut line = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .context("read PIN from stdin")?;
            line.trim().to_string()
        }
    });
    validate_pin(&pin)?;

    println!("{}", hash_secret(&pin)?);
    Ok(())
}

fn validate_pin(pin: &str) -> Result<()> {
    if pin.is_empty() || pin.len() > MAX_PIN_DIGITS || !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(anyhow!(
            "PIN must be 1 to {} digits; longer entries cannot be typed on the panel",
            MAX_PIN_DIGITS
        ));
    }
    Ok(())
}
