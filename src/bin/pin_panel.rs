//! pin_panel - operator control panel
//!
//! Reads keypad input from stdin (`0`-`9`, `*` delete, `#` confirm, or the
//! words `del` / `ok`), drives the control state machine and hosts the
//! dispatch worker that talks to the remote alarm backend.
//!
//! `quit`, end of input or Ctrl-C disarm the system and stop the worker.

use anyhow::Result;
use clap::Parser;
use std::io::BufRead;
use std::sync::{mpsc, Arc};

use watchpost::{
    command_queue, store, ui, ControlPanel, DispatchWorker, Key, RemoteAlarmClient, SecretSet,
    WatchpostConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Watchpost PIN control panel")]
struct Args {
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto")]
    ui: String,
}

enum Input {
    Line(String),
    Quit,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let ui = ui::Ui::from_flag(&args.ui);

    let config = {
        let _stage = ui.stage("Load configuration");
        WatchpostConfig::load()?
    };
    let secrets = {
        let _stage = ui.stage("Load secrets");
        SecretSet::from_settings(&config.secrets)?
    };
    let shared = {
        let _stage = ui.stage("Connect to store");
        store::connect(&config.store)?
    };
    let client = RemoteAlarmClient::from_config(&config, Arc::clone(&shared))?;

    let (commands, queue) = command_queue();
    let worker = DispatchWorker::new(
        queue,
        Arc::clone(&shared),
        Box::new(client),
        config.timing.worker_cadence,
    )
    .spawn()?;

    let indicator = Arc::new(ui::TerminalIndicator::new(&ui));
    let panel = ControlPanel::new(&config, secrets, shared, commands, indicator);

    let (tx, rx) = mpsc::channel();
    let quit_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = quit_tx.send(Input::Quit);
    })
    .expect("error setting Ctrl-C handler");
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(Input::Line(line)).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    log::warn!("stdin read failed: {}", e);
                    break;
                }
            }
        }
        let _ = tx.send(Input::Quit);
    });

    log::info!("pin_panel running. keys: 0-9, * delete, # confirm, quit");
    while let Ok(Input::Line(line)) = rx.recv() {
        if line.trim().eq_ignore_ascii_case("quit") {
            break;
        }
        match Key::parse_line(&line) {
            Ok(keys) => {
                for key in keys {
                    // Confirm resolves on its own thread; the input loop does not wait.
                    let _ = panel.press(key);
                }
            }
            Err(e) => log::warn!("ignored input: {}", e),
        }
    }

    log::info!("shutting down, disarming alarm system");
    panel.shutdown();
    worker.stop()?;
    log::info!("pin_panel stopped");
    Ok(())
}
