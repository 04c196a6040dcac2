//! Signal handling for the evaluation loop.
//!
//! A background thread turns POSIX signals into messages on a channel the
//! main loop drains between cycles: SIGINT/SIGTERM/SIGHUP request a graceful
//! shutdown, SIGUSR2 requests a rule-file reload without restarting the
//! daemon.

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR2},
    iterator::Signals,
};
use std::{
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
    thread,
};

/// Message type for all signal-based communication.
#[derive(Debug, Clone)]
pub enum SignalMessage {
    /// Rule-file reload signal (SIGUSR2)
    Reload,
    /// Shutdown signal (SIGTERM, SIGINT, SIGHUP)
    Shutdown,
}

/// Signal handling state shared between threads.
pub struct SignalState {
    /// Atomic flag indicating if the application should keep running
    pub running: Arc<AtomicBool>,
    /// Channel receiver for signal messages
    pub signal_receiver: std::sync::mpsc::Receiver<SignalMessage>,
}

/// Set up signal handling for the application.
///
/// Returns a SignalState containing the running flag and signal receiver
/// channel. Spawns a background thread that monitors for signals and sends
/// the matching message via the channel.
pub fn setup_signal_handler() -> Result<SignalState> {
    let running = Arc::new(AtomicBool::new(true));
    let (signal_sender, signal_receiver) = std::sync::mpsc::channel::<SignalMessage>();

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP, SIGUSR2])
        .context("failed to register signal handlers")?;

    let running_clone = running.clone();

    thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGUSR2 => {
                    log_pipe!();
                    log_info!("Received rule reload signal");

                    if signal_sender.send(SignalMessage::Reload).is_err() {
                        // Receiver dropped, main thread is exiting
                        break;
                    }
                }
                _ => {
                    let user_message = match sig {
                        SIGINT => "Received interrupt signal, initiating graceful shutdown...",
                        SIGTERM => "Received termination request, initiating graceful shutdown...",
                        SIGHUP => "Received hangup signal, initiating graceful shutdown...",
                        _ => "Received shutdown signal, initiating graceful shutdown...",
                    };

                    log_pipe!();
                    log_info!("{}", user_message);

                    if let Err(e) = signal_sender.send(SignalMessage::Shutdown) {
                        log_pipe!();
                        log_warning!("Failed to send shutdown message: {e}");
                    }

                    running_clone.store(false, Ordering::SeqCst);

                    // Keep the thread alive so repeated Ctrl+C stays quiet
                }
            }
        }
    });

    Ok(SignalState {
        running,
        signal_receiver,
    })
}
