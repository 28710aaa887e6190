//! Signal handling and graceful shutdown support
//!
//! SIGINT and SIGTERM (and SIGHUP/SIGQUIT on unix) stop the job: the source
//! stops reading, in-flight rows drain to the sink, the sink is flushed.
//!
//! ```rust,no_run
//! use cdcflow::cdcflow::server::shutdown::ShutdownCoordinator;
//!
//! # async fn example() {
//! let coordinator = ShutdownCoordinator::new();
//! let waiter = coordinator.clone();
//! tokio::spawn(async move { waiter.wait_for_signal().await });
//!
//! let mut rx = coordinator.subscribe();
//! // ... run the job until `rx.recv()` fires ...
//! # let _ = rx.recv().await;
//! # }
//! ```

use log::{error, info, warn};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;

/// Why the job is stopping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGINT - User interrupt (Ctrl+C)
    Interrupt,
    /// SIGTERM - Termination request (kill, Kubernetes, Docker)
    Terminate,
    /// SIGHUP - Terminal hangup
    Hangup,
    /// SIGQUIT - Quit (Ctrl+\)
    Quit,
    /// Stop requested by the process itself (a failed stage, a test)
    Requested,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Interrupt => write!(f, "SIGINT (Ctrl+C)"),
            ShutdownSignal::Terminate => write!(f, "SIGTERM"),
            ShutdownSignal::Hangup => write!(f, "SIGHUP"),
            ShutdownSignal::Quit => write!(f, "SIGQUIT"),
            ShutdownSignal::Requested => write!(f, "shutdown request"),
        }
    }
}

/// Wait for any shutdown signal (SIGINT, SIGTERM, SIGHUP, SIGQUIT)
///
/// Falls back to Ctrl+C alone when the unix handlers cannot be installed.
#[cfg(unix)]
pub async fn shutdown_signal() -> ShutdownSignal {
    use tokio::signal::unix::{SignalKind, signal};

    let handlers = (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
        signal(SignalKind::hangup()),
        signal(SignalKind::quit()),
    );

    match handlers {
        (Ok(mut sigterm), Ok(mut sigint), Ok(mut sighup), Ok(mut sigquit)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM - initiating graceful shutdown");
                    ShutdownSignal::Terminate
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT (Ctrl+C) - initiating graceful shutdown");
                    ShutdownSignal::Interrupt
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP - initiating graceful shutdown");
                    ShutdownSignal::Hangup
                }
                _ = sigquit.recv() => {
                    info!("Received SIGQUIT - initiating graceful shutdown");
                    ShutdownSignal::Quit
                }
            }
        }
        _ => {
            error!("Failed to install unix signal handlers, listening for Ctrl+C only");
            ctrl_c().await
        }
    }
}

#[cfg(not(unix))]
pub async fn shutdown_signal() -> ShutdownSignal {
    ctrl_c().await
}

async fn ctrl_c() -> ShutdownSignal {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C - initiating graceful shutdown"),
        Err(e) => error!("Failed to listen for Ctrl+C ({}), shutting down", e),
    }
    ShutdownSignal::Interrupt
}

/// Broadcasts a single shutdown notification to every pipeline stage
#[derive(Clone)]
pub struct ShutdownCoordinator {
    sender: broadcast::Sender<ShutdownSignal>,
    triggered: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            sender,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a receiver that will be notified when shutdown is triggered
    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownSignal> {
        self.sender.subscribe()
    }

    /// Trigger a shutdown with the given signal
    pub fn trigger(&self, signal: ShutdownSignal) {
        self.triggered.store(true, Ordering::SeqCst);
        if let Err(e) = self.sender.send(signal) {
            warn!("No shutdown listeners registered: {:?}", e);
        }
    }

    /// True once any shutdown was triggered, even before a receiver subscribed
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Wait for an OS signal and broadcast it
    pub async fn wait_for_signal(&self) {
        let signal = shutdown_signal().await;
        self.trigger(signal);
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for graceful shutdown behavior
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// How long the job may take to drain and flush after a signal
    pub timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

impl ShutdownConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_signal_display() {
        assert_eq!(format!("{}", ShutdownSignal::Interrupt), "SIGINT (Ctrl+C)");
        assert_eq!(format!("{}", ShutdownSignal::Terminate), "SIGTERM");
        assert_eq!(format!("{}", ShutdownSignal::Requested), "shutdown request");
    }

    #[test]
    fn test_shutdown_config_default() {
        assert_eq!(ShutdownConfig::default().timeout, Duration::from_secs(30));
        assert_eq!(
            ShutdownConfig::with_timeout(Duration::from_secs(5)).timeout,
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_trigger_without_listeners_is_remembered() {
        let coordinator = ShutdownCoordinator::new();
        assert!(!coordinator.is_triggered());
        coordinator.trigger(ShutdownSignal::Requested);
        assert!(coordinator.is_triggered());
    }

    #[tokio::test]
    async fn test_shutdown_coordinator() {
        let coordinator = ShutdownCoordinator::new();
        let mut rx = coordinator.subscribe();

        let coord = coordinator.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            coord.trigger(ShutdownSignal::Terminate);
        });

        let signal = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("Timeout waiting for signal")
            .expect("Channel closed");

        assert_eq!(signal, ShutdownSignal::Terminate);
    }
}
