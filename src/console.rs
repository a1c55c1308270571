//! Interactive console
//!
//! Line-based commands read from stdin while the server runs.

use crate::core::stats::Stats;
use std::io::BufRead;
use std::sync::Arc;
use tokio::sync::{Notify, mpsc};
use tracing::{debug, warn};

const USAGE: &str = "Unknown command. Available commands: r/reset, s/status, c/clear, q/quit";

/// ANSI sequence clearing the terminal and homing the cursor
const CLEAR_SCREEN: &str = "\x1B[2J\x1B[H";

/// What the console should do after a command
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleAction {
    /// Keep reading, printing the message if there is one
    Continue(Option<String>),
    Clear,
    Quit,
}

/// Execute one console command
pub fn handle_command(stats: &Stats, input: &str) -> ConsoleAction {
    match input.trim().to_lowercase().as_str() {
        "" => ConsoleAction::Continue(None),
        "r" | "reset" => {
            stats.reset();
            ConsoleAction::Continue(Some("Counters reset.".to_string()))
        }
        "s" | "status" => ConsoleAction::Continue(Some(stats.snapshot().to_string())),
        "c" | "clear" => ConsoleAction::Clear,
        "q" | "quit" => ConsoleAction::Quit,
        _ => ConsoleAction::Continue(Some(USAGE.to_string())),
    }
}

/// Read stdin lines on a dedicated thread
///
/// A plain thread is used so a pending read never holds up runtime
/// shutdown. The channel closes at end of input.
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    warn!("Console read failed: {}", e);
                    return;
                }
            }
        }
    });
    rx
}

/// Execute commands until quit or end of input
///
/// `quit` notifies `shutdown`; end of input just stops the console.
pub async fn run_console(
    mut lines: mpsc::Receiver<String>,
    stats: Arc<Stats>,
    shutdown: Arc<Notify>,
) {
    while let Some(line) = lines.recv().await {
        match handle_command(&stats, &line) {
            ConsoleAction::Continue(Some(output)) => println!("{}", output),
            ConsoleAction::Continue(None) => {}
            ConsoleAction::Clear => print!("{}", CLEAR_SCREEN),
            ConsoleAction::Quit => {
                println!("Goodbye!");
                shutdown.notify_one();
                return;
            }
        }
    }
    debug!("Console input closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn feed(lines: &[&str]) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(lines.len().max(1));
        for line in lines {
            tx.try_send(line.to_string()).unwrap();
        }
        rx
    }

    #[test]
    fn test_commands() {
        let stats = Stats::new();
        stats.record_request();
        stats.add_tokens(50);

        assert_eq!(
            handle_command(&stats, "s"),
            ConsoleAction::Continue(Some("Tokens: 50 | Requests: 1 | Cost: $0.0000".to_string()))
        );
        assert_eq!(
            handle_command(&stats, " RESET "),
            ConsoleAction::Continue(Some("Counters reset.".to_string()))
        );
        assert_eq!(stats.snapshot().requests, 0);
        assert_eq!(handle_command(&stats, "c"), ConsoleAction::Clear);
        assert_eq!(handle_command(&stats, "quit"), ConsoleAction::Quit);
        assert_eq!(handle_command(&stats, ""), ConsoleAction::Continue(None));
        assert_eq!(
            handle_command(&stats, "x"),
            ConsoleAction::Continue(Some(USAGE.to_string()))
        );
    }

    #[tokio::test]
    async fn test_quit_requests_shutdown() {
        let stats = Arc::new(Stats::new());
        stats.add_tokens(7);
        let shutdown = Arc::new(Notify::new());

        run_console(feed(&["r", "q", "r"]), stats.clone(), shutdown.clone()).await;

        tokio::time::timeout(Duration::from_secs(1), shutdown.notified())
            .await
            .expect("shutdown was not requested");
        assert_eq!(stats.snapshot().tokens, 0);
    }

    #[tokio::test]
    async fn test_end_of_input_does_not_shut_down() {
        let stats = Arc::new(Stats::new());
        let shutdown = Arc::new(Notify::new());

        run_console(feed(&["s"]), stats, shutdown.clone()).await;

        let notified = tokio::time::timeout(Duration::from_millis(50), shutdown.notified()).await;
        assert!(notified.is_err());
    }
}
