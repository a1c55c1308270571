//! JSON-lines audit logs
//!
//! Every proxied exchange is appended to four files in the log directory:
//! `requests.log`, `responses.log`, `prompts.log` and `costs.log`. Each line
//! is one JSON object carrying an RFC 3339 `timestamp`.
//!
//! Handlers only encode entries and queue them; a dedicated writer thread
//! owns the files, so disk latency never blocks a runtime worker.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

pub const REQUESTS_FILE: &str = "requests.log";
pub const RESPONSES_FILE: &str = "responses.log";
pub const PROMPTS_FILE: &str = "prompts.log";
pub const COSTS_FILE: &str = "costs.log";

#[derive(Serialize)]
struct RequestEntry<'a> {
    timestamp: String,
    method: &'a str,
    path: &'a str,
    body: &'a Value,
}

#[derive(Serialize)]
struct ResponseEntry<'a> {
    timestamp: String,
    #[serde(rename = "statusCode")]
    status_code: u16,
    body: &'a Value,
}

#[derive(Serialize)]
struct PromptEntry<'a> {
    timestamp: String,
    prompt: &'a str,
}

#[derive(Serialize)]
struct CostEntry<'a> {
    timestamp: String,
    model: &'a str,
    tokens: u64,
    cost: f64,
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[derive(Debug, Clone, Copy)]
enum LogFile {
    Requests,
    Responses,
    Prompts,
    Costs,
}

impl LogFile {
    const ALL: [LogFile; 4] = [
        LogFile::Requests,
        LogFile::Responses,
        LogFile::Prompts,
        LogFile::Costs,
    ];

    fn name(self) -> &'static str {
        match self {
            LogFile::Requests => REQUESTS_FILE,
            LogFile::Responses => RESPONSES_FILE,
            LogFile::Prompts => PROMPTS_FILE,
            LogFile::Costs => COSTS_FILE,
        }
    }
}

enum WriterMessage {
    Line(LogFile, Vec<u8>),
    Flush(oneshot::Sender<()>),
}

/// Owns the open files and applies queued writes in order
struct Writer {
    files: [File; 4],
}

impl Writer {
    fn run(mut self, mut rx: mpsc::UnboundedReceiver<WriterMessage>) {
        while let Some(message) = rx.blocking_recv() {
            match message {
                WriterMessage::Line(log, line) => {
                    if let Err(e) = self.files[log as usize].write_all(&line) {
                        warn!("Failed to write {} entry: {}", log.name(), e);
                    }
                }
                WriterMessage::Flush(done) => {
                    self.sync();
                    let _ = done.send(());
                }
            }
        }
        self.sync();
        debug!("Audit log writer stopped");
    }

    fn sync(&mut self) {
        for (log, file) in LogFile::ALL.iter().zip(self.files.iter_mut()) {
            if let Err(e) = file.flush().and_then(|_| file.sync_data()) {
                warn!("Failed to flush {}: {}", log.name(), e);
            }
        }
    }
}

fn open_log(dir: &Path, log: LogFile) -> Result<File> {
    let path = dir.join(log.name());
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Audit log writer shared by all request handlers
#[derive(Debug)]
pub struct AuditLog {
    tx: mpsc::UnboundedSender<WriterMessage>,
}

impl AuditLog {
    /// Create `dir` if needed, open the four log files and start the writer
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

        let writer = Writer {
            files: [
                open_log(dir, LogFile::Requests)?,
                open_log(dir, LogFile::Responses)?,
                open_log(dir, LogFile::Prompts)?,
                open_log(dir, LogFile::Costs)?,
            ],
        };

        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::Builder::new()
            .name("audit-log".to_string())
            .spawn(move || writer.run(rx))
            .context("Failed to start audit log writer")?;

        Ok(Self { tx })
    }

    fn append<T: Serialize>(&self, log: LogFile, entry: &T) {
        let mut line = match serde_json::to_vec(entry) {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to encode {} entry: {}", log.name(), e);
                return;
            }
        };
        line.push(b'\n');

        if self.tx.send(WriterMessage::Line(log, line)).is_err() {
            warn!("Audit log writer is gone, dropping {} entry", log.name());
        }
    }

    pub fn log_request(&self, method: &str, path: &str, body: &Value) {
        self.append(
            LogFile::Requests,
            &RequestEntry {
                timestamp: now(),
                method,
                path,
                body,
            },
        );
    }

    pub fn log_response(&self, status_code: u16, body: &Value) {
        self.append(
            LogFile::Responses,
            &ResponseEntry {
                timestamp: now(),
                status_code,
                body,
            },
        );
    }

    pub fn log_prompt(&self, prompt: &str) {
        self.append(
            LogFile::Prompts,
            &PromptEntry {
                timestamp: now(),
                prompt,
            },
        );
    }

    pub fn log_cost(&self, model: &str, tokens: u64, cost: f64) {
        self.append(
            LogFile::Costs,
            &CostEntry {
                timestamp: now(),
                model,
                tokens,
                cost,
            },
        );
    }

    /// Wait until every queued entry is written and synced to disk
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(WriterMessage::Flush(done)).is_err() || wait.await.is_err() {
            warn!("Audit log writer is gone, nothing to flush");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn read_lines(dir: &Path, name: &str) -> Vec<Value> {
        fs::read_to_string(dir.join(name))
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_writes_one_json_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditLog::open(dir.path()).unwrap();

        audit.log_request("POST", "/v1/chat/completions", &json!({"model": "gpt-4"}));
        audit.log_request("GET", "/v1/models", &Value::Null);
        audit.log_response(200, &json!({"usage": {"total_tokens": 10}}));
        audit.log_prompt("Say this is a test");
        audit.log_cost("gpt-4", 10, 0.0006);
        audit.flush().await;

        let requests = read_lines(dir.path(), REQUESTS_FILE);
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0]["method"], "POST");
        assert_eq!(requests[0]["path"], "/v1/chat/completions");
        assert_eq!(requests[0]["body"]["model"], "gpt-4");
        assert_eq!(requests[1]["method"], "GET");
        assert!(
            chrono::DateTime::parse_from_rfc3339(requests[0]["timestamp"].as_str().unwrap())
                .is_ok()
        );

        let responses = read_lines(dir.path(), RESPONSES_FILE);
        assert_eq!(responses[0]["statusCode"], 200);

        let prompts = read_lines(dir.path(), PROMPTS_FILE);
        assert_eq!(prompts[0]["prompt"], "Say this is a test");

        let costs = read_lines(dir.path(), COSTS_FILE);
        assert_eq!(costs[0]["model"], "gpt-4");
        assert_eq!(costs[0]["tokens"], 10);
    }

    #[tokio::test]
    async fn test_appends_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        for prompt in ["one", "two"] {
            let audit = AuditLog::open(dir.path()).unwrap();
            audit.log_prompt(prompt);
            audit.flush().await;
        }
        let prompts = read_lines(dir.path(), PROMPTS_FILE);
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[1]["prompt"], "two");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_entries_keep_their_order() {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditLog::open(dir.path()).unwrap();
        for i in 0..500 {
            audit.log_prompt(&format!("prompt {}", i));
        }
        audit.flush().await;
        let prompts = read_lines(dir.path(), PROMPTS_FILE);
        assert_eq!(prompts.len(), 500);
        assert_eq!(prompts[0]["prompt"], "prompt 0");
        assert_eq!(prompts[499]["prompt"], "prompt 499");
    }

    #[test]
    fn test_open_fails_when_directory_is_a_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(AuditLog::open(file.path()).is_err());
    }
}
