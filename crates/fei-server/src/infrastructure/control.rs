//! Control-event source: commands typed on stdin.
//!
//! A headless host has no settings screen or notification buttons, so the
//! operator drives the server with one command per line:
//!
//! ```text
//! stop               stop the listener
//! restart            restart on the configured port
//! off                no-op (suppresses any reaction)
//! port <n>           change the configured port (saved to the config file)
//! send <text>        send a chat message through the self-client
//! share <locator>    append a path or URI to the share log
//! import <path>      copy a file into the local files directory
//! unshare <index>    stop sharing the item at <index>
//! refresh            re-scan shares and push a refresh event
//! list               log the current share list
//! status             log the current server state
//! quit               shut down and exit
//! ```
//!
//! [`parse_control_line`] is pure; [`ControlSession::apply`] performs the
//! effect against the controller.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

use fei_core::domain::lifecycle::validate_port;
use fei_core::ServerCommand;

use crate::application::controller::FeiServer;
use crate::infrastructure::notifier::status_text;
use crate::infrastructure::storage::config::{save_config, AppConfig};

/// One parsed control line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    Command(ServerCommand),
    Port(i32),
    Send(String),
    Share(String),
    Import(PathBuf),
    Unshare(usize),
    Refresh,
    List,
    Status,
    Quit,
}

/// Why a control line was not understood.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControlParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
    #[error("'{command}' expects a number, got '{value}'")]
    InvalidNumber { command: &'static str, value: String },
}

/// Parses one control line.  Command words are case-insensitive.
pub fn parse_control_line(line: &str) -> Result<ControlEvent, ControlParseError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let require = |command: &'static str| {
        if rest.is_empty() {
            Err(ControlParseError::MissingArgument(command))
        } else {
            Ok(rest)
        }
    };

    match word.to_ascii_lowercase().as_str() {
        "" => Err(ControlParseError::Empty),
        "stop" => Ok(ControlEvent::Command(ServerCommand::Stop)),
        "restart" => Ok(ControlEvent::Command(ServerCommand::Restart)),
        "off" => Ok(ControlEvent::Command(ServerCommand::Off)),
        "port" => {
            let value = require("port")?;
            value
                .parse::<i32>()
                .map(ControlEvent::Port)
                .map_err(|_| ControlParseError::InvalidNumber {
                    command: "port",
                    value: value.to_string(),
                })
        }
        "send" => Ok(ControlEvent::Send(require("send")?.to_string())),
        "share" => Ok(ControlEvent::Share(require("share")?.to_string())),
        "import" => Ok(ControlEvent::Import(PathBuf::from(require("import")?))),
        "unshare" => {
            let value = require("unshare")?;
            value
                .parse::<usize>()
                .map(ControlEvent::Unshare)
                .map_err(|_| ControlParseError::InvalidNumber {
                    command: "unshare",
                    value: value.to_string(),
                })
        }
        "refresh" => Ok(ControlEvent::Refresh),
        "list" => Ok(ControlEvent::List),
        "status" => Ok(ControlEvent::Status),
        "quit" | "exit" => Ok(ControlEvent::Quit),
        other => Err(ControlParseError::Unknown(other.to_string())),
    }
}

/// Whether the control loop should keep reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Applies control events to a controller and keeps the config in sync.
pub struct ControlSession {
    server: Arc<FeiServer>,
    config: AppConfig,
    config_path: Option<PathBuf>,
}

impl ControlSession {
    /// `config_path` is where port changes are saved; `None` keeps them in
    /// memory only.
    pub fn new(server: Arc<FeiServer>, config: AppConfig, config_path: Option<PathBuf>) -> Self {
        Self {
            server,
            config,
            config_path,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn port(&self) -> i32 {
        i32::from(self.config.server.port)
    }

    pub async fn apply(&mut self, event: ControlEvent) -> Flow {
        match event {
            ControlEvent::Command(command) => {
                self.server.on_receive_event(self.port(), Some(command)).await;
            }
            ControlEvent::Port(port) => {
                if let Some(valid) = validate_port(port) {
                    self.config.server.port = valid;
                    self.persist();
                }
                self.server.on_receive_event(port, None).await;
            }
            ControlEvent::Send(text) => self.server.send_message(&text).await,
            ControlEvent::Share(locator) => {
                let registry = self.server.registry();
                match registry.append(&locator).await {
                    Ok(()) => {
                        registry.invalidate().await;
                    }
                    Err(e) => warn!("cannot share {locator}: {e}"),
                }
            }
            ControlEvent::Import(path) => {
                match self.server.registry().import_file(&path).await {
                    Ok(info) => info!("now sharing {}", info.display_name),
                    Err(e) => warn!("cannot import {}: {e}", path.display()),
                }
            }
            ControlEvent::Unshare(index) => {
                let registry = self.server.registry();
                match registry.get(index) {
                    Some(item) => registry.remove(&item).await,
                    None => warn!("no shared item at index {index}"),
                }
            }
            ControlEvent::Refresh => {
                self.server.registry().invalidate().await;
                self.server.emit_refresh_event();
            }
            ControlEvent::List => {
                let snapshot = self.server.registry().snapshot();
                if snapshot.is_empty() {
                    info!("nothing shared");
                }
                for (index, item) in snapshot.iter().enumerate() {
                    info!("[{index}] {} ({})", item.display_name, item.locator);
                }
            }
            ControlEvent::Status => {
                info!("status: {}", status_text(&self.server.current_state()));
            }
            ControlEvent::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    fn persist(&self) {
        let Some(path) = &self.config_path else {
            return;
        };
        if let Err(e) = save_config(path, &self.config) {
            warn!("cannot save config to {}: {e}", path.display());
        }
    }
}

/// Reads control lines until `quit` or end of input.
pub async fn run_control_loop<R>(reader: R, session: &mut ControlSession)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("control input closed");
                return;
            }
            Err(e) => {
                warn!("cannot read control input: {e}");
                return;
            }
        };

        match parse_control_line(&line) {
            Ok(event) => {
                if session.apply(event).await == Flow::Quit {
                    return;
                }
            }
            Err(ControlParseError::Empty) => {}
            Err(e) => warn!("{e}"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lifecycle_commands() {
        assert_eq!(
            parse_control_line("stop"),
            Ok(ControlEvent::Command(ServerCommand::Stop))
        );
        assert_eq!(
            parse_control_line("  RESTART "),
            Ok(ControlEvent::Command(ServerCommand::Restart))
        );
        assert_eq!(
            parse_control_line("off"),
            Ok(ControlEvent::Command(ServerCommand::Off))
        );
    }

    #[test]
    fn test_parse_port_keeps_out_of_range_values() {
        assert_eq!(parse_control_line("port 9090"), Ok(ControlEvent::Port(9090)));
        assert_eq!(parse_control_line("port 80"), Ok(ControlEvent::Port(80)));
    }

    #[test]
    fn test_parse_port_rejects_garbage() {
        assert_eq!(
            parse_control_line("port eighty"),
            Err(ControlParseError::InvalidNumber {
                command: "port",
                value: "eighty".into()
            })
        );
        assert_eq!(
            parse_control_line("port"),
            Err(ControlParseError::MissingArgument("port"))
        );
    }

    #[test]
    fn test_parse_send_keeps_inner_whitespace() {
        assert_eq!(
            parse_control_line("send hello   there"),
            Ok(ControlEvent::Send("hello   there".into()))
        );
    }

    #[test]
    fn test_parse_share_and_import() {
        assert_eq!(
            parse_control_line("share content://p/1"),
            Ok(ControlEvent::Share("content://p/1".into()))
        );
        assert_eq!(
            parse_control_line("import /tmp/My File.pdf"),
            Ok(ControlEvent::Import(PathBuf::from("/tmp/My File.pdf")))
        );
    }

    #[test]
    fn test_parse_unshare_index() {
        assert_eq!(parse_control_line("unshare 3"), Ok(ControlEvent::Unshare(3)));
        assert!(matches!(
            parse_control_line("unshare -1"),
            Err(ControlParseError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_parse_empty_and_unknown() {
        assert_eq!(parse_control_line("   "), Err(ControlParseError::Empty));
        assert_eq!(
            parse_control_line("reboot now"),
            Err(ControlParseError::Unknown("reboot".into()))
        );
    }

    #[test]
    fn test_parse_quit_aliases() {
        assert_eq!(parse_control_line("quit"), Ok(ControlEvent::Quit));
        assert_eq!(parse_control_line("exit"), Ok(ControlEvent::Quit));
    }
}
