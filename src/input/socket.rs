use crate::overlay::OverlayEvent;
use crate::presenter::service::{ServiceInput, ServiceStatus};
use crate::relay::{ControlAction, ControlCommand, Delivery, RelaySender};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot, Mutex};

const START_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum SocketError {
    #[error("Failed to create socket: {0}")]
    CreateError(#[from] std::io::Error),
    #[error("Failed to parse command: {0}")]
    ParseError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Status,
    Toggle,
    Control(ControlAction),
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, SocketError> {
        let line = line.trim();
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some("start"), None, None) => Ok(Command::Start),
            (Some("stop"), None, None) => Ok(Command::Stop),
            (Some("status"), None, None) => Ok(Command::Status),
            (Some("toggle"), None, None) => Ok(Command::Toggle),
            (Some("control"), Some(action), None) => action
                .parse()
                .map(Command::Control)
                .map_err(|e| SocketError::ParseError(format!("{}", e))),
            _ => Err(SocketError::ParseError(format!("Unknown command: {}", line))),
        }
    }

    pub fn to_line(&self) -> String {
        match self {
            Command::Start => "start".to_string(),
            Command::Stop => "stop".to_string(),
            Command::Status => "status".to_string(),
            Command::Toggle => "toggle".to_string(),
            Command::Control(action) => format!("control {}", action),
        }
    }
}

/// Control socket the `island` CLI talks to.
pub struct SocketServer {
    path: PathBuf,
    service_tx: std::sync::mpsc::Sender<ServiceInput>,
    commands: RelaySender<ControlCommand>,
    current_status: Arc<Mutex<ServiceStatus>>,
}

impl SocketServer {
    pub fn new(
        service_tx: std::sync::mpsc::Sender<ServiceInput>,
        commands: RelaySender<ControlCommand>,
        mut status_rx: mpsc::Receiver<ServiceStatus>,
    ) -> Result<Self, SocketError> {
        let path = Self::socket_path()?;
        let current_status = Arc::new(Mutex::new(ServiceStatus::default()));

        let status_clone = current_status.clone();
        tokio::spawn(async move {
            while let Some(status) = status_rx.recv().await {
                *status_clone.lock().await = status;
            }
        });

        Ok(Self {
            path,
            service_tx,
            commands,
            current_status,
        })
    }

    pub fn socket_path() -> Result<PathBuf, std::io::Error> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not find cache directory"
            ))?;

        let island_dir = cache_dir.join("island");
        std::fs::create_dir_all(&island_dir)?;

        Ok(island_dir.join("island.sock"))
    }

    pub async fn listen(&mut self) -> Result<(), SocketError> {
        if self.path.exists() {
            let _ = std::fs::remove_file(&self.path);
        }

        let listener = UnixListener::bind(&self.path)?;
        tracing::info!("Listening on socket: {:?}", self.path);

        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let service_tx = self.service_tx.clone();
                    let commands = self.commands.clone();
                    let current_status = self.current_status.clone();
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_client(stream, service_tx, commands, current_status).await {
                            tracing::warn!("Client error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                }
            }
        }
    }

    async fn handle_client(
        mut stream: UnixStream,
        service_tx: std::sync::mpsc::Sender<ServiceInput>,
        commands: RelaySender<ControlCommand>,
        current_status: Arc<Mutex<ServiceStatus>>,
    ) -> Result<(), SocketError> {
        let (read_half, mut write_half) = stream.split();
        let mut reader = BufReader::new(read_half);
        let mut line = String::new();

        reader.read_line(&mut line).await?;
        let response = match Command::parse(&line) {
            Ok(command) => Self::execute(command, &service_tx, &commands, &current_status).await,
            Err(e) => format!("error: {}", e),
        };

        write_half.write_all(response.as_bytes()).await?;
        write_half.write_all(b"\n").await?;
        Ok(())
    }

    async fn execute(
        command: Command,
        service_tx: &std::sync::mpsc::Sender<ServiceInput>,
        commands: &RelaySender<ControlCommand>,
        current_status: &Mutex<ServiceStatus>,
    ) -> String {
        const PRESENTER_GONE: &str = "error: presenter is not running";

        match command {
            Command::Start => {
                let (reply_tx, reply_rx) = oneshot::channel();
                if service_tx.send(ServiceInput::Start(Some(reply_tx))).is_err() {
                    return PRESENTER_GONE.to_string();
                }
                match tokio::time::timeout(START_TIMEOUT, reply_rx).await {
                    Ok(Ok(outcome)) => format!("ok {}", outcome),
                    Ok(Err(_)) => PRESENTER_GONE.to_string(),
                    Err(_) => "error: presenter did not answer".to_string(),
                }
            }
            Command::Stop => match service_tx.send(ServiceInput::Stop) {
                Ok(()) => "ok".to_string(),
                Err(_) => PRESENTER_GONE.to_string(),
            },
            Command::Toggle => match service_tx.send(ServiceInput::Overlay(OverlayEvent::TapPill)) {
                Ok(()) => "ok".to_string(),
                Err(_) => PRESENTER_GONE.to_string(),
            },
            Command::Status => current_status.lock().await.to_string(),
            Command::Control(action) => match commands.send(ControlCommand::new(action)) {
                Ok(Delivery::Sent) => "ok".to_string(),
                Ok(Delivery::Dropped) => "error: notification observer is not running".to_string(),
                Err(rejected) => format!("error: {}", rejected.error),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presenter::service::StartOutcome;
    use crate::relay;

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("start\n").unwrap(), Command::Start);
        assert_eq!(Command::parse(" status ").unwrap(), Command::Status);
        assert_eq!(
            Command::parse("control PLAY_PAUSE").unwrap(),
            Command::Control(ControlAction::PlayPause)
        );
        assert!(Command::parse("control SHUFFLE").is_err());
        assert!(Command::parse("start now").is_err());
        assert!(Command::parse("").is_err());
    }

    #[test]
    fn lines_round_trip_through_parse() {
        for command in [
            Command::Start,
            Command::Stop,
            Command::Status,
            Command::Toggle,
            Command::Control(ControlAction::Prev),
        ] {
            assert_eq!(Command::parse(&command.to_line()).unwrap(), command);
        }
    }

    async fn request(
        line: &str,
        service_tx: std::sync::mpsc::Sender<ServiceInput>,
        commands: RelaySender<ControlCommand>,
        status: ServiceStatus,
    ) -> String {
        let (server, mut client) = UnixStream::pair().unwrap();
        let current_status = Arc::new(Mutex::new(status));
        let handler = tokio::spawn(SocketServer::handle_client(server, service_tx, commands, current_status));

        client.write_all(line.as_bytes()).await.unwrap();
        let mut response = String::new();
        BufReader::new(client).read_line(&mut response).await.unwrap();
        handler.await.unwrap().unwrap();
        response.trim().to_string()
    }

    #[tokio::test]
    async fn status_reports_latest_snapshot() {
        let (service_tx, _service_rx) = std::sync::mpsc::channel();
        let (commands, _command_rx) = relay::channel(64);
        let status = ServiceStatus {
            running: true,
            title: "Song A".to_string(),
            ..ServiceStatus::default()
        };

        let response = request("status\n", service_tx, commands, status).await;

        assert!(response.starts_with("running"));
        assert!(response.contains("\"Song A\""));
    }

    #[tokio::test]
    async fn control_goes_straight_to_observer() {
        let (service_tx, service_rx) = std::sync::mpsc::channel();
        let (commands, command_rx) = relay::channel(64);

        let response = request("control NEXT\n", service_tx, commands, ServiceStatus::default()).await;

        assert_eq!(response, "ok");
        assert_eq!(command_rx.try_recv().unwrap().action, ControlAction::Next);
        assert!(service_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn control_without_observer_is_reported() {
        let (service_tx, _service_rx) = std::sync::mpsc::channel();
        let (commands, command_rx) = relay::channel(64);
        drop(command_rx);

        let response = request("control PREV\n", service_tx, commands, ServiceStatus::default()).await;

        assert!(response.starts_with("error"));
    }

    #[tokio::test]
    async fn start_waits_for_presenter_outcome() {
        let (service_tx, service_rx) = std::sync::mpsc::channel::<ServiceInput>();
        let (commands, _command_rx) = relay::channel(64);

        let presenter = std::thread::spawn(move || {
            if let Ok(ServiceInput::Start(Some(reply))) = service_rx.recv() {
                let _ = reply.send(StartOutcome::Headless("No display available".to_string()));
            }
        });

        let response = request("start\n", service_tx, commands, ServiceStatus::default()).await;
        presenter.join().unwrap();

        assert_eq!(response, "ok headless: No display available");
    }

    #[tokio::test]
    async fn start_without_presenter_fails() {
        let (service_tx, service_rx) = std::sync::mpsc::channel();
        drop(service_rx);
        let (commands, _command_rx) = relay::channel(64);

        let response = request("start\n", service_tx, commands, ServiceStatus::default()).await;

        assert_eq!(response, "error: presenter is not running");
    }

    #[tokio::test]
    async fn unknown_command_gets_error_line() {
        let (service_tx, _service_rx) = std::sync::mpsc::channel();
        let (commands, _command_rx) = relay::channel(64);

        let response = request("reboot\n", service_tx, commands, ServiceStatus::default()).await;

        assert!(response.starts_with("error: Failed to parse command"));
    }
}
