mod config;
mod input;
mod mpris;
mod observer;
mod overlay;
mod presenter;
mod relay;
mod shell;

use clap::{Parser, Subcommand};
use config::Config;
use input::socket::{Command, SocketServer};
use mpris::watcher::{MprisWatcher, WatcherError};
use mpris::MprisSessions;
use observer::{NotificationObserver, ObserverInput};
use overlay::create_overlay;
use overlay::notification::StatusNotice;
use presenter::service::{IslandService, OverlayFactory, ServiceInput, ServiceStatus};
use presenter::{IslandPresenter, PillMode};
use relay::{ControlAction, ControlCommand, RelaySender};
use shell::Readiness;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time::{sleep, Duration};

#[derive(Parser)]
#[command(name = "island")]
#[command(about = "Now-playing pill overlay for Linux desktops")]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon
    Serve,
    /// Show the pill
    Start,
    /// Hide the pill and stop presenting
    Stop,
    /// Get current status
    Status,
    /// Tap the pill (compact <-> expanded)
    Toggle,
    /// Send a transport command to the active player
    Control {
        #[arg(value_enum)]
        action: ControlAction,
    },
    /// Check display, D-Bus and autostart readiness
    Doctor,
    /// Launch the daemon with the desktop session
    Autostart {
        /// Remove the autostart entry instead
        #[arg(long)]
        remove: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter = if cli.debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::from_default_env()
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .init();

    match cli.command {
        Commands::Serve => {
            serve()?;
        }
        Commands::Start => {
            start()?;
        }
        Commands::Stop => {
            run_command(Command::Stop)?;
        }
        Commands::Status => {
            let status = tokio::runtime::Runtime::new()?.block_on(send_command(&Command::Status.to_line()))?;
            println!("{}", status);
        }
        Commands::Toggle => {
            run_command(Command::Toggle)?;
        }
        Commands::Control { action } => {
            run_command(Command::Control(action))?;
        }
        Commands::Doctor => {
            doctor()?;
        }
        Commands::Autostart { remove } => {
            autostart(remove);
        }
    }

    Ok(())
}

fn serve() -> anyhow::Result<()> {
    tracing::info!("Starting island daemon");

    let config = Config::load()?;
    let limit = config.relay.max_payload_bytes;
    tracing::info!("Config loaded, overlay backend: {:?}", config.overlay.backend);

    let (service_tx, service_rx) = std::sync::mpsc::channel::<ServiceInput>();
    let (observer_tx, observer_rx) = std::sync::mpsc::channel::<ObserverInput>();
    let (status_tx, status_rx) = tokio::sync::mpsc::channel::<ServiceStatus>(32);

    let updates = relay::bridge(service_tx.clone(), ServiceInput::Update, limit);
    let commands = relay::bridge(observer_tx.clone(), ObserverInput::Command, limit);

    // The observer owns the media handle on its own thread
    let app_id = config.general.app_id.clone();
    let artwork_size = config.observer.artwork_size;
    std::thread::Builder::new()
        .name("island-observer".to_string())
        .spawn(move || match MprisSessions::new() {
            Ok(sessions) => NotificationObserver::new(sessions, updates, app_id, artwork_size).run(observer_rx),
            Err(e) => tracing::error!("Notification observer unavailable: {}", e),
        })?;

    // Watcher and socket server share a tokio runtime on a background thread
    let config_clone = config.clone();
    let service_tx_clone = service_tx.clone();
    let commands_clone = commands.clone();
    std::thread::spawn(move || {
        let rt = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                tracing::error!("Failed to create tokio runtime: {}", e);
                return;
            }
        };
        rt.block_on(async move {
            if let Err(e) = run_daemon(config_clone, service_tx_clone, commands_clone, observer_tx, status_rx).await {
                tracing::error!("Daemon error: {}", e);
            }
        });
    });

    if config.overlay.start_on_launch {
        let _ = service_tx.send(ServiceInput::Start(None));
    }

    let overlay_config = config.overlay.clone();
    let factory: OverlayFactory = Box::new(move || create_overlay(&overlay_config, service_tx.clone()));
    let notice = config.notice.enabled.then(|| StatusNotice::new(&config.notice));

    let mut service = IslandService::new(IslandPresenter::new(commands, PillMode::Compact), factory, notice);
    service.set_status_sender(status_tx);

    // Presenter runs on the main thread
    service.run(service_rx);

    Ok(())
}

async fn run_daemon(
    config: Config,
    service_tx: std::sync::mpsc::Sender<ServiceInput>,
    commands: RelaySender<ControlCommand>,
    observer_tx: std::sync::mpsc::Sender<ObserverInput>,
    status_rx: tokio::sync::mpsc::Receiver<ServiceStatus>,
) -> anyhow::Result<()> {
    // Socket failures only cost CLI control
    match SocketServer::new(service_tx.clone(), commands, status_rx) {
        Ok(mut socket_server) => {
            tokio::spawn(async move {
                if let Err(e) = socket_server.listen().await {
                    tracing::error!("Socket server error: {}. CLI commands are unavailable until restart", e);
                }
            });
        }
        Err(e) => {
            tracing::error!("Failed to create socket server: {}. CLI commands are unavailable", e);
        }
    }

    let config_watcher = config.clone();
    tokio::spawn(async move {
        loop {
            match MprisWatcher::new(&config_watcher, observer_tx.clone()).await {
                Ok(mut watcher) => {
                    tracing::info!("Starting MPRIS watcher");
                    match watcher.watch().await {
                        Err(WatcherError::ObserverGone) => {
                            tracing::warn!("Notification observer is gone, MPRIS watcher stopped");
                            break;
                        }
                        Err(e) => {
                            tracing::warn!("MPRIS watcher stopped: {}. Retrying in 5 seconds...", e);
                        }
                        Ok(()) => {
                            tracing::warn!("MPRIS watcher ended unexpectedly. Retrying in 5 seconds...");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to start MPRIS watcher: {}. Retrying in 5 seconds...", e);
                }
            }
            sleep(Duration::from_secs(5)).await;
        }
    });

    tracing::info!("Daemon started. Polling players every {}ms", config.observer.poll_interval_ms);

    shutdown_after(wait_for_interrupt(), &service_tx).await;
    Ok(())
}

/// Only `interrupt` ends the presenter; other daemon tasks may die on their own.
async fn shutdown_after(interrupt: impl std::future::Future<Output = ()>, service_tx: &std::sync::mpsc::Sender<ServiceInput>) {
    interrupt.await;
    let _ = service_tx.send(ServiceInput::Shutdown);
}

async fn wait_for_interrupt() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Interrupted, shutting down"),
        Err(e) => {
            // Without a signal handler the presenter runs until the process is killed
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

async fn send_command(cmd: &str) -> anyhow::Result<String> {
    let socket_path = SocketServer::socket_path()?;

    if !socket_path.exists() {
        anyhow::bail!("Daemon is not running (socket not found)");
    }

    let mut stream = UnixStream::connect(&socket_path).await?;
    stream.write_all(cmd.as_bytes()).await?;
    stream.write_all(b"\n").await?;

    let mut response = String::new();
    let mut reader = tokio::io::BufReader::new(stream);
    reader.read_line(&mut response).await?;

    Ok(response.trim().to_string())
}

fn run_command(command: Command) -> anyhow::Result<String> {
    let response = tokio::runtime::Runtime::new()?.block_on(send_command(&command.to_line()))?;
    if let Some(message) = response.strip_prefix("error: ") {
        anyhow::bail!("{}", message);
    }
    Ok(response)
}

fn start() -> anyhow::Result<()> {
    match run_command(Command::Start) {
        Ok(response) => {
            println!("{}", response);
            Ok(())
        }
        Err(e) => {
            eprintln!("Could not start the island: {}", e);
            eprintln!("Run `island autostart` so the daemon launches with your session, then log in again.");
            Err(e)
        }
    }
}

fn autostart(remove: bool) {
    if remove {
        match shell::autostart::remove() {
            Ok(true) => println!("✓ Autostart entry removed"),
            Ok(false) => println!("No autostart entry installed"),
            Err(e) => println!("✗ {}", e),
        }
        return;
    }

    match shell::autostart::install() {
        Ok(path) => println!("✓ Autostart entry written to {}", path.display()),
        Err(e) => {
            println!("✗ {}", e);
            println!();
            println!("{}", shell::autostart::manual_instructions());
        }
    }
}

fn doctor() -> anyhow::Result<()> {
    println!("island readiness check");
    println!("======================");
    println!();

    let readiness = Readiness::probe();

    if readiness.overlay_permission {
        println!("✓ Display available for the pill overlay");
    } else {
        println!("✗ No Wayland or X11 display found");
        println!("Run island from inside a graphical session (WAYLAND_DISPLAY or DISPLAY must be set)");
    }

    if readiness.listener_enabled {
        println!("✓ Session D-Bus reachable (media players can be observed)");
    } else {
        println!("✗ Session D-Bus not reachable");
        println!("Make sure DBUS_SESSION_BUS_ADDRESS is set for this session");
    }

    if readiness.background_exempt {
        println!("✓ Autostart entry installed");
    } else {
        println!("✗ Autostart entry missing");
        println!("Run: island autostart");
    }

    println!();
    println!("Checking configuration...");
    let config_path = Config::config_path()?;
    match Config::load() {
        Ok(_) => println!("✓ Config OK ({})", config_path.display()),
        Err(e) => println!("✗ Config at {} is invalid: {}", config_path.display(), e),
    }

    println!();
    println!("Checking dependencies...");
    if which::which("notify-send").is_ok() {
        println!("✓ notify-send found");
    } else {
        println!("✗ notify-send not found (status notice disabled)");
        println!("Install with: sudo dnf install libnotify");
    }

    println!();
    if readiness.is_ready() {
        println!("All set.");
    } else {
        println!("Some checks failed; the daemon still runs with reduced functionality.");
    }

    Ok(())
}
