mod panel;

use clap::{Parser, Subcommand};
use control_core::bindings::{key_label, KEY_BINDINGS};
use control_core::config::{DEFAULT_DEVICE_ID, DEFAULT_WS_URL};
use control_core::connection::{self, ConnectionEvent};
use control_core::protocol::ACTIONS;
use control_core::{ControlConfig, Dispatcher, Notice, NoticeLevel, WsTransport};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing_subscriber::EnvFilter;
use url::Url;

const REPLY_WINDOW: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "car_control", about = "Remote control panel for the IoT vehicle")]
struct Args {
    #[arg(long, env = "CAR_WS_URL", default_value = DEFAULT_WS_URL, global = true)]
    ws_url: Url,

    #[arg(long, env = "CAR_DEVICE_ID", default_value_t = DEFAULT_DEVICE_ID, global = true)]
    device_id: u32,

    /// Seconds to wait after a lost connection before trying again.
    #[arg(
        long,
        default_value_t = 5,
        global = true,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    reconnect_secs: u64,

    /// Write logs here instead of stderr (recommended for the interactive panel).
    #[arg(long, value_name = "PATH", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive keyboard panel (default).
    Panel,
    /// Connect, send a single action and print the reply.
    Send {
        action: String,
        /// How long to wait for the connection to open.
        #[arg(long, default_value_t = 10)]
        wait_secs: u64,
    },
    /// List the known actions and key bindings.
    Actions,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_logging(args.log_file.as_deref())?;

    let mut config = ControlConfig::new(args.ws_url.clone());
    config.device_id = args.device_id;
    config.reconnect_delay = Duration::from_secs(args.reconnect_secs);

    match args.command.unwrap_or(Command::Panel) {
        Command::Panel => panel::run(config).await,
        Command::Send { action, wait_secs } => {
            send_once(config, &action, Duration::from_secs(wait_secs)).await
        }
        Command::Actions => {
            print_actions();
            Ok(())
        }
    }
}

fn init_logging(log_file: Option<&std::path::Path>) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env());
    match log_file {
        Some(path) => {
            let file = File::create(path)
                .map_err(|e| anyhow::anyhow!("failed to open log file {}: {e}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

async fn send_once(config: ControlConfig, action: &str, wait: Duration) -> anyhow::Result<()> {
    let (handle, mut events) = connection::spawn(WsTransport, &config);
    let mut dispatcher = Dispatcher::new(handle.clone(), &config);

    let open_deadline = Instant::now() + wait;
    while let Ok(event) = timeout_at(open_deadline, events.recv()).await {
        let Some(event) = event else {
            return Err(anyhow::anyhow!("connection actor stopped"));
        };
        let opened = event == ConnectionEvent::Opened;
        dispatcher.on_connection_event(event);
        print_notices(dispatcher.take_notices());
        if opened {
            break;
        }
    }

    let result = dispatcher.dispatch(action);
    print_notices(dispatcher.take_notices());
    let envelope = match result {
        Ok(envelope) => envelope,
        Err(e) => {
            handle.shutdown().await;
            return Err(e.into());
        }
    };
    println!("{}", serde_json::to_string(&envelope)?);

    let reply_deadline = Instant::now() + REPLY_WINDOW;
    while let Ok(Some(event)) = timeout_at(reply_deadline, events.recv()).await {
        let is_reply = matches!(event, ConnectionEvent::Message(_));
        dispatcher.on_connection_event(event);
        let notices = dispatcher.take_notices();
        let answered = is_reply && !notices.is_empty();
        print_notices(notices);
        if answered {
            break;
        }
    }

    handle.shutdown().await;
    Ok(())
}

fn print_notices(notices: Vec<Notice>) {
    for notice in notices {
        let tag = match notice.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Error => "error",
        };
        eprintln!("[{tag}] {}", notice.text);
    }
}

fn print_actions() {
    println!("actions:");
    for (name, id) in ACTIONS {
        println!("  {id:>4}  {name}");
    }
    println!("keys:");
    for &(key, action) in KEY_BINDINGS {
        println!("  {:<6} {action}", key_label(key));
    }
}
