//! Dicechat - terminal client for a shared dice-rolling chat room.

use anyhow::Result;
use clap::Parser;
use dicechat_client::{config, connection, controller, logging};
use dicechat_core::websocket_url;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use url::Url;

use config::Config;
use connection::ConnectionHandle;
use controller::{ChatController, UiUpdate};
use logging::{LogConfig, LogFormat};

/// Dicechat - dice-rolling chat room client.
#[derive(Parser, Debug)]
#[command(name = "dicechat")]
#[command(about = "Terminal client for a shared dice-rolling chat room")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Session URL (overrides config); the query string carries
    /// name, room, and saved settings
    #[arg(short, long)]
    url: Option<String>,

    /// Enable verbose logging (INFO level for most targets)
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace logging (TRACE level for everything)
    #[arg(long)]
    trace: bool,

    /// Quiet mode (WARN and ERROR only)
    #[arg(short, long)]
    quiet: bool,

    /// Set log level for specific targets (e.g., "connection=debug").
    /// Can be specified multiple times. Targets are prefixed with "dicechat::" automatically.
    #[arg(long = "log", value_name = "TARGET=LEVEL")]
    log_overrides: Vec<String>,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_cli(
        cli.verbose,
        cli.debug,
        cli.trace,
        cli.quiet,
        cli.log_overrides,
        cli.log_format,
    );
    logging::init(&log_config);

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(url) = cli.url {
        config.url = url;
    }

    let session_url = Url::parse(&config.url)?;
    let ws_url = websocket_url(&session_url)?;
    tracing::info!(target: "dicechat::startup", "session {session_url} (transport {ws_url})");

    let (conn_tx, mut conn_rx) = mpsc::unbounded_channel();
    let handle = connection::spawn(ws_url, conn_tx);

    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel();
    let mut controller = ChatController::new(session_url, handle, ui_tx);

    println!("session address: {}", controller.session_url());
    println!("type :help for local commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    // The reconnect loop emits Closed per failed attempt; only report
    // state changes to the terminal.
    let mut connected = false;

    loop {
        tokio::select! {
            event = conn_rx.recv() => {
                let Some(event) = event else { break };
                controller.handle_event(event);
            }
            update = ui_rx.recv() => {
                if let Some(update) = update {
                    print_update(&update, &mut connected);
                }
            }
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if !handle_line(&mut controller, line.trim()) {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    tracing::info!(target: "dicechat::startup", "shutting down");
    Ok(())
}

/// Local directives start with `:`; everything else goes to the room.
/// Returns `false` when the client should exit.
fn handle_line(controller: &mut ChatController<ConnectionHandle>, line: &str) -> bool {
    if line.is_empty() {
        return true;
    }
    let Some(directive) = line.strip_prefix(':') else {
        controller.submit(line);
        return true;
    };

    let (command, rest) = match directive.split_once(' ') {
        Some((command, rest)) => (command, rest.trim()),
        None => (directive, ""),
    };

    match command {
        "quit" => return false,
        "karma" if rest.is_empty() => {
            controller.arm_karma();
            println!("karma will be applied to the next roll");
        }
        "karma" => {
            controller.set_karma(rest);
            println!("karma set to {rest}");
        }
        "hide" => {
            controller.arm_hide();
            println!("the next roll will be hidden");
        }
        "template" if !rest.is_empty() => {
            controller.add_template(rest);
            println!("template saved");
        }
        "templates" => {
            let templates = &controller.settings().message_templates;
            if templates.is_empty() {
                println!("no templates saved");
            }
            for (i, template) in templates.iter().enumerate() {
                println!("{:>2}. {}", i + 1, template.text);
            }
        }
        "use" => {
            let template = rest
                .parse::<usize>()
                .ok()
                .and_then(|i| controller.template(i).map(str::to_owned));
            match template {
                Some(text) => controller.submit(&text),
                None => println!("no such template"),
            }
        }
        "help" => print_help(),
        other => println!("unknown command :{other} (try :help)"),
    }

    true
}

fn print_help() {
    println!(":karma            apply karma to the next roll");
    println!(":karma <value>    set the karma value");
    println!(":hide             hide the next roll's expression");
    println!(":template <text>  save a message template");
    println!(":templates        list saved templates");
    println!(":use <n>          send template n");
    println!(":quit             exit");
    println!("/name <name>, /join <room>, dice like 2d6+3 or !![10] go to the server");
}

fn print_update(update: &UiUpdate, connected: &mut bool) {
    match update {
        UiUpdate::Chat(msg) => {
            let time = &msg.time_label;
            match (&msg.name, &msg.request_text) {
                (Some(name), Some(request)) => {
                    println!("[{time}] {name} rolled {request}: {}", msg.result_text)
                }
                (Some(name), None) => println!("[{time}] {name}: {}", msg.result_text),
                (None, _) => println!("[{time}] * {}", msg.result_text),
            }
        }
        UiUpdate::Room { name, members } => {
            println!("-- room {name}: {}", members.join(", "));
        }
        UiUpdate::Initiative(roster) => {
            println!("-- initiative --");
            for entry in roster {
                let who = match &entry.sub_name {
                    Some(sub) => format!("{} ({sub})", entry.main_name),
                    None => entry.main_name.clone(),
                };
                if entry.description.is_empty() {
                    println!("{:>4}  {who}", entry.result);
                } else {
                    println!("{:>4}  {who}  {}", entry.result, entry.description);
                }
            }
        }
        UiUpdate::Connection(now_connected) => {
            if *now_connected != *connected {
                *connected = *now_connected;
                if *connected {
                    println!("-- connected --");
                } else {
                    println!("-- disconnected, reconnecting --");
                }
            }
        }
        UiUpdate::Address(url) => {
            println!("session address: {url}");
        }
    }
}
