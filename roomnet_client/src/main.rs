//! Standalone client binary.
//!
//! Usage:
//!   cargo run -p roomnet_client -- [--config client.json] [--host 127.0.0.1] [--port 8080] [--name kim]
//!
//! Connects to the room server, announces a nickname, then drains the session
//! queue at a fixed rate while executing console commands typed on stdin.
//! Type `help` for the command list.

use std::env;
use std::io::{BufRead, Write};

use anyhow::Context;
use rand::Rng;
use roomnet_client::{bridge::LoggingBridge, console, Session};
use roomnet_shared::{
    config::ClientConfig,
    event::SessionEvent,
    protocol::{decode_line, ServerMessage},
};
use tokio::sync::mpsc;
use tracing::info;

fn parse_args() -> anyhow::Result<ClientConfig> {
    let args: Vec<String> = env::args().collect();

    let mut cfg = match args.iter().position(|a| a == "--config") {
        Some(i) if i + 1 < args.len() => ClientConfig::from_json_file(&args[i + 1])
            .with_context(|| format!("load config {}", args[i + 1]))?,
        _ => ClientConfig::default(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--host" if i + 1 < args.len() => {
                cfg.host = args[i + 1].clone();
                i += 2;
            }
            "--port" if i + 1 < args.len() => {
                cfg.port = args[i + 1].parse().context("parse --port")?;
                i += 2;
            }
            "--name" if i + 1 < args.len() => {
                cfg.nickname = Some(args[i + 1].clone());
                i += 2;
            }
            _ => i += 1,
        }
    }
    Ok(cfg)
}

/// Prints what the session forwards, the way a lobby UI would show it.
fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::Connected => println!("* connected"),
        SessionEvent::ConnectionFailed(reason) => println!("* connection failed: {reason}"),
        SessionEvent::Disconnected => println!("* disconnected from server"),
        SessionEvent::MessageReceived(text) => match decode_line(text) {
            Ok(ServerMessage::UpdateRoomInfo(room)) => {
                println!("* room '{}' (host {})", room.room_name, room.host_id);
                for p in &room.players {
                    let name = p.nickname.as_deref().unwrap_or(&p.player_id);
                    let ready = if p.is_ready { " [ready]" } else { "" };
                    println!("    {name}{ready}");
                }
            }
            Ok(ServerMessage::FindRoomsResponse(list)) => {
                println!("* {} room(s)", list.rooms.len());
                for r in &list.rooms {
                    println!("    #{} {} ({} players)", r.room_id, r.room_name, r.player_count);
                }
            }
            Ok(ServerMessage::ChatBroadcast(chat)) => {
                println!("[{}]: {}", chat.sender_id, chat.message)
            }
            Ok(ServerMessage::PlayerJoined(p)) => println!("--- {} has joined the room ---", p.player_id),
            Ok(ServerMessage::PlayerLeft(p)) => println!("--- {} has left the room ---", p.player_id),
            Ok(ServerMessage::LeaveRoomSuccess) => println!("* left the room"),
            Ok(ServerMessage::GameStart) => println!("--- The game is starting! ---"),
            _ => println!("< {text}"),
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args()?;
    info!(host = %cfg.host, port = cfg.port, "Starting client");

    let nickname = cfg
        .nickname
        .clone()
        .unwrap_or_else(|| format!("Player{}", rand::thread_rng().gen_range(100..1000)));
    let tick_interval = cfg.tick_interval();

    let mut session = Session::new(cfg, LoggingBridge);
    session.subscribe(print_event);

    if session.connect_configured().await.is_ok() {
        for out in console::announce(&mut session, &nickname).await {
            println!("{out}");
        }
    }

    // Set up console input channel.
    let (console_tx, mut console_rx) = mpsc::channel::<String>(32);

    // Spawn stdin reader thread.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("> ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Type 'help' for commands, 'quit' to exit.");

    let mut ticker = tokio::time::interval(tick_interval);
    loop {
        ticker.tick().await;

        // Process console commands.
        while let Ok(line) = console_rx.try_recv() {
            match console::parse(&line) {
                Ok(Some(console::Command::Quit)) => {
                    session.disconnect();
                    return Ok(());
                }
                Ok(Some(cmd)) => {
                    for out in console::exec(&mut session, cmd).await {
                        println!("{out}");
                    }
                }
                Ok(None) => {}
                Err(usage) => println!("{usage}"),
            }
        }

        session.pump();
    }
}
