//! netchat CLI entry point.

use std::process::ExitCode;
use std::time::Duration;

use chrono::Local;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use netchat_client::cli::Cli;
use netchat_client::config::ClientConfig;
use netchat_client::error::{ClientError, ClientResult};
use netchat_client::session::ClientSession;
use netchat_core::{ChatEvent, TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(TracingConfig::cli(cli.debug)) {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config = if let Some(ref path) = cli.config {
        ClientConfig::load_from(path).map_err(ClientError::Config)?
    } else {
        ClientConfig::load().unwrap_or_default()
    };

    let server = cli.server.unwrap_or(config.server_addr);
    let nick = cli.nick.or(config.nickname).ok_or_else(|| {
        ClientError::Config(
            "no display name given (use --nick or set `nickname` in the config file)".into(),
        )
    })?;
    let handshake_timeout = Duration::from_secs(cli.timeout.unwrap_or(config.timeout));

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let session = ClientSession::connect(&server, &nick, handshake_timeout, events_tx).await?;
    session.spawn_receiver();

    println!("connected to {server} as {nick}");
    println!("commands: /msg <name> <text>, /nick <name>, /users, /quit");

    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            let stop = event == ChatEvent::Disconnected;
            print_event(&event);
            if stop {
                break;
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !session.is_connected() {
            break;
        }
        match handle_line(&session, line).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => eprintln!("error: {e}"),
        }
    }

    let _ = session.disable().await;
    let _ = printer.await;
    Ok(())
}

/// Dispatches one line of user input. Returns false when the user quits.
async fn handle_line(session: &ClientSession, line: &str) -> ClientResult<bool> {
    if let Some(rest) = line.strip_prefix("/msg ") {
        match rest.split_once(' ') {
            Some((recipient, body)) if !body.trim().is_empty() => {
                session.send_private(recipient, body.trim()).await?;
            }
            _ => println!("usage: /msg <name> <text>"),
        }
    } else if let Some(new) = line.strip_prefix("/nick ") {
        session.request_rename(new.trim()).await?;
    } else if line == "/users" {
        println!("online: {}", session.roster().await.join(", "));
    } else if line == "/quit" {
        return Ok(false);
    } else if line.starts_with('/') {
        println!("unknown command: {line}");
    } else {
        session.send_text(line).await?;
    }
    Ok(true)
}

fn print_event(event: &ChatEvent) {
    let stamp = Local::now().format("%H:%M");
    match event {
        ChatEvent::MessageReceived { text } => println!("[{stamp}] {text}"),
        ChatEvent::PrivateMessageReceived { sender, body } => {
            println!("[{stamp}] (private from {sender}) {body}")
        }
        ChatEvent::UserJoined { name } => println!("[{stamp}] * {name} has joined the chat"),
        ChatEvent::UserLeft { name } => println!("[{stamp}] * {name} has left the chat"),
        ChatEvent::NameChanged { old, new } => {
            println!("[{stamp}] * {old} is now known as {new}")
        }
        ChatEvent::NameRejected => println!("[{stamp}] * that name is not available"),
        ChatEvent::ProtocolViolation { detail } => {
            tracing::warn!(detail = %detail, "ignoring message outside the protocol")
        }
        ChatEvent::Disconnected => println!("[{stamp}] * disconnected from server"),
    }
}
