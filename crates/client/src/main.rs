//! Chatify client - headless entry point
//!
//! Connects one session using `CHATIFY_TOKEN` / `CHATIFY_USER_ID`, prints
//! notices and incoming activity, and reads commands from stdin:
//!
//! ```text
//! /list                 list conversations
//! /select <id>          open a conversation
//! /more <page>          load an older page
//! /delete <message id>  delete a message
//! /quit                 log out and exit
//! <text>                send to the open conversation
//! ```

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chatify_client::stores::MessageChange;
use chatify_client::{logging, AuthContext, AuthSession, ChatSession, ClientConfig};
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let config = ClientConfig::from_env();
    let token = std::env::var("CHATIFY_TOKEN").context("CHATIFY_TOKEN is not set")?;
    let user_id = std::env::var("CHATIFY_USER_ID").unwrap_or_default();
    if token.trim().is_empty() {
        bail!("CHATIFY_TOKEN is empty");
    }

    let auth = AuthContext::new(Some(AuthSession::new(user_id, token)));
    let session = Arc::new(ChatSession::new(config, auth));

    session.notices().subscribe(|notice| {
        println!("[{:?}] {}", notice.level, notice.text);
    });
    let messages = session.messages().clone();
    session.messages().subscribe(move |change| {
        if let MessageChange::Appended(id) = change {
            if let Some(message) = messages.messages().into_iter().find(|m| &m.id == id) {
                println!("<{}> {}", message.sender, message.text);
            }
        }
    });

    session.start().await;
    print_conversations(&session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                if !handle_line(&session, line.trim()).await {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.logout();
    Ok(())
}

/// Returns `false` when the user asked to quit.
async fn handle_line(session: &ChatSession, line: &str) -> bool {
    let (command, arg) = match line.split_once(' ') {
        Some((command, arg)) => (command, arg.trim()),
        None => (line, ""),
    };

    match command {
        "" => {}
        "/quit" => return false,
        "/list" => print_conversations(session),
        "/select" if !arg.is_empty() => {
            let outcome = session.select_conversation(Some(arg.to_string())).await;
            println!("{:?}", outcome);
            for message in session.messages().messages() {
                println!("<{}> {}", message.sender, message.text);
            }
        }
        "/more" => match arg.parse::<u32>() {
            Ok(page) => println!("{:?}", session.load_more(page).await),
            Err(_) => println!("usage: /more <page>"),
        },
        "/delete" if !arg.is_empty() => {
            session.delete_message(arg).await;
        }
        _ if command.starts_with('/') => println!("unknown command: {}", command),
        _ => {
            if session.send_message(line, None).is_none() {
                println!("select a conversation first");
            }
        }
    }
    true
}

fn print_conversations(session: &ChatSession) {
    let presence = session.presence();
    for conversation in session.conversations().conversations() {
        let online = if presence.is_online(&conversation.participant.id) {
            "*"
        } else {
            " "
        };
        let last = conversation
            .last_message
            .as_ref()
            .map(|m| m.text.as_str())
            .unwrap_or("");
        println!(
            "{} {}  {}  {}",
            online, conversation.id, conversation.participant.name, last
        );
    }
}
