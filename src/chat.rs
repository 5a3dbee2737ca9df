// Terminal chat with EcoBot. Same conversation rules as the web widget:
// recent history up to the client's window, one message in flight, failures answered with the fallback.

use anyhow::Result;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

use crate::app_state::Session;
use crate::error::UserActionError;
use crate::model_client::ModelClient;

const EXIT_WORDS: [&str; 3] = ["exit", "quit", "keluar"];

pub async fn run_chat<R, W>(client: &ModelClient, input: R, out: &mut W) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    info!("Starting terminal chat session...");
    let mut session = Session::new();
    if let Some(welcome) = session.conversation().turns().first() {
        writeln!(out, "EcoBot: {}", welcome.text)?;
    }

    let mut lines = input.lines();
    let mut exchanges = 0;
    loop {
        write!(out, "Kamu: ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if EXIT_WORDS.contains(&line.trim().to_lowercase().as_str()) {
            break;
        }

        let prior = match session.begin_chat(&line) {
            Ok(prior) => prior,
            Err(UserActionError::EmptyMessage) => continue,
            Err(e) => {
                debug!("Chat input rejected: {}", e);
                continue;
            }
        };

        let reply = client.converse(line.trim(), &prior).await;
        writeln!(out, "EcoBot: {}", reply)?;
        session.finish_chat(reply);
        exchanges += 1;
    }

    writeln!(out, "Sampai jumpa! Jaga kebersihan pulau ya.")?;
    info!(exchanges, "Chat session finished");
    Ok(exchanges)
}
