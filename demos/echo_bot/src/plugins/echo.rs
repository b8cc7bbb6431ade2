//! Text commands.

use napgate::prelude::*;

const HELP: &str = "\
Echo Bot - Commands
/echo <text>  Echo text
/ping         Pong!
/help         This help
/info         Message info";

#[plugin]
pub async fn echo(event: Event, client: Client) -> Result<(), SendError> {
    if let Some(content) = event.raw_text().strip_prefix("/echo ") {
        client.send_msg().all(&event)?.text(content).send().await?;
    }
    Ok(())
}

#[plugin]
pub async fn ping(event: Event, client: Client) -> Result<(), SendError> {
    if event.raw_text().trim() == "/ping" {
        client.reply(&event, "Pong!").await?;
    }
    Ok(())
}

#[plugin]
pub async fn help(event: Event, client: Client) -> Result<(), SendError> {
    if event.raw_text().trim() == "/help" {
        client.send_msg().all(&event)?.text(HELP).send().await?;
    }
    Ok(())
}

#[plugin]
pub async fn info(event: Event, client: Client) -> Result<(), SendError> {
    if event.raw_text().trim() != "/info" {
        return Ok(());
    }

    let mut text = format!(
        "Message Info\n- Type: {}\n- From: {}",
        event.message_type(),
        event.sender_id().unwrap_or_default()
    );
    if let Some(group_id) = event.group_id() {
        text.push_str(&format!("\n- Group: {group_id}"));
    }
    if let Some(message_id) = event.message_id() {
        text.push_str(&format!("\n- Message ID: {message_id}"));
    }

    client.reply(&event, text).await
}

/// Only listed in manifests that want it; never loaded implicitly.
#[plugin]
pub async fn _debug_dump(event: Event, client: Client) -> Result<(), SendError> {
    let text = serde_json::to_string_pretty(event.raw()).unwrap_or_default();
    client.send_msg().all(&event)?.text(text).send().await
}
