//! Notice handlers.

use napgate::prelude::*;
use tracing::debug;

/// Welcomes new group members.
#[plugin]
pub async fn welcome(event: Event, client: Client) -> Result<(), SendError> {
    let joined = event
        .get("notice_type")
        .and_then(|v| v.as_str())
        .is_some_and(|t| t == "group_increase");
    let (Some(group_id), Some(user_id), true) = (event.group_id(), event.user_id(), joined) else {
        return Ok(());
    };

    debug!(group_id, user_id, "New member");
    client
        .send_msg()
        .group(group_id)?
        .at(user_id)
        .text(" welcome aboard!")
        .send()
        .await
}

/// Pokes back whoever pokes the bot.
#[plugin(name = "poke_back")]
pub async fn poke(event: Event, client: Client) -> Result<(), SendError> {
    let is_poke = event.get("sub_type").and_then(|v| v.as_str()) == Some("poke");
    let at_us = event.get("target_id") == event.get("self_id");
    if is_poke && at_us {
        client.poke_sender(&event).await?;
    }
    Ok(())
}
