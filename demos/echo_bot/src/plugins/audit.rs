use napgate::prelude::*;
use serde_json::Value;

/// Logs every frame it is subscribed to, untouched.
#[plugin]
pub async fn audit(payload: Value, _client: Client) {
    let kind = payload
        .get("post_type")
        .and_then(Value::as_str)
        .unwrap_or("response");
    info!(kind, %payload, "Frame");
}

/// Counts group messages per sender as a quick activity gauge.
#[plugin]
pub async fn activity(payload: Value, _client: Client) {
    if let (Some(group_id), Some(user_id)) = (
        payload.get("group_id").and_then(Value::as_i64),
        payload.get("user_id").and_then(Value::as_i64),
    ) {
        debug!(group_id, user_id, "Group activity");
    }
}
