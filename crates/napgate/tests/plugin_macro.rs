use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use napgate::core::{ConnectionHandle, Pacer, ParamShape};
use napgate::framework::{Catalog, Discovery, DiscoveryOptions, Dispatcher, PluginRegistry};
use napgate::prelude::*;
use serde_json::{Value, json};

static RAW_SEEN: AtomicUsize = AtomicUsize::new(0);

mod greet {
    use super::*;

    #[plugin]
    pub async fn hello(event: Event, client: Client) -> Result<(), SendError> {
        if event.raw_text() == "hi" {
            client
                .send_msg()
                .all(&event)?
                .text("hello, ")
                .at(event.sender_id().unwrap_or_default())
                .send()
                .await?;
        }
        Ok(())
    }

    #[plugin(name = "audit")]
    pub async fn audit_payload(payload: Value, _client: Client) {
        if payload["post_type"] == "message" {
            RAW_SEEN.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[plugin]
    pub async fn _helper(_event: Event, _client: Client) {}
}

#[test]
fn test_plugin_attribute_registers_handlers() {
    let catalog = Catalog::linked();

    let hello = catalog.resolve("greet::hello").unwrap();
    assert_eq!(hello.module, "plugin_macro::greet");
    assert_eq!(hello.shape, ParamShape::Wrapped);
    assert!(hello.file.ends_with("plugin_macro.rs"));

    let audit = catalog.resolve("audit").unwrap();
    assert_eq!(audit.shape, ParamShape::Raw);
    assert_eq!(audit.path(), "plugin_macro::greet::audit");

    // `_helper` is linked but never loaded implicitly.
    let names: Vec<_> = catalog.with_module_leaf("greet").map(|e| e.name).collect();
    assert_eq!(names, ["audit", "hello"]);
}

#[tokio::test]
async fn test_manifest_enables_linked_handlers() {
    let dir = tempfile::tempdir().unwrap();
    let plugins = dir.path().join("plugins");
    std::fs::create_dir(&plugins).unwrap();
    std::fs::write(plugins.join("greet.plugin.toml"), "").unwrap();

    let options = DiscoveryOptions::new(dir.path()).with_roots(["plugins"]);
    let registry = Arc::new(PluginRegistry::new(Discovery::new(Catalog::linked(), options)));
    let summary = registry.reload().await.unwrap();
    assert!(summary.failures.is_empty());
    assert_eq!(summary.handlers, 2);

    let (connection, mut frames) = ConnectionHandle::channel(1, 8);
    let client = Client::new(connection, Arc::new(Pacer::unlimited()));
    let event = Event::from_value(json!({
        "post_type": "message",
        "message_type": "group",
        "group_id": 42,
        "user_id": 7,
        "message_id": 1,
        "raw_message": "hi",
        "message": [{"type": "text", "data": {"text": "hi"}}],
    }))
    .unwrap();

    let report = Dispatcher::new(registry).dispatch(&event, &client).await;
    assert_eq!(report.invoked, 2);
    assert!(report.failures.is_empty());
    assert_eq!(RAW_SEEN.load(Ordering::SeqCst), 1);

    let action: Value = serde_json::from_str(&frames.recv().await.unwrap()).unwrap();
    assert_eq!(action["action"], "send_group_msg");
    assert_eq!(action["params"]["group_id"], 42);
    assert_eq!(action["params"]["message"][1]["type"], "at");
    assert_eq!(action["params"]["message"][1]["data"]["qq"], "7");
}
