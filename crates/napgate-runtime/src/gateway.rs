//! Gateway orchestration.
//!
//! [`Gateway`] wires the pieces together: the connection manager feeds
//! frames to a [`FrameHandler`] that decodes them into events and hands them
//! to the dispatcher, while the plugin watcher keeps the registry in sync
//! with the manifests on disk.
//!
//! ```rust,ignore
//! use napgate_runtime::{Gateway, config::load_config};
//!
//! let gateway = Gateway::from_config(load_config()?);
//! gateway.run().await?;
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use napgate_core::{Client, ConnectionHandle, Event, FrameHandler, Pacer};
use napgate_framework::{Catalog, Discovery, DiscoveryOptions, Dispatcher, PluginRegistry};
use napgate_transport::ConnectionManager;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::GatewayConfig;
use crate::error::RuntimeResult;
use crate::logging;

/// Decodes inbound frames and dispatches them.
struct GatewayHandler {
    dispatcher: Dispatcher,
    pacer: Arc<Pacer>,
}

#[async_trait]
impl FrameHandler for GatewayHandler {
    async fn on_connect(&self, connection: &ConnectionHandle) {
        info!(connection = connection.id(), "Backend connected");
    }

    async fn on_frame(&self, connection: &ConnectionHandle, data: &[u8]) {
        let event = match Event::from_slice(data) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    connection = connection.id(),
                    error      = %e,
                    frame      = %String::from_utf8_lossy(data),
                    "Dropping undecodable frame"
                );
                return;
            }
        };

        let client = Client::new(connection.clone(), Arc::clone(&self.pacer));
        let report = self.dispatcher.dispatch(&event, &client).await;
        if !report.failures.is_empty() {
            debug!(
                event_kind = %event.kind(),
                failed     = report.failures.len(),
                "Some handlers failed"
            );
        }
    }

    async fn on_disconnect(&self, connection: &ConnectionHandle) {
        info!(connection = connection.id(), "Backend disconnected");
    }
}

/// The assembled gateway.
pub struct Gateway {
    config: GatewayConfig,
    registry: Arc<PluginRegistry>,
    dispatcher: Dispatcher,
    connection: ConnectionManager,
    pacer: Arc<Pacer>,
}

impl Gateway {
    /// Builds a gateway over the handlers linked into this binary.
    ///
    /// Also initializes logging from `config.logging` unless a subscriber is
    /// already installed.
    pub fn from_config(config: GatewayConfig) -> Self {
        Self::with_catalog(config, Catalog::linked())
    }

    /// Builds a gateway over an explicit handler catalog.
    pub fn with_catalog(config: GatewayConfig, catalog: Catalog) -> Self {
        logging::init_from_config(&config.logging);

        let project_root = config
            .plugins
            .project_root
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        let options = DiscoveryOptions::new(project_root)
            .with_roots(config.plugins.roots.clone())
            .with_exclude(config.plugins.exclude.clone())
            .with_collisions(config.plugins.collisions);

        let registry = Arc::new(PluginRegistry::new(Discovery::new(catalog, options)));
        let dispatcher = Dispatcher::new(Arc::clone(&registry)).with_mode(config.plugins.dispatch);
        let connection = ConnectionManager::new(config.connection.to_client_config());
        let pacer = Arc::new(Pacer::new(Duration::from_millis(
            config.outbound.min_interval_ms,
        )));

        info!(
            url      = %config.connection.url,
            linked   = registry.discovery().catalog().len(),
            dispatch = ?config.plugins.dispatch,
            "Gateway initialized"
        );

        Self {
            config,
            registry,
            dispatcher,
            connection,
            pacer,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// Runs until Ctrl+C / SIGTERM or a fatal connection error.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.run_until(async {
            if let Err(e) = wait_for_shutdown().await {
                error!(error = %e, "Cannot listen for shutdown signals");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Runs until `shutdown` completes or a fatal connection error.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let summary = self.registry.reload().await?;
        for failure in &summary.failures {
            warn!(error = %failure, "Plugin not loaded");
        }
        info!(
            handlers = summary.handlers,
            modules  = summary.modules.len(),
            failures = summary.failures.len(),
            "Plugins loaded"
        );

        let cancel = CancellationToken::new();
        let watcher = self.start_watcher(&cancel);

        let handler: Arc<dyn FrameHandler> = Arc::new(GatewayHandler {
            dispatcher: self.dispatcher.clone(),
            pacer: Arc::clone(&self.pacer),
        });
        let run = self.connection.run(handler, cancel.clone());
        tokio::pin!(run);

        let finished = tokio::select! {
            result = &mut run => Some(result),
            _ = shutdown => None,
        };
        let result = match finished {
            Some(result) => result,
            None => {
                info!("Shutdown requested");
                cancel.cancel();
                run.await
            }
        };

        cancel.cancel();
        stop_watcher(watcher).await;

        info!("Gateway stopped");
        result.map_err(Into::into)
    }

    #[cfg(feature = "file-watcher")]
    fn start_watcher(&self, cancel: &CancellationToken) -> WatchTask {
        use napgate_framework::{PluginWatcher, run_reload_loop};

        if !self.config.plugins.watch {
            debug!("Plugin hot reload disabled");
            return None;
        }

        let debounce = Duration::from_millis(self.config.plugins.watch_debounce_ms);
        match PluginWatcher::start(Arc::clone(self.registry.discovery()), debounce) {
            Ok((watcher, events)) => {
                let task = tokio::spawn(run_reload_loop(
                    Arc::clone(&self.registry),
                    events,
                    cancel.child_token(),
                ));
                Some((watcher, task))
            }
            Err(e) => {
                warn!(error = %e, "Plugin hot reload unavailable");
                None
            }
        }
    }

    #[cfg(not(feature = "file-watcher"))]
    fn start_watcher(&self, _cancel: &CancellationToken) -> WatchTask {
        if self.config.plugins.watch {
            warn!("Plugin hot reload requested but the file-watcher feature is disabled");
        }
    }
}

#[cfg(feature = "file-watcher")]
type WatchTask = Option<(napgate_framework::PluginWatcher, tokio::task::JoinHandle<()>)>;
#[cfg(not(feature = "file-watcher"))]
type WatchTask = ();

#[cfg(feature = "file-watcher")]
async fn stop_watcher(watcher: WatchTask) {
    if let Some((watcher, task)) = watcher {
        drop(watcher);
        if let Err(e) = task.await {
            warn!(error = %e, "Reload task ended abnormally");
        }
    }
}

#[cfg(not(feature = "file-watcher"))]
async fn stop_watcher(_watcher: WatchTask) {}

/// Waits for Ctrl+C or, on Unix, SIGTERM.
async fn wait_for_shutdown() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeError;
    use futures::{FutureExt, SinkExt, StreamExt};
    use napgate_core::{ParamShape, PluginEntry};
    use serde_json::{Value, json};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio_tungstenite::accept_async;
    use tokio_tungstenite::tungstenite::Message;

    fn pong_catalog() -> Catalog {
        Catalog::from_entries([PluginEntry {
            name: "pong",
            module: "gateway_tests::pong",
            file: file!(),
            line: line!(),
            shape: ParamShape::Wrapped,
            call: |event, client| {
                async move { client.reply(&event, "pong").await.map_err(Into::into) }.boxed()
            },
        }])
    }

    fn test_config(url: String, plugin_dir: PathBuf) -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.connection.url = url;
        config.connection.reconnect_delay_ms = 20;
        config.plugins.roots = vec![plugin_dir];
        config.plugins.watch = false;
        config.outbound.min_interval_ms = 0;
        config
    }

    #[tokio::test]
    async fn test_frame_to_reply_round_trip() {
        let plugins = tempfile::tempdir().unwrap();
        std::fs::write(plugins.path().join("pong.plugin.toml"), "").unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let (frame_tx, frame_rx) = oneshot::channel::<String>();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            ws.send(Message::Text("not json".into())).await.unwrap();
            let event = json!({
                "post_type": "message",
                "message_type": "group",
                "group_id": 100,
                "user_id": 7,
                "message_id": 55,
                "raw_message": "ping",
                "message": [{"type": "text", "data": {"text": "ping"}}],
            });
            ws.send(Message::Text(event.to_string().into())).await.unwrap();

            while let Some(Ok(message)) = ws.next().await {
                if let Message::Text(text) = message {
                    let _ = frame_tx.send(text.to_string());
                    break;
                }
            }
            // Hold the socket open until the gateway leaves.
            while ws.next().await.is_some() {}
        });

        let gateway = Gateway::with_catalog(
            test_config(url, plugins.path().to_path_buf()),
            pong_catalog(),
        );

        let mut frame = None;
        let shutdown = async {
            frame = frame_rx.await.ok();
        };
        tokio::time::timeout(Duration::from_secs(10), gateway.run_until(shutdown))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(gateway.registry().snapshot().len(), 1);
        let action: Value = serde_json::from_str(&frame.unwrap()).unwrap();
        assert_eq!(action["action"], "send_group_msg");
        assert_eq!(action["params"]["group_id"], 100);
        assert_eq!(action["params"]["message"][0]["type"], "reply");
        assert_eq!(action["params"]["message"][1]["data"]["text"], "pong");
    }

    #[tokio::test]
    async fn test_fatal_connection_error_stops_gateway() {
        let plugins = tempfile::tempdir().unwrap();
        let gateway = Gateway::with_catalog(
            test_config("http://127.0.0.1:1".to_string(), plugins.path().to_path_buf()),
            Catalog::default(),
        );

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            gateway.run_until(std::future::pending()),
        )
        .await
        .unwrap()
        .unwrap_err();
        assert!(matches!(err, RuntimeError::Transport(_)));
    }
}
