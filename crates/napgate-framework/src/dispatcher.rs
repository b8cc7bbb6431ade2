//! Event dispatch.
//!
//! [`Dispatcher`] fans one decoded [`Event`] out to every handler of the
//! current registry snapshot that subscribes to its kind. Handler errors and
//! panics are isolated: they are logged with the handler's name and the
//! offending payload and never reach the connection loop or other handlers.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::join_all;
use napgate_core::{Client, Event};
use serde::{Deserialize, Serialize};
use tracing::{Instrument, Level, debug, error, span};

use crate::registry::{HandlerDescriptor, PluginRegistry};

/// How the handlers for one event are run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// One after another, in registration order.
    #[default]
    Sequential,
    /// All at once on the dispatching task.
    Concurrent,
}

/// Why a handler did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerFailure {
    Error(String),
    Panic(String),
}

/// Per-event dispatch statistics.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// Handlers that were started.
    pub invoked: usize,
    /// Handlers skipped by their event filter.
    pub skipped: usize,
    /// `(handler, failure)` for every handler that failed.
    pub failures: Vec<(String, HandlerFailure)>,
}

impl DispatchReport {
    pub fn succeeded(&self) -> usize {
        self.invoked - self.failures.len()
    }

    pub fn panicked(&self) -> usize {
        self.failures
            .iter()
            .filter(|(_, f)| matches!(f, HandlerFailure::Panic(_)))
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<PluginRegistry>,
    mode: DispatchMode,
}

impl Dispatcher {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self {
            registry,
            mode: DispatchMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Runs every matching handler for `event`. Never fails.
    pub async fn dispatch(&self, event: &Event, client: &Client) -> DispatchReport {
        let snapshot = self.registry.snapshot();
        let kind = event.kind();

        let (matching, skipped): (Vec<_>, Vec<_>) = snapshot.iter().partition(|h| h.accepts(kind));
        let mut report = DispatchReport {
            invoked: matching.len(),
            skipped: skipped.len(),
            failures: Vec::new(),
        };
        if matching.is_empty() {
            debug!(event_kind = %kind, "No handler subscribed to event");
            return report;
        }

        let outcomes = match self.mode {
            DispatchMode::Sequential => {
                let mut outcomes = Vec::with_capacity(matching.len());
                for handler in matching {
                    outcomes.push(run_handler(handler, event, client).await);
                }
                outcomes
            }
            DispatchMode::Concurrent => {
                join_all(matching.into_iter().map(|h| run_handler(h, event, client))).await
            }
        };

        report.failures = outcomes.into_iter().flatten().collect();
        debug!(
            event_kind = %kind,
            generation = snapshot.generation(),
            invoked    = report.invoked,
            failed     = report.failures.len(),
            "Event dispatched"
        );
        report
    }
}

async fn run_handler(
    handler: &HandlerDescriptor,
    event: &Event,
    client: &Client,
) -> Option<(String, HandlerFailure)> {
    let dispatch_span = span!(
        Level::DEBUG,
        "dispatch",
        handler    = handler.name(),
        event_kind = %event.kind(),
    );

    let outcome = AssertUnwindSafe(handler.invoke(event.clone(), client.clone()))
        .catch_unwind()
        .instrument(dispatch_span)
        .await;

    let failure = match outcome {
        Ok(Ok(())) => return None,
        Ok(Err(e)) => {
            error!(
                handler = handler.name(),
                module  = handler.module(),
                source  = %handler.source(),
                error   = %e,
                payload = %event.raw(),
                "Handler failed"
            );
            HandlerFailure::Error(e.to_string())
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(
                handler = handler.name(),
                module  = handler.module(),
                source  = %handler.source(),
                panic   = %message,
                payload = %event.raw(),
                "Handler panicked"
            );
            HandlerFailure::Panic(message)
        }
    };
    Some((handler.name().to_string(), failure))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
