//! # Event chain
//!
//! Delivers mutation [`Event`]s to subscribers synchronously, inside the transaction that made the
//! change. Each subscriber gets a `before` call ahead of the write and an `after` call once it is
//! applied; `after` runs in reverse registration order.
//!
//! A subscriber error aborts the chain and is returned to the caller, which rolls back the whole
//! transaction. An *isolated* subscriber instead runs inside its own savepoint: if it fails, only
//! its writes are undone and the failure is reported in the [`ChainReport`].

use std::sync::Arc;

use async_trait::async_trait;
use courier_core::{CourierError, Effect, Event, EventKind, Result};
use sqlx::{Connection, SqliteConnection};
use storage::StorageError;
use tracing::{info, instrument, warn};

/// Reacts to mutation events on the connection of the mutating transaction.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Name used in logs and failure reports.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Whether this subscriber wants `kind` at all.
    fn handles(&self, _kind: EventKind) -> bool {
        true
    }

    /// Isolated subscribers run in a savepoint and cannot fail the surrounding transaction.
    fn isolated(&self) -> bool {
        false
    }

    async fn before(&self, _conn: &mut SqliteConnection, _event: &Event) -> Result<Effect> {
        Ok(Effect::None)
    }

    async fn after(&self, _conn: &mut SqliteConnection, _event: &Event) -> Result<Effect> {
        Ok(Effect::None)
    }
}

/// An isolated subscriber that failed; its writes were rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberFailure {
    pub subscriber: &'static str,
    pub error: CourierError,
}

/// What one phase of the chain produced.
#[derive(Debug, Clone, Default)]
pub struct ChainReport {
    /// Effects in the order subscribers ran; `Effect::None` is dropped.
    pub effects: Vec<Effect>,
    pub failures: Vec<SubscriberFailure>,
}

impl ChainReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn first_failure(&self) -> Option<&SubscriberFailure> {
        self.failures.first()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Before,
    After,
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Phase::Before => "before",
            Phase::After => "after",
        }
    }
}

#[derive(Clone, Default)]
pub struct EventChain {
    subscribers: Vec<Arc<dyn Subscriber>>,
}

impl EventChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a subscriber (before runs in registration order, after in reverse).
    pub fn add_subscriber(mut self, subscriber: Arc<dyn Subscriber>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Runs every interested subscriber's `before` hook.
    #[instrument(skip(self, conn, event), fields(kind = ?event.kind()))]
    pub async fn before(&self, conn: &mut SqliteConnection, event: &Event) -> Result<ChainReport> {
        let subscribers: Vec<&Arc<dyn Subscriber>> = self.subscribers.iter().collect();
        self.run(conn, event, Phase::Before, subscribers).await
    }

    /// Runs every interested subscriber's `after` hook, last registered first.
    #[instrument(skip(self, conn, event), fields(kind = ?event.kind()))]
    pub async fn after(&self, conn: &mut SqliteConnection, event: &Event) -> Result<ChainReport> {
        let subscribers: Vec<&Arc<dyn Subscriber>> = self.subscribers.iter().rev().collect();
        self.run(conn, event, Phase::After, subscribers).await
    }

    async fn run(
        &self,
        conn: &mut SqliteConnection,
        event: &Event,
        phase: Phase,
        subscribers: Vec<&Arc<dyn Subscriber>>,
    ) -> Result<ChainReport> {
        let kind = event.kind();
        let mut report = ChainReport::default();

        for subscriber in subscribers {
            if !subscriber.handles(kind) {
                continue;
            }
            let name = subscriber.name();
            info!(subscriber = %name, phase = phase.as_str(), "step: subscriber started");

            let effect = if subscriber.isolated() {
                match Self::run_isolated(subscriber.as_ref(), conn, event, phase).await? {
                    Ok(effect) => effect,
                    Err(error) => {
                        warn!(
                            subscriber = %name,
                            phase = phase.as_str(),
                            error = %error,
                            "step: isolated subscriber failed, savepoint rolled back"
                        );
                        report.failures.push(SubscriberFailure {
                            subscriber: name,
                            error,
                        });
                        continue;
                    }
                }
            } else {
                Self::call(subscriber.as_ref(), conn, event, phase).await?
            };

            info!(subscriber = %name, phase = phase.as_str(), effect = ?effect, "step: subscriber done");
            if effect != Effect::None {
                report.effects.push(effect);
            }
        }

        Ok(report)
    }

    async fn call(
        subscriber: &dyn Subscriber,
        conn: &mut SqliteConnection,
        event: &Event,
        phase: Phase,
    ) -> Result<Effect> {
        match phase {
            Phase::Before => subscriber.before(conn, event).await,
            Phase::After => subscriber.after(conn, event).await,
        }
    }

    /// Outer error: the savepoint itself could not be managed. Inner error: the subscriber failed.
    async fn run_isolated(
        subscriber: &dyn Subscriber,
        conn: &mut SqliteConnection,
        event: &Event,
        phase: Phase,
    ) -> Result<std::result::Result<Effect, CourierError>> {
        let mut savepoint = conn.begin().await.map_err(storage_error)?;
        match Self::call(subscriber, &mut savepoint, event, phase).await {
            Ok(effect) => {
                savepoint.commit().await.map_err(storage_error)?;
                Ok(Ok(effect))
            }
            Err(error) => {
                savepoint.rollback().await.map_err(storage_error)?;
                Ok(Err(error))
            }
        }
    }
}

fn storage_error(err: sqlx::Error) -> CourierError {
    StorageError::from(err).into()
}
