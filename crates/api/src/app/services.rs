//! Infrastructure wiring for the HTTP layer: one [`ShopServices`] plus the
//! realtime fan-out that feeds `/stream`.

use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};

use storeledger_core::TenantId;
use storeledger_events::{EventBus, InMemoryEventBus};
use storeledger_infra::event_store::{EventStoreError, PostgresEventStore};
use storeledger_infra::{ShopServices, WorkflowError};

use crate::config::AppConfig;

/// Realtime message broadcast via SSE.
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeMessage {
    pub tenant_id: TenantId,
    pub topic: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("event store: {0}")]
    Store(#[from] EventStoreError),

    #[error("rebuilding read models: {0}")]
    Rebuild(#[from] WorkflowError),

    #[error("DATABASE_URL is required for persistent stores")]
    MissingDatabaseUrl,
}

#[derive(Clone)]
pub struct AppServices {
    shop: Arc<ShopServices>,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
}

impl AppServices {
    pub fn shop(&self) -> &ShopServices {
        &self.shop
    }

    pub fn realtime_tx(&self) -> &broadcast::Sender<RealtimeMessage> {
        &self.realtime_tx
    }
}

/// Build the shop services for `config`: in memory by default, Postgres-backed
/// (with a full read model rebuild) when persistent stores are enabled.
pub async fn build_services(config: &AppConfig) -> Result<AppServices, StartupError> {
    let bus = Arc::new(InMemoryEventBus::new());

    let shop = if config.use_persistent_stores {
        let url = config
            .database_url
            .as_deref()
            .ok_or(StartupError::MissingDatabaseUrl)?;
        let store = PostgresEventStore::connect(url).await?;
        let shop = ShopServices::new(Arc::new(store), bus, config.utc_offset);
        let replayed = tokio::task::block_in_place(|| shop.rebuild())?;
        tracing::info!(events = replayed, "persistent event store attached");
        shop
    } else {
        tracing::info!("using in-memory event store");
        ShopServices::new(
            Arc::new(storeledger_infra::event_store::InMemoryEventStore::new()),
            bus,
            config.utc_offset,
        )
    };

    let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);
    spawn_realtime_relay(&shop, realtime_tx.clone());

    Ok(AppServices {
        shop: Arc::new(shop),
        realtime_tx,
    })
}

/// Background subscriber: committed events -> realtime notifications.
///
/// Read models are already updated by the time an event is published, so a
/// client reacting to a notification reads fresh data.
fn spawn_realtime_relay(shop: &ShopServices, realtime_tx: broadcast::Sender<RealtimeMessage>) {
    let sub = shop.bus().subscribe();
    tokio::task::spawn_blocking(move || {
        while let Ok(env) = sub.recv() {
            let at = env.aggregate_type();
            // Lossy: no receivers or a lagging receiver never blocks writes.
            let _ = realtime_tx.send(RealtimeMessage {
                tenant_id: env.tenant_id(),
                topic: format!("{at}.updated"),
                payload: serde_json::json!({
                    "kind": "projection_update",
                    "event_id": env.event_id().to_string(),
                    "aggregate_type": at,
                    "aggregate_id": env.aggregate_id().to_string(),
                    "sequence_number": env.sequence_number(),
                }),
            });
        }
        tracing::debug!("event bus closed; realtime relay stopped");
    });
}

pub fn tenant_sse_stream(
    services: Arc<AppServices>,
    tenant_id: TenantId,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |msg| match msg {
        Ok(m) if m.tenant_id == tenant_id => {
            let data = serde_json::to_string(&m.payload).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(m.topic).data(data)))
        }
        _ => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
