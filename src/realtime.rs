//! Change feed: Postgres `NOTIFY` events fanned out over a broadcast
//! channel to the store refresher and to Server-Sent Event subscribers.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::Event;
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgListener;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::{database::Database, error::Resource, store::InventoryStore};

pub const CHANNEL: &str = "inventory_changes";
const FEED_CAPACITY: usize = 256;
const RELISTEN_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
    Truncate,
    /// Notifications may have been missed; treat the table as changed.
    Resync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub table: Resource,
    pub op: ChangeOp,
}

#[derive(Deserialize)]
struct Payload {
    table: String,
    op: String,
}

impl ChangeEvent {
    /// Parses the trigger payload, `{"table": "...", "op": "INSERT"}`.
    pub fn parse(payload: &str) -> Option<Self> {
        let raw: Payload = serde_json::from_str(payload).ok()?;
        let table = Resource::from_table(&raw.table)?;
        let op = match raw.op.to_ascii_uppercase().as_str() {
            "INSERT" => ChangeOp::Insert,
            "UPDATE" => ChangeOp::Update,
            "DELETE" => ChangeOp::Delete,
            "TRUNCATE" => ChangeOp::Truncate,
            _ => return None,
        };
        Some(Self { table, op })
    }
}

#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(FEED_CAPACITY)
    }
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Returns how many subscribers saw the event; nobody listening is fine.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn publish_resync(&self) {
        for table in Resource::ALL {
            self.publish(ChangeEvent {
                table,
                op: ChangeOp::Resync,
            });
        }
    }
}

/// Listens on the notification channel for the life of the process.
pub fn spawn_listener(db: Database, feed: ChangeFeed) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(err) = listen(&db, &feed).await {
                log::error!("Change listener stopped: {}", err);
            }
            tokio::time::sleep(RELISTEN_DELAY).await;
            feed.publish_resync();
        }
    })
}

async fn listen(db: &Database, feed: &ChangeFeed) -> Result<(), sqlx::Error> {
    let mut listener = PgListener::connect_with(db).await?;
    listener.listen(CHANNEL).await?;
    log::info!("Listening for changes on '{}'", CHANNEL);

    loop {
        // `None` means the connection dropped; the next call reconnects.
        match listener.try_recv().await? {
            Some(notification) => match ChangeEvent::parse(notification.payload()) {
                Some(event) => {
                    log::debug!("{:?} on {}", event.op, event.table.table());
                    feed.publish(event);
                }
                None => log::warn!("Ignoring change payload: {}", notification.payload()),
            },
            None => {
                log::warn!("Change listener connection lost, resyncing");
                feed.publish_resync();
            }
        }
    }
}

/// Keeps the store in step with the feed: every event refetches its table.
pub fn spawn_store_refresher(store: InventoryStore, feed: &ChangeFeed) -> JoinHandle<()> {
    let mut rx = feed.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => store.refresh(event.table).await,
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Store refresher skipped {} changes, reloading everything", skipped);
                    store.refresh_all().await;
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// What a subscriber is told next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedMessage {
    Change(ChangeEvent),
    /// The subscriber fell behind and should reload everything.
    Resync,
}

pub async fn next_message(rx: &mut broadcast::Receiver<ChangeEvent>) -> Option<FeedMessage> {
    match rx.recv().await {
        Ok(event) => Some(FeedMessage::Change(event)),
        Err(RecvError::Lagged(_)) => Some(FeedMessage::Resync),
        Err(RecvError::Closed) => None,
    }
}

impl FeedMessage {
    pub fn into_event(self) -> Event {
        match self {
            FeedMessage::Change(change) => Event::default()
                .event(change.table.table())
                .json_data(change)
                .unwrap_or_else(|_| Event::default().event("resync").data("{}")),
            FeedMessage::Resync => Event::default().event("resync").data("{}"),
        }
    }
}

pub fn event_stream(rx: broadcast::Receiver<ChangeEvent>) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(rx, |mut rx| async move {
        let message = next_message(&mut rx).await?;
        Some((Ok(message.into_event()), rx))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_payloads_parse() {
        assert_eq!(
            ChangeEvent::parse(r#"{"table":"locations","op":"DELETE"}"#),
            Some(ChangeEvent { table: Resource::Locations, op: ChangeOp::Delete })
        );
        assert_eq!(
            ChangeEvent::parse(r#"{"table":"inventory_history","op":"insert"}"#),
            Some(ChangeEvent { table: Resource::InventoryHistory, op: ChangeOp::Insert })
        );
        assert_eq!(ChangeEvent::parse(r#"{"table":"users","op":"INSERT"}"#), None);
        assert_eq!(ChangeEvent::parse(r#"{"table":"products","op":"MERGE"}"#), None);
        assert_eq!(ChangeEvent::parse("products"), None);
    }

    #[test]
    fn events_serialize_with_the_table_name() {
        let json = serde_json::to_value(ChangeEvent {
            table: Resource::ShelfConfigs,
            op: ChangeOp::Update,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "table": "shelf_configs", "op": "update" }));
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        let feed = ChangeFeed::new(4);
        assert_eq!(
            feed.publish(ChangeEvent { table: Resource::Products, op: ChangeOp::Insert }),
            0
        );
    }

    #[tokio::test]
    async fn subscribers_receive_events_in_order() {
        let feed = ChangeFeed::new(8);
        let mut rx = feed.subscribe();

        feed.publish(ChangeEvent { table: Resource::Products, op: ChangeOp::Insert });
        feed.publish(ChangeEvent { table: Resource::Locations, op: ChangeOp::Delete });

        assert_eq!(
            next_message(&mut rx).await,
            Some(FeedMessage::Change(ChangeEvent { table: Resource::Products, op: ChangeOp::Insert }))
        );
        assert_eq!(
            next_message(&mut rx).await,
            Some(FeedMessage::Change(ChangeEvent { table: Resource::Locations, op: ChangeOp::Delete }))
        );
    }

    #[tokio::test]
    async fn lagging_subscriber_is_told_to_resync() {
        let feed = ChangeFeed::new(2);
        let mut rx = feed.subscribe();

        for _ in 0..5 {
            feed.publish(ChangeEvent { table: Resource::Products, op: ChangeOp::Update });
        }

        assert_eq!(next_message(&mut rx).await, Some(FeedMessage::Resync));
        assert!(matches!(next_message(&mut rx).await, Some(FeedMessage::Change(_))));
    }

    #[tokio::test]
    async fn resync_covers_every_table() {
        let feed = ChangeFeed::new(8);
        let mut rx = feed.subscribe();
        feed.publish_resync();

        let mut tables = Vec::new();
        for _ in 0..Resource::ALL.len() {
            match next_message(&mut rx).await {
                Some(FeedMessage::Change(event)) => {
                    assert_eq!(event.op, ChangeOp::Resync);
                    tables.push(event.table);
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(tables, Resource::ALL.to_vec());
    }

    #[tokio::test]
    async fn stream_ends_when_the_feed_is_dropped() {
        use futures::StreamExt;

        let feed = ChangeFeed::new(4);
        let stream = event_stream(feed.subscribe());
        feed.publish(ChangeEvent { table: Resource::Products, op: ChangeOp::Insert });
        drop(feed);

        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 1);
    }
}
