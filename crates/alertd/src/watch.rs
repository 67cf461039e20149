//! The live watch subsystem.
//!
//! Each watch connection owns one background poll loop: criteria are
//! captured at subscribe time, the loop queries the backing service every
//! interval with a bounded fetch and a sliding time window, and every
//! newly-observed item is pushed onto the response stream as one JSON line
//! terminated by `\r\n`. Dropping the response body (client disconnect)
//! cancels the loop's token; the loop observes it within one interval and
//! exits without leaking the task. Cancellation is idempotent.

use std::collections::HashMap;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::Response;
use bytes::Bytes;
use futures::Stream;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use models::{AlertsCriteria, EventsCriteria, Order, Pager};

use crate::api::params::{self, Params};
use crate::api::ApiError;

/// Poll cadence when the client doesn't pass `watchInterval`.
pub const DEFAULT_WATCH_INTERVAL_SECS: u64 = 5;

/// Upper bound on items fetched per poll cycle, so one slow consumer
/// cannot pull an unbounded backlog into memory.
const MAX_FETCH_PER_CYCLE: usize = 500;

/// Buffered lines between the poll loop and the response body.
const CHANNEL_CAPACITY: usize = 32;

const PARAM_WATCH_INTERVAL: &str = "watchInterval";

/// Resolve the connection's poll interval from `watchInterval` (seconds).
pub fn watch_interval(params: &Params, default: Duration) -> Result<Duration, ApiError> {
    Ok(match params::parse_i64(params, PARAM_WATCH_INTERVAL)? {
        Some(secs) if secs > 0 => Duration::from_secs(secs as u64),
        Some(secs) => {
            return Err(ApiError::bad_request(format!(
                "Bad arguments: watchInterval must be positive, got '{secs}'"
            )))
        }
        None => default,
    })
}

/// One item observed by a poll cycle, already serialized for delivery.
pub struct WatchItem {
    pub id: String,
    pub ctime: i64,
    pub line: String,
}

/// A source of watchable items. Implementations apply the connection's
/// stored criteria narrowed to the poll window.
#[async_trait]
pub trait WatchFeed: Send + Sync + 'static {
    async fn poll(&self, window_start: i64, max_fetch: usize) -> anyhow::Result<Vec<WatchItem>>;
}

pub struct AlertsFeed {
    pub service: Arc<dyn services::AlertsService>,
    pub tenant_id: String,
    pub criteria: AlertsCriteria,
}

#[async_trait]
impl WatchFeed for AlertsFeed {
    async fn poll(&self, window_start: i64, max_fetch: usize) -> anyhow::Result<Vec<WatchItem>> {
        let mut criteria = self.criteria.clone();
        criteria.start_time = Some(match criteria.start_time {
            Some(start) => start.max(window_start),
            None => window_start,
        });
        let pager = watch_pager(max_fetch);
        let page = self
            .service
            .get_alerts(&self.tenant_id, &criteria, &pager)
            .await
            .map_err(|err| anyhow::anyhow!(err.to_string()))?;
        page.items
            .into_iter()
            .map(|alert| {
                Ok(WatchItem {
                    id: alert.id.clone(),
                    ctime: alert.ctime,
                    line: serde_json::to_string(&alert)?,
                })
            })
            .collect()
    }
}

pub struct EventsFeed {
    pub service: Arc<dyn services::AlertsService>,
    pub tenant_id: String,
    pub criteria: EventsCriteria,
}

#[async_trait]
impl WatchFeed for EventsFeed {
    async fn poll(&self, window_start: i64, max_fetch: usize) -> anyhow::Result<Vec<WatchItem>> {
        let mut criteria = self.criteria.clone();
        criteria.start_time = Some(match criteria.start_time {
            Some(start) => start.max(window_start),
            None => window_start,
        });
        let pager = watch_pager(max_fetch);
        let page = self
            .service
            .get_events(&self.tenant_id, &criteria, &pager)
            .await
            .map_err(|err| anyhow::anyhow!(err.to_string()))?;
        page.items
            .into_iter()
            .map(|event| {
                Ok(WatchItem {
                    id: event.id.clone(),
                    ctime: event.ctime,
                    line: serde_json::to_string(&event)?,
                })
            })
            .collect()
    }
}

fn watch_pager(max_fetch: usize) -> Pager {
    Pager {
        page: 0,
        page_size: Some(max_fetch),
        order: vec![Order::by("ctime", models::Direction::Ascending)],
    }
}

/// Subscribe to a feed: spawn the per-connection poll loop and return the
/// line stream. Dropping the stream cancels the loop.
pub fn watch_stream(feed: impl WatchFeed, interval: Duration) -> WatchStream {
    let cancel = CancellationToken::new();
    let (tx, rx) = tokio::sync::mpsc::channel(CHANNEL_CAPACITY);

    let watcher_id = uuid::Uuid::new_v4().to_string();
    tracing::debug!(watcher_id, ?interval, "watcher started");
    tokio::spawn(run_poll_loop(
        feed,
        interval,
        tx,
        cancel.clone(),
        watcher_id,
    ));

    WatchStream {
        inner: ReceiverStream::new(rx),
        cancel,
    }
}

/// Subscribe and wrap the stream as a chunked 200 response.
pub fn stream_response(feed: impl WatchFeed, interval: Duration) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .body(axum::body::Body::from_stream(watch_stream(feed, interval)))
        .expect("static response parts are valid")
}

async fn run_poll_loop(
    feed: impl WatchFeed,
    interval: Duration,
    tx: tokio::sync::mpsc::Sender<Result<Bytes, Infallible>>,
    cancel: CancellationToken,
    watcher_id: String,
) {
    // Items strictly older than the subscription instant are not part of
    // this watch. The window keeps one interval of slack against clock
    // skew between producers; `delivered` suppresses the resulting
    // re-reads for the lifetime of the window.
    let subscribed_at = services::now_millis();
    let slack = interval.as_millis() as i64;
    let mut watermark = subscribed_at;
    let mut delivered: HashMap<String, i64> = HashMap::new();

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let window_start = (watermark - slack).max(subscribed_at);
        let items = match feed.poll(window_start, MAX_FETCH_PER_CYCLE).await {
            Ok(items) => items,
            Err(err) => {
                tracing::warn!(watcher_id, err = format!("{err:#}"), "watch poll failed");
                continue;
            }
        };

        for item in items {
            watermark = watermark.max(item.ctime);
            if delivered.insert(item.id.clone(), item.ctime).is_some() {
                continue; // Already delivered on this connection.
            }
            let line = Bytes::from(format!("{}\r\n", item.line));
            if tx.send(Ok(line)).await.is_err() {
                // Receiver gone: the client disconnected mid-delivery.
                tracing::debug!(watcher_id, "watcher output closed");
                return;
            }
        }

        // Entries that slid out of the window can never be re-read.
        let floor = (watermark - slack).max(subscribed_at);
        delivered.retain(|_, ctime| *ctime >= floor);
    }

    tracing::debug!(watcher_id, "watcher stopped");
}

/// The response body stream. Cancels the poll loop when dropped, so a
/// client disconnect deterministically releases the background task.
pub struct WatchStream {
    inner: ReceiverStream<Result<Bytes, Infallible>>,
    cancel: CancellationToken,
}

impl WatchStream {
    /// Explicit unsubscribe; safe to call more than once.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    #[cfg(test)]
    pub(crate) fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for WatchStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Stream for WatchStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use futures::StreamExt;
    use models::{Alert, Severity, Status};
    use services::{AlertsService, StandaloneStore};
    use std::collections::BTreeMap;

    fn alert(id: &str, ctime: i64, severity: Severity) -> Alert {
        Alert {
            tenant_id: "watch-tenant".to_string(),
            id: id.to_string(),
            ctime,
            trigger_id: None,
            severity,
            status: Status::Open,
            ack_by: None,
            ack_time: None,
            ack_notes: None,
            resolved_by: None,
            resolved_time: None,
            resolved_notes: None,
            notes: Vec::new(),
            tags: BTreeMap::new(),
            context: BTreeMap::new(),
            trigger: None,
            eval_sets: None,
        }
    }

    fn feed(store: &Arc<StandaloneStore>) -> AlertsFeed {
        AlertsFeed {
            service: store.clone(),
            tenant_id: "watch-tenant".to_string(),
            criteria: AlertsCriteria {
                severities: vec![Severity::Critical],
                ..Default::default()
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_matching_items_exactly_once() {
        let store = Arc::new(StandaloneStore::new());
        let mut stream = watch_stream(feed(&store), Duration::from_secs(1));

        let now = services::now_millis();
        store
            .add_alerts(vec![
                alert("critical-1", now + 10, Severity::Critical),
                alert("low-1", now + 10, Severity::Low),
            ])
            .await
            .unwrap();

        let line = stream.next().await.expect("stream open").unwrap();
        let text = String::from_utf8(line.to_vec()).unwrap();
        assert!(text.ends_with("\r\n"));
        assert!(text.contains("critical-1"));
        assert!(!text.contains("low-1"));

        // Subsequent cycles re-read the same window; the item must not be
        // delivered twice. A later alert arrives instead.
        store
            .add_alerts(vec![alert("critical-2", now + 20, Severity::Critical)])
            .await
            .unwrap();
        let line = stream.next().await.expect("stream open").unwrap();
        let text = String::from_utf8(line.to_vec()).unwrap();
        assert!(text.contains("critical-2"), "got: {text}");
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels_the_poll_loop() {
        let store = Arc::new(StandaloneStore::new());
        let stream = watch_stream(feed(&store), Duration::from_secs(1));
        let cancel = stream.cancellation_token();

        // Stop twice: idempotent, then drop cancels again harmlessly.
        stream.stop();
        stream.stop();
        drop(stream);
        assert!(cancel.is_cancelled());

        // Give the loop a tick to observe cancellation and exit; alerts
        // created afterwards have nowhere to go and must not be polled
        // into a dead channel.
        tokio::time::sleep(Duration::from_secs(2)).await;
        let now = services::now_millis();
        store
            .add_alerts(vec![alert("critical-late", now, Severity::Critical)])
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    #[test]
    fn watch_interval_parses_and_validates() {
        let mut params = Params::new();
        params.insert(PARAM_WATCH_INTERVAL.to_string(), vec!["30".to_string()]);
        assert_eq!(
            watch_interval(&params, Duration::from_secs(5)).unwrap(),
            Duration::from_secs(30)
        );

        assert_eq!(
            watch_interval(&Params::new(), Duration::from_secs(5)).unwrap(),
            Duration::from_secs(5)
        );

        params.insert(PARAM_WATCH_INTERVAL.to_string(), vec!["-1".to_string()]);
        assert!(watch_interval(&params, Duration::from_secs(5)).is_err());
    }
}
