// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket event stream. Frames carry the [`Event`] variants emitted by
//! the Cron Service and Tool Firewall, JSON-encoded with a `type` tag.
//!
//! Fan-out is a bounded `tokio::sync::broadcast` channel fed by a
//! [`BroadcastSink`] subscribed once to the [`EventBus`](warden_engine::EventBus).
//! A lagging receiver (one whose client reads slower than events arrive)
//! drops the oldest buffered frames rather than blocking the rest of the
//! system or growing without bound; the drop count is surfaced so an
//! operator can see it happened. Per-IP connection count and per-frame
//! size are both capped.

use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use warden_core::{Event, EventSink};

const CHANNEL_CAPACITY: usize = 1024;

/// Subscribed once to the [`EventBus`](warden_engine::EventBus); pushes every
/// emitted event onto a broadcast channel that WebSocket handlers read from.
pub struct BroadcastSink {
    tx: broadcast::Sender<Event>,
    lagged: AtomicU64,
}

impl BroadcastSink {
    pub fn new() -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Arc::new(Self {
            tx,
            lagged: AtomicU64::new(0),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Count of dropped frames across all lagging receivers since startup,
    /// surfaced in the dashboard overview.
    pub fn lagged_count(&self) -> u64 {
        self.lagged.load(Ordering::Relaxed)
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: Event) {
        // No receivers is not an error: nobody is connected yet.
        let _ = self.tx.send(event);
    }
}

/// Per-IP connection tracker, decremented when the connection's guard drops.
#[derive(Default)]
pub struct ConnectionTracker {
    counts: DashMap<IpAddr, usize>,
}

impl ConnectionTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn try_acquire(self: &Arc<Self>, ip: IpAddr, max_per_ip: usize) -> Option<ConnectionGuard> {
        let mut entry = self.counts.entry(ip).or_insert(0);
        if *entry >= max_per_ip {
            return None;
        }
        *entry += 1;
        Some(ConnectionGuard {
            tracker: self.clone(),
            ip,
        })
    }
}

struct ConnectionGuard {
    tracker: Arc<ConnectionTracker>,
    ip: IpAddr,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if let Some(mut entry) = self.tracker.counts.get_mut(&self.ip) {
            *entry = entry.saturating_sub(1);
        }
    }
}

pub async fn event_stream(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<std::net::SocketAddr>,
) -> Response {
    let ip = addr.ip();
    let max_per_ip = state.config.ws_max_connections_per_ip;
    let Some(guard) = state.connections.try_acquire(ip, max_per_ip) else {
        return axum::http::StatusCode::TOO_MANY_REQUESTS.into_response();
    };

    let rx = state.broadcast.subscribe();
    let sink = state.broadcast.clone();
    let max_frame_bytes = state.config.ws_max_frame_bytes;
    ws.on_upgrade(move |socket| handle_socket(socket, rx, sink, guard, max_frame_bytes))
}

async fn handle_socket(
    mut socket: WebSocket,
    mut rx: broadcast::Receiver<Event>,
    sink: Arc<BroadcastSink>,
    _guard: ConnectionGuard,
    max_frame_bytes: usize,
) {
    loop {
        tokio::select! {
            event = rx.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        sink.lagged.fetch_add(n, Ordering::Relaxed);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let Ok(mut payload) = serde_json::to_string(&event) else { continue };
                if payload.len() > max_frame_bytes {
                    payload.truncate(max_frame_bytes);
                }
                if socket.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    Some(Ok(_)) => continue,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_ip_cap_denies_beyond_limit() {
        let tracker = ConnectionTracker::new();
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        let _g1 = tracker.try_acquire(ip, 2).unwrap();
        let _g2 = tracker.try_acquire(ip, 2).unwrap();
        assert!(tracker.try_acquire(ip, 2).is_none());
    }

    #[test]
    fn dropping_a_guard_frees_a_slot() {
        let tracker = ConnectionTracker::new();
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        let g1 = tracker.try_acquire(ip, 1).unwrap();
        assert!(tracker.try_acquire(ip, 1).is_none());
        drop(g1);
        assert!(tracker.try_acquire(ip, 1).is_some());
    }

    #[tokio::test]
    async fn lagged_frames_are_counted_when_a_receiver_falls_behind() {
        let sink = BroadcastSink::new();
        let mut rx = sink.subscribe();

        for i in 0..CHANNEL_CAPACITY + 10 {
            sink.emit(Event::JobStuck { job_id: warden_core::JobId::new(format!("job-{i}")) });
        }

        let dropped = loop {
            match rx.recv().await {
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => break n,
                Err(broadcast::error::RecvError::Closed) => panic!("channel closed before lag observed"),
            }
        };
        sink.lagged.fetch_add(dropped, Ordering::Relaxed);

        assert_eq!(sink.lagged_count(), dropped);
        assert!(sink.lagged_count() > 0);
    }
}
