//! 设备事件推送（Server-Sent Events）
//!
//! - GET /events
//!
//! 每个 [`DeviceEvent`] 以 `data: <json>` 推送；空闲超过心跳间隔时推送
//! `{"type":"heartbeat",...}`。订阅者落后于缓冲区时跳过丢失的事件并记录告警。
//! 进程停止信号到达后流结束，避免长连接阻塞优雅退出。

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use domain::{DeviceEvent, now_epoch_ms};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

struct EventStreamState {
    events: broadcast::Receiver<DeviceEvent>,
    heartbeat: Interval,
    shutdown: watch::Receiver<bool>,
}

pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!(
        target: "alarm.api",
        subscribers = state.events.subscriber_count() + 1,
        "sse_client_connected"
    );
    let initial = EventStreamState {
        events: state.events.subscribe(),
        heartbeat: heartbeat_interval(state.sse_heartbeat),
        shutdown: state.shutdown.clone(),
    };
    Sse::new(stream::unfold(initial, next_event))
}

fn heartbeat_interval(period: Duration) -> Interval {
    let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    heartbeat
}

async fn next_event(
    mut state: EventStreamState,
) -> Option<(Result<Event, Infallible>, EventStreamState)> {
    loop {
        if *state.shutdown.borrow() {
            return None;
        }
        let event = tokio::select! {
            received = state.events.recv() => match received {
                Ok(event) => {
                    state.heartbeat.reset();
                    event
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(target: "alarm.api", skipped, "sse_client_lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            },
            _ = state.heartbeat.tick() => DeviceEvent::Heartbeat {
                timestamp_ms: now_epoch_ms(),
            },
            changed = state.shutdown.changed() => {
                if changed.is_err() || *state.shutdown.borrow() {
                    return None;
                }
                continue;
            }
        };
        match Event::default().json_data(&event) {
            Ok(sse_event) => return Some((Ok(sse_event), state)),
            Err(err) => {
                warn!(
                    target: "alarm.api",
                    event = event.kind(),
                    error = %err,
                    "sse_event_encode_failed"
                );
            }
        }
    }
}
