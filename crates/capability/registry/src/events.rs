//! 设备事件出口。

use alarm_telemetry::record_event_published;
use domain::DeviceEvent;
use tokio::sync::broadcast;
use tracing::debug;

/// 事件出口（同步、不得阻塞）
pub trait EventSink: Send + Sync {
    fn publish(&self, event: DeviceEvent);
}

/// 基于 tokio broadcast 的事件出口；无订阅者时事件直接丢弃。
pub struct BroadcastEventSink {
    tx: broadcast::Sender<DeviceEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl EventSink for BroadcastEventSink {
    fn publish(&self, event: DeviceEvent) {
        record_event_published();
        let kind = event.kind();
        let delivered = self.tx.send(event).unwrap_or(0);
        debug!(target: "alarm.registry", kind, delivered, "event_published");
    }
}

pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn publish(&self, _event: DeviceEvent) {}
}
