#![allow(dead_code)]

use alarm_control::{CommandDispatcher, ControlError};
use alarm_protocol::Frame;
use alarm_registry::{BroadcastEventSink, DeviceRegistry, RegistryPolicy};
use async_trait::async_trait;
use domain::DeviceEvent;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

#[derive(Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<(Frame, IpAddr)>>,
    fail: AtomicBool,
}

impl RecordingDispatcher {
    pub fn sent(&self) -> Vec<(Frame, IpAddr)> {
        self.sent.lock().expect("lock").clone()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CommandDispatcher for RecordingDispatcher {
    async fn send(&self, frame: &Frame, target: IpAddr) -> Result<(), ControlError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ControlError::Dispatch("network unreachable".to_string()));
        }
        self.sent.lock().expect("lock").push((*frame, target));
        Ok(())
    }
}

pub fn ip(last: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(192, 168, 0, last))
}

pub struct Harness {
    pub registry: Arc<DeviceRegistry>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub events: broadcast::Receiver<DeviceEvent>,
}

pub fn harness() -> Harness {
    let sink = Arc::new(BroadcastEventSink::new(512));
    let events = sink.subscribe();
    let registry = Arc::new(DeviceRegistry::new(RegistryPolicy::default()).with_event_sink(sink));
    Harness {
        registry,
        dispatcher: Arc::new(RecordingDispatcher::default()),
        events,
    }
}

pub fn drain(events: &mut broadcast::Receiver<DeviceEvent>) -> Vec<DeviceEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

pub fn online(id: u8) -> Frame {
    Frame::new(alarm_protocol::Command::Online, id, 0, 0xC8)
}
