//! 计数指标快照
//!
//! - GET /metrics

use alarm_telemetry::metrics;
use api_contract::{ApiResponse, MetricsSnapshotDto};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

pub async fn get_metrics() -> Response {
    let snapshot = metrics().snapshot();
    (
        StatusCode::OK,
        Json(ApiResponse::success(MetricsSnapshotDto {
            frames_received: snapshot.frames_received,
            frames_rejected: snapshot.frames_rejected,
            frames_ignored: snapshot.frames_ignored,
            conflicts_detected: snapshot.conflicts_detected,
            conflicts_resolved: snapshot.conflicts_resolved,
            id_space_exhausted: snapshot.id_space_exhausted,
            id_migrations: snapshot.id_migrations,
            devices_offline: snapshot.devices_offline,
            devices_evicted: snapshot.devices_evicted,
            commands_sent: snapshot.commands_sent,
            command_send_failures: snapshot.command_send_failures,
            snapshot_writes: snapshot.snapshot_writes,
            snapshot_write_failures: snapshot.snapshot_write_failures,
            log_entries_dropped: snapshot.log_entries_dropped,
            events_published: snapshot.events_published,
        })),
    )
        .into_response()
}
