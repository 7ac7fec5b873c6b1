//! 路由定义
//!
//! 集中管理所有 API 路由，将路径映射到对应的 handlers。
//! 路由包括：
//! - 健康检查：/health
//! - 设备查询：/devices, /devices/{id}, /devices/{id}/logs, /devices/{id}/logs/summary
//! - 下行命令：/devices/modify-id, /devices/immediate-report, /devices/rediscover
//! - 事件推送：/events（SSE）
//! - 计数指标：/metrics

use super::AppState;
use super::handlers::*;
use super::middleware::request_context;
use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// 创建 API 路由
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/devices", get(list_devices))
        .route("/devices/modify-id", post(modify_device_id))
        .route("/devices/immediate-report", post(immediate_report))
        .route("/devices/rediscover", post(rediscover_devices))
        .route("/devices/:device_id", get(get_device))
        .route("/devices/:device_id/logs", get(list_device_logs))
        .route("/devices/:device_id/logs/summary", get(device_log_summary))
        .route("/events", get(event_stream))
        .route("/metrics", get(get_metrics))
}

/// 完整应用：同一组路由同时挂在 / 与 /api 下
pub fn create_app(state: AppState) -> Router {
    let api = create_api_router();
    Router::new()
        .merge(api.clone())
        .nest("/api", api)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_context))
                .layer(TraceLayer::new_for_http()),
        )
}
