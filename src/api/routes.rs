use std::sync::Arc;

use chrono::Utc;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Reply};

use super::websocket;
use crate::catalog::NewExam;
use crate::dashboard::DashboardResponse;
use crate::proctor::ProctorHub;

/// Every HTTP and WebSocket route the service exposes
pub fn routes(
    hub: Arc<ProctorHub>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST"])
        .allow_header("content-type");

    alert_websocket_route(hub.clone())
        .or(dashboard_route(hub.clone()))
        .or(health_check(hub.clone()))
        .or(publish_exam_route(hub))
        .with(cors)
}

/// Persistent alert channel
pub fn alert_websocket_route(
    hub: Arc<ProctorHub>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("ws")
        .and(warp::path::end())
        .and(warp::ws())
        .and(with_hub(hub))
        .map(|ws: warp::ws::Ws, hub: Arc<ProctorHub>| {
            ws.on_upgrade(move |websocket| websocket::handle_alert_websocket(websocket, hub))
        })
}

pub fn dashboard_route(
    hub: Arc<ProctorHub>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "teacher" / "dashboard")
        .and(warp::get())
        .and(with_hub(hub))
        .then(|hub: Arc<ProctorHub>| async move { dashboard_reply(&hub).await })
}

async fn dashboard_reply(hub: &ProctorHub) -> Response {
    match hub.dashboard().await {
        Ok(snapshot) => warp::reply::json(&DashboardResponse::from(snapshot)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Error fetching dashboard");
            error_reply("Failed to fetch dashboard data")
        }
    }
}

pub fn health_check(
    hub: Arc<ProctorHub>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "health")
        .and(warp::get())
        .and(with_hub(hub))
        .then(|hub: Arc<ProctorHub>| async move {
            let database = if hub.store_reachable().await {
                "Connected"
            } else {
                "Unavailable"
            };

            warp::reply::json(&serde_json::json!({
                "status": "OK",
                "database": database,
                "timestamp": Utc::now().to_rfc3339(),
            }))
        })
}

pub fn publish_exam_route(
    hub: Arc<ProctorHub>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "exams")
        .and(warp::post())
        .and(warp::body::content_length_limit(1024 * 256))
        .and(warp::body::json::<NewExam>())
        .and(with_hub(hub))
        .then(|exam: NewExam, hub: Arc<ProctorHub>| async move {
            match hub.publish_exam(exam).await {
                Ok(exam) => {
                    warp::reply::with_status(warp::reply::json(&exam), StatusCode::CREATED).into_response()
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to publish exam");
                    error_reply("Failed to create exam")
                }
            }
        })
}

fn error_reply(message: &str) -> Response {
    warp::reply::with_status(
        warp::reply::json(&serde_json::json!({ "error": message })),
        StatusCode::INTERNAL_SERVER_ERROR,
    )
    .into_response()
}

fn with_hub(
    hub: Arc<ProctorHub>,
) -> impl Filter<Extract = (Arc<ProctorHub>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || hub.clone())
}
