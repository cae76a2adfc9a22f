// SPDX-License-Identifier: MIT

//! HTTP API over the trip planner
//!
//! - `GET  /api/health`
//! - `GET  /api/graph`: channels, nodes and edges of the compiled graph
//! - `POST /api/runs`: run to completion, respond with the final state
//! - `POST /api/runs/stream`: run and stream `RunEvent`s as server-sent events

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::graph::RunOptions;
use crate::trip::{trip_input, TripPlan, TripPlanner};

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub query: String,
    /// Continue to travel and food suggestions after the weather lookup
    #[serde(default)]
    pub recommendations: bool,
}

pub fn router(planner: Arc<TripPlanner>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/graph", get(describe_graph))
        .route("/api/runs", post(create_run))
        .route("/api/runs/stream", post(stream_run))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(planner)
}

pub async fn serve(
    planner: Arc<TripPlanner>,
    port: u16,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = router(planner);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn describe_graph(State(planner): State<Arc<TripPlanner>>) -> Json<Value> {
    Json(json!(planner.graph().describe()))
}

async fn create_run(
    State(planner): State<Arc<TripPlanner>>,
    Json(payload): Json<RunRequest>,
) -> (StatusCode, Json<Value>) {
    if let Err(rejection) = validate(&payload) {
        return rejection;
    }

    let input = trip_input(payload.query, payload.recommendations);
    match planner.run(input, RunOptions::default()).await {
        Ok(state) => (
            StatusCode::OK,
            Json(json!({
                "status": "completed",
                "plan": TripPlan::from(&state),
                "state": state,
            })),
        ),
        Err(e) => {
            log::error!("Run failed: {}", e);
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({
                    "status": "failed",
                    "run_id": e.run_id,
                    "error": e.kind().to_string(),
                    "state": e.last_state(),
                })),
            )
        }
    }
}

async fn stream_run(
    State(planner): State<Arc<TripPlanner>>,
    Json(payload): Json<RunRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, Json<Value>)> {
    validate(&payload)?;
    let (tx, rx) = mpsc::channel(100);

    tokio::spawn(async move {
        log::info!("Starting streaming run for query: {}", payload.query);
        let input = trip_input(payload.query, payload.recommendations);
        // the outcome reaches the client as the terminal event
        let _ = planner
            .run(input, RunOptions::default().with_events(tx))
            .await;
    });

    let stream = ReceiverStream::new(rx).map(|event| {
        let sse = Event::default()
            .json_data(&event)
            .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()));
        Ok(sse)
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(1))))
}

fn validate(payload: &RunRequest) -> Result<(), (StatusCode, Json<Value>)> {
    if payload.query.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "query cannot be empty" })),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunSettings;
    use crate::llm::Agent;
    use async_trait::async_trait;
    use std::error::Error;

    struct RainyAgent;

    #[async_trait]
    impl Agent for RainyAgent {
        fn name(&self) -> &str {
            "rainy"
        }

        async fn run(&self, input: String) -> Result<String, Box<dyn Error + Send + Sync>> {
            if input.contains("nowhere") {
                return Err("no matching location found".into());
            }
            Ok("light rain expected".to_string())
        }
    }

    async fn spawn_server() -> String {
        let planner = TripPlanner::new(Arc::new(RainyAgent), RunSettings::default()).unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(Arc::new(planner))).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_health_and_graph() {
        let base = spawn_server().await;
        let client = reqwest::Client::new();

        let health: Value = client
            .get(format!("{}/api/health", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");

        let graph: Value = client
            .get(format!("{}/api/graph", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(graph["nodes"], json!(["weather_agent", "travel_agent", "food_agent"]));
    }

    #[tokio::test]
    async fn test_create_run() {
        let base = spawn_server().await;
        let resp = reqwest::Client::new()
            .post(format!("{}/api/runs", base))
            .json(&json!({ "query": "weather in Atlanta", "recommendations": true }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "completed");
        assert_eq!(body["plan"]["weather"], "light rain expected");
        assert_eq!(
            body["plan"]["recommendation"],
            crate::trip::rules::INDOOR_ATTRACTIONS
        );
    }

    #[tokio::test]
    async fn test_failed_run_reports_state() {
        let base = spawn_server().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{}/api/runs", base))
            .json(&json!({ "query": "weather in nowhere" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 422);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "failed");
        assert!(body["error"].as_str().unwrap().contains("no matching location"));
        assert_eq!(body["state"]["query"], "weather in nowhere");

        let resp = client
            .post(format!("{}/api/runs", base))
            .json(&json!({ "query": "" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);
    }

    #[tokio::test]
    async fn test_stream_run_emits_events() {
        let base = spawn_server().await;
        let body = reqwest::Client::new()
            .post(format!("{}/api/runs/stream", base))
            .json(&json!({ "query": "weather in Atlanta" }))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();

        assert!(body.contains("\"type\":\"run_started\""));
        assert!(body.contains("\"type\":\"node_completed\""));
        assert!(body.contains("\"type\":\"run_completed\""));
    }

    #[tokio::test]
    async fn test_stream_run_rejects_empty_query() {
        let base = spawn_server().await;
        let resp = reqwest::Client::new()
            .post(format!("{}/api/runs/stream", base))
            .json(&json!({ "query": "   " }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "query cannot be empty");
    }
}
