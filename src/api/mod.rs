//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Resource endpoints are mounted under `/api/v1`; `/health` sits at the
//! root.

pub mod dto;
pub mod handlers;

use axum::Router;

use crate::app_state::AppState;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::bus::{BusOptions, EventNotifier, EventPublisher, InMemoryEventBus};
    use crate::domain::{FarmId, FarmProfile, WeatherSnapshot};
    use crate::error::AnalyticsError;
    use crate::persistence::{AnalyticsRepository, MemoryStore};
    use crate::projection::FarmAnalyticsProjection;
    use crate::service::AnalyticsService;
    use crate::weather::WeatherFetcher;

    #[derive(Debug)]
    struct Unavailable;

    #[async_trait]
    impl WeatherFetcher for Unavailable {
        async fn current_weather(
            &self,
            _latitude: f64,
            _longitude: f64,
        ) -> Result<WeatherSnapshot, AnalyticsError> {
            Err(AnalyticsError::WeatherFetch("provider down".to_string()))
        }
    }

    async fn app() -> Router {
        let store = Arc::new(MemoryStore::new());
        let Some(farm_id) = FarmId::parse("f1") else {
            panic!("bad id");
        };
        let profile = FarmProfile {
            farm_id,
            name: "Acme".to_string(),
            owner_id: "u1".to_string(),
            farm_type: None,
            total_size: None,
            latitude: 13.7,
            longitude: 100.5,
        };
        assert!(store.upsert_farm_base(&profile).await.is_ok());

        let bus = InMemoryEventBus::new(BusOptions::default());
        let publisher: Arc<dyn EventPublisher> = Arc::new(bus.clone());
        let (notifier, _drain) = EventNotifier::spawn(publisher, 8);
        let state = AppState {
            service: Arc::new(AnalyticsService::new(store, Arc::new(Unavailable))),
            bus,
            notifier,
        };
        build_router().with_state(state)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let Ok(response) = app.oneshot(request).await else {
            panic!("request failed");
        };
        let status = response.status();
        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body read failed");
        };
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        let Ok(request) = Request::get(uri).body(Body::empty()) else {
            panic!("bad request");
        };
        request
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        let Ok(request) = Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
        else {
            panic!("bad request");
        };
        request
    }

    /// Router over an empty store with the projection consuming the bus.
    async fn projected_app() -> (Router, InMemoryEventBus) {
        let store = Arc::new(MemoryStore::new());
        let bus = InMemoryEventBus::new(BusOptions::default());
        let projection = Arc::new(FarmAnalyticsProjection::new(
            Arc::clone(&store) as Arc<dyn AnalyticsRepository>
        ));
        if let Err(err) = projection.start(&bus).await {
            panic!("projection did not start: {err}");
        }
        let publisher: Arc<dyn EventPublisher> = Arc::new(bus.clone());
        let (notifier, _drain) = EventNotifier::spawn(publisher, 8);
        let state = AppState {
            service: Arc::new(AnalyticsService::new(store, Arc::new(Unavailable))),
            bus: bus.clone(),
            notifier,
        };
        (build_router().with_state(state), bus)
    }

    #[tokio::test]
    async fn ingested_events_reach_the_read_model() {
        let (app, bus) = projected_app().await;
        let (status, _) = send(app.clone(), get("/api/v1/farms/f9/analytics")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let event = serde_json::json!({
            "type": "farm.created",
            "source": "farm-repository",
            "aggregate_id": "f9",
            "payload": { "farm_id": "f9", "name": "Ingress Farm", "owner_id": "u7" }
        });
        let (status, body) = send(app.clone(), post_json("/api/v1/events", event)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["accepted"], 1);

        for _ in 0..500 {
            if bus.stats().acked >= 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let (status, body) = send(app, get("/api/v1/farms/f9/analytics")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["farm_name"], "Ingress Farm");
        assert_eq!(body["owner_id"], "u7");
    }

    #[tokio::test]
    async fn ingress_rejects_bad_batches() {
        let (app, bus) = projected_app().await;

        let (status, body) =
            send(app.clone(), post_json("/api/v1/events", serde_json::json!([]))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], 1001);

        let batch = serde_json::json!([
            { "type": "farm.created", "payload": { "farm_id": "f1" } },
            { "type": "farm.renamed", "payload": { "farm_id": "f1" } }
        ]);
        let (status, _) = send(app, post_json("/api/v1/events", batch)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(bus.stats().published, 0);
    }

    #[tokio::test]
    async fn closed_notifier_is_service_unavailable() {
        let store = Arc::new(MemoryStore::new());
        let bus = InMemoryEventBus::new(BusOptions::default());
        let publisher: Arc<dyn EventPublisher> = Arc::new(bus.clone());
        let (notifier, drain) = EventNotifier::spawn(publisher, 1);
        drain.abort();
        let _ = drain.await;
        let state = AppState {
            service: Arc::new(AnalyticsService::new(store, Arc::new(Unavailable))),
            bus,
            notifier,
        };
        let app = build_router().with_state(state);

        let event = serde_json::json!({ "type": "farm.deleted", "aggregate_id": "f1" });
        let (status, body) = send(app, post_json("/api/v1/events", event)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], 4001);
    }

    #[tokio::test]
    async fn health_reports_counters() {
        let (status, body) = send(app().await, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["bus"]["published"], 0);
        assert_eq!(body["notifier"]["dropped"], 0);
    }

    #[tokio::test]
    async fn analytics_lookup() {
        let (status, body) = send(app().await, get("/api/v1/farms/f1/analytics")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["farm_name"], "Acme");
        assert_eq!(body["crops"]["total_count"], 0);

        let (status, body) = send(app().await, get("/api/v1/farms/missing/analytics")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], 2001);
    }

    #[tokio::test]
    async fn status_update_round_trips() {
        let Ok(request) = Request::put("/api/v1/farms/f1/analytics/status")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"status":"needs attention"}"#))
        else {
            panic!("bad request");
        };
        let (status, body) = send(app().await, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["overall_status"], "needs attention");
    }

    #[tokio::test]
    async fn provider_failure_is_bad_gateway() {
        let (status, body) = send(app().await, get("/api/v1/farms/f1/weather")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], 5001);
    }
}
