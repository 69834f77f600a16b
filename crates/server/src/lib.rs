use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

use serde::Serialize;
pub use server::{ServerState, router, run_with_listener};

mod data;
mod server;

pub mod types {
    pub mod transaction {
        pub use api_types::transaction::TransactionView;
    }
}

pub enum ServerError {
    Engine(EngineError),
}

#[derive(Serialize)]
struct Error {
    error: String,
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        EngineError::Execution { .. }
        | EngineError::Format { .. }
        | EngineError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Engine(err) => {
                tracing::error!("failed to load ledger: {err}");
                (
                    status_for_engine_error(&err),
                    "failed to load ledger".to_string(),
                )
            }
        };

        (status, Json(Error { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use axum::{
        body::Body,
        http::{Request, header},
    };
    use chrono::NaiveDate;
    use engine::{Extract, LedgerCache, ResultEngine, Transaction};
    use futures::future::BoxFuture;
    use http_body_util::BodyExt;
    use rust_decimal::Decimal;
    use tower::ServiceExt;

    use super::*;

    struct Source {
        calls: AtomicUsize,
        fail: bool,
    }

    impl Source {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    impl Extract for Source {
        fn extract(&self) -> BoxFuture<'_, ResultEngine<Vec<Transaction>>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if self.fail {
                    return Err(EngineError::Execution {
                        command: "ledger accounts --no-pager".to_string(),
                        reason: "exit status: 1".to_string(),
                    });
                }
                Ok(vec![Transaction {
                    time: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
                    account: "Assets:Checking".to_string(),
                    payee: "Coffee Shop Purchase".to_string(),
                    amount: Decimal::new(10_000, 2),
                    total: Decimal::new(50_000, 2),
                }])
            })
        }
    }

    async fn get(app: axum::Router, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
        let res = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let content_type = res
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = res.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, content_type, body)
    }

    #[test]
    fn timeout_maps_to_504() {
        let err = EngineError::Timeout {
            operation: "ledger accounts".to_string(),
            after: Duration::from_secs(1),
        };
        let res = ServerError::from(err).into_response();
        assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn format_error_maps_to_500() {
        let err = EngineError::Format {
            line_no: 1,
            line: "x".to_string(),
            reason: "bad".to_string(),
        };
        let res = ServerError::from(err).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn data_loads_empty_cache_once() {
        let source = Source::new(false);
        let cache = Arc::new(LedgerCache::new(source.clone()));
        let static_dir = tempfile::tempdir().unwrap();

        let (status, content_type, body) =
            get(router(cache.clone(), static_dir.path()), "/data").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("application/json"));
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{
                "time": "2024-01-15",
                "account": "Assets:Checking",
                "payee": "Coffee Shop Purchase",
                "amount": 100.0,
                "total": 500.0,
            }])
        );

        let (status, _, _) = get(router(cache, static_dir.path()), "/data").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn data_after_refresh_does_not_extract() {
        let source = Source::new(false);
        let cache = Arc::new(LedgerCache::new(source.clone()));
        cache.refresh().await.unwrap();
        let static_dir = tempfile::tempdir().unwrap();

        let (status, _, _) = get(router(cache, static_dir.path()), "/data").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_on_demand_load_is_500_with_generic_message() {
        let cache = Arc::new(LedgerCache::new(Source::new(true)));
        let static_dir = tempfile::tempdir().unwrap();

        let (status, _, body) = get(router(cache, static_dir.path()), "/data").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "error": "failed to load ledger" }));
    }

    #[tokio::test]
    async fn static_assets_are_served_below_root() {
        let cache = Arc::new(LedgerCache::new(Source::new(true)));
        let static_dir = tempfile::tempdir().unwrap();
        std::fs::write(static_dir.path().join("index.html"), "<h1>ledger</h1>").unwrap();
        std::fs::create_dir(static_dir.path().join("js")).unwrap();
        std::fs::write(static_dir.path().join("js/app.js"), "draw();").unwrap();

        let (status, _, body) = get(router(cache.clone(), static_dir.path()), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"<h1>ledger</h1>");

        let (status, _, body) = get(router(cache.clone(), static_dir.path()), "/js/app.js").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"draw();");

        let (status, _, _) = get(router(cache, static_dir.path()), "/missing.css").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
