use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tokio::sync::Semaphore;

/// Caps the number of game generations running at once. Each one fans out
/// into several model calls, so excess requests are turned away instead of
/// queued.
#[derive(Clone, Debug)]
pub struct GenerationGuard {
    permits: Arc<Semaphore>,
    limit: usize,
}

impl GenerationGuard {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

pub async fn generation_guard_middleware(
    State(guard): State<GenerationGuard>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Ok(_permit) = guard.permits.clone().try_acquire_owned() else {
        tracing::warn!(limit = guard.limit, "Rejecting generation request, too many in flight");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "status": "error",
                "error": "Too many game generations in progress, retry later",
            })),
        )
            .into_response();
    };
    next.run(req).await
}
