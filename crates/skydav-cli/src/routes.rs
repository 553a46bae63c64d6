//! HTTP route definitions

use crate::error::DavError;
use crate::state::UserSession;
use crate::{handlers, middleware, AppState};
use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

/// Create the main router
pub fn create_router(state: Arc<AppState>) -> Router {
    let rate_limiter = middleware::create_rate_limiter(state.config.rate_limit_rps);

    // every path is a resource and the method set includes extension
    // methods, so a single fallback does the dispatching
    let router = Router::new()
        .fallback(dispatch)
        .layer(axum_middleware::from_fn_with_state(
            rate_limiter,
            middleware::rate_limit_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            Arc::clone(&state),
            middleware::auth_middleware,
        ))
        // outside auth so rejected requests are logged too
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn(middleware::request_id_middleware));

    let router = if state.config.cors_enabled {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
    } else {
        router
    };

    router
        .layer(
            ServiceBuilder::new()
                .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
                .layer(TraceLayer::new_for_http()),
        )
        .with_state(state)
}

/// Route a request to its handler by method
async fn dispatch(State(state): State<Arc<AppState>>, request: Request<Body>) -> Response {
    if request.method() == Method::OPTIONS {
        return handlers::options();
    }

    let Some(session) = request.extensions().get::<UserSession>().cloned() else {
        return DavError::Unauthorized.into_response();
    };
    let ctx = state.context(&session);

    let path = match handlers::request_path(request.uri()) {
        Ok(path) => path,
        Err(e) => return e.into_response(),
    };
    let (parts, body) = request.into_parts();
    let headers = &parts.headers;
    let move_status = state.config.collection_move_status;

    let result = match parts.method.as_str() {
        "GET" => handlers::get(&ctx, &path).await,
        "HEAD" => handlers::head(&ctx, &path).await,
        "PROPFIND" => handlers::propfind(&ctx, &path, headers).await,
        "PUT" => handlers::put(&ctx, &path, headers, body).await,
        "MKCOL" => handlers::mkcol(&ctx, &path).await,
        "DELETE" => handlers::delete(&ctx, &path).await,
        "COPY" => handlers::copy(&ctx, &path, headers, move_status).await,
        "MOVE" => handlers::move_to(&ctx, &path, headers, move_status).await,
        "PROPPATCH" | "LOCK" | "UNLOCK" => Err(DavError::NotImplemented(parts.method.to_string())),
        other => Err(DavError::MethodNotAllowed(other.to_string())),
    };

    result.unwrap_or_else(IntoResponse::into_response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GatewayConfig;
    use axum::http::StatusCode;
    use skydav_store::MemoryBackend;
    use std::sync::Mutex;
    use tower::ServiceExt;
    use tracing::instrument::WithSubscriber;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_rejected_requests_are_logged() {
        let state = Arc::new(AppState::with_memory_backend(
            GatewayConfig::default(),
            MemoryBackend::new(),
        ));
        let app = create_router(state);

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let response = app
            .oneshot(Request::builder().uri("/c").body(Body::empty()).unwrap())
            .with_subscriber(subscriber)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key("x-request-id"));

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("Request completed"));
        assert!(logs.contains("status=401"));
    }
}
