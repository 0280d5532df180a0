use ajj::{
    pubsub::{ajj_websocket, AxumWsCfg},
    Router,
};
use axum::http::{HeaderValue, Method};
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::error;

/// Await a [`tokio::task::JoinHandle`] wrapping an `Option`, turning both a
/// panicked task and a cancelled handler into a string error.
macro_rules! await_jh_option {
    ($jh:expr) => {
        match $jh.await {
            Ok(Some(output)) => output,
            _ => return Err("task panicked or was cancelled".to_string()),
        }
    };
}
pub(crate) use await_jh_option;

fn cors_layer(domains: Option<&str>) -> CorsLayer {
    let layer =
        CorsLayer::new().allow_methods([Method::GET, Method::POST]).allow_headers(Any);
    match domains.map(str::trim) {
        None | Some("*") => layer.allow_origin(Any),
        Some(domains) => {
            let origins: Vec<HeaderValue> =
                domains.split(',').filter_map(|domain| domain.trim().parse().ok()).collect();
            layer.allow_origin(AllowOrigin::list(origins))
        }
    }
}

/// Serve the router over HTTP on the given addresses.
pub(crate) async fn serve_axum(
    router: Router<()>,
    addrs: &[SocketAddr],
    cors: Option<&str>,
) -> eyre::Result<JoinHandle<()>> {
    let app = router.into_axum("/").layer(cors_layer(cors));
    let listener = tokio::net::TcpListener::bind(addrs).await?;
    Ok(tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            error!(%err, "http server exited");
        }
    }))
}

/// Serve the router over WebSockets on the given addresses. Connections made
/// here carry notifications, so subscriptions work.
pub(crate) async fn serve_ws(
    router: Router<()>,
    addrs: &[SocketAddr],
    cors: Option<&str>,
) -> eyre::Result<JoinHandle<()>> {
    let app = axum::Router::new()
        .route("/", axum::routing::any(ajj_websocket))
        .with_state(AxumWsCfg::new(router))
        .layer(cors_layer(cors));
    let listener = tokio::net::TcpListener::bind(addrs).await?;
    Ok(tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            error!(%err, "ws server exited");
        }
    }))
}
