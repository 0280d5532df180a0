use crate::util::{serve_axum, serve_ws};
use ajj::Router;
use std::net::SocketAddr;
use tokio::task::JoinHandle;

/// Guard for the running RPC servers. Dropping it shuts them down.
pub struct RpcServerGuard {
    http: Option<JoinHandle<()>>,
    ws: Option<JoinHandle<()>>,
}

impl core::fmt::Debug for RpcServerGuard {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RpcServerGuard")
            .field("http", &self.http.is_some())
            .field("ws", &self.ws.is_some())
            .finish()
    }
}

impl Drop for RpcServerGuard {
    fn drop(&mut self) {
        if let Some(http) = self.http.take() {
            http.abort();
        }
        if let Some(ws) = self.ws.take() {
            ws.abort();
        }
    }
}

/// Configuration for the RPC server.
///
/// Subscriptions need a connection that can carry pushes, so `eth_subscribe`
/// only succeeds on the WS addresses; over plain HTTP it returns an error.
#[derive(Clone, Debug)]
pub struct ServeConfig {
    /// HTTP server addresses.
    pub http: Vec<SocketAddr>,
    /// CORS header to be used for HTTP (if any).
    pub http_cors: Option<String>,
    /// WS server addresses.
    pub ws: Vec<SocketAddr>,
    /// CORS header to be used for WS (if any).
    pub ws_cors: Option<String>,
}

impl ServeConfig {
    async fn serve_http(&self, router: Router<()>) -> eyre::Result<Option<JoinHandle<()>>> {
        if self.http.is_empty() {
            return Ok(None);
        }
        serve_axum(router, &self.http, self.http_cors.as_deref()).await.map(Some)
    }

    async fn serve_ws(&self, router: Router<()>) -> eyre::Result<Option<JoinHandle<()>>> {
        if self.ws.is_empty() {
            return Ok(None);
        }
        serve_ws(router, &self.ws, self.ws_cors.as_deref()).await.map(Some)
    }

    /// Serve the router on the configured addresses.
    pub async fn serve(&self, router: Router<()>) -> eyre::Result<RpcServerGuard> {
        let (http, ws) =
            tokio::try_join!(self.serve_http(router.clone()), self.serve_ws(router))?;
        Ok(RpcServerGuard { http, ws })
    }
}
