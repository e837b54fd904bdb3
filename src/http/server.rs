//! HTTP server implementation.

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{error, info};

use super::routes::router;
use crate::context::AppContext;
use crate::error::Result;

/// HTTP server for the rate-limited API.
pub struct HttpServer {
    /// Bound listener
    listener: TcpListener,
    /// Shared application context
    ctx: AppContext,
}

impl HttpServer {
    /// Bind the listener. Fails immediately if the address is unavailable.
    pub async fn bind(addr: SocketAddr, ctx: AppContext) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, ctx })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve requests until `signal` resolves, then drain in-flight requests.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr()?;
        info!(
            addr = %addr,
            service = %self.ctx.settings().app.service_name,
            "Starting HTTP server with graceful shutdown"
        );

        axum::serve(self.listener, router(self.ctx))
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP server failed");
                e.into()
            })
    }
}
