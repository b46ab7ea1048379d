//! JSON-RPC Server
//!
//! Serves the diagnostic methods as JSON-RPC 2.0 over HTTP.

use crate::handler::RpcHandler;
use crate::types::{DigRequest, NmapRequest, PingRequest, TracerouteRequest, WhoisRequest};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::RpcModule;
use netdiag_core::application::DiagnosticService;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "0.0.0.0";
const DEFAULT_RPC_PORT: u16 = 8080;

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, service: Arc<DiagnosticService>) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(service)),
        }
    }

    /// Start the JSON-RPC server
    ///
    /// Returns the bound address (useful with port 0) and the server handle.
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle), String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| format!("Failed to read bound address: {}", e))?;

        let mut module = RpcModule::new(());

        // Diagnostics
        let handler = self.handler.clone();
        module
            .register_async_method("net.dig.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: DigRequest = params.parse()?;
                    handler.dig(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("net.ping.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: PingRequest = params.parse()?;
                    handler.ping(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("net.traceroute.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: TracerouteRequest = params.parse()?;
                    handler.traceroute(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("net.nmap.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: NmapRequest = params.parse()?;
                    handler.nmap(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("net.whois.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: WhoisRequest = params.parse()?;
                    handler.whois(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        // Admin APIs (parameters ignored)
        let handler = self.handler.clone();
        module
            .register_method("admin.health.v1", move |_, _, _| {
                Ok::<_, ErrorObjectOwned>(handler.health())
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_method("admin.stats.v1", move |_, _, _| {
                Ok::<_, ErrorObjectOwned>(handler.stats())
            })
            .map_err(|e| e.to_string())?;

        info!(
            host = %self.config.host,
            port = local_addr.port(),
            "JSON-RPC server listening"
        );

        let handle = server.start(module);
        Ok((local_addr, handle))
    }
}
