//! RPC Method Handlers
//!
//! Turns JSON-RPC parameters into diagnostic requests and maps the outcome.

use crate::error::to_rpc_error;
use crate::types::{
    DiagnosticResponse, DigRequest, HealthResponse, NmapRequest, PingRequest, StatsResponse,
    TracerouteRequest, WhoisRequest,
};
use jsonrpsee::types::ErrorObjectOwned;
use netdiag_core::application::DiagnosticService;
use netdiag_core::domain::{DiagnosticRequest, DomainError};
use netdiag_core::error::AppError;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    service: Arc<DiagnosticService>,
    start_time: Instant,
}

impl RpcHandler {
    pub fn new(service: Arc<DiagnosticService>) -> Self {
        Self {
            service,
            start_time: Instant::now(),
        }
    }

    /// net.dig.v1
    pub async fn dig(&self, params: DigRequest) -> Result<DiagnosticResponse, ErrorObjectOwned> {
        self.run(params.into_diagnostic()).await
    }

    /// net.ping.v1
    pub async fn ping(&self, params: PingRequest) -> Result<DiagnosticResponse, ErrorObjectOwned> {
        self.run(params.into_diagnostic()).await
    }

    /// net.traceroute.v1
    pub async fn traceroute(
        &self,
        params: TracerouteRequest,
    ) -> Result<DiagnosticResponse, ErrorObjectOwned> {
        self.run(params.into_diagnostic()).await
    }

    /// net.nmap.v1
    pub async fn nmap(&self, params: NmapRequest) -> Result<DiagnosticResponse, ErrorObjectOwned> {
        self.run(params.into_diagnostic()).await
    }

    /// net.whois.v1
    pub async fn whois(
        &self,
        params: WhoisRequest,
    ) -> Result<DiagnosticResponse, ErrorObjectOwned> {
        self.run(params.into_diagnostic()).await
    }

    /// admin.health.v1
    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: "OK".to_string(),
        }
    }

    /// admin.stats.v1
    pub fn stats(&self) -> StatsResponse {
        StatsResponse {
            queue: self.service.queue().stats(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    async fn run(
        &self,
        request: Result<DiagnosticRequest, DomainError>,
    ) -> Result<DiagnosticResponse, ErrorObjectOwned> {
        let request = request.map_err(|e| to_rpc_error(AppError::from(e)))?;

        match self.service.run(request).await {
            Ok(result) => Ok(DiagnosticResponse::from(result)),
            Err(e) => {
                debug!(error = %e, client_error = e.is_client_error(), "Diagnostic rejected");
                Err(to_rpc_error(e))
            }
        }
    }
}
