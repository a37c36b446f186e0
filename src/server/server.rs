//! Metadata server setup and request handling.
//!
//! # Responsibilities
//! - Create the Axum router for the compute metadata surface
//! - Enforce the `Metadata-Flavor: Google` header on metadata paths
//! - Serve the declared identity out of the claims document
//! - Issue bearer tokens through the resolved credential
//! - Bind TCP or unix-domain-socket listeners; drain on shutdown

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use thiserror::Error;
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::claims::Claims;
use crate::config::schema::EmulatorConfig;
use crate::credentials::types::{CredentialError, ResolvedCredential};
use crate::lifecycle::ManagedServer;
use crate::observability::metrics;

const METADATA_FLAVOR: &str = "Metadata-Flavor";
const METADATA_FLAVOR_VALUE: &str = "Google";
const SERVER_HEADER_VALUE: &str = "Metadata Server for VM";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Error type for server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The configured interface/port pair is not a valid socket address.
    #[error("invalid bind address {addr}: {source}")]
    InvalidBindAddress {
        addr: String,
        source: std::net::AddrParseError,
    },

    /// Failed to bind the listener.
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },

    /// The serve task failed or panicked.
    #[error("server task failed: {0}")]
    Serve(io::Error),

    /// `start` was called on a server that is already running.
    #[error("server is already running")]
    AlreadyRunning,

    /// `shutdown` was called on a server that never started.
    #[error("server is not running")]
    NotRunning,
}

/// Application state injected into handlers.
#[derive(Clone)]
struct AppState {
    claims: Arc<Claims>,
    credential: Arc<ResolvedCredential>,
}

/// HTTP emulation of the compute metadata endpoint.
///
/// Owns the serve task between `start` and `shutdown`; the lifecycle
/// orchestrator drives both exactly once.
pub struct MetadataServer {
    config: EmulatorConfig,
    router: Router,
    tcp_addr: Option<SocketAddr>,
    local_addr: Option<SocketAddr>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<(), io::Error>>>,
}

impl MetadataServer {
    /// Create a server from validated configuration and the resolved
    /// credential. Does not bind anything yet.
    pub fn new(
        config: EmulatorConfig,
        credential: Arc<ResolvedCredential>,
        claims: Arc<Claims>,
    ) -> Result<Self, ServerError> {
        let tcp_addr = match config.domain_socket {
            Some(_) => None,
            None => {
                let addr = format!("{}:{}", config.bind_interface, config.port);
                Some(addr.parse().map_err(|e| ServerError::InvalidBindAddress {
                    addr: addr.clone(),
                    source: e,
                })?)
            }
        };

        let router = build_router(AppState { claims, credential });

        Ok(Self {
            config,
            router,
            tcp_addr,
            local_addr: None,
            shutdown_tx: None,
            task: None,
        })
    }

    /// Bind listeners and begin serving in a background task.
    pub async fn start(&mut self) -> Result<(), ServerError> {
        if self.task.is_some() {
            return Err(ServerError::AlreadyRunning);
        }

        let (tx, rx) = oneshot::channel::<()>();
        let shutdown = async move {
            let _ = rx.await;
        };
        let app = self.router.clone();

        let task = if let Some(path) = self.config.domain_socket.clone() {
            // A stale socket from a previous run would make bind fail.
            if path.exists() {
                let _ = std::fs::remove_file(&path);
            }
            let listener =
                UnixListener::bind(&path).map_err(|e| ServerError::Bind {
                    addr: path.display().to_string(),
                    source: e,
                })?;
            tracing::info!(socket = %path.display(), "Metadata server listening");
            tokio::spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(shutdown)
                    .await
            })
        } else {
            let addr = self.tcp_addr.ok_or(ServerError::NotRunning)?;
            let listener = TcpListener::bind(addr).await.map_err(|e| ServerError::Bind {
                addr: addr.to_string(),
                source: e,
            })?;
            let local_addr = listener.local_addr().map_err(ServerError::Serve)?;
            self.local_addr = Some(local_addr);
            tracing::info!(address = %local_addr, "Metadata server listening");
            tokio::spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(shutdown)
                    .await
            })
        };

        self.shutdown_tx = Some(tx);
        self.task = Some(task);
        Ok(())
    }

    /// Stop accepting connections and drain in-flight requests.
    pub async fn shutdown(mut self) -> Result<(), ServerError> {
        let (tx, task) = match (self.shutdown_tx.take(), self.task.take()) {
            (Some(tx), Some(task)) => (tx, task),
            _ => return Err(ServerError::NotRunning),
        };

        let _ = tx.send(());
        task.await
            .map_err(|e| ServerError::Serve(io::Error::other(e)))?
            .map_err(ServerError::Serve)?;

        if let Some(path) = &self.config.domain_socket {
            let _ = std::fs::remove_file(path);
        }
        tracing::info!("Metadata server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    /// The bound TCP address, once `start` has succeeded.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

#[async_trait::async_trait]
impl ManagedServer for MetadataServer {
    type Error = ServerError;

    async fn start(&mut self) -> Result<(), ServerError> {
        MetadataServer::start(self).await
    }

    async fn shutdown(self) -> Result<(), ServerError> {
        MetadataServer::shutdown(self).await
    }
}

/// Build the Axum router with all middleware layers.
fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/computeMetadata/v1/project/project-id", get(project_id))
        .route(
            "/computeMetadata/v1/project/numeric-project-id",
            get(numeric_project_id),
        )
        .route("/computeMetadata/v1/instance/hostname", get(hostname))
        .route("/computeMetadata/v1/instance/zone", get(zone))
        .route(
            "/computeMetadata/v1/instance/service-accounts/",
            get(service_accounts),
        )
        .route(
            "/computeMetadata/v1/instance/service-accounts/{account}/email",
            get(account_email),
        )
        .route(
            "/computeMetadata/v1/instance/service-accounts/{account}/scopes",
            get(account_scopes),
        )
        .route(
            "/computeMetadata/v1/instance/service-accounts/{account}/token",
            get(account_token),
        )
        .layer(middleware::from_fn(flavor_guard))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT)),
        )
}

/// Reject metadata requests without the flavor header; stamp every
/// response with the headers real callers key off.
async fn flavor_guard(request: Request, next: Next) -> Response {
    let guarded = request.uri().path().starts_with("/computeMetadata");
    let flavored = request
        .headers()
        .get(METADATA_FLAVOR)
        .is_some_and(|v| v == METADATA_FLAVOR_VALUE);

    let resource = resource_class(request.uri().path());

    let mut response = if guarded && !flavored {
        (
            StatusCode::FORBIDDEN,
            "Missing Metadata-Flavor:Google header.\n",
        )
            .into_response()
    } else {
        next.run(request).await
    };

    metrics::record_request(resource, response.status().as_u16());

    let headers = response.headers_mut();
    headers.insert(
        METADATA_FLAVOR,
        HeaderValue::from_static(METADATA_FLAVOR_VALUE),
    );
    headers.insert(header::SERVER, HeaderValue::from_static(SERVER_HEADER_VALUE));
    response
}

fn resource_class(path: &str) -> &'static str {
    if path == "/" {
        "root"
    } else if path.ends_with("/token") {
        "token"
    } else if path.contains("/service-accounts") {
        "service-accounts"
    } else if path.contains("/project/") {
        "project"
    } else if path.contains("/instance/") {
        "instance"
    } else {
        "other"
    }
}

async fn root() -> &'static str {
    "computeMetadata/\n"
}

async fn project_id(State(state): State<AppState>) -> String {
    state.claims.project_id().to_string()
}

async fn numeric_project_id(State(state): State<AppState>) -> String {
    state
        .claims
        .compute_metadata
        .v1
        .project
        .numeric_project_id
        .to_string()
}

async fn hostname(State(state): State<AppState>) -> Response {
    text_or_not_found(&state.claims.compute_metadata.v1.instance.hostname)
}

async fn zone(State(state): State<AppState>) -> Response {
    text_or_not_found(&state.claims.compute_metadata.v1.instance.zone)
}

fn text_or_not_found(value: &str) -> Response {
    if value.is_empty() {
        StatusCode::NOT_FOUND.into_response()
    } else {
        value.to_string().into_response()
    }
}

async fn service_accounts(State(state): State<AppState>) -> String {
    let mut names: Vec<&String> = state.claims.service_accounts().keys().collect();
    names.sort();
    let mut listing = String::new();
    for name in names {
        listing.push_str(name);
        listing.push_str("/\n");
    }
    listing
}

async fn account_email(
    State(state): State<AppState>,
    Path(account): Path<String>,
) -> Response {
    match state.claims.service_account(&account) {
        Some(sa) => sa.email.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn account_scopes(
    State(state): State<AppState>,
    Path(account): Path<String>,
) -> Response {
    match state.claims.service_account(&account) {
        Some(sa) => {
            let mut scopes = sa.scopes.join("\n");
            scopes.push('\n');
            scopes.into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn account_token(
    State(state): State<AppState>,
    Path(account): Path<String>,
) -> Response {
    if state.claims.service_account(&account).is_none() {
        return StatusCode::NOT_FOUND.into_response();
    }

    match state.credential.token().await {
        Ok(token) => Json(token).into_response(),
        Err(CredentialError::TokenSourceUnavailable) => (
            StatusCode::NOT_IMPLEMENTED,
            "token issuance is delegated to the hardware token layer",
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, account = %account, "Token issuance failed");
            (
                StatusCode::BAD_GATEWAY,
                "credential backend did not issue a token",
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_classes() {
        assert_eq!(resource_class("/"), "root");
        assert_eq!(
            resource_class("/computeMetadata/v1/project/project-id"),
            "project"
        );
        assert_eq!(
            resource_class("/computeMetadata/v1/instance/service-accounts/default/token"),
            "token"
        );
        assert_eq!(
            resource_class("/computeMetadata/v1/instance/service-accounts/"),
            "service-accounts"
        );
        assert_eq!(resource_class("/computeMetadata/v1/instance/zone"), "instance");
        assert_eq!(resource_class("/favicon.ico"), "other");
    }
}
