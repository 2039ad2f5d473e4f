//! Preview server implementation.

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::{
    body::{self, Body},
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    handler::HandlerWithoutStateExt,
    http::{header, StatusCode},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::sync::broadcast::error::RecvError;
use tower_http::services::ServeDir;

use crate::livereload::{
    livereload_client_script, ReloadHub, ReloadMessage, LIVERELOAD_PATH, LIVERELOAD_SCRIPT_PATH,
};

/// Largest HTML page the live reload script is injected into.
const MAX_INJECT_BYTES: usize = 32 * 1024 * 1024;

/// Configuration for the preview server.
#[derive(Debug, Clone)]
pub struct PreviewServerConfig {
    /// Name shown in logs
    pub name: String,

    /// Directory to serve
    pub root: PathBuf,

    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Open browser on start
    pub open: bool,

    /// Host name used in the URL opened in the browser
    pub open_host: String,
}

impl Default for PreviewServerConfig {
    fn default() -> Self {
        Self {
            name: "Antora Doc Server".to_string(),
            root: PathBuf::from("docs-dev"),
            port: 5353,
            host: "127.0.0.1".to_string(),
            open: true,
            open_host: "localhost".to_string(),
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address {0}")]
    InvalidAddress(String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),

    #[error("Server error: {0}")]
    ServeError(String),
}

/// Shared server state.
#[derive(Clone)]
struct ServerState {
    hub: ReloadHub,
}

/// Static file server with live reload.
pub struct PreviewServer {
    config: PreviewServerConfig,
    hub: ReloadHub,
}

impl PreviewServer {
    /// Create a new preview server broadcasting reloads from `hub`.
    pub fn new(config: PreviewServerConfig, hub: ReloadHub) -> Self {
        Self { config, hub }
    }

    pub fn config(&self) -> &PreviewServerConfig {
        &self.config
    }

    /// Socket address to bind.
    pub fn address(&self) -> Result<SocketAddr, ServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        addr.parse()
            .map_err(|_| ServerError::InvalidAddress(addr.clone()))
    }

    /// URL opened in the browser.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.config.open_host, self.config.port)
    }

    /// Build the router: live reload endpoints plus the output directory,
    /// with the client script injected into HTML pages.
    pub fn router(&self) -> Router {
        let state = ServerState {
            hub: self.hub.clone(),
        };

        Router::new()
            .route(LIVERELOAD_PATH, get(ws_handler))
            .route(LIVERELOAD_SCRIPT_PATH, get(script_handler))
            .fallback_service(
                ServeDir::new(&self.config.root).not_found_service(not_found_handler.into_service()),
            )
            .layer(middleware::map_response(inject_livereload))
            .with_state(state)
    }

    /// Start the preview server. Runs until the process is stopped.
    pub async fn start(self) -> Result<(), ServerError> {
        let addr = self.address()?;
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        let url = self.url();
        tracing::info!(
            "{} serving {} at {}",
            self.config.name,
            self.config.root.display(),
            url
        );

        if !self.config.root.exists() {
            tracing::warn!(
                "{} does not exist yet; it will be served once the site is generated",
                self.config.root.display()
            );
        }

        if self.config.open {
            if let Err(e) = open::that(&url) {
                tracing::warn!("Failed to open browser: {}", e);
            }
        }

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::ServeError(e.to_string()))?;

        Ok(())
    }
}

/// Handler for the live reload WebSocket endpoint.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ServerState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state.hub))
}

/// Handle a WebSocket connection.
async fn handle_ws(mut socket: WebSocket, hub: ReloadHub) {
    let mut rx = hub.subscribe();
    tracing::debug!("Browser connected ({} total)", hub.subscriber_count());

    if send_message(&mut socket, &ReloadMessage::Connected)
        .await
        .is_err()
    {
        return;
    }

    loop {
        match rx.recv().await {
            Ok(msg) => {
                if send_message(&mut socket, &msg).await.is_err() {
                    break;
                }
            }
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    }

    tracing::debug!("Browser disconnected");
}

async fn send_message(socket: &mut WebSocket, msg: &ReloadMessage) -> Result<(), ()> {
    let json = serde_json::to_string(msg).map_err(|e| {
        tracing::warn!("Failed to encode reload message: {}", e);
    })?;
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

/// Handler for the live reload client script.
async fn script_handler() -> impl IntoResponse {
    let script = livereload_client_script(LIVERELOAD_PATH);
    ([(header::CONTENT_TYPE, "application/javascript")], script)
}

/// Placeholder for pages that do not exist (yet). It carries the live
/// reload script like any other page, so it refreshes after the next build.
async fn not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Html(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>Not found</title></head>\n\
<body><h1>Not found</h1><p>This page has not been generated. \
It will reload after the next build.</p></body>\n</html>\n",
        ),
    )
}

/// Inject the live reload script tag into HTML pages.
async fn inject_livereload(response: Response) -> Response {
    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));
    let is_page = matches!(response.status(), StatusCode::OK | StatusCode::NOT_FOUND);

    if !is_page || !is_html {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match body::to_bytes(body, MAX_INJECT_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to read page for live reload injection: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let html = inject_script_tag(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);

    Response::from_parts(parts, Body::from(html))
}

/// Insert the client script tag before `</body>`, or append it when the
/// page has no closing body tag.
pub fn inject_script_tag(html: &str) -> String {
    let tag = format!(r#"<script src="{}"></script>"#, LIVERELOAD_SCRIPT_PATH);

    match html.to_ascii_lowercase().rfind("</body>") {
        Some(pos) => format!("{}{}{}", &html[..pos], tag, &html[pos..]),
        None => format!("{}{}", html, tag),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use axum::http::Request;
    use tempfile::tempdir;
    use tower::ServiceExt;

    async fn get_page(router: Router, uri: &str) -> (StatusCode, Option<String>, String) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn server_for(root: PathBuf) -> PreviewServer {
        PreviewServer::new(
            PreviewServerConfig {
                root,
                open: false,
                ..Default::default()
            },
            ReloadHub::new(),
        )
    }

    #[test]
    fn creates_server_with_default_config() {
        let server = PreviewServer::new(PreviewServerConfig::default(), ReloadHub::new());

        assert_eq!(server.config().port, 5353);
        assert_eq!(server.url(), "http://localhost:5353");
        assert_eq!(
            server.address().unwrap(),
            "127.0.0.1:5353".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn rejects_invalid_host() {
        let server = PreviewServer::new(
            PreviewServerConfig {
                host: "not a host".to_string(),
                ..Default::default()
            },
            ReloadHub::new(),
        );

        assert!(matches!(
            server.address(),
            Err(ServerError::InvalidAddress(_))
        ));
    }

    #[test]
    fn injects_before_closing_body() {
        let html = inject_script_tag("<html><BODY><p>Hi</p></BODY></html>");

        assert_eq!(
            html,
            r#"<html><BODY><p>Hi</p><script src="/__livereload.js"></script></BODY></html>"#
        );
    }

    #[test]
    fn appends_when_body_is_missing() {
        let html = inject_script_tag("<p>Fragment</p>");

        assert!(html.ends_with(r#"<script src="/__livereload.js"></script>"#));
    }

    #[tokio::test]
    async fn serves_index_with_livereload() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("index.html"),
            "<html><body><h1>Docs</h1></body></html>",
        )
        .unwrap();

        let (status, _, body) = get_page(server_for(temp.path().to_path_buf()).router(), "/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<h1>Docs</h1>"));
        assert!(body.contains(r#"<script src="/__livereload.js"></script></body>"#));
    }

    #[tokio::test]
    async fn leaves_other_assets_untouched() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("site.css"), "body { margin: 0 }").unwrap();

        let (status, _, body) =
            get_page(server_for(temp.path().to_path_buf()).router(), "/site.css").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "body { margin: 0 }");
    }

    #[tokio::test]
    async fn serves_client_script() {
        let temp = tempdir().unwrap();

        let (status, content_type, body) = get_page(
            server_for(temp.path().to_path_buf()).router(),
            LIVERELOAD_SCRIPT_PATH,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("application/javascript"));
        assert!(body.contains(LIVERELOAD_PATH));
    }

    #[tokio::test]
    async fn missing_page_reloads_after_build() {
        let temp = tempdir().unwrap();

        let (status, _, body) =
            get_page(server_for(temp.path().join("missing")).router(), "/").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("has not been generated"));
        assert!(body.contains(r#"<script src="/__livereload.js"></script></body>"#));
    }
}
