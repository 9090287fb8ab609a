//! Local page server.
//!
//! Serves the lookup page over HTTP on localhost. Every `GET /` is a fresh
//! page load: the request address seeds a new page session, a `lot` parameter
//! triggers the lookup and an optional `file` parameter selects that file.
//! Runs until Ctrl+C.

use std::net::SocketAddr;
use std::sync::Arc;

use colored::Colorize;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

use crate::controller::QueryController;
use crate::render::CellLinks;
use crate::transport::Transport;
use crate::url_sync::PageAddress;

/// Query parameter naming the file to select after the lookup.
pub const FILE_PARAM: &str = "file";

const MAX_REQUEST_BYTES: usize = 8192;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind to port {port}: {source}")]
    BindFailed { port: u16, source: std::io::Error },

    #[error("invalid page address {0:?}")]
    InvalidAddress(String),

    #[error("failed to open browser with {program}: {source}")]
    BrowserOpenFailed {
        program: &'static str,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub port: u16,
    pub open_browser: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            open_browser: true,
        }
    }
}

/// Response statuses this server produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    BadRequest,
    NotFound,
    MethodNotAllowed,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::NotFound => 404,
            Status::MethodNotAllowed => 405,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::BadRequest => "Bad Request",
            Status::NotFound => "Not Found",
            Status::MethodNotAllowed => "Method Not Allowed",
        }
    }
}

/// A page or a plain-text error, ready to be written to the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub body: String,
    head_only: bool,
}

impl Response {
    fn page(html: String) -> Self {
        Self {
            status: Status::Ok,
            body: html,
            head_only: false,
        }
    }

    fn error(status: Status) -> Self {
        Self {
            status,
            body: status.reason().to_string(),
            head_only: false,
        }
    }

    fn content_type(&self) -> &'static str {
        match self.status {
            Status::Ok => "text/html; charset=utf-8",
            _ => "text/plain; charset=utf-8",
        }
    }

    /// Serialize as an HTTP/1.1 message; HEAD replies keep the length but drop the body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
            self.status.code(),
            self.status.reason(),
            self.content_type(),
            self.body.len(),
        )
        .into_bytes();
        if !self.head_only {
            out.extend_from_slice(self.body.as_bytes());
        }
        out
    }
}

/// Everything a request handler needs; shared across connections.
pub struct PageService<T> {
    transport: T,
    endpoint: Url,
    origin: Url,
}

impl<T: Transport + Clone> PageService<T> {
    pub fn new(transport: T, endpoint: Url, origin: Url) -> Self {
        Self {
            transport,
            endpoint,
            origin,
        }
    }

    /// Render the page for one request target (path and query).
    pub async fn render(&self, target: &str) -> Result<String, Status> {
        let address = self.origin.join(target).map_err(|_| Status::BadRequest)?;
        if address.path() != "/" {
            return Err(Status::NotFound);
        }
        let page = PageAddress::new(address);
        let file = page.param(FILE_PARAM);

        let controller =
            QueryController::new(self.transport.clone(), self.endpoint.clone(), page);
        let disposition = controller.boot().await;
        if let Some(file_id) = file
            && controller.select_by_file_id(&file_id).is_none()
        {
            debug!(file = %file_id, "requested file not in results");
        }
        debug!(path = target, ?disposition, "rendered page");

        let state = controller.snapshot();
        Ok(state.to_document(CellLinks::Page(state.address.url())))
    }

    /// Answer one raw request.
    pub async fn handle(&self, request: &str) -> Response {
        let mut parts = request.lines().next().unwrap_or("").split_whitespace();
        let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
            return Response::error(Status::BadRequest);
        };
        let head_only = match method {
            "GET" => false,
            "HEAD" => true,
            _ => return Response::error(Status::MethodNotAllowed),
        };

        let mut response = match self.render(target).await {
            Ok(html) => Response::page(html),
            Err(status) => Response::error(status),
        };
        response.head_only = head_only;
        response
    }
}

/// Run the server until Ctrl+C.
pub async fn start_server<T>(
    transport: T,
    endpoint: Url,
    config: ServeConfig,
) -> Result<(), ServeError>
where
    T: Transport + Clone + 'static,
{
    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::BindFailed {
            port: config.port,
            source,
        })?;
    let port = listener.local_addr().map(|a| a.port()).unwrap_or(config.port);
    let page_url = format!("http://localhost:{port}/");
    let origin = Url::parse(&page_url).map_err(|_| ServeError::InvalidAddress(page_url.clone()))?;
    let service = Arc::new(PageService::new(transport, endpoint, origin));

    eprintln!("Lookup page at {} (Ctrl+C to stop)", page_url.cyan().bold());
    info!(port, "page server listening");

    if config.open_browser
        && let Err(e) = open_browser(&page_url)
    {
        warn!(error = %e, "could not open browser");
    }

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((mut stream, peer)) => {
                    let service = Arc::clone(&service);
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; MAX_REQUEST_BYTES];
                        let n = match stream.read(&mut buf).await {
                            Ok(n) if n > 0 => n,
                            _ => return,
                        };
                        let request = String::from_utf8_lossy(&buf[..n]);
                        let response = service.handle(&request).await;
                        debug!(%peer, status = response.status.code(), "served request");
                        let _ = stream.write_all(&response.to_bytes()).await;
                        let _ = stream.shutdown().await;
                    });
                }
                Err(e) => warn!(error = %e, "accept failed"),
            },
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    info!("page server stopped");
    Ok(())
}

fn open_browser(url: &str) -> Result<(), ServeError> {
    let (program, args): (&'static str, &[&str]) = if cfg!(target_os = "macos") {
        ("open", &[])
    } else if cfg!(target_os = "windows") {
        ("cmd", &["/C", "start", ""])
    } else {
        ("xdg-open", &[])
    };
    std::process::Command::new(program)
        .args(args)
        .arg(url)
        .spawn()
        .map(drop)
        .map_err(|source| ServeError::BrowserOpenFailed { program, source })
}
