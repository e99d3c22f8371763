//! Preview server
//!
//! A deliberately small HTTP/1.1 server: one connection at a time, no
//! keep-alive, no request bodies. Existing files under the document root are
//! served with conditional GET support, everything else goes through the
//! route handlers registered for the request method.

mod mime;
mod request;
mod response;

pub use mime::MimeTypes;
pub use request::{read_head, Request};
pub use response::{reason_phrase, HandlerResult, Response, WebResponse};

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use md5::{Digest, Md5};
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use crate::error::ServerError;
use crate::helpers::{http_date, parse_http_date};

/// A route handler: inspects the request, writes to the response, and says
/// whether it actually handled the request
pub type Handler = Box<dyn Fn(&Request, &mut WebResponse) -> HandlerResult>;

struct Route {
    pattern: Regex,
    handler: Handler,
}

/// Single-connection preview server
pub struct WebServer {
    document_root: PathBuf,
    mime_types: MimeTypes,
    routes: HashMap<String, Vec<Route>>,
}

impl WebServer {
    /// Both an invalid document root and an unreadable MIME table are fatal
    pub fn new<P: AsRef<Path>>(document_root: P, mime_types: &Path) -> Result<Self, ServerError> {
        let document_root = document_root.as_ref().to_path_buf();
        if !document_root.is_dir() {
            return Err(ServerError::InvalidDocumentRoot(document_root));
        }
        let mime_types = MimeTypes::load(mime_types)?;
        tracing::debug!("Loaded {} mime types", mime_types.len());

        Ok(Self {
            document_root,
            mime_types,
            routes: HashMap::new(),
        })
    }

    pub fn document_root(&self) -> &Path {
        &self.document_root
    }

    pub fn mime_types_mut(&mut self) -> &mut MimeTypes {
        &mut self.mime_types
    }

    /// Route a literal URI
    pub fn on<F>(&mut self, method: &str, uri: &str, handler: F) -> Result<&mut Self, ServerError>
    where
        F: Fn(&Request, &mut WebResponse) -> HandlerResult + 'static,
    {
        let uri = format!("/{}", uri.trim_matches('/'));
        self.on_pattern(method, &regex::escape(&uri), handler)
    }

    /// Route a regular expression, matched against the whole request path
    pub fn on_pattern<F>(
        &mut self,
        method: &str,
        pattern: &str,
        handler: F,
    ) -> Result<&mut Self, ServerError>
    where
        F: Fn(&Request, &mut WebResponse) -> HandlerResult + 'static,
    {
        let compiled =
            Regex::new(&format!("^(?:{})$", pattern)).map_err(|source| ServerError::InvalidRoute {
                pattern: pattern.to_string(),
                source,
            })?;
        self.routes
            .entry(method.to_uppercase())
            .or_default()
            .push(Route {
                pattern: compiled,
                handler: Box::new(handler),
            });
        Ok(self)
    }

    /// Bind and serve forever. Socket setup and accept failures end the run.
    pub async fn run(&self, address: &str, port: u16) -> Result<(), ServerError> {
        let bind_address = format!("{}:{}", address, port);
        let listener = TcpListener::bind(&bind_address)
            .await
            .map_err(|source| ServerError::Bind {
                address: bind_address.clone(),
                source,
            })?;
        tracing::info!("Listening on http://{}", bind_address);
        self.serve(listener).await
    }

    /// Accept loop over an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        loop {
            let (mut stream, peer) = listener.accept().await.map_err(ServerError::Accept)?;
            tracing::debug!("Connection from {}", peer);
            self.handle_connection(&mut stream).await;
        }
    }

    /// Service one connection; errors are answered with their status code
    async fn handle_connection(&self, stream: &mut TcpStream) {
        let response = match self.respond(stream).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Error while processing request: {}", e);
                Response::new(e.status())
            }
        };

        if let Err(e) = stream.write_all(&response.to_bytes()).await {
            tracing::warn!("Failed writing response: {}", e);
            return;
        }
        if let Err(e) = stream.shutdown().await {
            tracing::debug!("Failed closing connection: {}", e);
        }
    }

    async fn respond(&self, stream: &mut TcpStream) -> Result<Response, ServerError> {
        let head = read_head(stream).await?;
        let request = Request::parse(&head)?;
        let response = self.process_request(&request);
        let status = match &response {
            Ok(response) => response.status,
            Err(e) => e.status(),
        };
        tracing::info!("> {} {} -> {} {}", request.method(), request.uri(), status, reason_phrase(status));
        response
    }

    /// Dispatch a parsed request: static file, then route handlers (404 when
    /// none handles it), then 501 for methods without any handler
    pub fn process_request(&self, request: &Request) -> Result<Response, ServerError> {
        if let Some(path) = self.document_path(request.path()) {
            if path.is_file() {
                return self.serve_file(&path, request);
            }
        }

        let Some(routes) = self.routes.get(request.method()) else {
            return Ok(Response::new(501));
        };

        for route in routes.iter().filter(|r| r.pattern.is_match(request.path())) {
            let mut response = WebResponse::new();
            // A panicking handler fails its request, not the accept loop
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                (route.handler)(request, &mut response)
            }))
            .unwrap_or_else(|_| {
                HandlerResult::Fault(ServerError::request(500, "Request handler panicked"))
            });
            match outcome {
                HandlerResult::Handled => return Ok(response.into_response()),
                HandlerResult::NotHandled => continue,
                HandlerResult::Fault(e) => return Err(e),
            }
        }
        Ok(Response::new(404))
    }

    fn serve_file(&self, path: &Path, request: &Request) -> Result<Response, ServerError> {
        let modified = fs::metadata(path)?.modified()?;
        let mtime = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        if let Some(since) = request.header("If-Modified-Since").and_then(parse_http_date) {
            if since >= mtime {
                return Ok(Response::new(304));
            }
        }

        let contents = fs::read(path)?;
        let digest = Md5::digest(&contents);
        let etag = hex::encode(digest);

        if let Some(tags) = request.header("If-None-Match") {
            if tags.split(',').any(|tag| entity_tag(tag) == etag) {
                return Ok(Response::new(304));
            }
        }

        Ok(Response::new(200)
            .with_header("Content-Type", self.mime_types.for_path(path))
            .with_header("Content-Length", contents.len().to_string())
            .with_header("Content-MD5", BASE64_STANDARD.encode(digest))
            .with_header("ETag", &etag)
            .with_header("Last-Modified", http_date(modified))
            .with_body(contents))
    }

    /// File path for a request path, if it stays inside the document root
    fn document_path(&self, uri_path: &str) -> Option<PathBuf> {
        let mut path = self.document_root.clone();
        for segment in uri_path.split(['/', '\\']) {
            match segment {
                "" | "." => continue,
                ".." => return None,
                _ => path.push(segment),
            }
        }
        Some(path)
    }
}

/// Strip the weak prefix and quotes from an entity tag
fn entity_tag(tag: &str) -> &str {
    let tag = tag.trim();
    tag.strip_prefix("W/").unwrap_or(tag).trim_matches('"')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    const INDEX: &str = "<html><body>Hello</body></html>";
    const INDEX_MTIME: u64 = 1_700_000_000;

    fn fixture() -> (TempDir, WebServer) {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("www");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("index.html"), INDEX).unwrap();
        fs::File::options()
            .write(true)
            .open(root.join("index.html"))
            .unwrap()
            .set_modified(UNIX_EPOCH + Duration::from_secs(INDEX_MTIME))
            .unwrap();
        fs::write(dir.path().join("secret.txt"), "secret").unwrap();

        let mime_path = dir.path().join("mime.types");
        fs::write(&mime_path, "text/html html htm\ntext/css css\n").unwrap();
        let server = WebServer::new(&root, &mime_path).unwrap();
        (dir, server)
    }

    fn request(lines: &[&str]) -> Request {
        let lines: Vec<String> = lines.iter().map(|s| s.to_string()).collect();
        Request::parse(&lines).unwrap()
    }

    fn at(secs: u64) -> String {
        http_date(UNIX_EPOCH + Duration::from_secs(secs))
    }

    #[test]
    fn test_new_validates_inputs() {
        let dir = TempDir::new().unwrap();
        let mime_path = dir.path().join("mime.types");
        fs::write(&mime_path, "text/html html\n").unwrap();

        let err = WebServer::new(dir.path().join("missing"), &mime_path).err().unwrap();
        assert!(matches!(err, ServerError::InvalidDocumentRoot(_)));

        let err = WebServer::new(dir.path(), &dir.path().join("none.types")).err().unwrap();
        assert!(matches!(err, ServerError::MimeTypes { .. }));
    }

    #[test]
    fn test_serves_file_modified_after_client_copy() {
        let (_dir, server) = fixture();
        let since = format!("If-Modified-Since: {}", at(INDEX_MTIME - 3600));
        let response = server
            .process_request(&request(&["GET /index.html HTTP/1.1", &since]))
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body.as_deref(), Some(INDEX.as_bytes()));
        assert_eq!(response.header("Content-Type"), Some("text/html"));
        assert_eq!(response.header("Last-Modified"), Some(at(INDEX_MTIME).as_str()));

        let etag = hex::encode(Md5::digest(INDEX.as_bytes()));
        assert_eq!(response.header("ETag"), Some(etag.as_str()));
        assert_eq!(
            response.header("Content-MD5"),
            Some(BASE64_STANDARD.encode(Md5::digest(INDEX.as_bytes())).as_str())
        );
    }

    #[test]
    fn test_if_modified_since() {
        let (_dir, server) = fixture();
        for (secs, expected) in [(INDEX_MTIME, 304), (INDEX_MTIME + 60, 304), (INDEX_MTIME - 1, 200)] {
            let since = format!("If-Modified-Since: {}", at(secs));
            let response = server
                .process_request(&request(&["GET /index.html HTTP/1.1", &since]))
                .unwrap();
            assert_eq!(response.status, expected, "If-Modified-Since {}", secs);
        }

        let response = server
            .process_request(&request(&["GET /index.html HTTP/1.1", "If-Modified-Since: soon"]))
            .unwrap();
        assert_eq!(response.status, 200);
    }

    #[test]
    fn test_if_none_match() {
        let (_dir, server) = fixture();
        let etag = hex::encode(Md5::digest(INDEX.as_bytes()));

        let matching = format!("If-None-Match: {}", etag);
        let response = server
            .process_request(&request(&["GET /index.html HTTP/1.1", &matching]))
            .unwrap();
        assert_eq!(response.status, 304);
        assert!(response.body.is_none());

        let quoted = format!("If-None-Match: \"0000\", W/\"{}\"", etag);
        let response = server
            .process_request(&request(&["GET /index.html HTTP/1.1", &quoted]))
            .unwrap();
        assert_eq!(response.status, 304);

        let response = server
            .process_request(&request(&["GET /index.html HTTP/1.1", "If-None-Match: stale"]))
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.header("ETag"), Some(etag.as_str()));
    }

    #[test]
    fn test_unknown_method_is_not_implemented() {
        let (_dir, server) = fixture();
        let response = server
            .process_request(&request(&["DELETE /nothing HTTP/1.1"]))
            .unwrap();
        assert_eq!(response.status, 501);
    }

    #[test]
    fn test_handlers_in_registration_order() {
        let (_dir, mut server) = fixture();
        server
            .on_pattern("GET", "/page/\\d+", |_, _| HandlerResult::NotHandled)
            .unwrap()
            .on_pattern("get", "/page/(\\d+)", |request, response| {
                response.add_header("Content-Type", "text/plain");
                HandlerResult::from(write!(response, "page {}", request.path()).map(|_| true))
            })
            .unwrap()
            .on("GET", "about/", |_, response| {
                response.set_status(202);
                HandlerResult::Handled
            })
            .unwrap();

        let response = server
            .process_request(&request(&["GET /page/2 HTTP/1.1"]))
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body.as_deref(), Some(&b"page /page/2"[..]));

        let response = server.process_request(&request(&["GET /about HTTP/1.1"])).unwrap();
        assert_eq!(response.status, 202);

        // Patterns are anchored
        let response = server
            .process_request(&request(&["GET /page/2/extra HTTP/1.1"]))
            .unwrap();
        assert_eq!(response.status, 404);

        let response = server.process_request(&request(&["POST /about HTTP/1.1"])).unwrap();
        assert_eq!(response.status, 501);
    }

    #[test]
    fn test_declining_handlers_give_not_found() {
        let (_dir, mut server) = fixture();
        server
            .on("GET", "/missing", |_, _| HandlerResult::NotHandled)
            .unwrap();
        let response = server
            .process_request(&request(&["GET /missing HTTP/1.1"]))
            .unwrap();
        assert_eq!(response.status, 404);
    }

    #[test]
    fn test_handler_fault_carries_status() {
        let (_dir, mut server) = fixture();
        server
            .on("GET", "/teapot", |_, _| {
                HandlerResult::Fault(ServerError::request(418, "short and stout"))
            })
            .unwrap()
            .on("GET", "/broken", |_, _| {
                HandlerResult::Fault(anyhow::anyhow!("template exploded").into())
            })
            .unwrap();

        let err = server
            .process_request(&request(&["GET /teapot HTTP/1.1"]))
            .unwrap_err();
        assert_eq!(err.status(), 418);
        let err = server
            .process_request(&request(&["GET /broken HTTP/1.1"]))
            .unwrap_err();
        assert_eq!(err.status(), 500);
    }

    #[test]
    fn test_panicking_handler_fails_only_its_request() {
        let (_dir, mut server) = fixture();
        server
            .on("GET", "/explode", |_, _| panic!("handler bug"))
            .unwrap()
            .on("GET", "/fine", |_, _| HandlerResult::Handled)
            .unwrap();

        let err = server
            .process_request(&request(&["GET /explode HTTP/1.1"]))
            .unwrap_err();
        assert_eq!(err.status(), 500);

        let response = server.process_request(&request(&["GET /fine HTTP/1.1"])).unwrap();
        assert_eq!(response.status, 200);
    }

    #[test]
    fn test_query_string_is_ignored_for_dispatch() {
        let (_dir, mut server) = fixture();
        server
            .on("GET", "/about", |request, response| {
                HandlerResult::from(
                    write!(response, "{}", request.query().unwrap_or("")).map(|_| true),
                )
            })
            .unwrap();

        let response = server
            .process_request(&request(&["GET /index.html?v=1 HTTP/1.1"]))
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body.as_deref(), Some(INDEX.as_bytes()));

        let response = server
            .process_request(&request(&["GET /about?lang=fr#top HTTP/1.1"]))
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body.as_deref(), Some(&b"lang=fr#top"[..]));

        let response = server
            .process_request(&request(&["GET /index%2Ehtml HTTP/1.1"]))
            .unwrap();
        assert_eq!(response.status, 200);
    }

    #[test]
    fn test_parent_segments_never_map_to_files() {
        let (_dir, mut server) = fixture();
        server.on_pattern("GET", ".*", |_, _| HandlerResult::NotHandled).unwrap();
        let response = server
            .process_request(&request(&["GET /../secret.txt HTTP/1.1"]))
            .unwrap();
        assert_eq!(response.status, 404);
        let response = server
            .process_request(&request(&["GET /%2E%2E/secret.txt HTTP/1.1"]))
            .unwrap();
        assert_eq!(response.status, 404);
    }

    #[test]
    fn test_static_files_win_over_handlers() {
        let (_dir, mut server) = fixture();
        server
            .on("GET", "/index.html", |_, _| HandlerResult::Fault(ServerError::request(500, "unreachable")))
            .unwrap();
        let response = server
            .process_request(&request(&["GET /index.html HTTP/1.1"]))
            .unwrap();
        assert_eq!(response.status, 200);
    }

    async fn exchange(addr: std::net::SocketAddr, raw: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();
        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).await.unwrap();
        String::from_utf8_lossy(&reply).into_owned()
    }

    #[tokio::test]
    async fn test_serves_connections_sequentially() {
        let (_dir, mut server) = fixture();
        server
            .on("GET", "/fail", |_, _| {
                HandlerResult::Fault(ServerError::request(503, "down"))
            })
            .unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = async {
            let first = exchange(addr, "GET /index.html HTTP/1.1\r\nHost: test\r\n\r\n").await;
            let second = exchange(addr, "GET /fail HTTP/1.1\r\n\r\n").await;
            let third = exchange(addr, "garbage\r\n\r\n").await;
            let fourth = exchange(addr, "PUT /index.htm HTTP/1.1\r\n\r\n").await;
            (first, second, third, fourth)
        };

        tokio::select! {
            result = server.serve(listener) => panic!("server stopped: {:?}", result),
            (first, second, third, fourth) = client => {
                assert!(first.starts_with("HTTP/1.1 200 OK\r\n"));
                assert!(first.contains("\r\nConnection: close\r\n"));
                assert!(first.contains("\r\nContent-Type: text/html\r\n"));
                assert!(first.ends_with(INDEX));
                assert!(second.starts_with("HTTP/1.1 503 Service Unavailable\r\n"));
                assert!(third.starts_with("HTTP/1.1 400 Bad Request\r\n"));
                assert!(fourth.starts_with("HTTP/1.1 501 Not Implemented\r\n"));
            }
        }
    }
}
