//! Application is the main entry point for a trellis site.
//!
//! Routes, controllers, views and storage are declared on an [`Application`]
//! at startup. [`Application::build`] freezes them into a [`Server`], which
//! can be cloned across connections and only ever reads its route table.
//!
//! # Examples
//!
//! ```rust,no_run
//! use trellis::app::Application;
//! use trellis::handler::handler;
//! use trellis::router::Params;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut app = Application::new();
//!     app.get("/", handler(|_: &Params| "Welcome to /"))?;
//!     app.get("/users/{id}", handler(|p: &Params| format!("user {}", &p[0])))?
//!         .name("users.show");
//!     app.listen("127.0.0.1:3000")
//! }
//! ```

use crate::config::{Config, Settings};
use crate::dispatch::Dispatcher;
use crate::error::{ServerError, ServerResult};
use crate::handler::{Action, ControllerRegistry, IntoAction};
use crate::http::{Method, Request, Response};
use crate::router::{Route, Router};
use crate::storage::Storage;
use crate::view::{ErrorRenderer, TemplateRenderer, TeraRenderer, Views};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader as StdBufReader, Error, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

/// Shared collaborators every request can reach.
#[derive(Debug, Clone, Default)]
pub struct Services {
    pub views: Views,
    pub storage: Storage,
}

/// TLS configuration for HTTPS support
#[derive(Debug, Clone)]
pub struct TlsConfig {
    cert_file: PathBuf,
    key_file: PathBuf,
}

impl TlsConfig {
    pub fn new<P: AsRef<Path>>(cert_file: P, key_file: P) -> Self {
        Self {
            cert_file: cert_file.as_ref().to_path_buf(),
            key_file: key_file.as_ref().to_path_buf(),
        }
    }

    fn load_certs(&self) -> ServerResult<Vec<CertificateDer<'static>>> {
        let cert_file = File::open(&self.cert_file)?;
        let mut reader = StdBufReader::new(cert_file);
        let certs = rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()?;
        Ok(certs)
    }

    fn load_key(&self) -> ServerResult<PrivateKeyDer<'static>> {
        let key_file = File::open(&self.key_file)?;
        let mut reader = StdBufReader::new(key_file);
        rustls_pemfile::private_key(&mut reader)?.ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidData,
                format!("no private key found in {}", self.key_file.display()),
            )
            .into()
        })
    }

    fn acceptor(&self) -> ServerResult<TlsAcceptor> {
        let config = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(self.load_certs()?, self.load_key()?)?;
        Ok(TlsAcceptor::from(Arc::new(config)))
    }
}

/// Route table and collaborators under construction.
pub struct Application {
    router: Router,
    controllers: ControllerRegistry,
    services: Services,
    settings: Settings,
    error_pages: Option<Arc<dyn ErrorRenderer>>,
    tls_config: Option<TlsConfig>,
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl Application {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        let tls_config = settings
            .tls
            .as_ref()
            .map(|tls| TlsConfig::new(&tls.cert_file, &tls.key_file));
        Self {
            router: Router::new(),
            controllers: ControllerRegistry::new(),
            services: Services {
                views: Views::default(),
                storage: Storage::new(&settings.storage_dir),
            },
            settings,
            error_pages: None,
            tls_config,
        }
    }

    /// Builds an application from the `[server]` settings of `config`.
    ///
    /// Templates are loaded from `views_dir` when that directory exists.
    pub fn from_config(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        let settings = config.settings()?;
        let views_dir = settings.views_dir.clone();
        let mut app = Self::with_settings(settings);
        if views_dir.is_dir() {
            app.views(TeraRenderer::new(&views_dir)?);
        } else {
            debug!(dir = %views_dir.display(), "no views directory, templates disabled");
        }
        Ok(app)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn router(&mut self) -> &mut Router {
        &mut self.router
    }

    pub fn controllers(&mut self) -> &mut ControllerRegistry {
        &mut self.controllers
    }

    pub fn get(&mut self, path: &str, action: impl IntoAction) -> ServerResult<&mut Route> {
        self.router.get(path, action)
    }

    pub fn post(&mut self, path: &str, action: impl IntoAction) -> ServerResult<&mut Route> {
        self.router.post(path, action)
    }

    pub fn put(&mut self, path: &str, action: impl IntoAction) -> ServerResult<&mut Route> {
        self.router.put(path, action)
    }

    pub fn delete(&mut self, path: &str, action: impl IntoAction) -> ServerResult<&mut Route> {
        self.router.delete(path, action)
    }

    pub fn patch(&mut self, path: &str, action: impl IntoAction) -> ServerResult<&mut Route> {
        self.router.patch(path, action)
    }

    pub fn views(&mut self, renderer: impl TemplateRenderer + 'static) -> &mut Self {
        self.services.views = Views::new(renderer);
        self
    }

    pub fn storage<P: AsRef<Path>>(&mut self, root: P) -> &mut Self {
        self.services.storage = Storage::new(root);
        self
    }

    pub fn method_spoofing(&mut self, enabled: bool) -> &mut Self {
        self.settings.method_spoofing = enabled;
        self
    }

    /// Replaces the default error pages (the `errors.general` template).
    pub fn error_pages(&mut self, renderer: impl ErrorRenderer + 'static) -> &mut Self {
        self.error_pages = Some(Arc::new(renderer));
        self
    }

    /// Configure TLS for HTTPS support
    pub fn with_tls<P: AsRef<Path>>(&mut self, cert_file: P, key_file: P) -> &mut Self {
        self.tls_config = Some(TlsConfig::new(cert_file, key_file));
        self
    }

    /// Freezes the declarations into a shareable server.
    pub fn build(self) -> Server {
        for route in self.router.routes() {
            if let Action::Controller(reference) = route.action() {
                if !self.controllers.contains(reference) {
                    warn!(
                        route = %route,
                        controller = reference.type_name(),
                        "controller `{}` is not registered",
                        reference
                    );
                }
            }
        }

        let errors: Arc<dyn ErrorRenderer> = match self.error_pages {
            Some(errors) => errors,
            None => Arc::new(self.services.views.clone()),
        };
        let dispatcher = Dispatcher::new(Arc::new(self.controllers), errors);

        Server {
            inner: Arc::new(Inner {
                router: self.router,
                dispatcher,
                services: self.services,
                settings: self.settings,
                tls_config: self.tls_config,
            }),
        }
    }

    /// Starts the HTTP server
    ///
    /// # Arguments
    /// * `addr` - Address to listen on (e.g. "127.0.0.1:3000")
    pub fn listen(self, addr: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.build().listen(addr)
    }
}

struct Inner {
    router: Router,
    dispatcher: Dispatcher,
    services: Services,
    settings: Settings,
    tls_config: Option<TlsConfig>,
}

/// A built application; cheap to clone, read-only while serving.
#[derive(Clone)]
pub struct Server {
    inner: Arc<Inner>,
}

impl Server {
    pub fn router(&self) -> &Router {
        &self.inner.router
    }

    /// Runs one request through matching, invocation and response rendering.
    pub fn handle(&self, request: Request) -> Response {
        let mut request = request.with_services(self.inner.services.clone());
        if self.inner.settings.method_spoofing && request.spoof_method() {
            debug!(method = %request.get_method(), "method overridden by `_method`");
        }
        self.inner.dispatcher.dispatch(&self.inner.router, &mut request)
    }

    pub fn listen(self, addr: &str) -> Result<(), Box<dyn std::error::Error>> {
        let runtime = Runtime::new()?;
        runtime.block_on(async {
            let listener = TcpListener::bind(addr).await?;
            self.serve(listener).await
        })
    }

    /// Accepts connections until the listener fails.
    pub async fn serve(self, listener: TcpListener) -> Result<(), Box<dyn std::error::Error>> {
        let tls_acceptor = match &self.inner.tls_config {
            Some(tls_config) => Some(tls_config.acceptor()?),
            None => None,
        };

        let addr = listener.local_addr()?;
        info!(
            routes = self.inner.router.len(),
            "listening on {}://{}",
            if tls_acceptor.is_some() { "https" } else { "http" },
            addr
        );

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "connection failed");
                    continue;
                }
            };
            let server = self.clone();
            let acceptor = tls_acceptor.clone();

            tokio::spawn(async move {
                let result = match acceptor {
                    Some(acceptor) => match acceptor.accept(stream).await {
                        Ok(tls_stream) => server.handle_connection(tls_stream).await,
                        Err(e) => {
                            warn!(%peer, error = %e, "TLS handshake failed");
                            Ok(())
                        }
                    },
                    None => server.handle_connection(stream).await,
                };

                if let Err(e) = result {
                    warn!(%peer, error = %e, "connection error");
                }
            });
        }
    }

    /// Reads one HTTP/1.1 request from `stream` and writes exactly one response.
    pub async fn handle_connection<S>(&self, mut stream: S) -> Result<(), Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut buf_reader = BufReader::new(&mut stream);
        let mut request_line = String::new();
        buf_reader.read_line(&mut request_line).await?;

        if request_line.is_empty() {
            return Ok(());
        }

        let mut parts = request_line.split_whitespace();
        let method = parts
            .next()
            .ok_or_else(|| Error::new(ErrorKind::InvalidData, "Invalid request line"))?
            .to_string();
        let uri = parts
            .next()
            .ok_or_else(|| Error::new(ErrorKind::InvalidData, "Invalid request line"))?
            .to_string();

        let mut headers = HashMap::new();
        loop {
            let mut line = String::new();
            if buf_reader.read_line(&mut line).await? == 0 || line.trim().is_empty() {
                break;
            }
            if let Some((key, value)) = line.trim().split_once(':') {
                headers.insert(key.trim().to_lowercase(), value.trim().to_string());
            }
        }

        let content_length = match headers.get("content-length") {
            Some(length) => length.parse::<usize>().ok(),
            None => Some(0),
        };

        let response = match content_length {
            None => {
                debug!(%method, %uri, "invalid Content-Length");
                self.inner.dispatcher.error_response(400)
            }
            Some(content_length) if content_length > self.inner.settings.max_body_bytes => {
                debug!(content_length, "request body too large");
                self.inner.dispatcher.error_response(413)
            }
            Some(content_length) => {
                let mut body = Vec::with_capacity(content_length);
                (&mut buf_reader)
                    .take(content_length as u64)
                    .read_to_end(&mut body)
                    .await?;

                match Method::from_string(&method) {
                    Some(method) => {
                        let content_type = headers.get("content-type").cloned().unwrap_or_default();
                        let mut request = Request::new(method, &uri).with_body(&content_type, body);
                        for (name, value) in &headers {
                            request = request.with_header(name, value);
                        }
                        self.dispatch_blocking(request).await
                    }
                    None => {
                        // no route can be declared for this method
                        debug!(%method, %uri, "unsupported method");
                        self.inner.dispatcher.error_response(404)
                    }
                }
            }
        };

        stream.write_all(&response.to_http_bytes()).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn dispatch_blocking(&self, request: Request) -> Response {
        let server = self.clone();
        match tokio::task::spawn_blocking(move || server.handle(request)).await {
            Ok(response) => response,
            Err(e) => {
                let err = ServerError::PanicError(e.to_string());
                warn!(error = %err, "dispatch task failed");
                self.inner.dispatcher.error_response(err.status_code())
            }
        }
    }
}
