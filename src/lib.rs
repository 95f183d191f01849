//! # Trellis
//!
//! A small web framework built around a declared, ordered route table.
//!
//! ## Features
//!
//! - `{param}` path patterns, first declared route wins
//! - Inline closures or `"Controller@method"` references as handlers
//! - Handlers that take the request, or only the path parameters
//! - Tera views, JSON, file and download responses
//! - A single dispatch boundary: no match is a 404, a failing handler a 500
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use trellis::app::Application;
//! use trellis::handler::{handler, with_request};
//! use trellis::http::Request;
//! use trellis::router::Params;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut app = Application::new();
//!
//!     app.get("/", handler(|_: &Params| "Welcome to /"))?;
//!     app.post("/login", with_request(|req: &Request, _: &Params| {
//!         format!("{} : {}", req.input_or("username", ""), req.input_or("pass", ""))
//!     }))?;
//!     app.get("/users/{id}/", "PageController@hi")?.name("pages.hi");
//!
//!     app.listen("127.0.0.1:3000")
//! }
//! ```

pub mod app;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod http;
pub mod router;
pub mod storage;
pub mod view;

pub use app::{Application, Server};
pub use error::{ServerError, ServerResult};
pub use http::{Method, Request, Response};
pub use router::{Params, Route, Router};

// Reexport serde_json
pub use serde_json::{json, Value};
