//! A small site showing each kind of route.
//!
//! Run from the crate root so the relative paths in `demos/app.toml` resolve:
//!
//! ```text
//! RUST_LOG=debug cargo run --example welcome
//! ```

use serde::Serialize;
use trellis::config::Config;
use trellis::handler::{handler, with_request};
use trellis::{json, Application, Params, Request, Response, ServerError, ServerResult};
use tracing_subscriber::EnvFilter;

struct PageController;

impl PageController {
    fn hi(&self, params: &Params) -> String {
        format!("Hi, user {}", &params[0])
    }

    fn profile(&self, request: &Request, params: &Params) -> ServerResult<Response> {
        #[derive(Serialize)]
        struct Profile<'a> {
            id: &'a str,
            tab: &'a str,
        }
        Response::json(&Profile {
            id: params.get("id").unwrap_or_default(),
            tab: request.input_or("tab", "overview"),
        })
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load("demos/app.toml")?;
    let address = config.settings()?.address;
    let title = config.get_or("app.name", "Trellis".to_string());

    let mut app = Application::from_config(&config)?;

    app.controllers()
        .controller("PageController", || PageController)
        .action("hi", PageController::hi)
        .action_with_request("profile", PageController::profile);

    app.get("/", handler(|_: &Params| "Welcome to /"))?;

    app.get("/users", with_request(move |req: &Request, _: &Params| {
        req.view("pages.form", json!({ "title": &title }))
    }))?
    .name("pages.index");

    app.post("/login", with_request(|req: &Request, _: &Params| {
        format!("{} : {}", req.input_or("username", ""), req.input_or("pass", ""))
    }))?;

    app.get("/users/{id}/", "PageController@hi")?.name("pages.hi");
    app.get("/users/{id}/profile", "PageController@profile")?;

    app.get("/reports/{name}", with_request(|req: &Request, params: &Params| {
        req.storage().download(&format!("reports/{}", &params[0]), None, &[])
    }))?;

    app.delete("/users/{id}", handler(|params: &Params| -> ServerResult<String> {
        match &params[0] {
            "1" => Err(ServerError::Status(403)),
            id => Ok(format!("deleted {}", id)),
        }
    }))?;

    app.get("/boom", handler(|_: &Params| -> ServerResult<String> {
        Err(ServerError::handler("this route always fails"))
    }))?;

    app.listen(&address)
}
