//! Turning a matched (or unmatched) request into exactly one response.

use crate::error::{ServerError, ServerResult};
use crate::handler::ControllerRegistry;
use crate::http::{Request, Response};
use crate::router::{Route, Router};
use crate::view::ErrorRenderer;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error};

/// Where dispatch starts for a request.
#[derive(Debug, Clone, Copy)]
pub enum Outcome<'r> {
    Matched(&'r Route),
    Unmatched,
    /// A status decided before any handler could run.
    Status(u16),
}

#[derive(Clone)]
pub struct Dispatcher {
    controllers: Arc<ControllerRegistry>,
    errors: Arc<dyn ErrorRenderer>,
}

impl Dispatcher {
    pub fn new(controllers: Arc<ControllerRegistry>, errors: Arc<dyn ErrorRenderer>) -> Self {
        Self { controllers, errors }
    }

    /// Matches `request` against `router` and produces its response.
    pub fn dispatch(&self, router: &Router, request: &mut Request) -> Response {
        let outcome = match router.find(request) {
            Some(route) => Outcome::Matched(route),
            None => Outcome::Unmatched,
        };
        self.respond(outcome, request)
    }

    pub fn respond(&self, outcome: Outcome<'_>, request: &Request) -> Response {
        match outcome {
            Outcome::Unmatched => {
                let err = ServerError::NoRouteMatch(format!(
                    "{} /{}",
                    request.get_method(),
                    request.path()
                ));
                debug!(error = %err, "unmatched");
                self.error_response(err.status_code())
            }
            Outcome::Status(status) => self.error_response(status),
            Outcome::Matched(route) => match self.invoke(route, request) {
                Ok(response) => {
                    debug!(route = %route, status = response.status, "handled");
                    response
                }
                Err(err) => self.failure(route, err),
            },
        }
    }

    /// Runs the route's action; panics are caught and reported as errors.
    ///
    /// The handler's value is fully coerced before this returns, so a failing
    /// coercion can never leave a response half-built.
    fn invoke(&self, route: &Route, request: &Request) -> ServerResult<Response> {
        panic::catch_unwind(AssertUnwindSafe(|| {
            route.action().invoke(request, &self.controllers)
        }))
        .unwrap_or_else(|payload| Err(ServerError::PanicError(panic_message(payload))))
    }

    fn failure(&self, route: &Route, err: ServerError) -> Response {
        let status = err.status_code();
        if status >= 500 {
            error!(route = %route, error = %err, "handler failed");
        } else {
            debug!(route = %route, status, error = %err, "handler aborted");
        }
        self.error_response(status)
    }

    /// The standard error view for `status`; anything but a 4xx or 5xx becomes a 500.
    pub fn error_response(&self, status: u16) -> Response {
        let status = ServerError::Status(status).status_code();
        Response::html(self.errors.render_error(status)).with_status(status)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "Unknown panic".to_string()
    }
}
