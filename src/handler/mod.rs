//! Handlers, actions, and how their return values become responses.
//!
//! A route's [`Action`] is either an inline [`Handler`] or a
//! `"Controller@method"` reference resolved through the [`ControllerRegistry`]
//! at dispatch time. Every handler is tagged when it is built: [`handler`]
//! receives only the path parameters, [`with_request`] receives the current
//! request before them.

mod controller;

pub use controller::{ControllerBuilder, ControllerRef, ControllerRegistry};

use crate::error::ServerResult;
use crate::http::{Request, Response};
use crate::router::Params;
use crate::view::View;
use std::fmt;
use std::sync::Arc;

/// Coercion of a handler's return value into the response body.
pub trait IntoResponse {
    fn into_response(self) -> ServerResult<Response>;
}

impl IntoResponse for Response {
    fn into_response(self) -> ServerResult<Response> {
        Ok(self)
    }
}

impl IntoResponse for String {
    fn into_response(self) -> ServerResult<Response> {
        Ok(Response::html(self))
    }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> ServerResult<Response> {
        Ok(Response::html(self))
    }
}

impl IntoResponse for View {
    fn into_response(self) -> ServerResult<Response> {
        Ok(Response::html(self.into_string()))
    }
}

impl IntoResponse for () {
    fn into_response(self) -> ServerResult<Response> {
        Ok(Response::html(""))
    }
}

impl<T: IntoResponse> IntoResponse for ServerResult<T> {
    fn into_response(self) -> ServerResult<Response> {
        self.and_then(IntoResponse::into_response)
    }
}

macro_rules! display_into_response {
    ($($ty:ty),*) => {
        $(
            impl IntoResponse for $ty {
                fn into_response(self) -> ServerResult<Response> {
                    Ok(Response::html(self.to_string()))
                }
            }
        )*
    };
}

display_into_response!(i32, i64, u32, u64, usize, f64, bool);

type PlainFn = dyn Fn(&Params) -> ServerResult<Response> + Send + Sync;
type RequestFn = dyn Fn(&Request, &Params) -> ServerResult<Response> + Send + Sync;

/// An invocable unit with its argument shape fixed at construction.
#[derive(Clone)]
pub enum Handler {
    /// Called with the path parameters only.
    Plain(Arc<PlainFn>),
    /// Called with the request, then the path parameters.
    WithRequest(Arc<RequestFn>),
}

impl Handler {
    pub fn call(&self, request: &Request, params: &Params) -> ServerResult<Response> {
        match self {
            Handler::Plain(f) => f(params),
            Handler::WithRequest(f) => f(request, params),
        }
    }

    pub fn takes_request(&self) -> bool {
        matches!(self, Handler::WithRequest(_))
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Plain(_) => f.write_str("Handler::Plain"),
            Handler::WithRequest(_) => f.write_str("Handler::WithRequest"),
        }
    }
}

/// Wraps a closure that only needs the path parameters.
pub fn handler<F, R>(f: F) -> Handler
where
    F: Fn(&Params) -> R + Send + Sync + 'static,
    R: IntoResponse,
{
    Handler::Plain(Arc::new(move |params: &Params| f(params).into_response()))
}

/// Wraps a closure that receives the current request before the path parameters.
pub fn with_request<F, R>(f: F) -> Handler
where
    F: Fn(&Request, &Params) -> R + Send + Sync + 'static,
    R: IntoResponse,
{
    Handler::WithRequest(Arc::new(move |request: &Request, params: &Params| {
        f(request, params).into_response()
    }))
}

/// What a route runs when it matches.
#[derive(Clone, Debug)]
pub enum Action {
    Inline(Handler),
    Controller(ControllerRef),
}

impl Action {
    /// Resolves the action and calls it with the request's bound parameters.
    ///
    /// Errors propagate untouched; the dispatcher decides the status.
    pub fn invoke(&self, request: &Request, controllers: &ControllerRegistry) -> ServerResult<Response> {
        let handler = match self {
            Action::Inline(handler) => handler,
            Action::Controller(reference) => controllers.resolve(reference)?,
        };
        handler.call(request, request.params())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Inline(_) => f.write_str("closure"),
            Action::Controller(reference) => write!(f, "{}", reference),
        }
    }
}

/// Anything a route can be registered with.
pub trait IntoAction {
    fn into_action(self) -> ServerResult<Action>;
}

impl IntoAction for Action {
    fn into_action(self) -> ServerResult<Action> {
        Ok(self)
    }
}

impl IntoAction for Handler {
    fn into_action(self) -> ServerResult<Action> {
        Ok(Action::Inline(self))
    }
}

impl IntoAction for &str {
    fn into_action(self) -> ServerResult<Action> {
        ControllerRef::parse(self).map(Action::Controller)
    }
}

impl IntoAction for String {
    fn into_action(self) -> ServerResult<Action> {
        self.as_str().into_action()
    }
}

impl IntoAction for ControllerRef {
    fn into_action(self) -> ServerResult<Action> {
        Ok(Action::Controller(self))
    }
}
