use super::{Handler, IntoResponse};
use crate::error::{ServerError, ServerResult};
use crate::http::Request;
use crate::router::Params;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A parsed `"path/to/Controller@method"` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerRef {
    path: String,
    method: String,
}

impl ControllerRef {
    pub fn parse(reference: &str) -> ServerResult<Self> {
        let malformed = |why: &str| {
            ServerError::MalformedRoute(format!("`{}` is not a controller reference: {}", reference, why))
        };

        let (path, method) = reference
            .split_once('@')
            .ok_or_else(|| malformed("expected `Controller@method`"))?;
        if method.contains('@') {
            return Err(malformed("more than one `@`"));
        }
        if path.is_empty() || path.ends_with('/') {
            return Err(malformed("missing controller name"));
        }
        if method.is_empty() {
            return Err(malformed("missing method name"));
        }

        Ok(Self {
            path: path.to_owned(),
            method: method.to_owned(),
        })
    }

    /// Everything before the `@`, used as the registry key.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The last path segment, naming the controller type.
    pub fn type_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}

impl fmt::Display for ControllerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.path, self.method)
    }
}

#[derive(Default)]
struct ControllerEntry {
    methods: HashMap<String, Handler>,
}

/// Controllers known to the application, keyed by the path used in route declarations.
///
/// Lookup uses the whole path before the `@`: a controller registered as
/// `"pages/PageController"` is only reached by `"pages/PageController@..."`,
/// never by the bare type name `"PageController@..."`.
///
/// Each registered method builds a fresh controller value from the factory on
/// every call.
#[derive(Default)]
pub struct ControllerRegistry {
    controllers: HashMap<String, ControllerEntry>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or extends) the registration of the controller at `path`.
    pub fn controller<C, F>(&mut self, path: &str, factory: F) -> ControllerBuilder<'_, C>
    where
        C: 'static,
        F: Fn() -> C + Send + Sync + 'static,
    {
        let entry = self.controllers.entry(path.to_owned()).or_default();
        ControllerBuilder {
            entry,
            factory: Arc::new(factory),
        }
    }

    pub fn contains(&self, reference: &ControllerRef) -> bool {
        self.controllers
            .get(reference.path())
            .is_some_and(|entry| entry.methods.contains_key(reference.method()))
    }

    pub fn resolve(&self, reference: &ControllerRef) -> ServerResult<&Handler> {
        self.controllers
            .get(reference.path())
            .and_then(|entry| entry.methods.get(reference.method()))
            .ok_or_else(|| ServerError::HandlerResolution(reference.to_string()))
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

pub struct ControllerBuilder<'a, C> {
    entry: &'a mut ControllerEntry,
    factory: Arc<dyn Fn() -> C + Send + Sync>,
}

impl<C: 'static> ControllerBuilder<'_, C> {
    /// Registers an entry point that receives the path parameters.
    pub fn action<M, R>(self, name: &str, method: M) -> Self
    where
        M: Fn(&C, &Params) -> R + Send + Sync + 'static,
        R: IntoResponse,
    {
        let factory = Arc::clone(&self.factory);
        let handler = super::handler(move |params: &Params| {
            let controller = factory();
            method(&controller, params)
        });
        self.entry.methods.insert(name.to_owned(), handler);
        self
    }

    /// Registers an entry point that receives the request before the path parameters.
    pub fn action_with_request<M, R>(self, name: &str, method: M) -> Self
    where
        M: Fn(&C, &Request, &Params) -> R + Send + Sync + 'static,
        R: IntoResponse,
    {
        let factory = Arc::clone(&self.factory);
        let handler = super::with_request(move |request: &Request, params: &Params| {
            let controller = factory();
            method(&controller, request, params)
        });
        self.entry.methods.insert(name.to_owned(), handler);
        self
    }
}
