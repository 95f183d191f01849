pub mod path;

pub use path::{match_path, Params, PathPattern, Segment};

use crate::error::ServerResult;
use crate::handler::{Action, IntoAction};
use crate::http::{Method, Request};
use std::fmt;

/// A declared method + path pattern bound to an action.
#[derive(Clone, Debug)]
pub struct Route {
    method: Method,
    pattern: PathPattern,
    action: Action,
    name: Option<String>,
}

impl Route {
    pub fn new(method: Method, path: &str, action: impl IntoAction) -> ServerResult<Self> {
        Ok(Self {
            method,
            pattern: PathPattern::parse(path)?,
            action: action.into_action()?,
            name: None,
        })
    }

    /// Names (or renames) the route after registration.
    pub fn name(&mut self, name: &str) -> &mut Self {
        self.name = Some(name.to_owned());
        self
    }

    pub fn get_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    /// Parameters bound by this route if it accepts the request's method and path.
    pub fn matches(&self, request: &Request) -> Option<Params> {
        if self.method != request.get_method() {
            return None;
        }
        self.pattern.matches(request.path())
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} to {}",
            self.name.as_deref().unwrap_or("N/A"),
            self.method,
            self.pattern
        )
    }
}

/// The ordered route table.
///
/// Routes are tried in registration order and the first match wins, so the
/// order of declaration is part of an application's behaviour.
#[derive(Clone, Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    pub fn get(&mut self, path: &str, action: impl IntoAction) -> ServerResult<&mut Route> {
        self.add(Method::GET, path, action)
    }

    pub fn post(&mut self, path: &str, action: impl IntoAction) -> ServerResult<&mut Route> {
        self.add(Method::POST, path, action)
    }

    pub fn put(&mut self, path: &str, action: impl IntoAction) -> ServerResult<&mut Route> {
        self.add(Method::PUT, path, action)
    }

    pub fn delete(&mut self, path: &str, action: impl IntoAction) -> ServerResult<&mut Route> {
        self.add(Method::DELETE, path, action)
    }

    pub fn patch(&mut self, path: &str, action: impl IntoAction) -> ServerResult<&mut Route> {
        self.add(Method::PATCH, path, action)
    }

    /// Appends a route; malformed declarations are rejected here, never at request time.
    pub fn add(
        &mut self,
        method: Method,
        path: &str,
        action: impl IntoAction,
    ) -> ServerResult<&mut Route> {
        let route = Route::new(method, path, action)?;
        self.routes.push(route);
        let index = self.routes.len() - 1;
        Ok(&mut self.routes[index])
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn route_named(&self, name: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.get_name() == Some(name))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Finds the first route accepting the request and binds its parameters into it.
    pub fn find<'r>(&'r self, request: &mut Request) -> Option<&'r Route> {
        self.routes.iter().find_map(|route| {
            let params = route.matches(request)?;
            request.bind(route, params);
            Some(route)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerError;
    use crate::handler::handler;

    fn text(body: &'static str) -> crate::handler::Handler {
        handler(move |_: &Params| body)
    }

    #[test]
    fn first_registered_route_wins() {
        let mut router = Router::new();
        router.get("/users/{id}", text("by id")).unwrap();
        router.get("/users/me", text("me")).unwrap();

        let mut request = Request::new(Method::GET, "/users/me");
        let route = router.find(&mut request).unwrap();
        assert_eq!(route.pattern().as_str(), "users/{id}");
        assert_eq!(request.param("id"), Some("me"));
        assert_eq!(request.route().map(|r| r.pattern().as_str()), Some("users/{id}"));
    }

    #[test]
    fn method_must_match() {
        let mut router = Router::new();
        router.get("/x", text("x")).unwrap();

        let mut request = Request::new(Method::POST, "/x");
        assert!(router.find(&mut request).is_none());
        assert!(request.params().is_empty());
        assert!(request.route().is_none());
    }

    #[test]
    fn same_path_different_methods() {
        let mut router = Router::new();
        router.get("/items", text("list")).unwrap();
        router.post("/items", text("create")).unwrap();
        router.put("/items/{id}", text("replace")).unwrap();
        router.patch("/items/{id}", text("update")).unwrap();
        router.delete("/items/{id}", text("remove")).unwrap();

        let mut request = Request::new(Method::POST, "/items");
        assert_eq!(router.find(&mut request).unwrap().method(), Method::POST);

        let mut request = Request::new(Method::PATCH, "/items/3");
        assert_eq!(router.find(&mut request).unwrap().method(), Method::PATCH);
        assert_eq!(request.param("id"), Some("3"));
    }

    #[test]
    fn names_can_be_chained_and_looked_up() {
        let mut router = Router::new();
        router.get("/", text("home")).unwrap();
        router.get("/users", text("users")).unwrap().name("pages.index");
        router.get("/users/{id}/", "PageController@hi").unwrap().name("first").name("pages.hi");

        assert_eq!(router.len(), 3);
        assert_eq!(router.route_named("pages.index").unwrap().pattern().as_str(), "users");
        assert!(router.route_named("first").is_none());
        assert_eq!(router.routes()[0].to_string(), "N/A: GET to /");
        assert_eq!(router.routes()[2].to_string(), "pages.hi: GET to /users/{id}");
    }

    #[test]
    fn malformed_declarations_fail_at_registration() {
        let mut router = Router::new();
        let err = router.get("/users", "NoMethodHere").unwrap_err();
        assert!(matches!(err, ServerError::MalformedRoute(_)));

        let err = router.get("/{id}/{id}", text("dup")).unwrap_err();
        assert!(matches!(err, ServerError::MalformedRoute(_)));
        assert!(router.is_empty());
    }

    #[test]
    fn no_match_leaves_request_untouched() {
        let mut router = Router::new();
        router.get("/", text("home")).unwrap();
        let mut request = Request::new(Method::GET, "/nonexistent");
        assert!(router.find(&mut request).is_none());
        assert!(request.params().is_empty());
    }
}
