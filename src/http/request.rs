use crate::app::Services;
use crate::error::ServerResult;
use crate::http::Method;
use crate::router::path::strip_slashes;
use crate::router::{Params, Route};
use crate::storage::Storage;
use crate::view::View;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Name of the input field that can override a POST's method when spoofing is enabled.
pub const METHOD_FIELD: &str = "_method";

#[derive(Debug, Clone, Default)]
pub struct Body {
    pub(crate) content_type: String,
    pub(crate) data: Vec<u8>,
}

impl Body {
    pub fn new() -> Body {
        Body::default()
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.data).to_string()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn json<T>(&self) -> Option<T>
    where
        T: serde::de::DeserializeOwned,
    {
        if self.is_json() {
            serde_json::from_slice(&self.data).ok()
        } else {
            None
        }
    }

    fn is_json(&self) -> bool {
        self.content_type.starts_with("application/json")
    }

    /// Flattens the body into string fields.
    ///
    /// JSON objects contribute their top-level members, multipart bodies
    /// contribute nothing, and anything else is read as a urlencoded form.
    fn fields(&self) -> HashMap<String, String> {
        if self.data.is_empty() || self.content_type.starts_with("multipart/") {
            return HashMap::new();
        }
        if self.is_json() {
            return match serde_json::from_slice::<Value>(&self.data) {
                Ok(Value::Object(map)) => map
                    .into_iter()
                    .map(|(key, value)| (key, scalar_to_string(value)))
                    .collect(),
                _ => HashMap::new(),
            };
        }
        parse_urlencoded(&String::from_utf8_lossy(&self.data))
    }
}

fn scalar_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Decodes `a=1&b=two+words` pairs; keys without `=` map to an empty string.
pub fn parse_urlencoded(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode_component(key);
            if key.is_empty() {
                return None;
            }
            Some((key, decode_component(value)))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    match urlencoding::decode(&raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw,
    }
}

/// One inbound call: built by the transport, bound by the router, read by handlers.
#[derive(Debug)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: HashMap<String, String>,
    pub(crate) input: HashMap<String, String>,
    pub(crate) params: Params,
    pub(crate) route: Option<Route>,
    pub(crate) headers: HashMap<String, String>,
    pub(crate) body: Body,
    pub(crate) services: Services,
}

impl Request {
    /// Builds a request from a method and a raw URI (`/path?query`).
    pub fn new(method: Method, uri: &str) -> Request {
        let (path, query) = uri.split_once('?').unwrap_or((uri, ""));
        let query = parse_urlencoded(query);
        Request {
            method,
            path: strip_slashes(path).to_owned(),
            input: query.clone(),
            query,
            params: Params::new(),
            route: None,
            headers: HashMap::new(),
            body: Body::new(),
            services: Services::default(),
        }
    }

    /// Header names are stored lowercased.
    pub fn with_header(mut self, name: &str, value: &str) -> Request {
        self.headers.insert(name.to_lowercase(), value.to_owned());
        self
    }

    /// Attaches the raw body; body fields are merged first and query fields win collisions.
    pub fn with_body(mut self, content_type: &str, data: impl Into<Vec<u8>>) -> Request {
        self.body = Body {
            content_type: content_type.to_owned(),
            data: data.into(),
        };
        let mut input = self.body.fields();
        input.extend(self.query.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.input = input;
        self
    }

    pub(crate) fn with_services(mut self, services: Services) -> Request {
        self.services = services;
        self
    }

    /// Swaps a POST for the method named by the `_method` input field.
    ///
    /// Returns whether the method changed. Unknown names leave the request as a POST.
    pub fn spoof_method(&mut self) -> bool {
        if self.method != Method::POST {
            return false;
        }
        match self.input(METHOD_FIELD).and_then(Method::from_string) {
            Some(method) if method != self.method => {
                self.method = method;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn bind(&mut self, route: &Route, params: Params) {
        self.params = params;
        self.route = Some(route.clone());
    }

    pub fn get_method(&self) -> Method {
        self.method
    }

    /// Path without query, leading or trailing slashes.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// The route this request was matched to, once dispatch found one.
    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn input(&self, key: &str) -> Option<&str> {
        self.input.get(key).map(String::as_str)
    }

    pub fn input_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.input(key).unwrap_or(default)
    }

    pub fn all(&self) -> &HashMap<String, String> {
        &self.input
    }

    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers.get(&key.to_lowercase()).map(String::as_str)
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn storage(&self) -> &Storage {
        &self.services.storage
    }

    /// Renders a template through the application's renderer.
    pub fn view<T: Serialize>(&self, template: &str, vars: T) -> ServerResult<View> {
        self.services.views.render(template, vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_is_normalized_and_query_stripped() {
        let req = Request::new(Method::GET, "//users/42/?tab=posts");
        assert_eq!(req.path(), "users/42");
        assert_eq!(req.input("tab"), Some("posts"));
        assert!(req.params().is_empty());
        assert!(req.route().is_none());
    }

    #[test]
    fn query_overrides_body() {
        let req = Request::new(Method::POST, "/form?a=2&b=3")
            .with_body("application/x-www-form-urlencoded", "a=1&c=4");
        assert_eq!(req.input("a"), Some("2"));
        assert_eq!(req.input("b"), Some("3"));
        assert_eq!(req.input("c"), Some("4"));
        assert_eq!(req.all().len(), 3);
    }

    #[test]
    fn form_values_are_decoded() {
        let req = Request::new(Method::POST, "/login")
            .with_body("application/x-www-form-urlencoded", "username=jane+doe&pass=a%26b&flag");
        assert_eq!(req.input("username"), Some("jane doe"));
        assert_eq!(req.input("pass"), Some("a&b"));
        assert_eq!(req.input("flag"), Some(""));
        assert_eq!(req.input_or("missing", "none"), "none");
    }

    #[test]
    fn json_bodies_are_flattened() {
        let req = Request::new(Method::POST, "/api")
            .with_body("application/json", r#"{"name":"x","age":3,"admin":false,"note":null}"#);
        assert_eq!(req.input("name"), Some("x"));
        assert_eq!(req.input("age"), Some("3"));
        assert_eq!(req.input("admin"), Some("false"));
        assert_eq!(req.input("note"), Some(""));

        #[derive(serde::Deserialize)]
        struct Payload {
            age: u32,
        }
        assert_eq!(req.body().json::<Payload>().map(|p| p.age), Some(3));
    }

    #[test]
    fn spoofing_only_applies_to_post() {
        let mut req = Request::new(Method::POST, "/users/1")
            .with_body("application/x-www-form-urlencoded", "_method=DELETE");
        assert!(req.spoof_method());
        assert_eq!(req.get_method(), Method::DELETE);

        let mut req = Request::new(Method::GET, "/users/1?_method=DELETE");
        assert!(!req.spoof_method());
        assert_eq!(req.get_method(), Method::GET);
    }

    #[test]
    fn spoofing_ignores_unknown_methods() {
        let mut req = Request::new(Method::POST, "/x")
            .with_body("application/x-www-form-urlencoded", "_method=TEAPOT");
        assert!(!req.spoof_method());
        assert_eq!(req.get_method(), Method::POST);
    }

    #[test]
    fn headers_are_case_insensitive() {
        let req = Request::new(Method::GET, "/").with_header("Content-Type", "text/plain");
        assert_eq!(req.get_header("content-type"), Some("text/plain"));
        assert_eq!(req.get_header("CONTENT-TYPE"), Some("text/plain"));
    }
}
