use crate::error::ServerResult;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashMap;
use std::time::SystemTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16) -> Response {
        Response {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn body(&mut self, body: impl Into<Vec<u8>>) -> &mut Self {
        self.body = body.into();
        self
    }

    /// Sets a header, replacing any existing one whose name differs only in case.
    pub fn header<K: AsRef<str>, V: AsRef<str>>(&mut self, name: K, value: V) -> &mut Self {
        let name = name.as_ref();
        self.headers.retain(|key, _| !key.eq_ignore_ascii_case(name));
        self.headers.insert(name.to_string(), value.as_ref().to_string());
        self
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn text_body(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn json<T: Serialize>(value: &T) -> ServerResult<Response> {
        let body = serde_json::to_vec(value)?;
        let mut response = Response::new(200);
        response
            .header("Content-Type", mime::APPLICATION_JSON.as_ref())
            .body(body);
        Ok(response)
    }

    pub fn text<T: AsRef<str>>(content: T) -> Response {
        let mut response = Response::new(200);
        response
            .header("Content-Type", mime::TEXT_PLAIN_UTF_8.as_ref())
            .body(content.as_ref());
        response
    }

    pub fn html<T: AsRef<str>>(content: T) -> Response {
        let mut response = Response::new(200);
        response
            .header("Content-Type", mime::TEXT_HTML_UTF_8.as_ref())
            .body(content.as_ref());
        response
    }

    pub fn redirect(location: &str) -> Response {
        let mut response = Response::new(302);
        response.header("Location", location);
        response
    }

    /// Serializes the status line, headers and body as one HTTP/1.1 message.
    ///
    /// `Content-Length`, `Date` and `Connection: close` are filled in here; a
    /// `Content-Length` already set by a file response is kept.
    pub fn to_http_bytes(&self) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, reason_phrase(self.status));
        let mut names: Vec<&String> = self.headers.keys().collect();
        names.sort();
        for name in names {
            head += &format!("{}: {}\r\n", name, self.headers[name]);
        }
        if self.get_header("Content-Length").is_none() {
            head += &format!("Content-Length: {}\r\n", self.body.len());
        }
        if self.get_header("Date").is_none() {
            head += &format!("Date: {}\r\n", httpdate::fmt_http_date(SystemTime::now()));
        }
        head += "Connection: close\r\n\r\n";

        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        413 => "Payload Too Large",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
