use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("No route matches {0}")]
    NoRouteMatch(String),
    #[error("Malformed route declaration: {0}")]
    MalformedRoute(String),
    #[error("Cannot resolve handler `{0}`")]
    HandlerResolution(String),
    #[error("Handler error: {0}")]
    Handler(String),
    #[error("Panic: {0}")]
    PanicError(String),
    #[error("Resource not found: {}", .0.display())]
    ResourceNotFound(PathBuf),
    #[error("Template error: {0}")]
    Template(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),
    #[error("Aborted with status {0}")]
    Status(u16),
}

impl ServerError {
    /// Shorthand for a handler failing with a message.
    pub fn handler(message: impl Into<String>) -> Self {
        ServerError::Handler(message.into())
    }

    /// HTTP status for the error page. Explicit statuses outside 400..=599 count as failures.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::NoRouteMatch(_) | ServerError::ResourceNotFound(_) => 404,
            ServerError::Status(status @ 400..=599) => *status,
            ServerError::Status(_)
            | ServerError::IoError(_)
            | ServerError::MalformedRoute(_)
            | ServerError::HandlerResolution(_)
            | ServerError::Handler(_)
            | ServerError::PanicError(_)
            | ServerError::Template(_)
            | ServerError::Json(_)
            | ServerError::Tls(_) => 500,
        }
    }
}

impl From<tera::Error> for ServerError {
    fn from(err: tera::Error) -> Self {
        // tera keeps the useful detail (missing variable, syntax position) in the source chain
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        ServerError::Template(message)
    }
}

pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(ServerError::NoRouteMatch("GET /x".into()).status_code(), 404);
        assert_eq!(ServerError::ResourceNotFound("a.txt".into()).status_code(), 404);
        assert_eq!(ServerError::Status(403).status_code(), 403);
        assert_eq!(ServerError::handler("boom").status_code(), 500);
        assert_eq!(ServerError::HandlerResolution("A@b".into()).status_code(), 500);
        assert_eq!(ServerError::PanicError("oops".into()).status_code(), 500);
    }

    #[test]
    fn explicit_statuses_must_be_errors() {
        assert_eq!(ServerError::Status(400).status_code(), 400);
        assert_eq!(ServerError::Status(599).status_code(), 599);
        assert_eq!(ServerError::Status(0).status_code(), 500);
        assert_eq!(ServerError::Status(200).status_code(), 500);
        assert_eq!(ServerError::Status(302).status_code(), 500);
        assert_eq!(ServerError::Status(600).status_code(), 500);
    }

    #[test]
    fn tera_errors_keep_their_cause() {
        let tera = tera::Tera::default();
        let err = tera.render("missing.html", &tera::Context::new()).unwrap_err();
        let err = ServerError::from(err);
        assert!(matches!(err, ServerError::Template(ref msg) if msg.contains("missing.html")));
    }
}
