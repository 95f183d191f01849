//! Template rendering and the error pages built on top of it.

use crate::error::{ServerError, ServerResult};
use crate::http::response::reason_phrase;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tera::{Context, Tera};
use tracing::debug;

/// Template id rendered for every error status.
pub const ERROR_TEMPLATE: &str = "errors.general";

pub trait TemplateRenderer: Send + Sync {
    /// Renders `template` with `vars`; fails if the template does not exist.
    fn render(&self, template: &str, vars: &Value) -> ServerResult<String>;
}

/// Produces the page shown for 404, 500 and other error statuses.
pub trait ErrorRenderer: Send + Sync {
    fn render_error(&self, status: u16) -> String;
}

/// Tera templates loaded from a views directory.
///
/// Template ids use dots for directories: `pages.form` is `pages/form.html`.
pub struct TeraRenderer {
    tera: Tera,
}

impl TeraRenderer {
    pub fn new<P: AsRef<Path>>(views_dir: P) -> ServerResult<Self> {
        let glob = views_dir.as_ref().join("**").join("*.html");
        let glob = glob
            .to_str()
            .ok_or_else(|| ServerError::Template("views path is not valid UTF-8".into()))?;
        Ok(Self {
            tera: Tera::new(glob)?,
        })
    }

    pub fn from_tera(tera: Tera) -> Self {
        Self { tera }
    }

    pub fn template_name(id: &str) -> String {
        format!("{}.html", id.replace('.', "/"))
    }
}

impl TemplateRenderer for TeraRenderer {
    fn render(&self, template: &str, vars: &Value) -> ServerResult<String> {
        let context = Context::from_serialize(vars)?;
        Ok(self.tera.render(&Self::template_name(template), &context)?)
    }
}

/// A rendered template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View(String);

impl View {
    pub fn new(content: impl Into<String>) -> Self {
        View(content.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shared handle to the application's renderer, if one was configured.
#[derive(Clone, Default)]
pub struct Views {
    renderer: Option<Arc<dyn TemplateRenderer>>,
}

impl Views {
    pub fn new(renderer: impl TemplateRenderer + 'static) -> Self {
        Self {
            renderer: Some(Arc::new(renderer)),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.renderer.is_some()
    }

    pub fn render<T: Serialize>(&self, template: &str, vars: T) -> ServerResult<View> {
        let renderer = self
            .renderer
            .as_ref()
            .ok_or_else(|| ServerError::Template(format!("no renderer for `{}`", template)))?;
        let vars = serde_json::to_value(vars)?;
        renderer.render(template, &vars).map(View)
    }
}

impl fmt::Debug for Views {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Views")
            .field("configured", &self.is_configured())
            .finish()
    }
}

impl ErrorRenderer for Views {
    /// Renders `errors.general` with `{status}`, falling back to a built-in page.
    fn render_error(&self, status: u16) -> String {
        match self.render(ERROR_TEMPLATE, json!({ "status": status })) {
            Ok(view) => view.into_string(),
            Err(err) => {
                debug!(status, error = %err, "error template unavailable, using built-in page");
                fallback_page(status)
            }
        }
    }
}

pub fn fallback_page(status: u16) -> String {
    let reason = reason_phrase(status);
    format!(
        "<!DOCTYPE html>\n<html>\n<head><title>{status} {reason}</title></head>\n\
         <body><h1>{status}</h1><p>{reason}</p></body>\n</html>\n"
    )
}
