use axum::http::StatusCode;
use axum::response::Response;
use std::sync::Arc;

use crate::cli::Args;

/// Name of the hot-mount endpoint under the API path.
pub const MOUNT_ENDPOINT: &str = "mountZIP";

/// Replaces the default error page; returning `None` keeps the default.
pub type ErrorHook = Arc<dyn Fn(StatusCode, &str) -> Option<Response> + Send + Sync>;

#[derive(Clone)]
pub struct ServeConfig {
    /// Stripped from request paths before resolution, when present.
    pub url_prefix: String,
    /// Base path of the control endpoints.
    pub api_path: String,
    /// Redirect `/index.html`, directories without a trailing slash and files with one.
    pub redirect_index: bool,
    /// Extensions tried, in order, for extension-less paths.
    pub extensions: Vec<String>,
    /// Accept `POST <api_path>mountZIP` to replace the archive.
    pub hot_mount: bool,
    pub error_hook: Option<ErrorHook>,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            url_prefix: String::new(),
            api_path: String::new(),
            redirect_index: true,
            extensions: vec!["html".to_string(), "htm".to_string()],
            hot_mount: false,
            error_hook: None,
        }
    }
}

impl ServeConfig {
    /// Mount endpoint path, without leading slash.
    pub fn mount_path(&self) -> String {
        format!("{}{}", self.api_path.trim_start_matches('/'), MOUNT_ENDPOINT)
    }

    /// Drop the configured URL prefix from a request path.
    pub fn strip_prefix<'a>(&self, path: &'a str) -> &'a str {
        let prefix = self.url_prefix.trim_start_matches('/');
        if prefix.is_empty() {
            return path;
        }
        path.trim_start_matches('/')
            .strip_prefix(prefix)
            .unwrap_or(path)
    }

    pub fn with_error_hook(
        mut self,
        hook: impl Fn(StatusCode, &str) -> Option<Response> + Send + Sync + 'static,
    ) -> Self {
        self.error_hook = Some(Arc::new(hook));
        self
    }
}

impl From<&Args> for ServeConfig {
    fn from(args: &Args) -> Self {
        Self {
            url_prefix: args.url_prefix.clone(),
            api_path: args.api_path.clone(),
            redirect_index: !args.no_redirect,
            extensions: args.extensions.clone(),
            hot_mount: args.hot_mount,
            error_hook: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mount_path_joins_api_path() {
        let config = ServeConfig {
            api_path: "/test/api/path/".into(),
            ..Default::default()
        };
        assert_eq!(config.mount_path(), "test/api/path/mountZIP");
    }

    #[test]
    fn prefix_is_stripped_only_when_present() {
        let config = ServeConfig {
            url_prefix: "site/v1/".into(),
            ..Default::default()
        };
        assert_eq!(config.strip_prefix("/site/v1/img/a.png"), "img/a.png");
        assert_eq!(config.strip_prefix("/img/a.png"), "/img/a.png");
        assert_eq!(ServeConfig::default().strip_prefix("/x"), "/x");
    }
}
