use percent_encoding::percent_decode_str;

use crate::error::ServeError;
use crate::store::{ArchiveStore, Entry, Lookup};

const INDEX_PAGE: &str = "index.html";

/// Where a request path leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    File(Entry),
    /// 301 to this relative location (query string not yet appended).
    Redirect(String),
}

/// Path resolution settings.
#[derive(Debug, Clone)]
pub struct Resolver {
    pub redirect: bool,
    pub extensions: Vec<String>,
}

impl Resolver {
    pub fn new(redirect: bool, extensions: Vec<String>) -> Self {
        let extensions = extensions
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_string())
            .filter(|ext| !ext.is_empty())
            .collect();
        Self {
            redirect,
            extensions,
        }
    }

    /// Resolve a raw (still percent-encoded) URL path against `store`.
    pub fn resolve(
        &self,
        store: &dyn ArchiveStore,
        raw_path: &str,
    ) -> Result<Resolution, ServeError> {
        let decoded = percent_decode_str(raw_path)
            .decode_utf8()
            .map_err(|_| ServeError::NotFound)?;
        let upath = if decoded.starts_with('/') {
            decoded.into_owned()
        } else {
            format!("/{decoded}")
        };

        if upath.split('/').any(|segment| segment == "..") {
            tracing::debug!(path = %upath, "rejected traversal");
            return Err(ServeError::NotFound);
        }

        if self.redirect && upath.ends_with(&format!("/{INDEX_PAGE}")) {
            return Ok(Resolution::Redirect("./".to_string()));
        }

        let name = clean(&upath);
        let trailing_slash = upath.ends_with('/');

        match store.lookup(&name) {
            Lookup::File(entry) => {
                if self.redirect && trailing_slash {
                    return Ok(Resolution::Redirect(format!("../{}", base(&name))));
                }
                Ok(Resolution::File(entry))
            }
            Lookup::Directory => {
                if self.redirect && !trailing_slash {
                    return Ok(Resolution::Redirect(format!("{}/", base(&name))));
                }
                let index = if name.is_empty() {
                    INDEX_PAGE.to_string()
                } else {
                    format!("{name}/{INDEX_PAGE}")
                };
                match store.lookup(&index) {
                    Lookup::File(entry) => Ok(Resolution::File(entry)),
                    _ => Err(ServeError::Forbidden),
                }
            }
            Lookup::Missing => {
                if trailing_slash || base(&name).contains('.') {
                    return Err(ServeError::NotFound);
                }
                self.extensions
                    .iter()
                    .find_map(|ext| match store.lookup(&format!("{name}.{ext}")) {
                        Lookup::File(entry) => Some(Resolution::File(entry)),
                        _ => None,
                    })
                    .ok_or(ServeError::NotFound)
            }
        }
    }
}

/// Slash-separated path with empty and `.` segments removed, no leading slash.
fn clean(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn base(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryArchive;

    fn site() -> MemoryArchive {
        MemoryArchive::new("site")
            .with_file("index.html", "<h1>home</h1>", None)
            .with_file("test.html", "<p>test</p>", None)
            .with_file("img/circle.png", vec![1u8; 64], None)
            .with_file("docs/index.html", "docs", None)
            .with_file("about.htm", "about", None)
            .with_dir("empty")
    }

    fn resolver() -> Resolver {
        Resolver::new(true, vec!["html".into(), "htm".into()])
    }

    fn file_path(resolution: Result<Resolution, ServeError>) -> String {
        match resolution {
            Ok(Resolution::File(entry)) => entry.path,
            other => panic!("expected a file, got {other:?}"),
        }
    }

    fn redirect(resolution: Result<Resolution, ServeError>) -> String {
        match resolution {
            Ok(Resolution::Redirect(location)) => location,
            other => panic!("expected a redirect, got {other:?}"),
        }
    }

    #[test]
    fn root_serves_the_index() {
        assert_eq!(file_path(resolver().resolve(&site(), "/")), "index.html");
        assert_eq!(file_path(resolver().resolve(&site(), "")), "index.html");
    }

    #[test]
    fn direct_hits_with_or_without_leading_slash() {
        assert_eq!(file_path(resolver().resolve(&site(), "/test.html")), "test.html");
        assert_eq!(file_path(resolver().resolve(&site(), "test.html")), "test.html");
    }

    #[test]
    fn explicit_index_redirects_to_dot_slash() {
        assert_eq!(redirect(resolver().resolve(&site(), "/index.html")), "./");
        assert_eq!(redirect(resolver().resolve(&site(), "/docs/index.html")), "./");
    }

    #[test]
    fn directory_without_slash_redirects_into_it() {
        assert_eq!(redirect(resolver().resolve(&site(), "/empty")), "empty/");
        assert_eq!(redirect(resolver().resolve(&site(), "/docs")), "docs/");
    }

    #[test]
    fn file_with_trailing_slash_redirects_to_sibling() {
        assert_eq!(
            redirect(resolver().resolve(&site(), "/img/circle.png/")),
            "../circle.png"
        );
    }

    #[test]
    fn directory_index_and_forbidden_listing() {
        assert_eq!(file_path(resolver().resolve(&site(), "/docs/")), "docs/index.html");
        assert!(matches!(
            resolver().resolve(&site(), "/empty/"),
            Err(ServeError::Forbidden)
        ));
    }

    #[test]
    fn extensions_are_tried_in_order() {
        assert_eq!(file_path(resolver().resolve(&site(), "/test")), "test.html");
        assert_eq!(file_path(resolver().resolve(&site(), "/about")), "about.htm");
        assert!(matches!(
            resolver().resolve(&site(), "/test.txt"),
            Err(ServeError::NotFound)
        ));
    }

    #[test]
    fn missing_and_traversal_are_not_found() {
        assert!(matches!(
            resolver().resolve(&site(), "/does/not/exist"),
            Err(ServeError::NotFound)
        ));
        assert!(matches!(
            resolver().resolve(&site(), "/img/../index.html"),
            Err(ServeError::NotFound)
        ));
        assert!(matches!(
            resolver().resolve(&site(), "/img/%2e%2e/test.html"),
            Err(ServeError::NotFound)
        ));
    }

    #[test]
    fn percent_encoded_paths_are_decoded() {
        let store = MemoryArchive::new("s").with_file("my file.txt", "x", None);
        assert_eq!(file_path(resolver().resolve(&store, "/my%20file.txt")), "my file.txt");
    }

    #[test]
    fn without_redirects_everything_is_served_in_place() {
        let plain = Resolver::new(false, vec![]);
        assert_eq!(file_path(plain.resolve(&site(), "/index.html")), "index.html");
        assert_eq!(file_path(plain.resolve(&site(), "/docs")), "docs/index.html");
        assert_eq!(
            file_path(plain.resolve(&site(), "/img/circle.png/")),
            "img/circle.png"
        );
        assert!(matches!(plain.resolve(&site(), "/test"), Err(ServeError::NotFound)));
    }
}
