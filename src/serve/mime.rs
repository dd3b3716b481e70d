/// Content-Type lookup for entry paths.
pub trait MimeLookup: Send + Sync {
    fn content_type(&self, path: &str) -> String;
}

/// Extension-based lookup backed by `mime_guess`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GuessMime;

impl MimeLookup for GuessMime {
    fn content_type(&self, path: &str) -> String {
        let Some(mime) = mime_guess::from_path(path).first() else {
            return mime_guess::mime::APPLICATION_OCTET_STREAM.to_string();
        };
        let textual = mime.type_() == mime_guess::mime::TEXT
            || matches!(mime.essence_str(), "application/javascript" | "application/json");
        if textual && mime.get_param(mime_guess::mime::CHARSET).is_none() {
            format!("{}; charset=utf-8", mime.essence_str())
        } else {
            mime.to_string()
        }
    }
}
