use axum::http::HeaderValue;

use crate::store::Entry;

/// Which bytes of an entry a response carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    /// The deflate stream exactly as stored, sent with `Content-Encoding: deflate`.
    Stored,
    /// The decompressed bytes.
    Logical,
}

impl Representation {
    /// Length of this representation; the authoritative length for ranges.
    pub fn length(&self, entry: &Entry) -> u64 {
        match self {
            Self::Stored => entry.stored_size,
            Self::Logical => entry.logical_size,
        }
    }

    pub fn content_encoding(&self) -> Option<&'static str> {
        match self {
            Self::Stored => Some("deflate"),
            Self::Logical => None,
        }
    }
}

/// Whether `Accept-Encoding` lists `coding`. Quality values are ignored.
pub fn accepts(accept_encoding: Option<&HeaderValue>, coding: &str) -> bool {
    let Some(value) = accept_encoding.and_then(|v| v.to_str().ok()) else {
        return false;
    };
    value
        .split(',')
        .filter_map(|token| token.split(';').next())
        .any(|token| token.trim().eq_ignore_ascii_case(coding))
}

/// Pick the representation to serve for `entry`.
pub fn negotiate(accept_encoding: Option<&HeaderValue>, entry: &Entry) -> Representation {
    if entry.precompressed && accepts(accept_encoding, "deflate") {
        Representation::Stored
    } else {
        Representation::Logical
    }
}
