//! Conditional request evaluation (`If-None-Match`, `If-Modified-Since`, `If-Range`).
//!
//! The caller pre-sets `ETag`, `Content-Type` and `Content-Length` on the
//! response headers; a 304 outcome strips the latter two.

use axum::http::header::{
    CONTENT_LENGTH, CONTENT_TYPE, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, IF_RANGE, LAST_MODIFIED,
    RANGE,
};
use axum::http::{HeaderMap, HeaderValue, Method};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// Answer 304 with no body.
    NotModified,
    /// Serve the resource; `range` is the `Range` header still in effect.
    Proceed { range: Option<String> },
}

pub fn evaluate(
    method: &Method,
    request: &HeaderMap,
    response: &mut HeaderMap,
    mod_time: Option<SystemTime>,
) -> Evaluation {
    let mod_secs = unix_seconds(mod_time);
    let etag = header_str(response, ETAG).map(str::to_owned);

    let mut range = header_str(request, RANGE).map(str::to_owned);
    if let Some(if_range) = header_str(request, IF_RANGE)
        && !if_range_matches(if_range, etag.as_deref(), mod_secs)
    {
        range = None;
    }

    // A validator list needs a current ETag to compare against, and only
    // safe methods turn a match into 304.
    if let Some(if_none_match) = header_str(request, IF_NONE_MATCH)
        && let Some(etag) = etag.as_deref()
        && (method == Method::GET || method == Method::HEAD)
        && etag_list_matches(if_none_match, etag)
    {
        strip_entity_headers(response);
        return Evaluation::NotModified;
    }

    if let Some(since) = header_str(request, IF_MODIFIED_SINCE)
        && let Some(mod_secs) = mod_secs
        && let Ok(since) = httpdate::parse_http_date(since)
        && unix_seconds(Some(since)).is_some_and(|since| mod_secs <= since)
    {
        strip_entity_headers(response);
        return Evaluation::NotModified;
    }

    if let Some(mod_time) = mod_time
        && mod_secs.is_some()
        && let Ok(value) = HeaderValue::from_str(&httpdate::fmt_http_date(mod_time))
    {
        response.insert(LAST_MODIFIED, value);
    }

    Evaluation::Proceed { range }
}

/// An `If-Range` entity tag must equal the current one exactly. A date
/// matches when it names the modification time to the second.
fn if_range_matches(if_range: &str, etag: Option<&str>, mod_secs: Option<u64>) -> bool {
    let if_range = if_range.trim();
    if if_range.starts_with('"') || if_range.starts_with("W/") {
        return etag == Some(if_range);
    }
    match (mod_secs, httpdate::parse_http_date(if_range)) {
        (Some(mod_secs), Ok(date)) => unix_seconds(Some(date)) == Some(mod_secs),
        _ => false,
    }
}

fn etag_list_matches(list: &str, etag: &str) -> bool {
    list.split(',')
        .map(str::trim)
        .any(|candidate| candidate == "*" || candidate == etag)
}

fn strip_entity_headers(response: &mut HeaderMap) {
    response.remove(CONTENT_TYPE);
    response.remove(CONTENT_LENGTH);
}

/// Whole seconds since the epoch; the epoch itself counts as "no time".
fn unix_seconds(time: Option<SystemTime>) -> Option<u64> {
    let secs = time?.duration_since(UNIX_EPOCH).ok()?.as_secs();
    (secs > 0).then_some(secs)
}

fn header_str(headers: &HeaderMap, name: axum::http::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    /// Wed, 12 Apr 2006 15:04:05 GMT
    const APR_2006: u64 = 1_144_854_245;
    /// Sat, 01 Aug 2020 15:03:41 GMT
    const AUG_2020: u64 = 1_596_294_221;

    struct Case {
        method: Method,
        etag: Option<&'static str>,
        range: Option<&'static str>,
        if_range: Option<&'static str>,
        if_none_match: Option<&'static str>,
    }

    impl Default for Case {
        fn default() -> Self {
            Self {
                method: Method::GET,
                etag: Some("\"xxxxyyyy\""),
                range: Some("bytes=500-999"),
                if_range: None,
                if_none_match: None,
            }
        }
    }

    fn run(case: Case) -> (Evaluation, HeaderMap) {
        let mut request = HeaderMap::new();
        let mut response = HeaderMap::new();
        if let Some(etag) = case.etag {
            response.insert(ETAG, HeaderValue::from_static(etag));
        }
        response.insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));
        response.insert(CONTENT_LENGTH, HeaderValue::from_static("2024"));
        for (name, value) in [
            (RANGE, case.range),
            (IF_RANGE, case.if_range),
            (IF_NONE_MATCH, case.if_none_match),
        ] {
            if let Some(value) = value {
                request.insert(name, HeaderValue::from_static(value));
            }
        }
        let outcome = evaluate(&case.method, &request, &mut response, Some(at(APR_2006)));
        (outcome, response)
    }

    fn proceed(range: Option<&str>) -> Evaluation {
        Evaluation::Proceed {
            range: range.map(str::to_owned),
        }
    }

    #[test]
    fn date_if_range_equal_to_mtime_keeps_the_range() {
        let (outcome, headers) = run(Case {
            if_range: Some("Wed, 12 Apr 2006 15:04:05 GMT"),
            ..Default::default()
        });
        assert_eq!(outcome, proceed(Some("bytes=500-999")));
        assert_eq!(headers[CONTENT_LENGTH], "2024");
    }

    #[test]
    fn date_if_range_other_than_mtime_drops_the_range() {
        let (outcome, _) = run(Case {
            if_range: Some("Thu, 13 Apr 2006 15:04:05 GMT"),
            ..Default::default()
        });
        assert_eq!(outcome, proceed(None));
    }

    #[test]
    fn matching_if_none_match_wins_over_range() {
        let (outcome, headers) = run(Case {
            if_range: Some("Wed, 12 Apr 2006 15:04:05 GMT"),
            if_none_match: Some("\"xxxxyyyy\""),
            ..Default::default()
        });
        assert_eq!(outcome, Evaluation::NotModified);
        assert!(headers.get(CONTENT_TYPE).is_none());
        assert!(headers.get(CONTENT_LENGTH).is_none());
        assert_eq!(headers[ETAG], "\"xxxxyyyy\"");
    }

    #[test]
    fn if_none_match_without_etag_is_ignored() {
        let (outcome, headers) = run(Case {
            etag: None,
            range: None,
            if_none_match: Some("\"xxxxyyyy\""),
            ..Default::default()
        });
        assert_eq!(outcome, proceed(None));
        assert_eq!(headers[CONTENT_TYPE], "text/html");
    }

    #[test]
    fn if_none_match_on_unsafe_method_falls_through() {
        let (outcome, headers) = run(Case {
            method: Method::POST,
            range: None,
            if_none_match: Some("\"xxxxyyyy\""),
            ..Default::default()
        });
        assert_eq!(outcome, proceed(None));
        assert_eq!(headers[CONTENT_LENGTH], "2024");
    }

    #[test]
    fn wildcard_and_lists_match() {
        let (outcome, _) = run(Case {
            if_none_match: Some("*"),
            ..Default::default()
        });
        assert_eq!(outcome, Evaluation::NotModified);

        let (outcome, _) = run(Case {
            if_none_match: Some("\"aaaa\", \"xxxxyyyy\""),
            ..Default::default()
        });
        assert_eq!(outcome, Evaluation::NotModified);
    }

    #[test]
    fn etag_if_range_must_match_exactly() {
        let (outcome, _) = run(Case {
            if_range: Some("\"xxxxyyyy\""),
            ..Default::default()
        });
        assert_eq!(outcome, proceed(Some("bytes=500-999")));

        let (outcome, _) = run(Case {
            if_range: Some("\"aaaabbbb\""),
            ..Default::default()
        });
        assert_eq!(outcome, proceed(None));

        let (outcome, _) = run(Case {
            if_range: Some("W/\"xxxxyyyy\""),
            ..Default::default()
        });
        assert_eq!(outcome, proceed(None));
    }

    fn last_modified_case(
        mod_time: Option<SystemTime>,
        since: &'static str,
    ) -> (Evaluation, HeaderMap) {
        let mut request = HeaderMap::new();
        request.insert(IF_MODIFIED_SINCE, HeaderValue::from_static(since));
        let mut response = HeaderMap::new();
        response.insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));
        response.insert(CONTENT_LENGTH, HeaderValue::from_static("3000"));
        let outcome = evaluate(&Method::GET, &request, &mut response, mod_time);
        (outcome, response)
    }

    #[test]
    fn modified_since_same_second_is_not_modified() {
        let (outcome, headers) =
            last_modified_case(Some(at(AUG_2020)), "Sat, 01 Aug 2020 15:03:41 GMT");
        assert_eq!(outcome, Evaluation::NotModified);
        assert!(headers.get(CONTENT_TYPE).is_none());
        assert!(headers.get(CONTENT_LENGTH).is_none());
    }

    #[test]
    fn modified_after_since_sets_last_modified() {
        let (outcome, headers) =
            last_modified_case(Some(at(AUG_2020)), "Sat, 01 Aug 2020 15:03:40 GMT");
        assert_eq!(outcome, proceed(None));
        assert_eq!(headers[LAST_MODIFIED], "Sat, 01 Aug 2020 15:03:41 GMT");
        assert_eq!(headers[CONTENT_LENGTH], "3000");
    }

    #[test]
    fn zero_and_epoch_mtimes_never_short_circuit() {
        for mod_time in [None, Some(UNIX_EPOCH)] {
            let (outcome, headers) =
                last_modified_case(mod_time, "Sat, 01 Aug 2020 15:03:40 GMT");
            assert_eq!(outcome, proceed(None));
            assert!(headers.get(LAST_MODIFIED).is_none());
            assert_eq!(headers[CONTENT_TYPE], "text/html");
        }
    }

    #[test]
    fn stale_if_none_match_falls_through_to_modified_since() {
        let mut request = HeaderMap::new();
        request.insert(IF_NONE_MATCH, HeaderValue::from_static("\"stale\""));
        request.insert(
            IF_MODIFIED_SINCE,
            HeaderValue::from_static("Fri, 31 Dec 9999 23:59:59 GMT"),
        );
        let mut response = HeaderMap::new();
        response.insert(ETAG, HeaderValue::from_static("\"xxxxyyyy\""));
        response.insert(CONTENT_LENGTH, HeaderValue::from_static("3000"));

        let outcome = evaluate(&Method::GET, &request, &mut response, Some(at(AUG_2020)));
        assert_eq!(outcome, Evaluation::NotModified);
        assert!(response.get(CONTENT_LENGTH).is_none());
    }

    #[test]
    fn unparsable_since_is_ignored() {
        let (outcome, _) = last_modified_case(Some(at(AUG_2020)), "yesterday");
        assert_eq!(outcome, proceed(None));
    }
}
