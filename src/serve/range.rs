use crate::store::ByteSpan;

/// How a `Range` header applies to a representation of a given length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOutcome {
    /// Serve the whole representation with 200.
    Full,
    /// Serve this span with 206.
    Partial(ByteSpan),
    /// Answer 416.
    Unsatisfiable,
}

/// Compute the span for a single `bytes=` range over `length` bytes.
///
/// Other units and multi-range requests are served in full. End offsets
/// past the last byte are clamped; a start past it is unsatisfiable.
pub fn compute(header: &str, length: u64) -> RangeOutcome {
    let header = header.trim();
    let Some(ranges) = header.strip_prefix("bytes=") else {
        return RangeOutcome::Full;
    };
    if ranges.contains(',') {
        return RangeOutcome::Full;
    }
    let Some((first, last)) = ranges.trim().split_once('-') else {
        return RangeOutcome::Unsatisfiable;
    };
    let (first, last) = (first.trim(), last.trim());
    if length == 0 {
        return RangeOutcome::Unsatisfiable;
    }

    if first.is_empty() {
        // suffix: the final `last` bytes
        let Ok(suffix) = last.parse::<u64>() else {
            return RangeOutcome::Unsatisfiable;
        };
        if suffix == 0 {
            return RangeOutcome::Unsatisfiable;
        }
        let len = suffix.min(length);
        return RangeOutcome::Partial(ByteSpan {
            start: length - len,
            len,
        });
    }

    let Ok(start) = first.parse::<u64>() else {
        return RangeOutcome::Unsatisfiable;
    };
    if start > length - 1 {
        return RangeOutcome::Unsatisfiable;
    }
    let end = if last.is_empty() {
        length - 1
    } else {
        match last.parse::<u64>() {
            Ok(end) if end >= start => end.min(length - 1),
            _ => return RangeOutcome::Unsatisfiable,
        }
    };

    RangeOutcome::Partial(ByteSpan {
        start,
        len: end - start + 1,
    })
}

/// `Content-Range` value for a served span.
pub fn content_range(span: ByteSpan, length: u64) -> String {
    format!("bytes {}-{}/{}", span.start, span.end(), length)
}
