//! Conditional and partial GET (RFC7232, RFC7233).
//!
//! Decides which variant of a file a GET/HEAD request gets:
//! the whole file, a byte window, `304 Not Modified`, or
//! `416 Range Not Satisfiable`.
use std::ops::Bound;
use std::str::FromStr;
use std::time::UNIX_EPOCH;

use headers::{ETag, HeaderMapExt, IfNoneMatch, IfRange, LastModified};
use http::{HeaderMap, StatusCode};
use sha2::{Digest, Sha256};

use crate::davpath::DavPath;
use crate::errors::{DavError, DavResult};
use crate::fs::DavMetaData;

/// Outcome of the negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Negotiated {
    /// 200, the entire file.
    Full,
    /// 206, bytes `start..=end`.
    Partial { start: u64, end: u64 },
    /// 304
    NotModified,
    /// 416
    Unsatisfiable,
}

// A single byte range as asked for, before it is checked against the length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ByteRange {
    start: u64,
    end: Option<u64>,
}

/// Entity tag of a file, in its quoted form: derived from its path,
/// modification time and size, so it changes whenever the file does.
pub(crate) fn etag_string(path: &DavPath, meta: &dyn DavMetaData) -> String {
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_micros())
        .unwrap_or(0);
    let mut hasher = Sha256::new();
    hasher.update(path.lock_key().as_bytes());
    hasher.update(b"\0");
    hasher.update(mtime.to_le_bytes());
    hasher.update(meta.len().to_le_bytes());
    let digest = hasher.finalize();
    let tag: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
    format!("\"{tag}\"")
}

pub(crate) fn etag(path: &DavPath, meta: &dyn DavMetaData) -> DavResult<ETag> {
    ETag::from_str(&etag_string(path, meta))
        .map_err(|_| DavError::Status(StatusCode::INTERNAL_SERVER_ERROR))
}

// Range: header. Anything we cannot use is "no range".
fn requested_range(headers: &HeaderMap, len: u64) -> Option<ByteRange> {
    let range = headers.typed_get::<headers::Range>()?;
    let mut iter = range.iter();
    let bounds = iter.next()?;
    if iter.next().is_some() {
        // multiple byte-range-specs. serve the whole thing.
        return None;
    }
    match bounds {
        (Bound::Included(start), Bound::Included(end)) if start <= end => Some(ByteRange {
            start,
            end: Some(end),
        }),
        (Bound::Included(start), Bound::Unbounded) => Some(ByteRange { start, end: None }),
        (Bound::Unbounded, Bound::Included(suffix)) if suffix > 0 => Some(ByteRange {
            start: len.saturating_sub(suffix),
            end: None,
        }),
        _ => None,
    }
}

// If-Range: absent, or naming the current version.
fn if_range_matches(headers: &HeaderMap, etag: &ETag, modified: Option<&LastModified>) -> bool {
    if !headers.contains_key(http::header::IF_RANGE) {
        return true;
    }
    match headers.typed_get::<IfRange>() {
        Some(if_range) => !if_range.is_modified(Some(etag), modified),
        None => false,
    }
}

// If-None-Match: `*` or the current tag.
fn if_none_match_matches(headers: &HeaderMap, etag: &ETag) -> bool {
    headers
        .typed_get::<IfNoneMatch>()
        .map(|inm| !inm.precondition_passes(etag))
        .unwrap_or(false)
}

/// Pick the response variant for a GET of a file of `len` bytes.
pub(crate) fn negotiate(
    headers: &HeaderMap,
    etag: &ETag,
    modified: Option<&LastModified>,
    len: u64,
) -> Negotiated {
    let not_modified = if_none_match_matches(headers, etag);

    let range = requested_range(headers, len).filter(|_| if_range_matches(headers, etag, modified));
    match range {
        Some(range) if range.start < len => {
            if not_modified {
                Negotiated::NotModified
            } else {
                let last = len - 1;
                let end = range.end.map(|e| e.min(last)).unwrap_or(last);
                Negotiated::Partial {
                    start: range.start,
                    end,
                }
            }
        }
        // a 4xx is not trumped by If-None-Match.
        Some(_) => Negotiated::Unsatisfiable,
        None if not_modified => Negotiated::NotModified,
        None => Negotiated::Full,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    fn tag() -> ETag {
        "\"abc\"".parse().unwrap()
    }

    fn hdrs(list: &[(&'static str, &str)]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for (k, v) in list {
            h.append(*k, v.parse().unwrap());
        }
        h
    }

    fn run(list: &[(&'static str, &str)], len: u64) -> Negotiated {
        negotiate(&hdrs(list), &tag(), None, len)
    }

    #[test]
    fn plain_get() {
        assert_eq!(run(&[], 1000), Negotiated::Full);
    }

    #[test]
    fn simple_range() {
        assert_eq!(
            run(&[("range", "bytes=0-99")], 1000),
            Negotiated::Partial { start: 0, end: 99 }
        );
        assert_eq!(
            run(&[("range", "bytes=900-")], 1000),
            Negotiated::Partial { start: 900, end: 999 }
        );
        assert_eq!(
            run(&[("range", "bytes=990-5000")], 1000),
            Negotiated::Partial { start: 990, end: 999 }
        );
    }

    #[test]
    fn suffix_range() {
        assert_eq!(
            run(&[("range", "bytes=-100")], 1000),
            Negotiated::Partial { start: 900, end: 999 }
        );
    }

    #[test]
    fn range_past_end() {
        assert_eq!(run(&[("range", "bytes=2000-")], 1000), Negotiated::Unsatisfiable);
        // not suppressed by a matching If-None-Match.
        assert_eq!(
            run(&[("range", "bytes=2000-"), ("if-none-match", "\"abc\"")], 1000),
            Negotiated::Unsatisfiable
        );
    }

    #[test]
    fn malformed_range_is_ignored() {
        assert_eq!(run(&[("range", "bytes=abc")], 1000), Negotiated::Full);
        assert_eq!(run(&[("range", "lines=1-2")], 1000), Negotiated::Full);
        assert_eq!(run(&[("range", "bytes=5-3")], 1000), Negotiated::Full);
        assert_eq!(run(&[("range", "bytes=0-1,5-6")], 1000), Negotiated::Full);
    }

    #[test]
    fn if_none_match() {
        assert_eq!(run(&[("if-none-match", "\"abc\"")], 1000), Negotiated::NotModified);
        assert_eq!(run(&[("if-none-match", "*")], 1000), Negotiated::NotModified);
        assert_eq!(run(&[("if-none-match", "\"x\", \"abc\"")], 1000), Negotiated::NotModified);
        assert_eq!(run(&[("if-none-match", "\"other\"")], 1000), Negotiated::Full);
        assert_eq!(
            run(&[("range", "bytes=0-9"), ("if-none-match", "\"abc\"")], 1000),
            Negotiated::NotModified
        );
    }

    #[test]
    fn if_range() {
        assert_eq!(
            run(&[("range", "bytes=0-9"), ("if-range", "\"abc\"")], 1000),
            Negotiated::Partial { start: 0, end: 9 }
        );
        // stale validator: whole file.
        assert_eq!(
            run(&[("range", "bytes=0-9"), ("if-range", "\"old\"")], 1000),
            Negotiated::Full
        );
        assert_eq!(
            run(
                &[("range", "bytes=0-9"), ("if-range", "\"old\""), ("if-none-match", "\"abc\"")],
                1000
            ),
            Negotiated::NotModified
        );
        // a stale validator also disarms the 416.
        assert_eq!(
            run(&[("range", "bytes=5000-"), ("if-range", "\"old\"")], 1000),
            Negotiated::Full
        );
    }

    #[test]
    fn if_range_date() {
        let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000_000);
        let lm = LastModified::from(modified);
        let h = hdrs(&[("range", "bytes=0-9"), ("if-range", "Sun, 09 Sep 2001 01:46:40 GMT")]);
        assert_eq!(
            negotiate(&h, &tag(), Some(&lm), 1000),
            Negotiated::Partial { start: 0, end: 9 }
        );
        let newer = LastModified::from(modified + Duration::from_secs(60));
        assert_eq!(negotiate(&h, &tag(), Some(&newer), 1000), Negotiated::Full);
    }

    #[derive(Debug)]
    struct Meta(u64, SystemTime);

    impl DavMetaData for Meta {
        fn len(&self) -> u64 {
            self.0
        }
        fn modified(&self) -> crate::fs::FsResult<SystemTime> {
            Ok(self.1)
        }
        fn is_dir(&self) -> bool {
            false
        }
    }

    #[test]
    fn etag_tracks_changes() {
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let path = DavPath::new("/a.txt").unwrap();
        let a = etag_string(&path, &Meta(10, t0));
        assert_eq!(a.len(), 18);
        assert_eq!(a, etag_string(&path, &Meta(10, t0)));
        assert_ne!(a, etag_string(&path, &Meta(11, t0)));
        assert_ne!(a, etag_string(&path, &Meta(10, t0 + Duration::from_millis(1))));
        assert_ne!(a, etag_string(&DavPath::new("/b.txt").unwrap(), &Meta(10, t0)));
        assert!(etag(&path, &Meta(10, t0)).is_ok());
    }
}
