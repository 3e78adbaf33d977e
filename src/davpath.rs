//! Utility module to handle the path part of an URL as a filesystem path.
//!
//! A `DavPath` is always absolute (it starts with `/`), it is kept
//! percent-decoded, and it never contains `.` or `..` segments. A request
//! path that has a `..` segment is refused with `403 Forbidden` before it
//! ever reaches a filesystem backend.
//!
use std::ffi::OsStr;
use std::fmt;
use std::path::Path;

use percent_encoding::{percent_decode, percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::errors::DavError;

// Everything except the RFC3986 "unreserved" characters gets encoded, so a
// space becomes %20 (not '+').
const PATH_SEGMENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Path information relative to a prefix.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DavPath {
    // url prefix without trailing slash, e.g. "" or "/dav".
    prefix: String,
    // decoded and normalized path, starts with '/'.
    path: Vec<u8>,
}

impl fmt::Display for DavPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.with_prefix_url_string())
    }
}

impl fmt::Debug for DavPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.with_prefix_url_string())
    }
}

/// Percent-encode one path segment. Slashes never occur in a segment.
pub fn encode_segment(segment: &[u8]) -> String {
    percent_encode(segment, PATH_SEGMENT_ENCODE_SET).to_string()
}

// Decode and normalize a raw url path. Query string must already be gone.
fn normalize_path(rawpath: &[u8]) -> Result<Vec<u8>, DavError> {
    let mut decoded: Vec<u8> = percent_decode(rawpath).collect();
    if decoded.contains(&0) {
        return Err(DavError::InvalidPath);
    }
    // windows clients sometimes send backslashes.
    for b in decoded.iter_mut() {
        if *b == b'\\' {
            *b = b'/';
        }
    }
    let is_collection = decoded.len() > 1 && decoded.ends_with(b"/");

    let mut path = Vec::with_capacity(decoded.len() + 1);
    for segment in decoded.split(|&c| c == b'/') {
        match segment {
            b"" | b"." => {}
            b".." => return Err(DavError::ForbiddenPath),
            s => {
                path.push(b'/');
                path.extend_from_slice(s);
            }
        }
    }
    if path.is_empty() || is_collection {
        path.push(b'/');
    }
    Ok(path)
}

impl DavPath {
    /// The root of the served tree.
    pub fn root() -> DavPath {
        DavPath {
            prefix: String::new(),
            path: b"/".to_vec(),
        }
    }

    /// Parse a path, as found in a request URI or in a `Destination` header.
    /// Anything after a `?` is ignored.
    pub(crate) fn new(src: &str) -> Result<DavPath, DavError> {
        DavPath::from_str_and_prefix(src, "")
    }

    pub(crate) fn from_str_and_prefix(src: &str, prefix: &str) -> Result<DavPath, DavError> {
        let src = src.trim();
        let src = match src.find('?') {
            Some(idx) => &src[..idx],
            None => src,
        };
        if src == "*" {
            return Ok(DavPath {
                prefix: prefix.trim_end_matches('/').to_string(),
                path: b"/".to_vec(),
            });
        }
        if !src.starts_with('/') {
            return Err(DavError::InvalidPath);
        }
        let prefix = prefix.trim_end_matches('/');
        let rest = match src.strip_prefix(prefix) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => return Err(DavError::IllegalPath),
        };
        Ok(DavPath {
            prefix: prefix.to_string(),
            path: normalize_path(rest.as_bytes())?,
        })
    }

    pub(crate) fn from_uri_and_prefix(uri: &http::uri::Uri, prefix: &str) -> Result<DavPath, DavError> {
        DavPath::from_str_and_prefix(uri.path(), prefix)
    }

    /// The decoded path, including a trailing slash for collections.
    pub fn as_bytes(&self) -> &[u8] {
        &self.path
    }

    /// Percent-encoded path, without the prefix.
    pub fn as_url_string(&self) -> String {
        let mut url = String::with_capacity(self.path.len() + 8);
        for segment in self.path.split(|&c| c == b'/').skip(1) {
            url.push('/');
            url.push_str(&encode_segment(segment));
        }
        if url.is_empty() {
            url.push('/');
        }
        url
    }

    /// Percent-encoded path, with the prefix. This is what goes into `href`.
    pub fn with_prefix_url_string(&self) -> String {
        format!("{}{}", self.prefix, self.as_url_string())
    }

    /// Path relative to the root of the backend, for joining with a base directory.
    #[cfg(unix)]
    pub fn as_rel_ospath(&self) -> &Path {
        use std::os::unix::ffi::OsStrExt;
        let p = self.path.strip_prefix(b"/").unwrap_or(&self.path[..]);
        let p = p.strip_suffix(b"/").unwrap_or(p);
        Path::new(OsStr::from_bytes(p))
    }

    /// Path relative to the root of the backend, for joining with a base directory.
    #[cfg(not(unix))]
    pub fn as_rel_ospath(&self) -> &Path {
        let p = std::str::from_utf8(&self.path).unwrap_or("");
        Path::new(OsStr::new(p.trim_matches('/')))
    }

    /// Was the path requested with a trailing slash.
    pub fn is_collection(&self) -> bool {
        self.path.len() > 1 && self.path.ends_with(b"/")
    }

    pub fn is_root(&self) -> bool {
        self.path == b"/"
    }

    pub fn add_slash(&mut self) {
        if !self.path.ends_with(b"/") {
            self.path.push(b'/');
        }
    }

    // path without trailing slash, the identity of the resource.
    fn trimmed(&self) -> &[u8] {
        if self.is_collection() {
            &self.path[..self.path.len() - 1]
        } else {
            &self.path
        }
    }

    /// Two paths name the same resource (trailing slash does not matter).
    pub fn same_resource(&self, other: &DavPath) -> bool {
        self.trimmed() == other.trimmed()
    }

    /// Is `self` strictly inside the collection `other`.
    pub fn is_descendant_of(&self, other: &DavPath) -> bool {
        let parent = other.trimmed();
        let me = self.trimmed();
        if parent == b"/" {
            return me != b"/";
        }
        me.len() > parent.len() && me.starts_with(parent) && me[parent.len()] == b'/'
    }

    /// Key under which locks on this resource are stored.
    pub fn lock_key(&self) -> String {
        String::from_utf8_lossy(self.trimmed()).into_owned()
    }

    /// The parent collection. The parent of the root is the root.
    pub fn parent(&self) -> DavPath {
        let me = self.trimmed();
        let idx = me.iter().rposition(|&c| c == b'/').unwrap_or(0);
        DavPath {
            prefix: self.prefix.clone(),
            path: me[..idx + 1].to_vec(),
        }
    }

    /// Last path segment, decoded. Empty for the root.
    pub fn file_name(&self) -> &[u8] {
        let me = self.trimmed();
        match me.iter().rposition(|&c| c == b'/') {
            Some(idx) => &me[idx + 1..],
            None => me,
        }
    }

    /// A child of this collection.
    pub fn join(&self, segment: &[u8]) -> DavPath {
        let mut path = self.path.clone();
        if !path.ends_with(b"/") {
            path.push(b'/');
        }
        path.extend_from_slice(segment);
        DavPath {
            prefix: self.prefix.clone(),
            path,
        }
    }
}
