use std::io::Cursor;
use std::time::Duration;

use headers::HeaderMapExt;
use http::{HeaderValue, Request, Response, StatusCode};
use xmltree::Element;

use crate::body::Body;
use crate::davheaders::{self, DavTimeout, Depth};
use crate::davpath::DavPath;
use crate::errors::*;
use crate::fs::*;
use crate::ls::DavLock;
use crate::util::MemBuffer;
use crate::xmltree_ext::{self, ElementExt};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_TIMEOUT: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockScope {
    Exclusive,
    Shared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockType {
    Write,
}

// A parsed <D:lockinfo> request body.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LockInfo {
    scope: LockScope,
    locktype: LockType,
    owner: Option<String>,
}

// The one child element of <D:lockscope> or <D:locktype>.
fn single_child(elem: &Element) -> DavResult<&Element> {
    let mut iter = elem.child_elems();
    match (iter.next(), iter.next()) {
        (Some(e), None) => Ok(e),
        _ => Err(DavError::XmlParseError),
    }
}

fn parse_lockscope(elem: &Element) -> DavResult<LockScope> {
    let e = single_child(elem)?;
    if e.is_dav("exclusive") {
        Ok(LockScope::Exclusive)
    } else if e.is_dav("shared") {
        Ok(LockScope::Shared)
    } else {
        Err(DavError::XmlParseError)
    }
}

fn parse_locktype(elem: &Element) -> DavResult<LockType> {
    let e = single_child(elem)?;
    if e.is_dav("write") {
        Ok(LockType::Write)
    } else {
        Err(DavError::XmlParseError)
    }
}

// <D:owner> is usually <D:href>...</D:href>, sometimes plain text.
fn parse_owner(elem: &Element) -> Option<String> {
    let text = match elem.child_elems().find(|e| e.is_dav("href")) {
        Some(href) => href.get_text(),
        None => elem.get_text(),
    };
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

fn parse_lockinfo(body: &[u8]) -> DavResult<LockInfo> {
    let tree = Element::parse2(Cursor::new(body))?;
    if !tree.is_dav("lockinfo") {
        return Err(DavError::XmlParseError);
    }

    let mut scope = None;
    let mut locktype = None;
    let mut owner = None;
    for elem in tree.child_elems() {
        if elem.is_dav("lockscope") {
            scope = Some(parse_lockscope(elem)?);
        } else if elem.is_dav("locktype") {
            locktype = Some(parse_locktype(elem)?);
        } else if elem.is_dav("owner") {
            owner = parse_owner(elem);
        }
    }

    match (scope, locktype) {
        (Some(scope), Some(locktype)) => Ok(LockInfo {
            scope,
            locktype,
            owner,
        }),
        _ => Err(DavError::XmlParseError),
    }
}

impl crate::DavHandler {
    pub(crate) async fn handle_lock(&self, req: &Request<()>, path: DavPath, xmldata: &[u8]) -> DavResult<Response<Body>> {
        if !self.can_lock(req) {
            debug!("lock {path}: client does not get to lock");
            return Err(DavError::Status(StatusCode::METHOD_NOT_ALLOWED));
        }

        // only depth 0 locks. No header means 0 as well.
        if req.headers().contains_key("depth") {
            match req.headers().typed_get::<Depth>() {
                Some(Depth::Zero) => {}
                d => {
                    debug!("lock {path}: refusing depth {d:?}");
                    return Err(DavError::Status(StatusCode::BAD_REQUEST));
                }
            }
        }

        let timeout = req
            .headers()
            .typed_get::<davheaders::Timeout>()
            .map(|t| t.duration(DEFAULT_TIMEOUT, MAX_TIMEOUT))
            .unwrap_or(DEFAULT_TIMEOUT);

        // An empty body refreshes a lock the client names in If:.
        if xmldata.is_empty() {
            let tokens = req
                .headers()
                .typed_get::<davheaders::If>()
                .map(|i| i.0)
                .unwrap_or_default();
            for token in &tokens {
                if let Ok(lock) = self.ls.refresh(&path, token, timeout) {
                    debug!("lock {} on {path} refreshed", lock.token);
                    return self.lock_response(&lock, StatusCode::OK);
                }
            }
            return Err(DavError::Status(StatusCode::PRECONDITION_FAILED));
        }

        let info = parse_lockinfo(xmldata)?;
        if info.scope != LockScope::Exclusive {
            return Err(DavError::Status(StatusCode::FORBIDDEN));
        }

        // a LOCK on an unmapped url creates an empty file.
        let exists = match self.fs.metadata(&path).await {
            Ok(meta) => {
                if path.is_collection() && !meta.is_dir() {
                    return Err(DavError::Status(StatusCode::NOT_FOUND));
                }
                true
            }
            Err(FsError::NotFound) => {
                // only files get created this way.
                if path.is_collection() || !self.has_parent(&path).await {
                    return Err(DavError::Status(StatusCode::CONFLICT));
                }
                false
            }
            Err(e) => return Err(e.into()),
        };

        let lock = match self.ls.lock(&path, info.owner.as_deref(), timeout) {
            Ok(lock) => lock,
            Err(held) => {
                debug!("lock {path}: already locked by {}", held.token);
                return Err(DavError::Locked);
            }
        };

        if !exists {
            if let Err(e) = self.fs.open(&path, OpenOptions::write_new()).await {
                let _ = self.ls.unlock(&path, &lock.token);
                return Err(e.into());
            }
        }

        let status = if exists {
            StatusCode::OK
        } else {
            StatusCode::CREATED
        };
        self.lock_response(&lock, status)
    }

    pub(crate) async fn handle_unlock(&self, req: &Request<()>, path: DavPath) -> DavResult<Response<Body>> {
        if !self.can_lock(req) {
            return Err(DavError::Status(StatusCode::METHOD_NOT_ALLOWED));
        }

        let token = match req.headers().typed_get::<davheaders::LockToken>() {
            Some(t) => t.0,
            None => return Err(DavError::Status(StatusCode::BAD_REQUEST)),
        };

        match self.ls.unlock(&path, &token) {
            Ok(()) => {
                let mut res = Response::new(Body::empty());
                res.headers_mut().typed_insert(headers::ContentLength(0));
                *res.status_mut() = StatusCode::NO_CONTENT;
                Ok(res)
            }
            Err(()) => {
                debug!("unlock {path}: token {token} does not match");
                Err(DavError::Status(StatusCode::FORBIDDEN))
            }
        }
    }

    fn lock_response(&self, lock: &DavLock, status: StatusCode) -> DavResult<Response<Body>> {
        let body = lockdiscovery(lock)?;

        let mut res = Response::new(Body::empty());
        let h = res.headers_mut();
        h.typed_insert(davheaders::LockToken(lock.token.clone()));
        h.typed_insert(davheaders::Timeout(vec![DavTimeout::Seconds(
            lock.timeout.as_secs() as u32,
        )]));
        h.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/xml; charset=utf-8"),
        );
        h.typed_insert(headers::ContentLength(body.len() as u64));
        *res.status_mut() = status;
        *res.body_mut() = Body::from(body);
        Ok(res)
    }
}

// <D:prop><D:lockdiscovery><D:activelock>...
fn lockdiscovery(lock: &DavLock) -> DavResult<bytes::Bytes> {
    let mut active = Element::new2("D:activelock")
        .child(Element::new2("D:locktype").child(Element::new2("D:write")))
        .child(Element::new2("D:lockscope").child(Element::new2("D:exclusive")))
        .child(Element::new2("D:depth").text("0"));
    if let Some(ref owner) = lock.owner {
        active = active.child(Element::new2("D:owner").child(Element::new2("D:href").text(owner.clone())));
    }
    let active = active
        .child(Element::new2("D:timeout").text(format!("Second-{}", lock.timeout.as_secs())))
        .child(Element::new2("D:locktoken").child(Element::new2("D:href").text(lock.token.clone())))
        .child(
            Element::new2("D:lockroot").child(Element::new2("D:href").text(lock.path.with_prefix_url_string())),
        );
    let tree = Element::new2("D:prop")
        .dav_ns()
        .child(Element::new2("D:lockdiscovery").child(active));

    let mut emitter = xmltree_ext::emitter(MemBuffer::new())?;
    tree.write_ev(&mut emitter)?;
    Ok(emitter.into_inner().take())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    const LOCKINFO: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
        <D:lockinfo xmlns:D="DAV:">
          <D:lockscope><D:exclusive/></D:lockscope>
          <D:locktype><D:write/></D:locktype>
          <D:owner>
            <D:href>http://example.org/~ejw/contact.html</D:href>
          </D:owner>
        </D:lockinfo>"#;

    #[test]
    fn parses_lockinfo() {
        let info = parse_lockinfo(LOCKINFO.as_bytes()).unwrap();
        assert_eq!(info.scope, LockScope::Exclusive);
        assert_eq!(info.locktype, LockType::Write);
        assert_eq!(info.owner.as_deref(), Some("http://example.org/~ejw/contact.html"));
    }

    #[test]
    fn other_prefixes_and_plain_owner() {
        let xml = r#"<a:lockinfo xmlns:a="DAV:"><a:locktype><a:write/></a:locktype>
            <a:lockscope><a:shared/></a:lockscope><a:owner> Finder </a:owner></a:lockinfo>"#;
        let info = parse_lockinfo(xml.as_bytes()).unwrap();
        assert_eq!(info.scope, LockScope::Shared);
        assert_eq!(info.owner.as_deref(), Some("Finder"));
    }

    #[test]
    fn rejects_bad_lockinfo() {
        for xml in [
            "<D:lockinfo xmlns:D=\"DAV:\"><D:lockscope><D:exclusive/>",
            "<lockinfo><lockscope><exclusive/></lockscope><locktype><write/></locktype></lockinfo>",
            "<D:lockinfo xmlns:D=\"DAV:\"><D:locktype><D:write/></D:locktype></D:lockinfo>",
            "<D:lockinfo xmlns:D=\"DAV:\"><D:lockscope><D:exclusive/></D:lockscope>\
             <D:locktype><D:read/></D:locktype></D:lockinfo>",
            "<D:propfind xmlns:D=\"DAV:\"><D:allprop/></D:propfind>",
        ] {
            let err = parse_lockinfo(xml.as_bytes()).unwrap_err();
            assert_eq!(err.statuscode(), StatusCode::BAD_REQUEST, "{xml}");
        }
    }

    #[test]
    fn discovery_document() {
        let lock = DavLock {
            token: "urn:uuid:0f3b6a8c".to_string(),
            path: DavPath::new("/docs/a b.txt").unwrap(),
            owner: Some("me".to_string()),
            timeout_at: SystemTime::now(),
            timeout: Duration::from_secs(600),
        };
        let body = lockdiscovery(&lock).unwrap();
        let s = std::str::from_utf8(&body).unwrap();
        assert!(s.contains("<D:prop xmlns:D=\"DAV:\"><D:lockdiscovery><D:activelock>"));
        assert!(s.contains("<D:depth>0</D:depth>"));
        assert!(s.contains("<D:owner><D:href>me</D:href></D:owner>"));
        assert!(s.contains("<D:timeout>Second-600</D:timeout>"));
        assert!(s.contains("<D:locktoken><D:href>urn:uuid:0f3b6a8c</D:href></D:locktoken>"));
        assert!(s.contains("<D:lockroot><D:href>/docs/a%20b.txt</D:href></D:lockroot>"));
    }
}
