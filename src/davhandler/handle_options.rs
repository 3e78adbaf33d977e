use headers::HeaderMapExt;
use http::{HeaderValue, Request, Response};

use crate::body::Body;
use crate::davpath::DavPath;
use crate::util::DavMethod;
use crate::DavResult;

// in the order they are listed in Allow:.
const ALLOW_ORDER: &[(&str, DavMethod)] = &[
    ("OPTIONS", DavMethod::OPTIONS),
    ("GET", DavMethod::GET),
    ("HEAD", DavMethod::HEAD),
    ("PUT", DavMethod::PUT),
    ("DELETE", DavMethod::DELETE),
    ("PROPFIND", DavMethod::PROPFIND),
    ("MKCOL", DavMethod::MKCOL),
    ("COPY", DavMethod::COPY),
    ("MOVE", DavMethod::MOVE),
    ("LOCK", DavMethod::LOCK),
    ("UNLOCK", DavMethod::UNLOCK),
];

impl crate::DavHandler {
    pub(crate) async fn handle_options(&self, req: &Request<()>, _path: DavPath) -> DavResult<Response<Body>> {
        let mut res = Response::new(Body::empty());

        // Level 2 (locking) is only advertised to clients that
        // the lock policy lets through.
        let can_lock = self.can_lock(req);
        let dav = if can_lock { "1, 2" } else { "1" };

        let h = res.headers_mut();
        h.insert("DAV", HeaderValue::from_static(dav));
        h.insert("MS-Author-Via", HeaderValue::from_static("DAV"));
        h.typed_insert(headers::ContentLength(0));

        let islock = |m: DavMethod| m == DavMethod::LOCK || m == DavMethod::UNLOCK;
        let v: Vec<&str> = ALLOW_ORDER
            .iter()
            .filter(|(_, m)| self.allow.contains(*m) && (can_lock || !islock(*m)))
            .map(|(name, _)| *name)
            .collect();

        if let Ok(a) = HeaderValue::from_str(&v.join(", ")) {
            h.insert(http::header::ALLOW, a);
        }

        Ok(res)
    }
}
