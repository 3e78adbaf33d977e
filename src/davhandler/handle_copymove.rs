use headers::HeaderMapExt;
use http::{Request, Response, StatusCode};

use crate::body::Body;
use crate::davheaders::{self, Depth};
use crate::davpath::DavPath;
use crate::errors::*;
use crate::util::DavMethod;

impl crate::DavHandler {
    pub(crate) async fn handle_copymove(
        &self,
        req: &Request<()>,
        path: DavPath,
        method: DavMethod,
    ) -> DavResult<Response<Body>> {
        let is_move = method == DavMethod::MOVE;

        // source must exist.
        let meta = self.fs.metadata(&path).await?;
        if path.is_collection() && !meta.is_dir() {
            return Err(DavError::Status(StatusCode::NOT_FOUND));
        }

        // a partial-depth copy is not supported.
        if !is_move && req.headers().contains_key("depth") {
            match req.headers().typed_get::<Depth>() {
                Some(Depth::Infinity) => {}
                d => {
                    debug!("copy {path}: refusing depth {d:?}");
                    return Err(DavError::Status(StatusCode::BAD_REQUEST));
                }
            }
        }

        let dest = self.destination(req)?;
        if is_move && path.is_root() {
            return Err(DavError::Status(StatusCode::FORBIDDEN));
        }
        if dest.same_resource(&path) {
            debug!("{method:?} {path}: source and destination are the same");
            return Err(DavError::Status(StatusCode::FORBIDDEN));
        }
        if meta.is_dir() && dest.is_descendant_of(&path) {
            debug!("{method:?} {path}: destination {dest} is inside the source");
            return Err(DavError::Status(StatusCode::FORBIDDEN));
        }
        // overwriting an ancestor would delete the source first.
        if path.is_descendant_of(&dest) {
            debug!("{method:?} {path}: destination {dest} contains the source");
            return Err(DavError::Status(StatusCode::FORBIDDEN));
        }
        if !self.has_parent(&dest).await {
            return Err(DavError::Status(StatusCode::CONFLICT));
        }

        // COPY overwrites by default, MOVE does not.
        let overwrite = req
            .headers()
            .typed_get::<davheaders::Overwrite>()
            .map(|o| o.0)
            .unwrap_or(!is_move);
        let exists = self.fs.symlink_metadata(&dest).await.is_ok();
        if exists && !overwrite {
            return Err(DavError::Status(StatusCode::PRECONDITION_FAILED));
        }

        if is_move {
            self.check_locks(req, &path, true)?;
        }
        self.check_locks(req, &dest, true)?;

        if exists {
            self.delete_tree(&dest).await?;
            self.ls.delete(&dest);
        }

        if is_move {
            // a move is one rename, or nothing.
            if let Err(e) = self.fs.rename(&path, &dest).await {
                debug!("move {path} -> {dest} failed: {e}");
                return Err(DavError::Status(StatusCode::FORBIDDEN));
            }
            self.ls.delete(&path);
        } else {
            self.copy_tree(&path, &dest).await?;
        }

        let mut res = Response::new(Body::empty());
        res.headers_mut().typed_insert(headers::ContentLength(0));
        *res.status_mut() = if exists {
            StatusCode::NO_CONTENT
        } else {
            StatusCode::CREATED
        };
        Ok(res)
    }

    // The Destination: header must be an absolute url on this host. Its
    // path goes through the same checks as a request path.
    fn destination(&self, req: &Request<()>) -> DavResult<DavPath> {
        let bad = || DavError::Status(StatusCode::BAD_REQUEST);

        let dest = req
            .headers()
            .typed_get::<davheaders::Destination>()
            .ok_or_else(bad)?;
        let uri: http::Uri = dest.0.parse().map_err(|_| bad())?;

        let host = req
            .headers()
            .get(http::header::HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| req.uri().authority().map(|a| a.as_str()))
            .ok_or_else(bad)?;
        match uri.authority() {
            Some(a) if a.as_str().eq_ignore_ascii_case(host) => {}
            _ => {
                debug!("destination {} is not on host {host}", dest.0);
                return Err(bad());
            }
        }

        match DavPath::from_uri_and_prefix(&uri, &self.prefix) {
            Ok(p) => Ok(p),
            Err(DavError::ForbiddenPath) => Err(DavError::ForbiddenPath),
            Err(_) => Err(bad()),
        }
    }
}
