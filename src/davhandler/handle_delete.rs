use headers::HeaderMapExt;
use http::{Request, Response, StatusCode};

use crate::body::Body;
use crate::davheaders::Depth;
use crate::davpath::DavPath;
use crate::errors::*;

impl crate::DavHandler {
    pub(crate) async fn handle_delete(&self, req: &Request<()>, path: DavPath) -> DavResult<Response<Body>> {
        // only infinity is allowed, and that is also the default.
        if req.headers().contains_key("depth") {
            match req.headers().typed_get::<Depth>() {
                Some(Depth::Infinity) => {}
                d => {
                    debug!("delete {path}: refusing depth {d:?}");
                    return Err(DavError::Status(StatusCode::BAD_REQUEST));
                }
            }
        }

        if path.is_root() {
            return Err(DavError::Status(StatusCode::FORBIDDEN));
        }

        let meta = self.fs.symlink_metadata(&path).await?;
        if path.is_collection() && !meta.is_dir() {
            return Err(DavError::Status(StatusCode::NOT_FOUND));
        }
        self.check_locks(req, &path, meta.is_dir())?;

        self.delete_tree(&path).await?;
        self.ls.delete(&path);

        let mut res = Response::new(Body::empty());
        res.headers_mut().typed_insert(headers::ContentLength(0));
        *res.status_mut() = StatusCode::NO_CONTENT;
        Ok(res)
    }
}
