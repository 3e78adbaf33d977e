use headers::HeaderMapExt;
use http::{Request, Response, StatusCode};

use crate::body::Body;
use crate::davpath::DavPath;
use crate::errors::*;
use crate::fs::*;

impl crate::DavHandler {
    // Creates exactly one collection. Missing intermediate collections
    // are a conflict, they are never created implicitly.
    pub(crate) async fn handle_mkcol(&self, _req: &Request<()>, mut path: DavPath) -> DavResult<Response<Body>> {
        let mut res = Response::new(Body::empty());

        match self.fs.metadata(&path).await {
            Ok(_) => return Err(DavError::Status(StatusCode::METHOD_NOT_ALLOWED)),
            Err(FsError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }
        if !self.has_parent(&path).await {
            return Err(DavError::Status(StatusCode::CONFLICT));
        }
        self.fs.create_dir(&path).await?;

        if !path.is_collection() {
            path.add_slash();
            res.headers_mut()
                .typed_insert(crate::davheaders::ContentLocation(path.with_prefix_url_string()));
        }
        res.headers_mut().typed_insert(headers::ContentLength(0));
        *res.status_mut() = StatusCode::NO_CONTENT;
        Ok(res)
    }
}
