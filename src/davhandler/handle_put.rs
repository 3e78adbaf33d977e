use std::error::Error as StdError;
use std::io;

use bytes::Buf;
use headers::HeaderMapExt;
use http::{Request, Response, StatusCode};
use http_body::Body as HttpBody;
use uuid::Uuid;

use crate::body::Body;
use crate::conditional;
use crate::davpath::DavPath;
use crate::errors::*;
use crate::fs::*;

impl crate::DavHandler {
    pub(crate) async fn handle_put<ReqBody, ReqData, ReqError>(
        &self,
        req: &Request<()>,
        path: DavPath,
        body: ReqBody,
    ) -> DavResult<Response<Body>>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        if path.is_root() || path.is_collection() {
            return Err(DavError::Status(StatusCode::METHOD_NOT_ALLOWED));
        }

        let existed = match self.fs.metadata(&path).await {
            Ok(meta) if meta.is_dir() => {
                return Err(DavError::Status(StatusCode::METHOD_NOT_ALLOWED));
            }
            Ok(_) => true,
            Err(FsError::NotFound) => false,
            Err(e) => return Err(e.into()),
        };
        if !self.has_parent(&path).await {
            return Err(DavError::Status(StatusCode::CONFLICT));
        }
        self.check_locks(req, &path, false)?;

        // Upload into a hidden sibling, then rename it over the target.
        // An upload that fails halfway leaves the old content alone.
        let tmp = upload_path(&path);
        let mut file = self.fs.open(&tmp, OpenOptions::write_new()).await?;
        if let Err(e) = self.copy_body(&mut *file, body).await {
            debug!("put {path}: upload failed: {e:?}");
            drop(file);
            let _ = self.fs.remove_file(&tmp).await;
            return Err(e);
        }
        drop(file);
        if let Err(e) = self.fs.rename(&tmp, &path).await {
            debug!("put {path}: rename failed: {e}");
            let _ = self.fs.remove_file(&tmp).await;
            return Err(e.into());
        }

        let mut res = Response::new(Body::empty());
        if let Ok(meta) = self.fs.metadata(&path).await {
            if let Ok(etag) = conditional::etag(&path, &*meta) {
                res.headers_mut().typed_insert(etag);
            }
        }
        res.headers_mut().typed_insert(headers::ContentLength(0));
        *res.status_mut() = if existed {
            StatusCode::NO_CONTENT
        } else {
            StatusCode::CREATED
        };
        Ok(res)
    }

    async fn copy_body<ReqBody, ReqData, ReqError>(&self, file: &mut dyn DavFile, body: ReqBody) -> DavResult<()>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        pin_utils::pin_mut!(body);
        while let Some(data) = body.data().await {
            let buf = data.map_err(|e| DavError::IoError(io::Error::new(io::ErrorKind::UnexpectedEof, e)))?;
            if buf.has_remaining() {
                file.write_buf(Box::new(buf)).await?;
            }
        }
        file.flush().await?;
        Ok(())
    }
}

// ".name.<uuid>.upload" next to the target.
fn upload_path(path: &DavPath) -> DavPath {
    let mut name = b".".to_vec();
    name.extend_from_slice(path.file_name());
    name.extend_from_slice(format!(".{}.upload", Uuid::new_v4().simple()).as_bytes());
    path.parent().join(&name)
}

// Does `name` look like something upload_path() made.
pub(crate) fn is_upload_name(name: &[u8]) -> bool {
    let rest = match name.strip_prefix(b".").and_then(|n| n.strip_suffix(b".upload")) {
        Some(rest) => rest,
        None => return false,
    };
    match rest.iter().rposition(|&c| c == b'.') {
        Some(idx) => {
            let id = &rest[idx + 1..];
            id.len() == 32 && id.iter().all(|c| c.is_ascii_hexdigit())
        }
        None => false,
    }
}
