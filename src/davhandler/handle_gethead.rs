use std::io::{self, Write};

use async_stream::stream;
use bytes::Bytes;
use headers::HeaderMapExt;
use http::{status::StatusCode, HeaderValue, Request, Response};

use crate::body::Body;
use crate::conditional::{self, Negotiated};
use crate::davpath::{encode_segment, DavPath};
use crate::errors::*;
use crate::fs::*;
use super::handle_put::is_upload_name;
use crate::util::systemtime_to_httpdate;

pub(super) const READ_BUF_SIZE: usize = 16384;

impl crate::DavHandler {
    pub(crate) async fn handle_get(&self, req: &Request<()>, path: DavPath) -> DavResult<Response<Body>> {
        let head = req.method() == http::Method::HEAD;

        // directories are handled separately.
        let meta = self.fs.metadata(&path).await?;
        if meta.is_dir() {
            return self.handle_dirlist(path, head).await;
        }
        // a file is not a collection.
        if path.is_collection() {
            return Err(DavError::Status(StatusCode::NOT_FOUND));
        }

        let mut file = self.fs.open(&path, OpenOptions::read()).await?;
        let meta = file.metadata().await?;
        let len = meta.len();

        let etag = conditional::etag(&path, &*meta)?;
        let modified = meta.modified().ok().map(headers::LastModified::from);

        let mut res = Response::new(Body::empty());
        let h = res.headers_mut();
        h.typed_insert(headers::AcceptRanges::bytes());
        h.typed_insert(etag.clone());
        if let Some(lm) = modified {
            h.typed_insert(lm);
        }

        let (start, count) = match conditional::negotiate(req.headers(), &etag, modified.as_ref(), len) {
            Negotiated::NotModified => {
                debug!("{path}: not modified");
                *res.status_mut() = StatusCode::NOT_MODIFIED;
                return Ok(res);
            }
            Negotiated::Unsatisfiable => {
                debug!("{path}: range not satisfiable (length {len})");
                let h = res.headers_mut();
                h.typed_insert(headers::ContentRange::unsatisfied_bytes(len));
                h.typed_insert(headers::ContentLength(0));
                *res.status_mut() = StatusCode::RANGE_NOT_SATISFIABLE;
                return Ok(res);
            }
            Negotiated::Partial { start, end } => {
                let cr = headers::ContentRange::bytes(start..=end, len)
                    .map_err(|_| DavError::Status(StatusCode::INTERNAL_SERVER_ERROR))?;
                res.headers_mut().typed_insert(cr);
                *res.status_mut() = StatusCode::PARTIAL_CONTENT;
                (start, end - start + 1)
            }
            Negotiated::Full => (0, len),
        };

        let name = String::from_utf8_lossy(path.file_name()).into_owned();
        let h = res.headers_mut();
        if let Ok(ct) = HeaderValue::from_str(&self.mime_types.lookup(&name)) {
            h.insert(http::header::CONTENT_TYPE, ct);
        }
        h.typed_insert(headers::ContentLength(count));

        if head || count == 0 {
            return Ok(res);
        }

        let read_buf_size = self.read_buf_size;
        *res.body_mut() = Body::stream(stream! {
            let mut todo = count;
            if start > 0 {
                if let Err(e) = file.seek(SeekFrom::Start(start)).await {
                    yield Err(io::Error::from(e));
                    todo = 0;
                }
            }
            while todo > 0 {
                let want = std::cmp::min(todo, read_buf_size as u64) as usize;
                match file.read_bytes(want).await {
                    Ok(buf) if buf.is_empty() => {
                        // file shrunk while we were reading it.
                        debug!("short read, {todo} bytes left");
                        break;
                    }
                    Ok(buf) => {
                        todo -= buf.len() as u64;
                        yield Ok(buf);
                    }
                    Err(e) => {
                        yield Err(io::Error::from(e));
                        break;
                    }
                }
            }
        });

        Ok(res)
    }

    // GET on a collection: an empty 200, or an html index.
    async fn handle_dirlist(&self, mut path: DavPath, head: bool) -> DavResult<Response<Body>> {
        let mut res = Response::new(Body::empty());
        res.headers_mut()
            .typed_insert(headers::AcceptRanges::bytes());

        if !self.autoindex {
            res.headers_mut().typed_insert(headers::ContentLength(0));
            return Ok(res);
        }

        // index links are relative, so the collection must end in a slash.
        if !path.is_collection() {
            path.add_slash();
            let loc = path.with_prefix_url_string();
            if let Ok(loc) = HeaderValue::from_str(&loc) {
                res.headers_mut().insert(http::header::LOCATION, loc);
            }
            res.headers_mut().typed_insert(headers::ContentLength(0));
            *res.status_mut() = StatusCode::FOUND;
            return Ok(res);
        }

        let mut dirents = Vec::new();
        for child in self.children(&path).await? {
            if is_upload_name(child.file_name()) {
                continue;
            }
            if self.hide_symlinks && self.is_symlink(&child).await {
                continue;
            }
            match self.fs.metadata(&child).await {
                Ok(meta) => dirents.push((child, meta)),
                Err(e) => debug!("{child}: skipped in index: {e}"),
            }
        }
        // directories first, then by name.
        dirents.sort_by(|(a, am), (b, bm)| {
            bm.is_dir()
                .cmp(&am.is_dir())
                .then_with(|| a.file_name().cmp(b.file_name()))
        });

        let mut w = Vec::new();
        let upath = htmlescape::encode_minimal(&String::from_utf8_lossy(path.as_bytes()));
        write!(w, "<!DOCTYPE html>\n<html><head>")?;
        write!(w, "<title>Index of {upath}</title>")?;
        write!(w, "<meta charset=\"utf-8\"></head>\n<body>\n")?;
        write!(w, "<h1>Index of {upath}</h1>\n<table>\n")?;
        write!(w, "<tr><th>Name</th><th>Last modified</th><th>Size</th></tr>\n")?;
        if !path.is_root() {
            write!(w, "<tr><td><a href=\"..\">Parent Directory</a></td><td></td><td></td></tr>\n")?;
        }
        for (child, meta) in &dirents {
            let raw = String::from_utf8_lossy(child.file_name()).into_owned();
            let mut href = encode_segment(child.file_name());
            let mut name = htmlescape::encode_minimal(&raw);
            if meta.is_dir() {
                href.push('/');
                name.push('/');
            }
            let modified = meta
                .modified()
                .map(systemtime_to_httpdate)
                .unwrap_or_default();
            let size = if meta.is_dir() {
                "-".to_string()
            } else {
                meta.len().to_string()
            };
            write!(
                w,
                "<tr><td><a href=\"{href}\">{name}</a></td><td>{modified}</td><td>{size}</td></tr>\n"
            )?;
        }
        write!(w, "</table>\n</body></html>\n")?;

        let h = res.headers_mut();
        h.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        h.typed_insert(headers::ContentLength(w.len() as u64));
        if !head {
            *res.body_mut() = Body::from(Bytes::from(w));
        }
        Ok(res)
    }
}
