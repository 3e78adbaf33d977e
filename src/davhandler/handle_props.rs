use std::io;

use headers::HeaderMapExt;
use http::{HeaderValue, Request, Response, StatusCode};
use xml::writer::{EventWriter, XmlEvent as XmlWEvent};
use xmltree::Element;

use crate::body::Body;
use crate::conditional;
use crate::davheaders::Depth;
use crate::davpath::DavPath;
use crate::errors::*;
use crate::fs::*;
use super::handle_put::is_upload_name;
use crate::util::{systemtime_to_httpdate, systemtime_to_rfc3339, MemBuffer};
use crate::xmltree_ext::{self, ElementExt, NS_DAV_URI};

impl crate::DavHandler {
    pub(crate) async fn handle_propfind(&self, req: &Request<()>, mut path: DavPath) -> DavResult<Response<Body>> {
        // only depth 0 and 1 are supported. infinity, or nothing at
        // all (which means infinity) is refused.
        let depth = match req.headers().typed_get::<Depth>() {
            Some(Depth::Zero) => Depth::Zero,
            Some(Depth::One) => Depth::One,
            _ => {
                debug!("propfind {path}: unsupported depth");
                return Err(DavError::Status(StatusCode::BAD_REQUEST));
            }
        };

        let mut res = Response::new(Body::empty());
        let meta = self.fs.metadata(&path).await?;
        if !meta.is_dir() && path.is_collection() {
            return Err(DavError::Status(StatusCode::NOT_FOUND));
        }
        self.fixpath(&mut res, &mut path, &*meta);

        // Gather everything first, so that an unreadable directory is
        // an error and not a half-written document.
        let mut children = Vec::new();
        if meta.is_dir() && depth == Depth::One {
            let entries = self.children(&path).await.map_err(|e| {
                warn!("propfind {path}: cannot list directory: {e:?}");
                DavError::Status(StatusCode::INTERNAL_SERVER_ERROR)
            })?;
            for mut child in entries {
                if is_upload_name(child.file_name()) {
                    continue;
                }
                if self.hide_symlinks && self.is_symlink(&child).await {
                    continue;
                }
                match self.fs.metadata(&child).await {
                    Ok(m) => {
                        if m.is_dir() {
                            child.add_slash();
                        }
                        children.push((child, m));
                    }
                    Err(e) => debug!("propfind: skipping {child}: {e}"),
                }
            }
        }

        let mut pw = PropWriter::new(self)?;
        pw.write_response(&path, &*meta)?;
        for (child, m) in &children {
            pw.write_response(child, &**m)?;
        }
        let body = pw.close()?;

        let h = res.headers_mut();
        h.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/xml; charset=utf-8"),
        );
        h.typed_insert(headers::CacheControl::new().with_no_store());
        h.typed_insert(headers::ContentLength(body.len() as u64));
        *res.status_mut() = StatusCode::MULTI_STATUS;
        *res.body_mut() = Body::from(body);
        Ok(res)
    }
}

// Writes one multistatus document.
struct PropWriter<'a> {
    emitter: EventWriter<MemBuffer>,
    handler: &'a crate::DavHandler,
}

impl<'a> PropWriter<'a> {
    fn new(handler: &'a crate::DavHandler) -> DavResult<PropWriter<'a>> {
        let mut emitter = xmltree_ext::emitter(MemBuffer::new())?;
        emitter.write(XmlWEvent::start_element("D:multistatus").ns("D", NS_DAV_URI))?;
        Ok(PropWriter { emitter, handler })
    }

    // The fixed property set.
    fn props(&self, path: &DavPath, meta: &dyn DavMetaData) -> Vec<Element> {
        let mut v = Vec::new();
        let name = String::from_utf8_lossy(path.file_name()).into_owned();
        v.push(Element::new2("D:displayname").text(name.clone()));

        let modified = meta.modified().ok();
        let created = meta.created().ok().or(modified);
        if let Some(t) = created {
            v.push(Element::new2("D:creationdate").text(systemtime_to_rfc3339(t)));
        }
        if let Some(t) = modified {
            v.push(Element::new2("D:getlastmodified").text(systemtime_to_httpdate(t)));
        }

        if meta.is_dir() {
            v.push(Element::new2("D:resourcetype").child(Element::new2("D:collection")));
        } else {
            v.push(Element::new2("D:resourcetype"));
            v.push(Element::new2("D:getcontentlength").text(meta.len().to_string()));
            v.push(Element::new2("D:getcontenttype").text(self.handler.mime_types.lookup(&name)));
            v.push(Element::new2("D:getetag").text(conditional::etag_string(path, meta)));
        }
        v
    }

    fn write_response(&mut self, path: &DavPath, meta: &dyn DavMetaData) -> DavResult<()> {
        let props = self.props(path, meta);
        let em = &mut self.emitter;

        em.write(XmlWEvent::start_element("D:response"))?;
        Element::new2("D:href")
            .text(path.with_prefix_url_string())
            .write_ev(em)?;
        em.write(XmlWEvent::start_element("D:propstat"))?;
        em.write(XmlWEvent::start_element("D:prop"))?;
        for p in &props {
            p.write_ev(em)?;
        }
        em.write(XmlWEvent::end_element())?;
        Element::new2("D:status")
            .text("HTTP/1.1 200 OK")
            .write_ev(em)?;
        em.write(XmlWEvent::end_element())?; // propstat
        em.write(XmlWEvent::end_element())?; // response
        Ok(())
    }

    fn close(mut self) -> DavResult<bytes::Bytes> {
        self.emitter.write(XmlWEvent::end_element())?;
        let mut buf = self.emitter.into_inner();
        io::Write::flush(&mut buf)?;
        Ok(buf.take())
    }
}
