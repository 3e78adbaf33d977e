//
// This module contains the main entry point of the library,
// DavHandler.
//
use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::{self, buf::Buf};
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::StreamExt;
use headers::HeaderMapExt;
use http::{Request, Response, StatusCode};
use http_body::Body as HttpBody;

use crate::body::Body;
use crate::davheaders;
use crate::davpath::DavPath;
use crate::mime::MimeTypes;
use crate::util::{dav_method, dav_xml_error, DavMethod, DavMethodSet};

use crate::errors::DavError;
use crate::fs::*;
use crate::ls::*;
use crate::DavResult;

mod handle_copymove;
mod handle_delete;
mod handle_gethead;
mod handle_lock;
mod handle_mkcol;
mod handle_options;
mod handle_props;
mod handle_put;

use handle_gethead::READ_BUF_SIZE;

// Largest XML request body we are willing to buffer.
const MAX_XML_BODY: usize = 65536;

/// Configuration of the handler.
#[derive(Clone)]
pub struct DavBuilder {
    /// Prefix to be stripped off when handling request.
    prefix: String,
    /// Filesystem backend.
    fs: FileSystem,
    /// Locksystem backend.
    ls: LockSystem,
    /// Which clients get to see LOCK/UNLOCK.
    lock_policy: Arc<dyn LockPolicy>,
    /// Set of allowed methods (Defaults to "all methods")
    allow: DavMethodSet,
    /// Hide symbolic links? Defaults to `true`.
    hide_symlinks: bool,
    /// Does GET on a directory return indexes.
    autoindex: bool,
    /// read buffer size in bytes
    read_buf_size: usize,
    /// Extension to content-type table.
    mime_types: MimeTypes,
}

/// File system backend.
#[derive(Clone)]
pub enum FileSystem {
    /// A directory on the local filesystem.
    Local {
        /// Path to the root directory.
        base: PathBuf,
        /// Create files world-readable.
        public: bool,
    },
    /// Any other backend.
    Custom(Arc<dyn DavFileSystem>),
}

impl FileSystem {
    /// Serve a local directory
    pub fn local(path: impl Into<PathBuf>, public: bool) -> Self {
        FileSystem::Local {
            base: path.into(),
            public,
        }
    }

    fn build(self) -> Arc<dyn DavFileSystem> {
        match self {
            FileSystem::Local { base, public } => crate::fs::localfs::LocalFs::new(base, public),
            FileSystem::Custom(fs) => fs,
        }
    }
}

/// Lock system backend.
#[derive(Default, Clone)]
pub enum LockSystem {
    /// In-memory lock table.
    #[default]
    Mem,
    /// Any other implementation.
    Custom(Arc<dyn DavLockSystem>),
}

impl LockSystem {
    fn build(self) -> Arc<dyn DavLockSystem> {
        match self {
            LockSystem::Mem => MemLs::new(),
            LockSystem::Custom(ls) => ls,
        }
    }
}

impl DavBuilder {
    /// Create a new configuration builder.
    pub fn new(fs: FileSystem) -> DavBuilder {
        Self {
            prefix: String::new(),
            fs,
            ls: LockSystem::default(),
            lock_policy: Arc::new(DesktopClients),
            allow: DavMethodSet::all(),
            hide_symlinks: true,
            autoindex: false,
            read_buf_size: READ_BUF_SIZE,
            mime_types: MimeTypes::default(),
        }
    }

    /// Use the configuration that was built to generate a DavHandler.
    pub fn build(self) -> DavHandler {
        self.into()
    }

    /// Prefix to be stripped off before translating the rest of
    /// the request path to a filesystem path.
    pub fn strip_prefix(self, prefix: impl Into<String>) -> Self {
        let mut this = self;
        this.prefix = prefix.into();
        this
    }

    /// Set the locksystem to use.
    pub fn locksystem(self, ls: LockSystem) -> Self {
        let mut this = self;
        this.ls = ls;
        this
    }

    /// Decide per request whether the client may use LOCK/UNLOCK.
    /// The default is [`DesktopClients`].
    pub fn lock_policy(self, policy: impl LockPolicy + 'static) -> Self {
        let mut this = self;
        this.lock_policy = Arc::new(policy);
        this
    }

    /// Which methods to allow (default is all methods).
    pub fn methods(self, allow: DavMethodSet) -> Self {
        let mut this = self;
        this.allow = allow;
        this
    }

    /// Hide symbolic links (default is true)
    pub fn hide_symlinks(self, hide: bool) -> Self {
        let mut this = self;
        this.hide_symlinks = hide;
        this
    }

    /// Does a GET on a directory produce a directory index (default is false).
    pub fn autoindex(self, autoindex: bool) -> Self {
        let mut this = self;
        this.autoindex = autoindex;
        this
    }

    /// Read buffer size in bytes
    pub fn read_buf_size(self, size: usize) -> Self {
        let mut this = self;
        this.read_buf_size = size.max(1);
        this
    }

    /// Replace the extension to content-type table.
    pub fn mime_types(self, mime_types: MimeTypes) -> Self {
        let mut this = self;
        this.mime_types = mime_types;
        this
    }
}

/// The webdav handler struct.
///
/// The `builder` and `build` methods are used to instantiate a handler.
///
/// The `handle` and `handle_with` methods are the methods that do the actual work.
#[derive(Clone)]
pub struct DavHandler {
    pub(crate) prefix: Arc<String>,
    pub(crate) fs: Arc<dyn DavFileSystem>,
    pub(crate) ls: Arc<dyn DavLockSystem>,
    pub(crate) lock_policy: Arc<dyn LockPolicy>,
    pub(crate) allow: DavMethodSet,
    pub(crate) hide_symlinks: bool,
    pub(crate) autoindex: bool,
    pub(crate) read_buf_size: usize,
    pub(crate) mime_types: Arc<MimeTypes>,
}

impl From<DavBuilder> for DavHandler {
    fn from(cfg: DavBuilder) -> Self {
        Self {
            prefix: Arc::new(cfg.prefix),
            fs: cfg.fs.build(),
            ls: cfg.ls.build(),
            lock_policy: cfg.lock_policy,
            allow: cfg.allow,
            hide_symlinks: cfg.hide_symlinks,
            autoindex: cfg.autoindex,
            read_buf_size: cfg.read_buf_size,
            mime_types: Arc::new(cfg.mime_types),
        }
    }
}

impl DavHandler {
    /// Return a configuration builder.
    pub fn builder(fs: FileSystem) -> DavBuilder {
        DavBuilder::new(fs)
    }

    /// Handle a webdav request.
    pub async fn handle<ReqBody, ReqData, ReqError>(&self, req: Request<ReqBody>) -> Response<Body>
    where
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
    {
        self.handle_inner(req).await
    }

    /// Handle a webdav request, with an extra prefix appended to the
    /// configured one. Useful when one handler is mounted in several places.
    pub async fn handle_with<ReqBody, ReqData, ReqError>(
        &self,
        req: Request<ReqBody>,
        prefix: Option<String>,
    ) -> Response<Body>
    where
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
    {
        let mut this = self.clone();
        if let Some(prefix) = prefix {
            this.prefix = Arc::new(format!(
                "{}/{}",
                this.prefix.strip_suffix('/').unwrap_or(&this.prefix),
                prefix.strip_prefix('/').unwrap_or(&prefix)
            ));
        }
        this.handle_inner(req).await
    }
}

impl DavHandler {
    // helper.
    pub(crate) async fn has_parent<'a>(&'a self, path: &'a DavPath) -> bool {
        let p = path.parent();
        self.fs
            .metadata(&p)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    // does this client get level 2 semantics.
    pub(crate) fn can_lock(&self, req: &Request<()>) -> bool {
        self.lock_policy.supports_locking(req.headers())
    }

    // See if this is a directory and if so, if we have
    // to fixup the path by adding a slash at the end.
    pub(crate) fn fixpath(&self, res: &mut Response<Body>, path: &mut DavPath, meta: &dyn DavMetaData) {
        if meta.is_dir() && !path.is_collection() {
            path.add_slash();
            let newloc = path.with_prefix_url_string();
            res.headers_mut()
                .typed_insert(davheaders::ContentLocation(newloc));
        }
    }

    // A write on `path` must present the token of any lock on it (or, if
    // `deep`, on anything below it).
    pub(crate) fn check_locks(&self, req: &Request<()>, path: &DavPath, deep: bool) -> DavResult<()> {
        let tokens = req
            .headers()
            .typed_get::<davheaders::If>()
            .map(|i| i.0)
            .unwrap_or_default();
        match self.ls.check(path, deep, &tokens) {
            Ok(()) => Ok(()),
            Err(lock) => {
                debug!("{path} is locked by {}", lock.token);
                Err(DavError::Locked)
            }
        }
    }

    // Remove a file, or a directory and everything below it.
    // Symlinks are removed, never followed.
    pub(crate) fn delete_tree<'a>(&'a self, path: &'a DavPath) -> BoxFuture<'a, DavResult<()>> {
        async move {
            let meta = self.fs.symlink_metadata(path).await?;
            if !meta.is_dir() || meta.is_symlink() {
                self.fs.remove_file(path).await?;
                return Ok(());
            }
            for child in self.children(path).await? {
                self.delete_tree(&child).await?;
            }
            self.fs.remove_dir(path).await?;
            Ok(())
        }
        .boxed()
    }

    // Copy a file or a directory tree. Directories are created before their
    // children. A failure halfway leaves a partial copy behind.
    pub(crate) fn copy_tree<'a>(&'a self, from: &'a DavPath, to: &'a DavPath) -> BoxFuture<'a, DavResult<()>> {
        async move {
            let meta = self.fs.metadata(from).await?;
            if !meta.is_dir() {
                self.fs.copy(from, to).await?;
                return Ok(());
            }
            self.fs.create_dir(to).await?;
            for child in self.children(from).await? {
                if self.hide_symlinks && self.is_symlink(&child).await {
                    continue;
                }
                let dest = to.join(child.file_name());
                self.copy_tree(&child, &dest).await?;
            }
            Ok(())
        }
        .boxed()
    }

    // the paths of all entries of a directory.
    pub(crate) async fn children(&self, path: &DavPath) -> DavResult<Vec<DavPath>> {
        let mut entries = self.fs.read_dir(path).await?;
        let mut v = Vec::new();
        while let Some(entry) = entries.next().await {
            v.push(path.join(&entry?.name()));
        }
        Ok(v)
    }

    pub(crate) async fn is_symlink(&self, path: &DavPath) -> bool {
        self.fs
            .symlink_metadata(path)
            .await
            .map(|m| m.is_symlink())
            .unwrap_or(false)
    }

    // drain request body and return it.
    pub(crate) async fn read_request<ReqBody, ReqData, ReqError>(
        &self,
        body: ReqBody,
        max_size: usize,
    ) -> DavResult<Vec<u8>>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        let mut data = Vec::new();
        pin_utils::pin_mut!(body);
        while let Some(res) = body.data().await {
            let mut buf = res.map_err(|_| {
                DavError::IoError(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "UnexpectedEof",
                ))
            })?;
            while buf.has_remaining() {
                if data.len() + buf.remaining() > max_size {
                    return Err(StatusCode::PAYLOAD_TOO_LARGE.into());
                }
                let b = buf.chunk();
                let l = b.len();
                data.extend_from_slice(b);
                buf.advance(l);
            }
        }
        Ok(data)
    }

    // internal dispatcher.
    async fn handle_inner<ReqBody, ReqData, ReqError>(
        &self,
        req: Request<ReqBody>,
    ) -> Response<Body>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        // Turn any DavError results into a HTTP error response.
        match self.handle2(req).await {
            Ok(resp) => {
                debug!("== END REQUEST result {}", resp.status());
                resp
            }
            Err(err) => {
                debug!("== END REQUEST result {:?}", err);
                error_response(&err)
            }
        }
    }

    // internal dispatcher part 2.
    async fn handle2<ReqBody, ReqData, ReqError>(
        &self,
        req: Request<ReqBody>,
    ) -> DavResult<Response<Body>>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        let (req, body) = {
            let (parts, body) = req.into_parts();
            (Request::from_parts(parts, ()), body)
        };

        if log_enabled!(log::Level::Trace) {
            for (name, value) in req.headers() {
                trace!("  {}: {:?}", name, value);
            }
        }

        // translate HTTP method to Webdav method.
        let method = match dav_method(req.method()) {
            Ok(m) => m,
            Err(e) => {
                debug!("refusing method {} request {}", req.method(), req.uri());
                return Err(e);
            }
        };

        // see if method is allowed.
        if !self.allow.contains(method) {
            debug!(
                "method {} not allowed on request {}",
                req.method(),
                req.uri()
            );
            return Err(DavError::StatusClose(StatusCode::METHOD_NOT_ALLOWED));
        }

        // make sure the request path is valid. This happens before
        // the filesystem is touched.
        let path = DavPath::from_uri_and_prefix(req.uri(), &self.prefix)?;

        // nothing works without a root directory.
        match self.fs.metadata(&DavPath::root()).await {
            Ok(meta) if meta.is_dir() => {}
            _ => {
                warn!("root of the share is not a directory");
                return Err(StatusCode::INTERNAL_SERVER_ERROR.into());
            }
        }

        // PUT is the only handler that reads the body itself. All the
        // other handlers either expected no body, or a pre-read Vec<u8>.
        let (body_strm, body_data) = match method {
            DavMethod::PUT => (Some(body), Vec::new()),
            _ => (None, self.read_request(body, MAX_XML_BODY).await?),
        };

        // Not all methods accept a body.
        if !DavMethod::WEBDAV_BODY.contains(method) && !body_data.is_empty() {
            return Err(StatusCode::UNSUPPORTED_MEDIA_TYPE.into());
        }

        debug!("== START REQUEST {:?} {}", method, path);

        match method {
            DavMethod::OPTIONS => self.handle_options(&req, path).await,
            DavMethod::PROPFIND => self.handle_propfind(&req, path).await,
            DavMethod::MKCOL => self.handle_mkcol(&req, path).await,
            DavMethod::DELETE => self.handle_delete(&req, path).await,
            DavMethod::LOCK => self.handle_lock(&req, path, &body_data).await,
            DavMethod::UNLOCK => self.handle_unlock(&req, path).await,
            DavMethod::HEAD | DavMethod::GET => self.handle_get(&req, path).await,
            DavMethod::COPY | DavMethod::MOVE => self.handle_copymove(&req, path, method).await,
            DavMethod::PUT => match body_strm {
                Some(body) => self.handle_put(&req, path, body).await,
                None => Err(StatusCode::INTERNAL_SERVER_ERROR.into()),
            },
            _ => Err(DavError::UnknownDavMethod),
        }
    }
}

// Empty-bodied response for an error, except that 423 says which
// precondition failed.
fn error_response(err: &DavError) -> Response<Body> {
    let mut resp = Response::new(Body::empty());
    *resp.status_mut() = err.statuscode();
    let h = resp.headers_mut();
    if let DavError::Locked = err {
        let body = "<D:lock-token-submitted/>";
        h.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/xml; charset=utf-8"),
        );
        *resp.body_mut() = dav_xml_error(body);
        return resp;
    }
    h.typed_insert(headers::ContentLength(0));
    if err.must_close() {
        h.typed_insert(headers::Connection::close());
    }
    resp
}
