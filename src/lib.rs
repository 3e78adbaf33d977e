//! ## Share a directory over WebDAV
//!
//! [WebDAV] (RFC4918) extends plain HTTP file access (GET, HEAD, PUT, DELETE)
//! with methods to list collections (PROPFIND), create them (MKCOL), copy
//! and move resources (COPY, MOVE) and take write locks (LOCK, UNLOCK).
//!
//! This crate turns one directory subtree into such a share, so that desktop
//! file managers (macOS Finder, the Windows mini-redirector, davfs2, mobile
//! clients) can mount it as a network drive. [`DavHandler`] maps an
//! `http::Request` to an `http::Response`; it does not listen on a socket
//! itself. Anything that speaks the `http` and `http_body` types can drive
//! it, see `demos/server.rs` for a complete hyper server.
//!
//! ## What is implemented.
//!
//! - OPTIONS, GET/HEAD, PUT, DELETE, PROPFIND, MKCOL, COPY, MOVE, LOCK, UNLOCK.
//! - Conditional and partial GET: `ETag`, `If-None-Match`, `If-Range`, `Range`
//!   (RFC7232 / RFC7233).
//! - PROPFIND with `Depth: 0` and `Depth: 1`. The property set is fixed, PROPPATCH
//!   is not supported.
//! - Exclusive write locks of `Depth: 0`, kept in memory. Locking is only offered
//!   to clients accepted by the configured [`LockPolicy`].
//!
//! ## Backends.
//!
//! - [`fs::DavFileSystem`]: storage backend. [`FileSystem::local`] serves a
//!   directory on the local filesystem.
//! - [`ls::DavLockSystem`]: lock table. The default is the in-memory [`ls::MemLs`].
//!
//! ## Example.
//!
//! ```no_run
//! use std::convert::Infallible;
//! use dav_share::{DavHandler, FileSystem};
//!
//! #[tokio::main]
//! async fn main() {
//!     let dav = DavHandler::builder(FileSystem::local("/srv/share", false))
//!         .strip_prefix("/dav")
//!         .build();
//!
//!     let make_service = hyper::service::make_service_fn(move |_conn| {
//!         let dav = dav.clone();
//!         let svc = hyper::service::service_fn(move |req: hyper::Request<hyper::Body>| {
//!             let dav = dav.clone();
//!             async move { Ok::<_, Infallible>(dav.handle(req).await) }
//!         });
//!         async move { Ok::<_, Infallible>(svc) }
//!     });
//!
//!     let addr = ([127, 0, 0, 1], 8080).into();
//!     if let Err(e) = hyper::Server::bind(&addr).serve(make_service).await {
//!         eprintln!("server error: {e}");
//!     }
//! }
//! ```
//!
//! [WebDAV]: https://tools.ietf.org/html/rfc4918

#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
extern crate log;
#[macro_use]
extern crate lazy_static;

mod conditional;
mod davhandler;
mod davheaders;
mod errors;
mod mime;
mod util;
mod xmltree_ext;

pub mod body;
pub mod davpath;
pub mod fs;
pub mod ls;

use crate::errors::{DavError, DavResult};

pub use crate::davhandler::{DavBuilder, DavHandler, FileSystem, LockSystem};
pub use crate::ls::{AllClients, DesktopClients, LockPolicy};
pub use crate::mime::MimeTypes;
pub use crate::util::{DavMethod, DavMethodSet};
