#![allow(dead_code)]

use std::path::Path;

use bytes::Bytes;
use futures_util::StreamExt;
use http::{Method, Request, Response, StatusCode};
use tempfile::TempDir;

use dav_share::body::Body;
use dav_share::{AllClients, DavBuilder, DavHandler, FileSystem};

pub const HOST: &str = "localhost:8080";

pub const LOCKINFO: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
<D:lockinfo xmlns:D="DAV:">
  <D:lockscope><D:exclusive/></D:lockscope>
  <D:locktype><D:write/></D:locktype>
  <D:owner><D:href>tester</D:href></D:owner>
</D:lockinfo>"#;

/// A temporary directory, shared over webdav.
pub struct Share {
    pub dir: TempDir,
    pub dav: DavHandler,
}

impl Share {
    /// Default configuration.
    pub fn new() -> Share {
        Share::with(|b| b)
    }

    /// Every client may lock.
    pub fn locking() -> Share {
        Share::with(|b| b.lock_policy(AllClients))
    }

    pub fn with(f: impl FnOnce(DavBuilder) -> DavBuilder) -> Share {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        let dav = f(DavHandler::builder(FileSystem::local(dir.path(), false))).build();
        Share { dir, dav }
    }

    pub fn path(&self, rel: &str) -> std::path::PathBuf {
        self.dir.path().join(rel)
    }

    pub fn write(&self, rel: &str, data: impl AsRef<[u8]>) {
        let p = self.path(rel);
        if let Some(parent) = p.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(p, data).unwrap();
    }

    pub fn read(&self, rel: &str) -> Vec<u8> {
        std::fs::read(self.path(rel)).unwrap()
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.path(rel).exists()
    }

    /// Send a request without a body.
    pub async fn call(&self, method: &str, uri: &str, headers: &[(&str, &str)]) -> Reply {
        self.call_body(method, uri, headers, Body::empty()).await
    }

    pub async fn call_body(&self, method: &str, uri: &str, headers: &[(&str, &str)], body: Body) -> Reply {
        let mut req = Request::builder()
            .method(Method::from_bytes(method.as_bytes()).unwrap())
            .uri(uri)
            .header("host", HOST);
        for (k, v) in headers {
            req = req.header(*k, *v);
        }
        let resp = self.dav.handle(req.body(body).unwrap()).await;
        Reply::collect(resp).await
    }
}

/// A response with its body read.
pub struct Reply {
    pub status: StatusCode,
    pub headers: http::HeaderMap,
    pub body: Bytes,
}

impl Reply {
    async fn collect(resp: Response<Body>) -> Reply {
        let (parts, mut body) = resp.into_parts();
        let mut data = Vec::new();
        while let Some(chunk) = body.next().await {
            data.extend_from_slice(&chunk.unwrap());
        }
        Reply {
            status: parts.status,
            headers: parts.headers,
            body: Bytes::from(data),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(|v| v.to_str().unwrap())
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.to_vec()).unwrap()
    }

    /// Number of <D:response> elements in a multistatus body.
    pub fn responses(&self) -> usize {
        self.text().matches("<D:response>").count()
    }
}

pub fn data(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub fn tree_files(root: &Path) -> Vec<(String, Vec<u8>)> {
    let mut v = Vec::new();
    walk(root, root, &mut v);
    v.sort();
    v
}

fn walk(root: &Path, dir: &Path, v: &mut Vec<(String, Vec<u8>)>) {
    for entry in std::fs::read_dir(dir).unwrap() {
        let p = entry.unwrap().path();
        let rel = p.strip_prefix(root).unwrap().to_string_lossy().into_owned();
        if p.is_dir() {
            v.push((format!("{rel}/"), Vec::new()));
            walk(root, &p, v);
        } else {
            v.push((rel, std::fs::read(&p).unwrap()));
        }
    }
}
