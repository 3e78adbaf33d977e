//! Local filesystem access.
//!
//! This implementation is stateless. Every call maps onto one
//! `tokio::fs` call on `basedir` joined with the request path.

#[cfg(unix)]
use std::os::unix::ffi::OsStrExt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use async_stream::stream;
use bytes::{Buf, Bytes, BytesMut};
use futures_util::{FutureExt, TryFutureExt};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};

use crate::davpath::DavPath;
use crate::fs::*;

/// A directory on the local disk.
pub(crate) struct LocalFs {
    pub basedir: PathBuf,
    pub public: bool,
}

#[derive(Debug)]
struct LocalFsFile(tokio::fs::File);

// one entry of a read_dir stream.
struct DirEntry(tokio::fs::DirEntry);

impl LocalFs {
    /// Serve `base`. New files get mode 0644 and new directories 0755 when
    /// `public`, else 0600/0700 (before the umask).
    pub fn new(base: PathBuf, public: bool) -> Arc<LocalFs> {
        Arc::new(LocalFs {
            basedir: base,
            public,
        })
    }

    // DavPath never contains "..", so the result stays below basedir.
    fn abs_path(&self, path: &DavPath) -> PathBuf {
        let mut pathbuf = self.basedir.clone();
        pathbuf.push(path.as_rel_ospath());
        pathbuf
    }
}

impl DavFileSystem for LocalFs {
    fn metadata<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, Box<dyn DavMetaData>> {
        async move {
            let path = self.abs_path(path);
            let meta = tokio::fs::metadata(path).await?;
            Ok(Box::new(meta) as _)
        }
        .boxed()
    }

    fn symlink_metadata<'a>(&'a self, davpath: &'a DavPath) -> FsFuture<'a, Box<dyn DavMetaData>> {
        async move {
            let path = self.abs_path(davpath);
            let meta = tokio::fs::symlink_metadata(path).await?;
            Ok(Box::new(meta) as _)
        }
        .boxed()
    }

    fn read_dir<'a>(
        &'a self,
        davpath: &'a DavPath,
    ) -> FsFuture<'a, FsStream<FsResult<Box<dyn DavDirEntry>>>> {
        async move {
            trace!("FS: read_dir {davpath:?}");
            let path = self.abs_path(davpath);
            let mut read_dir = tokio::fs::read_dir(&path).await?;
            Ok(Box::pin(stream! {
                loop {
                    match read_dir.next_entry().await {
                        Ok(Some(entry)) => {
                            yield Ok(Box::new(DirEntry(entry)) as Box<dyn DavDirEntry>);
                        }
                        Ok(None) => break,
                        Err(e) => {
                            debug!("read_dir failed {e}");
                            yield Err(FsError::from(e));
                            break;
                        }
                    }
                }
            }) as _)
        }
        .boxed()
    }

    fn open<'a>(
        &'a self,
        path: &'a DavPath,
        options: OpenOptions,
    ) -> FsFuture<'a, Box<dyn DavFile>> {
        async move {
            trace!("FS: open {path:?}");
            let path = self.abs_path(path);
            let mut opt = tokio::fs::OpenOptions::new();
            opt.read(options.read)
                .write(options.write)
                .append(options.append)
                .truncate(options.truncate)
                .create(options.create)
                .create_new(options.create_new);
            #[cfg(unix)]
            if self.public {
                opt.mode(0o644);
            } else {
                opt.mode(0o600);
            }
            match opt.open(path).await {
                Ok(file) => Ok(Box::new(LocalFsFile(file)) as Box<dyn DavFile>),
                Err(e) => Err(e.into()),
            }
        }
        .boxed()
    }

    fn create_dir<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, ()> {
        async move {
            trace!("FS: create_dir {path:?}");
            let path = self.abs_path(path);
            #[allow(unused_mut)]
            let mut dir = tokio::fs::DirBuilder::new();
            #[cfg(unix)]
            dir.mode(if self.public { 0o755 } else { 0o700 });
            Ok(dir.create(path).await?)
        }
        .boxed()
    }

    fn remove_dir<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, ()> {
        async move {
            trace!("FS: remove_dir {path:?}");
            let path = self.abs_path(path);
            Ok(tokio::fs::remove_dir(path).await?)
        }
        .boxed()
    }

    fn remove_file<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, ()> {
        async move {
            trace!("FS: remove_file {path:?}");
            let path = self.abs_path(path);
            Ok(tokio::fs::remove_file(path).await?)
        }
        .boxed()
    }

    fn rename<'a>(&'a self, from: &'a DavPath, to: &'a DavPath) -> FsFuture<'a, ()> {
        async move {
            trace!("FS: rename {from:?} {to:?}");
            let p_from = self.abs_path(from);
            let p_to = self.abs_path(to);
            if let Err(e) = tokio::fs::rename(&p_from, &p_to).await {
                debug!("rename({from:?}, {to:?}) failed: {e}");
                return Err(e.into());
            }
            Ok(())
        }
        .boxed()
    }

    fn copy<'a>(&'a self, from: &'a DavPath, to: &'a DavPath) -> FsFuture<'a, ()> {
        async move {
            trace!("FS: copy {from:?} {to:?}");
            let p_from = self.abs_path(from);
            let p_to = self.abs_path(to);
            if let Err(e) = tokio::fs::copy(p_from, p_to).await {
                debug!("copy({from:?}, {to:?}) failed: {e}");
                Err(e.into())
            } else {
                Ok(())
            }
        }
        .boxed()
    }
}

impl DavDirEntry for DirEntry {
    #[cfg(unix)]
    fn name(&self) -> Vec<u8> {
        self.0.file_name().as_bytes().to_vec()
    }

    #[cfg(not(unix))]
    fn name(&self) -> Vec<u8> {
        self.0.file_name().to_string_lossy().as_bytes().to_vec()
    }
}

impl DavFile for LocalFsFile {
    fn metadata(&mut self) -> FsFuture<'_, Box<dyn DavMetaData>> {
        async move {
            let file = &self.0;
            let meta = file.metadata().await?;
            Ok(Box::new(meta) as _)
        }
        .boxed()
    }

    fn write_buf(&mut self, mut buf: Box<dyn Buf + Send>) -> FsFuture<'_, ()> {
        async move { Ok(write_all(&mut self.0, &mut *buf).await?) }.boxed()
    }

    fn read_bytes(&mut self, count: usize) -> FsFuture<'_, Bytes> {
        async move {
            let mut buf = BytesMut::zeroed(count);
            let mut filled = 0;
            while filled < count {
                let n = self.0.read(&mut buf[filled..]).await?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            buf.truncate(filled);
            Ok(buf.freeze())
        }
        .boxed()
    }

    fn seek(&mut self, pos: SeekFrom) -> FsFuture<'_, u64> {
        self.0.seek(pos).map_err(Into::into).boxed()
    }

    fn flush(&mut self) -> FsFuture<'_, ()> {
        self.0.sync_all().map_err(Into::into).boxed()
    }
}

impl DavMetaData for std::fs::Metadata {
    fn len(&self) -> u64 {
        self.len()
    }
    fn created(&self) -> FsResult<SystemTime> {
        self.created().map_err(|e| e.into())
    }
    fn modified(&self) -> FsResult<SystemTime> {
        self.modified().map_err(|e| e.into())
    }
    fn is_dir(&self) -> bool {
        self.is_dir()
    }
    fn is_symlink(&self) -> bool {
        self.file_type().is_symlink()
    }
}

async fn write_all<W: AsyncWrite + Unpin>(w: &mut W, buf: &mut (dyn Buf + Send)) -> io::Result<()> {
    while buf.has_remaining() {
        let n = w.write(buf.chunk()).await?;
        if n == 0 {
            return Err(io::ErrorKind::WriteZero.into());
        }
        buf.advance(n);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn read_bytes_stops_at_count_and_eof() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f"), b"0123456789").unwrap();
        let fs = LocalFs::new(dir.path().to_path_buf(), false);
        let path = DavPath::new("/f").unwrap();

        let mut file = fs.open(&path, OpenOptions::read()).await.unwrap();
        file.seek(SeekFrom::Start(2)).await.unwrap();
        assert_eq!(&file.read_bytes(3).await.unwrap()[..], b"234");
        assert_eq!(&file.read_bytes(100).await.unwrap()[..], b"56789");
        assert!(file.read_bytes(100).await.unwrap().is_empty());
    }

    // accepts nothing.
    struct Full;

    impl AsyncWrite for Full {
        fn poll_write(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &[u8],
        ) -> std::task::Poll<io::Result<usize>> {
            std::task::Poll::Ready(Ok(0))
        }
        fn poll_flush(self: std::pin::Pin<&mut Self>, _cx: &mut std::task::Context<'_>) -> std::task::Poll<io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn zero_length_write_is_an_error() {
        let mut buf = Bytes::from_static(b"data");
        let err = write_all(&mut Full, &mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);

        let mut out = Vec::new();
        write_all(&mut out, &mut Bytes::from_static(b"data")).await.unwrap();
        assert_eq!(out, b"data");
    }

    #[tokio::test]
    async fn read_dir_lists_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a"), b"").unwrap();
        std::fs::create_dir(dir.path().join("b")).unwrap();
        let fs = LocalFs::new(dir.path().to_path_buf(), false);

        let root = DavPath::root();
        let mut entries = fs.read_dir(&root).await.unwrap();
        let mut seen = Vec::new();
        while let Some(entry) = entries.next().await {
            let entry = entry.unwrap();
            seen.push(entry.name());
        }
        seen.sort();
        assert_eq!(seen, vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[tokio::test]
    async fn create_dir_needs_parent() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFs::new(dir.path().to_path_buf(), false);
        let path = DavPath::new("/x/y").unwrap();
        assert_eq!(fs.create_dir(&path).await, Err(FsError::NotFound));
    }
}
