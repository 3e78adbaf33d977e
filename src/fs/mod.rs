//! Contains the structs and traits that define a filesystem backend.
//!
//! You only need this if you want to serve something else than a
//! local directory: implement [`DavFileSystem`] and hand it to
//! [`FileSystem::Custom`](crate::FileSystem::Custom).
//!
//! Paths passed to a backend have already been normalized and checked,
//! they never contain `..`.
use std::error::Error;
use std::fmt::{self, Debug};
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::time::SystemTime;

use bytes::{Buf, Bytes};
use futures_util::Stream;

use crate::davpath::DavPath;

pub(crate) mod localfs;

pub use std::io::SeekFrom;

/// Errors generated by a filesystem implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    NotImplemented,
    GeneralFailure,
    Exists,
    NotFound,
    Forbidden,
    /// rename(2) across filesystems.
    CrossDevice,
    NotEmpty,
    NotADirectory,
}

/// The Result type.
pub type FsResult<T> = std::result::Result<T, FsError>;

/// A webdav "filesystem" stream.
pub type FsStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// The future type used by the filesystem traits.
pub type FsFuture<'a, T> = Pin<Box<dyn Future<Output = FsResult<T>> + Send + 'a>>;

/// Open options for [`DavFileSystem::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenOptions {
    /// open for reading
    pub read: bool,
    /// open for writing
    pub write: bool,
    /// open in write-append mode
    pub append: bool,
    /// truncate file first when writing
    pub truncate: bool,
    /// create file if it doesn't exist
    pub create: bool,
    /// must create new file, fail if it already exists.
    pub create_new: bool,
}

impl OpenOptions {
    pub fn read() -> OpenOptions {
        OpenOptions {
            read: true,
            ..OpenOptions::default()
        }
    }

    /// Write to a file that must not exist yet.
    pub fn write_new() -> OpenOptions {
        OpenOptions {
            write: true,
            create_new: true,
            ..OpenOptions::default()
        }
    }
}

/// The storage backend.
///
/// All calls are plain POSIX-like primitives, the handler builds the
/// webdav semantics (recursive copy, overwrite rules, ...) on top of them.
pub trait DavFileSystem: Send + Sync {
    /// Stat a file, following symlinks.
    fn metadata<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, Box<dyn DavMetaData>>;

    /// Stat a file, not following symlinks.
    fn symlink_metadata<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, Box<dyn DavMetaData>> {
        self.metadata(path)
    }

    /// List a directory. A failure halfway through is yielded as an `Err` item.
    fn read_dir<'a>(
        &'a self,
        path: &'a DavPath,
    ) -> FsFuture<'a, FsStream<FsResult<Box<dyn DavDirEntry>>>>;

    /// Open a file.
    fn open<'a>(&'a self, path: &'a DavPath, options: OpenOptions) -> FsFuture<'a, Box<dyn DavFile>>;

    /// Create one directory. The parent must exist.
    fn create_dir<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, ()>;

    /// Remove an empty directory.
    fn remove_dir<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, ()>;

    /// Remove a file (or symlink).
    fn remove_file<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, ()>;

    /// Atomic rename. Must not fall back to copying.
    fn rename<'a>(&'a self, from: &'a DavPath, to: &'a DavPath) -> FsFuture<'a, ()>;

    /// Copy the contents of a single file.
    fn copy<'a>(&'a self, from: &'a DavPath, to: &'a DavPath) -> FsFuture<'a, ()>;
}

/// One directory entry. The handler stats entries itself, so a name is all
/// it needs.
pub trait DavDirEntry: Send + Sync {
    /// Name of the entry, not percent-encoded.
    fn name(&self) -> Vec<u8>;
}

/// A `DavFile` is the equivalent of `std::fs::File`.
pub trait DavFile: Debug + Send + Sync {
    fn metadata(&mut self) -> FsFuture<'_, Box<dyn DavMetaData>>;
    fn write_buf(&mut self, buf: Box<dyn Buf + Send>) -> FsFuture<'_, ()>;
    /// Read at most `count` bytes. Returns an empty buffer at end of file.
    fn read_bytes(&mut self, count: usize) -> FsFuture<'_, Bytes>;
    fn seek(&mut self, pos: SeekFrom) -> FsFuture<'_, u64>;
    fn flush(&mut self) -> FsFuture<'_, ()>;
}

/// File metadata. Basically type, length, and some timestamps.
pub trait DavMetaData: Debug + Send + Sync {
    /// Size of the file.
    fn len(&self) -> u64;
    /// `Modified` timestamp.
    fn modified(&self) -> FsResult<SystemTime>;
    /// File or directory (aka collection).
    fn is_dir(&self) -> bool;

    /// Creation time. Not every filesystem has one.
    fn created(&self) -> FsResult<SystemTime> {
        Err(FsError::NotImplemented)
    }
    /// Is this a symbolic link. (default: false)
    fn is_symlink(&self) -> bool {
        false
    }
    /// Is the file empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            FsError::NotImplemented => "not implemented",
            FsError::GeneralFailure => "general failure",
            FsError::Exists => "file exists",
            FsError::NotFound => "not found",
            FsError::Forbidden => "forbidden",
            FsError::CrossDevice => "cross-device rename",
            FsError::NotEmpty => "directory not empty",
            FsError::NotADirectory => "not a directory",
        };
        f.write_str(msg)
    }
}

impl Error for FsError {}

impl From<&io::Error> for FsError {
    fn from(e: &io::Error) -> Self {
        #[cfg(unix)]
        if let Some(errno) = e.raw_os_error() {
            match errno {
                libc::ENOENT => return FsError::NotFound,
                libc::EACCES | libc::EPERM | libc::EROFS => return FsError::Forbidden,
                libc::EEXIST => return FsError::Exists,
                libc::EXDEV => return FsError::CrossDevice,
                libc::ENOTEMPTY => return FsError::NotEmpty,
                libc::ENOTDIR => return FsError::NotADirectory,
                _ => {}
            }
        }
        match e.kind() {
            io::ErrorKind::NotFound => FsError::NotFound,
            io::ErrorKind::PermissionDenied => FsError::Forbidden,
            io::ErrorKind::AlreadyExists => FsError::Exists,
            _ => FsError::GeneralFailure,
        }
    }
}

impl From<io::Error> for FsError {
    fn from(e: io::Error) -> Self {
        (&e).into()
    }
}

impl From<FsError> for io::Error {
    fn from(e: FsError) -> Self {
        let kind = match e {
            FsError::NotFound => io::ErrorKind::NotFound,
            FsError::Forbidden => io::ErrorKind::PermissionDenied,
            FsError::Exists => io::ErrorKind::AlreadyExists,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, e)
    }
}
