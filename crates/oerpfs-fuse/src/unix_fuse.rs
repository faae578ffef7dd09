//! Unix FUSE implementation using the `fuser` crate.

use std::ffi::OsStr;
use std::time::SystemTime;

use fuser::{
    FileType, Filesystem, KernelConfig, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request, TimeOrNow,
};
use oerpfs_core::ObjectService;
use tracing::{debug, info, warn};

use crate::common::{inode_attr_to_file_attr, FsOpError, OerpFsCore};
use crate::inode::InodeAttr;
use crate::metadata::EntryKind;

/// `fuser` driver around `OerpFsCore`.
pub struct UnixFuse<S>(pub OerpFsCore<S>);

pub(crate) fn error_to_errno(e: &FsOpError) -> i32 {
    match e {
        FsOpError::NotFound => libc::ENOENT,
        FsOpError::ReadOnly => libc::EROFS,
        FsOpError::PermissionDenied => libc::EACCES,
        FsOpError::InvalidArg => libc::EINVAL,
        FsOpError::NotDir => libc::ENOTDIR,
        FsOpError::IsDir => libc::EISDIR,
        FsOpError::Io(_) => libc::EIO,
    }
}

impl<S: ObjectService> Filesystem for UnixFuse<S> {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), libc::c_int> {
        info!(tree = %self.0.tree.tree_type(), "filesystem ready");
        Ok(())
    }

    fn destroy(&mut self) {
        info!("filesystem shutting down");
    }

    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(name_str) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };

        debug!("lookup: parent={}, name={}", parent, name_str);

        match self.0.do_lookup(parent, name_str) {
            Ok(attr) => reply.entry(&InodeAttr::ttl(), &inode_attr_to_file_attr(&attr), 0),
            Err(e) => reply.error(error_to_errno(&e)),
        }
    }

    fn getattr(&mut self, _req: &Request, ino: u64, reply: ReplyAttr) {
        debug!("getattr: ino={}", ino);

        match self.0.do_getattr(ino) {
            Ok(attr) => reply.attr(&InodeAttr::ttl(), &inode_attr_to_file_attr(&attr)),
            Err(e) => reply.error(error_to_errno(&e)),
        }
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        debug!("read: ino={}, offset={}, size={}", ino, offset, size);

        match self.0.do_read(ino, offset, size) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(error_to_errno(&e)),
        }
    }

    fn write(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        debug!("write: ino={}, offset={}, size={}", ino, offset, data.len());

        match self.0.do_write(ino, offset, data) {
            Ok(written) => reply.written(written),
            Err(e) => reply.error(error_to_errno(&e)),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        debug!("readdir: ino={}, offset={}", ino, offset);

        match self.0.do_readdir(ino) {
            Ok(result) => {
                let skip = usize::try_from(offset).unwrap_or(0);
                for (i, entry) in result.entries.iter().enumerate().skip(skip) {
                    let kind = match entry.kind {
                        EntryKind::File => FileType::RegularFile,
                        EntryKind::Directory => FileType::Directory,
                    };
                    // The offset handed back is where the next call resumes.
                    if reply.add(entry.ino, (i + 1) as i64, kind, &entry.name) {
                        break;
                    }
                }
                reply.ok();
            }
            Err(e) => reply.error(error_to_errno(&e)),
        }
    }

    fn create(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let Some(name_str) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };

        debug!("create: parent={}, name={}", parent, name_str);

        match self.0.do_create(parent, name_str) {
            Ok(attr) => {
                reply.created(&InodeAttr::ttl(), &inode_attr_to_file_attr(&attr), 0, 0, 0)
            }
            Err(e) => reply.error(error_to_errno(&e)),
        }
    }

    fn open(&mut self, _req: &Request, ino: u64, _flags: i32, reply: ReplyOpen) {
        debug!("open: ino={}", ino);

        match self.0.do_open(ino) {
            Ok(()) => reply.opened(0, 0),
            Err(e) => reply.error(error_to_errno(&e)),
        }
    }

    fn opendir(&mut self, _req: &Request, ino: u64, _flags: i32, reply: ReplyOpen) {
        debug!("opendir: ino={}", ino);

        match self.0.do_open(ino) {
            Ok(()) => reply.opened(0, 0),
            Err(e) => reply.error(error_to_errno(&e)),
        }
    }

    fn flush(&mut self, _req: &Request, ino: u64, _fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        debug!("flush: ino={}", ino);

        match self.0.do_flush(ino) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(error_to_errno(&e)),
        }
    }

    fn release(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        debug!("release: ino={}", ino);

        match self.0.do_release(ino) {
            Ok(()) => reply.ok(),
            Err(e) => {
                // The kernel drops release errors; the log is all that is left.
                warn!("release of ino {} failed: {:?}", ino, e);
                reply.error(error_to_errno(&e));
            }
        }
    }

    fn setattr(
        &mut self,
        _req: &Request,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        debug!(
            "setattr: ino={}, mode={:?}, uid={:?}, gid={:?}, size={:?}",
            ino, mode, uid, gid, size
        );

        match self.0.do_setattr(ino) {
            Ok(attr) => reply.attr(&InodeAttr::ttl(), &inode_attr_to_file_attr(&attr)),
            Err(e) => reply.error(error_to_errno(&e)),
        }
    }

    fn statfs(&mut self, _req: &Request, _ino: u64, reply: ReplyStatfs) {
        reply.statfs(0, 0, 0, 0, 0, 4096, 255, 4096);
    }

    fn access(&mut self, _req: &Request, ino: u64, _mask: i32, reply: ReplyEmpty) {
        match self.0.do_access(ino) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(error_to_errno(&e)),
        }
    }
}
