//! Atomic whole-file replacement.
//!
//! Sequence: `open_dir_nofollow(parent) -> openat(tmp, O_EXCL) -> write+fsync
//! -> renameat(tmp, final) -> fsync(dirfd)`. Readers observe either the old
//! or the new content, never a partial file.
use std::fs::File;
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use rustix::fd::OwnedFd;
use rustix::fs::{openat, renameat, unlinkat, AtFlags, Mode, OFlags, CWD};
use rustix::io::Errno;

const TMP_SUFFIX: &str = ".opcore.tmp";

// Unique temporary names within a process.
static NEXT_TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

fn errno_to_io(e: Errno) -> std::io::Error {
    std::io::Error::from_raw_os_error(e.raw_os_error())
}

fn cstring(bytes: &[u8]) -> std::io::Result<std::ffi::CString> {
    std::ffi::CString::new(bytes)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid path"))
}

/// Open a directory with `O_DIRECTORY` | `O_NOFOLLOW`.
///
/// # Errors
///
/// Returns an IO error if the directory cannot be opened.
pub fn open_dir_nofollow(dir: &Path) -> std::io::Result<OwnedFd> {
    let c = cstring(dir.as_os_str().as_bytes())?;
    openat(
        CWD,
        c.as_c_str(),
        OFlags::RDONLY | OFlags::DIRECTORY | OFlags::CLOEXEC | OFlags::NOFOLLOW,
        Mode::empty(),
    )
    .map_err(errno_to_io)
}

/// Replace `path` with `data` atomically, creating it if needed.
///
/// # Errors
///
/// Returns an IO error if any step fails; the temporary file is removed on failure.
pub fn write_atomic(path: &Path, data: &[u8], mode: u32) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let fname = path
        .file_name()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"))?;
    let ctr = NEXT_TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        ".{}.{}.{ctr}{TMP_SUFFIX}",
        fname.to_string_lossy(),
        std::process::id()
    );
    let tmp_c = cstring(tmp_name.as_bytes())?;
    let final_c = cstring(fname.as_bytes())?;

    let dirfd = open_dir_nofollow(parent)?;
    let fd = openat(
        &dirfd,
        tmp_c.as_c_str(),
        OFlags::WRONLY | OFlags::CREATE | OFlags::EXCL | OFlags::CLOEXEC,
        Mode::from_raw_mode(mode),
    )
    .map_err(errno_to_io)?;
    let mut f = File::from(fd);
    let written = f.write_all(data).and_then(|()| f.sync_all());
    drop(f);
    if let Err(e) = written {
        let _ = unlinkat(&dirfd, tmp_c.as_c_str(), AtFlags::empty());
        return Err(e);
    }
    if let Err(e) = renameat(&dirfd, tmp_c.as_c_str(), &dirfd, final_c.as_c_str()) {
        let _ = unlinkat(&dirfd, tmp_c.as_c_str(), AtFlags::empty());
        return Err(errno_to_io(e));
    }
    rustix::fs::fsync(&dirfd).map_err(errno_to_io)
}
