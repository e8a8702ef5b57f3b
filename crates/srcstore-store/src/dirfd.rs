//! Owned directory descriptor with `*at()` child operations.
//!
//! Every child name is resolved relative to the held descriptor, so the
//! directory stays addressable after its parent path is renamed.

use std::fs::File;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::path::Path;

use nix::errno::Errno;
use nix::fcntl::{self, AtFlags, OFlag};
use nix::libc;
use nix::sys::stat::{self, Mode};
use nix::unistd::{self, UnlinkatFlags};

/// What sits at a child name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EntryType {
    Regular,
    Other,
}

#[derive(Debug)]
pub(crate) struct DirHandle {
    fd: OwnedFd,
}

/// Take ownership of a descriptor fresh from a successful `open`/`openat`.
fn owned(fd: RawFd) -> OwnedFd {
    // SAFETY: the descriptor was just returned by the kernel and nothing
    // else refers to it.
    unsafe { OwnedFd::from_raw_fd(fd) }
}

impl DirHandle {
    /// Open `path` as a directory (`O_DIRECTORY | O_CLOEXEC`).
    pub(crate) fn open(path: &Path) -> nix::Result<Self> {
        let fd = fcntl::open(
            path,
            OFlag::O_RDONLY | OFlag::O_DIRECTORY | OFlag::O_CLOEXEC,
            Mode::empty(),
        )?;
        Ok(Self { fd: owned(fd) })
    }

    fn raw(&self) -> Option<RawFd> {
        Some(self.fd.as_raw_fd())
    }

    /// `mkdirat(name, 0777)`; the umask applies.
    pub(crate) fn mkdir(&self, name: &str) -> nix::Result<()> {
        stat::mkdirat(self.raw(), name, Mode::from_bits_truncate(0o777))
    }

    /// `fstatat` without following symlinks. `Ok(None)` when the name is absent.
    pub(crate) fn entry_type(&self, name: &str) -> nix::Result<Option<EntryType>> {
        match stat::fstatat(self.raw(), name, AtFlags::AT_SYMLINK_NOFOLLOW) {
            Ok(st) if st.st_mode & libc::S_IFMT == libc::S_IFREG => Ok(Some(EntryType::Regular)),
            Ok(_) => Ok(Some(EntryType::Other)),
            Err(Errno::ENOENT) => Ok(None),
            Err(errno) => Err(errno),
        }
    }

    /// Create a new file that must not already exist.
    pub(crate) fn create_new(&self, name: &str, mode: u32) -> nix::Result<File> {
        let fd = fcntl::openat(
            self.raw(),
            name,
            OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_CLOEXEC,
            Mode::from_bits_truncate(mode as libc::mode_t),
        )?;
        Ok(File::from(owned(fd)))
    }

    /// Open an existing child read-only, refusing symlinks.
    ///
    /// `O_NONBLOCK` keeps a FIFO planted at `name` from stalling the open;
    /// callers still check the file type afterwards.
    pub(crate) fn open_read(&self, name: &str) -> nix::Result<File> {
        let fd = fcntl::openat(
            self.raw(),
            name,
            OFlag::O_RDONLY | OFlag::O_CLOEXEC | OFlag::O_NOFOLLOW | OFlag::O_NONBLOCK,
            Mode::empty(),
        )?;
        Ok(File::from(owned(fd)))
    }

    /// Hard-link `from` to `to`. Fails with `EEXIST` if `to` exists.
    pub(crate) fn link(&self, from: &str, to: &str) -> nix::Result<()> {
        unistd::linkat(self.raw(), from, self.raw(), to, AtFlags::empty())
    }

    /// Rename `from` to `to`. Fails with `EEXIST` if `to` exists.
    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    pub(crate) fn rename_new(&self, from: &str, to: &str) -> nix::Result<()> {
        fcntl::renameat2(
            self.raw(),
            from,
            self.raw(),
            to,
            fcntl::RenameFlags::RENAME_NOREPLACE,
        )
    }

    /// Rename `from` to `to`. Without `renameat2` an existing `to` is replaced.
    #[cfg(not(all(target_os = "linux", target_env = "gnu")))]
    pub(crate) fn rename_new(&self, from: &str, to: &str) -> nix::Result<()> {
        fcntl::renameat(self.raw(), from, self.raw(), to)
    }

    pub(crate) fn unlink(&self, name: &str) -> nix::Result<()> {
        unistd::unlinkat(self.raw(), name, UnlinkatFlags::NoRemoveDir)
    }

    /// Flush the directory's entries to stable storage.
    pub(crate) fn sync(&self) -> nix::Result<()> {
        unistd::fsync(self.fd.as_raw_fd())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn child_operations_resolve_against_handle() {
        let dir = tempfile::tempdir().unwrap();
        let handle = DirHandle::open(dir.path()).unwrap();

        let mut file = handle.create_new("a", 0o644).unwrap();
        file.write_all(b"payload").unwrap();
        drop(file);

        assert_eq!(handle.entry_type("a").unwrap(), Some(EntryType::Regular));
        assert_eq!(handle.entry_type("missing").unwrap(), None);

        handle.link("a", "b").unwrap();
        assert_eq!(handle.link("a", "b").unwrap_err(), Errno::EEXIST);

        let mut contents = String::new();
        handle.open_read("b").unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "payload");

        handle.unlink("a").unwrap();
        assert_eq!(handle.entry_type("a").unwrap(), None);
    }

    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    #[test]
    fn rename_new_never_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let handle = DirHandle::open(dir.path()).unwrap();
        handle.create_new("first", 0o644).unwrap().write_all(b"first").unwrap();
        handle.create_new("second", 0o644).unwrap().write_all(b"second").unwrap();

        handle.rename_new("first", "target").unwrap();
        assert_eq!(handle.rename_new("second", "target").unwrap_err(), Errno::EEXIST);
        assert_eq!(std::fs::read(dir.path().join("target")).unwrap(), b"first");
        assert_eq!(handle.entry_type("second").unwrap(), Some(EntryType::Regular));
    }

    #[test]
    fn open_read_does_not_block_on_a_fifo() {
        let dir = tempfile::tempdir().unwrap();
        nix::unistd::mkfifo(&dir.path().join("pipe"), Mode::from_bits_truncate(0o644)).unwrap();
        let handle = DirHandle::open(dir.path()).unwrap();

        let file = handle.open_read("pipe").unwrap();
        assert!(!file.metadata().unwrap().is_file());
        assert_eq!(handle.entry_type("pipe").unwrap(), Some(EntryType::Other));
    }

    #[test]
    fn create_new_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let handle = DirHandle::open(dir.path()).unwrap();
        handle.create_new("x", 0o644).unwrap();
        assert_eq!(handle.create_new("x", 0o644).unwrap_err(), Errno::EEXIST);
    }

    #[test]
    fn directories_are_not_regular() {
        let dir = tempfile::tempdir().unwrap();
        let handle = DirHandle::open(dir.path()).unwrap();
        handle.mkdir("sub").unwrap();
        assert_eq!(handle.entry_type("sub").unwrap(), Some(EntryType::Other));
        assert_eq!(handle.mkdir("sub").unwrap_err(), Errno::EEXIST);
    }

    #[test]
    fn opening_a_file_as_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain");
        std::fs::write(&path, b"").unwrap();
        assert_eq!(DirHandle::open(&path).unwrap_err(), Errno::ENOTDIR);
    }
}
