use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use srcstore_crypto::ContentHasher;
use srcstore_types::Digest;
use tracing::{debug, info, warn};

use crate::config::{Durability, RepositoryConfig};
use crate::dirfd::{DirHandle, EntryType};
use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectStore;

/// Name of the object directory under a repository root.
pub const OBJECTS_DIR: &str = "objects";

/// Prefix of in-flight object files inside `objects/`.
pub const TEMP_PREFIX: &str = ".tmp-";

/// Published objects are read-only.
const OBJECT_MODE: u32 = 0o444;

/// Attempts at finding an unused temporary name before giving up.
const TEMP_NAME_ATTEMPTS: usize = 16;

/// An open on-disk repository.
///
/// Holds a descriptor on `objects/` for its whole lifetime; all object
/// operations resolve against it, so the handle keeps working if the root
/// is renamed after opening. The descriptor is closed on drop.
///
/// Any number of processes (or threads sharing one handle) may insert and
/// read concurrently. Publication is a single `linkat`, which fails if the
/// name exists, so at most one inserter makes a given object visible and no
/// reader ever observes a partially written object.
#[derive(Debug)]
pub struct Repository {
    root: PathBuf,
    objects: DirHandle,
    config: RepositoryConfig,
}

impl Repository {
    /// Create `root/` (if needed) and `root/objects/`, then open the result.
    ///
    /// Fails with [`StoreError::AlreadyInitialized`] if `root/objects/`
    /// already exists; the existing tree is left untouched. If creating
    /// `objects/` fails, `root/` is removed again only when this call
    /// created it.
    pub fn initialize(root: impl AsRef<Path>) -> StoreResult<Self> {
        Self::initialize_with_config(root, RepositoryConfig::default())
    }

    pub fn initialize_with_config(
        root: impl AsRef<Path>,
        config: RepositoryConfig,
    ) -> StoreResult<Self> {
        let root = root.as_ref();
        Self::create_layout(root, Self::create_objects_dir)?;
        info!(root = %root.display(), "initialized repository");
        Self::open_with_config(root, config)
    }

    /// Create `root/`, then run `create_objects`, undoing the first step if
    /// the second fails.
    fn create_layout(
        root: &Path,
        create_objects: impl FnOnce(&Path) -> StoreResult<()>,
    ) -> StoreResult<()> {
        let created_root = match fs::create_dir(root) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => false,
            Err(e) => return Err(StoreError::io("mkdir", root, e)),
        };

        if let Err(err) = create_objects(root) {
            if created_root {
                if let Err(e) = fs::remove_dir(root) {
                    warn!(
                        root = %root.display(),
                        error = %e,
                        "failed to roll back repository root"
                    );
                }
            }
            return Err(err);
        }
        Ok(())
    }

    fn create_objects_dir(root: &Path) -> StoreResult<()> {
        let root_dir = DirHandle::open(root).map_err(|e| StoreError::os("open", root, e))?;
        match root_dir.mkdir(OBJECTS_DIR) {
            Ok(()) => Ok(()),
            Err(Errno::EEXIST) => Err(StoreError::AlreadyInitialized(root.to_path_buf())),
            Err(e) => Err(StoreError::os("mkdir", root.join(OBJECTS_DIR), e)),
        }
    }

    /// Open an existing repository.
    ///
    /// Fails with [`StoreError::NotARepository`] if `root/objects/` is absent.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with_config(root, RepositoryConfig::default())
    }

    pub fn open_with_config(root: impl AsRef<Path>, config: RepositoryConfig) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        let objects_path = root.join(OBJECTS_DIR);
        let objects = match DirHandle::open(&objects_path) {
            Ok(handle) => handle,
            Err(Errno::ENOENT) | Err(Errno::ENOTDIR) => {
                return Err(StoreError::NotARepository(root));
            }
            Err(e) => return Err(StoreError::os("open", objects_path, e)),
        };
        debug!(root = %root.display(), "opened repository");
        Ok(Self {
            root,
            objects,
            config,
        })
    }

    /// The root path this repository was opened with.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Path of the object for `id`, for diagnostics only.
    pub fn object_path(&self, id: &Digest) -> PathBuf {
        self.root.join(OBJECTS_DIR).join(id.to_hex())
    }

    /// Returns `true` if an object is stored under `id`.
    pub fn contains(&self, id: &Digest) -> StoreResult<bool> {
        match self.objects.entry_type(&id.to_hex()) {
            Ok(None) => Ok(false),
            Ok(Some(EntryType::Regular)) => Ok(true),
            Ok(Some(EntryType::Other)) => Err(StoreError::NotARegularFile(*id)),
            Err(e) => Err(StoreError::os("stat", self.object_path(id), e)),
        }
    }

    /// Store `data` under its digest and return the digest.
    ///
    /// Idempotent: if the object is already present nothing is written.
    pub fn insert(&self, data: &[u8]) -> StoreResult<Digest> {
        let id = ContentHasher::hash(data);
        if self.contains(&id)? {
            debug!(%id, "object already present");
            return Ok(id);
        }

        let mut temp = TempObject::create(self)?;
        temp.write_all(data)
            .map_err(|e| StoreError::io("write", temp.path(self), e))?;
        if self.config.durability == Durability::Fsync {
            temp.file
                .sync_all()
                .map_err(|e| StoreError::io("fsync", temp.path(self), e))?;
        }

        self.publish(&mut temp, &id)?;

        if self.config.durability == Durability::Fsync {
            self.objects
                .sync()
                .map_err(|e| StoreError::os("fsync", self.root.join(OBJECTS_DIR), e))?;
        }
        Ok(id)
    }

    fn publish(&self, temp: &mut TempObject<'_>, id: &Digest) -> StoreResult<()> {
        let name = id.to_hex();
        match self.objects.link(&temp.name, &name) {
            Ok(()) => {
                debug!(%id, size = temp.size, "object published");
                Ok(())
            }
            Err(Errno::EEXIST) => {
                debug!(%id, "object published concurrently");
                Ok(())
            }
            // No hard links on this filesystem; fall back to a rename that
            // refuses to replace an existing object.
            Err(Errno::EPERM) | Err(Errno::EOPNOTSUPP) | Err(Errno::EMLINK) => {
                match self.objects.rename_new(&temp.name, &name) {
                    Ok(()) => {
                        temp.published = true;
                        debug!(%id, size = temp.size, "object published by rename");
                        Ok(())
                    }
                    Err(Errno::EEXIST) => {
                        debug!(%id, "object published concurrently");
                        Ok(())
                    }
                    Err(e) => Err(StoreError::os("rename", self.object_path(id), e)),
                }
            }
            Err(e) => Err(StoreError::os("link", self.object_path(id), e)),
        }
    }

    /// Open the object stored under `id` for reading.
    pub fn open_for_read(&self, id: &Digest) -> StoreResult<File> {
        let file = match self.objects.open_read(&id.to_hex()) {
            Ok(file) => file,
            Err(Errno::ENOENT) => return Err(StoreError::NotFound(*id)),
            Err(Errno::ELOOP) => return Err(StoreError::NotARegularFile(*id)),
            Err(e) => return Err(StoreError::os("open", self.object_path(id), e)),
        };
        let metadata = file
            .metadata()
            .map_err(|e| StoreError::io("stat", self.object_path(id), e))?;
        if !metadata.is_file() {
            return Err(StoreError::NotARegularFile(*id));
        }
        Ok(file)
    }

    /// Read the object stored under `id`, verifying it against its address.
    pub fn read(&self, id: &Digest) -> StoreResult<Vec<u8>> {
        let mut file = self.open_for_read(id)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| StoreError::io("read", self.object_path(id), e))?;
        if !ContentHasher::verify(&data, id) {
            let computed = ContentHasher::hash(&data);
            return Err(StoreError::HashMismatch { id: *id, computed });
        }
        Ok(data)
    }
}

impl ObjectStore for Repository {
    fn read(&self, id: &Digest) -> StoreResult<Option<Vec<u8>>> {
        match Repository::read(self, id) {
            Ok(data) => Ok(Some(data)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, data: &[u8]) -> StoreResult<Digest> {
        self.insert(data)
    }

    fn exists(&self, id: &Digest) -> StoreResult<bool> {
        self.contains(id)
    }
}

/// A `.tmp-` file inside `objects/`, unlinked on drop unless it was renamed
/// into place.
struct TempObject<'a> {
    dir: &'a DirHandle,
    name: String,
    file: File,
    size: usize,
    published: bool,
}

impl<'a> TempObject<'a> {
    fn create(repo: &'a Repository) -> StoreResult<Self> {
        let mut last = Errno::EEXIST;
        for _ in 0..TEMP_NAME_ATTEMPTS {
            let name = format!("{TEMP_PREFIX}{:016x}", rand::random::<u64>());
            match repo.objects.create_new(&name, OBJECT_MODE) {
                Ok(file) => {
                    return Ok(Self {
                        dir: &repo.objects,
                        name,
                        file,
                        size: 0,
                        published: false,
                    });
                }
                Err(Errno::EEXIST) => last = Errno::EEXIST,
                Err(e) => {
                    return Err(StoreError::os("create", repo.root.join(OBJECTS_DIR).join(name), e));
                }
            }
        }
        Err(StoreError::os("create", repo.root.join(OBJECTS_DIR), last))
    }

    fn path(&self, repo: &Repository) -> PathBuf {
        repo.root.join(OBJECTS_DIR).join(&self.name)
    }
}

impl Write for TempObject<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.file.write(buf)?;
        self.size += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Drop for TempObject<'_> {
    fn drop(&mut self) {
        if self.published {
            return;
        }
        match self.dir.unlink(&self.name) {
            Ok(()) | Err(Errno::ENOENT) => {}
            Err(e) => warn!(name = %self.name, error = %e, "failed to remove temporary object"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn object_names(repo_root: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(repo_root.join(OBJECTS_DIR))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn temp_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::initialize(dir.path().join("repo")).unwrap();
        (dir, repo)
    }

    #[test]
    fn initialize_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("repo");
        Repository::initialize(&root).unwrap();
        assert!(root.join("objects").is_dir());
        assert!(object_names(&root).is_empty());
    }

    #[test]
    fn initialize_into_existing_empty_root() {
        let dir = tempfile::tempdir().unwrap();
        Repository::initialize(dir.path()).unwrap();
        assert!(dir.path().join("objects").is_dir());
    }

    #[test]
    fn initialize_twice_fails_with_exists_and_keeps_contents() {
        let (dir, repo) = temp_repo();
        let id = repo.insert(b"keep me").unwrap();
        drop(repo);

        let root = dir.path().join("repo");
        let err = Repository::initialize(&root).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyInitialized(_)));
        assert_eq!(err.kind(), srcstore_types::ErrorKind::Exists);

        let repo = Repository::open(&root).unwrap();
        assert_eq!(repo.read(&id).unwrap(), b"keep me");
    }

    #[test]
    fn initialize_under_a_file_fails_and_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"").unwrap();

        let err = Repository::initialize(blocker.join("repo")).unwrap_err();
        assert_eq!(err.kind(), srcstore_types::ErrorKind::Io);
        assert!(!blocker.join("repo").exists());
    }

    #[test]
    fn failed_objects_dir_removes_a_root_it_created() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("repo");

        let err = Repository::create_layout(&root, |root| {
            assert!(root.is_dir());
            Err(StoreError::os("mkdir", root.join(OBJECTS_DIR), Errno::ENOSPC))
        })
        .unwrap_err();
        assert!(err.to_string().contains("ENOSPC"));
        assert!(!root.exists());
    }

    #[test]
    fn failed_objects_dir_keeps_an_existing_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("repo");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("config.toml"), b"").unwrap();

        Repository::create_layout(&root, |root| {
            Err(StoreError::os("mkdir", root.join(OBJECTS_DIR), Errno::EACCES))
        })
        .unwrap_err();
        assert!(root.join("config.toml").exists());
    }

    #[test]
    fn initialize_in_read_only_parent_fails_with_io() {
        use std::os::unix::fs::PermissionsExt;

        // Permission bits do not bind the superuser.
        if nix::unistd::Uid::effective().is_root() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let parent = dir.path().join("locked");
        fs::create_dir(&parent).unwrap();
        fs::set_permissions(&parent, fs::Permissions::from_mode(0o555)).unwrap();

        let err = Repository::initialize(parent.join("repo")).unwrap_err();
        assert_eq!(err.kind(), srcstore_types::ErrorKind::Io);
        assert!(err.to_string().contains("EACCES") || err.to_string().contains("denied"));
        assert!(!parent.join("repo").exists());

        fs::set_permissions(&parent, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn open_without_objects_dir_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = Repository::open(dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::NotARepository(_)));
        assert_eq!(err.kind(), srcstore_types::ErrorKind::Missing);
    }

    #[test]
    fn insert_then_read_roundtrip() {
        let (dir, repo) = temp_repo();
        let data = b"int main(){}\n";
        let id = repo.insert(data).unwrap();

        assert_eq!(id.to_string(), "fb18388bff2e2761c8c56dbbbccd182a");
        assert!(repo.contains(&id).unwrap());
        assert_eq!(repo.read(&id).unwrap(), data);

        let mut contents = Vec::new();
        repo.open_for_read(&id)
            .unwrap()
            .read_to_end(&mut contents)
            .unwrap();
        assert_eq!(contents, data);

        let on_disk = fs::read(dir.path().join("repo/objects").join(id.to_hex())).unwrap();
        assert_eq!(on_disk, data);
    }

    #[test]
    fn insert_is_idempotent() {
        let (dir, repo) = temp_repo();
        let first = repo.insert(b"same bytes").unwrap();
        let second = repo.insert(b"same bytes").unwrap();
        assert_eq!(first, second);
        assert_eq!(object_names(&dir.path().join("repo")), vec![first.to_hex()]);
    }

    #[test]
    fn empty_object() {
        let (_dir, repo) = temp_repo();
        let id = repo.insert(b"").unwrap();
        assert_eq!(id.to_string(), "d41d8cd98f00b204e9800998ecf8427e");
        assert!(repo.read(&id).unwrap().is_empty());
    }

    #[test]
    fn missing_object() {
        let (_dir, repo) = temp_repo();
        let id = ContentHasher::hash(b"never stored");
        assert!(!repo.contains(&id).unwrap());
        let err = repo.open_for_read(&id).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(ObjectStore::read(&repo, &id).unwrap(), None);
    }

    #[test]
    fn every_object_hashes_to_its_name() {
        let (dir, repo) = temp_repo();
        for i in 0..20u32 {
            repo.insert(format!("object {i}").as_bytes()).unwrap();
        }
        for name in object_names(&dir.path().join("repo")) {
            assert!(Digest::is_canonical_name(&name), "{name}");
            let data = fs::read(dir.path().join("repo/objects").join(&name)).unwrap();
            assert_eq!(ContentHasher::hash(&data).to_hex(), name);
        }
    }

    #[test]
    fn published_objects_are_read_only() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, repo) = temp_repo();
        let id = repo.insert(b"frozen").unwrap();
        let mode = fs::metadata(repo.object_path(&id)).unwrap().permissions().mode();
        assert_eq!(mode & 0o222, 0);
    }

    #[test]
    fn corrupted_object_is_detected() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, repo) = temp_repo();
        let id = repo.insert(b"original").unwrap();
        let path = repo.object_path(&id);
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        fs::write(&path, b"tampered").unwrap();

        let err = repo.read(&id).unwrap_err();
        assert!(matches!(err, StoreError::HashMismatch { .. }));
        assert_eq!(err.kind(), srcstore_types::ErrorKind::Corrupt);
    }

    #[test]
    fn directory_at_object_address_is_rejected() {
        let (_dir, repo) = temp_repo();
        let id = ContentHasher::hash(b"squatted");
        fs::create_dir(repo.object_path(&id)).unwrap();
        assert!(matches!(
            repo.contains(&id).unwrap_err(),
            StoreError::NotARegularFile(_)
        ));
    }

    #[test]
    fn foreign_entries_are_ignored() {
        let (dir, repo) = temp_repo();
        let objects = dir.path().join("repo/objects");
        fs::write(objects.join(".tmp-deadbeefdeadbeef"), b"partial").unwrap();
        fs::write(objects.join("README"), b"not an object").unwrap();
        fs::write(dir.path().join("repo/config.toml"), b"").unwrap();

        let id = repo.insert(b"partial").unwrap();
        assert_eq!(repo.read(&id).unwrap(), b"partial");
        assert!(objects.join("README").exists());
    }

    #[test]
    fn survives_root_rename() {
        let (dir, repo) = temp_repo();
        let moved = dir.path().join("moved");
        fs::rename(dir.path().join("repo"), &moved).unwrap();

        let id = repo.insert(b"after rename").unwrap();
        assert!(repo.contains(&id).unwrap());
        assert_eq!(fs::read(moved.join("objects").join(id.to_hex())).unwrap(), b"after rename");
    }

    #[test]
    fn no_temporaries_left_behind() {
        let (dir, repo) = temp_repo();
        repo.insert(b"one").unwrap();
        repo.insert(b"one").unwrap();
        repo.insert(b"two").unwrap();
        let names = object_names(&dir.path().join("repo"));
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| !n.starts_with(TEMP_PREFIX)));
    }

    #[test]
    fn durable_insert() {
        let dir = tempfile::tempdir().unwrap();
        let repo =
            Repository::initialize_with_config(dir.path().join("repo"), RepositoryConfig::durable())
                .unwrap();
        let id = repo.insert(b"synced").unwrap();
        assert_eq!(repo.read(&id).unwrap(), b"synced");
        assert_eq!(repo.config().durability, Durability::Fsync);
    }

    #[test]
    fn concurrent_inserters_never_expose_partial_objects() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("repo");
        Repository::initialize(&root).unwrap();

        let data: Vec<u8> = (0..(1u32 << 20)).map(|i| (i % 251) as u8).collect();
        let id = ContentHasher::hash(&data);
        let done = AtomicBool::new(false);

        std::thread::scope(|s| {
            let reader = s.spawn(|| {
                let repo = Repository::open(&root).unwrap();
                while !done.load(Ordering::Acquire) {
                    if repo.contains(&id).unwrap() {
                        assert_eq!(repo.read(&id).unwrap().len(), data.len());
                    }
                }
            });

            let writers: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|| {
                        let repo = Repository::open(&root).unwrap();
                        assert_eq!(repo.insert(&data).unwrap(), id);
                    })
                })
                .collect();
            for writer in writers {
                writer.join().unwrap();
            }
            done.store(true, Ordering::Release);
            reader.join().unwrap();
        });

        assert_eq!(object_names(&root), vec![id.to_hex()]);
        let repo = Repository::open(&root).unwrap();
        assert_eq!(repo.read(&id).unwrap(), data);
    }
}
