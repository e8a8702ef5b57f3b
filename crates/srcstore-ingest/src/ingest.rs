use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::Serialize;
use srcstore_crypto::ContentHasher;
use srcstore_store::ObjectStore;
use srcstore_types::{Digest, SourceReference};
use tracing::{debug, info};

use crate::error::{IngestError, IngestResult};

/// A local file and the digest of its contents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Ingested {
    pub path: PathBuf,
    pub digest: Digest,
}

impl fmt::Display for Ingested {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.digest, self.path.display())
    }
}

/// Read a whole source file.
///
/// The buffer is sized from the file's metadata and trimmed to what was
/// actually read, so a file that shrinks mid-read yields its shorter
/// contents.
pub fn read_source(path: impl AsRef<Path>) -> IngestResult<Vec<u8>> {
    let path = path.as_ref();
    let read_error = |source| IngestError::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(read_error)?;
    let size = file.metadata().map_err(read_error)?.len();
    let size = usize::try_from(size).map_err(|_| {
        read_error(io::Error::new(io::ErrorKind::OutOfMemory, "file too large"))
    })?;

    let mut buf = vec![0u8; size];
    let mut filled = 0;
    while filled < size {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(read_error(e)),
        }
    }
    buf.truncate(filled);
    Ok(buf)
}

/// Commit each file's bytes to `store`, in order, handing each result to
/// `sink` as soon as it is committed.
///
/// Stops at the first failure. Files committed before it stay committed.
pub fn add_sources<S, P, F>(store: &S, paths: &[P], mut sink: F) -> IngestResult<()>
where
    S: ObjectStore + ?Sized,
    P: AsRef<Path>,
    F: FnMut(Ingested) -> io::Result<()>,
{
    require_paths(paths)?;
    for path in paths {
        let path = path.as_ref();
        let data = read_source(path)?;
        let digest = store.write(&data)?;
        debug!(path = %path.display(), %digest, size = data.len(), "added source file");
        sink(Ingested {
            path: path.to_path_buf(),
            digest,
        })
        .map_err(IngestError::Output)?;
    }
    info!(count = paths.len(), "source files added");
    Ok(())
}

/// Digest each file without touching any repository.
///
/// Each digest reaches `sink` before the next file is read.
pub fn md5sum<P, F>(paths: &[P], mut sink: F) -> IngestResult<()>
where
    P: AsRef<Path>,
    F: FnMut(Ingested) -> io::Result<()>,
{
    require_paths(paths)?;
    for path in paths {
        let path = path.as_ref();
        let digest = ContentHasher::hash(&read_source(path)?);
        sink(Ingested {
            path: path.to_path_buf(),
            digest,
        })
        .map_err(IngestError::Output)?;
    }
    Ok(())
}

/// Every source file recorded in the debug information of `executables`,
/// in argument order.
///
/// An executable's references reach `sink` once that executable has been
/// read completely; a later failure does not retract them.
pub fn list_sources<P, F>(executables: &[P], mut sink: F) -> IngestResult<()>
where
    P: AsRef<Path>,
    F: FnMut(SourceReference) -> io::Result<()>,
{
    require_paths(executables)?;
    for path in executables {
        let path = path.as_ref();
        let found = srcstore_debuginfo::extract(path).map_err(|source| IngestError::DebugInfo {
            path: path.to_path_buf(),
            source,
        })?;
        for reference in found {
            sink(reference).map_err(IngestError::Output)?;
        }
    }
    Ok(())
}

fn require_paths<P>(paths: &[P]) -> IngestResult<()> {
    if paths.is_empty() {
        return Err(IngestError::InvalidArgument("filename expected".into()));
    }
    Ok(())
}
