//! Named shared-memory regions backed by memory-mapped files.
//!
//! A region is a file named `name` below a root directory. On Linux the
//! default root is `/dev/shm`, so the pages never touch a disk; elsewhere the
//! OS temp dir is used. Every process that maps the same `(root, name)` pair
//! sees the same bytes.

use memmap2::MmapMut;
use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
};

/// Longest accepted region name, in bytes.
pub const MAX_NAME_LEN: usize = 255;

pub struct SharedRegion {
    _file: File,
    mmap: MmapMut,
    path: PathBuf,
}

/// Directory regions are created in when the caller does not pick one.
pub fn default_root() -> PathBuf {
    let shm = Path::new("/dev/shm");
    if shm.is_dir() {
        shm.to_path_buf()
    } else {
        std::env::temp_dir()
    }
}

/// Rejects names that would escape `root` or cannot name a file.
pub fn validate_name(name: &str) -> io::Result<()> {
    let bad = name.is_empty()
        || name.len() > MAX_NAME_LEN
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\0');
    if bad {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid region name {name:?}"),
        ));
    }
    Ok(())
}

pub fn region_path<P: AsRef<Path>>(root: P, name: &str) -> io::Result<PathBuf> {
    validate_name(name)?;
    Ok(root.as_ref().join(name))
}

impl SharedRegion {
    /// Create a region of `size_bytes` and map it read-write.
    ///
    /// Fails with `AlreadyExists` if a region with that name is present. The
    /// file is removed again if sizing or mapping fails.
    pub fn create<P: AsRef<Path>>(root: P, name: &str, size_bytes: u64) -> io::Result<Self> {
        let path = region_path(root, name)?;
        let file = OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(&path)?;

        let mapped = file
            .set_len(size_bytes)
            .and_then(|()| unsafe { MmapMut::map_mut(&file) });
        match mapped {
            Ok(mmap) => Ok(Self {
                _file: file,
                mmap,
                path,
            }),
            Err(err) => {
                let _ = fs::remove_file(&path);
                Err(err)
            }
        }
    }

    /// Open an existing region and map it read-write.
    pub fn open<P: AsRef<Path>>(root: P, name: &str) -> io::Result<Self> {
        let path = region_path(root, name)?;
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let mmap = unsafe { MmapMut::map_mut(&file)? };

        Ok(Self {
            _file: file,
            mmap,
            path,
        })
    }

    pub fn exists<P: AsRef<Path>>(root: P, name: &str) -> bool {
        region_path(root, name).is_ok_and(|p| p.is_file())
    }

    /// Remove the region's name. Existing mappings stay valid until dropped.
    pub fn unlink<P: AsRef<Path>>(root: P, name: &str) -> io::Result<()> {
        fs::remove_file(region_path(root, name)?)
    }

    /// Return raw pointer to start of the mapped region
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.mmap.as_mut_ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let _first = SharedRegion::create(dir.path(), "excl", 64).unwrap();
        let err = SharedRegion::create(dir.path(), "excl", 64)
            .err()
            .expect("second create must fail");
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    }

    #[test]
    fn open_missing_region_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = SharedRegion::open(dir.path(), "missing")
            .err()
            .expect("open must fail");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(!SharedRegion::exists(dir.path(), "missing"));
    }

    #[test]
    fn two_mappings_share_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = SharedRegion::create(dir.path(), "shared", 4096).unwrap();
        let mut reader = SharedRegion::open(dir.path(), "shared").unwrap();
        assert_eq!(writer.len(), 4096);
        assert_eq!(reader.len(), 4096);

        unsafe {
            writer.as_mut_ptr().add(100).write(0xAB);
            assert_eq!(reader.as_mut_ptr().add(100).read(), 0xAB);
        }
    }

    #[test]
    fn unlink_keeps_existing_mapping_alive() {
        let dir = tempfile::tempdir().unwrap();
        let mut region = SharedRegion::create(dir.path(), "gone", 128).unwrap();
        assert!(SharedRegion::exists(dir.path(), "gone"));

        SharedRegion::unlink(dir.path(), "gone").unwrap();
        assert!(!SharedRegion::exists(dir.path(), "gone"));

        unsafe {
            region.as_mut_ptr().write(7);
            assert_eq!(region.as_mut_ptr().read(), 7);
        }
    }

    #[test]
    fn names_cannot_escape_root() {
        for name in ["", ".", "..", "a/b", "nul\0byte"] {
            let err = validate_name(name).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "{name:?}");
        }
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
        assert!(validate_name("tagring_0").is_ok());
    }
}
