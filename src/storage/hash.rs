//! Cheap content fingerprint for source media.
//!
//! Hashes a bounded prefix of the primary source file mixed with the
//! file count. This detects most accidental media/annotation mismatches
//! without reading multi-gigabyte recordings; it is not an integrity
//! guarantee. FNV-1a is used because persisted fingerprints must be
//! stable across processes (the std hasher is randomly seeded).

use std::fs::File;
use std::io::Read;

use crate::error::{Error, Result};
use crate::media::MediaDescriptor;

/// How much of the primary file participates in the fingerprint.
const PREFIX_LEN: usize = 1 << 20;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Fingerprint the media behind a descriptor.
pub fn content_hash(descriptor: &MediaDescriptor) -> Result<String> {
    let path = descriptor
        .primary_path()
        .ok_or(Error::InvalidFile("empty media descriptor".into()))?;
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let mut buffer = Vec::with_capacity(PREFIX_LEN.min(64 * 1024));
    File::open(path)?
        .take(PREFIX_LEN as u64)
        .read_to_end(&mut buffer)?;

    let mut hash = FNV_OFFSET;
    for &byte in &buffer {
        hash = (hash ^ byte as u64).wrapping_mul(FNV_PRIME);
    }
    for byte in (descriptor.file_count() as u64).to_le_bytes() {
        hash = (hash ^ byte as u64).wrapping_mul(FNV_PRIME);
    }
    Ok(format!("{hash:016x}"))
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;
    use std::path::PathBuf;

    use super::*;

    fn write_file(dir: &std::path::Path, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        path
    }

    #[test]
    fn test_hash_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "clip.avi", b"frame data");
        let descriptor = MediaDescriptor::Video(path);
        assert_eq!(
            content_hash(&descriptor).unwrap(),
            content_hash(&descriptor).unwrap()
        );
    }

    #[test]
    fn test_hash_depends_on_content() {
        let dir = tempfile::tempdir().unwrap();
        let a = MediaDescriptor::Video(write_file(dir.path(), "a.avi", b"aaaa"));
        let b = MediaDescriptor::Video(write_file(dir.path(), "b.avi", b"bbbb"));
        assert_ne!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn test_hash_depends_on_file_count() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_file(dir.path(), "0.png", b"pixels");
        let second = write_file(dir.path(), "1.png", b"pixels");
        let one = MediaDescriptor::ImageSequence(vec![first.clone()]);
        let two = MediaDescriptor::ImageSequence(vec![first, second]);
        assert_ne!(content_hash(&one).unwrap(), content_hash(&two).unwrap());
    }

    #[test]
    fn test_missing_file() {
        let descriptor = MediaDescriptor::Video(PathBuf::from("/nonexistent/clip.avi"));
        assert!(matches!(
            content_hash(&descriptor).unwrap_err(),
            Error::FileNotFound(_)
        ));
    }
}
