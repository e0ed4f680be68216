// Content-addressed change detection
// Fingerprints source files with SHA-256 and persists path -> digest as JSON

use crate::{BuildError, BuildResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use log::{debug, info, warn};

/// SHA-256 digest of a file's exact bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    pub fn of_bytes(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for Fingerprint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut digest = [0u8; 32];
        hex::decode_to_slice(s, &mut digest).map_err(|e| format!("bad digest {:?}: {}", s, e))?;
        Ok(Self(digest))
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Fingerprint> for String {
    fn from(value: Fingerprint) -> Self {
        value.to_string()
    }
}

/// Source path (as given, not canonicalized) to its fingerprint
pub type FingerprintMap = BTreeMap<String, Fingerprint>;

/// Read a file fully and hash it
pub fn fingerprint(path: &Path) -> BuildResult<Fingerprint> {
    let data = std::fs::read(path)?;
    Ok(Fingerprint::of_bytes(&data))
}

/// Fingerprint every path; the first unreadable file aborts
pub fn fingerprint_all<P: AsRef<Path>>(paths: &[P]) -> BuildResult<FingerprintMap> {
    let mut map = FingerprintMap::new();
    for path in paths {
        let path = path.as_ref();
        let digest = fingerprint(path)?;
        debug!("{} {}", digest, path.display());
        map.insert(path.to_string_lossy().into_owned(), digest);
    }
    Ok(map)
}

/// True if any path in `current` is new or has a different digest.
/// Paths only present in `previous` are ignored.
pub fn changed(current: &FingerprintMap, previous: &FingerprintMap) -> bool {
    current.iter().any(|(path, digest)| previous.get(path) != Some(digest))
}

/// The paths of `current` that make `changed` true
pub fn changed_paths<'a>(current: &'a FingerprintMap, previous: &FingerprintMap) -> Vec<&'a str> {
    current
        .iter()
        .filter(|(path, digest)| previous.get(*path) != Some(*digest))
        .map(|(path, _)| path.as_str())
        .collect()
}

/// Persisted fingerprint state
#[derive(Debug, Clone)]
pub struct HashCache {
    path: PathBuf,
}

impl HashCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the previous state. A missing or unparseable file means "no prior state".
    pub fn load(&self) -> FingerprintMap {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No hash cache at {}, treating as first build", self.path.display());
                return FingerprintMap::new();
            }
            Err(e) => {
                warn!("Cannot read hash cache {}: {}; rebuilding everything", self.path.display(), e);
                return FingerprintMap::new();
            }
        };

        match serde_json::from_str(&text) {
            Ok(map) => map,
            Err(e) => {
                warn!("Corrupt hash cache {}: {}; rebuilding everything", self.path.display(), e);
                FingerprintMap::new()
            }
        }
    }

    /// Replace the persisted state with `map`.
    /// Writes a sibling temporary file and renames it over the cache.
    pub fn save(&self, map: &FingerprintMap) -> BuildResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, map)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| BuildError::Io(e.error))?;

        debug!("Saved {} fingerprints to {}", map.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn map(entries: &[(&str, &[u8])]) -> FingerprintMap {
        entries
            .iter()
            .map(|(path, data)| (path.to_string(), Fingerprint::of_bytes(data)))
            .collect()
    }

    #[test]
    fn test_unchanged_map_is_not_changed() {
        let m = map(&[("a.asm", b"mov ax, 1"), ("b.asm", b"ret")]);
        assert!(!changed(&m, &m));
        assert!(!changed(&FingerprintMap::new(), &FingerprintMap::new()));
    }

    #[test]
    fn test_new_or_modified_path_is_changed() {
        let previous = map(&[("a.asm", b"mov ax, 1")]);

        let mut added = previous.clone();
        added.insert("b.asm".into(), Fingerprint::of_bytes(b"ret"));
        assert!(changed(&added, &previous));
        assert_eq!(changed_paths(&added, &previous), vec!["b.asm"]);

        let modified = map(&[("a.asm", b"mov ax, 2")]);
        assert!(changed(&modified, &previous));
    }

    #[test]
    fn test_removed_path_is_not_changed() {
        let previous = map(&[("a.asm", b"x"), ("gone.asm", b"y")]);
        let current = map(&[("a.asm", b"x")]);
        assert!(!changed(&current, &previous));
    }

    #[test]
    fn test_fingerprint_matches_known_digest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("abc.txt");
        std::fs::write(&path, b"abc").unwrap();

        assert_eq!(
            fingerprint(&path).unwrap().to_string(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(matches!(fingerprint(&dir.path().join("missing")), Err(BuildError::Io(_))));
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let cache = HashCache::new(dir.path().join("state").join("hashes.json"));
        assert!(cache.load().is_empty());

        let m = map(&[("src/boot.asm", b"boot"), ("src/apps/x.asm", b"x")]);
        cache.save(&m).unwrap();
        assert_eq!(cache.load(), m);

        let text = std::fs::read_to_string(cache.path()).unwrap();
        assert!(text.contains(&Fingerprint::of_bytes(b"boot").to_string()));
    }

    #[test]
    fn test_corrupt_cache_loads_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hashes.json");
        std::fs::write(&path, "{ \"a.asm\": \"not-hex\" ").unwrap();
        assert!(HashCache::new(&path).load().is_empty());
    }
}
