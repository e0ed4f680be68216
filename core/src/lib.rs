pub mod config;
pub mod discovery;
pub mod error;
pub mod hash_cache;

pub use config::BuildConfig;
pub use error::{BuildError, BuildResult};
pub use hash_cache::{changed, changed_paths, fingerprint, fingerprint_all, Fingerprint, FingerprintMap, HashCache};
