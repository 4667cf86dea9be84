//! Loading secret material from files with build-mode aware fallbacks.
//!
//! Release builds insist on a readable file of at least the minimum length.
//! Debug builds (or an explicit opt-in) fall back to ephemeral random bytes so
//! local runs work without provisioning secrets.

use std::path::{Path, PathBuf};

use rand::RngCore;
use rand::rngs::OsRng;
use tracing::warn;
use zeroize::Zeroizing;

/// Build mode for configuration validation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BuildMode {
    /// Debug builds tolerate defaults and emit warnings for missing toggles.
    Debug,
    /// Release builds require explicit, valid settings.
    Release,
}

impl BuildMode {
    /// Determine the build mode from `cfg!(debug_assertions)`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use envelope_backend::secret_file::BuildMode;
    ///
    /// let mode = BuildMode::from_debug_assertions();
    /// assert_eq!(mode == BuildMode::Debug, cfg!(debug_assertions));
    /// ```
    #[must_use]
    pub fn from_debug_assertions() -> Self {
        if cfg!(debug_assertions) {
            Self::Debug
        } else {
            Self::Release
        }
    }

    /// Whether this is a debug build.
    #[must_use]
    pub const fn is_debug(self) -> bool {
        matches!(self, Self::Debug)
    }
}

/// Errors raised while loading a secret file.
#[derive(Debug, thiserror::Error)]
pub enum SecretFileError {
    /// Reading the file failed and no fallback is permitted.
    #[error("failed to read {label} at {path}: {source}")]
    Read {
        label: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The file is shorter than the release minimum.
    #[error("{label} at {path} too short: need >= {min_len} bytes, got {length}")]
    TooShort {
        label: &'static str,
        path: PathBuf,
        length: usize,
        min_len: usize,
    },
}

/// How a secret file is validated.
#[derive(Clone, Copy, Debug)]
pub struct SecretFilePolicy {
    /// Name used in logs and errors, e.g. `session key`.
    pub label: &'static str,
    /// Minimum length enforced in release builds.
    pub min_len: usize,
    /// Length of the random fallback.
    pub ephemeral_len: usize,
    /// Build mode in effect.
    pub mode: BuildMode,
    /// Permit the random fallback outside debug builds.
    pub allow_ephemeral: bool,
}

/// Secret bytes and where they came from.
pub struct SecretMaterial {
    /// The bytes; zeroized on drop.
    pub bytes: Zeroizing<Vec<u8>>,
    /// `true` when generated in-process rather than read from disk.
    pub ephemeral: bool,
}

/// Read the secret at `path` under `policy`.
///
/// Trailing ASCII whitespace is stripped so files written by `echo` work.
///
/// # Examples
///
/// ```rust
/// use envelope_backend::secret_file::{BuildMode, SecretFilePolicy, load_secret_file};
///
/// let policy = SecretFilePolicy {
///     label: "signing secret",
///     min_len: 32,
///     ephemeral_len: 32,
///     mode: BuildMode::Debug,
///     allow_ephemeral: false,
/// };
/// let material = load_secret_file("/nonexistent/secret".as_ref(), policy)
///     .expect("debug builds fall back");
/// assert!(material.ephemeral);
/// assert_eq!(material.bytes.len(), 32);
/// ```
pub fn load_secret_file(
    path: &Path,
    policy: SecretFilePolicy,
) -> Result<SecretMaterial, SecretFileError> {
    match std::fs::read(path) {
        Ok(raw) => {
            let mut bytes = Zeroizing::new(raw);
            let trimmed = bytes.trim_ascii_end().len();
            bytes.truncate(trimmed);
            let length = bytes.len();
            if policy.mode == BuildMode::Release && length < policy.min_len {
                return Err(SecretFileError::TooShort {
                    label: policy.label,
                    path: path.to_path_buf(),
                    length,
                    min_len: policy.min_len,
                });
            }
            if length < policy.min_len {
                warn!(
                    path = %path.display(),
                    length,
                    min_len = policy.min_len,
                    "{} shorter than the release minimum",
                    policy.label
                );
            }
            Ok(SecretMaterial {
                bytes,
                ephemeral: false,
            })
        }
        Err(source) if policy.mode.is_debug() || policy.allow_ephemeral => {
            warn!(
                path = %path.display(),
                error = %source,
                "using temporary {} (dev only)",
                policy.label
            );
            let mut bytes = Zeroizing::new(vec![0_u8; policy.ephemeral_len]);
            OsRng.fill_bytes(&mut bytes);
            Ok(SecretMaterial {
                bytes,
                ephemeral: true,
            })
        }
        Err(source) => Err(SecretFileError::Read {
            label: policy.label,
            path: path.to_path_buf(),
            source,
        }),
    }
}
