//! Identity token and the local endpoint address derived from it.

use std::fmt;
use std::path::{Path, PathBuf};

use super::Error;

/// Longest accepted identity token. Keeps Unix socket paths well under `sun_path` limits.
const MAX_ID_LEN: usize = 64;

/// Application-unique token naming the shared endpoint.
///
/// Probe and bind must use the same token, so it has to be stable across launches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceId(String);

impl InstanceId {
    /// Validates `token`: non-empty, at most 64 bytes, ASCII alphanumerics plus `-`, `_`, `.`.
    pub fn new(token: impl Into<String>) -> Result<Self, Error> {
        let token = token.into();
        let reason = if token.is_empty() {
            Some("must not be empty")
        } else if token.len() > MAX_ID_LEN {
            Some("longer than 64 bytes")
        } else if token.starts_with('.') {
            Some("must not start with '.'")
        } else if !token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
        {
            Some("only ASCII letters, digits, '-', '_' and '.' are allowed")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(Error::InvalidId { token, reason }),
            None => Ok(Self(token)),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Platform address of the single-instance listener.
///
/// Unix: `<dir>/<token>.sock`. Windows: `\\.\pipe\<token>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    id: InstanceId,
    address: PathBuf,
}

impl Endpoint {
    /// Endpoint in the per-user runtime directory.
    #[must_use]
    pub fn for_instance(id: InstanceId) -> Self {
        #[cfg(unix)]
        {
            Self::in_dir(id, &crate::paths::runtime_dir())
        }
        #[cfg(windows)]
        {
            let address = PathBuf::from(format!(r"\\.\pipe\{}", id.as_str()));
            Self { id, address }
        }
    }

    /// Endpoint whose socket lives in `dir`. On Windows `dir` is ignored (pipes have no directory).
    #[must_use]
    pub fn in_dir(id: InstanceId, dir: &Path) -> Self {
        #[cfg(unix)]
        {
            let address = dir.join(format!("{}.sock", id.as_str()));
            Self { id, address }
        }
        #[cfg(windows)]
        {
            let _ = dir;
            Self::for_instance(id)
        }
    }

    #[must_use]
    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    #[must_use]
    pub fn address(&self) -> &Path {
        &self.address
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address.display())
    }
}
