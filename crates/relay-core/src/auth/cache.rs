use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{auth::token::Token, Result};

/// Single-file cache for the backend bearer token.
///
/// The file holds the raw token and nothing else. The newest write replaces the previous token.
/// There is no cross-process locking: one relay instance per cache file.
#[derive(Clone, Debug)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the cached token if it exists, parses and has not expired.
    ///
    /// Every failure (missing file, unreadable, malformed, expired) is a cache miss.
    pub fn read(&self) -> Option<Token> {
        self.read_at(chrono::Utc::now().timestamp())
    }

    pub fn read_at(&self, now: i64) -> Option<Token> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("token cache miss ({}): {e}", self.path.display());
                return None;
            }
        };

        let token = match Token::parse(&raw) {
            Ok(token) => token,
            Err(e) => {
                debug!("token cache unusable ({}): {e}", self.path.display());
                return None;
            }
        };

        if !token.is_live_at(now) {
            debug!(
                "cached token expired (exp={:?}, now={now})",
                token.expires_at()
            );
            return None;
        }

        Some(token)
    }

    /// Replace the cached token.
    ///
    /// Writes to a sibling temp file and renames it over the cache file so readers never observe
    /// a partial token.
    pub fn write(&self, token: &Token) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.tmp_path();
        fs::write(&tmp, token.as_str().as_bytes())?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "token".into());
        name.push(format!(".tmp-{}", std::process::id()));
        self.path.with_file_name(name)
    }
}
