//! Cache manager for persisting search responses to disk
//!
//! Provides a `CacheManager` that stores serializable data as JSON files named
//! after the query key, and an `OfferCache` that puts it in front of a flight
//! search client.

use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

use crate::data::{ApiError, FlightSearch, QueryKey, RawOffer};

/// Errors that can occur when reading or filling the cache
#[derive(Debug, Error)]
pub enum CacheError {
    /// Reading or writing a cache file failed
    #[error("Cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A cache file exists but does not hold valid JSON of the expected shape
    #[error("Corrupt cache file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Data could not be encoded as JSON before writing
    #[error("Could not encode cache entry for {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The search client failed on a cache miss
    #[error("Flight search failed: {0}")]
    Search(#[from] ApiError),
}

/// How long a cache entry stays valid
///
/// Entries store the exact API payload and carry no timestamp; should expiry be
/// needed it belongs in the entry itself, not in file modification times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Entries never expire
    #[default]
    Forever,
}

/// Manages reading and writing cached data to disk
///
/// Files live in `cache_dir` and are named `{key.file_stem()}.json`.
#[derive(Debug, Clone)]
pub struct CacheManager {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
    policy: CachePolicy,
}

impl CacheManager {
    /// Creates a new CacheManager using the XDG-compliant cache directory
    ///
    /// Uses `~/.cache/fareview/query/` on Linux, or the equivalent on other
    /// platforms. Returns `None` if the cache directory cannot be determined.
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "fareview")?;
        Some(Self::with_dir(project_dirs.cache_dir().join("query")))
    }

    /// Creates a new CacheManager with a custom cache directory
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            policy: CachePolicy::default(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Returns the path to the cache file for the given key
    pub fn cache_path(&self, key: &QueryKey) -> PathBuf {
        self.cache_dir.join(format!("{}.json", key.file_stem()))
    }

    /// Writes data to the cache as plain JSON, creating the directory if needed
    ///
    /// The JSON goes to a temporary file in the cache directory that is renamed
    /// over the entry, so an interrupted write never leaves a truncated entry.
    pub fn write<T: Serialize>(&self, key: &QueryKey, data: &T) -> Result<(), CacheError> {
        let path = self.cache_path(key);
        let io_err = |source: std::io::Error| CacheError::Io {
            path: path.clone(),
            source,
        };

        let json = serde_json::to_vec(data).map_err(|source| CacheError::Encode {
            path: path.clone(),
            source,
        })?;

        fs::create_dir_all(&self.cache_dir).map_err(io_err)?;
        let mut file = NamedTempFile::new_in(&self.cache_dir).map_err(io_err)?;
        file.write_all(&json).map_err(io_err)?;
        file.persist(&path).map_err(|e| io_err(e.error))?;
        Ok(())
    }

    /// Reads data from the cache
    ///
    /// # Returns
    /// * `Ok(Some(T))` if the entry exists and parses
    /// * `Ok(None)` if there is no entry for the key
    /// * `Err(CacheError)` if the entry exists but cannot be read or parsed
    pub fn read<T: DeserializeOwned>(&self, key: &QueryKey) -> Result<Option<T>, CacheError> {
        let path = self.cache_path(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::Io { path, source }),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| CacheError::Corrupt { path, source })
    }
}

/// Read-through cache of raw offers in front of a flight search client
#[derive(Debug)]
pub struct OfferCache<S> {
    manager: CacheManager,
    client: S,
    currency: String,
}

impl<S: FlightSearch> OfferCache<S> {
    pub fn new(manager: CacheManager, client: S, currency: impl Into<String>) -> Self {
        Self {
            manager,
            client,
            currency: currency.into(),
        }
    }

    pub fn manager(&self) -> &CacheManager {
        &self.manager
    }

    pub fn client(&self) -> &S {
        &self.client
    }

    /// Returns the offers for `key`, querying the client only on a cache miss
    ///
    /// # Behavior
    /// - If a cache file exists for the key, its contents are returned unchanged
    /// - Otherwise the client is queried and the exact payload is written to disk
    /// - If the client fails, the error is returned and nothing is written
    pub async fn get_or_fetch(&self, key: &QueryKey) -> Result<Vec<RawOffer>, CacheError> {
        if let Some(offers) = self.manager.read::<Vec<RawOffer>>(key)? {
            info!(key = %key, offers = offers.len(), "loaded offers from cache");
            return Ok(offers);
        }

        info!(key = %key, "cache miss, querying flight search");
        let offers = self.client.search(key, &self.currency).await?;
        self.manager.write(key, &offers)?;
        debug!(
            path = %self.manager.cache_path(key).display(),
            offers = offers.len(),
            "cached search response"
        );

        Ok(offers)
    }
}
