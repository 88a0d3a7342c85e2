//! Debate topics and the on-disk topic cache.
//!
//! The cache is a JSON object keyed by year, then category:
//!
//! ```json
//! { "-63": { "Public Works": ["Repair of the Aqua Appia"] } }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::events::TopicId;
use crate::senator::slugify;

/// Default cache file name.
pub const DEFAULT_CACHE_FILE: &str = "topics_cache.json";

/// A question put before the Senate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub title: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

impl Topic {
    /// Build a topic; the id is a slug of the title.
    pub fn new(title: &str, category: &str) -> Self {
        Self {
            id: slugify(title),
            title: title.to_string(),
            category: category.to_string(),
            year: None,
        }
    }

    pub fn in_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }
}

/// Topics used when neither the cache nor the model can supply any.
pub fn fallback_topics(year: i32) -> Vec<Topic> {
    [
        ("Allocation of public land to veterans", "Land Reform"),
        ("Funding for the repair of the Via Appia", "Public Works"),
        ("Extension of the grain dole to freedmen", "Grain Supply"),
        ("Raising two new legions for the eastern frontier", "Military Affairs"),
        ("Reform of the courts and jury composition", "Judicial Reform"),
        ("Granting citizenship to the Italian allies", "Citizenship"),
        ("Suppression of piracy in the Mediterranean", "Military Affairs"),
        ("Regulation of tax farming in the provinces", "Provincial Administration"),
    ]
    .iter()
    .map(|(title, category)| Topic::new(title, category).in_year(year))
    .collect()
}

/// Error type for topic cache operations
#[derive(Debug, thiserror::Error)]
pub enum TopicCacheError {
    #[error("Failed to read or write topic cache {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Topic cache {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

type CacheData = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// Topic titles cached per year and category.
#[derive(Debug, Clone)]
pub struct TopicCache {
    path: PathBuf,
    data: CacheData,
}

impl TopicCache {
    /// Empty cache bound to a path. Nothing is read.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            data: CacheData::new(),
        }
    }

    /// Load from disk. A missing file yields an empty cache.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, TopicCacheError> {
        let path = path.into();
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No topic cache yet");
                return Ok(Self::empty(path));
            }
            Err(source) => return Err(TopicCacheError::Io { path, source }),
        };
        let data: CacheData = match serde_json::from_str(&raw) {
            Ok(data) => data,
            Err(source) => return Err(TopicCacheError::Parse { path, source }),
        };
        debug!(path = %path.display(), years = data.len(), "Loaded topic cache");
        Ok(Self { path, data })
    }

    /// Load, starting empty if the file is unreadable or corrupt.
    pub fn load_or_empty(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::load(path.clone()) {
            Ok(cache) => cache,
            Err(e) => {
                warn!("{}; starting with an empty topic cache", e);
                Self::empty(path)
            }
        }
    }

    /// Write the cache to its path, creating parent directories.
    pub fn save(&self) -> Result<(), TopicCacheError> {
        let io_err = |source| TopicCacheError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(&self.data).map_err(|source| {
            TopicCacheError::Parse {
                path: self.path.clone(),
                source,
            }
        })?;
        std::fs::write(&self.path, json).map_err(io_err)?;
        info!(path = %self.path.display(), years = self.data.len(), "Saved topic cache");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_year(&self, year: i32) -> bool {
        self.data
            .get(&year.to_string())
            .is_some_and(|cats| cats.values().any(|t| !t.is_empty()))
    }

    pub fn years(&self) -> Vec<i32> {
        self.data.keys().filter_map(|k| k.parse().ok()).collect()
    }

    /// Categories cached for a year.
    pub fn categories(&self, year: i32) -> Vec<String> {
        self.data
            .get(&year.to_string())
            .map(|cats| cats.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// All cached topics for a year, in category order.
    pub fn get(&self, year: i32) -> Vec<Topic> {
        let Some(cats) = self.data.get(&year.to_string()) else {
            return Vec::new();
        };
        cats.iter()
            .flat_map(|(category, titles)| {
                titles
                    .iter()
                    .map(move |title| Topic::new(title, category).in_year(year))
            })
            .collect()
    }

    /// Add topics under a year and category, skipping duplicate titles.
    /// Returns how many were new.
    pub fn insert(&mut self, year: i32, category: &str, titles: &[String]) -> usize {
        let entry = self
            .data
            .entry(year.to_string())
            .or_default()
            .entry(category.to_string())
            .or_default();
        let mut added = 0;
        for title in titles {
            let title = title.trim();
            if title.is_empty() || entry.iter().any(|t| t == title) {
                continue;
            }
            entry.push(title.to_string());
            added += 1;
        }
        added
    }

    /// Insert a batch of topics, grouped by their category.
    pub fn insert_topics(&mut self, year: i32, topics: &[Topic]) -> usize {
        topics
            .iter()
            .map(|t| self.insert(year, &t.category, std::slice::from_ref(&t.title)))
            .sum()
    }
}
