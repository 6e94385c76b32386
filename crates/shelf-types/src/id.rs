use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Produces identifiers for newly saved records and nested elements.
///
/// Identifiers must be practically unique for the lifetime of a store. No
/// other property (length, alphabet, ordering) is required by the mapper.
pub trait IdGenerator: Send + Sync {
    fn new_id(&self) -> String;
}

/// Which UUID layout a [`UuidGenerator`] emits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UuidVersion {
    /// Random (RFC 9562 version 4).
    #[default]
    V4,
    /// Unix-time ordered (RFC 9562 version 7). Keys sort in creation order.
    V7,
}

/// UUID-backed identifier generator.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidGenerator {
    version: UuidVersion,
}

impl UuidGenerator {
    pub fn new(version: UuidVersion) -> Self {
        Self { version }
    }

    /// Random identifiers.
    pub fn v4() -> Self {
        Self::new(UuidVersion::V4)
    }

    /// Time-ordered identifiers.
    pub fn v7() -> Self {
        Self::new(UuidVersion::V7)
    }

    pub fn version(&self) -> UuidVersion {
        self.version
    }
}

impl IdGenerator for UuidGenerator {
    fn new_id(&self) -> String {
        match self.version {
            UuidVersion::V4 => uuid::Uuid::new_v4().to_string(),
            UuidVersion::V7 => uuid::Uuid::now_v7().to_string(),
        }
    }
}

/// Deterministic generator: `prefix` followed by a zero-padded counter.
///
/// Identifiers sort in the order they were issued. Intended for tests and
/// reproducible fixtures; uniqueness only holds within one generator.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::starting_at(prefix, 1)
    }

    pub fn starting_at(prefix: impl Into<String>, first: u64) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(first),
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new("id-")
    }
}

impl IdGenerator for SequentialIds {
    fn new_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}{:016}", self.prefix, n)
    }
}

/// Generator selection for configuration files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdKind {
    #[default]
    UuidV4,
    UuidV7,
    Sequential,
}

impl IdKind {
    /// Instantiate the selected generator.
    pub fn build(self) -> Box<dyn IdGenerator> {
        match self {
            Self::UuidV4 => Box::new(UuidGenerator::v4()),
            Self::UuidV7 => Box::new(UuidGenerator::v7()),
            Self::Sequential => Box::new(SequentialIds::default()),
        }
    }
}
