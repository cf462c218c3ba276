// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ID generation and newtype identifier scaffolding.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Defines a newtype ID wrapper around `String`.
///
/// Generates `new()`, `as_str()`, `Display`, `From<String>`, `From<&str>`,
/// `PartialEq<str>`, `PartialEq<&str>`, and `Borrow<str>` implementations.
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id! {
    /// Identifies a job in the registry.
    pub struct JobId;
}

define_id! {
    /// Identifies a single execution attempt of a job. Monotonic per process.
    pub struct RunUlid;
}

/// Generates unique identifiers. Abstracted so tests can substitute a
/// deterministic generator.
pub trait IdGen: Send + Sync {
    fn next_job_id(&self) -> JobId;
    fn next_run_ulid(&self) -> RunUlid;
}

/// ULID-based generator for production use. ULIDs are lexicographically
/// sortable by creation time, which is what makes `currentRunUlid` usable as
/// a monotonic run token without a separate counter.
#[derive(Clone, Default)]
pub struct UlidIdGen;

impl IdGen for UlidIdGen {
    fn next_job_id(&self) -> JobId {
        JobId::new(uuid::Uuid::new_v4().to_string())
    }

    fn next_run_ulid(&self) -> RunUlid {
        RunUlid::new(ulid::Ulid::new().to_string())
    }
}

/// Sequential generator for deterministic tests.
pub struct SequentialIdGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new("id")
    }
}

impl IdGen for SequentialIdGen {
    fn next_job_id(&self) -> JobId {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        JobId::new(format!("{}-job-{n}", self.prefix))
    }

    fn next_run_ulid(&self) -> RunUlid {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        RunUlid::new(format!("{}-run-{n:020}", self.prefix))
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
