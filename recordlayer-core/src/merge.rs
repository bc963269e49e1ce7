//! Recursive merging of a patch into an existing record.
//!
//! [`merge`] walks the patch key by key. Nested documents present on both sides are merged
//! recursively, arrays present on both sides are combined according to the [`ListPolicy`], and
//! every other key is written or deleted according to the [`DictPolicy`]. The original record is
//! never modified.
//!
//! # Example
//!
//! ```
//! use bson::doc;
//! use recordlayer_core::merge::{ListPolicy, MergePolicy, merge};
//!
//! let original = doc! { "id": "x", "tags": ["a", "b"], "profile": { "age": 29 } };
//! let patch = doc! { "tags": ["a"], "profile": { "age": 30 } };
//!
//! let merged = merge(
//!     &original,
//!     &patch,
//!     MergePolicy::default().with_list_policy(ListPolicy::Remove),
//! );
//!
//! assert_eq!(merged, doc! { "id": "x", "tags": ["b"], "profile": { "age": 30 } });
//! ```

use bson::Bson;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::{
    error::RecordStoreError,
    record::{Record, values_equal},
};

/// How an array in the patch is combined with the array already stored under the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListPolicy {
    /// Append patch items not already present, keeping existing order.
    #[default]
    Add,
    /// Drop every existing item equal to the first patch item.
    Remove,
    /// Discard the existing array in favour of the patch array.
    Replace,
}

/// How a non-recursive key in the patch is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DictPolicy {
    /// Set the key to the patch value.
    #[default]
    Upsert,
    /// Delete the key; the patch value is ignored.
    Remove,
}

impl ListPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListPolicy::Add => "add",
            ListPolicy::Remove => "remove",
            ListPolicy::Replace => "replace",
        }
    }
}

impl DictPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DictPolicy::Upsert => "upsert",
            DictPolicy::Remove => "remove",
        }
    }
}

impl fmt::Display for ListPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for DictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListPolicy {
    type Err = RecordStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(ListPolicy::Add),
            "remove" => Ok(ListPolicy::Remove),
            "replace" => Ok(ListPolicy::Replace),
            other => Err(RecordStoreError::InvalidPolicy(format!(
                "unknown list policy {other:?}, expected add, remove or replace"
            ))),
        }
    }
}

impl FromStr for DictPolicy {
    type Err = RecordStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upsert" => Ok(DictPolicy::Upsert),
            "remove" => Ok(DictPolicy::Remove),
            other => Err(RecordStoreError::InvalidPolicy(format!(
                "unknown dict policy {other:?}, expected upsert or remove"
            ))),
        }
    }
}

/// The pair of policies governing one merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MergePolicy {
    #[serde(default)]
    pub list_policy: ListPolicy,
    #[serde(default)]
    pub dict_policy: DictPolicy,
}

impl MergePolicy {
    pub fn new(list_policy: ListPolicy, dict_policy: DictPolicy) -> Self {
        Self {
            list_policy,
            dict_policy,
        }
    }

    pub fn with_list_policy(mut self, list_policy: ListPolicy) -> Self {
        self.list_policy = list_policy;
        self
    }

    pub fn with_dict_policy(mut self, dict_policy: DictPolicy) -> Self {
        self.dict_policy = dict_policy;
        self
    }
}

/// Merges `patch` into a copy of `original`.
///
/// For every key `k` in `patch`, in patch order:
///
/// 1. if the copy holds a document under `k` and the patch value is a document, the two are
///    merged recursively
/// 2. otherwise, if the copy holds an array under `k` and the patch value is an array, the arrays
///    are combined according to `policy.list_policy`
/// 3. otherwise `policy.dict_policy` decides: [`DictPolicy::Upsert`] writes the patch value,
///    [`DictPolicy::Remove`] deletes `k` from the copy
///
/// A key the copy lacks, or holds null under, always takes the third branch.
/// Keys of `original` not mentioned in `patch` are kept untouched.
pub fn merge(original: &Record, patch: &Record, policy: MergePolicy) -> Record {
    let mut result = original.clone();
    merge_into(&mut result, patch, policy);
    result
}

fn merge_into(target: &mut Record, patch: &Record, policy: MergePolicy) {
    for (key, incoming) in patch {
        let merged_in_place = match (target.get_mut(key), incoming) {
            (Some(Bson::Document(existing)), Bson::Document(nested)) => {
                merge_into(existing, nested, policy);
                true
            }
            (Some(Bson::Array(existing)), Bson::Array(items)) => {
                merge_lists(existing, items, policy.list_policy);
                true
            }
            _ => false,
        };

        if merged_in_place {
            continue;
        }

        match policy.dict_policy {
            DictPolicy::Upsert => {
                target.insert(key.clone(), incoming.clone());
            }
            DictPolicy::Remove => {
                target.remove(key);
            }
        }
    }
}

fn merge_lists(existing: &mut Vec<Bson>, items: &[Bson], policy: ListPolicy) {
    match policy {
        ListPolicy::Add => {
            for item in items {
                if !existing.iter().any(|present| values_equal(present, item)) {
                    existing.push(item.clone());
                }
            }
        }
        ListPolicy::Remove => {
            // Only the first patch item selects what is removed.
            if let Some(needle) = items.first() {
                existing.retain(|present| !values_equal(present, needle));
            }
        }
        ListPolicy::Replace => {
            *existing = items.to_vec();
        }
    }
}
