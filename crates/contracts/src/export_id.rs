//! ExportId - Cheap-to-clone export definition identifier
//!
//! Uses Arc<str> internally for O(1) clone operations.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// Export definition identifier with cheap cloning.
///
/// Every point built for an export carries its id as measurement name, so one
/// record fanned out to thousands of points only bumps a reference count.
///
/// # Examples
/// ```
/// use contracts::ExportId;
///
/// let id: ExportId = "room-climate".into();
/// let id2 = id.clone();
/// assert_eq!(id, id2);
/// assert_eq!(id.as_str(), "room-climate");
/// ```
#[derive(Clone, Default)]
pub struct ExportId(Arc<str>);

impl ExportId {
    /// Get the underlying string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for ExportId {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Borrow<str> for ExportId {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ExportId {
    #[inline]
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for ExportId {
    #[inline]
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Display for ExportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ExportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExportId").field(&&*self.0).finish()
    }
}

impl PartialEq for ExportId {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        // Fast path: same Arc pointer
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for ExportId {}

impl PartialEq<str> for ExportId {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for ExportId {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

// Ordering and hashing follow str so BTree/Hash lookups by &str work.
impl PartialOrd for ExportId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ExportId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.as_ref().cmp(other.0.as_ref())
    }
}

impl Hash for ExportId {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl Serialize for ExportId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ExportId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, HashMap};

    #[test]
    fn test_clone_is_cheap() {
        let id1: ExportId = "export-1".into();
        let id2 = id1.clone();
        assert_eq!(id1.as_str().as_ptr(), id2.as_str().as_ptr());
    }

    #[test]
    fn test_equality() {
        let id: ExportId = "e1".into();
        assert_eq!(id, "e1");
        assert_eq!(id, ExportId::from("e1"));
    }

    #[test]
    fn test_map_keys() {
        let mut map: HashMap<ExportId, i32> = HashMap::new();
        map.insert("a".into(), 1);
        assert_eq!(map.get("a"), Some(&1));

        let set: BTreeSet<ExportId> = ["b".into(), "a".into()].into_iter().collect();
        let ordered: Vec<&str> = set.iter().map(ExportId::as_str).collect();
        assert_eq!(ordered, vec!["a", "b"]);
    }

    #[test]
    fn test_serde() {
        let id: ExportId = "test".into();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"test\"");

        let parsed: ExportId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
