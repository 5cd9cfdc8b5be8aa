//! Cache keys.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{self, AtomicU64};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

static NEXT_ISOLATED: AtomicU64 = AtomicU64::new(1);

/// An ordered sequence of JSON values identifying a cache entry.
///
/// Two keys are equal when their canonical JSON encodings are equal. Object
/// fields are encoded in sorted order, so structurally equal values always
/// produce equal keys regardless of how they were built.
///
/// ```
/// use stillwater_query::query_key;
///
/// let a = query_key!["todo", { "id": 1, "done": false }];
/// let b = query_key!["todo", { "done": false, "id": 1 }];
/// assert_eq!(a, b);
/// assert_ne!(a, query_key!["todo", { "id": 2, "done": false }]);
/// ```
#[derive(Clone, Default)]
pub struct QueryKey {
    parts: Vec<Value>,
    canonical: String,
}

impl QueryKey {
    /// The empty key. It is a prefix of every key.
    pub fn new() -> Self {
        Self::from_parts(Vec::new())
    }

    /// A key made of `parts`, in order.
    pub fn from_parts(parts: Vec<Value>) -> Self {
        let canonical = Value::Array(parts.clone()).to_string();
        QueryKey { parts, canonical }
    }

    /// Append a part.
    pub fn push(self, part: impl Into<Value>) -> Self {
        let mut parts = self.parts;
        parts.push(part.into());
        Self::from_parts(parts)
    }

    /// Append the JSON encoding of `part`.
    pub fn push_serialized<T: Serialize + ?Sized>(self, part: &T) -> Result<Self, serde_json::Error> {
        Ok(self.push(serde_json::to_value(part)?))
    }

    /// The parts of the key.
    pub fn parts(&self) -> &[Value] {
        &self.parts
    }

    /// Number of parts.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Whether the key has no parts.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Whether `prefix` matches the leading parts of this key.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        prefix.parts.len() <= self.parts.len()
            && prefix
                .parts
                .iter()
                .zip(&self.parts)
                .all(|(a, b)| a == b)
    }

    /// The canonical JSON encoding.
    pub fn as_str(&self) -> &str {
        &self.canonical
    }
}

impl PartialEq for QueryKey {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for QueryKey {}

impl Hash for QueryKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl PartialOrd for QueryKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueryKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

impl fmt::Debug for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueryKey({})", self.canonical)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl Serialize for QueryKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.parts.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for QueryKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<Value>::deserialize(deserializer).map(Self::from_parts)
    }
}

impl From<Vec<Value>> for QueryKey {
    fn from(parts: Vec<Value>) -> Self {
        Self::from_parts(parts)
    }
}

/// A key under `prefix` that no other call returns.
///
/// Used for requests that cannot be keyed by their content, so that they
/// never share a cache entry.
pub(crate) fn isolated_key(prefix: QueryKey) -> QueryKey {
    let id = NEXT_ISOLATED.fetch_add(1, atomic::Ordering::Relaxed);
    prefix.push(serde_json::json!({ "unkeyed": id }))
}

/// Build a [`QueryKey`] from JSON-like parts.
///
/// Every part is anything `serde_json::json!` accepts. Parts that are more
/// than one token tree, such as `user.id` or `-1`, need parentheses.
#[macro_export]
macro_rules! query_key {
    () => {
        $crate::query::QueryKey::new()
    };
    ($($part:tt),+ $(,)?) => {
        $crate::query::QueryKey::from_parts(::std::vec![
            $($crate::__private::serde_json::json!($part)),+
        ])
    };
}
