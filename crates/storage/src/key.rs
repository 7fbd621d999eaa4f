//! Entity keys and key-only queries.
//!
//! Every record in the store is addressed by an [`EntityKey`]: a logical
//! collection name plus an entity identifier. Keys are validated on
//! construction, so an adapter never sees an empty or reserved name.

use std::fmt;

use crate::error::{StorageError, StorageResult};

/// Maximum length of an entity name, in bytes.
pub const MAX_NAME_LEN: usize = 1500;

/// Separator between the collection and the name in the byte encoding.
const SEPARATOR: u8 = 0x00;

/// Key of one entity: `(collection, name)`.
///
/// # Byte Encoding
///
/// [`encode`](EntityKey::encode) produces `collection 0x00 name`. Because
/// neither part may contain NUL, the encoding is unambiguous and all keys of
/// one collection share the prefix returned by [`collection_prefix`].
///
/// # Examples
///
/// ```
/// use docstore_common_storage::EntityKey;
///
/// let key = EntityKey::new("counters", "page-views").unwrap();
/// assert_eq!(key.collection(), "counters");
/// assert_eq!(key.name(), "page-views");
/// assert_eq!(key.to_string(), "counters:page-views");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    collection: String,
    name: String,
}

impl EntityKey {
    /// Creates a validated key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] if:
    /// - `collection` or `name` is empty
    /// - either part contains a NUL byte
    /// - `name` is longer than [`MAX_NAME_LEN`] bytes
    /// - `name` has the reserved form `__*__`
    pub fn new(collection: impl Into<String>, name: impl Into<String>) -> StorageResult<Self> {
        let collection = collection.into();
        let name = name.into();

        validate_collection(&collection)?;

        if name.is_empty() {
            return Err(StorageError::invalid_key("entity name is empty"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(StorageError::invalid_key(format!(
                "entity name is {} bytes, limit is {MAX_NAME_LEN}",
                name.len()
            )));
        }
        if name.as_bytes().contains(&SEPARATOR) {
            return Err(StorageError::invalid_key("entity name contains NUL"));
        }
        if name.len() >= 4 && name.starts_with("__") && name.ends_with("__") {
            return Err(StorageError::invalid_key(format!("entity name {name:?} is reserved")));
        }

        Ok(Self { collection, name })
    }

    /// Returns the collection name.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Returns the entity identifier.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Encodes the key as `collection 0x00 name`.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = collection_prefix(&self.collection);
        out.extend_from_slice(self.name.as_bytes());
        out
    }

    /// Decodes a key produced by [`encode`](EntityKey::encode).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] if the bytes are not UTF-8, lack
    /// the separator, or decode to a key [`new`](EntityKey::new) would reject.
    pub fn decode(bytes: &[u8]) -> StorageResult<Self> {
        let split = bytes
            .iter()
            .position(|b| *b == SEPARATOR)
            .ok_or_else(|| StorageError::invalid_key("encoded key has no separator"))?;

        let collection = std::str::from_utf8(&bytes[..split])
            .map_err(|e| StorageError::invalid_key(format!("collection is not UTF-8: {e}")))?;
        let name = std::str::from_utf8(&bytes[split + 1..])
            .map_err(|e| StorageError::invalid_key(format!("name is not UTF-8: {e}")))?;

        Self::new(collection, name)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.collection, self.name)
    }
}

/// Returns the byte prefix shared by every key of `collection`.
#[must_use]
pub fn collection_prefix(collection: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(collection.len() + 1);
    out.extend_from_slice(collection.as_bytes());
    out.push(SEPARATOR);
    out
}

fn validate_collection(collection: &str) -> StorageResult<()> {
    if collection.is_empty() {
        return Err(StorageError::invalid_key("collection name is empty"));
    }
    if collection.as_bytes().contains(&SEPARATOR) {
        return Err(StorageError::invalid_key("collection name contains NUL"));
    }
    Ok(())
}

/// Key-only count query over one collection.
///
/// Only keys are inspected; record bodies are never decoded. An optional key
/// filter restricts the match to a single entity (`__key__ = key`).
///
/// # Examples
///
/// ```
/// use docstore_common_storage::{EntityKey, KeyQuery};
///
/// let key = EntityKey::new("applications", "app-1").unwrap();
/// let query = KeyQuery::new("applications").unwrap().filter_key(key);
/// assert!(query.key_filter().is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyQuery {
    collection: String,
    key_filter: Option<EntityKey>,
}

impl KeyQuery {
    /// Creates a query matching every key of `collection`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] if the collection name is empty
    /// or contains NUL.
    pub fn new(collection: impl Into<String>) -> StorageResult<Self> {
        let collection = collection.into();
        validate_collection(&collection)?;
        Ok(Self { collection, key_filter: None })
    }

    /// Creates a query matching exactly `key`.
    #[must_use]
    pub fn for_key(key: &EntityKey) -> Self {
        Self { collection: key.collection.clone(), key_filter: Some(key.clone()) }
    }

    /// Restricts the query to a single key.
    #[must_use]
    pub fn filter_key(mut self, key: EntityKey) -> Self {
        self.key_filter = Some(key);
        self
    }

    /// Returns the queried collection.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Returns the key filter, if any.
    #[must_use]
    pub fn key_filter(&self) -> Option<&EntityKey> {
        self.key_filter.as_ref()
    }

    /// Returns whether `key` satisfies this query.
    ///
    /// A key filter from another collection matches nothing.
    #[must_use]
    pub fn matches(&self, key: &EntityKey) -> bool {
        if key.collection != self.collection {
            return false;
        }
        match &self.key_filter {
            Some(filter) => filter == key,
            None => true,
        }
    }
}
