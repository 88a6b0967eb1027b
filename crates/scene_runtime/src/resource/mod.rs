//! Resource loading interface
//!
//! The runtime never parses resource files itself. It consumes resources
//! through the narrow [`ResourceLoader`] interface: resolve an identifier to
//! an already-decoded, reference-counted resource, and release it when the
//! owning component slot goes away.
//!
//! [`MemoryResourceLoader`] is the reference implementation: an in-memory
//! store with per-extension decoders and load/release accounting. It backs
//! the test suite and the sandbox application; a production build would wire
//! in a loader backed by the asset pipeline instead.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use slotmap::{DefaultKey, Key, KeyData, SlotMap};
use thiserror::Error;

/// Resource loading and lookup errors
#[derive(Debug, Error)]
pub enum ResourceError {
    /// No decoder is registered for the identifier's extension.
    #[error("unknown resource type for '{0}'")]
    UnknownResourceType(String),

    /// The identifier does not name any stored resource.
    #[error("resource '{0}' not found")]
    NotFound(String),

    /// The resource bytes could not be decoded.
    #[error("failed to decode resource '{id}': {reason}")]
    DecodeFailed {
        /// Identifier of the resource that failed to decode.
        id: String,
        /// Decoder-provided failure description.
        reason: String,
    },

    /// A handle referred to a resource that is no longer loaded.
    #[error("stale or unknown resource handle")]
    InvalidHandle,

    /// A decoder is already registered for the extension.
    #[error("resource type '{0}' is already registered")]
    DuplicateResourceType(String),
}

/// Tag identifying a registered resource type (one per file extension)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceTypeTag(pub(crate) u32);

/// Opaque handle to a loaded resource
///
/// Handles are generation-tagged: releasing the last reference invalidates
/// every outstanding handle, and later lookups fail with
/// [`ResourceError::InvalidHandle`] instead of aliasing a reused slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle(u64);

impl ResourceHandle {
    fn from_key(key: DefaultKey) -> Self {
        Self(key.data().as_ffi())
    }

    fn key(self) -> DefaultKey {
        KeyData::from_ffi(self.0).into()
    }
}

/// Interface to the external resource loader
///
/// The runtime only requests and releases resources; reference-counting
/// policy belongs to the loader.
pub trait ResourceLoader {
    /// Resolve the resource type tag for an identifier or bare extension.
    fn type_tag(&self, id: &str) -> Result<ResourceTypeTag, ResourceError>;

    /// Load the resource, bumping its reference count.
    fn load(&mut self, id: &str) -> Result<ResourceHandle, ResourceError>;

    /// Look up a loaded resource by handle.
    fn get(&self, handle: ResourceHandle) -> Result<&dyn Any, ResourceError>;

    /// Release one reference to the resource.
    fn release(&mut self, handle: ResourceHandle);
}

/// Decoder turning raw bytes into an in-memory resource
pub type DecodeFn = Box<dyn Fn(&[u8]) -> Result<Box<dyn Any>, String>>;

/// Load/release accounting, shared out of the loader for test assertions
#[derive(Debug, Default, Clone, Copy)]
pub struct LoaderStats {
    /// Number of successful `load` calls.
    pub loads: u64,
    /// Number of `release` calls that reached a live resource.
    pub releases: u64,
}

impl LoaderStats {
    /// Number of resources currently held live.
    #[must_use]
    pub fn live(&self) -> u64 {
        self.loads - self.releases
    }
}

struct ResourceEntry {
    id: String,
    tag: ResourceTypeTag,
    data: Box<dyn Any>,
    ref_count: u32,
}

/// In-memory, reference-counted resource store
pub struct MemoryResourceLoader {
    decoders: HashMap<String, (ResourceTypeTag, DecodeFn)>,
    store: HashMap<String, Vec<u8>>,
    loaded: SlotMap<DefaultKey, ResourceEntry>,
    by_id: HashMap<String, DefaultKey>,
    next_tag: u32,
    stats: Rc<RefCell<LoaderStats>>,
}

impl Default for MemoryResourceLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryResourceLoader {
    /// Create an empty loader with no registered types.
    #[must_use]
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
            store: HashMap::new(),
            loaded: SlotMap::new(),
            by_id: HashMap::new(),
            next_tag: 0,
            stats: Rc::new(RefCell::new(LoaderStats::default())),
        }
    }

    /// Register a decoder for a file extension, yielding its type tag.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::DuplicateResourceType`] if the extension is
    /// already bound.
    pub fn register_type(
        &mut self,
        extension: &str,
        decoder: DecodeFn,
    ) -> Result<ResourceTypeTag, ResourceError> {
        if self.decoders.contains_key(extension) {
            return Err(ResourceError::DuplicateResourceType(extension.to_string()));
        }
        let tag = ResourceTypeTag(self.next_tag);
        self.next_tag += 1;
        self.decoders.insert(extension.to_string(), (tag, decoder));
        Ok(tag)
    }

    /// Seed the store with the raw bytes behind an identifier.
    pub fn insert(&mut self, id: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.store.insert(id.into(), bytes.into());
    }

    /// Shared handle to the load/release counters.
    #[must_use]
    pub fn stats(&self) -> Rc<RefCell<LoaderStats>> {
        Rc::clone(&self.stats)
    }

    fn extension(id: &str) -> &str {
        id.rsplit_once('.').map_or(id, |(_, ext)| ext)
    }
}

impl ResourceLoader for MemoryResourceLoader {
    fn type_tag(&self, id: &str) -> Result<ResourceTypeTag, ResourceError> {
        let ext = Self::extension(id);
        self.decoders
            .get(ext)
            .map(|(tag, _)| *tag)
            .ok_or_else(|| ResourceError::UnknownResourceType(id.to_string()))
    }

    fn load(&mut self, id: &str) -> Result<ResourceHandle, ResourceError> {
        if let Some(&key) = self.by_id.get(id) {
            if let Some(entry) = self.loaded.get_mut(key) {
                entry.ref_count += 1;
                self.stats.borrow_mut().loads += 1;
                return Ok(ResourceHandle::from_key(key));
            }
        }

        let ext = Self::extension(id);
        let (tag, decoder) = self
            .decoders
            .get(ext)
            .ok_or_else(|| ResourceError::UnknownResourceType(id.to_string()))?;
        let bytes = self
            .store
            .get(id)
            .ok_or_else(|| ResourceError::NotFound(id.to_string()))?;
        let data = decoder(bytes).map_err(|reason| ResourceError::DecodeFailed {
            id: id.to_string(),
            reason,
        })?;

        let entry = ResourceEntry {
            id: id.to_string(),
            tag: *tag,
            data,
            ref_count: 1,
        };
        let key = self.loaded.insert(entry);
        self.by_id.insert(id.to_string(), key);
        self.stats.borrow_mut().loads += 1;
        log::trace!("loaded resource '{id}'");
        Ok(ResourceHandle::from_key(key))
    }

    fn get(&self, handle: ResourceHandle) -> Result<&dyn Any, ResourceError> {
        self.loaded
            .get(handle.key())
            .map(|entry| entry.data.as_ref())
            .ok_or(ResourceError::InvalidHandle)
    }

    fn release(&mut self, handle: ResourceHandle) {
        let key = handle.key();
        let Some(entry) = self.loaded.get_mut(key) else {
            log::warn!("release of stale resource handle ignored");
            return;
        };
        self.stats.borrow_mut().releases += 1;
        entry.ref_count -= 1;
        if entry.ref_count == 0 {
            if let Some(entry) = self.loaded.remove(key) {
                self.by_id.remove(&entry.id);
                log::trace!("unloaded resource '{}'", entry.id);
            }
        }
    }
}

impl MemoryResourceLoader {
    /// Resource type tag of a loaded resource.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::InvalidHandle`] for stale handles.
    pub fn tag_of(&self, handle: ResourceHandle) -> Result<ResourceTypeTag, ResourceError> {
        self.loaded
            .get(handle.key())
            .map(|entry| entry.tag)
            .ok_or(ResourceError::InvalidHandle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string_decoder() -> DecodeFn {
        Box::new(|bytes| {
            String::from_utf8(bytes.to_vec())
                .map(|s| Box::new(s) as Box<dyn Any>)
                .map_err(|e| e.to_string())
        })
    }

    fn failing_decoder() -> DecodeFn {
        Box::new(|_| Err("bad bytes".to_string()))
    }

    #[test]
    fn load_get_release_round_trip() {
        let mut loader = MemoryResourceLoader::new();
        loader.register_type("txt", string_decoder()).unwrap();
        loader.insert("hello.txt", b"hi".to_vec());

        let handle = loader.load("hello.txt").unwrap();
        let value = loader.get(handle).unwrap().downcast_ref::<String>().unwrap();
        assert_eq!(value, "hi");

        loader.release(handle);
        assert!(matches!(loader.get(handle), Err(ResourceError::InvalidHandle)));

        let stats = *loader.stats().borrow();
        assert_eq!(stats.loads, 1);
        assert_eq!(stats.releases, 1);
        assert_eq!(stats.live(), 0);
    }

    #[test]
    fn repeated_loads_share_one_entry() {
        let mut loader = MemoryResourceLoader::new();
        loader.register_type("txt", string_decoder()).unwrap();
        loader.insert("hello.txt", b"hi".to_vec());

        let first = loader.load("hello.txt").unwrap();
        let second = loader.load("hello.txt").unwrap();
        assert_eq!(first, second);

        loader.release(first);
        // Still live through the second reference.
        assert!(loader.get(second).is_ok());
        loader.release(second);
        assert!(loader.get(second).is_err());
    }

    #[test]
    fn unknown_extension_is_an_error() {
        let mut loader = MemoryResourceLoader::new();
        assert!(matches!(
            loader.load("thing.bin"),
            Err(ResourceError::UnknownResourceType(_))
        ));
        assert!(loader.type_tag("thing.bin").is_err());
    }

    #[test]
    fn missing_resource_is_an_error() {
        let mut loader = MemoryResourceLoader::new();
        loader.register_type("txt", string_decoder()).unwrap();
        assert!(matches!(
            loader.load("absent.txt"),
            Err(ResourceError::NotFound(_))
        ));
    }

    #[test]
    fn decode_failure_is_reported() {
        let mut loader = MemoryResourceLoader::new();
        loader.register_type("bad", failing_decoder()).unwrap();
        loader.insert("thing.bad", b"x".to_vec());
        assert!(matches!(
            loader.load("thing.bad"),
            Err(ResourceError::DecodeFailed { .. })
        ));
        assert_eq!(loader.stats().borrow().loads, 0);
    }

    #[test]
    fn duplicate_extension_is_rejected() {
        let mut loader = MemoryResourceLoader::new();
        loader.register_type("txt", string_decoder()).unwrap();
        assert!(matches!(
            loader.register_type("txt", string_decoder()),
            Err(ResourceError::DuplicateResourceType(_))
        ));
    }

    #[test]
    fn tags_are_distinct_per_extension() {
        let mut loader = MemoryResourceLoader::new();
        let a = loader.register_type("a", string_decoder()).unwrap();
        let b = loader.register_type("b", string_decoder()).unwrap();
        assert_ne!(a, b);
        loader.insert("one.a", b"1".to_vec());
        let handle = loader.load("one.a").unwrap();
        assert_eq!(loader.tag_of(handle).unwrap(), a);
    }
}
