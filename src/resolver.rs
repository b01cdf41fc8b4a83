//! Resource resolution for tilesets, subtrees and buffers
//!
//! Relative URIs resolve against the resolver's base, `data:` URIs decode
//! inline and `http(s)` URIs are not resolved locally. Payloads starting with
//! the gzip magic bytes are decompressed transparently.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use flate2::read::GzDecoder;

/// Source of resource bytes addressed by URI
pub trait ResourceResolver: Send + Sync {
    /// Full contents of the resource, or `None` if it cannot be resolved
    fn resolve_data(&self, uri: &str) -> Option<Vec<u8>>;

    /// At least the first `max_bytes` of the resource when it is that large.
    /// Implementations may return the whole resource.
    fn resolve_data_partial(&self, uri: &str, _max_bytes: usize) -> Option<Vec<u8>> {
        self.resolve_data(uri)
    }

    /// A resolver rooted at `uri`, interpreted relative to this one
    fn derive(&self, uri: &str) -> Box<dyn ResourceResolver>;
}

/// Directory part of a relative URI, including the trailing slash
pub fn uri_directory(uri: &str) -> &str {
    match uri.rfind('/') {
        Some(i) => &uri[..=i],
        None => "",
    }
}

fn is_remote(uri: &str) -> bool {
    uri.starts_with("http://") || uri.starts_with("https://")
}

/// Decode a `data:` URI (base64 or plain payload)
pub fn decode_data_uri(uri: &str) -> Option<Vec<u8>> {
    let rest = uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    if header.ends_with(";base64") {
        match base64::engine::general_purpose::STANDARD.decode(payload) {
            Ok(data) => Some(data),
            Err(e) => {
                log::warn!("Invalid base64 payload in data URI: {}", e);
                None
            }
        }
    } else {
        Some(payload.as_bytes().to_vec())
    }
}

/// Decompress `data` when it starts with the gzip magic bytes
pub fn unzip_if_gzipped(data: Vec<u8>) -> Vec<u8> {
    if data.len() < 2 || data[0] != 0x1F || data[1] != 0x8B {
        return data;
    }
    let mut decoder = GzDecoder::new(data.as_slice());
    let mut decompressed = Vec::new();
    match decoder.read_to_end(&mut decompressed) {
        Ok(_) => decompressed,
        Err(e) => {
            log::warn!("Data looked gzipped but failed to decompress: {}", e);
            data
        }
    }
}

/// Resolves resources from a directory on the local file system
#[derive(Debug, Clone)]
pub struct FileResourceResolver {
    base_path: PathBuf,
}

impl FileResourceResolver {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve a URI to a path below the base directory
    pub fn resolve_path(&self, uri: &str) -> PathBuf {
        self.base_path.join(uri)
    }
}

impl ResourceResolver for FileResourceResolver {
    fn resolve_data(&self, uri: &str) -> Option<Vec<u8>> {
        if uri.starts_with("data:") {
            return decode_data_uri(uri).map(unzip_if_gzipped);
        }
        if is_remote(uri) {
            log::debug!("Not resolving remote URI {}", uri);
            return None;
        }
        let path = self.resolve_path(uri);
        match std::fs::read(&path) {
            Ok(data) => Some(unzip_if_gzipped(data)),
            Err(e) => {
                log::debug!("Could not read {}: {}", path.display(), e);
                None
            }
        }
    }

    fn resolve_data_partial(&self, uri: &str, max_bytes: usize) -> Option<Vec<u8>> {
        if uri.starts_with("data:") || is_remote(uri) {
            return self.resolve_data(uri);
        }
        let path = self.resolve_path(uri);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) => {
                log::debug!("Could not open {}: {}", path.display(), e);
                return None;
            }
        };
        let mut data = Vec::with_capacity(max_bytes);
        if let Err(e) = file.take(max_bytes as u64).read_to_end(&mut data) {
            log::debug!("Could not read {}: {}", path.display(), e);
            return None;
        }
        // a gzip prefix cannot be decompressed on its own
        if data.len() >= 2 && data[0] == 0x1F && data[1] == 0x8B {
            return self.resolve_data(uri);
        }
        Some(data)
    }

    fn derive(&self, uri: &str) -> Box<dyn ResourceResolver> {
        Box::new(Self::new(self.resolve_path(uri)))
    }
}

/// Resolves resources from an in-memory map of relative paths
///
/// Derived resolvers share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryResourceResolver {
    base: String,
    entries: Arc<BTreeMap<String, Vec<u8>>>,
}

/// Join `uri` onto the directory `base` and fold `.` and `..` segments
fn normalize_join(base: &str, uri: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in base.split('/').chain(uri.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

impl MemoryResourceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry at a path relative to the resolver's base
    pub fn insert(&mut self, path: &str, data: impl Into<Vec<u8>>) {
        let key = normalize_join(&self.base, path);
        Arc::make_mut(&mut self.entries).insert(key, data.into());
    }

    pub fn with_entry(mut self, path: &str, data: impl Into<Vec<u8>>) -> Self {
        self.insert(path, data);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ResourceResolver for MemoryResourceResolver {
    fn resolve_data(&self, uri: &str) -> Option<Vec<u8>> {
        if uri.starts_with("data:") {
            return decode_data_uri(uri).map(unzip_if_gzipped);
        }
        if is_remote(uri) {
            log::debug!("Not resolving remote URI {}", uri);
            return None;
        }
        let key = normalize_join(&self.base, uri);
        let data = self.entries.get(&key);
        if data.is_none() {
            log::debug!("No in-memory resource at {}", key);
        }
        data.cloned().map(unzip_if_gzipped)
    }

    fn derive(&self, uri: &str) -> Box<dyn ResourceResolver> {
        Box::new(Self {
            base: normalize_join(&self.base, uri),
            entries: Arc::clone(&self.entries),
        })
    }
}
