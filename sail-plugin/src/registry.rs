//! Process-wide codec catalog.
//!
//! The registry is an ordered list of codec records: built-in codecs
//! first, then metadata files discovered on disk. Codec instances are
//! created lazily and cached per record; `unload_plugins` drops the
//! caches without touching metadata, and live sessions keep their own
//! reference so an unload never pulls a codec out from under them.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use sail_codecs::{builtin_codecs, Codec, ReadFeatures, WriteFeatures};
use sail_core::{Error, IoStream, Result, SeekFrom};

use crate::loader::{default_search_paths, plugin_path_for, CodecLoader};
use crate::metadata::{read_metadata, CodecMetadata, CODEC_LAYOUT_CURRENT};

/// Where a codec's implementation comes from.
enum PluginSource {
    /// Compiled into this build.
    Builtin(Arc<dyn Codec>),
    /// A dynamic library sited next to its metadata file.
    Native(PathBuf),
}

/// One registered codec: metadata, capabilities, and a lazily created
/// implementation handle.
pub struct CodecRecord {
    name: String,
    metadata: CodecMetadata,
    read_features: ReadFeatures,
    write_features: WriteFeatures,
    source: PluginSource,
    instance: Mutex<Option<Arc<dyn Codec>>>,
}

impl std::fmt::Debug for CodecRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRecord").field("name", &self.name).finish()
    }
}

impl CodecRecord {
    fn from_builtin(codec: Arc<dyn Codec>) -> Self {
        let descriptor = codec.describe();

        let metadata = CodecMetadata {
            layout: CODEC_LAYOUT_CURRENT,
            version: descriptor.version.to_string(),
            description: descriptor.description.to_string(),
            extensions: descriptor.extensions.iter().map(|e| e.to_string()).collect(),
            mime_types: descriptor.mime_types.iter().map(|m| m.to_string()).collect(),
        };

        Self {
            name: descriptor.name.to_string(),
            metadata,
            read_features: descriptor.read_features,
            write_features: descriptor.write_features,
            source: PluginSource::Builtin(codec),
            instance: Mutex::new(None),
        }
    }

    fn from_metadata(name: String, metadata: CodecMetadata, plugin_path: PathBuf) -> Self {
        Self {
            name,
            metadata,
            read_features: ReadFeatures::default(),
            write_features: WriteFeatures::default(),
            source: PluginSource::Native(plugin_path),
            instance: Mutex::new(None),
        }
    }

    /// Short codec name: the descriptor name for built-ins, the metadata
    /// file stem for discovered codecs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parsed codec metadata.
    pub fn metadata(&self) -> &CodecMetadata {
        &self.metadata
    }

    /// Decode capabilities.
    pub fn read_features(&self) -> &ReadFeatures {
        &self.read_features
    }

    /// Encode capabilities.
    pub fn write_features(&self) -> &WriteFeatures {
        &self.write_features
    }

    /// Whether this codec claims a file extension (case-insensitive,
    /// leading dot stripped).
    pub fn has_extension(&self, extension: &str) -> bool {
        let needle = extension.trim_start_matches('.').to_lowercase();
        self.metadata.extensions.iter().any(|e| *e == needle)
    }

    /// Whether this codec claims a MIME type (case-insensitive).
    pub fn has_mime_type(&self, mime: &str) -> bool {
        let needle = mime.to_lowercase();
        self.metadata.mime_types.iter().any(|m| *m == needle)
    }

    /// Get the codec implementation, creating and caching it on first
    /// use. Fails with `PluginLoadError` for native records, since no
    /// dynamic loader is compiled into this build.
    pub fn instance(&self) -> Result<Arc<dyn Codec>> {
        let mut cached = self.instance.lock();
        if let Some(codec) = cached.as_ref() {
            return Ok(codec.clone());
        }

        match &self.source {
            PluginSource::Builtin(codec) => {
                debug!(codec = %self.name, "binding built-in codec");
                *cached = Some(codec.clone());
                Ok(codec.clone())
            }
            PluginSource::Native(path) => Err(Error::PluginLoadError(format!(
                "{}: dynamic codec loading is not compiled into this build",
                path.display()
            ))),
        }
    }

    /// Drop the cached implementation handle. Metadata stays valid; the
    /// next `instance` call rebinds.
    pub fn unload(&self) {
        *self.instance.lock() = None;
    }
}

/// Ordered catalog of codec records.
pub struct Registry {
    records: Vec<CodecRecord>,
}

impl Registry {
    /// A registry holding only the built-in codecs.
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            records: Vec::new(),
        };
        for codec in builtin_codecs() {
            registry.push(CodecRecord::from_builtin(codec));
        }
        registry
    }

    /// A registry with built-in codecs plus metadata files discovered in
    /// the given directories. Parse failures are logged and skipped.
    pub fn with_directories(directories: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut registry = Self::with_builtins();
        let loader = CodecLoader::with_paths(directories);

        for path in loader.discover() {
            match read_metadata(&path) {
                Ok(metadata) => {
                    let name = path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .and_then(|n| n.strip_suffix(crate::loader::METADATA_SUFFIX))
                        .unwrap_or("codec")
                        .to_string();
                    let plugin_path = plugin_path_for(&path);

                    info!(
                        codec = %name,
                        description = %metadata.description,
                        "registered codec from metadata"
                    );
                    registry.push(CodecRecord::from_metadata(name, metadata, plugin_path));
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "skipping unreadable codec metadata"
                    );
                }
            }
        }

        registry
    }

    /// The process-wide registry, built once from the default search
    /// paths on first use.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(|| Registry::with_directories(default_search_paths()))
    }

    fn push(&mut self, record: CodecRecord) {
        let mut claimed: HashSet<&str> = HashSet::new();
        for existing in &self.records {
            claimed.extend(existing.metadata.extensions.iter().map(String::as_str));
        }
        for extension in &record.metadata.extensions {
            if claimed.contains(extension.as_str()) {
                debug!(
                    codec = %record.name,
                    extension = %extension,
                    "extension already claimed, first codec wins"
                );
            }
        }

        self.records.push(record);
    }

    /// Number of registered codecs.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over all records in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &CodecRecord> {
        self.records.iter()
    }

    /// Look up a codec by short name.
    pub fn by_name(&self, name: &str) -> Option<&CodecRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    /// Look up a codec by file extension. Case-insensitive; a leading
    /// dot is stripped.
    pub fn by_extension(&self, extension: &str) -> Option<&CodecRecord> {
        self.records.iter().find(|r| r.has_extension(extension))
    }

    /// Look up a codec by MIME type, case-insensitive.
    pub fn by_mime(&self, mime: &str) -> Option<&CodecRecord> {
        self.records.iter().find(|r| r.has_mime_type(mime))
    }

    /// Look up a codec by the extension of a path's final suffix.
    pub fn by_path(&self, path: impl AsRef<Path>) -> Option<&CodecRecord> {
        let extension = path.as_ref().extension()?.to_str()?;
        self.by_extension(extension)
    }

    /// Look up a codec by content: each codec in turn probes the stream;
    /// the first positive vote wins. The stream is rewound to its
    /// original position before returning. Records whose implementation
    /// cannot be bound are skipped.
    pub fn by_magic(&self, io: &mut dyn IoStream) -> Result<Option<&CodecRecord>> {
        let origin = io.tell()?;

        for record in &self.records {
            let codec = match record.instance() {
                Ok(codec) => codec,
                Err(err) => {
                    debug!(codec = %record.name, error = %err, "cannot bind codec, skipping");
                    continue;
                }
            };

            io.seek(SeekFrom::Start(origin))?;
            let vote = codec.probe(io);
            io.seek(SeekFrom::Start(origin))?;

            if matches!(vote, Ok(Some(_))) {
                return Ok(Some(record));
            }
        }

        Ok(None)
    }

    /// Drop every cached codec instance without invalidating metadata.
    /// Sessions started afterwards transparently rebind.
    pub fn unload_plugins(&self) {
        for record in &self.records {
            record.unload();
        }
        info!(codecs = self.records.len(), "unloaded codec instances");
    }
}
