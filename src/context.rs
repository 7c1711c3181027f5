//! The environment a serialization pass runs in.
//!
//! A [`Context`] owns the registered backing files, the arena of shared
//! objects, the settings, and the optional diagnostics sink. Engines borrow it
//! mutably for the duration of one pass.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::binary_serializer::BinarySerializer;
use crate::error::{Result, SerializerError};
use crate::file::{BinaryFile, LinearFile};
use crate::graph::ObjectArena;
use crate::pointer::{FileId, Pointer};
use crate::primitive::{Endian, TextEncoding};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one context. Objects remember the id they were initialized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// User-tunable behaviour of a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    /// Encoding for string fields that do not name one.
    pub default_encoding: TextEncoding,
    /// Byte order assumed when no target is active.
    pub default_endianness: Endian,
    /// Emit diagnostic lines to the log sink.
    pub log_enabled: bool,
    /// Directory relative `LinearFile` paths are resolved against.
    pub base_path: PathBuf,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            default_encoding: TextEncoding::Utf8,
            default_endianness: Endian::Little,
            log_enabled: false,
            base_path: PathBuf::new(),
        }
    }
}

/// Receives diagnostic lines.
pub trait LogSink: fmt::Debug {
    /// Records one line.
    fn log(&mut self, line: &str);
}

/// Collects lines in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemoryLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the lines recorded so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

impl LogSink for MemoryLog {
    fn log(&mut self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(line.to_owned());
    }
}

/// Forwards lines to the `log` facade at trace level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogCrateSink;

impl LogSink for LogCrateSink {
    fn log(&mut self, line: &str) {
        log::trace!(target: "binser::trace", "{line}");
    }
}

/// Registered backing files, addressed by [`FileId`] and by name.
#[derive(Debug, Default)]
struct FileTable {
    files: Vec<Option<Box<dyn BinaryFile>>>,
    by_name: HashMap<String, FileId>,
}

/// Files, shared objects, settings and diagnostics of one format instance.
#[derive(Debug)]
pub struct Context {
    id: ContextId,
    settings: ContextSettings,
    files: FileTable,
    objects: ObjectArena,
    log: Option<Box<dyn LogSink>>,
}

impl Context {
    /// Creates a context with the given settings.
    pub fn new(settings: ContextSettings) -> Self {
        Self {
            id: ContextId::next(),
            settings,
            files: FileTable::default(),
            objects: ObjectArena::new(),
            log: None,
        }
    }

    /// Identity of this context.
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Current settings.
    pub fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    /// Mutable settings.
    pub fn settings_mut(&mut self) -> &mut ContextSettings {
        &mut self.settings
    }

    /// Registers a file. A file with the same name is replaced.
    pub fn add_file<F: BinaryFile>(&mut self, mut file: F) -> FileId {
        if let Some(linear) = file.as_any_mut().downcast_mut::<LinearFile>() {
            linear.resolve_against(&self.settings.base_path);
        }
        if let Some(previous) = self.files.by_name.get(file.name()).copied() {
            self.remove_file(previous);
        }
        let id = FileId::new(u32::try_from(self.files.files.len()).unwrap_or(u32::MAX));
        self.files.by_name.insert(file.name().to_owned(), id);
        self.files.files.push(Some(Box::new(file)));
        id
    }

    /// Unregisters a file and returns it.
    pub fn remove_file(&mut self, id: FileId) -> Option<Box<dyn BinaryFile>> {
        let file = self.files.files.get_mut(id.as_u32() as usize)?.take()?;
        if self.files.by_name.get(file.name()) == Some(&id) {
            self.files.by_name.remove(file.name());
        }
        Some(file)
    }

    /// Looks a file up by id.
    pub fn file(&self, id: FileId) -> Option<&dyn BinaryFile> {
        self.files.files.get(id.as_u32() as usize)?.as_deref()
    }

    /// Mutable lookup by id.
    pub fn file_mut(&mut self, id: FileId) -> Option<&mut dyn BinaryFile> {
        match self.files.files.get_mut(id.as_u32() as usize) {
            Some(Some(file)) => Some(file.as_mut()),
            _ => None,
        }
    }

    /// Typed lookup by id.
    pub fn file_as<F: BinaryFile>(&self, id: FileId) -> Option<&F> {
        self.file(id)?.as_any().downcast_ref::<F>()
    }

    /// Looks a file up by name.
    pub fn file_by_name(&self, name: &str) -> Option<FileId> {
        self.files.by_name.get(name).copied()
    }

    /// Pointer to the first byte of a file.
    ///
    /// # Errors
    /// Returns `UnknownFile` if `id` is not registered.
    pub fn file_pointer(&self, id: FileId) -> Result<Pointer> {
        let file = self.file(id).ok_or(SerializerError::UnknownFile(id))?;
        Ok(Pointer::new(id, file.base_address(), 0))
    }

    /// Shared objects of this context.
    pub fn objects(&self) -> &ObjectArena {
        &self.objects
    }

    /// Mutable access to the shared objects.
    pub fn objects_mut(&mut self) -> &mut ObjectArena {
        &mut self.objects
    }

    /// Installs a diagnostics sink.
    pub fn set_log(&mut self, sink: impl LogSink + 'static) {
        self.log = Some(Box::new(sink));
    }

    /// True when diagnostics are switched on and have somewhere to go.
    pub fn is_log_enabled(&self) -> bool {
        self.settings.log_enabled && self.log.is_some()
    }

    /// Sends a line to the sink if diagnostics are enabled.
    pub fn write_log(&mut self, line: &str) {
        if !self.settings.log_enabled {
            return;
        }
        if let Some(sink) = self.log.as_mut() {
            sink.log(line);
        }
    }

    /// Starts a write pass over this context.
    pub fn serializer(&mut self) -> BinarySerializer<'_> {
        BinarySerializer::new(self)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(ContextSettings::default())
    }
}
