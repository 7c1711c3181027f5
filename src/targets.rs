//! The set of live write targets of one pass.
//!
//! One [`Writer`] per backing file, created on first use and kept until it is
//! finalized. Exactly one of them (or none) is active at a time; primitive
//! writes always go to the active one.

use std::collections::HashMap;

use crate::context::Context;
use crate::error::{Result, SerializerError};
use crate::io::Writer;
use crate::pointer::{FileId, Pointer};

/// Owns the writers of a pass and the active-target selector.
#[derive(Debug, Default)]
pub struct TargetPool {
    writers: HashMap<FileId, Writer>,
    active: Option<FileId>,
}

impl TargetPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// The active file.
    pub fn active(&self) -> Option<FileId> {
        self.active
    }

    /// Makes `file` the active target, opening its writer if needed.
    ///
    /// # Errors
    /// Returns `UnknownFile` if the file is not registered, or whatever the
    /// file reports while opening its writer.
    pub fn switch_to(&mut self, file: FileId, context: &mut Context) -> Result<()> {
        if !self.writers.contains_key(&file) {
            let backing = context
                .file_mut(file)
                .ok_or(SerializerError::UnknownFile(file))?;
            let writer = backing.create_writer()?;
            log::debug!(
                "opened write target '{}' ({} bytes, base 0x{:X})",
                backing.name(),
                writer.len(),
                writer.base_address()
            );
            self.writers.insert(file, writer);
        }
        self.active = Some(file);
        Ok(())
    }

    /// Clears the selector without touching any writer.
    pub fn deactivate(&mut self) {
        self.active = None;
    }

    /// The active writer.
    pub fn writer(&self) -> Option<&Writer> {
        self.writers.get(&self.active?)
    }

    /// The active writer, or `NoActiveTarget`.
    pub fn writer_mut(&mut self) -> Result<&mut Writer> {
        let file = self.active.ok_or(SerializerError::NoActiveTarget)?;
        self.writers
            .get_mut(&file)
            .ok_or(SerializerError::NoActiveTarget)
    }

    /// The writer of a specific file, active or not.
    pub fn get_mut(&mut self, file: FileId) -> Option<&mut Writer> {
        self.writers.get_mut(&file)
    }

    /// Pointer at the active writer's cursor.
    pub fn current_pointer(&self) -> Option<Pointer> {
        let file = self.active?;
        let writer = self.writers.get(&file)?;
        Some(Pointer::new(file, writer.base_address(), writer.position()))
    }

    /// Removes a writer without finalizing it.
    pub fn take(&mut self, file: FileId) -> Option<Writer> {
        if self.active == Some(file) {
            self.active = None;
        }
        self.writers.remove(&file)
    }

    /// Finalizes the target of one file. Returns `false` if it had none.
    ///
    /// # Errors
    /// Propagates the backing file's finalization error.
    pub fn dispose_file(&mut self, file: FileId, context: &mut Context) -> Result<bool> {
        let Some(writer) = self.take(file) else {
            return Ok(false);
        };
        Self::finalize(file, writer, context)?;
        Ok(true)
    }

    /// Finalizes every target. All targets are attempted; the first error is
    /// returned.
    ///
    /// # Errors
    /// Propagates the first finalization error.
    pub fn dispose_all(&mut self, context: &mut Context) -> Result<()> {
        self.active = None;
        let mut files: Vec<FileId> = self.writers.keys().copied().collect();
        files.sort();

        let mut first_error = None;
        for file in files {
            if let Some(writer) = self.writers.remove(&file)
                && let Err(e) = Self::finalize(file, writer, context)
            {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn finalize(file: FileId, writer: Writer, context: &mut Context) -> Result<()> {
        let Some(backing) = context.file_mut(file) else {
            log::warn!("dropping {} bytes written to unregistered {file}", writer.len());
            return Err(SerializerError::UnknownFile(file));
        };
        log::debug!(
            "finalizing write target '{}' ({} bytes)",
            backing.name(),
            writer.len()
        );
        backing.end_write(writer)
    }

    /// Iterates over the live writers in file order.
    pub fn iter(&self) -> impl Iterator<Item = (FileId, &Writer)> {
        let mut entries: Vec<(FileId, &Writer)> =
            self.writers.iter().map(|(id, w)| (*id, w)).collect();
        entries.sort_by_key(|(id, _)| *id);
        entries.into_iter()
    }

    /// Number of live writers.
    pub fn len(&self) -> usize {
        self.writers.len()
    }

    /// True if no writer is live.
    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::MemoryFile;
    use crate::primitive::Value;

    #[test]
    fn targets_are_created_lazily_and_finalized() -> Result<()> {
        let mut ctx = Context::default();
        let a = ctx.add_file(MemoryFile::new("a"));
        let b = ctx.add_file(MemoryFile::new("b"));
        let mut pool = TargetPool::new();
        assert!(pool.is_empty());

        pool.switch_to(a, &mut ctx)?;
        pool.writer_mut()?.write_value(Value::U8(1))?;
        pool.switch_to(b, &mut ctx)?;
        pool.writer_mut()?.write_value(Value::U8(2))?;
        assert_eq!(pool.len(), 2);

        assert!(pool.dispose_file(a, &mut ctx)?);
        assert!(!pool.dispose_file(a, &mut ctx)?);
        pool.dispose_all(&mut ctx)?;
        assert!(pool.is_empty());
        assert!(pool.active().is_none());

        assert_eq!(ctx.file_as::<MemoryFile>(a).map(MemoryFile::data), Some(&[1u8][..]));
        assert_eq!(ctx.file_as::<MemoryFile>(b).map(MemoryFile::data), Some(&[2u8][..]));
        Ok(())
    }

    #[test]
    fn targets_of_removed_files_fail_to_finalize() -> Result<()> {
        let mut ctx = Context::default();
        let a = ctx.add_file(MemoryFile::new("a"));
        let mut pool = TargetPool::new();
        pool.switch_to(a, &mut ctx)?;
        pool.writer_mut()?.write_value(Value::U8(1))?;

        ctx.remove_file(a);
        assert!(matches!(
            pool.dispose_file(a, &mut ctx),
            Err(SerializerError::UnknownFile(id)) if id == a
        ));
        assert!(pool.is_empty());
        Ok(())
    }

    #[test]
    fn writes_without_target_fail() {
        let mut pool = TargetPool::new();
        assert!(matches!(
            pool.writer_mut(),
            Err(SerializerError::NoActiveTarget)
        ));
    }
}
