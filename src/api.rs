use std::path::Path;

use crate::context::{Context, ContextSettings};
use crate::error::{Result, SerializerError};
use crate::file::{LinearFile, MemoryFile};
use crate::graph::ObjectId;
use crate::pointer::Pointer;
use crate::primitive::Endian;
use crate::serializable::Serializable;
use crate::serializer::SerializerObject;

/// One-call entry points for the common cases.
#[derive(Debug)]
pub struct Binser;

impl Binser {
    /// Writes `object` at `at` in one complete pass and finalizes every
    /// target it touched.
    ///
    /// # Arguments
    /// * `context`: Files and shared objects of the format.
    /// * `at`: Where the object starts.
    /// * `object`: The root structure.
    pub fn write<T: Serializable>(context: &mut Context, at: Pointer, object: &mut T) -> Result<()> {
        let mut s = context.serializer();
        s.goto(Some(at))?;
        s.serialize_object(object, "root")?;
        s.dispose()
    }

    /// Like [`write`](Self::write) for an object stored in the context's
    /// arena.
    pub fn write_shared(context: &mut Context, at: Pointer, id: ObjectId) -> Result<()> {
        let mut s = context.serializer();
        s.goto(Some(at))?;
        s.serialize_shared(id, None, "root")?;
        s.dispose()
    }

    /// Serializes `object` into a fresh in-memory file and returns its bytes.
    pub fn to_bytes<T: Serializable>(object: &mut T, endian: Endian) -> Result<Vec<u8>> {
        let mut context = Context::new(ContextSettings {
            default_endianness: endian,
            ..ContextSettings::default()
        });
        let file = context.add_file(MemoryFile::new("memory").with_endianness(endian));
        let start = context.file_pointer(file)?;
        Self::write(&mut context, start, object)?;

        context
            .file_as::<MemoryFile>(file)
            .map(|f| f.data().to_vec())
            .ok_or_else(|| SerializerError::Internal("in-memory file vanished".into()))
    }

    /// Serializes `object` to the start of the file at `path`. Bytes beyond
    /// the object's end are preserved.
    pub fn save<T, P>(path: P, object: &mut T, endian: Endian) -> Result<()>
    where
        T: Serializable,
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let mut context = Context::default();
        let name = path.to_string_lossy().into_owned();
        let file = context.add_file(LinearFile::new(name, path).with_endianness(endian));
        let start = context.file_pointer(file)?;
        Self::write(&mut context, start, object)
    }
}
