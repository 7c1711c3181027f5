// src/inspector.rs

//! Tools for inspecting a write pass while it runs.
//! Useful for checking which files a format touched and how far each got.

use serde::Serialize;

use crate::binary_serializer::BinarySerializer;
use crate::primitive::Endian;
use crate::serializer::SerializerObject;

/// A structural report of one write pass.
#[derive(Debug, Serialize)]
pub struct SerializationReport {
    /// Name of the file writes currently go to.
    pub active_file: Option<String>,
    /// Shared objects written so far.
    pub objects_written: usize,
    /// Encoded regions opened and not yet closed.
    pub open_regions: usize,
    /// Every live write target, in file order.
    pub targets: Vec<TargetInfo>,
}

/// Metadata for a single live target.
#[derive(Debug, Serialize)]
pub struct TargetInfo {
    /// Numeric file id.
    pub file: u32,
    /// File name; `None` if the file was unregistered meanwhile.
    pub name: Option<String>,
    /// Base address of the file.
    pub base_address: u64,
    /// Bytes in the target image.
    pub length: u64,
    /// Cursor position, relative to the start of the file.
    pub position: u64,
    /// Byte order currently in effect.
    pub endianness: Endian,
    /// Whether the file is an encoded region's buffer.
    pub is_virtual: bool,
}

/// The inspector tool.
#[derive(Debug)]
pub struct SerializationInspector;

impl SerializationInspector {
    /// Summarizes the state of `serializer`.
    pub fn inspect(serializer: &BinarySerializer<'_>) -> SerializationReport {
        let context = serializer.context();
        let targets = serializer
            .targets()
            .iter()
            .map(|(id, writer)| {
                let file = context.file(id);
                TargetInfo {
                    file: id.as_u32(),
                    name: file.map(|f| f.name().to_owned()),
                    base_address: writer.base_address(),
                    length: writer.len(),
                    position: writer.position(),
                    endianness: writer.endian(),
                    is_virtual: file.is_some_and(|f| f.is_virtual()),
                }
            })
            .collect();

        let active_file = serializer
            .current_pointer()
            .and_then(|p| context.file(p.file()))
            .map(|f| f.name().to_owned());

        SerializationReport {
            active_file,
            objects_written: serializer.written_objects(),
            open_regions: serializer.open_regions(),
            targets,
        }
    }
}

impl std::fmt::Display for SerializationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== BINSER WRITE REPORT ===")?;
        writeln!(
            f,
            "Active:         {}",
            self.active_file.as_deref().unwrap_or("-")
        )?;
        writeln!(f, "Objects:        {}", self.objects_written)?;
        writeln!(f, "Open regions:   {}", self.open_regions)?;
        writeln!(f, "\n[TARGETS]")?;
        for (i, target) in self.targets.iter().enumerate() {
            let connector = if i + 1 == self.targets.len() {
                "└── "
            } else {
                "├── "
            };
            writeln!(
                f,
                "{}{} @ 0x{:08X} | {}b | cursor {} | {}{}",
                connector,
                target.name.as_deref().unwrap_or("<removed>"),
                target.base_address,
                target.length,
                target.position,
                target.endianness,
                if target.is_virtual { " | virtual" } else { "" }
            )?;
        }
        Ok(())
    }
}
