//! The write-direction engine.
//!
//! [`BinarySerializer`] implements [`SerializerObject`] by emitting bytes into
//! the target pool. It owns everything one write pass needs: the targets, the
//! ledger of shared objects already written, the stack of open encoded
//! regions and the diagnostic depth. A new pass needs a new engine.

use std::fmt;

use crate::checksum::{ChecksumCalculator, XorCalculator};
use crate::constants::POINTER_SIZE;
use crate::context::{Context, ContextId};
use crate::encoder::StreamEncoder;
use crate::error::{Result, SerializerError};
use crate::file::StreamFile;
use crate::graph::{ObjectId, Visit, WriteLedger};
use crate::inspector::{SerializationInspector, SerializationReport};
use crate::io::Writer;
use crate::pointer::{FileId, Pointer};
use crate::primitive::{Endian, PrimitiveKind, TextEncoding, Value};
use crate::serializable::Serializable;
use crate::serializer::{
    Action, BitValues, EncodedOptions, PointerOptions, PreSerialize, SerializerObject,
    display_name,
};
use crate::targets::TargetPool;

const HEX_LINE_WIDTH: usize = 16;
const HEX_MAX_LINES: usize = 10;

/// An encoded region opened with `begin_encoded` and not yet closed.
#[derive(Debug)]
struct EncodedState {
    file: FileId,
    parent: Pointer,
    encoder: Box<dyn StreamEncoder>,
}

/// Writes serializable objects into the files of a [`Context`].
///
/// Targets are finalized by [`dispose`](Self::dispose) or
/// [`dispose_file`](Self::dispose_file). Whatever is still open when the
/// engine is dropped is finalized then.
#[derive(Debug)]
pub struct BinarySerializer<'ctx> {
    context: &'ctx mut Context,
    targets: TargetPool,
    ledger: WriteLedger,
    encoded: Vec<EncodedState>,
    depth: usize,
    log_suppressed: bool,
}

impl<'ctx> BinarySerializer<'ctx> {
    /// Starts a write pass over `context`. No target is active yet.
    pub fn new(context: &'ctx mut Context) -> Self {
        Self {
            context,
            targets: TargetPool::new(),
            ledger: WriteLedger::new(),
            encoded: Vec::new(),
            depth: 0,
            log_suppressed: false,
        }
    }

    /// The context being written.
    pub fn context(&self) -> &Context {
        &*self.context
    }

    /// Number of shared objects written so far.
    pub fn written_objects(&self) -> usize {
        self.ledger.len()
    }

    /// Number of encoded regions opened with `begin_encoded` and not closed.
    pub fn open_regions(&self) -> usize {
        self.encoded.len()
    }

    /// Structural summary of the pass so far.
    pub fn report(&self) -> SerializationReport {
        SerializationInspector::inspect(self)
    }

    pub(crate) fn targets(&self) -> &TargetPool {
        &self.targets
    }

    /// Finalizes the target of one file. Returns `false` if the file had no
    /// target. A later write to the file starts over from its stored contents.
    ///
    /// # Errors
    /// Propagates the backing file's finalization error.
    pub fn dispose_file(&mut self, file: FileId) -> Result<bool> {
        self.targets.dispose_file(file, self.context)
    }

    /// Finalizes every target. Regions still open are discarded.
    ///
    /// # Errors
    /// Returns the first finalization error; every target is attempted.
    pub fn dispose(&mut self) -> Result<()> {
        for state in std::mem::take(&mut self.encoded) {
            log::warn!(
                "encoded region in {} was never closed; its contents are discarded",
                state.file
            );
            self.close_region(state.file);
        }
        self.targets.dispose_all(self.context)
    }

    fn log_enabled(&self) -> bool {
        !self.log_suppressed && self.context.is_log_enabled()
    }

    fn log_prefix(&self) -> String {
        let at = self
            .current_pointer()
            .map_or_else(|| "null".to_owned(), |p| p.to_string());
        format!("(W) {at}:{}", " ".repeat((self.depth + 1) * 2))
    }

    fn log_line(&mut self, body: fmt::Arguments<'_>) {
        if self.log_enabled() {
            let line = format!("{}{body}", self.log_prefix());
            self.context.write_log(&line);
        }
    }

    /// Runs `f` at `offset`, then returns to where the cursor was. The return
    /// trip happens on the error path too; the first error wins.
    fn at<R>(&mut self, offset: Pointer, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let saved = self.current_pointer();
        self.goto(Some(offset))?;
        let result = f(self);
        let restored = match saved {
            Some(saved) => self.goto(Some(saved)),
            None => {
                self.targets.deactivate();
                Ok(())
            }
        };
        let value = result?;
        restored?;
        Ok(value)
    }

    fn write_object(&mut self, object: &mut dyn Serializable, name: &str) -> Result<()> {
        let prefix = self.log_enabled().then(|| self.log_prefix());
        let collapse = !self.log_suppressed && object.is_short_log();
        if let Some(prefix) = &prefix
            && !collapse
        {
            let line = format!(
                "{prefix}(Object: {}) {}",
                object.type_name(),
                display_name(name)
            );
            self.context.write_log(&line);
        }
        if collapse {
            self.log_suppressed = true;
        }

        self.depth += 1;
        let start = self.current_pointer();
        let context = self.context.id();
        if object.state().context() != Some(context) {
            object.init(context, start);
        }
        let result = object.serialize_impl(self);
        self.depth -= 1;

        if collapse {
            self.log_suppressed = false;
            if let Some(prefix) = &prefix {
                let line = format!(
                    "{prefix}({}) {}: {}",
                    object.type_name(),
                    display_name(name),
                    object.short_log()
                );
                self.context.write_log(&line);
            }
        }
        result?;

        if let (Some(start), Some(end)) = (start, self.current_pointer())
            && let Some(size) = end.distance_from(&start)
        {
            object.state_mut().set_size(size);
        }
        Ok(())
    }

    fn write_resolving_pointer(
        &mut self,
        pointer: Option<Pointer>,
        target: Option<ObjectId>,
        options: PointerOptions,
        pre_serialize: Option<PreSerialize<'_>>,
    ) -> Result<()> {
        let raw = pointer_field(pointer, options.anchor, "Pointer")?;
        self.serialize_value(Value::U32(raw), "Pointer")?;
        if options.resolve
            && let (Some(at), Some(id)) = (pointer, target)
        {
            self.at(at, |this| this.serialize_shared(id, pre_serialize, "Value"))?;
        }
        Ok(())
    }

    /// Registers the virtual file of a new encoded region. Returns the file
    /// and the position the encoded bytes will be written to.
    fn open_region(
        &mut self,
        encoder_name: &str,
        options: EncodedOptions,
    ) -> Result<(FileId, Pointer)> {
        let parent = self
            .current_pointer()
            .ok_or(SerializerError::NoActiveTarget)?;
        let endian = match options.endian {
            Some(endian) => endian,
            None => self
                .context
                .file(parent.file())
                .map_or(self.context.settings().default_endianness, |f| {
                    f.endianness()
                }),
        };
        let key = match options.key {
            Some(key) if self.context.file_by_name(&key).is_some() => {
                return Err(SerializerError::UnsupportedFormat {
                    object: key,
                    message: "region key names a registered file".to_owned(),
                });
            }
            Some(key) => key,
            None => {
                let base = format!("{parent}_{encoder_name}");
                let mut key = base.clone();
                let mut n = 1;
                while self.context.file_by_name(&key).is_some() {
                    key = format!("{base}_{n}");
                    n += 1;
                }
                key
            }
        };
        let file = self.context.add_file(StreamFile::new(key, endian));
        Ok((file, parent))
    }

    /// Drops a region's virtual file and returns what was written into it.
    fn close_region(&mut self, file: FileId) -> Vec<u8> {
        let data = self
            .targets
            .take(file)
            .map(Writer::into_inner)
            .unwrap_or_default();
        self.context.remove_file(file);
        data
    }

    fn write_encoded(&mut self, encoder: &dyn StreamEncoder, buffer: &[u8]) -> Result<()> {
        let encoded = encoder.encode(buffer)?;
        log::debug!(
            "encoded region closed with {}: {} -> {} bytes",
            encoder.name(),
            buffer.len(),
            encoded.len()
        );
        self.targets.writer_mut()?.write_bytes(&encoded)
    }
}

/// The 4-byte value stored for a pointer field. Anchored offsets that lie
/// before their anchor wrap around as two's complement.
#[allow(clippy::cast_possible_truncation)]
fn pointer_field(pointer: Option<Pointer>, anchor: Option<Pointer>, name: &str) -> Result<u32> {
    let Some(pointer) = pointer else {
        return Ok(0);
    };
    let raw = pointer.serialized_offset(anchor.as_ref());
    if anchor.is_some() {
        return Ok(raw as u32);
    }
    u32::try_from(raw).map_err(|_| SerializerError::UnsupportedFormat {
        object: display_name(name).to_owned(),
        message: format!("pointer {pointer} does not fit in {POINTER_SIZE} bytes"),
    })
}

/// Hex rendering of a byte field: 16 bytes per line, continuation lines
/// indented by `indent`, at most 10 lines.
fn hex_dump(bytes: &[u8], indent: usize) -> String {
    let mut out = String::new();
    for (i, line) in bytes.chunks(HEX_LINE_WIDTH).enumerate() {
        if i == HEX_MAX_LINES {
            out.push_str(" ...");
            break;
        }
        if i > 0 {
            out.push('\n');
            out.push_str(&" ".repeat(indent));
        }
        let hex: Vec<String> = line.iter().map(|b| format!("{b:02X}")).collect();
        out.push_str(&hex.join(" "));
    }
    out
}

impl SerializerObject for BinarySerializer<'_> {
    fn context_id(&self) -> ContextId {
        self.context.id()
    }

    fn default_encoding(&self) -> TextEncoding {
        self.context.settings().default_encoding
    }

    fn current_pointer(&self) -> Option<Pointer> {
        self.targets.current_pointer()
    }

    fn current_length(&self) -> Option<u64> {
        self.targets.writer().map(Writer::len)
    }

    fn goto(&mut self, offset: Option<Pointer>) -> Result<()> {
        let Some(offset) = offset else {
            return Ok(());
        };
        if self.targets.active() != Some(offset.file()) {
            self.targets.switch_to(offset.file(), self.context)?;
        }
        self.targets.writer_mut()?.seek(offset.file_offset())
    }

    fn do_at(&mut self, offset: Option<Pointer>, action: Action<'_>) -> Result<()> {
        let Some(offset) = offset else {
            return Ok(());
        };
        self.at(offset, |this| action(this))
    }

    fn serialize_value(&mut self, value: Value, name: &str) -> Result<Value> {
        self.log_line(format_args!(
            "({}) {}: {value}",
            value.kind().name(),
            display_name(name)
        ));
        self.targets.writer_mut()?.write_value(value)?;
        Ok(value)
    }

    fn serialize_string(
        &mut self,
        text: &str,
        length: Option<usize>,
        encoding: Option<TextEncoding>,
        name: &str,
    ) -> Result<String> {
        self.log_line(format_args!("(string) {}: {text}", display_name(name)));
        let encoding = encoding.unwrap_or(self.context.settings().default_encoding);
        self.targets
            .writer_mut()?
            .write_string(text, length, encoding)?;
        Ok(text.to_owned())
    }

    fn serialize_bytes(&mut self, bytes: &mut Vec<u8>, count: usize, name: &str) -> Result<()> {
        bytes.resize(count, 0);
        if self.log_enabled() {
            let header = format!(
                "{}(u8[{count}]) {}: ",
                self.log_prefix(),
                display_name(name)
            );
            let line = format!("{header}{}", hex_dump(bytes, header.len()));
            self.context.write_log(&line);
        }
        self.targets.writer_mut()?.write_bytes(bytes)
    }

    fn serialize_object(&mut self, object: &mut dyn Serializable, name: &str) -> Result<()> {
        self.write_object(object, name)
    }

    fn serialize_shared(
        &mut self,
        id: ObjectId,
        pre_serialize: Option<PreSerialize<'_>>,
        name: &str,
    ) -> Result<()> {
        match self.ledger.visit(id) {
            Visit::Written | Visit::InProgress => {
                let size = self
                    .context
                    .objects()
                    .get_dyn(id)
                    .map_or(0, |object| object.size());
                if let Some(here) = self.current_pointer() {
                    self.goto(Some(here + size))?;
                }
                return Ok(());
            }
            Visit::Fresh => {}
        }

        let mut object = self
            .context
            .objects_mut()
            .take(id)
            .ok_or_else(|| SerializerError::Internal(format!("object {id} is not in the arena")))?;
        if let Some(pre_serialize) = pre_serialize {
            pre_serialize(object.as_mut());
        }

        self.ledger.begin(id);
        let result = self.write_object(object.as_mut(), name);
        self.context.objects_mut().restore(id, object);
        match result {
            Ok(()) => {
                self.ledger.finish(id);
                Ok(())
            }
            Err(e) => {
                self.ledger.abandon(id);
                Err(e)
            }
        }
    }

    fn serialize_pointer(
        &mut self,
        pointer: Option<Pointer>,
        anchor: Option<Pointer>,
        name: &str,
    ) -> Result<Option<Pointer>> {
        match pointer {
            Some(p) => self.log_line(format_args!("(Pointer) {}: {p}", display_name(name))),
            None => self.log_line(format_args!("(Pointer) {}: null", display_name(name))),
        }
        let raw = pointer_field(pointer, anchor, name)?;
        self.targets.writer_mut()?.write_value(Value::U32(raw))?;
        Ok(pointer)
    }

    fn serialize_resolving_pointer(
        &mut self,
        pointer: Option<Pointer>,
        target: Option<ObjectId>,
        options: PointerOptions,
        pre_serialize: Option<PreSerialize<'_>>,
        name: &str,
    ) -> Result<()> {
        let type_name = target
            .and_then(|id| self.context.objects().get_dyn(id))
            .map_or("?", |object| object.type_name());
        self.log_line(format_args!(
            "(Pointer<{type_name}>) {}",
            display_name(name)
        ));

        self.depth += 1;
        let result = self.write_resolving_pointer(pointer, target, options, pre_serialize);
        self.depth -= 1;
        result
    }

    #[allow(clippy::cast_possible_truncation)]
    fn serialize_bit_values(
        &mut self,
        kind: PrimitiveKind,
        fields: &mut dyn FnMut(&mut BitValues) -> Result<()>,
    ) -> Result<()> {
        // Rejects non-integer kinds before any field runs.
        Value::from_bits(kind, 0)?;

        let prefix = self.log_enabled().then(|| self.log_prefix());
        let mut bits = BitValues::new(kind.size() as u32 * 8, prefix.is_some());
        fields(&mut bits)?;

        if let Some(prefix) = prefix {
            for (name, value) in bits.take_entries() {
                let line = format!("{prefix}  ({}) {name}: {value}", kind.name());
                self.context.write_log(&line);
            }
        }
        let packed = Value::from_bits(kind, bits.packed())?;
        self.serialize_value(packed, "Value")?;
        Ok(())
    }

    fn begin_calculate_checksum(&mut self, calculator: Box<dyn ChecksumCalculator>) -> Result<()> {
        self.targets.writer_mut()?.begin_checksum(calculator);
        Ok(())
    }

    fn end_calculate_checksum(&mut self) -> Result<Option<u64>> {
        Ok(self.targets.writer_mut()?.end_checksum())
    }

    fn begin_xor(&mut self, calculator: Box<dyn XorCalculator>) -> Result<()> {
        self.targets.writer_mut()?.begin_xor(calculator);
        Ok(())
    }

    fn end_xor(&mut self) -> Result<Option<Box<dyn XorCalculator>>> {
        Ok(self.targets.writer_mut()?.end_xor())
    }

    fn get_xor(&self) -> Option<&dyn XorCalculator> {
        self.targets.writer()?.xor()
    }

    fn do_encoded(
        &mut self,
        encoder: &dyn StreamEncoder,
        options: EncodedOptions,
        action: Action<'_>,
    ) -> Result<()> {
        let (file, _) = self.open_region(encoder.name(), options)?;
        let result = self.at(Pointer::new(file, 0, 0), |this| action(this));
        let buffer = self.close_region(file);
        result?;
        self.write_encoded(encoder, &buffer)
    }

    fn begin_encoded(
        &mut self,
        encoder: Box<dyn StreamEncoder>,
        options: EncodedOptions,
    ) -> Result<Pointer> {
        let (file, parent) = self.open_region(encoder.name(), options)?;
        let start = Pointer::new(file, 0, 0);
        if let Err(e) = self.goto(Some(start)) {
            self.context.remove_file(file);
            return Err(e);
        }
        log::debug!("encoded region opened in {file} for {parent}");
        self.encoded.push(EncodedState {
            file,
            parent,
            encoder,
        });
        Ok(start)
    }

    fn end_encoded(&mut self, end: &Pointer) -> Result<()> {
        let Some(index) = self.encoded.iter().position(|s| s.file == end.file()) else {
            log::debug!("no open encoded region in {}; ignoring", end.file());
            return Ok(());
        };
        let state = self.encoded.remove(index);
        let buffer = self.close_region(state.file);
        self.goto(Some(state.parent))?;
        self.write_encoded(&*state.encoder, &buffer)
    }

    fn do_endian(&mut self, endian: Endian, action: Action<'_>) -> Result<()> {
        let file = self.targets.active().ok_or(SerializerError::NoActiveTarget)?;
        let previous = self.targets.writer_mut()?.endian();
        if previous == endian {
            return action(self);
        }

        self.targets.writer_mut()?.set_endian(endian);
        let result = action(self);
        if let Some(writer) = self.targets.get_mut(file) {
            writer.set_endian(previous);
        }
        result
    }

    fn log(&mut self, line: &str) {
        self.log_line(format_args!("{line}"));
    }

    fn is_log_enabled(&self) -> bool {
        self.log_enabled()
    }
}

impl Drop for BinarySerializer<'_> {
    fn drop(&mut self) {
        if self.targets.is_empty() && self.encoded.is_empty() {
            return;
        }
        log::debug!(
            "finalizing {} write targets left open by a dropped serializer",
            self.targets.len()
        );
        if let Err(e) = self.dispose() {
            log::warn!("failed to finalize write targets: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::MemoryFile;
    use crate::serializer::SerializerExt;

    #[test]
    fn hex_dump_wraps_and_truncates() {
        let bytes: Vec<u8> = (0..=255).collect();
        let dump = hex_dump(&bytes, 2);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), HEX_MAX_LINES);
        assert!(lines[0].starts_with("00 01 02"));
        assert!(lines[1].starts_with("  10 11"));
        assert!(dump.ends_with(" ..."));
    }

    #[test]
    fn pointers_that_do_not_fit_are_rejected() -> Result<()> {
        let mut ctx = Context::default();
        let file = ctx.add_file(MemoryFile::new("high").with_base_address(0x1_0000_0000));
        let far = ctx.file_pointer(file)?;
        assert!(matches!(
            pointer_field(Some(far), None, "p"),
            Err(SerializerError::UnsupportedFormat { .. })
        ));
        assert_eq!(pointer_field(Some(far), Some(far + 8), "p")?, 0xFFFF_FFF8);
        Ok(())
    }

    #[test]
    fn writes_need_a_target() {
        let mut ctx = Context::default();
        let mut s = ctx.serializer();
        assert!(matches!(
            s.serialize(1u8, "x"),
            Err(SerializerError::NoActiveTarget)
        ));
        assert!(s.current_pointer().is_none());
    }

    #[test]
    fn goto_switches_and_tracks_length() -> Result<()> {
        let mut ctx = Context::default();
        let a = ctx.add_file(MemoryFile::new("a").with_base_address(0x100));
        let b = ctx.add_file(MemoryFile::new("b"));
        let start_a = ctx.file_pointer(a)?;
        let start_b = ctx.file_pointer(b)?;

        let mut s = ctx.serializer();
        s.goto(Some(start_a))?;
        s.serialize(7u16, "x")?;
        assert_eq!(s.current_pointer().map(|p| p.absolute()), Some(0x102));
        s.goto(Some(start_b + 4))?;
        s.serialize(1u8, "y")?;
        assert_eq!(s.current_length(), Some(5));
        s.dispose()?;
        drop(s);

        assert_eq!(ctx.file_as::<MemoryFile>(a).map(MemoryFile::data), Some(&[7u8, 0][..]));
        assert_eq!(
            ctx.file_as::<MemoryFile>(b).map(MemoryFile::data),
            Some(&[0u8, 0, 0, 0, 1][..])
        );
        Ok(())
    }
}
