//! The contract a structure implements to take part in serialization.
//!
//! A structure describes itself once, in [`Serializable::serialize_impl`], by
//! issuing protocol calls against a [`SerializerObject`]. The same description
//! runs unchanged whether the engine behind the trait object is writing or
//! reading.
//!
//! ```rust
//! use binser::{ObjectState, Result, Serializable, SerializerExt, SerializerObject};
//!
//! #[derive(Debug, Default)]
//! struct Header {
//!     state: ObjectState,
//!     magic: u32,
//!     count: u16,
//! }
//!
//! impl Serializable for Header {
//!     fn serialize_impl(&mut self, s: &mut dyn SerializerObject) -> Result<()> {
//!         self.magic = s.serialize(self.magic, "magic")?;
//!         self.count = s.serialize(self.count, "count")?;
//!         Ok(())
//!     }
//!
//!     fn state(&self) -> &ObjectState {
//!         &self.state
//!     }
//!
//!     fn state_mut(&mut self) -> &mut ObjectState {
//!         &mut self.state
//!     }
//! }
//! ```

use std::any::Any;
use std::fmt;

use crate::context::ContextId;
use crate::error::Result;
use crate::pointer::Pointer;
use crate::serializer::SerializerObject;

/// Dynamic typing support for trait objects stored by the crate.
pub trait AsAny: Any {
    /// Upcast to `&dyn Any`.
    fn as_any(&self) -> &dyn Any;

    /// Upcast to `&mut dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Bookkeeping every serializable object carries: which context it belongs
/// to, where it was last placed, and how many bytes it occupied there.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectState {
    context: Option<ContextId>,
    offset: Option<Pointer>,
    size: u64,
}

impl ObjectState {
    /// A state not associated with any context.
    pub const fn new() -> Self {
        Self {
            context: None,
            offset: None,
            size: 0,
        }
    }

    /// The context the object was last initialized for.
    pub fn context(&self) -> Option<ContextId> {
        self.context
    }

    /// Where the object starts.
    pub fn offset(&self) -> Option<Pointer> {
        self.offset
    }

    /// Size in bytes of the object's last serialization.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Overrides the recorded size, for layouts whose size is known upfront.
    pub fn set_size(&mut self, size: u64) {
        self.size = size;
    }

    pub(crate) fn init(&mut self, context: ContextId, offset: Option<Pointer>) {
        self.context = Some(context);
        self.offset = offset;
    }
}

/// A structure that can describe its own binary layout.
pub trait Serializable: AsAny + fmt::Debug {
    /// Issues the protocol calls for every field, in layout order.
    ///
    /// # Errors
    /// Propagates whatever the engine reports.
    fn serialize_impl(&mut self, s: &mut dyn SerializerObject) -> Result<()>;

    /// The object's bookkeeping.
    fn state(&self) -> &ObjectState;

    /// Mutable access to the object's bookkeeping.
    fn state_mut(&mut self) -> &mut ObjectState;

    /// Whether diagnostics should collapse this object into one line.
    fn is_short_log(&self) -> bool {
        false
    }

    /// The one-line rendering used when [`is_short_log`](Self::is_short_log) is set.
    fn short_log(&self) -> String {
        String::new()
    }

    /// Type name shown in diagnostics.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Associates the object with `context` and a start address.
    fn init(&mut self, context: ContextId, offset: Option<Pointer>) {
        self.state_mut().init(context, offset);
    }

    /// Start address of the object, once initialized.
    fn offset(&self) -> Option<Pointer> {
        self.state().offset()
    }

    /// Size in bytes of the object, once serialized.
    fn size(&self) -> u64 {
        self.state().size()
    }
}
