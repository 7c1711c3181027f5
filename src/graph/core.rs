use super::id::ObjectId;
use crate::serializable::Serializable;

/// The container for every shared object of a context.
///
/// Acts as an arena allocator: objects are boxed once and addressed by
/// [`ObjectId`] from then on. While the engine serializes an object it holds
/// it outside its slot, so the slot reads as empty for the duration.
#[derive(Debug, Default)]
pub struct ObjectArena {
    slots: Vec<Option<Box<dyn Serializable>>>,
}

impl ObjectArena {
    /// Creates a new, empty arena.
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Moves `object` into the arena and returns its handle.
    pub fn insert<T: Serializable>(&mut self, object: T) -> ObjectId {
        self.insert_boxed(Box::new(object))
    }

    /// Moves an already boxed object into the arena.
    pub fn insert_boxed(&mut self, object: Box<dyn Serializable>) -> ObjectId {
        let id = ObjectId::new(u32::try_from(self.slots.len()).unwrap_or(u32::MAX));
        self.slots.push(Some(object));
        id
    }

    /// Typed shared access. `None` if the id is unknown, the object is of
    /// another type, or it is currently being serialized.
    pub fn get<T: Serializable>(&self, id: ObjectId) -> Option<&T> {
        self.get_dyn(id)?.as_any().downcast_ref::<T>()
    }

    /// Typed exclusive access.
    pub fn get_mut<T: Serializable>(&mut self, id: ObjectId) -> Option<&mut T> {
        self.slots
            .get_mut(id.as_u32() as usize)?
            .as_deref_mut()?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    /// Untyped shared access.
    pub fn get_dyn(&self, id: ObjectId) -> Option<&dyn Serializable> {
        self.slots.get(id.as_u32() as usize)?.as_deref()
    }

    /// True if `id` was handed out by this arena.
    pub fn contains(&self, id: ObjectId) -> bool {
        (id.as_u32() as usize) < self.slots.len()
    }

    /// Returns the number of objects ever inserted.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if the arena holds no objects.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Takes an object out of its slot for serialization.
    pub(crate) fn take(&mut self, id: ObjectId) -> Option<Box<dyn Serializable>> {
        self.slots.get_mut(id.as_u32() as usize)?.take()
    }

    /// Puts an object taken with [`take`](Self::take) back.
    pub(crate) fn restore(&mut self, id: ObjectId, object: Box<dyn Serializable>) {
        if let Some(slot) = self.slots.get_mut(id.as_u32() as usize) {
            *slot = Some(object);
        }
    }
}
