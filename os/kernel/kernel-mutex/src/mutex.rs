//! Mutex objects and the arena they live in.
//!
//! Mutexes are addressed by a [`MutexId`]: a slot index plus the generation
//! the slot had when the mutex was created. Deleting a mutex bumps the slot's
//! generation, so every copy of the old handle is recognisably stale and
//! fails with [`MutexError::InvalidObject`].

use crate::wait_queue::WaitQueue;
use crate::{MutexError, Priority, TaskId};
use alloc::vec::Vec;
use core::fmt;

/// Priority-inversion avoidance protocol, fixed at creation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Protocol {
    /// The holder inherits the priority of its most urgent waiter.
    Inheritance,
    /// The holder runs at the ceiling priority for as long as it holds the
    /// mutex. Tasks whose base priority is more urgent than the ceiling may
    /// not lock it.
    Ceiling(Priority),
}

impl Protocol {
    #[inline]
    #[must_use]
    pub const fn ceiling(self) -> Option<Priority> {
        match self {
            Self::Inheritance => None,
            Self::Ceiling(p) => Some(p),
        }
    }
}

/// Handle of a live (or formerly live) mutex.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MutexId {
    index: u32,
    generation: u32,
}

impl MutexId {
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for MutexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mutex#{}.{}", self.index, self.generation)
    }
}

/// Caller-owned storage for a mutex.
///
/// A slot remembers the mutex constructed into it, which lets
/// [`MutexKernel::create`](crate::MutexKernel::create) refuse to construct a
/// second mutex over a live one.
#[derive(Debug, Default)]
pub struct MutexSlot {
    id: Option<MutexId>,
}

impl MutexSlot {
    #[must_use]
    pub const fn new() -> Self {
        Self { id: None }
    }

    /// The mutex most recently constructed into this slot.
    ///
    /// The handle may be stale if the mutex has since been deleted.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> Option<MutexId> {
        self.id
    }

    pub(crate) const fn set(&mut self, id: MutexId) {
        self.id = Some(id);
    }
}

/// Kernel-side state of a single mutex.
#[derive(Debug)]
pub struct MutexObject {
    pub protocol: Protocol,
    pub holder: Option<TaskId>,
    pub lock_count: u32,
    pub wait_queue: WaitQueue,
    /// Other mutexes found on the same blocking cycle by the deadlock
    /// detector. Empty unless a deadlock was just reported.
    pub implicated: Vec<MutexId>,
}

impl MutexObject {
    const fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            holder: None,
            lock_count: 0,
            wait_queue: WaitQueue::new(),
            implicated: Vec::new(),
        }
    }

    /// Priority this mutex currently justifies for its holder.
    ///
    /// The ceiling (if any) applies unconditionally while the mutex is held;
    /// the most urgent waiter applies under both protocols so that a waiter
    /// boosted above a ceiling still propagates its urgency.
    pub fn justified_priority(&self) -> Option<Priority> {
        match (self.protocol.ceiling(), self.wait_queue.top_priority()) {
            (Some(c), Some(w)) => Some(c.most_urgent(w)),
            (c, w) => c.or(w),
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    object: Option<MutexObject>,
}

/// Storage for every mutex of one kernel instance.
#[derive(Debug, Default)]
pub struct MutexArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl MutexArena {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn insert(&mut self, protocol: Protocol) -> MutexId {
        let object = Some(MutexObject::new(protocol));
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.object = object;
            return MutexId {
                index,
                generation: slot.generation,
            };
        }

        let index = u32::try_from(self.slots.len()).expect("mutex arena exhausted");
        self.slots.push(Slot {
            generation: 0,
            object,
        });
        MutexId {
            index,
            generation: 0,
        }
    }

    /// Remove the mutex and invalidate every outstanding handle to it.
    pub fn remove(&mut self, id: MutexId) -> Option<MutexObject> {
        let slot = self.slot_mut(id)?;
        let object = slot.object.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        object
    }

    pub fn is_live(&self, id: MutexId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: MutexId) -> Option<&MutexObject> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.object.as_ref())
    }

    pub fn get_mut(&mut self, id: MutexId) -> Option<&mut MutexObject> {
        self.slot_mut(id).and_then(|slot| slot.object.as_mut())
    }

    /// Like [`MutexArena::get`], reporting stale handles as an error.
    pub fn live(&self, id: MutexId) -> Result<&MutexObject, MutexError> {
        self.get(id).ok_or(MutexError::InvalidObject)
    }

    /// Access to a mutex that the subsystem's own links point at.
    ///
    /// # Panics
    ///
    /// A dangling link is a broken invariant and halts the kernel.
    pub fn linked(&self, id: MutexId) -> &MutexObject {
        self.get(id)
            .unwrap_or_else(|| panic!("kernel-mutex: dangling link to {id}"))
    }

    /// Mutable counterpart of [`MutexArena::linked`].
    pub fn linked_mut(&mut self, id: MutexId) -> &mut MutexObject {
        self.get_mut(id)
            .unwrap_or_else(|| panic!("kernel-mutex: dangling link to {id}"))
    }

    pub fn ids(&self) -> impl Iterator<Item = MutexId> + '_ {
        self.slots.iter().enumerate().filter_map(|(idx, slot)| {
            slot.object.as_ref()?;
            Some(MutexId {
                index: u32::try_from(idx).ok()?,
                generation: slot.generation,
            })
        })
    }

    pub fn objects_mut(&mut self) -> impl Iterator<Item = &mut MutexObject> {
        self.slots.iter_mut().filter_map(|slot| slot.object.as_mut())
    }

    fn slot_mut(&mut self, id: MutexId) -> Option<&mut Slot> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation && slot.object.is_some())
    }
}
