//! Fixed-capacity object pool.
//!
//! The pool is a slab of pre-constructed objects addressed by slot index.
//! `allocate` hands a registered object out by *moving* it from its slot
//! (checkout); `free` moves it back. Nothing on the hot path allocates:
//! capacity is fixed at construction and only changes through an explicit
//! [`ObjectPool::resize`].
//!
//! Shrinking never invalidates objects currently checked out. Slots past
//! the new active size are retired; a retired slot's object is released
//! when it is freed, and the slab is physically truncated once the last
//! retired slot comes back.

use tracing::trace;

/// Index of a pool slot. Stable for the lifetime of the slot's occupancy.
pub type SlotId = usize;

#[derive(Debug)]
struct Slot<T> {
    obj: Option<T>,
    in_use: bool,
}

/// Fixed-size slab of reusable objects with a free-list.
#[derive(Debug)]
pub struct ObjectPool<T> {
    slots: Vec<Slot<T>>,
    free: Vec<SlotId>,
    /// Slots below this index are allocatable; the rest are retired.
    active: usize,
    shrinking: bool,
    retired_in_use: usize,
}

impl<T> ObjectPool<T> {
    /// Creates a pool with `capacity` empty slots. Objects are bound to
    /// slots with [`ObjectPool::register`] during bootstrap.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "pool capacity must be > 0");
        let mut slots = Vec::with_capacity(capacity);
        let mut free = Vec::with_capacity(capacity);
        for id in 0..capacity {
            slots.push(Slot { obj: None, in_use: false });
            free.push(id);
        }
        // LIFO free-list: lowest ids come off the stack first.
        free.reverse();
        Self { slots, free, active: capacity, shrinking: false, retired_in_use: 0 }
    }

    /// Binds an externally constructed object to the next empty slot and
    /// returns its id. Returns `None` once every slot is occupied.
    pub fn register(&mut self, obj: T) -> Option<SlotId> {
        self.register_with(|_| obj)
    }

    /// Like [`ObjectPool::register`], but the object is constructed with
    /// its slot id, for objects that carry their own pool binding.
    pub fn register_with(&mut self, make: impl FnOnce(SlotId) -> T) -> Option<SlotId> {
        let id = self.slots.iter().position(|slot| slot.obj.is_none() && !slot.in_use)?;
        self.slots[id].obj = Some(make(id));
        Some(id)
    }

    /// Checks the next free registered object out of the pool.
    ///
    /// Returns `None` when the pool is exhausted or the next free slot has
    /// no registered object. Never allocates.
    pub fn allocate(&mut self) -> Option<(SlotId, T)> {
        let id = self.free.pop()?;
        debug_assert!(id < self.active, "free-list must not hold retired slots");
        let slot = &mut self.slots[id];
        match slot.obj.take() {
            Some(obj) => {
                slot.in_use = true;
                Some((id, obj))
            }
            None => {
                // Unregistered slot: put the id back, report exhaustion.
                self.free.push(id);
                None
            }
        }
    }

    /// Returns a checked-out object to its slot.
    ///
    /// Freeing a slot that is not in use is a programmer error: debug
    /// builds assert, release builds drop the object and leave the pool
    /// untouched.
    pub fn free(&mut self, id: SlotId, obj: T) {
        debug_assert!(id < self.slots.len(), "slot id {id} out of range");
        let Some(slot) = self.slots.get_mut(id) else {
            return;
        };
        debug_assert!(slot.in_use, "double free of slot {id}");
        if !slot.in_use {
            return;
        }
        slot.in_use = false;

        if id >= self.active {
            // Retired region: release the object, never re-enter the
            // free-list. Truncate once the last straggler is back.
            self.retired_in_use = self.retired_in_use.saturating_sub(1);
            if self.retired_in_use == 0 && self.shrinking {
                self.finalize_shrink();
            }
            return;
        }

        slot.obj = Some(obj);
        self.free.push(id);
    }

    /// Grows or shrinks the pool to `n` slots.
    ///
    /// Growth adds empty slots that become allocatable after registration.
    /// Shrink only affects future allocations; slots past `n` that are
    /// currently checked out stay valid until freed.
    pub fn resize(&mut self, n: usize) {
        assert!(n > 0, "pool capacity must be > 0");
        if n == self.active {
            return;
        }

        if n > self.slots.len() {
            trace!(from = self.active, to = n, "growing pool");
            for id in self.slots.len()..n {
                self.slots.push(Slot { obj: None, in_use: false });
                self.free.push(id);
            }
            self.active = n;
            self.shrinking = false;
            self.retired_in_use = 0;
            return;
        }

        trace!(from = self.active, to = n, "shrinking pool");
        self.active = n;
        self.free.retain(|&id| id < n);
        self.retired_in_use = self.slots[n..].iter().filter(|slot| slot.in_use).count();
        if self.retired_in_use == 0 {
            self.finalize_shrink();
        } else {
            self.shrinking = true;
        }
    }

    fn finalize_shrink(&mut self) {
        self.slots.truncate(self.active);
        self.free.clear();
        for (id, slot) in self.slots.iter().enumerate() {
            if !slot.in_use {
                self.free.push(id);
            }
        }
        self.free.reverse();
        self.shrinking = false;
    }

    /// Number of currently allocatable slots.
    pub fn capacity(&self) -> usize {
        self.active
    }

    /// Number of slots currently checked out.
    pub fn in_use(&self) -> usize {
        self.slots.iter().filter(|slot| slot.in_use).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered_pool(n: usize) -> ObjectPool<u32> {
        let mut pool = ObjectPool::new(n);
        for i in 0..n {
            pool.register(i as u32).unwrap();
        }
        pool
    }

    #[test]
    fn exhaustion_and_reuse() {
        let mut pool = registered_pool(4);

        let mut taken = Vec::new();
        for _ in 0..4 {
            taken.push(pool.allocate().unwrap());
        }
        let mut ids: Vec<_> = taken.iter().map(|(id, _)| *id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4, "allocated ids must be distinct");

        assert!(pool.allocate().is_none(), "exhausted pool must not grow");

        let (id, obj) = taken.pop().unwrap();
        pool.free(id, obj);
        let (reused, _) = pool.allocate().unwrap();
        assert_eq!(reused, id);
        assert!(pool.allocate().is_none());
    }

    #[test]
    fn allocate_without_registration_fails() {
        let mut pool: ObjectPool<u32> = ObjectPool::new(1);
        assert!(pool.allocate().is_none());
        pool.register(7).unwrap();
        let (_, obj) = pool.allocate().unwrap();
        assert_eq!(obj, 7);
    }

    #[test]
    fn register_stops_at_capacity() {
        let mut pool = ObjectPool::new(2);
        assert!(pool.register(0).is_some());
        assert!(pool.register(1).is_some());
        assert!(pool.register(2).is_none());
    }

    #[test]
    fn register_with_hands_out_the_slot_id() {
        let mut pool: ObjectPool<usize> = ObjectPool::new(3);
        for expected in 0..3 {
            assert_eq!(pool.register_with(|slot| slot).unwrap(), expected);
        }
        // Every checkout hands back the object built for that slot.
        for _ in 0..3 {
            let (id, obj) = pool.allocate().unwrap();
            assert_eq!(id, obj);
        }
    }

    #[test]
    fn grow_then_register_extends_capacity() {
        let mut pool = registered_pool(2);
        pool.resize(4);
        assert_eq!(pool.capacity(), 4);
        pool.register(42).unwrap();
        pool.register(43).unwrap();
        for _ in 0..4 {
            assert!(pool.allocate().is_some());
        }
        assert!(pool.allocate().is_none());
    }

    #[test]
    fn shrink_defers_until_retired_slots_return() {
        let mut pool = registered_pool(4);
        let mut taken = Vec::new();
        for _ in 0..4 {
            taken.push(pool.allocate().unwrap());
        }

        pool.resize(2);
        assert_eq!(pool.capacity(), 2);
        assert!(pool.allocate().is_none());

        // Freeing retired slots releases them without re-entering the
        // free-list.
        while let Some((id, obj)) = taken.pop() {
            pool.free(id, obj);
        }
        assert_eq!(pool.capacity(), 2);
        assert!(pool.allocate().is_some());
        assert!(pool.allocate().is_some());
        assert!(pool.allocate().is_none());
    }

    #[test]
    fn shrink_with_no_outstanding_slots_is_immediate() {
        let mut pool = registered_pool(4);
        pool.resize(2);
        assert_eq!(pool.capacity(), 2);
        assert!(pool.allocate().is_some());
        assert!(pool.allocate().is_some());
        assert!(pool.allocate().is_none());
    }
}
