//! Generational arena for reference-counted runtime values.

use std::fmt;

use crate::value::{ObjectRef, Value};

/// Heap storage for runtime values with generational indices.
///
/// Values are stored in a Vec with generation tracking. When a value is
/// freed, its slot is reused but the generation is incremented, so stale
/// references are detected instead of aliasing the new occupant.
pub struct ObjectHeap {
    slots: Vec<HeapSlot>,
    free_list: Vec<u32>,
    live: usize,
}

struct HeapSlot {
    generation: u32,
    value: Option<Value>,
    ref_count: u32,
    immortal: bool,
}

impl ObjectHeap {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            live: 0,
        }
    }

    /// Allocate a value with a reference count of one.
    ///
    /// The returned reference is owned by the caller.
    pub fn allocate(&mut self, value: Value) -> ObjectRef {
        self.live += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            slot.ref_count = 1;
            slot.immortal = false;
            ObjectRef::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(HeapSlot {
                generation: 0,
                value: Some(value),
                ref_count: 1,
                immortal: false,
            });
            ObjectRef::new(index, 0)
        }
    }

    fn slot(&self, obj: ObjectRef) -> Option<&HeapSlot> {
        let slot = self.slots.get(obj.index as usize)?;
        (slot.generation == obj.generation && slot.value.is_some()).then_some(slot)
    }

    fn slot_mut(&mut self, obj: ObjectRef) -> Option<&mut HeapSlot> {
        let slot = self.slots.get_mut(obj.index as usize)?;
        (slot.generation == obj.generation && slot.value.is_some()).then_some(slot)
    }

    /// Whether `obj` refers to a live value.
    pub fn contains(&self, obj: ObjectRef) -> bool {
        self.slot(obj).is_some()
    }

    /// Get an immutable reference to a value.
    ///
    /// Returns None if the reference is stale.
    pub fn get(&self, obj: ObjectRef) -> Option<&Value> {
        self.slot(obj)?.value.as_ref()
    }

    /// Get a mutable reference to a value.
    pub fn get_mut(&mut self, obj: ObjectRef) -> Option<&mut Value> {
        self.slot_mut(obj)?.value.as_mut()
    }

    /// Exclude a value from reference counting; it is never freed.
    pub fn make_immortal(&mut self, obj: ObjectRef) -> bool {
        match self.slot_mut(obj) {
            Some(slot) => {
                slot.immortal = true;
                true
            }
            None => false,
        }
    }

    /// Increment reference count.
    pub fn add_ref(&mut self, obj: ObjectRef) -> bool {
        match self.slot_mut(obj) {
            Some(slot) => {
                if !slot.immortal {
                    slot.ref_count = slot.ref_count.saturating_add(1);
                }
                true
            }
            None => false,
        }
    }

    /// Decrement reference count, freeing the value when it reaches zero.
    ///
    /// Freeing a container releases every reference it owns. This runs on an
    /// explicit worklist so deeply nested values cannot overflow the stack.
    /// Returns the number of values freed.
    pub fn release(&mut self, obj: ObjectRef) -> usize {
        let mut freed = 0;
        let mut pending = vec![obj];

        while let Some(next) = pending.pop() {
            let Some(slot) = self.slot_mut(next) else {
                continue;
            };
            if slot.immortal {
                continue;
            }
            slot.ref_count = slot.ref_count.saturating_sub(1);
            if slot.ref_count > 0 {
                continue;
            }

            let value = slot.value.take();
            slot.generation = slot.generation.wrapping_add(1);
            self.free_list.push(next.index);
            self.live -= 1;
            freed += 1;

            if let Some(value) = value {
                pending.extend(value.into_children());
            }
        }

        freed
    }

    /// Get the reference count for a value.
    pub fn ref_count(&self, obj: ObjectRef) -> Option<u32> {
        self.slot(obj).map(|slot| slot.ref_count)
    }

    /// Number of values currently alive, immortal ones included.
    pub fn live_count(&self) -> usize {
        self.live
    }
}

impl Default for ObjectHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHeap")
            .field("slot_count", &self.slots.len())
            .field("free_count", &self.free_list.len())
            .field("live", &self.live)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_and_get() {
        let mut heap = ObjectHeap::new();
        let obj = heap.allocate(Value::Int(42));

        assert!(matches!(heap.get(obj), Some(Value::Int(42))));
        assert_eq!(heap.live_count(), 1);
    }

    #[test]
    fn get_mut_updates_value() {
        let mut heap = ObjectHeap::new();
        let obj = heap.allocate(Value::Int(42));

        if let Some(Value::Int(v)) = heap.get_mut(obj) {
            *v = 100;
        }

        assert!(matches!(heap.get(obj), Some(Value::Int(100))));
    }

    #[test]
    fn ref_counting() {
        let mut heap = ObjectHeap::new();
        let obj = heap.allocate(Value::Int(42));

        assert_eq!(heap.ref_count(obj), Some(1));

        heap.add_ref(obj);
        assert_eq!(heap.ref_count(obj), Some(2));

        assert_eq!(heap.release(obj), 0);
        assert_eq!(heap.ref_count(obj), Some(1));

        assert_eq!(heap.release(obj), 1);
        assert_eq!(heap.ref_count(obj), None);
        assert!(heap.get(obj).is_none());
        assert_eq!(heap.live_count(), 0);
    }

    #[test]
    fn generational_references() {
        let mut heap = ObjectHeap::new();
        let first = heap.allocate(Value::Int(42));
        heap.release(first);

        // Same slot, new generation
        let second = heap.allocate(Value::Int(100));
        assert_eq!(first.index, second.index);
        assert_ne!(first.generation, second.generation);

        assert!(matches!(heap.get(second), Some(Value::Int(100))));
        assert!(heap.get(first).is_none());
        assert!(!heap.add_ref(first));
    }

    #[test]
    fn stale_release_is_ignored() {
        let mut heap = ObjectHeap::new();
        let first = heap.allocate(Value::Int(1));
        heap.release(first);
        let second = heap.allocate(Value::Int(2));

        assert_eq!(heap.release(first), 0);
        assert_eq!(heap.ref_count(second), Some(1));
    }

    #[test]
    fn releasing_container_releases_children() {
        let mut heap = ObjectHeap::new();
        let a = heap.allocate(Value::Int(1));
        let b = heap.allocate(Value::Int(2));
        heap.add_ref(b);
        let list = heap.allocate(Value::List(vec![a, b]));

        assert_eq!(heap.release(list), 2);
        assert!(!heap.contains(a));
        assert_eq!(heap.ref_count(b), Some(1));
    }

    #[test]
    fn deep_nesting_does_not_recurse() {
        let mut heap = ObjectHeap::new();
        let mut inner = heap.allocate(Value::Int(0));
        for _ in 0..100_000 {
            inner = heap.allocate(Value::List(vec![inner]));
        }

        assert_eq!(heap.release(inner), 100_001);
        assert_eq!(heap.live_count(), 0);
    }

    #[test]
    fn immortal_values_survive_release() {
        let mut heap = ObjectHeap::new();
        let none = heap.allocate(Value::None);
        heap.make_immortal(none);

        heap.release(none);
        heap.release(none);
        assert!(heap.contains(none));
        assert_eq!(heap.ref_count(none), Some(1));
    }
}
