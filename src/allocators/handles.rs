//! Generational handles for cached allocations.
//!
//! Every allocation the cache knows about lives in a slot. A handle is the
//! slot index plus the generation the slot had when the allocation was
//! stored; once the slot is vacated its generation moves on and every copy
//! of the old handle stops resolving.

/// Generation counter for handle validation.
type Generation = u32;

/// A stable handle to a cached allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocationHandle {
    index: u32,
    generation: Generation,
}

impl AllocationHandle {
    /// Create a dangling handle (for default initialization).
    pub const fn dangling() -> Self {
        Self {
            index: u32::MAX,
            generation: 0,
        }
    }

    /// Check if this is a dangling/invalid handle.
    pub fn is_dangling(&self) -> bool {
        self.index == u32::MAX
    }

    /// Get the raw index (for debugging).
    pub fn raw_index(&self) -> u32 {
        self.index
    }

    /// Get the generation (for debugging).
    pub fn raw_generation(&self) -> u32 {
        self.generation
    }
}

impl Default for AllocationHandle {
    fn default() -> Self {
        Self::dangling()
    }
}

/// Internal slot.
#[derive(Debug)]
struct Slot<T> {
    generation: Generation,
    value: Option<T>,
}

/// Slot storage addressed by [`AllocationHandle`].
#[derive(Debug)]
pub(crate) struct SlotArena<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    len: usize,
}

impl<T> SlotArena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Store a value, reusing a vacated slot when one exists.
    ///
    /// `build` receives the handle the value will be stored under.
    pub fn insert_with(&mut self, build: impl FnOnce(AllocationHandle) -> T) -> AllocationHandle {
        let handle = match self.free_list.pop() {
            Some(index) => AllocationHandle {
                index,
                generation: self.slots[index as usize].generation,
            },
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    value: None,
                });
                AllocationHandle {
                    index,
                    generation: 0,
                }
            }
        };

        self.slots[handle.index as usize].value = Some(build(handle));
        self.len += 1;
        handle
    }

    pub fn get(&self, handle: AllocationHandle) -> Option<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, handle: AllocationHandle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    #[cfg(test)]
    pub fn contains(&self, handle: AllocationHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Vacate a slot and advance its generation.
    pub fn remove(&mut self, handle: AllocationHandle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }

        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index);
        self.len -= 1;
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over occupied slots.
    pub fn iter(&self) -> impl Iterator<Item = (AllocationHandle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|value| {
                (
                    AllocationHandle {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    value,
                )
            })
        })
    }
}

impl<T> Default for SlotArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut arena = SlotArena::new();
        let a = arena.insert_with(|_| "a");
        let b = arena.insert_with(|_| "b");

        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_stale_handle_after_remove() {
        let mut arena = SlotArena::new();
        let a = arena.insert_with(|_| 1u32);
        assert_eq!(arena.remove(a), Some(1));
        assert!(!arena.contains(a));

        // Slot is reused with a new generation
        let b = arena.insert_with(|_| 2u32);
        assert_eq!(a.raw_index(), b.raw_index());
        assert_ne!(a.raw_generation(), b.raw_generation());
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.get(b), Some(&2));
        assert_eq!(arena.remove(a), None);
    }

    #[test]
    fn test_build_sees_own_handle() {
        let mut arena = SlotArena::new();
        let handle = arena.insert_with(|h| h);
        assert_eq!(arena.get(handle), Some(&handle));
    }

    #[test]
    fn test_dangling_handle() {
        let arena: SlotArena<u8> = SlotArena::new();
        let handle = AllocationHandle::default();
        assert!(handle.is_dangling());
        assert!(!arena.contains(handle));
    }

    #[test]
    fn test_iter_skips_vacant() {
        let mut arena = SlotArena::new();
        let a = arena.insert_with(|_| 10);
        let _b = arena.insert_with(|_| 20);
        arena.remove(a);

        let values: Vec<_> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![20]);
        assert!(!arena.is_empty());
    }
}
