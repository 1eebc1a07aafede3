//! Generational slab that owns every timer record.

use core::fmt;

use crate::error::TimerError;

/// Opaque reference to a timer.
///
/// Handles are `Copy`; a handle to a deleted timer never aliases a newer one
/// because each slot carries a generation counter that changes on reuse.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle {
    index: u32,
    generation: u32,
}

impl TimerHandle {
    pub const fn from_raw(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub const fn index(self) -> u32 {
        self.index
    }

    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Packed form used in trace payloads.
    pub const fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}.{}", self.index, self.generation)
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

pub(crate) struct Registry<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
    capacity: usize,
}

impl<T> Registry<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
            capacity,
        }
    }

    pub(crate) fn insert(&mut self, value: T) -> Result<TimerHandle, TimerError> {
        if self.len >= self.capacity {
            return Err(TimerError::NoMemory(self.capacity));
        }

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    value: None,
                });
                (self.slots.len() - 1) as u32
            }
        };

        let slot = &mut self.slots[index as usize];
        slot.value = Some(value);
        self.len += 1;
        Ok(TimerHandle::from_raw(index, slot.generation))
    }

    pub(crate) fn get(&self, handle: TimerHandle) -> Option<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub(crate) fn get_mut(&mut self, handle: TimerHandle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    pub(crate) fn remove(&mut self, handle: TimerHandle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;
        Some(value)
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (TimerHandle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (TimerHandle::from_raw(index as u32, slot.generation), value))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_handle_is_rejected_after_reuse() {
        let mut registry = Registry::new(4);
        let first = registry.insert("a").unwrap();
        assert_eq!(registry.remove(first), Some("a"));

        let second = registry.insert("b").unwrap();
        assert_eq!(second.index(), first.index());
        assert_ne!(second.generation(), first.generation());
        assert!(registry.get(first).is_none());
        assert_eq!(registry.get(second), Some(&"b"));
        assert!(registry.remove(first).is_none());
    }

    #[test]
    fn capacity_limit_reports_no_memory() {
        let mut registry = Registry::new(2);
        registry.insert(1).unwrap();
        registry.insert(2).unwrap();

        let err = registry.insert(3).unwrap_err();
        assert!(matches!(err, TimerError::NoMemory(2)));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn iter_skips_free_slots() {
        let mut registry = Registry::new(8);
        let a = registry.insert('a').unwrap();
        let b = registry.insert('b').unwrap();
        let c = registry.insert('c').unwrap();
        registry.remove(b);

        let seen: Vec<_> = registry.iter().map(|(h, v)| (h, *v)).collect();
        assert_eq!(seen, vec![(a, 'a'), (c, 'c')]);
    }
}
