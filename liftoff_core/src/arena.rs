// Copyright 2026 the Liftoff Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Slot storage behind the generational handles.
//!
//! Removed slots go on a free list and are reused; each reuse bumps the
//! slot's generation so handles to the previous occupant no longer resolve.

use alloc::vec::Vec;

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

#[derive(Debug)]
pub(crate) struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
        }
    }
}

impl<T> Arena<T> {
    /// Stores `value`, returning its `(index, generation)`.
    pub(crate) fn insert(&mut self, value: T) -> (u32, u32) {
        if let Some(idx) = self.free_list.pop() {
            let slot = &mut self.slots[idx as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.value = Some(value);
            return (idx, slot.generation);
        }
        let idx = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        (idx, 0)
    }

    pub(crate) fn get(&self, idx: u32, generation: u32) -> Option<&T> {
        self.slots
            .get(idx as usize)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub(crate) fn get_mut(&mut self, idx: u32, generation: u32) -> Option<&mut T> {
        self.slots
            .get_mut(idx as usize)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.value.as_mut())
    }

    pub(crate) fn remove(&mut self, idx: u32, generation: u32) -> Option<T> {
        let slot = self
            .slots
            .get_mut(idx as usize)
            .filter(|slot| slot.generation == generation)?;
        let value = slot.value.take()?;
        self.free_list.push(idx);
        Some(value)
    }

    /// Live entries with their `(index, generation)`.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (u32, u32, &T)> + '_ {
        self.slots.iter().zip(0_u32..).filter_map(|(slot, idx)| {
            slot.value.as_ref().map(|value| (idx, slot.generation, value))
        })
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (u32, u32, &mut T)> + '_ {
        self.slots.iter_mut().zip(0_u32..).filter_map(|(slot, idx)| {
            let generation = slot.generation;
            slot.value.as_mut().map(|value| (idx, generation, value))
        })
    }
}
