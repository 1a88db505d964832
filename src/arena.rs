//! Slot storage with generation-checked handles.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
enum Slot<T> {
    Occupied { generation: u32, value: T },
    Free { generation: u32, next_free: Option<u32> },
}

/// A handle stays valid until its entity is removed; a removed slot is
/// reused with a bumped generation, so stale handles never alias new
/// entities.
#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self { slots: Vec::new(), free_head: None, len: 0 }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { slots: Vec::with_capacity(capacity), free_head: None, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, value: T) -> Handle {
        self.len += 1;
        if let Some(index) = self.free_head {
            if let Slot::Free { generation, next_free } = self.slots[index as usize] {
                let generation = generation.wrapping_add(1);
                self.free_head = next_free;
                self.slots[index as usize] = Slot::Occupied { generation, value };
                return Handle { index, generation };
            }
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot::Occupied { generation: 0, value });
        Handle { index, generation: 0 }
    }

    #[cfg(test)]
    pub fn get(&self, handle: Handle) -> Option<&T> {
        match self.slots.get(handle.index as usize)? {
            Slot::Occupied { generation, value } if *generation == handle.generation => Some(value),
            _ => None,
        }
    }

    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        match slot {
            Slot::Occupied { generation, .. } if *generation == handle.generation => {}
            _ => return None,
        }
        let freed = Slot::Free { generation: handle.generation, next_free: self.free_head };
        let Slot::Occupied { value, .. } = std::mem::replace(slot, freed) else {
            return None;
        };
        self.free_head = Some(handle.index);
        self.len -= 1;
        Some(value)
    }

    /// Keeps the entities for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(Handle, &mut T) -> bool) {
        for index in 0..self.slots.len() {
            let handle = match &mut self.slots[index] {
                Slot::Occupied { generation, value } => {
                    let handle = Handle { index: index as u32, generation: *generation };
                    if keep(handle, value) {
                        continue;
                    }
                    handle
                }
                Slot::Free { .. } => continue,
            };
            self.remove(handle);
        }
    }

    /// Removes every entity. Slots are kept (and their generations bumped on
    /// reuse) so handles taken before the clear stay dead.
    pub fn clear(&mut self) {
        self.retain(|_, _| false);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| match slot {
            Slot::Occupied { generation, value } => {
                Some((Handle { index: index as u32, generation: *generation }, value))
            }
            Slot::Free { .. } => None,
        })
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.iter().map(|(_, value)| value)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut().filter_map(|slot| match slot {
            Slot::Occupied { value, .. } => Some(value),
            Slot::Free { .. } => None,
        })
    }
}
