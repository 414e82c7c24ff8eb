use tracing::trace;

use crate::object::{Obj, ObjRef, Object};

/// Slot arena owning every heap object.
///
/// Live objects are also threaded onto an intrusive singly-linked list
/// (`objects` -> `next` -> ...), newest first, which is what the sweep walks.
/// Handles stay valid when `slots` reallocates because they are indices.
pub struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    objects: Option<ObjRef>,
    bytes_allocated: usize,
    live: usize,
}

struct Slot {
    generation: u32,
    entry: Option<HeapEntry>,
}

struct HeapEntry {
    obj: Obj,
    is_marked: bool,
    next: Option<ObjRef>,
    size: usize,
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new()
    }
}

impl Heap {
    pub fn new() -> Heap {
        Heap {
            slots: Vec::new(),
            free: Vec::new(),
            objects: None,
            bytes_allocated: 0,
            live: 0,
        }
    }

    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    pub fn object_count(&self) -> usize {
        self.live
    }

    pub fn contains(&self, handle: ObjRef) -> bool {
        self.entry(handle).is_some()
    }

    pub fn get(&self, handle: ObjRef) -> Option<&Obj> {
        self.entry(handle).map(|e| &e.obj)
    }

    pub fn get_mut(&mut self, handle: ObjRef) -> Option<&mut Obj> {
        self.entry_mut(handle).map(|e| &mut e.obj)
    }

    pub fn as_a<T: Object>(&self, handle: ObjRef) -> Option<&T> {
        self.get(handle).and_then(Obj::as_a)
    }

    pub fn as_a_mut<T: Object>(&mut self, handle: ObjRef) -> Option<&mut T> {
        self.get_mut(handle).and_then(Obj::as_a_mut)
    }

    pub fn handles(&self) -> Handles<'_> {
        Handles {
            heap: self,
            cursor: self.objects,
        }
    }

    // Collection decisions belong to the caller; this only stores and counts.
    pub(crate) fn insert(&mut self, obj: Obj) -> ObjRef {
        let size = obj.size();
        let tag = obj.obj_type();
        let entry = HeapEntry {
            obj,
            is_marked: false,
            next: self.objects,
            size,
        };

        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entry = Some(entry);
                ObjRef {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                ObjRef {
                    index,
                    generation: 0,
                }
            }
        };

        self.objects = Some(handle);
        self.bytes_allocated += size;
        self.live += 1;

        trace!(target: "au3::gc", ?handle, size, ?tag, "allocate");
        handle
    }

    pub(crate) fn reaccount(&mut self, handle: ObjRef) {
        let entry = match self.entry_mut(handle) {
            Some(entry) => entry,
            None => return,
        };

        let old = entry.size;
        let new = entry.obj.size();
        entry.size = new;

        self.bytes_allocated = self.bytes_allocated - old + new;
    }

    /// Adjusts the counter for a buffer the VM owns outside any object, such
    /// as the globals or intern table arrays.
    pub(crate) fn charge(&mut self, old: usize, new: usize) {
        self.bytes_allocated = self.bytes_allocated - old + new;
    }

    pub fn is_marked(&self, handle: ObjRef) -> bool {
        self.entry(handle).map_or(false, |e| e.is_marked)
    }

    // True only the first time an object is marked in a cycle.
    pub(crate) fn mark(&mut self, handle: ObjRef) -> bool {
        match self.entry_mut(handle) {
            Some(entry) if !entry.is_marked => {
                entry.is_marked = true;
                true
            }
            _ => false,
        }
    }

    /// Walks the object list once, freeing every unmarked object and clearing
    /// the marks on the survivors. `on_free` sees each object just before it
    /// is dropped. Returns the number of objects freed.
    pub(crate) fn sweep(&mut self, mut on_free: impl FnMut(ObjRef, &Obj)) -> usize {
        let mut previous: Option<ObjRef> = None;
        let mut cursor = self.objects;
        let mut freed = 0;

        while let Some(handle) = cursor {
            let entry = self
                .entry_mut(handle)
                .expect("object list links to a freed slot");
            let next = entry.next;

            if entry.is_marked {
                entry.is_marked = false;
                previous = Some(handle);
            } else {
                match previous {
                    Some(prev) => {
                        self.entry_mut(prev)
                            .expect("object list links to a freed slot")
                            .next = next;
                    }
                    None => self.objects = next,
                }

                let entry = self.free_slot(handle);
                on_free(handle, &entry.obj);
                freed += 1;
            }

            cursor = next;
        }

        freed
    }

    fn free_slot(&mut self, handle: ObjRef) -> HeapEntry {
        let slot = &mut self.slots[handle.index as usize];
        let entry = slot
            .entry
            .take()
            .expect("freeing an object that is not live");
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);

        self.bytes_allocated -= entry.size;
        self.live -= 1;

        trace!(
            target: "au3::gc",
            ?handle,
            size = entry.size,
            tag = ?entry.obj.obj_type(),
            "free"
        );
        entry
    }

    fn entry(&self, handle: ObjRef) -> Option<&HeapEntry> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    fn entry_mut(&mut self, handle: ObjRef) -> Option<&mut HeapEntry> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entry.as_mut())
    }
}

pub struct Handles<'a> {
    heap: &'a Heap,
    cursor: Option<ObjRef>,
}

impl Iterator for Handles<'_> {
    type Item = ObjRef;

    fn next(&mut self) -> Option<ObjRef> {
        let handle = self.cursor?;
        self.cursor = self.heap.entry(handle).and_then(|e| e.next);
        Some(handle)
    }
}
