//! # Reader Registry
//!
//! Active read snapshots, kept in a binary min-heap keyed by their captured
//! version. The writer consults the minimum to know which freed pages are
//! beyond the reach of every live snapshot; a reader removes itself in
//! O(log n) through its stable handle (the heap tracks slot positions in a
//! side map, since positions move as the heap sifts).

use hashbrown::HashMap;

/// Identifies a registered reader until it deregisters.
#[derive(Debug)]
pub struct ReaderHandle {
    id: u64,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    version: u64,
    id: u64,
}

/// Min-heap of active readers by captured version.
#[derive(Debug, Default)]
pub struct ReaderRegistry {
    heap: Vec<Slot>,
    pos: HashMap<u64, usize>,
    next_id: u64,
}

impl ReaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Smallest captured version among live readers.
    pub fn min_version(&self) -> Option<u64> {
        self.heap.first().map(|slot| slot.version)
    }

    pub fn register(&mut self, version: u64) -> ReaderHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.heap.push(Slot { version, id });
        self.pos.insert(id, self.heap.len() - 1);
        self.sift_up(self.heap.len() - 1);
        ReaderHandle { id }
    }

    pub fn deregister(&mut self, handle: ReaderHandle) {
        let Some(i) = self.pos.remove(&handle.id) else {
            return;
        };
        let last = self.heap.len() - 1;
        if i != last {
            self.swap(i, last);
        }
        self.heap.pop();
        if i < self.heap.len() {
            // the relocated slot may violate the heap in either direction
            let settled = self.sift_up(i);
            if settled == i {
                self.sift_down(i);
            }
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.pos.insert(self.heap[a].id, a);
        self.pos.insert(self.heap[b].id, b);
    }

    fn sift_up(&mut self, mut i: usize) -> usize {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.heap[i].version < self.heap[parent].version {
                self.swap(i, parent);
                i = parent;
            } else {
                break;
            }
        }
        i
    }

    fn sift_down(&mut self, mut i: usize) {
        loop {
            let left = 2 * i + 1;
            let right = 2 * i + 2;
            let mut smallest = i;
            if left < self.heap.len() && self.heap[left].version < self.heap[smallest].version {
                smallest = left;
            }
            if right < self.heap.len() && self.heap[right].version < self.heap[smallest].version {
                smallest = right;
            }
            if smallest == i {
                break;
            }
            self.swap(i, smallest);
            i = smallest;
        }
    }
}
