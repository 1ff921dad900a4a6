use crate::histogram::Histogram;

const NIL: u32 = u32::MAX;

/// A resident register. Nodes live in an arena and link to each other by
/// arena id, so releasing the store is a single deallocation and list ids
/// stay valid across insertions.
#[derive(Clone, Copy, Debug)]
struct Node {
    index: u32,
    rank: u8,
    next: u32,
}

/// A pending write, unordered until the next flush.
#[derive(Clone, Copy, Debug)]
struct Entry {
    index: u32,
    rank: u8,
}

/// Sparse register storage: an ordered singly-linked list holding only the
/// non-zero registers, fed through a fixed-capacity insert buffer.
///
/// Writes land in the buffer in arrival order. A flush sorts the buffer by
/// register and splices it into the list in one forward pass, resuming from
/// the last touched node, so a flush costs one sort plus one walk rather
/// than a walk per write. The list is strictly ascending by register index
/// and never holds a rank-zero node; absent registers read as zero.
#[derive(Clone, Debug)]
pub(crate) struct SparseStore {
    nodes: Vec<Node>,
    head: u32,
    /// Arena id of the last node returned by a lookup. Ascending probes
    /// resume here instead of at the head.
    cursor: u32,
    buffer: Vec<Entry>,
    max_buffer_size: usize,
}

impl SparseStore {
    pub(crate) fn new(max_buffer_size: usize) -> Self {
        Self {
            nodes: Vec::new(),
            head: NIL,
            cursor: NIL,
            buffer: Vec::with_capacity(max_buffer_size),
            max_buffer_size,
        }
    }

    /// Number of registers resident in the list. Pending buffer entries do
    /// not count until they are flushed.
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn has_buffered(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Stages a register write. The value is reconciled against the list,
    /// and against any other pending write for the same register, at the
    /// next flush.
    pub(crate) fn set(&mut self, index: u32, rank: u8, histogram: &mut Histogram) {
        debug_assert!(rank > 0);

        if self.buffer.len() >= self.max_buffer_size {
            self.flush(histogram);
        }
        self.buffer.push(Entry { index, rank });
    }

    /// Reads a register, flushing first so the list is authoritative. The
    /// cursor moves to the matched node.
    pub(crate) fn get(&mut self, index: u32, histogram: &mut Histogram) -> u8 {
        if !self.buffer.is_empty() {
            self.flush(histogram);
        }

        let mut current = self.head;
        if self.cursor != NIL && self.nodes[self.cursor as usize].index <= index {
            current = self.cursor;
        }

        while current != NIL {
            let node = self.nodes[current as usize];
            if node.index > index {
                return 0;
            }
            if node.index == index {
                self.cursor = current;
                return node.rank;
            }
            current = node.next;
        }

        0
    }

    /// Drains the buffer into the list, keeping the histogram exact.
    ///
    /// The buffer is sorted by register then rank, so duplicate writes to a
    /// register arrive back to back with the largest last, and the splice
    /// position for each entry lies at or after the node touched by the
    /// previous one.
    pub(crate) fn flush(&mut self, histogram: &mut Histogram) {
        self.buffer.sort_unstable_by_key(|entry| (entry.index, entry.rank));

        let mut prev = NIL;

        for i in 0..self.buffer.len() {
            let entry = self.buffer[i];

            if self.head == NIL {
                self.head = self.insert(entry, NIL, histogram);
                prev = self.head;
                continue;
            }

            let mut current = if prev != NIL { prev } else { self.head };

            loop {
                let node = self.nodes[current as usize];

                // Raising an existing register.
                if node.index == entry.index {
                    if entry.rank > node.rank {
                        histogram.transfer(node.rank, entry.rank);
                        self.nodes[current as usize].rank = entry.rank;
                    }
                    prev = current;
                    break;
                }

                // A new head. Only reachable on the first probe of a walk
                // that started at the head: `prev` always sits at or below
                // every later entry in the sorted buffer.
                if node.index > entry.index {
                    self.head = self.insert(entry, current, histogram);
                    prev = self.head;
                    break;
                }

                // A new tail.
                if node.next == NIL {
                    let id = self.insert(entry, NIL, histogram);
                    self.nodes[current as usize].next = id;
                    prev = id;
                    break;
                }

                // Splicing between current and its successor.
                if self.nodes[node.next as usize].index > entry.index {
                    let id = self.insert(entry, node.next, histogram);
                    self.nodes[current as usize].next = id;
                    prev = id;
                    break;
                }

                current = node.next;
            }
        }

        self.buffer.clear();
    }

    fn insert(&mut self, entry: Entry, next: u32, histogram: &mut Histogram) -> u32 {
        histogram.transfer(0, entry.rank);

        let id = self.nodes.len() as u32;
        self.nodes.push(Node {
            index: entry.index,
            rank: entry.rank,
            next,
        });

        id
    }

    /// Resident `(index, rank)` pairs in ascending index order.
    pub(crate) fn entries(&self) -> ListIter<'_> {
        ListIter {
            current: self.head,
            store: self,
        }
    }

    /// Pending writes that have not been reconciled into the list, in
    /// arrival order.
    pub(crate) fn buffered(&self) -> impl Iterator<Item = (u32, u8)> + '_ {
        self.buffer.iter().map(|entry| (entry.index, entry.rank))
    }
}

pub(crate) struct ListIter<'a> {
    current: u32,
    store: &'a SparseStore,
}

impl Iterator for ListIter<'_> {
    type Item = (u32, u8);

    fn next(&mut self) -> Option<Self::Item> {
        if self.current == NIL {
            return None;
        }

        let node = self.store.nodes[self.current as usize];
        self.current = node.next;

        Some((node.index, node.rank))
    }
}
