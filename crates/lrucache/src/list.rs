//! Recency list: doubly-linked list stored in a slot vector
//!
//! Links are slot indices instead of pointers, so splicing a node out and
//! back in stays O(1) without aliasing. Freed slots are recycled through a
//! free list; each slot carries a generation that is bumped when its node is
//! freed, so handles to dead nodes never match the slot's next occupant.

/// Generational handle to a node in a [`RecencyList`]
///
/// Valid until the node is removed or the list is cleared. A stale handle
/// is rejected even after its slot has been reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    index: usize,
    generation: u32,
}

impl NodeHandle {
    /// Slot index backing this handle
    pub fn index(self) -> usize {
        self.index
    }

    /// Generation of the slot when the handle was issued
    pub fn generation(self) -> u32 {
        self.generation
    }
}

/// Node in the recency list
struct Node<T> {
    entry: T,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Doubly-linked list ordered by recency, most recent at the front
pub struct RecencyList<T> {
    nodes: Vec<Option<Node<T>>>,
    generations: Vec<u32>,
    head: Option<usize>,
    tail: Option<usize>,
    free_list: Vec<usize>,
    len: usize,
}

impl<T> Default for RecencyList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RecencyList<T> {
    /// Create an empty list
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty list with room for `capacity` nodes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            generations: Vec::with_capacity(capacity),
            head: None,
            tail: None,
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Insert an entry at the front and return its handle
    pub fn push_front(&mut self, entry: T) -> NodeHandle {
        let idx = self.alloc_node(entry);
        self.link_front(idx);
        self.len += 1;
        self.handle_at(idx)
    }

    /// Insert an entry at the back and return its handle
    pub fn push_back(&mut self, entry: T) -> NodeHandle {
        let idx = self.alloc_node(entry);

        if let Some(node) = &mut self.nodes[idx] {
            node.prev = self.tail;
            node.next = None;
        }

        match self.tail {
            Some(tail_idx) => {
                if let Some(tail) = &mut self.nodes[tail_idx] {
                    tail.next = Some(idx);
                }
            }
            None => {
                self.head = Some(idx);
            }
        }

        self.tail = Some(idx);
        self.len += 1;
        self.handle_at(idx)
    }

    /// Detach a node and return its entry
    ///
    /// Returns `None` if the list is empty or the handle is stale.
    pub fn remove(&mut self, handle: NodeHandle) -> Option<T> {
        if self.len == 0 || !self.contains(handle) {
            return None;
        }

        let idx = handle.index;
        self.unlink(idx);
        let node = self.nodes[idx].take()?;
        self.release_slot(idx);
        self.len -= 1;
        Some(node.entry)
    }

    /// Promote a node to the front
    pub fn move_to_front(&mut self, handle: NodeHandle) {
        let idx = handle.index;
        if self.head == Some(idx) || !self.contains(handle) {
            return;
        }

        self.unlink(idx);
        self.link_front(idx);
    }

    /// Handle of the most recently used node
    pub fn front(&self) -> Option<NodeHandle> {
        self.head.map(|idx| self.handle_at(idx))
    }

    /// Handle of the least recently used node
    pub fn back(&self) -> Option<NodeHandle> {
        self.tail.map(|idx| self.handle_at(idx))
    }

    /// Entry behind a handle
    pub fn get(&self, handle: NodeHandle) -> Option<&T> {
        if !self.contains(handle) {
            return None;
        }
        self.nodes[handle.index].as_ref().map(|node| &node.entry)
    }

    /// Mutable entry behind a handle
    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut T> {
        if !self.contains(handle) {
            return None;
        }
        self.nodes[handle.index].as_mut().map(|node| &mut node.entry)
    }

    /// Whether the handle refers to a live node of its own generation
    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.generations.get(handle.index) == Some(&handle.generation)
            && matches!(self.nodes.get(handle.index), Some(Some(_)))
    }

    /// Number of linked nodes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the list is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drop every node
    ///
    /// Slots are kept (and their generations bumped) so handles issued
    /// before the clear stay stale afterwards.
    pub fn clear(&mut self) {
        self.free_list.clear();
        for idx in (0..self.nodes.len()).rev() {
            if self.nodes[idx].take().is_some() {
                self.generations[idx] = self.generations[idx].wrapping_add(1);
            }
            self.free_list.push(idx);
        }
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    /// Iterate entries from most to least recently used
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            next: self.head,
            remaining: self.len,
        }
    }

    fn alloc_node(&mut self, entry: T) -> usize {
        let node = Node {
            entry,
            prev: None,
            next: None,
        };

        if let Some(idx) = self.free_list.pop() {
            self.nodes[idx] = Some(node);
            idx
        } else {
            self.nodes.push(Some(node));
            self.generations.push(0);
            self.nodes.len() - 1
        }
    }

    fn release_slot(&mut self, idx: usize) {
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.free_list.push(idx);
    }

    fn handle_at(&self, idx: usize) -> NodeHandle {
        NodeHandle {
            index: idx,
            generation: self.generations[idx],
        }
    }

    fn link_front(&mut self, idx: usize) {
        if let Some(node) = &mut self.nodes[idx] {
            node.prev = None;
            node.next = self.head;
        }

        if let Some(head_idx) = self.head {
            if let Some(head) = &mut self.nodes[head_idx] {
                head.prev = Some(idx);
            }
        }

        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = match &mut self.nodes[idx] {
            Some(node) => (node.prev.take(), node.next.take()),
            None => return,
        };

        match prev {
            Some(prev_idx) => {
                if let Some(prev_node) = &mut self.nodes[prev_idx] {
                    prev_node.next = next;
                }
            }
            None => {
                self.head = next;
            }
        }

        match next {
            Some(next_idx) => {
                if let Some(next_node) = &mut self.nodes[next_idx] {
                    next_node.prev = prev;
                }
            }
            None => {
                self.tail = prev;
            }
        }
    }

    /// Walk the links and panic on any broken invariant
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        let live = self.nodes.iter().filter(|slot| slot.is_some()).count();
        assert_eq!(live, self.len, "live slots disagree with len");
        assert_eq!(self.generations.len(), self.nodes.len());
        assert_eq!(
            live + self.free_list.len(),
            self.nodes.len(),
            "free list leaks slots"
        );

        if self.len == 0 {
            assert!(self.head.is_none() && self.tail.is_none());
            return;
        }

        let head = self.head.expect("non-empty list without head");
        assert!(self.nodes[head].as_ref().unwrap().prev.is_none());

        let mut prev = None;
        let mut cursor = Some(head);
        let mut steps = 0;
        while let Some(idx) = cursor {
            steps += 1;
            assert!(steps <= self.len, "cycle or stray node in list");
            let node = self.nodes[idx].as_ref().expect("link to freed slot");
            assert_eq!(node.prev, prev, "prev link mismatch at slot {}", idx);
            prev = Some(idx);
            cursor = node.next;
        }

        assert_eq!(steps, self.len);
        assert_eq!(self.tail, prev, "tail is not the last reachable node");
    }
}

/// Iterator over a [`RecencyList`], front to back
pub struct Iter<'a, T> {
    list: &'a RecencyList<T>,
    next: Option<usize>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.next?;
        let node = self.list.nodes[idx].as_ref()?;
        self.next = node.next;
        self.remaining -= 1;
        Some(&node.entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
