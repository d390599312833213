//! Arena-backed circular doubly linked list used for recency tracking.
//!
//! Nodes live in a `Vec` and link to each other by index instead of by
//! pointer. Slot `0` is a permanent sentinel: the node right after it is the
//! most recently used entry, the node right before it is the least recently
//! used one. An empty list is the sentinel linked to itself.
//!
//! ```text
//!        ┌──────────────────────────────────────────────┐
//!        ▼                                              │
//!   [sentinel] ──next──▶ [MRU] ──▶ ... ──▶ [LRU] ──next─┘
//! ```
//!
//! Slots are never freed individually. A full cache overwrites its oldest
//! slot through [`List::replace`], so a list at steady state performs no
//! allocation.

/// Index of the sentinel node. Never holds a value.
pub(crate) const SENTINEL: usize = 0;

/// A slot in the arena.
struct Node<T> {
    /// `None` only for the sentinel.
    val: Option<T>,
    prev: usize,
    next: usize,
}

impl<T> Node<T> {
    fn detached(val: Option<T>) -> Self {
        Node {
            val,
            prev: SENTINEL,
            next: SENTINEL,
        }
    }
}

/// A circular doubly linked list with O(1) splice operations.
///
/// Every handle returned by [`push_front`](List::push_front) stays valid until
/// the list is [`clear`](List::clear)ed.
pub(crate) struct List<T> {
    nodes: Vec<Node<T>>,
    len: usize,
}

impl<T> List<T> {
    /// Creates an empty list with room for `cap` values before reallocating.
    pub(crate) fn with_capacity(cap: usize) -> Self {
        let mut nodes = Vec::with_capacity(cap.saturating_add(1));
        nodes.push(Node::detached(None));
        List {
            nodes,
            len: 0,
        }
    }

    /// Returns the number of values in the list.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the list holds no values.
    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts `val` at the most recently used end and returns its handle.
    pub(crate) fn push_front(&mut self, val: T) -> usize {
        self.nodes.push(Node::detached(Some(val)));
        let idx = self.nodes.len() - 1;
        self.attach(idx);
        self.len += 1;
        idx
    }

    /// Moves the node at `idx` to the most recently used end.
    pub(crate) fn move_to_front(&mut self, idx: usize) {
        debug_assert_ne!(idx, SENTINEL, "the sentinel cannot be reordered");
        if self.nodes[SENTINEL].next == idx {
            return;
        }
        self.detach(idx);
        self.attach(idx);
    }

    /// Returns the handle of the least recently used node.
    #[inline]
    pub(crate) fn back(&self) -> Option<usize> {
        if self.is_empty() {
            None
        } else {
            Some(self.nodes[SENTINEL].prev)
        }
    }

    /// Overwrites the value at `idx` in place and moves the node to the front.
    ///
    /// Returns the previous value. This is how a full cache recycles its
    /// oldest slot for a new entry.
    pub(crate) fn replace(&mut self, idx: usize, val: T) -> Option<T> {
        if idx == SENTINEL {
            return None;
        }
        let old = self.nodes.get_mut(idx)?.val.replace(val);
        self.move_to_front(idx);
        old
    }

    /// Returns the value at `idx`.
    #[inline]
    pub(crate) fn get(&self, idx: usize) -> Option<&T> {
        self.nodes.get(idx)?.val.as_ref()
    }

    /// Drops every value and resets the list to the bare sentinel.
    pub(crate) fn clear(&mut self) {
        self.nodes.truncate(1);
        self.nodes[SENTINEL].prev = SENTINEL;
        self.nodes[SENTINEL].next = SENTINEL;
        self.len = 0;
    }

    /// Iterates from the most recently used value to the least recently used.
    pub(crate) fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            cursor: SENTINEL,
            remaining: self.len,
        }
    }

    /// Links a detached node right after the sentinel.
    fn attach(&mut self, idx: usize) {
        let first = self.nodes[SENTINEL].next;
        self.nodes[idx].prev = SENTINEL;
        self.nodes[idx].next = first;
        self.nodes[first].prev = idx;
        self.nodes[SENTINEL].next = idx;
    }

    /// Splices a node out, joining its neighbours. Used before re-attaching.
    fn detach(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
        self.nodes[idx].prev = SENTINEL;
        self.nodes[idx].next = SENTINEL;
    }
}

impl<T> core::fmt::Debug for List<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("List")
            .field("len", &self.len)
            .field("slots", &self.nodes.len())
            .finish()
    }
}

/// Front-to-back iterator over a [`List`].
pub(crate) struct Iter<'a, T> {
    list: &'a List<T>,
    cursor: usize,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.remaining == 0 {
            return None;
        }
        self.cursor = self.list.nodes[self.cursor].next;
        self.remaining -= 1;
        self.list.nodes[self.cursor].val.as_ref()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents<T: Clone>(list: &List<T>) -> Vec<T> {
        list.iter().cloned().collect()
    }

    /// Walks the ring in both directions and checks it closes after `len + 1` hops.
    fn assert_ring<T>(list: &List<T>) {
        let mut idx = SENTINEL;
        for _ in 0..=list.len() {
            let next = list.nodes[idx].next;
            assert_eq!(list.nodes[next].prev, idx);
            idx = next;
        }
        assert_eq!(idx, SENTINEL);

        let mut idx = SENTINEL;
        for _ in 0..=list.len() {
            idx = list.nodes[idx].prev;
        }
        assert_eq!(idx, SENTINEL);
    }

    #[test]
    fn test_empty_list_is_self_linked() {
        let list = List::<u32>::with_capacity(4);
        assert!(list.is_empty());
        assert_eq!(list.back(), None);
        assert_eq!(list.nodes[SENTINEL].next, SENTINEL);
        assert_eq!(list.nodes[SENTINEL].prev, SENTINEL);
        assert_ring(&list);
    }

    #[test]
    fn test_push_front_orders_by_recency() {
        let mut list = List::with_capacity(3);
        let a = list.push_front(10);
        list.push_front(20);
        list.push_front(30);
        assert_eq!(list.len(), 3);
        assert_eq!(contents(&list), vec![30, 20, 10]);
        assert_eq!(list.back(), Some(a));
        assert_ring(&list);
    }

    #[test]
    fn test_move_to_front() {
        let mut list = List::with_capacity(3);
        let a = list.push_front("a");
        let b = list.push_front("b");
        list.push_front("c");

        list.move_to_front(a);
        assert_eq!(contents(&list), vec!["a", "c", "b"]);
        assert_eq!(list.back(), Some(b));

        // already at the front
        list.move_to_front(a);
        assert_eq!(contents(&list), vec!["a", "c", "b"]);
        assert_ring(&list);
    }

    #[test]
    fn test_replace_recycles_slot() {
        let mut list = List::with_capacity(2);
        list.push_front(1);
        list.push_front(2);
        let oldest = list.back().unwrap();

        assert_eq!(list.replace(oldest, 3), Some(1));
        assert_eq!(list.len(), 2);
        assert_eq!(contents(&list), vec![3, 2]);
        assert_eq!(list.get(oldest), Some(&3));
        assert_eq!(list.replace(SENTINEL, 9), None);
        assert_ring(&list);
    }

    #[test]
    fn test_clear_resets_to_sentinel() {
        let mut list = List::with_capacity(3);
        for i in 0..3 {
            list.push_front(i);
        }
        list.clear();
        assert!(list.is_empty());
        assert_eq!(list.back(), None);
        assert_eq!(list.iter().count(), 0);
        assert_ring(&list);

        list.push_front(7);
        assert_eq!(contents(&list), vec![7]);
    }

    #[test]
    fn test_single_element_is_front_and_back() {
        let mut list = List::with_capacity(1);
        let a = list.push_front(5);
        assert_eq!(list.back(), Some(a));
        assert_eq!(list.nodes[SENTINEL].next, a);
        assert_eq!(list.replace(a, 6), Some(5));
        assert_eq!(contents(&list), vec![6]);
        assert_ring(&list);
    }
}
