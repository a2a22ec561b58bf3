//! LRU List Module
//!
//! Recency ordering for the LRU store: a doubly linked list threaded through an
//! arena of slots addressed by stable index.
//!
//! - Head = most recently used
//! - Tail = least recently used
//!
//! Every operation is O(1). Freed slots are recycled through a free list, so a
//! slot index stays valid for as long as its node is linked.

// == Node ==
#[derive(Debug)]
struct Node<K, T> {
    key: K,
    item: T,
    prev: Option<usize>,
    next: Option<usize>,
}

// == LRU List ==
/// Arena-backed doubly linked list keyed by slot index.
#[derive(Debug)]
pub struct LruList<K, T> {
    slots: Vec<Option<Node<K, T>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<K, T> Default for LruList<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> LruList<K, T> {
    // == Constructor ==
    /// Creates an empty list.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Creates an empty list with room for `capacity` nodes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            ..Self::new()
        }
    }

    // == Push Front ==
    /// Links a new node at the head and returns its slot index.
    pub fn push_front(&mut self, key: K, item: T) -> usize {
        let node = Node {
            key,
            item,
            prev: None,
            next: self.head,
        };

        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };

        if let Some(old_head) = self.head {
            if let Some(head) = self.slots[old_head].as_mut() {
                head.prev = Some(idx);
            }
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
        self.len += 1;
        idx
    }

    // == Move To Front ==
    /// Marks a node as most recently used: unlink then relink at head.
    pub fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) || self.slots.get(idx).map_or(true, Option::is_none) {
            return;
        }

        self.unlink(idx);

        if let Some(node) = self.slots[idx].as_mut() {
            node.prev = None;
            node.next = self.head;
        }
        if let Some(old_head) = self.head {
            if let Some(head) = self.slots[old_head].as_mut() {
                head.prev = Some(idx);
            }
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    // == Remove ==
    /// Unlinks a node and releases its slot.
    pub fn remove(&mut self, idx: usize) -> Option<(K, T)> {
        if self.slots.get(idx).map_or(true, Option::is_none) {
            return None;
        }

        self.unlink(idx);
        let node = self.slots[idx].take()?;
        self.free.push(idx);
        self.len -= 1;
        Some((node.key, node.item))
    }

    // == Pop Back ==
    /// Removes and returns the least recently used node.
    pub fn pop_back(&mut self) -> Option<(K, T)> {
        let tail = self.tail?;
        self.remove(tail)
    }

    /// Slot index of the least recently used node.
    pub fn tail(&self) -> Option<usize> {
        self.tail
    }

    /// Slot index of the most recently used node.
    pub fn head(&self) -> Option<usize> {
        self.head
    }

    /// Item stored in a slot.
    pub fn get(&self, idx: usize) -> Option<&T> {
        self.slots.get(idx)?.as_ref().map(|node| &node.item)
    }

    /// Mutable item stored in a slot.
    pub fn get_mut(&mut self, idx: usize) -> Option<&mut T> {
        self.slots.get_mut(idx)?.as_mut().map(|node| &mut node.item)
    }

    /// Key stored in a slot.
    pub fn key(&self, idx: usize) -> Option<&K> {
        self.slots.get(idx)?.as_ref().map(|node| &node.key)
    }

    /// Iterates `(key, item)` pairs from most to least recently used.
    pub fn iter(&self) -> Iter<'_, K, T> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    /// Removes every node, returning them head first.
    pub fn drain(&mut self) -> Vec<(K, T)> {
        let mut drained = Vec::with_capacity(self.len);
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            match self.slots[idx].take() {
                Some(node) => {
                    cursor = node.next;
                    drained.push((node.key, node.item));
                }
                None => break,
            }
        }
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
        drained
    }

    // == Length ==
    /// Number of linked nodes.
    pub fn len(&self) -> usize {
        self.len
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = match self.slots[idx].as_ref() {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(node) = self.slots[p].as_mut() {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.slots[n].as_mut() {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(node) = self.slots[idx].as_mut() {
            node.prev = None;
            node.next = None;
        }
    }
}

// == Iterator ==
/// Head-to-tail iterator over an [`LruList`].
pub struct Iter<'a, K, T> {
    list: &'a LruList<K, T>,
    cursor: Option<usize>,
}

impl<'a, K, T> Iterator for Iter<'a, K, T> {
    type Item = (&'a K, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cursor?;
        let node = self.list.slots.get(idx)?.as_ref()?;
        self.cursor = node.next;
        Some((&node.key, &node.item))
    }
}
