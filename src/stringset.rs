//==----------------------------------------------------------- ------------==//
//                                  Hopset
//                      Copyright (c) 2022 Rob Clucas
//      This file is distributed under the APACHE License, Version 2.0.
//                         See LICENSE for details.
//==------------------------------------------------------------------------==//

//! Module for a single threaded set of short byte strings. Keys are stored
//! inline in a power-of-two bucket array addressed by the top bits of their
//! hash; a collision is displaced into one of the two neighboring buckets,
//! and anything beyond that overflows into a short chain hanging off the
//! home bucket. Lookups therefore touch at most three slots plus one chain.

use crate::setiter::{CursorMut, Iter};
use crate::slot::{free_key, key_alloc_size, key_bytes, new_key, LinkNode, Slot};
use crate::util::{allocate, deallocate, AllocationKind};
use crate::{make_hash, DefaultHash};
use std::alloc::{Allocator, Global};
use std::hash::{BuildHasher, BuildHasherDefault};

/// Storage for the set: a power-of-two array of one-word slots. The array is
/// allocated zeroed, which is the all-empty state.
struct Table {
    slots: *mut Slot,
    capacity_log: u32,
}

impl Table {
    const UNALLOCATED: Table = Table {
        slots: std::ptr::null_mut(),
        capacity_log: 0,
    };

    /// Allocates a zeroed table of `2^capacity_log` slots from `allocator`.
    fn alloc<A: Allocator>(allocator: &A, capacity_log: u32) -> Table {
        debug_assert!(capacity_log >= 1);
        let slots = allocate::<Slot, A>(
            allocator,
            1usize << capacity_log,
            AllocationKind::Zeroed,
        );
        Table {
            slots,
            capacity_log,
        }
    }

    fn dealloc<A: Allocator>(&mut self, allocator: &A) {
        if !self.slots.is_null() {
            deallocate::<Slot, A>(allocator, self.slots, 1usize << self.capacity_log);
            self.slots = std::ptr::null_mut();
        }
    }

    #[inline]
    fn is_allocated(&self) -> bool {
        !self.slots.is_null()
    }

    #[inline]
    fn bucket_count(&self) -> usize {
        if self.is_allocated() {
            1usize << self.capacity_log
        } else {
            0
        }
    }

    /// Home bucket for a hash: its top `capacity_log` bits. Using the top
    /// bits is what keeps the scan cursor stable across rehashes.
    #[inline]
    fn bucket_of(&self, hash: u64) -> u32 {
        debug_assert!(self.is_allocated());
        (hash >> (64 - self.capacity_log)) as u32
    }

    #[inline]
    fn slot(&self, bid: u32) -> Slot {
        debug_assert!((bid as usize) < self.bucket_count());
        unsafe { *self.slots.add(bid as usize) }
    }

    #[inline]
    fn slot_ptr(&self, bid: u32) -> *mut Slot {
        debug_assert!((bid as usize) < self.bucket_count());
        unsafe { self.slots.add(bid as usize) }
    }
}

/// A set of byte strings tuned for memory footprint and cache locality.
///
/// Each bucket is one machine word. Small working sets stay entirely inline:
/// a key whose home bucket is taken may sit in one of the two neighboring
/// buckets instead (marked displaced), and only when the whole neighborhood
/// is full does the home bucket grow a short overflow chain. The bucket
/// array doubles when the key count reaches the bucket count.
///
/// All storage - the bucket array, chain nodes and key buffers - comes from
/// the injected allocator, which defaults to [`Global`].
///
/// # Examples
///
/// ```
/// use hopset::StringSet;
///
/// let mut set = StringSet::new();
///
/// assert!(set.insert(b"tape"));
/// assert!(!set.insert(b"tape"));
/// assert!(set.contains(b"tape"));
/// assert!(set.remove(b"tape"));
/// assert!(set.is_empty());
/// ```
///
/// # Threading
///
/// This set is *not* thread-safe; it assumes a single logical owner, with
/// sharding done above it.
pub struct StringSet<H = BuildHasherDefault<DefaultHash>, A: Allocator = Global> {
    /// Bucket storage for the set.
    table: Table,
    /// The hasher for the set.
    hash_builder: H,
    /// Allocator for the table, chain nodes and key buffers.
    allocator: A,
    /// Number of keys stored.
    size: u32,
    /// Number of overflow chain nodes, excluding the bucket-slot heads.
    num_chain_entries: u32,
    /// Total bytes allocated for key buffers.
    obj_malloc_used: usize,
}

impl StringSet<BuildHasherDefault<DefaultHash>, Global> {
    /// Creates an empty set. No allocation happens until the first insert.
    pub fn new() -> Self {
        Self::with_capacity_and_hasher_in(0, Default::default(), Global)
    }

    /// Creates a set with room for `capacity` keys before it has to grow.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher_in(capacity, Default::default(), Global)
    }
}

impl<H: BuildHasher> StringSet<H, Global> {
    /// Creates an empty set which hashes with `hash_builder`.
    pub fn with_hasher(hash_builder: H) -> Self {
        Self::with_capacity_and_hasher_in(0, hash_builder, Global)
    }

    /// Creates a set with room for `capacity` keys, hashing with
    /// `hash_builder`.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: H) -> Self {
        Self::with_capacity_and_hasher_in(capacity, hash_builder, Global)
    }
}

impl<A: Allocator> StringSet<BuildHasherDefault<DefaultHash>, A> {
    /// Creates an empty set whose storage comes from `allocator`.
    pub fn new_in(allocator: A) -> Self {
        Self::with_capacity_and_hasher_in(0, Default::default(), allocator)
    }
}

impl<H: BuildHasher, A: Allocator> StringSet<H, A> {
    /// Log2 of the bucket count allocated by the first insert.
    const INITIAL_CAPACITY_LOG: u32 = 1;

    /// Upper bound on the table size; bucket ids must fit the scan cursor.
    const MAX_CAPACITY_LOG: u32 = 32;

    /// Creates a set with room for `capacity` keys, hashing with
    /// `hash_builder` and allocating from `allocator`.
    ///
    /// # Arguments
    ///
    /// * `capacity`     - Number of keys to hold before growing; 0 defers
    ///                    the table allocation to the first insert.
    /// * `hash_builder` - The builder to create a hasher with.
    /// * `allocator`    - Source of the table, chain node and key storage.
    pub fn with_capacity_and_hasher_in(capacity: usize, hash_builder: H, allocator: A) -> Self {
        let table = if capacity == 0 {
            Table::UNALLOCATED
        } else {
            Table::alloc(&allocator, Self::capacity_log_for(capacity))
        };

        StringSet {
            table,
            hash_builder,
            allocator,
            size: 0,
            num_chain_entries: 0,
            obj_malloc_used: 0,
        }
    }

    /// Number of keys in the set.
    pub fn len(&self) -> usize {
        self.size as usize
    }

    /// True if the set holds no keys.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Number of buckets in the table.
    pub fn bucket_count(&self) -> usize {
        self.table.bucket_count()
    }

    /// Number of overflow chain nodes, excluding the in-bucket heads.
    pub fn chain_count(&self) -> usize {
        self.num_chain_entries as usize
    }

    /// Exact bytes allocated for key buffers: each key costs its length plus
    /// a four byte length header.
    pub fn obj_bytes(&self) -> usize {
        self.obj_malloc_used
    }

    /// Bytes held by the container spine: the bucket array plus the chain
    /// nodes.
    pub fn container_bytes(&self) -> usize {
        self.table.bucket_count() * std::mem::size_of::<Slot>()
            + self.num_chain_entries as usize * std::mem::size_of::<LinkNode>()
    }

    /// Returns a reference to the set's hasher builder.
    pub fn hasher(&self) -> &H {
        &self.hash_builder
    }

    /// Returns a reference to the set's allocator.
    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Grows the table so at least `capacity` keys fit without another
    /// rehash. May allocate immediately; never shrinks.
    pub fn reserve(&mut self, capacity: usize) {
        let capacity_log = Self::capacity_log_for(capacity);
        if !self.table.is_allocated() || capacity_log > self.table.capacity_log {
            self.grow_to(capacity_log);
        }
    }

    /// Inserts `key` into the set, returning true iff it was not already
    /// present.
    pub fn insert(&mut self, key: &[u8]) -> bool {
        if !self.table.is_allocated() {
            self.table = Table::alloc(&self.allocator, Self::INITIAL_CAPACITY_LOG);
        }

        let hash = self.hash_of(key);
        let mut bid = self.table.bucket_of(hash);
        if self.find_around(key, bid) {
            return false;
        }

        // Double before placing so chains stay short; recompute the home
        // bucket since it is derived from the table size.
        if self.size as usize >= self.table.bucket_count() {
            self.grow_to(self.table.capacity_log + 1);
            bid = self.table.bucket_of(hash);
        }

        let ptr = new_key(&self.allocator, key);
        self.obj_malloc_used += unsafe { key_alloc_size(ptr) };
        self.size += 1;
        self.place(ptr, bid);
        true
    }

    /// True if `key` is in the set.
    pub fn contains(&self, key: &[u8]) -> bool {
        if !self.table.is_allocated() {
            return false;
        }
        let bid = self.table.bucket_of(self.hash_of(key));
        self.find_around(key, bid)
    }

    /// Removes `key` from the set, returning true iff it was present.
    pub fn remove(&mut self, key: &[u8]) -> bool {
        if !self.table.is_allocated() {
            return false;
        }
        let bid = self.table.bucket_of(self.hash_of(key));

        let home = self.table.slot(bid);
        if home.is_inline()
            && !home.is_displaced()
            && unsafe { key_bytes(home.key_ptr()) } == key
        {
            return self.clear_inline(bid);
        }
        if bid > 0 {
            let left = self.table.slot(bid - 1);
            if left.is_inline() && left.is_displaced() && unsafe { key_bytes(left.key_ptr()) } == key
            {
                return self.clear_inline(bid - 1);
            }
        }
        if (bid as usize + 1) < self.table.bucket_count() {
            let right = self.table.slot(bid + 1);
            if right.is_inline()
                && right.is_displaced()
                && unsafe { key_bytes(right.key_ptr()) } == key
            {
                return self.clear_inline(bid + 1);
            }
        }
        if home.is_link() {
            return self.unlink(bid, |_, bytes| bytes == key);
        }
        false
    }

    /// Returns an iterator over the keys. Each stored key is yielded exactly
    /// once, in no particular order.
    pub fn iter(&self) -> Iter<'_, H, A> {
        Iter::new(self)
    }

    /// Returns an erasing cursor positioned on the first key. See
    /// [`CursorMut`].
    pub fn cursor_mut(&mut self) -> CursorMut<'_, H, A> {
        CursorMut::new(self)
    }

    /// Keeps only the keys for which `f` returns true.
    pub fn retain<F: FnMut(&[u8]) -> bool>(&mut self, mut f: F) {
        let mut cursor = self.cursor_mut();
        while let Some(key) = cursor.key() {
            if f(key) {
                cursor.advance();
            } else {
                cursor.erase();
            }
        }
    }

    /// Resumable enumeration with the same guarantees as the redis SCAN
    /// family: every key present for the whole scan is yielded at least
    /// once, even if the table is rehashed between steps.
    ///
    /// A step emits the keys *homed* at one bucket (including displaced
    /// neighbors and the whole overflow chain) and returns the cursor for
    /// the next step. `cursor == 0` starts a scan and a returned 0 ends it.
    ///
    /// The cursor is the bucket id aligned to the top of the 32-bit word.
    /// Bucket ids are the top bits of the hash, so doubling the table splits
    /// bucket `b` into `2b` and `2b + 1` while halving would merge them, and
    /// a cursor taken before a rehash still denotes exactly the boundary of
    /// the covered key range afterwards. No bit-reversal is needed.
    pub fn scan<F: FnMut(&[u8])>(&self, cursor: u32, mut f: F) -> u32 {
        if !self.table.is_allocated() {
            return 0;
        }
        let shift = 32 - self.table.capacity_log;
        let bid = cursor >> shift;
        if (bid as usize) >= self.table.bucket_count() {
            return 0;
        }
        self.scan_bucket(bid, &mut f);
        // Wraps to 0 after the last bucket, which terminates the scan.
        (((bid as u64) + 1) << shift) as u32
    }

    /// Number of keys physically stored at bucket `bid`: 0 for an empty
    /// slot, 1 for an inline key, chain length plus terminal for a chain.
    pub fn bucket_depth(&self, bid: u32) -> u32 {
        assert!(
            (bid as usize) < self.table.bucket_count(),
            "bucket id out of range"
        );
        let slot = self.table.slot(bid);
        if slot.is_empty() {
            return 0;
        }
        if slot.is_inline() {
            return 1;
        }
        let mut depth = 1;
        let mut cur = slot;
        loop {
            let node = cur.node_ptr();
            depth += 1;
            let next = unsafe { (*node).next };
            if next.is_link() {
                cur = next;
            } else {
                return depth;
            }
        }
    }

    /// Checks every structural invariant of the set and panics on the first
    /// violation. Intended for tests; walks the whole table.
    #[doc(hidden)]
    pub fn validate(&self) {
        if !self.table.is_allocated() {
            assert_eq!(self.size, 0);
            assert_eq!(self.num_chain_entries, 0);
            assert_eq!(self.obj_malloc_used, 0);
            return;
        }

        let mut keys = 0usize;
        let mut nodes = 0usize;
        let mut bytes = 0usize;

        for i in 0..self.table.bucket_count() {
            let bid = i as u32;
            let slot = self.table.slot(bid);
            if slot.is_empty() {
                continue;
            }
            if slot.is_inline() {
                let ptr = slot.key_ptr();
                let key = unsafe { key_bytes(ptr) };
                let home = self.table.bucket_of(self.hash_of(key));
                if slot.is_displaced() {
                    assert!(
                        home as u64 == bid as u64 + 1 || (bid > 0 && home == bid - 1),
                        "displaced key at bucket {} homed at non-neighbor {}",
                        bid,
                        home
                    );
                } else {
                    assert_eq!(home, bid, "inline key resident off its home bucket");
                }
                assert!(
                    self.find_around(key, home),
                    "key not reachable from its neighborhood"
                );
                keys += 1;
                bytes += unsafe { key_alloc_size(ptr) };
                continue;
            }

            let mut cur = slot;
            loop {
                let node = cur.node_ptr();
                nodes += 1;
                unsafe {
                    let key_slot = (*node).key;
                    assert!(
                        key_slot.is_inline() && !key_slot.is_displaced(),
                        "chain node key must be a plain inline key"
                    );
                    let key = key_bytes(key_slot.key_ptr());
                    assert_eq!(
                        self.table.bucket_of(self.hash_of(key)),
                        bid,
                        "chain key off its home bucket"
                    );
                    assert!(self.find_around(key, bid));
                    keys += 1;
                    bytes += key_alloc_size(key_slot.key_ptr());

                    let next = (*node).next;
                    if next.is_link() {
                        cur = next;
                        continue;
                    }
                    assert!(!next.is_displaced(), "chain terminal must not be displaced");
                    let terminal = key_bytes(next.key_ptr());
                    assert_eq!(
                        self.table.bucket_of(self.hash_of(terminal)),
                        bid,
                        "chain terminal off its home bucket"
                    );
                    assert!(self.find_around(terminal, bid));
                    keys += 1;
                    bytes += key_alloc_size(next.key_ptr());
                    break;
                }
            }
        }

        assert_eq!(keys, self.size as usize, "stored keys disagree with size");
        assert_eq!(
            nodes, self.num_chain_entries as usize,
            "chain nodes disagree with counter"
        );
        assert_eq!(
            bytes, self.obj_malloc_used,
            "key bytes disagree with accounting"
        );
    }

    /// The key at ordinal `idx` within bucket `bid`: the inline key is
    /// ordinal 0, chain node keys come in link order, the chain terminal is
    /// last. Positions are re-resolved on every call, so erasures keep
    /// already-visited ordinals stable.
    pub(crate) fn key_at(&self, bid: u32, idx: u32) -> Option<&[u8]> {
        if (bid as usize) >= self.table.bucket_count() {
            return None;
        }
        let slot = self.table.slot(bid);
        if slot.is_empty() {
            return None;
        }
        if idx == 0 {
            return Some(unsafe { key_bytes(slot.any_key_ptr()) });
        }
        if slot.is_inline() {
            return None;
        }

        // Ordinals past the head live down the chain.
        let mut cur = unsafe { (*slot.node_ptr()).next };
        let mut ordinal = 1;
        loop {
            if !cur.is_link() {
                return if ordinal == idx {
                    Some(unsafe { key_bytes(cur.key_ptr()) })
                } else {
                    None
                };
            }
            let node = cur.node_ptr();
            if ordinal == idx {
                return Some(unsafe { key_bytes((*node).key.key_ptr()) });
            }
            ordinal += 1;
            cur = unsafe { (*node).next };
        }
    }

    /// Removes the key at `(bid, idx)`, with ordinals as in [`Self::key_at`].
    pub(crate) fn erase_at(&mut self, bid: u32, idx: u32) -> bool {
        if (bid as usize) >= self.table.bucket_count() {
            return false;
        }
        let slot = self.table.slot(bid);
        if slot.is_inline() {
            return idx == 0 && self.clear_inline(bid);
        }
        if slot.is_link() {
            return self.unlink(bid, |ordinal, _| ordinal == idx);
        }
        false
    }

    fn hash_of(&self, key: &[u8]) -> u64 {
        make_hash(&self.hash_builder, key)
    }

    /// Home bucket of an owned key buffer, under the current table size.
    fn home_of(&self, key: *const u8) -> u32 {
        let bytes = unsafe { key_bytes(key) };
        self.table.bucket_of(self.hash_of(bytes))
    }

    fn capacity_log_for(capacity: usize) -> u32 {
        let buckets = capacity
            .next_power_of_two()
            .max(1 << Self::INITIAL_CAPACITY_LOG);
        let capacity_log = buckets.trailing_zeros();
        assert!(
            capacity_log <= Self::MAX_CAPACITY_LOG,
            "requested capacity exceeds the 2^32 bucket limit"
        );
        capacity_log
    }

    /// Looks for `key` where a key homed at `bid` may legally live: the home
    /// slot if not displaced, a neighbor slot if displaced, then the home
    /// chain. Never consults more than the three neighborhood slots.
    fn find_around(&self, key: &[u8], bid: u32) -> bool {
        let home = self.table.slot(bid);
        if home.is_inline()
            && !home.is_displaced()
            && unsafe { key_bytes(home.key_ptr()) } == key
        {
            return true;
        }
        if bid > 0 {
            let left = self.table.slot(bid - 1);
            if left.is_inline() && left.is_displaced() && unsafe { key_bytes(left.key_ptr()) } == key
            {
                return true;
            }
        }
        if (bid as usize + 1) < self.table.bucket_count() {
            let right = self.table.slot(bid + 1);
            if right.is_inline()
                && right.is_displaced()
                && unsafe { key_bytes(right.key_ptr()) } == key
            {
                return true;
            }
        }
        if home.is_link() {
            let mut cur = home;
            loop {
                let node = cur.node_ptr();
                unsafe {
                    if key_bytes((*node).key.key_ptr()) == key {
                        return true;
                    }
                    let next = (*node).next;
                    if next.is_link() {
                        cur = next;
                        continue;
                    }
                    return key_bytes(next.key_ptr()) == key;
                }
            }
        }
        false
    }

    /// Empty slot usable for a key homed at `bid`: the home slot first, then
    /// the lower neighbor, then the higher one.
    fn find_empty_around(&self, bid: u32) -> Option<u32> {
        if self.table.slot(bid).is_empty() {
            return Some(bid);
        }
        if bid > 0 && self.table.slot(bid - 1).is_empty() {
            return Some(bid - 1);
        }
        if (bid as usize + 1) < self.table.bucket_count() && self.table.slot(bid + 1).is_empty() {
            return Some(bid + 1);
        }
        None
    }

    /// Places an owned key buffer homed at `bid`: inline in the neighborhood
    /// when a slot is free, otherwise onto the home chain.
    fn place(&mut self, key: *mut u8, bid: u32) {
        if let Some(target) = self.find_empty_around(bid) {
            unsafe {
                let slot_ptr = self.table.slot_ptr(target);
                *slot_ptr = Slot::inline(key);
                if target != bid {
                    (*slot_ptr).set_displaced();
                }
            }
            return;
        }
        self.link(key, bid);
    }

    /// Links an owned key homed at `bid` into the bucket, creating or
    /// growing the overflow chain. A displaced occupant of the home slot is
    /// evicted and re-linked at its own home; every eviction turns a
    /// displaced slot into a correctly-homed one, so the cascade terminates.
    fn link(&mut self, key: *mut u8, bid: u32) {
        let mut key = key;
        let mut bid = bid;
        loop {
            let slot_ptr = self.table.slot_ptr(bid);
            let slot = unsafe { *slot_ptr };

            if slot.is_empty() {
                unsafe { *slot_ptr = Slot::inline(key) };
                return;
            }
            if slot.is_link() || !slot.is_displaced() {
                // Prepend to the chain; a resident inline key is homed here
                // and becomes the chain terminal.
                let node = self.new_node(Slot::inline(key), slot);
                unsafe { *self.table.slot_ptr(bid) = Slot::link(node) };
                return;
            }

            let evicted = slot.key_ptr();
            unsafe { *slot_ptr = Slot::inline(key) };
            bid = self.home_of(evicted);
            key = evicted;
        }
    }

    /// Removes the first chain entry at `bid` accepted by `pred`, which sees
    /// each entry's ordinal within the bucket and its key bytes. Splices the
    /// owning node out and collapses a chain of one remaining key back into
    /// the bucket slot.
    fn unlink<F: FnMut(u32, &[u8]) -> bool>(&mut self, bid: u32, mut pred: F) -> bool {
        let mut link: *mut Slot = self.table.slot_ptr(bid);
        let mut ordinal = 0u32;
        unsafe {
            debug_assert!((*link).is_link());
            loop {
                let node = (*link).node_ptr();
                let node_key = (*node).key.key_ptr();
                if pred(ordinal, key_bytes(node_key)) {
                    *link = (*node).next;
                    self.free_node(node);
                    self.release_key(node_key);
                    return true;
                }
                ordinal += 1;

                let next = (*node).next;
                if next.is_link() {
                    link = &mut (*node).next;
                    continue;
                }

                let terminal = next.key_ptr();
                if pred(ordinal, key_bytes(terminal)) {
                    // The owner node's key becomes the new terminal in place.
                    *link = (*node).key;
                    self.free_node(node);
                    self.release_key(terminal);
                    return true;
                }
                return false;
            }
        }
    }

    /// Frees the inline key at `bid` and empties the slot.
    fn clear_inline(&mut self, bid: u32) -> bool {
        unsafe {
            let slot_ptr = self.table.slot_ptr(bid);
            let ptr = (*slot_ptr).key_ptr();
            (*slot_ptr).clear();
            self.release_key(ptr);
        }
        true
    }

    /// Releases an unlinked key buffer and updates the accounting.
    ///
    /// # Safety
    ///
    /// `key` must be live and no longer referenced by any slot.
    unsafe fn release_key(&mut self, key: *mut u8) {
        self.obj_malloc_used -= key_alloc_size(key);
        free_key(&self.allocator, key);
        self.size -= 1;
    }

    fn new_node(&mut self, key: Slot, next: Slot) -> *mut LinkNode {
        let node = allocate::<LinkNode, A>(&self.allocator, 1, AllocationKind::Uninitialized);
        unsafe { node.write(LinkNode { key, next }) };
        self.num_chain_entries += 1;
        node
    }

    fn free_node(&mut self, node: *mut LinkNode) {
        deallocate::<LinkNode, A>(&self.allocator, node, 1);
        self.num_chain_entries -= 1;
    }

    /// Moves the set into a table of `2^capacity_log` buckets, reinserting
    /// every key. Key buffers move by pointer; the chain spine is rebuilt
    /// and the old nodes are freed as their keys are placed.
    fn grow_to(&mut self, capacity_log: u32) {
        assert!(
            capacity_log <= Self::MAX_CAPACITY_LOG,
            "table exceeds the 2^32 bucket limit"
        );
        let mut old = std::mem::replace(
            &mut self.table,
            Table::alloc(&self.allocator, capacity_log),
        );
        if !old.is_allocated() {
            return;
        }
        debug_assert!(capacity_log > old.capacity_log);

        for i in 0..old.bucket_count() {
            let slot = old.slot(i as u32);
            if slot.is_empty() {
                continue;
            }
            if slot.is_inline() {
                let ptr = slot.key_ptr();
                let home = self.home_of(ptr);
                self.place(ptr, home);
                continue;
            }

            let mut cur = slot;
            loop {
                let node = cur.node_ptr();
                let (key_slot, next) = unsafe { ((*node).key, (*node).next) };
                self.free_node(node);

                let ptr = key_slot.key_ptr();
                let home = self.home_of(ptr);
                self.place(ptr, home);

                if next.is_link() {
                    cur = next;
                    continue;
                }
                let terminal = next.key_ptr();
                let home = self.home_of(terminal);
                self.place(terminal, home);
                break;
            }
        }

        old.dealloc(&self.allocator);
    }

    /// Emits every key homed at `bid`: the consistent inline slots of the
    /// neighborhood plus the whole home chain.
    fn scan_bucket<F: FnMut(&[u8])>(&self, bid: u32, f: &mut F) {
        let home = self.table.slot(bid);
        if home.is_inline() && !home.is_displaced() {
            f(unsafe { key_bytes(home.key_ptr()) });
        }
        if bid > 0 {
            let left = self.table.slot(bid - 1);
            if left.is_inline() && left.is_displaced() {
                let bytes = unsafe { key_bytes(left.key_ptr()) };
                if self.table.bucket_of(self.hash_of(bytes)) == bid {
                    f(bytes);
                }
            }
        }
        if (bid as usize + 1) < self.table.bucket_count() {
            let right = self.table.slot(bid + 1);
            if right.is_inline() && right.is_displaced() {
                let bytes = unsafe { key_bytes(right.key_ptr()) };
                if self.table.bucket_of(self.hash_of(bytes)) == bid {
                    f(bytes);
                }
            }
        }
        if home.is_link() {
            let mut cur = home;
            loop {
                let node = cur.node_ptr();
                unsafe {
                    f(key_bytes((*node).key.key_ptr()));
                    let next = (*node).next;
                    if next.is_link() {
                        cur = next;
                        continue;
                    }
                    f(key_bytes(next.key_ptr()));
                    return;
                }
            }
        }
    }
}

impl Default for StringSet {
    fn default() -> Self {
        Self::new()
    }
}

impl<H, A: Allocator> Drop for StringSet<H, A> {
    fn drop(&mut self) {
        if !self.table.is_allocated() {
            return;
        }
        for i in 0..self.table.bucket_count() {
            let slot = self.table.slot(i as u32);
            if slot.is_empty() {
                continue;
            }
            unsafe {
                if slot.is_inline() {
                    free_key(&self.allocator, slot.key_ptr());
                    continue;
                }
                let mut cur = slot;
                loop {
                    let node = cur.node_ptr();
                    let next = (*node).next;
                    free_key(&self.allocator, (*node).key.key_ptr());
                    deallocate::<LinkNode, A>(&self.allocator, node, 1);
                    if next.is_link() {
                        cur = next;
                        continue;
                    }
                    free_key(&self.allocator, next.key_ptr());
                    break;
                }
            }
        }
        self.table.dealloc(&self.allocator);
    }
}

// The set owns all of its heap data exclusively, and the shared-reference
// surface never mutates, so moving or sharing it across threads is sound
// even though the slots hold raw pointers.
unsafe impl<H: Send, A: Allocator + Send> Send for StringSet<H, A> {}
unsafe impl<H: Sync, A: Allocator + Sync> Sync for StringSet<H, A> {}
