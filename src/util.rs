use std::alloc::{Allocator, Layout};

/// Loads up to the first eight bytes of `buf` as a little-endian u64.
#[inline]
pub fn load_u64_le(buf: &[u8]) -> u64 {
    let len = buf.len().min(8);
    let mut data = 0u64;
    unsafe {
        std::ptr::copy_nonoverlapping(buf.as_ptr(), &mut data as *mut _ as *mut u8, len);
    }
    data.to_le()
}

/// Kinds of allocation initialization.
pub enum AllocationKind {
    /// Allocation should be zeroed.
    Zeroed,
    /// Allocation can be uninitialized.
    Uninitialized,
}

/// Allocates `count` number of elements of type T, using the `allocator`.
pub(crate) fn allocate<T, A: Allocator>(
    allocator: &A,
    count: usize,
    kind: AllocationKind,
) -> *mut T {
    let size = std::mem::size_of::<T>();
    let align = std::mem::align_of::<T>();

    // We unwrap here because we want to panic if we fail to get a valid layout
    let layout = Layout::from_size_align(size * count, align).unwrap();

    // Again, unwrap the allocation result. It should never fail to allocate.
    match kind {
        AllocationKind::Zeroed => allocator.allocate_zeroed(layout).unwrap().as_ptr() as *mut T,
        AllocationKind::Uninitialized => allocator.allocate(layout).unwrap().as_ptr() as *mut T,
    }
}

/// Deallocates `count` number of elements of type T, using the `allocator`.
pub(crate) fn deallocate<T, A: Allocator>(allocator: &A, ptr: *mut T, count: usize) {
    let size = std::mem::size_of::<T>();
    let align = std::mem::align_of::<T>();

    // We unwrap here because we want to panic if we fail to get a valid layout
    let layout = Layout::from_size_align(size * count, align).unwrap();

    let raw_ptr = ptr as *mut u8;
    let nonnull_ptr = std::ptr::NonNull::new(raw_ptr).unwrap();
    unsafe {
        allocator.deallocate(nonnull_ptr, layout);
    }
}

/// Allocates a raw byte buffer for `layout`, using the `allocator`. Key
/// buffers are dynamically sized, so their layout is built by the caller.
pub(crate) fn allocate_bytes<A: Allocator>(allocator: &A, layout: Layout) -> *mut u8 {
    // As above, allocation failure panics; that is the crate-wide policy.
    allocator.allocate(layout).unwrap().as_ptr() as *mut u8
}

/// Deallocates a raw byte buffer previously obtained from `allocate_bytes`
/// with the same `layout`.
pub(crate) fn deallocate_bytes<A: Allocator>(allocator: &A, ptr: *mut u8, layout: Layout) {
    let nonnull_ptr = std::ptr::NonNull::new(ptr).unwrap();
    unsafe {
        allocator.deallocate(nonnull_ptr, layout);
    }
}
