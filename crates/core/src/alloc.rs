#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_tree_sitter_allocator() {
    // Native builds use the system allocator tree-sitter links against.
}

/// Route tree-sitter's C allocations through Rust's global allocator.
///
/// The libc shims bundled into wasm32-unknown-unknown builds ship a minimal `malloc` that
/// corrupts memory once trees are freed from JS.
#[cfg(target_arch = "wasm32")]
pub fn ensure_tree_sitter_allocator() {
    use core::ffi::c_void;
    use core::ptr;
    use std::alloc::{Layout, alloc, dealloc};
    use std::sync::Once;

    const ALIGN: usize = 16;
    // The requested size is stored in front of every block; keep the payload aligned.
    const HEADER: usize = ALIGN;

    fn layout_for(size: usize) -> Option<Layout> {
        let total = size.checked_add(HEADER)?;
        Layout::from_size_align(total, ALIGN).ok()
    }

    unsafe extern "C" fn ts_malloc(size: usize) -> *mut c_void {
        if size == 0 {
            return ptr::null_mut();
        }
        let Some(layout) = layout_for(size) else {
            return ptr::null_mut();
        };
        // SAFETY: the layout has a non-zero size.
        let base = unsafe { alloc(layout) };
        if base.is_null() {
            return ptr::null_mut();
        }
        // SAFETY: `base` is valid for HEADER bytes and aligned for usize.
        unsafe {
            base.cast::<usize>().write(size);
            base.add(HEADER).cast()
        }
    }

    unsafe extern "C" fn ts_calloc(count: usize, size: usize) -> *mut c_void {
        let Some(total) = count.checked_mul(size) else {
            return ptr::null_mut();
        };
        let block = unsafe { ts_malloc(total) };
        if !block.is_null() {
            // SAFETY: `ts_malloc` returned a block of `total` bytes.
            unsafe { ptr::write_bytes(block.cast::<u8>(), 0, total) };
        }
        block
    }

    unsafe extern "C" fn ts_free(block: *mut c_void) {
        if block.is_null() {
            return;
        }
        // SAFETY: every non-null block was produced by `ts_malloc`.
        unsafe {
            let base = block.cast::<u8>().sub(HEADER);
            let size = base.cast::<usize>().read();
            if let Some(layout) = layout_for(size) {
                dealloc(base, layout);
            }
        }
    }

    unsafe extern "C" fn ts_realloc(block: *mut c_void, size: usize) -> *mut c_void {
        if block.is_null() {
            return unsafe { ts_malloc(size) };
        }
        if size == 0 {
            unsafe { ts_free(block) };
            return ptr::null_mut();
        }
        // SAFETY: `block` came from `ts_malloc`, so its header holds the old size.
        let old_size = unsafe { block.cast::<u8>().sub(HEADER).cast::<usize>().read() };
        let moved = unsafe { ts_malloc(size) };
        if moved.is_null() {
            return ptr::null_mut();
        }
        unsafe {
            ptr::copy_nonoverlapping(block.cast::<u8>(), moved.cast::<u8>(), old_size.min(size));
            ts_free(block);
        }
        moved
    }

    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        // SAFETY: runs once, before any parser allocates.
        unsafe {
            tree_sitter::set_allocator(
                Some(ts_malloc),
                Some(ts_calloc),
                Some(ts_realloc),
                Some(ts_free),
            );
        }
    });
}
