use std::{alloc, mem, ptr};

use crate::{
    device::{HostAccessible, Space, SpaceId},
    error::fatal,
    kernel::Kernel,
    shape::for_each_index,
    DType, Shape, TensorSpan,
};

mod threads;

pub use threads::launch_threads;

pub(crate) fn allocate<T>(count: usize) -> *mut T {
    if count == 0 || mem::size_of::<T>() == 0 {
        return ptr::null_mut();
    }
    let Ok(layout) = alloc::Layout::array::<T>(count) else {
        fatal(format_args!("host allocate failed: {count} elements overflow"))
    };
    // Zeroed so that unspecified contents are still valid numbers.
    let ptr = unsafe { alloc::alloc_zeroed(layout) } as *mut T;
    if ptr.is_null() {
        log::error!("host allocate failed for {} bytes", layout.size());
        alloc::handle_alloc_error(layout);
    }
    log::trace!("host allocate {count} elements at {ptr:p}");
    ptr
}

/// # Safety
/// `ptr` must come from [`allocate`] with the same `count`.
pub(crate) unsafe fn deallocate<T>(ptr: *mut T, count: usize) {
    if ptr.is_null() || count == 0 || mem::size_of::<T>() == 0 {
        return;
    }
    if let Ok(layout) = alloc::Layout::array::<T>(count) {
        log::trace!("host deallocate {count} elements at {ptr:p}");
        alloc::dealloc(ptr as *mut u8, layout);
    }
}

impl Space for crate::Host {
    const HOST_MEMORY: bool = true;

    fn id() -> SpaceId {
        SpaceId::Host
    }

    fn allocate<T: DType>(count: usize) -> *mut T {
        allocate(count)
    }

    unsafe fn deallocate<T: DType>(ptr: *mut T, count: usize) {
        deallocate(ptr, count)
    }

    unsafe fn copy_to_host<T: DType>(src: *const T, dst: *mut T, count: usize) {
        ptr::copy(src, dst, count)
    }

    unsafe fn copy_from_host<T: DType>(src: *const T, dst: *mut T, count: usize) {
        ptr::copy(src, dst, count)
    }

    unsafe fn copy_within<T: DType>(src: *const T, dst: *mut T, count: usize) {
        ptr::copy(src, dst, count)
    }

    fn synchronize() {}

    fn launch<K: Kernel<N>, const N: usize>(dst: TensorSpan<K::Elem, N, Self>, src: K) {
        log::trace!("host launch over {}", dst.shape());
        for_each_index(dst.shape(), |idx| {
            // SAFETY: `idx` is inside `dst`'s shape and host memory is readable here.
            unsafe { dst.write(idx, src.at(idx)) }
        });
    }
}

impl HostAccessible for crate::Host {}

/// Run `f` for every index of `shape` on the calling thread, dimension 0 innermost.
pub fn launch_host<const N: usize, F: FnMut(&[usize; N])>(shape: Shape<N>, f: F) {
    for_each_index(&shape, f)
}
