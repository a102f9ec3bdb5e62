use std::fmt;

use crate::{kernel::Kernel, DType, TensorSpan};

/// Runtime name of a memory space, used in diagnostics and the operand space check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpaceId {
    Host,
    Threads,
    Cuda(usize),
}

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => write!(f, "host"),
            Self::Threads => write!(f, "threads"),
            Self::Cuda(ord) => write!(f, "cuda:{ord}"),
        }
    }
}

/// Marker trait for memory spaces.
///
/// A space owns allocation, raw copies to and from host memory, and the execution of
/// an assignment over an index space. Every tensor, view and span is tagged with one.
pub trait Space: Copy + Default + fmt::Debug + Send + Sync + 'static {
    /// Buffers of this space live in host address space and may be `memmove`d.
    const HOST_MEMORY: bool;

    fn id() -> SpaceId;

    /// Allocate `count` elements. Zero allocates nothing and returns null; failure aborts.
    fn allocate<T: DType>(count: usize) -> *mut T;

    /// # Safety
    /// `ptr` must come from `allocate::<T>(count)` of this space and not be used again.
    unsafe fn deallocate<T: DType>(ptr: *mut T, count: usize);

    /// # Safety
    /// `src` holds `count` elements of this space, `dst` has room for `count` in host memory.
    unsafe fn copy_to_host<T: DType>(src: *const T, dst: *mut T, count: usize);

    /// # Safety
    /// `src` holds `count` host elements, `dst` has room for `count` in this space.
    unsafe fn copy_from_host<T: DType>(src: *const T, dst: *mut T, count: usize);

    /// # Safety
    /// Both buffers hold `count` elements of device memory (this space or a peer).
    unsafe fn copy_within<T: DType>(src: *const T, dst: *mut T, count: usize);

    /// Block until all work issued to this space has completed.
    fn synchronize();

    /// Write `src` at every index of `dst`.
    ///
    /// `src` must already be broadcast to `dst`'s shape and read only memory of this space.
    fn launch<K: Kernel<N>, const N: usize>(dst: TensorSpan<K::Elem, N, Self>, src: K);
}

/// Spaces whose elements may be dereferenced from host code.
pub trait HostAccessible: Space {}

/// Host memory, evaluated with a sequential loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Host;

/// A device backed by a pool of host threads.
///
/// Buffers live in host memory but are only reachable through explicit copies, and
/// assignments run the same launch grid an accelerator would.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Threads;

/// Memory of the CUDA device with ordinal `ORD`.
#[cfg(feature = "cuda")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Cuda<const ORD: usize>;

/// Copy `count` elements between any two spaces.
///
/// # Safety
/// `src` holds `count` elements in `Src`, `dst` has room for `count` in `Dst`.
pub unsafe fn copy_n<T: DType, Src: Space, Dst: Space>(src: *const T, dst: *mut T, count: usize) {
    if count == 0 {
        return;
    }
    log::trace!("copy {count} x {} from {} to {}", T::NAME, Src::id(), Dst::id());
    match (Src::HOST_MEMORY, Dst::HOST_MEMORY) {
        (true, true) => std::ptr::copy(src, dst, count),
        (true, false) => Dst::copy_from_host(src, dst, count),
        (false, true) => Src::copy_to_host(src, dst, count),
        (false, false) => Src::copy_within(src, dst, count),
    }
}

/// Wait for all outstanding work on every initialized device.
pub fn synchronize() {
    Host::synchronize();
    Threads::synchronize();
    #[cfg(feature = "cuda")]
    crate::cuda_backend::synchronize_all();
}
