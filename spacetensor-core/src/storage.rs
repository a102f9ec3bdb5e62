use std::{fmt, marker::PhantomData, ptr};

use crate::{
    device::{copy_n, Host, Space},
    DType,
};

/// An owning, resizable, contiguous buffer of `T` in memory space `S`.
///
/// Size and capacity are tracked separately: shrinking never reallocates.
pub struct Storage<T: DType, S: Space> {
    ptr: *mut T,
    len: usize,
    capacity: usize,
    released: bool,
    _space: PhantomData<S>,
}

// SAFETY: the buffer is exclusively owned, like a `Vec<T>`.
unsafe impl<T: DType, S: Space> Send for Storage<T, S> {}
unsafe impl<T: DType, S: Space> Sync for Storage<T, S> {}

impl<T: DType, S: Space> Storage<T, S> {
    /// Allocate `count` elements with unspecified contents.
    pub fn new(count: usize) -> Self {
        let mut storage = Self::default();
        storage.resize_discard(count);
        storage
    }

    /// Copy host data into a new buffer.
    pub fn from_slice(data: &[T]) -> Self {
        let storage = Self::new(data.len());
        // SAFETY: the new buffer has room for `data.len()` elements.
        unsafe { copy_n::<T, Host, S>(data.as_ptr(), storage.ptr, data.len()) };
        storage
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True after the buffer was moved out with [`Storage::take`] and before the
    /// storage is resized again.
    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn as_ptr(&self) -> *const T {
        self.ptr
    }

    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr
    }

    /// Resize, keeping the first `min(len, count)` elements.
    pub fn resize(&mut self, count: usize) {
        self.resize_impl(count, false)
    }

    /// Resize without preserving contents.
    pub fn resize_discard(&mut self, count: usize) {
        self.resize_impl(count, true)
    }

    fn resize_impl(&mut self, count: usize, discard: bool) {
        self.released = false;
        if self.capacity == 0 {
            if count == 0 {
                self.len = 0;
                return;
            }
            self.ptr = S::allocate::<T>(count);
            self.capacity = count;
            self.len = count;
        } else if count > self.capacity {
            let new_ptr = S::allocate::<T>(count);
            if !discard {
                // SAFETY: both buffers belong to `S` and hold at least `len` elements.
                unsafe { copy_n::<T, S, S>(self.ptr, new_ptr, self.len.min(count)) };
            }
            // SAFETY: `ptr` was allocated by `S` with `capacity` elements.
            unsafe { S::deallocate(self.ptr, self.capacity) };
            log::trace!(
                "{} storage grew from {} to {count} x {}",
                S::id(),
                self.capacity,
                T::NAME
            );
            self.ptr = new_ptr;
            self.capacity = count;
            self.len = count;
        } else {
            self.len = count;
        }
    }

    /// Move the buffer out, leaving `self` empty and marked moved-from.
    pub fn take(&mut self) -> Self {
        let out = Self {
            ptr: self.ptr,
            len: self.len,
            capacity: self.capacity,
            released: false,
            _space: PhantomData,
        };
        self.ptr = ptr::null_mut();
        self.len = 0;
        self.capacity = 0;
        self.released = true;
        out
    }

    /// Copy the elements to host memory.
    pub fn to_vec(&self) -> Vec<T> {
        let mut out = vec![T::ZERO; self.len];
        // SAFETY: `out` has room for `len` elements.
        unsafe { copy_n::<T, S, Host>(self.ptr, out.as_mut_ptr(), self.len) };
        out
    }
}

impl<T: DType, S: Space> Default for Storage<T, S> {
    fn default() -> Self {
        Self {
            ptr: ptr::null_mut(),
            len: 0,
            capacity: 0,
            released: false,
            _space: PhantomData,
        }
    }
}

impl<T: DType, S: Space> Clone for Storage<T, S> {
    fn clone(&self) -> Self {
        let mut out = Self::default();
        out.clone_from(self);
        out
    }

    fn clone_from(&mut self, source: &Self) {
        self.resize_discard(source.len);
        // SAFETY: `self` now holds at least `source.len` elements.
        unsafe { copy_n::<T, S, S>(source.ptr, self.ptr, source.len) };
    }
}

impl<T: DType, S: Space> Drop for Storage<T, S> {
    fn drop(&mut self) {
        if self.capacity > 0 {
            // SAFETY: `ptr` was allocated by `S` with `capacity` elements.
            unsafe { S::deallocate(self.ptr, self.capacity) };
        }
    }
}

impl<T: DType, S: Space, S2: Space> PartialEq<Storage<T, S2>> for Storage<T, S> {
    fn eq(&self, other: &Storage<T, S2>) -> bool {
        self.len == other.len && self.to_vec() == other.to_vec()
    }
}

impl<T: DType, S: Space> fmt::Debug for Storage<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("space", &S::id())
            .field("dtype", &T::NAME)
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .finish()
    }
}
