use std::{
    fmt,
    marker::PhantomData,
    ops::{Index, IndexMut},
};

use super::{slice::slice_layout, span_to_vec, Slice};
use crate::{
    device::{Host, HostAccessible, Space},
    expr::{
        assign_op, assign_span,
        ops::{Divide, Minus, Plus, Times},
        Expression, Scalar,
    },
    DType, Layout, Result, Shape, Strides, Tensor,
};

/// A raw strided window into memory of space `S`.
///
/// Spans are the form in which arrays cross into an execution context: they are `Copy`,
/// `Send` and carry no lifetime. The caller vouches that the memory outlives every use.
pub struct TensorSpan<T: DType, const N: usize, S: Space> {
    ptr: *mut T,
    layout: Layout<N>,
    _space: PhantomData<S>,
}

impl<T: DType, const N: usize, S: Space> Clone for TensorSpan<T, N, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: DType, const N: usize, S: Space> Copy for TensorSpan<T, N, S> {}

// SAFETY: a span is a plain address; synchronizing access is the launcher's job.
unsafe impl<T: DType, const N: usize, S: Space> Send for TensorSpan<T, N, S> {}
unsafe impl<T: DType, const N: usize, S: Space> Sync for TensorSpan<T, N, S> {}

impl<T: DType, const N: usize, S: Space> TensorSpan<T, N, S> {
    /// # Safety
    /// `ptr` addresses memory of space `S` where every index of `shape` maps through
    /// `strides` to a valid element, for as long as the span is used.
    pub unsafe fn from_raw_parts(ptr: *mut T, shape: Shape<N>, strides: Strides<N>) -> Self {
        Self::from_layout(ptr, Layout::new(shape, strides))
    }

    /// Wrap a contiguous column-major buffer.
    ///
    /// # Safety
    /// Same as [`TensorSpan::from_raw_parts`] with the default strides of `shape`.
    pub unsafe fn adapt(ptr: *mut T, shape: Shape<N>) -> Self {
        Self::from_layout(ptr, Layout::contiguous(shape))
    }

    pub(crate) fn from_layout(ptr: *mut T, layout: Layout<N>) -> Self {
        Self {
            ptr,
            layout,
            _space: PhantomData,
        }
    }

    pub fn shape(&self) -> &Shape<N> {
        self.layout.shape()
    }

    pub fn strides(&self) -> &Strides<N> {
        self.layout.strides()
    }

    pub fn layout(&self) -> &Layout<N> {
        &self.layout
    }

    pub fn size(&self) -> usize {
        self.layout.size()
    }

    pub fn as_ptr(&self) -> *mut T {
        self.ptr
    }

    pub fn is_f_contiguous(&self) -> bool {
        self.layout.is_f_contiguous()
    }

    /// # Safety
    /// `idx` is in bounds and the memory is readable from the calling thread.
    #[inline]
    pub unsafe fn read(&self, idx: &[usize; N]) -> T {
        self.ptr.offset(self.layout.offset(idx)).read()
    }

    /// # Safety
    /// `idx` is in bounds, the memory is writable from the calling thread and no other
    /// thread accesses the same element concurrently.
    #[inline]
    pub unsafe fn write(&self, idx: &[usize; N], v: T) {
        self.ptr.offset(self.layout.offset(idx)).write(v)
    }

    pub fn slice<const M: usize>(&self, specs: &[Slice]) -> Result<TensorSpan<T, M, S>> {
        let (layout, offset) = slice_layout::<N, M>(&self.layout, specs)?;
        Ok(TensorSpan::from_layout(self.ptr.wrapping_offset(offset), layout))
    }

    pub(crate) fn broadcast_to(&self, shape: &Shape<N>) -> Self {
        Self::from_layout(self.ptr, self.layout.broadcast_to(shape))
    }

    /// Relabel the space. Only valid when `S2` names the same space as `S`.
    pub(crate) fn with_space<S2: Space>(self) -> TensorSpan<T, N, S2> {
        debug_assert_eq!(S::id(), S2::id());
        TensorSpan::from_layout(self.ptr, self.layout)
    }
}

impl<T: DType, const N: usize, S: Space> fmt::Debug for TensorSpan<T, N, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TensorSpan")
            .field("space", &S::id())
            .field("ptr", &self.ptr)
            .field("shape", self.shape())
            .field("strides", self.strides())
            .finish()
    }
}

/// A shared borrow of strided elements owned by a [`Tensor`].
pub struct TensorView<'a, T: DType, const N: usize, S: Space = Host> {
    span: TensorSpan<T, N, S>,
    _borrow: PhantomData<&'a T>,
}

impl<T: DType, const N: usize, S: Space> Clone for TensorView<'_, T, N, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: DType, const N: usize, S: Space> Copy for TensorView<'_, T, N, S> {}

/// An exclusive borrow of strided elements owned by a [`Tensor`]; assignable.
pub struct TensorViewMut<'a, T: DType, const N: usize, S: Space = Host> {
    span: TensorSpan<T, N, S>,
    _borrow: PhantomData<&'a mut T>,
}

impl<'a, T: DType, const N: usize, S: Space> TensorView<'a, T, N, S> {
    /// # Safety
    /// `span` must stay valid and unaliased by writers for `'a`.
    pub(crate) unsafe fn from_span(span: TensorSpan<T, N, S>) -> Self {
        Self {
            span,
            _borrow: PhantomData,
        }
    }

    pub fn shape(&self) -> &Shape<N> {
        self.span.shape()
    }

    pub fn strides(&self) -> &Strides<N> {
        self.span.strides()
    }

    pub fn size(&self) -> usize {
        self.span.size()
    }

    pub fn as_ptr(&self) -> *const T {
        self.span.as_ptr()
    }

    pub fn is_f_contiguous(&self) -> bool {
        self.span.is_f_contiguous()
    }

    pub(crate) fn span(&self) -> TensorSpan<T, N, S> {
        self.span
    }

    pub fn slice<const M: usize>(&self, specs: &[Slice]) -> Result<TensorView<'a, T, M, S>> {
        // SAFETY: the sliced span addresses a subset of this borrow.
        Ok(unsafe { TensorView::from_span(self.span.slice(specs)?) })
    }

    /// Elements in column-major order, copied to the host.
    pub fn to_vec(&self) -> Vec<T> {
        span_to_vec(self.span)
    }

    /// A contiguous owning copy in the same space.
    pub fn to_tensor(&self) -> Tensor<T, N, S> {
        Tensor::from_span(self.span)
    }
}

impl<'a, T: DType, const N: usize, S: Space> TensorViewMut<'a, T, N, S> {
    /// # Safety
    /// `span` must stay valid and exclusively borrowed for `'a`.
    pub(crate) unsafe fn from_span(span: TensorSpan<T, N, S>) -> Self {
        Self {
            span,
            _borrow: PhantomData,
        }
    }

    pub fn shape(&self) -> &Shape<N> {
        self.span.shape()
    }

    pub fn strides(&self) -> &Strides<N> {
        self.span.strides()
    }

    pub fn size(&self) -> usize {
        self.span.size()
    }

    pub fn as_ptr(&self) -> *const T {
        self.span.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.span.as_ptr()
    }

    pub fn is_f_contiguous(&self) -> bool {
        self.span.is_f_contiguous()
    }

    pub(crate) fn span(&self) -> TensorSpan<T, N, S> {
        self.span
    }

    pub fn as_view(&self) -> TensorView<'_, T, N, S> {
        // SAFETY: shared reborrow of this exclusive borrow.
        unsafe { TensorView::from_span(self.span) }
    }

    pub fn slice<const M: usize>(&self, specs: &[Slice]) -> Result<TensorView<'_, T, M, S>> {
        self.as_view().slice(specs)
    }

    pub fn slice_mut<const M: usize>(
        &mut self,
        specs: &[Slice],
    ) -> Result<TensorViewMut<'_, T, M, S>> {
        // SAFETY: exclusive reborrow of a subset of this borrow.
        Ok(unsafe { TensorViewMut::from_span(self.span.slice(specs)?) })
    }

    pub fn to_vec(&self) -> Vec<T> {
        span_to_vec(self.span)
    }

    pub fn to_tensor(&self) -> Tensor<T, N, S> {
        Tensor::from_span(self.span)
    }

    /// Evaluate `expr` into the viewed elements. The expression must broadcast to this
    /// view's shape and read only memory of `S`.
    pub fn assign<E: Expression<N, Elem = T>>(&mut self, expr: E) -> Result<()> {
        assign_span(self.span, &expr)
    }

    pub fn fill(&mut self, value: T) -> Result<()> {
        assign_span(self.span, &Scalar(value))
    }

    pub fn assign_add<E: Expression<N, Elem = T>>(&mut self, expr: E) -> Result<()> {
        assign_op::<Plus, _, N, S>(self.span, expr)
    }

    pub fn assign_sub<E: Expression<N, Elem = T>>(&mut self, expr: E) -> Result<()> {
        assign_op::<Minus, _, N, S>(self.span, expr)
    }

    pub fn assign_mul<E: Expression<N, Elem = T>>(&mut self, expr: E) -> Result<()> {
        assign_op::<Times, _, N, S>(self.span, expr)
    }

    pub fn assign_div<E: Expression<N, Elem = T>>(&mut self, expr: E) -> Result<()> {
        assign_op::<Divide, _, N, S>(self.span, expr)
    }
}

fn checked_offset<const N: usize>(layout: &Layout<N>, idx: &[usize; N]) -> isize {
    assert!(
        layout.shape().contains(idx),
        "index {idx:?} out of bounds for shape {}",
        layout.shape()
    );
    layout.offset(idx)
}

impl<T: DType, const N: usize, S: HostAccessible> Index<[usize; N]> for TensorView<'_, T, N, S> {
    type Output = T;

    fn index(&self, idx: [usize; N]) -> &T {
        let off = checked_offset(self.span.layout(), &idx);
        // SAFETY: bounds checked, host memory, borrowed for the view's lifetime.
        unsafe { &*self.span.as_ptr().offset(off) }
    }
}

impl<T: DType, const N: usize, S: HostAccessible> Index<[usize; N]>
    for TensorViewMut<'_, T, N, S>
{
    type Output = T;

    fn index(&self, idx: [usize; N]) -> &T {
        let off = checked_offset(self.span.layout(), &idx);
        // SAFETY: bounds checked, host memory, borrowed for the view's lifetime.
        unsafe { &*self.span.as_ptr().offset(off) }
    }
}

impl<T: DType, const N: usize, S: HostAccessible> IndexMut<[usize; N]>
    for TensorViewMut<'_, T, N, S>
{
    fn index_mut(&mut self, idx: [usize; N]) -> &mut T {
        let off = checked_offset(self.span.layout(), &idx);
        // SAFETY: bounds checked, host memory, exclusively borrowed.
        unsafe { &mut *self.span.as_ptr().offset(off) }
    }
}

impl<T: DType, const N: usize, S: Space> fmt::Debug for TensorView<'_, T, N, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TensorView")
            .field("space", &S::id())
            .field("shape", self.shape())
            .field("strides", self.strides())
            .finish()
    }
}

impl<T: DType, const N: usize, S: Space> fmt::Debug for TensorViewMut<'_, T, N, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TensorViewMut")
            .field("space", &S::id())
            .field("shape", self.shape())
            .field("strides", self.strides())
            .finish()
    }
}
