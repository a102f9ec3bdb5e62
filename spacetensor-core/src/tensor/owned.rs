use std::{
    fmt,
    ops::{Index, IndexMut},
};

use super::{literal::NdLiteral, span_to_vec, Slice, TensorSpan, TensorView, TensorViewMut};
use crate::{
    device::{copy_n, Host, HostAccessible, Space, SpaceId},
    expr::{
        assign_op, assign_span,
        ops::{Divide, Minus, Plus, Times},
        Expression, Scalar,
    },
    storage::Storage,
    DType, Error, Layout, Result, Shape, Strides,
};

/// An owning N-dimensional array of `T` in memory space `S`.
///
/// Elements are stored contiguously in column-major order. Only operations that can
/// fail for a reason other than exhausted memory or a broken driver return `Result`s.
pub struct Tensor<T: DType, const N: usize, S: Space = Host> {
    layout: Layout<N>,
    storage: Storage<T, S>,
}

impl<T: DType, const N: usize, S: Space> Tensor<T, N, S> {
    /// An empty tensor: every extent 0, no buffer. Assigning to it adopts the
    /// expression's shape. A rank-0 tensor always holds its one element.
    pub fn new() -> Self {
        let layout = Layout::default();
        Self {
            storage: Storage::new(layout.size()),
            layout,
        }
    }

    /// A tensor of `shape` with unspecified contents.
    pub fn empty(shape: impl Into<Shape<N>>) -> Self {
        let shape = shape.into();
        Self {
            layout: Layout::contiguous(shape),
            storage: Storage::new(shape.size()),
        }
    }

    pub fn full(shape: impl Into<Shape<N>>, value: T) -> Self {
        let out = Self::empty(shape);
        if out.size() > 0 {
            S::launch(out.span(), Scalar(value));
        }
        out
    }

    pub fn zeros(shape: impl Into<Shape<N>>) -> Self {
        Self::full(shape, T::ZERO)
    }

    pub fn ones(shape: impl Into<Shape<N>>) -> Self {
        Self::full(shape, T::ONE)
    }

    pub fn empty_like(&self) -> Self {
        Self::empty(*self.shape())
    }

    pub fn zeros_like(&self) -> Self {
        Self::zeros(*self.shape())
    }

    pub fn full_like(&self, value: T) -> Self {
        Self::full(*self.shape(), value)
    }

    /// Build from host data in column-major order.
    pub fn from_slice(shape: impl Into<Shape<N>>, data: &[T]) -> Result<Self> {
        let shape = shape.into();
        if shape.size() != data.len() {
            return Err(Error::SizeMismatch {
                expected: shape.size(),
                found: data.len(),
            }
            .bt());
        }
        Ok(Self {
            layout: Layout::contiguous(shape),
            storage: Storage::from_slice(data),
        })
    }

    pub fn from_vec(shape: impl Into<Shape<N>>, data: Vec<T>) -> Result<Self> {
        Self::from_slice(shape, &data)
    }

    /// Build from nested literal data; device tensors are staged through host memory.
    ///
    /// ```
    /// use spacetensor_core::Tensor;
    ///
    /// let a = Tensor::<f64, 2>::from_nested([[11., 12., 13.], [21., 22., 23.]]).unwrap();
    /// assert_eq!(a.shape(), &[3, 2]);
    /// assert_eq!(a[[2, 1]], 23.);
    /// ```
    pub fn from_nested<L: NdLiteral<T, N>>(literal: L) -> Result<Self> {
        let shape = literal.literal_shape()?;
        let mut data = Vec::with_capacity(shape.size());
        literal.flatten_into(&mut data);
        Self::from_slice(shape, &data)
    }

    /// Evaluate `expr` into a new tensor of its shape.
    pub fn from_expr<E: Expression<N, Elem = T>>(expr: E) -> Result<Self> {
        let mut out = Self::new();
        out.assign(expr)?;
        Ok(out)
    }

    /// A contiguous copy of the elements `span` addresses.
    pub(crate) fn from_span(span: TensorSpan<T, N, S>) -> Self {
        let out = Self::empty(*span.shape());
        if out.size() > 0 {
            if span.is_f_contiguous() {
                // SAFETY: both buffers hold `size` elements of `S`.
                unsafe { copy_n::<T, S, S>(span.as_ptr(), out.storage.as_ptr() as *mut T, out.size()) };
            } else {
                S::launch(out.span(), span);
            }
        }
        out
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

    pub const fn rank(&self) -> usize {
        N
    }

    pub fn capacity(&self) -> usize {
        self.storage.capacity()
    }

    pub fn space(&self) -> SpaceId {
        S::id()
    }

    pub fn is_f_contiguous(&self) -> bool {
        self.layout.is_f_contiguous()
    }

    pub fn storage(&self) -> &Storage<T, S> {
        &self.storage
    }

    /// Raw buffer address in `S`; null when nothing is allocated.
    pub fn as_ptr(&self) -> *const T {
        self.storage.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.storage.as_mut_ptr()
    }

    /// True after [`Tensor::take`] until the tensor is assigned or resized again.
    pub fn is_moved_from(&self) -> bool {
        self.storage.is_released()
    }

    pub(crate) fn ensure_live(&self) -> Result<()> {
        if self.storage.is_released() {
            Err(Error::MovedFrom("tensor").bt())
        } else {
            Ok(())
        }
    }

    /// Span over the current buffer without the moved-from check.
    pub(crate) fn span(&self) -> TensorSpan<T, N, S> {
        TensorSpan::from_layout(self.storage.as_ptr() as *mut T, self.layout)
    }

    /// Resize to `shape`, keeping the leading elements of the buffer.
    pub fn resize(&mut self, shape: impl Into<Shape<N>>) {
        let shape = shape.into();
        self.storage.resize(shape.size());
        self.layout = Layout::contiguous(shape);
    }

    /// Resize to `shape`; contents become unspecified.
    pub fn resize_discard(&mut self, shape: impl Into<Shape<N>>) {
        let shape = shape.into();
        self.storage.resize_discard(shape.size());
        self.layout = Layout::contiguous(shape);
    }

    /// Move the buffer out without copying. `self` is left empty and reports
    /// [`Error::MovedFrom`] on use until it is assigned again.
    pub fn take(&mut self) -> Self {
        let layout = std::mem::take(&mut self.layout);
        Self {
            layout,
            storage: self.storage.take(),
        }
    }

    /// Span over the current buffer, failing for a moved-from tensor.
    pub(crate) fn live_span(&self) -> Result<TensorSpan<T, N, S>> {
        self.ensure_live()?;
        Ok(self.span())
    }

    pub fn view(&self) -> Result<TensorView<'_, T, N, S>> {
        self.ensure_live()?;
        // SAFETY: the view borrows `self`.
        Ok(unsafe { TensorView::from_span(self.span()) })
    }

    pub fn view_mut(&mut self) -> Result<TensorViewMut<'_, T, N, S>> {
        self.ensure_live()?;
        // SAFETY: the view borrows `self` exclusively.
        Ok(unsafe { TensorViewMut::from_span(self.span()) })
    }

    /// A rank-`M` view selected by `specs`.
    ///
    /// ```
    /// use spacetensor_core::{range, Tensor};
    ///
    /// let v = Tensor::<f64, 1>::from_nested([10., 20., 30., 40.]).unwrap();
    /// assert_eq!(v.slice::<1>(&[range(1, -1)]).unwrap().to_vec(), vec![20., 30.]);
    /// ```
    pub fn slice<const M: usize>(&self, specs: &[Slice]) -> Result<TensorView<'_, T, M, S>> {
        self.view()?.slice(specs)
    }

    pub fn slice_mut<const M: usize>(
        &mut self,
        specs: &[Slice],
    ) -> Result<TensorViewMut<'_, T, M, S>> {
        self.ensure_live()?;
        let span = self.span().slice(specs)?;
        // SAFETY: the view borrows `self` exclusively.
        Ok(unsafe { TensorViewMut::from_span(span) })
    }

    /// Evaluate `expr` into this tensor.
    ///
    /// The expression must broadcast to this tensor's shape. A tensor without a shape,
    /// either fresh from [`Tensor::new`] or moved-from, is first resized to the
    /// expression's shape. A tensor given a zero-sized shape keeps it.
    ///
    /// Operands borrow their tensors, so a tensor cannot be read by the expression
    /// it is assigned from:
    ///
    /// ```compile_fail
    /// use spacetensor_core::{reversed, Tensor};
    ///
    /// let mut a = Tensor::<i32, 1>::from_nested([1, 2, 3, 4]).unwrap();
    /// let r = a.slice::<1>(&[reversed()]).unwrap();
    /// a.assign(r).unwrap();
    /// ```
    ///
    /// and an operand cannot outlive the tensor it reads:
    ///
    /// ```compile_fail
    /// use spacetensor_core::{eval, Host, Tensor};
    ///
    /// let view = {
    ///     let a = Tensor::<f64, 1>::ones([4]);
    ///     a.view().unwrap()
    /// };
    /// let b = eval::<Host, _, 1>(view * 2.0).unwrap();
    /// ```
    pub fn assign<E: Expression<N, Elem = T>>(&mut self, expr: E) -> Result<()> {
        let shape = expr.shape()?;
        expr.check_space(S::id())?;
        if self.storage.is_released() || (self.is_unshaped() && self.shape() != &shape) {
            self.resize_discard(shape);
        }
        assign_span(self.span(), &expr)
    }

    /// Every extent 0, the state of [`Tensor::new`]. Rank 0 always has a shape.
    fn is_unshaped(&self) -> bool {
        N > 0 && self.shape().dims().iter().all(|&e| e == 0)
    }

    pub fn fill(&mut self, value: T) -> Result<()> {
        self.ensure_live()?;
        assign_span(self.span(), &Scalar(value))
    }

    pub fn assign_add<E: Expression<N, Elem = T>>(&mut self, expr: E) -> Result<()> {
        self.ensure_live()?;
        assign_op::<Plus, _, N, S>(self.span(), expr)
    }

    pub fn assign_sub<E: Expression<N, Elem = T>>(&mut self, expr: E) -> Result<()> {
        self.ensure_live()?;
        assign_op::<Minus, _, N, S>(self.span(), expr)
    }

    pub fn assign_mul<E: Expression<N, Elem = T>>(&mut self, expr: E) -> Result<()> {
        self.ensure_live()?;
        assign_op::<Times, _, N, S>(self.span(), expr)
    }

    pub fn assign_div<E: Expression<N, Elem = T>>(&mut self, expr: E) -> Result<()> {
        self.ensure_live()?;
        assign_op::<Divide, _, N, S>(self.span(), expr)
    }

    /// Elements in column-major order, copied to the host.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        self.ensure_live()?;
        Ok(span_to_vec(self.span()))
    }

    /// A copy of this tensor in space `S2`.
    pub fn to_space<S2: Space>(&self) -> Result<Tensor<T, N, S2>> {
        self.ensure_live()?;
        let out = Tensor::<T, N, S2>::empty(*self.shape());
        // SAFETY: both buffers hold `size` contiguous elements.
        unsafe { copy_n::<T, S, S2>(self.as_ptr(), out.as_ptr() as *mut T, self.size()) };
        Ok(out)
    }

    /// A host copy, for inspecting device data.
    pub fn to_host(&self) -> Result<Tensor<T, N, Host>> {
        self.to_space::<Host>()
    }
}

impl<T: DType, const N: usize, S: HostAccessible> Tensor<T, N, S> {
    pub fn get(&self, idx: [usize; N]) -> Option<&T> {
        if !self.shape().contains(&idx) {
            return None;
        }
        // SAFETY: bounds checked, host memory.
        Some(unsafe { self.get_unchecked(idx) })
    }

    pub fn get_mut(&mut self, idx: [usize; N]) -> Option<&mut T> {
        if !self.shape().contains(&idx) {
            return None;
        }
        let off = self.layout.offset(&idx);
        // SAFETY: bounds checked, host memory, exclusive borrow.
        Some(unsafe { &mut *self.storage.as_mut_ptr().offset(off) })
    }

    /// # Safety
    /// `idx` must be inside the shape; only debug builds check.
    pub unsafe fn get_unchecked(&self, idx: [usize; N]) -> &T {
        &*self.storage.as_ptr().offset(self.layout.offset(&idx))
    }

    /// The elements as a column-major slice.
    pub fn as_slice(&self) -> &[T] {
        if self.size() == 0 {
            return &[];
        }
        // SAFETY: a tensor's buffer holds `size` contiguous host elements.
        unsafe { std::slice::from_raw_parts(self.storage.as_ptr(), self.size()) }
    }
}

impl<T: DType, const N: usize, S: HostAccessible> Index<[usize; N]> for Tensor<T, N, S> {
    type Output = T;

    fn index(&self, idx: [usize; N]) -> &T {
        match self.get(idx) {
            Some(v) => v,
            None => panic!("index {idx:?} out of bounds for shape {}", self.shape()),
        }
    }
}

impl<T: DType, const N: usize, S: HostAccessible> IndexMut<[usize; N]> for Tensor<T, N, S> {
    fn index_mut(&mut self, idx: [usize; N]) -> &mut T {
        let shape = *self.shape();
        match self.get_mut(idx) {
            Some(v) => v,
            None => panic!("index {idx:?} out of bounds for shape {shape}"),
        }
    }
}

impl<T: DType, const N: usize, S: Space> Default for Tensor<T, N, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DType, const N: usize, S: Space> Clone for Tensor<T, N, S> {
    fn clone(&self) -> Self {
        Self {
            layout: self.layout,
            storage: self.storage.clone(),
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.layout = source.layout;
        self.storage.clone_from(&source.storage);
    }
}

impl<T: DType, const N: usize, S: Space> fmt::Debug for Tensor<T, N, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Tensor");
        s.field("space", &S::id())
            .field("dtype", &T::NAME)
            .field("shape", self.shape());
        if S::HOST_MEMORY && !self.is_moved_from() {
            s.field("data", &self.storage.to_vec());
        }
        s.finish()
    }
}
