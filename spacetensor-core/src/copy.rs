//! Element copies between arrays of any layout in any pair of memory spaces.

use crate::{
    device::{copy_n, Space},
    DType, Error, Result, Tensor, TensorSpan, TensorView, TensorViewMut,
};

/// Something that can be read as a strided span.
pub trait AsSpan<T: DType, const N: usize, S: Space> {
    /// # Safety
    /// The span must not be used after `self` is dropped or while it is written
    /// through another path.
    unsafe fn as_span(&self) -> Result<TensorSpan<T, N, S>>;
}

/// Something that can be written through a strided span.
pub trait AsSpanMut<T: DType, const N: usize, S: Space> {
    /// # Safety
    /// The span must not be used after `self` is dropped or while `self` is accessed
    /// through another path.
    unsafe fn as_span_mut(&mut self) -> Result<TensorSpan<T, N, S>>;
}

impl<T: DType, const N: usize, S: Space> AsSpan<T, N, S> for Tensor<T, N, S> {
    unsafe fn as_span(&self) -> Result<TensorSpan<T, N, S>> {
        self.live_span()
    }
}

impl<T: DType, const N: usize, S: Space> AsSpan<T, N, S> for TensorView<'_, T, N, S> {
    unsafe fn as_span(&self) -> Result<TensorSpan<T, N, S>> {
        Ok(self.span())
    }
}

impl<T: DType, const N: usize, S: Space> AsSpan<T, N, S> for TensorViewMut<'_, T, N, S> {
    unsafe fn as_span(&self) -> Result<TensorSpan<T, N, S>> {
        Ok(self.span())
    }
}

impl<T: DType, const N: usize, S: Space> AsSpan<T, N, S> for TensorSpan<T, N, S> {
    unsafe fn as_span(&self) -> Result<TensorSpan<T, N, S>> {
        Ok(*self)
    }
}

impl<T: DType, const N: usize, S: Space> AsSpanMut<T, N, S> for Tensor<T, N, S> {
    unsafe fn as_span_mut(&mut self) -> Result<TensorSpan<T, N, S>> {
        self.live_span()
    }
}

impl<T: DType, const N: usize, S: Space> AsSpanMut<T, N, S> for TensorViewMut<'_, T, N, S> {
    unsafe fn as_span_mut(&mut self) -> Result<TensorSpan<T, N, S>> {
        Ok(self.span())
    }
}

impl<T: DType, const N: usize, S: Space> AsSpanMut<T, N, S> for TensorSpan<T, N, S> {
    unsafe fn as_span_mut(&mut self) -> Result<TensorSpan<T, N, S>> {
        Ok(*self)
    }
}

/// Copy every element of `from` into `to`, which must have the same shape.
///
/// Contiguous arrays are copied with one raw transfer. Strided arrays in the same space
/// are copied with a launch there; across spaces they are staged through contiguous
/// temporaries on either side.
///
/// ```
/// use spacetensor_core::{copy, range, Tensor};
///
/// let a = Tensor::<i32, 1>::from_nested([1, 2, 3, 4]).unwrap();
/// let mut b = Tensor::<i32, 1>::zeros([2]);
/// copy(&a.slice::<1>(&[range(1, 3)]).unwrap(), &mut b).unwrap();
/// assert_eq!(b.to_vec().unwrap(), vec![2, 3]);
/// ```
pub fn copy<T, const N: usize, S1, S2>(
    from: &impl AsSpan<T, N, S1>,
    to: &mut impl AsSpanMut<T, N, S2>,
) -> Result<()>
where
    T: DType,
    S1: Space,
    S2: Space,
{
    // SAFETY: both spans live only for this call, during which `from` and `to` stay
    // borrowed.
    let (src, dst) = unsafe { (from.as_span()?, to.as_span_mut()?) };
    if src.shape() != dst.shape() {
        return Err(Error::shape_mismatch(dst.shape().dims(), src.shape().dims()));
    }
    let size = src.size();
    if size == 0 {
        return Ok(());
    }
    match (src.is_f_contiguous(), dst.is_f_contiguous()) {
        // SAFETY: both spans address `size` contiguous elements of their spaces.
        (true, true) => unsafe { copy_n::<T, S1, S2>(src.as_ptr(), dst.as_ptr(), size) },
        _ if S1::id() == S2::id() => S2::launch(dst, src.with_space::<S2>()),
        (_, dst_contiguous) => {
            let staged = Tensor::from_span(src);
            if dst_contiguous {
                // SAFETY: as above.
                unsafe { copy_n::<T, S1, S2>(staged.as_ptr(), dst.as_ptr(), size) };
            } else {
                let landed = Tensor::<T, N, S2>::empty(*dst.shape());
                // SAFETY: `landed` holds `size` contiguous elements of `S2`.
                unsafe { copy_n::<T, S1, S2>(staged.as_ptr(), landed.as_ptr() as *mut T, size) };
                S2::launch(dst, landed.span());
            }
        }
    }
    Ok(())
}
