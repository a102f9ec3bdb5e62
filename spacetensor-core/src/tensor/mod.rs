use crate::{
    device::{copy_n, Host, Space},
    DType,
};

pub mod literal;
mod owned;
pub mod slice;
mod view;

pub use literal::NdLiteral;
pub use owned::Tensor;
pub use slice::Slice;
pub use view::{TensorSpan, TensorView, TensorViewMut};

/// Copy the elements `span` addresses to the host in column-major order, staging
/// strided data through a contiguous temporary in its own space.
pub(crate) fn span_to_vec<T: DType, const N: usize, S: Space>(span: TensorSpan<T, N, S>) -> Vec<T> {
    let size = span.size();
    let mut out = vec![T::ZERO; size];
    if size == 0 {
        return out;
    }
    if span.is_f_contiguous() {
        // SAFETY: `span` addresses `size` contiguous elements, `out` has room for them.
        unsafe { copy_n::<T, S, Host>(span.as_ptr(), out.as_mut_ptr(), size) };
    } else {
        let staged = Tensor::from_span(span);
        // SAFETY: as above, for the contiguous copy.
        unsafe { copy_n::<T, S, Host>(staged.as_ptr(), out.as_mut_ptr(), size) };
    }
    out
}

/// Elementwise equality of two strided arrays in any spaces; differing shapes or ranks
/// compare unequal.
pub(crate) fn spans_eq<T: DType, const N: usize, const M: usize, S1: Space, S2: Space>(
    a: TensorSpan<T, N, S1>,
    b: TensorSpan<T, M, S2>,
) -> bool {
    a.shape().dims()[..] == b.shape().dims()[..] && span_to_vec(a) == span_to_vec(b)
}

macro_rules! tensor_eq {
    ([$($lt:lifetime),*] $lhs:ty, $rhs:ty) => {
        impl<$($lt,)* T: DType, const N: usize, const M: usize, S1: Space, S2: Space>
            PartialEq<$rhs> for $lhs
        {
            fn eq(&self, other: &$rhs) -> bool {
                match (self.checked_span(), other.checked_span()) {
                    (Some(a), Some(b)) => spans_eq(a, b),
                    _ => false,
                }
            }
        }
    };
}

/// Span access for equality, `None` for a moved-from tensor.
trait CheckedSpan<T: DType, const N: usize, S: Space> {
    fn checked_span(&self) -> Option<TensorSpan<T, N, S>>;
}

impl<T: DType, const N: usize, S: Space> CheckedSpan<T, N, S> for Tensor<T, N, S> {
    fn checked_span(&self) -> Option<TensorSpan<T, N, S>> {
        self.live_span().ok()
    }
}

impl<T: DType, const N: usize, S: Space> CheckedSpan<T, N, S> for TensorView<'_, T, N, S> {
    fn checked_span(&self) -> Option<TensorSpan<T, N, S>> {
        Some(self.span())
    }
}

impl<T: DType, const N: usize, S: Space> CheckedSpan<T, N, S> for TensorViewMut<'_, T, N, S> {
    fn checked_span(&self) -> Option<TensorSpan<T, N, S>> {
        Some(self.span())
    }
}

tensor_eq!([] Tensor<T, N, S1>, Tensor<T, M, S2>);
tensor_eq!(['a] Tensor<T, N, S1>, TensorView<'a, T, M, S2>);
tensor_eq!(['a] Tensor<T, N, S1>, TensorViewMut<'a, T, M, S2>);
tensor_eq!(['a] TensorView<'a, T, N, S1>, Tensor<T, M, S2>);
tensor_eq!(['a, 'b] TensorView<'a, T, N, S1>, TensorView<'b, T, M, S2>);
tensor_eq!(['a, 'b] TensorView<'a, T, N, S1>, TensorViewMut<'b, T, M, S2>);
tensor_eq!(['a] TensorViewMut<'a, T, N, S1>, Tensor<T, M, S2>);
tensor_eq!(['a, 'b] TensorViewMut<'a, T, N, S1>, TensorView<'b, T, M, S2>);
tensor_eq!(['a, 'b] TensorViewMut<'a, T, N, S1>, TensorViewMut<'b, T, M, S2>);
