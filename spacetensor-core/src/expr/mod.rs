//! Lazily composed elementwise expressions.
//!
//! Arithmetic on tensors, views, spans and scalars builds a tree of [`ops::Binary`],
//! [`ops::Unary`] and [`ops::Cast`] nodes without computing anything. Assigning the tree
//! to a destination checks shapes and memory spaces, lowers it to a [`Kernel`] and hands
//! it to the destination space's launcher, which evaluates it once per index.

use num_complex::Complex;

#[cfg(feature = "bfloat")]
use half::bf16;
#[cfg(feature = "half")]
use half::f16;

use crate::{
    device::{Space, SpaceId},
    kernel::{Kernel, KernelSource},
    DType, Error, Result, Shape, Tensor, TensorSpan, TensorView, TensorViewMut,
};

pub mod ops;

use ops::{Binary, BinaryOp};

/// A value that can be evaluated elementwise over a rank-`N` index space.
pub trait Expression<const N: usize> {
    type Elem: DType;
    type Kernel: Kernel<N, Elem = Self::Elem>;

    /// The broadcast shape of all operands.
    fn shape(&self) -> Result<Shape<N>>;

    /// Fail unless every operand lives in `space`.
    fn check_space(&self, space: SpaceId) -> Result<()>;

    /// Lower to a kernel over `shape`, which the expression's shape broadcasts to.
    ///
    /// # Safety
    /// The kernel addresses operand memory without borrowing it. It must not be used
    /// once an operand is dropped, resized or written through another path.
    unsafe fn to_kernel(&self, shape: &Shape<N>) -> Self::Kernel;
}

fn check_leaf<S: Space>(space: SpaceId) -> Result<()> {
    if S::id() == space {
        Ok(())
    } else {
        Err(Error::SpaceMismatch {
            expected: space,
            found: S::id(),
        }
        .bt())
    }
}

impl<T: DType, const N: usize, S: Space> Expression<N> for TensorSpan<T, N, S> {
    type Elem = T;
    type Kernel = Self;

    fn shape(&self) -> Result<Shape<N>> {
        Ok(*TensorSpan::shape(self))
    }

    fn check_space(&self, space: SpaceId) -> Result<()> {
        check_leaf::<S>(space)
    }

    unsafe fn to_kernel(&self, shape: &Shape<N>) -> Self {
        self.broadcast_to(shape)
    }
}

impl<T: DType, const N: usize, S: Space> Kernel<N> for TensorSpan<T, N, S> {
    type Elem = T;

    #[inline]
    unsafe fn at(&self, idx: &[usize; N]) -> T {
        self.read(idx)
    }

    fn emit(&self, src: &mut KernelSource) -> String {
        let p = src.push_pointer(self.as_ptr() as *const T);
        format!("{p}[{}]", KernelSource::index_expr(self.strides()))
    }
}

impl<'a, T: DType, const N: usize, S: Space> Expression<N> for &'a Tensor<T, N, S> {
    type Elem = T;
    type Kernel = TensorSpan<T, N, S>;

    fn shape(&self) -> Result<Shape<N>> {
        self.ensure_live()?;
        Ok(*Tensor::shape(self))
    }

    fn check_space(&self, space: SpaceId) -> Result<()> {
        check_leaf::<S>(space)
    }

    unsafe fn to_kernel(&self, shape: &Shape<N>) -> Self::Kernel {
        self.span().broadcast_to(shape)
    }
}

impl<'a, T: DType, const N: usize, S: Space> Expression<N> for TensorView<'a, T, N, S> {
    type Elem = T;
    type Kernel = TensorSpan<T, N, S>;

    fn shape(&self) -> Result<Shape<N>> {
        Ok(*TensorView::shape(self))
    }

    fn check_space(&self, space: SpaceId) -> Result<()> {
        check_leaf::<S>(space)
    }

    unsafe fn to_kernel(&self, shape: &Shape<N>) -> Self::Kernel {
        self.span().broadcast_to(shape)
    }
}

impl<'a, 'b, T: DType, const N: usize, S: Space> Expression<N> for &'b TensorViewMut<'a, T, N, S> {
    type Elem = T;
    type Kernel = TensorSpan<T, N, S>;

    fn shape(&self) -> Result<Shape<N>> {
        Ok(*TensorViewMut::shape(self))
    }

    fn check_space(&self, space: SpaceId) -> Result<()> {
        check_leaf::<S>(space)
    }

    unsafe fn to_kernel(&self, shape: &Shape<N>) -> Self::Kernel {
        self.span().broadcast_to(shape)
    }
}

/// A scalar operand of any element type, replicated over every index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scalar<T>(pub T);

pub fn scalar<T: DType>(value: T) -> Scalar<T> {
    Scalar(value)
}

impl<T: DType, const N: usize> Expression<N> for Scalar<T> {
    type Elem = T;
    type Kernel = Self;

    fn shape(&self) -> Result<Shape<N>> {
        Ok(Shape::ones())
    }

    fn check_space(&self, _space: SpaceId) -> Result<()> {
        Ok(())
    }

    unsafe fn to_kernel(&self, _shape: &Shape<N>) -> Self {
        *self
    }
}

impl<T: DType, const N: usize> Kernel<N> for Scalar<T> {
    type Elem = T;

    #[inline]
    unsafe fn at(&self, _idx: &[usize; N]) -> T {
        self.0
    }

    fn emit(&self, src: &mut KernelSource) -> String {
        src.push_scalar(self.0)
    }
}

macro_rules! scalar_expr {
    ($($t:ty),* $(,)?) => {$(
        impl<const N: usize> Expression<N> for $t {
            type Elem = $t;
            type Kernel = $t;

            fn shape(&self) -> Result<Shape<N>> {
                Ok(Shape::ones())
            }

            fn check_space(&self, _space: SpaceId) -> Result<()> {
                Ok(())
            }

            unsafe fn to_kernel(&self, _shape: &Shape<N>) -> $t {
                *self
            }
        }

        impl<const N: usize> Kernel<N> for $t {
            type Elem = $t;

            #[inline]
            unsafe fn at(&self, _idx: &[usize; N]) -> $t {
                *self
            }

            fn emit(&self, src: &mut KernelSource) -> String {
                src.push_scalar(*self)
            }
        }
    )*};
}

scalar_expr!(u8, u32, i32, i64, f32, f64, Complex<f32>, Complex<f64>);
#[cfg(feature = "half")]
scalar_expr!(f16);
#[cfg(feature = "bfloat")]
scalar_expr!(bf16);

/// Evaluate `expr` into `dst`, which must not be resized.
pub(crate) fn assign_span<E: Expression<N>, const N: usize, S: Space>(
    dst: TensorSpan<E::Elem, N, S>,
    expr: &E,
) -> Result<()> {
    let shape = expr.shape()?;
    expr.check_space(S::id())?;
    shape.broadcasts_to(dst.shape())?;
    if dst.size() == 0 {
        return Ok(());
    }
    // SAFETY: the kernel is consumed by the launch while `expr` still borrows every
    // operand, and the borrow checker keeps `dst` apart from them.
    S::launch(dst, unsafe { expr.to_kernel(dst.shape()) });
    Ok(())
}

/// `dst = dst <op> expr`.
pub(crate) fn assign_op<O: BinaryOp, E: Expression<N>, const N: usize, S: Space>(
    dst: TensorSpan<E::Elem, N, S>,
    expr: E,
) -> Result<()> {
    assign_span(dst, &Binary::<O, _, _>::new(dst, expr))
}

/// Evaluate `expr` into a new tensor in space `S`.
///
/// ```
/// use spacetensor_core::{eval, Host, Tensor};
///
/// let a = Tensor::<f64, 1>::from_nested([1., 2., 3.]).unwrap();
/// let b = eval::<Host, _, 1>(&a * 2.0).unwrap();
/// assert_eq!(b.to_vec().unwrap(), vec![2., 4., 6.]);
/// ```
pub fn eval<S: Space, E: Expression<N>, const N: usize>(expr: E) -> Result<Tensor<E::Elem, N, S>> {
    Tensor::from_expr(expr)
}
