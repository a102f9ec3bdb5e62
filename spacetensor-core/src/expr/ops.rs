use std::marker::PhantomData;

use super::{Expression, Scalar};
use crate::{
    device::{Space, SpaceId},
    kernel::{Kernel, KernelSource},
    CastTo, DType, Result, Shape, Tensor, TensorSpan, TensorView, TensorViewMut,
};

pub trait BinaryOp: Copy + Default + Send + Sync + 'static {
    const C_OP: &'static str;
    fn apply<T: DType>(l: T, r: T) -> T;

    /// C expression combining `l` and `r`, both of type `T`.
    ///
    /// Integral results are cast back to `T` so narrow types wrap as they do on the host.
    fn render<T: DType>(l: &str, r: &str) -> String {
        if T::INTEGRAL {
            format!("static_cast<{}>({l} {} {r})", T::C_NAME, Self::C_OP)
        } else {
            format!("({l} {} {r})", Self::C_OP)
        }
    }
}

pub trait UnaryOp: Copy + Default + Send + Sync + 'static {
    fn apply<T: DType>(v: T) -> T;
    /// C expression applying this op to `v`, an expression of type `T`.
    fn render<T: DType>(v: &str) -> String;
}

macro_rules! binary_op {
    ($name:ident, $c_op:literal, $method:ident) => {
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;

        impl BinaryOp for $name {
            const C_OP: &'static str = $c_op;
            #[inline]
            fn apply<T: DType>(l: T, r: T) -> T {
                l.$method(r)
            }
        }
    };
}

binary_op!(Plus, "+", wrapping_add);
binary_op!(Minus, "-", wrapping_sub);
binary_op!(Times, "*", wrapping_mul);

/// Integer division by zero yields zero on every space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Divide;

impl BinaryOp for Divide {
    const C_OP: &'static str = "/";
    #[inline]
    fn apply<T: DType>(l: T, r: T) -> T {
        l.wrapping_div(r)
    }
    fn render<T: DType>(l: &str, r: &str) -> String {
        if T::INTEGRAL {
            format!(
                "({r} == 0 ? static_cast<{t}>(0) : static_cast<{t}>({l} / {r}))",
                t = T::C_NAME
            )
        } else {
            format!("({l} / {r})")
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Negate;

impl UnaryOp for Negate {
    #[inline]
    fn apply<T: DType>(v: T) -> T {
        v.negate()
    }
    fn render<T: DType>(v: &str) -> String {
        format!("(-{v})")
    }
}

macro_rules! math_op {
    ($name:ident, $method:ident, $c_fn:literal) => {
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;

        impl UnaryOp for $name {
            #[inline]
            fn apply<T: DType>(v: T) -> T {
                v.$method()
            }
            fn render<T: DType>(v: &str) -> String {
                if T::COMPLEX {
                    format!("{}({}({v}))", T::C_NAME, $c_fn)
                } else {
                    format!(
                        "static_cast<{}>({}(static_cast<double>({v})))",
                        T::C_NAME,
                        $c_fn
                    )
                }
            }
        }
    };
}

math_op!(Sqrt, sqrt, "sqrt");
math_op!(Exp, exp, "exp");
math_op!(Abs, abs, "abs");
math_op!(Sin, sin, "sin");
math_op!(Cos, cos, "cos");

/// `lhs <O> rhs`, broadcasting.
#[derive(Debug, Clone, Copy)]
pub struct Binary<O, L, R> {
    lhs: L,
    rhs: R,
    _op: PhantomData<O>,
}

impl<O, L, R> Binary<O, L, R> {
    pub fn new(lhs: L, rhs: R) -> Self {
        Self {
            lhs,
            rhs,
            _op: PhantomData,
        }
    }
}

impl<O: BinaryOp, L, R, const N: usize> Expression<N> for Binary<O, L, R>
where
    L: Expression<N>,
    R: Expression<N, Elem = L::Elem>,
{
    type Elem = L::Elem;
    type Kernel = Binary<O, L::Kernel, R::Kernel>;

    fn shape(&self) -> Result<Shape<N>> {
        self.lhs.shape()?.broadcast(&self.rhs.shape()?)
    }

    fn check_space(&self, space: SpaceId) -> Result<()> {
        self.lhs.check_space(space)?;
        self.rhs.check_space(space)
    }

    unsafe fn to_kernel(&self, shape: &Shape<N>) -> Self::Kernel {
        Binary::new(self.lhs.to_kernel(shape), self.rhs.to_kernel(shape))
    }
}

impl<O: BinaryOp, L, R, const N: usize> Kernel<N> for Binary<O, L, R>
where
    L: Kernel<N>,
    R: Kernel<N, Elem = L::Elem>,
{
    type Elem = L::Elem;

    #[inline]
    unsafe fn at(&self, idx: &[usize; N]) -> Self::Elem {
        O::apply(self.lhs.at(idx), self.rhs.at(idx))
    }

    fn emit(&self, src: &mut KernelSource) -> String {
        let l = self.lhs.emit(src);
        let r = self.rhs.emit(src);
        O::render::<L::Elem>(&l, &r)
    }
}

/// `<O>(inner)`, elementwise.
#[derive(Debug, Clone, Copy)]
pub struct Unary<O, E> {
    inner: E,
    _op: PhantomData<O>,
}

impl<O, E> Unary<O, E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            _op: PhantomData,
        }
    }
}

impl<O: UnaryOp, E: Expression<N>, const N: usize> Expression<N> for Unary<O, E> {
    type Elem = E::Elem;
    type Kernel = Unary<O, E::Kernel>;

    fn shape(&self) -> Result<Shape<N>> {
        self.inner.shape()
    }

    fn check_space(&self, space: SpaceId) -> Result<()> {
        self.inner.check_space(space)
    }

    unsafe fn to_kernel(&self, shape: &Shape<N>) -> Self::Kernel {
        Unary::new(self.inner.to_kernel(shape))
    }
}

impl<O: UnaryOp, E: Kernel<N>, const N: usize> Kernel<N> for Unary<O, E> {
    type Elem = E::Elem;

    #[inline]
    unsafe fn at(&self, idx: &[usize; N]) -> Self::Elem {
        O::apply(self.inner.at(idx))
    }

    fn emit(&self, src: &mut KernelSource) -> String {
        let v = self.inner.emit(src);
        O::render::<E::Elem>(&v)
    }
}

/// Elementwise conversion to `U` with `as` semantics. Complex to real keeps the real part.
#[derive(Debug, Clone, Copy)]
pub struct Cast<E, U> {
    inner: E,
    _to: PhantomData<U>,
}

impl<E, U> Cast<E, U> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            _to: PhantomData,
        }
    }
}

impl<E: Expression<N>, U: DType, const N: usize> Expression<N> for Cast<E, U>
where
    E::Elem: CastTo<U>,
{
    type Elem = U;
    type Kernel = Cast<E::Kernel, U>;

    fn shape(&self) -> Result<Shape<N>> {
        self.inner.shape()
    }

    fn check_space(&self, space: SpaceId) -> Result<()> {
        self.inner.check_space(space)
    }

    unsafe fn to_kernel(&self, shape: &Shape<N>) -> Self::Kernel {
        Cast::new(self.inner.to_kernel(shape))
    }
}

impl<E: Kernel<N>, U: DType, const N: usize> Kernel<N> for Cast<E, U>
where
    E::Elem: CastTo<U>,
{
    type Elem = U;

    #[inline]
    unsafe fn at(&self, idx: &[usize; N]) -> U {
        self.inner.at(idx).cast_to()
    }

    fn emit(&self, src: &mut KernelSource) -> String {
        src.require::<U>();
        let v = self.inner.emit(src);
        if E::Elem::COMPLEX && !U::COMPLEX {
            format!("static_cast<{}>(({v}).real())", U::C_NAME)
        } else if E::Elem::COMPLEX {
            format!("{}(({v}).real(), ({v}).imag())", U::C_NAME)
        } else {
            format!("static_cast<{}>({v})", U::C_NAME)
        }
    }
}

pub fn sqrt<E>(e: E) -> Unary<Sqrt, E> {
    Unary::new(e)
}

pub fn exp<E>(e: E) -> Unary<Exp, E> {
    Unary::new(e)
}

pub fn abs<E>(e: E) -> Unary<Abs, E> {
    Unary::new(e)
}

pub fn sin<E>(e: E) -> Unary<Sin, E> {
    Unary::new(e)
}

pub fn cos<E>(e: E) -> Unary<Cos, E> {
    Unary::new(e)
}

/// Convert every element to `U`.
pub fn cast<U: DType, E>(e: E) -> Cast<E, U> {
    Cast::new(e)
}

macro_rules! expr_ops {
    ([$($gen:tt)*] $ty:ty) => {
        impl<$($gen)*, Rhs> std::ops::Add<Rhs> for $ty {
            type Output = Binary<Plus, Self, Rhs>;
            fn add(self, rhs: Rhs) -> Self::Output {
                Binary::new(self, rhs)
            }
        }

        impl<$($gen)*, Rhs> std::ops::Sub<Rhs> for $ty {
            type Output = Binary<Minus, Self, Rhs>;
            fn sub(self, rhs: Rhs) -> Self::Output {
                Binary::new(self, rhs)
            }
        }

        impl<$($gen)*, Rhs> std::ops::Mul<Rhs> for $ty {
            type Output = Binary<Times, Self, Rhs>;
            fn mul(self, rhs: Rhs) -> Self::Output {
                Binary::new(self, rhs)
            }
        }

        impl<$($gen)*, Rhs> std::ops::Div<Rhs> for $ty {
            type Output = Binary<Divide, Self, Rhs>;
            fn div(self, rhs: Rhs) -> Self::Output {
                Binary::new(self, rhs)
            }
        }

        impl<$($gen)*> std::ops::Neg for $ty {
            type Output = Unary<Negate, Self>;
            fn neg(self) -> Self::Output {
                Unary::new(self)
            }
        }
    };
}

expr_ops!(['a, T: DType, const N: usize, S: Space] &'a Tensor<T, N, S>);
expr_ops!(['a, T: DType, const N: usize, S: Space] TensorView<'a, T, N, S>);
expr_ops!(['a, 'b, T: DType, const N: usize, S: Space] &'b TensorViewMut<'a, T, N, S>);
expr_ops!([T: DType, const N: usize, S: Space] TensorSpan<T, N, S>);
expr_ops!([O, L, R] Binary<O, L, R>);
expr_ops!([O, E] Unary<O, E>);
expr_ops!([E, U] Cast<E, U>);
expr_ops!([T] Scalar<T>);

/// `scalar <op> node` for primitive scalars on the left.
macro_rules! scalar_lhs_ops {
    ($scalar:ty; $([$($gen:tt)*] $ty:ty),* $(,)?) => {$(
        impl<$($gen)*> std::ops::Add<$ty> for $scalar {
            type Output = Binary<Plus, $scalar, $ty>;
            fn add(self, rhs: $ty) -> Self::Output {
                Binary::new(self, rhs)
            }
        }

        impl<$($gen)*> std::ops::Sub<$ty> for $scalar {
            type Output = Binary<Minus, $scalar, $ty>;
            fn sub(self, rhs: $ty) -> Self::Output {
                Binary::new(self, rhs)
            }
        }

        impl<$($gen)*> std::ops::Mul<$ty> for $scalar {
            type Output = Binary<Times, $scalar, $ty>;
            fn mul(self, rhs: $ty) -> Self::Output {
                Binary::new(self, rhs)
            }
        }

        impl<$($gen)*> std::ops::Div<$ty> for $scalar {
            type Output = Binary<Divide, $scalar, $ty>;
            fn div(self, rhs: $ty) -> Self::Output {
                Binary::new(self, rhs)
            }
        }
    )*};
}

macro_rules! scalar_lhs {
    ($($scalar:ty),*) => {$(
        scalar_lhs_ops!($scalar;
            ['a, const N: usize, S: Space] &'a Tensor<$scalar, N, S>,
            ['a, const N: usize, S: Space] TensorView<'a, $scalar, N, S>,
            ['a, 'b, const N: usize, S: Space] &'b TensorViewMut<'a, $scalar, N, S>,
            [const N: usize, S: Space] TensorSpan<$scalar, N, S>,
            [O, L, R] Binary<O, L, R>,
            [O, E] Unary<O, E>,
            [E, U] Cast<E, U>,
        );
    )*};
}

scalar_lhs!(u8, u32, i32, i64, f32, f64);
