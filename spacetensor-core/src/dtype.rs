use std::{
    fmt::Debug,
    ops::{Add, Div, Mul, Sub},
};

#[cfg(feature = "bfloat")]
use half::bf16;
#[cfg(feature = "half")]
use half::f16;
use num_complex::Complex;

/// Elementwise math used by the expression nodes.
///
/// Integer arithmetic wraps and integer division by zero yields zero. Integral math
/// functions go through `f64` and truncate back.
pub trait ElemMath: Sized {
    fn wrapping_add(self, rhs: Self) -> Self;
    fn wrapping_sub(self, rhs: Self) -> Self;
    fn wrapping_mul(self, rhs: Self) -> Self;
    fn wrapping_div(self, rhs: Self) -> Self;
    fn negate(self) -> Self;
    fn sqrt(self) -> Self;
    fn exp(self) -> Self;
    fn abs(self) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
}

macro_rules! elem_math_float {
    ($t:ty) => {
        impl ElemMath for $t {
            fn wrapping_add(self, rhs: Self) -> Self {
                self + rhs
            }
            fn wrapping_sub(self, rhs: Self) -> Self {
                self - rhs
            }
            fn wrapping_mul(self, rhs: Self) -> Self {
                self * rhs
            }
            fn wrapping_div(self, rhs: Self) -> Self {
                self / rhs
            }
            fn negate(self) -> Self {
                -self
            }
            fn sqrt(self) -> Self {
                <$t>::sqrt(self)
            }
            fn exp(self) -> Self {
                <$t>::exp(self)
            }
            fn abs(self) -> Self {
                <$t>::abs(self)
            }
            fn sin(self) -> Self {
                <$t>::sin(self)
            }
            fn cos(self) -> Self {
                <$t>::cos(self)
            }
        }
    };
}

macro_rules! elem_math_integral {
    (@impl $t:ty, $abs:expr) => {
        impl ElemMath for $t {
            fn wrapping_add(self, rhs: Self) -> Self {
                <$t>::wrapping_add(self, rhs)
            }
            fn wrapping_sub(self, rhs: Self) -> Self {
                <$t>::wrapping_sub(self, rhs)
            }
            fn wrapping_mul(self, rhs: Self) -> Self {
                <$t>::wrapping_mul(self, rhs)
            }
            fn wrapping_div(self, rhs: Self) -> Self {
                if rhs == 0 {
                    0
                } else {
                    <$t>::wrapping_div(self, rhs)
                }
            }
            fn negate(self) -> Self {
                self.wrapping_neg()
            }
            fn sqrt(self) -> Self {
                (self as f64).sqrt() as $t
            }
            fn exp(self) -> Self {
                (self as f64).exp() as $t
            }
            fn abs(self) -> Self {
                ($abs)(self)
            }
            fn sin(self) -> Self {
                (self as f64).sin() as $t
            }
            fn cos(self) -> Self {
                (self as f64).cos() as $t
            }
        }
    };
    ($t:ty, signed) => {
        elem_math_integral!(@impl $t, |x: $t| x.wrapping_abs());
    };
    ($t:ty, unsigned) => {
        elem_math_integral!(@impl $t, |x: $t| x);
    };
}

macro_rules! elem_math_complex {
    ($t:ty) => {
        impl ElemMath for Complex<$t> {
            fn wrapping_add(self, rhs: Self) -> Self {
                self + rhs
            }
            fn wrapping_sub(self, rhs: Self) -> Self {
                self - rhs
            }
            fn wrapping_mul(self, rhs: Self) -> Self {
                self * rhs
            }
            fn wrapping_div(self, rhs: Self) -> Self {
                self / rhs
            }
            fn negate(self) -> Self {
                -self
            }
            fn sqrt(self) -> Self {
                Complex::<$t>::sqrt(self)
            }
            fn exp(self) -> Self {
                Complex::<$t>::exp(self)
            }
            fn abs(self) -> Self {
                Complex::new(self.norm(), 0.0)
            }
            fn sin(self) -> Self {
                Complex::<$t>::sin(self)
            }
            fn cos(self) -> Self {
                Complex::<$t>::cos(self)
            }
        }
    };
}

#[cfg(any(feature = "half", feature = "bfloat"))]
macro_rules! elem_math_half {
    ($t:ty) => {
        impl ElemMath for $t {
            fn wrapping_add(self, rhs: Self) -> Self {
                self + rhs
            }
            fn wrapping_sub(self, rhs: Self) -> Self {
                self - rhs
            }
            fn wrapping_mul(self, rhs: Self) -> Self {
                self * rhs
            }
            fn wrapping_div(self, rhs: Self) -> Self {
                self / rhs
            }
            fn negate(self) -> Self {
                -self
            }
            fn sqrt(self) -> Self {
                <$t>::from_f32(self.to_f32().sqrt())
            }
            fn exp(self) -> Self {
                <$t>::from_f32(self.to_f32().exp())
            }
            fn abs(self) -> Self {
                <$t>::from_f32(self.to_f32().abs())
            }
            fn sin(self) -> Self {
                <$t>::from_f32(self.to_f32().sin())
            }
            fn cos(self) -> Self {
                <$t>::from_f32(self.to_f32().cos())
            }
        }
    };
}

elem_math_float!(f32);
elem_math_float!(f64);
elem_math_integral!(u8, unsigned);
elem_math_integral!(u32, unsigned);
elem_math_integral!(i32, signed);
elem_math_integral!(i64, signed);
elem_math_complex!(f32);
elem_math_complex!(f64);
#[cfg(feature = "half")]
elem_math_half!(f16);
#[cfg(feature = "bfloat")]
elem_math_half!(bf16);

pub trait DTypeOps:
    Copy
    + PartialEq
    + Add<Output = Self>
    + Div<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + ElemMath
{
}

/// Marker trait for tensor element types.
///
/// `C_NAME`/`C_DEP` describe the type to generated device kernels.
pub trait DType: Debug + DTypeOps + Default + Send + Sync + 'static {
    const ZERO: Self;
    const ONE: Self;
    const NAME: &'static str;
    const C_NAME: &'static str;
    const C_DEP: Option<&'static str>;
    const INTEGRAL: bool;
    const COMPLEX: bool;

    /// Real and imaginary parts widened to `f64`.
    fn to_parts(&self) -> (f64, f64);

    /// This value as kernel argument words.
    ///
    /// Integral types pass the value sign-extended to 64 bits, everything else the bits
    /// of each `f64` part. Only complex types use the second word.
    fn kernel_arg(&self) -> [u64; 2] {
        let (re, im) = self.to_parts();
        [re.to_bits(), im.to_bits()]
    }
}

/// Elementwise conversion with `as` semantics.
///
/// Conversions into a complex type set a zero imaginary part; conversions out of one
/// keep the real part.
pub trait CastTo<U>: Sized {
    fn cast_to(self) -> U;
}

macro_rules! dtype {
    ($rt:ident, $zero:expr, $one:expr, $c_repr:expr, $integral:expr) => {
        impl DTypeOps for $rt {}
        impl DType for $rt {
            const ZERO: $rt = $zero;
            const ONE: $rt = $one;
            const NAME: &'static str = stringify!($rt);
            const C_NAME: &'static str = $c_repr;
            const C_DEP: Option<&'static str> = None;
            const INTEGRAL: bool = $integral;
            const COMPLEX: bool = false;

            fn to_parts(&self) -> (f64, f64) {
                (*self as f64, 0.0)
            }
            fn kernel_arg(&self) -> [u64; 2] {
                if $integral {
                    [*self as i64 as u64, 0]
                } else {
                    [(*self as f64).to_bits(), 0]
                }
            }
        }
    };
}

dtype!(u8, 0u8, 1u8, "uint8_t", true);
dtype!(u32, 0u32, 1u32, "uint32_t", true);
dtype!(i32, 0i32, 1i32, "int", true);
dtype!(i64, 0i64, 1i64, "int64_t", true);
dtype!(f32, 0f32, 1f32, "float", false);
dtype!(f64, 0f64, 1f64, "double", false);

macro_rules! dtype_complex {
    ($t:ident, $name:expr, $c_repr:expr) => {
        impl DTypeOps for Complex<$t> {}
        impl DType for Complex<$t> {
            const ZERO: Self = Complex::new(0.0, 0.0);
            const ONE: Self = Complex::new(1.0, 0.0);
            const NAME: &'static str = $name;
            const C_NAME: &'static str = $c_repr;
            const C_DEP: Option<&'static str> = Some("#include <cuda/std/complex>");
            const INTEGRAL: bool = false;
            const COMPLEX: bool = true;

            fn to_parts(&self) -> (f64, f64) {
                (self.re as f64, self.im as f64)
            }
        }
    };
}

dtype_complex!(f32, "c32", "cuda::std::complex<float>");
dtype_complex!(f64, "c64", "cuda::std::complex<double>");

macro_rules! cast_prim {
    (@to $from:ty; $($to:ty),*) => {$(
        impl CastTo<$to> for $from {
            #[inline]
            fn cast_to(self) -> $to {
                self as $to
            }
        }
    )*};
    ($($from:ty),*) => {$(
        cast_prim!(@to $from; u8, u32, i32, i64, f32, f64);

        impl CastTo<Complex<f32>> for $from {
            fn cast_to(self) -> Complex<f32> {
                Complex::new(self as f32, 0.0)
            }
        }
        impl CastTo<Complex<f64>> for $from {
            fn cast_to(self) -> Complex<f64> {
                Complex::new(self as f64, 0.0)
            }
        }
    )*};
}

cast_prim!(u8, u32, i32, i64, f32, f64);

macro_rules! cast_complex {
    (@to $t:ty; $($to:ty),*) => {$(
        impl CastTo<$to> for Complex<$t> {
            fn cast_to(self) -> $to {
                self.re as $to
            }
        }
    )*};
    ($($t:ty),*) => {$(
        cast_complex!(@to $t; u8, u32, i32, i64, f32, f64);

        impl CastTo<Complex<f32>> for Complex<$t> {
            fn cast_to(self) -> Complex<f32> {
                Complex::new(self.re as f32, self.im as f32)
            }
        }
        impl CastTo<Complex<f64>> for Complex<$t> {
            fn cast_to(self) -> Complex<f64> {
                Complex::new(self.re as f64, self.im as f64)
            }
        }
    )*};
}

cast_complex!(f32, f64);

macro_rules! half_dtype {
    (@prim $t:ident; $($p:ty),*) => {$(
        impl CastTo<$p> for $t {
            fn cast_to(self) -> $p {
                self.to_f64() as $p
            }
        }
        impl CastTo<$t> for $p {
            fn cast_to(self) -> $t {
                $t::from_f64(self as f64)
            }
        }
    )*};
    ($t:ident, $name:expr, $c_repr:expr, $dep:expr) => {
        impl DTypeOps for $t {}
        impl DType for $t {
            const ZERO: $t = $t::from_f64_const(0.0);
            const ONE: $t = $t::from_f64_const(1.0);
            const NAME: &'static str = $name;
            const C_NAME: &'static str = $c_repr;
            const C_DEP: Option<&'static str> = Some($dep);
            const INTEGRAL: bool = false;
            const COMPLEX: bool = false;

            fn to_parts(&self) -> (f64, f64) {
                (self.to_f64_const(), 0.0)
            }
        }

        impl CastTo<$t> for $t {
            fn cast_to(self) -> $t {
                self
            }
        }

        half_dtype!(@prim $t; u8, u32, i32, i64, f32, f64);

        impl CastTo<Complex<f32>> for $t {
            fn cast_to(self) -> Complex<f32> {
                Complex::new(self.to_f32(), 0.0)
            }
        }
        impl CastTo<Complex<f64>> for $t {
            fn cast_to(self) -> Complex<f64> {
                Complex::new(self.to_f64(), 0.0)
            }
        }
        impl CastTo<$t> for Complex<f32> {
            fn cast_to(self) -> $t {
                $t::from_f32(self.re)
            }
        }
        impl CastTo<$t> for Complex<f64> {
            fn cast_to(self) -> $t {
                $t::from_f64(self.re)
            }
        }
    };
}

#[cfg(feature = "half")]
half_dtype!(f16, "f16", "__half", "#include \"cuda_fp16.h\"");
#[cfg(feature = "bfloat")]
half_dtype!(bf16, "bf16", "__nv_bfloat16", "#include \"cuda_bf16.h\"");

#[cfg(all(feature = "half", feature = "bfloat"))]
impl CastTo<bf16> for f16 {
    fn cast_to(self) -> bf16 {
        bf16::from_f32(self.to_f32())
    }
}
#[cfg(all(feature = "half", feature = "bfloat"))]
impl CastTo<f16> for bf16 {
    fn cast_to(self) -> f16 {
        f16::from_f32(self.to_f32())
    }
}
