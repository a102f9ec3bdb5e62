//! Spacetensor is an N-dimensional array library where every array is tagged at compile
//! time with the memory space it lives in.
//!
//! Arithmetic on arrays does not compute anything: it builds an expression tree which is
//! evaluated, in one pass and without temporaries, when it is assigned to a destination.
//! The destination's space decides how: a sequential loop for [`Host`], a launch grid on
//! a thread pool for [`Threads`], and a JIT-compiled kernel for `Cuda<ORD>` devices.
//!
//! Arrays are column-major: dimension 0 varies fastest.
//!
//! ## A quick guide
//! - Own data with a [`Tensor`]; borrow it with [`TensorView`] and [`TensorViewMut`], or
//!   select a strided window with [`Tensor::slice`].
//! - Combine tensors, views and scalars with `+ - * /`, negation and the functions in
//!   [`ops`]. Operands broadcast along extent-1 dimensions.
//! - Evaluate with [`Tensor::assign`], [`eval`] or [`Tensor::from_expr`]. Every operand
//!   must live in the destination's space; move data between spaces with [`copy`] or
//!   [`Tensor::to_space`].
//!
//! ## What can you do with it?
//! ```
//! use spacetensor_core::{ops, Host, Tensor, Threads};
//!
//! let a = Tensor::<f64, 2, Threads>::full([3, 4], 2.0);
//! let b = Tensor::<f64, 2, Threads>::from_nested([[1.0], [2.0], [3.0], [4.0]]).unwrap();
//!
//! let mut c = Tensor::<f64, 2, Threads>::new();
//! c.assign(ops::sqrt(&a * &a) + &b).unwrap();
//!
//! let c: Tensor<f64, 2, Host> = c.to_host().unwrap();
//! assert_eq!(c.shape(), &[3, 4]);
//! assert_eq!(c[[2, 3]], 6.0);
//! ```

pub mod config;
mod copy;
#[cfg(feature = "cuda")]
pub mod cuda_backend;
mod device;
mod dtype;
mod error;
pub mod expr;
mod host_backend;
pub mod kernel;
pub mod launch;
mod shape;
mod storage;
mod tensor;

pub use config::ExecConfig;
pub use copy::{copy, AsSpan, AsSpanMut};
#[cfg(feature = "cuda")]
pub use device::Cuda;
pub use device::{copy_n, synchronize, Host, HostAccessible, Space, SpaceId, Threads};
pub use dtype::{CastTo, DType, DTypeOps, ElemMath};
pub use error::{Context, Error, Result};
pub use expr::{eval, ops, scalar, Expression, Scalar};
pub use host_backend::{launch_host, launch_threads};
pub use shape::{for_each_index, shape, unravel, Layout, Shape, Strides};
pub use storage::Storage;
pub use tensor::{
    literal::NdLiteral,
    slice::{all, index, newaxis, range, range_step, reversed},
    Slice, Tensor, TensorSpan, TensorView, TensorViewMut,
};
