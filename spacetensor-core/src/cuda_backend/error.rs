use cudarc::{driver::DriverError, nvrtc::CompileError};

use crate::error::fatal;

/// cudarc related errors
#[derive(thiserror::Error, Debug)]
pub enum CudaError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("error when compiling to ptx: {0:?}")]
    Compile(#[from] CompileError),

    #[error("{cuda} when loading {kernel}")]
    Load { cuda: DriverError, kernel: String },
}

/// Unwrap a driver or compiler result, aborting on failure.
///
/// A failed driver call leaves the device in an unknown state.
pub(crate) trait WrapErr<O> {
    fn w(self) -> O;
}

impl<O, E: Into<CudaError>> WrapErr<O> for std::result::Result<O, E> {
    fn w(self) -> O {
        match self {
            Ok(v) => v,
            Err(e) => {
                let e: CudaError = e.into();
                fatal(e)
            }
        }
    }
}
