use std::ops::{Range, RangeFrom, RangeFull, RangeTo};

use crate::{Error, Layout, Result, Shape, Strides};

/// One entry of a slicing request, applied to one dimension.
///
/// Negative positions count from the end: `-k` means `extent - k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slice {
    /// Keep the dimension.
    All,
    /// Keep `[start, stop)` every `step` elements. `None` means the natural end for
    /// the direction of `step`.
    Range {
        start: Option<isize>,
        stop: Option<isize>,
        step: isize,
    },
    /// Fix the dimension at one position and drop it.
    Index(isize),
    /// Insert a new dimension of extent 1 that broadcasts.
    NewAxis,
}

pub fn all() -> Slice {
    Slice::All
}

pub fn range(start: isize, stop: isize) -> Slice {
    Slice::Range {
        start: Some(start),
        stop: Some(stop),
        step: 1,
    }
}

pub fn range_step(start: Option<isize>, stop: Option<isize>, step: isize) -> Slice {
    Slice::Range { start, stop, step }
}

/// The whole dimension, back to front.
pub fn reversed() -> Slice {
    range_step(None, None, -1)
}

pub fn index(i: isize) -> Slice {
    Slice::Index(i)
}

pub fn newaxis() -> Slice {
    Slice::NewAxis
}

impl From<RangeFull> for Slice {
    fn from(_: RangeFull) -> Self {
        Slice::All
    }
}

impl From<Range<isize>> for Slice {
    fn from(r: Range<isize>) -> Self {
        range(r.start, r.end)
    }
}

impl From<RangeFrom<isize>> for Slice {
    fn from(r: RangeFrom<isize>) -> Self {
        range_step(Some(r.start), None, 1)
    }
}

impl From<RangeTo<isize>> for Slice {
    fn from(r: RangeTo<isize>) -> Self {
        range_step(None, Some(r.end), 1)
    }
}

impl From<isize> for Slice {
    fn from(i: isize) -> Self {
        Slice::Index(i)
    }
}

/// `a / b` rounded up, for `a >= 0` and `b > 0`.
fn ceil_div(a: isize, b: isize) -> isize {
    (a + b - 1) / b
}

fn invalid(dim: usize, reason: String) -> Error {
    Error::InvalidSlice { dim, reason }.bt()
}

/// Apply `specs` to `layout`, returning the rank-`M` layout and the element offset of
/// its first element. Missing trailing entries keep their dimensions.
pub(crate) fn slice_layout<const N: usize, const M: usize>(
    layout: &Layout<N>,
    specs: &[Slice],
) -> Result<(Layout<M>, isize)> {
    let mut shape = Vec::with_capacity(M);
    let mut strides = Vec::with_capacity(M);
    let mut offset = 0isize;
    let mut dim = 0usize;

    let consumed = specs.iter().filter(|s| **s != Slice::NewAxis).count();
    if consumed > N {
        return Err(invalid(
            N,
            format!("{consumed} dimensions sliced but the array has rank {N}"),
        ));
    }

    for spec in specs {
        if let Slice::NewAxis = spec {
            shape.push(1usize);
            strides.push(0isize);
            continue;
        }
        let extent = layout.shape()[dim] as isize;
        let stride = layout.strides()[dim];
        let norm = |x: isize| if x < 0 { x + extent } else { x };
        match *spec {
            Slice::All => {
                shape.push(extent as usize);
                strides.push(stride);
            }
            Slice::Index(i) => {
                let i = norm(i);
                if i < 0 || i >= extent {
                    return Err(invalid(
                        dim,
                        format!("index {i} out of range for extent {extent}"),
                    ));
                }
                offset += i * stride;
            }
            Slice::Range { start, stop, step } => {
                if step == 0 {
                    return Err(invalid(dim, "step must not be zero".to_string()));
                }
                let (start, len) = if step > 0 {
                    let start = start.map(norm).unwrap_or(0).clamp(0, extent);
                    let stop = stop.map(norm).unwrap_or(extent).clamp(0, extent);
                    (start, ceil_div((stop - start).max(0), step))
                } else {
                    let start = start.map(norm).unwrap_or(extent - 1).clamp(-1, extent - 1);
                    let stop = stop.map(norm).unwrap_or(-1).clamp(-1, extent - 1);
                    (start, ceil_div((start - stop).max(0), -step))
                };
                if len > 0 {
                    offset += start * stride;
                }
                shape.push(len as usize);
                strides.push(stride * step);
            }
            Slice::NewAxis => continue,
        }
        dim += 1;
    }
    for d in dim..N {
        shape.push(layout.shape()[d]);
        strides.push(layout.strides()[d]);
    }

    if shape.len() != M {
        return Err(Error::RankMismatch {
            expected: M,
            found: shape.len(),
        }
        .bt());
    }
    let mut out_shape = [0usize; M];
    out_shape.copy_from_slice(&shape);
    let mut out_strides = [0isize; M];
    out_strides.copy_from_slice(&strides);
    Ok((
        Layout::new(Shape::new(out_shape), Strides::new(out_strides)),
        offset,
    ))
}
