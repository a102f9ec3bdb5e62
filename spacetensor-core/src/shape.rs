use std::{
    fmt,
    ops::{Index, IndexMut},
};

use crate::{Error, Result};

/// Extents of a rank-`N` array.
///
/// Equality compares extents only; see [`Layout`] for layout equality.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape<const N: usize>([usize; N]);

/// Per-dimension element offsets. Negative strides come from reversed slices.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Strides<const N: usize>([isize; N]);

/// Build a shape from its extents.
pub fn shape<const N: usize>(dims: [usize; N]) -> Shape<N> {
    Shape(dims)
}

impl<const N: usize> Shape<N> {
    pub const fn new(dims: [usize; N]) -> Self {
        Self(dims)
    }

    /// A shape of rank `N` with every extent 1, the shape of a broadcast scalar.
    pub const fn ones() -> Self {
        Self([1; N])
    }

    /// Build from a signed integer sequence whose length must equal `N`.
    pub fn from_slice(dims: &[i64]) -> Result<Self> {
        if dims.len() != N {
            return Err(Error::RankMismatch {
                expected: N,
                found: dims.len(),
            }
            .bt());
        }
        let mut out = [0usize; N];
        for (d, (o, &v)) in out.iter_mut().zip(dims).enumerate() {
            if v < 0 {
                crate::bail!("negative extent {v} for dimension {d}");
            }
            *o = v as usize;
        }
        Ok(Self(out))
    }

    pub const fn rank(&self) -> usize {
        N
    }

    pub fn dims(&self) -> &[usize; N] {
        &self.0
    }

    /// Number of elements; 1 for rank 0.
    pub fn size(&self) -> usize {
        self.0.iter().product()
    }

    /// Column-major strides: dimension 0 is contiguous.
    pub fn default_strides(&self) -> Strides<N> {
        let mut strides = [0isize; N];
        let mut acc = 1isize;
        for (s, &d) in strides.iter_mut().zip(&self.0) {
            *s = acc;
            acc *= d as isize;
        }
        Strides(strides)
    }

    /// Broadcast two shapes: extent 1 stretches to the other extent.
    pub fn broadcast(&self, other: &Self) -> Result<Self> {
        let mut out = self.0;
        for (o, &b) in out.iter_mut().zip(&other.0) {
            if *o == b || b == 1 {
                continue;
            }
            if *o == 1 {
                *o = b;
            } else {
                return Err(Error::shape_mismatch(&self.0, &other.0));
            }
        }
        Ok(Self(out))
    }

    /// Check that `self` broadcasts to exactly `target`.
    pub fn broadcasts_to(&self, target: &Self) -> Result<()> {
        let ok = self
            .0
            .iter()
            .zip(&target.0)
            .all(|(&s, &t)| s == t || s == 1);
        if ok {
            Ok(())
        } else {
            Err(Error::shape_mismatch(&target.0, &self.0))
        }
    }

    pub(crate) fn contains(&self, idx: &[usize; N]) -> bool {
        idx.iter().zip(&self.0).all(|(&i, &e)| i < e)
    }
}

impl<const N: usize> Default for Shape<N> {
    fn default() -> Self {
        Self([0; N])
    }
}

impl<const N: usize> From<[usize; N]> for Shape<N> {
    fn from(dims: [usize; N]) -> Self {
        Self(dims)
    }
}

impl<const N: usize> Index<usize> for Shape<N> {
    type Output = usize;

    fn index(&self, d: usize) -> &usize {
        &self.0[d]
    }
}

impl<const N: usize> IndexMut<usize> for Shape<N> {
    fn index_mut(&mut self, d: usize) -> &mut usize {
        &mut self.0[d]
    }
}

impl<const N: usize> PartialEq<[usize; N]> for Shape<N> {
    fn eq(&self, other: &[usize; N]) -> bool {
        &self.0 == other
    }
}

fn write_tuple<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    write!(f, "(")?;
    for (i, v) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{v}")?;
    }
    write!(f, ")")
}

impl<const N: usize> fmt::Display for Shape<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_tuple(f, &self.0)
    }
}

impl<const N: usize> fmt::Debug for Shape<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shape")?;
        write_tuple(f, &self.0)
    }
}

impl<const N: usize> Strides<N> {
    pub const fn new(strides: [isize; N]) -> Self {
        Self(strides)
    }

    pub fn values(&self) -> &[isize; N] {
        &self.0
    }
}

impl<const N: usize> From<[isize; N]> for Strides<N> {
    fn from(strides: [isize; N]) -> Self {
        Self(strides)
    }
}

impl<const N: usize> Index<usize> for Strides<N> {
    type Output = isize;

    fn index(&self, d: usize) -> &isize {
        &self.0[d]
    }
}

impl<const N: usize> fmt::Debug for Strides<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Strides")?;
        write_tuple(f, &self.0)
    }
}

/// Shape plus strides: where each element of a strided array lives.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Layout<const N: usize> {
    shape: Shape<N>,
    strides: Strides<N>,
}

impl<const N: usize> Layout<N> {
    pub fn new(shape: Shape<N>, strides: Strides<N>) -> Self {
        Self { shape, strides }
    }

    /// Column-major layout of `shape`.
    pub fn contiguous(shape: Shape<N>) -> Self {
        Self {
            shape,
            strides: shape.default_strides(),
        }
    }

    pub fn shape(&self) -> &Shape<N> {
        &self.shape
    }

    pub fn strides(&self) -> &Strides<N> {
        &self.strides
    }

    pub fn size(&self) -> usize {
        self.shape.size()
    }

    /// Linear element offset of `idx`. Bounds are only checked in debug builds.
    #[inline]
    pub fn offset(&self, idx: &[usize; N]) -> isize {
        debug_assert!(
            self.shape.contains(idx),
            "index {idx:?} out of bounds for {}",
            self.shape
        );
        idx.iter()
            .zip(&self.strides.0)
            .map(|(&i, &s)| i as isize * s)
            .sum()
    }

    /// True when the elements are laid out densely in column-major order.
    ///
    /// Strides of extent-1 dimensions are ignored.
    pub fn is_f_contiguous(&self) -> bool {
        let mut expected = 1isize;
        for (&e, &s) in self.shape.0.iter().zip(&self.strides.0) {
            if e != 1 && s != expected {
                return false;
            }
            expected *= e as isize;
        }
        true
    }

    /// The same memory viewed at `target`: extent-1 dimensions read with stride 0.
    pub(crate) fn broadcast_to(&self, target: &Shape<N>) -> Self {
        let mut strides = self.strides.0;
        for ((s, &e), &t) in strides.iter_mut().zip(&self.shape.0).zip(&target.0) {
            if e != t {
                *s = 0;
            }
        }
        Self {
            shape: *target,
            strides: Strides(strides),
        }
    }
}

impl<const N: usize> Default for Layout<N> {
    fn default() -> Self {
        Self::contiguous(Shape::default())
    }
}

/// Visit every index of `shape` with dimension 0 varying fastest.
pub fn for_each_index<const N: usize, F: FnMut(&[usize; N])>(shape: &Shape<N>, mut f: F) {
    if shape.size() == 0 {
        return;
    }
    let mut idx = [0usize; N];
    loop {
        f(&idx);
        let mut d = 0;
        loop {
            if d == N {
                return;
            }
            idx[d] += 1;
            if idx[d] < shape[d] {
                break;
            }
            idx[d] = 0;
            d += 1;
        }
    }
}

/// Recover the index of the `linear`-th element of `shape` in column-major order.
#[inline]
pub fn unravel<const N: usize>(mut linear: usize, shape: &Shape<N>) -> [usize; N] {
    let mut idx = [0usize; N];
    for (i, &e) in idx.iter_mut().zip(&shape.0) {
        *i = linear % e;
        linear /= e;
    }
    idx
}
