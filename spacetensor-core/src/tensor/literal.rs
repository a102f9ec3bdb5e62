use crate::{DType, Error, Result, Shape};

/// Nested literal data for [`Tensor::from_nested`](crate::Tensor::from_nested).
///
/// The innermost list runs along dimension 0, so `[[11, 12, 13], [21, 22, 23]]` has
/// shape `(3, 2)` and its flattened order is the column-major storage order.
pub trait NdLiteral<T: DType, const N: usize> {
    fn literal_shape(&self) -> Result<Shape<N>>;
    fn flatten_into(&self, out: &mut Vec<T>);
}

impl<T: DType, const A: usize> NdLiteral<T, 1> for [T; A] {
    fn literal_shape(&self) -> Result<Shape<1>> {
        Ok(Shape::new([A]))
    }
    fn flatten_into(&self, out: &mut Vec<T>) {
        out.extend_from_slice(self);
    }
}

impl<T: DType, const A: usize, const B: usize> NdLiteral<T, 2> for [[T; A]; B] {
    fn literal_shape(&self) -> Result<Shape<2>> {
        Ok(Shape::new([A, B]))
    }
    fn flatten_into(&self, out: &mut Vec<T>) {
        for row in self {
            out.extend_from_slice(row);
        }
    }
}

impl<T: DType, const A: usize, const B: usize, const C: usize> NdLiteral<T, 3>
    for [[[T; A]; B]; C]
{
    fn literal_shape(&self) -> Result<Shape<3>> {
        Ok(Shape::new([A, B, C]))
    }
    fn flatten_into(&self, out: &mut Vec<T>) {
        for plane in self {
            for row in plane {
                out.extend_from_slice(row);
            }
        }
    }
}

fn ragged(level: usize, expected: usize, found: usize) -> Error {
    Error::msg(format!(
        "ragged nested literal: a list at depth {level} has {found} entries, expected {expected}"
    ))
}

impl<T: DType> NdLiteral<T, 1> for Vec<T> {
    fn literal_shape(&self) -> Result<Shape<1>> {
        Ok(Shape::new([self.len()]))
    }
    fn flatten_into(&self, out: &mut Vec<T>) {
        out.extend_from_slice(self);
    }
}

impl<T: DType> NdLiteral<T, 2> for Vec<Vec<T>> {
    fn literal_shape(&self) -> Result<Shape<2>> {
        let inner = self.first().map_or(0, Vec::len);
        if let Some(row) = self.iter().find(|r| r.len() != inner) {
            return Err(ragged(1, inner, row.len()));
        }
        Ok(Shape::new([inner, self.len()]))
    }
    fn flatten_into(&self, out: &mut Vec<T>) {
        for row in self {
            out.extend_from_slice(row);
        }
    }
}

impl<T: DType> NdLiteral<T, 3> for Vec<Vec<Vec<T>>> {
    fn literal_shape(&self) -> Result<Shape<3>> {
        let mid = self.first().map_or(0, Vec::len);
        let inner = self
            .first()
            .and_then(|p| p.first())
            .map_or(0, Vec::len);
        for plane in self {
            if plane.len() != mid {
                return Err(ragged(1, mid, plane.len()));
            }
            if let Some(row) = plane.iter().find(|r| r.len() != inner) {
                return Err(ragged(2, inner, row.len()));
            }
        }
        Ok(Shape::new([inner, mid, self.len()]))
    }
    fn flatten_into(&self, out: &mut Vec<T>) {
        for plane in self {
            for row in plane {
                out.extend_from_slice(row);
            }
        }
    }
}
