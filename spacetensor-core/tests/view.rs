#[cfg(feature = "cuda")]
use spacetensor_core::Cuda;
use spacetensor_core::{
    all, eval, index, newaxis, range, range_step, reversed, Error, Host, Slice, Tensor, TensorSpan,
    Threads,
};

macro_rules! test_for_space {
    ($space:ty, $name:ident) => {
        mod $name {
            use super::*;

            fn v() -> Tensor<i32, 1, $space> {
                Tensor::from_nested([10, 20, 30, 40]).unwrap()
            }

            fn m() -> Tensor<i32, 2, $space> {
                Tensor::from_nested([[11, 12, 13], [21, 22, 23]]).unwrap()
            }

            #[test]
            fn ranges_with_negative_bounds() {
                let v = v();
                assert_eq!(v.slice::<1>(&[range(1, 3)]).unwrap().to_vec(), vec![20, 30]);
                assert_eq!(v.slice::<1>(&[range(1, -1)]).unwrap().to_vec(), vec![20, 30]);
                assert_eq!(v.slice::<1>(&[(-2..).into()]).unwrap().to_vec(), vec![30, 40]);
                assert_eq!(v.slice::<1>(&[(..1).into()]).unwrap().to_vec(), vec![10]);
                assert_eq!(v.slice::<1>(&[range(3, 1)]).unwrap().size(), 0);
            }

            #[test]
            fn steps_and_reversal() {
                let v = v();
                let r = v.slice::<1>(&[reversed()]).unwrap();
                assert_eq!(r.strides().values(), &[-1]);
                assert!(!r.is_f_contiguous());
                assert_eq!(r.to_vec(), vec![40, 30, 20, 10]);
                let even = v.slice::<1>(&[range_step(None, None, 2)]).unwrap();
                assert_eq!(even.to_vec(), vec![10, 30]);
                let back = v.slice::<1>(&[range_step(Some(-1), None, -2)]).unwrap();
                assert_eq!(back.to_vec(), vec![40, 20]);
            }

            #[test]
            fn index_drops_a_dimension() {
                let m = m();
                let col = m.slice::<1>(&[all(), index(1)]).unwrap();
                assert_eq!(col.shape(), &[3]);
                assert_eq!(col.to_vec(), vec![21, 22, 23]);
                let row = m.slice::<1>(&[index(-1)]).unwrap();
                assert_eq!(row.strides().values(), &[3]);
                assert_eq!(row.to_vec(), vec![13, 23]);
                let one = m.slice::<0>(&[index(0), index(0)]).unwrap();
                assert_eq!(one.to_vec(), vec![11]);
            }

            #[test]
            fn newaxis_broadcasts() {
                let v = v();
                let col = v.slice::<2>(&[all(), newaxis()]).unwrap();
                assert_eq!(col.shape(), &[4, 1]);
                let wide = Tensor::<i32, 2, $space>::zeros([4, 3]);
                let out = eval::<$space, _, 2>(&wide + col).unwrap();
                assert_eq!(
                    out.to_vec().unwrap(),
                    [10, 20, 30, 40].repeat(3)
                );
            }

            #[test]
            fn invalid_slices_fail() {
                let m = m();
                let err = m.slice::<1>(&[index(3)]).unwrap_err();
                assert!(matches!(err.inner(), Error::InvalidSlice { dim: 0, .. }));
                let err = m.slice::<2>(&[all(), range_step(None, None, 0)]).unwrap_err();
                assert!(matches!(err.inner(), Error::InvalidSlice { dim: 1, .. }));
                let err = m.slice::<2>(&[all(), all(), all()]).unwrap_err();
                assert!(matches!(err.inner(), Error::InvalidSlice { .. }));
                let err = m.slice::<2>(&[index(0)]).unwrap_err();
                assert!(matches!(
                    err.inner(),
                    Error::RankMismatch {
                        expected: 2,
                        found: 1
                    }
                ));
            }

            #[test]
            fn assign_through_a_mutable_view() {
                let mut m = m();
                {
                    let mut inner = m.slice_mut::<2>(&[range(1, 3), Slice::All]).unwrap();
                    assert_eq!(inner.shape(), &[2, 2]);
                    inner.fill(0).unwrap();
                    inner.assign_add(5).unwrap();
                }
                assert_eq!(m.to_vec().unwrap(), vec![11, 5, 5, 21, 5, 5]);

                let src = Tensor::<i32, 1, $space>::from_nested([7, 8]).unwrap();
                let mut row = m.slice_mut::<1>(&[index(0)]).unwrap();
                row.assign(&src).unwrap();
                assert_eq!(m.to_vec().unwrap(), vec![7, 5, 5, 8, 5, 5]);
            }

            #[test]
            fn reversed_view_into_itself() {
                let mut a = Tensor::<i32, 1, $space>::from_nested([1, 2, 3, 4]).unwrap();
                let b = a.clone();
                let mut view = a.view_mut().unwrap();
                view.assign(b.slice::<1>(&[reversed()]).unwrap()).unwrap();
                assert_eq!(a.to_vec().unwrap(), vec![4, 3, 2, 1]);
            }

            #[test]
            fn view_to_tensor_is_contiguous() {
                let m = m();
                let t = m.slice::<2>(&[range_step(None, None, 2)]).unwrap().to_tensor();
                assert!(t.is_f_contiguous());
                assert_eq!(t.shape(), &[2, 2]);
                assert_eq!(t.to_vec().unwrap(), vec![11, 13, 21, 23]);
            }

            #[test]
            fn views_compare_by_value() {
                let m = m();
                let a = m.slice::<1>(&[index(0)]).unwrap();
                let b = Tensor::<i32, 1, $space>::from_nested([11, 21]).unwrap();
                assert_eq!(a, b);
                assert_ne!(a, m.slice::<1>(&[index(1)]).unwrap());
            }

            #[test]
            fn spans_are_expressions() {
                let m = m();
                // SAFETY: `m` outlives the span and is not written while it is in use.
                let span = unsafe {
                    TensorSpan::<i32, 2, $space>::adapt(m.as_ptr() as *mut i32, *m.shape())
                };
                let out = eval::<$space, _, 2>(span * 2).unwrap();
                assert_eq!(out.to_vec().unwrap(), vec![22, 24, 26, 42, 44, 46]);
            }
        }
    };
}

test_for_space!(Host, host_tests);
test_for_space!(Threads, threads_tests);
#[cfg(feature = "cuda")]
test_for_space!(Cuda<0>, cuda_tests);

#[test]
fn host_views_index_elements() {
    let mut m = Tensor::<f64, 2>::from_nested([[1., 2.], [3., 4.]]).unwrap();
    let t = m.slice::<2>(&[reversed()]).unwrap();
    assert_eq!(t[[0, 1]], 4.);
    let mut w = m.view_mut().unwrap();
    w[[1, 1]] = 9.;
    assert_eq!(w.as_view()[[1, 1]], 9.);
    assert_eq!(m.as_slice(), &[1., 2., 3., 9.]);
}

#[test]
fn raw_spans_over_foreign_buffers() {
    let mut data = vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
    // SAFETY: `data` holds 6 host elements and outlives the span.
    let span = unsafe { TensorSpan::<f32, 2, Host>::adapt(data.as_mut_ptr(), [2, 3].into()) };
    let doubled = eval::<Host, _, 2>(span + span).unwrap();
    assert_eq!(doubled.to_vec().unwrap(), vec![2.0, 4.0, 6.0, 8.0, 10.0, 12.0]);

    // SAFETY: the transposed strides stay inside the same buffer.
    let t = unsafe {
        TensorSpan::<f32, 2, Host>::from_raw_parts(data.as_mut_ptr(), [3, 2].into(), [2, 1].into())
    };
    let out = eval::<Host, _, 2>(t).unwrap();
    assert_eq!(out.to_vec().unwrap(), vec![1.0, 3.0, 5.0, 2.0, 4.0, 6.0]);
}
