use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "cuda")]
use spacetensor_core::Cuda;
use spacetensor_core::{
    copy, copy_n, eval, launch_host, launch_threads, range, reversed, synchronize, Error, Host,
    Shape, Space, SpaceId, Storage, Tensor, Threads,
};

fn iota<S: Space, const N: usize>(shape: [usize; N]) -> Tensor<f64, N, S> {
    let shape = Shape::new(shape);
    let data: Vec<f64> = (0..shape.size()).map(|i| i as f64).collect();
    Tensor::from_vec(shape, data).unwrap()
}

macro_rules! test_between_spaces {
    ($from:ty, $to:ty, $name:ident) => {
        mod $name {
            use super::*;

            #[test]
            fn contiguous_copy() {
                let a = iota::<$from, 2>([3, 4]);
                let mut b = Tensor::<f64, 2, $to>::zeros([3, 4]);
                copy(&a, &mut b).unwrap();
                assert_eq!(a, b);
            }

            #[test]
            fn strided_source_copy() {
                let a = iota::<$from, 1>([6]);
                let mut b = Tensor::<f64, 1, $to>::zeros([4]);
                copy(&a.slice::<1>(&[range(1, 5)]).unwrap(), &mut b).unwrap();
                assert_eq!(b.to_vec().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
            }

            #[test]
            fn strided_destination_copy() {
                let a = iota::<$from, 1>([3]);
                let mut b = Tensor::<f64, 1, $to>::zeros([3]);
                {
                    let mut r = b.slice_mut::<1>(&[reversed()]).unwrap();
                    copy(&a, &mut r).unwrap();
                }
                assert_eq!(b.to_vec().unwrap(), vec![2.0, 1.0, 0.0]);
            }

            #[test]
            fn copy_checks_shapes() {
                let a = iota::<$from, 2>([2, 3]);
                let mut b = Tensor::<f64, 2, $to>::zeros([3, 2]);
                let err = copy(&a, &mut b).unwrap_err();
                assert!(matches!(err.inner(), Error::ShapeMismatch { .. }));
            }

            #[test]
            fn raw_copy_n_round_trip() {
                let host: Vec<i32> = (0..10).collect();
                let storage = Storage::<i32, $to>::new(10);
                // SAFETY: both buffers hold 10 elements.
                unsafe { copy_n::<i32, Host, $to>(host.as_ptr(), storage.as_ptr() as *mut i32, 10) };
                assert_eq!(storage.to_vec(), host);
                let other = Storage::<i32, $from>::from_slice(&host);
                assert_eq!(storage, other);
            }
        }
    };
}

test_between_spaces!(Host, Host, host_to_host);
test_between_spaces!(Host, Threads, host_to_threads);
test_between_spaces!(Threads, Host, threads_to_host);
test_between_spaces!(Threads, Threads, threads_to_threads);
#[cfg(feature = "cuda")]
test_between_spaces!(Host, Cuda<0>, host_to_cuda);
#[cfg(feature = "cuda")]
test_between_spaces!(Cuda<0>, Host, cuda_to_host);
#[cfg(feature = "cuda")]
test_between_spaces!(Cuda<0>, Cuda<0>, cuda_to_cuda);
#[cfg(feature = "cuda")]
test_between_spaces!(Threads, Cuda<0>, threads_to_cuda);

/// Evaluate the same expression on the host and on the thread pool.
fn check_threads_matches_host<const N: usize>(shape: [usize; N]) {
    let a = iota::<Host, N>(shape);
    let b = Tensor::<f64, N, Host>::full(shape, 0.5);
    let expected = eval::<Host, _, N>(&a * 2.0 + &b).unwrap();

    let ta = a.to_space::<Threads>().unwrap();
    let tb = b.to_space::<Threads>().unwrap();
    let got = eval::<Threads, _, N>(&ta * 2.0 + &tb).unwrap();
    assert_eq!(got, expected, "shape {:?}", Shape::new(shape));
}

#[test]
fn threads_matches_host_for_every_rank() {
    check_threads_matches_host::<0>([]);
    check_threads_matches_host::<1>([1000]);
    check_threads_matches_host::<2>([33, 17]);
    check_threads_matches_host::<3>([5, 18, 3]);
    check_threads_matches_host::<4>([17, 2, 3, 4]);
    check_threads_matches_host::<5>([3, 17, 2, 1, 5]);
    check_threads_matches_host::<6>([2, 2, 2, 2, 2, 3]);
    check_threads_matches_host::<7>([2, 3, 2, 1, 2, 2, 3]);
}

#[test]
fn space_ids() {
    assert_eq!(Host::id(), SpaceId::Host);
    assert_eq!(Threads::id(), SpaceId::Threads);
    assert_eq!(SpaceId::Cuda(1).to_string(), "cuda:1");
    assert_eq!(Tensor::<u8, 1, Threads>::new().space(), SpaceId::Threads);
}

#[test]
fn user_launches_visit_every_index_once() {
    let mut seen = Vec::new();
    launch_host(Shape::new([3, 2]), |idx| seen.push(*idx));
    assert_eq!(
        seen,
        vec![[0, 0], [1, 0], [2, 0], [0, 1], [1, 1], [2, 1]]
    );

    let shape = Shape::new([37, 5, 4]);
    let hits: Vec<AtomicUsize> = (0..shape.size()).map(|_| AtomicUsize::new(0)).collect();
    launch_threads(shape, |idx| {
        let linear = idx[0] + 37 * (idx[1] + 5 * idx[2]);
        hits[linear].fetch_add(1, Ordering::Relaxed);
    });
    synchronize();
    assert!(hits.iter().all(|h| h.load(Ordering::Relaxed) == 1));
}

#[cfg(feature = "cuda")]
#[test]
fn device_queries() {
    use spacetensor_core::cuda_backend;

    assert!(cuda_backend::device_count() >= 1);
    let dev = cuda_backend::select(0);
    assert_eq!(dev.ordinal(), 0);
    let (free, total) = dev.mem_info();
    assert!(free <= total);
    assert_eq!(dev.vendor_id(), cuda_backend::get(0).vendor_id());
}
