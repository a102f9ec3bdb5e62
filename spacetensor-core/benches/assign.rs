use criterion::{criterion_group, criterion_main, Criterion};
use spacetensor_core::{range_step, Host, Space, Tensor, Threads};

fn bench_axpy_1d<S: Space>(c: &mut Criterion, name: &str) {
    const N: usize = 1 << 20;
    let x = Tensor::<f32, 1, S>::full([N], 1.5);
    let y = Tensor::<f32, 1, S>::full([N], 2.0);
    let mut out = Tensor::<f32, 1, S>::zeros([N]);
    c.bench_function(&format!("{name}_axpy_1d_1m"), |bencher| {
        bencher.iter(|| out.assign(2.0f32 * &x + &y).unwrap());
    });
}

fn bench_broadcast_2d<S: Space>(c: &mut Criterion, name: &str) {
    const N: usize = 1024;
    let col = Tensor::<f64, 2, S>::full([N, 1], 3.0);
    let row = Tensor::<f64, 2, S>::full([1, N], 0.5);
    let mut out = Tensor::<f64, 2, S>::zeros([N, N]);
    c.bench_function(&format!("{name}_broadcast_2d_1024"), |bencher| {
        bencher.iter(|| out.assign(&col * &row).unwrap());
    });
}

fn bench_strided_5d<S: Space>(c: &mut Criterion, name: &str) {
    let src = Tensor::<f64, 5, S>::full([32, 16, 8, 4, 4], 1.0);
    let mut out = Tensor::<f64, 5, S>::zeros([16, 16, 8, 4, 4]);
    let half = src.slice::<5>(&[range_step(None, None, 2)]).unwrap();
    c.bench_function(&format!("{name}_strided_5d"), |bencher| {
        bencher.iter(|| out.assign(half).unwrap());
    });
}

fn bench_host(c: &mut Criterion) {
    bench_axpy_1d::<Host>(c, "host");
    bench_broadcast_2d::<Host>(c, "host");
    bench_strided_5d::<Host>(c, "host");
}

fn bench_threads(c: &mut Criterion) {
    bench_axpy_1d::<Threads>(c, "threads");
    bench_broadcast_2d::<Threads>(c, "threads");
    bench_strided_5d::<Threads>(c, "threads");
}

#[cfg(feature = "cuda")]
fn bench_cuda(c: &mut Criterion) {
    use spacetensor_core::{synchronize, Cuda};

    bench_axpy_1d::<Cuda<0>>(c, "cuda");
    bench_broadcast_2d::<Cuda<0>>(c, "cuda");
    bench_strided_5d::<Cuda<0>>(c, "cuda");
    synchronize();
}

#[cfg(not(feature = "cuda"))]
criterion_group!(benches, bench_host, bench_threads);
#[cfg(feature = "cuda")]
criterion_group!(benches, bench_host, bench_threads, bench_cuda);
criterion_main!(benches);
