use std::{ptr, sync::OnceLock};

use rayon::{
    iter::{IntoParallelIterator, ParallelIterator},
    ThreadPool, ThreadPoolBuilder,
};

use crate::{
    config,
    device::{Space, SpaceId, Threads},
    error::fatal,
    kernel::Kernel,
    launch::LaunchPlan,
    DType, Shape, TensorSpan,
};

static POOL: OnceLock<ThreadPool> = OnceLock::new();

fn pool() -> &'static ThreadPool {
    POOL.get_or_init(|| {
        let num_threads = config::global().num_threads;
        log::info!("starting threads space with {num_threads} workers");
        ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("spacetensor-{i}"))
            .build()
            .unwrap_or_else(|e| fatal(format_args!("cannot start thread pool: {e}")))
    })
}

/// Run `plan`'s grid on the pool, one task per block.
fn run_grid<const N: usize, F>(plan: &LaunchPlan<N>, f: F)
where
    F: Fn(&[usize; N]) + Send + Sync,
{
    let blocks = plan.block_count();
    pool().install(|| {
        (0..blocks).into_par_iter().for_each(|b| {
            plan.for_each_in_block(plan.block_coords(b), &f);
        })
    });
}

impl Space for Threads {
    const HOST_MEMORY: bool = true;

    fn id() -> SpaceId {
        SpaceId::Threads
    }

    fn allocate<T: DType>(count: usize) -> *mut T {
        super::allocate(count)
    }

    unsafe fn deallocate<T: DType>(ptr: *mut T, count: usize) {
        super::deallocate(ptr, count)
    }

    unsafe fn copy_to_host<T: DType>(src: *const T, dst: *mut T, count: usize) {
        ptr::copy(src, dst, count)
    }

    unsafe fn copy_from_host<T: DType>(src: *const T, dst: *mut T, count: usize) {
        ptr::copy(src, dst, count)
    }

    unsafe fn copy_within<T: DType>(src: *const T, dst: *mut T, count: usize) {
        ptr::copy(src, dst, count)
    }

    /// Launches return once their grid has completed.
    fn synchronize() {}

    fn launch<K: Kernel<N>, const N: usize>(dst: TensorSpan<K::Elem, N, Self>, src: K) {
        let plan = LaunchPlan::new(*dst.shape(), config::global());
        log::debug!("threads launch: {plan}");
        run_grid(&plan, |idx| {
            // SAFETY: the plan only yields indices inside `dst`'s shape, each exactly once.
            unsafe { dst.write(idx, src.at(idx)) }
        });
    }
}

/// Run `f` for every index of `shape` on the `Threads` pool, using the device launch grid.
pub fn launch_threads<const N: usize, F>(shape: Shape<N>, f: F)
where
    F: Fn(&[usize; N]) + Send + Sync,
{
    let plan = LaunchPlan::new(shape, config::global());
    run_grid(&plan, f);
}
