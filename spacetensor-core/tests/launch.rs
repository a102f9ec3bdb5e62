use spacetensor_core::{
    kernel::{Kernel, KernelSource},
    launch::{LaunchPlan, LaunchStrategy},
    ops, scalar, unravel, ExecConfig, Expression, Shape, Tensor, Threads,
};

fn config() -> ExecConfig {
    ExecConfig::default()
}

/// Count how often each index is produced by walking the whole grid.
fn coverage<const N: usize>(plan: &LaunchPlan<N>) -> Vec<usize> {
    let shape = plan.shape;
    let mut hits = vec![0usize; shape.size()];
    for b in 0..plan.block_count() {
        plan.for_each_in_block(plan.block_coords(b), |idx| {
            let mut linear = 0;
            let mut scale = 1;
            for (d, &i) in idx.iter().enumerate() {
                assert!(i < shape[d], "index {idx:?} outside {shape}");
                linear += i * scale;
                scale *= shape[d];
            }
            hits[linear] += 1;
        });
    }
    hits
}

fn assert_exact_cover<const N: usize>(plan: &LaunchPlan<N>) {
    let hits = coverage(plan);
    if let Some(bad) = hits.iter().position(|&h| h != 1) {
        panic!(
            "{plan}: index {:?} visited {} times",
            unravel(bad, &plan.shape),
            hits[bad]
        );
    }
}

#[test]
fn strategy_by_rank() {
    let c = config();
    assert_eq!(LaunchPlan::new(Shape::new([]), &c).strategy, LaunchStrategy::Linear);
    let p1 = LaunchPlan::new(Shape::new([1000]), &c);
    assert_eq!(p1.strategy, LaunchStrategy::PerAxis);
    assert_eq!(p1.grid, [4, 1, 1]);
    assert_eq!(p1.block, [256, 1, 1]);

    let p3 = LaunchPlan::new(Shape::new([33, 16, 7]), &c);
    assert_eq!(p3.strategy, LaunchStrategy::PerAxis);
    assert_eq!(p3.grid, [3, 1, 7]);
    assert_eq!(p3.block, [16, 16, 1]);

    let p5 = LaunchPlan::new(Shape::new([4, 4, 2, 3, 5]), &c);
    assert_eq!(p5.strategy, LaunchStrategy::OuterLinearized);
    assert_eq!(p5.grid, [1, 1, 30]);

    let p7 = LaunchPlan::new(Shape::new([2; 7]), &c);
    assert_eq!(p7.strategy, LaunchStrategy::Linear);
    assert_eq!(p7.grid, [1, 1, 1]);
}

#[test]
fn grid_overflow_falls_back_to_linear() {
    let p = LaunchPlan::new(Shape::new([2, 2, 70000]), &config());
    assert_eq!(p.strategy, LaunchStrategy::Linear);
    let p = LaunchPlan::new(Shape::new([1, 70000 * 16]), &config());
    assert_eq!(p.strategy, LaunchStrategy::Linear);
}

#[test]
fn forced_linear_and_capped_grid() {
    let c = ExecConfig {
        force_linear: true,
        block_linear: 32,
        max_linear_blocks: 3,
        ..config()
    };
    let p = LaunchPlan::new(Shape::new([10, 11]), &c);
    assert_eq!(p.strategy, LaunchStrategy::Linear);
    assert_eq!(p.grid, [3, 1, 1]);
    // 110 elements on 96 lanes: some lanes take two.
    assert_exact_cover(&p);
}

#[test]
fn every_strategy_covers_each_index_once() {
    let c = config();
    assert_exact_cover(&LaunchPlan::new(Shape::new([]), &c));
    assert_exact_cover(&LaunchPlan::new(Shape::new([1]), &c));
    assert_exact_cover(&LaunchPlan::new(Shape::new([257]), &c));
    assert_exact_cover(&LaunchPlan::new(Shape::new([17, 33]), &c));
    assert_exact_cover(&LaunchPlan::new(Shape::new([3, 17, 5]), &c));
    assert_exact_cover(&LaunchPlan::new(Shape::new([17, 1, 3, 4]), &c));
    assert_exact_cover(&LaunchPlan::new(Shape::new([2, 3, 4, 1, 2, 3]), &c));
    assert_exact_cover(&LaunchPlan::new(Shape::new([2, 1, 3, 2, 2, 1, 3]), &c));

    let small = ExecConfig {
        block_x: 4,
        block_y: 2,
        block_1d: 8,
        ..config()
    };
    assert_exact_cover(&LaunchPlan::new(Shape::new([9]), &small));
    assert_exact_cover(&LaunchPlan::new(Shape::new([9, 5, 2, 3]), &small));
}

#[test]
fn empty_shapes_launch_nothing() {
    let p = LaunchPlan::new(Shape::new([0, 4]), &config());
    assert_eq!(p.strategy, LaunchStrategy::Linear);
    assert_eq!(p.block_count(), 0);
    assert!(coverage(&p).is_empty());
}

#[test]
fn emitted_index_code() {
    let c = config();
    let p = LaunchPlan::new(Shape::new([5]), &c);
    let code = p.emit_index("BODY;");
    assert!(code.contains("const size_t i0 = (size_t)blockIdx.x * blockDim.x + threadIdx.x;"));
    assert!(code.contains("if (i0 >= 5ULL) return;"));
    assert!(code.ends_with("BODY;"));

    let p = LaunchPlan::new(Shape::new([4, 3, 2, 5]), &c);
    let code = p.emit_index("BODY;");
    assert!(code.contains("if (i0 >= 4ULL || i1 >= 3ULL) return;"));
    assert!(code.contains("size_t z = blockIdx.z;"));
    assert!(code.contains("const size_t i2 = z % 2ULL; z /= 2ULL;"));
    assert!(code.contains("const size_t i3 = z % 5ULL; z /= 5ULL;"));

    let p = LaunchPlan::new(Shape::new([2; 7]), &c);
    let code = p.emit_index("BODY;");
    assert!(code.contains("g < 128ULL"));
    assert!(code.contains("const size_t i6 = r % 2ULL; r /= 2ULL;"));
}

#[test]
fn kernel_source_renders_the_expression() {
    let a = Tensor::<f32, 2, Threads>::zeros([4, 1]);
    let b = Tensor::<f32, 2, Threads>::zeros([4, 3]);
    let expr = ops::sqrt(&a) * 2.0f32 + &b;
    let shape = Expression::<2>::shape(&expr).unwrap();
    assert_eq!(shape, [4, 3]);

    // SAFETY: `a` and `b` outlive the kernel, which is only rendered.
    let kernel = unsafe { expr.to_kernel(&shape) };
    let mut src = KernelSource::new();
    let text = kernel.emit(&mut src);
    assert_eq!(
        text,
        "((static_cast<float>(sqrt(static_cast<double>(p0[(long long)i0 * 1LL]))) \
         * static_cast<float>(__longlong_as_double(s0))) \
         + p1[(long long)i0 * 1LL + (long long)i1 * 4LL])"
    );
    assert_eq!(
        src.args(),
        &[a.as_ptr() as u64, 2.0f64.to_bits(), b.as_ptr() as u64]
    );

    let plan = LaunchPlan::new(shape, &config());
    let (name, full) = src.render(&plan, &format!("out = {text};"));
    assert!(name.starts_with("assign_"));
    assert!(full.contains(&format!(
        "extern \"C\" __global__ void {name}(float* p0, long long s0, float* p1)"
    )));
    assert!(!full.contains("#include"));
    assert_eq!(src.render(&plan, &format!("out = {text};")).0, name);
}

#[test]
fn scalar_values_share_one_kernel() {
    let a = Tensor::<i32, 1, Threads>::zeros([8]);
    let shape = Shape::new([8]);
    let plan = LaunchPlan::new(shape, &config());
    let mut names = Vec::new();
    for k in [1, -7, i32::MAX] {
        let expr = &a * k + 3;
        // SAFETY: `a` outlives the kernel, which is only rendered.
        let kernel = unsafe { expr.to_kernel(&shape) };
        let mut src = KernelSource::new();
        let text = kernel.emit(&mut src);
        assert_eq!(src.args()[1..], [k as i64 as u64, 3]);
        names.push(src.render(&plan, &format!("out = {text};")).0);
    }
    assert!(names.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn integer_division_guards_zero() {
    let mut src = KernelSource::new();
    let text = Kernel::<1>::emit(&(scalar(6u32) / 0u32), &mut src);
    assert_eq!(
        text,
        "(static_cast<uint32_t>(s1) == 0 ? static_cast<uint32_t>(0) \
         : static_cast<uint32_t>(static_cast<uint32_t>(s0) / static_cast<uint32_t>(s1)))"
    );
    assert_eq!(src.args(), &[6, 0]);
}

#[test]
fn complex_kernels_pull_in_the_header() {
    let mut src = KernelSource::new();
    let lit = Kernel::<1>::emit(&scalar(num_complex::Complex::new(1.0f64, -0.5)), &mut src);
    assert_eq!(
        lit,
        "cuda::std::complex<double>(__longlong_as_double(s0), __longlong_as_double(s1))"
    );
    assert_eq!(src.args(), &[1.0f64.to_bits(), (-0.5f64).to_bits()]);
    let (_, full) = src.render(&LaunchPlan::new(Shape::new([1]), &config()), ";");
    assert!(full.contains("#include <cuda/std/complex>"));
}
