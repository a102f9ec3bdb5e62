//! Property-based tests.
//!
//! Key invariants:
//! - every launch plan visits each index of its shape exactly once
//! - the thread pool computes what the host loop computes
//! - stepped slices select what a reference index walk selects
//! - `(a + a) / 2 == a`

use proptest::prelude::*;
use spacetensor_core::{
    eval, launch::LaunchPlan, range_step, ExecConfig, Host, Shape, Tensor, Threads,
};

fn dims3() -> impl Strategy<Value = [usize; 3]> {
    [1usize..40, 1usize..12, 1usize..6]
}

/// Positions a Python-style `start:stop:step` selects from `len` elements.
fn reference_slice(len: isize, start: isize, stop: isize, step: isize) -> Vec<isize> {
    let norm = |x: isize| if x < 0 { x + len } else { x };
    let mut out = Vec::new();
    if step > 0 {
        let mut i = norm(start).clamp(0, len);
        let stop = norm(stop).clamp(0, len);
        while i < stop {
            out.push(i);
            i += step;
        }
    } else {
        let mut i = norm(start).clamp(-1, len - 1);
        let stop = norm(stop).clamp(-1, len - 1);
        while i > stop {
            out.push(i);
            i += step;
        }
    }
    out
}

proptest! {
    #[test]
    fn plans_cover_each_index_once(
        dims in dims3(),
        block_x in 1u32..20,
        block_y in 1u32..20,
        force_linear in any::<bool>(),
        max_linear_blocks in 1u32..8,
    ) {
        let config = ExecConfig {
            block_x,
            block_y,
            block_linear: 16,
            max_linear_blocks,
            force_linear,
            ..ExecConfig::default()
        };
        let shape = Shape::new(dims);
        let plan = LaunchPlan::new(shape, &config);
        let mut hits = vec![0u32; shape.size()];
        for b in 0..plan.block_count() {
            plan.for_each_in_block(plan.block_coords(b), |&[i, j, k]| {
                hits[i + dims[0] * (j + dims[1] * k)] += 1;
            });
        }
        prop_assert!(hits.iter().all(|&h| h == 1), "{plan}");
    }

    #[test]
    fn threads_agree_with_host(
        dims in dims3(),
        data in prop::collection::vec(-1000i64..1000, 40 * 12 * 6),
    ) {
        let shape = Shape::new(dims);
        let a = Tensor::<i64, 3, Host>::from_slice(shape, &data[..shape.size()]).unwrap();
        let expected = eval::<Host, _, 3>(&a * 3i64 - 7i64).unwrap();
        let t = a.to_space::<Threads>().unwrap();
        let got = eval::<Threads, _, 3>(&t * 3i64 - 7i64).unwrap();
        prop_assert_eq!(got.to_vec().unwrap(), expected.to_vec().unwrap());
    }

    #[test]
    fn stepped_slices_match_reference(
        len in 0usize..20,
        start in -25isize..25,
        stop in -25isize..25,
        step in prop_oneof![-4isize..0, 1isize..5],
    ) {
        let data: Vec<i32> = (0..len as i32).collect();
        let v = Tensor::<i32, 1>::from_vec([len], data).unwrap();
        let view = v.slice::<1>(&[range_step(Some(start), Some(stop), step)]).unwrap();
        let expected: Vec<i32> = reference_slice(len as isize, start, stop, step)
            .into_iter()
            .map(|i| i as i32)
            .collect();
        prop_assert_eq!(view.to_vec(), expected);
    }

    #[test]
    fn doubling_then_halving_is_identity(
        data in prop::collection::vec(-1_000_000i64..1_000_000, 1..64),
    ) {
        let a = Tensor::<i64, 1, Threads>::from_vec([data.len()], data).unwrap();
        let b = eval::<Threads, _, 1>((&a + &a) / 2i64).unwrap();
        prop_assert_eq!(a, b);
    }
}
