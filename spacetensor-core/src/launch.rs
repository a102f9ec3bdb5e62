//! Mapping an N-dimensional index space onto a grid of blocks.
//!
//! The same plan drives the `Threads` space, which walks the grid on a thread pool,
//! and the CUDA backend, which renders [`LaunchPlan::emit_index`] into the kernel.

use std::fmt;

use crate::{config::ExecConfig, shape::unravel, Shape};

const MAX_GRID_X: usize = (1 << 31) - 1;
const MAX_GRID_YZ: usize = 65535;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchStrategy {
    /// One grid axis per array dimension (ranks 1 to 3).
    PerAxis,
    /// Dimensions 0 and 1 on grid x and y, all remaining dimensions folded into grid z
    /// and unpacked with div/mod (ranks 4 to 6).
    OuterLinearized,
    /// A grid-stride loop over the column-major linear index.
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchPlan<const N: usize> {
    pub strategy: LaunchStrategy,
    pub shape: Shape<N>,
    pub grid: [u32; 3],
    pub block: [u32; 3],
}

fn div_ceil(a: usize, b: usize) -> usize {
    a.div_ceil(b)
}

impl<const N: usize> LaunchPlan<N> {
    pub fn new(shape: Shape<N>, config: &ExecConfig) -> Self {
        if config.force_linear || N == 0 || N > 6 || shape.size() == 0 {
            return Self::linear(shape, config);
        }
        if N == 1 {
            let block = config.block_1d as usize;
            let gx = div_ceil(shape[0], block);
            if gx > MAX_GRID_X {
                return Self::linear(shape, config);
            }
            return Self {
                strategy: LaunchStrategy::PerAxis,
                shape,
                grid: [gx as u32, 1, 1],
                block: [block as u32, 1, 1],
            };
        }
        let (bx, by) = (config.block_x as usize, config.block_y as usize);
        let gx = div_ceil(shape[0], bx);
        let gy = div_ceil(shape[1], by);
        let gz: usize = shape.dims()[2..].iter().product();
        if gx > MAX_GRID_X || gy > MAX_GRID_YZ || gz > MAX_GRID_YZ {
            return Self::linear(shape, config);
        }
        let strategy = if N <= 3 {
            LaunchStrategy::PerAxis
        } else {
            LaunchStrategy::OuterLinearized
        };
        Self {
            strategy,
            shape,
            grid: [gx as u32, gy as u32, gz as u32],
            block: [bx as u32, by as u32, 1],
        }
    }

    fn linear(shape: Shape<N>, config: &ExecConfig) -> Self {
        let block = config.block_linear as usize;
        let blocks = div_ceil(shape.size(), block).min(config.max_linear_blocks as usize);
        Self {
            strategy: LaunchStrategy::Linear,
            shape,
            grid: [blocks as u32, 1, 1],
            block: [block as u32, 1, 1],
        }
    }

    pub fn block_count(&self) -> usize {
        self.grid.iter().map(|&g| g as usize).product()
    }

    /// Grid coordinates of the `linear`-th block, x fastest.
    pub fn block_coords(&self, linear: usize) -> [u32; 3] {
        let gx = self.grid[0] as usize;
        let gy = self.grid[1] as usize;
        [
            (linear % gx) as u32,
            ((linear / gx) % gy) as u32,
            (linear / (gx * gy)) as u32,
        ]
    }

    /// Call `f` with every in-bounds index the lanes of block `b` cover.
    pub fn for_each_in_block<F: FnMut(&[usize; N])>(&self, b: [u32; 3], mut f: F) {
        let size = self.shape.size();
        if size == 0 {
            return;
        }
        let [bdx, bdy, _] = self.block.map(|v| v as usize);
        let [bx, by, bz] = b.map(|v| v as usize);
        let mut idx = [0usize; N];
        for ty in 0..bdy {
            for tx in 0..bdx {
                match self.strategy {
                    LaunchStrategy::Linear => {
                        let stride = self.grid[0] as usize * bdx;
                        let mut g = bx * bdx + tx;
                        while g < size {
                            f(&unravel(g, &self.shape));
                            g += stride;
                        }
                    }
                    LaunchStrategy::PerAxis | LaunchStrategy::OuterLinearized => {
                        let i = bx * bdx + tx;
                        if i >= self.shape[0] {
                            continue;
                        }
                        idx[0] = i;
                        if N > 1 {
                            let j = by * bdy + ty;
                            if j >= self.shape[1] {
                                continue;
                            }
                            idx[1] = j;
                            let mut z = bz;
                            for d in 2..N {
                                idx[d] = z % self.shape[d];
                                z /= self.shape[d];
                            }
                        }
                        f(&idx);
                    }
                }
            }
        }
    }

    /// CUDA C that binds `i0..i{N-1}` for the current lane and runs `body` for it.
    pub fn emit_index(&self, body: &str) -> String {
        let s = self.shape.dims();
        let mut out = String::new();
        match self.strategy {
            LaunchStrategy::Linear => {
                out.push_str(&format!(
                    "    for (size_t g = (size_t)blockIdx.x * blockDim.x + threadIdx.x; g < {}ULL; g += (size_t)blockDim.x * gridDim.x) {{\n",
                    self.shape.size()
                ));
                out.push_str("        size_t r = g;\n");
                for (d, e) in s.iter().enumerate() {
                    out.push_str(&format!(
                        "        const size_t i{d} = r % {e}ULL; r /= {e}ULL;\n"
                    ));
                }
                out.push_str(&format!("        {body}\n    }}"));
            }
            LaunchStrategy::PerAxis | LaunchStrategy::OuterLinearized => {
                out.push_str("    const size_t i0 = (size_t)blockIdx.x * blockDim.x + threadIdx.x;\n");
                if N == 1 {
                    out.push_str(&format!("    if (i0 >= {}ULL) return;\n", s[0]));
                } else {
                    out.push_str(
                        "    const size_t i1 = (size_t)blockIdx.y * blockDim.y + threadIdx.y;\n",
                    );
                    out.push_str(&format!(
                        "    if (i0 >= {}ULL || i1 >= {}ULL) return;\n",
                        s[0], s[1]
                    ));
                    if N > 2 {
                        out.push_str("    size_t z = blockIdx.z;\n");
                    }
                    for (d, e) in s.iter().enumerate().skip(2) {
                        out.push_str(&format!(
                            "    const size_t i{d} = z % {e}ULL; z /= {e}ULL;\n"
                        ));
                    }
                }
                out.push_str(&format!("    {body}"));
            }
        }
        out
    }
}

impl<const N: usize> fmt::Display for LaunchPlan<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} over {} grid {:?} block {:?}",
            self.strategy, self.shape, self.grid, self.block
        )
    }
}
