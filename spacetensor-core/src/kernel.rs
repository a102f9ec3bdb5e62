//! The execution-side form of an expression.
//!
//! [`Expression::to_kernel`](crate::Expression::to_kernel) lowers an expression tree into
//! a [`Kernel`]: a `Copy` value holding only spans and scalars that can be evaluated per
//! index on the host or rendered to CUDA C for a device.

use std::hash::{DefaultHasher, Hash, Hasher};

use crate::{launch::LaunchPlan, DType, Strides};

pub trait Kernel<const N: usize>: Copy + Send + Sync {
    type Elem: DType;

    /// Evaluate at `idx`.
    ///
    /// # Safety
    /// `idx` lies in the shape this kernel was built for and every span it reads is
    /// accessible from the calling thread.
    unsafe fn at(&self, idx: &[usize; N]) -> Self::Elem;

    /// Render as a C expression over the index variables `i0..i{N-1}`.
    fn emit(&self, src: &mut KernelSource) -> String;
}

/// Parameters and includes collected while rendering a kernel.
///
/// Buffers and scalars both travel as 64-bit arguments, so the kernel text depends only
/// on the expression's structure and one compiled kernel serves every scalar value.
#[derive(Debug, Default)]
pub struct KernelSource {
    params: Vec<String>,
    args: Vec<u64>,
    pointer_count: usize,
    scalar_count: usize,
    deps: Vec<&'static str>,
}

impl KernelSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a buffer argument and return its parameter name.
    pub fn push_pointer<T: DType>(&mut self, ptr: *const T) -> String {
        let name = format!("p{}", self.pointer_count);
        self.pointer_count += 1;
        self.params.push(format!("{}* {name}", T::C_NAME));
        self.args.push(ptr as u64);
        self.require::<T>();
        name
    }

    /// Register a scalar argument and return a C expression of type `T` reading it.
    pub fn push_scalar<T: DType>(&mut self, value: T) -> String {
        self.require::<T>();
        let [re, im] = value.kernel_arg();
        let re = self.push_word(re);
        if T::COMPLEX {
            let im = self.push_word(im);
            format!(
                "{}(__longlong_as_double({re}), __longlong_as_double({im}))",
                T::C_NAME
            )
        } else if T::INTEGRAL {
            format!("static_cast<{}>({re})", T::C_NAME)
        } else {
            format!("static_cast<{}>(__longlong_as_double({re}))", T::C_NAME)
        }
    }

    fn push_word(&mut self, word: u64) -> String {
        let name = format!("s{}", self.scalar_count);
        self.scalar_count += 1;
        self.params.push(format!("long long {name}"));
        self.args.push(word);
        name
    }

    /// Pull in the header `T` needs.
    pub fn require<T: DType>(&mut self) {
        if let Some(dep) = T::C_DEP {
            if !self.deps.contains(&dep) {
                self.deps.push(dep);
            }
        }
    }

    /// Argument values, in parameter order.
    pub fn args(&self) -> &[u64] {
        &self.args
    }

    /// Offset expression for the given strides; zero strides are dropped.
    pub fn index_expr<const N: usize>(strides: &Strides<N>) -> String {
        let terms: Vec<String> = strides
            .values()
            .iter()
            .enumerate()
            .filter(|&(_, &s)| s != 0)
            .map(|(d, &s)| format!("(long long)i{d} * {s}LL"))
            .collect();
        if terms.is_empty() {
            "0".to_string()
        } else {
            terms.join(" + ")
        }
    }

    /// Full kernel text for `body`, plus the entry point name.
    ///
    /// The name is derived from a hash of the text so identical kernels share a module.
    pub fn render<const N: usize>(&self, plan: &LaunchPlan<N>, body: &str) -> (String, String) {
        let deps = self.deps.join("\n");
        let params = self.params.join(", ");
        let index = plan.emit_index(body);
        let text = format!(
            r#"
typedef unsigned char uint8_t;
typedef unsigned int uint32_t;
typedef long long int int64_t;
{deps}

extern "C" __global__ void __KERNEL_NAME__({params}) {{
{index}
}}
"#
        );
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let name = format!("assign_{:016x}", hasher.finish());
        (name.clone(), text.replace("__KERNEL_NAME__", &name))
    }
}
