//! CUDA memory spaces.
//!
//! Each device ordinal gets one lazily created [`DeviceContext`]. Memory is managed with
//! raw driver calls so spans can carry plain device addresses, and every assignment is
//! rendered to CUDA C, compiled with NVRTC and cached per device by its source hash.

use std::{
    collections::{HashMap, VecDeque},
    mem,
    sync::{Arc, Mutex, OnceLock, PoisonError, RwLock},
};

use cudarc::driver::{
    result, sys::CUdevice_attribute, CudaContext, CudaFunction, CudaModule, CudaStream,
    LaunchConfig, PushKernelArg,
};

use crate::{
    config::{self, ExecConfig},
    device::{Cuda, Space, SpaceId},
    kernel::{Kernel, KernelSource},
    launch::LaunchPlan,
    DType, TensorSpan,
};

pub(crate) mod error;
mod util;

use error::{CudaError, WrapErr};

/// Driver state for one device.
pub struct DeviceContext {
    ordinal: usize,
    context: Arc<CudaContext>,
    stream: Arc<CudaStream>,
    modules: RwLock<HashMap<String, Arc<CudaModule>>>,
    module_cache_order: Mutex<VecDeque<String>>,
}

static DEVICES: OnceLock<RwLock<HashMap<usize, Arc<DeviceContext>>>> = OnceLock::new();

fn devices() -> &'static RwLock<HashMap<usize, Arc<DeviceContext>>> {
    DEVICES.get_or_init(Default::default)
}

/// Number of CUDA devices visible to the driver.
pub fn device_count() -> usize {
    CudaContext::device_count().w() as usize
}

/// The context of device `ordinal`, created on first use.
pub fn get(ordinal: usize) -> Arc<DeviceContext> {
    if let Some(dev) = devices()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&ordinal)
    {
        return dev.clone();
    }
    let mut map = devices().write().unwrap_or_else(PoisonError::into_inner);
    map.entry(ordinal)
        .or_insert_with(|| Arc::new(DeviceContext::new(ordinal)))
        .clone()
}

/// Make device `ordinal` current on the calling thread.
pub fn select(ordinal: usize) -> Arc<DeviceContext> {
    let dev = get(ordinal);
    dev.bind();
    dev
}

/// Wait for every device that has been used.
pub(crate) fn synchronize_all() {
    let Some(map) = DEVICES.get() else {
        return;
    };
    for dev in map.read().unwrap_or_else(PoisonError::into_inner).values() {
        dev.synchronize();
    }
}

impl DeviceContext {
    fn new(ordinal: usize) -> Self {
        let context = CudaContext::new(ordinal).w();
        // The legacy default stream orders launches with the synchronous copies.
        let stream = context.default_stream();
        log::info!("created cuda:{ordinal} context");
        Self {
            ordinal,
            context,
            stream,
            modules: RwLock::new(HashMap::new()),
            module_cache_order: Mutex::new(VecDeque::new()),
        }
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    fn bind(&self) {
        self.context.bind_to_thread().w();
    }

    /// PCI location packed as `device | bus << 8 | domain << 16`.
    pub fn vendor_id(&self) -> u32 {
        let attr = |a| self.context.attribute(a).w() as u32;
        let dev = attr(CUdevice_attribute::CU_DEVICE_ATTRIBUTE_PCI_DEVICE_ID);
        let bus = attr(CUdevice_attribute::CU_DEVICE_ATTRIBUTE_PCI_BUS_ID);
        let domain = attr(CUdevice_attribute::CU_DEVICE_ATTRIBUTE_PCI_DOMAIN_ID);
        (dev & 0xFF) | ((bus << 8) & 0xFF00) | ((domain << 16) & 0xFFFF_0000)
    }

    /// `(free, total)` device memory in bytes.
    pub fn mem_info(&self) -> (usize, usize) {
        self.bind();
        result::mem_get_info().w()
    }

    pub fn synchronize(&self) {
        self.stream.synchronize().w();
    }

    fn load_func(&self, name: &str, src: &str, config: &ExecConfig) -> CudaFunction {
        {
            let modules = self.modules.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(module) = modules.get(name) {
                return module.load_function(name).w();
            }
        }

        log::debug!("cuda:{} compiling {name}", self.ordinal);
        let ptx = util::compile_ptx(src, config.fast_math);
        util::write_ptx(config.kernel_cache_dir.as_ref(), name, &ptx);
        let module = self
            .context
            .load_module(ptx)
            .map_err(|cuda| CudaError::Load {
                cuda,
                kernel: name.to_string(),
            })
            .w();
        let func = module.load_function(name).w();

        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        let mut order = self
            .module_cache_order
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if modules.insert(name.to_string(), module).is_none() {
            order.push_back(name.to_string());
        }
        while order.len() > config.max_cached_kernels.max(1) {
            if let Some(old) = order.pop_front() {
                modules.remove(&old);
            }
        }
        func
    }

    fn launch<K: Kernel<N>, const N: usize, S: Space>(&self, dst: TensorSpan<K::Elem, N, S>, src: K) {
        let config = config::global();
        let plan = LaunchPlan::new(*dst.shape(), config);
        log::debug!("cuda:{} launch: {plan}", self.ordinal);

        let mut source = KernelSource::new();
        let out = dst.emit(&mut source);
        let value = src.emit(&mut source);
        let (name, text) = source.render(&plan, &format!("{out} = {value};"));
        log::trace!("{text}");

        self.bind();
        let func = self.load_func(&name, &text, config);
        let cfg = LaunchConfig {
            grid_dim: (plan.grid[0], plan.grid[1], plan.grid[2]),
            block_dim: (plan.block[0], plan.block[1], plan.block[2]),
            shared_mem_bytes: 0,
        };
        let mut builder = self.stream.launch_builder(&func);
        for arg in source.args() {
            builder.arg(arg);
        }
        // SAFETY: the arguments are the 64-bit pointers and scalar words the kernel
        // declares, in parameter order.
        unsafe { builder.launch(cfg) }.w();
        if config.sync_after_launch {
            self.synchronize();
        }
    }
}

fn bytes<T: DType>(count: usize) -> usize {
    count * mem::size_of::<T>()
}

impl<const ORD: usize> Space for Cuda<ORD> {
    const HOST_MEMORY: bool = false;

    fn id() -> SpaceId {
        SpaceId::Cuda(ORD)
    }

    fn allocate<T: DType>(count: usize) -> *mut T {
        if count == 0 {
            return std::ptr::null_mut();
        }
        get(ORD).bind();
        // SAFETY: the context is current.
        let ptr = unsafe { result::malloc_sync(bytes::<T>(count)) }.w();
        log::trace!("cuda:{ORD} allocate {count} x {} at {ptr:#x}", T::NAME);
        ptr as *mut T
    }

    unsafe fn deallocate<T: DType>(ptr: *mut T, count: usize) {
        if ptr.is_null() {
            return;
        }
        get(ORD).bind();
        log::trace!("cuda:{ORD} deallocate {count} x {} at {ptr:p}", T::NAME);
        result::free_sync(ptr as u64).w();
    }

    unsafe fn copy_to_host<T: DType>(src: *const T, dst: *mut T, count: usize) {
        get(ORD).bind();
        let dst = std::slice::from_raw_parts_mut(dst as *mut u8, bytes::<T>(count));
        result::memcpy_dtoh_sync(dst, src as u64).w();
    }

    unsafe fn copy_from_host<T: DType>(src: *const T, dst: *mut T, count: usize) {
        get(ORD).bind();
        let src = std::slice::from_raw_parts(src as *const u8, bytes::<T>(count));
        result::memcpy_htod_sync(dst as u64, src).w();
    }

    unsafe fn copy_within<T: DType>(src: *const T, dst: *mut T, count: usize) {
        get(ORD).bind();
        result::memcpy_dtod_sync(dst as u64, src as u64, bytes::<T>(count)).w();
    }

    fn synchronize() {
        if let Some(map) = DEVICES.get() {
            if let Some(dev) = map.read().unwrap_or_else(PoisonError::into_inner).get(&ORD) {
                dev.synchronize();
            }
        }
    }

    fn launch<K: Kernel<N>, const N: usize>(dst: TensorSpan<K::Elem, N, Self>, src: K) {
        get(ORD).launch(dst, src);
    }
}
