//! Execution settings shared by every launch.
//!
//! The process-wide configuration is read from the environment on first use unless
//! [`init`] installed one before.

use std::{path::PathBuf, sync::OnceLock};

use crate::{Context, Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct ExecConfig {
    /// Lanes per block for rank-1 launches.
    pub block_1d: u32,
    /// Tile width along dimension 0 for rank 2 and higher.
    pub block_x: u32,
    /// Tile height along dimension 1 for rank 2 and higher.
    pub block_y: u32,
    /// Lanes per block for the linearized fallback.
    pub block_linear: u32,
    /// Upper bound on the grid of the linearized fallback; lanes loop over the rest.
    pub max_linear_blocks: u32,
    /// Always use the linearized fallback.
    pub force_linear: bool,
    /// Wait for every device launch to finish before returning.
    pub sync_after_launch: bool,
    /// Worker threads of the `Threads` space.
    pub num_threads: usize,
    /// Compile device kernels with fast math.
    pub fast_math: bool,
    /// Where compiled PTX is written; `None` disables the on-disk copy.
    pub kernel_cache_dir: Option<PathBuf>,
    /// Loaded kernel modules kept per device.
    pub max_cached_kernels: usize,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            block_1d: 256,
            block_x: 16,
            block_y: 16,
            block_linear: 256,
            max_linear_blocks: 65535,
            force_linear: false,
            sync_after_launch: false,
            num_threads: num_cpus::get(),
            fast_math: false,
            kernel_cache_dir: dirs::cache_dir().map(|d| d.join("spacetensor").join("ptx")),
            max_cached_kernels: 128,
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "on" | "yes"))
}

impl ExecConfig {
    /// Defaults overridden by `SPACETENSOR_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(threads) = std::env::var("SPACETENSOR_NUM_THREADS") {
            config.num_threads = threads
                .trim()
                .parse()
                .with_context(|| format!("SPACETENSOR_NUM_THREADS={threads}"))?;
        }
        if let Some(force) = env_flag("SPACETENSOR_FORCE_LINEAR") {
            config.force_linear = force;
        }
        if let Some(sync) = env_flag("SPACETENSOR_SYNC_LAUNCH") {
            config.sync_after_launch = sync;
        }
        if let Some(fast) = env_flag("SPACETENSOR_FAST_MATH") {
            config.fast_math = fast;
        }
        if let Ok(dir) = std::env::var("SPACETENSOR_KERNEL_CACHE") {
            config.kernel_cache_dir = match dir.as_str() {
                "" | "off" | "0" => None,
                path => Some(PathBuf::from(path)),
            };
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_threads == 0 {
            crate::bail!("num_threads must be at least 1");
        }
        for (name, v) in [
            ("block_1d", self.block_1d),
            ("block_x", self.block_x),
            ("block_y", self.block_y),
            ("block_linear", self.block_linear),
            ("max_linear_blocks", self.max_linear_blocks),
        ] {
            if v == 0 {
                crate::bail!("{name} must be at least 1");
            }
        }
        let tile = self.block_x as u64 * self.block_y as u64;
        if tile > 1024 || self.block_1d > 1024 || self.block_linear > 1024 {
            crate::bail!("blocks are limited to 1024 lanes");
        }
        Ok(())
    }
}

static GLOBAL: OnceLock<ExecConfig> = OnceLock::new();

/// Install the process-wide configuration. Fails once a configuration is in use.
pub fn init(config: ExecConfig) -> Result<()> {
    config.validate()?;
    GLOBAL
        .set(config)
        .map_err(|_| Error::msg("execution config already initialized"))?;
    log::debug!("execution config installed: {:?}", GLOBAL.get());
    Ok(())
}

/// The process-wide configuration.
pub fn global() -> &'static ExecConfig {
    GLOBAL.get_or_init(|| match ExecConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::warn!("ignoring invalid SPACETENSOR_* settings: {e}");
            ExecConfig::default()
        }
    })
}
