use std::{fs, path::PathBuf};

use cudarc::nvrtc::{CompileOptions, Ptx};

use super::error::WrapErr;

fn cuda_include_dir() -> Option<PathBuf> {
    let env_vars = ["CUDA_PATH", "CUDA_ROOT", "CUDA_TOOLKIT_ROOT_DIR", "CUDA_HOME"]
        .into_iter()
        .filter_map(|v| std::env::var(v).ok())
        .map(PathBuf::from);

    let roots = ["/usr", "/usr/local/cuda", "/opt/cuda", "/usr/lib/cuda"]
        .into_iter()
        .map(PathBuf::from);

    env_vars
        .chain(roots)
        .map(|root| root.join("include"))
        .find(|include| include.join("cuda.h").is_file())
}

/// Compile `src` to PTX for whatever architecture the driver JITs it to.
pub(crate) fn compile_ptx(src: &str, fast_math: bool) -> Ptx {
    let include_paths = cuda_include_dir()
        .map(|dir| vec![dir.display().to_string()])
        .unwrap_or_default();
    cudarc::nvrtc::compile_ptx_with_opts(
        src,
        CompileOptions {
            use_fast_math: Some(fast_math),
            include_paths,
            ..Default::default()
        },
    )
    .w()
}

/// Keep a copy of the PTX for inspection. Failing to write is not an error.
pub(crate) fn write_ptx(dir: Option<&PathBuf>, name: &str, ptx: &Ptx) {
    let Some(dir) = dir else {
        return;
    };
    let path = dir.join(format!("{name}.ptx"));
    if let Err(e) = fs::create_dir_all(dir).and_then(|_| fs::write(&path, ptx.to_src())) {
        log::warn!("cannot write {}: {e}", path.display());
    }
}
