use std::{env, path::PathBuf};

use spacetensor_core::{config, ExecConfig};

const VARS: [&str; 5] = [
    "SPACETENSOR_NUM_THREADS",
    "SPACETENSOR_FORCE_LINEAR",
    "SPACETENSOR_SYNC_LAUNCH",
    "SPACETENSOR_FAST_MATH",
    "SPACETENSOR_KERNEL_CACHE",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

// One test owns the environment so the overrides cannot interleave.
#[test]
fn environment_overrides() {
    clear_env();
    let base = ExecConfig::from_env().unwrap();
    assert_eq!(base, ExecConfig::default());

    env::set_var("SPACETENSOR_NUM_THREADS", " 3 ");
    env::set_var("SPACETENSOR_FORCE_LINEAR", "1");
    env::set_var("SPACETENSOR_SYNC_LAUNCH", "TRUE");
    env::set_var("SPACETENSOR_FAST_MATH", "no");
    env::set_var("SPACETENSOR_KERNEL_CACHE", "/tmp/spacetensor-ptx");
    let c = ExecConfig::from_env().unwrap();
    assert_eq!(c.num_threads, 3);
    assert!(c.force_linear);
    assert!(c.sync_after_launch);
    assert!(!c.fast_math);
    assert_eq!(c.kernel_cache_dir, Some(PathBuf::from("/tmp/spacetensor-ptx")));

    env::set_var("SPACETENSOR_KERNEL_CACHE", "off");
    assert_eq!(ExecConfig::from_env().unwrap().kernel_cache_dir, None);
    env::set_var("SPACETENSOR_KERNEL_CACHE", "");
    assert_eq!(ExecConfig::from_env().unwrap().kernel_cache_dir, None);

    env::set_var("SPACETENSOR_NUM_THREADS", "abc");
    let err = ExecConfig::from_env().unwrap_err();
    assert!(err.to_string().contains("SPACETENSOR_NUM_THREADS=abc"), "{err}");

    env::set_var("SPACETENSOR_NUM_THREADS", "0");
    assert!(ExecConfig::from_env().is_err());

    clear_env();
}

#[test]
fn validate_rejects_empty_settings() {
    assert!(ExecConfig::default().validate().is_ok());

    let c = ExecConfig {
        num_threads: 0,
        ..ExecConfig::default()
    };
    assert!(c.validate().is_err());

    let c = ExecConfig {
        block_y: 0,
        ..ExecConfig::default()
    };
    assert!(c.validate().is_err());

    let c = ExecConfig {
        max_linear_blocks: 0,
        ..ExecConfig::default()
    };
    assert!(c.validate().is_err());
}

#[test]
fn validate_limits_block_lanes() {
    let c = ExecConfig {
        block_x: 32,
        block_y: 32,
        ..ExecConfig::default()
    };
    assert!(c.validate().is_ok());

    let c = ExecConfig {
        block_x: 32,
        block_y: 33,
        ..ExecConfig::default()
    };
    assert!(c.validate().is_err());

    let c = ExecConfig {
        block_1d: 1025,
        ..ExecConfig::default()
    };
    assert!(c.validate().is_err());

    let c = ExecConfig {
        block_linear: 2048,
        ..ExecConfig::default()
    };
    assert!(c.validate().is_err());

    // 65536 * 65536 wraps to 0 in 32 bits.
    let c = ExecConfig {
        block_x: 65536,
        block_y: 65536,
        ..ExecConfig::default()
    };
    assert!(c.validate().is_err());
}

#[test]
fn init_installs_once() {
    let bad = ExecConfig {
        block_x: 0,
        ..ExecConfig::default()
    };
    assert!(config::init(bad).is_err());

    let installed = ExecConfig {
        num_threads: 2,
        block_1d: 128,
        force_linear: true,
        kernel_cache_dir: None,
        ..ExecConfig::default()
    };
    config::init(installed.clone()).unwrap();
    assert_eq!(config::global(), &installed);

    let err = config::init(ExecConfig::default()).unwrap_err();
    assert!(err.to_string().contains("already initialized"), "{err}");
    assert_eq!(config::global(), &installed);
}
