// src/utils/mod.rs
pub mod config;
pub mod env;
pub mod error;
pub mod progress_bars;

pub fn get_memory_usage() -> u64 {
    use sysinfo::System;
    let mut sys = System::new();
    sys.refresh_memory();
    sys.used_memory() / (1024 * 1024) // MB
}
