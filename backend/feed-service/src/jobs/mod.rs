pub mod cache_sweeper;

pub use cache_sweeper::{run_sweep_cycle, start_cache_sweeper, CacheSweeperConfig, SweepReport};
