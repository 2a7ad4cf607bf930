mod metric;
mod runner;

pub use metric::ProbeMetrics;
pub use metric::http_server;
pub use runner::{ProbeLoop, spawn_probe_loop};
