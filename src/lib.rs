// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod analytics;
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod difficulty;
pub mod error;
pub mod judge;
pub mod logging;
pub mod marker;
pub mod runtime;
pub mod session;
pub mod sink;
pub mod spawner;
pub mod util;
