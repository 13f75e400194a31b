use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;

use env_logger::{Builder, Env, Target};

/// Routes the `log` facade to a file. The terminal is in raw mode while a
/// session runs, so nothing may be written to stderr.
///
/// The filter comes from `RUST_LOG` and defaults to `info`.
pub fn init(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let result = Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Pipe(Box::new(file)))
        .format_timestamp_millis()
        .try_init();
    if let Err(e) = result {
        // a logger is already installed, e.g. by a test harness
        log::debug!("logger not replaced: {}", e);
    }
    Ok(())
}
