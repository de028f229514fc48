//! Logger setup for the `dang` binary
//!
//! The core only emits through the `log` facade. `dang` installs an
//! `env_logger` backend once at startup, from `RUST_LOG` or from the
//! `-v` count.
//!
//! What the core emits:
//! - `warn!` for introspection types of an unknown kind
//! - `debug!` for hoisting passes, shadowed type names, rollbacks and imports
//! - `trace!` for unification steps and each evaluated form
//!
//! ```bash
//! RUST_LOG=compiler::typecheck=debug dang schema github.json
//! ```

use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;
use std::sync::Once;

static INIT: Once = Once::new();

/// Log everything at `level` and above, tagged with module and line.
/// Later calls are ignored.
pub fn init_with_level(level: LevelFilter) {
    INIT.call_once(|| {
        Builder::new()
            .filter_level(level)
            .format(|buf, record| {
                writeln!(
                    buf,
                    "[{:5}] {}:{} - {}",
                    record.level(),
                    record.target(),
                    record.line().unwrap_or(0),
                    record.args()
                )
            })
            .init();
    });
}

/// Filter by `RUST_LOG`, warnings only when it is unset
pub fn init_from_env() {
    INIT.call_once(|| {
        Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    });
}
