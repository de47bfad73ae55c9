// src/utils/logger.rs

use env_logger::{Builder, Env};

/// Installs the global logger; `RUST_LOG` still overrides the default level.
pub fn init(debug: bool) {
	let default_level = if debug { "debug" } else { "info" };
	Builder::from_env(Env::default().default_filter_or(default_level))
		.format_timestamp_millis()
		.format_module_path(true)
		.init();
}
