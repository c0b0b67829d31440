//! Tracing setup for processes embedding the synchronizer.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Install a compact fmt subscriber filtered by `RUST_LOG`, falling back to `default_level`.
///
/// Returns `false` if a global subscriber was already installed, in which case nothing changes.
pub fn init_tracing(default_level: Level) -> bool {
	let filter = EnvFilter::builder()
		.with_default_directive(default_level.into())
		.from_env_lossy();

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.try_init()
		.is_ok()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn second_initialisation_is_a_no_op() {
		init_tracing(Level::DEBUG);
		assert!(!init_tracing(Level::INFO));
	}
}
