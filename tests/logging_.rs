#![allow(dead_code)]

use tracing::Level;

/// Routes `tracing` output through the test harness. Safe to call from every test.
pub fn init() {
	let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(Level::TRACE).try_init();
}
