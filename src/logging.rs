use std::io::IsTerminal;
use std::sync::OnceLock;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

static INITIALISED: OnceLock<()> = OnceLock::new();

/// Installs the global fmt subscriber. Filter comes from `RUST_LOG`, default `info`.
///
/// A failed install leaves the guard unset, so a later call may retry.
pub fn init_tracing() -> Result<(), InitError> {
	if INITIALISED.get().is_some() {
		return Err(InitError::AlreadyInitialised);
	}

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let fmt_layer = tracing_subscriber::fmt::layer()
		.with_target(false)
		.with_ansi(std::io::stderr().is_terminal())
		.with_writer(std::io::stderr);

	Registry::default()
		.with(filter)
		.with(fmt_layer)
		.try_init()
		.map_err(|e| InitError::Subscriber(e.to_string()))?;

	let _ = INITIALISED.set(());
	Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
	#[error("tracing has already been initialised")]
	AlreadyInitialised,
	#[error("failed to install tracing subscriber: {0}")]
	Subscriber(String),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn failed_install_does_not_latch_the_guard() {
		// Another global subscriber makes every install attempt fail.
		let _ = tracing::subscriber::set_global_default(tracing::subscriber::NoSubscriber::default());

		assert!(matches!(init_tracing(), Err(InitError::Subscriber(_))));
		assert!(INITIALISED.get().is_none());
		assert!(matches!(init_tracing(), Err(InitError::Subscriber(_))));
	}
}
