//! Loopcam - continuous loop recording, save the moments that matter.
//!
//! This is the main library crate. It keeps a camera recording in a rolling
//! loop and, when a trigger fires, cuts the configured pre-roll and post-roll
//! window out of the recording and hands it to a media library.

pub mod capture;
pub mod config;
pub mod export;
pub mod library;
pub mod recorder;
pub mod trigger;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use recorder::{Collaborators, RecorderEvent, RecorderHandle, RecordingController, RecordingState};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter. Calling this more than once is
/// harmless.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loopcam=debug,loopcam_lib=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
