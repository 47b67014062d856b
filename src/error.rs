//! Error taxonomy for the extraction engine.
//!
//! Only the two failure classes that are fatal for a whole extraction call
//! are typed; everything else (a frame that cannot be evaluated, a JSON body
//! that fails to parse) is caught at the strategy boundary and logged.
//! [`crate::Engine::extract`] itself never returns an error — fatal failures
//! surface as an empty result whose `blocked_hint` carries the rendered
//! error string.

use thiserror::Error;

/// Fatal failure of one extraction call.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The browser process could not be started (or the initial page could
    /// not be opened).
    #[error("launch: {0}")]
    Launch(String),

    /// Top-level navigation did not complete within the timeout.
    #[error("navigation: {0}")]
    Navigation(String),
}
