// Copyright 2026 Joblens Contributors
// SPDX-License-Identifier: Apache-2.0

//! Joblens — job-listing extraction engine.
//!
//! Given an arbitrary job-search page URL, produce a noise-filtered list of
//! job postings (title plus optional stable identifier) despite inconsistent
//! markup, client-side rendering, and vendor-specific backends. The engine
//! cascades through extraction strategies — direct JSON API, in-page DOM
//! heuristics, mined network traffic, vendor-specific walkers, and a static
//! HTML snapshot — and returns the first strategy's results together with a
//! diagnostic trace.
//!
//! The two public operations are [`Engine::extract`] and [`fingerprint`];
//! everything else exists to serve them.

pub mod acquisition;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod renderer;
pub mod types;

pub use config::EngineConfig;
pub use engine::Engine;
pub use types::{fingerprint, ExtractionDebug, ExtractionResult, JobRecord};
