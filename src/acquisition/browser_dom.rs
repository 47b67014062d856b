//! Frame-based DOM extraction heuristics.
//!
//! The scripts live in `js/` and are embedded at compile time; this module
//! runs them across every accessible frame and merges the results. Frames
//! that fail to evaluate (cross-origin frames, detached frames) contribute
//! nothing — per-frame failures are never fatal.
//!
//! The main script prefers job-detail links (least ambiguous, one title per
//! link) and falls back to call-to-action anchored card scoring; see the
//! script itself for the weights.

use crate::renderer::FrameHandle;
use crate::types::FrameStats;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// Link-first / CTA-card extraction. Returns raw titles.
const COLLECT_TITLES_JS: &str = include_str!("js/collect_titles.js");
/// Counts call-to-action elements. Returns a number.
const COUNT_CTAS_JS: &str = include_str!("js/count_ctas.js");
/// CTA count + heading sample for diagnostics. Returns `{ctas, headings}`.
const FRAME_PROBE_JS: &str = include_str!("js/frame_probe.js");
/// Oracle candidate-experience DOM sweep. Returns raw titles.
const ORACLE_DOM_JS: &str = include_str!("js/oracle_dom.js");
/// Clicks the first visible consent button. Returns whether it clicked.
const CONSENT_CLICK_JS: &str = include_str!("js/consent_click.js");

/// Run the link-first/CTA-card heuristic in every frame and merge the raw
/// candidates in frame order. The caller applies the classifier.
pub async fn collect_titles_across_frames(frames: &[Arc<dyn FrameHandle>]) -> Vec<String> {
    let mut out = Vec::new();
    for frame in frames {
        match frame.evaluate(COLLECT_TITLES_JS).await {
            Ok(value) => {
                if let Ok(titles) = serde_json::from_value::<Vec<String>>(value) {
                    out.extend(titles);
                }
            }
            Err(e) => debug!("title sweep skipped frame {}: {e}", frame.url()),
        }
    }
    out
}

/// Count call-to-action elements across all frames (diagnostic only).
pub async fn count_ctas(frames: &[Arc<dyn FrameHandle>]) -> u64 {
    let mut count = 0;
    for frame in frames {
        match frame.evaluate(COUNT_CTAS_JS).await {
            Ok(value) => count += value.as_u64().unwrap_or(0),
            Err(e) => debug!("cta count skipped frame {}: {e}", frame.url()),
        }
    }
    count
}

#[derive(Debug, Deserialize)]
struct FrameProbe {
    ctas: u64,
    headings: Vec<String>,
}

/// Collect per-frame diagnostics: which frame holds the CTAs and headings.
pub async fn frame_stats(frames: &[Arc<dyn FrameHandle>]) -> Vec<FrameStats> {
    let mut stats = Vec::new();
    for frame in frames {
        match frame.evaluate(FRAME_PROBE_JS).await {
            Ok(value) => match serde_json::from_value::<FrameProbe>(value) {
                Ok(probe) => stats.push(FrameStats {
                    url: frame.url(),
                    ctas: probe.ctas,
                    sample_headings: probe.headings,
                    error: None,
                }),
                Err(e) => stats.push(FrameStats {
                    url: frame.url(),
                    error: Some(e.to_string()),
                    ..Default::default()
                }),
            },
            Err(e) => stats.push(FrameStats {
                url: frame.url(),
                error: Some(e.to_string()),
                ..Default::default()
            }),
        }
    }
    stats
}

/// Oracle candidate-experience DOM sweep across all frames. Raw titles.
pub async fn collect_oracle_titles(frames: &[Arc<dyn FrameHandle>]) -> Vec<String> {
    let mut out = Vec::new();
    for frame in frames {
        match frame.evaluate(ORACLE_DOM_JS).await {
            Ok(value) => {
                if let Ok(titles) = serde_json::from_value::<Vec<String>>(value) {
                    out.extend(titles);
                }
            }
            Err(e) => debug!("vendor sweep skipped frame {}: {e}", frame.url()),
        }
    }
    out
}

/// Try to dismiss a consent dialog in the main frame. Absence of a consent
/// button is not an error; returns whether a button was clicked.
pub async fn dismiss_consent(frame: &dyn FrameHandle) -> bool {
    match frame.evaluate(CONSENT_CLICK_JS).await {
        Ok(value) => value.as_bool().unwrap_or(false),
        Err(e) => {
            debug!("consent probe failed: {e}");
            false
        }
    }
}
