//! Network traffic miner.
//!
//! Registered as the page's [`ResponseObserver`] before navigation: every
//! in-flight response is classified by URL, and only job-data candidates
//! have their bodies fetched and fed into the JSON walkers or the
//! text-pattern extractor. Accumulation is passive — responses may keep
//! arriving after navigation resolves, so the orchestrator harvests the
//! miner only after the settle waits.

use crate::acquisition::{json_walker, oracle_adf, text_pattern};
use crate::renderer::ResponseObserver;
use crate::types::{JobRecord, ResponseInfo};
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::debug;

const SAMPLE_CAP: usize = 12;
const RELEVANT_CAP: usize = 40;

/// URL fragments marking a response as a likely job-data carrier, including
/// the Oracle HCM candidate-experience endpoints.
const RELEVANT_FRAGMENTS: &[&str] = &[
    "search",
    "job",
    "requisition",
    "posting",
    "career",
    "opening",
    "ats",
    "api",
    "ajax",
    "graphql",
    "hcmui",
    "candidateexperience",
    "oraclecloud",
    "recruitingcejobrequisitions",
    "hcmrestapi",
];

/// Everything the miner accumulated during one page load.
#[derive(Debug, Clone, Default)]
pub struct MinerHarvest {
    /// Raw title candidates from JSON walkers and text patterns (unfiltered).
    pub raw_titles: Vec<String>,
    /// Structured records from the vendor-specific walker.
    pub records: Vec<JobRecord>,
    /// Relevant responses inspected.
    pub responses_scanned: usize,
    /// First responses seen, capped.
    pub samples: Vec<ResponseInfo>,
    /// Deduplicated relevant responses, capped.
    pub relevant: Vec<ResponseInfo>,
    /// Notes for the extraction trace (vendor parse diagnostics).
    pub notes: Vec<String>,
}

#[derive(Default)]
struct MinerState {
    harvest: MinerHarvest,
    relevant_seen: HashSet<String>,
}

/// Passive response accumulator for one extraction call.
#[derive(Default)]
pub struct NetworkMiner {
    state: Mutex<MinerState>,
}

impl NetworkMiner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the accumulated state.
    pub fn harvest(&self) -> MinerHarvest {
        self.state.lock().expect("miner lock").harvest.clone()
    }

    fn is_relevant(url: &str) -> bool {
        let lower = url.to_ascii_lowercase();
        RELEVANT_FRAGMENTS.iter().any(|f| lower.contains(f))
    }

    fn is_json(content_type: &str) -> bool {
        content_type.contains("application/json")
            || content_type.contains("+json")
            || content_type.contains("/json")
    }

    fn is_textual(content_type: &str) -> bool {
        content_type.contains("text/") || content_type.contains("application/javascript")
    }

    fn is_requisition_endpoint(url: &str) -> bool {
        url.to_ascii_lowercase()
            .contains("recruitingcejobrequisitions")
    }
}

impl ResponseObserver for NetworkMiner {
    fn on_response(&self, url: &str, content_type: &str) -> bool {
        let mut state = self.state.lock().expect("miner lock");
        if state.harvest.samples.len() < SAMPLE_CAP {
            state.harvest.samples.push(ResponseInfo {
                url: url.to_string(),
                content_type: content_type.to_string(),
            });
        }
        if !Self::is_relevant(url) {
            return false;
        }
        state.harvest.responses_scanned += 1;
        if state.relevant_seen.insert(url.to_string()) {
            state.harvest.relevant.push(ResponseInfo {
                url: url.to_string(),
                content_type: content_type.to_string(),
            });
            if state.harvest.relevant.len() > RELEVANT_CAP {
                state.harvest.relevant.remove(0);
            }
        }
        // Body is only worth fetching when we can interpret it.
        Self::is_json(content_type) || Self::is_textual(content_type)
    }

    fn on_body(&self, url: &str, content_type: &str, body: &str) {
        if Self::is_json(content_type) {
            match serde_json::from_str::<serde_json::Value>(body) {
                Ok(data) => {
                    let mut state = self.state.lock().expect("miner lock");

                    // The vendor walker owns its endpoint's responses; the
                    // generic walker only backstops shapes it cannot read.
                    let mut handled = false;
                    if Self::is_requisition_endpoint(url) {
                        let records = oracle_adf::extract_requisitions(&data);
                        if records.is_empty() {
                            // Diagnose the unexpected shape for the trace.
                            let items = data.get("items").and_then(|v| v.as_array());
                            let first_keys = items
                                .and_then(|a| a.first())
                                .and_then(|v| v.as_object())
                                .map(|o| o.keys().cloned().collect::<Vec<_>>().join(", "))
                                .filter(|s| !s.is_empty())
                                .unwrap_or_else(|| "(none)".to_string());
                            state.harvest.notes.push(format!(
                                "requisition endpoint yielded no titles: items.len={}, first item keys: {first_keys}",
                                items.map_or(0, |a| a.len()),
                            ));
                        } else {
                            state.harvest.notes.push(format!(
                                "requisition endpoint yielded {} records",
                                records.len()
                            ));
                            state
                                .harvest
                                .raw_titles
                                .extend(records.iter().map(|r| r.title.clone()));
                            state.harvest.records.extend(records);
                            handled = true;
                        }
                    }
                    if !handled {
                        json_walker::collect_titles(&data, &mut state.harvest.raw_titles);
                    }
                }
                Err(e) => {
                    debug!("unparseable JSON response from {url}: {e}");
                    if Self::is_requisition_endpoint(url) {
                        self.state
                            .lock()
                            .expect("miner lock")
                            .harvest
                            .notes
                            .push(format!("failed to parse requisition payload: {e}"));
                    }
                }
            }
            return;
        }

        if Self::is_textual(content_type) {
            let titles = text_pattern::extract_titles(body);
            if !titles.is_empty() {
                self.state
                    .lock()
                    .expect("miner lock")
                    .harvest
                    .raw_titles
                    .extend(titles);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_relevance_classification() {
        assert!(NetworkMiner::is_relevant(
            "https://x.example/api/search?q=rn"
        ));
        assert!(NetworkMiner::is_relevant(
            "https://x.example/graphql"
        ));
        assert!(NetworkMiner::is_relevant(
            "https://host.fa.us2.oraclecloud.com/hcmRestApi/resources/latest/recruitingCEJobRequisitions"
        ));
        assert!(!NetworkMiner::is_relevant(
            "https://cdn.example/fonts/roboto.woff2"
        ));
        assert!(!NetworkMiner::is_relevant(
            "https://cdn.example/analytics.png"
        ));
    }

    #[test]
    fn test_irrelevant_responses_skip_body_fetch() {
        let miner = NetworkMiner::new();
        assert!(!miner.on_response("https://cdn.example/styles.css", "text/css"));
        let harvest = miner.harvest();
        assert_eq!(harvest.responses_scanned, 0);
        assert_eq!(harvest.samples.len(), 1); // still sampled for diagnostics
    }

    #[test]
    fn test_sample_and_relevant_caps() {
        let miner = NetworkMiner::new();
        for i in 0..60 {
            miner.on_response(
                &format!("https://x.example/api/jobs/{i}"),
                "application/json",
            );
        }
        let harvest = miner.harvest();
        assert_eq!(harvest.samples.len(), SAMPLE_CAP);
        assert_eq!(harvest.relevant.len(), RELEVANT_CAP);
        assert_eq!(harvest.responses_scanned, 60);
    }

    #[test]
    fn test_relevant_responses_deduplicated() {
        let miner = NetworkMiner::new();
        for _ in 0..3 {
            miner.on_response("https://x.example/api/jobs", "application/json");
        }
        let harvest = miner.harvest();
        assert_eq!(harvest.relevant.len(), 1);
        assert_eq!(harvest.responses_scanned, 3);
    }

    #[test]
    fn test_json_body_feeds_generic_walker() {
        let miner = NetworkMiner::new();
        let body = json!({
            "results": [ { "jobTitle": "Registered Nurse", "jobId": 178687 } ]
        })
        .to_string();
        miner.on_body("https://x.example/api/jobs", "application/json", &body);
        assert_eq!(miner.harvest().raw_titles, vec!["Registered Nurse"]);
    }

    #[test]
    fn test_requisition_endpoint_produces_records() {
        let miner = NetworkMiner::new();
        let body = json!({
            "items": [{
                "requisitionList": {
                    "items": [
                        { "RequisitionTitle": "Registered Nurse", "RequisitionId": "178687" }
                    ]
                }
            }]
        })
        .to_string();
        miner.on_body(
            "https://host.oraclecloud.com/hcmRestApi/resources/latest/recruitingCEJobRequisitions?q=x",
            "application/vnd.oracle.adf.resourcecollection+json",
            &body,
        );
        let harvest = miner.harvest();
        assert_eq!(harvest.records.len(), 1);
        assert_eq!(harvest.records[0].id.as_deref(), Some("178687"));
        assert!(harvest.raw_titles.contains(&"Registered Nurse".to_string()));
        assert!(harvest.notes.iter().any(|n| n.contains("1 records")));
    }

    #[test]
    fn test_requisition_parse_failure_is_noted_not_fatal() {
        let miner = NetworkMiner::new();
        miner.on_body(
            "https://host.oraclecloud.com/recruitingCEJobRequisitions",
            "application/json",
            "{ not json",
        );
        let harvest = miner.harvest();
        assert!(harvest.raw_titles.is_empty());
        assert!(harvest
            .notes
            .iter()
            .any(|n| n.contains("failed to parse requisition payload")));
    }

    #[test]
    fn test_text_body_runs_pattern_extractor() {
        let miner = NetworkMiner::new();
        miner.on_body(
            "https://x.example/ajax/openings",
            "text/plain",
            "Respiratory Therapist\n178687\nFull-Time\nHouston, TX\n",
        );
        assert_eq!(miner.harvest().raw_titles, vec!["Respiratory Therapist"]);
    }

    #[test]
    fn test_vendor_json_subtype_recognized() {
        assert!(NetworkMiner::is_json(
            "application/vnd.oracle.adf.resourcecollection+json"
        ));
        assert!(NetworkMiner::is_json("application/json; charset=utf-8"));
        assert!(!NetworkMiner::is_json("text/html"));
    }
}
