/*!
 * Parsing of service responses and write-back into the document.
 *
 * The response grammar is one `<id>: <text>` pair per line. Lines that do
 * not match are counted as malformed, never fatal. Ids that were not asked
 * for are anomalies and are dropped. When an id repeats, the first
 * occurrence wins.
 */

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::document::DocumentTree;
use crate::translation::batch::{EntryTag, TranslationBatch};

static RESPONSE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)\s*:\s*(.+?)\s*$").expect("response line pattern is valid"));

/// Models sometimes echo the input tag in front of the id
static ECHOED_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\[(?:TRANSLATE|CONTEXT)\]\s*").expect("echoed tag pattern is valid"));

/// Validated content of one response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    /// First translation seen for every id
    pub translations: BTreeMap<u64, String>,
    /// Non-blank lines that did not match the grammar
    pub malformed_lines: Vec<String>,
    /// Ids seen more than once, once per extra occurrence
    pub duplicate_ids: Vec<u64>,
}

/// Parse raw response text. Blank lines are ignored.
pub fn parse_response(raw: &str) -> ParsedResponse {
    let mut parsed = ParsedResponse::default();

    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let stripped = ECHOED_TAG.replace(line, "");
        let pair = RESPONSE_LINE
            .captures(&stripped)
            .and_then(|caps| Some((caps[1].parse::<u64>().ok()?, caps[2].to_string())));

        match pair {
            Some((id, text)) => match parsed.translations.entry(id) {
                Entry::Vacant(slot) => {
                    slot.insert(text);
                }
                Entry::Occupied(_) => parsed.duplicate_ids.push(id),
            },
            None => parsed.malformed_lines.push(line.trim().to_string()),
        }
    }

    parsed
}

/// Outcome of reconciling one batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    /// TRANSLATE entries that received a translation
    pub matched: usize,
    /// TRANSLATE entries without a response line
    pub missing: usize,
    pub malformed: usize,
    pub duplicate: usize,
    /// Ids answered that were not TRANSLATE entries of this batch
    pub anomalous: usize,
    pub missing_ids: Vec<u64>,
    pub anomalous_ids: Vec<u64>,
}

impl ReconciliationReport {
    /// True when every requested id was answered and nothing else was
    pub fn is_clean(&self) -> bool {
        self.missing == 0 && self.malformed == 0 && self.duplicate == 0 && self.anomalous == 0
    }

    /// Add another batch's counts to this one
    pub fn merge(&mut self, other: &ReconciliationReport) {
        self.matched += other.matched;
        self.missing += other.missing;
        self.malformed += other.malformed;
        self.duplicate += other.duplicate;
        self.anomalous += other.anomalous;
        self.missing_ids.extend_from_slice(&other.missing_ids);
        self.anomalous_ids.extend_from_slice(&other.anomalous_ids);
    }
}

/// Writes parsed translations back into the document.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseReconciler;

impl ResponseReconciler {
    pub fn new() -> Self {
        Self
    }

    /// Apply `raw_response` to the sentences of `batch`.
    ///
    /// Only TRANSLATE entries are written. A sentence that already holds a
    /// translation keeps it, so applying the same response twice yields the
    /// same document and the same report.
    pub fn reconcile(
        &self,
        batch: &TranslationBatch,
        raw_response: &str,
        document: &mut DocumentTree,
    ) -> ReconciliationReport {
        let parsed = parse_response(raw_response);
        let mut report = ReconciliationReport {
            malformed: parsed.malformed_lines.len(),
            duplicate: parsed.duplicate_ids.len(),
            ..Default::default()
        };

        for (id, text) in &parsed.translations {
            let target = batch
                .entry(*id)
                .filter(|entry| entry.tag == EntryTag::Translate)
                .and_then(|entry| document.sentence_mut(entry.location))
                .filter(|sentence| sentence.should_translate());

            match target {
                Some(sentence) => {
                    sentence.record_translation(text.as_str());
                    report.matched += 1;
                }
                None => {
                    report.anomalous += 1;
                    report.anomalous_ids.push(*id);
                }
            }
        }

        for entry in batch.translate_entries() {
            if !parsed.translations.contains_key(&entry.reference_id) {
                report.missing += 1;
                report.missing_ids.push(entry.reference_id);
            }
        }

        if report.is_clean() {
            debug!("Batch {}: {} translation(s) applied", batch.index, report.matched);
        } else {
            warn!(
                "Batch {}: {} matched, {} missing, {} malformed, {} duplicate, {} anomalous",
                batch.index, report.matched, report.missing, report.malformed, report.duplicate, report.anomalous
            );
            for line in parsed.malformed_lines.iter().take(3) {
                debug!("Batch {} malformed line: {}", batch.index, line);
            }
        }

        report
    }
}
