//! Marker substitution for fetched HTML fragments.
//!
//! Substitution is literal text replacement: each marker is replaced at its
//! first occurrence, in spec order, on the output of the previous step. No
//! HTML parsing takes place.

use ssireplace_shared::{FetchOutcome, SubstitutionSpec};
use tracing::debug;

/// What happened to a single marker during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerStatus {
    /// Replaced by the fetched fragment.
    Replaced,
    /// Replaced by the fallback comment because the fetch failed.
    Fallback { reason: String },
    /// Marker not present in the document; nothing changed.
    MarkerMissing,
}

/// Per-marker record of a substitution pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerReport {
    pub marker: String,
    pub source_url: String,
    pub status: MarkerStatus,
}

/// Output of [`substitute_with_report`].
#[derive(Debug, Clone)]
pub struct Substitution {
    /// The updated document text.
    pub text: String,
    /// One report per spec entry, in spec order.
    pub markers: Vec<MarkerReport>,
}

impl Substitution {
    /// Number of markers that received the fallback comment.
    pub fn fallback_count(&self) -> usize {
        self.markers
            .iter()
            .filter(|m| matches!(m.status, MarkerStatus::Fallback { .. }))
            .count()
    }

    /// Number of markers that were not found in the document.
    pub fn missing_count(&self) -> usize {
        self.markers
            .iter()
            .filter(|m| m.status == MarkerStatus::MarkerMissing)
            .count()
    }
}

/// Visible placeholder inserted when a fragment could not be fetched.
pub fn fallback_comment(url: &str) -> String {
    format!("<!-- Failed to load content from {url} -->")
}

/// Replace each marker in `document` with its fragment or fallback comment.
///
/// `outcomes[i]` belongs to `spec.entries()[i]`; surplus items on either side
/// are ignored.
pub fn substitute(document: &str, spec: &SubstitutionSpec, outcomes: &[FetchOutcome]) -> String {
    substitute_with_report(document, spec, outcomes).text
}

/// Same as [`substitute`], also reporting the fate of every marker.
pub fn substitute_with_report(
    document: &str,
    spec: &SubstitutionSpec,
    outcomes: &[FetchOutcome],
) -> Substitution {
    let mut text = document.to_string();
    let mut markers = Vec::with_capacity(spec.len());

    for (entry, outcome) in spec.entries().iter().zip(outcomes) {
        let replacement = match outcome {
            FetchOutcome::Success(body) => body.clone(),
            FetchOutcome::Failure(_) => fallback_comment(&entry.source_url),
        };

        let status = if replace_first(&mut text, &entry.marker, &replacement) {
            match outcome {
                FetchOutcome::Success(_) => MarkerStatus::Replaced,
                FetchOutcome::Failure(reason) => MarkerStatus::Fallback {
                    reason: reason.clone(),
                },
            }
        } else {
            debug!(marker = %entry.marker, "marker not found, skipping");
            MarkerStatus::MarkerMissing
        };

        markers.push(MarkerReport {
            marker: entry.marker.clone(),
            source_url: entry.source_url.clone(),
            status,
        });
    }

    Substitution { text, markers }
}

/// Replace the first occurrence of `marker` in place. Returns whether a match was found.
///
/// An empty marker never matches.
fn replace_first(text: &mut String, marker: &str, replacement: &str) -> bool {
    if marker.is_empty() {
        return false;
    }
    match text.find(marker) {
        Some(start) => {
            text.replace_range(start..start + marker.len(), replacement);
            true
        }
        None => false,
    }
}
