//! The SSI replace build stage: locate → fetch → substitute → commit.

use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use ssireplace_fetcher::{FragmentFetcher, fetch_all_with};
use ssireplace_shared::{
    BuildMode, FETCH_TIMEOUT, FetchOutcome, INDEX_HTML, PLUGIN_NAME, PluginOptions, ReplaceConfig,
    Result, SsiReplaceError,
};
use ssireplace_substitute::{MarkerReport, MarkerStatus, substitute_with_report};

use crate::assets::{Asset, Assets, SourceMap};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Summary of a pass that rewrote the document.
#[derive(Debug, Clone)]
pub struct PassSummary {
    /// Name of the rewritten asset.
    pub document: String,
    /// Fate of each marker, in marker order.
    pub markers: Vec<MarkerReport>,
    /// Byte length of the new document.
    pub size: usize,
    /// SHA-256 of the new document.
    pub content_hash: String,
    /// Source map attached to the new document.
    pub source_map: SourceMap,
    /// Total elapsed time.
    pub elapsed: Duration,
}

impl PassSummary {
    pub fn fallback_count(&self) -> usize {
        self.markers
            .iter()
            .filter(|m| matches!(m.status, MarkerStatus::Fallback { .. }))
            .count()
    }
}

/// Result of [`SsiReplacePlugin::run`].
#[derive(Debug, Clone)]
pub enum PassReport {
    /// The build mode was not development; nothing was fetched or changed.
    Skipped { mode: BuildMode },
    /// The document was rewritten.
    Applied(PassSummary),
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting pass status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called as each fragment fetch settles.
    fn fragment_fetched(&self, url: &str, outcome: &FetchOutcome);
    /// Called when the pass completes successfully.
    fn done(&self, report: &PassReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn fragment_fetched(&self, _url: &str, _outcome: &FetchOutcome) {}
    fn done(&self, _report: &PassReport) {}
}

// ---------------------------------------------------------------------------
// Plugin
// ---------------------------------------------------------------------------

/// Injects remote header, footer and sidebar fragments into `index.html`.
#[derive(Debug, Clone)]
pub struct SsiReplacePlugin {
    config: ReplaceConfig,
}

/// The plugin bound to a development build, ready to process assets.
#[derive(Debug, Clone, Copy)]
pub struct ProcessAssetsStage<'a> {
    plugin: &'a SsiReplacePlugin,
}

impl SsiReplacePlugin {
    /// Validate `options` and build the plugin.
    pub fn new(options: PluginOptions) -> Result<Self> {
        Ok(Self {
            config: options.validate()?,
        })
    }

    pub fn config(&self) -> &ReplaceConfig {
        &self.config
    }

    /// Bind the plugin to a build. Outside development mode the plugin stays
    /// inert and `None` is returned.
    pub fn apply(&self, mode: BuildMode) -> Option<ProcessAssetsStage<'_>> {
        if !mode.is_development() {
            warn!(%mode, "{PLUGIN_NAME}: Plugin is meant for development mode only");
            return None;
        }
        Some(ProcessAssetsStage { plugin: self })
    }

    /// Run one build pass under `mode`.
    pub async fn run(
        &self,
        mode: BuildMode,
        assets: &mut Assets,
        fetcher: &dyn FragmentFetcher,
        progress: &dyn ProgressReporter,
    ) -> Result<PassReport> {
        let report = match self.apply(mode) {
            Some(stage) => PassReport::Applied(stage.process(assets, fetcher, progress).await?),
            None => PassReport::Skipped { mode },
        };
        progress.done(&report);
        Ok(report)
    }

    /// Rewrite `index.html` in `assets` with the fetched fragments.
    ///
    /// A missing document fails before any request is made. Errors other than
    /// that are wrapped with the plugin prefix.
    #[instrument(skip_all, fields(document = INDEX_HTML))]
    pub async fn process_assets(
        &self,
        assets: &mut Assets,
        fetcher: &dyn FragmentFetcher,
        progress: &dyn ProgressReporter,
    ) -> Result<PassSummary> {
        let start = Instant::now();

        progress.phase("Locating document");
        let document = assets
            .get(INDEX_HTML)
            .ok_or_else(|| SsiReplaceError::ArtifactNotFound {
                name: INDEX_HTML.into(),
            })?
            .source()
            .into_owned();

        self.rewrite(document, assets, fetcher, progress, start)
            .await
            .map_err(SsiReplaceError::processing)
    }

    async fn rewrite(
        &self,
        document: String,
        assets: &mut Assets,
        fetcher: &dyn FragmentFetcher,
        progress: &dyn ProgressReporter,
        start: Instant,
    ) -> Result<PassSummary> {
        let urls = self.config.urls();

        progress.phase("Fetching fragments");
        info!(count = urls.len(), "fetching fragments");
        let outcomes = fetch_all_with(fetcher, &urls, FETCH_TIMEOUT, |i, outcome| {
            progress.fragment_fetched(urls[i], outcome)
        })
        .await;

        progress.phase("Substituting markers");
        let spec = self.config.substitution_spec();
        let substitution = substitute_with_report(&document, &spec, &outcomes);

        for marker in &substitution.markers {
            match &marker.status {
                MarkerStatus::Replaced => {
                    debug!(marker = %marker.marker, url = %marker.source_url, "marker replaced")
                }
                MarkerStatus::Fallback { reason } => {
                    warn!(marker = %marker.marker, %reason, "inserted fallback comment")
                }
                MarkerStatus::MarkerMissing => {
                    debug!(marker = %marker.marker, "marker absent from document")
                }
            }
        }

        progress.phase("Updating asset");
        let source_map = SourceMap::empty(INDEX_HTML);
        let asset = Asset::from_text(substitution.text).with_map(source_map.clone());
        let size = asset.size();
        let content_hash = asset.content_hash();
        assets.update_asset(INDEX_HTML, asset)?;

        let summary = PassSummary {
            document: INDEX_HTML.into(),
            markers: substitution.markers,
            size,
            content_hash,
            source_map,
            elapsed: start.elapsed(),
        };

        info!(
            size = summary.size,
            fallbacks = summary.fallback_count(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "document updated"
        );

        Ok(summary)
    }
}

impl ProcessAssetsStage<'_> {
    /// Stage name reported to the host.
    pub fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    pub async fn process(
        &self,
        assets: &mut Assets,
        fetcher: &dyn FragmentFetcher,
        progress: &dyn ProgressReporter,
    ) -> Result<PassSummary> {
        self.plugin.process_assets(assets, fetcher, progress).await
    }
}
