//! Build-stage orchestration for SSI Replace.
//!
//! This crate ties the fragment fetcher and the marker substitutor into a
//! single pass over a build's [`Assets`], driven by [`SsiReplacePlugin`].

pub mod assets;
pub mod plugin;

pub use assets::{Asset, Assets, SourceMap};
pub use plugin::{
    PassReport, PassSummary, ProcessAssetsStage, ProgressReporter, SilentProgress,
    SsiReplacePlugin,
};
