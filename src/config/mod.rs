//! Configuration module for vidscan.
//!
//! Handles loading application settings and prompt templates. Settings are
//! passed explicitly to every component at construction.

mod prompts;
mod settings;

pub use prompts::{AnalysisPrompts, Prompts};
pub use settings::{
    AnalysisSettings, FetchSettings, GeneralSettings, PipelineSettings, Settings,
    StoreSettings, TranscriptionProvider, TranscriptionSettings, WorkerSettings,
};
