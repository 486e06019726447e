//! Language model traits

use async_trait::async_trait;
use crate::{Advisory, OptimizedText, Result};

/// Produces agricultural advice for a transcribed query
#[async_trait]
pub trait Advisor: Send + Sync + 'static {
    /// Answer the farmer's query in the given language
    ///
    /// # Arguments
    /// * `query` - Transcribed question in its original script
    /// * `language` - Language code the answer must be written in
    async fn advise(&self, query: &str, language: &str) -> Result<Advisory>;

    /// Get model name for logging
    fn model_name(&self) -> &str;
}

/// Rewrites advice into a form the TTS provider pronounces reliably
///
/// An optimizer may decide no rewrite is needed and return the text
/// unchanged ([`OptimizedText::passthrough`]).
#[async_trait]
pub trait TextOptimizer: Send + Sync + 'static {
    async fn optimize(&self, advisory: &Advisory) -> Result<OptimizedText>;

    /// Get model name for logging
    fn model_name(&self) -> &str;
}
