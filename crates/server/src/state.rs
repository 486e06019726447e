//! Application State
//!
//! Shared, read-only state across all handlers.

use std::sync::Arc;

use kisan_voice_config::Settings;
use kisan_voice_pipeline::PipelineOrchestrator;

use crate::telegram::TelegramBot;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub orchestrator: PipelineOrchestrator,
    /// Present when the Telegram webhook is enabled
    pub telegram: Option<Arc<TelegramBot>>,
}

impl AppState {
    pub fn new(config: Settings, orchestrator: PipelineOrchestrator) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator,
            telegram: None,
        }
    }

    pub fn with_telegram(mut self, bot: TelegramBot) -> Self {
        self.telegram = Some(Arc::new(bot));
        self
    }
}
