//! Agricultural advisor

use std::sync::Arc;

use async_trait::async_trait;

use kisan_voice_core::{Advisor, Advisory, Error, Result};

use crate::client::GenerativeBackend;
use crate::prompt::{self, GenerationRequest};

/// Answers a farmer's question in their language, briefly enough to be
/// spoken
pub struct GeminiAdvisor {
    backend: Arc<dyn GenerativeBackend>,
}

impl GeminiAdvisor {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Advisor for GeminiAdvisor {
    async fn advise(&self, query: &str, language: &str) -> Result<Advisory> {
        if query.trim().is_empty() {
            return Err(Error::InvalidRequest("empty query".to_string()));
        }

        let request = GenerationRequest::new(prompt::advisor_instruction(language)).text(query);
        let text = self.backend.generate(&request).await?;

        tracing::debug!(language, chars = text.chars().count(), "Advice generated");

        Ok(Advisory::new(text, language))
    }

    fn model_name(&self) -> &str {
        self.backend.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::Part;
    use crate::LlmError;
    use parking_lot::Mutex;

    struct Scripted {
        reply: std::result::Result<String, fn() -> LlmError>,
        seen: Mutex<Vec<GenerationRequest>>,
    }

    #[async_trait]
    impl GenerativeBackend for Scripted {
        async fn generate(&self, request: &GenerationRequest) -> std::result::Result<String, LlmError> {
            self.seen.lock().push(request.clone());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(make) => Err(make()),
            }
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    #[tokio::test]
    async fn test_advice_in_run_language() {
        let backend = Arc::new(Scripted {
            reply: Ok("Gehun ko abhi paani dijiye.".to_string()),
            seen: Mutex::new(Vec::new()),
        });
        let advisor = GeminiAdvisor::new(backend.clone());

        let advisory = advisor.advise("गेहूं में पानी कब दें?", "hi").await.unwrap();
        assert_eq!(advisory.language, "hi");
        assert_eq!(advisory.text, "Gehun ko abhi paani dijiye.");

        let seen = backend.seen.lock();
        assert!(seen[0].system_instruction.contains("Hinglish"));
        assert_eq!(seen[0].parts, vec![Part::Text("गेहूं में पानी कब दें?".to_string())]);
    }

    #[tokio::test]
    async fn test_quota_error_maps_to_rate_limited() {
        let advisor = GeminiAdvisor::new(Arc::new(Scripted {
            reply: Err(|| LlmError::Api {
                status: 429,
                code: Some("RESOURCE_EXHAUSTED".to_string()),
                message: "quota".to_string(),
            }),
            seen: Mutex::new(Vec::new()),
        }));
        let err = advisor.advise("q", "ta").await.unwrap_err();
        assert!(matches!(err, Error::RateLimited(_)));
    }

    #[tokio::test]
    async fn test_blank_query_rejected() {
        let advisor = GeminiAdvisor::new(Arc::new(Scripted {
            reply: Ok("x".to_string()),
            seen: Mutex::new(Vec::new()),
        }));
        assert!(matches!(
            advisor.advise("   ", "hi").await,
            Err(Error::InvalidRequest(_))
        ));
    }
}
