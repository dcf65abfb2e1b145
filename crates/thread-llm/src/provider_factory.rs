//! Creates the generation provider from configuration.

use std::sync::Arc;

use thread_core::GenerationSettings;

use crate::provider::{GenerationError, GenerationProvider};
use crate::providers::OpenAICompatProvider;

fn is_local(api_base: &str) -> bool {
    let rest = api_base
        .trim_start_matches("http://")
        .trim_start_matches("https://");
    rest.starts_with("localhost") || rest.starts_with("127.0.0.1") || rest.starts_with("[::1]")
}

/// Remote endpoints need an API key; local ones may run without.
pub fn create_provider(
    settings: &GenerationSettings,
) -> Result<Arc<dyn GenerationProvider>, GenerationError> {
    let provider = match settings.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => OpenAICompatProvider::new(key),
        _ if is_local(&settings.api_base) => {
            log::debug!("No API key configured, using {} anonymously", settings.api_base);
            OpenAICompatProvider::anonymous()
        }
        _ => {
            return Err(GenerationError::Auth(format!(
                "no API key configured for {}",
                settings.api_base
            )))
        }
    };

    Ok(Arc::new(
        provider
            .with_base_url(settings.api_base.clone())
            .with_model(settings.model.clone()),
    ))
}
