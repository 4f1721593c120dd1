//! Candidate lists built from the live model catalog.

use crate::providers::{GenerativeBackend, ProviderError};
use crate::resolver::{normalize_model_id, order_flash_first};
use crate::types::ModelInfo;

/// Catalog entries that accept `generateContent`, flash models first, deduplicated.
pub fn catalog_candidates(models: &[ModelInfo]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for m in models.iter().filter(|m| m.supports_generate) {
        let id = normalize_model_id(&m.id).to_string();
        if !id.is_empty() && !ids.contains(&id) {
            ids.push(id);
        }
    }
    order_flash_first(ids)
}

/// Fetch the catalog and turn it into an ordered candidate list.
pub async fn fetch_candidates(
    backend: &dyn GenerativeBackend,
    api_key: &str,
) -> Result<Vec<String>, ProviderError> {
    let models = backend.list_models(api_key).await?;
    Ok(catalog_candidates(&models))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: &str, supports_generate: bool) -> ModelInfo {
        ModelInfo {
            id: id.into(),
            display_name: id.into(),
            supports_generate,
        }
    }

    #[test]
    fn catalog_candidates_filters_and_orders() {
        let models = vec![
            info("gemini-1.5-pro", true),
            info("text-embedding-004", false),
            info("models/gemini-1.5-flash", true),
            info("gemini-1.5-flash", true),
            info("gemini-2.0-flash", true),
        ];
        assert_eq!(
            catalog_candidates(&models),
            vec!["gemini-1.5-flash", "gemini-2.0-flash", "gemini-1.5-pro"]
        );
    }

    #[test]
    fn empty_catalog_gives_empty_list() {
        assert!(catalog_candidates(&[]).is_empty());
    }
}
