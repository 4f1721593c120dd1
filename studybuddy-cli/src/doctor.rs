use crate::ask::build_buddy;
use studybuddy::models::catalog_candidates;
use studybuddy::providers::status::classify;
use studybuddy::{resolve_api_key, AskError, ConfigManager, GeminiClient, GenerativeBackend};

/// Print the live catalog, flash models first.
pub async fn run_models(manager: &ConfigManager) -> anyhow::Result<()> {
    let config = manager.load()?;
    let api_key = resolve_api_key(config.api_key.as_deref()).ok_or(AskError::MissingApiKey)?;
    let client = match config.base_url.as_deref() {
        Some(url) => GeminiClient::with_base_url(url),
        None => GeminiClient::new(),
    };

    let models = match client.list_models(&api_key).await {
        Ok(m) => m,
        Err(e) => {
            println!("❌ Could not fetch the model catalog ({:?}): {}", classify(&e), e);
            return Ok(());
        }
    };

    for id in catalog_candidates(&models) {
        let name = models
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.display_name.as_str())
            .unwrap_or("");
        println!("{:<40} {}", id, name);
    }
    Ok(())
}

/// Probe every candidate and report which model the resolver would pick.
pub async fn run_doctor(manager: &ConfigManager) -> anyhow::Result<()> {
    let config = manager.load()?;
    let buddy = build_buddy(&config, false)?;

    let source = if config.use_catalog { "catalog" } else { "config" };
    println!("📋 Probing candidates (from {})...", source);

    let report = buddy.probe_report().await;
    if report.is_empty() {
        println!("No candidate models. Run `studybuddy config set-models <id>...` first.");
        return Ok(());
    }

    for outcome in &report {
        match &outcome.error {
            None => println!("  ✅ {}", outcome.model),
            Some(err) => println!("  ❌ {} - {}", outcome.model, err),
        }
    }

    match report.iter().find(|o| o.is_ok()) {
        Some(o) => println!("\nResolved model: {}", o.model),
        None => println!("\nNo usable model: every candidate failed its probe."),
    }

    let quota_hits = report
        .iter()
        .filter_map(|o| o.error.as_deref())
        .filter(|e| e.contains("429") || e.to_lowercase().contains("quota"))
        .count();
    if quota_hits > 0 {
        println!("⚠️  {} candidate(s) hit a quota limit.", quota_hits);
    }

    println!("\nDoctor check complete.");
    Ok(())
}
