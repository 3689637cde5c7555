use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use lightbox_config::{ConfigLoad, ConfigSource, ViewerConfig};
use lightbox_core::{Lightbox, RenderOutcome, window_indices};
use lightbox_model::{ByteSize, MediaItem};

use crate::view::ConsoleView;
use crate::{PlanArgs, WalkArgs};

/// `--config` wins over the environment and default files.
pub(crate) fn load_config(path: Option<&Path>) -> Result<ConfigLoad> {
    match path {
        Some(path) => {
            let config = ViewerConfig::load_from_file(path)?;
            let warnings = config.validate();
            Ok(ConfigLoad {
                config,
                source: ConfigSource::File(path.to_path_buf()),
                warnings,
            })
        }
        None => ViewerConfig::load_from_env(),
    }
}

pub(crate) fn plan(config: &ViewerConfig, args: &PlanArgs) -> Result<()> {
    anyhow::ensure!(args.count > 0, "--count must be at least 1");
    anyhow::ensure!(
        args.center < args.count,
        "--center {} is out of range for {} items",
        args.center,
        args.count
    );

    let radius = args
        .radius
        .unwrap_or_else(|| config.preload_radius(args.streak));
    let indices: Vec<String> = window_indices(args.center, radius, args.count)
        .into_iter()
        .map(|idx| idx.to_string())
        .collect();
    println!(
        "center {}, radius {}: {}",
        args.center,
        radius,
        indices.join(" ")
    );
    Ok(())
}

pub(crate) fn show_config(loaded: &ConfigLoad, json: bool) -> Result<()> {
    let source = match &loaded.source {
        ConfigSource::Default => "defaults".to_string(),
        ConfigSource::EnvPath(path) => format!("$LIGHTBOX_CONFIG_PATH ({})", path.display()),
        ConfigSource::EnvInline => "$LIGHTBOX_CONFIG_JSON".to_string(),
        ConfigSource::File(path) => path.display().to_string(),
    };

    if json {
        let rendered = serde_json::to_string_pretty(&loaded.config)
            .context("failed to render config as JSON")?;
        println!("{rendered}");
        eprintln!("source: {source}");
    } else {
        let rendered = toml::to_string_pretty(&loaded.config)
            .context("failed to render config as TOML")?;
        println!("# source: {source}");
        println!("# cache budget: {}", loaded.config.cache_budget_bytes);
        print!("{rendered}");
    }

    for warning in loaded.warnings.iter() {
        eprintln!("warning: {warning}");
    }
    Ok(())
}

pub(crate) async fn walk(mut config: ViewerConfig, args: WalkArgs) -> Result<()> {
    let raw = fs::read_to_string(&args.items)
        .with_context(|| format!("failed to read items from {}", args.items.display()))?;
    let items: Vec<MediaItem> = serde_json::from_str(&raw)
        .with_context(|| format!("invalid items file {}", args.items.display()))?;
    if let Some(mib) = args.budget_mib {
        config.cache_budget_bytes = ByteSize::from_mib(mib);
    }

    let lightbox = Lightbox::http(config, Arc::new(ConsoleView))
        .context("failed to build HTTP viewer")?;

    let mut outcomes = vec![lightbox.open(items, args.start).await];
    for navigation in args.moves {
        outcomes.push(lightbox.navigate(navigation).await);
        if args.settle {
            lightbox.settle_preloads().await;
        }
    }
    let preloads = lightbox.settle_preloads().await;
    lightbox.close();

    let failed = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, RenderOutcome::Failed(_)))
        .count();
    let stats = lightbox.cache().stats();
    println!(
        "renders: {} ({} failed), preloads warmed {} failed {}",
        outcomes.len(),
        failed,
        preloads.warmed,
        preloads.failed
    );
    println!(
        "cache: {} entries ({} negative), {} / {}, {} transport calls",
        stats.entries,
        stats.negative_entries,
        stats.resident,
        stats.budget,
        lightbox.coordinator().transport_calls()
    );
    Ok(())
}
