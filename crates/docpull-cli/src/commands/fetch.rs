//! The fetch command: merge configuration, resolve the profile, run the
//! pipeline, report the tally.

use crate::cli::Cli;
use anyhow::{Context, Result, bail};
use docpull_core::{FetchOrchestrator, FetcherConfig, SiteProfile, builtin_profile};
use tracing::info;

/// Run a fetch for the URL or profile named on the command line.
///
/// Per-page failures are reported in the final tally and do not affect
/// the exit code; only configuration-level problems error out.
pub async fn fetch(cli: Cli) -> Result<()> {
    let config = build_config(&cli)?;
    let profile = resolve_profile(&cli)?;

    info!(
        profile = %profile.name,
        output = %config.output_root.display(),
        "fetching documentation"
    );

    let orchestrator = FetchOrchestrator::new(config, profile)
        .context("could not construct fetch pipeline")?;
    let stats = orchestrator.run().await.context("fetch run failed")?;

    println!("Fetching statistics:");
    println!("  Fetched: {}", stats.fetched);
    println!("  Skipped: {}", stats.skipped);
    println!("  Errors:  {}", stats.errors);
    println!("  Total:   {}", stats.total());

    Ok(())
}

/// Config file (when given) under CLI flags, defaults under both.
fn build_config(cli: &Cli) -> Result<FetcherConfig> {
    let mut config = match cli.config {
        Some(ref path) => FetcherConfig::load(path)
            .with_context(|| format!("could not load config file {}", path.display()))?,
        None => FetcherConfig::default(),
    };

    if let Some(ref output) = cli.output {
        config.output_root.clone_from(output);
    }
    if let Some(rate_limit) = cli.rate_limit {
        config.rate_limit_secs = rate_limit;
    }
    if let Some(concurrency) = cli.concurrency {
        config.max_concurrent = concurrency;
    }
    if cli.sequential {
        config.sequential = true;
    }
    if let Some(max_retries) = cli.max_retries {
        config.max_retries = max_retries;
    }
    if let Some(max_pages) = cli.max_pages {
        config.max_pages = Some(max_pages);
    }
    if cli.no_skip_existing {
        config.skip_existing = false;
    }
    if cli.js {
        config.use_js = true;
    }
    if let Some(ref user_agent) = cli.user_agent {
        config.user_agent.clone_from(user_agent);
    }
    if let Some(ref proxy) = cli.proxy {
        config.proxy = Some(proxy.clone());
    }
    if cli.rich_metadata {
        config.rich_metadata = true;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Built-in profile by name, or a generic profile derived from the URL.
fn resolve_profile(cli: &Cli) -> Result<SiteProfile> {
    let mut profile = if let Some(ref name) = cli.profile {
        match builtin_profile(name) {
            Some(profile) => profile,
            None => bail!("unknown profile '{name}', see --list-profiles"),
        }
    } else if let Some(ref url) = cli.url {
        SiteProfile::generic(url).context("could not derive a profile from the URL")?
    } else {
        bail!("either a URL or --profile is required");
    };

    if !cli.include_patterns.is_empty() {
        profile.include_patterns.clone_from(&cli.include_patterns);
    }
    if !cli.exclude_patterns.is_empty() {
        profile.exclude_patterns.clone_from(&cli.exclude_patterns);
    }
    if let Some(max_depth) = cli.max_depth {
        profile.max_depth = max_depth;
    }

    Ok(profile)
}
