//! muzic CLI
//!
//! Runs the relay server, or talks to the resolver directly for debugging.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use muzic_api::{ApiConfig, ApiServer, AppState};
use muzic_core::constants::DEFAULT_SEARCH_LIMIT;
use muzic_core::traits::MediaResolver;
use muzic_core::types::MediaId;
use muzic_resolver::{YtDlpConfig, YtDlpResolver};

/// muzic - caching resolver and range-aware audio relay
#[derive(Parser)]
#[command(name = "muzic")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs (and command output) as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "PORT", default_value_t = 5000)]
        port: u16,
        /// Bind address
        #[arg(short, long, default_value = "0.0.0.0")]
        bind: String,
        /// Base URL clients use to reach this server
        #[arg(long, env = "PUBLIC_URL")]
        public_url: Option<String>,
    },

    /// Resolve an identifier with yt-dlp, bypassing the cache
    Resolve {
        /// 11-character media identifier
        id: String,
        /// yt-dlp binary
        #[arg(long, env = "YTDLP_PATH", default_value = "yt-dlp")]
        ytdlp: String,
    },

    /// Search with yt-dlp
    Search {
        /// Free-text query
        query: String,
        /// Maximum number of results
        #[arg(short, long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,
        /// yt-dlp binary
        #[arg(long, env = "YTDLP_PATH", default_value = "yt-dlp")]
        ytdlp: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "muzic=debug,tower_http=debug,info"
    } else {
        "muzic=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if cli.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    match cli.command {
        Commands::Serve { port, bind, public_url } => cmd_serve(port, &bind, public_url, cli.json).await,
        Commands::Resolve { id, ytdlp } => cmd_resolve(&id, &ytdlp, cli.json).await,
        Commands::Search { query, limit, ytdlp } => cmd_search(&query, limit, &ytdlp, cli.json).await,
    }
}

fn resolver(binary: &str) -> YtDlpResolver {
    YtDlpResolver::with_config(YtDlpConfig::default().with_binary(binary))
}

/// Run the API server
async fn cmd_serve(port: u16, bind: &str, public_url: Option<String>, json: bool) -> Result<()> {
    let mut config = ApiConfig::from_env();
    config.port = port;
    config.public_url = public_url.unwrap_or_else(|| format!("http://localhost:{}", port));

    if let Some(banner) = serve_banner(&config, bind, json) {
        println!("{}", banner);
    }

    info!(
        bind,
        port,
        public_url = %config.public_url,
        cache_ttl_seconds = config.cache_ttl_seconds,
        cache_max_entries = config.cache_max_entries,
        resolve_timeout_seconds = config.resolve_timeout_seconds,
        "Starting muzic relay"
    );

    let state = AppState::new(config).context("Failed to build server state")?;
    let server = ApiServer::with_state(Arc::new(state));

    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address: {}:{}", bind, port))?;
    server.run(addr).await.context("Server error")?;

    Ok(())
}

/// Startup banner for `serve`; stdout carries only log lines in JSON mode.
fn serve_banner(config: &ApiConfig, bind: &str, json: bool) -> Option<String> {
    if json {
        return None;
    }

    Some(format!(
        "{}\n   {} http://{}:{}\n   {} {}\n   {} {}s TTL, {} entries\n\n   Press Ctrl+C to stop.\n",
        "🎵 Starting muzic relay...".cyan().bold(),
        "Listening on:".green(),
        bind,
        config.port,
        "Public URL:".green(),
        config.public_url,
        "Cache:".dimmed(),
        config.cache_ttl_seconds,
        config.cache_max_entries
    ))
}

/// Resolve one identifier
async fn cmd_resolve(id: &str, ytdlp: &str, json: bool) -> Result<()> {
    let id = MediaId::new(id).context("Invalid identifier")?;
    if !json {
        println!("{} {}", "🔍 Resolving:".cyan().bold(), id);
    }

    let resolution = resolver(ytdlp)
        .resolve(&id)
        .await
        .context("Resolution failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&resolution)?);
        return Ok(());
    }

    println!("\n{}", "✅ Resolved:".green().bold());
    println!("   {} {}", "Title:".dimmed(), resolution.title);
    println!("   {} {}s", "Duration:".dimmed(), resolution.duration_seconds);
    if let Some(thumbnail) = &resolution.thumbnail {
        println!("   {} {}", "Thumbnail:".dimmed(), thumbnail);
    }
    println!("   {} {}", "Stream URL:".dimmed(), resolution.stream_url);

    Ok(())
}

/// Search by query
async fn cmd_search(query: &str, limit: usize, ytdlp: &str, json: bool) -> Result<()> {
    if !json {
        println!("{} {}", "🔍 Searching:".cyan().bold(), query);
    }

    let results = resolver(ytdlp)
        .search(query, limit)
        .await
        .context("Search failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("\n{}", "No results.".yellow());
        return Ok(());
    }

    println!();
    for (i, hit) in results.iter().enumerate() {
        println!(
            "   {}. {} {}",
            i + 1,
            hit.title.bold(),
            format!("({}, {}s)", hit.uploader, hit.duration).dimmed()
        );
        println!("      {}", hit.video_id.dimmed());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_banner_suppressed_for_json() {
        let config = ApiConfig::default().with_public_url("https://muzic.example");

        assert!(serve_banner(&config, "0.0.0.0", true).is_none());

        let banner = serve_banner(&config, "0.0.0.0", false).unwrap();
        assert!(banner.contains("https://muzic.example"));
        assert!(banner.contains("0.0.0.0:5000"));
    }

    #[test]
    fn test_cli_parses_serve_flags() {
        let cli = Cli::try_parse_from([
            "muzic", "--json", "serve", "--port", "8080", "--public-url", "https://muzic.example",
        ])
        .unwrap();

        assert!(cli.json);
        match cli.command {
            Commands::Serve { port, public_url, .. } => {
                assert_eq!(port, 8080);
                assert_eq!(public_url.as_deref(), Some("https://muzic.example"));
            }
            _ => panic!("expected serve"),
        }
    }
}
