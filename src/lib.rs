pub mod config;
pub mod controller;
pub mod model;
pub mod render;
pub mod serve;
pub mod transport;
pub mod url_sync;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::{CommandFactory, Parser, Subcommand};
use colored::Colorize;
use serde_json::json;
use tracing_subscriber::EnvFilter;
use url::Url;

use config::{ConfigOverrides, LookupConfig};
use controller::{LookupDisposition, PageState, QueryController, ResultsRegion};
use model::types::ResponseEnvelope;
use render::CellLinks;
use transport::{JsonpTransport, ReplayTransport, Transport};
use url_sync::PageAddress;

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "lotview",
    version,
    about = "Look up a LOT's files and render a thumbnail grid with a detail panel"
)]
pub struct Cli {
    /// Lookup service endpoint (overrides config and LOTVIEW_ENDPOINT)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Path to config.toml (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Request timeout in milliseconds; 0 waits indefinitely
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Look up a LOT against the configured endpoint
    Lookup {
        lot: String,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Render a saved response envelope without touching the network
    Render {
        /// JSON file holding the callback argument
        envelope: PathBuf,

        /// LOT the envelope answers
        #[arg(long)]
        lot: String,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Serve the lookup page on localhost
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,

        /// Do not open a browser
        #[arg(long, default_value_t = false)]
        no_open: bool,
    },
    /// Generate shell completions to stdout
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate man page to stdout
    Man,
}

#[derive(clap::Args, Debug, Clone)]
pub struct OutputArgs {
    /// Select the file with this name instead of the default
    #[arg(long)]
    pub select: Option<String>,

    /// Print the result as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Also write the rendered page to this file
    #[arg(long)]
    pub html: Option<PathBuf>,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let overrides = ConfigOverrides {
        config_path: cli.config.clone(),
        endpoint: cli.endpoint.clone(),
        timeout_ms: cli.timeout_ms,
    };

    match cli.command {
        Commands::Lookup { lot, output } => {
            let cfg = LookupConfig::load(&overrides)?;
            let endpoint = cfg.require_endpoint()?.clone();
            let transport = JsonpTransport::from_config(&cfg)?;
            run_lookup(transport, endpoint, &cfg, &lot, &output).await
        }
        Commands::Render {
            envelope,
            lot,
            output,
        } => {
            let cfg = LookupConfig::load(&overrides)?;
            let (transport, source) = load_envelope(&envelope)?;
            run_lookup(transport, source, &cfg, &lot, &output).await
        }
        Commands::Serve { port, no_open } => {
            let cfg = LookupConfig::load(&overrides)?;
            let endpoint = cfg.require_endpoint()?.clone();
            let transport = JsonpTransport::from_config(&cfg)?;
            let serve_cfg = serve::ServeConfig {
                port,
                open_browser: !no_open,
            };
            serve::start_server(transport, endpoint, serve_cfg).await?;
            Ok(())
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "lotview", &mut std::io::stdout());
            Ok(())
        }
        Commands::Man => {
            let cmd = Cli::command();
            let man = clap_mangen::Man::new(cmd);
            let mut out = std::io::stdout();
            man.render(&mut out)?;
            Ok(())
        }
    }
}

/// Install the stderr subscriber; `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Decode a saved envelope into a replay transport plus a `file://` source URL.
fn load_envelope(path: &Path) -> Result<(ReplayTransport, Url)> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading envelope {}", path.display()))?;
    let payload: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("parsing envelope {}", path.display()))?;
    let outcome = ResponseEnvelope::decode(payload)
        .with_context(|| format!("decoding envelope {}", path.display()))?;
    let absolute = std::path::absolute(path)
        .with_context(|| format!("resolving {}", path.display()))?;
    let source = Url::from_file_path(&absolute)
        .map_err(|()| anyhow!("cannot express {} as a URL", absolute.display()))?;
    Ok((ReplayTransport::new(outcome), source))
}

async fn run_lookup<T: Transport>(
    transport: T,
    endpoint: Url,
    cfg: &LookupConfig,
    lot: &str,
    output: &OutputArgs,
) -> Result<()> {
    let controller = QueryController::new(
        transport,
        endpoint,
        PageAddress::new(cfg.page_url.clone()),
    );
    controller.set_input(lot);
    let disposition = controller.submit().await;
    if disposition == LookupDisposition::Ignored {
        bail!("LOT must not be empty");
    }

    if let Some(name) = &output.select
        && controller.select_by_name(name).is_none()
    {
        bail!("no file named {name:?} in the results");
    }

    let state = controller.snapshot();
    if output.json {
        let report = json_report(&state, &disposition);
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&state);
    }

    if let Some(path) = &output.html {
        std::fs::write(path, state.to_document(CellLinks::Plain))
            .with_context(|| format!("writing {}", path.display()))?;
    }

    if let LookupDisposition::TransportFailure { message } = disposition {
        bail!(message);
    }
    Ok(())
}

fn json_report(state: &PageState, disposition: &LookupDisposition) -> serde_json::Value {
    let (files, active) = match state.renderer() {
        Some(r) => (
            r.cells().iter().map(|c| &c.item).collect::<Vec<_>>(),
            r.active().map(|f| f.name.clone()),
        ),
        None => (Vec::new(), None),
    };
    json!({
        "result": disposition,
        "status": state.status,
        "address": state.address.url().as_str(),
        "files": files,
        "active": active,
    })
}

fn print_summary(state: &PageState) {
    let status = &state.status;
    if status.is_error {
        println!("{}", status.text.red().bold());
    } else {
        println!("{}", status.text.green().bold());
    }

    match &state.results {
        ResultsRegion::Empty => {}
        ResultsRegion::Error(block) => println!("{}", block.to_element().text_content()),
        ResultsRegion::Files(renderer) => {
            for (index, cell) in renderer.cells().iter().enumerate() {
                let marker = if renderer.active_index() == Some(index) {
                    "*".cyan().bold().to_string()
                } else {
                    " ".to_string()
                };
                let kind = if cell.item.is_pdf() { "pdf" } else { "img" };
                println!(
                    "{marker} {:>2}. {} [{}] {}",
                    index + 1,
                    cell.item.name.bold(),
                    kind,
                    cell.item.file_id.dimmed()
                );
            }
            if let Some(active) = renderer.active() {
                println!();
                println!("LOT {}  FILE_ID: {}", renderer.lot().bold(), active.file_id);
                println!("  Open in Drive: {}", active.open);
                println!("  Direct view:   {}", active.view);
                println!("  Preview URL:   {}", active.preview);
            }
        }
    }
}
