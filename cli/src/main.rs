use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use machine_schema::camera::Camera;
use machine_schema::input::InteractionState;
use machine_schema::layout::{DiagramConfig, ExpandState, Layout, RootNode, SiblingOrder, compute_layout};
use machine_schema::render::project;
use machine_schema::store::config::StoreConfig;
use machine_schema::store::http::{HttpComponentStore, parse_components};
use machine_schema::store::{ComponentStore, StoreError};
use machine_schema::tree::{ComponentId, ComponentNode, ComponentTree};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("cannot read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("component store error: {0}")]
    Store(#[from] StoreError),
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "schema-cli", about = "Lay out machine component trees")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lay out a component tree read from a JSON file.
    Layout {
        file: PathBuf,
        #[command(flatten)]
        view: ViewArgs,
    },
    /// Fetch a machine's components from the backend and lay them out.
    Fetch {
        #[arg(long)]
        machine: i64,
        #[arg(long, env = "SCHEMA_API_BASE_URL")]
        base_url: Option<String>,
        #[arg(long, env = "SCHEMA_API_TOKEN", hide_env_values = true)]
        token: Option<String>,
        #[command(flatten)]
        view: ViewArgs,
    },
}

#[derive(Args, Debug)]
struct ViewArgs {
    /// Container width in pixels.
    #[arg(long, default_value_t = 1200.0)]
    width: f64,
    /// Component ids to expand, comma separated.
    #[arg(long, value_delimiter = ',')]
    expand: Vec<i64>,
    #[arg(long)]
    expand_all: bool,
    /// Zone diagram (collision resolution on) instead of a machine diagram.
    #[arg(long)]
    zone: bool,
    #[arg(long, default_value = "Machine")]
    root_name: String,
    /// Print drawable primitives instead of the raw layout.
    #[arg(long)]
    scene: bool,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Layout { file, view } => {
            let text = std::fs::read_to_string(&file).map_err(|source| CliError::Read { path: file.clone(), source })?;
            let records = parse_components(&text)?;
            render(records, &view)
        }
        Command::Fetch { machine, base_url, token, view } => {
            let mut config = StoreConfig::from_env()?;
            if let Some(base_url) = base_url {
                config.base_url = base_url.trim_end_matches('/').to_string();
            }
            if token.is_some() {
                config.token = token;
            }
            let store = HttpComponentStore::new(config)?;
            let records = store.fetch_children(ComponentId(machine)).await?;
            render(records, &view)
        }
    }
}

fn render(records: Vec<ComponentNode>, view: &ViewArgs) -> Result<(), CliError> {
    let layout = build_layout(records, view);
    if !layout.exhausted.is_empty() {
        tracing::warn!(ids = ?layout.exhausted, "some nodes could not be separated");
    }
    let json = if view.scene {
        serde_json::to_string_pretty(&project(&layout, &InteractionState::Idle, &Camera::default()))?
    } else {
        serde_json::to_string_pretty(&layout)?
    };
    println!("{json}");
    Ok(())
}

fn build_layout(records: Vec<ComponentNode>, view: &ViewArgs) -> Layout {
    let tree = ComponentTree::from_records(records);
    let mut expand = ExpandState::new();
    if view.expand_all {
        expand.expand_all(&tree);
    }
    for id in &view.expand {
        expand.set(ComponentId(*id), true);
    }
    let (root, config) = if view.zone {
        (RootNode::zone(view.root_name.clone()), DiagramConfig::zone())
    } else {
        (RootNode::machine(view.root_name.clone()), DiagramConfig::machine())
    };
    tracing::info!(components = tree.len(), "laying out");
    compute_layout(&tree, &root, &expand, &SiblingOrder::new(), view.width, &config)
}
