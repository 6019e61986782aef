//! treeflow - Main Entry Point
//!
//! Loads a project, runs every pending calculation and prints the value of
//! each output.
//!
//! ```text
//! treeflow <project.json> [--config <engine.toml>] [--save <out.json>]
//! ```

use anyhow::{bail, Context};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use treeflow::{
    config::{default_config_path, EngineConfig},
    ComponentRegistry, Graph, ProjectFile,
};

struct Args {
    project: PathBuf,
    config: Option<PathBuf>,
    save: Option<PathBuf>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut project = None;
    let mut config = None;
    let mut save = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config = Some(args.next().context("--config needs a path")?.into()),
            "--save" => save = Some(args.next().context("--save needs a path")?.into()),
            "-h" | "--help" => {
                println!("usage: treeflow <project.json> [--config <engine.toml>] [--save <out.json>]");
                std::process::exit(0);
            }
            other if other.starts_with('-') => bail!("unknown option {}", other),
            other => project = Some(PathBuf::from(other)),
        }
    }
    Ok(Args {
        project: project.context("missing project file, see --help")?,
        config,
        save,
    })
}

fn main() -> anyhow::Result<()> {
    let args = parse_args()?;

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => EngineConfig::load_or_default(),
    };

    // Initialize logging; the guard must live until exit so the file writer flushes
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter.as_str()));
    let (file_layer, _guard) = match &config.log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            let name = path.file_name().context("log_file has no file name")?;
            let appender =
                tracing_appender::rolling::never(dir.unwrap_or(Path::new(".")), name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                ),
                Some(guard),
            )
        }
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    tracing::info!(
        "Starting treeflow (config: {:?})",
        args.config.clone().or_else(default_config_path)
    );

    let mut project = ProjectFile::load(&args.project)?;
    let registry = ComponentRegistry::new(&config.script);
    let mut graph = Graph::from_project(&project, config, registry)?;

    if graph.has_pending() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("Failed to start the async runtime")?;
        let reports = runtime.block_on(graph.settle());
        tracing::info!("Settled {} deferred calculations", reports.len());
    }

    let mut values = serde_json::Map::new();
    for component in graph.components() {
        for output_id in component.outputs() {
            if let Some(output) = graph.output(*output_id) {
                let key = format!("{}.{} ({})", component.name(), output.short_name(), output_id.raw());
                values.insert(key, serde_json::to_value(output.value().to_flat_map())?);
            }
        }
    }
    println!("{}", serde_json::to_string_pretty(&values)?);

    if let Some(path) = &args.save {
        project.capture(&graph);
        project.save(path)?;
    }

    tracing::info!("Done");
    Ok(())
}
