use anyhow::Context;
use kbase::{
    AppState, ConfigManager, KbaseConfig,
    api::routes::build_app,
    auth::{AuthService, DemoLoginGate},
    cli::{Cli, Commands, chat::TerminalChat, output::Output},
    db::{IndexManager, IndexSettings, IndexSpec, create_store},
    llm::Provider,
    rag::{
        Embedder, IngestOutcome, IngestSettings, Ingestor, RagPipeline, RagSettings,
        create_embedder,
    },
    session::SessionStore,
    utils::toml_config::ServerConfig,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // A missing .env is fine; variables may come from the environment
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = Arc::new(if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    });

    if let Commands::Config { validate } = cli.command() {
        return Ok(show_config(&cli.config, *validate, &output));
    }

    let config_manager = match ConfigManager::new(&cli.config) {
        Ok(manager) => Arc::new(manager),
        Err(e) => {
            output.error(&e.to_string());
            output.hint("Start from the example configuration, or pass --config");
            output.command("cp kbase.example.toml kbase.toml");
            return Ok(ExitCode::FAILURE);
        }
    };
    let config = config_manager.config();

    // Keep stdout readable for the one-shot commands unless asked for more
    let default_level = match (cli.command(), cli.verbose) {
        (_, true) => "debug",
        (Commands::Serve, false) => config.server.log_level.as_str(),
        _ => "warn",
    };
    init_tracing(&config.server, default_level);

    match cli.command() {
        Commands::Serve => serve(config_manager).await,
        Commands::Ingest { dir } => ingest(&config, dir.clone(), &output).await,
        Commands::Ask { question, debug } => {
            let pipeline = build_pipeline(&config).await?;
            let answer = pipeline.answer(question).await;
            output.answer(&answer, *debug);
            Ok(if answer.is_error() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Commands::Chat => {
            output.banner();
            let pipeline = build_pipeline(&config).await?;
            TerminalChat::new(&pipeline, config.ui.example_questions.clone(), &output)
                .run()
                .await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { .. } => Ok(ExitCode::SUCCESS),
    }
}

fn init_tracing(server: &ServerConfig, default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    if server.log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn http_timeout(config: &KbaseConfig) -> Duration {
    Duration::from_secs(config.rag.http_timeout_secs)
}

/// Embedder, index manager and the index spec derived from the embedder.
fn build_index(config: &KbaseConfig) -> anyhow::Result<(Arc<dyn Embedder>, IndexManager, IndexSpec)> {
    let timeout = http_timeout(config);

    let embedder = create_embedder(&config.embedding, timeout)
        .context("Failed to set up the embedding provider")?;
    let store = create_store(&config.vector_store, timeout)
        .context("Failed to set up the vector store")?;

    let spec = IndexSpec {
        name: config.index.name.clone(),
        dimensions: embedder.dimensions(),
        metric: config.index.metric,
    };
    let manager = IndexManager::new(store, IndexSettings::from_config(&config.index));

    Ok((embedder, manager, spec))
}

async fn build_pipeline(config: &KbaseConfig) -> anyhow::Result<RagPipeline> {
    let (embedder, manager, spec) = build_index(config)?;

    match manager.store().describe_index(&spec.name).await {
        Ok(Some(_)) => {}
        Ok(None) => warn!(
            index = %spec.name,
            "Index does not exist yet; run `kbase ingest` before asking questions"
        ),
        Err(e) => warn!(index = %spec.name, error = %e, "Could not check the index"),
    }

    let provider = Provider::from_config(&config.llm).context("Failed to configure the LLM")?;
    let llm = provider
        .create_client(http_timeout(config))
        .await
        .context("Failed to create the LLM client")?;
    info!(provider = provider.name(), model = provider.model(), "LLM ready");

    Ok(RagPipeline::new(
        embedder,
        manager.open(spec),
        llm,
        RagSettings::from_config(&config.rag),
    ))
}

async fn serve(config_manager: Arc<ConfigManager>) -> anyhow::Result<ExitCode> {
    let config = config_manager.config();

    let jwt_secret = config
        .jwt_secret()
        .context("A JWT secret is required to issue session tokens")?;
    let pipeline = Arc::new(build_pipeline(&config).await?);

    if let Err(e) = config_manager.start_watching() {
        warn!(error = %e, "Configuration hot reload disabled");
    }

    let sessions = Arc::new(SessionStore::from_config(&config.auth));
    let sweeper = Arc::clone(&sessions).spawn_sweeper(SESSION_SWEEP_INTERVAL);

    let state = AppState {
        config_manager: Arc::clone(&config_manager),
        pipeline,
        sessions,
        auth_service: Arc::new(AuthService::new(jwt_secret, config.auth.session_expiry)),
        login_gate: Arc::new(DemoLoginGate::new(config.auth.min_password_len)),
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, index = %config.index.name, "Server listening");

    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweeper.abort();
    config_manager.stop_watching();
    Ok(ExitCode::SUCCESS)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn ingest(
    config: &KbaseConfig,
    dir: Option<PathBuf>,
    output: &Arc<Output>,
) -> anyhow::Result<ExitCode> {
    let dir = dir.unwrap_or_else(|| config.ingest.documents_dir.clone());

    output.header("Ingesting documents");
    output.kv("folder", &dir.display().to_string());
    output.kv("index", &config.index.name);

    let (embedder, manager, spec) = build_index(config)?;
    output.kv("embedding model", embedder.model_id());

    let ingestor = Ingestor::new(embedder, manager, spec, IngestSettings::from_config(config))?
        .with_observer(output.clone());

    match ingestor.run(&dir).await? {
        IngestOutcome::FolderCreated(path) => {
            output.warning(&format!("Created empty folder {}", path.display()));
            output.hint(&format!(
                "Add .{} files to it and run ingest again",
                config.ingest.extension
            ));
            output.command("kbase ingest");
        }
        IngestOutcome::NoDocuments(path) => {
            output.warning(&format!(
                "No .{} files in {}",
                config.ingest.extension,
                path.display()
            ));
        }
        IngestOutcome::Completed(report) => {
            output.ingest_report(&report);
            output.complete("Knowledge base updated");
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn show_config(path: &Path, validate: bool, output: &Output) -> ExitCode {
    let config = match KbaseConfig::load(path) {
        Ok(config) => config,
        Err(e) => {
            output.error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };

    output.header("Configuration");
    output.kv("file", &path.display().to_string());
    output.kv(
        "server",
        &format!("{}:{}", config.server.host, config.server.port),
    );
    output.kv("embedding", &format!("{:?}", config.embedding));
    output.kv("vector store", &format!("{:?}", config.vector_store));
    output.kv(
        "index",
        &format!("{} ({})", config.index.name, config.index.metric),
    );
    output.kv("llm", &format!("{:?}", config.llm));
    output.kv(
        "chunking",
        &format!(
            "{} words, {} overlap, top {}",
            config.rag.chunk_size, config.rag.chunk_overlap, config.rag.top_k
        ),
    );
    output.kv(
        "documents",
        &format!(
            "{} (*.{})",
            config.ingest.documents_dir.display(),
            config.ingest.extension
        ),
    );

    if !validate {
        return ExitCode::SUCCESS;
    }

    let mut missing = Vec::new();
    for name in config
        .required_env_vars()
        .into_iter()
        .chain([config.auth.jwt_secret_env.as_str()])
    {
        if config.resolve_env(name).is_none() && !missing.contains(&name) {
            missing.push(name);
        }
    }

    if missing.is_empty() {
        output.success("Configuration is valid and all secrets are set");
        ExitCode::SUCCESS
    } else {
        for name in missing {
            output.error(&format!("Environment variable '{}' is not set", name));
        }
        ExitCode::FAILURE
    }
}
