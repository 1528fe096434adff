//! Pom-Pom demo server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ axum (timeout, request id, trace layers)
//!                         │
//!                         ▼
//!                     Dispatcher ──▶ RouteSnapshot (radix tree)
//!                         │
//!                         ▼
//!                 middleware chain ──▶ handler ──▶ Response builder
//!                                                      │
//!     Client Response ◀────────────────────────────────┘
//! ```
//!
//! Routes come from `App::get`/`post`/... calls and, optionally, from a
//! routes directory resolved through a [`ModuleRegistry`].

use std::path::PathBuf;

use clap::Parser;
use serde_json::json;

use pompom::config::{load_config, AppConfig};
use pompom::observability::{logging, metrics};
use pompom::{
    cors, App, BoxError, CorsOptions, Error, ModuleRegistry, Reply, Request, Response, RouteModule,
};

#[derive(Parser)]
#[command(name = "pompom")]
#[command(about = "Pom-Pom routing framework demo server", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address, overrides `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Routes directory, overrides `routes.dir`.
    #[arg(short, long)]
    routes: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(dir) = cli.routes {
        config.routes.dir = Some(dir);
    }

    logging::init_logging(&config.observability)?;
    tracing::info!("pompom v{} starting", env!("CARGO_PKG_VERSION"));

    if let Some(addr) = config.observability.metrics_address {
        metrics::init_metrics(addr)?;
    }

    let bind_address = config.listener.bind_address.clone();
    let routes_dir = config.routes.dir.clone();

    let mut app = App::with_config(config);
    app.use_middleware(cors(CorsOptions::default()));
    app.get("/hello", hello)?
        .get("/user/:id?name&age&gender", user)?;

    if let Some(dir) = routes_dir {
        let report = app.load_routes(&dir, &demo_modules()).await?;
        if !report.failed.is_empty() {
            tracing::warn!(failed = report.failed.len(), "Some route files were not registered");
        }
    }

    app.listen(bind_address.as_str(), |addr| {
        tracing::info!(address = %addr, "Server listening on http://{}", addr);
    })
    .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn hello(_req: Request, res: Response) -> Result<Reply, BoxError> {
    Ok(res.text("Hello, world!").into())
}

async fn user(mut req: Request, res: Response) -> Result<Reply, BoxError> {
    let id = req.param("id").unwrap_or_default().to_string();
    let query = req.query()?;
    let body = json!({
        "id": id,
        "name": query.get("name"),
        "age": query.get("age"),
        "gender": query.get("gender"),
    });
    Ok(res.json(&body)?.into())
}

async fn echo_rest(req: Request, res: Response) -> Result<Reply, BoxError> {
    let rest = req.param("rest").unwrap_or_default();
    Ok(res.text(format!("files: {}", rest)).into())
}

async fn create_post(mut req: Request, res: Response) -> Result<Reply, BoxError> {
    let body: serde_json::Value = req.json().await?;
    Ok(res.status(201).json(&body)?.into())
}

/// Handlers for the conventional demo routes directory layout.
fn demo_modules() -> ModuleRegistry {
    ModuleRegistry::new()
        .module("index", RouteModule::new().get(hello))
        .module("files/[*rest]", RouteModule::new().get(echo_rest))
        .module("posts/index", RouteModule::new().post(create_post))
}
