//! Local proof-generation daemon
//!
//! Accepts proving requests for the fixed circuit set over HTTP, runs the
//! Noir toolchain (`nargo` + `bb`) one request at a time per circuit, and
//! returns the proof and its public inputs as JSON.
//!
//! Run this server using:
//! ```shell
//! cd api && cargo run --bin prover-server
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use prover_api::{prove_path, ApiServerBuilder, CircuitKind, ProverConfig};
use prover_lib::toolchain::{ToolchainVersions, DEFAULT_BB_VERSION_PREFIX, DEFAULT_NARGO_VERSION};
use tracing::{error, info, warn};

#[cfg(all(not(target_env = "msvc"), feature = "tikv-jemallocator"))]
use tikv_jemallocator::Jemalloc;

#[cfg(all(not(target_env = "msvc"), feature = "tikv-jemallocator"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

/// Command line arguments for the server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to bind to
    #[arg(long, env = "PORT", default_value = "8788")]
    port: u16,

    /// Value for `access-control-allow-origin`
    #[arg(long, env = "PROVER_CORS_ORIGIN", default_value = "*")]
    cors_origin: String,

    /// Directory holding one Noir package per circuit
    #[arg(long, env = "PROVER_CIRCUITS_DIR", default_value = "circuits")]
    circuits_dir: PathBuf,

    /// Private root for the toolchain's HOME/XDG directories
    #[arg(long, env = "PROVER_ISOLATION_DIR", default_value = ".prover-env")]
    isolation_dir: PathBuf,

    /// Exact nargo version required
    #[arg(long, env = "PROVER_NARGO_VERSION", default_value = DEFAULT_NARGO_VERSION)]
    nargo_version: String,

    /// Version prefix required of bb
    #[arg(long, env = "PROVER_BB_VERSION_PREFIX", default_value = DEFAULT_BB_VERSION_PREFIX)]
    bb_version_prefix: String,

    /// Per-command timeout in seconds (0 disables)
    #[arg(long, env = "PROVER_COMMAND_TIMEOUT_SECS", default_value = "600")]
    command_timeout: u64,

    /// Maximum request size in bytes
    #[arg(long, default_value = "65536")]
    max_request_size: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("🚀 Starting proof-generation daemon");
    info!("📍 Server will bind to {}:{}", args.host, args.port);

    let config = ProverConfig {
        circuits_dir: args.circuits_dir.clone(),
        isolation_dir: args.isolation_dir.clone(),
        command_timeout: (args.command_timeout > 0).then(|| Duration::from_secs(args.command_timeout)),
        versions: ToolchainVersions {
            nargo_version: args.nargo_version.clone(),
            bb_version_prefix: args.bb_version_prefix.clone(),
            ..ToolchainVersions::default()
        },
    };

    let pipeline = match config.build_pipeline() {
        Ok(pipeline) => Arc::new(pipeline),
        Err(e) => {
            error!("❌ Failed to prepare isolated toolchain environment: {}", e);
            std::process::exit(1);
        }
    };

    // Requests retry the check, so a bad install is reported but not fatal here.
    match pipeline.preflight().await {
        Ok(()) => info!("✅ Toolchain check passed"),
        Err(e) => {
            warn!("⚠️ Toolchain check failed: {}", e);
            warn!("💡 Proof requests will fail until the toolchain is fixed");
        }
    }

    let server = ApiServerBuilder::new()
        .host(args.host.clone())
        .port(args.port)
        .cors_origin(args.cors_origin.clone())
        .max_request_size(args.max_request_size)
        .build(pipeline);
    let server = match server {
        Ok(server) => server,
        Err(e) => {
            error!("❌ {e}");
            error!("💡 Check PROVER_CORS_ORIGIN");
            std::process::exit(1);
        }
    };
    let app = server.create_router();

    let bind_address = server.bind_address();
    let listener = match tokio::net::TcpListener::bind(&bind_address).await {
        Ok(listener) => {
            info!("✅ Successfully bound to {bind_address}");
            listener
        }
        Err(e) => {
            error!("❌ Failed to bind to {bind_address}: {e}");
            error!("💡 Make sure the port is not already in use");
            std::process::exit(1);
        }
    };

    info!("📚 Available endpoints:");
    for kind in CircuitKind::ALL {
        info!("   • POST {}  fields: {}", prove_path(kind), kind.field_names().join(", "));
    }

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Server error: {e}");
        std::process::exit(1);
    }

    info!("👋 Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
