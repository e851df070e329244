//! Thin client for the proof-generation daemon
//!
//! Usage examples:
//! ```shell
//! # Prove a ping distance
//! prover-cli prove ping_distance x=5 y=5 salt=1 tower_x=0 tower_y=0 session_id=1 turn=1
//!
//! # List circuits and their parameters
//! prover-cli circuits
//! ```

use clap::{Parser, Subcommand};
use eyre::{bail, eyre, Result, WrapErr};
use prover_lib::{CircuitKind, FieldValue, ProveResponse};
use reqwest::Client;
use serde_json::{Map, Number, Value};
use std::env;
use tracing::{error, info};

/// Simple API client for the proving daemon
#[derive(Debug)]
struct ProverClient {
    client: Client,
    base_url: String,
}

impl ProverClient {
    fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Parser)]
#[command(name = "prover-cli")]
#[command(about = "CLI for submitting requests to the proof-generation daemon")]
#[command(version)]
struct Cli {
    /// Daemon base URL
    #[arg(long, env = "PROVER_URL", default_value = "http://localhost:8788")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Request a proof for one circuit
    Prove {
        /// Circuit to prove
        #[arg(value_enum)]
        circuit: CircuitKind,
        /// Parameters as name=value pairs (integers of any size)
        #[arg(required = true)]
        params: Vec<String>,
    },
    /// List circuits and their parameter names
    Circuits,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(env::var("RUST_LOG").unwrap_or_else(|_| "prover_cli=info".to_string()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Prove { circuit, params } => {
            let client = ProverClient::new(cli.api_url);
            let body = build_body(circuit, &params)?;
            prove(&client, circuit, body).await?;
        }
        Commands::Circuits => {
            for kind in CircuitKind::ALL {
                println!("{kind}: {}", kind.field_names().join(", "));
            }
        }
    }

    Ok(())
}

/// Turn `name=value` pairs into the JSON body for `circuit`, checking every field is present
fn build_body(circuit: CircuitKind, params: &[String]) -> Result<Value> {
    let mut body = Map::new();
    for param in params {
        let (name, raw) = param
            .split_once('=')
            .ok_or_else(|| eyre!("expected name=value, got '{param}'"))?;
        if !circuit.field_names().contains(&name) {
            bail!("{circuit} has no parameter '{name}'");
        }
        let value = FieldValue::parse(raw).map_err(|e| eyre!("{name}: {e}"))?;
        let number: Number = value
            .as_str()
            .parse()
            .wrap_err_with(|| format!("{name} is not a JSON number"))?;
        body.insert(name.to_string(), Value::Number(number));
    }

    let missing: Vec<_> = circuit
        .field_names()
        .iter()
        .filter(|name| !body.contains_key(**name))
        .copied()
        .collect();
    if !missing.is_empty() {
        bail!("missing parameters for {circuit}: {}", missing.join(", "));
    }
    Ok(Value::Object(body))
}

/// Submit a proving request and print the response
async fn prove(client: &ProverClient, circuit: CircuitKind, body: Value) -> Result<()> {
    info!("Requesting {} proof from {}", circuit, client.base_url);

    let url = format!("{}/prove/{}", client.base_url, circuit);
    let response = client
        .client
        .post(&url)
        .json(&body)
        .send()
        .await
        .wrap_err("Failed to send request")?;

    if response.status().is_success() {
        let proof: ProveResponse = response.json().await.wrap_err("Unexpected response body")?;
        info!("✅ Proof generated: {} public inputs", proof.public_inputs_fields.len());
        println!("{}", serde_json::to_string_pretty(&proof)?);
        Ok(())
    } else {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        error!("❌ Daemon returned error: {}", status);
        error!("   Response: {}", text);
        bail!("proving {circuit} failed with status {status}")
    }
}
