mod store;
mod zip;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use faas_hostapi::{JsonFileKvDriver, KvHandle};
use faas_materializer::PackageMaterializer;
use faas_models::EnvSnapshot;
use faas_resolver::FunctionResolver;
use faas_sandbox::{InboundRequest, SandboxEngine};

use crate::store::{SingleArchiveBlobStore, SingleFunctionStore};

#[derive(Parser)]
#[command(name = "faas-cli")]
#[command(about = "Local runner: invoke a function directory without a running server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a function directory's index.js against one synthetic request.
    Run {
        /// Path to the function directory (must contain index.js).
        path: PathBuf,

        #[arg(long, default_value = "GET")]
        method: String,

        #[arg(long = "path", default_value = "/")]
        request_path: String,

        #[arg(long)]
        data: Option<String>,

        /// Repeatable "Key: Value" header.
        #[arg(long = "header")]
        headers: Vec<String>,

        /// KEY=VALUE env file, one binding per line.
        #[arg(long)]
        env: Option<PathBuf>,

        /// JSON-file KV backing (same format the core persists).
        #[arg(long)]
        kv_file: Option<PathBuf>,

        #[arg(long, default_value = "30000")]
        timeout_ms: u64,

        #[arg(long, default_value = "256")]
        heap_cap_mib: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Command::Run { path, method, request_path, data, headers, env, kv_file, timeout_ms, heap_cap_mib } => {
            run(path, method, request_path, data, headers, env, kv_file, timeout_ms, heap_cap_mib).await?
        }
    };

    std::process::exit(exit_code);
}

#[allow(clippy::too_many_arguments)]
async fn run(
    path: PathBuf,
    method: String,
    request_path: String,
    data: Option<String>,
    headers: Vec<String>,
    env_file: Option<PathBuf>,
    kv_file: Option<PathBuf>,
    timeout_ms: u64,
    heap_cap_mib: u64,
) -> Result<i32> {
    let archive = zip::zip_directory(&path).with_context(|| format!("zipping {}", path.display()))?;
    let content_hash = format!("{:x}", Sha256::digest(&archive));
    let byte_size = archive.len() as u64;

    let env = parse_env_file(env_file.as_deref())?;
    let metadata_store = Arc::new(SingleFunctionStore::new(content_hash.clone(), byte_size, env, timeout_ms, heap_cap_mib));
    let blob_store = Arc::new(SingleArchiveBlobStore(archive));

    let resolver = FunctionResolver::new(metadata_store.clone());
    let materializer = PackageMaterializer::new(blob_store, byte_size + 1);
    let sandbox = SandboxEngine::new();

    let descriptor = metadata_store.descriptor().clone();
    let version = resolver.load_active_version(&descriptor).await?;
    let vfs = materializer.materialize(&version).await?;
    let network_policy = resolver.network_policy(descriptor.function_id).await?;
    let env = resolver.env_snapshot(descriptor.function_id).await?;

    let kv_path = kv_file.unwrap_or_else(|| path.join(".faas-kv.json"));
    let kv_driver = Arc::new(JsonFileKvDriver::open(kv_path).await?);
    let kv = KvHandle::new(kv_driver, descriptor.function_id.to_string(), None);

    let request_headers = parse_headers(&headers)?;
    let inbound = InboundRequest {
        method: method.to_uppercase(),
        path: request_path,
        query: String::new(),
        headers: request_headers,
        body: data.map(|d| d.into_bytes()).unwrap_or_default(),
        remote_addr: "127.0.0.1:0".to_string(),
    };

    let result = sandbox
        .invoke(
            descriptor.function_id,
            Uuid::new_v4(),
            vfs,
            env,
            kv,
            network_policy,
            Duration::from_millis(timeout_ms),
            heap_cap_mib,
            inbound,
        )
        .await;

    let stdout = result.recorder.take_stdout();
    let stderr = result.recorder.take_stderr();
    if !stdout.is_empty() {
        print!("{stdout}");
    }
    if !stderr.is_empty() {
        eprint!("{stderr}");
    }

    println!(
        "{}",
        serde_json::json!({
            "status": result.status,
            "headers": result.headers,
            "body": String::from_utf8_lossy(&result.body),
            "outcome": result.outcome.as_str(),
        })
    );

    Ok(if matches!(result.outcome, faas_models::OutcomeTag::Success) { 0 } else { 1 })
}

fn parse_env_file(path: Option<&std::path::Path>) -> Result<EnvSnapshot> {
    let Some(path) = path else { return Ok(EnvSnapshot(HashMap::new())) };
    let contents = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut map = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            map.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    Ok(EnvSnapshot(map))
}

fn parse_headers(raw: &[String]) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|h| {
            h.split_once(':')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .with_context(|| format!("invalid header, expected 'Key: Value': {h}"))
        })
        .collect()
}
