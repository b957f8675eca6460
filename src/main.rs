//! redis-connection - connection smoke test
//!
//! Connects to a single node or a primary/replica cluster, then runs a
//! get/set/get/expire round trip on one key.

use anyhow::{Context, Result};
use clap::Parser;
use redis::Value;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use redis_connection::config::CliArgs;
use redis_connection::{
    build_cluster, build_single_client, ClientOptions, Commands, Diagnostics,
};

fn setup_logging(verbose: bool, quiet: bool) -> Result<()> {
    let level = if quiet {
        Level::ERROR
    } else if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

fn describe(value: &Value) -> String {
    match value {
        Value::Nil => "(nil)".to_string(),
        Value::Okay => "OK".to_string(),
        Value::Int(n) => format!("(integer) {}", n),
        Value::BulkString(bytes) => format!("\"{}\"", String::from_utf8_lossy(bytes)),
        Value::SimpleString(s) => s.clone(),
        other => format!("{:?}", other),
    }
}

/// get, set, get, expire on `key`
async fn round_trip<C: Commands>(target: &C, key: &str, native_async: bool) -> Result<()> {
    let name = |command: &str| {
        if native_async {
            format!("{}Async", command)
        } else {
            command.to_string()
        }
    };
    let stamp = format!("smoke-{}", fastrand::u32(..));

    let before = target.invoke(&name("get"), &[key]).await?;
    info!("get {} -> {}", key, describe(&before));

    let set = target.invoke(&name("set"), &[key, stamp.as_str()]).await?;
    info!("set {} {} -> {}", key, stamp, describe(&set));

    let after = target.invoke(&name("get"), &[key]).await?;
    info!("get {} -> {}", key, describe(&after));

    let expire = target.invoke(&name("expire"), &[key, "60"]).await?;
    info!("expire {} 60 -> {}", key, describe(&expire));

    Ok(())
}

async fn smoke(args: CliArgs) -> Result<()> {
    // Per-attempt and per-command diagnostics only in verbose mode
    let verbose = if args.verbose {
        Diagnostics::tracing()
    } else {
        Diagnostics::disabled()
    };

    if let Some(spec) = args.cluster_spec()? {
        info!(
            "Connecting to cluster: 1 primary, {} replicas ({})",
            spec.replicas.len(),
            spec.engine
        );
        let cluster = build_cluster(&spec, verbose).await?;
        let native_async = cluster.primary().client.engine_supports_async();
        round_trip(&cluster, &args.key, native_async).await?;
        cluster.close().await;
    } else {
        let options = ClientOptions {
            redis_config: args.redis_config(),
            default_redis_db: 0,
            engine: args.engine.clone(),
            verbose,
            options: args.retry_policy()?,
        };
        let client = build_single_client(options).await?;
        info!("Connected with {}", client.engine());
        round_trip(&client, &args.key, client.engine_supports_async()).await?;
        client.close().await;
    }

    Ok(())
}

fn run() -> Result<()> {
    let args = CliArgs::parse();

    setup_logging(args.verbose, args.quiet)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(smoke(args))
}

fn main() {
    if let Err(e) = run() {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}
