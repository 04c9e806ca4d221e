// src/main.rs
use btc_pool_rs::network::NodeClient;
use btc_pool_rs::submit::SubmissionWorkerPool;
use btc_pool_rs::{PoolError, cli, config, jobs, server, state, utils};
use clap::Parser;
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Main entry point for the pool server
///
/// # Returns
/// - `Ok(())` on successful execution
/// - `Err(PoolError)` if any operation fails
///
/// # Flow
/// 1. Parses command line arguments
/// 2. Delegates to appropriate subcommand handler
/// 3. Propagates any errors upward
fn main() -> Result<(), PoolError> {
    let cli = cli::Commands::parse();

    match cli.action {
        cli::Action::Start(opts) => start_server(opts),
        cli::Action::Config(opts) => generate_config(opts),
        cli::Action::ClearBlocks(opts) => clear_blocks(opts),
    }
}

/// Starts the pool server with given configuration options
///
/// # Arguments
/// * `opts` - Command line options for the server
///
/// # Operations
/// 1. Initializes logging
/// 2. Loads and validates configuration
/// 3. Opens the state database and node RPC client
/// 4. Starts the submission worker pool
/// 5. Runs the Stratum accept loop on a tokio runtime
fn start_server(opts: cli::StartOptions) -> Result<(), PoolError> {
    utils::init_logging();

    let mut config = config::load(&opts.config)?;
    // Apply CLI overrides
    if let Some(workers) = opts.workers {
        config.worker_threads = workers;
    }
    if let Some(listen) = opts.listen {
        config.listen = listen;
    }
    // Fail on a bad payout script now, not at the first found block.
    config.payout_script_bytes()?;

    let store = Arc::new(state::StateStore::open(&config.data_dir)?);
    let rpc: Option<Arc<dyn btc_pool_rs::BlockSubmitter>> = match &config.node {
        Some(node_cfg) => Some(Arc::new(NodeClient::new(node_cfg.clone())?)),
        None => {
            log::warn!("no [node] section configured; winning blocks will not be relayed");
            None
        }
    };

    let worker_count = if config.worker_threads == 0 {
        SubmissionWorkerPool::default_worker_count()
    } else {
        config.worker_threads
    };
    let pool = SubmissionWorkerPool::new(worker_count);
    let registry = Arc::new(jobs::JobRegistry::new());

    let server = server::Server::new(config, pool, registry, rpc, Some(store));

    let rt = Runtime::new()?;
    rt.block_on(server.run())
}

/// Generates configuration template file
///
/// # Arguments
/// * `opts` - Configuration generation options
///
/// # Operations
/// 1. Generates template content based on options
/// 2. Writes template to specified output file
fn generate_config(opts: cli::ConfigOptions) -> Result<(), PoolError> {
    let config = config::generate_template(opts.node);
    std::fs::write(opts.output, config)?;
    Ok(())
}

/// Clears the found-blocks log under the given data directory
///
/// # Arguments
/// * `opts` - Data directory options
///
/// # Operations
/// 1. Deletes every found-block record from the state database
/// 2. Removes the legacy flat-file log if present
/// 3. Reports the exact number of records removed
fn clear_blocks(opts: cli::ClearBlocksOptions) -> Result<(), PoolError> {
    utils::init_logging();

    let deleted = state::clear_found_blocks(&opts.data_dir)?;
    log::info!("cleared {} found-block record(s)", deleted);
    println!("cleared {} found-block record(s)", deleted);
    Ok(())
}
