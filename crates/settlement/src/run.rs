use {
    crate::{
        domain::{
            lifecycle,
            season::{self, rewards::Distributor, rollover},
            settlement,
            swap::Swapper,
        },
        infra::{
            Api,
            Config,
            Ethereum,
            Queue,
            aggregator::{Aggregator, ZeroEx},
            blockchain::{Chain, OnchainAuctions, SignerContext},
            cli,
            config,
            observe,
            persistence::Postgres,
            prices::AggregatorPrices,
            reconciliation::HttpReconciler,
            tokens::Tokens,
        },
    },
    alloy::providers::Provider,
    anyhow::Context,
    clap::Parser,
    std::{net::SocketAddr, sync::Arc, time::Duration},
    tokio::sync::oneshot,
};

/// Parses the arguments, loads the configuration and runs the service until
/// it receives a shutdown signal. Exits the process on startup errors.
pub async fn start(args: impl Iterator<Item = String>) {
    let args = cli::Args::parse_from(args);
    observe::init(&args.log, args.use_json_logs);
    observe::starting(&args);

    let config = match config::load(&args).await {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(%err, "invalid configuration");
            std::process::exit(1);
        }
    };
    if let Err(err) = run(config, args.addr, None).await {
        tracing::error!(?err, "settlement service failed");
        std::process::exit(1);
    }
}

/// Wires up the service and serves the API. The `addr_sender` receives the
/// bound address, which allows binding to port 0 in tests.
pub async fn run(
    config: Config,
    addr: SocketAddr,
    addr_sender: Option<oneshot::Sender<SocketAddr>>,
) -> anyhow::Result<()> {
    let settlement_eth = ethereum(&config, &config.accounts.settlement, None);
    let chain_id = settlement_eth
        .provider()
        .get_chain_id()
        .await
        .context("failed to fetch chain id")?;
    anyhow::ensure!(
        chain_id == config.chain_id.0,
        "the node is connected to chain {chain_id} but chain {} is configured",
        config.chain_id.0
    );
    // Operators sharing a key share a client so their transactions queue up
    // behind the same submission lock.
    let auction_eth = ethereum(&config, &config.accounts.auction, Some(&settlement_eth));
    let rewards_eth = ethereum(&config, &config.accounts.rewards, Some(&settlement_eth));

    let settlement_tokens = Arc::new(Tokens::new(settlement_eth));
    let aggregator: Arc<dyn Aggregator> = Arc::new(ZeroEx::new(config.aggregator)?);
    let registry = settlement::Registry::default();
    let orchestrator = Arc::new(settlement::Orchestrator::new(
        settlement_tokens.clone(),
        Swapper::new(aggregator.clone(), settlement_tokens, config.quote_ttl),
        config.settlement,
        registry.clone(),
    ));
    let worker = lifecycle::Worker::new(
        Arc::new(OnchainAuctions::new(auction_eth, config.auction_contract)),
        Arc::new(
            HttpReconciler::new(
                config.reconciliation.url,
                config.worker_secret.clone(),
                config.reconciliation.timeout,
            )
            .context("failed to build reconciliation client")?,
        ),
        orchestrator,
        config.lifecycle_retry,
    );
    let queue = Queue::spawn(config.queue_capacity, Arc::new(worker));

    let rewards_tokens = Arc::new(Tokens::new(rewards_eth));
    let distributor = Distributor::new(
        rewards_tokens.clone(),
        Arc::new(AggregatorPrices::new(
            aggregator,
            rewards_tokens,
            config.season.usd_token,
        )),
        config.season.reward_token,
    );
    let store = Postgres::new(&config.database.url, config.database.max_connections)?;
    let seasons = Arc::new(season::Controller::new(
        Arc::new(store),
        distributor,
        config.season.length_days,
    ));
    if config.season.scheduler {
        tokio::spawn(rollover::schedule(
            seasons.clone(),
            config.season.check_interval,
        ));
    }

    let (shutdown_sender, shutdown_receiver) = oneshot::channel();
    let serve = Api {
        queue,
        registry,
        seasons,
        secret: config.worker_secret,
        addr,
        addr_sender,
    }
    .serve(async {
        let _ = shutdown_receiver.await;
    });

    futures::pin_mut!(serve);
    tokio::select! {
        result = &mut serve => result.context("API server exited")?,
        _ = shutdown_signal() => {
            observe::shutting_down();
            // Already broadcast transactions can't be cancelled, only the API
            // stops accepting work.
            let _ = shutdown_sender.send(());
            tokio::time::timeout(Duration::from_secs(10), serve)
                .await
                .context("API shutdown exceeded timeout")?
                .context("API failed during shutdown")?;
        }
    }
    Ok(())
}

fn ethereum(
    config: &Config,
    account: &SignerContext,
    shared: Option<&Arc<Ethereum>>,
) -> Arc<Ethereum> {
    match shared {
        Some(eth) if eth.operator() == account.address() => eth.clone(),
        _ => Arc::new(Ethereum::new(account, config.gas, config.confirmation_timeout)),
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    // Intercept main signals for graceful shutdown. Kubernetes sends sigterm,
    // whereas locally sigint (ctrl-c) is most common.
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(?err, "failed to listen for sigterm");
                std::future::pending::<()>().await;
            }
        }
    };
    let sigint = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(?err, "failed to listen for sigint");
            std::future::pending::<()>().await;
        }
    };
    tokio::select! {
        _ = sigterm => (),
        _ = sigint => (),
    };
}

#[cfg(windows)]
async fn shutdown_signal() {
    // We don't support signal handling on windows.
    std::future::pending().await
}
