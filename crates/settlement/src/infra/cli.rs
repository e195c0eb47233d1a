use {
    std::{fmt, net::SocketAddr, path::PathBuf},
    url::Url,
};

#[derive(Debug, clap::Parser)]
pub struct Args {
    /// The address to bind the API server to.
    #[clap(long, env, default_value = "0.0.0.0:8090")]
    pub addr: SocketAddr,

    /// The log filter.
    #[clap(long, env, default_value = "warn,settlement=debug,observe=info")]
    pub log: String,

    /// Whether to use JSON format for the logs.
    #[clap(long, env, default_value = "false")]
    pub use_json_logs: bool,

    /// Path to the service configuration file in TOML format. For an example
    /// see `crates/settlement/config/example.toml`.
    #[clap(long, env)]
    pub config: PathBuf,

    /// The node RPC API endpoint.
    #[clap(long, env)]
    pub node_url: Url,

    /// Private key of the wallet receiving auction proceeds and executing the
    /// settlement transactions.
    #[clap(long, env = "SETTLEMENT_OPERATOR_KEY", hide_env_values = true)]
    pub settlement_operator_key: Option<String>,

    /// Private key of the wallet allowed to end auctions.
    #[clap(long, env = "AUCTION_OPERATOR_KEY", hide_env_values = true)]
    pub auction_operator_key: Option<String>,

    /// Private key of the wallet holding the seasonal rewards.
    #[clap(long, env = "REWARDS_OPERATOR_KEY", hide_env_values = true)]
    pub rewards_operator_key: Option<String>,

    /// API key of the swap aggregator.
    #[clap(long, env = "AGGREGATOR_API_KEY", hide_env_values = true)]
    pub aggregator_api_key: Option<String>,

    /// Shared secret authenticating calls between the web application and
    /// this service, in both directions.
    #[clap(long, env = "WORKER_SECRET", hide_env_values = true)]
    pub worker_secret: Option<String>,

    /// Postgres connection string of the web application's database.
    #[clap(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Maximum number of database connections.
    #[clap(long, env, default_value = "5")]
    pub database_max_connections: u32,
}

fn display_secret(f: &mut fmt::Formatter<'_>, name: &str, secret: &Option<String>) -> fmt::Result {
    let value = match secret {
        Some(_) => "SECRET",
        None => "None",
    };
    writeln!(f, "{name}: {value}")
}

impl fmt::Display for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            addr,
            log,
            use_json_logs,
            config,
            node_url,
            settlement_operator_key,
            auction_operator_key,
            rewards_operator_key,
            aggregator_api_key,
            worker_secret,
            database_url,
            database_max_connections,
        } = self;

        writeln!(f, "addr: {addr}")?;
        writeln!(f, "log: {log}")?;
        writeln!(f, "use_json_logs: {use_json_logs}")?;
        writeln!(f, "config: {}", config.display())?;
        // Node URLs commonly carry an API key in their path.
        writeln!(f, "node_url: {}", node_url.host_str().unwrap_or_default())?;
        display_secret(f, "settlement_operator_key", settlement_operator_key)?;
        display_secret(f, "auction_operator_key", auction_operator_key)?;
        display_secret(f, "rewards_operator_key", rewards_operator_key)?;
        display_secret(f, "aggregator_api_key", aggregator_api_key)?;
        display_secret(f, "worker_secret", worker_secret)?;
        display_secret(f, "database_url", database_url)?;
        writeln!(f, "database_max_connections: {database_max_connections}")?;
        Ok(())
    }
}
