use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tokio::task::JoinHandle;

use secure_sum::config::{ClientConfig, ContributorConfig, TlsConfig};
use secure_sum::entropy;
use secure_sum::net::{server, HttpsTransport};
use secure_sum::{ContributorNode, PrivateValue};

/// A contributor: holds a private value and takes part in one secure-sum round.
#[derive(Parser, Debug)]
#[command(about)]
struct Args {
    /// Port this contributor listens on.
    #[arg(short, long, default_value_t = 8081)]
    port: u16,

    /// Port of the aggregator.
    #[arg(short, long, default_value_t = 8080)]
    aggregator_port: u16,

    /// Host every node listens on.
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Total number of contributors in the round.
    #[arg(short = 't', long, default_value_t = 3)]
    population: usize,

    /// Exclusive upper bound for share draws and the generated private value.
    #[arg(long, default_value_t = 500 / 3)]
    max_range: i64,

    /// Use this private value instead of drawing one.
    #[arg(long, allow_hyphen_values = true)]
    secret: Option<i64>,

    /// PEM certificate served by this node.
    #[arg(long, default_value = "server.crt")]
    cert: PathBuf,

    /// PEM private key for the certificate.
    #[arg(long, default_value = "server.key")]
    key: PathBuf,

    /// PEM certificate trusted when calling other nodes (defaults to --cert).
    #[arg(long)]
    ca: Option<PathBuf>,

    /// Maximum number of share sends in flight.
    #[arg(long, default_value_t = 16)]
    fanout: usize,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
}

impl Args {
    fn config(&self) -> ContributorConfig {
        ContributorConfig {
            host: self.host.clone(),
            port: self.port,
            aggregator_port: self.aggregator_port,
            population: self.population,
            max_range: self.max_range,
            client: ClientConfig {
                request_timeout: Duration::from_secs(self.timeout_secs),
                fanout: self.fanout,
            },
            tls: TlsConfig {
                cert_path: self.cert.clone(),
                key_path: self.key.clone(),
                ca_path: self.ca.clone(),
            },
        }
    }
}

fn server_stopped(result: Result<std::io::Result<()>, tokio::task::JoinError>) -> Box<dyn Error> {
    match result {
        Ok(Ok(())) => "server stopped unexpectedly".into(),
        Ok(Err(e)) => e.into(),
        Err(e) => e.into(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = args.config();
    config.validate()?;
    let tls = server::load_tls(&config.tls).await?;
    let transport = Arc::new(HttpsTransport::new(&config.tls, &config.client)?);

    let mut rng = entropy::time_seeded();
    let secret = match args.secret {
        Some(value) => PrivateValue::new(value),
        None => PrivateValue::generate(&mut rng, config.max_range),
    };
    log::info!("{}: New contributor", config.port);
    log::debug!("{}: Private value is {}", config.port, secret.value());

    let port = config.port;
    let node = Arc::new(ContributorNode::new(config, secret, rng, transport)?);

    let handle = server::Handle::new();
    let mut server: JoinHandle<std::io::Result<()>> = tokio::spawn(server::serve_tls(
        server::contributor_router(Arc::clone(&node)),
        port,
        tls,
        handle.clone(),
    ));

    node.register().await?;

    let finished = tokio::select! {
        state = node.wait_finished() => state,
        result = &mut server => return Err(server_stopped(result)),
        _ = signal::ctrl_c() => {
            log::info!("{}: Interrupted before the round finished", port);
            return Ok(());
        }
    };
    log::info!("{}: Round finished: {:?}", port, finished);

    if let Some(report) = node.dispatch_report().await {
        for (peer, e) in &report.failures {
            log::warn!("{}: Peer {} never received its share: {}", port, peer, e);
        }
    }

    // Let in-flight responses finish before exiting.
    handle.graceful_shutdown(Some(Duration::from_secs(5)));
    server.await??;
    Ok(())
}
