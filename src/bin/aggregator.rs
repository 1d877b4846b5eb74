use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tokio::task::JoinHandle;

use secure_sum::config::{AggregatorConfig, ClientConfig, TlsConfig};
use secure_sum::net::{server, HttpsTransport};
use secure_sum::Aggregator;

/// The aggregator: waits for every contributor, hands out the peer list and prints
/// the sum of all private values.
#[derive(Parser, Debug)]
#[command(about)]
struct Args {
    /// Port the aggregator listens on.
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Host every node listens on.
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Total number of contributors in the round.
    #[arg(short = 't', long, default_value_t = 3)]
    population: usize,

    /// PEM certificate served by this node.
    #[arg(long, default_value = "server.crt")]
    cert: PathBuf,

    /// PEM private key for the certificate.
    #[arg(long, default_value = "server.key")]
    key: PathBuf,

    /// PEM certificate trusted when calling contributors (defaults to --cert).
    #[arg(long)]
    ca: Option<PathBuf>,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
}

impl Args {
    fn config(&self) -> AggregatorConfig {
        AggregatorConfig {
            host: self.host.clone(),
            port: self.port,
            population: self.population,
            client: ClientConfig {
                request_timeout: Duration::from_secs(self.timeout_secs),
                ..ClientConfig::default()
            },
            tls: TlsConfig {
                cert_path: self.cert.clone(),
                key_path: self.key.clone(),
                ca_path: self.ca.clone(),
            },
        }
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

    let port = config.port;
    log::info!(
        "{}: Aggregator waiting for {} contributors",
        port,
        config.population
    );
    let aggregator = Arc::new(Aggregator::new(config, transport)?);

    let handle = server::Handle::new();
    let mut server: JoinHandle<std::io::Result<()>> = tokio::spawn(server::serve_tls(
        server::aggregator_router(Arc::clone(&aggregator)),
        port,
        tls,
        handle.clone(),
    ));

    tokio::select! {
        result = &mut server => {
            result??;
            return Err("server stopped unexpectedly".into());
        }
        total = aggregator.wait_total() => {
            match total {
                Some(total) => println!("{}", total),
                None => log::error!("{}: Round ended without a total", port),
            }
        }
        _ = signal::ctrl_c() => {
            log::info!("{}: Interrupted with {} aggregates received", port, aggregator.received());
        }
    }

    // The last contributor is still waiting for its response.
    handle.graceful_shutdown(Some(Duration::from_secs(5)));
    server.await??;
    Ok(())
}
