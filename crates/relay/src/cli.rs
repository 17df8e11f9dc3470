//! Relay client command line.
//!
//! ```text
//! relay                          # localhost:29999
//! relay --host 10.0.0.5 -p 4000
//! ```

use anyhow::Result;
use clap::Parser;
use tokio::io::{self, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use crate::client::{ClientConfig, RelayClient, SessionEnd, DEFAULT_HOST};

/// relay - interactive client for the relay daemon
#[derive(Parser, Debug)]
#[command(name = "relay", version, about)]
pub struct Args {
    /// Server host
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Server port
    #[arg(short, long, default_value_t = relay_protocol::DEFAULT_PORT)]
    pub port: u16,
}

impl From<Args> for ClientConfig {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
        }
    }
}

/// Parses arguments and runs an interactive session on stdin/stdout.
pub fn main() -> Result<()> {
    let config = ClientConfig::from(Args::parse());
    run_client(config)
}

#[tokio::main]
async fn run_client(config: ClientConfig) -> Result<()> {
    // Logs go to stderr so they never mix with relayed lines
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("relay_client=warn".parse()?),
        )
        .init();

    let client = RelayClient::connect(&config).await?;

    let mut stdout = io::stdout();
    stdout
        .write_all(format!("connected to {}\n", client.addr()).as_bytes())
        .await?;
    stdout.flush().await?;

    let end = client.run(BufReader::new(io::stdin()), io::stdout()).await?;

    match end {
        SessionEnd::ServerClosed => {
            stdout.write_all(b"connection closed by server\n").await?;
            stdout.flush().await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from(Args::try_parse_from(["relay"]).unwrap());
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from(["relay", "--host", "10.0.0.5", "-p", "4000"]).unwrap();
        let config = ClientConfig::from(args);
        assert_eq!(config.address(), "10.0.0.5:4000");
    }
}
