//! relay - interactive client for the relay daemon
//!
//! Lines typed on stdin are sent to the server; every broadcast is printed
//! with a UTC timestamp.

fn main() -> anyhow::Result<()> {
    relay_client::cli::main()
}
