//! relayd - line-oriented TCP broadcast relay daemon
//!
//! ```bash
//! relayd --host 0.0.0.0 --port 29999
//! RUST_LOG=relayd=debug relayd
//! ```

fn main() -> anyhow::Result<()> {
    relayd::cli::main()
}
