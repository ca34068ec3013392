//! Example: fetch a URL twice and report whether it is static
//!
//! `RUST_LOG=barebones_net=debug cargo run --example check -- https://example.com/`

use anyhow::Context;
use barebones_net::{CheckOutcome, HttpClient};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let url = std::env::args().nth(1).context("usage: check <url>")?;

    match HttpClient::new().check(&url)? {
        CheckOutcome::Static(body) => println!("static: {} bytes", body.len()),
        CheckOutcome::Dynamic => println!("dynamic"),
    }

    Ok(())
}
