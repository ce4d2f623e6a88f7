//! Command-line entrypoint: chat with a Llama-2 model, running locally or through Replicate.
use eyre::Result;

pub mod cli;
pub mod config;
pub mod display;
pub mod inference;
pub mod instruct;
pub mod logging;
pub mod prompting;
pub mod protocol;
pub mod session;
pub mod transcript;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
