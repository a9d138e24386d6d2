use anyhow::Result;
use cold_start::cli;

fn main() -> Result<()> {
    cli::handle_calls()
}
