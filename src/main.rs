/// Proxy cloud resampling entry point
use clap::Parser;

use proxy_cloud::cli::Args;
use proxy_cloud::pipeline;

fn main() {
    let args = Args::parse();

    if let Err(err) = pipeline::run(&args) {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}
