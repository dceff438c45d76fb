mod cmd;
mod logger;
mod report;
mod util;

use clap::Parser;

#[tokio::main]
async fn main() {
    let args = cmd::Args::parse();
    logger::init();
    args.exec().await.unwrap_or_else(|e| {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    });
}
