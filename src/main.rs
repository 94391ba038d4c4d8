use clap::Parser;
use jvt::cli::{Cli, CommandHandler, OutputFormat};
use jvt::core::constants::{defaults, env};
use std::process;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_env(env::JVT_LOG)
        .unwrap_or_else(|_| EnvFilter::new(defaults::DEFAULT_LOG_LEVEL));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    init_logging();

    let cli = Cli::parse();

    let mut handler = match CommandHandler::new(OutputFormat::from_flag(cli.json)) {
        Ok(handler) => handler,
        Err(e) => {
            eprint!("{}", e.user_message());
            process::exit(1);
        }
    };

    if let Err(e) = handler.handle_command(cli.command).await {
        eprint!("{}", e.user_message());
        process::exit(1);
    }
}
