mod cli;
mod config;
mod container;
mod error;
mod monitor;
mod remote;
mod view;

use clap::Parser;
use container::power::PowerAction;

#[derive(Parser)]
#[command(name = "ezops")]
#[command(about = "Real-time container console for the EzOps backend", long_about = None)]
struct Cli {
    #[arg(long = "dev")]
    dev: bool,

    #[arg(long = "config", default_value = "config.json")]
    config: String,

    #[arg(long = "base-url")]
    base_url: Option<String>,

    #[arg(long = "list")]
    list: bool,

    #[arg(long = "logs")]
    logs: Option<String>,

    #[arg(long = "filter", requires = "logs")]
    filter: Option<String>,

    #[arg(long = "action", requires = "id")]
    action: Option<PowerAction>,

    #[arg(long = "id")]
    id: Option<String>,
}

// The core runs on one thread: pollers, the log stream and dispatches
// interleave cooperatively.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    if cli.dev {
        // Dev mode prints tracing output on stderr, stdout stays for the view
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_max_level(tracing::Level::DEBUG)
            .init();
    }

    let mut config = match config::config::Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(base_url) = cli.base_url {
        config.api.base_url = base_url;
    }

    let result = if cli.list {
        cli::list::list_containers(&config).await
    } else if let (Some(action), Some(id)) = (cli.action, cli.id.as_deref()) {
        cli::action::run_action(&config, id, action).await
    } else if let Some(id) = cli.logs.as_deref() {
        cli::logs::follow_logs(&config, id, cli.filter.as_deref()).await
    } else {
        cli::monitor::run_console(&config).await
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
