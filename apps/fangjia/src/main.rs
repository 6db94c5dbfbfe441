use clap::{Parser, ValueEnum};
use fangjia::obs::{init_metrics, init_tracing};
use fangjia::runner::{run, RunArgs, RunMode};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fangjia")]
#[command(about = "District housing-price crawler, reporter and notifier.", version)]
#[command(
    after_help = "Examples:\n  fangjia --config configs/fangjia.toml\n  fangjia --config configs/fangjia.toml --mode push\n  fangjia --mode report --log-format json\n"
)]
struct Cli {
    /// Config file path (TOML). Built-in defaults apply when omitted.
    #[arg(long, env = "FANGJIA_CONFIG")]
    config: Option<PathBuf>,

    /// crawl | push | report
    #[arg(long, value_enum, default_value_t = Mode::Crawl)]
    mode: Mode,

    /// text | json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Prometheus listener address (host:port).
    #[arg(long, env = "FANGJIA_METRICS_ADDR")]
    metrics_addr: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Mode {
    Crawl,
    Push,
    Report,
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = init_tracing(&cli.log_format) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
    if let Err(err) = init_metrics(cli.metrics_addr.as_deref()) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }

    let mode = match cli.mode {
        Mode::Crawl => RunMode::Crawl,
        Mode::Push => RunMode::Push,
        Mode::Report => RunMode::Report,
    };
    let config_path = cli
        .config
        .filter(|path| !path.as_os_str().is_empty());

    match run(RunArgs { mode, config_path }) {
        Ok(json) => {
            println!(
                "{}",
                serde_json::to_string(&json)
                    .unwrap_or_else(|_| "{\"status\":\"error\",\"error\":\"json\"}".to_string())
            );
        }
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}
