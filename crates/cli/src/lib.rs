pub mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "redress",
    about = "Redress operator CLI",
    long_about = "Operate the refund workflow: migrations, fixtures, eligibility checks, refund execution, and ticket handling.",
    after_help = "Examples:\n  redress migrate\n  redress check ORD0003\n  redress refund ORD0003 --confirm yes --email customer@example.com\n  redress ticket TKT1A2B3C4D --resolve"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ConfirmArg {
    Yes,
    No,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic order/payment fixtures and verify the seed contract")]
    Seed,
    #[command(about = "Evaluate refund eligibility for an order without side effects")]
    Check {
        #[arg(value_name = "ORDER_ID")]
        order_id: String,
    },
    #[command(about = "Run the refund workflow for an order")]
    Refund {
        #[arg(value_name = "ORDER_ID")]
        order_id: String,
        #[arg(long, value_enum, help = "Customer's answer to the refund confirmation prompt")]
        confirm: Option<ConfirmArg>,
        #[arg(long, help = "Customer contact email for notifications and tickets")]
        email: Option<String>,
    },
    #[command(about = "Look up a support ticket, optionally resolving it")]
    Ticket {
        #[arg(value_name = "TICKET_ID")]
        ticket_id: String,
        #[arg(long, help = "Mark the ticket resolved")]
        resolve: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

fn init_logging() {
    use redress_core::config::LogFormat::*;
    use redress_core::config::{AppConfig, LoadOptions};
    use tracing::Level;

    // Structured logs go to stderr so the JSON command outcome on stdout
    // stays machine-readable.
    let logging = AppConfig::load(LoadOptions::default()).map(|config| config.logging).ok();
    let log_level = logging
        .as_ref()
        .and_then(|logging| logging.level.parse::<Level>().ok())
        .unwrap_or(Level::WARN);

    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    match logging.map(|logging| logging.format).unwrap_or(Compact) {
        Compact => builder.compact().init(),
        Pretty => builder.pretty().init(),
        Json => builder.json().init(),
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Check { order_id } => commands::check::run(&order_id),
        Command::Refund { order_id, confirm, email } => {
            commands::refund::run(&order_id, confirm, email.as_deref())
        }
        Command::Ticket { ticket_id, resolve } => commands::ticket::run(&ticket_id, resolve),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
