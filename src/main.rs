mod action_batch;
mod client;
mod commands;
mod config;
mod flags;
mod lookup;
mod output;
mod poll;
mod progress;
mod prompt;
mod select;
mod types;

use crate::client::DashboardClient;
use crate::commands::Ctx;
use crate::commands::appliance::ApplianceCommand;
use crate::commands::devices::DevicesCommand;
use crate::commands::multi_network::MultiNetworkCommand;
use crate::commands::networks::NetworksCommand;
use crate::commands::organizations::OrganizationsCommand;
use crate::commands::sensor::SensorCommand;
use crate::commands::switch::SwitchCommand;
use crate::commands::wireless::WirelessCommand;
use crate::config::{API_KEY_ENV, BASE_URL_ENV, DEFAULT_BASE_URL, Scope, config_path, resolve};
use crate::output::OutputFormat;
use crate::prompt::StdinPrompter;
use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "merakictl",
    version,
    about = "CLI for the Meraki Dashboard API"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "URL",
        help = "Base URL for the API (defaults to https://api.meraki.com/api/v1)"
    )]
    base_url: Option<String>,

    #[arg(
        long,
        short = 'o',
        value_enum,
        default_value_t = OutputFormat::Table,
        global = true,
        help = "Output format (propagates to subcommands)"
    )]
    output: OutputFormat,

    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        global = true,
        help = "More log output on stderr (-v info, -vv debug)"
    )]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Organization operations
    #[command(subcommand, visible_alias = "orgs")]
    Organizations(OrganizationsCommand),
    /// Network operations
    #[command(subcommand)]
    Networks(NetworksCommand),
    /// Device operations
    #[command(subcommand)]
    Devices(DevicesCommand),
    /// Security appliance (MX) operations
    #[command(subcommand, visible_alias = "mx")]
    Appliance(ApplianceCommand),
    /// Switch (MS) operations
    #[command(subcommand, visible_alias = "ms")]
    Switch(SwitchCommand),
    /// Wireless (MR) operations
    #[command(subcommand, visible_alias = "mr")]
    Wireless(WirelessCommand),
    /// Environmental sensor (MT) readings
    #[command(subcommand, visible_alias = "mt")]
    Sensor(SensorCommand),
    /// Operations across many organizations or networks
    #[command(subcommand, visible_alias = "msp")]
    MultiNetwork(MultiNetworkCommand),
    /// Show current configuration (secrets masked)
    ConfigShow,
    /// Generate shell completion scripts
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let cwd = std::env::current_dir().context("reading current directory")?;

    match cli.command {
        Commands::Completion { shell } => {
            use clap_complete::{generate, shells};
            let mut cmd = Cli::command();
            let bin = cmd.get_name().to_string();
            match shell {
                CompletionShell::Bash => {
                    generate(shells::Bash, &mut cmd, bin, &mut std::io::stdout())
                }
                CompletionShell::Zsh => {
                    generate(shells::Zsh, &mut cmd, bin, &mut std::io::stdout())
                }
                CompletionShell::Fish => {
                    generate(shells::Fish, &mut cmd, bin, &mut std::io::stdout())
                }
                CompletionShell::PowerShell => {
                    generate(shells::PowerShell, &mut cmd, bin, &mut std::io::stdout())
                }
            }
            return Ok(());
        }
        Commands::ConfigShow => return config_show(&cwd, cli.base_url),
        _ => {}
    }

    let effective = resolve(&cwd, cli.base_url.clone())?;
    debug!(base_url = %effective.base_url, key = %effective.masked_key(), "resolved configuration");
    let client = DashboardClient::new(&effective.base_url, &effective.api_key, effective.timeout)?
        .with_per_page(effective.per_page);

    let mut prompter = StdinPrompter;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut ctx = Ctx::new(
        &client,
        cli.output,
        effective.poll_interval,
        &mut prompter,
        &mut out,
    );

    match cli.command {
        Commands::Organizations(command) => commands::organizations::handle(&mut ctx, command),
        Commands::Networks(command) => commands::networks::handle(&mut ctx, command),
        Commands::Devices(command) => commands::devices::handle(&mut ctx, command),
        Commands::Appliance(command) => commands::appliance::handle(&mut ctx, command),
        Commands::Switch(command) => commands::switch::handle(&mut ctx, command),
        Commands::Wireless(command) => commands::wireless::handle(&mut ctx, command),
        Commands::Sensor(command) => commands::sensor::handle(&mut ctx, command),
        Commands::MultiNetwork(command) => commands::multi_network::handle(&mut ctx, command),
        Commands::ConfigShow | Commands::Completion { .. } => unreachable!("handled earlier"),
    }
}

/// Effective settings without requiring an API key to be present.
fn config_show(cwd: &std::path::Path, base_url_override: Option<String>) -> Result<()> {
    let file = config::load(cwd)?;
    let base_url = base_url_override
        .or_else(|| std::env::var(BASE_URL_ENV).ok())
        .or_else(|| file.base_url.clone())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let api_key = match resolve(cwd, None) {
        Ok(effective) => effective.masked_key(),
        Err(_) => "(not set)".to_string(),
    };

    let shown = json!({
        "api_key": api_key,
        "api_key_env": API_KEY_ENV,
        "base_url": base_url,
        "per_page": file.per_page,
        "timeout_secs": file.timeout_secs,
        "poll_interval_secs": file.poll_interval_secs,
        "user_config": config_path(Scope::User, cwd).ok(),
        "project_config": config_path(Scope::Local, cwd).ok(),
    });
    println!("{}", serde_json::to_string_pretty(&shown)?);
    Ok(())
}
