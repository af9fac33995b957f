use clap::{Parser, Subcommand};
use colored::Colorize;
use groupsync::{cmd, error, logging};

#[derive(Parser, Debug)]
#[command(
    name = "groupsync",
    about = "Copy Microsoft 365 security groups, members and owners between tenants",
    version,
    long_about = "Export security groups with their direct members and owners from a source\n\
                  tenant to CSV, then re-create them in a destination tenant (e.g. GCC High).\n\n\
                  Import phases are re-runnable: existing groups and relations are skipped."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Authenticate to Microsoft Graph
    Login(cmd::login::LoginArgs),

    /// Logout and clear cached credentials
    Logout(cmd::login::LogoutArgs),

    /// Manage tenant configurations
    #[command(subcommand)]
    Tenant(TenantCommands),

    /// Export security groups, members and owners to CSV
    Export(cmd::export::ExportArgs),

    /// Create groups and attach owners/members from an export
    Import(cmd::import::ImportArgs),
}

#[derive(Subcommand, Debug)]
enum TenantCommands {
    /// Add a new tenant configuration
    Add(cmd::tenant::TenantAddArgs),

    /// List configured tenants
    List(cmd::tenant::TenantListArgs),

    /// Switch active tenant
    Switch(cmd::tenant::TenantSwitchArgs),

    /// Remove a tenant configuration
    Remove(cmd::tenant::TenantRemoveArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> error::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Login(args) => {
            logging::init_console_logging(cli.verbose);
            cmd::login::login(args).await?
        }
        Commands::Logout(args) => {
            logging::init_console_logging(cli.verbose);
            cmd::login::logout(args).await?
        }
        Commands::Tenant(tenant_cmd) => {
            logging::init_console_logging(cli.verbose);
            match tenant_cmd {
                TenantCommands::Add(args) => cmd::tenant::add(args).await?,
                TenantCommands::List(args) => cmd::tenant::list(args).await?,
                TenantCommands::Switch(args) => cmd::tenant::switch(args).await?,
                TenantCommands::Remove(args) => cmd::tenant::remove(args).await?,
            }
        }
        // Run commands install their own file-backed subscriber
        Commands::Export(args) => cmd::export::export(args, cli.verbose).await?,
        Commands::Import(args) => cmd::import::import(args, cli.verbose).await?,
    }

    Ok(())
}
