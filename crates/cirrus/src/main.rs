mod backends;
mod commands;
mod progress;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cirrus")]
#[command(about = "Launch and tear down cloud instances", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch an instance and wait until it is running
    Launch(LaunchArgs),
    /// Manage stacks
    #[command(subcommand)]
    Stack(StackCommands),
    /// Show or change the active cloud, region and project
    Config(ConfigArgs),
    /// Show version information
    Version,
}

#[derive(clap::Args)]
pub struct LaunchArgs {
    /// e.g. production-platform-app, which is interpreted as
    /// environment: production, server_type: platform-app
    #[arg(value_name = "ENVIRONMENT-SERVER_TYPE")]
    pub env_type: String,
    /// Override instance size
    #[arg(long)]
    pub size: Option<String>,
    /// File or URL with user data for cloud-init. Can use parameters.
    #[arg(long, value_name = "FILE|URL")]
    pub user_data: Option<String>,
    /// Additional parameters used when rendering user data
    #[arg(long, value_name = "key=val[,key=val..]")]
    pub user_data_params: Option<String>,
    /// Override availability zone (defaults to balancing)
    #[arg(long)]
    pub availability_zone: Option<String>,
    /// Additional security groups to assign. The server type and baseline
    /// groups are always added.
    #[arg(long, value_name = "sg-name[,sg-name]", value_delimiter = ',')]
    pub additional_security_groups: Vec<String>,
    /// Display coloured output
    #[arg(long, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,
}

#[derive(Subcommand)]
enum StackCommands {
    /// Delete a stack and wait until it is gone
    Terminate {
        stack_name: String,
        /// Display coloured output
        #[arg(long, value_enum, default_value_t = ColorChoice::Auto)]
        color: ColorChoice,
    },
}

#[derive(clap::Args)]
pub struct ConfigArgs {
    /// Set the active cloud configuration
    #[arg(long)]
    pub cloud: Option<String>,
    /// Set the region
    #[arg(long)]
    pub region: Option<String>,
    /// Set the project name for the current directory
    #[arg(long)]
    pub project: Option<String>,
    /// List the provider's security groups, or create the configured ones
    #[arg(long, value_enum)]
    pub security_groups: Option<SecurityGroupsAction>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SecurityGroupsAction {
    List,
    Set,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    Never,
    Auto,
    Always,
}

impl ColorChoice {
    pub fn apply(self) {
        match self {
            ColorChoice::Never => colored::control::set_override(false),
            ColorChoice::Always => colored::control::set_override(true),
            ColorChoice::Auto => colored::control::unset_override(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries progress output; logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    match cli.command {
        Commands::Version => {
            println!("cirrus {}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Launch(args) => {
            args.color.apply();
            commands::launch::handle(args).await?;
        }
        Commands::Stack(StackCommands::Terminate { stack_name, color }) => {
            color.apply();
            commands::stack::terminate(&stack_name).await?;
        }
        Commands::Config(args) => {
            commands::config::handle(args).await?;
        }
    }

    Ok(())
}
