use clap::{Parser, Subcommand};

const HELP_EPILOG: &str = r#"Server options can also be provided via environment variables:
  CONFIG_PATH (default: ./config.yaml)
  DB_PATH     (default: data/app.db)
  PORT        (default: 5151 or config.listen_port)
  JWT_SECRET  (overrides config.jwt_secret)
"#;

#[derive(Debug, Parser)]
#[command(
    name = "worktrack-server",
    version,
    about = "WorkTrack task and attendance server",
    long_about = None,
    after_long_help = HELP_EPILOG,
)]
pub struct Cli {
    /// Optional subcommand. Without one, runs the server.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print a bcrypt hash for an admin entry in config.yaml
    HashPassword {
        /// Password to hash; read from stdin when omitted
        password: Option<String>,
        /// bcrypt cost factor
        #[arg(long, default_value_t = bcrypt::DEFAULT_COST)]
        cost: u32,
    },
    /// Recompute every worker's performance metrics from the task store
    RebuildMetrics,
}
