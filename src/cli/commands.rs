use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default configuration file and create the catalog database
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Reconcile the catalog against the remote inventory
    Sync {
        /// Only sweep the apps of this stream
        #[arg(long, conflicts_with = "model")]
        stream: Option<String>,

        /// Only refresh the fields of this model
        #[arg(long)]
        model: Option<String>,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show catalog counts and recent sync runs
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP API
    Serve {
        /// Host to bind to, overrides the configuration file
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to, overrides the configuration file
        #[arg(long, short)]
        port: Option<u16>,
    },
}
