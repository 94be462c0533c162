//! CLI argument definitions for emporter.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Environment variable holding the password for `protect`.
pub const PASSWORD_ENV: &str = "EMPORTER_TUNNEL_PASSWORD";

/// emporter - control the Emporter companion from the command line
///
/// Launches the companion on demand, manages its tunnels and reports service
/// state. Configuration comes from config.json in the config directory,
/// overridden by EMPORTER_* environment variables.
#[derive(Parser, Debug)]
#[command(name = "emporter")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Configuration directory (defaults to EMPORTER_CONFIG_DIR or the platform config dir)
    #[arg(long, global = true, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Never launch the companion implicitly
    #[arg(long, global = true)]
    pub no_launch: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show whether the companion is installed, running and authorized
    Status,

    /// Show the companion's app and scripting API versions
    Version,

    /// Launch the companion in the background and wait until it is ready
    Launch {
        /// Seconds to wait for readiness (defaults to the configured timeout)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Bring the running companion to the foreground
    Activate,

    /// Ask the running companion to quit
    Quit,

    /// Resolve permission to control the companion
    Consent {
        /// Show the system prompt if permission has not been decided yet
        #[arg(long)]
        prompt: bool,
    },

    /// List tunnels
    #[command(after_help = "EXAMPLES:
    # Everything
    emporter list

    # Tunnels exposing local port 8080
    emporter list --port 8080

    # The tunnel serving a URL or directory
    emporter list --source http://localhost:3000
    emporter list --source ~/Sites/blog
")]
    List(ListArgs),

    /// Create a tunnel for a URL or directory
    #[command(after_help = "EXAMPLES:
    emporter create http://localhost:8080 --name api
    emporter create ./public --index-file index.html --live-reload
")]
    Create(CreateArgs),

    /// Open the companion's editor for a source, creating a tunnel interactively if needed
    Configure {
        /// URL or directory
        source: String,
    },

    /// Delete a tunnel
    Delete {
        /// Tunnel id
        id: String,
    },

    /// Enable a tunnel
    Enable {
        /// Tunnel id
        id: String,
    },

    /// Disable a tunnel
    Disable {
        /// Tunnel id
        id: String,
    },

    /// Password-protect a tunnel (password is read from EMPORTER_TUNNEL_PASSWORD)
    Protect {
        /// Tunnel id
        id: String,
        /// Username visitors must enter
        username: String,
    },

    /// Connect the service
    Resume,

    /// Disconnect the service and every tunnel
    Suspend,

    /// Print companion events as they arrive
    Watch {
        /// Stop after this many events
        #[arg(long)]
        count: Option<usize>,
    },
}

#[derive(Args, Debug)]
#[group(multiple = false)]
pub struct ListArgs {
    /// Only tunnels exposing this local port
    #[arg(long)]
    pub port: Option<u16>,

    /// Only the tunnel serving this URL or directory
    #[arg(long)]
    pub source: Option<String>,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// URL (http://host:port or host:port) or directory
    pub source: String,

    #[arg(long)]
    pub name: Option<String>,

    /// Remove the tunnel when the companion quits
    #[arg(long)]
    pub temporary: bool,

    /// Create the tunnel disabled
    #[arg(long)]
    pub disabled: bool,

    /// Proxy only: rewrite the Host header sent upstream
    #[arg(long)]
    pub rewrite_host_header: bool,

    /// Directory only: file served for directory requests
    #[arg(long)]
    pub index_file: Option<String>,

    /// Directory only: allow directory listings
    #[arg(long)]
    pub browsing: bool,

    /// Directory only: reload pages when files change
    #[arg(long)]
    pub live_reload: bool,
}
