//! One function per subcommand, each driving the client facade.

pub mod app;
pub mod service;
pub mod tunnels;
pub mod watch;

use crate::cli::Commands;
use crate::error::AppError;
use crate::output::Output;

use emporter_core::EmporterClient;

/// Run `command` against `client`, printing results to `output`.
pub async fn run(
    client: &EmporterClient,
    command: Commands,
    output: Output,
) -> Result<(), AppError> {
    match command {
        Commands::Status => app::status(client, output).await,
        Commands::Version => app::version(client, output),
        Commands::Launch { timeout } => app::launch(client, timeout, output).await,
        Commands::Activate => app::activate(client, output),
        Commands::Quit => app::quit(client, output),
        Commands::Consent { prompt } => app::consent(client, prompt, output).await,
        Commands::List(args) => tunnels::list(client, args, output).await,
        Commands::Create(args) => tunnels::create(client, args, output).await,
        Commands::Configure { source } => tunnels::configure(client, &source, output).await,
        Commands::Delete { id } => tunnels::delete(client, &id, output).await,
        Commands::Enable { id } => tunnels::set_enabled(client, &id, true, output).await,
        Commands::Disable { id } => tunnels::set_enabled(client, &id, false, output).await,
        Commands::Protect { id, username } => {
            tunnels::protect(client, &id, &username, output).await
        }
        Commands::Resume => service::resume(client, output).await,
        Commands::Suspend => service::suspend(client, output).await,
        Commands::Watch { count } => watch::watch(client, count, output).await,
    }
}
