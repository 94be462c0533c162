use crate::error::AppError;
use crate::output::Output;

use emporter_core::EmporterClient;

use log::{info, warn};

/// Print events until `count` have been seen or the bus goes away.
pub async fn watch(
    client: &EmporterClient,
    count: Option<usize>,
    output: Output,
) -> Result<(), AppError> {
    let mut subscription = client.subscribe();
    let mut seen = 0;

    info!("Watching companion events");

    while count.is_none_or(|limit| seen < limit) {
        let Some(event) = subscription.next().await else {
            warn!("Event stream closed");
            break;
        };
        output.event(&event)?;
        seen += 1;
    }

    Ok(())
}
