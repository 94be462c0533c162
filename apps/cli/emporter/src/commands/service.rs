use crate::error::AppError;
use crate::output::Output;

use emporter_core::EmporterClient;

pub async fn resume(client: &EmporterClient, output: Output) -> Result<(), AppError> {
    client.resume_service().await.map_err(AppError::core)?;
    output.done("Service resumed")
}

pub async fn suspend(client: &EmporterClient, output: Output) -> Result<(), AppError> {
    client.suspend_service().await.map_err(AppError::core)?;
    output.done("Service suspended")
}
