mod cli;
mod infra;
mod presentation;
mod report;
mod routes;
mod server;

use rating_engine::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
