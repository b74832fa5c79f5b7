// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use riserva::application::BalanceService;
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(BalanceService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = BalanceService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to create a funded account
pub async fn funded_service(user_id: i64, amount: i64) -> Result<(BalanceService, TempDir)> {
    let (service, temp_dir) = test_service().await?;
    service.top_up(user_id, amount).await?;
    Ok((service, temp_dir))
}
