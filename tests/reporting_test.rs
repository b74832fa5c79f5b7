mod common;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use common::funded_service;
use riserva::application::{AppError, BalanceService, ServiceRevenue};
use riserva::domain::TransactionKind;
use riserva::storage::Repository;
use tempfile::TempDir;

/// Helper to parse a date string into DateTime<Utc>
fn parse_date(date_str: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
        .and_utc()
}

/// Build a service whose log is seeded with write-offs at explicit
/// timestamps, bypassing the engine so records can be backdated.
async fn seeded_service(
    write_offs: &[(i64, i64, i64, i64, &str)], // (user, order, service, amount, date)
) -> Result<(BalanceService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
    let repo = Repository::init(&db_url).await?;

    let mut uow = repo.begin().await?;
    for (user, order, service, amount, date) in write_offs {
        Repository::append_record(
            &mut uow,
            TransactionKind::WriteOff,
            *user,
            Some(*order),
            Some(*service),
            *amount,
            parse_date(date),
        )
        .await?;
    }
    uow.commit().await?;

    Ok((BalanceService::new(repo), temp_dir))
}

#[tokio::test]
async fn test_revenue_grouped_by_service() -> Result<()> {
    let (service, _temp) = seeded_service(&[
        (1, 5, 7, 100, "2024-03-02"),
        (2, 6, 7, 50, "2024-03-15"),
        (3, 7, 9, 30, "2024-03-31"),
    ])
    .await?;

    let report = service.revenue_report("2024-03").await?;
    assert_eq!(
        report.entries,
        vec![
            ServiceRevenue {
                service_id: 7,
                total_amount: 150
            },
            ServiceRevenue {
                service_id: 9,
                total_amount: 30
            },
        ]
    );
    assert_eq!(report.total(), 180);

    Ok(())
}

#[tokio::test]
async fn test_revenue_excludes_write_offs_outside_period() -> Result<()> {
    let (service, _temp) = seeded_service(&[
        (1, 1, 7, 100, "2024-02-29"), // before
        (1, 2, 7, 40, "2024-03-01"),  // first day, included
        (1, 3, 7, 60, "2024-03-31"),  // last day, included
        (1, 4, 7, 500, "2024-04-01"), // first of next month, excluded
    ])
    .await?;

    let report = service.revenue_report("2024-03").await?;
    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.entries[0].total_amount, 100);

    Ok(())
}

#[tokio::test]
async fn test_revenue_counts_only_write_offs() -> Result<()> {
    // Reserve and release through the engine; nothing was consumed, so the
    // current month's revenue must be empty.
    let (service, _temp) = funded_service(1, 500).await?;
    service.reserve(1, 5, 9, 200).await?;
    service.release(1, 5, 9, 200).await?;

    let period = Utc::now().format("%Y-%m").to_string();
    let report = service.revenue_report(&period).await?;
    assert!(report.entries.is_empty());
    assert_eq!(report.total(), 0);

    Ok(())
}

#[tokio::test]
async fn test_engine_write_offs_appear_in_current_month() -> Result<()> {
    let (service, _temp) = funded_service(1, 500).await?;
    service.reserve(1, 5, 9, 200).await?;
    service.write_off(1, 5, 9, 200).await?;

    let period = Utc::now().format("%Y-%m").to_string();
    let report = service.revenue_report(&period).await?;
    assert_eq!(
        report.entries,
        vec![ServiceRevenue {
            service_id: 9,
            total_amount: 200
        }]
    );

    Ok(())
}

#[tokio::test]
async fn test_report_rejects_malformed_period() -> Result<()> {
    let (service, _temp) = seeded_service(&[]).await?;

    for token in ["2024", "2024-13", "march", "2024-1", ""] {
        let err = service.revenue_report(token).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidPeriod(_)), "token {token:?}");
    }

    Ok(())
}
