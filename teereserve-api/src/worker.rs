use chrono::Utc;
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

use teereserve_booking::{BookingResult, BookingService};

#[derive(Debug, Default, PartialEq)]
pub struct SweepReport {
    pub expired_drafts: usize,
    pub completed_bookings: usize,
}

/// One maintenance pass: drop expired guest drafts, then close out played rounds.
pub async fn run_sweep(bookings: &BookingService) -> BookingResult<SweepReport> {
    let now = Utc::now();
    let expired_drafts = bookings.expire_drafts(now).await?;
    let completed_bookings = bookings.complete_past_bookings(now.date_naive()).await?;
    Ok(SweepReport {
        expired_drafts,
        completed_bookings,
    })
}

pub async fn start_maintenance_worker(bookings: Arc<BookingService>, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("Maintenance worker started, sweeping every {:?}", every);

    loop {
        ticker.tick().await;
        match run_sweep(&bookings).await {
            Ok(report) if report != SweepReport::default() => info!(
                "Sweep expired {} drafts, completed {} bookings",
                report.expired_drafts, report.completed_bookings
            ),
            Ok(_) => {}
            Err(e) => error!("Maintenance sweep failed: {}", e),
        }
    }
}
