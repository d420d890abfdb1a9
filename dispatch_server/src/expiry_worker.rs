use std::time::Duration;

use dispatch_engine::{traits::ExpiredOffers, DispatchDatabase, DispatchError, Dispatcher, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

/// Starts the offer expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_expiry_worker(
    dispatcher: Dispatcher<SqliteDatabase>,
    offer_timeout: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🕰️ Offer expiry worker started. Offers lapse after {offer_timeout:?}.");
        loop {
            timer.tick().await;
            trace!("🕰️ Running offer expiry job");
            if let Err(e) = run_expiry_pass(&dispatcher, offer_timeout).await {
                error!("🕰️ Error running offer expiry job: {e}");
            }
        }
    })
}

/// One sweep of the expiry job. Returns the orders whose every offer has now lapsed.
pub async fn run_expiry_pass<B: DispatchDatabase>(
    dispatcher: &Dispatcher<B>,
    offer_timeout: Duration,
) -> Result<Vec<ExpiredOffers>, DispatchError> {
    let expired = dispatcher.expire_stale_offers(offer_timeout).await?;
    if expired.is_empty() {
        return Ok(expired);
    }
    let count = expired.iter().map(|e| e.vendors.len()).sum::<usize>();
    info!("🕰️ {count} offers on {} orders expired", expired.len());
    let exhausted = expired.into_iter().filter(ExpiredOffers::offers_exhausted).collect::<Vec<_>>();
    if !exhausted.is_empty() {
        warn!("🕰️ These orders have no open offers left and need attention: {}", order_list(&exhausted));
    }
    Ok(exhausted)
}

fn order_list(expired: &[ExpiredOffers]) -> String {
    expired.iter().map(|e| e.order_id.to_string()).collect::<Vec<String>>().join(", ")
}
