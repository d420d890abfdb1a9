use chrono::{DateTime, Utc};
use log::trace;
use sqlx::SqliteConnection;

use crate::db_types::{Assignment, Candidate, OfferEndReason, OrderId, VendorId};

/// Opens a pending offer for the candidate. Returns the offer if it was newly opened (or re-opened after expiring), and
/// `None` if the vendor already holds an open offer, has rejected the order, or has already won it.
pub async fn open_offer(
    order_id: &OrderId,
    candidate: &Candidate,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Assignment>, sqlx::Error> {
    let offer = sqlx::query_as(
        r#"
            INSERT INTO assignments (order_id, vendor_id, status, distance_km, offered_at, updated_at)
            VALUES ($1, $2, 'pending', $3, $4, $4)
            ON CONFLICT (order_id, vendor_id) DO UPDATE SET
                status = 'pending',
                distance_km = excluded.distance_km,
                reason = NULL,
                offered_at = excluded.offered_at,
                responded_at = NULL,
                updated_at = excluded.updated_at
            WHERE assignments.status = 'expired'
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(&candidate.vendor_id)
    .bind(candidate.distance_km)
    .bind(now)
    .fetch_optional(conn)
    .await?;
    Ok(offer)
}

/// Marks the vendor's pending offer as accepted. Returns `false` if there was no pending offer.
pub async fn accept_offer(
    order_id: &OrderId,
    vendor_id: &VendorId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE assignments SET status = 'accepted', responded_at = $3, updated_at = $3
            WHERE order_id = $1 AND vendor_id = $2 AND status = 'pending'
        "#,
    )
    .bind(order_id)
    .bind(vendor_id)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Creates (or overwrites) an accepted offer for the vendor. Only for force-assignment, after every other accepted offer
/// on the order has been withdrawn.
pub async fn upsert_accepted(
    order_id: &OrderId,
    vendor_id: &VendorId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO assignments (order_id, vendor_id, status, offered_at, responded_at, updated_at)
            VALUES ($1, $2, 'accepted', $3, $3, $3)
            ON CONFLICT (order_id, vendor_id) DO UPDATE SET
                status = 'accepted',
                reason = NULL,
                responded_at = excluded.responded_at,
                updated_at = excluded.updated_at
        "#,
    )
    .bind(order_id)
    .bind(vendor_id)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

/// Marks the vendor's pending offer as rejected. Returns `false` if there was no pending offer.
pub async fn reject_offer(
    order_id: &OrderId,
    vendor_id: &VendorId,
    reason: Option<&str>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE assignments SET status = 'rejected', reason = $3, responded_at = $4, updated_at = $4
            WHERE order_id = $1 AND vendor_id = $2 AND status = 'pending'
        "#,
    )
    .bind(order_id)
    .bind(vendor_id)
    .bind(reason)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Expires the open offers on the order, except the one held by `keep` (if given). When `include_accepted` is set, an
/// accepted offer (i.e. a previous assignment) is expired too. Returns the affected vendors.
pub async fn withdraw_offers(
    order_id: &OrderId,
    keep: Option<&VendorId>,
    include_accepted: bool,
    reason: OfferEndReason,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<VendorId>, sqlx::Error> {
    let statuses = if include_accepted { "('pending', 'accepted')" } else { "('pending')" };
    let sql = format!(
        r#"
            UPDATE assignments SET status = 'expired', reason = $3, updated_at = $4
            WHERE order_id = $1
              AND ($2 IS NULL OR vendor_id != $2)
              AND status IN {statuses}
            RETURNING vendor_id
        "#
    );
    let vendors: Vec<VendorId> = sqlx::query_scalar(&sql)
        .bind(order_id)
        .bind(keep)
        .bind(reason.as_str())
        .bind(now)
        .fetch_all(conn)
        .await?;
    trace!("🗃️ {} offers on order {order_id} expired ({reason})", vendors.len());
    Ok(vendors)
}

/// Expires every pending offer made before `cutoff`, returning `(order_id, vendor_id)` pairs.
pub async fn expire_offers_before(
    cutoff: DateTime<Utc>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<(OrderId, VendorId)>, sqlx::Error> {
    let expired = sqlx::query_as(
        r#"
            UPDATE assignments SET status = 'expired', reason = $2, updated_at = $3
            WHERE status = 'pending' AND offered_at < $1
            RETURNING order_id, vendor_id
        "#,
    )
    .bind(cutoff)
    .bind(OfferEndReason::Timeout.as_str())
    .bind(now)
    .fetch_all(conn)
    .await?;
    Ok(expired)
}

pub async fn count_pending(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM assignments WHERE order_id = $1 AND status = 'pending'")
        .bind(order_id)
        .fetch_one(conn)
        .await?;
    Ok(count)
}

pub async fn fetch_for_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<Assignment>, sqlx::Error> {
    let offers = sqlx::query_as("SELECT * FROM assignments WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(offers)
}
