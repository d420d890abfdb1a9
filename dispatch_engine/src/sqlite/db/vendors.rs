use chrono::Utc;
use dispatch_common::BoundingBox;
use log::debug;
use sqlx::{types::Json, SqliteConnection};

use crate::db_types::{NewVendor, Vendor, VendorId};

/// Inserts the vendor, or replaces every mutable field of an existing record with the same id.
pub async fn upsert_vendor(vendor: NewVendor, conn: &mut SqliteConnection) -> Result<Vendor, sqlx::Error> {
    let now = Utc::now();
    let vendor: Vendor = sqlx::query_as(
        r#"
            INSERT INTO vendors (
                id,
                name,
                approval_status,
                is_blocked,
                is_available,
                latitude,
                longitude,
                service_radius_km,
                service_areas,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                approval_status = excluded.approval_status,
                is_blocked = excluded.is_blocked,
                is_available = excluded.is_available,
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                service_radius_km = excluded.service_radius_km,
                service_areas = excluded.service_areas,
                updated_at = excluded.updated_at
            RETURNING *;
        "#,
    )
    .bind(vendor.id)
    .bind(vendor.name)
    .bind(vendor.approval_status)
    .bind(vendor.is_blocked)
    .bind(vendor.is_available)
    .bind(vendor.latitude)
    .bind(vendor.longitude)
    .bind(vendor.service_radius_km)
    .bind(Json(vendor.service_areas))
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Vendor {} ({}) saved. Approval: {}", vendor.id, vendor.name, vendor.approval_status);
    Ok(vendor)
}

pub async fn fetch_vendor(vendor_id: &VendorId, conn: &mut SqliteConnection) -> Result<Option<Vendor>, sqlx::Error> {
    let vendor = sqlx::query_as("SELECT * FROM vendors WHERE id = $1").bind(vendor_id).fetch_optional(conn).await?;
    Ok(vendor)
}

/// Vendors that may receive offers, with their base inside `bounds`. The box is only a pre-filter: callers must still
/// check the exact distance and the vendor's own coverage.
pub async fn fetch_dispatchable_in_box(
    bounds: &BoundingBox,
    conn: &mut SqliteConnection,
) -> Result<Vec<Vendor>, sqlx::Error> {
    let vendors = sqlx::query_as(
        r#"
            SELECT * FROM vendors
            WHERE approval_status = 'approved'
              AND is_blocked = FALSE
              AND is_available = TRUE
              AND latitude BETWEEN $1 AND $2
              AND longitude BETWEEN $3 AND $4
            ORDER BY id
        "#,
    )
    .bind(bounds.min_lat)
    .bind(bounds.max_lat)
    .bind(bounds.min_lon)
    .bind(bounds.max_lon)
    .fetch_all(conn)
    .await?;
    Ok(vendors)
}
