use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::db_types::{NewOrder, Order, OrderId, OrderStatusType, VendorId};

/// Inserts a new order into the database using the given connection, in `pending_payment` status. This is not atomic.
/// You can embed this call inside a transaction if you need to ensure atomicity.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, sqlx::Error> {
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                id,
                customer_id,
                status,
                latitude,
                longitude,
                service_area,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *;
        "#,
    )
    .bind(order.id)
    .bind(order.customer_id)
    .bind(OrderStatusType::PendingPayment)
    .bind(order.latitude)
    .bind(order.longitude)
    .bind(order.service_area)
    .bind(order.created_at)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Order {} inserted for customer {}", order.id, order.customer_id);
    Ok(order)
}

pub async fn fetch_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(order)
}

/// The guarded write at the heart of acceptance. The order moves to `assigned` only if it is still awaiting assignment
/// *and* the vendor holds an open offer on it. Returns `false` if the guard did not match, in which case nothing was
/// changed.
pub async fn assign_if_offered(
    order_id: &OrderId,
    vendor_id: &VendorId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET
                status = 'assigned',
                assigned_vendor_id = $2,
                assigned_at = $3,
                updated_at = $3
            WHERE id = $1
              AND status = 'awaiting_assignment'
              AND EXISTS (
                SELECT 1 FROM assignments
                WHERE order_id = $1 AND vendor_id = $2 AND status = 'pending'
              )
        "#,
    )
    .bind(order_id)
    .bind(vendor_id)
    .bind(now)
    .execute(conn)
    .await?;
    trace!("🗃️ Conditional assignment of {order_id} to {vendor_id} affected {} rows", result.rows_affected());
    Ok(result.rows_affected() == 1)
}

/// Assigns the order to `vendor_id`, provided its status is still `expected`. Used for force-assignment, where the
/// caller has already validated `expected`.
pub async fn assign_from(
    order_id: &OrderId,
    vendor_id: &VendorId,
    expected: OrderStatusType,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET
                status = 'assigned',
                assigned_vendor_id = $2,
                assigned_at = $3,
                updated_at = $3
            WHERE id = $1 AND status = $4
            RETURNING *
        "#,
    )
    .bind(order_id)
    .bind(vendor_id)
    .bind(now)
    .bind(expected)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Moves the order from `expected` to `new_status`, stamping the matching timestamp column. Annulments clear the
/// assigned vendor. Returns `None` if the stored status was no longer `expected`.
///
/// The state machine is NOT checked here.
pub async fn update_status(
    order_id: &OrderId,
    expected: OrderStatusType,
    new_status: OrderStatusType,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let mut sql = String::from("UPDATE orders SET status = $3, updated_at = $4");
    if let Some(column) = new_status.timestamp_column() {
        sql.push_str(&format!(", {column} = $4"));
    }
    if new_status.is_annulment() {
        sql.push_str(", assigned_vendor_id = NULL");
    }
    sql.push_str(" WHERE id = $1 AND status = $2 RETURNING *");
    let order = sqlx::query_as(&sql)
        .bind(order_id)
        .bind(expected)
        .bind(new_status)
        .bind(now)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}
