use sqlx::SqliteConnection;

use crate::db_types::{NewHistoryEntry, OrderHistoryEntry, OrderId};

pub async fn insert_entry(entry: NewHistoryEntry, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO order_history (order_id, from_status, to_status, actor, note, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(entry.order_id)
    .bind(entry.from_status)
    .bind(entry.to_status)
    .bind(entry.actor)
    .bind(entry.note)
    .bind(chrono::Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderHistoryEntry>, sqlx::Error> {
    let entries = sqlx::query_as("SELECT * FROM order_history WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(entries)
}
