use crate::{
    db_types::{Assignment, Order, OrderHistoryEntry, OrderId, Vendor, VendorId},
    traits::DispatchDbError,
};

/// The `OrderManagement` trait defines the behaviour for querying orders, vendors and offers in the database backend.
/// None of these methods modify state.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, DispatchDbError>;

    async fn fetch_vendor(&self, vendor_id: &VendorId) -> Result<Option<Vendor>, DispatchDbError>;

    /// All offers ever made for the order, oldest first.
    async fn fetch_assignments_for_order(&self, order_id: &OrderId) -> Result<Vec<Assignment>, DispatchDbError>;

    async fn fetch_order_history(&self, order_id: &OrderId) -> Result<Vec<OrderHistoryEntry>, DispatchDbError>;
}
