use dispatch_engine::{
    db_types::{Assignment, Order, OrderHistoryEntry, OrderId, Vendor, VendorId},
    traits::{DispatchDbError, OrderManagement},
};
use mockall::mock;

mock! {
    pub OrderStore {}
    impl OrderManagement for OrderStore {
        async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, DispatchDbError>;
        async fn fetch_vendor(&self, vendor_id: &VendorId) -> Result<Option<Vendor>, DispatchDbError>;
        async fn fetch_assignments_for_order(&self, order_id: &OrderId) -> Result<Vec<Assignment>, DispatchDbError>;
        async fn fetch_order_history(&self, order_id: &OrderId) -> Result<Vec<OrderHistoryEntry>, DispatchDbError>;
    }
}
