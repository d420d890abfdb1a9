use crate::{
    db_types::{Order, OrderId, Vendor, VendorId},
    dispatch_api::errors::DispatchError,
    traits::{OrderDetails, OrderManagement},
};

/// Read-only access to orders and vendors.
#[derive(Clone)]
pub struct OrderQueryApi<B> {
    db: B,
}

impl<B> OrderQueryApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> OrderQueryApi<B>
where B: OrderManagement
{
    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, DispatchError> {
        let order = self.db.fetch_order(order_id).await?;
        Ok(order)
    }

    pub async fn fetch_vendor(&self, vendor_id: &VendorId) -> Result<Option<Vendor>, DispatchError> {
        let vendor = self.db.fetch_vendor(vendor_id).await?;
        Ok(vendor)
    }

    /// The order with every offer made for it and its audit trail.
    pub async fn fetch_order_details(&self, order_id: &OrderId) -> Result<Option<OrderDetails>, DispatchError> {
        let Some(order) = self.db.fetch_order(order_id).await? else {
            return Ok(None);
        };
        let assignments = self.db.fetch_assignments_for_order(order_id).await?;
        let history = self.db.fetch_order_history(order_id).await?;
        Ok(Some(OrderDetails { order, assignments, history }))
    }
}
