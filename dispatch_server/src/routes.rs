//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Every route under `/api` sits behind the bearer-token middleware, so handlers can take [`JwtClaims`] as an argument.
//! Administrative routes are additionally wrapped in the ACL middleware via the `requires [...]` clause of `route!`.
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Database and lock-store calls are all async, so keep it that way.
use actix_web::{get, web, HttpResponse, Responder};
use dispatch_engine::{
    db_types::{NewOrder, OrderId, VendorId},
    traits::{DispatchDatabase, OrderManagement},
    Dispatcher,
    OrderFlowApi,
    OrderQueryApi,
};
use log::*;

use crate::{
    auth::{JwtClaims, Role},
    data_objects::{AssignParams, ExpiredOffersResult, RadiusParams, StatusParams, VendorRecord},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:expr),*])  => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds)++ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(order_by_id => Get "/orders/{order_id}" impl OrderManagement);
/// Fetch an order together with the offers made for it.
///
/// * Administrators see everything, including the audit trail.
/// * Customers see their own orders.
/// * Vendors see orders they were offered, and only their own offer.
///
/// Any other caller gets a 404, whether the order exists or not.
pub async fn order_by_id<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    debug!("💻️ GET order {order_id} for {} ({})", claims.sub, claims.role);
    let not_found = || ServerError::NoRecordFound(format!("Order {order_id}"));
    let mut details = api.fetch_order_details(&order_id).await?.ok_or_else(not_found)?;
    match claims.role {
        Role::Admin => {},
        Role::Customer if details.order.customer_id == claims.sub => details.history.clear(),
        Role::Vendor => {
            let vendor_id = VendorId::from(claims.sub.as_str());
            if !details.was_offered_to(&vendor_id) && !details.order.is_assigned_to(&vendor_id) {
                return Err(not_found());
            }
            details.assignments.retain(|a| a.vendor_id == vendor_id);
            details.history.clear();
        },
        Role::Customer => return Err(not_found()),
    }
    Ok(HttpResponse::Ok().json(details))
}

route!(order_candidates => Get "/orders/{order_id}/candidates" impl DispatchDatabase where requires [Role::Admin]);
/// Ranked list of vendors the order could be offered to right now. `?radius_km=` overrides the configured radius.
pub async fn order_candidates<B: DispatchDatabase>(
    path: web::Path<String>,
    query: web::Query<RadiusParams>,
    api: web::Data<Dispatcher<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    debug!("💻️ GET candidates for order {order_id}");
    let candidates = api.locator().candidates_for_order(&order_id, query.radius_km).await?;
    Ok(HttpResponse::Ok().json(candidates))
}

route!(dispatch_order => Post "/orders/{order_id}/dispatch" impl DispatchDatabase where requires [Role::Admin]);
/// Offers a paid order to every nearby candidate. Returns the vendors who received a new offer.
pub async fn dispatch_order<B: DispatchDatabase>(
    path: web::Path<String>,
    body: web::Json<RadiusParams>,
    api: web::Data<Dispatcher<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    debug!("💻️ POST dispatch for order {order_id}");
    let offered = api.dispatch_order(&order_id, body.radius_km).await?;
    Ok(HttpResponse::Ok().json(offered))
}

route!(assign_order => Post "/orders/{order_id}/assign" impl DispatchDatabase where requires [Role::Admin]);
/// Assigns the order to a vendor directly, withdrawing every other offer.
pub async fn assign_order<B: DispatchDatabase>(
    claims: JwtClaims,
    path: web::Path<String>,
    body: web::Json<AssignParams>,
    api: web::Data<Dispatcher<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let AssignParams { vendor_id } = body.into_inner();
    info!("💻️ {} is force-assigning order {order_id} to {vendor_id}", claims.sub);
    let order = api.force_assign(&order_id, &vendor_id, &claims.sub).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(update_order_status => Post "/orders/{order_id}/status" impl DispatchDatabase where requires [Role::Admin]);
/// Applies a status change coming from an external collaborator (payment capture, cancellation, refunds).
pub async fn update_order_status<B: DispatchDatabase>(
    claims: JwtClaims,
    path: web::Path<String>,
    body: web::Json<StatusParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let status = body.status;
    info!("💻️ {} is moving order {order_id} to {status}", claims.sub);
    let order = api.modify_status(&order_id, status, &claims.sub).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(expire_offers => Post "/orders/{order_id}/expire_offers" impl DispatchDatabase where requires [Role::Admin]);
pub async fn expire_offers<B: DispatchDatabase>(
    path: web::Path<String>,
    api: web::Data<Dispatcher<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    debug!("💻️ POST expire_offers for order {order_id}");
    let expired = api.expire_offers_for_order(&order_id).await?;
    Ok(HttpResponse::Ok().json(ExpiredOffersResult { order_id, expired }))
}

route!(new_order => Post "/orders" impl DispatchDatabase where requires [Role::Admin]);
/// Ingests an order from checkout. New orders start out pending payment.
pub async fn new_order<B: DispatchDatabase>(
    body: web::Json<NewOrder>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order = body.into_inner();
    debug!("💻️ POST new order {}", order.id);
    let order = api.ingest_order(order).await?;
    Ok(HttpResponse::Created().json(order))
}

//----------------------------------------------   Vendors  ----------------------------------------------------
route!(upsert_vendor => Put "/vendors/{vendor_id}" impl DispatchDatabase where requires [Role::Admin]);
/// Creates or replaces a vendor record pushed by the onboarding system.
pub async fn upsert_vendor<B: DispatchDatabase>(
    path: web::Path<String>,
    body: web::Json<VendorRecord>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let vendor_id = VendorId::from(path.into_inner());
    debug!("💻️ PUT vendor {vendor_id}");
    let vendor = api.upsert_vendor(body.into_inner().into_new_vendor(vendor_id)).await?;
    Ok(HttpResponse::Ok().json(vendor))
}
