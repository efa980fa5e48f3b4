//! Persistent record store used by back-office jobs.
//!
//! Every call is scoped to one tenant. Implementations enforce tenant-unique
//! names and report missing references as [`StoreError::NotFound`].

use async_trait::async_trait;
use common_money::Money;
use thiserror::Error;
use uuid::Uuid;

use crate::model::{
    Catalog, Entity, GroupSnapshot, InvoicePayment, InvoiceSummary, NamedRecord, NewInvoice, NewPayment, NewProduct,
    NewShippingGroup, NewShippingStatus, PricedRow, Product, ProductFilter, ProductPatch, ShippingGroup,
    ShippingGroupPatch, ShippingStatus, ShippingStatusPatch,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(Entity),
    #[error("{entity} named '{name}' already exists")]
    Duplicate { entity: Entity, name: String },
    #[error("{0} is still referenced")]
    InUse(Entity),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    async fn list_named(&self, tenant_id: Uuid, catalog: Catalog) -> StoreResult<Vec<NamedRecord>>;
    async fn get_named(&self, tenant_id: Uuid, catalog: Catalog, id: Uuid) -> StoreResult<NamedRecord>;
    async fn find_named(&self, tenant_id: Uuid, catalog: Catalog, name: &str) -> StoreResult<NamedRecord>;
    async fn create_named(&self, tenant_id: Uuid, catalog: Catalog, name: &str) -> StoreResult<NamedRecord>;
    async fn rename_named(&self, tenant_id: Uuid, catalog: Catalog, id: Uuid, name: &str) -> StoreResult<NamedRecord>;
    async fn delete_named(&self, tenant_id: Uuid, catalog: Catalog, id: Uuid) -> StoreResult<()>;

    async fn list_shipping_statuses(&self, tenant_id: Uuid) -> StoreResult<Vec<ShippingStatus>>;
    async fn get_shipping_status(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<ShippingStatus>;
    async fn find_shipping_status(&self, tenant_id: Uuid, name: &str) -> StoreResult<ShippingStatus>;
    async fn create_shipping_status(&self, tenant_id: Uuid, new: NewShippingStatus) -> StoreResult<ShippingStatus>;
    async fn update_shipping_status(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        patch: ShippingStatusPatch,
    ) -> StoreResult<ShippingStatus>;
    async fn delete_shipping_status(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<()>;

    async fn list_shipping_groups(&self, tenant_id: Uuid) -> StoreResult<Vec<ShippingGroup>>;
    async fn get_shipping_group(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<ShippingGroup>;
    async fn find_shipping_group(&self, tenant_id: Uuid, name: &str) -> StoreResult<ShippingGroup>;
    async fn create_shipping_group(&self, tenant_id: Uuid, new: NewShippingGroup) -> StoreResult<ShippingGroup>;
    async fn update_shipping_group(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        patch: ShippingGroupPatch,
    ) -> StoreResult<ShippingGroup>;
    async fn delete_shipping_group(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<()>;

    async fn create_product(&self, tenant_id: Uuid, new: NewProduct) -> StoreResult<Product>;
    async fn update_product(&self, tenant_id: Uuid, id: Uuid, patch: ProductPatch) -> StoreResult<Product>;
    async fn set_sale_price(
        &self,
        tenant_id: Uuid,
        shipping_group_id: Uuid,
        shipping_label: &str,
        sale_price: Money,
    ) -> StoreResult<Product>;
    async fn delete_product(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<()>;

    /// Products matching `filter`, each with its group's terms and live
    /// aggregate read in the same statement.
    async fn priced_products(&self, tenant_id: Uuid, filter: &ProductFilter) -> StoreResult<Vec<PricedRow>>;
    /// A group and every current member from one consistent read.
    async fn pricing_snapshot(&self, tenant_id: Uuid, shipping_group_id: Uuid) -> StoreResult<GroupSnapshot>;

    async fn list_invoices(&self, tenant_id: Uuid) -> StoreResult<Vec<InvoiceSummary>>;
    async fn get_invoice(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<InvoiceSummary>;
    async fn create_invoice(&self, tenant_id: Uuid, new: NewInvoice) -> StoreResult<InvoiceSummary>;
    async fn add_payment(&self, tenant_id: Uuid, invoice_id: Uuid, payment: NewPayment) -> StoreResult<InvoicePayment>;
    async fn list_payments(&self, tenant_id: Uuid, invoice_id: Uuid) -> StoreResult<Vec<InvoicePayment>>;
    async fn list_invoice_products(&self, tenant_id: Uuid, invoice_id: Uuid) -> StoreResult<Vec<Product>>;
}
