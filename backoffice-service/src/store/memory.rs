use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use common_money::Money;
use common_pricing::{GroupAggregate, ShippingTerms};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::model::{
    Catalog, Entity, GroupSnapshot, InvoicePayment, InvoiceSummary, NamedRecord, NewInvoice, NewPayment, NewProduct,
    NewShippingGroup, NewShippingStatus, PricedRow, Product, ProductFilter, ProductPatch, ShippingGroup,
    ShippingGroupPatch, ShippingStatus, ShippingStatusPatch,
};

#[derive(Debug, Clone)]
struct GroupRow {
    id: Uuid,
    name: String,
    shipper_id: Uuid,
    status_id: Uuid,
    shipping_cost: Money,
    dollar_price: BigDecimal,
    tax_rate: BigDecimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct ProductRow {
    id: Uuid,
    description: String,
    shipping_label: String,
    purchase_price: Money,
    sale_price: Option<Money>,
    location_id: Uuid,
    status_id: Uuid,
    shipping_group_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
struct InvoiceRow {
    id: Uuid,
    seller_id: Uuid,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct TenantData {
    named: HashMap<Catalog, Vec<NamedRecord>>,
    shipping_statuses: Vec<ShippingStatus>,
    shipping_groups: Vec<GroupRow>,
    products: Vec<ProductRow>,
    invoices: Vec<InvoiceRow>,
    invoice_products: Vec<(Uuid, Uuid)>,
    payments: Vec<InvoicePayment>,
}

fn sorted_by_name<T: Clone>(items: &[T], name: impl Fn(&T) -> &str) -> Vec<T> {
    let mut out = items.to_vec();
    out.sort_by(|a, b| name(a).cmp(name(b)));
    out
}

impl TenantData {
    fn named(&self, catalog: Catalog) -> &[NamedRecord] {
        self.named.get(&catalog).map(Vec::as_slice).unwrap_or(&[])
    }

    fn named_by_id(&self, catalog: Catalog, id: Uuid) -> StoreResult<&NamedRecord> {
        self.named(catalog).iter().find(|r| r.id == id).ok_or(StoreError::NotFound(catalog.entity()))
    }

    fn ensure_named_exists(&self, catalog: Catalog, id: Uuid) -> StoreResult<()> {
        self.named_by_id(catalog, id).map(|_| ())
    }

    fn ensure_unique_named(&self, catalog: Catalog, name: &str, except: Option<Uuid>) -> StoreResult<()> {
        if self.named(catalog).iter().any(|r| r.name == name && Some(r.id) != except) {
            return Err(StoreError::Duplicate { entity: catalog.entity(), name: name.to_string() });
        }
        Ok(())
    }

    fn named_in_use(&self, catalog: Catalog, id: Uuid) -> bool {
        match catalog {
            Catalog::Seller => self.invoices.iter().any(|i| i.seller_id == id),
            Catalog::Shipper => self.shipping_groups.iter().any(|g| g.shipper_id == id),
            Catalog::Location => self.products.iter().any(|p| p.location_id == id),
            Catalog::ProductStatus => self.products.iter().any(|p| p.status_id == id),
        }
    }

    fn status_by_id(&self, id: Uuid) -> StoreResult<&ShippingStatus> {
        self.shipping_statuses.iter().find(|s| s.id == id).ok_or(StoreError::NotFound(Entity::ShippingStatus))
    }

    fn group_row(&self, id: Uuid) -> StoreResult<&GroupRow> {
        self.shipping_groups.iter().find(|g| g.id == id).ok_or(StoreError::NotFound(Entity::ShippingGroup))
    }

    fn group_view(&self, row: &GroupRow) -> StoreResult<ShippingGroup> {
        Ok(ShippingGroup {
            id: row.id,
            name: row.name.clone(),
            shipper_id: row.shipper_id,
            shipper: self.named_by_id(Catalog::Shipper, row.shipper_id)?.name.clone(),
            status_id: row.status_id,
            status: self.status_by_id(row.status_id)?.name.clone(),
            shipping_cost: row.shipping_cost.clone(),
            dollar_price: row.dollar_price.clone(),
            tax_rate: row.tax_rate.clone(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn product_row(&self, id: Uuid) -> StoreResult<&ProductRow> {
        self.products.iter().find(|p| p.id == id).ok_or(StoreError::NotFound(Entity::Product))
    }

    fn product_view(&self, row: &ProductRow) -> StoreResult<Product> {
        let shipping_group = match row.shipping_group_id {
            Some(group_id) => Some(self.group_row(group_id)?.name.clone()),
            None => None,
        };
        Ok(Product {
            id: row.id,
            description: row.description.clone(),
            shipping_label: row.shipping_label.clone(),
            purchase_price: row.purchase_price.clone(),
            sale_price: row.sale_price.clone(),
            location_id: row.location_id,
            location: self.named_by_id(Catalog::Location, row.location_id)?.name.clone(),
            status_id: row.status_id,
            status: self.named_by_id(Catalog::ProductStatus, row.status_id)?.name.clone(),
            shipping_group_id: row.shipping_group_id,
            shipping_group,
        })
    }

    fn group_aggregate(&self, group_id: Uuid) -> GroupAggregate {
        GroupAggregate::from_purchase_prices(
            self.products
                .iter()
                .filter(|p| p.shipping_group_id == Some(group_id))
                .map(|p| p.purchase_price.inner()),
        )
    }

    fn invoice_row(&self, id: Uuid) -> StoreResult<&InvoiceRow> {
        self.invoices.iter().find(|i| i.id == id).ok_or(StoreError::NotFound(Entity::Invoice))
    }

    fn invoice_summary(&self, row: &InvoiceRow) -> StoreResult<InvoiceSummary> {
        let product_ids: Vec<Uuid> =
            self.invoice_products.iter().filter(|(inv, _)| *inv == row.id).map(|(_, p)| *p).collect();
        let mut total_amount = Money::zero();
        for product_id in &product_ids {
            if let Some(sale) = &self.product_row(*product_id)?.sale_price {
                total_amount = total_amount + sale.clone();
            }
        }
        let payments: Vec<&InvoicePayment> = self.payments.iter().filter(|p| p.invoice_id == row.id).collect();
        Ok(InvoiceSummary {
            id: row.id,
            seller_id: row.seller_id,
            seller: self.named_by_id(Catalog::Seller, row.seller_id)?.name.clone(),
            notes: row.notes.clone(),
            created_at: row.created_at,
            total_amount,
            num_products: product_ids.len() as i64,
            num_payments: payments.len() as i64,
            total_paid: payments.into_iter().map(|p| &p.amount).sum(),
        })
    }
}

/// Store kept in process memory. Backs the test suite and `STORE_BACKEND=memory`.
#[derive(Default)]
pub struct MemoryStore {
    tenants: RwLock<HashMap<Uuid, TenantData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read<T>(&self, tenant_id: Uuid, f: impl FnOnce(&TenantData) -> StoreResult<T>) -> StoreResult<T> {
        let tenants = self.tenants.read().await;
        match tenants.get(&tenant_id) {
            Some(data) => f(data),
            None => f(&TenantData::default()),
        }
    }

    async fn write<T>(&self, tenant_id: Uuid, f: impl FnOnce(&mut TenantData) -> StoreResult<T>) -> StoreResult<T> {
        let mut tenants = self.tenants.write().await;
        f(tenants.entry(tenant_id).or_default())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_named(&self, tenant_id: Uuid, catalog: Catalog) -> StoreResult<Vec<NamedRecord>> {
        self.read(tenant_id, |t| Ok(sorted_by_name(t.named(catalog), |r| r.name.as_str()))).await
    }

    async fn get_named(&self, tenant_id: Uuid, catalog: Catalog, id: Uuid) -> StoreResult<NamedRecord> {
        self.read(tenant_id, |t| t.named_by_id(catalog, id).cloned()).await
    }

    async fn find_named(&self, tenant_id: Uuid, catalog: Catalog, name: &str) -> StoreResult<NamedRecord> {
        self.read(tenant_id, |t| {
            t.named(catalog).iter().find(|r| r.name == name).cloned().ok_or(StoreError::NotFound(catalog.entity()))
        })
        .await
    }

    async fn create_named(&self, tenant_id: Uuid, catalog: Catalog, name: &str) -> StoreResult<NamedRecord> {
        self.write(tenant_id, |t| {
            t.ensure_unique_named(catalog, name, None)?;
            let record = NamedRecord { id: Uuid::new_v4(), name: name.to_string() };
            t.named.entry(catalog).or_default().push(record.clone());
            Ok(record)
        })
        .await
    }

    async fn rename_named(&self, tenant_id: Uuid, catalog: Catalog, id: Uuid, name: &str) -> StoreResult<NamedRecord> {
        self.write(tenant_id, |t| {
            t.ensure_named_exists(catalog, id)?;
            t.ensure_unique_named(catalog, name, Some(id))?;
            let record = t
                .named
                .entry(catalog)
                .or_default()
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or(StoreError::NotFound(catalog.entity()))?;
            record.name = name.to_string();
            Ok(record.clone())
        })
        .await
    }

    async fn delete_named(&self, tenant_id: Uuid, catalog: Catalog, id: Uuid) -> StoreResult<()> {
        self.write(tenant_id, |t| {
            t.ensure_named_exists(catalog, id)?;
            if t.named_in_use(catalog, id) {
                return Err(StoreError::InUse(catalog.entity()));
            }
            t.named.entry(catalog).or_default().retain(|r| r.id != id);
            Ok(())
        })
        .await
    }

    async fn list_shipping_statuses(&self, tenant_id: Uuid) -> StoreResult<Vec<ShippingStatus>> {
        self.read(tenant_id, |t| Ok(sorted_by_name(&t.shipping_statuses, |s| s.name.as_str()))).await
    }

    async fn get_shipping_status(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<ShippingStatus> {
        self.read(tenant_id, |t| t.status_by_id(id).cloned()).await
    }

    async fn find_shipping_status(&self, tenant_id: Uuid, name: &str) -> StoreResult<ShippingStatus> {
        self.read(tenant_id, |t| {
            t.shipping_statuses
                .iter()
                .find(|s| s.name == name)
                .cloned()
                .ok_or(StoreError::NotFound(Entity::ShippingStatus))
        })
        .await
    }

    async fn create_shipping_status(&self, tenant_id: Uuid, new: NewShippingStatus) -> StoreResult<ShippingStatus> {
        self.write(tenant_id, |t| {
            if t.shipping_statuses.iter().any(|s| s.name == new.name) {
                return Err(StoreError::Duplicate { entity: Entity::ShippingStatus, name: new.name });
            }
            let now = Utc::now();
            let status = ShippingStatus {
                id: Uuid::new_v4(),
                name: new.name,
                description: new.description,
                created_at: now,
                updated_at: now,
            };
            t.shipping_statuses.push(status.clone());
            Ok(status)
        })
        .await
    }

    async fn update_shipping_status(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        patch: ShippingStatusPatch,
    ) -> StoreResult<ShippingStatus> {
        self.write(tenant_id, |t| {
            if let Some(name) = &patch.name {
                if t.shipping_statuses.iter().any(|s| &s.name == name && s.id != id) {
                    return Err(StoreError::Duplicate { entity: Entity::ShippingStatus, name: name.clone() });
                }
            }
            let status = t
                .shipping_statuses
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or(StoreError::NotFound(Entity::ShippingStatus))?;
            if let Some(name) = patch.name {
                status.name = name;
            }
            if let Some(description) = patch.description {
                status.description = description;
            }
            status.updated_at = Utc::now();
            Ok(status.clone())
        })
        .await
    }

    async fn delete_shipping_status(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<()> {
        self.write(tenant_id, |t| {
            t.status_by_id(id)?;
            if t.shipping_groups.iter().any(|g| g.status_id == id) {
                return Err(StoreError::InUse(Entity::ShippingStatus));
            }
            t.shipping_statuses.retain(|s| s.id != id);
            Ok(())
        })
        .await
    }

    async fn list_shipping_groups(&self, tenant_id: Uuid) -> StoreResult<Vec<ShippingGroup>> {
        self.read(tenant_id, |t| {
            sorted_by_name(&t.shipping_groups, |g| g.name.as_str()).iter().map(|g| t.group_view(g)).collect()
        })
        .await
    }

    async fn get_shipping_group(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<ShippingGroup> {
        self.read(tenant_id, |t| t.group_view(t.group_row(id)?)).await
    }

    async fn find_shipping_group(&self, tenant_id: Uuid, name: &str) -> StoreResult<ShippingGroup> {
        self.read(tenant_id, |t| {
            let row =
                t.shipping_groups.iter().find(|g| g.name == name).ok_or(StoreError::NotFound(Entity::ShippingGroup))?;
            t.group_view(row)
        })
        .await
    }

    async fn create_shipping_group(&self, tenant_id: Uuid, new: NewShippingGroup) -> StoreResult<ShippingGroup> {
        self.write(tenant_id, |t| {
            if t.shipping_groups.iter().any(|g| g.name == new.name) {
                return Err(StoreError::Duplicate { entity: Entity::ShippingGroup, name: new.name });
            }
            t.ensure_named_exists(Catalog::Shipper, new.shipper_id)?;
            t.status_by_id(new.status_id)?;
            let now = Utc::now();
            let row = GroupRow {
                id: Uuid::new_v4(),
                name: new.name,
                shipper_id: new.shipper_id,
                status_id: new.status_id,
                shipping_cost: new.shipping_cost,
                dollar_price: new.dollar_price,
                tax_rate: new.tax_rate,
                created_at: now,
                updated_at: now,
            };
            t.shipping_groups.push(row.clone());
            t.group_view(&row)
        })
        .await
    }

    async fn update_shipping_group(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        patch: ShippingGroupPatch,
    ) -> StoreResult<ShippingGroup> {
        self.write(tenant_id, |t| {
            t.group_row(id)?;
            if let Some(name) = &patch.name {
                if t.shipping_groups.iter().any(|g| &g.name == name && g.id != id) {
                    return Err(StoreError::Duplicate { entity: Entity::ShippingGroup, name: name.clone() });
                }
            }
            if let Some(shipper_id) = patch.shipper_id {
                t.ensure_named_exists(Catalog::Shipper, shipper_id)?;
            }
            if let Some(status_id) = patch.status_id {
                t.status_by_id(status_id)?;
            }
            let row = t
                .shipping_groups
                .iter_mut()
                .find(|g| g.id == id)
                .ok_or(StoreError::NotFound(Entity::ShippingGroup))?;
            if let Some(name) = patch.name {
                row.name = name;
            }
            if let Some(shipper_id) = patch.shipper_id {
                row.shipper_id = shipper_id;
            }
            if let Some(status_id) = patch.status_id {
                row.status_id = status_id;
            }
            if let Some(cost) = patch.shipping_cost {
                row.shipping_cost = cost;
            }
            if let Some(dollar_price) = patch.dollar_price {
                row.dollar_price = dollar_price;
            }
            if let Some(tax_rate) = patch.tax_rate {
                row.tax_rate = tax_rate;
            }
            row.updated_at = Utc::now();
            let row = row.clone();
            t.group_view(&row)
        })
        .await
    }

    async fn delete_shipping_group(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<()> {
        self.write(tenant_id, |t| {
            t.group_row(id)?;
            if t.products.iter().any(|p| p.shipping_group_id == Some(id)) {
                return Err(StoreError::InUse(Entity::ShippingGroup));
            }
            t.shipping_groups.retain(|g| g.id != id);
            Ok(())
        })
        .await
    }

    async fn create_product(&self, tenant_id: Uuid, new: NewProduct) -> StoreResult<Product> {
        self.write(tenant_id, |t| {
            t.ensure_named_exists(Catalog::Location, new.location_id)?;
            t.ensure_named_exists(Catalog::ProductStatus, new.status_id)?;
            if let Some(group_id) = new.shipping_group_id {
                t.group_row(group_id)?;
            }
            let row = ProductRow {
                id: Uuid::new_v4(),
                description: new.description,
                shipping_label: new.shipping_label,
                purchase_price: new.purchase_price,
                sale_price: new.sale_price,
                location_id: new.location_id,
                status_id: new.status_id,
                shipping_group_id: new.shipping_group_id,
            };
            t.products.push(row.clone());
            t.product_view(&row)
        })
        .await
    }

    async fn update_product(&self, tenant_id: Uuid, id: Uuid, patch: ProductPatch) -> StoreResult<Product> {
        self.write(tenant_id, |t| {
            t.product_row(id)?;
            if let Some(location_id) = patch.location_id {
                t.ensure_named_exists(Catalog::Location, location_id)?;
            }
            if let Some(status_id) = patch.status_id {
                t.ensure_named_exists(Catalog::ProductStatus, status_id)?;
            }
            if let Some(Some(group_id)) = patch.shipping_group_id {
                t.group_row(group_id)?;
            }
            let row = t.products.iter_mut().find(|p| p.id == id).ok_or(StoreError::NotFound(Entity::Product))?;
            if let Some(description) = patch.description {
                row.description = description;
            }
            if let Some(label) = patch.shipping_label {
                row.shipping_label = label;
            }
            if let Some(purchase_price) = patch.purchase_price {
                row.purchase_price = purchase_price;
            }
            if let Some(sale_price) = patch.sale_price {
                row.sale_price = sale_price;
            }
            if let Some(location_id) = patch.location_id {
                row.location_id = location_id;
            }
            if let Some(status_id) = patch.status_id {
                row.status_id = status_id;
            }
            if let Some(group_id) = patch.shipping_group_id {
                row.shipping_group_id = group_id;
            }
            let row = row.clone();
            t.product_view(&row)
        })
        .await
    }

    async fn set_sale_price(
        &self,
        tenant_id: Uuid,
        shipping_group_id: Uuid,
        shipping_label: &str,
        sale_price: Money,
    ) -> StoreResult<Product> {
        self.write(tenant_id, |t| {
            let row = t
                .products
                .iter_mut()
                .find(|p| p.shipping_group_id == Some(shipping_group_id) && p.shipping_label == shipping_label)
                .ok_or(StoreError::NotFound(Entity::Product))?;
            row.sale_price = Some(sale_price);
            let row = row.clone();
            t.product_view(&row)
        })
        .await
    }

    async fn delete_product(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<()> {
        self.write(tenant_id, |t| {
            t.product_row(id)?;
            if t.invoice_products.iter().any(|(_, p)| *p == id) {
                return Err(StoreError::InUse(Entity::Product));
            }
            t.products.retain(|p| p.id != id);
            Ok(())
        })
        .await
    }

    async fn priced_products(&self, tenant_id: Uuid, filter: &ProductFilter) -> StoreResult<Vec<PricedRow>> {
        self.read(tenant_id, |t| {
            let mut rows = Vec::new();
            for row in &t.products {
                if filter.id.is_some_and(|id| id != row.id) {
                    continue;
                }
                if filter.shipping_label.as_deref().is_some_and(|label| label != row.shipping_label) {
                    continue;
                }
                let product = t.product_view(row)?;
                if let Some(group_name) = &filter.shipping_group {
                    if product.shipping_group.as_ref() != Some(group_name) {
                        continue;
                    }
                }
                let group = match row.shipping_group_id {
                    Some(group_id) => {
                        let g = t.group_row(group_id)?;
                        let terms = ShippingTerms::new(
                            g.shipping_cost.inner().clone(),
                            g.dollar_price.clone(),
                            g.tax_rate.clone(),
                        );
                        Some((terms, t.group_aggregate(group_id)))
                    }
                    None => None,
                };
                rows.push(PricedRow { product, group });
            }
            rows.sort_by(|a, b| {
                a.product.shipping_label.cmp(&b.product.shipping_label).then(a.product.id.cmp(&b.product.id))
            });
            Ok(rows)
        })
        .await
    }

    async fn pricing_snapshot(&self, tenant_id: Uuid, shipping_group_id: Uuid) -> StoreResult<GroupSnapshot> {
        self.read(tenant_id, |t| {
            let group = t.group_view(t.group_row(shipping_group_id)?)?;
            let mut items = t
                .products
                .iter()
                .filter(|p| p.shipping_group_id == Some(shipping_group_id))
                .map(|p| t.product_view(p))
                .collect::<StoreResult<Vec<_>>>()?;
            items.sort_by(|a, b| a.shipping_label.cmp(&b.shipping_label).then(a.id.cmp(&b.id)));
            Ok(GroupSnapshot { group, items })
        })
        .await
    }

    async fn list_invoices(&self, tenant_id: Uuid) -> StoreResult<Vec<InvoiceSummary>> {
        self.read(tenant_id, |t| t.invoices.iter().map(|i| t.invoice_summary(i)).collect()).await
    }

    async fn get_invoice(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<InvoiceSummary> {
        self.read(tenant_id, |t| t.invoice_summary(t.invoice_row(id)?)).await
    }

    async fn create_invoice(&self, tenant_id: Uuid, new: NewInvoice) -> StoreResult<InvoiceSummary> {
        self.write(tenant_id, |t| {
            t.ensure_named_exists(Catalog::Seller, new.seller_id)?;
            for product_id in &new.product_ids {
                t.product_row(*product_id)?;
            }
            let row = InvoiceRow { id: Uuid::new_v4(), seller_id: new.seller_id, notes: new.notes, created_at: Utc::now() };
            let mut product_ids = new.product_ids;
            product_ids.dedup();
            for product_id in product_ids {
                if !t.invoice_products.contains(&(row.id, product_id)) {
                    t.invoice_products.push((row.id, product_id));
                }
            }
            if let Some(payment) = new.payment {
                t.payments.push(InvoicePayment {
                    id: Uuid::new_v4(),
                    invoice_id: row.id,
                    amount: payment.amount,
                    payment_date: payment.payment_date,
                    payment_comment: payment.payment_comment,
                });
            }
            t.invoices.push(row.clone());
            t.invoice_summary(&row)
        })
        .await
    }

    async fn add_payment(&self, tenant_id: Uuid, invoice_id: Uuid, payment: NewPayment) -> StoreResult<InvoicePayment> {
        self.write(tenant_id, |t| {
            t.invoice_row(invoice_id)?;
            let payment = InvoicePayment {
                id: Uuid::new_v4(),
                invoice_id,
                amount: payment.amount,
                payment_date: payment.payment_date,
                payment_comment: payment.payment_comment,
            };
            t.payments.push(payment.clone());
            Ok(payment)
        })
        .await
    }

    async fn list_payments(&self, tenant_id: Uuid, invoice_id: Uuid) -> StoreResult<Vec<InvoicePayment>> {
        self.read(tenant_id, |t| {
            t.invoice_row(invoice_id)?;
            Ok(t.payments.iter().filter(|p| p.invoice_id == invoice_id).cloned().collect())
        })
        .await
    }

    async fn list_invoice_products(&self, tenant_id: Uuid, invoice_id: Uuid) -> StoreResult<Vec<Product>> {
        self.read(tenant_id, |t| {
            t.invoice_row(invoice_id)?;
            t.invoice_products
                .iter()
                .filter(|(inv, _)| *inv == invoice_id)
                .map(|(_, product_id)| t.product_view(t.product_row(*product_id)?))
                .collect()
        })
        .await
    }
}
