use async_trait::async_trait;
use bigdecimal::BigDecimal;
use common_money::Money;
use common_pricing::{GroupAggregate, ShippingTerms};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::model::{
    Catalog, Entity, GroupSnapshot, InvoicePayment, InvoiceSummary, NamedRecord, NewInvoice, NewPayment, NewProduct,
    NewShippingGroup, NewShippingStatus, PricedRow, Product, ProductFilter, ProductPatch, ShippingGroup,
    ShippingGroupPatch, ShippingStatus, ShippingStatusPatch,
};

const GROUP_SELECT: &str = "SELECT g.id, g.name, g.shipper_id, sh.name AS shipper, g.status_id, st.name AS status, \
     g.shipping_cost, g.dollar_price, g.tax_rate, g.created_at, g.updated_at \
     FROM shipping_groups g \
     JOIN shippers sh ON sh.id = g.shipper_id \
     JOIN shipping_statuses st ON st.id = g.status_id";

const PRODUCT_SELECT: &str = "SELECT p.id, p.description, p.shipping_label, p.purchase_price, p.sale_price, \
     p.location_id, l.name AS location, p.status_id, ps.name AS status, \
     p.shipping_group_id, g.name AS shipping_group \
     FROM products p \
     JOIN locations l ON l.id = p.location_id \
     JOIN product_statuses ps ON ps.id = p.status_id \
     LEFT JOIN shipping_groups g ON g.id = p.shipping_group_id";

// Aggregate and member rows come from the same statement so they share a snapshot.
const PRICED_PRODUCTS: &str = "SELECT p.id, p.description, p.shipping_label, p.purchase_price, p.sale_price, \
     p.location_id, l.name AS location, p.status_id, ps.name AS status, \
     p.shipping_group_id, g.name AS shipping_group, \
     g.shipping_cost, g.dollar_price, g.tax_rate, agg.item_count, agg.total_purchase_price \
     FROM products p \
     JOIN locations l ON l.id = p.location_id \
     JOIN product_statuses ps ON ps.id = p.status_id \
     LEFT JOIN shipping_groups g ON g.id = p.shipping_group_id \
     LEFT JOIN ( \
         SELECT shipping_group_id, COUNT(*) AS item_count, SUM(purchase_price) AS total_purchase_price \
         FROM products WHERE tenant_id = $1 AND shipping_group_id IS NOT NULL \
         GROUP BY shipping_group_id \
     ) agg ON agg.shipping_group_id = p.shipping_group_id \
     WHERE p.tenant_id = $1 \
       AND ($2::uuid IS NULL OR p.id = $2) \
       AND ($3::text IS NULL OR g.name = $3) \
       AND ($4::text IS NULL OR p.shipping_label = $4) \
     ORDER BY p.shipping_label, p.id";

const INVOICE_SELECT: &str = "SELECT i.id, i.seller_id, se.name AS seller, i.notes, i.created_at, \
     COALESCE(d.total_amount, 0)::NUMERIC(12,2) AS total_amount, \
     COALESCE(d.num_products, 0) AS num_products, \
     COALESCE(pay.num_payments, 0) AS num_payments, \
     COALESCE(pay.total_paid, 0)::NUMERIC(12,2) AS total_paid \
     FROM invoices i \
     JOIN sellers se ON se.id = i.seller_id \
     LEFT JOIN ( \
         SELECT d.invoice_id, SUM(COALESCE(p.sale_price, 0)) AS total_amount, COUNT(*) AS num_products \
         FROM invoice_details d JOIN products p ON p.id = d.product_id \
         GROUP BY d.invoice_id \
     ) d ON d.invoice_id = i.id \
     LEFT JOIN ( \
         SELECT invoice_id, COUNT(*) AS num_payments, SUM(amount) AS total_paid \
         FROM invoice_payments GROUP BY invoice_id \
     ) pay ON pay.invoice_id = i.id \
     WHERE i.tenant_id = $1 AND ($2::uuid IS NULL OR i.id = $2) \
     ORDER BY i.created_at, i.id";

/// Translate constraint violations into store errors for `entity`.
fn map_db_err(err: sqlx::Error, entity: Entity, name: Option<&str>) -> StoreError {
    if let Some(db) = err.as_database_error() {
        if db.is_unique_violation() {
            return StoreError::Duplicate { entity, name: name.unwrap_or_default().to_string() };
        }
        if db.is_foreign_key_violation() {
            return StoreError::InUse(entity);
        }
    }
    StoreError::Database(err)
}

fn found<T>(row: Option<T>, entity: Entity) -> StoreResult<T> {
    row.ok_or(StoreError::NotFound(entity))
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn require_named(&self, tenant_id: Uuid, catalog: Catalog, id: Uuid) -> StoreResult<()> {
        self.get_named(tenant_id, catalog, id).await.map(|_| ())
    }

    async fn fetch_group(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<ShippingGroup> {
        let sql = format!("{GROUP_SELECT} WHERE g.tenant_id = $1 AND g.id = $2");
        let row = sqlx::query_as::<_, ShippingGroup>(&sql).bind(tenant_id).bind(id).fetch_optional(&self.pool).await?;
        found(row, Entity::ShippingGroup)
    }

    async fn fetch_product(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<Product> {
        let sql = format!("{PRODUCT_SELECT} WHERE p.tenant_id = $1 AND p.id = $2");
        let row = sqlx::query_as::<_, Product>(&sql).bind(tenant_id).bind(id).fetch_optional(&self.pool).await?;
        found(row, Entity::Product)
    }

    async fn fetch_invoice(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<InvoiceSummary> {
        let row = sqlx::query_as::<_, InvoiceSummary>(INVOICE_SELECT)
            .bind(tenant_id)
            .bind(Some(id))
            .fetch_optional(&self.pool)
            .await?;
        found(row, Entity::Invoice)
    }

    async fn require_invoice(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<()> {
        let exists = sqlx::query("SELECT 1 FROM invoices WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        found(exists, Entity::Invoice).map(|_| ())
    }

    async fn insert_payment(
        tx: &mut Transaction<'_, Postgres>,
        invoice_id: Uuid,
        payment: NewPayment,
    ) -> StoreResult<InvoicePayment> {
        let payment = sqlx::query_as::<_, InvoicePayment>(
            "INSERT INTO invoice_payments (id, invoice_id, amount, payment_date, payment_comment) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, invoice_id, amount, payment_date, payment_comment",
        )
        .bind(Uuid::new_v4())
        .bind(invoice_id)
        .bind(payment.amount)
        .bind(payment.payment_date)
        .bind(payment.payment_comment)
        .fetch_one(&mut **tx)
        .await?;
        Ok(payment)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn list_named(&self, tenant_id: Uuid, catalog: Catalog) -> StoreResult<Vec<NamedRecord>> {
        let sql = format!("SELECT id, name FROM {} WHERE tenant_id = $1 ORDER BY name", catalog.table());
        Ok(sqlx::query_as::<_, NamedRecord>(&sql).bind(tenant_id).fetch_all(&self.pool).await?)
    }

    async fn get_named(&self, tenant_id: Uuid, catalog: Catalog, id: Uuid) -> StoreResult<NamedRecord> {
        let sql = format!("SELECT id, name FROM {} WHERE tenant_id = $1 AND id = $2", catalog.table());
        let row = sqlx::query_as::<_, NamedRecord>(&sql).bind(tenant_id).bind(id).fetch_optional(&self.pool).await?;
        found(row, catalog.entity())
    }

    async fn find_named(&self, tenant_id: Uuid, catalog: Catalog, name: &str) -> StoreResult<NamedRecord> {
        let sql = format!("SELECT id, name FROM {} WHERE tenant_id = $1 AND name = $2", catalog.table());
        let row = sqlx::query_as::<_, NamedRecord>(&sql).bind(tenant_id).bind(name).fetch_optional(&self.pool).await?;
        found(row, catalog.entity())
    }

    async fn create_named(&self, tenant_id: Uuid, catalog: Catalog, name: &str) -> StoreResult<NamedRecord> {
        let sql = format!("INSERT INTO {} (id, tenant_id, name) VALUES ($1, $2, $3) RETURNING id, name", catalog.table());
        sqlx::query_as::<_, NamedRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(tenant_id)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_err(e, catalog.entity(), Some(name)))
    }

    async fn rename_named(&self, tenant_id: Uuid, catalog: Catalog, id: Uuid, name: &str) -> StoreResult<NamedRecord> {
        let sql = format!("UPDATE {} SET name = $3 WHERE tenant_id = $1 AND id = $2 RETURNING id, name", catalog.table());
        let row = sqlx::query_as::<_, NamedRecord>(&sql)
            .bind(tenant_id)
            .bind(id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_err(e, catalog.entity(), Some(name)))?;
        found(row, catalog.entity())
    }

    async fn delete_named(&self, tenant_id: Uuid, catalog: Catalog, id: Uuid) -> StoreResult<()> {
        let sql = format!("DELETE FROM {} WHERE tenant_id = $1 AND id = $2", catalog.table());
        let result = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_err(e, catalog.entity(), None))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(catalog.entity()));
        }
        Ok(())
    }

    async fn list_shipping_statuses(&self, tenant_id: Uuid) -> StoreResult<Vec<ShippingStatus>> {
        Ok(sqlx::query_as::<_, ShippingStatus>(
            "SELECT id, name, description, created_at, updated_at FROM shipping_statuses WHERE tenant_id = $1 ORDER BY name",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_shipping_status(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<ShippingStatus> {
        let row = sqlx::query_as::<_, ShippingStatus>(
            "SELECT id, name, description, created_at, updated_at FROM shipping_statuses WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        found(row, Entity::ShippingStatus)
    }

    async fn find_shipping_status(&self, tenant_id: Uuid, name: &str) -> StoreResult<ShippingStatus> {
        let row = sqlx::query_as::<_, ShippingStatus>(
            "SELECT id, name, description, created_at, updated_at FROM shipping_statuses WHERE tenant_id = $1 AND name = $2",
        )
        .bind(tenant_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        found(row, Entity::ShippingStatus)
    }

    async fn create_shipping_status(&self, tenant_id: Uuid, new: NewShippingStatus) -> StoreResult<ShippingStatus> {
        sqlx::query_as::<_, ShippingStatus>(
            "INSERT INTO shipping_statuses (id, tenant_id, name, description) VALUES ($1, $2, $3, $4) \
             RETURNING id, name, description, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(&new.name)
        .bind(&new.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_err(e, Entity::ShippingStatus, Some(&new.name)))
    }

    async fn update_shipping_status(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        patch: ShippingStatusPatch,
    ) -> StoreResult<ShippingStatus> {
        let row = sqlx::query_as::<_, ShippingStatus>(
            "UPDATE shipping_statuses SET name = COALESCE($3, name), description = COALESCE($4, description), \
             updated_at = NOW() WHERE tenant_id = $1 AND id = $2 \
             RETURNING id, name, description, created_at, updated_at",
        )
        .bind(tenant_id)
        .bind(id)
        .bind(patch.name.as_deref())
        .bind(patch.description.as_deref())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_db_err(e, Entity::ShippingStatus, patch.name.as_deref()))?;
        found(row, Entity::ShippingStatus)
    }

    async fn delete_shipping_status(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM shipping_statuses WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_err(e, Entity::ShippingStatus, None))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(Entity::ShippingStatus));
        }
        Ok(())
    }

    async fn list_shipping_groups(&self, tenant_id: Uuid) -> StoreResult<Vec<ShippingGroup>> {
        let sql = format!("{GROUP_SELECT} WHERE g.tenant_id = $1 ORDER BY g.name");
        Ok(sqlx::query_as::<_, ShippingGroup>(&sql).bind(tenant_id).fetch_all(&self.pool).await?)
    }

    async fn get_shipping_group(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<ShippingGroup> {
        self.fetch_group(tenant_id, id).await
    }

    async fn find_shipping_group(&self, tenant_id: Uuid, name: &str) -> StoreResult<ShippingGroup> {
        let sql = format!("{GROUP_SELECT} WHERE g.tenant_id = $1 AND g.name = $2");
        let row = sqlx::query_as::<_, ShippingGroup>(&sql).bind(tenant_id).bind(name).fetch_optional(&self.pool).await?;
        found(row, Entity::ShippingGroup)
    }

    async fn create_shipping_group(&self, tenant_id: Uuid, new: NewShippingGroup) -> StoreResult<ShippingGroup> {
        self.require_named(tenant_id, Catalog::Shipper, new.shipper_id).await?;
        self.get_shipping_status(tenant_id, new.status_id).await?;
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO shipping_groups (id, tenant_id, name, shipper_id, status_id, shipping_cost, dollar_price, tax_rate) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(&new.name)
        .bind(new.shipper_id)
        .bind(new.status_id)
        .bind(new.shipping_cost)
        .bind(new.dollar_price)
        .bind(new.tax_rate)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err(e, Entity::ShippingGroup, Some(&new.name)))?;
        self.fetch_group(tenant_id, id).await
    }

    async fn update_shipping_group(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        patch: ShippingGroupPatch,
    ) -> StoreResult<ShippingGroup> {
        if let Some(shipper_id) = patch.shipper_id {
            self.require_named(tenant_id, Catalog::Shipper, shipper_id).await?;
        }
        if let Some(status_id) = patch.status_id {
            self.get_shipping_status(tenant_id, status_id).await?;
        }
        let updated = sqlx::query(
            "UPDATE shipping_groups SET name = COALESCE($3, name), shipper_id = COALESCE($4, shipper_id), \
             status_id = COALESCE($5, status_id), shipping_cost = COALESCE($6, shipping_cost), \
             dollar_price = COALESCE($7, dollar_price), tax_rate = COALESCE($8, tax_rate), updated_at = NOW() \
             WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(id)
        .bind(patch.name.as_deref())
        .bind(patch.shipper_id)
        .bind(patch.status_id)
        .bind(patch.shipping_cost)
        .bind(patch.dollar_price)
        .bind(patch.tax_rate)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err(e, Entity::ShippingGroup, patch.name.as_deref()))?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound(Entity::ShippingGroup));
        }
        self.fetch_group(tenant_id, id).await
    }

    async fn delete_shipping_group(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM shipping_groups WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_err(e, Entity::ShippingGroup, None))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(Entity::ShippingGroup));
        }
        Ok(())
    }

    async fn create_product(&self, tenant_id: Uuid, new: NewProduct) -> StoreResult<Product> {
        self.require_named(tenant_id, Catalog::Location, new.location_id).await?;
        self.require_named(tenant_id, Catalog::ProductStatus, new.status_id).await?;
        if let Some(group_id) = new.shipping_group_id {
            self.fetch_group(tenant_id, group_id).await?;
        }
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO products (id, tenant_id, description, shipping_label, purchase_price, sale_price, \
             location_id, status_id, shipping_group_id) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(new.description)
        .bind(new.shipping_label)
        .bind(new.purchase_price)
        .bind(new.sale_price)
        .bind(new.location_id)
        .bind(new.status_id)
        .bind(new.shipping_group_id)
        .execute(&self.pool)
        .await?;
        self.fetch_product(tenant_id, id).await
    }

    async fn update_product(&self, tenant_id: Uuid, id: Uuid, patch: ProductPatch) -> StoreResult<Product> {
        if let Some(location_id) = patch.location_id {
            self.require_named(tenant_id, Catalog::Location, location_id).await?;
        }
        if let Some(status_id) = patch.status_id {
            self.require_named(tenant_id, Catalog::ProductStatus, status_id).await?;
        }
        if let Some(Some(group_id)) = patch.shipping_group_id {
            self.fetch_group(tenant_id, group_id).await?;
        }
        // Nullable columns carry a "was supplied" flag so they can be cleared.
        let updated = sqlx::query(
            "UPDATE products SET description = COALESCE($3, description), \
             shipping_label = COALESCE($4, shipping_label), purchase_price = COALESCE($5, purchase_price), \
             sale_price = CASE WHEN $6 THEN $7 ELSE sale_price END, \
             location_id = COALESCE($8, location_id), status_id = COALESCE($9, status_id), \
             shipping_group_id = CASE WHEN $10 THEN $11 ELSE shipping_group_id END \
             WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(id)
        .bind(patch.description)
        .bind(patch.shipping_label)
        .bind(patch.purchase_price)
        .bind(patch.sale_price.is_some())
        .bind(patch.sale_price.flatten())
        .bind(patch.location_id)
        .bind(patch.status_id)
        .bind(patch.shipping_group_id.is_some())
        .bind(patch.shipping_group_id.flatten())
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound(Entity::Product));
        }
        self.fetch_product(tenant_id, id).await
    }

    async fn set_sale_price(
        &self,
        tenant_id: Uuid,
        shipping_group_id: Uuid,
        shipping_label: &str,
        sale_price: Money,
    ) -> StoreResult<Product> {
        let row = sqlx::query(
            "UPDATE products SET sale_price = $4 \
             WHERE tenant_id = $1 AND shipping_group_id = $2 AND shipping_label = $3 RETURNING id",
        )
        .bind(tenant_id)
        .bind(shipping_group_id)
        .bind(shipping_label)
        .bind(sale_price)
        .fetch_optional(&self.pool)
        .await?;
        let id: Uuid = found(row, Entity::Product)?.try_get("id")?;
        self.fetch_product(tenant_id, id).await
    }

    async fn delete_product(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_err(e, Entity::Product, None))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(Entity::Product));
        }
        Ok(())
    }

    async fn priced_products(&self, tenant_id: Uuid, filter: &ProductFilter) -> StoreResult<Vec<PricedRow>> {
        let rows = sqlx::query(PRICED_PRODUCTS)
            .bind(tenant_id)
            .bind(filter.id)
            .bind(filter.shipping_group.as_deref())
            .bind(filter.shipping_label.as_deref())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| -> StoreResult<PricedRow> {
                let product = Product::from_row(&row)?;
                let shipping_cost: Option<BigDecimal> = row.try_get("shipping_cost")?;
                let dollar_price: Option<BigDecimal> = row.try_get("dollar_price")?;
                let tax_rate: Option<BigDecimal> = row.try_get("tax_rate")?;
                let item_count: Option<i64> = row.try_get("item_count")?;
                let total: Option<BigDecimal> = row.try_get("total_purchase_price")?;
                let group = match (shipping_cost, dollar_price, tax_rate) {
                    (Some(cost), Some(dollar), Some(tax)) => Some((
                        ShippingTerms::new(cost, dollar, tax),
                        GroupAggregate::new(item_count.and_then(|n| u64::try_from(n).ok()).unwrap_or(0), total),
                    )),
                    _ => None,
                };
                Ok(PricedRow { product, group })
            })
            .collect()
    }

    async fn pricing_snapshot(&self, tenant_id: Uuid, shipping_group_id: Uuid) -> StoreResult<GroupSnapshot> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY").execute(&mut *tx).await?;
        let group_sql = format!("{GROUP_SELECT} WHERE g.tenant_id = $1 AND g.id = $2");
        let group = sqlx::query_as::<_, ShippingGroup>(&group_sql)
            .bind(tenant_id)
            .bind(shipping_group_id)
            .fetch_optional(&mut *tx)
            .await?;
        let group = found(group, Entity::ShippingGroup)?;
        let items_sql =
            format!("{PRODUCT_SELECT} WHERE p.tenant_id = $1 AND p.shipping_group_id = $2 ORDER BY p.shipping_label, p.id");
        let items = sqlx::query_as::<_, Product>(&items_sql)
            .bind(tenant_id)
            .bind(shipping_group_id)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(GroupSnapshot { group, items })
    }

    async fn list_invoices(&self, tenant_id: Uuid) -> StoreResult<Vec<InvoiceSummary>> {
        Ok(sqlx::query_as::<_, InvoiceSummary>(INVOICE_SELECT)
            .bind(tenant_id)
            .bind(None::<Uuid>)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_invoice(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<InvoiceSummary> {
        self.fetch_invoice(tenant_id, id).await
    }

    async fn create_invoice(&self, tenant_id: Uuid, new: NewInvoice) -> StoreResult<InvoiceSummary> {
        self.require_named(tenant_id, Catalog::Seller, new.seller_id).await?;
        let mut tx = self.pool.begin().await?;
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO invoices (id, tenant_id, seller_id, notes) VALUES ($1, $2, $3, $4)")
            .bind(id)
            .bind(tenant_id)
            .bind(new.seller_id)
            .bind(new.notes)
            .execute(&mut *tx)
            .await?;
        for product_id in new.product_ids {
            let owned = sqlx::query("SELECT 1 FROM products WHERE tenant_id = $1 AND id = $2")
                .bind(tenant_id)
                .bind(product_id)
                .fetch_optional(&mut *tx)
                .await?;
            found(owned, Entity::Product)?;
            sqlx::query(
                "INSERT INTO invoice_details (id, invoice_id, product_id) VALUES ($1, $2, $3) \
                 ON CONFLICT (invoice_id, product_id) DO NOTHING",
            )
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(product_id)
            .execute(&mut *tx)
            .await?;
        }
        if let Some(payment) = new.payment {
            Self::insert_payment(&mut tx, id, payment).await?;
        }
        tx.commit().await?;
        self.fetch_invoice(tenant_id, id).await
    }

    async fn add_payment(&self, tenant_id: Uuid, invoice_id: Uuid, payment: NewPayment) -> StoreResult<InvoicePayment> {
        self.require_invoice(tenant_id, invoice_id).await?;
        let mut tx = self.pool.begin().await?;
        let payment = Self::insert_payment(&mut tx, invoice_id, payment).await?;
        tx.commit().await?;
        Ok(payment)
    }

    async fn list_payments(&self, tenant_id: Uuid, invoice_id: Uuid) -> StoreResult<Vec<InvoicePayment>> {
        self.require_invoice(tenant_id, invoice_id).await?;
        Ok(sqlx::query_as::<_, InvoicePayment>(
            "SELECT id, invoice_id, amount, payment_date, payment_comment FROM invoice_payments \
             WHERE invoice_id = $1 ORDER BY payment_date, created_at",
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_invoice_products(&self, tenant_id: Uuid, invoice_id: Uuid) -> StoreResult<Vec<Product>> {
        self.require_invoice(tenant_id, invoice_id).await?;
        let sql = format!(
            "{PRODUCT_SELECT} JOIN invoice_details d ON d.product_id = p.id \
             WHERE p.tenant_id = $1 AND d.invoice_id = $2 ORDER BY p.shipping_label, p.id"
        );
        Ok(sqlx::query_as::<_, Product>(&sql).bind(tenant_id).bind(invoice_id).fetch_all(&self.pool).await?)
    }
}
