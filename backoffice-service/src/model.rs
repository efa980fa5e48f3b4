use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use common_money::Money;
use common_pricing::{ItemPrices, PricingBreakdown, ShippingTerms};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Record types that are nothing more than a tenant-unique name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Catalog {
    Seller,
    Shipper,
    Location,
    ProductStatus,
}

impl Catalog {
    pub fn table(&self) -> &'static str {
        match self {
            Catalog::Seller => "sellers",
            Catalog::Shipper => "shippers",
            Catalog::Location => "locations",
            Catalog::ProductStatus => "product_statuses",
        }
    }

    pub fn entity(&self) -> Entity {
        match self {
            Catalog::Seller => Entity::Seller,
            Catalog::Shipper => Entity::Shipper,
            Catalog::Location => Entity::Location,
            Catalog::ProductStatus => Entity::ProductStatus,
        }
    }
}

/// Everything the store can report as missing, duplicated or still referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Seller,
    Shipper,
    Location,
    ProductStatus,
    ShippingStatus,
    ShippingGroup,
    Product,
    Invoice,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::Seller => "seller",
            Entity::Shipper => "shipper",
            Entity::Location => "location",
            Entity::ProductStatus => "product_status",
            Entity::ShippingStatus => "shipping_status",
            Entity::ShippingGroup => "shipping_group",
            Entity::Product => "product",
            Entity::Invoice => "invoice",
        }
    }

    pub fn not_found_code(&self) -> &'static str {
        match self {
            Entity::Seller => "seller_not_found",
            Entity::Shipper => "shipper_not_found",
            Entity::Location => "location_not_found",
            Entity::ProductStatus => "product_status_not_found",
            Entity::ShippingStatus => "shipping_status_not_found",
            Entity::ShippingGroup => "shipping_group_not_found",
            Entity::Product => "product_not_found",
            Entity::Invoice => "invoice_not_found",
        }
    }

    pub fn in_use_code(&self) -> &'static str {
        match self {
            Entity::Seller => "seller_in_use",
            Entity::Shipper => "shipper_in_use",
            Entity::Location => "location_in_use",
            Entity::ProductStatus => "product_status_in_use",
            Entity::ShippingStatus => "shipping_status_in_use",
            Entity::ShippingGroup => "shipping_group_in_use",
            Entity::Product => "product_in_use",
            Entity::Invoice => "invoice_in_use",
        }
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NamedRecord {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShippingStatus {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewShippingStatus {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct ShippingStatusPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl ShippingStatusPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShippingGroup {
    pub id: Uuid,
    pub name: String,
    pub shipper_id: Uuid,
    pub shipper: String,
    pub status_id: Uuid,
    pub status: String,
    pub shipping_cost: Money,
    pub dollar_price: BigDecimal,
    pub tax_rate: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShippingGroup {
    pub fn terms(&self) -> ShippingTerms {
        ShippingTerms::new(self.shipping_cost.inner().clone(), self.dollar_price.clone(), self.tax_rate.clone())
    }
}

#[derive(Debug, Clone)]
pub struct NewShippingGroup {
    pub name: String,
    pub shipper_id: Uuid,
    pub status_id: Uuid,
    pub shipping_cost: Money,
    pub dollar_price: BigDecimal,
    pub tax_rate: BigDecimal,
}

#[derive(Debug, Clone, Default)]
pub struct ShippingGroupPatch {
    pub name: Option<String>,
    pub shipper_id: Option<Uuid>,
    pub status_id: Option<Uuid>,
    pub shipping_cost: Option<Money>,
    pub dollar_price: Option<BigDecimal>,
    pub tax_rate: Option<BigDecimal>,
}

impl ShippingGroupPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.shipper_id.is_none()
            && self.status_id.is_none()
            && self.shipping_cost.is_none()
            && self.dollar_price.is_none()
            && self.tax_rate.is_none()
    }
}

/// A product row with its references resolved to names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub description: String,
    pub shipping_label: String,
    pub purchase_price: Money,
    pub sale_price: Option<Money>,
    pub location_id: Uuid,
    pub location: String,
    pub status_id: Uuid,
    pub status: String,
    pub shipping_group_id: Option<Uuid>,
    pub shipping_group: Option<String>,
}

impl Product {
    pub fn prices(&self) -> ItemPrices {
        ItemPrices::new(
            self.purchase_price.inner().clone(),
            self.sale_price.as_ref().map(|s| s.inner().clone()),
        )
    }
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub description: String,
    pub shipping_label: String,
    pub purchase_price: Money,
    pub sale_price: Option<Money>,
    pub location_id: Uuid,
    pub status_id: Uuid,
    pub shipping_group_id: Option<Uuid>,
}

/// `Some(None)` on a nullable column clears it.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub description: Option<String>,
    pub shipping_label: Option<String>,
    pub purchase_price: Option<Money>,
    pub sale_price: Option<Option<Money>>,
    pub location_id: Option<Uuid>,
    pub status_id: Option<Uuid>,
    pub shipping_group_id: Option<Option<Uuid>>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.shipping_label.is_none()
            && self.purchase_price.is_none()
            && self.sale_price.is_none()
            && self.location_id.is_none()
            && self.status_id.is_none()
            && self.shipping_group_id.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProductFilter {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub shipping_group: Option<String>,
    #[serde(default)]
    pub shipping_label: Option<String>,
}

/// Live inputs of one product's pricing: its group's terms and aggregate
/// as read in the same statement as the product.
#[derive(Debug, Clone)]
pub struct PricedRow {
    pub product: Product,
    pub group: Option<(ShippingTerms, common_pricing::GroupAggregate)>,
}

/// A group and all of its member products from one consistent read.
#[derive(Debug, Clone)]
pub struct GroupSnapshot {
    pub group: ShippingGroup,
    pub items: Vec<Product>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    /// Absent for products outside any shipping group.
    pub pricing: Option<PricingBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupPricingView {
    pub group: ShippingGroup,
    pub item_count: u64,
    pub total_purchase_price: BigDecimal,
    pub items: Vec<ProductDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct InvoiceSummary {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub seller: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Sum of member sale prices; unpriced products count as zero.
    pub total_amount: Money,
    pub num_products: i64,
    pub num_payments: i64,
    pub total_paid: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct InvoicePayment {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub amount: Money,
    pub payment_date: NaiveDate,
    pub payment_comment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub amount: Money,
    pub payment_date: NaiveDate,
    pub payment_comment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub seller_id: Uuid,
    pub notes: Option<String>,
    pub product_ids: Vec<Uuid>,
    pub payment: Option<NewPayment>,
}
