//! Product catalog reads and back-office product maintenance.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use crate::domain::aggregates::{derive_price, Product, ProductError, StockType};
use crate::domain::value_objects::group_code;
use crate::{Result, StoreError};

const FEATURED_LIMIT: i64 = 6;

pub async fn list_products(pool: &PgPool, category: Option<&str>) -> Result<Vec<Product>> {
    let products = match category.map(str::trim).filter(|c| !c.is_empty()) {
        Some(category) => {
            sqlx::query_as::<_, Product>(
                "SELECT * FROM products WHERE LOWER(category) = LOWER($1) ORDER BY created_at DESC",
            )
            .bind(category)
            .fetch_all(pool)
            .await?
        }
        None => sqlx::query_as::<_, Product>("SELECT * FROM products ORDER BY created_at DESC").fetch_all(pool).await?,
    };
    Ok(products)
}

/// Ready-to-ship, priced and in stock.
pub async fn featured_products(pool: &PgPool) -> Result<Vec<Product>> {
    let products = sqlx::query_as::<_, Product>(
        "SELECT * FROM products
         WHERE stock_type = 'pronta_entrega' AND cost_price IS NOT NULL AND stock_available > 0
         ORDER BY created_at DESC LIMIT $1",
    )
    .bind(FEATURED_LIMIT)
    .fetch_all(pool)
    .await?;
    Ok(products)
}

pub async fn get_product(pool: &PgPool, id: i32) -> Result<Product> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::ProductNotFound)
}

pub async fn products_by_ids(pool: &PgPool, ids: &[i32]) -> Result<Vec<Product>> {
    let products = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await?;
    Ok(products)
}

pub async fn categories(pool: &PgPool) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT DISTINCT category FROM products WHERE category IS NOT NULL AND category <> '' ORDER BY category",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(c,)| c).collect())
}

// =============================================================================
// Back-office
// =============================================================================

/// `Some(true)` keeps only products still waiting for a cost price,
/// `Some(false)` only priced ones.
pub async fn admin_list(pool: &PgPool, needs_attention: Option<bool>) -> Result<Vec<Product>> {
    let products = sqlx::query_as::<_, Product>(
        "SELECT * FROM products
         WHERE $1::BOOLEAN IS NULL OR (cost_price IS NULL) = $1
         ORDER BY created_at DESC",
    )
    .bind(needs_attention)
    .fetch_all(pool)
    .await?;
    Ok(products)
}

pub async fn admin_count(pool: &PgPool, needs_attention: Option<bool>) -> Result<i64> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM products WHERE $1::BOOLEAN IS NULL OR (cost_price IS NULL) = $1")
            .bind(needs_attention)
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// Product fields as submitted by the back-office. Stock counters left as
/// `None` are not touched on update.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProductDraft {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub group_code: Option<String>,
    pub sku: Option<String>,
    pub cost_price: Option<Decimal>,
    pub margin_percentage: Option<Decimal>,
    pub price: Option<Decimal>,
    pub image_url: Option<String>,
    pub supplier_url: Option<String>,
    pub stock_type: StockType,
    pub stock_available: Option<i32>,
    pub stock_distributor: Option<i32>,
}

impl ProductDraft {
    pub fn price(&self) -> Decimal {
        derive_price(self.cost_price, self.margin_percentage, self.price)
    }

    fn check(&self) -> std::result::Result<(), ProductError> {
        let negative = |n: Option<i32>| n.is_some_and(|n| n < 0);
        if negative(self.stock_available) || negative(self.stock_distributor) {
            return Err(ProductError::NegativeStock);
        }
        Ok(())
    }
}

pub async fn create_product(pool: &PgPool, draft: ProductDraft) -> Result<Product> {
    draft.check()?;
    let product = sqlx::query_as::<_, Product>(
        "INSERT INTO products (name, description, category, brand, group_code, sku, cost_price, margin_percentage,
                               price, image_url, supplier_url, stock_type, stock_available, stock_distributor)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
         RETURNING *",
    )
    .bind(&draft.name)
    .bind(&draft.description)
    .bind(&draft.category)
    .bind(&draft.brand)
    .bind(&draft.group_code)
    .bind(&draft.sku)
    .bind(draft.cost_price)
    .bind(draft.margin_percentage)
    .bind(draft.price())
    .bind(&draft.image_url)
    .bind(&draft.supplier_url)
    .bind(draft.stock_type.as_str())
    .bind(draft.stock_available.unwrap_or(0))
    .bind(draft.stock_distributor.unwrap_or(0))
    .fetch_one(pool)
    .await?;
    tracing::info!(product_id = product.id, "product created");
    Ok(product)
}

pub async fn update_product(pool: &PgPool, id: i32, draft: ProductDraft) -> Result<Product> {
    draft.check()?;
    sqlx::query_as::<_, Product>(
        "UPDATE products SET
             name = $2, description = $3, category = $4, brand = $5, group_code = $6, sku = $7,
             cost_price = $8, margin_percentage = $9, price = $10, image_url = $11, supplier_url = $12,
             stock_type = $13,
             stock_available = COALESCE($14, stock_available),
             stock_distributor = COALESCE($15, stock_distributor),
             updated_at = NOW()
         WHERE id = $1
         RETURNING *",
    )
    .bind(id)
    .bind(&draft.name)
    .bind(&draft.description)
    .bind(&draft.category)
    .bind(&draft.brand)
    .bind(&draft.group_code)
    .bind(&draft.sku)
    .bind(draft.cost_price)
    .bind(draft.margin_percentage)
    .bind(draft.price())
    .bind(&draft.image_url)
    .bind(&draft.supplier_url)
    .bind(draft.stock_type.as_str())
    .bind(draft.stock_available)
    .bind(draft.stock_distributor)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::ProductNotFound)
}

pub async fn delete_product(pool: &PgPool, id: i32) -> Result<()> {
    let result = sqlx::query("DELETE FROM products WHERE id = $1").bind(id).execute(pool).await.map_err(|e| {
        if super::is_foreign_key_violation(&e) {
            StoreError::Validation("Produto possui pedidos e não pode ser excluído".into())
        } else {
            e.into()
        }
    })?;
    if result.rows_affected() == 0 {
        return Err(StoreError::ProductNotFound);
    }
    tracing::info!(product_id = id, "product deleted");
    Ok(())
}

/// Stock intake from the back-office: prices the product and puts it on
/// the ready-to-ship channel.
#[derive(Clone, Debug, PartialEq)]
pub struct StockIntake {
    pub product_id: i32,
    pub cost_price: Option<Decimal>,
    pub margin_percentage: Option<Decimal>,
    pub stock_available: i32,
    pub image_url: Option<String>,
}

impl StockIntake {
    fn priced(&self) -> std::result::Result<(Decimal, Decimal, Decimal), ProductError> {
        let (Some(cost), Some(margin)) = (self.cost_price, self.margin_percentage) else {
            return Err(ProductError::MissingCostOrMargin);
        };
        if self.stock_available < 0 {
            return Err(ProductError::NegativeStock);
        }
        Ok((cost, margin, derive_price(Some(cost), Some(margin), None)))
    }
}

pub async fn receive_stock(pool: &PgPool, intake: StockIntake) -> Result<Product> {
    let (cost, margin, price) = intake.priced()?;
    sqlx::query_as::<_, Product>(
        "UPDATE products SET
             cost_price = $2, margin_percentage = $3, price = $4, stock_type = $5,
             stock_available = $6, image_url = COALESCE($7, image_url), updated_at = NOW()
         WHERE id = $1
         RETURNING *",
    )
    .bind(intake.product_id)
    .bind(cost)
    .bind(margin)
    .bind(price)
    .bind(StockType::ProntaEntrega.as_str())
    .bind(intake.stock_available)
    .bind(&intake.image_url)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::ProductNotFound)
}

// =============================================================================
// Distributor import
// =============================================================================

/// One row of the distributor spreadsheet, already split into columns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DistributorRow {
    pub code: Option<String>,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub stock: Option<Decimal>,
    pub image_urls: Option<String>,
    pub supplier_url: Option<String>,
}

/// A distributor row that can become a catalog entry.
#[derive(Clone, Debug, PartialEq)]
pub struct DistributorItem {
    pub sku: String,
    pub name: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub group_code: Option<String>,
    pub stock: i32,
    pub image_url: Option<String>,
    pub supplier_url: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl DistributorRow {
    /// Rows without a code or a description are skipped.
    pub fn into_item(self) -> Option<DistributorItem> {
        let sku = non_blank(self.code)?;
        let name = non_blank(self.description)?;
        let stock = self.stock.and_then(|s| s.trunc().to_i32()).unwrap_or(0).max(0);
        let image_url = self
            .image_urls
            .as_deref()
            .and_then(|urls| urls.split(['|', ',', ';']).map(str::trim).find(|u| !u.is_empty()))
            .map(str::to_string);
        Some(DistributorItem {
            group_code: group_code(&name),
            sku,
            name,
            brand: non_blank(self.brand),
            category: non_blank(self.category),
            stock,
            image_url,
            supplier_url: non_blank(self.supplier_url),
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
}

/// Refreshes distributor stock for known SKUs and adds the rest as
/// made-to-order products with no cost price, so they show up in the
/// back-office list of products needing attention.
pub async fn import_distributor(pool: &PgPool, rows: Vec<DistributorRow>) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();
    let mut tx = pool.begin().await?;
    for row in rows {
        let Some(item) = row.into_item() else {
            summary.skipped += 1;
            continue;
        };
        let updated = sqlx::query(
            "UPDATE products SET
                 stock_distributor = $2,
                 brand = COALESCE(brand, $3),
                 category = COALESCE(category, $4),
                 image_url = COALESCE(image_url, $5),
                 group_code = COALESCE(group_code, $6),
                 updated_at = NOW()
             WHERE sku = $1",
        )
        .bind(&item.sku)
        .bind(item.stock)
        .bind(&item.brand)
        .bind(&item.category)
        .bind(&item.image_url)
        .bind(&item.group_code)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() > 0 {
            summary.updated += 1;
            continue;
        }
        sqlx::query(
            "INSERT INTO products (name, category, brand, group_code, sku, price, image_url, supplier_url,
                                   stock_type, stock_available, stock_distributor)
             VALUES ($1, $2, $3, $4, $5, 0, $6, $7, $8, 0, $9)",
        )
        .bind(&item.name)
        .bind(&item.category)
        .bind(&item.brand)
        .bind(&item.group_code)
        .bind(&item.sku)
        .bind(&item.image_url)
        .bind(&item.supplier_url)
        .bind(StockType::SobEncomenda.as_str())
        .bind(item.stock)
        .execute(&mut *tx)
        .await?;
        summary.created += 1;
    }
    tx.commit().await?;
    tracing::info!(
        created = summary.created,
        updated = summary.updated,
        skipped = summary.skipped,
        "distributor import finished"
    );
    Ok(summary)
}

/// Derives group codes from product names. Without `force` only products
/// lacking a code are touched. Returns how many products changed.
pub async fn assign_group_codes(pool: &PgPool, force: bool) -> Result<u64> {
    let rows: Vec<(i32, String, Option<String>)> =
        sqlx::query_as("SELECT id, name, group_code FROM products ORDER BY id").fetch_all(pool).await?;
    let (ids, codes): (Vec<i32>, Vec<String>) = rows
        .into_iter()
        .filter(|(_, _, current)| force || current.as_deref().map_or(true, |c| c.trim().is_empty()))
        .filter_map(|(id, name, current)| {
            let code = group_code(&name)?;
            (current.as_deref() != Some(code.as_str())).then_some((id, code))
        })
        .unzip();
    if ids.is_empty() {
        return Ok(0);
    }
    let result = sqlx::query(
        "UPDATE products p SET group_code = v.code, updated_at = NOW()
         FROM UNNEST($1::INT[], $2::TEXT[]) AS v(id, code)
         WHERE p.id = v.id",
    )
    .bind(&ids)
    .bind(&codes)
    .execute(pool)
    .await?;
    tracing::info!(updated = result.rows_affected(), force, "group codes assigned");
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_price_prefers_cost_and_margin() {
        let draft = ProductDraft {
            name: "Whey".into(),
            cost_price: Some(Decimal::new(100, 0)),
            margin_percentage: Some(Decimal::new(50, 0)),
            price: Some(Decimal::new(999, 0)),
            ..Default::default()
        };
        assert_eq!(draft.price(), Decimal::new(150, 0));

        let draft = ProductDraft { cost_price: None, ..draft };
        assert_eq!(draft.price(), Decimal::new(999, 0));
    }

    #[test]
    fn test_draft_rejects_negative_stock() {
        let draft = ProductDraft { stock_distributor: Some(-1), ..Default::default() };
        assert!(matches!(draft.check(), Err(ProductError::NegativeStock)));
    }

    #[test]
    fn test_intake_requires_cost_and_margin() {
        let intake = StockIntake {
            product_id: 1, cost_price: Some(Decimal::TEN), margin_percentage: None, stock_available: 3, image_url: None,
        };
        assert!(matches!(intake.priced(), Err(ProductError::MissingCostOrMargin)));

        let intake = StockIntake { margin_percentage: Some(Decimal::new(20, 0)), ..intake };
        assert_eq!(intake.priced().unwrap().2, Decimal::new(12, 0));
    }

    #[test]
    fn test_distributor_row_without_code_is_skipped() {
        let row = DistributorRow { description: Some("Whey 900g".into()), ..Default::default() };
        assert_eq!(row.into_item(), None);
        let row = DistributorRow { code: Some("  ".into()), description: Some("Whey".into()), ..Default::default() };
        assert_eq!(row.into_item(), None);
        let row = DistributorRow { code: Some("A1".into()), ..Default::default() };
        assert_eq!(row.into_item(), None);
    }

    #[test]
    fn test_distributor_row_becomes_item() {
        let row = DistributorRow {
            code: Some(" 7891 ".into()),
            description: Some("Whey Protein 900g Morango".into()),
            brand: Some("Max".into()),
            category: Some("".into()),
            stock: Some(Decimal::new(125, 1)),
            image_urls: Some(" | https://img/1.jpg|https://img/2.jpg".into()),
            supplier_url: None,
        };
        let item = row.into_item().unwrap();
        assert_eq!(item.sku, "7891");
        assert_eq!(item.group_code.as_deref(), Some("WHEY_PROTEIN"));
        assert_eq!(item.stock, 12);
        assert_eq!(item.category, None);
        assert_eq!(item.image_url.as_deref(), Some("https://img/1.jpg"));
    }

    #[test]
    fn test_distributor_stock_is_never_negative() {
        let row = DistributorRow {
            code: Some("X".into()),
            description: Some("Creatina".into()),
            stock: Some(Decimal::new(-4, 0)),
            ..Default::default()
        };
        assert_eq!(row.into_item().unwrap().stock, 0);
        let row = DistributorRow { code: Some("X".into()), description: Some("Creatina".into()), ..Default::default() };
        assert_eq!(row.into_item().unwrap().stock, 0);
    }
}
