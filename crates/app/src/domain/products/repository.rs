//! Products Repository

use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as};
use storefront::tiers::{SubscriptionTier, TierPrice};
use uuid::Uuid;

use crate::{
    database::{from_bigint, parse_column, to_bigint},
    domain::products::records::{ProductRecord, ProductUuid, TierPrices},
};

const LIST_PRODUCTS_SQL: &str = include_str!("sql/list_products.sql");
const GET_PRODUCT_SQL: &str = include_str!("sql/get_product.sql");
const GET_PRODUCT_BY_SLUG_SQL: &str = include_str!("sql/get_product_by_slug.sql");
const GET_PRODUCTS_BY_UUIDS_SQL: &str = include_str!("sql/get_products_by_uuids.sql");
const LIST_PRODUCT_PRICES_SQL: &str = include_str!("sql/list_product_prices.sql");
const CREATE_PRODUCT_SQL: &str = include_str!("sql/create_product.sql");
const UPDATE_PRODUCT_SQL: &str = include_str!("sql/update_product.sql");
const DELETE_PRODUCT_SQL: &str = include_str!("sql/delete_product.sql");
const CREATE_PRODUCT_PRICE_SQL: &str = include_str!("sql/create_product_price.sql");
const DELETE_PRODUCT_PRICES_SQL: &str = include_str!("sql/delete_product_prices.sql");

/// Product row fields, as written by the caller.
pub(crate) struct ProductFields<'a> {
    pub name: &'a str,
    pub slug: &'a str,
    pub description: &'a str,
    pub image_url: Option<&'a str>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct PgProductsRepository;

impl PgProductsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn list_products(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        include_inactive: bool,
    ) -> Result<Vec<ProductRecord>, sqlx::Error> {
        let products = query_as::<Postgres, ProductRecord>(LIST_PRODUCTS_SQL)
            .bind(include_inactive)
            .fetch_all(&mut **tx)
            .await?;

        self.attach_prices(tx, products).await
    }

    pub(crate) async fn get_product(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
    ) -> Result<ProductRecord, sqlx::Error> {
        let product = query_as::<Postgres, ProductRecord>(GET_PRODUCT_SQL)
            .bind(product.into_uuid())
            .fetch_one(&mut **tx)
            .await?;

        self.attach_prices_one(tx, product).await
    }

    pub(crate) async fn get_product_by_slug(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        slug: &str,
    ) -> Result<ProductRecord, sqlx::Error> {
        let product = query_as::<Postgres, ProductRecord>(GET_PRODUCT_BY_SLUG_SQL)
            .bind(slug)
            .fetch_one(&mut **tx)
            .await?;

        self.attach_prices_one(tx, product).await
    }

    /// Products with the given uuids, including inactive and deleted ones.
    pub(crate) async fn get_products_by_uuids(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        products: &[ProductUuid],
    ) -> Result<Vec<ProductRecord>, sqlx::Error> {
        let uuids: Vec<Uuid> = products.iter().map(|uuid| uuid.into_uuid()).collect();

        let products = query_as::<Postgres, ProductRecord>(GET_PRODUCTS_BY_UUIDS_SQL)
            .bind(uuids)
            .fetch_all(&mut **tx)
            .await?;

        self.attach_prices(tx, products).await
    }

    pub(crate) async fn create_product(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
        fields: ProductFields<'_>,
        prices: &[TierPrice],
    ) -> Result<ProductRecord, sqlx::Error> {
        let mut created = query_as::<Postgres, ProductRecord>(CREATE_PRODUCT_SQL)
            .bind(product.into_uuid())
            .bind(fields.name)
            .bind(fields.slug)
            .bind(fields.description)
            .bind(fields.image_url)
            .bind(fields.is_active)
            .fetch_one(&mut **tx)
            .await?;

        created.prices = self.replace_prices(tx, product, prices).await?;

        Ok(created)
    }

    pub(crate) async fn update_product(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
        fields: ProductFields<'_>,
        prices: &[TierPrice],
    ) -> Result<ProductRecord, sqlx::Error> {
        let mut updated = query_as::<Postgres, ProductRecord>(UPDATE_PRODUCT_SQL)
            .bind(product.into_uuid())
            .bind(fields.name)
            .bind(fields.slug)
            .bind(fields.description)
            .bind(fields.image_url)
            .bind(fields.is_active)
            .fetch_one(&mut **tx)
            .await?;

        updated.prices = self.replace_prices(tx, product, prices).await?;

        Ok(updated)
    }

    pub(crate) async fn delete_product(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(DELETE_PRODUCT_SQL)
            .bind(product.into_uuid())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    async fn replace_prices(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
        prices: &[TierPrice],
    ) -> Result<TierPrices, sqlx::Error> {
        query(DELETE_PRODUCT_PRICES_SQL)
            .bind(product.into_uuid())
            .execute(&mut **tx)
            .await?;

        for price in prices {
            query(CREATE_PRODUCT_PRICE_SQL)
                .bind(product.into_uuid())
                .bind(price.tier.as_str())
                .bind(to_bigint("price", price.price)?)
                .execute(&mut **tx)
                .await?;
        }

        Ok(prices.iter().copied().collect())
    }

    async fn attach_prices_one(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductRecord,
    ) -> Result<ProductRecord, sqlx::Error> {
        self.attach_prices(tx, vec![product])
            .await?
            .pop()
            .ok_or(sqlx::Error::RowNotFound)
    }

    async fn attach_prices(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        mut products: Vec<ProductRecord>,
    ) -> Result<Vec<ProductRecord>, sqlx::Error> {
        if products.is_empty() {
            return Ok(products);
        }

        let uuids: Vec<Uuid> = products.iter().map(|p| p.uuid.into_uuid()).collect();

        let rows = query_as::<Postgres, PriceRow>(LIST_PRODUCT_PRICES_SQL)
            .bind(uuids)
            .fetch_all(&mut **tx)
            .await?;

        for row in rows {
            if let Some(product) = products
                .iter_mut()
                .find(|product| product.uuid.into_uuid() == row.product_uuid)
            {
                product.prices.push(row.price);
            }
        }

        for product in &mut products {
            product.prices.sort_by_key(|price| price.tier);
        }

        Ok(products)
    }
}

struct PriceRow {
    product_uuid: Uuid,
    price: TierPrice,
}

impl<'r> FromRow<'r, PgRow> for PriceRow {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let tier: SubscriptionTier = parse_column("tier", row.try_get("tier")?)?;

        Ok(Self {
            product_uuid: row.try_get("product_uuid")?,
            price: TierPrice {
                tier,
                price: from_bigint("price", row.try_get("price")?)?,
            },
        })
    }
}

impl<'r> FromRow<'r, PgRow> for ProductRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            uuid: ProductUuid::from_uuid(row.try_get("uuid")?),
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
            description: row.try_get("description")?,
            image_url: row.try_get("image_url")?,
            prices: TierPrices::new(),
            is_active: row.try_get("is_active")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
            deleted_at: row
                .try_get::<Option<SqlxTimestamp>, _>("deleted_at")?
                .map(SqlxTimestamp::to_jiff),
        })
    }
}
