//! Orders Repository

use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use rust_decimal::Decimal;
use rusty_money::iso;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as};
use storefront::{
    orders::{Entitlement, OrderStatus, PaymentMethod, PaymentStatus},
    tiers::SubscriptionTier,
};
use uuid::Uuid;

use crate::{
    auth::UserUuid,
    database::{from_bigint, parse_column, to_bigint},
    domain::{
        discounts::records::DiscountUuid,
        orders::records::{
            CryptoPaymentDetails, EntitlementRecord, EntitlementUuid, OrderDiscount,
            OrderItemRecord, OrderItemUuid, OrderRecord, OrderUuid, PaymentRecord, PaymentUuid,
        },
        products::records::ProductUuid,
    },
};

const CREATE_ORDER_SQL: &str = include_str!("sql/create_order.sql");
const GET_ORDER_SQL: &str = include_str!("sql/get_order.sql");
const GET_ORDER_FOR_USER_SQL: &str = include_str!("sql/get_order_for_user.sql");
const LOCK_ORDER_SQL: &str = include_str!("sql/lock_order.sql");
const LIST_ORDERS_FOR_USER_SQL: &str = include_str!("sql/list_orders_for_user.sql");
const UPDATE_ORDER_STATUS_SQL: &str = include_str!("sql/update_order_status.sql");
const CREATE_ORDER_ITEM_SQL: &str = include_str!("sql/create_order_item.sql");
const LIST_ORDER_ITEMS_SQL: &str = include_str!("sql/list_order_items.sql");
const CREATE_PAYMENT_SQL: &str = include_str!("sql/create_payment.sql");
const GET_PAYMENT_FOR_ORDER_SQL: &str = include_str!("sql/get_payment_for_order.sql");
const UPDATE_PAYMENT_SQL: &str = include_str!("sql/update_payment.sql");
const LIST_WATCHABLE_PAYMENTS_SQL: &str = include_str!("sql/list_watchable_payments.sql");
const CREATE_ENTITLEMENT_SQL: &str = include_str!("sql/create_entitlement.sql");
const LATEST_ENTITLEMENT_END_SQL: &str = include_str!("sql/latest_entitlement_end.sql");
const LIST_ACTIVE_ENTITLEMENTS_SQL: &str = include_str!("sql/list_active_entitlements.sql");

pub(crate) struct NewOrder<'a> {
    pub uuid: OrderUuid,
    pub user_uuid: UserUuid,
    pub subtotal: u64,
    pub discount: Option<(DiscountUuid, &'a str, u64)>,
    pub total: u64,
    pub currency: &'a str,
    pub payment_method: PaymentMethod,
}

pub(crate) struct NewOrderItem<'a> {
    pub product_uuid: ProductUuid,
    pub product_name: &'a str,
    pub tier: SubscriptionTier,
    pub unit_price: u64,
    pub quantity: u32,
}

pub(crate) struct NewPayment<'a> {
    pub uuid: PaymentUuid,
    pub order_uuid: OrderUuid,
    pub method: PaymentMethod,
    pub amount: u64,
    pub crypto: Option<&'a CryptoPaymentDetails>,
}

/// Columns changed by a payment update. `None` keeps the stored value.
#[derive(Debug, Default)]
pub(crate) struct PaymentChange {
    pub status: Option<PaymentStatus>,
    pub tx_hash: Option<String>,
    pub confirmations: u32,
    pub received_amount: Option<Decimal>,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct PgOrdersRepository;

impl PgOrdersRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn create_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: &NewOrder<'_>,
    ) -> Result<OrderRecord, sqlx::Error> {
        let (discount_uuid, discount_code, discount_amount) = match order.discount {
            Some((uuid, code, amount)) => (Some(uuid.into_uuid()), Some(code), amount),
            None => (None, None, 0),
        };

        query_as::<Postgres, OrderRecord>(CREATE_ORDER_SQL)
            .bind(order.uuid.into_uuid())
            .bind(order.user_uuid.into_uuid())
            .bind(OrderStatus::Pending.as_str())
            .bind(to_bigint("subtotal", order.subtotal)?)
            .bind(discount_uuid)
            .bind(discount_code)
            .bind(to_bigint("discount_amount", discount_amount)?)
            .bind(to_bigint("total", order.total)?)
            .bind(order.currency)
            .bind(order.payment_method.as_str())
            .bind(order.payment_method.asset().map(|asset| asset.as_str()))
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn create_order_item(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
        item: &NewOrderItem<'_>,
    ) -> Result<(), sqlx::Error> {
        query(CREATE_ORDER_ITEM_SQL)
            .bind(OrderItemUuid::new().into_uuid())
            .bind(order.into_uuid())
            .bind(item.product_uuid.into_uuid())
            .bind(item.product_name)
            .bind(item.tier.as_str())
            .bind(to_bigint("unit_price", item.unit_price)?)
            .bind(encode_count("quantity", item.quantity)?)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    pub(crate) async fn get_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
    ) -> Result<OrderRecord, sqlx::Error> {
        let order = query_as::<Postgres, OrderRecord>(GET_ORDER_SQL)
            .bind(order.into_uuid())
            .fetch_one(&mut **tx)
            .await?;

        self.attach_items_one(tx, order).await
    }

    pub(crate) async fn get_order_for_user(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
        order: OrderUuid,
    ) -> Result<OrderRecord, sqlx::Error> {
        let order = query_as::<Postgres, OrderRecord>(GET_ORDER_FOR_USER_SQL)
            .bind(order.into_uuid())
            .bind(user.into_uuid())
            .fetch_one(&mut **tx)
            .await?;

        self.attach_items_one(tx, order).await
    }

    /// Fetch an order and hold its row lock until the transaction ends.
    pub(crate) async fn lock_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
    ) -> Result<OrderRecord, sqlx::Error> {
        let order = query_as::<Postgres, OrderRecord>(LOCK_ORDER_SQL)
            .bind(order.into_uuid())
            .fetch_one(&mut **tx)
            .await?;

        self.attach_items_one(tx, order).await
    }

    pub(crate) async fn list_orders_for_user(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
    ) -> Result<Vec<OrderRecord>, sqlx::Error> {
        let orders = query_as::<Postgres, OrderRecord>(LIST_ORDERS_FOR_USER_SQL)
            .bind(user.into_uuid())
            .fetch_all(&mut **tx)
            .await?;

        self.attach_items(tx, orders).await
    }

    pub(crate) async fn update_order_status(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
        status: OrderStatus,
    ) -> Result<(), sqlx::Error> {
        let rows_affected = query(UPDATE_ORDER_STATUS_SQL)
            .bind(order.into_uuid())
            .bind(status.as_str())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }

    pub(crate) async fn create_payment(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        payment: &NewPayment<'_>,
    ) -> Result<PaymentRecord, sqlx::Error> {
        let required_confirmations = payment
            .crypto
            .map(|crypto| encode_count("required_confirmations", crypto.required_confirmations))
            .transpose()?;

        query_as::<Postgres, PaymentRecord>(CREATE_PAYMENT_SQL)
            .bind(payment.uuid.into_uuid())
            .bind(payment.order_uuid.into_uuid())
            .bind(payment.method.as_str())
            .bind(payment.method.asset().map(|asset| asset.as_str()))
            .bind(PaymentStatus::Pending.as_str())
            .bind(to_bigint("amount", payment.amount)?)
            .bind(payment.crypto.map(|crypto| crypto.address.as_str()))
            .bind(payment.crypto.map(|crypto| crypto.expected_amount))
            .bind(required_confirmations)
            .bind(payment.crypto.map(|crypto| SqlxTimestamp::from(crypto.expires_at)))
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn get_payment_for_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
    ) -> Result<PaymentRecord, sqlx::Error> {
        query_as::<Postgres, PaymentRecord>(GET_PAYMENT_FOR_ORDER_SQL)
            .bind(order.into_uuid())
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn update_payment(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        payment: &PaymentRecord,
        change: PaymentChange,
    ) -> Result<(), sqlx::Error> {
        let status = change.status.unwrap_or(payment.status);

        query(UPDATE_PAYMENT_SQL)
            .bind(payment.uuid.into_uuid())
            .bind(status.as_str())
            .bind(change.tx_hash)
            .bind(encode_count("confirmations", change.confirmations)?)
            .bind(change.received_amount)
            .bind(change.reference)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// Crypto payments on pending orders that have not settled yet.
    pub(crate) async fn list_watchable_payments(
        &self,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Vec<PaymentRecord>, sqlx::Error> {
        query_as::<Postgres, PaymentRecord>(LIST_WATCHABLE_PAYMENTS_SQL)
            .fetch_all(&mut **tx)
            .await
    }

    pub(crate) async fn create_entitlement(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
        order: OrderUuid,
        entitlement: &Entitlement,
    ) -> Result<(), sqlx::Error> {
        query(CREATE_ENTITLEMENT_SQL)
            .bind(EntitlementUuid::new().into_uuid())
            .bind(user.into_uuid())
            .bind(order.into_uuid())
            .bind(entitlement.product_uuid)
            .bind(entitlement.tier.as_str())
            .bind(SqlxTimestamp::from(entitlement.starts_at))
            .bind(entitlement.expires_at.map(SqlxTimestamp::from))
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// When the user's current access to a product runs out, if it runs out after `now`.
    pub(crate) async fn latest_entitlement_end(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
        product: ProductUuid,
        now: Timestamp,
    ) -> Result<Option<Timestamp>, sqlx::Error> {
        let row = query(LATEST_ENTITLEMENT_END_SQL)
            .bind(user.into_uuid())
            .bind(product.into_uuid())
            .bind(SqlxTimestamp::from(now))
            .fetch_one(&mut **tx)
            .await?;

        Ok(row
            .try_get::<Option<SqlxTimestamp>, _>("expires_at")?
            .map(SqlxTimestamp::to_jiff))
    }

    pub(crate) async fn list_active_entitlements(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
        now: Timestamp,
    ) -> Result<Vec<EntitlementRecord>, sqlx::Error> {
        query_as::<Postgres, EntitlementRecord>(LIST_ACTIVE_ENTITLEMENTS_SQL)
            .bind(user.into_uuid())
            .bind(SqlxTimestamp::from(now))
            .fetch_all(&mut **tx)
            .await
    }

    async fn attach_items_one(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderRecord,
    ) -> Result<OrderRecord, sqlx::Error> {
        self.attach_items(tx, vec![order])
            .await?
            .pop()
            .ok_or(sqlx::Error::RowNotFound)
    }

    async fn attach_items(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        mut orders: Vec<OrderRecord>,
    ) -> Result<Vec<OrderRecord>, sqlx::Error> {
        if orders.is_empty() {
            return Ok(orders);
        }

        let uuids: Vec<Uuid> = orders.iter().map(|order| order.uuid.into_uuid()).collect();

        let rows = query_as::<Postgres, ItemRow>(LIST_ORDER_ITEMS_SQL)
            .bind(uuids)
            .fetch_all(&mut **tx)
            .await?;

        for row in rows {
            if let Some(order) = orders
                .iter_mut()
                .find(|order| order.uuid.into_uuid() == row.order_uuid)
            {
                order.items.push(row.item);
            }
        }

        Ok(orders)
    }
}

fn encode_count(column: &str, value: u32) -> Result<i32, sqlx::Error> {
    i32::try_from(value).map_err(|error| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(error),
    })
}

fn decode_count(column: &str, value: i32) -> Result<u32, sqlx::Error> {
    u32::try_from(value).map_err(|error| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(error),
    })
}

struct ItemRow {
    order_uuid: Uuid,
    item: OrderItemRecord,
}

impl<'r> FromRow<'r, PgRow> for ItemRow {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            order_uuid: row.try_get("order_uuid")?,
            item: OrderItemRecord {
                uuid: OrderItemUuid::from_uuid(row.try_get("uuid")?),
                product_uuid: ProductUuid::from_uuid(row.try_get("product_uuid")?),
                product_name: row.try_get("product_name")?,
                tier: parse_column("tier", row.try_get("tier")?)?,
                unit_price: from_bigint("unit_price", row.try_get("unit_price")?)?,
                quantity: decode_count("quantity", row.try_get("quantity")?)?,
            },
        })
    }
}

impl<'r> FromRow<'r, PgRow> for OrderRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let currency: String = row.try_get("currency")?;
        let currency = iso::find(&currency).ok_or_else(|| sqlx::Error::ColumnDecode {
            index: "currency".to_string(),
            source: format!("unknown currency {currency}").into(),
        })?;

        let method: String = row.try_get("payment_method")?;
        let asset: Option<String> = row.try_get("payment_asset")?;
        let payment_method = PaymentMethod::from_parts(&method, asset.as_deref()).map_err(
            |error| sqlx::Error::ColumnDecode {
                index: "payment_method".to_string(),
                source: Box::new(error),
            },
        )?;

        let discount = row
            .try_get::<Option<String>, _>("discount_code")?
            .map(|code| {
                Ok::<_, sqlx::Error>(OrderDiscount {
                    code,
                    amount: from_bigint("discount_amount", row.try_get("discount_amount")?)?,
                })
            })
            .transpose()?;

        Ok(Self {
            uuid: OrderUuid::from_uuid(row.try_get("uuid")?),
            user_uuid: UserUuid::from_uuid(row.try_get("user_uuid")?),
            customer_email: row.try_get("customer_email")?,
            status: parse_column("status", row.try_get("status")?)?,
            subtotal: from_bigint("subtotal", row.try_get("subtotal")?)?,
            discount,
            total: from_bigint("total", row.try_get("total")?)?,
            currency,
            payment_method,
            items: Vec::new(),
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}

impl<'r> FromRow<'r, PgRow> for PaymentRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let method: String = row.try_get("method")?;
        let asset: Option<String> = row.try_get("asset")?;
        let method = PaymentMethod::from_parts(&method, asset.as_deref()).map_err(|error| {
            sqlx::Error::ColumnDecode {
                index: "method".to_string(),
                source: Box::new(error),
            }
        })?;

        let address: Option<String> = row.try_get("crypto_address")?;
        let expected_amount: Option<Decimal> = row.try_get("crypto_amount")?;
        let required_confirmations: Option<i32> = row.try_get("required_confirmations")?;
        let expires_at: Option<SqlxTimestamp> = row.try_get("expires_at")?;

        let crypto = match (address, expected_amount, required_confirmations, expires_at) {
            (Some(address), Some(expected_amount), Some(required), Some(expires_at)) => {
                Some(CryptoPaymentDetails {
                    address,
                    expected_amount,
                    required_confirmations: decode_count("required_confirmations", required)?,
                    expires_at: expires_at.to_jiff(),
                })
            }
            _ => None,
        };

        Ok(Self {
            uuid: PaymentUuid::from_uuid(row.try_get("uuid")?),
            order_uuid: OrderUuid::from_uuid(row.try_get("order_uuid")?),
            method,
            status: parse_column("status", row.try_get("status")?)?,
            amount: from_bigint("amount", row.try_get("amount")?)?,
            crypto,
            tx_hash: row.try_get("tx_hash")?,
            confirmations: decode_count("confirmations", row.try_get("confirmations")?)?,
            received_amount: row.try_get("received_amount")?,
            reference: row.try_get("reference")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}

impl<'r> FromRow<'r, PgRow> for EntitlementRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let product_uuid: Uuid = row.try_get("product_uuid")?;

        Ok(Self {
            uuid: EntitlementUuid::from_uuid(row.try_get("uuid")?),
            user_uuid: UserUuid::from_uuid(row.try_get("user_uuid")?),
            order_uuid: OrderUuid::from_uuid(row.try_get("order_uuid")?),
            product_uuid: ProductUuid::from_uuid(product_uuid),
            product_name: row.try_get("product_name")?,
            product_slug: row.try_get("product_slug")?,
            entitlement: Entitlement {
                product_uuid,
                tier: parse_column("tier", row.try_get("tier")?)?,
                starts_at: row.try_get::<SqlxTimestamp, _>("starts_at")?.to_jiff(),
                expires_at: row
                    .try_get::<Option<SqlxTimestamp>, _>("expires_at")?
                    .map(SqlxTimestamp::to_jiff),
            },
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
        })
    }
}
