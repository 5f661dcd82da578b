//! Discounts Repository

use jiff_sqlx::Timestamp as SqlxTimestamp;
use rust_decimal::Decimal;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as};
use storefront::discounts::{DiscountCode, DiscountDraft, DiscountValue};

use crate::{
    database::{from_bigint, to_bigint},
    domain::discounts::records::{DiscountRecord, DiscountUuid},
};

const LIST_DISCOUNTS_SQL: &str = include_str!("sql/list_discounts.sql");
const GET_DISCOUNT_SQL: &str = include_str!("sql/get_discount.sql");
const GET_DISCOUNT_BY_CODE_SQL: &str = include_str!("sql/get_discount_by_code.sql");
const LOCK_DISCOUNT_BY_CODE_SQL: &str = include_str!("sql/lock_discount_by_code.sql");
const CREATE_DISCOUNT_SQL: &str = include_str!("sql/create_discount.sql");
const UPDATE_DISCOUNT_SQL: &str = include_str!("sql/update_discount.sql");
const DELETE_DISCOUNT_SQL: &str = include_str!("sql/delete_discount.sql");
const INCREMENT_DISCOUNT_USES_SQL: &str = include_str!("sql/increment_discount_uses.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgDiscountsRepository;

impl PgDiscountsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn list_discounts(
        &self,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Vec<DiscountRecord>, sqlx::Error> {
        query_as::<Postgres, DiscountRecord>(LIST_DISCOUNTS_SQL)
            .fetch_all(&mut **tx)
            .await
    }

    pub(crate) async fn get_discount(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        discount: DiscountUuid,
    ) -> Result<DiscountRecord, sqlx::Error> {
        query_as::<Postgres, DiscountRecord>(GET_DISCOUNT_SQL)
            .bind(discount.into_uuid())
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn get_discount_by_code(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        code: &str,
    ) -> Result<Option<DiscountRecord>, sqlx::Error> {
        query_as::<Postgres, DiscountRecord>(GET_DISCOUNT_BY_CODE_SQL)
            .bind(code)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Fetch a code and hold its row lock until the transaction ends.
    pub(crate) async fn lock_discount_by_code(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        code: &str,
    ) -> Result<Option<DiscountRecord>, sqlx::Error> {
        query_as::<Postgres, DiscountRecord>(LOCK_DISCOUNT_BY_CODE_SQL)
            .bind(code)
            .fetch_optional(&mut **tx)
            .await
    }

    pub(crate) async fn create_discount(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        discount: DiscountUuid,
        draft: &DiscountDraft,
    ) -> Result<DiscountRecord, sqlx::Error> {
        let (percentage, fixed_amount) = value_columns(draft.value)?;

        query_as::<Postgres, DiscountRecord>(CREATE_DISCOUNT_SQL)
            .bind(discount.into_uuid())
            .bind(&draft.code)
            .bind(percentage)
            .bind(fixed_amount)
            .bind(optional_bigint("minimum_amount", draft.minimum_amount)?)
            .bind(optional_integer("maximum_uses", draft.maximum_uses)?)
            .bind(draft.is_active)
            .bind(draft.expires_at.map(SqlxTimestamp::from))
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn update_discount(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        discount: DiscountUuid,
        draft: &DiscountDraft,
    ) -> Result<DiscountRecord, sqlx::Error> {
        let (percentage, fixed_amount) = value_columns(draft.value)?;

        query_as::<Postgres, DiscountRecord>(UPDATE_DISCOUNT_SQL)
            .bind(discount.into_uuid())
            .bind(&draft.code)
            .bind(percentage)
            .bind(fixed_amount)
            .bind(optional_bigint("minimum_amount", draft.minimum_amount)?)
            .bind(optional_integer("maximum_uses", draft.maximum_uses)?)
            .bind(draft.is_active)
            .bind(draft.expires_at.map(SqlxTimestamp::from))
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn delete_discount(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        discount: DiscountUuid,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(DELETE_DISCOUNT_SQL)
            .bind(discount.into_uuid())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    /// Count one redemption. Returns `false` if the usage limit was already reached.
    pub(crate) async fn increment_uses(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        discount: DiscountUuid,
    ) -> Result<bool, sqlx::Error> {
        let rows_affected = query(INCREMENT_DISCOUNT_USES_SQL)
            .bind(discount.into_uuid())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected == 1)
    }
}

fn value_columns(value: DiscountValue) -> Result<(Option<Decimal>, Option<i64>), sqlx::Error> {
    match value {
        DiscountValue::Percentage(percent) => Ok((Some(percent), None)),
        DiscountValue::Fixed(amount) => Ok((None, Some(to_bigint("fixed_amount", amount)?))),
    }
}

fn optional_bigint(column: &str, value: Option<u64>) -> Result<Option<i64>, sqlx::Error> {
    value.map(|value| to_bigint(column, value)).transpose()
}

fn optional_integer(column: &str, value: Option<u32>) -> Result<Option<i32>, sqlx::Error> {
    value
        .map(|value| {
            i32::try_from(value).map_err(|error| sqlx::Error::ColumnDecode {
                index: column.to_string(),
                source: Box::new(error),
            })
        })
        .transpose()
}

fn decode_integer(column: &str, value: i32) -> Result<u32, sqlx::Error> {
    u32::try_from(value).map_err(|error| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(error),
    })
}

impl<'r> FromRow<'r, PgRow> for DiscountRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let percentage: Option<Decimal> = row.try_get("percentage")?;
        let fixed_amount: Option<i64> = row.try_get("fixed_amount")?;

        let value = match (percentage, fixed_amount) {
            (Some(percent), None) => DiscountValue::Percentage(percent),
            (None, Some(amount)) => DiscountValue::Fixed(from_bigint("fixed_amount", amount)?),
            _ => {
                return Err(sqlx::Error::ColumnDecode {
                    index: "percentage".to_string(),
                    source: "exactly one of percentage and fixed_amount must be set".into(),
                });
            }
        };

        Ok(Self {
            uuid: DiscountUuid::from_uuid(row.try_get("uuid")?),
            discount: DiscountCode {
                code: row.try_get("code")?,
                value,
                minimum_amount: row
                    .try_get::<Option<i64>, _>("minimum_amount")?
                    .map(|amount| from_bigint("minimum_amount", amount))
                    .transpose()?,
                maximum_uses: row
                    .try_get::<Option<i32>, _>("maximum_uses")?
                    .map(|uses| decode_integer("maximum_uses", uses))
                    .transpose()?,
                current_uses: decode_integer("current_uses", row.try_get("current_uses")?)?,
                is_active: row.try_get("is_active")?,
                expires_at: row
                    .try_get::<Option<SqlxTimestamp>, _>("expires_at")?
                    .map(SqlxTimestamp::to_jiff),
            },
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}
