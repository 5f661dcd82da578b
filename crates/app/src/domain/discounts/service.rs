//! Discounts service.

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use storefront::discounts::{AppliedDiscount, DiscountDraft, normalize_code};

use crate::{
    database::Db,
    domain::discounts::{
        errors::DiscountsServiceError,
        records::{DiscountRecord, DiscountUuid},
        repository::PgDiscountsRepository,
    },
};

#[derive(Debug, Clone)]
pub struct PgDiscountsService {
    db: Db,
    repository: PgDiscountsRepository,
}

impl PgDiscountsService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            repository: PgDiscountsRepository::new(),
        }
    }
}

#[async_trait]
impl DiscountsService for PgDiscountsService {
    async fn list_discounts(&self) -> Result<Vec<DiscountRecord>, DiscountsServiceError> {
        let mut tx = self.db.begin().await?;

        let discounts = self.repository.list_discounts(&mut tx).await?;

        tx.commit().await?;

        Ok(discounts)
    }

    async fn get_discount(
        &self,
        discount: DiscountUuid,
    ) -> Result<DiscountRecord, DiscountsServiceError> {
        let mut tx = self.db.begin().await?;

        let discount = self.repository.get_discount(&mut tx, discount).await?;

        tx.commit().await?;

        Ok(discount)
    }

    async fn create_discount(
        &self,
        discount: DiscountUuid,
        draft: DiscountDraft,
    ) -> Result<DiscountRecord, DiscountsServiceError> {
        let draft = draft.validate()?;

        let mut tx = self.db.begin().await?;

        let created = self
            .repository
            .create_discount(&mut tx, discount, &draft)
            .await?;

        tx.commit().await?;

        tracing::info!(
            discount = %created.uuid,
            code = %created.discount.code,
            "discount created"
        );

        Ok(created)
    }

    async fn update_discount(
        &self,
        discount: DiscountUuid,
        draft: DiscountDraft,
    ) -> Result<DiscountRecord, DiscountsServiceError> {
        let draft = draft.validate()?;

        let mut tx = self.db.begin().await?;

        let updated = self
            .repository
            .update_discount(&mut tx, discount, &draft)
            .await?;

        tx.commit().await?;

        Ok(updated)
    }

    async fn delete_discount(&self, discount: DiscountUuid) -> Result<(), DiscountsServiceError> {
        let mut tx = self.db.begin().await?;

        let rows_affected = self.repository.delete_discount(&mut tx, discount).await?;

        if rows_affected == 0 {
            return Err(DiscountsServiceError::NotFound);
        }

        tx.commit().await?;

        Ok(())
    }

    async fn validate_code(
        &self,
        code: &str,
        order_amount: u64,
        now: Timestamp,
    ) -> Result<AppliedDiscount, DiscountsServiceError> {
        let code = normalize_code(code);

        if code.is_empty() {
            return Err(DiscountsServiceError::UnknownCode);
        }

        let mut tx = self.db.begin().await?;

        let discount = self
            .repository
            .get_discount_by_code(&mut tx, &code)
            .await?
            .ok_or(DiscountsServiceError::UnknownCode)?;

        tx.commit().await?;

        Ok(discount.discount.evaluate(order_amount, now)?)
    }
}

#[automock]
#[async_trait]
pub trait DiscountsService: Send + Sync {
    /// Lists every discount code, newest first.
    async fn list_discounts(&self) -> Result<Vec<DiscountRecord>, DiscountsServiceError>;

    /// Retrieve a single discount code.
    async fn get_discount(
        &self,
        discount: DiscountUuid,
    ) -> Result<DiscountRecord, DiscountsServiceError>;

    /// Validates and stores a new discount code.
    async fn create_discount(
        &self,
        discount: DiscountUuid,
        draft: DiscountDraft,
    ) -> Result<DiscountRecord, DiscountsServiceError>;

    /// Replaces a discount code's settings, keeping its usage count.
    async fn update_discount(
        &self,
        discount: DiscountUuid,
        draft: DiscountDraft,
    ) -> Result<DiscountRecord, DiscountsServiceError>;

    /// Deletes a discount code.
    async fn delete_discount(&self, discount: DiscountUuid) -> Result<(), DiscountsServiceError>;

    /// Checks a code against an order amount without redeeming it.
    async fn validate_code(
        &self,
        code: &str,
        order_amount: u64,
        now: Timestamp,
    ) -> Result<AppliedDiscount, DiscountsServiceError>;
}
