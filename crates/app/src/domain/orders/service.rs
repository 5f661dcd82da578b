//! Orders service.
//!
//! Checkout prices every line from the catalogue, redeems the discount code under a row lock,
//! and records the order, its lines and its payment in one transaction. Payment outcomes move
//! the order on and grant entitlements.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use jiff::{SignedDuration, Timestamp};
use mockall::automock;
use rusty_money::iso::Currency;
use sqlx::{Postgres, Transaction};
use storefront::{
    cart::{Cart, CartError, CartItem},
    discounts::{DiscountError, normalize_code},
    orders::{Entitlement, OrderStatus, PaymentMethod, PaymentStatus},
    payments::PaymentProgress,
    pricing::{self, PricingError, Quote},
};

use crate::{
    auth::UserUuid,
    database::Db,
    domain::{
        discounts::{records::DiscountRecord, repository::PgDiscountsRepository},
        orders::{
            data::{
                CardPaymentOutcome, CheckoutItem, CheckoutOutcome, CheckoutRequest, PaymentUpdate,
                WatchedPayment,
            },
            errors::OrdersServiceError,
            records::{
                CryptoPaymentDetails, EntitlementRecord, OrderRecord, OrderUuid, PaymentRecord,
                PaymentUuid,
            },
            repository::{NewOrder, NewOrderItem, NewPayment, PaymentChange, PgOrdersRepository},
        },
        products::{records::ProductUuid, repository::PgProductsRepository},
    },
    payments::CryptoInvoicer,
};

#[derive(Clone)]
pub struct PgOrdersService {
    db: Db,
    orders: PgOrdersRepository,
    products: PgProductsRepository,
    discounts: PgDiscountsRepository,
    invoicer: Arc<dyn CryptoInvoicer>,
    currency: &'static Currency,
    payment_window: SignedDuration,
}

impl fmt::Debug for PgOrdersService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgOrdersService")
            .field("currency", &self.currency.iso_alpha_code)
            .field("payment_window", &self.payment_window)
            .finish_non_exhaustive()
    }
}

impl PgOrdersService {
    /// Orders are priced in `currency`; crypto payments must arrive within `payment_window`.
    #[must_use]
    pub fn new(
        db: Db,
        currency: &'static Currency,
        invoicer: Arc<dyn CryptoInvoicer>,
        payment_window: SignedDuration,
    ) -> Self {
        Self {
            db,
            orders: PgOrdersRepository::new(),
            products: PgProductsRepository::new(),
            discounts: PgDiscountsRepository::new(),
            invoicer,
            currency,
            payment_window,
        }
    }

    /// Build a cart from the requested lines at current catalogue prices.
    async fn priced_cart(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        items: &[CheckoutItem],
    ) -> Result<Cart, OrdersServiceError> {
        let uuids: Vec<ProductUuid> = items.iter().map(|item| item.product_uuid).collect();
        let products = self.products.get_products_by_uuids(tx, &uuids).await?;

        let mut cart = Cart::new(self.currency);

        for item in items {
            let unavailable =
                || PricingError::Unavailable(item.product_uuid.into_uuid(), item.tier);

            let product = products
                .iter()
                .find(|product| product.uuid == item.product_uuid && product.is_purchasable())
                .ok_or_else(unavailable)?;

            let price = product.price_for(item.tier).ok_or_else(unavailable)?;

            cart.add_item(CartItem {
                product_uuid: item.product_uuid.into_uuid(),
                name: product.name.clone(),
                slug: product.slug.clone(),
                price,
                image_url: product.image_url.clone(),
                quantity: item.quantity,
                tier: item.tier,
            })?;
        }

        Ok(cart)
    }

    async fn find_discount(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        code: Option<&str>,
        lock: bool,
    ) -> Result<Option<DiscountRecord>, OrdersServiceError> {
        let Some(code) = code.map(normalize_code).filter(|code| !code.is_empty()) else {
            return Ok(None);
        };

        let discount = if lock {
            self.discounts.lock_discount_by_code(tx, &code).await?
        } else {
            self.discounts.get_discount_by_code(tx, &code).await?
        };

        discount.map(Some).ok_or(OrdersServiceError::DiscountNotFound)
    }

    /// Mark a pending order paid, grant its entitlements, then complete it.
    async fn complete_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: &OrderRecord,
        now: Timestamp,
    ) -> Result<(), OrdersServiceError> {
        let paid = order.status.transition_to(OrderStatus::Paid)?;

        self.orders.update_order_status(tx, order.uuid, paid).await?;

        for item in &order.items {
            let starts_at = self
                .orders
                .latest_entitlement_end(tx, order.user_uuid, item.product_uuid, now)
                .await?
                .map_or(now, |end| end.max(now));

            let entitlement = Entitlement::grant(
                item.product_uuid.into_uuid(),
                item.tier,
                item.quantity,
                starts_at,
            )?;

            self.orders
                .create_entitlement(tx, order.user_uuid, order.uuid, &entitlement)
                .await?;
        }

        let completed = paid.transition_to(OrderStatus::Completed)?;

        self.orders
            .update_order_status(tx, order.uuid, completed)
            .await?;

        Ok(())
    }

    async fn fail_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: &OrderRecord,
    ) -> Result<(), OrdersServiceError> {
        let failed = order.status.transition_to(OrderStatus::Failed)?;

        self.orders.update_order_status(tx, order.uuid, failed).await?;

        Ok(())
    }

    async fn crypto_details(
        &self,
        method: PaymentMethod,
        total: u64,
        now: Timestamp,
    ) -> Result<Option<CryptoPaymentDetails>, OrdersServiceError> {
        let Some(asset) = method.asset() else {
            return Ok(None);
        };

        if total == 0 {
            return Ok(None);
        }

        let invoice = self
            .invoicer
            .create_invoice(asset, total, self.currency.iso_alpha_code)
            .await?;

        let expires_at = now
            .checked_add(self.payment_window)
            .map_err(|_overflow| OrdersServiceError::InvalidData)?;

        Ok(Some(CryptoPaymentDetails {
            address: invoice.address,
            expected_amount: invoice.amount,
            required_confirmations: asset.default_confirmations(),
            expires_at,
        }))
    }
}

/// Reject requests that can be refused without touching storage.
fn check_items(items: &[CheckoutItem]) -> Result<(), OrdersServiceError> {
    if items.is_empty() {
        return Err(PricingError::EmptyCart.into());
    }

    if items.iter().any(|item| item.quantity == 0) {
        return Err(CartError::ZeroQuantity.into());
    }

    Ok(())
}

fn progress_change(progress: &PaymentProgress) -> PaymentChange {
    PaymentChange {
        status: Some(progress.status()),
        tx_hash: progress.tx_hash().map(str::to_string),
        confirmations: progress.confirmations(),
        received_amount: match progress {
            PaymentProgress::Underpaid { received, .. } => Some(*received),
            _ => None,
        },
        reference: None,
    }
}

#[async_trait]
impl OrdersService for PgOrdersService {
    async fn quote(
        &self,
        items: Vec<CheckoutItem>,
        discount_code: Option<String>,
        now: Timestamp,
    ) -> Result<Quote, OrdersServiceError> {
        check_items(&items)?;

        let mut tx = self.db.begin().await?;

        let cart = self.priced_cart(&mut tx, &items).await?;
        let discount = self
            .find_discount(&mut tx, discount_code.as_deref(), false)
            .await?;

        tx.commit().await?;

        Ok(pricing::quote(
            &cart,
            discount.as_ref().map(|record| &record.discount),
            now,
        )?)
    }

    async fn checkout(
        &self,
        user: UserUuid,
        request: CheckoutRequest,
        now: Timestamp,
    ) -> Result<CheckoutOutcome, OrdersServiceError> {
        check_items(&request.items)?;

        let mut tx = self.db.begin().await?;

        let cart = self.priced_cart(&mut tx, &request.items).await?;
        let discount = self
            .find_discount(&mut tx, request.discount_code.as_deref(), true)
            .await?;

        let quote = pricing::quote(
            &cart,
            discount.as_ref().map(|record| &record.discount),
            now,
        )?;

        let crypto = self
            .crypto_details(request.payment_method, quote.total, now)
            .await?;

        let order_uuid = OrderUuid::new();

        self.orders
            .create_order(
                &mut tx,
                &NewOrder {
                    uuid: order_uuid,
                    user_uuid: user,
                    subtotal: quote.subtotal,
                    discount: discount.as_ref().zip(quote.discount.as_ref()).map(
                        |(record, applied)| (record.uuid, applied.code.as_str(), applied.amount),
                    ),
                    total: quote.total,
                    currency: self.currency.iso_alpha_code,
                    payment_method: request.payment_method,
                },
            )
            .await?;

        for item in cart.items() {
            self.orders
                .create_order_item(
                    &mut tx,
                    order_uuid,
                    &NewOrderItem {
                        product_uuid: ProductUuid::from_uuid(item.product_uuid),
                        product_name: &item.name,
                        tier: item.tier,
                        unit_price: item.price,
                        quantity: item.quantity,
                    },
                )
                .await?;
        }

        let payment = self
            .orders
            .create_payment(
                &mut tx,
                &NewPayment {
                    uuid: PaymentUuid::new(),
                    order_uuid,
                    method: request.payment_method,
                    amount: quote.total,
                    crypto: crypto.as_ref(),
                },
            )
            .await?;

        if let Some(discount) = &discount
            && !self.discounts.increment_uses(&mut tx, discount.uuid).await?
        {
            return Err(DiscountError::UsageLimitReached.into());
        }

        if quote.total == 0 {
            let placed = self.orders.get_order(&mut tx, order_uuid).await?;

            self.orders
                .update_payment(
                    &mut tx,
                    &payment,
                    PaymentChange {
                        status: Some(PaymentStatus::Confirmed),
                        ..PaymentChange::default()
                    },
                )
                .await?;

            self.complete_order(&mut tx, &placed, now).await?;
        }

        let order = self.orders.get_order(&mut tx, order_uuid).await?;
        let payment = self.orders.get_payment_for_order(&mut tx, order_uuid).await?;

        tx.commit().await?;

        tracing::info!(
            order = %order.uuid,
            %user,
            total = order.total,
            method = order.payment_method.as_str(),
            status = %order.status,
            "order placed"
        );

        Ok(CheckoutOutcome { order, payment })
    }

    async fn list_orders(&self, user: UserUuid) -> Result<Vec<OrderRecord>, OrdersServiceError> {
        let mut tx = self.db.begin().await?;

        let orders = self.orders.list_orders_for_user(&mut tx, user).await?;

        tx.commit().await?;

        Ok(orders)
    }

    async fn get_order(
        &self,
        user: UserUuid,
        order: OrderUuid,
    ) -> Result<OrderRecord, OrdersServiceError> {
        let mut tx = self.db.begin().await?;

        let order = self.orders.get_order_for_user(&mut tx, user, order).await?;

        tx.commit().await?;

        Ok(order)
    }

    async fn get_payment(
        &self,
        user: UserUuid,
        order: OrderUuid,
    ) -> Result<PaymentRecord, OrdersServiceError> {
        let mut tx = self.db.begin().await?;

        let order = self.orders.get_order_for_user(&mut tx, user, order).await?;
        let payment = self.orders.get_payment_for_order(&mut tx, order.uuid).await?;

        tx.commit().await?;

        Ok(payment)
    }

    async fn cancel_order(
        &self,
        user: UserUuid,
        order: OrderUuid,
    ) -> Result<OrderRecord, OrdersServiceError> {
        let mut tx = self.db.begin().await?;

        let current = self.orders.lock_order(&mut tx, order).await?;

        if current.user_uuid != user {
            return Err(OrdersServiceError::NotFound);
        }

        let cancelled = current.status.transition_to(OrderStatus::Cancelled)?;

        self.orders
            .update_order_status(&mut tx, order, cancelled)
            .await?;

        let order = self.orders.get_order(&mut tx, order).await?;

        tx.commit().await?;

        tracing::info!(order = %order.uuid, %user, "order cancelled");

        Ok(order)
    }

    async fn list_subscriptions(
        &self,
        user: UserUuid,
        now: Timestamp,
    ) -> Result<Vec<EntitlementRecord>, OrdersServiceError> {
        let mut tx = self.db.begin().await?;

        let entitlements = self
            .orders
            .list_active_entitlements(&mut tx, user, now)
            .await?;

        tx.commit().await?;

        Ok(entitlements)
    }

    async fn record_payment_progress(
        &self,
        order: OrderUuid,
        progress: PaymentProgress,
        now: Timestamp,
    ) -> Result<PaymentUpdate, OrdersServiceError> {
        let mut tx = self.db.begin().await?;

        let current = self.orders.lock_order(&mut tx, order).await?;
        let payment = self.orders.get_payment_for_order(&mut tx, order).await?;

        if payment.method.asset().is_none() {
            return Err(OrdersServiceError::WrongPaymentMethod("crypto"));
        }

        self.orders
            .update_payment(&mut tx, &payment, progress_change(&progress))
            .await?;

        let transitioned = if current.status == OrderStatus::Pending {
            match progress {
                PaymentProgress::Confirmed { .. } => {
                    self.complete_order(&mut tx, &current, now).await?;

                    Some(OrderStatus::Completed)
                }
                PaymentProgress::Underpaid { .. } | PaymentProgress::Expired => {
                    self.fail_order(&mut tx, &current).await?;

                    Some(OrderStatus::Failed)
                }
                PaymentProgress::AwaitingTransaction | PaymentProgress::Confirming { .. } => None,
            }
        } else {
            None
        };

        let order = self.orders.get_order(&mut tx, order).await?;

        tx.commit().await?;

        if let Some(status) = transitioned {
            tracing::info!(order = %order.uuid, %status, "crypto payment settled");
        }

        Ok(PaymentUpdate {
            order,
            transitioned,
        })
    }

    async fn record_card_payment(
        &self,
        order: OrderUuid,
        outcome: CardPaymentOutcome,
        now: Timestamp,
    ) -> Result<PaymentUpdate, OrdersServiceError> {
        let mut tx = self.db.begin().await?;

        let current = self.orders.lock_order(&mut tx, order).await?;
        let payment = self.orders.get_payment_for_order(&mut tx, order).await?;

        if payment.method != PaymentMethod::Card {
            return Err(OrdersServiceError::WrongPaymentMethod("card"));
        }

        let pending = current.status == OrderStatus::Pending;

        let transitioned = match outcome {
            CardPaymentOutcome::Succeeded { reference } => {
                self.orders
                    .update_payment(
                        &mut tx,
                        &payment,
                        PaymentChange {
                            status: Some(PaymentStatus::Confirmed),
                            reference: Some(reference),
                            ..PaymentChange::default()
                        },
                    )
                    .await?;

                if pending {
                    self.complete_order(&mut tx, &current, now).await?;
                }

                pending.then_some(OrderStatus::Completed)
            }
            CardPaymentOutcome::Declined { reason } => {
                self.orders
                    .update_payment(
                        &mut tx,
                        &payment,
                        PaymentChange {
                            status: Some(PaymentStatus::Failed),
                            reference: Some(reason),
                            ..PaymentChange::default()
                        },
                    )
                    .await?;

                if pending {
                    self.fail_order(&mut tx, &current).await?;
                }

                pending.then_some(OrderStatus::Failed)
            }
        };

        let order = self.orders.get_order(&mut tx, order).await?;

        tx.commit().await?;

        if let Some(status) = transitioned {
            tracing::info!(order = %order.uuid, %status, "card payment settled");
        }

        Ok(PaymentUpdate {
            order,
            transitioned,
        })
    }

    async fn list_watchable_payments(&self) -> Result<Vec<WatchedPayment>, OrdersServiceError> {
        let mut tx = self.db.begin().await?;

        let payments = self.orders.list_watchable_payments(&mut tx).await?;

        tx.commit().await?;

        Ok(payments
            .into_iter()
            .filter_map(|payment| {
                Some(WatchedPayment {
                    order: payment.order_uuid,
                    request: payment.crypto_request()?,
                    progress: payment.progress()?,
                })
            })
            .collect())
    }
}

#[automock]
#[async_trait]
pub trait OrdersService: Send + Sync {
    /// Price the given lines at catalogue prices, applying a discount code if given.
    async fn quote(
        &self,
        items: Vec<CheckoutItem>,
        discount_code: Option<String>,
        now: Timestamp,
    ) -> Result<Quote, OrdersServiceError>;

    /// Place an order for `user`. Crypto orders get an invoice; free orders complete at once.
    async fn checkout(
        &self,
        user: UserUuid,
        request: CheckoutRequest,
        now: Timestamp,
    ) -> Result<CheckoutOutcome, OrdersServiceError>;

    /// The user's orders, newest first.
    async fn list_orders(&self, user: UserUuid) -> Result<Vec<OrderRecord>, OrdersServiceError>;

    /// One of the user's orders.
    async fn get_order(
        &self,
        user: UserUuid,
        order: OrderUuid,
    ) -> Result<OrderRecord, OrdersServiceError>;

    /// Payment of one of the user's orders.
    async fn get_payment(
        &self,
        user: UserUuid,
        order: OrderUuid,
    ) -> Result<PaymentRecord, OrdersServiceError>;

    /// Cancel a pending order.
    async fn cancel_order(
        &self,
        user: UserUuid,
        order: OrderUuid,
    ) -> Result<OrderRecord, OrdersServiceError>;

    /// Entitlements that have not yet expired.
    async fn list_subscriptions(
        &self,
        user: UserUuid,
        now: Timestamp,
    ) -> Result<Vec<EntitlementRecord>, OrdersServiceError>;

    /// Store crypto payment progress, settling the order on a terminal state.
    async fn record_payment_progress(
        &self,
        order: OrderUuid,
        progress: PaymentProgress,
        now: Timestamp,
    ) -> Result<PaymentUpdate, OrdersServiceError>;

    /// Store the card processor's verdict, settling the order.
    async fn record_card_payment(
        &self,
        order: OrderUuid,
        outcome: CardPaymentOutcome,
        now: Timestamp,
    ) -> Result<PaymentUpdate, OrdersServiceError>;

    /// Unsettled crypto payments, for resuming polling after a restart.
    async fn list_watchable_payments(&self) -> Result<Vec<WatchedPayment>, OrdersServiceError>;
}
