//! Cart to entitlement, end to end through the pure pricing and payment rules.

use jiff::{SignedDuration, Timestamp};
use rust_decimal::dec;
use rusty_money::iso::USD;
use storefront::{
    cart::{Cart, CartItem},
    discounts::{DiscountCode, DiscountError, DiscountValue},
    orders::{CryptoAsset, Entitlement, OrderStatus},
    payments::{CryptoPaymentRequest, Observation, PaymentProgress},
    pricing::{PricingError, quote, reprice},
    tiers::{SubscriptionTier, TierPrice, price_for},
};
use testresult::TestResult;
use uuid::Uuid;

const RADAR: Uuid = Uuid::from_u128(1);
const AIMBOT: Uuid = Uuid::from_u128(2);

fn catalogue(product: Uuid) -> Vec<TierPrice> {
    if product == RADAR {
        vec![
            TierPrice {
                tier: SubscriptionTier::Weekly,
                price: 9_99,
            },
            TierPrice {
                tier: SubscriptionTier::Monthly,
                price: 29_99,
            },
        ]
    } else if product == AIMBOT {
        vec![TierPrice {
            tier: SubscriptionTier::Lifetime,
            price: 49_00,
        }]
    } else {
        Vec::new()
    }
}

fn line(product: Uuid, tier: SubscriptionTier, display_price: u64) -> CartItem {
    CartItem {
        product_uuid: product,
        name: "Product".to_string(),
        slug: "product".to_string(),
        price: display_price,
        image_url: None,
        quantity: 1,
        tier,
    }
}

fn ten_percent(expires_at: Option<Timestamp>) -> DiscountCode {
    DiscountCode {
        code: "SAVE10".to_string(),
        value: DiscountValue::Percentage(dec!(10)),
        minimum_amount: Some(20_00),
        maximum_uses: Some(100),
        current_uses: 4,
        is_active: true,
        expires_at,
    }
}

fn placed_at() -> TestResult<Timestamp> {
    Ok("2026-03-01T12:00:00Z".parse()?)
}

#[test]
fn stale_cart_prices_are_replaced_before_discounting() -> TestResult {
    let mut cart = Cart::new(USD);

    cart.add_item(line(RADAR, SubscriptionTier::Weekly, 5_00))?;
    cart.add_item(line(RADAR, SubscriptionTier::Weekly, 5_00))?;
    cart.add_item(line(AIMBOT, SubscriptionTier::Lifetime, 1_00))?;

    assert_eq!(cart.len(), 2, "repeat adds merge into one line");

    let priced = reprice(cart.items(), |product, tier| {
        price_for(&catalogue(product), tier)
    })?;
    let cart = Cart::with_items(priced, USD);

    let quote = quote(&cart, Some(&ten_percent(None)), placed_at()?)?;

    assert_eq!(quote.subtotal, 2 * 9_99 + 49_00);
    assert_eq!(quote.item_count, 3);

    let applied = quote.discount.ok_or("discount should apply")?;

    assert_eq!(applied.code, "SAVE10");
    assert_eq!(applied.amount, 6_90, "10% of 68.98 rounds to 6.90");
    assert_eq!(quote.total, 68_98 - 6_90);

    Ok(())
}

#[test]
fn products_not_sold_at_a_tier_cannot_be_priced() {
    let items = [line(AIMBOT, SubscriptionTier::Weekly, 1_00)];

    let result = reprice(&items, |product, tier| price_for(&catalogue(product), tier));

    assert!(
        matches!(
            result,
            Err(PricingError::Unavailable(product, SubscriptionTier::Weekly)) if product == AIMBOT
        ),
        "expected Unavailable, got {result:?}"
    );
}

#[test]
fn code_expiring_at_checkout_time_is_rejected() -> TestResult {
    let now = placed_at()?;
    let cart = Cart::with_items(vec![line(AIMBOT, SubscriptionTier::Lifetime, 49_00)], USD);

    let result = quote(&cart, Some(&ten_percent(Some(now))), now);

    assert!(
        matches!(result, Err(PricingError::Discount(DiscountError::Expired))),
        "expected Expired, got {result:?}"
    );

    Ok(())
}

#[test]
fn confirmed_crypto_payment_completes_order_and_grants_access() -> TestResult {
    let now = placed_at()?;

    let request = CryptoPaymentRequest {
        address: "bc1qexample".to_string(),
        expected_amount: dec!(0.0009),
        asset: CryptoAsset::Bitcoin,
        required_confirmations: CryptoAsset::Bitcoin.default_confirmations(),
        expires_at: now.checked_add(SignedDuration::from_hours(1))?,
    };

    let seen = |confirmations| Observation::Seen {
        tx_hash: "f00d".to_string(),
        amount: dec!(0.0009),
        confirmations,
    };

    let progress = PaymentProgress::AwaitingTransaction
        .advance(&request, Observation::NotFound, now)
        .advance(&request, seen(1), now);

    assert!(!progress.is_terminal(), "one confirmation is not enough");

    let progress = progress.advance(&request, seen(2), now);

    assert_eq!(progress.status().as_str(), "confirmed");

    let status = OrderStatus::Pending
        .transition_to(OrderStatus::Paid)?
        .transition_to(OrderStatus::Completed)?;

    assert!(status.is_terminal(), "completed orders are final");

    let weekly = Entitlement::grant(RADAR, SubscriptionTier::Weekly, 2, now)?;
    let lifetime = Entitlement::grant(AIMBOT, SubscriptionTier::Lifetime, 1, now)?;

    assert_eq!(
        weekly.expires_at,
        Some(now.checked_add(SignedDuration::from_hours(14 * 24))?)
    );
    assert_eq!(lifetime.expires_at, None);
    assert!(
        lifetime.is_active_at(now.checked_add(SignedDuration::from_hours(24 * 365 * 10))?),
        "lifetime access never lapses"
    );

    Ok(())
}

#[test]
fn cancelled_orders_cannot_be_paid() {
    let result = OrderStatus::Cancelled.transition_to(OrderStatus::Paid);

    assert!(result.is_err(), "cancelled is terminal");
}
