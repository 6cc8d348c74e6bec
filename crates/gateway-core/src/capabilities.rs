//! # Capability Catalog
//!
//! Static, provider-keyed description of what each payment provider
//! supports. Pure lookup: no I/O, no live provider instance required, so it
//! answers for providers that are not currently registered too.
//!
//! Callers use it to pre-validate a request (currency, amount limits, refund
//! window) before dispatching to a provider that would reject it remotely.

use crate::gateway::{Gateway, ProviderKind};
use crate::provider::OptionalOperation;
use serde::Serialize;

/// Feature flags, limits and notes for one provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCapabilities {
    pub supports_one_time_payments: bool,
    pub supports_subscriptions: bool,
    pub supports_vault: bool,
    pub supports_ach: bool,
    pub supports_refunds: bool,
    pub supports_partial_refunds: bool,
    pub supports_webhooks: bool,
    pub supports_orders: bool,
    pub supports_instant_capture: bool,
    pub supports_manual_capture: bool,
    pub supports_sca: bool,
    pub requires_plans_for_subscriptions: bool,
    pub requires_customer_for_subscription: bool,
    pub supported_payment_methods: &'static [&'static str],
    /// Lowercase ISO 4217 codes
    pub supported_currencies: &'static [&'static str],
    /// Days
    pub max_refund_window: Option<u32>,
    /// Minor currency units
    pub min_transaction_amount: Option<i64>,
    /// Minor currency units
    pub max_transaction_amount: Option<i64>,
    pub notes: &'static [&'static str],
}

impl ProviderCapabilities {
    /// Check a currency code (case-insensitive)
    pub fn supports_currency(&self, currency: &str) -> bool {
        let currency = currency.to_lowercase();
        self.supported_currencies.iter().any(|c| *c == currency)
    }

    /// Check a payment method tag (case-insensitive)
    pub fn supports_payment_method(&self, method: &str) -> bool {
        let method = method.to_lowercase();
        self.supported_payment_methods.iter().any(|m| *m == method)
    }

    /// True if `amount` (minor units) is inside the provider's limits
    pub fn accepts_amount(&self, amount: i64) -> bool {
        let above_min = self.min_transaction_amount.map_or(true, |min| amount >= min);
        let below_max = self.max_transaction_amount.map_or(true, |max| amount <= max);
        above_min && below_max
    }

    /// True if the catalog allows `operation` for this provider.
    ///
    /// Operations outside the vault, ACH, subscription and order families
    /// carry no catalog flag and are always allowed here.
    pub fn permits(&self, operation: OptionalOperation) -> bool {
        use OptionalOperation::*;
        match operation {
            CreateCustomer | GetCustomerPaymentMethods | AttachPaymentMethod
            | DetachPaymentMethod | UpdateCard | CreateSetupIntent | ConfirmSetupIntent => {
                self.supports_vault
            }
            CreateBankAccount | UpdateBank | VerifyBank | DeleteBankAccount
            | CreateAchSetupIntent => self.supports_ach,
            GetCustomerSubscriptions | CreateSubscriptionPlan | CreateSubscriptionWithPlan => {
                self.supports_subscriptions
            }
            CreateOrder => self.supports_orders,
            CreateProduct | GenerateClientToken | GetCharge | UpdateDonationStatus => true,
        }
    }

    /// True if a refund `days_since_charge` old can still be issued
    pub fn allows_refund_after(&self, days_since_charge: u32) -> bool {
        if !self.supports_refunds {
            return false;
        }
        self.max_refund_window
            .map_or(true, |window| days_since_charge <= window)
    }
}

/// Anything a capability lookup can be keyed by
pub trait CapabilityKey {
    fn provider_kind(&self) -> ProviderKind;
}

impl CapabilityKey for str {
    fn provider_kind(&self) -> ProviderKind {
        ProviderKind::parse(self)
    }
}

impl CapabilityKey for String {
    fn provider_kind(&self) -> ProviderKind {
        ProviderKind::parse(self)
    }
}

impl CapabilityKey for ProviderKind {
    fn provider_kind(&self) -> ProviderKind {
        self.clone()
    }
}

impl CapabilityKey for Gateway {
    fn provider_kind(&self) -> ProviderKind {
        self.kind()
    }
}

const COMMON_CURRENCIES: &[&str] = &["usd", "eur", "gbp", "cad", "aud", "jpy", "mxn", "nzd", "sgd"];

static STRIPE: ProviderCapabilities = ProviderCapabilities {
    supports_one_time_payments: true,
    supports_subscriptions: true,
    supports_vault: true,
    supports_ach: true,
    supports_refunds: true,
    supports_partial_refunds: true,
    supports_webhooks: true,
    supports_orders: false,
    supports_instant_capture: true,
    supports_manual_capture: true,
    supports_sca: true,
    requires_plans_for_subscriptions: false,
    requires_customer_for_subscription: true,
    supported_payment_methods: &["card", "ach_debit", "link", "apple_pay", "google_pay"],
    supported_currencies: COMMON_CURRENCIES,
    max_refund_window: Some(180),
    min_transaction_amount: Some(50),
    max_transaction_amount: Some(99_999_999),
    notes: &[
        "Supports ACH via Plaid or micro-deposits",
        "Ideal for card + bank payments",
    ],
};

static PAYPAL: ProviderCapabilities = ProviderCapabilities {
    supports_one_time_payments: true,
    supports_subscriptions: true,
    supports_vault: true,
    supports_ach: false,
    supports_refunds: true,
    supports_partial_refunds: true,
    supports_webhooks: true,
    supports_orders: true,
    supports_instant_capture: true,
    supports_manual_capture: true,
    supports_sca: true,
    requires_plans_for_subscriptions: true,
    requires_customer_for_subscription: false,
    supported_payment_methods: &["paypal", "card", "venmo", "pay_later"],
    supported_currencies: COMMON_CURRENCIES,
    max_refund_window: Some(180),
    min_transaction_amount: Some(100),
    max_transaction_amount: Some(1_000_000),
    notes: &[
        "Subscriptions require Billing Plans",
        "Order APIs power PayPal smart buttons",
    ],
};

static SQUARE: ProviderCapabilities = ProviderCapabilities {
    supports_one_time_payments: true,
    supports_subscriptions: true,
    supports_vault: true,
    supports_ach: true,
    supports_refunds: true,
    supports_partial_refunds: true,
    supports_webhooks: true,
    supports_orders: false,
    supports_instant_capture: true,
    supports_manual_capture: true,
    supports_sca: true,
    requires_plans_for_subscriptions: false,
    requires_customer_for_subscription: true,
    supported_payment_methods: &["card", "apple_pay", "google_pay", "ach_debit", "gift_card"],
    supported_currencies: &["usd", "cad", "gbp", "aud", "jpy", "eur"],
    max_refund_window: Some(120),
    min_transaction_amount: Some(100),
    max_transaction_amount: Some(5_000_000),
    notes: &[
        "ACH support requires Square bank on file",
        "Subscriptions available with catalog plans",
    ],
};

static EPAYMINTS: ProviderCapabilities = ProviderCapabilities {
    supports_one_time_payments: true,
    supports_subscriptions: false,
    supports_vault: false,
    supports_ach: true,
    supports_refunds: true,
    supports_partial_refunds: false,
    supports_webhooks: false,
    supports_orders: false,
    supports_instant_capture: true,
    supports_manual_capture: false,
    supports_sca: false,
    requires_plans_for_subscriptions: false,
    requires_customer_for_subscription: false,
    supported_payment_methods: &["card", "ach"],
    supported_currencies: &["usd"],
    max_refund_window: Some(90),
    min_transaction_amount: Some(100),
    max_transaction_amount: Some(10_000_000),
    notes: &[
        "Webhooks limited; polling recommended",
        "ACH available via tokenised transactions",
    ],
};

static KINGDOMFUNDING: ProviderCapabilities = ProviderCapabilities {
    supports_one_time_payments: true,
    supports_subscriptions: false,
    supports_vault: false,
    supports_ach: false,
    supports_refunds: false,
    supports_partial_refunds: false,
    supports_webhooks: false,
    supports_orders: false,
    supports_instant_capture: false,
    supports_manual_capture: false,
    supports_sca: false,
    requires_plans_for_subscriptions: false,
    requires_customer_for_subscription: false,
    supported_payment_methods: &["card"],
    supported_currencies: &["usd"],
    max_refund_window: None,
    min_transaction_amount: None,
    max_transaction_amount: None,
    notes: &["Placeholder provider; implement SDK integrations before production use"],
};

/// Look up the capability descriptor for a provider tag, kind or gateway.
///
/// Case-insensitive; `None` for providers with no catalog entry.
pub fn capabilities_for<K: CapabilityKey + ?Sized>(key: &K) -> Option<&'static ProviderCapabilities> {
    match key.provider_kind() {
        ProviderKind::Stripe => Some(&STRIPE),
        ProviderKind::PayPal => Some(&PAYPAL),
        ProviderKind::Square => Some(&SQUARE),
        ProviderKind::EPayMints => Some(&EPAYMINTS),
        ProviderKind::KingdomFunding => Some(&KINGDOMFUNDING),
        ProviderKind::Other(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_has_no_capabilities() {
        assert!(capabilities_for("unknown-provider").is_none());
    }

    #[test]
    fn test_stripe_supports_usd() {
        let caps = capabilities_for("stripe").unwrap();
        assert!(caps.supported_currencies.contains(&"usd"));
        assert!(caps.supports_currency("USD"));
        assert!(caps.supports_ach);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(capabilities_for("PayPal"), capabilities_for("paypal"));
        assert!(capabilities_for("PAYPAL").unwrap().requires_plans_for_subscriptions);
    }

    #[test]
    fn test_lookup_by_gateway() {
        let gateway = Gateway::new("gw_1", "church_1", "Square");
        let caps = capabilities_for(&gateway).unwrap();
        assert!(caps.supports_payment_method("gift_card"));
    }

    #[test]
    fn test_amount_limits() {
        let caps = capabilities_for(&ProviderKind::Stripe).unwrap();
        assert!(!caps.accepts_amount(49));
        assert!(caps.accepts_amount(50));
        assert!(!caps.accepts_amount(100_000_000));

        // No limits recorded
        let caps = capabilities_for(&ProviderKind::KingdomFunding).unwrap();
        assert!(caps.accepts_amount(1));
    }

    #[test]
    fn test_permits_follows_feature_flags() {
        let stripe = capabilities_for("stripe").unwrap();
        assert!(stripe.permits(OptionalOperation::VerifyBank));
        assert!(stripe.permits(OptionalOperation::CreateSetupIntent));
        assert!(!stripe.permits(OptionalOperation::CreateOrder));

        let paypal = capabilities_for("paypal").unwrap();
        assert!(paypal.permits(OptionalOperation::CreateOrder));
        assert!(!paypal.permits(OptionalOperation::CreateAchSetupIntent));

        let kingdom = capabilities_for("kingdomfunding").unwrap();
        assert!(!kingdom.permits(OptionalOperation::CreateCustomer));
        assert!(!kingdom.permits(OptionalOperation::CreateSubscriptionWithPlan));
        assert!(kingdom.permits(OptionalOperation::CreateProduct));
        assert!(kingdom.permits(OptionalOperation::UpdateDonationStatus));
    }

    #[test]
    fn test_refund_window() {
        let caps = capabilities_for("square").unwrap();
        assert!(caps.allows_refund_after(120));
        assert!(!caps.allows_refund_after(121));

        let caps = capabilities_for("kingdomfunding").unwrap();
        assert!(!caps.allows_refund_after(0));
    }
}
