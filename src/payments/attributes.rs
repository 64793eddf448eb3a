//! Canonical attribute set
//!
//! Gateway-agnostic record of the payment fields that flow through requests and
//! responses. Every known field is an explicit optional slot; wire keys that have
//! no canonical counterpart are kept verbatim in `custom_info`.

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayResult};

macro_rules! canonical_fields {
    ($($variant:ident => $field:ident),* $(,)?) => {
        /// Semantic key of a canonical attribute.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum Field {
            $($variant),*
        }

        impl Field {
            pub const ALL: &'static [Field] = &[$(Field::$variant),*];

            /// snake_case name, used in validation errors and logs
            pub fn name(self) -> &'static str {
                match self {
                    $(Field::$variant => stringify!($field)),*
                }
            }
        }

        /// Typed canonical attribute set.
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        pub struct Attributes {
            $(
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<String>,
            )*
            /// Wire pairs with no canonical mapping, in the order they were seen.
            #[serde(default, skip_serializing_if = "Vec::is_empty")]
            pub custom_info: Vec<(String, String)>,
        }

        impl Attributes {
            pub fn get(&self, field: Field) -> Option<&str> {
                match field {
                    $(Field::$variant => self.$field.as_deref()),*
                }
            }

            fn slot_mut(&mut self, field: Field) -> &mut Option<String> {
                match field {
                    $(Field::$variant => &mut self.$field),*
                }
            }
        }
    };
}

canonical_fields! {
    Amount => amount,
    Currency => currency,
    CardNumber => card_number,
    ExpiryMonth => expiry_month,
    ExpiryYear => expiry_year,
    ExpiryDate => expiry_date,
    CardholderName => cardholder_name,
    CardholderEmail => cardholder_email,
    VerificationCode => verification_code,
    OrderId => order_id,
    TransactionId => transaction_id,
    MerchantId => merchant_id,
    MerchantReference => merchant_reference,
    CountryCode => country_code,
    LanguageCode => language_code,
    AuthorizationCode => authorization_code,
    ErrorCode => error_code,
    ErrorDescription => error_description,
    AlertCode => alert_code,
    AlertDescription => alert_description,
    AcsUrl => acs_url,
    Pareq => pareq,
    Pares => pares,
    Md => md,
    ThreeDSecureStatus => three_d_secure_status,
    AuthenticationIndicator => authentication_indicator,
    TransactionResult => transaction_result,
    RequestId => request_id,
    DocumentId => document_id,
    PaymentProductId => payment_product_id,
    PaymentMethodId => payment_method_id,
    PaymentReference => payment_reference,
    EffortId => effort_id,
    AttemptId => attempt_id,
    StatusId => status_id,
    AvsResult => avs_result,
    CvvResult => cvv_result,
    FraudResult => fraud_result,
    FraudCode => fraud_code,
    FraudScore => fraud_score,
    PayerSecurityLevel => payer_security_level,
    PayerAuthenticationCode => payer_authentication_code,
    PayerTxnId => payer_txn_id,
    CardholderPresentCode => cardholder_present_code,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, replacing any previous one. Empty strings count as absent.
    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let value = value.into();
        *self.slot_mut(field) = if value.is_empty() { None } else { Some(value) };
    }

    pub fn set_opt(&mut self, field: Field, value: Option<impl Into<String>>) {
        match value {
            Some(value) => self.set(field, value),
            None => self.clear(field),
        }
    }

    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    pub fn clear(&mut self, field: Field) {
        *self.slot_mut(field) = None;
    }

    pub fn contains(&self, field: Field) -> bool {
        self.get(field).is_some()
    }

    /// Value of a field that the current operation cannot do without.
    pub fn require(&self, field: Field) -> GatewayResult<&str> {
        self.get(field)
            .ok_or_else(|| GatewayError::missing_field(field.name()))
    }

    /// Fields holding a value, in `Field` declaration order.
    pub fn present(&self) -> impl Iterator<Item = (Field, &str)> + '_ {
        Field::ALL
            .iter()
            .filter_map(move |field| self.get(*field).map(|value| (*field, value)))
    }

    /// Keep an unmapped wire pair. A repeated key overwrites the earlier value in place.
    pub fn push_custom(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.custom_info.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.custom_info.push((key, value)),
        }
    }

    pub fn custom(&self, key: &str) -> Option<&str> {
        self.custom_info
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// `custom_info` rendered as `key=value` pairs joined by `separator`.
    pub fn custom_info_string(&self, separator: &str) -> String {
        self.custom_info
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(separator)
    }
}
