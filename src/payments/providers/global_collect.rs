//! GlobalCollect WDL adapter
//!
//! Every call POSTs an `<XML><REQUEST>` document carrying an ACTION, a META block
//! identifying the merchant, and the action's PARAMS. Capture and refund are
//! multi-step: the order status is looked up first and each later step only runs
//! when the previous one reported `OK`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::GlobalCollectConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::payments::attributes::{Attributes, Field};
use crate::payments::fraud::apply_fraud_override;
use crate::payments::mapping::{FieldMap, WireTable};
use crate::payments::traits::{PaymentGateway, RequestBuilder, ResponseParser, WireRequest};
use crate::payments::transport::Transport;
use crate::payments::types::{
    CardBrand, CreditCard, Money, Outcome, ParsedResponse, Response, TransactionOptions,
};
use crate::payments::wire::xml::{XmlBuilder, XmlElement};

pub const VERSION: &str = "1.0";
pub const DEFAULT_CURRENCY: &str = "EUR";
pub const LANGUAGE: &str = "en";

/// EFFORTID values the gateway expects; the sign differs between capture and refund.
const CAPTURE_EFFORT_ID: &str = "1";
const REFUND_EFFORT_ID: &str = "-1";

const SUCCESS_RESULT: &str = "OK";

pub const MISSING_PRODUCT_ID: &str = "order status carries no PAYMENTPRODUCTID";
pub const MISSING_COUNTRY: &str = "order status carries no COUNTRYCODE";

pub const REQUEST_FIELDS: WireTable = WireTable::new(&[
    ("ORDERID", Field::OrderId),
    ("MERCHANTREFERENCE", Field::MerchantReference),
    ("EFFORTID", Field::EffortId),
    ("PAYMENTPRODUCTID", Field::PaymentProductId),
    ("AMOUNT", Field::Amount),
    ("CURRENCYCODE", Field::Currency),
    ("CREDITCARDNUMBER", Field::CardNumber),
    ("EXPIRYDATE", Field::ExpiryDate),
    ("COUNTRYCODE", Field::CountryCode),
    ("LANGUAGECODE", Field::LanguageCode),
    ("AUTHENTICATIONINDICATOR", Field::AuthenticationIndicator),
    ("PARES", Field::Pares),
    ("MD", Field::Md),
]);

/// Paths are relative to the RESPONSE element.
pub const RESPONSE_FIELDS: WireTable = WireTable::new(&[
    ("RESULT", Field::TransactionResult),
    ("META/REQUESTID", Field::RequestId),
    ("ERROR/CODE", Field::ErrorCode),
    ("ERROR/MESSAGE", Field::ErrorDescription),
    ("ROW/AUTHORISATIONCODE", Field::AuthorizationCode),
    ("ROW/FRAUDRESULT", Field::FraudResult),
    ("ROW/FRAUDCODE", Field::FraudCode),
    ("ROW/FRAUDNEURAL", Field::FraudScore),
    ("ROW/AVSRESULT", Field::AvsResult),
    ("ROW/CVVRESULT", Field::CvvResult),
    ("ROW/ACSURL", Field::AcsUrl),
    ("ROW/PAREQ", Field::Pareq),
    ("ROW/MD", Field::Md),
    ("ROW/PAYMENTPRODUCTID", Field::PaymentProductId),
    ("ROW/ORDERID", Field::OrderId),
    ("ROW/MERCHANTID", Field::MerchantId),
    ("ROW/ATTEMPTID", Field::AttemptId),
    ("ROW/EFFORTID", Field::EffortId),
    ("ROW/PAYMENTREFERENCE", Field::PaymentReference),
    ("ROW/MERCHANTREFERENCE", Field::MerchantReference),
    ("ROW/STATUSID", Field::StatusId),
    ("ROW/PAYMENTMETHODID", Field::PaymentMethodId),
    ("ROW/CURRENCYCODE", Field::Currency),
    ("ROW/AMOUNT", Field::Amount),
    ("ROW/COUNTRYCODE", Field::CountryCode),
]);

pub const FIELD_MAP: FieldMap = FieldMap::new(REQUEST_FIELDS, RESPONSE_FIELDS);

/// Payment product id GlobalCollect assigns to a card brand.
pub fn payment_product_id(brand: CardBrand) -> u32 {
    match brand {
        CardBrand::Visa => 1,
        CardBrand::AmericanExpress => 2,
        CardBrand::Master => 3,
        CardBrand::Switch => 117,
        CardBrand::Solo => 118,
        CardBrand::Dankort => 123,
        CardBrand::Laser => 124,
        CardBrand::Jcb => 125,
        CardBrand::Discover => 128,
    }
}

/// `MMYY`
fn expiry_date(card: &CreditCard) -> String {
    format!("{}{}", card.two_digit_month(), card.two_digit_year())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalCollectAction {
    InsertOrderWithPayment,
    SetPayment,
    GetOrderStatus,
    DoRefund,
    SetRefund,
    DoCheckEnrollment,
}

struct ParamsBlock {
    name: &'static str,
    fields: &'static [Field],
}

const CARD_PAYMENT_FIELDS: &[Field] = &[
    Field::PaymentProductId,
    Field::Amount,
    Field::Currency,
    Field::CardNumber,
    Field::ExpiryDate,
    Field::CountryCode,
    Field::LanguageCode,
    Field::AuthenticationIndicator,
    Field::Pares,
    Field::Md,
];

const CARD_REQUIRED: &[Field] = &[
    Field::OrderId,
    Field::CountryCode,
    Field::Amount,
    Field::Currency,
    Field::CardNumber,
    Field::ExpiryDate,
    Field::PaymentProductId,
];

impl GlobalCollectAction {
    pub fn name(self) -> &'static str {
        match self {
            GlobalCollectAction::InsertOrderWithPayment => "INSERT_ORDERWITHPAYMENT",
            GlobalCollectAction::SetPayment => "SET_PAYMENT",
            GlobalCollectAction::GetOrderStatus => "GET_ORDERSTATUS",
            GlobalCollectAction::DoRefund => "DO_REFUND",
            GlobalCollectAction::SetRefund => "SET_REFUND",
            GlobalCollectAction::DoCheckEnrollment => "DO_CHECKENROLLMENT",
        }
    }

    fn params(self) -> &'static [ParamsBlock] {
        match self {
            GlobalCollectAction::InsertOrderWithPayment => &[
                ParamsBlock {
                    name: "ORDER",
                    fields: &[
                        Field::OrderId,
                        Field::MerchantReference,
                        Field::Amount,
                        Field::Currency,
                        Field::CountryCode,
                        Field::LanguageCode,
                    ],
                },
                ParamsBlock {
                    name: "PAYMENT",
                    fields: CARD_PAYMENT_FIELDS,
                },
            ],
            GlobalCollectAction::SetPayment => &[ParamsBlock {
                name: "PAYMENT",
                fields: &[Field::OrderId, Field::EffortId, Field::PaymentProductId],
            }],
            GlobalCollectAction::GetOrderStatus => &[ParamsBlock {
                name: "ORDER",
                fields: &[Field::OrderId],
            }],
            GlobalCollectAction::DoRefund => &[ParamsBlock {
                name: "PAYMENT",
                fields: &[Field::OrderId, Field::CountryCode],
            }],
            GlobalCollectAction::SetRefund => &[ParamsBlock {
                name: "PAYMENT",
                fields: &[Field::OrderId, Field::PaymentProductId, Field::EffortId],
            }],
            GlobalCollectAction::DoCheckEnrollment => &[ParamsBlock {
                name: "PAYMENT",
                fields: &[
                    Field::Currency,
                    Field::CountryCode,
                    Field::OrderId,
                    Field::PaymentProductId,
                    Field::ExpiryDate,
                    Field::CardNumber,
                    Field::Amount,
                    Field::AuthenticationIndicator,
                ],
            }],
        }
    }

    fn required_fields(self) -> &'static [Field] {
        match self {
            GlobalCollectAction::InsertOrderWithPayment
            | GlobalCollectAction::DoCheckEnrollment => CARD_REQUIRED,
            GlobalCollectAction::SetPayment | GlobalCollectAction::SetRefund => {
                &[Field::OrderId, Field::PaymentProductId, Field::EffortId]
            }
            GlobalCollectAction::GetOrderStatus => &[Field::OrderId],
            GlobalCollectAction::DoRefund => &[Field::OrderId, Field::CountryCode],
        }
    }
}

pub struct GlobalCollectRequestBuilder {
    merchant: String,
    ip: String,
}

impl GlobalCollectRequestBuilder {
    pub fn new(merchant: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            merchant: merchant.into(),
            ip: ip.into(),
        }
    }
}

impl RequestBuilder for GlobalCollectRequestBuilder {
    type Operation = GlobalCollectAction;

    fn build(&self, action: GlobalCollectAction, attrs: &Attributes) -> GatewayResult<WireRequest> {
        for field in action.required_fields() {
            attrs.require(*field)?;
        }

        let mut xml = XmlBuilder::new();
        xml.element("XML", |xml| {
            xml.element("REQUEST", |xml| {
                xml.leaf("ACTION", action.name())?;
                xml.element("META", |meta| {
                    meta.leaf("MERCHANTID", &self.merchant)?
                        .leaf("IPADDRESS", &self.ip)?
                        .leaf("VERSION", VERSION)?;
                    Ok(())
                })?;
                xml.element("PARAMS", |params| {
                    for block in action.params() {
                        params.element(block.name, |block_xml| {
                            for field in block.fields {
                                let key = FIELD_MAP.to_wire(*field);
                                if let (Some(key), Some(value)) = (key, attrs.get(*field)) {
                                    block_xml.leaf(key, value)?;
                                }
                            }
                            Ok(())
                        })?;
                    }
                    Ok(())
                })?;
                Ok(())
            })?;
            Ok(())
        })?;

        Ok(WireRequest::body(xml.finish()?.to_xml_string(false)?))
    }
}

#[derive(Debug, Default)]
pub struct GlobalCollectResponseParser;

/// The RESPONSE element, either nested under `XML/REQUEST` or as the document root.
fn response_root(document: &XmlElement) -> Option<&XmlElement> {
    if document.name == "RESPONSE" {
        Some(document)
    } else {
        document.find("REQUEST/RESPONSE")
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl ResponseParser for GlobalCollectResponseParser {
    fn parse(&self, body: &str) -> GatewayResult<ParsedResponse> {
        let document = XmlElement::parse(body)?;

        let Some(response) = response_root(&document) else {
            warn!("GlobalCollect document <{}> has no RESPONSE element", document.name);
            return Ok(ParsedResponse {
                outcome: Outcome::Failure,
                message: String::new(),
                attributes: Attributes::new(),
            });
        };

        let mut attributes = Attributes::new();
        for (path, field) in FIELD_MAP.response.entries() {
            if let Some(value) = response.find_text(path) {
                attributes.set(field, value);
            }
        }

        if let Some(row) = response.child("ROW") {
            for element in row.elements() {
                if FIELD_MAP.to_canonical(&format!("ROW/{}", element.name)).is_none() {
                    attributes.push_custom(element.name.clone(), element.text().unwrap_or_default());
                }
            }
        }

        let message = attributes
            .error_description
            .as_deref()
            .map(collapse_whitespace)
            .unwrap_or_default();
        attributes.set(Field::ErrorDescription, message.clone());

        let outcome = if attributes.transaction_result.as_deref() == Some(SUCCESS_RESULT) {
            Outcome::Success
        } else {
            Outcome::Failure
        };

        Ok(ParsedResponse {
            outcome,
            message,
            attributes,
        })
    }
}

/// GlobalCollect payment gateway
pub struct GlobalCollectGateway {
    config: GlobalCollectConfig,
    transport: Arc<dyn Transport>,
    builder: GlobalCollectRequestBuilder,
    parser: GlobalCollectResponseParser,
}

impl GlobalCollectGateway {
    pub fn new(config: GlobalCollectConfig, transport: Arc<dyn Transport>) -> GatewayResult<Self> {
        config.validate()?;

        info!(
            "GlobalCollect gateway initialized for merchant {} (test: {}, 3-D Secure: {})",
            config.merchant, config.test, config.secure_3d
        );

        Ok(Self {
            builder: GlobalCollectRequestBuilder::new(config.merchant.clone(), config.ip.clone()),
            parser: GlobalCollectResponseParser,
            config,
            transport,
        })
    }

    pub fn from_options(
        options: &HashMap<String, String>,
        transport: Arc<dyn Transport>,
    ) -> GatewayResult<Self> {
        Self::new(GlobalCollectConfig::from_options(options)?, transport)
    }

    /// Finish an authorization after the cardholder returned from the issuer's
    /// 3-D Secure page.
    pub async fn complete_3d_secure(
        &self,
        money: &Money,
        card: &CreditCard,
        options: &TransactionOptions,
        pares: &str,
        md: &str,
    ) -> GatewayResult<Response> {
        let mut attrs = order_attributes(money, card, options);
        attrs.set(Field::AuthenticationIndicator, "1");
        attrs.set(Field::Pares, pares);
        attrs.set(Field::Md, md);
        attrs.require(Field::Pares)?;

        let parsed = self
            .round_trip(GlobalCollectAction::InsertOrderWithPayment, &attrs)
            .await?;
        Ok(self.respond(parsed))
    }

    async fn round_trip(
        &self,
        action: GlobalCollectAction,
        attrs: &Attributes,
    ) -> GatewayResult<ParsedResponse> {
        let request = self.builder.build(action, attrs)?;

        debug!(
            "GlobalCollect {} for order {}",
            action.name(),
            attrs.order_id.as_deref().unwrap_or_default()
        );

        let body = self.transport.post(self.config.url(), &request.body).await?;
        let parsed = self.parser.parse(&body)?;

        if parsed.is_success() {
            debug!("GlobalCollect {} succeeded", action.name());
        } else {
            warn!("GlobalCollect {} failed: {}", action.name(), parsed.message);
        }
        Ok(parsed)
    }

    async fn retrieve_order(&self, order_id: &str) -> GatewayResult<ParsedResponse> {
        let attrs = Attributes::new().with(Field::OrderId, order_id);
        self.round_trip(GlobalCollectAction::GetOrderStatus, &attrs)
            .await
    }

    async fn set_payment(&self, order_id: &str, product_id: &str) -> GatewayResult<Response> {
        let attrs = Attributes::new()
            .with(Field::OrderId, order_id)
            .with(Field::EffortId, CAPTURE_EFFORT_ID)
            .with(Field::PaymentProductId, product_id);

        let parsed = self.round_trip(GlobalCollectAction::SetPayment, &attrs).await?;
        Ok(self.respond(parsed))
    }

    fn respond(&self, parsed: ParsedResponse) -> Response {
        Response::from_parsed(parsed, Field::AuthorizationCode, self.config.test)
    }
}

fn order_attributes(money: &Money, card: &CreditCard, options: &TransactionOptions) -> Attributes {
    let currency = options
        .currency
        .clone()
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| {
            if money.currency.is_empty() {
                DEFAULT_CURRENCY.to_string()
            } else {
                money.currency.clone()
            }
        });

    let mut attrs = Attributes::new()
        .with(Field::Amount, money.cents_string())
        .with(Field::Currency, currency)
        .with(Field::LanguageCode, LANGUAGE)
        .with(Field::PaymentProductId, payment_product_id(card.brand).to_string())
        .with(Field::CardNumber, card.number.as_str())
        .with(Field::ExpiryDate, expiry_date(card));
    attrs.set_opt(Field::OrderId, options.order_id.clone());
    attrs.set_opt(
        Field::MerchantReference,
        options
            .merchant_reference
            .clone()
            .or_else(|| options.order_id.clone()),
    );
    attrs.set_opt(Field::CountryCode, options.country.clone());
    attrs
}

fn required_order_id(options: &TransactionOptions) -> GatewayResult<&str> {
    options
        .order_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| GatewayError::missing_field(Field::OrderId.name()))
}

#[async_trait]
impl PaymentGateway for GlobalCollectGateway {
    fn name(&self) -> &'static str {
        "global_collect"
    }

    async fn authorize(
        &self,
        money: &Money,
        card: &CreditCard,
        options: &TransactionOptions,
    ) -> GatewayResult<Response> {
        let attrs = order_attributes(money, card, options);

        if self.config.secure_3d {
            let mut enrollment_attrs = attrs.clone();
            enrollment_attrs.set(Field::AuthenticationIndicator, "1");

            let enrollment = self
                .round_trip(GlobalCollectAction::DoCheckEnrollment, &enrollment_attrs)
                .await?;
            if !enrollment.is_success() {
                return Ok(self.respond(enrollment));
            }
            if enrollment.attributes.acs_url.is_some() {
                info!(
                    "Card enrolled in 3-D Secure, order {} awaits the cardholder",
                    attrs.order_id.as_deref().unwrap_or_default()
                );
                return Ok(self.respond(ParsedResponse {
                    outcome: Outcome::PendingChallenge,
                    ..enrollment
                }));
            }
            debug!("Card not enrolled in 3-D Secure, authorizing directly");
        }

        let parsed = self
            .round_trip(GlobalCollectAction::InsertOrderWithPayment, &attrs)
            .await?;
        Ok(self.respond(parsed))
    }

    async fn purchase(
        &self,
        money: &Money,
        card: &CreditCard,
        options: &TransactionOptions,
    ) -> GatewayResult<Response> {
        let order_id = required_order_id(options)?;

        let authorization = self.authorize(money, card, options).await?;
        if authorization.is_pending() {
            return Ok(authorization);
        }

        let authorization = apply_fraud_override(authorization);
        if !authorization.is_success() {
            return Ok(authorization);
        }

        let product_id = payment_product_id(card.brand).to_string();
        self.set_payment(order_id, &product_id).await
    }

    /// The authorization argument is not checked; the order id in `options`
    /// identifies the payment.
    async fn capture(
        &self,
        _money: &Money,
        _authorization: &str,
        options: &TransactionOptions,
    ) -> GatewayResult<Response> {
        let order_id = required_order_id(options)?;

        let order = self.retrieve_order(order_id).await?;
        if !order.is_success() {
            info!("Order {} lookup failed, capture not attempted", order_id);
            return Ok(self.respond(order));
        }

        let Some(product_id) = order.attributes.payment_product_id.clone() else {
            warn!("Order {} status has no payment product, capture not attempted", order_id);
            return Ok(self.respond(order).into_failure(MISSING_PRODUCT_ID));
        };

        self.set_payment(order_id, &product_id).await
    }

    /// `authorization` is the order id.
    async fn refund(
        &self,
        _money: &Money,
        authorization: &str,
        options: &TransactionOptions,
    ) -> GatewayResult<Response> {
        if authorization.is_empty() {
            return Err(GatewayError::missing_field(Field::OrderId.name()));
        }

        let order = self.retrieve_order(authorization).await?;
        if !order.is_success() {
            info!("Order {} lookup failed, refund not attempted", authorization);
            return Ok(self.respond(order));
        }

        let Some(product_id) = order.attributes.payment_product_id.clone() else {
            warn!("Order {} status has no payment product, refund not attempted", authorization);
            return Ok(self.respond(order).into_failure(MISSING_PRODUCT_ID));
        };
        let country = options
            .country
            .clone()
            .filter(|c| !c.is_empty())
            .or_else(|| order.attributes.country_code.clone());
        let Some(country) = country else {
            warn!("No country known for order {}, refund not attempted", authorization);
            return Ok(self.respond(order).into_failure(MISSING_COUNTRY));
        };

        let do_refund = Attributes::new()
            .with(Field::OrderId, authorization)
            .with(Field::CountryCode, country);
        let requested = self
            .round_trip(GlobalCollectAction::DoRefund, &do_refund)
            .await?;
        if !requested.is_success() {
            return Ok(self.respond(requested));
        }

        let set_refund = Attributes::new()
            .with(Field::OrderId, authorization)
            .with(Field::EffortId, REFUND_EFFORT_ID)
            .with(Field::PaymentProductId, product_id);

        let parsed = self
            .round_trip(GlobalCollectAction::SetRefund, &set_refund)
            .await?;
        Ok(self.respond(parsed))
    }
}
