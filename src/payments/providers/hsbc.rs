//! HSBC Secure ePayments (XML API) adapter
//!
//! Requests are `EngineDocList` documents whose text leaves all carry a `DataType`
//! attribute (`String` unless stated otherwise). A transaction succeeded when the
//! card processor answered with return code `00`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::HsbcConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::payments::attributes::{Attributes, Field};
use crate::payments::mapping::{FieldMap, WireTable};
use crate::payments::traits::{PaymentGateway, RequestBuilder, ResponseParser, WireRequest};
use crate::payments::transport::Transport;
use crate::payments::types::{
    CreditCard, Money, Outcome, ParsedResponse, Response, TransactionOptions,
};
use crate::payments::wire::xml::{XmlBuilder, XmlElement};

pub const DOC_VERSION: &str = "1.0";

const APPROVED_RETURN_CODE: &str = "00";

pub const REQUEST_FIELDS: WireTable = WireTable::new(&[
    ("Id", Field::OrderId),
    ("Number", Field::CardNumber),
    ("Expires", Field::ExpiryDate),
    ("Total", Field::Amount),
    ("PayerSecurityLevel", Field::PayerSecurityLevel),
    ("PayerAuthenticationCode", Field::PayerAuthenticationCode),
    ("PayerTxnId", Field::PayerTxnId),
    ("CardholderPresentCode", Field::CardholderPresentCode),
]);

/// Paths are relative to the `EngineDocList` root.
pub const RESPONSE_FIELDS: WireTable = WireTable::new(&[
    ("EngineDoc/DocumentId", Field::DocumentId),
    ("EngineDoc/OrderFormDoc/Id", Field::OrderId),
    ("EngineDoc/OrderFormDoc/Transaction/AuthCode", Field::AuthorizationCode),
    (
        "EngineDoc/OrderFormDoc/Transaction/CardProcResp/ProcReturnCode",
        Field::TransactionResult,
    ),
    ("EngineDoc/OrderFormDoc/FraudInfo/FraudResult", Field::FraudResult),
    ("EngineDoc/OrderFormDoc/FraudInfo/FraudResultCode", Field::FraudCode),
    ("EngineDoc/OrderFormDoc/FraudInfo/OrderScore", Field::FraudScore),
]);

pub const FIELD_MAP: FieldMap = FieldMap::new(REQUEST_FIELDS, RESPONSE_FIELDS);

const PAYER_FIELDS: &[Field] = &[
    Field::PayerSecurityLevel,
    Field::PayerAuthenticationCode,
    Field::PayerTxnId,
    Field::CardholderPresentCode,
];

/// ISO 4217 numeric code for the currencies the gateway accepts.
pub fn currency_code(currency: &str) -> GatewayResult<&'static str> {
    match currency {
        "EUR" => Ok("978"),
        "GBP" => Ok("826"),
        "USD" => Ok("840"),
        other => Err(GatewayError::unsupported_currency(other)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HsbcOperation {
    Authorize,
    Purchase,
    Capture,
    Void,
    Credit,
}

impl HsbcOperation {
    pub fn transaction_type(self) -> &'static str {
        match self {
            HsbcOperation::Authorize => "PreAuth",
            HsbcOperation::Purchase => "Auth",
            HsbcOperation::Capture => "PostAuth",
            HsbcOperation::Void => "Void",
            HsbcOperation::Credit => "Credit",
        }
    }

    fn carries_card(self) -> bool {
        matches!(
            self,
            HsbcOperation::Authorize | HsbcOperation::Purchase | HsbcOperation::Credit
        )
    }

    fn required_fields(self) -> &'static [Field] {
        match self {
            HsbcOperation::Authorize | HsbcOperation::Purchase => &[
                Field::OrderId,
                Field::CardNumber,
                Field::ExpiryDate,
                Field::Amount,
                Field::Currency,
            ],
            HsbcOperation::Capture | HsbcOperation::Void => &[Field::OrderId],
            HsbcOperation::Credit => &[
                Field::CardNumber,
                Field::ExpiryDate,
                Field::Amount,
                Field::Currency,
            ],
        }
    }
}

/// Emit the leaf mapped to `field` when the attribute set holds a value for it.
fn field_leaf(
    xml: &mut XmlBuilder,
    field: Field,
    attrs: &Attributes,
    attributes: &[(&str, &str)],
) -> GatewayResult<()> {
    if let (Some(key), Some(value)) = (FIELD_MAP.to_wire(field), attrs.get(field)) {
        xml.leaf_with(key, value, attributes)?;
    }
    Ok(())
}

pub struct HsbcRequestBuilder {
    client_id: String,
    name: String,
    password: String,
    pipeline: String,
    locale: String,
    mode: String,
}

impl HsbcRequestBuilder {
    pub fn new(config: &HsbcConfig) -> Self {
        Self {
            client_id: config.client_id.clone(),
            name: config.name.clone(),
            password: config.password.clone(),
            pipeline: config.pipeline.clone(),
            locale: config.locale.clone(),
            mode: config.mode().to_string(),
        }
    }

    fn order_form(
        &self,
        form: &mut XmlBuilder,
        operation: HsbcOperation,
        attrs: &Attributes,
    ) -> GatewayResult<()> {
        if operation != HsbcOperation::Credit {
            field_leaf(form, Field::OrderId, attrs, &[])?;
        }
        form.leaf("Mode", &self.mode)?;

        if operation.carries_card() {
            form.element("Consumer", |consumer| {
                consumer.element("PaymentMech", |mech| {
                    mech.leaf("Type", "CreditCard")?;
                    mech.element("CreditCard", |card| {
                        field_leaf(card, Field::CardNumber, attrs, &[])?;
                        field_leaf(
                            card,
                            Field::ExpiryDate,
                            attrs,
                            &[("DataType", "ExpirationDate"), ("Locale", self.locale.as_str())],
                        )
                    })?;
                    Ok(())
                })?;
                Ok(())
            })?;
        }

        form.element("Transaction", |transaction| {
            transaction.leaf("Type", operation.transaction_type())?;
            if operation.carries_card() {
                let currency = attrs.require(Field::Currency)?;
                transaction.element("CurrentTotals", |totals| {
                    totals.element("Totals", |totals| {
                        field_leaf(
                            totals,
                            Field::Amount,
                            attrs,
                            &[("DataType", "Money"), ("Currency", currency)],
                        )
                    })?;
                    Ok(())
                })?;
            }
            if operation != HsbcOperation::Credit {
                for field in PAYER_FIELDS {
                    field_leaf(transaction, *field, attrs, &[])?;
                }
            }
            Ok(())
        })?;
        Ok(())
    }
}

impl RequestBuilder for HsbcRequestBuilder {
    type Operation = HsbcOperation;

    fn build(&self, operation: HsbcOperation, attrs: &Attributes) -> GatewayResult<WireRequest> {
        for field in operation.required_fields() {
            attrs.require(*field)?;
        }

        let mut xml = XmlBuilder::with_leaf_default("DataType", "String");
        xml.element("EngineDocList", |xml| {
            xml.leaf("DocVersion", DOC_VERSION)?;
            xml.element("EngineDoc", |doc| {
                doc.leaf("ContentType", "OrderFormDoc")?;
                doc.element("User", |user| {
                    user.leaf_with("ClientId", &self.client_id, &[("DataType", "S32")])?
                        .leaf("Name", &self.name)?
                        .leaf("Password", &self.password)?;
                    Ok(())
                })?;
                doc.element("Instructions", |instructions| {
                    instructions.leaf("Pipeline", &self.pipeline)?;
                    Ok(())
                })?;
                doc.element("OrderFormDoc", |form| self.order_form(form, operation, attrs))?;
                Ok(())
            })?;
            Ok(())
        })?;

        Ok(WireRequest::body(xml.finish()?.to_xml_string(true)?))
    }
}

#[derive(Debug, Default)]
pub struct HsbcResponseParser;

impl ResponseParser for HsbcResponseParser {
    fn parse(&self, body: &str) -> GatewayResult<ParsedResponse> {
        let document = XmlElement::parse(body)?;

        let mut attributes = Attributes::new();
        let mut messages = Vec::new();

        if document.name == "EngineDocList" {
            for (path, field) in FIELD_MAP.response.entries() {
                if let Some(value) = document.find_text(path) {
                    attributes.set(field, value);
                }
            }
            messages = document
                .find_all("EngineDoc/MessageList/Message")
                .into_iter()
                .filter_map(|message| message.find_text("Text"))
                .collect();
        } else {
            warn!("HSBC response rooted at <{}>, expected EngineDocList", document.name);
        }

        let outcome = if attributes.transaction_result.as_deref() == Some(APPROVED_RETURN_CODE) {
            Outcome::Success
        } else {
            Outcome::Failure
        };

        Ok(ParsedResponse {
            outcome,
            message: messages.join(", "),
            attributes,
        })
    }
}

/// HSBC payment gateway
pub struct HsbcGateway {
    config: HsbcConfig,
    transport: Arc<dyn Transport>,
    builder: HsbcRequestBuilder,
    parser: HsbcResponseParser,
}

impl HsbcGateway {
    pub fn new(config: HsbcConfig, transport: Arc<dyn Transport>) -> GatewayResult<Self> {
        config.validate()?;

        info!(
            "HSBC gateway initialized for client {} (mode: {}, test: {})",
            config.client_id,
            config.mode(),
            config.test
        );

        Ok(Self {
            builder: HsbcRequestBuilder::new(&config),
            parser: HsbcResponseParser,
            config,
            transport,
        })
    }

    pub fn from_options(
        options: &HashMap<String, String>,
        transport: Arc<dyn Transport>,
    ) -> GatewayResult<Self> {
        Self::new(HsbcConfig::from_options(options)?, transport)
    }

    /// Send funds to a card without reference to an earlier order.
    pub async fn credit(
        &self,
        money: &Money,
        card: &CreditCard,
        _options: &TransactionOptions,
    ) -> GatewayResult<Response> {
        let attrs = card_attributes(money, card)?;
        self.commit(HsbcOperation::Credit, &attrs).await
    }

    async fn commit(&self, operation: HsbcOperation, attrs: &Attributes) -> GatewayResult<Response> {
        let request = self.builder.build(operation, attrs)?;

        debug!(
            "HSBC {} for order {}",
            operation.transaction_type(),
            attrs.order_id.as_deref().unwrap_or_default()
        );

        let body = self.transport.post(self.config.url(), &request.body).await?;
        let parsed = self.parser.parse(&body)?;

        if parsed.is_success() {
            info!("HSBC {} approved", operation.transaction_type());
        } else {
            warn!("HSBC {} declined: {}", operation.transaction_type(), parsed.message);
        }

        Ok(Response::from_parsed(
            parsed,
            Field::AuthorizationCode,
            self.config.test,
        ))
    }

    async fn authorization(
        &self,
        operation: HsbcOperation,
        money: &Money,
        card: &CreditCard,
        options: &TransactionOptions,
    ) -> GatewayResult<Response> {
        let mut attrs = card_attributes(money, card)?;
        attrs.set_opt(Field::OrderId, options.order_id.clone());
        attrs.set_opt(Field::PayerSecurityLevel, options.payer_security_level.clone());
        attrs.set_opt(
            Field::PayerAuthenticationCode,
            options.payer_authentication_code.clone(),
        );
        attrs.set_opt(Field::PayerTxnId, options.payer_txn_id.clone());
        attrs.set_opt(
            Field::CardholderPresentCode,
            options.cardholder_present_code.clone(),
        );
        self.commit(operation, &attrs).await
    }
}

fn card_attributes(money: &Money, card: &CreditCard) -> GatewayResult<Attributes> {
    Ok(Attributes::new()
        .with(Field::CardNumber, card.number.as_str())
        .with(
            Field::ExpiryDate,
            format!("{}/{}", card.two_digit_month(), card.two_digit_year()),
        )
        .with(Field::Amount, money.cents_string())
        .with(Field::Currency, currency_code(&money.currency)?))
}

fn reference_attributes(options: &TransactionOptions) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.set_opt(Field::OrderId, options.order_id.clone());
    attrs
}

#[async_trait]
impl PaymentGateway for HsbcGateway {
    fn name(&self) -> &'static str {
        "hsbc"
    }

    async fn authorize(
        &self,
        money: &Money,
        card: &CreditCard,
        options: &TransactionOptions,
    ) -> GatewayResult<Response> {
        self.authorization(HsbcOperation::Authorize, money, card, options)
            .await
    }

    async fn purchase(
        &self,
        money: &Money,
        card: &CreditCard,
        options: &TransactionOptions,
    ) -> GatewayResult<Response> {
        self.authorization(HsbcOperation::Purchase, money, card, options)
            .await
    }

    async fn capture(
        &self,
        _money: &Money,
        _authorization: &str,
        options: &TransactionOptions,
    ) -> GatewayResult<Response> {
        self.commit(HsbcOperation::Capture, &reference_attributes(options))
            .await
    }

    async fn void(
        &self,
        _authorization: &str,
        options: &TransactionOptions,
    ) -> GatewayResult<Response> {
        self.commit(HsbcOperation::Void, &reference_attributes(options))
            .await
    }
}
