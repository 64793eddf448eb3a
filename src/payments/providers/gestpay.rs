//! Gestpay (Banca Sella) server-to-server adapter
//!
//! Requests travel as a `*P1*`-delimited pair sequence in the `b` query parameter
//! of an HTTPS GET, next to the shop login (`a`) and protocol version (`c`).
//! Responses wrap the same pair format in `#answerstring#` envelope markers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::GestpayConfig;
use crate::error::GatewayResult;
use crate::payments::attributes::{Attributes, Field};
use crate::payments::mapping::{FieldMap, WireTable};
use crate::payments::traits::{PaymentGateway, RequestBuilder, ResponseParser, WireRequest};
use crate::payments::transport::Transport;
use crate::payments::types::{
    CreditCard, Money, Outcome, ParsedResponse, Response, TransactionOptions,
};
use crate::payments::wire::delimited::{encode_component, DelimitedFormat, Envelope};

pub const SEPARATOR: &str = "*P1*";
pub const VERSION: &str = "S3.1.0";
/// UIC code of the euro, the only currency the integration sends.
pub const UIC_EURO: &str = "242";

pub const FORMAT: DelimitedFormat = DelimitedFormat::new(SEPARATOR);

pub const REQUEST_FIELDS: WireTable = WireTable::new(&[
    ("PAY1_SHOPTRANSACTIONID", Field::OrderId),
    ("PAY1_CVV", Field::VerificationCode),
    ("PAY1_UICCODE", Field::Currency),
    ("PAY1_CHNAME", Field::CardholderName),
    ("PAY1_EXPMONTH", Field::ExpiryMonth),
    ("PAY1_AMOUNT", Field::Amount),
    ("PAY1_EXPYEAR", Field::ExpiryYear),
    ("PAY1_CARDNUMBER", Field::CardNumber),
    ("PAY1_BANKTRANSACTIONID", Field::TransactionId),
]);

pub const RESPONSE_FIELDS: WireTable = WireTable::new(&[
    ("PAY1_TRANSACTIONRESULT", Field::TransactionResult),
    ("PAY1_SHOPTRANSACTIONID", Field::OrderId),
    ("PAY1_BANKTRANSACTIONID", Field::TransactionId),
    ("PAY1_UICCODE", Field::Currency),
    ("PAY1_AMOUNT", Field::Amount),
    ("PAY1_AUTHORIZATIONCODE", Field::AuthorizationCode),
    ("PAY1_ERRORCODE", Field::ErrorCode),
    ("PAY1_ERRORDESCRIPTION", Field::ErrorDescription),
    ("PAY1_VBVRISP", Field::Pareq),
    ("PAY1_COUNTRY", Field::CountryCode),
    ("PAY1_VBV", Field::ThreeDSecureStatus),
    ("PAY1_ALERTCODE", Field::AlertCode),
    ("PAY1_ALERTDESCRIPTION", Field::AlertDescription),
    ("PAY1_CHEMAIL", Field::CardholderEmail),
    ("PAY1_CHNAME", Field::CardholderName),
]);

pub const FIELD_MAP: FieldMap = FieldMap::new(REQUEST_FIELDS, RESPONSE_FIELDS);

const SUCCESS_RESULT: &str = "OK";

pub const MISSING_BANK_TRANSACTION_ID: &str = "authorization carries no PAY1_BANKTRANSACTIONID";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestpayOperation {
    Authorize,
    Capture,
    Void,
    Refund,
    Renounce,
}

impl GestpayOperation {
    pub fn page(self) -> &'static str {
        match self {
            GestpayOperation::Authorize => "PAGAMS2S.asp",
            GestpayOperation::Capture => "settles2s.asp",
            GestpayOperation::Void => "deletes2s.asp",
            GestpayOperation::Refund => "refunds2s.asp",
            GestpayOperation::Renounce => "Renounces2s.asp",
        }
    }

    fn required_fields(self) -> &'static [Field] {
        match self {
            GestpayOperation::Authorize => &[
                Field::OrderId,
                Field::Amount,
                Field::CardNumber,
                Field::ExpiryMonth,
                Field::ExpiryYear,
            ],
            GestpayOperation::Capture | GestpayOperation::Refund => {
                &[Field::OrderId, Field::Amount, Field::TransactionId]
            }
            GestpayOperation::Void | GestpayOperation::Renounce => {
                &[Field::OrderId, Field::TransactionId]
            }
        }
    }
}

pub struct GestpayRequestBuilder {
    shop_login: String,
}

impl GestpayRequestBuilder {
    pub fn new(shop_login: impl Into<String>) -> Self {
        Self {
            shop_login: shop_login.into(),
        }
    }
}

impl RequestBuilder for GestpayRequestBuilder {
    type Operation = GestpayOperation;

    fn build(&self, operation: GestpayOperation, attrs: &Attributes) -> GatewayResult<WireRequest> {
        for field in operation.required_fields() {
            attrs.require(*field)?;
        }

        Ok(WireRequest {
            body: FORMAT.encode(attrs, &FIELD_MAP.request),
            query: vec![
                ("a", encode_component(&self.shop_login)),
                ("c", encode_component(VERSION)),
            ],
        })
    }
}

pub struct GestpayResponseParser {
    challenge_base: String,
    shop_login: String,
}

impl GestpayResponseParser {
    pub fn new(host: &str, shop_login: impl Into<String>) -> Self {
        Self {
            challenge_base: format!("https://{}/gestpay/pagamvisa3d.asp", host),
            shop_login: shop_login.into(),
        }
    }

    /// Address of the Verified-by-Visa page; the caller appends `&c=<return url>`.
    fn challenge_url(&self, vbv_risp: &str) -> String {
        format!(
            "{}?a={}&b={}",
            self.challenge_base,
            encode_component(&self.shop_login),
            encode_component(vbv_risp)
        )
    }
}

/// Gestpay reports "no error" as a literal zero code.
fn is_zero_code(code: &str) -> bool {
    let code = code.trim();
    !code.is_empty() && code.chars().all(|c| c == '0')
}

impl ResponseParser for GestpayResponseParser {
    fn parse(&self, body: &str) -> GatewayResult<ParsedResponse> {
        let envelope = Envelope::extract(body)?;
        let mut attributes = FORMAT.decode(&envelope.answer, &FIELD_MAP.response);

        if attributes.error_code.as_deref().is_some_and(is_zero_code) {
            attributes.clear(Field::ErrorCode);
            attributes.clear(Field::ErrorDescription);
        }

        let outcome = if attributes.transaction_result.as_deref() == Some(SUCCESS_RESULT) {
            Outcome::Success
        } else if let Some(vbv_risp) = attributes.pareq.clone() {
            attributes.set(Field::AcsUrl, self.challenge_url(&vbv_risp));
            Outcome::PendingChallenge
        } else {
            Outcome::Failure
        };

        let message = attributes
            .error_description
            .clone()
            .or(envelope.result_description)
            .unwrap_or_default();

        Ok(ParsedResponse {
            outcome,
            message,
            attributes,
        })
    }
}

/// Gestpay payment gateway
pub struct GestpayGateway {
    config: GestpayConfig,
    transport: Arc<dyn Transport>,
    builder: GestpayRequestBuilder,
    parser: GestpayResponseParser,
}

impl GestpayGateway {
    pub fn new(config: GestpayConfig, transport: Arc<dyn Transport>) -> GatewayResult<Self> {
        config.validate()?;

        info!(
            "Gestpay gateway initialized for shop {} (test: {})",
            config.shop_login, config.test
        );

        Ok(Self {
            builder: GestpayRequestBuilder::new(config.shop_login.clone()),
            parser: GestpayResponseParser::new(config.host(), config.shop_login.clone()),
            config,
            transport,
        })
    }

    pub fn from_options(
        options: &HashMap<String, String>,
        transport: Arc<dyn Transport>,
    ) -> GatewayResult<Self> {
        Self::new(GestpayConfig::from_options(options)?, transport)
    }

    /// Give up an authorization the merchant will never settle.
    pub async fn renounce(
        &self,
        authorization: &str,
        options: &TransactionOptions,
    ) -> GatewayResult<Response> {
        let attrs = reference_attributes(authorization, options);
        self.commit(GestpayOperation::Renounce, &attrs).await
    }

    fn url(&self, operation: GestpayOperation, request: &WireRequest) -> String {
        format!(
            "https://{}/Gestpay/{}?a={}&b={}&c={}",
            self.config.host(),
            operation.page(),
            request.query_param("a").unwrap_or_default(),
            request.body,
            request.query_param("c").unwrap_or_default()
        )
    }

    async fn commit(
        &self,
        operation: GestpayOperation,
        attrs: &Attributes,
    ) -> GatewayResult<Response> {
        let request = self.builder.build(operation, attrs)?;

        debug!(
            "Gestpay {:?} for shop transaction {}",
            operation,
            attrs.order_id.as_deref().unwrap_or_default()
        );

        let body = self.transport.get(&self.url(operation, &request)).await?;
        let parsed = self.parser.parse(&body)?;

        match parsed.outcome {
            Outcome::Success => info!("Gestpay {:?} succeeded", operation),
            Outcome::PendingChallenge => info!("Gestpay {:?} requires 3-D Secure", operation),
            Outcome::Failure => warn!("Gestpay {:?} failed: {}", operation, parsed.message),
        }

        Ok(Response::from_parsed(
            parsed,
            Field::TransactionId,
            self.config.test,
        ))
    }
}

fn card_attributes(card: &CreditCard) -> Attributes {
    let mut attrs = Attributes::new()
        .with(Field::CardNumber, card.number.as_str())
        .with(Field::ExpiryMonth, card.two_digit_month())
        .with(Field::ExpiryYear, card.two_digit_year())
        .with(Field::CardholderName, card.name());
    attrs.set_opt(Field::VerificationCode, card.verification_value.clone());
    attrs
}

fn reference_attributes(authorization: &str, options: &TransactionOptions) -> Attributes {
    let mut attrs = Attributes::new()
        .with(Field::TransactionId, authorization)
        .with(Field::Currency, UIC_EURO);
    attrs.set_opt(Field::OrderId, options.order_id.clone());
    attrs
}

#[async_trait]
impl PaymentGateway for GestpayGateway {
    fn name(&self) -> &'static str {
        "gestpay"
    }

    async fn authorize(
        &self,
        money: &Money,
        card: &CreditCard,
        options: &TransactionOptions,
    ) -> GatewayResult<Response> {
        let mut attrs = card_attributes(card);
        attrs.set(Field::Amount, money.decimal_string());
        attrs.set(Field::Currency, UIC_EURO);
        attrs.set_opt(Field::OrderId, options.order_id.clone());

        self.commit(GestpayOperation::Authorize, &attrs).await
    }

    async fn purchase(
        &self,
        money: &Money,
        card: &CreditCard,
        options: &TransactionOptions,
    ) -> GatewayResult<Response> {
        let authorization = self.authorize(money, card, options).await?;
        if !authorization.is_success() {
            return Ok(authorization);
        }
        let Some(reference) = authorization.authorization.clone() else {
            warn!("Gestpay authorization succeeded without a bank transaction id, not settling");
            return Ok(authorization.into_failure(MISSING_BANK_TRANSACTION_ID));
        };
        self.capture(money, &reference, options).await
    }

    async fn capture(
        &self,
        money: &Money,
        authorization: &str,
        options: &TransactionOptions,
    ) -> GatewayResult<Response> {
        let mut attrs = reference_attributes(authorization, options);
        attrs.set(Field::Amount, money.decimal_string());
        self.commit(GestpayOperation::Capture, &attrs).await
    }

    async fn void(
        &self,
        authorization: &str,
        options: &TransactionOptions,
    ) -> GatewayResult<Response> {
        let attrs = reference_attributes(authorization, options);
        self.commit(GestpayOperation::Void, &attrs).await
    }

    async fn refund(
        &self,
        money: &Money,
        authorization: &str,
        options: &TransactionOptions,
    ) -> GatewayResult<Response> {
        let mut attrs = reference_attributes(authorization, options);
        attrs.set(Field::Amount, money.decimal_string());
        self.commit(GestpayOperation::Refund, &attrs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;

    fn envelope(answer: &str) -> String {
        format!(
            "<html><body>#resultcode#0#/resultcode#\
             #resultdescription#Transazione correttamente effettuata#/resultdescription#\
             #answerstring#{}#/answerstring#</body></html>",
            answer
        )
    }

    fn parser() -> GestpayResponseParser {
        GestpayResponseParser::new("testecomm.sella.it", "GESPAY46234")
    }

    #[test]
    fn test_serializes_in_declared_order() {
        let attrs = Attributes::new()
            .with(Field::OrderId, "order_number_2")
            .with(Field::VerificationCode, "123")
            .with(Field::Currency, "242")
            .with(Field::CardholderName, "Ivan Rossano Vaghi")
            .with(Field::ExpiryMonth, "05")
            .with(Field::Amount, "1.1")
            .with(Field::ExpiryYear, "07")
            .with(Field::CardNumber, "4567350000427977");

        let request = GestpayRequestBuilder::new("GESPAY46234")
            .build(GestpayOperation::Authorize, &attrs)
            .unwrap();

        assert_eq!(
            request.body,
            "PAY1_SHOPTRANSACTIONID=order_number_2*P1*PAY1_CVV=123*P1*PAY1_UICCODE=242\
             *P1*PAY1_CHNAME=Ivan+Rossano+Vaghi*P1*PAY1_EXPMONTH=05*P1*PAY1_AMOUNT=1.1\
             *P1*PAY1_EXPYEAR=07*P1*PAY1_CARDNUMBER=4567350000427977"
        );
        assert_eq!(request.query_param("a"), Some("GESPAY46234"));
        assert_eq!(request.query_param("c"), Some("S3.1.0"));
    }

    #[test]
    fn test_missing_order_id_fails_before_serializing() {
        let attrs = Attributes::new()
            .with(Field::Amount, "1.00")
            .with(Field::TransactionId, "77");
        let err = GestpayRequestBuilder::new("shop")
            .build(GestpayOperation::Capture, &attrs)
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation { ref field } if field == "order_id"));
    }

    #[test]
    fn test_mapped_fields_round_trip() {
        let attrs = Attributes::new()
            .with(Field::OrderId, "A B*C")
            .with(Field::Amount, "12.50")
            .with(Field::CardholderName, "Zoë d'Arco")
            .with(Field::TransactionId, "998877");
        let wire = FORMAT.encode(&attrs, &REQUEST_FIELDS);
        assert_eq!(FORMAT.decode(&wire, &REQUEST_FIELDS), attrs);
    }

    #[test]
    fn test_unknown_keys_survive_reserialization() {
        let payload = "PAY1_SHOPTRANSACTIONID=9*P1*PAY1_NEWFIELD=x*P1*PAY1_OTHER=y";
        let attrs = FORMAT.decode(payload, &REQUEST_FIELDS);
        assert_eq!(attrs.custom_info_string(SEPARATOR), "PAY1_NEWFIELD=x*P1*PAY1_OTHER=y");
        assert_eq!(FORMAT.encode(&attrs, &REQUEST_FIELDS), payload);
    }

    #[test]
    fn test_successful_response_clears_zero_error_code() {
        let body = envelope(
            "PAY1_TRANSACTIONRESULT=OK*P1*PAY1_SHOPTRANSACTIONID=123*P1*PAY1_BANKTRANSACTIONID=456\
             *P1*PAY1_AUTHORIZATIONCODE=A1*P1*PAY1_ERRORCODE=0\
             *P1*PAY1_ERRORDESCRIPTION=Transazione+correttamente+effettuata",
        );
        let parsed = parser().parse(&body).unwrap();
        assert_eq!(parsed.outcome, Outcome::Success);
        assert_eq!(parsed.attributes.error_code, None);
        assert_eq!(parsed.attributes.error_description, None);
        assert_eq!(parsed.attributes.transaction_id.as_deref(), Some("456"));
        assert_eq!(parsed.message, "Transazione correttamente effettuata");
    }

    #[test]
    fn test_ko_result_is_failure_regardless_of_other_fields() {
        let body = envelope(
            "PAY1_TRANSACTIONRESULT=KO*P1*PAY1_AUTHORIZATIONCODE=A1*P1*PAY1_ERRORCODE=1142\
             *P1*PAY1_ERRORDESCRIPTION=Carta+non+valida",
        );
        let parsed = parser().parse(&body).unwrap();
        assert_eq!(parsed.outcome, Outcome::Failure);
        assert_eq!(parsed.message, "Carta non valida");
        assert_eq!(parsed.attributes.error_code.as_deref(), Some("1142"));
    }

    #[test]
    fn test_vbv_response_is_pending_challenge() {
        let body = envelope(
            "PAY1_TRANSACTIONRESULT=KO*P1*PAY1_ERRORCODE=8006\
             *P1*PAY1_ERRORDESCRIPTION=Verified+By+Visa*P1*PAY1_VBVRISP=abc123",
        );
        let parsed = parser().parse(&body).unwrap();
        assert_eq!(parsed.outcome, Outcome::PendingChallenge);
        assert_eq!(
            parsed.attributes.acs_url.as_deref(),
            Some("https://testecomm.sella.it/gestpay/pagamvisa3d.asp?a=GESPAY46234&b=abc123")
        );
    }

    #[test]
    fn test_unknown_response_keys_land_in_custom_info() {
        let body = envelope("PAY1_TRANSACTIONRESULT=OK*P1*PAY1_TOKEN=tk%3D1");
        let parsed = parser().parse(&body).unwrap();
        assert_eq!(parsed.attributes.custom("PAY1_TOKEN"), Some("tk=1"));
    }

    #[test]
    fn test_body_without_envelope_is_malformed() {
        let err = parser().parse("<html>500</html>").unwrap_err();
        assert!(matches!(err, GatewayError::MalformedResponse { .. }));
    }
}
