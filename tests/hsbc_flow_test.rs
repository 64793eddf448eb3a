//! HSBC document exchange against a scripted transport.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use card_gateways::config::HSBC_TEST_URL;
use card_gateways::payments::wire::xml::XmlElement;
use card_gateways::{
    GatewayError, HsbcConfig, HsbcGateway, Money, Outcome, PaymentGateway, TransactionOptions,
};
use common::{visa, ScriptedTransport};

fn engine_doc(return_code: &str, messages: &[&str]) -> String {
    let messages: String = messages
        .iter()
        .map(|text| format!("<Message><Text DataType=\"String\">{}</Text></Message>", text))
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <EngineDocList><EngineDoc><DocumentId>doc-9</DocumentId>\
         <MessageList>{}</MessageList>\
         <OrderFormDoc><Id>order_number_2</Id>\
         <FraudInfo><FraudResult>A</FraudResult><OrderScore>3</OrderScore></FraudInfo>\
         <Transaction><AuthCode>797220</AuthCode>\
         <CardProcResp><ProcReturnCode>{}</ProcReturnCode></CardProcResp>\
         </Transaction></OrderFormDoc></EngineDoc></EngineDocList>",
        messages, return_code
    )
}

fn gateway(transport: Arc<ScriptedTransport>) -> HsbcGateway {
    HsbcGateway::new(HsbcConfig::new("359", "prada", "ab123456", true), transport).unwrap()
}

fn transaction_type(body: &str) -> String {
    XmlElement::parse(body)
        .unwrap()
        .find_text("EngineDoc/OrderFormDoc/Transaction/Type")
        .unwrap()
}

#[tokio::test]
async fn test_purchase_posts_auth_document() {
    let transport = ScriptedTransport::new([engine_doc("00", &["Approved."])]);
    let gateway = gateway(transport.clone());

    let response = gateway
        .purchase(
            &Money::new(100, "GBP"),
            &visa(),
            &TransactionOptions::with_order_id("order_number_2"),
        )
        .await
        .unwrap();

    assert!(response.is_success());
    assert_eq!(response.message, "Approved.");
    assert_eq!(response.authorization.as_deref(), Some("797220"));
    assert_eq!(response.attributes.document_id.as_deref(), Some("doc-9"));
    assert_eq!(response.fraud_review().score.as_deref(), Some("3"));

    let requests = transport.requests();
    assert_eq!(requests[0].url(), HSBC_TEST_URL);
    let body = requests[0].body();
    assert!(body.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
    assert!(body.contains(r#"<Total DataType="Money" Currency="826">100</Total>"#));
    assert!(body.contains(r#"<Expires DataType="ExpirationDate" Locale="826">05/07</Expires>"#));
    assert_eq!(transaction_type(body), "Auth");
}

#[tokio::test]
async fn test_declined_messages_are_joined_in_order() {
    let transport = ScriptedTransport::new([engine_doc(
        "05",
        &["Insufficient permissions", "Card declined"],
    )]);
    let gateway = gateway(transport);

    let response = gateway
        .authorize(
            &Money::new(100, "EUR"),
            &visa(),
            &TransactionOptions::with_order_id("order_number_2"),
        )
        .await
        .unwrap();

    assert_eq!(response.outcome, Outcome::Failure);
    assert_eq!(response.message, "Insufficient permissions, Card declined");
}

#[tokio::test]
async fn test_capture_void_and_credit_types() {
    let transport = ScriptedTransport::new([
        engine_doc("00", &[]),
        engine_doc("00", &[]),
        engine_doc("00", &[]),
    ]);
    let gateway = gateway(transport.clone());
    let options = TransactionOptions::with_order_id("order_number_2");

    gateway
        .capture(&Money::new(100, "GBP"), "797220", &options)
        .await
        .unwrap();
    gateway.void("797220", &options).await.unwrap();
    gateway
        .credit(&Money::new(100, "USD"), &visa(), &TransactionOptions::default())
        .await
        .unwrap();

    let types: Vec<String> = transport
        .requests()
        .iter()
        .map(|r| transaction_type(r.body()))
        .collect();
    assert_eq!(types, vec!["PostAuth", "Void", "Credit"]);
    assert!(transport.requests()[2]
        .body()
        .contains(r#"Currency="840""#));
}

#[tokio::test]
async fn test_unknown_currency_is_rejected_before_sending() {
    let transport = ScriptedTransport::new(Vec::<String>::new());
    let gateway = gateway(transport.clone());

    let err = gateway
        .authorize(
            &Money::new(100, "JPY"),
            &visa(),
            &TransactionOptions::with_order_id("order_number_2"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::UnsupportedCurrency { ref currency } if currency == "JPY"));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_refund_is_not_offered() {
    let gateway = gateway(ScriptedTransport::new(Vec::<String>::new()));
    let err = gateway
        .refund(&Money::new(100, "GBP"), "797220", &TransactionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::UnsupportedOperation { gateway: "hsbc", .. }));
}

#[test]
fn test_from_options_names_missing_key() {
    let options: HashMap<String, String> = [("client_id", "359"), ("name", "prada")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let err = HsbcGateway::from_options(&options, ScriptedTransport::new(Vec::<String>::new()))
        .err()
        .unwrap();
    assert_eq!(
        err.to_string(),
        "Configuration error: Missing required parameter (password)"
    );
}
