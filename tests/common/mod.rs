//! Scripted in-memory transport shared by the gateway flow tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use card_gateways::payments::transport::Transport;
use card_gateways::{CardBrand, CreditCard, GatewayError, GatewayResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Post { url: String, body: String },
    Get { url: String },
}

impl Recorded {
    pub fn url(&self) -> &str {
        match self {
            Recorded::Post { url, .. } | Recorded::Get { url } => url,
        }
    }

    pub fn body(&self) -> &str {
        match self {
            Recorded::Post { body, .. } => body,
            Recorded::Get { .. } => "",
        }
    }
}

/// Replays canned bodies in order and records every request it receives.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<GatewayResult<String>>>,
    requests: Mutex<Vec<Recorded>>,
}

impl ScriptedTransport {
    pub fn new<I, S>(replies: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        let transport = Self::default();
        transport
            .replies
            .lock()
            .unwrap()
            .push_back(Err(GatewayError::transport(message)));
        Arc::new(transport)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    fn next_reply(&self, request: Recorded) -> GatewayResult<String> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::transport("no scripted reply left")))
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post(&self, url: &str, body: &str) -> GatewayResult<String> {
        self.next_reply(Recorded::Post {
            url: url.to_string(),
            body: body.to_string(),
        })
    }

    async fn get(&self, url: &str) -> GatewayResult<String> {
        self.next_reply(Recorded::Get {
            url: url.to_string(),
        })
    }
}

pub fn visa() -> CreditCard {
    CreditCard {
        number: "4567350000427977".to_string(),
        month: 5,
        year: 2007,
        first_name: "Ivan".to_string(),
        last_name: "Rossano Vaghi".to_string(),
        verification_value: Some("123".to_string()),
        brand: CardBrand::Visa,
    }
}
