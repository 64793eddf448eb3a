//! Fraud-review business rule layered on top of wire-level results.

use tracing::warn;

use crate::payments::types::{Outcome, Response};

/// Fraud result code of an authorization held for manual review.
pub const CHALLENGED_FRAUD_RESULT: &str = "C";

pub const CHALLENGED_MESSAGE: &str = "CAN'T CAPTURE, CHALLENGED AUTHORIZATION";

/// Downgrade a successful authorization whose fraud review is "challenged" to a
/// failure with a fixed message. Every other response is returned unchanged.
pub fn apply_fraud_override(response: Response) -> Response {
    let challenged = response.attributes.fraud_result.as_deref() == Some(CHALLENGED_FRAUD_RESULT);
    if !response.is_success() || !challenged {
        return response;
    }

    warn!(
        "Authorization {:?} challenged by fraud review, refusing to capture",
        response.authorization
    );
    Response {
        outcome: Outcome::Failure,
        message: CHALLENGED_MESSAGE.to_string(),
        ..response
    }
}
