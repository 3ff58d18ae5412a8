use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of auditing one address.
///
/// The body is opaque to the runner; writers serialize it as they see fit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultDocument {
    /// Address the document was produced for.
    pub address: String,
    /// Job-defined payload.
    pub body: Value,
}

impl ResultDocument {
    pub fn new(address: impl Into<String>, body: Value) -> Self {
        Self {
            address: address.into(),
            body,
        }
    }
}
