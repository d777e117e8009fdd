use serde::{Deserialize, Serialize};
use std::fmt;

/// An API key issued by the wallet platform.
///
/// Keys are secrets, so `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(****)")
    }
}

impl From<&str> for ApiKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// One of the operator's wallets with its two keys.
///
/// The admin key authorizes mutations, the invoice key is read-capable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: String,
    pub adminkey: ApiKey,
    pub inkey: ApiKey,
}

impl Wallet {
    pub fn new(id: impl Into<String>, adminkey: impl Into<String>, inkey: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            adminkey: ApiKey::new(adminkey),
            inkey: ApiKey::new(inkey),
        }
    }
}
