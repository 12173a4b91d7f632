//! Portal entities carried as ledger payloads.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// An entity kept in an [`EntityStore`](crate::store::EntityStore) and
/// serialized as a ledger payload.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Human-readable kind, used in log fields.
    const KIND: &'static str;

    fn id(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faq {
    pub id: String,
    pub question: String,
    pub answer: String,
}

impl Entity for Faq {
    const KIND: &'static str = "faq";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsPosting {
    pub id: String,
    pub headline: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl Entity for NewsPosting {
    const KIND: &'static str = "news posting";

    fn id(&self) -> &str {
        &self.id
    }
}
