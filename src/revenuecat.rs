//! RevenueCat webhook envelope.
//!
//! Only the fields the reconciler reads are typed. Everything else in the
//! event object lands in `extra`, and the untouched request body is kept
//! alongside so it can be stored for audit.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;

/// Event types RevenueCat may deliver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    InitialPurchase,
    Renewal,
    Cancellation,
    Uncancellation,
    NonRenewingPurchase,
    SubscriptionPaused,
    Expiration,
    ProductChange,
    BillingIssue,
    Refund,
    RefundReversed,
    Transfer,
    SubscriptionExtended,
    TrialStarted,
    TrialCancelled,
    InvoiceIssuance,
    TemporaryEntitlementGrant,
    VirtualCurrencyTransaction,
    Test,
    /// Anything this build does not know about yet.
    Other(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::InitialPurchase => "INITIAL_PURCHASE",
            EventType::Renewal => "RENEWAL",
            EventType::Cancellation => "CANCELLATION",
            EventType::Uncancellation => "UNCANCELLATION",
            EventType::NonRenewingPurchase => "NON_RENEWING_PURCHASE",
            EventType::SubscriptionPaused => "SUBSCRIPTION_PAUSED",
            EventType::Expiration => "EXPIRATION",
            EventType::ProductChange => "PRODUCT_CHANGE",
            EventType::BillingIssue => "BILLING_ISSUE",
            EventType::Refund => "REFUND",
            EventType::RefundReversed => "REFUND_REVERSED",
            EventType::Transfer => "TRANSFER",
            EventType::SubscriptionExtended => "SUBSCRIPTION_EXTENDED",
            EventType::TrialStarted => "TRIAL_STARTED",
            EventType::TrialCancelled => "TRIAL_CANCELLED",
            EventType::InvoiceIssuance => "INVOICE_ISSUANCE",
            EventType::TemporaryEntitlementGrant => "TEMPORARY_ENTITLEMENT_GRANT",
            EventType::VirtualCurrencyTransaction => "VIRTUAL_CURRENCY_TRANSACTION",
            EventType::Test => "TEST",
            EventType::Other(s) => s.as_str(),
        }
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "INITIAL_PURCHASE" => EventType::InitialPurchase,
            "RENEWAL" => EventType::Renewal,
            "CANCELLATION" => EventType::Cancellation,
            "UNCANCELLATION" => EventType::Uncancellation,
            "NON_RENEWING_PURCHASE" => EventType::NonRenewingPurchase,
            "SUBSCRIPTION_PAUSED" => EventType::SubscriptionPaused,
            "EXPIRATION" => EventType::Expiration,
            "PRODUCT_CHANGE" => EventType::ProductChange,
            "BILLING_ISSUE" => EventType::BillingIssue,
            "REFUND" => EventType::Refund,
            "REFUND_REVERSED" => EventType::RefundReversed,
            "TRANSFER" => EventType::Transfer,
            "SUBSCRIPTION_EXTENDED" => EventType::SubscriptionExtended,
            "TRIAL_STARTED" => EventType::TrialStarted,
            "TRIAL_CANCELLED" => EventType::TrialCancelled,
            "INVOICE_ISSUANCE" => EventType::InvoiceIssuance,
            "TEMPORARY_ENTITLEMENT_GRANT" => EventType::TemporaryEntitlementGrant,
            "VIRTUAL_CURRENCY_TRANSACTION" => EventType::VirtualCurrencyTransaction,
            "TEST" => EventType::Test,
            _ => EventType::Other(s),
        }
    }
}

impl From<EventType> for String {
    fn from(t: EventType) -> Self {
        t.as_str().to_string()
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(EventType::from)
    }
}

impl Serialize for EventType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `event` object inside a webhook envelope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type", default)]
    pub event_type: Option<EventType>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub app_user_id: Option<String>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    /// Epoch milliseconds in practice, but strings are tolerated.
    #[serde(default)]
    pub event_timestamp_ms: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A RevenueCat webhook delivery
#[derive(Debug, Clone)]
pub struct WebhookEnvelope {
    pub api_version: Option<String>,
    pub event: WebhookEvent,
    /// The request body exactly as received
    pub payload: serde_json::Value,
}

#[derive(Deserialize)]
struct EnvelopeShape {
    #[serde(default)]
    api_version: Option<String>,
    event: WebhookEvent,
}

impl WebhookEnvelope {
    /// Parse a delivery body. Fails only when the body is not an object
    /// carrying an `event` object.
    pub fn from_value(payload: serde_json::Value) -> Result<Self, LedgerError> {
        if !payload.is_object() {
            return Err(LedgerError::MalformedEnvelope(
                "payload is not a JSON object".to_string(),
            ));
        }

        let shape = EnvelopeShape::deserialize(&payload)
            .map_err(|e| LedgerError::MalformedEnvelope(e.to_string()))?;

        Ok(Self {
            api_version: shape.api_version,
            event: shape.event,
            payload,
        })
    }

    /// Event type string for logging, `"Unknown"` when absent
    pub fn event_type_label(&self) -> &str {
        self.event
            .event_type
            .as_ref()
            .map(EventType::as_str)
            .unwrap_or("Unknown")
    }
}

/// Typed view of the free-text `app_user_id` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppUserId {
    Valid(Uuid),
    Unparseable(String),
    Missing,
}

impl AppUserId {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None => AppUserId::Missing,
            Some(s) if s.is_empty() => AppUserId::Missing,
            Some(s) => match Uuid::parse_str(s) {
                Ok(id) => AppUserId::Valid(id),
                Err(_) => AppUserId::Unparseable(s.to_string()),
            },
        }
    }
}

/// Resolve the event time from `event_timestamp_ms`.
///
/// Numbers are epoch milliseconds. Strings are tried as RFC 3339, then as
/// other ISO-8601 forms (minute precision, basic format, date only). Forms
/// without an offset are taken to be UTC. Anything else, including zero
/// and out-of-range values, falls back to `received_at`.
pub fn parse_event_timestamp(
    raw: Option<&serde_json::Value>,
    received_at: DateTime<Utc>,
) -> DateTime<Utc> {
    let parsed = match raw {
        Some(serde_json::Value::Number(n)) => {
            if let Some(ms) = n.as_i64() {
                if ms == 0 {
                    None
                } else {
                    DateTime::from_timestamp_millis(ms)
                }
            } else {
                n.as_f64()
                    .filter(|ms| ms.is_finite() && *ms != 0.0)
                    .and_then(|ms| DateTime::from_timestamp_millis(ms.trunc() as i64))
            }
        }
        Some(serde_json::Value::String(s)) => parse_iso_timestamp(s),
        _ => None,
    };

    parsed.unwrap_or(received_at)
}

/// Offset-carrying forms RFC 3339 rejects (minute precision, space separator)
const OFFSET_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M%:z",
];

/// Naive forms, read as UTC
const NAIVE_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y%m%dT%H%M%S",
];

fn parse_iso_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }

    if let Some(ts) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(s, fmt).ok())
    {
        return Some(ts.with_timezone(&Utc));
    }

    // A trailing Z means UTC, which is what naive forms are read as anyway
    let naive = s.strip_suffix(['Z', 'z']).unwrap_or(s);
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(naive, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
        .map(|naive| naive.and_utc())
}
