//! Session descriptors, search queries and search results
//!
//! These are the values exchanged with an [`OnlineSessionProvider`](super::provider::OnlineSessionProvider).
//! Settings and searches are built per request and handed over immediately; search
//! results are read once by the filter pass and dropped afterwards.

use std::collections::HashMap;
use std::fmt;

/// Typed value of a session attribute or search predicate
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SettingValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SettingValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Orders two values of the same variant. Mixed variants are unordered.
    fn partial_order(&self, other: &SettingValue) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (SettingValue::Bool(a), SettingValue::Bool(b)) => a.partial_cmp(b),
            (SettingValue::Int(a), SettingValue::Int(b)) => a.partial_cmp(b),
            (SettingValue::Float(a), SettingValue::Float(b)) => a.partial_cmp(b),
            (SettingValue::Text(a), SettingValue::Text(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(b) => write!(f, "{}", b),
            SettingValue::Int(i) => write!(f, "{}", i),
            SettingValue::Float(v) => write!(f, "{}", v),
            SettingValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        SettingValue::Float(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Int(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::Text(value)
    }
}

/// How far a session attribute is published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdvertisementType {
    #[default]
    DontAdvertise,
    ViaPingOnly,
    ViaOnlineService,
    ViaOnlineServiceAndPing,
}

impl AdvertisementType {
    /// True if the attribute is visible to searches through the online service
    pub fn via_online_service(self) -> bool {
        matches!(
            self,
            AdvertisementType::ViaOnlineService | AdvertisementType::ViaOnlineServiceAndPing
        )
    }
}

/// A single advertised attribute
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSetting {
    pub value: SettingValue,
    pub advertisement: AdvertisementType,
}

/// Descriptor handed to the provider when creating a session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSettings {
    pub is_lan_match: bool,
    pub num_public_connections: u32,
    pub allow_join_in_progress: bool,
    pub allow_join_via_presence: bool,
    pub should_advertise: bool,
    pub uses_presence: bool,
    pub use_lobbies_if_available: bool,
    pub attributes: HashMap<String, SessionSetting>,
}

impl SessionSettings {
    /// Sets or replaces a custom attribute
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<SettingValue>,
        advertisement: AdvertisementType,
    ) {
        self.attributes.insert(
            key.into(),
            SessionSetting {
                value: value.into(),
                advertisement,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.attributes.get(key).map(|setting| &setting.value)
    }

    /// Text attribute lookup, `None` when absent or not text
    pub fn get_text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(SettingValue::as_text)
    }

    /// Attributes a remote searcher is allowed to see
    pub fn advertised(&self) -> HashMap<String, SettingValue> {
        self.attributes
            .iter()
            .filter(|(_, setting)| setting.advertisement.via_online_service())
            .map(|(key, setting)| (key.clone(), setting.value.clone()))
            .collect()
    }
}

/// Comparison applied by a search predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanEquals,
    LessThan,
    LessThanEquals,
    Near,
}

/// One `(key, op, value)` condition of a search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPredicate {
    pub key: String,
    pub op: ComparisonOp,
    pub value: SettingValue,
}

impl SearchPredicate {
    /// Evaluates the predicate against a candidate value.
    ///
    /// `Near` has no distance metric for non-numeric values and degrades to equality.
    pub fn matches(&self, candidate: &SettingValue) -> bool {
        use std::cmp::Ordering;

        match self.op {
            ComparisonOp::Equals | ComparisonOp::Near => candidate == &self.value,
            ComparisonOp::NotEquals => candidate != &self.value,
            ComparisonOp::GreaterThan => {
                candidate.partial_order(&self.value) == Some(Ordering::Greater)
            }
            ComparisonOp::GreaterThanEquals => matches!(
                candidate.partial_order(&self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            ComparisonOp::LessThan => candidate.partial_order(&self.value) == Some(Ordering::Less),
            ComparisonOp::LessThanEquals => matches!(
                candidate.partial_order(&self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
        }
    }
}

/// Query issued to find sessions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSearch {
    pub max_search_results: u32,
    pub is_lan_query: bool,
    pub query_settings: Vec<SearchPredicate>,
}

impl SessionSearch {
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<SettingValue>, op: ComparisonOp) {
        let key = key.into();
        self.query_settings.retain(|predicate| predicate.key != key);
        self.query_settings.push(SearchPredicate {
            key,
            op,
            value: value.into(),
        });
    }

    pub fn predicate(&self, key: &str) -> Option<&SearchPredicate> {
        self.query_settings.iter().find(|p| p.key == key)
    }
}

/// Opaque identifier of a discovered session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A session returned by a search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub session_id: SessionId,
    pub owning_user_name: String,
    pub settings: HashMap<String, SettingValue>,
    pub ping_ms: Option<u32>,
}

impl SearchResult {
    pub fn session_id_str(&self) -> &str {
        &self.session_id.0
    }

    /// Text attribute of the advertised settings
    pub fn get_text(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(SettingValue::as_text)
    }
}
