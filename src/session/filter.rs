//! Join-filter policy applied to search results

use super::settings::SearchResult;
use super::{FREE_FOR_ALL, MATCH_TYPE_KEY};

/// What the filter pass reports about every discovered session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredSession {
    pub id: String,
    pub user: String,
    /// Empty when the session does not advertise a match type
    pub match_type: String,
    pub eligible: bool,
}

/// Decides which discovered sessions may be joined
#[derive(Debug, Clone)]
pub struct MatchFilter {
    match_type: String,
}

impl Default for MatchFilter {
    fn default() -> Self {
        Self::new(FREE_FOR_ALL)
    }
}

impl MatchFilter {
    pub fn new(match_type: impl Into<String>) -> Self {
        Self {
            match_type: match_type.into(),
        }
    }

    pub fn match_type(&self) -> &str {
        &self.match_type
    }

    /// Exact, case-sensitive comparison of the advertised match type
    pub fn is_eligible(&self, result: &SearchResult) -> bool {
        result.get_text(MATCH_TYPE_KEY) == Some(self.match_type.as_str())
    }

    /// Summarises every result in provider order
    pub fn inspect(&self, results: &[SearchResult]) -> Vec<DiscoveredSession> {
        results
            .iter()
            .map(|result| DiscoveredSession {
                id: result.session_id_str().to_string(),
                user: result.owning_user_name.clone(),
                match_type: result.get_text(MATCH_TYPE_KEY).unwrap_or_default().to_string(),
                eligible: self.is_eligible(result),
            })
            .collect()
    }

    /// First eligible result in provider order
    pub fn select<'a>(&self, results: &'a [SearchResult]) -> Option<&'a SearchResult> {
        results.iter().find(|result| self.is_eligible(result))
    }
}
