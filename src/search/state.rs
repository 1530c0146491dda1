//! Lifecycle of one search within a session.
//!
//! ```text
//! Restored --edit--> Edited --save--> Saved --query ok--> Queried --render--> Rendered
//!                      ^                          |
//!                      +------ query failed ------+
//! ```

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum SearchPhase {
    #[default]
    Restored,
    Edited,
    Saved,
    Queried,
    Rendered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchEvent {
    Edit,
    Save,
    QuerySucceeded,
    QueryFailed,
    Render,
    Load,
    Clear,
}

impl SearchPhase {
    #[must_use]
    pub const fn next(self, event: SearchEvent) -> Self {
        match event {
            SearchEvent::Edit | SearchEvent::QueryFailed => Self::Edited,
            SearchEvent::Save => Self::Saved,
            SearchEvent::QuerySucceeded => Self::Queried,
            SearchEvent::Render => match self {
                Self::Queried | Self::Rendered | Self::Saved => Self::Rendered,
                other => other,
            },
            SearchEvent::Load | SearchEvent::Clear => Self::Restored,
        }
    }

    /// Results can be shown once the item has been saved to the session.
    #[must_use]
    pub const fn has_results(self) -> bool {
        matches!(self, Self::Saved | Self::Queried | Self::Rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let phase = SearchPhase::Restored
            .next(SearchEvent::Edit)
            .next(SearchEvent::Save)
            .next(SearchEvent::QuerySucceeded)
            .next(SearchEvent::Render);
        assert_eq!(phase, SearchPhase::Rendered);
    }

    #[test]
    fn test_failed_query_returns_to_edited() {
        let phase = SearchPhase::Saved.next(SearchEvent::QueryFailed);
        assert_eq!(phase, SearchPhase::Edited);
        assert!(!phase.has_results());
    }

    #[test]
    fn test_render_requires_results() {
        assert_eq!(SearchPhase::Restored.next(SearchEvent::Render), SearchPhase::Restored);
        assert_eq!(SearchPhase::Edited.next(SearchEvent::Render), SearchPhase::Edited);
    }

    #[test]
    fn test_clear_and_load_restore() {
        assert_eq!(SearchPhase::Rendered.next(SearchEvent::Clear), SearchPhase::Restored);
        assert_eq!(SearchPhase::Queried.next(SearchEvent::Load), SearchPhase::Restored);
    }
}
