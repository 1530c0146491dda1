use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Navigation outcome reported by every action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    SearchResults,
    ClearSearchItem,
    LoadSearchItem,
    DeleteSearchItem,
    RememberSearchItem,
    SaveSearchAsReport,
    FiltersAdded,
    FiltersRemoved,
    FiltersGrouped,
    FiltersUngrouped,
    FilterCompiled,
    ConvertedStringToFilter,
    RefreshOperations,
    TemplateSaved,
    TaskLaunched,
}
