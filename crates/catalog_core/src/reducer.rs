//! Pure state transitions for every catalog action.

use shared::domain::{AggregationFilter, ContentKind, DisplayType, Sort};

use crate::{
    error::DriverError,
    state::{CatalogDriverState, DEFAULT_PAGE},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogAction {
    SetSearchTerm(String),
    AddAggregationFilter(AggregationFilter),
    RemoveAggregationFilter(AggregationFilter),
    AddContentType(ContentKind),
    RemoveContentType(ContentKind),
    SetSort(Sort),
    SetDisplayType(DisplayType),
    SetPage(u32),
    NextPage,
    PrevPage,
}

impl CatalogAction {
    pub fn name(&self) -> &'static str {
        match self {
            CatalogAction::SetSearchTerm(_) => "set_search_term",
            CatalogAction::AddAggregationFilter(_) => "add_aggregation_filter",
            CatalogAction::RemoveAggregationFilter(_) => "remove_aggregation_filter",
            CatalogAction::AddContentType(_) => "add_content_type",
            CatalogAction::RemoveContentType(_) => "remove_content_type",
            CatalogAction::SetSort(_) => "set_sort",
            CatalogAction::SetDisplayType(_) => "set_display_type",
            CatalogAction::SetPage(_) => "set_page",
            CatalogAction::NextPage => "next_page",
            CatalogAction::PrevPage => "prev_page",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Changed(CatalogDriverState),
    Unchanged,
}

impl Transition {
    pub fn is_changed(&self) -> bool {
        matches!(self, Transition::Changed(_))
    }
}

pub fn reduce(
    current: &CatalogDriverState,
    action: CatalogAction,
) -> Result<Transition, DriverError> {
    let mut next = current.clone();

    match action {
        CatalogAction::SetSearchTerm(term) => {
            next.search_term = term;
            next.reset_page();
        }
        CatalogAction::AddAggregationFilter(filter) => {
            if next.is_curated {
                next.reset_for_curated_filter();
                next.aggregation_filters = vec![filter];
            } else {
                next.aggregation_filters.push(filter);
                next.reset_page();
            }
        }
        CatalogAction::RemoveAggregationFilter(filter) => {
            let Some(index) = next.aggregation_filters.iter().position(|f| *f == filter) else {
                return Ok(Transition::Unchanged);
            };
            next.aggregation_filters.remove(index);
            next.reset_page();
        }
        CatalogAction::AddContentType(kind) => {
            if !next.content_types.insert(kind) {
                return Ok(Transition::Unchanged);
            }
            next.reset_page();
        }
        CatalogAction::RemoveContentType(kind) => {
            if !next.content_types.remove(&kind) {
                return Ok(Transition::Unchanged);
            }
            next.reset_page();
        }
        CatalogAction::SetSort(sort) => {
            next.sort = Some(sort);
            next.reset_page();
        }
        CatalogAction::SetDisplayType(display_type) => {
            let crosses_calendar = (current.display_type == DisplayType::Calendar)
                != (display_type == DisplayType::Calendar);
            next.display_type = display_type;
            if crosses_calendar {
                next.reset_page();
            }
        }
        CatalogAction::SetPage(page) => {
            if page < DEFAULT_PAGE {
                return Err(DriverError::InvalidPage(page));
            }
            next.page = page;
        }
        CatalogAction::NextPage => {
            next.page = next.page.saturating_add(1);
            next.adopt_returned_cursor();
        }
        CatalogAction::PrevPage => {
            if next.page <= DEFAULT_PAGE {
                return Ok(Transition::Unchanged);
            }
            next.page -= 1;
            next.adopt_returned_cursor();
        }
    }

    if next == *current {
        Ok(Transition::Unchanged)
    } else {
        Ok(Transition::Changed(next))
    }
}

#[cfg(test)]
#[path = "tests/reducer_tests.rs"]
mod tests;
