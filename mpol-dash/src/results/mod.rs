//! Analysis result list: search, modes and pagination

pub mod pagination;
pub mod store;
pub mod view;

pub use pagination::{calculate_pagination, Pagination, PAGE_SIZE, RECENT_PREVIEW};
pub use store::{LoadTicket, ResultListStore};
pub use view::{count_label, ListBody, ListMode, ListView, PaginationControls, ResultRow, ScoreBand};
