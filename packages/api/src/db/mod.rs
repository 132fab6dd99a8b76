//! # Row access over the backend's REST interface
//!
//! Tables are exposed at `/rest/v1/<table>`. Filters travel as query parameters
//! (`column=eq.value`), ordering as `order=column.desc`, and writes ask for the
//! affected rows back with `Prefer: return=representation`.

mod query;

pub use query::{order_param, query_params, PREFER_MERGE, PREFER_REPRESENTATION};
