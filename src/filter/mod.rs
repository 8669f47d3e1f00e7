pub mod error;
pub mod filter;
pub mod filter_order;
pub mod filter_where;
pub mod parser;
pub mod types;

pub use error::FilterError;
pub use filter::Filter;
pub use parser::{is_valid_identifier, parse_pagination, parse_query_params, DEFAULT_LIMIT, MAX_LIMIT};
pub use types::*;
