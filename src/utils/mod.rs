pub mod constants;
pub mod url_utils;

pub use constants::*;
pub use url_utils::{canonicalize_request_url, is_valid_url, same_origin};
