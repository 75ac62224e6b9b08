//! Built-in request scenarios.
mod template;
mod url_list;


pub use template::Template;
pub use url_list::{UrlListScenario, read_url_file};
