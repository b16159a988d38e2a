pub mod http_client;
pub mod stable_id;
pub mod url;

pub use http_client::{ContentFetcher, HttpFetcher};
pub use stable_id::generate_channel_id;
pub use url::UrlUtils;
