pub mod http;
pub mod logging;
pub mod sanitize;
pub mod timing;
