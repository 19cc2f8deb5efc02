pub mod http;
pub mod stub;

pub use http::HttpBackend;
pub use stub::StubBackend;
