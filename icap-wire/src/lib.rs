#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

pub mod client;
pub mod error;
pub mod headers;
pub mod net;
pub mod parser;
pub mod request;
pub mod response;

pub use client::{Client, ClientBuilder};
pub use error::{Error, IcapResult};
pub use headers::Headers;
pub use parser::encapsulated::{ChunkPolicy, EncapsulatedSection, SectionKind};
pub use request::Request;
pub use response::Response;

///Lib version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Supported ICAP protocol version.
pub const ICAP_VERSION: &str = "ICAP/1.0";
/// Well-known ICAP port.
pub const DEFAULT_PORT: u16 = 1344;
/// `User-Agent` sent when the request does not set one.
pub const DEFAULT_USER_AGENT: &str = concat!("icap-wire/", env!("CARGO_PKG_VERSION"));
