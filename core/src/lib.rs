//! Synchronous client for the PrestaShop webservice.
//!
//! # Overview
//! Issues GET/POST/PUT/DELETE/HEAD requests against resource endpoints,
//! validates query options, classifies response statuses, checks the
//! reported server version and converts between XML documents and mapping
//! nodes.
//!
//! # Design
//! - `WebService` is generic over a `Transport` (who executes HTTP) and a
//!   `Codec` (how bodies are decoded and payloads encoded). `XmlWebService`
//!   and `DictWebService` are the two ready-made flavors.
//! - Every operation has a `build_*` counterpart returning the `HttpRequest`
//!   it would send, and all of them go through `WebService::execute`.
//! - Calls are blocking and single-shot: no retries, no caching.
//! - `UreqTransport` (feature `ureq`, on by default) is the stock transport.

pub mod client;
pub mod codec;
pub mod config;
pub mod element;
pub mod error;
pub mod http;
pub mod node;
pub mod options;
pub mod status;
#[cfg(feature = "ureq")]
pub mod transport;
pub mod version;

pub use client::{DeleteTarget, DictWebService, WebService, XmlWebService};
pub use codec::{mapping_to_xml, xml_to_mapping, Codec, MappingCodec, XmlCodec};
pub use config::{BodyEncoding, ClientConfig};
pub use element::{Attribute, Element, QName};
pub use error::{Error, RemoteError, Result};
pub use http::{FileUpload, HttpMethod, HttpRequest, HttpResponse, Transport};
pub use node::{AttrValue, Attributes, Mapping, Node};
pub use options::{OptionWhitelist, QueryOptions};
#[cfg(feature = "ureq")]
pub use transport::UreqTransport;
pub use version::{Compatibility, LooseVersion, RangeBound, VersionRange};
