//! Resource client for the webservice.
//!
//! # Design
//! `WebService` owns its configuration, a caller-supplied `Transport` and a
//! `Codec` strategy. Each operation is split into a `build_*` method that
//! produces an `HttpRequest` and a call through `execute`, the one place that
//! sends, classifies the status and checks the server version. Parsing is
//! left to the codec: `XmlCodec` yields element trees, `MappingCodec` yields
//! mapping nodes and adds the id-list `search`, `partial_add` and
//! `partial_edit` helpers.

use tracing::debug;

use crate::codec::{Codec, MappingCodec, XmlCodec};
use crate::config::{BodyEncoding, ClientConfig, VERSION_HEADER};
use crate::element::Element;
use crate::error::{Error, Result};
use crate::http::{encode_multipart, FileUpload, HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::node::{Mapping, Node};
use crate::options::QueryOptions;
use crate::status::check_status;
use crate::version::check_version;

/// Client exchanging element trees.
pub type XmlWebService<T> = WebService<T, XmlCodec>;

/// Client exchanging mapping nodes, with the envelope stripped from reads.
pub type DictWebService<T> = WebService<T, MappingCodec>;

/// Target of a `delete`: one id, or several removed in a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTarget {
    One(u64),
    Many(Vec<u64>),
}

impl From<u64> for DeleteTarget {
    fn from(id: u64) -> Self {
        DeleteTarget::One(id)
    }
}

impl From<Vec<u64>> for DeleteTarget {
    fn from(ids: Vec<u64>) -> Self {
        DeleteTarget::Many(ids)
    }
}

impl From<&[u64]> for DeleteTarget {
    fn from(ids: &[u64]) -> Self {
        DeleteTarget::Many(ids.to_vec())
    }
}

impl<const N: usize> From<[u64; N]> for DeleteTarget {
    fn from(ids: [u64; N]) -> Self {
        DeleteTarget::Many(ids.to_vec())
    }
}

pub struct WebService<T, C> {
    config: ClientConfig,
    transport: T,
    codec: C,
}

impl<T: Transport> XmlWebService<T> {
    pub fn xml(config: ClientConfig, transport: T) -> Self {
        Self::new(config, transport, XmlCodec)
    }

    /// `get` without an id: the listing document of `resource`.
    pub fn search(&mut self, resource: &str, options: Option<&QueryOptions>) -> Result<Element> {
        self.get(resource, None, options)
    }
}

impl<T: Transport> DictWebService<T> {
    pub fn dict(config: ClientConfig, transport: T) -> Self {
        Self::new(config, transport, MappingCodec)
    }

    /// Ids of the `resource` entries matching `options`.
    ///
    /// The listing is expected as `{resources: {resource: [...]}}`, each entry
    /// carrying an `id` attribute. An empty listing yields no ids and a
    /// single entry yields one.
    pub fn search(&mut self, resource: &str, options: Option<&QueryOptions>) -> Result<Vec<u64>> {
        let response = self.get(resource, None, options)?;
        search_ids(&response)
    }

    /// Fetch the blank schema of `resource`, merge `fields` over it and add
    /// the result.
    ///
    /// `fields` replace top-level entries of the blank form, except that a
    /// mapping given for a mapping entry (`{"address": {...}}`) is merged into
    /// it key by key.
    pub fn partial_add(&mut self, resource: &str, fields: Mapping) -> Result<Mapping> {
        let blank_options = QueryOptions::new().with("schema", "blank");
        let mut form = self.get(resource, None, Some(&blank_options))?;
        let Some(entries) = form.as_mapping_mut() else {
            return Err(Error::Structure(format!("blank schema of {resource} is not a mapping")));
        };
        for (key, value) in fields {
            match value {
                Node::Container(update) if entries.get(&key).and_then(Node::as_mapping).is_some() => {
                    if let Some(existing) = entries.get_mut(&key).and_then(Node::as_mapping_mut) {
                        existing.extend(update);
                    }
                }
                value => {
                    entries.insert(key, value);
                }
            }
        }
        self.add(resource, &form)
    }

    /// Fetch `resource/id`, merge `fields` into each of its top-level
    /// mappings and send it back.
    pub fn partial_edit(&mut self, resource: &str, id: u64, fields: Mapping) -> Result<Mapping> {
        let mut content = self.get(resource, Some(id), None)?;
        let Some(entries) = content.as_mapping_mut() else {
            return Err(Error::Structure(format!("{resource}/{id} is not a mapping")));
        };
        for entry in entries.values_mut() {
            if let Some(existing) = entry.as_mapping_mut() {
                existing.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        self.edit(resource, Some(id), &content)
    }
}

/// Descend two levels into a listing and read each entry's `id` attribute.
fn search_ids(response: &Node) -> Result<Vec<u64>> {
    let mut level = response;
    for _ in 0..2 {
        if level.is_empty() {
            return Ok(Vec::new());
        }
        level = match level.as_mapping().and_then(|children| children.values().next()) {
            Some(child) => child,
            None => {
                return Err(Error::Parse(format!(
                    "unexpected search response shape: {}",
                    serde_json::to_string(level).unwrap_or_default()
                )))
            }
        };
    }
    level
        .items()
        .into_iter()
        .map(|entry| {
            let id = entry
                .attr("id")
                .ok_or_else(|| Error::Parse("search result entry has no id attribute".to_string()))?;
            id.trim()
                .parse()
                .map_err(|_| Error::Parse(format!("search result id {id:?} is not an integer")))
        })
        .collect()
}

impl<T: Transport, C: Codec> WebService<T, C> {
    pub fn new(config: ClientConfig, transport: T, codec: C) -> Self {
        Self {
            config,
            transport,
            codec,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// `api_url/resource[/id][?query]`, validating `options` first.
    pub fn resource_url(&self, resource: &str, id: Option<u64>, options: Option<&QueryOptions>) -> Result<String> {
        let mut url = format!("{}{}", self.config.api_url(), resource);
        if let Some(id) = id {
            url.push_str(&format!("/{id}"));
        }
        if let Some(options) = options {
            self.config.option_whitelist().validate(options)?;
            let query = options.to_query_string(self.config.debug());
            if !query.is_empty() {
                url.push('?');
                url.push_str(&query);
            }
        }
        Ok(url)
    }

    fn request(&self, method: HttpMethod, url: String, body: Option<(String, Vec<u8>)>) -> HttpRequest {
        let mut headers = self.config.headers().to_vec();
        headers.push(("Authorization".to_string(), self.config.authorization()));
        let body = body.map(|(content_type, bytes)| {
            headers.push(("Content-Type".to_string(), content_type));
            bytes
        });
        HttpRequest {
            method,
            path: url,
            headers,
            body,
        }
    }

    fn xml_body(&self, xml: &str) -> (String, Vec<u8>) {
        match self.config.body_encoding() {
            BodyEncoding::FormField => (
                "application/x-www-form-urlencoded".to_string(),
                format!("xml={}", urlencoding::encode(xml)).into_bytes(),
            ),
            BodyEncoding::Xml => ("text/xml".to_string(), xml.as_bytes().to_vec()),
        }
    }

    pub fn build_get(&self, resource: &str, id: Option<u64>, options: Option<&QueryOptions>) -> Result<HttpRequest> {
        let url = self.resource_url(resource, id, options)?;
        Ok(self.request(HttpMethod::Get, url, None))
    }

    pub fn build_head(&self, resource: &str, id: Option<u64>, options: Option<&QueryOptions>) -> Result<HttpRequest> {
        let url = self.resource_url(resource, id, options)?;
        Ok(self.request(HttpMethod::Head, url, None))
    }

    pub fn build_add(&self, resource: &str, content: &C::Input) -> Result<HttpRequest> {
        let xml = self.codec.encode(self.config.envelope(), content)?;
        self.build_add_xml(resource, &xml)
    }

    /// POST request for an already serialized document.
    pub fn build_add_xml(&self, resource: &str, xml: &str) -> Result<HttpRequest> {
        if xml.trim().is_empty() {
            return Err(Error::MissingContent);
        }
        let url = self.resource_url(resource, None, None)?;
        Ok(self.request(HttpMethod::Post, url, Some(self.xml_body(xml))))
    }

    pub fn build_add_files(&self, resource: &str, files: &[FileUpload]) -> Result<HttpRequest> {
        if files.is_empty() {
            return Err(Error::MissingContent);
        }
        let url = self.resource_url(resource, None, None)?;
        Ok(self.request(HttpMethod::Post, url, Some(encode_multipart(files))))
    }

    pub fn build_edit(&self, resource: &str, id: Option<u64>, content: &C::Input) -> Result<HttpRequest> {
        let xml = self.codec.encode(self.config.envelope(), content)?;
        self.build_edit_xml(resource, id, &xml)
    }

    pub fn build_edit_xml(&self, resource: &str, id: Option<u64>, xml: &str) -> Result<HttpRequest> {
        let url = self.resource_url(resource, id, None)?;
        Ok(self.request(HttpMethod::Put, url, Some(self.xml_body(xml))))
    }

    /// DELETE request; several ids go in one `resource/?id=[a,b]` request.
    pub fn build_delete(&self, resource: &str, ids: impl Into<DeleteTarget>) -> Result<HttpRequest> {
        let url = match ids.into() {
            DeleteTarget::One(id) => self.resource_url(resource, Some(id), None)?,
            DeleteTarget::Many(ids) => {
                let ids = ids.iter().map(u64::to_string).collect::<Vec<_>>().join(",");
                format!("{}/?id=[{ids}]", self.resource_url(resource, None, None)?)
            }
        };
        Ok(self.request(HttpMethod::Delete, url, None))
    }

    /// Send `request`, reject non-success statuses and check the server
    /// version. Every operation goes through here.
    pub fn execute(&mut self, request: &HttpRequest) -> Result<HttpResponse> {
        debug!(method = %request.method, url = %request.path, "executing request");
        let response = self
            .transport
            .execute(request)
            .map_err(|e| Error::Transport(Box::new(e)))?;
        debug!(status = response.status, bytes = response.body.len(), "received response");
        if self.config.debug() {
            debug!(headers = ?response.headers, body = %response.body, "response detail");
        }
        check_status(&response, self.config.envelope())?;
        check_version(response.header(VERSION_HEADER), self.config.version_range());
        Ok(response)
    }

    fn read(&mut self, request: HttpRequest) -> Result<C::Resource> {
        let response = self.execute(&request)?;
        let document = self.codec.decode(&response.body)?;
        self.codec.unwrap_envelope(self.config.envelope(), document)
    }

    fn write(&mut self, request: HttpRequest) -> Result<C::Document> {
        let response = self.execute(&request)?;
        self.codec.decode(&response.body)
    }

    pub fn get(&mut self, resource: &str, id: Option<u64>, options: Option<&QueryOptions>) -> Result<C::Resource> {
        let request = self.build_get(resource, id, options)?;
        self.read(request)
    }

    pub fn get_with_url(&mut self, url: &str) -> Result<C::Resource> {
        let request = self.request(HttpMethod::Get, url.to_string(), None);
        self.read(request)
    }

    /// Response headers of a HEAD request.
    pub fn head(
        &mut self,
        resource: &str,
        id: Option<u64>,
        options: Option<&QueryOptions>,
    ) -> Result<Vec<(String, String)>> {
        let request = self.build_head(resource, id, options)?;
        Ok(self.execute(&request)?.headers)
    }

    pub fn head_with_url(&mut self, url: &str) -> Result<Vec<(String, String)>> {
        let request = self.request(HttpMethod::Head, url.to_string(), None);
        Ok(self.execute(&request)?.headers)
    }

    pub fn add(&mut self, resource: &str, content: &C::Input) -> Result<C::Document> {
        let request = self.build_add(resource, content)?;
        self.write(request)
    }

    pub fn add_xml(&mut self, resource: &str, xml: &str) -> Result<C::Document> {
        let request = self.build_add_xml(resource, xml)?;
        self.write(request)
    }

    /// Upload `files` as `multipart/form-data` instead of an XML body.
    pub fn add_files(&mut self, resource: &str, files: &[FileUpload]) -> Result<C::Document> {
        let request = self.build_add_files(resource, files)?;
        self.write(request)
    }

    pub fn add_with_url(&mut self, url: &str, content: &C::Input) -> Result<C::Document> {
        let xml = self.codec.encode(self.config.envelope(), content)?;
        let request = self.request(HttpMethod::Post, url.to_string(), Some(self.xml_body(&xml)));
        self.write(request)
    }

    pub fn edit(&mut self, resource: &str, id: Option<u64>, content: &C::Input) -> Result<C::Document> {
        let request = self.build_edit(resource, id, content)?;
        self.write(request)
    }

    pub fn edit_xml(&mut self, resource: &str, id: Option<u64>, xml: &str) -> Result<C::Document> {
        let request = self.build_edit_xml(resource, id, xml)?;
        self.write(request)
    }

    pub fn edit_with_url(&mut self, url: &str, content: &C::Input) -> Result<C::Document> {
        let xml = self.codec.encode(self.config.envelope(), content)?;
        let request = self.request(HttpMethod::Put, url.to_string(), Some(self.xml_body(&xml)));
        self.write(request)
    }

    pub fn delete(&mut self, resource: &str, ids: impl Into<DeleteTarget>) -> Result<bool> {
        let request = self.build_delete(resource, ids)?;
        self.execute(&request)?;
        Ok(true)
    }

    pub fn delete_with_url(&mut self, url: &str) -> Result<bool> {
        let request = self.request(HttpMethod::Delete, url.to_string(), None);
        self.execute(&request)?;
        Ok(true)
    }
}
