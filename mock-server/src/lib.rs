//! In-memory stand-in for the PrestaShop webservice, serving the `addresses`
//! resource as XML under `/api/`.
//!
//! Every request must carry the API key as basic-auth user; every response
//! carries a `psws-version` header. Errors are answered with the service's
//! `<prestashop><errors>` envelope.

use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use serde::Deserialize;
use tokio::{net::TcpListener, sync::RwLock};

pub const API_KEY: &str = "ZQ88PRJX5VWQHCWE4EE7SQ7HPNX00RAJ";
pub const PSWS_VERSION: &str = "1.5.4.1";

const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
const RESOURCE_URL: &str = "http://localhost/api/";

/// Writable address fields, in document order.
pub const ADDRESS_FIELDS: &[&str] = &[
    "id_customer",
    "id_country",
    "alias",
    "company",
    "lastname",
    "firstname",
    "address1",
    "city",
];
const REQUIRED_FIELDS: &[&str] = &["lastname", "firstname"];

pub type Address = BTreeMap<String, String>;

#[derive(Debug, Default)]
pub struct Store {
    next_id: u64,
    addresses: BTreeMap<u64, Address>,
}

pub type Db = Arc<RwLock<Store>>;

#[derive(Debug, Default, Deserialize)]
pub struct ResourceQuery {
    schema: Option<String>,
    id: Option<String>,
}

pub fn app() -> Router {
    let db: Db = Arc::default();
    Router::new()
        .route("/api/addresses", get(list_addresses).post(create_address))
        .route("/api/addresses/", delete(delete_addresses))
        .route(
            "/api/addresses/{id}",
            get(get_address).put(update_address).delete(delete_address),
        )
        .layer(middleware::from_fn(webservice_headers))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn webservice_headers(request: Request, next: Next) -> Response {
    let mut response = if authorized(request.headers()) {
        next.run(request).await
    } else {
        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Basic realm=\"Webservice\"")],
            "401 Unauthorized",
        )
            .into_response()
    };
    response
        .headers_mut()
        .insert("psws-version", HeaderValue::from_static(PSWS_VERSION));
    response
}

fn authorized(headers: &HeaderMap) -> bool {
    let expected = format!("Basic {}", STANDARD.encode(format!("{API_KEY}:")));
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        == Some(expected.as_str())
}

async fn list_addresses(State(db): State<Db>, Query(query): Query<ResourceQuery>) -> Response {
    if query.schema.as_deref() == Some("blank") {
        return xml(StatusCode::OK, address_document(None, &Address::new()));
    }
    let store = db.read().await;
    xml(StatusCode::OK, address_list(store.addresses.keys().copied()))
}

async fn get_address(State(db): State<Db>, Path(id): Path<u64>) -> Response {
    let store = db.read().await;
    match store.addresses.get(&id) {
        Some(address) => xml(StatusCode::OK, address_document(Some(id), address)),
        None => not_found(&[id]),
    }
}

async fn create_address(State(db): State<Db>, headers: HeaderMap, body: String) -> Response {
    let address = match parse_address(&headers, &body) {
        Ok(address) => address,
        Err(response) => return response,
    };
    let mut store = db.write().await;
    store.next_id += 1;
    let id = store.next_id;
    store.addresses.insert(id, address.clone());
    xml(StatusCode::CREATED, address_document(Some(id), &address))
}

async fn update_address(
    State(db): State<Db>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let address = match parse_address(&headers, &body) {
        Ok(address) => address,
        Err(response) => return response,
    };
    let mut store = db.write().await;
    match store.addresses.get_mut(&id) {
        Some(existing) => {
            *existing = address.clone();
            xml(StatusCode::OK, address_document(Some(id), &address))
        }
        None => not_found(&[id]),
    }
}

async fn delete_address(State(db): State<Db>, Path(id): Path<u64>) -> Response {
    let mut store = db.write().await;
    match store.addresses.remove(&id) {
        Some(_) => StatusCode::OK.into_response(),
        None => not_found(&[id]),
    }
}

/// `DELETE /api/addresses/?id=[1,2]` removes every listed address or none.
async fn delete_addresses(State(db): State<Db>, Query(query): Query<ResourceQuery>) -> Response {
    let Some(ids) = query.id.as_deref().and_then(parse_batch_ids) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            &[(80, "You have to set an id or a list of ids".to_string())],
        );
    };
    let mut store = db.write().await;
    let missing: Vec<u64> = ids
        .iter()
        .copied()
        .filter(|id| !store.addresses.contains_key(id))
        .collect();
    if !missing.is_empty() {
        return not_found(&missing);
    }
    for id in ids {
        store.addresses.remove(&id);
    }
    StatusCode::OK.into_response()
}

/// Parse `[1,2,3]` into ids.
pub fn parse_batch_ids(raw: &str) -> Option<Vec<u64>> {
    let inner = raw.trim().strip_prefix('[')?.strip_suffix(']')?;
    inner
        .split(',')
        .map(|id| id.trim().parse().ok())
        .collect::<Option<Vec<u64>>>()
        .filter(|ids| !ids.is_empty())
}

/// Read the `<address>` element of a request body, sent either as an
/// `xml=` form field or as the bare document.
fn parse_address(headers: &HeaderMap, body: &str) -> Result<Address, Response> {
    let form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));
    let document = match body.strip_prefix("xml=") {
        Some(encoded) if form => urlencoding::decode(encoded)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_default(),
        _ => body.to_string(),
    };

    let parsed = roxmltree::Document::parse(&document)
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, &[(127, format!("XML error: {e}"))]))?;
    let Some(node) = parsed.descendants().find(|n| n.has_tag_name("address")) else {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            &[(79, "XML error: <address> is missing".to_string())],
        ));
    };

    let address: Address = node
        .children()
        .filter(|child| child.is_element() && ADDRESS_FIELDS.contains(&child.tag_name().name()))
        .map(|child| {
            let value = child.text().unwrap_or("").trim();
            (child.tag_name().name().to_string(), value.to_string())
        })
        .collect();

    let missing: Vec<(u32, String)> = REQUIRED_FIELDS
        .iter()
        .filter(|field| address.get(**field).map_or(true, |value| value.is_empty()))
        .map(|field| (41, format!("Field {field} is required.")))
        .collect();
    if !missing.is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, &missing));
    }
    Ok(address)
}

fn xml(status: StatusCode, document: quick_xml::Result<String>) -> Response {
    match document {
        Ok(body) => (status, [(header::CONTENT_TYPE, "text/xml;charset=utf-8")], body).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("cannot render document: {e}")).into_response(),
    }
}

fn not_found(ids: &[u64]) -> Response {
    let ids = ids.iter().map(u64::to_string).collect::<Vec<_>>().join(", ");
    error_response(StatusCode::NOT_FOUND, &[(90, format!("Id(s) not exists: {ids}"))])
}

fn error_response(status: StatusCode, errors: &[(u32, String)]) -> Response {
    xml(status, error_document(errors))
}

type XmlWriter = Writer<Vec<u8>>;

/// Open the `<prestashop>` envelope and the collection element `name`.
fn envelope(name: &str) -> quick_xml::Result<XmlWriter> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    let mut root = BytesStart::new("prestashop");
    root.push_attribute(("xmlns:xlink", XLINK_NS));
    writer.write_event(Event::Start(root))?;
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    Ok(writer)
}

fn finish(mut writer: XmlWriter, name: &str) -> quick_xml::Result<String> {
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    writer.write_event(Event::End(BytesEnd::new("prestashop")))?;
    String::from_utf8(writer.into_inner()).map_err(|e| e.utf8_error().into())
}

/// Write `value` as CDATA, splitting it wherever it contains `]]>`.
fn cdata(writer: &mut XmlWriter, value: &str) -> quick_xml::Result<()> {
    if value.is_empty() {
        return Ok(());
    }
    let mut parts = value.split("]]>").peekable();
    let mut lead = "";
    while let Some(part) = parts.next() {
        let tail = if parts.peek().is_some() { "]]" } else { "" };
        writer.write_event(Event::CData(BytesCData::new(format!("{lead}{part}{tail}"))))?;
        lead = ">";
    }
    Ok(())
}

fn field(writer: &mut XmlWriter, start: BytesStart<'_>, value: &str) -> quick_xml::Result<()> {
    let end = start.to_end().into_owned();
    writer.write_event(Event::Start(start))?;
    cdata(writer, value)?;
    writer.write_event(Event::End(end))
}

pub fn error_document(errors: &[(u32, String)]) -> quick_xml::Result<String> {
    let mut writer = envelope("errors")?;
    for (code, message) in errors {
        writer.write_event(Event::Start(BytesStart::new("error")))?;
        field(&mut writer, BytesStart::new("code"), &code.to_string())?;
        field(&mut writer, BytesStart::new("message"), message)?;
        writer.write_event(Event::End(BytesEnd::new("error")))?;
    }
    finish(writer, "errors")
}

pub fn address_list(ids: impl IntoIterator<Item = u64>) -> quick_xml::Result<String> {
    let mut writer = envelope("addresses")?;
    for id in ids {
        let mut entry = BytesStart::new("address");
        entry.push_attribute(("id", id.to_string().as_str()));
        entry.push_attribute(("xlink:href", format!("{RESOURCE_URL}addresses/{id}").as_str()));
        writer.write_event(Event::Empty(entry))?;
    }
    finish(writer, "addresses")
}

/// The address document; `id` is `None` for the blank schema.
pub fn address_document(id: Option<u64>, address: &Address) -> quick_xml::Result<String> {
    let mut writer = envelope("address")?;
    let id = id.map(|id| id.to_string()).unwrap_or_default();
    field(&mut writer, BytesStart::new("id"), &id)?;
    for name in ADDRESS_FIELDS {
        let value = address.get(*name).map(String::as_str).unwrap_or("");
        let mut start = BytesStart::new(*name);
        if *name == "id_country" && !value.is_empty() {
            let href = format!("{RESOURCE_URL}countries/{}", urlencoding::encode(value));
            start.push_attribute(("xlink:href", href.as_str()));
        }
        field(&mut writer, start, value)?;
    }
    finish(writer, "address")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_ids_parse() {
        assert_eq!(parse_batch_ids("[6,7]"), Some(vec![6, 7]));
        assert_eq!(parse_batch_ids(" [ 1 , 2 ] "), Some(vec![1, 2]));
        assert_eq!(parse_batch_ids("[]"), None);
        assert_eq!(parse_batch_ids("6,7"), None);
        assert_eq!(parse_batch_ids("[6,x]"), None);
    }

    #[test]
    fn blank_document_lists_every_field_empty() {
        let doc = address_document(None, &Address::new()).unwrap();
        assert!(doc.contains("<id></id>"));
        for field in ADDRESS_FIELDS {
            assert!(doc.contains(&format!("<{field}></{field}>")), "{field}");
        }
    }

    #[test]
    fn address_document_links_the_country() {
        let address: Address = [("id_country", "21"), ("firstname", "Ada")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let doc = address_document(Some(3), &address).unwrap();
        assert!(doc.contains("<id><![CDATA[3]]></id>"));
        assert!(doc.contains(
            "<id_country xlink:href=\"http://localhost/api/countries/21\"><![CDATA[21]]></id_country>"
        ));
        assert!(doc.contains("<firstname><![CDATA[Ada]]></firstname>"));
        roxmltree::Document::parse(&doc).unwrap();
    }

    #[test]
    fn error_document_repeats_errors() {
        let doc = error_document(&[(41, "a".to_string()), (41, "b".to_string())]).unwrap();
        let parsed = roxmltree::Document::parse(&doc).unwrap();
        assert_eq!(parsed.descendants().filter(|n| n.has_tag_name("error")).count(), 2);
    }

    #[test]
    fn markup_in_values_stays_text() {
        let address: Address = [("id_country", "1\"2"), ("city", "a]]>b<c>"), ("firstname", "]]>")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let doc = address_document(Some(1), &address).unwrap();
        let parsed = roxmltree::Document::parse(&doc).unwrap();
        let text = |tag: &str| {
            parsed
                .descendants()
                .find(|n| n.has_tag_name(tag))
                .map(|n| n.children().filter_map(|c| c.text()).collect::<String>())
                .unwrap()
        };
        assert_eq!(text("city"), "a]]>b<c>");
        assert_eq!(text("firstname"), "]]>");
        assert_eq!(text("id_country"), "1\"2");
        let country = parsed.descendants().find(|n| n.has_tag_name("id_country")).unwrap();
        assert_eq!(
            country.attribute((XLINK_NS, "href")),
            Some("http://localhost/api/countries/1%222")
        );
    }
}
