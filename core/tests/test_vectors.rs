//! Verify the codec, status classification and request building against JSON
//! test vectors stored in `test-vectors/`.
//!
//! Decoded mappings and request bodies are compared as parsed JSON, not as
//! raw strings, so the vectors stay readable.

use prestaws::status::check_status;
use prestaws::{
    mapping_to_xml, xml_to_mapping, ClientConfig, DeleteTarget, DictWebService, Error, HttpMethod, HttpRequest,
    HttpResponse, Node, QueryOptions, Transport,
};

const API_URL: &str = "http://localhost:8080";

/// Transport for tests that only build requests.
struct Offline;

impl Transport for Offline {
    type Error = std::io::Error;

    fn execute(&mut self, _request: &HttpRequest) -> Result<HttpResponse, std::io::Error> {
        Err(std::io::Error::other("offline"))
    }
}

fn client() -> DictWebService<Offline> {
    DictWebService::dict(ClientConfig::new(API_URL, "KEY"), Offline)
}

/// Parse the method string from test vectors into `HttpMethod`.
fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "HEAD" => HttpMethod::Head,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

fn string_pairs(value: &serde_json::Value) -> Vec<(String, String)> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|pair| {
            let pair = pair.as_array().unwrap();
            (pair[0].as_str().unwrap().to_string(), pair[1].as_str().unwrap().to_string())
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

#[test]
fn codec_test_vectors() {
    let raw = include_str!("../../test-vectors/codec.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();

        // Verify decode
        let decoded = xml_to_mapping(case["xml"].as_str().unwrap()).unwrap();
        assert_eq!(serde_json::to_value(&decoded).unwrap(), case["expected"], "{name}: decoded mapping");

        // Verify the encoded document decodes to the same mapping
        let encoded = mapping_to_xml(&decoded).unwrap();
        let again = xml_to_mapping(&encoded).unwrap();
        assert_eq!(again, decoded, "{name}: round trip through {encoded}");
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[test]
fn status_test_vectors() {
    let raw = include_str!("../../test-vectors/status.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let response = HttpResponse {
            status: case["status"].as_u64().unwrap() as u16,
            headers: Vec::new(),
            body: case["body"].as_str().unwrap().to_string(),
        };
        let result = check_status(&response, "prestashop");
        let expected = &case["expected"];

        if *expected == "ok" {
            assert!(result.is_ok(), "{name}: expected success, got {result:?}");
            continue;
        }

        let err = result.unwrap_err();
        assert_eq!(err.to_string(), expected["message"].as_str().unwrap(), "{name}: message");
        assert_eq!(err.status(), Some(response.status), "{name}: status");
        assert_eq!(
            serde_json::to_value(err.remote_errors()).unwrap(),
            expected["remote"],
            "{name}: remote errors"
        );
        match expected["error"].as_str().unwrap() {
            "Authentication" => assert!(matches!(err, Error::Authentication { .. }), "{name}: expected Authentication"),
            "Service" => assert!(matches!(err, Error::Service { .. }), "{name}: expected Service"),
            other => panic!("{name}: unknown expected error: {other}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[test]
fn request_test_vectors() {
    let raw = include_str!("../../test-vectors/requests.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let resource = case["resource"].as_str().unwrap();
        let id = case["id"].as_u64();
        let options: Option<QueryOptions> = case
            .get("options")
            .map(|options| string_pairs(options).into_iter().collect());
        let content = case.get("content").cloned().map(Node::from);

        let req = match case["operation"].as_str().unwrap() {
            "get" => c.build_get(resource, id, options.as_ref()),
            "head" => c.build_head(resource, id, options.as_ref()),
            "delete" => {
                let ids: Vec<u64> = serde_json::from_value(case["ids"].clone()).unwrap();
                let target = match ids.as_slice() {
                    [one] => DeleteTarget::One(*one),
                    _ => DeleteTarget::Many(ids),
                };
                c.build_delete(resource, target)
            }
            "add" => c.build_add(resource, content.as_ref().unwrap()),
            "edit" => c.build_edit(resource, id, content.as_ref().unwrap()),
            other => panic!("{name}: unknown operation: {other}"),
        }
        .unwrap();

        let expected_req = &case["expected_request"];
        assert_eq!(req.method, parse_method(expected_req["method"].as_str().unwrap()), "{name}: method");
        assert_eq!(req.path, format!("{API_URL}{}", expected_req["path"].as_str().unwrap()), "{name}: path");
        assert_eq!(req.headers, string_pairs(&expected_req["headers"]), "{name}: headers");

        match expected_req.get("form_xml") {
            Some(expected_xml) => {
                let body = String::from_utf8(req.body.clone().unwrap()).unwrap();
                let encoded = body.strip_prefix("xml=").unwrap();
                let xml = urlencoding::decode(encoded).unwrap();
                let sent = xml_to_mapping(&xml).unwrap();
                assert_eq!(&serde_json::to_value(&sent).unwrap(), expected_xml, "{name}: body");
            }
            None => assert!(req.body.is_none(), "{name}: body should be None"),
        }
    }
}

#[test]
fn unsupported_options_are_rejected_before_building() {
    let options = QueryOptions::new().with("filter[id]", "[1]").with("bogus", "1").with("nope[x]", "2");
    let err = client().build_get("customers", None, Some(&options)).unwrap_err();
    assert_eq!(err.to_string(), "Unsupported parameters: bogus, nope");
}
