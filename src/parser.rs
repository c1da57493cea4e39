//! Response parsing and normalization.
//!
//! Uses quick-xml which is safe against XXE by default (doesn't expand entities).

use crate::error::{DomainError, SoapError, SoapFault};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};

/// Response key of the Describe verb, which skips the status checks.
pub const DESCRIBE_RESPONSE_KEY: &str = "DefinitionResponseMsg";
/// Response key of the Retrieve verb.
pub const RETRIEVE_RESPONSE_KEY: &str = "RetrieveResponseMsg";

/// Key holding text that appears next to child elements.
pub const TEXT_KEY: &str = "$text";

/// Outcome of one response document.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    /// `soap:Fault` in the body
    Fault(SoapFault),
    /// Failure status inside an otherwise well-formed response
    DomainError(DomainError),
    /// Normalized response payload
    Success(Value),
}

impl ResponseOutcome {
    pub fn into_result(self) -> Result<Value, SoapError> {
        match self {
            Self::Fault(fault) => Err(SoapError::Fault(fault)),
            Self::DomainError(error) => Err(SoapError::Domain(error)),
            Self::Success(payload) => Ok(payload),
        }
    }
}

/// Parse a raw response body and classify it.
///
/// A fault is reported before anything else is looked at. Describe responses are returned
/// as-is (with `ObjectDefinition` defaulted). Every other payload gets `Results` normalized
/// to an array and its `OverallStatus` checked.
pub fn parse_response(response_key: &str, raw: &str) -> Result<ResponseOutcome, SoapError> {
    let document = xml_to_value(raw)?;

    let body = document
        .get("Envelope")
        .and_then(|envelope| envelope.get("Body"))
        .ok_or_else(|| SoapError::XmlParse("response is missing the SOAP Envelope/Body".into()))?;

    if let Some(fault) = body.get("Fault") {
        return Ok(ResponseOutcome::Fault(fault_from_value(fault)));
    }

    let mut payload = match body.get(response_key) {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(s)) if s.is_empty() => Map::new(),
        _ => {
            return Err(SoapError::XmlParse(format!(
                "response body has no {} element",
                response_key
            )))
        }
    };

    if response_key == DESCRIBE_RESPONSE_KEY {
        let definition = payload
            .entry("ObjectDefinition")
            .or_insert_with(|| Value::Object(Map::new()));
        if !definition.is_object() && !definition.is_array() {
            *definition = Value::Object(Map::new());
        }
        return Ok(ResponseOutcome::Success(Value::Object(payload)));
    }

    let results = normalize_results(payload.remove("Results"));
    payload.insert("Results".to_string(), Value::Array(results));

    let status = payload
        .get("OverallStatus")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let request_id = payload
        .get("RequestID")
        .and_then(Value::as_str)
        .map(String::from);

    if response_key == RETRIEVE_RESPONSE_KEY {
        if status == "OK" || status == "MoreDataAvailable" {
            return Ok(ResponseOutcome::Success(Value::Object(payload)));
        }
        // "Error: Object type 'Foo' is not retrievable" -> "Object type 'Foo' is not retrievable"
        let message = status
            .split_once(':')
            .map_or(status.as_str(), |(_, rest)| rest)
            .trim()
            .to_string();
        return Ok(ResponseOutcome::DomainError(DomainError {
            message,
            request_id,
            results: Vec::new(),
            origin: "Retrieve Response".to_string(),
        }));
    }

    if status == "Error" || status == "Has Errors" {
        let results = match payload.remove("Results") {
            Some(Value::Array(results)) => results,
            _ => Vec::new(),
        };
        return Ok(ResponseOutcome::DomainError(DomainError {
            message: "Soap Error".to_string(),
            request_id,
            results,
            origin: response_key.to_string(),
        }));
    }

    Ok(ResponseOutcome::Success(Value::Object(payload)))
}

/// `Results` is always an array: objects are wrapped, anything else becomes empty.
fn normalize_results(results: Option<Value>) -> Vec<Value> {
    match results {
        Some(Value::Array(items)) => items,
        Some(object @ Value::Object(_)) => vec![object],
        _ => Vec::new(),
    }
}

fn fault_from_value(fault: &Value) -> SoapFault {
    let detail = match fault.get("detail") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(detail) => Some(detail.clone()),
    };
    SoapFault {
        code: text_of(fault.get("faultcode")),
        message: text_of(fault.get("faultstring")),
        detail,
    }
}

fn text_of(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(map)) => map
            .get(TEXT_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// An element being read: its name, children so far and accumulated text.
struct Frame {
    name: String,
    children: Map<String, Value>,
    text: String,
}

impl Frame {
    fn new(name: String) -> Self {
        Self {
            name,
            children: Map::new(),
            text: String::new(),
        }
    }

    fn finish(mut self) -> (String, Value) {
        let text = normalize_whitespace(&self.text);
        if self.children.is_empty() {
            return (self.name, Value::String(text));
        }
        if !text.is_empty() {
            self.children.insert(TEXT_KEY.to_string(), Value::String(text));
        }
        (self.name, Value::Object(self.children))
    }
}

/// Read an XML document into a JSON-like structure.
///
/// Attributes are ignored and element names lose their namespace prefix. An element with
/// only text becomes a string, repeated siblings become an array, and a single child stays
/// a plain value. Empty elements read as `""`.
pub fn xml_to_value(xml: &str) -> Result<Value, SoapError> {
    check_xxe_patterns(xml)?;

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<(String, Value)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                stack.push(Frame::new(local_name_str(e)));
            }

            Ok(Event::Empty(ref e)) => {
                // Self-closing tags like <ObjectID xsi:nil="true" />
                let name = local_name_str(e);
                attach(&mut stack, &mut root, name, Value::String(String::new()))?;
            }

            Ok(Event::End(_)) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| SoapError::XmlParse("unexpected closing tag".into()))?;
                let (name, value) = frame.finish();
                attach(&mut stack, &mut root, name, value)?;
            }

            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| SoapError::XmlParse(e.to_string()))?;
                match stack.last_mut() {
                    Some(frame) => frame.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => {
                        return Err(SoapError::XmlParse(
                            "text content outside the root element".into(),
                        ))
                    }
                }
            }

            Ok(Event::CData(e)) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }

            Ok(Event::Eof) => break,

            Err(e) => {
                return Err(SoapError::XmlParse(format!(
                    "{} at position {}",
                    e,
                    reader.buffer_position()
                )));
            }

            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(SoapError::XmlParse(format!(
            "unexpected end of document inside <{}>",
            open.name
        )));
    }

    let (name, value) =
        root.ok_or_else(|| SoapError::XmlParse("document has no root element".into()))?;
    let mut document = Map::new();
    document.insert(name, value);
    Ok(Value::Object(document))
}

/// Hand a finished element to its parent, or make it the document root.
fn attach(
    stack: &mut [Frame],
    root: &mut Option<(String, Value)>,
    name: String,
    value: Value,
) -> Result<(), SoapError> {
    match stack.last_mut() {
        Some(parent) => {
            insert_child(&mut parent.children, name, value);
            Ok(())
        }
        None if root.is_some() => Err(SoapError::XmlParse("multiple root elements".into())),
        None => {
            *root = Some((name, value));
            Ok(())
        }
    }
}

fn insert_child(children: &mut Map<String, Value>, name: String, value: Value) {
    match children.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            children.insert(name, value);
        }
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Responses never legitimately carry DTDs; refuse them outright.
fn check_xxe_patterns(xml: &str) -> Result<(), SoapError> {
    if xml.contains("<!DOCTYPE") || xml.contains("<!doctype") {
        return Err(SoapError::XmlParse(
            "DOCTYPE declarations are not allowed".into(),
        ));
    }

    if xml.contains("<!ENTITY") || xml.contains("<!entity") {
        return Err(SoapError::XmlParse(
            "Entity declarations are not allowed".into(),
        ));
    }

    Ok(())
}

/// Extract local name from element.
fn local_name_str(e: &BytesStart) -> String {
    let name = e.local_name();
    std::str::from_utf8(name.as_ref())
        .unwrap_or("")
        .to_string()
}
