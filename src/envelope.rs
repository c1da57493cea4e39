//! Request envelope construction.

use crate::error::SoapError;
use crate::node::Node;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

/// SOAP 1.1 envelope namespace.
pub const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
/// XML Schema instance namespace, needed for `xsi:type`.
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
/// Namespace of the `fueloauth` header element.
pub const FUEL_OAUTH_NS: &str = "http://exacttarget.com";

/// An outgoing envelope: the bearer token plus the request body.
#[derive(Debug, Clone, Copy)]
pub struct Envelope<'a> {
    token: &'a str,
    body: Option<&'a Node>,
}

impl<'a> Envelope<'a> {
    pub fn new(body: Option<&'a Node>, token: &'a str) -> Self {
        Self { token, body }
    }

    /// Text of the `Header/fueloauth` element.
    pub fn token(&self) -> &'a str {
        self.token
    }

    /// The body exactly as supplied.
    pub fn body(&self) -> Option<&'a Node> {
        self.body
    }

    /// Serialize without an XML declaration.
    pub fn to_xml(&self) -> Result<String, SoapError> {
        let mut writer = Writer::new(Vec::new());

        write(
            &mut writer,
            Event::Start(
                BytesStart::new("Envelope")
                    .with_attributes([("xmlns", SOAP_ENV_NS), ("xmlns:xsi", XSI_NS)]),
            ),
        )?;

        write(&mut writer, Event::Start(BytesStart::new("Header")))?;
        write(
            &mut writer,
            Event::Start(BytesStart::new("fueloauth").with_attributes([("xmlns", FUEL_OAUTH_NS)])),
        )?;
        write(&mut writer, Event::Text(BytesText::new(self.token)))?;
        write(&mut writer, Event::End(BytesEnd::new("fueloauth")))?;
        write(&mut writer, Event::End(BytesEnd::new("Header")))?;

        match self.body {
            Some(body) => write_node(&mut writer, "Body", body)?,
            None => write(&mut writer, Event::Empty(BytesStart::new("Body")))?,
        }

        write(&mut writer, Event::End(BytesEnd::new("Envelope")))?;

        String::from_utf8(writer.into_inner()).map_err(|e| SoapError::Envelope(e.to_string()))
    }
}

/// Build the serialized envelope for `body` authorized by `token`.
pub fn build_envelope(body: Option<&Node>, token: &str) -> Result<String, SoapError> {
    Envelope::new(body, token).to_xml()
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), SoapError> {
    writer
        .write_event(event)
        .map_err(|e| SoapError::Envelope(e.to_string()))
}

/// Write `node` as an element called `name`. Lists repeat the element once per item.
fn write_node(writer: &mut Writer<Vec<u8>>, name: &str, node: &Node) -> Result<(), SoapError> {
    match node {
        Node::Nil => write(writer, Event::Empty(BytesStart::new(name))),
        Node::Text(text) => {
            write(writer, Event::Start(BytesStart::new(name)))?;
            write(writer, Event::Text(BytesText::new(text)))?;
            write(writer, Event::End(BytesEnd::new(name)))
        }
        Node::List(items) => items.iter().try_for_each(|item| write_node(writer, name, item)),
        Node::Element(element) => {
            let start = BytesStart::new(name).with_attributes(element.attributes());
            if element.is_empty() {
                return write(writer, Event::Empty(start));
            }
            write(writer, Event::Start(start))?;
            if let Some(text) = element.text() {
                write(writer, Event::Text(BytesText::new(text)))?;
            }
            for (child_name, child) in element.children() {
                write_node(writer, child_name, child)?;
            }
            write(writer, Event::End(BytesEnd::new(name)))
        }
    }
}
