//! Per-verb request bodies.
//!
//! Every builder is a pure function producing a [`RequestDescriptor`]; nothing here touches
//! the network. [`SoapClient`](crate::client::SoapClient) dispatches the descriptors.

use crate::auth::AuthOverrides;
use crate::config::TransportOverrides;
use crate::error::SoapError;
use crate::filter::{encode_filter, FilterExpression};
use crate::node::{Element, Node};
use serde_json::Value;

/// Namespace of every partner API request element.
pub const PARTNER_API_NS: &str = "http://exacttarget.com/wsdl/partnerAPI";

/// Properties retrieved when the caller names none.
pub const DEFAULT_RETRIEVE_PROPERTIES: [&str; 3] = ["Client", "ID", "ObjectID"];

/// The supported partner API operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Create,
    Retrieve,
    Update,
    Delete,
    Describe,
    Execute,
    Perform,
    Schedule,
    Extract,
}

impl Verb {
    /// Value of the `SOAPAction` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Retrieve => "Retrieve",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::Describe => "Describe",
            Self::Execute => "Execute",
            Self::Perform => "Perform",
            Self::Schedule => "Schedule",
            Self::Extract => "Extract",
        }
    }

    /// Element of the SOAP body holding this verb's response.
    pub fn response_key(&self) -> &'static str {
        match self {
            Self::Create => "CreateResponse",
            Self::Retrieve => "RetrieveResponseMsg",
            Self::Update => "UpdateResponse",
            Self::Delete => "DeleteResponse",
            Self::Describe => "DefinitionResponseMsg",
            Self::Execute => "ExecuteResponseMsg",
            Self::Perform => "PerformResponseMsg",
            Self::Schedule => "ScheduleResponseMsg",
            Self::Extract => "PerformExtractMsg",
        }
    }

    /// Element wrapping this verb's request.
    pub fn request_element(&self) -> &'static str {
        match self {
            Self::Create => "CreateRequest",
            Self::Retrieve => "RetrieveRequestMsg",
            Self::Update => "UpdateRequest",
            Self::Delete => "DeleteRequest",
            Self::Describe => "DefinitionRequestMsg",
            Self::Execute => "ExecuteRequestMsg",
            Self::Perform => "PerformRequestMsg",
            Self::Schedule => "ScheduleRequestMsg",
            Self::Extract => "PerformExtractMsg",
        }
    }
}

/// One SOAP call, ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    /// `SOAPAction` header value
    pub action: String,
    /// Contents of the SOAP body
    pub body: Node,
    /// Element of the SOAP body holding the response
    pub response_key: String,
    /// Retry once when the token expires mid-flight
    pub retry_on_expiry: bool,
    pub transport_overrides: Option<TransportOverrides>,
    pub auth_overrides: Option<AuthOverrides>,
}

impl RequestDescriptor {
    /// Descriptor for `verb` whose SOAP body holds `request` as the verb's request element.
    pub fn new(verb: Verb, request: Element) -> Self {
        Self {
            action: verb.as_str().to_string(),
            body: Element::new()
                .with_child(verb.request_element(), request.with_attr("xmlns", PARTNER_API_NS))
                .into(),
            response_key: verb.response_key().to_string(),
            retry_on_expiry: true,
            transport_overrides: None,
            auth_overrides: None,
        }
    }

    pub fn with_transport_overrides(mut self, overrides: Option<TransportOverrides>) -> Self {
        self.transport_overrides = overrides;
        self
    }

    pub fn with_auth_overrides(mut self, overrides: AuthOverrides) -> Self {
        self.auth_overrides = Some(overrides);
        self
    }

    /// The verb's request element inside the body.
    pub fn request(&self) -> Option<&Element> {
        self.body
            .as_element()?
            .children()
            .next()
            .and_then(|(_, node)| node.as_element())
    }
}

/// Options for Create, Update, Delete and Schedule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    /// Wire-level option fields written under `Options`
    pub fields: Element,
    /// Widen the call to all accounts of the enterprise
    pub query_all_accounts: bool,
    /// Transport settings for this call only
    pub transport: Option<TransportOverrides>,
}

impl RequestOptions {
    pub fn query_all_accounts() -> Self {
        Self {
            query_all_accounts: true,
            ..Default::default()
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Node>) -> Self {
        self.fields.set_child(name, value);
        self
    }

    pub fn with_transport(mut self, transport: TransportOverrides) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Normalize a loose options object.
    ///
    /// `queryAllAccounts` and `reqOptions` are taken out; every other key is a wire field.
    pub fn from_json(value: Value) -> Result<Self, SoapError> {
        let mut map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            other => {
                return Err(SoapError::InvalidArgument(format!(
                    "options must be an object, got {}",
                    other
                )))
            }
        };

        let query_all_accounts = map
            .remove("queryAllAccounts")
            .is_some_and(|v| is_truthy(&v));
        let transport = map
            .remove("reqOptions")
            .map(serde_json::from_value::<TransportOverrides>)
            .transpose()
            .map_err(|e| SoapError::InvalidArgument(format!("invalid reqOptions: {}", e)))?;

        let fields = match Node::from(Value::Object(map)) {
            Node::Element(fields) => fields,
            _ => Element::new(),
        };

        Ok(Self {
            fields,
            query_all_accounts,
            transport,
        })
    }
}

/// Options for Retrieve.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrieveOptions {
    /// `ClientIDs`, e.g. `[{"ID": 6227021}]`
    pub client_ids: Option<Node>,
    pub filter: Option<FilterExpression>,
    /// `RequestID` of a `MoreDataAvailable` response, to fetch the next page
    pub continue_request: Option<String>,
    pub query_all_accounts: bool,
    pub transport: Option<TransportOverrides>,
}

impl RetrieveOptions {
    pub fn with_filter(mut self, filter: FilterExpression) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_client_ids(mut self, client_ids: impl Into<Node>) -> Self {
        self.client_ids = Some(client_ids.into());
        self
    }

    pub fn continuing(request_id: impl Into<String>) -> Self {
        Self {
            continue_request: Some(request_id.into()),
            ..Default::default()
        }
    }
}

/// The call shapes Retrieve accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum RetrieveArgs {
    /// Object type only
    Defaults,
    /// Object type and one extra argument
    Single(Node),
    /// Object type, properties and options
    Full(Node, RetrieveOptions),
}

/// Reduce a Retrieve call shape to its properties and options.
///
/// A lone structured (object-shaped) argument does not count as properties: it resets them
/// to [`DEFAULT_RETRIEVE_PROPERTIES`] and is otherwise dropped. Existing callers depend on
/// this, so it stays until the API owners decide otherwise.
pub fn normalize_retrieve_args(args: RetrieveArgs) -> (Node, Option<RetrieveOptions>) {
    match args {
        RetrieveArgs::Defaults => (default_properties(), None),
        RetrieveArgs::Single(Node::Element(_)) => (default_properties(), None),
        RetrieveArgs::Single(properties) => (properties, None),
        RetrieveArgs::Full(properties, options) => (properties, Some(options)),
    }
}

fn default_properties() -> Node {
    Node::from(DEFAULT_RETRIEVE_PROPERTIES.to_vec())
}

/// The `Options` child: fields as given, `Nil` when there are none, `QueryAllAccounts` added
/// on request.
fn options_node(options: Option<&RequestOptions>) -> Node {
    let Some(options) = options else {
        return Node::Nil;
    };

    let mut fields = options.fields.clone();
    if options.query_all_accounts {
        fields.set_child("QueryAllAccounts", true);
    }

    if fields.is_empty() && fields.attributes().next().is_none() {
        Node::Nil
    } else {
        Node::Element(fields)
    }
}

fn build_object_request(
    verb: Verb,
    object_type: &str,
    mut objects: Node,
    options: Option<RequestOptions>,
) -> Result<RequestDescriptor, SoapError> {
    tag_with_type(&mut objects, object_type, "objects")?;

    let request = Element::new()
        .with_child("Options", options_node(options.as_ref()))
        .with_child("Objects", objects);

    Ok(RequestDescriptor::new(verb, request)
        .with_transport_overrides(options.and_then(|o| o.transport)))
}

/// Attach the type discriminator, failing when `node` has nowhere to carry it.
fn tag_with_type(node: &mut Node, object_type: &str, what: &str) -> Result<(), SoapError> {
    if node.set_type(object_type) {
        Ok(())
    } else {
        Err(SoapError::InvalidArgument(format!(
            "{} must be an object or a list of objects to carry type {}",
            what, object_type
        )))
    }
}

/// `CreateRequest` for `objects` of `object_type`.
pub fn build_create(
    object_type: &str,
    objects: Node,
    options: Option<RequestOptions>,
) -> Result<RequestDescriptor, SoapError> {
    build_object_request(Verb::Create, object_type, objects, options)
}

/// `UpdateRequest` for `objects` of `object_type`.
pub fn build_update(
    object_type: &str,
    objects: Node,
    options: Option<RequestOptions>,
) -> Result<RequestDescriptor, SoapError> {
    build_object_request(Verb::Update, object_type, objects, options)
}

/// `DeleteRequest` for `objects` of `object_type`.
pub fn build_delete(
    object_type: &str,
    objects: Node,
    options: Option<RequestOptions>,
) -> Result<RequestDescriptor, SoapError> {
    build_object_request(Verb::Delete, object_type, objects, options)
}

/// `RetrieveRequestMsg` for `object_type`.
pub fn build_retrieve(object_type: &str, args: RetrieveArgs) -> RequestDescriptor {
    let (properties, options) = normalize_retrieve_args(args);
    let options = options.unwrap_or_default();

    let mut retrieve = Element::new()
        .with_child("ObjectType", object_type)
        .with_child("Properties", properties);

    if let Some(client_ids) = options.client_ids {
        retrieve.set_child("ClientIDs", client_ids);
    }
    if let Some(filter) = &options.filter {
        retrieve.set_child("Filter", encode_filter(filter));
    }
    if let Some(request_id) = options.continue_request {
        retrieve.set_child("ContinueRequest", request_id);
    }
    if options.query_all_accounts {
        retrieve.set_child("QueryAllAccounts", true);
    }

    RequestDescriptor::new(Verb::Retrieve, Element::new().with_child("RetrieveRequest", retrieve))
        .with_transport_overrides(options.transport)
}

/// `DefinitionRequestMsg` describing `object_type`.
pub fn build_describe(object_type: &str) -> RequestDescriptor {
    let request = Element::new().with_child(
        "DescribeRequests",
        Element::new().with_child(
            "ObjectDefinitionRequest",
            Element::new().with_child("ObjectType", object_type),
        ),
    );
    RequestDescriptor::new(Verb::Describe, request)
}

/// `ExecuteRequestMsg` running `name` with `parameters`.
pub fn build_execute(name: &str, parameters: Node) -> RequestDescriptor {
    let request = Element::new().with_child(
        "Requests",
        Element::new()
            .with_child("Name", name)
            .with_child("Parameters", parameters),
    );
    RequestDescriptor::new(Verb::Execute, request)
}

/// `PerformRequestMsg` starting one `definition` of `object_type`.
pub fn build_perform(object_type: &str, mut definition: Node) -> Result<RequestDescriptor, SoapError> {
    tag_with_type(&mut definition, object_type, "definition")?;

    let request = Element::new()
        .with_child("Action", "start")
        .with_child(
            "Definitions",
            Node::List(vec![Element::new().with_child("Definition", definition).into()]),
        );
    Ok(RequestDescriptor::new(Verb::Perform, request))
}

/// `ScheduleRequestMsg` applying `recurrence` to `interactions`.
///
/// `interactions` must be an object or a list of objects; each gets the type discriminator.
pub fn build_schedule(
    object_type: &str,
    recurrence: Node,
    mut interactions: Node,
    action: &str,
    options: Option<RequestOptions>,
) -> Result<RequestDescriptor, SoapError> {
    let valid = match &interactions {
        Node::Element(_) => true,
        Node::List(items) => items.iter().all(|item| matches!(item, Node::Element(_))),
        _ => false,
    };
    if !valid {
        return Err(SoapError::InvalidArgument(
            "interactions must be an object or a list of objects".into(),
        ));
    }
    tag_with_type(&mut interactions, object_type, "interactions")?;

    let request = Element::new()
        .with_child("Action", action)
        .with_child("Options", options_node(options.as_ref()))
        .with_child("Recurrence", recurrence)
        .with_child("Interactions", interactions);

    Ok(RequestDescriptor::new(Verb::Schedule, request)
        .with_transport_overrides(options.and_then(|o| o.transport)))
}

/// `PerformExtractMsg` carrying `definition` unchanged.
pub fn build_extract(definition: Node) -> RequestDescriptor {
    RequestDescriptor::new(Verb::Extract, Element::new().with_child("Requests", definition))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
