//! Retrieve filter expressions and their wire encoding.

use crate::node::{Element, Node, XSI_TYPE};
use serde::Deserialize;
use serde_json::Value;

/// A logical filter: a leaf comparison or a boolean combination of two filters.
///
/// The JSON shape `{"leftOperand": .., "operator": .., "rightOperand": ..}` deserializes
/// directly; nested objects of that same shape become [`Operand::Expr`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterExpression {
    pub left_operand: Operand,
    pub operator: String,
    pub right_operand: Operand,
}

/// One side of a [`FilterExpression`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    Expr(Box<FilterExpression>),
    Value(Value),
}

impl Operand {
    /// Nested filters, objects and arrays are structured; strings, numbers, booleans and
    /// null are plain values.
    pub fn is_structured(&self) -> bool {
        Part::of(self).is_structured()
    }
}

impl From<FilterExpression> for Operand {
    fn from(expr: FilterExpression) -> Self {
        Self::Expr(Box::new(expr))
    }
}

impl From<&str> for Operand {
    fn from(value: &str) -> Self {
        Self::Value(Value::String(value.to_string()))
    }
}

impl From<String> for Operand {
    fn from(value: String) -> Self {
        Self::Value(Value::String(value))
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl FilterExpression {
    pub fn new(left: impl Into<Operand>, operator: impl Into<String>, right: impl Into<Operand>) -> Self {
        Self {
            left_operand: left.into(),
            operator: operator.into(),
            right_operand: right.into(),
        }
    }

    /// `property operator value`, e.g. `Name equals "Welcome"`.
    pub fn simple(property: &str, operator: &str, value: impl Into<Operand>) -> Self {
        Self::new(property, operator, value)
    }

    /// `left AND right`, `left OR right`.
    pub fn complex(left: FilterExpression, operator: &str, right: FilterExpression) -> Self {
        Self::new(left, operator, right)
    }

    pub fn is_complex(&self) -> bool {
        self.left_operand.is_structured() && self.right_operand.is_structured()
    }
}

/// Encode a filter as a `SimpleFilterPart` / `ComplexFilterPart` element.
///
/// A node is complex when both operands are structured, and complex operands are encoded
/// recursively. An object operand that is not a full filter is encoded from whichever of
/// `leftOperand`, `operator` and `rightOperand` it has. In a simple part, operands go out
/// as they are.
pub fn encode_filter(expr: &FilterExpression) -> Node {
    encode_parts(
        Some(Part::of(&expr.left_operand)),
        Some(Node::text(expr.operator.as_str())),
        Some(Part::of(&expr.right_operand)),
    )
}

/// An operand seen either as a typed filter or as raw JSON.
#[derive(Clone, Copy)]
enum Part<'a> {
    Expr(&'a FilterExpression),
    Json(&'a Value),
}

impl<'a> Part<'a> {
    fn of(operand: &'a Operand) -> Self {
        match operand {
            Operand::Expr(expr) => Self::Expr(expr),
            Operand::Value(value) => Self::Json(value),
        }
    }

    fn is_structured(self) -> bool {
        match self {
            Self::Expr(_) => true,
            Self::Json(value) => value.is_object() || value.is_array(),
        }
    }

    /// Encode as a nested filter part.
    fn encode(self) -> Node {
        match self {
            Self::Expr(expr) => encode_filter(expr),
            Self::Json(value) => encode_parts(
                value.get("leftOperand").map(Part::Json),
                value.get("operator").cloned().map(Node::from),
                value.get("rightOperand").map(Part::Json),
            ),
        }
    }

    /// Render as a plain value.
    fn to_node(self) -> Node {
        match self {
            Self::Json(value) => Node::from(value.clone()),
            Self::Expr(expr) => Element::new()
                .with_child("leftOperand", Part::of(&expr.left_operand).to_node())
                .with_child("operator", expr.operator.as_str())
                .with_child("rightOperand", Part::of(&expr.right_operand).to_node())
                .into(),
        }
    }
}

fn encode_parts(left: Option<Part<'_>>, operator: Option<Node>, right: Option<Part<'_>>) -> Node {
    let complex = left.is_some_and(Part::is_structured) && right.is_some_and(Part::is_structured);
    let (kind, left_name, operator_name, right_name) = if complex {
        ("ComplexFilterPart", "LeftOperand", "LogicalOperator", "RightOperand")
    } else {
        ("SimpleFilterPart", "Property", "SimpleOperator", "Value")
    };
    let operand = |part: Part<'_>| if complex { part.encode() } else { part.to_node() };

    let mut element = Element::new().with_attr(XSI_TYPE, kind);
    if let Some(left) = left {
        element.set_child(left_name, operand(left));
    }
    if let Some(operator) = operator {
        element.set_child(operator_name, operator);
    }
    if let Some(right) = right {
        element.set_child(right_name, operand(right));
    }
    element.into()
}
