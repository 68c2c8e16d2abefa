//! Expression nodes.
//!
//! Two representations live here:
//! - [`Node`] - the fully resolved in-memory tree that builders produce and
//!   operations inspect.
//! - [`ValueNode`] - the wire form, where shared sub-expressions and function
//!   bodies are stored once in a value table and referred to by key.
//!
//! The wire form is externally tagged, so a `ValueNode::Constant(1)` serializes
//! as `{"constantValue": 1}`, matching the remote service's JSON exactly.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Function names that load an asset, with the argument holding the asset id.
const ASSET_LOADERS: &[(&str, &str)] = &[
    ("Image.load", "id"),
    ("ImageCollection.load", "id"),
    ("Collection.loadTable", "tableId"),
];

// ============================================================================
// In-memory tree
// ============================================================================

/// A resolved expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A literal JSON value.
    Constant(Value),
    /// Invocation of a named server-side algorithm.
    Invocation(Invocation),
    /// An ordered list of values.
    Array(Vec<Node>),
    /// A string-keyed dictionary of values.
    Dictionary(BTreeMap<String, Node>),
    /// A lambda passed to higher-order algorithms such as `Collection.map`.
    Function(FunctionDefinition),
    /// A reference to an enclosing function's parameter.
    Argument(String),
}

/// A function invocation with named arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Algorithm name, e.g. `Image.gt`.
    pub function_name: String,
    /// Arguments keyed by parameter name.
    pub arguments: BTreeMap<String, Node>,
}

/// A lambda: parameter names and a body.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    /// Parameter names, referenced from the body via [`Node::Argument`].
    pub argument_names: Vec<String>,
    /// The function body.
    pub body: Box<Node>,
}

impl Node {
    /// Create a constant node from anything convertible to JSON.
    pub fn constant(value: impl Into<Value>) -> Self {
        Node::Constant(value.into())
    }

    /// Create an invocation node.
    pub fn invoke<I, K>(function_name: &str, arguments: I) -> Self
    where
        I: IntoIterator<Item = (K, Node)>,
        K: Into<String>,
    {
        Node::Invocation(Invocation {
            function_name: function_name.to_string(),
            arguments: arguments.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        })
    }

    /// Create a single-parameter lambda.
    pub fn lambda(argument: &str, body: Node) -> Self {
        Node::Function(FunctionDefinition {
            argument_names: vec![argument.to_string()],
            body: Box::new(body),
        })
    }

    /// Create a reference to a lambda parameter.
    pub fn argument(name: &str) -> Self {
        Node::Argument(name.to_string())
    }

    /// The invocation at this node, if it is one.
    pub fn as_invocation(&self) -> Option<&Invocation> {
        match self {
            Node::Invocation(inv) => Some(inv),
            _ => None,
        }
    }

    /// The root function name, if this node is an invocation.
    pub fn function_name(&self) -> Option<&str> {
        self.as_invocation().map(|inv| inv.function_name.as_str())
    }

    /// Asset ids loaded anywhere in this tree, in first-seen order, deduplicated.
    pub fn referenced_assets(&self) -> Vec<String> {
        let mut assets = Vec::new();
        self.collect_assets(&mut assets);
        assets
    }

    fn collect_assets(&self, out: &mut Vec<String>) {
        match self {
            Node::Constant(_) | Node::Argument(_) => {}
            Node::Invocation(inv) => {
                let loader = ASSET_LOADERS
                    .iter()
                    .find(|(name, _)| *name == inv.function_name);
                if let Some((_, param)) = loader {
                    if let Some(Node::Constant(Value::String(id))) = inv.arguments.get(*param) {
                        if !out.contains(id) {
                            out.push(id.clone());
                        }
                    }
                }
                for arg in inv.arguments.values() {
                    arg.collect_assets(out);
                }
            }
            Node::Array(items) => items.iter().for_each(|n| n.collect_assets(out)),
            Node::Dictionary(map) => map.values().for_each(|n| n.collect_assets(out)),
            Node::Function(def) => def.body.collect_assets(out),
        }
    }
}

impl Invocation {
    /// Get an argument by name.
    pub fn argument(&self, name: &str) -> Option<&Node> {
        self.arguments.get(name)
    }
}

impl From<f64> for Node {
    fn from(v: f64) -> Self {
        Node::constant(v)
    }
}

impl From<&str> for Node {
    fn from(v: &str) -> Self {
        Node::constant(v)
    }
}

// ============================================================================
// Wire form
// ============================================================================

/// A serialized expression: a value table and the key of the result value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    /// Key of the root value in `values`.
    pub result: String,
    /// Value table.
    pub values: BTreeMap<String, ValueNode>,
}

/// One value in the wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueNode {
    /// A literal JSON value.
    #[serde(rename = "constantValue")]
    Constant(Value),
    /// A function invocation.
    #[serde(rename = "functionInvocationValue")]
    Invocation(WireInvocation),
    /// A list of values.
    #[serde(rename = "arrayValue")]
    Array(WireArray),
    /// A dictionary of values.
    #[serde(rename = "dictionaryValue")]
    Dictionary(WireDictionary),
    /// A lambda whose body is a key in the value table.
    #[serde(rename = "functionDefinitionValue")]
    FunctionDefinition(WireFunctionDefinition),
    /// A reference to a lambda parameter.
    #[serde(rename = "argumentReference")]
    ArgumentReference(String),
    /// A reference to another entry in the value table.
    #[serde(rename = "valueReference")]
    ValueReference(String),
}

/// Wire form of a function invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireInvocation {
    /// Algorithm name.
    pub function_name: String,
    /// Arguments keyed by parameter name.
    #[serde(default)]
    pub arguments: BTreeMap<String, ValueNode>,
}

/// Wire form of a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireArray {
    /// The list items.
    #[serde(default)]
    pub values: Vec<ValueNode>,
}

/// Wire form of a dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireDictionary {
    /// The dictionary entries.
    #[serde(default)]
    pub values: BTreeMap<String, ValueNode>,
}

/// Wire form of a lambda.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireFunctionDefinition {
    /// Parameter names.
    #[serde(default)]
    pub argument_names: Vec<String>,
    /// Key of the body in the value table.
    pub body: String,
}
