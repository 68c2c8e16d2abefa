//! Expression encoding and decoding.
//!
//! ## Wire Format
//!
//! ```text
//! {"result": "0",
//!  "values": {"0": {"functionInvocationValue": {"functionName": "Image.gt", "arguments": {..}}},
//!             "1": {..shared sub-expression..}}}
//! ```
//!
//! The root is always stored under key `"0"`. Invocations that occur more than once
//! in the tree, or sit more than a few levels below their table entry, are hoisted
//! into the table and replaced by `valueReference`s. Every function body is stored
//! in the table as the format requires. Arguments are ordered by name, so encoding
//! the same tree always yields the same bytes.

use crate::{
    CodecError, Expression, FunctionDefinition, Invocation, Node, ValueNode, WireArray,
    WireDictionary, WireFunctionDefinition, WireInvocation,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Maximum nesting depth accepted when decoding.
pub const MAX_DEPTH: usize = 512;

/// Maximum number of nodes a decoded tree may expand to.
pub const MAX_NODES: usize = 200_000;

/// Key of the root value in an encoded expression.
pub const ROOT_KEY: &str = "0";

/// Invocations nested deeper than this inside one table entry are hoisted, which
/// keeps the JSON nesting of every entry well under parser recursion limits.
const MAX_INLINE_DEPTH: usize = 8;

// ============================================================================
// Encoding
// ============================================================================

/// Encode a tree into the wire form.
pub fn encode_expression(root: &Node) -> Expression {
    let mut counts = HashMap::new();
    count_invocations(root, &mut counts);

    let mut encoder = Encoder {
        counts,
        hoisted: HashMap::new(),
        values: BTreeMap::new(),
        next_key: 1,
    };
    let root_value = encoder.inline_root(root);
    encoder.values.insert(ROOT_KEY.to_string(), root_value);

    Expression {
        result: ROOT_KEY.to_string(),
        values: encoder.values,
    }
}

/// Encode a tree to its JSON token.
pub fn encode_to_string(root: &Node) -> String {
    // Serializing string-keyed maps of JSON-compatible values cannot fail.
    serde_json::to_string(&encode_expression(root)).unwrap_or_default()
}

/// Canonical JSON of a subtree with everything inlined, used as the sharing key.
fn canonical(node: &Node) -> String {
    serde_json::to_string(&inline_value(node)).unwrap_or_default()
}

fn inline_value(node: &Node) -> Value {
    match node {
        Node::Constant(v) => serde_json::json!({ "c": v }),
        Node::Invocation(inv) => {
            let args: serde_json::Map<String, Value> = inv
                .arguments
                .iter()
                .map(|(k, v)| (k.clone(), inline_value(v)))
                .collect();
            serde_json::json!({ "f": inv.function_name, "a": args })
        }
        Node::Array(items) => Value::Array(items.iter().map(inline_value).collect()),
        Node::Dictionary(map) => {
            let entries: serde_json::Map<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), inline_value(v)))
                .collect();
            serde_json::json!({ "d": entries })
        }
        Node::Function(def) => {
            serde_json::json!({ "p": def.argument_names, "b": inline_value(&def.body) })
        }
        Node::Argument(name) => serde_json::json!({ "r": name }),
    }
}

fn count_invocations(node: &Node, counts: &mut HashMap<String, usize>) {
    match node {
        Node::Constant(_) | Node::Argument(_) => {}
        Node::Invocation(inv) => {
            *counts.entry(canonical(node)).or_insert(0) += 1;
            inv.arguments.values().for_each(|v| count_invocations(v, counts));
        }
        Node::Array(items) => items.iter().for_each(|v| count_invocations(v, counts)),
        Node::Dictionary(map) => map.values().for_each(|v| count_invocations(v, counts)),
        Node::Function(def) => count_invocations(&def.body, counts),
    }
}

struct Encoder {
    counts: HashMap<String, usize>,
    /// Canonical subtree -> table key.
    hoisted: HashMap<String, String>,
    values: BTreeMap<String, ValueNode>,
    next_key: usize,
}

impl Encoder {
    fn allocate_key(&mut self) -> String {
        let key = self.next_key.to_string();
        self.next_key += 1;
        key
    }

    /// The root is never hoisted, even if it also appears inside itself.
    fn inline_root(&mut self, node: &Node) -> ValueNode {
        match node {
            Node::Invocation(inv) => ValueNode::Invocation(self.invocation(inv, 0)),
            other => self.value(other, 0),
        }
    }

    fn value(&mut self, node: &Node, depth: usize) -> ValueNode {
        match node {
            Node::Constant(v) => ValueNode::Constant(v.clone()),
            Node::Invocation(inv) => {
                let key = canonical(node);
                let shared = self.counts.get(&key).copied().unwrap_or(0) > 1;
                if !shared && depth < MAX_INLINE_DEPTH {
                    return ValueNode::Invocation(self.invocation(inv, depth));
                }
                if let Some(existing) = self.hoisted.get(&key) {
                    return ValueNode::ValueReference(existing.clone());
                }
                let table_key = self.allocate_key();
                self.hoisted.insert(key, table_key.clone());
                let encoded = ValueNode::Invocation(self.invocation(inv, 0));
                self.values.insert(table_key.clone(), encoded);
                ValueNode::ValueReference(table_key)
            }
            Node::Array(items) => ValueNode::Array(WireArray {
                values: items.iter().map(|v| self.value(v, depth + 1)).collect(),
            }),
            Node::Dictionary(map) => ValueNode::Dictionary(WireDictionary {
                values: map
                    .iter()
                    .map(|(k, v)| (k.clone(), self.value(v, depth + 1)))
                    .collect(),
            }),
            Node::Function(def) => {
                let body = match self.value(&def.body, 0) {
                    ValueNode::ValueReference(key) => key,
                    inline => {
                        let key = self.allocate_key();
                        self.values.insert(key.clone(), inline);
                        key
                    }
                };
                ValueNode::FunctionDefinition(WireFunctionDefinition {
                    argument_names: def.argument_names.clone(),
                    body,
                })
            }
            Node::Argument(name) => ValueNode::ArgumentReference(name.clone()),
        }
    }

    fn invocation(&mut self, inv: &Invocation, depth: usize) -> WireInvocation {
        WireInvocation {
            function_name: inv.function_name.clone(),
            arguments: inv
                .arguments
                .iter()
                .map(|(k, v)| (k.clone(), self.value(v, depth + 1)))
                .collect(),
        }
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Parse a token into the wire form.
///
/// Whitespace around the token is ignored. A token that is itself a JSON string
/// holding the expression document (double-encoded by a caller) is unwrapped once.
pub fn parse_expression(token: &str) -> Result<Expression, CodecError> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return Err(CodecError::Empty);
    }

    let value: Value = serde_json::from_str(trimmed)?;
    let value = match value {
        Value::String(inner) => {
            let inner = inner.trim();
            if inner.is_empty() {
                return Err(CodecError::Empty);
            }
            serde_json::from_str(inner)?
        }
        other => other,
    };
    Ok(serde_json::from_value(value)?)
}

/// Resolve the wire form into a tree.
pub fn decode_expression(expression: &Expression) -> Result<Node, CodecError> {
    let mut decoder = Decoder {
        values: &expression.values,
        resolved: HashMap::new(),
        in_progress: HashSet::new(),
        nodes: 0,
    };
    decoder.resolve(&expression.result, 0)
}

/// Parse and resolve a token in one step.
pub fn decode_from_str(token: &str) -> Result<Node, CodecError> {
    decode_expression(&parse_expression(token)?)
}

struct Decoder<'a> {
    values: &'a BTreeMap<String, ValueNode>,
    /// Resolved table entries with the number of nodes each expands to.
    resolved: HashMap<String, (Node, usize)>,
    in_progress: HashSet<String>,
    nodes: usize,
}

impl Decoder<'_> {
    fn count(&mut self, added: usize) -> Result<(), CodecError> {
        self.nodes += added;
        if self.nodes > MAX_NODES {
            return Err(CodecError::TooLarge(MAX_NODES));
        }
        Ok(())
    }

    fn resolve(&mut self, key: &str, depth: usize) -> Result<Node, CodecError> {
        if let Some((node, size)) = self.resolved.get(key) {
            let (node, size) = (node.clone(), *size);
            self.count(size)?;
            return Ok(node);
        }
        if !self.in_progress.insert(key.to_string()) {
            return Err(CodecError::CyclicReference(key.to_string()));
        }

        let value = self
            .values
            .get(key)
            .ok_or_else(|| CodecError::DanglingReference(key.to_string()))?;
        let before = self.nodes;
        let node = self.convert(value, depth + 1)?;

        self.in_progress.remove(key);
        self.resolved
            .insert(key.to_string(), (node.clone(), self.nodes - before));
        Ok(node)
    }

    fn convert(&mut self, value: &ValueNode, depth: usize) -> Result<Node, CodecError> {
        if depth > MAX_DEPTH {
            return Err(CodecError::TooDeep(MAX_DEPTH));
        }
        if !matches!(value, ValueNode::ValueReference(_)) {
            self.count(1)?;
        }

        Ok(match value {
            ValueNode::Constant(v) => Node::Constant(v.clone()),
            ValueNode::Invocation(inv) => {
                let mut arguments = BTreeMap::new();
                for (name, arg) in &inv.arguments {
                    arguments.insert(name.clone(), self.convert(arg, depth + 1)?);
                }
                Node::Invocation(Invocation {
                    function_name: inv.function_name.clone(),
                    arguments,
                })
            }
            ValueNode::Array(array) => Node::Array(
                array
                    .values
                    .iter()
                    .map(|v| self.convert(v, depth + 1))
                    .collect::<Result<_, _>>()?,
            ),
            ValueNode::Dictionary(dict) => {
                let mut map = BTreeMap::new();
                for (name, v) in &dict.values {
                    map.insert(name.clone(), self.convert(v, depth + 1)?);
                }
                Node::Dictionary(map)
            }
            ValueNode::FunctionDefinition(def) => Node::Function(FunctionDefinition {
                argument_names: def.argument_names.clone(),
                body: Box::new(self.resolve(&def.body, depth)?),
            }),
            ValueNode::ArgumentReference(name) => Node::Argument(name.clone()),
            ValueNode::ValueReference(key) => self.resolve(key, depth)?,
        })
    }
}
