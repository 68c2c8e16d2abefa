//! Serialized handles and typed remote objects.
//!
//! This module provides:
//! - [`SerializedHandle`] - a token together with the kind it was checked to decode to
//! - [`Remote`] - the trait shared by the typed objects [`Image`], [`Geometry`] and
//!   [`FeatureCollection`]
//! - [`RemoteObject`] - the closed union over the three kinds
//!
//! A handle is only constructed through [`SerializedHandle::parse`] or by encoding a
//! typed object, so holding one means the token decodes and its kind is known.

use crate::{
    decode_from_str, encode_to_string, infer_kind, CodecError, FeatureCollection, Geometry,
    HandleKind, Image, Node,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Number of hex characters in a handle fingerprint.
const FINGERPRINT_LEN: usize = 12;

// ============================================================================
// SerializedHandle
// ============================================================================

/// A transport-safe token for a remote object of a known kind.
///
/// Serializes as the bare token string. Deserializing parses the token, so a
/// malformed handle is rejected at the boundary.
#[derive(Debug, Clone)]
pub struct SerializedHandle {
    kind: HandleKind,
    token: String,
    node: Node,
}

impl SerializedHandle {
    /// Parse a token, resolve it and infer its kind.
    pub fn parse(token: &str) -> Result<Self, CodecError> {
        let node = decode_from_str(token)?;
        let kind = infer_kind(&node)?;
        Ok(SerializedHandle {
            kind,
            token: encode_to_string(&node),
            node,
        })
    }

    /// Parse a token and require a particular kind.
    pub fn parse_as(token: &str, expected: HandleKind) -> Result<Self, CodecError> {
        let handle = Self::parse(token)?;
        handle.expect_kind(expected)?;
        Ok(handle)
    }

    fn from_parts(kind: HandleKind, node: Node) -> Self {
        SerializedHandle {
            kind,
            token: encode_to_string(&node),
            node,
        }
    }

    /// Kind of the object the token decodes to.
    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    /// The token string.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Consume the handle, returning the token string.
    pub fn into_token(self) -> String {
        self.token
    }

    /// The decoded expression tree.
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Fail with [`CodecError::KindMismatch`] unless the handle has the given kind.
    pub fn expect_kind(&self, expected: HandleKind) -> Result<(), CodecError> {
        if self.kind != expected {
            return Err(CodecError::KindMismatch {
                expected,
                actual: self.kind,
            });
        }
        Ok(())
    }

    /// Decode into a typed object, checking the kind.
    pub fn decode<T: Remote>(&self) -> Result<T, CodecError> {
        self.expect_kind(T::KIND)?;
        Ok(T::wrap(self.node.clone()))
    }

    /// Decode into the closed union of kinds.
    pub fn object(&self) -> RemoteObject {
        let node = self.node.clone();
        match self.kind {
            HandleKind::Image => RemoteObject::Image(Image::wrap(node)),
            HandleKind::Geometry => RemoteObject::Geometry(Geometry::wrap(node)),
            HandleKind::FeatureCollection => {
                RemoteObject::FeatureCollection(FeatureCollection::wrap(node))
            }
        }
    }

    /// Asset ids the expression loads.
    pub fn referenced_assets(&self) -> Vec<String> {
        self.node.referenced_assets()
    }

    /// Short SHA-256 digest of the token, for logs.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.token.as_bytes());
        let mut hex = hex::encode(digest);
        hex.truncate(FINGERPRINT_LEN);
        hex
    }
}

impl PartialEq for SerializedHandle {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.token == other.token
    }
}

impl Eq for SerializedHandle {}

impl fmt::Display for SerializedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token)
    }
}

impl FromStr for SerializedHandle {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for SerializedHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.token)
    }
}

impl<'de> Deserialize<'de> for SerializedHandle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        SerializedHandle::parse(&token).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Typed objects
// ============================================================================

/// A typed remote object backed by an expression tree.
pub trait Remote: Sized {
    /// The kind every value of this type has.
    const KIND: HandleKind;

    /// Wrap a tree already known to have [`Self::KIND`].
    #[doc(hidden)]
    fn wrap(node: Node) -> Self;

    /// The backing expression tree.
    fn node(&self) -> &Node;

    /// Consume the object, returning its tree.
    fn into_node(self) -> Node;

    /// Wrap an arbitrary tree, checking its kind.
    fn from_node(node: Node) -> Result<Self, CodecError> {
        let actual = infer_kind(&node)?;
        if actual != Self::KIND {
            return Err(CodecError::KindMismatch {
                expected: Self::KIND,
                actual,
            });
        }
        Ok(Self::wrap(node))
    }

    /// Parse a token and decode it as this type.
    fn decode(token: &str) -> Result<Self, CodecError> {
        SerializedHandle::parse(token)?.decode()
    }

    /// Encode into a handle.
    fn encode(&self) -> SerializedHandle {
        SerializedHandle::from_parts(Self::KIND, self.node().clone())
    }
}

macro_rules! remote_object {
    ($name:ident, $kind:expr) => {
        impl Remote for $name {
            const KIND: HandleKind = $kind;

            fn wrap(node: Node) -> Self {
                $name(node)
            }

            fn node(&self) -> &Node {
                &self.0
            }

            fn into_node(self) -> Node {
                self.0
            }
        }
    };
}

remote_object!(Image, HandleKind::Image);
remote_object!(Geometry, HandleKind::Geometry);
remote_object!(FeatureCollection, HandleKind::FeatureCollection);

/// A decoded handle of any supported kind.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteObject {
    /// A raster image.
    Image(Image),
    /// A vector geometry.
    Geometry(Geometry),
    /// A collection of features.
    FeatureCollection(FeatureCollection),
}

impl RemoteObject {
    /// Kind of the wrapped object.
    pub fn kind(&self) -> HandleKind {
        match self {
            RemoteObject::Image(_) => HandleKind::Image,
            RemoteObject::Geometry(_) => HandleKind::Geometry,
            RemoteObject::FeatureCollection(_) => HandleKind::FeatureCollection,
        }
    }

    /// Encode the wrapped object.
    pub fn encode(&self) -> SerializedHandle {
        match self {
            RemoteObject::Image(image) => image.encode(),
            RemoteObject::Geometry(geometry) => geometry.encode(),
            RemoteObject::FeatureCollection(fc) => fc.encode(),
        }
    }
}
