// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core types for catalog data representation
//!
//! This module defines the identifiers and value-level types shared by every
//! entity kind.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// Stable entity identifier
///
/// Identifiers are opaque strings. Fresh identifiers are random UUIDs, but
/// identifiers read from a document are kept verbatim so they survive a
/// round trip untouched.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        EntityId(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the raw identifier string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        EntityId(id)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        EntityId(id.to_string())
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// The four entity kinds stored in a catalog
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Attribute,
    PropertySet,
    Object,
    Aggregation,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Attribute => "Attribute",
            EntityKind::PropertySet => "PropertySet",
            EntityKind::Object => "Object",
            EntityKind::Aggregation => "Aggregation",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single attribute value
///
/// Documents store values as plain JSON scalars; numeric ranges are stored as
/// two-element arrays.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Range(f64, f64),
}

impl Value {
    /// Get the numeric content of a real or integer value
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            // Keep a trailing ".0" so reals stay distinguishable from integers in codes
            Value::Real(r) if r.is_finite() && r.fract() == 0.0 => write!(f, "{:.1}", r),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => f.write_str(s),
            Value::Range(low, high) => write!(f, "[{}, {}]", low, high),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

/// How an attribute's value list is to be interpreted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// Plain values
    #[default]
    Value,
    /// Format patterns the real value has to match
    Format,
    /// Numeric ranges
    #[serde(alias = "range", alias = "RANGE")]
    Range,
    /// Enumeration of allowed values
    List,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Value => "Value",
            ValueType::Format => "Format",
            ValueType::Range => "Range",
            ValueType::List => "List",
        }
    }
}

/// Data type of an attribute, named after the IFC measure types
///
/// Older documents used XML schema names (`xs:string`, ...); those are
/// accepted when reading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    #[default]
    #[serde(rename = "IfcLabel", alias = "xs:string")]
    Text,
    #[serde(rename = "IfcReal", alias = "xs:double", alias = "xs:long")]
    Real,
    #[serde(rename = "IfcBoolean", alias = "xs:boolean")]
    Boolean,
    #[serde(rename = "IfcInteger", alias = "xs:int")]
    Integer,
    #[serde(rename = "IfcDate")]
    Date,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Text => "IfcLabel",
            DataType::Real => "IfcReal",
            DataType::Boolean => "IfcBoolean",
            DataType::Integer => "IfcInteger",
            DataType::Date => "IfcDate",
        }
    }

    /// Parse current and legacy data type names
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "IfcLabel" | "xs:string" => Some(DataType::Text),
            "IfcReal" | "xs:double" | "xs:long" => Some(DataType::Real),
            "IfcBoolean" | "xs:boolean" => Some(DataType::Boolean),
            "IfcInteger" | "xs:int" => Some(DataType::Integer),
            "IfcDate" => Some(DataType::Date),
            _ => None,
        }
    }
}

/// Tag on an aggregation edge
///
/// `AGGREGATION` marks a part-of edge, `INHERITANCE` an is-a edge. Both may be
/// combined with `|`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ConnectionType(u8);

impl ConnectionType {
    pub const AGGREGATION: ConnectionType = ConnectionType(1);
    pub const INHERITANCE: ConnectionType = ConnectionType(2);

    /// Build from raw bits; only 1, 2 and 3 are valid
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            1..=3 => Some(ConnectionType(bits)),
            _ => None,
        }
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: ConnectionType) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether the edge contributes to identity codes
    pub fn is_aggregation(self) -> bool {
        self.contains(ConnectionType::AGGREGATION)
    }
}

impl Default for ConnectionType {
    fn default() -> Self {
        ConnectionType::AGGREGATION
    }
}

impl BitOr for ConnectionType {
    type Output = ConnectionType;

    fn bitor(self, rhs: Self) -> Self::Output {
        ConnectionType(self.0 | rhs.0)
    }
}

impl TryFrom<u8> for ConnectionType {
    type Error = String;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        ConnectionType::from_bits(bits).ok_or_else(|| format!("invalid connection type {}", bits))
    }
}

impl From<ConnectionType> for u8 {
    fn from(c: ConnectionType) -> Self {
        c.0
    }
}
