//! ROS1 message definition parsing
//!
//! A connection record carries the full text definition of its message type,
//! with every dependency appended after a `====` separator line and a
//! `MSG: pkg/Type` marker. This module turns that text into a resolved
//! [`MessageSchema`] that the decoder walks field by field.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

static FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z0-9_/]*)(?:\[(\d*)\])?\s+([A-Za-z][A-Za-z0-9_]*)$")
        .expect("field regex is valid")
});

static MSG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^MSG:\s*(\S+)$").expect("MSG regex is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("{type_name}: cannot parse line {line:?}")]
    InvalidLine { type_name: String, line: String },

    #[error("{type_name}.{field}: type {referenced} is not defined")]
    UnresolvedType {
        type_name: String,
        field: String,
        referenced: String,
    },

    #[error("{0} contains itself through a fixed-size field")]
    RecursiveType(String),

    #[error("definition section without a MSG: marker")]
    MissingMarker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    String,
    Time,
    Duration,
}

impl Primitive {
    pub fn from_name(name: &str) -> Option<Self> {
        let p = match name {
            "bool" => Self::Bool,
            "int8" | "byte" => Self::Int8,
            "uint8" | "char" => Self::UInt8,
            "int16" => Self::Int16,
            "uint16" => Self::UInt16,
            "int32" => Self::Int32,
            "uint32" => Self::UInt32,
            "int64" => Self::Int64,
            "uint64" => Self::UInt64,
            "float32" => Self::Float32,
            "float64" => Self::Float64,
            "string" => Self::String,
            "time" => Self::Time,
            "duration" => Self::Duration,
            _ => return None,
        };
        Some(p)
    }

    /// Fewest bytes one value occupies on the wire
    pub fn min_size(self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 | Self::String => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 | Self::Time | Self::Duration => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Primitive(Primitive),
    /// Fully qualified name of a nested message type
    Message(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Single,
    Fixed(usize),
    Dynamic,
}

/// How a field is laid out in the flattened table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// One column
    Leaf,
    /// Expanded into one column per nested leaf
    Composite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
    pub arity: Arity,
}

impl FieldDef {
    /// Classification only looks at the declared type. Any array is a leaf,
    /// so an empty sequence lands in the same column as a populated one.
    pub fn kind(&self) -> FieldKind {
        match (&self.ty, self.arity) {
            (_, Arity::Fixed(_) | Arity::Dynamic) => FieldKind::Leaf,
            (FieldType::Message(_), Arity::Single) => FieldKind::Composite,
            (FieldType::Primitive(Primitive::Time | Primitive::Duration), Arity::Single) => {
                FieldKind::Composite
            }
            (FieldType::Primitive(_), Arity::Single) => FieldKind::Leaf,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

/// A root message type together with every type it references
#[derive(Debug, Clone)]
pub struct MessageSchema {
    root: String,
    defs: HashMap<String, MessageDef>,
}

struct RawField {
    base: String,
    arity: Arity,
    name: String,
}

impl MessageSchema {
    pub fn parse(root_type: &str, definition: &str) -> Result<Self, SchemaError> {
        let sections = split_sections(root_type, definition)?;

        let known: Vec<&str> = sections.keys().map(String::as_str).collect();
        let mut defs = HashMap::new();
        let mut queue = VecDeque::from([root_type.to_string()]);
        let mut seen = HashSet::new();

        while let Some(type_name) = queue.pop_front() {
            if !seen.insert(type_name.clone()) {
                continue;
            }
            let raw_fields = sections
                .get(&type_name)
                .ok_or_else(|| SchemaError::UnresolvedType {
                    type_name: root_type.to_string(),
                    field: String::new(),
                    referenced: type_name.clone(),
                })?;

            let mut fields = Vec::with_capacity(raw_fields.len());
            for raw in raw_fields {
                let ty = match Primitive::from_name(&raw.base) {
                    Some(p) => FieldType::Primitive(p),
                    None => {
                        let resolved = resolve_type(&raw.base, &type_name, &known).ok_or_else(
                            || SchemaError::UnresolvedType {
                                type_name: type_name.clone(),
                                field: raw.name.clone(),
                                referenced: raw.base.clone(),
                            },
                        )?;
                        queue.push_back(resolved.clone());
                        FieldType::Message(resolved)
                    }
                };
                fields.push(FieldDef {
                    name: raw.name.clone(),
                    ty,
                    arity: raw.arity,
                });
            }
            defs.insert(
                type_name.clone(),
                MessageDef {
                    name: type_name,
                    fields,
                },
            );
        }

        let schema = Self {
            root: root_type.to_string(),
            defs,
        };
        schema.check_acyclic()?;
        Ok(schema)
    }

    pub fn root_name(&self) -> &str {
        &self.root
    }

    pub fn root(&self) -> &MessageDef {
        // parse() always inserts the root first
        &self.defs[&self.root]
    }

    pub fn get(&self, type_name: &str) -> Option<&MessageDef> {
        self.defs.get(type_name)
    }

    /// Lower bound on the encoded size of one `ty` value. Zero for a message
    /// with no fields, or one made only of zero-length fixed arrays.
    pub fn min_size(&self, ty: &FieldType) -> usize {
        match ty {
            FieldType::Primitive(p) => p.min_size(),
            FieldType::Message(name) => self.defs.get(name).map_or(0, |def| {
                def.fields
                    .iter()
                    .map(|f| match f.arity {
                        Arity::Single => self.min_size(&f.ty),
                        Arity::Fixed(0) => 0,
                        Arity::Fixed(n) => n.saturating_mul(self.min_size(&f.ty)),
                        // the length prefix alone
                        Arity::Dynamic => 4,
                    })
                    .fold(0, usize::saturating_add)
            }),
        }
    }

    /// Rejects types that embed themselves through single fields or
    /// non-empty fixed arrays, which would describe an infinitely deep message.
    fn check_acyclic(&self) -> Result<(), SchemaError> {
        fn visit<'a>(
            schema: &'a MessageSchema,
            name: &'a str,
            stack: &mut Vec<&'a str>,
        ) -> Result<(), SchemaError> {
            if stack.contains(&name) {
                return Err(SchemaError::RecursiveType(name.to_string()));
            }
            stack.push(name);
            if let Some(def) = schema.defs.get(name) {
                for field in &def.fields {
                    if let (FieldType::Message(child), Arity::Single | Arity::Fixed(1..)) =
                        (&field.ty, field.arity)
                    {
                        visit(schema, child, stack)?;
                    }
                }
            }
            stack.pop();
            Ok(())
        }
        visit(self, &self.root, &mut Vec::new())
    }
}

fn split_sections(
    root_type: &str,
    definition: &str,
) -> Result<HashMap<String, Vec<RawField>>, SchemaError> {
    let mut sections: HashMap<String, Vec<RawField>> = HashMap::new();
    let mut current = Some(root_type.to_string());
    sections.insert(root_type.to_string(), Vec::new());

    for raw_line in definition.lines() {
        let trimmed = raw_line.trim();
        if !trimmed.is_empty() && trimmed.chars().all(|c| c == '=') {
            current = None;
            continue;
        }

        let line = match trimmed.find('#') {
            Some(pos) => trimmed[..pos].trim(),
            None => trimmed,
        };
        if line.is_empty() {
            continue;
        }

        let Some(type_name) = current.clone() else {
            let caps = MSG_RE.captures(line).ok_or(SchemaError::MissingMarker)?;
            let name = caps[1].to_string();
            sections.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        };

        // constants are not serialized
        if line.contains('=') {
            continue;
        }

        let caps = FIELD_RE
            .captures(line)
            .ok_or_else(|| SchemaError::InvalidLine {
                type_name: type_name.clone(),
                line: line.to_string(),
            })?;
        let arity = match caps.get(2) {
            None => Arity::Single,
            Some(m) if m.as_str().is_empty() => Arity::Dynamic,
            Some(m) => Arity::Fixed(m.as_str().parse().map_err(|_| SchemaError::InvalidLine {
                type_name: type_name.clone(),
                line: line.to_string(),
            })?),
        };
        sections.entry(type_name).or_default().push(RawField {
            base: caps[1].to_string(),
            arity,
            name: caps[3].to_string(),
        });
    }

    Ok(sections)
}

fn resolve_type(base: &str, enclosing: &str, known: &[&str]) -> Option<String> {
    let candidate = if base == "Header" {
        "std_msgs/Header".to_string()
    } else if base.contains('/') {
        base.to_string()
    } else {
        match enclosing.split_once('/') {
            Some((pkg, _)) => format!("{pkg}/{base}"),
            None => base.to_string(),
        }
    };
    if known.contains(&candidate.as_str()) {
        return Some(candidate);
    }

    let short = base.rsplit('/').next().unwrap_or(base);
    let mut matches = known
        .iter()
        .filter(|k| k.rsplit('/').next() == Some(short));
    match (matches.next(), matches.next()) {
        (Some(only), None) => Some(only.to_string()),
        _ => None,
    }
}
