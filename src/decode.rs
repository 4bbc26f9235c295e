//! ROS1 binary deserialization into a dynamic [`Message`] tree

use std::fmt;

use crate::error::DecodeError;
use crate::msg_def::{Arity, FieldKind, FieldType, MessageDef, MessageSchema, Primitive};

/// A decoded field value. `Message` is produced only for composite fields,
/// every other variant is a leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Sequence(Vec<Value>),
    Message(Message),
}

impl Value {
    pub fn kind(&self) -> FieldKind {
        match self {
            Value::Message(_) => FieldKind::Composite,
            _ => FieldKind::Leaf,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Text(s) => f.write_str(s),
            Value::Sequence(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match item {
                        Value::Text(s) => write!(f, "{s:?}")?,
                        other => write!(f, "{other}")?,
                    }
                }
                f.write_str("]")
            }
            Value::Message(msg) => {
                f.write_str("{")?;
                for (i, field) in msg.fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.value)?;
                }
                f.write_str("}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub value: Value,
}

/// A structured record whose fields keep their declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub type_name: String,
    pub fields: Vec<Field>,
}

impl Message {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.push(Field {
            name: name.into(),
            value,
        });
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }
}

/// Longest array accepted when its elements take no payload bytes, since
/// nothing in the payload bounds the count.
const MAX_ZERO_SIZED_ELEMENTS: usize = 1 << 16;

/// Decode one serialized message of the schema's root type
pub fn decode_message(schema: &MessageSchema, payload: &[u8]) -> Result<Message, DecodeError> {
    let mut cursor = 0;
    decode_struct(schema, schema.root(), payload, &mut cursor)
}

fn decode_struct(
    schema: &MessageSchema,
    def: &MessageDef,
    payload: &[u8],
    cursor: &mut usize,
) -> Result<Message, DecodeError> {
    let mut fields = Vec::with_capacity(def.fields.len());
    for field in &def.fields {
        let value = match field.arity {
            Arity::Single => decode_single(schema, &field.ty, payload, cursor)?,
            Arity::Fixed(n) => Value::Sequence(decode_elements(schema, &field.ty, n, payload, cursor)?),
            Arity::Dynamic => {
                let n = u32::from_le_bytes(read_array(payload, cursor)?) as usize;
                Value::Sequence(decode_elements(schema, &field.ty, n, payload, cursor)?)
            }
        };
        fields.push(Field {
            name: field.name.clone(),
            value,
        });
    }
    Ok(Message {
        type_name: def.name.clone(),
        fields,
    })
}

fn decode_elements(
    schema: &MessageSchema,
    ty: &FieldType,
    count: usize,
    payload: &[u8],
    cursor: &mut usize,
) -> Result<Vec<Value>, DecodeError> {
    // a corrupt length prefix must fail before anything is allocated
    let remaining = payload.len().saturating_sub(*cursor);
    let elem_size = schema.min_size(ty);
    if elem_size == 0 {
        if count > MAX_ZERO_SIZED_ELEMENTS {
            return Err(DecodeError::Record(format!(
                "array of {count} elements that occupy no bytes"
            )));
        }
    } else if count > remaining / elem_size {
        return Err(DecodeError::Truncated {
            needed: count.saturating_mul(elem_size),
            offset: *cursor,
            len: payload.len(),
        });
    }

    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        items.push(decode_single(schema, ty, payload, cursor)?);
    }
    Ok(items)
}

fn decode_single(
    schema: &MessageSchema,
    ty: &FieldType,
    payload: &[u8],
    cursor: &mut usize,
) -> Result<Value, DecodeError> {
    let p = match ty {
        FieldType::Message(name) => {
            let def = schema
                .get(name)
                .ok_or_else(|| DecodeError::UnknownType(name.clone()))?;
            return Ok(Value::Message(decode_struct(schema, def, payload, cursor)?));
        }
        FieldType::Primitive(p) => *p,
    };

    let value = match p {
        Primitive::Bool => Value::Bool(read_array::<1>(payload, cursor)?[0] != 0),
        Primitive::Int8 => Value::Int(i8::from_le_bytes(read_array(payload, cursor)?) as i64),
        Primitive::UInt8 => Value::UInt(read_array::<1>(payload, cursor)?[0] as u64),
        Primitive::Int16 => Value::Int(i16::from_le_bytes(read_array(payload, cursor)?) as i64),
        Primitive::UInt16 => Value::UInt(u16::from_le_bytes(read_array(payload, cursor)?) as u64),
        Primitive::Int32 => Value::Int(i32::from_le_bytes(read_array(payload, cursor)?) as i64),
        Primitive::UInt32 => Value::UInt(u32::from_le_bytes(read_array(payload, cursor)?) as u64),
        Primitive::Int64 => Value::Int(i64::from_le_bytes(read_array(payload, cursor)?)),
        Primitive::UInt64 => Value::UInt(u64::from_le_bytes(read_array(payload, cursor)?)),
        Primitive::Float32 => Value::Float(f32::from_le_bytes(read_array(payload, cursor)?) as f64),
        Primitive::Float64 => Value::Float(f64::from_le_bytes(read_array(payload, cursor)?)),
        Primitive::String => {
            let len = u32::from_le_bytes(read_array(payload, cursor)?) as usize;
            let bytes = take(payload, cursor, len)?;
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
        Primitive::Time => {
            let secs = u32::from_le_bytes(read_array(payload, cursor)?);
            let nsecs = u32::from_le_bytes(read_array(payload, cursor)?);
            Value::Message(
                Message::new("time")
                    .with_field("secs", Value::UInt(secs as u64))
                    .with_field("nsecs", Value::UInt(nsecs as u64)),
            )
        }
        Primitive::Duration => {
            let secs = i32::from_le_bytes(read_array(payload, cursor)?);
            let nsecs = i32::from_le_bytes(read_array(payload, cursor)?);
            Value::Message(
                Message::new("duration")
                    .with_field("secs", Value::Int(secs as i64))
                    .with_field("nsecs", Value::Int(nsecs as i64)),
            )
        }
    };
    Ok(value)
}

fn take<'a>(payload: &'a [u8], cursor: &mut usize, n: usize) -> Result<&'a [u8], DecodeError> {
    let end = cursor
        .checked_add(n)
        .filter(|&end| end <= payload.len())
        .ok_or(DecodeError::Truncated {
            needed: n,
            offset: *cursor,
            len: payload.len(),
        })?;
    let bytes = &payload[*cursor..end];
    *cursor = end;
    Ok(bytes)
}

fn read_array<const N: usize>(payload: &[u8], cursor: &mut usize) -> Result<[u8; N], DecodeError> {
    let mut out = [0u8; N];
    out.copy_from_slice(take(payload, cursor, N)?);
    Ok(out)
}
