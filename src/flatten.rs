//! Flattening of nested messages into dotted columns
//!
//! [`flatten_schema`] and [`extract_values`] are two collectors over the same
//! depth-first walk, so a header and the rows written under it always agree
//! on column order and on which fields are expanded.

use crate::decode::{Message, Value};

/// Walk every leaf of `msg` in declaration order, depth first.
///
/// `visit` receives the dotted column name and the leaf value. Composite
/// fields are never passed to `visit`; their leaves are, with the composite
/// field name prepended.
pub fn visit_leaves<'a, F>(msg: &'a Message, visit: &mut F)
where
    F: FnMut(&str, &'a Value),
{
    let mut prefix = String::new();
    walk(msg, &mut prefix, visit);
}

fn walk<'a, F>(msg: &'a Message, prefix: &mut String, visit: &mut F)
where
    F: FnMut(&str, &'a Value),
{
    for field in &msg.fields {
        let mark = prefix.len();
        prefix.push_str(&field.name);
        match &field.value {
            Value::Message(child) => {
                prefix.push('.');
                walk(child, prefix, visit);
            }
            leaf => visit(prefix.as_str(), leaf),
        }
        prefix.truncate(mark);
    }
}

/// Column names of `msg`, e.g. `["header.seq", "header.stamp.secs", ...]`
pub fn flatten_schema(msg: &Message) -> Vec<String> {
    let mut columns = Vec::new();
    visit_leaves(msg, &mut |name, _| columns.push(name.to_string()));
    columns
}

/// Leaf values of `msg`, positionally aligned with [`flatten_schema`]
pub fn extract_values(msg: &Message) -> Vec<&Value> {
    let mut values = Vec::new();
    visit_leaves(msg, &mut |_, value| values.push(value));
    values
}
