//! cty values on the wire
//!
//! Providers exchange state as msgpack-encoded cty values. States are
//! converted to and from `serde_json::Value`; unknown values (msgpack
//! extension type 0) decode as `null`.
//!
//! The provider block is written as HCL and encoded against the provider's
//! own schema: objects carry every attribute the schema declares, with `null`
//! for the ones the configuration leaves out.

use super::schema::{Block, NestingMode};
use anyhow::{bail, Context, Result};
use hcl::eval::{Context as EvalContext, Evaluate};
use serde_json::{Map, Number, Value};

/// Decode a msgpack cty value; an empty payload is a null value
pub fn decode(bytes: &[u8]) -> Result<Value> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    let mut reader = bytes;
    let value = rmpv::decode::read_value(&mut reader).context("Invalid msgpack value")?;
    Ok(to_json(value))
}

pub fn encode(value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, &from_json(value)).context("Failed to encode msgpack value")?;
    Ok(buf)
}

fn to_json(value: rmpv::Value) -> Value {
    match value {
        rmpv::Value::Nil | rmpv::Value::Ext(_, _) => Value::Null,
        rmpv::Value::Boolean(b) => Value::Bool(b),
        rmpv::Value::Integer(i) => i
            .as_i64()
            .map(Value::from)
            .or_else(|| i.as_u64().map(Value::from))
            .unwrap_or(Value::Null),
        rmpv::Value::F32(f) => float(f64::from(f)),
        rmpv::Value::F64(f) => float(f),
        rmpv::Value::String(s) => s.into_str().map(Value::String).unwrap_or(Value::Null),
        rmpv::Value::Binary(b) => Value::String(String::from_utf8_lossy(&b).into_owned()),
        rmpv::Value::Array(items) => Value::Array(items.into_iter().map(to_json).collect()),
        rmpv::Value::Map(entries) => Value::Object(
            entries
                .into_iter()
                .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), to_json(v))))
                .collect(),
        ),
    }
}

fn float(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

fn from_json(value: &Value) -> rmpv::Value {
    match value {
        Value::Null => rmpv::Value::Nil,
        Value::Bool(b) => rmpv::Value::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                rmpv::Value::from(i)
            } else if let Some(u) = n.as_u64() {
                rmpv::Value::from(u)
            } else {
                rmpv::Value::F64(n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => rmpv::Value::from(s.as_str()),
        Value::Array(items) => rmpv::Value::Array(items.iter().map(from_json).collect()),
        Value::Object(map) => rmpv::Value::Map(
            map.iter()
                .map(|(k, v)| (rmpv::Value::from(k.as_str()), from_json(v)))
                .collect(),
        ),
    }
}

/// Parse a provider block body and shape it after the provider schema
pub fn provider_config_value(schema: &Block, config_hcl: &str) -> Result<Value> {
    let body = hcl::parse(config_hcl).context("Invalid provider configuration")?;
    body_to_object(schema, &body, "provider")
}

fn body_to_object(schema: &Block, body: &hcl::Body, path: &str) -> Result<Value> {
    let mut object = Map::new();
    for name in schema.attributes.keys() {
        object.insert(name.clone(), Value::Null);
    }
    for (name, nested) in &schema.block_types {
        let empty = match nested.nesting {
            NestingMode::List | NestingMode::Set => Value::Array(Vec::new()),
            NestingMode::Map => Value::Object(Map::new()),
            NestingMode::Group => body_to_object(&nested.block, &hcl::Body::default(), name)?,
            NestingMode::Single => Value::Null,
        };
        object.insert(name.clone(), empty);
    }

    let ctx = EvalContext::new();
    for attribute in body.attributes() {
        let key = attribute.key();
        if !schema.attributes.contains_key(key) {
            bail!("Unsupported argument {:?} in {}", key, path);
        }
        let value = attribute
            .expr()
            .evaluate(&ctx)
            .map_err(|e| anyhow::anyhow!("Cannot evaluate {}.{}: {}", path, key, e))?;
        object.insert(key.to_string(), serde_json::to_value(&value)?);
    }

    for block in body.blocks() {
        let name = block.identifier();
        let Some(nested) = schema.block_types.get(name) else {
            bail!("Unsupported block type {:?} in {}", name, path);
        };
        let value = body_to_object(&nested.block, block.body(), name)?;
        match nested.nesting {
            NestingMode::List | NestingMode::Set => {
                if let Some(Value::Array(items)) = object.get_mut(name) {
                    items.push(value);
                }
            }
            NestingMode::Map => {
                let Some(label) = block.labels().first() else {
                    bail!("Block {:?} needs a label", name);
                };
                if let Some(Value::Object(entries)) = object.get_mut(name) {
                    entries.insert(label.as_str().to_string(), value);
                }
            }
            NestingMode::Single | NestingMode::Group => {
                object.insert(name.to_string(), value);
            }
        }
    }
    Ok(Value::Object(object))
}
