//! Terraform rendering
//!
//! Turns a read resource state into a `resource "<type>" "<name>" { ... }`
//! block. Only settable attributes are written, in a fixed order:
//!
//! 1. `id`, `name`, `location`, `resource_group_name`
//! 2. names ending in `_id` / `_ids`, alphabetically
//! 3. everything else, alphabetically
//!
//! Nested blocks follow, by block name.

use crate::provider::schema::{Block, NestingMode, Schema};
use anyhow::Result;
use hcl::structure::BlockBuilder;
use hcl::{Attribute, Body};
use serde_json::Value;

/// Local name used when the state has no usable `name`
pub const PLACEHOLDER_NAME: &str = "todo_resource_name";

const LEADING_ATTRIBUTES: &[&str] = &["id", "name", "location", "resource_group_name"];

/// Render one resource block
pub fn render_resource(type_name: &str, schema: &Schema, state: &Value) -> Result<String> {
    let block = hcl::Block::builder("resource")
        .add_label(type_name)
        .add_label(local_name(state));
    let block = write_block(block, &schema.block, state).build();

    let body = Body::builder().add_block(block).build();
    Ok(hcl::to_string(&body)?)
}

/// Derive the block's local name from the state's `name` attribute
pub fn local_name(state: &Value) -> String {
    let Some(name) = state.get("name").and_then(Value::as_str).filter(|n| !n.is_empty()) else {
        return PLACEHOLDER_NAME.to_string();
    };

    let mut label: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    // Identifiers must not start with a digit
    if label.starts_with(|c: char| c.is_ascii_digit()) {
        label.insert(0, '_');
    }
    label
}

fn attribute_rank(name: &str) -> usize {
    if let Some(position) = LEADING_ATTRIBUTES.iter().position(|a| *a == name) {
        return position;
    }
    if name.ends_with("_id") || name.ends_with("_ids") {
        LEADING_ATTRIBUTES.len()
    } else {
        LEADING_ATTRIBUTES.len() + 1
    }
}

/// Sort attribute names into output order
pub fn sort_attribute_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    let mut names: Vec<&str> = names.into_iter().collect();
    names.sort_by(|a, b| attribute_rank(a).cmp(&attribute_rank(b)).then_with(|| a.cmp(b)));
    names
}

fn write_block(mut builder: BlockBuilder, schema: &Block, state: &Value) -> BlockBuilder {
    let names = sort_attribute_names(schema.attributes.keys().map(String::as_str));
    for name in names {
        if !schema.attributes[name].is_settable() {
            continue;
        }
        let value = state.get(name).map(to_hcl_value).unwrap_or(hcl::Value::Null);
        builder = builder.add_attribute(Attribute::new(name, value));
    }

    let mut block_names: Vec<&String> = schema.block_types.keys().collect();
    block_names.sort();

    for name in block_names {
        let nested = &schema.block_types[name];
        let Some(value) = state.get(name.as_str()) else {
            continue;
        };

        match (nested.nesting, value) {
            (NestingMode::Map, Value::Object(entries)) => {
                for (key, item) in entries {
                    if item.is_object() {
                        let child = hcl::Block::builder(name.as_str()).add_label(key.as_str());
                        builder = builder.add_block(write_block(child, &nested.block, item).build());
                    }
                }
            }
            (_, Value::Object(_)) => {
                let child = hcl::Block::builder(name.as_str());
                builder = builder.add_block(write_block(child, &nested.block, value).build());
            }
            (_, Value::Array(items)) => {
                for item in items {
                    // Non-object elements have no block representation
                    if !item.is_object() {
                        tracing::trace!("Skipping non-object element in block {}", name);
                        continue;
                    }
                    let child = hcl::Block::builder(name.as_str());
                    builder = builder.add_block(write_block(child, &nested.block, item).build());
                }
            }
            _ => {}
        }
    }

    builder
}

fn to_hcl_value(value: &Value) -> hcl::Value {
    match value {
        Value::Null => hcl::Value::Null,
        Value::Bool(b) => hcl::Value::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                hcl::Value::from(i)
            } else if let Some(u) = n.as_u64() {
                hcl::Value::from(u)
            } else {
                n.as_f64()
                    .and_then(hcl::Number::from_f64)
                    .map(hcl::Value::Number)
                    .unwrap_or(hcl::Value::Null)
            }
        }
        Value::String(s) => hcl::Value::String(s.clone()),
        Value::Array(items) => hcl::Value::Array(items.iter().map(to_hcl_value).collect()),
        Value::Object(map) => hcl::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), to_hcl_value(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::schema::{Attribute as SchemaAttribute, NestedBlock};
    use serde_json::json;

    fn attr(computed: bool, optional: bool) -> SchemaAttribute {
        SchemaAttribute {
            required: !computed && !optional,
            optional,
            computed,
            sensitive: false,
        }
    }

    fn schema_with(attributes: &[(&str, SchemaAttribute)]) -> Schema {
        let mut block = Block::default();
        for (name, attribute) in attributes {
            block.attributes.insert(name.to_string(), attribute.clone());
        }
        Schema { version: 0, block }
    }

    fn position(text: &str, needle: &str) -> usize {
        text.find(needle)
            .unwrap_or_else(|| panic!("{:?} not found in:\n{}", needle, text))
    }

    #[test]
    fn test_attribute_ordering() {
        let sorted = sort_attribute_names(["zebra", "id", "name", "custom_id", "location"]);
        assert_eq!(sorted, vec!["id", "name", "location", "custom_id", "zebra"]);

        let sorted = sort_attribute_names(["b_ids", "resource_group_name", "a_id", "tags", "alpha"]);
        assert_eq!(sorted, vec!["resource_group_name", "a_id", "b_ids", "alpha", "tags"]);
    }

    #[test]
    fn test_rendered_attribute_order() {
        let schema = schema_with(&[
            ("zebra", attr(false, true)),
            ("id", attr(true, true)),
            ("name", attr(false, false)),
            ("custom_id", attr(false, true)),
            ("location", attr(false, false)),
        ]);
        let state = json!({
            "zebra": "z", "id": "/x", "name": "n", "custom_id": "c", "location": "westeurope"
        });
        let text = render_resource("azurerm_thing", &schema, &state).unwrap();

        let order: Vec<usize> = ["id ", "name ", "location ", "custom_id ", "zebra "]
            .iter()
            .map(|n| position(&text, &format!("\n  {}", n)))
            .collect();
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(order, sorted, "{}", text);
    }

    #[test]
    fn test_computed_only_attributes_are_omitted() {
        let schema = schema_with(&[
            ("name", attr(false, false)),
            ("read_only", attr(true, false)),
            ("settable_computed", attr(true, true)),
        ]);
        let state = json!({"name": "n", "read_only": "r", "settable_computed": "s"});
        let text = render_resource("azurerm_thing", &schema, &state).unwrap();
        assert!(!text.contains("read_only"), "{}", text);
        assert!(text.contains("settable_computed"), "{}", text);
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let schema = schema_with(&[
            ("name", attr(false, false)),
            ("tags", attr(false, true)),
            ("subnet_ids", attr(false, true)),
        ]);
        let state = json!({"name": "n", "tags": {"b": "2", "a": "1"}, "subnet_ids": ["s1", "s2"]});
        let first = render_resource("azurerm_thing", &schema, &state).unwrap();
        let second = render_resource("azurerm_thing", &schema, &state).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(&json!({"name": "my-app.prod 1"})), "my_app_prod_1");
        assert_eq!(local_name(&json!({"name": ""})), PLACEHOLDER_NAME);
        assert_eq!(local_name(&json!({"name": null})), PLACEHOLDER_NAME);
        assert_eq!(local_name(&json!({})), PLACEHOLDER_NAME);
    }

    #[test]
    fn test_local_name_never_starts_with_a_digit() {
        assert_eq!(local_name(&json!({"name": "1db"})), "_1db");
        assert_eq!(local_name(&json!({"name": "2021-logs"})), "_2021_logs");
        assert_eq!(local_name(&json!({"name": "db1"})), "db1");
    }

    #[test]
    fn test_header_uses_type_and_local_name() {
        let schema = schema_with(&[("name", attr(false, false))]);
        let text = render_resource("azurerm_resource_group", &schema, &json!({"name": "my-rg"})).unwrap();
        assert!(
            text.starts_with("resource \"azurerm_resource_group\" \"my_rg\" {"),
            "{}",
            text
        );
    }

    fn nested_schema(nesting: NestingMode) -> Schema {
        let mut inner = Block::default();
        inner.attributes.insert("size".to_string(), attr(false, false));
        inner.attributes.insert("computed_only".to_string(), attr(true, false));
        let mut schema = schema_with(&[("name", attr(false, false))]);
        schema.block.block_types.insert(
            "disk".to_string(),
            NestedBlock {
                nesting,
                block: inner,
                min_items: 0,
                max_items: 0,
            },
        );
        schema
    }

    #[test]
    fn test_single_nested_block() {
        let schema = nested_schema(NestingMode::Single);
        let state = json!({"name": "n", "disk": {"size": 10, "computed_only": 1}});
        let text = render_resource("azurerm_thing", &schema, &state).unwrap();
        assert_eq!(text.matches("disk {").count(), 1, "{}", text);
        assert!(text.contains("size"), "{}", text);
        assert!(!text.contains("computed_only"), "{}", text);
    }

    #[test]
    fn test_list_nested_blocks_skip_non_objects() {
        let schema = nested_schema(NestingMode::List);
        let state = json!({"name": "n", "disk": [{"size": 1}, "scalar", 7, {"size": 2}]});
        let text = render_resource("azurerm_thing", &schema, &state).unwrap();
        assert_eq!(text.matches("disk {").count(), 2, "{}", text);
        assert!(!text.contains("scalar"), "{}", text);
    }

    #[test]
    fn test_empty_or_null_nested_blocks_are_omitted() {
        let schema = nested_schema(NestingMode::List);
        for disk in [json!([]), Value::Null] {
            let state = json!({"name": "n", "disk": disk});
            let text = render_resource("azurerm_thing", &schema, &state).unwrap();
            assert!(!text.contains("disk"), "{}", text);
        }
    }

    #[test]
    fn test_map_nested_blocks_are_labelled() {
        let schema = nested_schema(NestingMode::Map);
        let state = json!({"name": "n", "disk": {"data": {"size": 1}, "os": {"size": 2}}});
        let text = render_resource("azurerm_thing", &schema, &state).unwrap();
        assert!(text.contains("disk \"data\" {"), "{}", text);
        assert!(text.contains("disk \"os\" {"), "{}", text);
    }

    #[test]
    fn test_numbers_and_nulls() {
        let schema = schema_with(&[
            ("name", attr(false, false)),
            ("count", attr(false, true)),
            ("ratio", attr(false, true)),
            ("missing", attr(false, true)),
        ]);
        let state = json!({"name": "n", "count": 3, "ratio": 0.5});
        let text = render_resource("azurerm_thing", &schema, &state).unwrap();
        assert!(text.contains("= 3"), "{}", text);
        assert!(text.contains("= 0.5"), "{}", text);
        assert!(text.contains("= null"), "{}", text);
    }
}
