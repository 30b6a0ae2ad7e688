//! C5 — ArgumentBinder: schema-driven mapping from internal records to tool call arguments
//! (spec §4.5).
//!
//! Ported directly from `examples/original_source/src/mcp/argument_builder.py`'s
//! `SchemaAwareArgumentBuilder`: the alias table, the direct→context→alias→case-insensitive
//! resolution order, and the per-type coercion rules all mirror that file's behavior. The
//! schema-structure checks are ported from `examples/original_source/src/mcp/schema_validator.py`'s
//! `MCPSchemaValidator`/`MCPContractTester`.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::errors::{AppError, ErrorKind};
use crate::model::{InputSchema, PropertyType, SchemaProperty};

/// Builds a tool's call arguments from internal data plus an optional invocation context,
/// validating types/enums/required-ness along the way (spec §4.5 contract).
pub struct ArgumentBinder;

impl ArgumentBinder {
    /// Assemble the call arguments in schema declaration order.
    pub fn build(
        schema: &InputSchema,
        internal_data: &BTreeMap<String, Value>,
        context: Option<&BTreeMap<String, Value>>,
    ) -> Result<BTreeMap<String, Value>, AppError> {
        let mut out = BTreeMap::new();

        for (name, property) in &schema.properties {
            let required = schema.required.contains(name);

            let resolved = Self::find_value_for_param(name, internal_data, context)
                .or_else(|| Self::default_for_param(name, property));

            let value = match resolved {
                Some(v) => v,
                None if required => {
                    return Err(AppError::new(ErrorKind::SchemaValidation, format!("missing_required: {}", name)));
                }
                None => continue,
            };

            let coerced = Self::convert_type(name, &value, property.property_type)?;
            Self::validate_enum(name, &coerced, property)?;

            out.insert(name.clone(), coerced);
        }

        Ok(out)
    }

    /// Step 1: direct match, then context, then the alias table, then a case-insensitive
    /// key scan — in that order, matching `_find_value_for_param`.
    fn find_value_for_param(
        name: &str,
        internal_data: &BTreeMap<String, Value>,
        context: Option<&BTreeMap<String, Value>>,
    ) -> Option<Value> {
        if let Some(v) = internal_data.get(name) {
            return Some(v.clone());
        }

        if let Some(ctx) = context {
            if let Some(v) = ctx.get(name) {
                return Some(v.clone());
            }
        }

        for alias in Self::aliases_for(name) {
            if let Some(v) = internal_data.get(&alias) {
                return Some(v.clone());
            }
            if let Some(ctx) = context {
                if let Some(v) = ctx.get(&alias) {
                    return Some(v.clone());
                }
            }
        }

        let lower = name.to_lowercase();
        internal_data
            .iter()
            .find(|(k, _)| k.to_lowercase() == lower)
            .map(|(_, v)| v.clone())
            .or_else(|| {
                context.and_then(|ctx| {
                    ctx.iter()
                        .find(|(k, _)| k.to_lowercase() == lower)
                        .map(|(_, v)| v.clone())
                })
            })
    }

    /// The static alias table plus generated `Id`/`Key` variants (spec §4.5 step 1).
    fn aliases_for(name: &str) -> Vec<String> {
        let mut aliases: Vec<String> = match name {
            "title" => vec!["name", "pageTitle", "page_title", "summary"],
            "content" => vec!["body", "html", "text", "description"],
            "space" => vec!["spaceKey", "space_key", "spaceId", "space_id"],
            "spaceId" => vec!["space_id", "spaceKey", "space_key"],
            "cloudId" => vec!["cloud_id"],
            "contentFormat" => vec!["content_format", "format"],
            _ => vec![],
        }
        .into_iter()
        .map(str::to_string)
        .collect();

        if let Some(stem) = name.strip_suffix("Id") {
            aliases.push(format!("{}_id", to_snake_stem(stem)));
        }
        if let Some(stem) = name.strip_suffix("Key") {
            aliases.push(format!("{}_key", to_snake_stem(stem)));
        }
        if let Some(stem) = name.strip_suffix("_id") {
            aliases.push(format!("{}Id", stem));
            aliases.push(format!("{}Key", stem));
        }
        if let Some(stem) = name.strip_suffix("_key") {
            aliases.push(format!("{}Key", stem));
            aliases.push(format!("{}Id", stem));
        }

        aliases
    }

    /// Step 6: a declared default, or the `contentFormat`-defaults-to-`markdown` special
    /// case when no enum/default is declared for that specific property name.
    fn default_for_param(name: &str, property: &SchemaProperty) -> Option<Value> {
        if let Some(default) = &property.default {
            return Some(default.clone());
        }
        if name == "contentFormat" && property.allowed_values().is_none() {
            return Some(Value::String("markdown".to_string()));
        }
        None
    }

    /// Step 4: coerce to the declared primitive type.
    fn convert_type(name: &str, value: &Value, property_type: PropertyType) -> Result<Value, AppError> {
        match property_type {
            PropertyType::String => Ok(Value::String(stringify(value))),
            PropertyType::Integer => {
                let text = stringify(value);
                text.trim()
                    .parse::<i64>()
                    .map(|n| Value::Number(n.into()))
                    .map_err(|_| AppError::new(ErrorKind::SchemaValidation, format!("type_mismatch: {} is not an integer", name)))
            }
            PropertyType::Number => {
                let text = stringify(value);
                text.trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| AppError::new(ErrorKind::SchemaValidation, format!("type_mismatch: {} is not a number", name)))
            }
            PropertyType::Boolean => {
                if let Value::Bool(b) = value {
                    return Ok(Value::Bool(*b));
                }
                let text = stringify(value).to_lowercase();
                match text.as_str() {
                    "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
                    "false" | "0" | "no" | "off" => Ok(Value::Bool(false)),
                    _ => Err(AppError::new(ErrorKind::SchemaValidation, format!("type_mismatch: {} is not a boolean", name))),
                }
            }
        }
    }

    /// Step 5: enum membership check, merging bare `enum` with `anyOf[].enum`.
    fn validate_enum(name: &str, value: &Value, property: &SchemaProperty) -> Result<(), AppError> {
        match property.allowed_values() {
            Some(allowed) if !allowed.contains(value) => Err(AppError::new(
                ErrorKind::SchemaValidation,
                format!("enum_violation: {} = {} not in {:?}", name, value, allowed),
            )),
            _ => Ok(()),
        }
    }

    /// Schema-structure sanity checks ported from `MCPSchemaValidator.validate_schema_structure`:
    /// every `required` name must name a declared property.
    pub fn validate_schema(schema: &InputSchema) -> Result<(), AppError> {
        for name in &schema.required {
            if !schema.properties.contains_key(name) {
                return Err(AppError::new(
                    ErrorKind::SchemaValidation,
                    format!("schema declares required property '{}' with no matching definition", name),
                ));
            }
        }
        Ok(())
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn to_snake_stem(stem: &str) -> String {
    let mut out = String::new();
    for (i, ch) in stem.chars().enumerate() {
        if ch.is_uppercase() && i > 0 {
            out.push('_');
        }
        out.extend(ch.to_lowercase());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema_with(properties: Vec<(&str, SchemaProperty)>, required: Vec<&str>) -> InputSchema {
        InputSchema {
            properties: properties.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            required: required.into_iter().map(str::to_string).collect(),
        }
    }

    #[test]
    fn direct_match_wins_over_alias() {
        let schema = schema_with(vec![("title", SchemaProperty::new(PropertyType::String))], vec!["title"]);
        let mut data = BTreeMap::new();
        data.insert("title".to_string(), json!("Direct"));
        data.insert("name".to_string(), json!("Alias"));
        let out = ArgumentBinder::build(&schema, &data, None).unwrap();
        assert_eq!(out["title"], json!("Direct"));
    }

    #[test]
    fn alias_table_resolves_content_from_body() {
        let schema = schema_with(vec![("content", SchemaProperty::new(PropertyType::String))], vec!["content"]);
        let mut data = BTreeMap::new();
        data.insert("body".to_string(), json!("hello"));
        let out = ArgumentBinder::build(&schema, &data, None).unwrap();
        assert_eq!(out["content"], json!("hello"));
    }

    #[test]
    fn context_fallback_used_when_data_missing() {
        let schema = schema_with(vec![("cloudId", SchemaProperty::new(PropertyType::String))], vec!["cloudId"]);
        let data = BTreeMap::new();
        let mut ctx = BTreeMap::new();
        ctx.insert("cloud_id".to_string(), json!("abc-123"));
        let out = ArgumentBinder::build(&schema, &data, Some(&ctx)).unwrap();
        assert_eq!(out["cloudId"], json!("abc-123"));
    }

    #[test]
    fn missing_required_property_errors() {
        let schema = schema_with(vec![("title", SchemaProperty::new(PropertyType::String))], vec!["title"]);
        let data = BTreeMap::new();
        let err = ArgumentBinder::build(&schema, &data, None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SchemaValidation);
        assert!(err.detail.contains("missing_required"));
    }

    #[test]
    fn optional_missing_property_is_skipped() {
        let schema = schema_with(vec![("priority", SchemaProperty::new(PropertyType::String))], vec![]);
        let data = BTreeMap::new();
        let out = ArgumentBinder::build(&schema, &data, None).unwrap();
        assert!(!out.contains_key("priority"));
    }

    #[test]
    fn boolean_coercion_accepts_truthy_strings() {
        let schema = schema_with(vec![("notify", SchemaProperty::new(PropertyType::Boolean))], vec!["notify"]);
        let mut data = BTreeMap::new();
        data.insert("notify".to_string(), json!("Yes"));
        let out = ArgumentBinder::build(&schema, &data, None).unwrap();
        assert_eq!(out["notify"], json!(true));
    }

    #[test]
    fn integer_coercion_rejects_non_numeric() {
        let schema = schema_with(vec![("count", SchemaProperty::new(PropertyType::Integer))], vec!["count"]);
        let mut data = BTreeMap::new();
        data.insert("count".to_string(), json!("not-a-number"));
        let err = ArgumentBinder::build(&schema, &data, None).unwrap_err();
        assert!(err.detail.contains("type_mismatch"));
    }

    #[test]
    fn enum_violation_rejects_value_outside_set() {
        let schema = schema_with(
            vec![(
                "priority",
                SchemaProperty::new(PropertyType::String).with_enum(vec![json!("low"), json!("high")]),
            )],
            vec!["priority"],
        );
        let mut data = BTreeMap::new();
        data.insert("priority".to_string(), json!("urgent"));
        let err = ArgumentBinder::build(&schema, &data, None).unwrap_err();
        assert!(err.detail.contains("enum_violation"));
    }

    #[test]
    fn content_format_defaults_to_markdown_when_unspecified() {
        let schema = schema_with(vec![("contentFormat", SchemaProperty::new(PropertyType::String))], vec![]);
        let data = BTreeMap::new();
        let out = ArgumentBinder::build(&schema, &data, None).unwrap();
        assert_eq!(out["contentFormat"], json!("markdown"));
    }

    #[test]
    fn validate_schema_rejects_required_without_definition() {
        let schema = InputSchema {
            properties: BTreeMap::new(),
            required: vec!["title".to_string()],
        };
        assert!(ArgumentBinder::validate_schema(&schema).is_err());
    }

    #[test]
    fn build_is_idempotent_when_internal_names_match_schema_names() {
        let schema = schema_with(vec![("title", SchemaProperty::new(PropertyType::String))], vec!["title"]);
        let mut data = BTreeMap::new();
        data.insert("title".to_string(), json!("Same"));
        let once = ArgumentBinder::build(&schema, &data, None).unwrap();
        let twice = ArgumentBinder::build(&schema, &once, None).unwrap();
        assert_eq!(once, twice);
    }
}
