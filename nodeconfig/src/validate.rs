//! Pre-population validation.
//!
//! Population only coerces by type; anything stricter lives behind the
//! [`Validator`] trait so callers can plug in their own checks.

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::schema::{AdditionalProperties, Items, Resolver, SchemaNode, SchemaType};

/// One reason a value was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Dotted path from the root, e.g. `server.ports[1]`.
    pub path: String,
    pub message: String,
}

/// Schema-aware value checks run before population.
pub trait Validator {
    /// Whether `schema` is usable at all.
    fn check_schema(&self, schema: &Value) -> bool;

    /// Every problem found in `value`; empty when it is acceptable.
    fn validate(&self, schema: &Value, value: &Value) -> Vec<ValidationIssue>;
}

impl<F> Validator for F
where
    F: Fn(&Value, &Value) -> Vec<ValidationIssue>,
{
    fn check_schema(&self, _schema: &Value) -> bool {
        true
    }

    fn validate(&self, schema: &Value, value: &Value) -> Vec<ValidationIssue> {
        self(schema, value)
    }
}

/// Coarse structural checks against a resolved schema: types, `required`,
/// `enum`/`const`, numeric bounds, lengths, patterns and item counts.
///
/// A union passes when any branch passes. Formats and the rest of the
/// vocabulary are not checked.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralValidator;

impl StructuralValidator {
    /// Check `value` against an already resolved schema.
    pub fn validate_node(&self, schema: &SchemaNode, value: &Value) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        check(schema, value, "", &mut issues);
        issues
    }
}

impl Validator for StructuralValidator {
    fn check_schema(&self, schema: &Value) -> bool {
        Resolver::new(schema).resolve_root().is_ok()
    }

    fn validate(&self, schema: &Value, value: &Value) -> Vec<ValidationIssue> {
        match Resolver::new(schema).resolve_root() {
            Ok(node) => self.validate_node(&node, value),
            Err(e) => vec![ValidationIssue {
                path: String::new(),
                message: format!("schema is not usable: {e}"),
            }],
        }
    }
}

fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn type_matches(schema: &SchemaNode, value: &Value) -> bool {
    if schema.types.is_empty() {
        return true;
    }
    let actual = SchemaType::of_value(value);
    schema.has_type(actual)
        || (actual == SchemaType::Integer && schema.has_type(SchemaType::Number))
}

fn check(schema: &SchemaNode, value: &Value, path: &str, issues: &mut Vec<ValidationIssue>) {
    let mut push = |message: String| {
        issues.push(ValidationIssue {
            path: path.to_string(),
            message,
        })
    };

    if !type_matches(schema, value) {
        let expected: Vec<_> = schema.types.iter().map(SchemaType::as_str).collect();
        push(format!(
            "expected {}, got {}",
            expected.join(" or "),
            SchemaType::of_value(value).as_str()
        ));
        return;
    }

    if let Some(c) = &schema.const_value
        && c != value
    {
        push(format!("must equal {c}"));
    }
    if let Some(options) = &schema.enum_values
        && !options.contains(value)
    {
        push(format!("{value} is not one of {}", Value::Array(options.clone())));
    }

    let c = &schema.constraints;
    match value {
        Value::Number(n) => {
            if let Some(n) = n.as_f64() {
                if let Some(min) = c.minimum
                    && n < min
                {
                    push(format!("{n} is below the minimum {min}"));
                }
                if let Some(max) = c.maximum
                    && n > max
                {
                    push(format!("{n} is above the maximum {max}"));
                }
                if let Some(min) = c.exclusive_minimum
                    && n <= min
                {
                    push(format!("{n} must be greater than {min}"));
                }
                if let Some(max) = c.exclusive_maximum
                    && n >= max
                {
                    push(format!("{n} must be less than {max}"));
                }
                if let Some(step) = c.multiple_of
                    && step > 0.0
                    && ((n / step).round() * step - n).abs() > f64::EPSILON * n.abs().max(1.0)
                {
                    push(format!("{n} is not a multiple of {step}"));
                }
            }
        }
        Value::String(s) => {
            let len = s.chars().count() as u64;
            if let Some(min) = c.min_length
                && len < min
            {
                push(format!("shorter than {min} characters"));
            }
            if let Some(max) = c.max_length
                && len > max
            {
                push(format!("longer than {max} characters"));
            }
            if let Some(pattern) = &c.pattern {
                match Regex::new(pattern) {
                    Ok(re) if !re.is_match(s) => push(format!("does not match `{pattern}`")),
                    Ok(_) => {}
                    Err(e) => debug!("skipping invalid pattern `{pattern}`: {e}"),
                }
            }
        }
        Value::Array(list) => {
            let len = list.len() as u64;
            if let Some(min) = c.min_items
                && len < min
            {
                push(format!("needs at least {min} items"));
            }
            if let Some(max) = c.max_items
                && len > max
            {
                push(format!("allows at most {max} items"));
            }
        }
        _ => {}
    }

    match (value, &schema.items) {
        (Value::Array(list), Some(Items::Single(item))) => {
            for (i, v) in list.iter().enumerate() {
                check(item, v, &format!("{path}[{i}]"), issues);
            }
        }
        (Value::Array(list), Some(Items::Tuple(items))) => {
            for (i, (item, v)) in items.iter().zip(list).enumerate() {
                check(item, v, &format!("{path}[{i}]"), issues);
            }
        }
        _ => {}
    }

    if let Value::Object(map) = value {
        for name in &schema.required {
            if !map.contains_key(name) {
                issues.push(ValidationIssue {
                    path: child_path(path, name),
                    message: "required property is missing".to_string(),
                });
            }
        }
        for (key, v) in map {
            let key_path = child_path(path, key);
            if let Some(prop) = schema.properties.get(key) {
                check(prop, v, &key_path, issues);
                continue;
            }
            match &schema.additional_properties {
                Some(AdditionalProperties::Allowed(false)) => issues.push(ValidationIssue {
                    path: key_path,
                    message: "additional property is not allowed".to_string(),
                }),
                Some(AdditionalProperties::Schema(extra)) => check(extra, v, &key_path, issues),
                _ => {}
            }
        }
    }

    if let Some(union) = &schema.union {
        let mut best: Option<Vec<ValidationIssue>> = None;
        for branch in &union.branches {
            let mut found = Vec::new();
            check(branch, value, path, &mut found);
            if found.is_empty() {
                return;
            }
            if best.as_ref().is_none_or(|b| found.len() < b.len()) {
                best = Some(found);
            }
        }
        issues.push(ValidationIssue {
            path: path.to_string(),
            message: format!(
                "matches none of the {} `{}` branches",
                union.branches.len(),
                union.kind.keyword()
            ),
        });
        issues.extend(best.unwrap_or_default());
    }
}
