//! Form schemas for config and options flows
//!
//! A [`FormSchema`] describes the fields a flow step shows and validates the
//! submitted input the way the frontend's schema library would: defaults are
//! filled in, numbers are coerced, select values must be one of the offered
//! options and unknown keys are rejected.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Schema validation errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaError {
    #[error("extra keys not allowed @ data['{0}']")]
    ExtraKey(String),

    #[error("required key not provided @ data['{0}']")]
    Required(String),

    #[error("expected {expected} for dictionary value @ data['{field}']")]
    InvalidType {
        field: String,
        expected: &'static str,
    },

    #[error("value '{value}' is not a valid option @ data['{field}']")]
    NotAnOption { field: String, value: String },

    #[error("invalid datetime '{value}' @ data['{field}']")]
    InvalidDatetime { field: String, value: String },

    #[error("expected a dictionary of form values")]
    NotAnObject,
}

/// One choice of a select field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }

    /// Option whose label is its value
    pub fn plain(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            label: value.clone(),
            value,
        }
    }
}

/// Kind of value a form field accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    Select {
        options: Vec<SelectOption>,
        multiple: bool,
    },
    Icon,
    Datetime,
}

impl FieldType {
    /// Single-choice dropdown
    pub fn select(options: Vec<SelectOption>) -> Self {
        FieldType::Select {
            options,
            multiple: false,
        }
    }

    /// Multiple-choice list
    pub fn multi_select(options: Vec<SelectOption>) -> Self {
        FieldType::Select {
            options,
            multiple: true,
        }
    }
}

/// Form field schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    #[serde(flatten)]
    pub field_type: FieldType,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl FormField {
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            default: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    fn coerce(&self, value: &Value) -> Result<Value, SchemaError> {
        let invalid = |expected| SchemaError::InvalidType {
            field: self.name.clone(),
            expected,
        };

        match &self.field_type {
            FieldType::String | FieldType::Icon => match value {
                Value::String(_) => Ok(value.clone()),
                _ => Err(invalid("str")),
            },
            FieldType::Boolean => match value {
                Value::Bool(_) => Ok(value.clone()),
                _ => Err(invalid("bool")),
            },
            FieldType::Integer => {
                let parsed = match value {
                    Value::Number(n) => n
                        .as_i64()
                        .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
                    Value::String(s) => s.trim().parse::<i64>().ok(),
                    _ => None,
                };
                parsed.map(Value::from).ok_or_else(|| invalid("int"))
            }
            FieldType::Float => {
                let parsed = match value {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    _ => None,
                };
                parsed
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| invalid("float"))
            }
            FieldType::Select { options, multiple } => {
                let check = |v: &Value| match v {
                    Value::String(s) if options.iter().any(|o| &o.value == s) => Ok(v.clone()),
                    Value::String(s) => Err(SchemaError::NotAnOption {
                        field: self.name.clone(),
                        value: s.clone(),
                    }),
                    _ => Err(invalid("str")),
                };
                if *multiple {
                    match value {
                        Value::Array(items) => {
                            items.iter().map(check).collect::<Result<Vec<_>, _>>().map(Value::Array)
                        }
                        _ => Err(invalid("list")),
                    }
                } else {
                    check(value)
                }
            }
            FieldType::Datetime => match value {
                Value::String(s) => parse_datetime(s)
                    .map(|dt| Value::String(dt.to_rfc3339()))
                    .ok_or_else(|| SchemaError::InvalidDatetime {
                        field: self.name.clone(),
                        value: s.clone(),
                    }),
                _ => Err(invalid("datetime")),
            },
        }
    }

    fn is_absent(&self, value: Option<&Value>) -> bool {
        match value {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty() && self.field_type == FieldType::Datetime,
            Some(_) => false,
        }
    }
}

/// Ordered list of fields shown by a flow step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormSchema {
    fields: Vec<FormField>,
}

impl FormSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field
    pub fn field(mut self, field: FormField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn into_fields(self) -> Vec<FormField> {
        self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Validate submitted input against this schema.
    ///
    /// `null` counts as not provided, and so does an empty string for a
    /// date-time field. Defaults are inserted for absent fields.
    pub fn validate(&self, input: &Map<String, Value>) -> Result<FormValues, SchemaError> {
        if let Some(extra) = input.keys().find(|k| self.get(k).is_none()) {
            return Err(SchemaError::ExtraKey(extra.clone()));
        }

        let mut values = Map::new();
        for field in &self.fields {
            let submitted = input.get(&field.name);
            if !field.is_absent(submitted) {
                if let Some(value) = submitted {
                    values.insert(field.name.clone(), field.coerce(value)?);
                }
            } else if let Some(default) = &field.default {
                values.insert(field.name.clone(), default.clone());
            } else if field.required {
                return Err(SchemaError::Required(field.name.clone()));
            }
        }
        Ok(FormValues(values))
    }
}

/// Validated form input
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormValues(Map<String, Value>);

impl FormValues {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn str(&self, key: &str) -> Result<&str, SchemaError> {
        match self.0.get(key) {
            Some(Value::String(s)) => Ok(s),
            Some(_) => Err(SchemaError::InvalidType {
                field: key.to_string(),
                expected: "str",
            }),
            None => Err(SchemaError::Required(key.to_string())),
        }
    }

    /// String value, `None` when absent or empty
    pub fn opt_str(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn f64(&self, key: &str) -> Result<f64, SchemaError> {
        match self.0.get(key) {
            Some(v) => v.as_f64().ok_or_else(|| SchemaError::InvalidType {
                field: key.to_string(),
                expected: "float",
            }),
            None => Err(SchemaError::Required(key.to_string())),
        }
    }

    pub fn i64(&self, key: &str) -> Result<i64, SchemaError> {
        match self.0.get(key) {
            Some(v) => v.as_i64().ok_or_else(|| SchemaError::InvalidType {
                field: key.to_string(),
                expected: "int",
            }),
            None => Err(SchemaError::Required(key.to_string())),
        }
    }

    /// Boolean value, `false` when absent
    pub fn bool(&self, key: &str) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// List of strings, empty when absent
    pub fn str_list(&self, key: &str) -> Vec<String> {
        self.0
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Parse a date-time the way the frontend's date-time selector sends it.
///
/// Accepts RFC 3339 and naive `YYYY-MM-DD[ T]HH:MM[:SS]`; naive values are
/// taken as UTC.
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ]
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn chore_like_schema() -> FormSchema {
        FormSchema::new()
            .field(FormField::required("chore_name", FieldType::String).with_default(""))
            .field(FormField::required("default_points", FieldType::Float).with_default(5.0))
            .field(
                FormField::required(
                    "recurring_frequency",
                    FieldType::select(vec![
                        SelectOption::plain("none"),
                        SelectOption::plain("daily"),
                    ]),
                )
                .with_default("none"),
            )
            .field(FormField::optional("due_date", FieldType::Datetime))
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let values = chore_like_schema()
            .validate(&input(json!({"chore_name": "Dishes"})))
            .unwrap();

        assert_eq!(values.str("chore_name").unwrap(), "Dishes");
        assert_eq!(values.f64("default_points").unwrap(), 5.0);
        assert_eq!(values.str("recurring_frequency").unwrap(), "none");
        assert!(values.get("due_date").is_none());
    }

    #[test]
    fn test_numeric_string_coerced() {
        let values = chore_like_schema()
            .validate(&input(json!({"default_points": "7.5"})))
            .unwrap();
        assert_eq!(values.f64("default_points").unwrap(), 7.5);
    }

    #[test]
    fn test_extra_key_rejected() {
        let err = chore_like_schema()
            .validate(&input(json!({"internal_id": "abc"})))
            .unwrap_err();
        assert_eq!(err, SchemaError::ExtraKey("internal_id".to_string()));
    }

    #[test]
    fn test_required_without_default() {
        let schema =
            FormSchema::new().field(FormField::required("kid_count", FieldType::Integer));
        let err = schema.validate(&Map::new()).unwrap_err();
        assert_eq!(err, SchemaError::Required("kid_count".to_string()));

        let values = schema.validate(&input(json!({"kid_count": "3"}))).unwrap();
        assert_eq!(values.i64("kid_count").unwrap(), 3);
    }

    #[test]
    fn test_select_membership() {
        let err = chore_like_schema()
            .validate(&input(json!({"recurring_frequency": "hourly"})))
            .unwrap_err();
        assert!(matches!(err, SchemaError::NotAnOption { .. }));
    }

    #[test]
    fn test_multi_select() {
        let schema = FormSchema::new().field(
            FormField::required(
                "assigned_kids",
                FieldType::multi_select(vec![SelectOption::new("id-1", "Alice")]),
            )
            .with_default(json!([])),
        );

        let values = schema
            .validate(&input(json!({"assigned_kids": ["id-1"]})))
            .unwrap();
        assert_eq!(values.str_list("assigned_kids"), vec!["id-1".to_string()]);

        assert!(schema
            .validate(&input(json!({"assigned_kids": ["Alice"]})))
            .is_err());
        assert!(schema
            .validate(&input(json!({"assigned_kids": "id-1"})))
            .is_err());
    }

    #[test]
    fn test_datetime_normalized_to_utc() {
        let values = chore_like_schema()
            .validate(&input(json!({"due_date": "2026-10-20T20:00:00+02:00"})))
            .unwrap();
        assert_eq!(
            values.str("due_date").unwrap(),
            "2026-10-20T18:00:00+00:00"
        );

        let values = chore_like_schema()
            .validate(&input(json!({"due_date": "2026-10-20 18:30:00"})))
            .unwrap();
        assert_eq!(
            values.str("due_date").unwrap(),
            "2026-10-20T18:30:00+00:00"
        );
    }

    #[test]
    fn test_empty_or_null_datetime_is_absent() {
        let schema = chore_like_schema();
        for raw in [json!({"due_date": ""}), json!({"due_date": null})] {
            let values = schema.validate(&input(raw)).unwrap();
            assert!(values.get("due_date").is_none());
        }
        assert!(schema
            .validate(&input(json!({"due_date": "next tuesday"})))
            .is_err());
    }

    #[test]
    fn test_field_serialization_shape() {
        let field = FormField::optional(
            "ha_user",
            FieldType::select(vec![SelectOption::new("u1", "Owner")]),
        );
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json["name"], "ha_user");
        assert_eq!(json["type"], "select");
        assert_eq!(json["required"], false);
        assert_eq!(json["options"][0]["label"], "Owner");
        assert!(json.get("default").is_none());
    }
}
