//! Tool specs and input validation
//!
//! A [`ToolSpec`] is both what gets advertised to the reasoning service (as
//! JSON Schema) and what the registry checks call arguments against before
//! a handler ever sees them.

use std::str::FromStr;

use serde_json::{Map, Value, json};

use super::ToolError;

/// JSON-compatible parameter types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    /// JSON Schema type name
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }

    /// Whether `value` has this type; integers may arrive as whole floats
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Integer => {
                value.is_i64() || value.is_u64() || value.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
            }
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
        }
    }
}

/// Parse from a JSON Schema type name
impl FromStr for ParamType {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(ParamType::String),
            "number" => Ok(ParamType::Number),
            "integer" => Ok(ParamType::Integer),
            "boolean" => Ok(ParamType::Boolean),
            "array" => Ok(ParamType::Array),
            "object" => Ok(ParamType::Object),
            other => Err(ToolError::InvalidInput(format!("Unknown parameter type '{}'", other))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One input parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub kind: ParamType,
    pub description: String,
    pub required: bool,
    /// Allowed string values; applies to each item when `kind` is an array
    pub allowed: Option<Vec<String>>,
    /// Item type for arrays
    pub items: Option<ParamType>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn new(kind: ParamType, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            required: false,
            allowed: None,
            items: None,
            minimum: None,
            maximum: None,
            default: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn allowed<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn items(mut self, kind: ParamType) -> Self {
        self.items = Some(kind);
        self
    }

    pub fn range(mut self, minimum: f64, maximum: f64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    fn schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".into(), json!(self.kind.as_str()));
        schema.insert("description".into(), json!(self.description));

        if self.kind == ParamType::Array {
            let mut items = Map::new();
            items.insert("type".into(), json!(self.items.unwrap_or(ParamType::String).as_str()));
            if let Some(allowed) = &self.allowed {
                items.insert("enum".into(), json!(allowed));
            }
            schema.insert("items".into(), Value::Object(items));
        } else if let Some(allowed) = &self.allowed {
            schema.insert("enum".into(), json!(allowed));
        }

        if let Some(min) = self.minimum {
            schema.insert("minimum".into(), json!(min));
        }
        if let Some(max) = self.maximum {
            schema.insert("maximum".into(), json!(max));
        }
        if let Some(default) = &self.default {
            schema.insert("default".into(), default.clone());
        }
        Value::Object(schema)
    }

    fn check(&self, name: &str, value: &Value) -> Result<(), ToolError> {
        if !self.kind.matches(value) {
            return Err(ToolError::InvalidInput(format!(
                "'{}' must be {}, got {}",
                name,
                self.kind.as_str(),
                json_kind(value)
            )));
        }

        if let (Some(kind), Value::Array(items)) = (self.items, value)
            && let Some(bad) = items.iter().find(|v| !kind.matches(v))
        {
            return Err(ToolError::InvalidInput(format!(
                "'{}' items must be {}, got {}",
                name,
                kind.as_str(),
                json_kind(bad)
            )));
        }

        if let Some(allowed) = &self.allowed {
            let candidates: Vec<&Value> = match value {
                Value::Array(items) => items.iter().collect(),
                other => vec![other],
            };
            for candidate in candidates {
                if !candidate.as_str().is_some_and(|s| allowed.iter().any(|a| a == s)) {
                    return Err(ToolError::InvalidInput(format!(
                        "'{}' has unsupported value {}; expected one of {}",
                        name,
                        candidate,
                        allowed.join(", ")
                    )));
                }
            }
        }

        if let Some(n) = value.as_f64() {
            if let Some(min) = self.minimum
                && n < min
            {
                return Err(ToolError::InvalidInput(format!("'{}' must be >= {}, got {}", name, min, n)));
            }
            if let Some(max) = self.maximum
                && n > max
            {
                return Err(ToolError::InvalidInput(format!("'{}' must be <= {}, got {}", name, max, n)));
            }
        }
        Ok(())
    }
}

/// A tool as advertised to the reasoning service
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    params: Vec<(String, ParamSpec)>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
        }
    }

    /// Add a parameter; declaration order is kept in the schema
    pub fn param(mut self, name: impl Into<String>, spec: ParamSpec) -> Self {
        self.params.push((name.into(), spec));
        self
    }

    pub fn params(&self) -> &[(String, ParamSpec)] {
        &self.params
    }

    /// JSON Schema for the tool's input object
    pub fn input_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|(name, spec)| (name.clone(), spec.schema()))
            .collect();
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|(_, spec)| spec.required)
            .map(|(name, _)| name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Convert to Anthropic API tool format
    pub fn to_anthropic_schema(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "input_schema": self.input_schema(),
        })
    }

    /// Check `input` against the declared parameters
    ///
    /// Extra keys are ignored; `null` counts as absent.
    pub fn validate(&self, input: &Value) -> Result<(), ToolError> {
        let Some(args) = input.as_object() else {
            return Err(ToolError::InvalidInput(format!(
                "{} expects an object of arguments, got {}",
                self.name,
                json_kind(input)
            )));
        };

        for (name, spec) in &self.params {
            match args.get(name) {
                None | Some(Value::Null) if spec.required => {
                    return Err(ToolError::InvalidInput(format!("'{}' is required", name)));
                }
                None | Some(Value::Null) => {}
                Some(value) => spec.check(name, value)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forecast_spec() -> ToolSpec {
        ToolSpec::new("fetch_forecast", "Fetch forecasts")
            .param("latitude", ParamSpec::new(ParamType::Number, "Latitude").required())
            .param("longitude", ParamSpec::new(ParamType::Number, "Longitude").required())
            .param(
                "days",
                ParamSpec::new(ParamType::Integer, "Days").range(1.0, 16.0).with_default(json!(7)),
            )
            .param(
                "models",
                ParamSpec::new(ParamType::Array, "Models")
                    .items(ParamType::String)
                    .allowed(["gfs", "ecmwf", "gem", "icon"]),
            )
            .param("hourly", ParamSpec::new(ParamType::Boolean, "Hourly"))
    }

    #[test]
    fn test_param_type_from_str() {
        assert_eq!("integer".parse::<ParamType>().unwrap(), ParamType::Integer);
        assert_eq!("object".parse::<ParamType>().unwrap(), ParamType::Object);
        assert!(matches!("float".parse::<ParamType>(), Err(ToolError::InvalidInput(_))));
    }

    #[test]
    fn test_integer_accepts_whole_floats() {
        assert!(ParamType::Integer.matches(&json!(3)));
        assert!(ParamType::Integer.matches(&json!(3.0)));
        assert!(!ParamType::Integer.matches(&json!(3.5)));
        assert!(!ParamType::Integer.matches(&json!("3")));
    }

    #[test]
    fn test_input_schema() {
        let schema = forecast_spec().input_schema();

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["latitude", "longitude"]));
        assert_eq!(schema["properties"]["days"]["type"], "integer");
        assert_eq!(schema["properties"]["days"]["minimum"], 1.0);
        assert_eq!(schema["properties"]["days"]["default"], 7);
        assert_eq!(schema["properties"]["models"]["items"]["enum"][3], "icon");
    }

    #[test]
    fn test_to_anthropic_schema() {
        let schema = forecast_spec().to_anthropic_schema();
        assert_eq!(schema["name"], "fetch_forecast");
        assert_eq!(schema["description"], "Fetch forecasts");
        assert!(schema["input_schema"]["properties"]["hourly"].is_object());
    }

    #[test]
    fn test_validate_ok() {
        let spec = forecast_spec();
        assert!(spec.validate(&json!({"latitude": 39.7, "longitude": -104.9})).is_ok());
        assert!(
            spec.validate(&json!({"latitude": 39.7, "longitude": -104.9, "days": 16, "models": ["gfs", "icon"], "hourly": true, "extra": 1}))
                .is_ok()
        );
        assert!(spec.validate(&json!({"latitude": 1, "longitude": 2, "days": null})).is_ok());
    }

    #[test]
    fn test_validate_missing_required() {
        let err = forecast_spec().validate(&json!({"latitude": 39.7})).unwrap_err();
        assert_eq!(err, ToolError::InvalidInput("'longitude' is required".to_string()));
    }

    #[test]
    fn test_validate_wrong_type() {
        let err = forecast_spec()
            .validate(&json!({"latitude": "north", "longitude": 1}))
            .unwrap_err();
        assert!(err.to_string().contains("'latitude' must be number, got string"));
    }

    #[test]
    fn test_validate_range() {
        let spec = forecast_spec();
        assert!(spec.validate(&json!({"latitude": 1, "longitude": 1, "days": 0})).is_err());
        assert!(spec.validate(&json!({"latitude": 1, "longitude": 1, "days": 17})).is_err());
        assert!(spec.validate(&json!({"latitude": 1, "longitude": 1, "days": 1})).is_ok());
    }

    #[test]
    fn test_validate_allowed_items() {
        let err = forecast_spec()
            .validate(&json!({"latitude": 1, "longitude": 1, "models": ["gfs", "ukmo"]}))
            .unwrap_err();
        assert!(err.to_string().contains("ukmo"));

        let err = forecast_spec()
            .validate(&json!({"latitude": 1, "longitude": 1, "models": [1]}))
            .unwrap_err();
        assert!(err.to_string().contains("items must be string"));
    }

    #[test]
    fn test_validate_non_object() {
        let err = forecast_spec().validate(&json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("expects an object"));
    }
}
