//! # Schema Registry
//!
//! Loads one schema definition per recognized event type at startup and
//! compiles it into a validator.
//!
//! ## Definition Files
//!
//! One JSON document per event type, filename `<event_type>.json`:
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "description": "Account creation on any platform brand",
//!   "required": ["id", "email"],
//!   "properties": {
//!     "id": { "type": "string" },
//!     "email": { "type": "string" }
//!   }
//! }
//! ```
//!
//! ## Pass-Through Policy
//!
//! Unknown `(type, version)` pairs always validate. Producers are never
//! blocked by an unregistered type; the cost is that undocumented payloads
//! are accepted as-is.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};

use pulse_types::{SchemaError, DEFAULT_EVENT_VERSION};

/// Primitive type constraint for one payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl FieldType {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            _ => None,
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

/// A schema definition compiled into its checks.
#[derive(Debug, Clone, Default)]
pub struct CompiledSchema {
    /// Fields that must be present in the payload.
    required: Vec<String>,
    /// Type constraints applied when the field is present.
    fields: Vec<(String, FieldType)>,
}

impl CompiledSchema {
    /// Compile a definition document. Returns the failure reason on a
    /// malformed definition.
    pub fn compile(definition: &Value) -> Result<Self, String> {
        let mut required = Vec::new();
        if let Some(names) = definition.get("required") {
            let names = names
                .as_array()
                .ok_or_else(|| "`required` must be an array of field names".to_string())?;
            for name in names {
                let name = name
                    .as_str()
                    .ok_or_else(|| "`required` entries must be strings".to_string())?;
                required.push(name.to_string());
            }
        }

        let mut fields = Vec::new();
        if let Some(properties) = definition.get("properties") {
            let properties = properties
                .as_object()
                .ok_or_else(|| "`properties` must be an object".to_string())?;
            for (name, spec) in properties {
                let Some(type_name) = spec.get("type").and_then(Value::as_str) else {
                    continue;
                };
                let field_type = FieldType::parse(type_name)
                    .ok_or_else(|| format!("unknown field type `{type_name}` for `{name}`"))?;
                fields.push((name.clone(), field_type));
            }
        }

        Ok(Self { required, fields })
    }

    /// Check a payload, collecting every violation.
    fn check(&self, data: &Value) -> Vec<String> {
        let Some(object) = data.as_object() else {
            if self.required.is_empty() && self.fields.is_empty() {
                return Vec::new();
            }
            return vec!["payload must be a JSON object".to_string()];
        };

        let mut errors = Vec::new();
        for name in &self.required {
            if !object.contains_key(name) {
                errors.push(format!("missing required field `{name}`"));
            }
        }
        for (name, field_type) in &self.fields {
            if let Some(value) = object.get(name) {
                if !field_type.matches(value) {
                    errors.push(format!("field `{name}` must be a {}", field_type.name()));
                }
            }
        }
        errors
    }
}

/// Per-event-type validator registry, owned by one bus instance.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    /// `event_type -> version -> compiled validator`.
    schemas: HashMap<String, HashMap<String, CompiledSchema>>,
}

impl SchemaRegistry {
    /// Registry with no schemas; every event passes through.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load every `*.json` definition in a directory.
    ///
    /// The file stem is the event type; the `version` field inside the
    /// document defaults to `"1.0"`. Any malformed definition is fatal.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let dir = dir.as_ref();
        let mut registry = Self::empty();

        let entries = fs::read_dir(dir).map_err(|e| SchemaError::Io {
            path: dir.display().to_string(),
            cause: e.to_string(),
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| SchemaError::Io {
                path: dir.display().to_string(),
                cause: e.to_string(),
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(event_type) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let raw = fs::read_to_string(&path).map_err(|e| SchemaError::Io {
                path: path.display().to_string(),
                cause: e.to_string(),
            })?;
            let definition: Value = serde_json::from_str(&raw).map_err(|e| SchemaError::Parse {
                path: path.display().to_string(),
                cause: e.to_string(),
            })?;

            let version = definition
                .get("version")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_EVENT_VERSION)
                .to_string();
            let compiled = CompiledSchema::compile(&definition).map_err(|reason| {
                SchemaError::InvalidDefinition {
                    path: path.display().to_string(),
                    reason,
                }
            })?;

            debug!(event_type, %version, "Schema loaded");
            registry.insert(event_type, &version, compiled);
        }

        info!(
            dir = %dir.display(),
            schemas = registry.len(),
            "Schema registry loaded"
        );
        Ok(registry)
    }

    /// Register a compiled schema for `(event_type, version)`.
    pub fn insert(&mut self, event_type: &str, version: &str, schema: CompiledSchema) {
        self.schemas
            .entry(event_type.to_string())
            .or_default()
            .insert(version.to_string(), schema);
    }

    /// Validate a payload against the registered schema.
    ///
    /// Unknown `(type, version)` pairs pass. A failure collects every
    /// violation rather than stopping at the first.
    pub fn validate(
        &self,
        event_type: &str,
        version: &str,
        data: &Value,
    ) -> Result<(), Vec<String>> {
        let Some(schema) = self
            .schemas
            .get(event_type)
            .and_then(|versions| versions.get(version))
        else {
            return Ok(());
        };

        let errors = schema.check(data);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Number of registered schemas across all versions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.values().map(HashMap::len).sum()
    }

    /// Whether any schema is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
