//! Validated service configuration for `add_service`.

use super::RegistryDomainError;
use super::fields::{Object, text};
use super::transport::ServiceTransport;
use serde::Serialize;
use serde_json::Value;

const SERVERS_FIELD: &str = "mcpServers";
const REMOVED_FIELDS: &[&str] = &["source"];

/// A service configuration accepted for submission.
///
/// Accepted shapes are a single service object (which needs a `name`), an
/// `mcpServers` mapping of names to service objects, a bare mapping of names
/// to service objects, or a list of already-configured service names. Every
/// service object must declare exactly one of `command` and `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ServiceConfig(Value);

impl ServiceConfig {
    /// Validates `value` without contacting the registry.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryDomainError`] describing the first violation found.
    pub fn new(value: Value) -> Result<Self, RegistryDomainError> {
        match &value {
            Value::Array(names) => validate_name_list(names)?,
            Value::Object(object) => validate_object(object)?,
            _ => return Err(RegistryDomainError::NotAnObject),
        }
        Ok(Self(value))
    }

    /// Returns the configuration as submitted.
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }

    /// Returns a short label for notifications: the service name, the
    /// command, or the configured names joined with commas.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.0 {
            Value::Array(names) => join_names(names.iter().filter_map(Value::as_str)),
            Value::Object(object) => {
                if let Some(label) = text(object, "name").or_else(|| text(object, "command")) {
                    return label;
                }
                let servers = object
                    .get(SERVERS_FIELD)
                    .and_then(Value::as_object)
                    .unwrap_or(object);
                join_names(servers.keys().map(String::as_str))
            }
            _ => String::new(),
        }
    }
}

fn join_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}

fn validate_name_list(names: &[Value]) -> Result<(), RegistryDomainError> {
    if names.is_empty() {
        return Err(RegistryDomainError::EmptyConfig);
    }
    if names
        .iter()
        .all(|name| name.as_str().is_some_and(|raw| !raw.trim().is_empty()))
    {
        Ok(())
    } else {
        Err(RegistryDomainError::MissingName)
    }
}

fn validate_object(object: &Object) -> Result<(), RegistryDomainError> {
    if object.is_empty() {
        return Err(RegistryDomainError::EmptyConfig);
    }
    if let Some(field) = REMOVED_FIELDS.iter().find(|field| object.contains_key(**field)) {
        return Err(RegistryDomainError::UnsupportedField((*field).to_owned()));
    }
    if let Some(servers) = object.get(SERVERS_FIELD) {
        let mapping = servers.as_object().ok_or(RegistryDomainError::NotAnObject)?;
        return validate_mapping(mapping);
    }
    if object.contains_key("command") || object.contains_key("url") {
        let name = text(object, "name").ok_or(RegistryDomainError::MissingName)?;
        return require_transport(&name, object);
    }
    validate_mapping(object)
}

fn validate_mapping(mapping: &Object) -> Result<(), RegistryDomainError> {
    if mapping.is_empty() {
        return Err(RegistryDomainError::EmptyConfig);
    }
    mapping.iter().try_for_each(|(name, entry)| {
        let service = entry.as_object().ok_or(RegistryDomainError::NotAnObject)?;
        require_transport(name, service)
    })
}

fn require_transport(name: &str, service: &Object) -> Result<(), RegistryDomainError> {
    match ServiceTransport::from_fields(name, service)? {
        Some(_) => Ok(()),
        None => Err(RegistryDomainError::MissingTransport(name.to_owned())),
    }
}
