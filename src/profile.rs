use serde_derive::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The authenticated user, as returned by the profile endpoint.
///
/// This is whatever JSON object the server sent, kept as-is. The accessors
/// only *look* at the well-known fields and never reject a profile because
/// one of them has an unexpected shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserProfile(Map<String, Value>);

impl UserProfile {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        UserProfile::default()
            .with("code", code.into())
            .with("name", name.into())
    }

    /// Set a field, replacing whatever was there.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// The raw value of a field.
    pub fn get(&self, key: &str) -> Option<&Value> { self.0.get(key) }

    pub fn fields(&self) -> &Map<String, Value> { &self.0 }

    pub fn code(&self) -> Option<&str> { self.text("code") }

    pub fn name(&self) -> Option<&str> { self.text("name") }

    pub fn email(&self) -> Option<&str> { self.text("email") }

    pub fn phone(&self) -> Option<&str> { self.text("phone") }

    pub fn address(&self) -> Option<&str> { self.text("address") }

    /// The role, when the server sends it as a plain string.
    pub fn role(&self) -> Option<&str> { self.text("role") }

    /// Something printable to identify the user in logs and the CLI.
    pub fn display_name(&self) -> String {
        ["name", "phone", "code"]
            .iter()
            .filter_map(|key| self.get(key))
            .find_map(|value| match value {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .unwrap_or_else(|| String::from("<unknown>"))
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }
}
