use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchemaType {
    #[serde(rename = "OBJECT")]
    Object,
    #[serde(rename = "STRING")]
    String,
    #[serde(rename = "ARRAY")]
    Array,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub kind: SchemaType,
    pub description: Option<String>,
    pub properties: Vec<(String, Schema)>,
    pub items: Option<Box<Schema>>,
}

impl Schema {
    pub fn string(description: impl Into<String>) -> Self {
        Self {
            kind: SchemaType::String,
            description: Some(description.into()),
            properties: Vec::new(),
            items: None,
        }
    }

    pub fn object<K: Into<String>>(properties: impl IntoIterator<Item = (K, Schema)>) -> Self {
        Self {
            kind: SchemaType::Object,
            description: None,
            properties: properties
                .into_iter()
                .map(|(key, schema)| (key.into(), schema))
                .collect(),
            items: None,
        }
    }

    pub fn array(items: Schema) -> Self {
        Self {
            kind: SchemaType::Array,
            description: None,
            properties: Vec::new(),
            items: Some(Box::new(items)),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&Schema> {
        self.properties
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, schema)| schema)
    }

    pub fn required(&self) -> Vec<&str> {
        self.properties.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn required_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        self.collect_required_paths("", &mut paths);
        paths
    }

    fn collect_required_paths(&self, prefix: &str, out: &mut Vec<String>) {
        for (name, child) in &self.properties {
            let path = join_path(prefix, name);
            out.push(path.clone());
            if child.kind == SchemaType::Object {
                child.collect_required_paths(&path, out);
            }
        }
    }

    /// Paths present in the contract but absent, null or of the wrong shape in
    /// `value`. Empty when `value` satisfies the contract.
    pub fn missing_paths(&self, value: &Value) -> Vec<String> {
        let mut missing = Vec::new();
        self.check(value, "", &mut missing);
        missing
    }

    fn check(&self, value: &Value, path: &str, missing: &mut Vec<String>) {
        match self.kind {
            SchemaType::String => {
                if !value.is_string() {
                    missing.push(display_path(path));
                }
            }
            SchemaType::Array => {
                let Some(elements) = value.as_array() else {
                    missing.push(display_path(path));
                    return;
                };
                if let Some(items) = &self.items {
                    for (index, element) in elements.iter().enumerate() {
                        items.check(element, &format!("{path}[{index}]"), missing);
                    }
                }
            }
            SchemaType::Object => {
                let Some(object) = value.as_object() else {
                    missing.push(display_path(path));
                    return;
                };
                for (name, child) in &self.properties {
                    let child_path = join_path(path, name);
                    match object.get(name) {
                        None | Some(Value::Null) => missing.push(child_path),
                        Some(child_value) => child.check(child_value, &child_path, missing),
                    }
                }
            }
        }
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "$".to_string()
    } else {
        path.to_string()
    }
}

struct Properties<'a>(&'a [(String, Schema)]);

impl Serialize for Properties<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, schema) in self.0 {
            map.serialize_entry(name, schema)?;
        }
        map.end()
    }
}

impl Serialize for Schema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", &self.kind)?;
        if let Some(description) = &self.description {
            map.serialize_entry("description", description)?;
        }
        match self.kind {
            SchemaType::Object => {
                map.serialize_entry("properties", &Properties(&self.properties))?;
                map.serialize_entry("required", &self.required())?;
            }
            SchemaType::Array => {
                if let Some(items) = &self.items {
                    map.serialize_entry("items", items.as_ref())?;
                }
            }
            SchemaType::String => {}
        }
        map.end()
    }
}
