//! Manifest documents.
//!
//! A manifest is an immutable, case-insensitive mapping from header name
//! to an arbitrary-but-closed value. CppMicroServices represents manifest
//! values with a dynamically-typed `Any`; Rust prefers a closed sum type
//! at a parsed-data boundary like this one, so [`HeaderValue`] is a small
//! enum instead (see DESIGN.md).

use std::collections::HashMap;

use crate::error::{Error, Result};

/// A manifest header value.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    String(String),
    Integer(i64),
    Bool(bool),
    List(Vec<HeaderValue>),
    Map(Manifest),
}

impl HeaderValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HeaderValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            HeaderValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[HeaderValue]> {
        match self {
            HeaderValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Manifest> {
        match self {
            HeaderValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Converts a parsed JSON value into a [`HeaderValue`].
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => HeaderValue::String(s.clone()),
            serde_json::Value::Bool(b) => HeaderValue::Bool(*b),
            serde_json::Value::Number(n) => HeaderValue::Integer(n.as_i64().unwrap_or_default()),
            serde_json::Value::Array(a) => {
                HeaderValue::List(a.iter().map(HeaderValue::from_json).collect())
            }
            serde_json::Value::Object(o) => {
                let mut manifest = Manifest::new();
                for (k, v) in o {
                    manifest.insert(k, HeaderValue::from_json(v));
                }
                HeaderValue::Map(manifest)
            }
            serde_json::Value::Null => HeaderValue::List(Vec::new()),
        }
    }
}

/// An immutable, case-insensitive header mapping.
///
/// Keys are normalized to lowercase on insert and lookup; string *values*
/// remain case-sensitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    headers: HashMap<String, HeaderValue>,
}

impl Manifest {
    pub fn new() -> Self {
        Self {
            headers: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: &str, value: HeaderValue) {
        self.headers.insert(key.to_ascii_lowercase(), value);
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.headers.get(&key.to_ascii_lowercase())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.headers.contains_key(&key.to_ascii_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn require_str(&self, key: &'static str) -> Result<&str> {
        self.get(key)
            .and_then(HeaderValue::as_str)
            .ok_or(Error::ManifestParse(key))
    }

    /// Parses a JSON document into a [`Manifest`] and validates the
    /// mandatory headers (`bundle.symbolic_name`, `bundle.version`,
    /// `bundle.activator`).
    pub fn parse(document: &serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(_) = document else {
            return Err(Error::ManifestParse("<root>"));
        };
        let HeaderValue::Map(manifest) = HeaderValue::from_json(document) else {
            unreachable!("object always maps to HeaderValue::Map")
        };

        manifest.require_str("bundle.symbolic_name")?;
        manifest
            .get("bundle.version")
            .and_then(HeaderValue::as_str)
            .ok_or(Error::ManifestParse("bundle.version"))?;
        manifest
            .get("bundle.activator")
            .and_then(HeaderValue::as_bool)
            .ok_or(Error::ManifestParse("bundle.activator"))?;

        Ok(manifest)
    }

    pub fn symbolic_name(&self) -> &str {
        self.require_str("bundle.symbolic_name")
            .expect("validated by Manifest::parse")
    }

    pub fn version(&self) -> &str {
        self.require_str("bundle.version")
            .expect("validated by Manifest::parse")
    }

    pub fn has_activator(&self) -> bool {
        self.get("bundle.activator")
            .and_then(HeaderValue::as_bool)
            .unwrap_or(false)
    }

    /// Parses the `scr` key into
    /// a list of component descriptions. Returns an empty list if the
    /// manifest has no `scr` section — not every bundle hosts components.
    pub fn component_descriptions(&self) -> Result<Vec<ComponentDescription>> {
        let Some(scr) = self.get("scr") else {
            return Ok(Vec::new());
        };
        let components = scr.as_list().ok_or(Error::ManifestParse("scr"))?;
        components
            .iter()
            .map(ComponentDescription::parse)
            .collect()
    }
}

/// How many candidates a component reference requires/allows
///.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    ZeroToOne,
    OneToOne,
    ZeroToMany,
    OneToMany,
}

impl Cardinality {
    pub fn is_mandatory(self) -> bool {
        matches!(self, Cardinality::OneToOne | Cardinality::OneToMany)
    }

    pub fn is_multiple(self) -> bool {
        matches!(self, Cardinality::ZeroToMany | Cardinality::OneToMany)
    }

    fn parse(s: &str) -> Result<Self> {
        match s {
            "0..1" => Ok(Cardinality::ZeroToOne),
            "1..1" => Ok(Cardinality::OneToOne),
            "0..n" => Ok(Cardinality::ZeroToMany),
            "1..n" => Ok(Cardinality::OneToMany),
            _ => Err(Error::ManifestParse("reference.cardinality")),
        }
    }
}

/// Whether a component restarts on binding change (`Static`) or is
/// notified live (`Dynamic`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingPolicy {
    Static,
    Dynamic,
}

/// Whether rebinding is eager (`Greedy`) or inert once bound
/// (`Reluctant`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyOption {
    Reluctant,
    Greedy,
}

/// Whether a component requires a configuration push before activating
///.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurationPolicy {
    Ignore,
    Optional,
    Require,
}

/// A single declared dependency of a component.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceDescription {
    pub name: String,
    pub interface: String,
    pub cardinality: Cardinality,
    pub policy: BindingPolicy,
    pub policy_option: PolicyOption,
    pub target: Option<String>,
}

impl ReferenceDescription {
    fn parse(value: &HeaderValue) -> Result<Self> {
        let map = value.as_map().ok_or(Error::ManifestParse("reference"))?;
        let name = map
            .require_str("name")
            .map_err(|_| Error::ManifestParse("reference.name"))?
            .to_owned();
        let interface = map
            .require_str("interface")
            .map_err(|_| Error::ManifestParse("reference.interface"))?
            .to_owned();
        let cardinality = map
            .get("cardinality")
            .and_then(HeaderValue::as_str)
            .map(Cardinality::parse)
            .transpose()?
            .unwrap_or(Cardinality::OneToOne);
        let policy = match map.get("policy").and_then(HeaderValue::as_str) {
            Some("dynamic") => BindingPolicy::Dynamic,
            Some("static") | None => BindingPolicy::Static,
            Some(_) => return Err(Error::ManifestParse("reference.policy")),
        };
        let policy_option = match map.get("policy-option").and_then(HeaderValue::as_str) {
            Some("greedy") => PolicyOption::Greedy,
            Some("reluctant") | None => PolicyOption::Reluctant,
            Some(_) => return Err(Error::ManifestParse("reference.policy-option")),
        };
        let target = map
            .get("target")
            .and_then(HeaderValue::as_str)
            .map(str::to_owned);

        Ok(Self {
            name,
            interface,
            cardinality,
            policy,
            policy_option,
            target,
        })
    }
}

/// A declared component.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDescription {
    pub name: String,
    pub implementation: String,
    pub interfaces: Vec<String>,
    pub enabled: bool,
    pub immediate: bool,
    pub configuration_policy: ConfigurationPolicy,
    pub references: Vec<ReferenceDescription>,
}

impl ComponentDescription {
    fn parse(value: &HeaderValue) -> Result<Self> {
        let map = value.as_map().ok_or(Error::ManifestParse("component"))?;
        let name = map
            .require_str("name")
            .map_err(|_| Error::ManifestParse("component.name"))?
            .to_owned();
        let implementation = map
            .require_str("implementation")
            .map_err(|_| Error::ManifestParse("component.implementation"))?
            .to_owned();
        let interfaces = map
            .get("interfaces")
            .and_then(HeaderValue::as_list)
            .map(|list| {
                list.iter()
                    .filter_map(HeaderValue::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        let enabled = map
            .get("enabled")
            .and_then(HeaderValue::as_bool)
            .unwrap_or(true);
        let immediate = map
            .get("immediate")
            .and_then(HeaderValue::as_bool)
            .unwrap_or(false);
        let configuration_policy = match map
            .get("configuration-policy")
            .and_then(HeaderValue::as_str)
        {
            Some("optional") => ConfigurationPolicy::Optional,
            Some("require") => ConfigurationPolicy::Require,
            Some("ignore") | None => ConfigurationPolicy::Ignore,
            Some(_) => return Err(Error::ManifestParse("component.configuration-policy")),
        };
        let references = map
            .get("references")
            .and_then(HeaderValue::as_list)
            .map(|list| {
                list.iter()
                    .map(ReferenceDescription::parse)
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            name,
            implementation,
            interfaces,
            enabled,
            immediate,
            configuration_policy,
            references,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_minimal_manifest() {
        let doc = json!({
            "bundle.symbolic_name": "com.example.hello",
            "bundle.version": "1.0.0",
            "bundle.activator": true,
        });
        let manifest = Manifest::parse(&doc).unwrap();
        assert_eq!(manifest.symbolic_name(), "com.example.hello");
        assert_eq!(manifest.version(), "1.0.0");
        assert!(manifest.has_activator());
        assert!(manifest.component_descriptions().unwrap().is_empty());
    }

    #[test]
    fn rejects_missing_required_header() {
        let doc = json!({ "bundle.version": "1.0.0", "bundle.activator": true });
        assert!(Manifest::parse(&doc).is_err());
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let doc = json!({
            "Bundle.Symbolic_Name": "com.example.hello",
            "bundle.version": "1.0.0",
            "bundle.activator": false,
        });
        let manifest = Manifest::parse(&doc).unwrap();
        assert_eq!(manifest.symbolic_name(), "com.example.hello");
    }

    #[test]
    fn parses_component_descriptions() {
        let doc = json!({
            "bundle.symbolic_name": "com.example.producer",
            "bundle.version": "1.0.0",
            "bundle.activator": true,
            "scr": [
                {
                    "name": "Producer",
                    "implementation": "ProducerImpl",
                    "interfaces": ["com.example.IProducer"],
                    "immediate": true,
                },
                {
                    "name": "Consumer",
                    "implementation": "ConsumerImpl",
                    "configuration-policy": "require",
                    "references": [
                        {
                            "name": "producer",
                            "interface": "com.example.IProducer",
                            "cardinality": "1..1",
                            "policy": "dynamic",
                            "policy-option": "greedy",
                        }
                    ],
                }
            ]
        });
        let manifest = Manifest::parse(&doc).unwrap();
        let components = manifest.component_descriptions().unwrap();
        assert_eq!(components.len(), 2);
        assert_eq!(components[0].name, "Producer");
        assert!(components[0].immediate);
        assert_eq!(components[1].configuration_policy, ConfigurationPolicy::Require);
        let reference = &components[1].references[0];
        assert_eq!(reference.policy, BindingPolicy::Dynamic);
        assert_eq!(reference.policy_option, PolicyOption::Greedy);
        assert_eq!(reference.cardinality, Cardinality::OneToOne);
    }
}
