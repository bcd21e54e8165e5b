//! Mapping documents and their resolution into a validated [`MappingSpec`].
//!
//! A mapping document is YAML:
//!
//! ```yaml
//! file: customers           # attachment name (required)
//! format: csv               # optional, inferred from the attachment extension
//! encoding: windows-1252    # optional, delimited text only
//! table: customers          # target table (required)
//! pk: id                    # optional primary key, must be a target column
//! mappings:
//!   id: customer_id                         # shorthand: target: source
//!   name: { column: full_name, transform: [strip, titlecase] }
//!   joined: { column: signup, transform: iso_date }
//! ```
//!
//! Resolution is pure: it reads nothing but the document and turns every
//! transform name into a [`Transform`] handle up front, so an unknown name is
//! reported here instead of being silently skipped at import time.

use std::{collections::HashSet, fs, path::Path};

use encoding_rs::Encoding;
use serde::Deserialize;
use serde_yaml::Value as YamlValue;

use crate::{
    error::ValidationError,
    source::SourceFormat,
    transform::{Transform, TransformRegistry},
};

/// The mapping document as written, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MappingDocument {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub pk: Option<String>,
    #[serde(default)]
    pub mappings: serde_yaml::Mapping,
}

impl MappingDocument {
    pub fn from_yaml_str(input: &str) -> Result<Self, ValidationError> {
        serde_yaml::from_str(input).map_err(|err| ValidationError::Malformed(err.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, ValidationError> {
        let raw = fs::read_to_string(path).map_err(|err| ValidationError::Unreadable {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        Self::from_yaml_str(&raw)
    }
}

#[derive(Debug, Deserialize)]
struct ExtendedColumn {
    #[serde(default)]
    column: Option<YamlValue>,
    #[serde(default)]
    transform: Option<TransformNames>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TransformNames {
    One(String),
    Many(Vec<String>),
}

impl TransformNames {
    fn into_vec(self) -> Vec<String> {
        match self {
            TransformNames::One(name) => vec![name],
            TransformNames::Many(names) => names,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMapping {
    pub target_column: String,
    pub source_column: String,
    pub transforms: Vec<Transform>,
}

impl ColumnMapping {
    pub fn transform_names(&self) -> Vec<&str> {
        self.transforms.iter().map(Transform::name).collect()
    }
}

/// A validated mapping. Column order is document order.
#[derive(Debug, Clone)]
pub struct MappingSpec {
    pub source_file_key: String,
    pub format: Option<SourceFormat>,
    pub encoding: Option<&'static Encoding>,
    pub target_table: String,
    pub primary_key: Option<String>,
    pub column_mappings: Vec<ColumnMapping>,
}

impl MappingSpec {
    pub fn load(path: &Path, registry: &TransformRegistry) -> Result<Self, ValidationError> {
        let document = MappingDocument::load(path)?;
        resolve(&document, registry)
    }

    pub fn from_yaml_str(input: &str, registry: &TransformRegistry) -> Result<Self, ValidationError> {
        let document = MappingDocument::from_yaml_str(input)?;
        resolve(&document, registry)
    }

    pub fn target_columns(&self) -> Vec<String> {
        self.column_mappings
            .iter()
            .map(|mapping| mapping.target_column.clone())
            .collect()
    }

    pub fn primary_key_index(&self) -> Option<usize> {
        let key = self.primary_key.as_deref()?;
        self.column_mappings
            .iter()
            .position(|mapping| mapping.target_column == key)
    }
}

/// Validates `document` and resolves its transform names against `registry`.
pub fn resolve(
    document: &MappingDocument,
    registry: &TransformRegistry,
) -> Result<MappingSpec, ValidationError> {
    let source_file_key = non_blank(document.file.as_deref())
        .ok_or(ValidationError::MissingField("file"))?
        .to_string();
    let target_table = document
        .table
        .as_deref()
        .ok_or(ValidationError::MissingField("table"))?
        .trim()
        .to_string();
    if target_table.is_empty() {
        return Err(ValidationError::EmptyTable);
    }
    if document.mappings.is_empty() {
        return Err(ValidationError::NoMappings);
    }

    let mut seen = HashSet::new();
    let mut column_mappings = Vec::with_capacity(document.mappings.len());
    for (key, spec) in &document.mappings {
        let target_column = scalar_to_string(key)
            .ok_or_else(|| ValidationError::Malformed(format!("invalid target column {key:?}")))?;
        if !seen.insert(target_column.clone()) {
            return Err(ValidationError::DuplicateTarget(target_column));
        }
        column_mappings.push(resolve_column(target_column, spec, registry)?);
    }

    let primary_key = match document.pk.as_deref() {
        Some(pk) if seen.contains(pk) => Some(pk.to_string()),
        Some(pk) => return Err(ValidationError::PrimaryKeyNotMapped(pk.to_string())),
        None => None,
    };

    let format = match non_blank(document.format.as_deref()) {
        Some(token) => Some(
            SourceFormat::from_token(token)
                .ok_or_else(|| ValidationError::UnknownFormat(token.to_string()))?,
        ),
        None => None,
    };

    let encoding = match non_blank(document.encoding.as_deref()) {
        Some(label) => Some(
            Encoding::for_label(label.as_bytes())
                .ok_or_else(|| ValidationError::UnknownEncoding(label.to_string()))?,
        ),
        None => None,
    };

    Ok(MappingSpec {
        source_file_key,
        format,
        encoding,
        target_table,
        primary_key,
        column_mappings,
    })
}

fn resolve_column(
    target_column: String,
    spec: &YamlValue,
    registry: &TransformRegistry,
) -> Result<ColumnMapping, ValidationError> {
    let (source, names) = match spec {
        YamlValue::Mapping(_) => {
            let extended: ExtendedColumn = serde_yaml::from_value(spec.clone()).map_err(|err| {
                ValidationError::Malformed(format!("column '{target_column}': {err}"))
            })?;
            let names = extended
                .transform
                .map(TransformNames::into_vec)
                .unwrap_or_default();
            (extended.column.as_ref().and_then(scalar_to_string), names)
        }
        other => (scalar_to_string(other), Vec::new()),
    };
    let source_column = source.ok_or_else(|| ValidationError::MissingSourceColumn {
        target: target_column.clone(),
    })?;

    let transforms = names
        .iter()
        .map(|name| {
            registry
                .resolve(name.trim())
                .ok_or_else(|| ValidationError::UnknownTransform {
                    target: target_column.clone(),
                    name: name.clone(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ColumnMapping {
        target_column,
        source_column,
        transforms,
    })
}

fn scalar_to_string(value: &YamlValue) -> Option<String> {
    match value {
        YamlValue::String(s) => Some(s.clone()),
        YamlValue::Number(n) => Some(n.to_string()),
        YamlValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::BuiltinTransform;

    fn resolve_str(input: &str) -> Result<MappingSpec, ValidationError> {
        MappingSpec::from_yaml_str(input, &TransformRegistry::standard())
    }

    #[test]
    fn resolves_shorthand_and_extended_forms_in_order() {
        let spec = resolve_str(
            "file: people\ntable: people\npk: id\nmappings:\n  id: person_id\n  name: { column: full_name, transform: [strip, titlecase] }\n  born: { column: dob, transform: iso_date }\n",
        )
        .expect("valid mapping");
        assert_eq!(spec.source_file_key, "people");
        assert_eq!(spec.target_table, "people");
        assert_eq!(spec.primary_key.as_deref(), Some("id"));
        assert_eq!(spec.primary_key_index(), Some(0));
        assert_eq!(spec.target_columns(), vec!["id", "name", "born"]);
        assert_eq!(spec.column_mappings[1].source_column, "full_name");
        assert_eq!(
            spec.column_mappings[1].transforms,
            vec![
                Transform::Builtin(BuiltinTransform::Strip),
                Transform::Builtin(BuiltinTransform::Titlecase)
            ]
        );
        assert_eq!(spec.column_mappings[2].transform_names(), vec!["iso_date"]);
        assert!(spec.format.is_none());
    }

    #[test]
    fn unknown_transform_is_rejected() {
        let err = resolve_str(
            "file: f\ntable: t\nmappings:\n  a: { column: a, transform: [strip, shout] }\n",
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownTransform {
                target: "a".into(),
                name: "shout".into()
            }
        );
    }

    #[test]
    fn missing_required_fields_are_rejected() {
        assert_eq!(
            resolve_str("table: t\nmappings:\n  a: a\n").unwrap_err(),
            ValidationError::MissingField("file")
        );
        assert_eq!(
            resolve_str("file: f\nmappings:\n  a: a\n").unwrap_err(),
            ValidationError::MissingField("table")
        );
        assert_eq!(
            resolve_str("file: f\ntable: '  '\nmappings:\n  a: a\n").unwrap_err(),
            ValidationError::EmptyTable
        );
        assert_eq!(
            resolve_str("file: f\ntable: t\n").unwrap_err(),
            ValidationError::NoMappings
        );
    }

    #[test]
    fn primary_key_must_be_a_target_column() {
        let err = resolve_str("file: f\ntable: t\npk: source_id\nmappings:\n  id: source_id\n")
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::PrimaryKeyNotMapped("source_id".into())
        );
    }

    #[test]
    fn extended_form_requires_a_source_column() {
        let err = resolve_str("file: f\ntable: t\nmappings:\n  a: { transform: strip }\n")
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingSourceColumn { target: "a".into() }
        );
    }

    #[test]
    fn declared_format_and_encoding_are_validated() {
        let spec = resolve_str(
            "file: f\nformat: NDJSON\nencoding: latin1\ntable: t\nmappings:\n  a: a\n",
        )
        .unwrap();
        assert_eq!(spec.format, Some(SourceFormat::Json));
        assert!(spec.encoding.is_some());

        assert_eq!(
            resolve_str("file: f\nformat: parquet\ntable: t\nmappings:\n  a: a\n").unwrap_err(),
            ValidationError::UnknownFormat("parquet".into())
        );
        assert_eq!(
            resolve_str("file: f\nencoding: klingon\ntable: t\nmappings:\n  a: a\n").unwrap_err(),
            ValidationError::UnknownEncoding("klingon".into())
        );
    }

    #[test]
    fn custom_transforms_resolve_through_the_registry() {
        let mut registry = TransformRegistry::builtin_only();
        registry
            .register("shout", |value| match value.as_str() {
                Some(s) => format!("{s}!").into(),
                None => value.clone(),
            })
            .unwrap();
        let spec = MappingSpec::from_yaml_str(
            "file: f\ntable: t\nmappings:\n  a: { column: a, transform: shout }\n",
            &registry,
        )
        .unwrap();
        assert_eq!(spec.column_mappings[0].transform_names(), vec!["shout"]);
    }

    #[test]
    fn malformed_yaml_is_a_validation_error() {
        assert!(matches!(
            resolve_str("file: [unterminated"),
            Err(ValidationError::Malformed(_))
        ));
    }
}
