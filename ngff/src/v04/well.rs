//! Well metadata for high-content screening layouts. A well group collects
//! the fields of view acquired at one plate position, each stored as a
//! member group carrying multiscale metadata.

use crate::error::MetadataError;
use crate::node::{GroupSpec, Node};
use crate::v04::multiscale::MultiscaleGroup;
use crate::v04::VERSION;

use anyhow::{bail, ensure, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One field of view: the name of a member group, optionally tagged with
/// the acquisition that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawWellImage")]
pub struct WellImage {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acquisition: Option<i64>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawWellImage {
    path: String,
    acquisition: Option<i64>,
}

impl TryFrom<RawWellImage> for WellImage {
    type Error = MetadataError;

    fn try_from(raw: RawWellImage) -> Result<Self, Self::Error> {
        WellImage::new(raw.path, raw.acquisition)
    }
}

impl WellImage {
    pub fn new(path: impl Into<String>, acquisition: Option<i64>) -> Result<Self, MetadataError> {
        let image = WellImage {
            path: path.into(),
            acquisition,
        };
        if image.path.is_empty() {
            return Err(MetadataError::FieldShape(
                "Image paths must be non-empty strings".to_string(),
            ));
        }
        Ok(image)
    }
}

/// The `well` attribute document: the images present at one plate position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawWellMetadata")]
pub struct WellMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub images: Vec<WellImage>,
}

fn default_version() -> Option<String> {
    Some(VERSION.to_string())
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawWellMetadata {
    #[serde(default = "default_version")]
    version: Option<String>,
    images: Vec<WellImage>,
}

impl TryFrom<RawWellMetadata> for WellMetadata {
    type Error = MetadataError;

    fn try_from(raw: RawWellMetadata) -> Result<Self, Self::Error> {
        let meta = WellMetadata {
            version: raw.version,
            images: raw.images,
        };
        meta.validate()?;
        Ok(meta)
    }
}

impl WellMetadata {
    pub fn new(images: Vec<WellImage>) -> Result<Self, MetadataError> {
        let meta = WellMetadata {
            version: default_version(),
            images,
        };
        meta.validate()?;
        Ok(meta)
    }

    pub(crate) fn validate(&self) -> Result<(), MetadataError> {
        if self.images.is_empty() {
            return Err(MetadataError::FieldShape(
                "Well metadata must contain at least one image".to_string(),
            ));
        }
        for image in &self.images {
            if image.path.is_empty() {
                return Err(MetadataError::FieldShape(
                    "Image paths must be non-empty strings".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// The attribute document of a well group. Keys other than `well` are
/// preserved untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellAttrs {
    pub well: WellMetadata,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WellAttrs {
    pub fn new(well: WellMetadata) -> Self {
        WellAttrs {
            well,
            extra: Map::new(),
        }
    }
}

/// A group whose `well` metadata has been validated against its members:
/// every image path resolves to a member group carrying valid multiscale
/// metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct WellGroup {
    attrs: WellAttrs,
    members: IndexMap<String, Node>,
}

impl WellGroup {
    pub fn new(attrs: WellAttrs, members: IndexMap<String, Node>) -> Result<Self> {
        attrs.well.validate()?;
        for image in &attrs.well.images {
            let member = members.get(&image.path).with_context(|| {
                format!(
                    "Image '{}' was specified in well metadata, but no member with that \
                     name was found in the group",
                    image.path
                )
            })?;
            let spec = member.as_group().with_context(|| {
                format!(
                    "The node at '{}' referenced by well metadata must be a group",
                    image.path
                )
            })?;
            MultiscaleGroup::from_spec(spec.clone()).with_context(|| {
                format!(
                    "The group at '{}' referenced by well metadata does not carry valid \
                     multiscale metadata",
                    image.path
                )
            })?;
        }
        Ok(WellGroup { attrs, members })
    }

    pub fn attrs(&self) -> &WellAttrs {
        &self.attrs
    }

    pub fn members(&self) -> &IndexMap<String, Node> {
        &self.members
    }

    /// Validate a declaration tree as a well group.
    pub fn from_spec(spec: GroupSpec) -> Result<Self> {
        ensure!(
            spec.attributes.contains_key("well"),
            "Failed to find mandatory 'well' key in the attributes of the group"
        );
        let attrs: WellAttrs = serde_json::from_value(Value::Object(spec.attributes))?;
        WellGroup::new(attrs, spec.members)
    }

    /// The declaration tree this group persists as.
    pub fn to_spec(&self) -> Result<GroupSpec> {
        let attrs = match serde_json::to_value(&self.attrs)? {
            Value::Object(map) => map,
            _ => bail!("Well attributes did not serialize to a JSON object"),
        };
        Ok(GroupSpec::new(attrs, self.members.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_shape() {
        let meta = WellMetadata::new(vec![
            WellImage::new("0", Some(1)).unwrap(),
            WellImage::new("1", None).unwrap(),
        ])
        .unwrap();
        assert_eq!(
            serde_json::to_value(&meta).unwrap(),
            json!({
                "version": "0.4",
                "images": [
                    {"path": "0", "acquisition": 1},
                    {"path": "1"},
                ],
            })
        );
    }

    #[test]
    fn version_defaults_when_absent() {
        let meta: WellMetadata =
            serde_json::from_value(json!({"images": [{"path": "0"}]})).unwrap();
        assert_eq!(meta.version.as_deref(), Some("0.4"));

        let meta: WellMetadata =
            serde_json::from_value(json!({"version": null, "images": [{"path": "0"}]}))
                .unwrap();
        assert!(meta.version.is_none());
    }

    #[test]
    fn requires_at_least_one_image() {
        let err = WellMetadata::new(Vec::new()).unwrap_err();
        assert!(err.to_string().contains("at least one image"));
    }

    #[test]
    fn rejects_empty_image_paths() {
        assert!(WellImage::new("", None).is_err());
    }
}
