//! Image-label metadata. A label image is a multiscale image of integer
//! values; the `image-label` attribute document describes what those values
//! mean and where the labelled image lives.

use crate::error::MetadataError;
use crate::node::{GroupSpec, Node};
use crate::util::duplicates;
use crate::v04::multiscale::{check_members, MultiscaleMetadata};
use crate::v04::VERSION;

use anyhow::{bail, ensure, Result};
use indexmap::IndexMap;
use itertools::Itertools;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// The display color assigned to one label value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabelColor {
    #[serde(rename = "label-value")]
    pub label_value: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rgba: Option<[u8; 4]>,
}

impl LabelColor {
    pub fn new(label_value: i64, rgba: Option<[u8; 4]>) -> Self {
        LabelColor { label_value, rgba }
    }
}

/// Where the labelled image lives, relative to the label group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabelSource {
    #[serde(default = "default_source_image", skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

fn default_source_image() -> Option<String> {
    Some("../../".to_string())
}

impl Default for LabelSource {
    fn default() -> Self {
        LabelSource {
            image: default_source_image(),
        }
    }
}

/// Arbitrary per-label metadata, keyed by label value. Keys other than
/// `label-value` are preserved untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelProperty {
    #[serde(rename = "label-value")]
    pub label_value: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LabelProperty {
    pub fn new(label_value: i64) -> Self {
        LabelProperty {
            label_value,
            extra: Map::new(),
        }
    }
}

/// The `image-label` attribute document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawImageLabel")]
pub struct ImageLabel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<LabelColor>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<LabelProperty>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<LabelSource>,
}

fn default_version() -> Option<String> {
    Some(VERSION.to_string())
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawImageLabel {
    #[serde(default = "default_version")]
    version: Option<String>,
    colors: Option<Vec<LabelColor>>,
    properties: Option<Vec<LabelProperty>>,
    source: Option<LabelSource>,
}

impl TryFrom<RawImageLabel> for ImageLabel {
    type Error = MetadataError;

    fn try_from(raw: RawImageLabel) -> Result<Self, Self::Error> {
        let label = ImageLabel {
            version: raw.version,
            colors: raw.colors,
            properties: raw.properties,
            source: raw.source,
        };
        label.validate()?;
        Ok(label)
    }
}

impl ImageLabel {
    pub fn new(
        colors: Option<Vec<LabelColor>>,
        properties: Option<Vec<LabelProperty>>,
        source: Option<LabelSource>,
    ) -> Result<Self, MetadataError> {
        let label = ImageLabel {
            version: default_version(),
            colors,
            properties,
            source,
        };
        label.validate()?;
        Ok(label)
    }

    pub(crate) fn validate(&self) -> Result<(), MetadataError> {
        if let Some(v) = &self.version {
            if v != VERSION {
                return Err(MetadataError::FieldShape(format!(
                    "Unknown 'image-label' version '{}'. Expected '{}'.",
                    v, VERSION
                )));
            }
        }
        match &self.colors {
            None => {
                warn!(
                    "The field 'colors' is unset. Version {} of the OME-NGFF spec states \
                     that 'colors' should be a list of label descriptors.",
                    VERSION
                );
            }
            Some(colors) => {
                let dupes = duplicates(colors.iter().map(|c| c.label_value));
                if !dupes.is_empty() {
                    return Err(MetadataError::FieldShape(format!(
                        "Duplicated label-value: [{}]. label-values must be unique across \
                         elements of 'colors'.",
                        dupes.iter().join(", ")
                    )));
                }
            }
        }
        if let (Some(colors), Some(properties)) = (&self.colors, &self.properties) {
            let color_values: BTreeSet<i64> = colors.iter().map(|c| c.label_value).collect();
            let property_values: BTreeSet<i64> =
                properties.iter().map(|p| p.label_value).collect();
            if color_values != property_values {
                return Err(MetadataError::FieldShape(format!(
                    "Inconsistent 'label_value' attributes in 'colors' and 'properties'. \
                     The 'properties' attributes have label_values [{}], but the 'colors' \
                     attributes have label_values [{}].",
                    properties.iter().map(|p| p.label_value).join(", "),
                    colors.iter().map(|c| c.label_value).join(", ")
                )));
            }
        }
        Ok(())
    }
}

/// The attribute document of a label group: multiscale metadata plus the
/// `image-label` document. Other keys are preserved untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLabelAttrs")]
pub struct LabelAttrs {
    pub multiscales: Vec<MultiscaleMetadata>,
    #[serde(rename = "image-label")]
    pub image_label: ImageLabel,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Deserialize)]
struct RawLabelAttrs {
    multiscales: Vec<MultiscaleMetadata>,
    #[serde(rename = "image-label")]
    image_label: ImageLabel,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl TryFrom<RawLabelAttrs> for LabelAttrs {
    type Error = MetadataError;

    fn try_from(raw: RawLabelAttrs) -> Result<Self, Self::Error> {
        LabelAttrs::new(raw.multiscales, raw.image_label).map(|attrs| LabelAttrs {
            extra: raw.extra,
            ..attrs
        })
    }
}

impl LabelAttrs {
    pub fn new(
        multiscales: Vec<MultiscaleMetadata>,
        image_label: ImageLabel,
    ) -> Result<Self, MetadataError> {
        if multiscales.is_empty() {
            return Err(MetadataError::FieldShape(
                "The 'multiscales' attribute must contain at least one metadata document"
                    .to_string(),
            ));
        }
        Ok(LabelAttrs {
            multiscales,
            image_label,
            extra: Map::new(),
        })
    }
}

/// A multiscale group whose attributes additionally carry validated
/// `image-label` metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelGroup {
    attrs: LabelAttrs,
    members: IndexMap<String, Node>,
}

impl LabelGroup {
    pub fn new(
        attrs: LabelAttrs,
        members: IndexMap<String, Node>,
    ) -> Result<Self, MetadataError> {
        attrs.image_label.validate()?;
        for (index, meta) in attrs.multiscales.iter().enumerate() {
            meta.validate()?;
            check_members(meta, &members, index)?;
        }
        Ok(LabelGroup { attrs, members })
    }

    pub fn attrs(&self) -> &LabelAttrs {
        &self.attrs
    }

    pub fn members(&self) -> &IndexMap<String, Node> {
        &self.members
    }

    /// Validate a declaration tree as a label group.
    pub fn from_spec(spec: GroupSpec) -> Result<Self> {
        ensure!(
            spec.attributes.contains_key("multiscales"),
            "Failed to find mandatory 'multiscales' key in the attributes of the group"
        );
        ensure!(
            spec.attributes.contains_key("image-label"),
            "Failed to find mandatory 'image-label' key in the attributes of the group"
        );
        let attrs: LabelAttrs = serde_json::from_value(Value::Object(spec.attributes))?;
        Ok(LabelGroup::new(attrs, spec.members)?)
    }

    /// The declaration tree this group persists as.
    pub fn to_spec(&self) -> Result<GroupSpec> {
        let attrs = match serde_json::to_value(&self.attrs)? {
            Value::Object(map) => map,
            _ => bail!("Label attributes did not serialize to a JSON object"),
        };
        Ok(GroupSpec::new(attrs, self.members.clone()))
    }
}
