//! Multiscale image metadata and its agreement with a group hierarchy.
//!
//! A [`MultiscaleMetadata`] document names the arrays of one image pyramid
//! and describes how each maps into physical space. [`check_members`]
//! verifies that a document and the member map of the group carrying it
//! agree. [`MultiscaleGroup`] ties the two together: it can only be
//! constructed in a validated state, whether from in-memory arrays, from a
//! declaration tree, or from a persisted store.

use crate::error::MetadataError;
use crate::node::{ArrayLike, ArraySpec, Chunks, GroupSpec, Node};
use crate::store::{ArrayOp, GroupOp, NodeOp, Store, StoreNode};
use crate::util::duplicates;
use crate::v04::axis::{Axis, AxisType};
use crate::v04::transform::{
    compose_transforms, ensure_dimensionality, ensure_nonempty, ensure_scale_first,
    transpose_transforms, CoordinateTransform,
};
use crate::v04::VERSION;

use anyhow::{bail, ensure, Result};
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entry in the `datasets` list of a multiscale document: the name of
/// an array in the enclosing group plus the transforms mapping its index
/// space to physical space, applied left to right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDataset")]
pub struct Dataset {
    pub path: String,
    #[serde(rename = "coordinateTransformations")]
    pub coordinate_transformations: Vec<CoordinateTransform>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDataset {
    path: String,
    #[serde(rename = "coordinateTransformations")]
    coordinate_transformations: Vec<CoordinateTransform>,
}

impl TryFrom<RawDataset> for Dataset {
    type Error = MetadataError;

    fn try_from(raw: RawDataset) -> Result<Self, Self::Error> {
        Dataset::new(raw.path, raw.coordinate_transformations)
    }
}

impl Dataset {
    pub fn new(
        path: impl Into<String>,
        transforms: Vec<CoordinateTransform>,
    ) -> Result<Self, MetadataError> {
        let dataset = Dataset {
            path: path.into(),
            coordinate_transformations: transforms,
        };
        dataset.validate()?;
        Ok(dataset)
    }

    /// A dataset carrying the usual scale + translation pair.
    pub fn from_scale_translation(
        path: impl Into<String>,
        scale: Vec<f64>,
        translation: Vec<f64>,
    ) -> Result<Self, MetadataError> {
        let transforms = CoordinateTransform::scale_translation(scale, translation)?;
        Dataset::new(path, transforms.to_vec())
    }

    /// The dimensionality declared by this dataset's transforms, when any
    /// of them declares one.
    pub fn ndim(&self) -> Option<usize> {
        self.coordinate_transformations.iter().find_map(|t| t.ndim())
    }

    /// This dataset with a further scale and translation merged into its
    /// transforms; see [`compose_transforms`].
    pub fn transformed(
        &self,
        scale: Option<&[f64]>,
        translation: Option<&[f64]>,
    ) -> Result<Self, MetadataError> {
        let transforms = compose_transforms(&self.coordinate_transformations, scale, translation)?;
        Dataset::new(self.path.clone(), transforms)
    }

    /// This dataset with its transform vectors permuted by `order`, where
    /// `order[i]` names the old position of new position `i`.
    pub fn transposed(&self, order: &[usize]) -> Result<Self, MetadataError> {
        let transforms = transpose_transforms(&self.coordinate_transformations, order)?;
        Dataset::new(self.path.clone(), transforms)
    }

    pub(crate) fn validate(&self) -> Result<(), MetadataError> {
        if self.path.is_empty() {
            return Err(MetadataError::FieldShape(
                "Dataset paths must be non-empty strings".to_string(),
            ));
        }
        ensure_nonempty(&self.coordinate_transformations)?;
        ensure_scale_first(&self.coordinate_transformations)?;
        ensure_dimensionality(&self.coordinate_transformations)?;
        Ok(())
    }
}

/// Metadata for one image pyramid: its axes, its per-resolution datasets,
/// and optionally a transform sequence shared by all of them.
///
/// Field order matches the emission order of the `multiscales` wire format;
/// absent optional fields are omitted, so a parsed document serializes back
/// to its source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMultiscaleMetadata")]
pub struct MultiscaleMetadata {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    pub datasets: Vec<Dataset>,
    pub axes: Vec<Axis>,
    #[serde(
        rename = "coordinateTransformations",
        skip_serializing_if = "Option::is_none"
    )]
    pub coordinate_transformations: Option<Vec<CoordinateTransform>>,
}

fn default_version() -> String {
    VERSION.to_string()
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMultiscaleMetadata {
    #[serde(default = "default_version")]
    version: String,
    name: Option<String>,
    #[serde(rename = "type")]
    kind: Option<Value>,
    metadata: Option<Map<String, Value>>,
    datasets: Vec<Dataset>,
    axes: Vec<Axis>,
    #[serde(rename = "coordinateTransformations")]
    coordinate_transformations: Option<Vec<CoordinateTransform>>,
}

impl TryFrom<RawMultiscaleMetadata> for MultiscaleMetadata {
    type Error = MetadataError;

    fn try_from(raw: RawMultiscaleMetadata) -> Result<Self, Self::Error> {
        let meta = MultiscaleMetadata {
            version: raw.version,
            name: raw.name,
            kind: raw.kind,
            metadata: raw.metadata,
            datasets: raw.datasets,
            axes: raw.axes,
            coordinate_transformations: raw.coordinate_transformations,
        };
        meta.validate()?;
        Ok(meta)
    }
}

impl MultiscaleMetadata {
    pub fn new(
        axes: Vec<Axis>,
        datasets: Vec<Dataset>,
        coordinate_transformations: Option<Vec<CoordinateTransform>>,
    ) -> Result<Self, MetadataError> {
        let meta = MultiscaleMetadata {
            version: VERSION.to_string(),
            name: None,
            kind: None,
            metadata: None,
            datasets,
            axes,
            coordinate_transformations,
        };
        meta.validate()?;
        Ok(meta)
    }

    /// This document with a further scale and translation merged into every
    /// dataset. Document-level transforms are left untouched.
    pub fn transformed(
        &self,
        scale: Option<&[f64]>,
        translation: Option<&[f64]>,
    ) -> Result<Self, MetadataError> {
        let datasets = self
            .datasets
            .iter()
            .map(|d| d.transformed(scale, translation))
            .collect::<Result<Vec<_>, _>>()?;
        let meta = MultiscaleMetadata {
            datasets,
            ..self.clone()
        };
        meta.validate()?;
        Ok(meta)
    }

    /// This document with its axes and every transform vector permuted by
    /// `order`, where `order[i]` names the old position of new position `i`.
    /// Both the per-dataset and the document-level transforms are permuted.
    pub fn transposed(&self, order: &[usize]) -> Result<Self, MetadataError> {
        if !duplicates(order.iter().copied()).is_empty() {
            return Err(MetadataError::FieldShape(format!(
                "Axis order [{}] contains repeated values.",
                order.iter().join(", ")
            )));
        }
        if order.len() != self.axes.len() {
            return Err(MetadataError::FieldShape(format!(
                "Axis order has length {}, but the document has {} axes.",
                order.len(),
                self.axes.len()
            )));
        }
        let axes = order
            .iter()
            .map(|&i| {
                self.axes.get(i).cloned().ok_or_else(|| {
                    MetadataError::FieldShape(format!(
                        "Axis order [{}] is out of range for {} axes.",
                        order.iter().join(", "),
                        self.axes.len()
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let datasets = self
            .datasets
            .iter()
            .map(|d| d.transposed(order))
            .collect::<Result<Vec<_>, _>>()?;
        let coordinate_transformations = match &self.coordinate_transformations {
            Some(tforms) => Some(transpose_transforms(tforms, order)?),
            None => None,
        };
        let meta = MultiscaleMetadata {
            datasets,
            axes,
            coordinate_transformations,
            ..self.clone()
        };
        meta.validate()?;
        Ok(meta)
    }

    /// Like [`MultiscaleMetadata::transposed`], with the order given as
    /// axis names.
    pub fn transposed_by_name(&self, order: &[&str]) -> Result<Self, MetadataError> {
        let indices = order
            .iter()
            .map(|name| {
                self.axes
                    .iter()
                    .position(|a| a.name == *name)
                    .ok_or_else(|| {
                        MetadataError::FieldShape(format!(
                            "No axis named '{}'. The axes are named [{}].",
                            name,
                            self.axes.iter().map(|a| a.name.as_str()).join(", ")
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.transposed(&indices)
    }

    /// Re-run every construction-time check over the current field values.
    pub(crate) fn validate(&self) -> Result<(), MetadataError> {
        if self.datasets.is_empty() {
            return Err(MetadataError::FieldShape(
                "Multiscale metadata must contain at least one dataset".to_string(),
            ));
        }
        for dataset in &self.datasets {
            dataset.validate()?;
        }
        let path_dupes = duplicates(self.datasets.iter().map(|d| d.path.as_str()));
        if !path_dupes.is_empty() {
            return Err(MetadataError::FieldShape(format!(
                "Dataset paths must be unique. Paths [{}] are repeated.",
                path_dupes.iter().join(", ")
            )));
        }

        if !(2..=5).contains(&self.axes.len()) {
            return Err(MetadataError::FieldShape(format!(
                "Incorrect number of axes provided ({}). Only 2, 3, 4, or 5 axes are allowed.",
                self.axes.len()
            )));
        }
        if self.axes.iter().any(|a| a.name.is_empty()) {
            return Err(MetadataError::FieldShape(
                "Axis names must be non-empty strings".to_string(),
            ));
        }
        let name_dupes = duplicates(self.axes.iter().map(|a| a.name.as_str()));
        if !name_dupes.is_empty() {
            return Err(MetadataError::FieldShape(format!(
                "Axis names must be unique. Axis names [{}] are repeated.",
                name_dupes.iter().join(", ")
            )));
        }
        for kind in [AxisType::Time, AxisType::Channel] {
            let count = self
                .axes
                .iter()
                .filter(|a| a.axis_type() == Some(kind))
                .count();
            if count > 1 {
                return Err(MetadataError::FieldShape(format!(
                    "Invalid number of {} axes: {}. Only 1 {} axis is allowed.",
                    kind, count, kind
                )));
            }
        }

        if let Some(tforms) = &self.coordinate_transformations {
            ensure_nonempty(tforms)?;
            ensure_scale_first(tforms)?;
            ensure_dimensionality(tforms)?;
            let doc_ndim = tforms.iter().find_map(|t| t.ndim());
            let dset_ndim = self.datasets[0].ndim();
            if let (Some(doc_ndim), Some(dset_ndim)) = (doc_ndim, dset_ndim) {
                if doc_ndim != dset_ndim {
                    return Err(MetadataError::FieldShape(format!(
                        "Dimensionality of the document-level coordinateTransformations ({}) \
                         does not match the dimensionality of the coordinateTransformations \
                         defined in the datasets ({}).",
                        doc_ndim, dset_ndim
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Verify that one multiscale document and a group's member map agree.
///
/// For each dataset, in order: the member it names must exist, must be an
/// array, every scale or translation transform applying to it (its own and
/// the document-level ones) must match the array's rank, and the array's
/// rank must equal the document's axis count. The first disagreement is
/// returned; `index` is the document's position in the `multiscales` list
/// and only feeds the error messages.
pub fn check_members(
    meta: &MultiscaleMetadata,
    members: &IndexMap<String, Node>,
    index: usize,
) -> Result<(), MetadataError> {
    let doc_tforms = meta.coordinate_transformations.as_deref().unwrap_or(&[]);
    for dataset in &meta.datasets {
        let member = members
            .get(&dataset.path)
            .ok_or_else(|| MetadataError::MissingArray {
                index,
                path: dataset.path.clone(),
            })?;
        let array = match member {
            Node::Array(spec) => spec,
            Node::Group(_) => {
                return Err(MetadataError::UnexpectedGroup {
                    index,
                    path: dataset.path.clone(),
                })
            }
        };
        let rank = array.ndim();
        for tform in dataset.coordinate_transformations.iter().chain(doc_tforms) {
            if let Some(tform_ndim) = tform.ndim() {
                if tform_ndim != rank {
                    return Err(MetadataError::DimensionalityMismatch {
                        path: dataset.path.clone(),
                        transform: tform.kind(),
                        tform_ndim,
                        array_ndim: rank,
                    });
                }
            }
        }
        if rank != meta.axes.len() {
            return Err(MetadataError::AxesCardinalityMismatch {
                index,
                path: dataset.path.clone(),
                axes: meta.axes.len(),
                array_ndim: rank,
            });
        }
    }
    Ok(())
}

/// The attribute document of a group carrying multiscale metadata. Keys
/// other than `multiscales` are preserved untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMultiscaleAttrs")]
pub struct MultiscaleAttrs {
    pub multiscales: Vec<MultiscaleMetadata>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Deserialize)]
struct RawMultiscaleAttrs {
    multiscales: Vec<MultiscaleMetadata>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl TryFrom<RawMultiscaleAttrs> for MultiscaleAttrs {
    type Error = MetadataError;

    fn try_from(raw: RawMultiscaleAttrs) -> Result<Self, Self::Error> {
        MultiscaleAttrs::new(raw.multiscales).map(|attrs| MultiscaleAttrs {
            extra: raw.extra,
            ..attrs
        })
    }
}

impl MultiscaleAttrs {
    pub fn new(multiscales: Vec<MultiscaleMetadata>) -> Result<Self, MetadataError> {
        if multiscales.is_empty() {
            return Err(MetadataError::FieldShape(
                "The 'multiscales' attribute must contain at least one metadata document"
                    .to_string(),
            ));
        }
        Ok(MultiscaleAttrs {
            multiscales,
            extra: Map::new(),
        })
    }
}

/// Options for [`MultiscaleGroup::from_arrays`].
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Name recorded in the metadata document.
    pub name: Option<String>,
    /// Free-form `type` field of the metadata document.
    pub kind: Option<Value>,
    /// Free-form `metadata` field of the metadata document.
    pub metadata: Option<Map<String, Value>>,
    /// Chunk layout for the declared arrays.
    pub chunks: Chunks,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            name: None,
            kind: None,
            metadata: None,
            chunks: Chunks::Auto,
        }
    }
}

/// A group whose attributes and members have been validated against each
/// other. The fields are private so the validated state cannot be broken
/// after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiscaleGroup {
    attrs: MultiscaleAttrs,
    members: IndexMap<String, Node>,
}

impl MultiscaleGroup {
    /// Validate `attrs` against `members`, in document order, stopping at
    /// the first disagreement.
    pub fn new(
        attrs: MultiscaleAttrs,
        members: IndexMap<String, Node>,
    ) -> Result<Self, MetadataError> {
        for (index, meta) in attrs.multiscales.iter().enumerate() {
            meta.validate()?;
            check_members(meta, &members, index)?;
        }
        Ok(MultiscaleGroup { attrs, members })
    }

    pub fn attrs(&self) -> &MultiscaleAttrs {
        &self.attrs
    }

    pub fn members(&self) -> &IndexMap<String, Node> {
        &self.members
    }

    /// Build a validated group from a pyramid of arrays and its spatial
    /// metadata. One array declaration is templated on each array, named
    /// per `paths`; one dataset entry records the matching scale and
    /// translation. `arrays`, `paths`, `scales`, and `translations` run in
    /// parallel and must have equal length.
    pub fn from_arrays<A: ArrayLike>(
        arrays: &[A],
        paths: &[&str],
        axes: Vec<Axis>,
        scales: &[Vec<f64>],
        translations: &[Vec<f64>],
        config: BuildConfig,
    ) -> Result<Self, MetadataError> {
        if paths.len() != arrays.len()
            || scales.len() != arrays.len()
            || translations.len() != arrays.len()
        {
            return Err(MetadataError::FieldShape(format!(
                "Got {} arrays, {} paths, {} scales, and {} translations. \
                 These must all have equal length.",
                arrays.len(),
                paths.len(),
                scales.len(),
                translations.len()
            )));
        }
        if let Chunks::PerArray(layouts) = &config.chunks {
            if layouts.len() != arrays.len() {
                return Err(MetadataError::FieldShape(format!(
                    "Got {} chunk layouts for {} arrays. These must have equal length.",
                    layouts.len(),
                    arrays.len()
                )));
            }
        }

        let members = arrays
            .iter()
            .enumerate()
            .map(|(i, array)| {
                let spec = ArraySpec::from_array(array, config.chunks.pick(i));
                (paths[i].to_string(), Node::Array(spec))
            })
            .collect();

        let datasets = paths
            .iter()
            .zip(scales)
            .zip(translations)
            .map(|((path, scale), translation)| {
                Dataset::from_scale_translation(*path, scale.clone(), translation.clone())
            })
            .collect::<Result<Vec<_>, _>>()?;
        let meta = MultiscaleMetadata {
            version: VERSION.to_string(),
            name: config.name,
            kind: config.kind,
            metadata: config.metadata,
            datasets,
            axes,
            coordinate_transformations: None,
        };

        MultiscaleGroup::new(MultiscaleAttrs::new(vec![meta])?, members)
    }

    /// Validate a declaration tree as a multiscale group.
    pub fn from_spec(spec: GroupSpec) -> Result<Self> {
        ensure!(
            spec.attributes.contains_key("multiscales"),
            "Failed to find mandatory 'multiscales' key in the attributes of the group"
        );
        let attrs: MultiscaleAttrs = serde_json::from_value(Value::Object(spec.attributes))?;
        Ok(MultiscaleGroup::new(attrs, spec.members)?)
    }

    /// The declaration tree this group persists as.
    pub fn to_spec(&self) -> Result<GroupSpec> {
        let attrs = match serde_json::to_value(&self.attrs)? {
            Value::Object(map) => map,
            _ => bail!("Multiscale attributes did not serialize to a JSON object"),
        };
        Ok(GroupSpec::new(attrs, self.members.clone()))
    }

    /// Read and validate a multiscale group from a store. Only the arrays
    /// named by the metadata are fetched, so this works on hierarchies
    /// whose stores cannot list their members.
    pub fn open<S: Store>(group: &S::Group) -> Result<Self> {
        let attrs = group.attrs()?;
        if !attrs.contains_key("multiscales") {
            bail!(
                "Failed to find mandatory 'multiscales' key in the attributes of the group \
                 at '{}'",
                group.path().display()
            );
        }
        let attrs: MultiscaleAttrs = serde_json::from_value(Value::Object(attrs))?;

        let mut members: IndexMap<String, Node> = IndexMap::new();
        for (index, meta) in attrs.multiscales.iter().enumerate() {
            for dataset in &meta.datasets {
                if members.contains_key(&dataset.path) {
                    continue;
                }
                if !group.exists(&dataset.path)? {
                    return Err(MetadataError::MissingArray {
                        index,
                        path: dataset.path.clone(),
                    }
                    .into());
                }
                let node = match StoreNode::<S>::open(group, &dataset.path)? {
                    StoreNode::Array(arr) => Node::Array(arr.spec()?),
                    StoreNode::Group(_) => {
                        return Err(MetadataError::UnexpectedGroup {
                            index,
                            path: dataset.path.clone(),
                        }
                        .into())
                    }
                };
                members.insert(dataset.path.clone(), node);
            }
        }
        Ok(MultiscaleGroup::new(attrs, members)?)
    }

    /// Persist this group as a new subgroup of `parent`.
    pub fn create<S: Store>(&self, parent: &S::Group, name: &str) -> Result<S::Group> {
        self.to_spec()?.to_store::<S>(parent, name)
    }
}
