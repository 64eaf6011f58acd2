//! Plate metadata for high-content screening layouts. A plate group nests
//! row groups containing column groups, one per imaged well; the `plate`
//! attribute document declares the row/column grid and the wells present.

use crate::error::MetadataError;
use crate::node::{GroupSpec, Node};
use crate::util::duplicates;
use crate::v04::well::WellGroup;
use crate::v04::VERSION;

use anyhow::{bail, ensure, Context, Result};
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One acquisition run across the plate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAcquisition")]
pub struct Acquisition {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub maximumfieldcount: u64,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAcquisition {
    id: u64,
    name: Option<String>,
    maximumfieldcount: u64,
}

impl TryFrom<RawAcquisition> for Acquisition {
    type Error = MetadataError;

    fn try_from(raw: RawAcquisition) -> Result<Self, Self::Error> {
        Acquisition::new(raw.id, raw.name, raw.maximumfieldcount)
    }
}

impl Acquisition {
    pub fn new(
        id: u64,
        name: Option<String>,
        maximumfieldcount: u64,
    ) -> Result<Self, MetadataError> {
        let acq = Acquisition {
            id,
            name,
            maximumfieldcount,
        };
        acq.validate()?;
        Ok(acq)
    }

    fn validate(&self) -> Result<(), MetadataError> {
        if self.id == 0 {
            return Err(MetadataError::FieldShape(
                "Acquisition ids must be positive integers".to_string(),
            ));
        }
        if self.maximumfieldcount == 0 {
            return Err(MetadataError::FieldShape(
                "The maximumfieldcount of an acquisition must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }
}

/// One row or column of the plate grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlateEntry {
    pub name: String,
}

impl PlateEntry {
    pub fn new(name: impl Into<String>) -> Self {
        PlateEntry { name: name.into() }
    }
}

/// One imaged well: its path within the plate group plus its position in
/// the declared row/column grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPlateWell")]
pub struct PlateWell {
    pub path: String,
    #[serde(rename = "rowIndex")]
    pub row_index: u64,
    #[serde(rename = "columnIndex")]
    pub column_index: u64,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPlateWell {
    path: String,
    #[serde(rename = "rowIndex")]
    row_index: u64,
    #[serde(rename = "columnIndex")]
    column_index: u64,
}

impl TryFrom<RawPlateWell> for PlateWell {
    type Error = MetadataError;

    fn try_from(raw: RawPlateWell) -> Result<Self, Self::Error> {
        PlateWell::new(raw.path, raw.row_index, raw.column_index)
    }
}

impl PlateWell {
    pub fn new(
        path: impl Into<String>,
        row_index: u64,
        column_index: u64,
    ) -> Result<Self, MetadataError> {
        let well = PlateWell {
            path: path.into(),
            row_index,
            column_index,
        };
        well.split()?;
        Ok(well)
    }

    /// The row and column components of this well's path.
    pub fn split(&self) -> Result<(&str, &str), MetadataError> {
        match self.path.split_once('/') {
            Some((row, col)) if !row.is_empty() && !col.is_empty() && !col.contains('/') => {
                Ok((row, col))
            }
            _ => Err(MetadataError::FieldShape(format!(
                "Well paths must have the form '<row>/<column>'. Got '{}' instead.",
                self.path
            ))),
        }
    }
}

/// The `plate` attribute document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPlateMetadata")]
pub struct PlateMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub acquisitions: Vec<Acquisition>,
    pub columns: Vec<PlateEntry>,
    pub rows: Vec<PlateEntry>,
    pub field_count: u64,
    pub wells: Vec<PlateWell>,
}

fn default_version() -> Option<String> {
    Some(VERSION.to_string())
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPlateMetadata {
    #[serde(default = "default_version")]
    version: Option<String>,
    name: Option<String>,
    acquisitions: Vec<Acquisition>,
    columns: Vec<PlateEntry>,
    rows: Vec<PlateEntry>,
    field_count: u64,
    wells: Vec<PlateWell>,
}

impl TryFrom<RawPlateMetadata> for PlateMetadata {
    type Error = MetadataError;

    fn try_from(raw: RawPlateMetadata) -> Result<Self, Self::Error> {
        let meta = PlateMetadata {
            version: raw.version,
            name: raw.name,
            acquisitions: raw.acquisitions,
            columns: raw.columns,
            rows: raw.rows,
            field_count: raw.field_count,
            wells: raw.wells,
        };
        meta.validate()?;
        Ok(meta)
    }
}

impl PlateMetadata {
    pub fn new(
        acquisitions: Vec<Acquisition>,
        rows: Vec<PlateEntry>,
        columns: Vec<PlateEntry>,
        field_count: u64,
        wells: Vec<PlateWell>,
    ) -> Result<Self, MetadataError> {
        let meta = PlateMetadata {
            version: default_version(),
            name: None,
            acquisitions,
            columns,
            rows,
            field_count,
            wells,
        };
        meta.validate()?;
        Ok(meta)
    }

    pub(crate) fn validate(&self) -> Result<(), MetadataError> {
        for acq in &self.acquisitions {
            acq.validate()?;
        }
        let id_dupes = duplicates(self.acquisitions.iter().map(|a| a.id));
        if !id_dupes.is_empty() {
            return Err(MetadataError::FieldShape(format!(
                "Acquisition ids must be unique. Ids [{}] are repeated.",
                id_dupes.iter().join(", ")
            )));
        }

        for (kind, entries) in [("Row", &self.rows), ("Column", &self.columns)] {
            if entries.iter().any(|e| e.name.is_empty()) {
                return Err(MetadataError::FieldShape(format!(
                    "{} names must be non-empty strings",
                    kind
                )));
            }
            let dupes = duplicates(entries.iter().map(|e| e.name.as_str()));
            if !dupes.is_empty() {
                return Err(MetadataError::FieldShape(format!(
                    "{} names must be unique. Names [{}] are repeated.",
                    kind,
                    dupes.iter().join(", ")
                )));
            }
        }

        if self.field_count == 0 {
            return Err(MetadataError::FieldShape(
                "The field_count of a plate must be a positive integer".to_string(),
            ));
        }

        let path_dupes = duplicates(self.wells.iter().map(|w| w.path.as_str()));
        if !path_dupes.is_empty() {
            return Err(MetadataError::FieldShape(format!(
                "Well paths must be unique. Paths [{}] are repeated.",
                path_dupes.iter().join(", ")
            )));
        }
        for well in &self.wells {
            let (row_name, col_name) = well.split()?;
            let row = self
                .rows
                .get(well.row_index as usize)
                .ok_or_else(|| {
                    MetadataError::FieldShape(format!(
                        "The rowIndex of well '{}' is {}, but the plate only declares {} rows.",
                        well.path,
                        well.row_index,
                        self.rows.len()
                    ))
                })?;
            if row.name != row_name {
                return Err(MetadataError::FieldShape(format!(
                    "Well path '{}' does not match its indices: rowIndex {} refers to \
                     row '{}'.",
                    well.path, well.row_index, row.name
                )));
            }
            let column = self
                .columns
                .get(well.column_index as usize)
                .ok_or_else(|| {
                    MetadataError::FieldShape(format!(
                        "The columnIndex of well '{}' is {}, but the plate only declares \
                         {} columns.",
                        well.path,
                        well.column_index,
                        self.columns.len()
                    ))
                })?;
            if column.name != col_name {
                return Err(MetadataError::FieldShape(format!(
                    "Well path '{}' does not match its indices: columnIndex {} refers to \
                     column '{}'.",
                    well.path, well.column_index, column.name
                )));
            }
        }
        Ok(())
    }
}

/// The attribute document of a plate group. Keys other than `plate` are
/// preserved untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateAttrs {
    pub plate: PlateMetadata,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PlateAttrs {
    pub fn new(plate: PlateMetadata) -> Self {
        PlateAttrs {
            plate,
            extra: Map::new(),
        }
    }
}

/// A group whose `plate` metadata has been validated against its members:
/// every declared well path resolves through a row group to a column group
/// carrying valid well metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateGroup {
    attrs: PlateAttrs,
    members: IndexMap<String, Node>,
}

impl PlateGroup {
    pub fn new(attrs: PlateAttrs, members: IndexMap<String, Node>) -> Result<Self> {
        attrs.plate.validate()?;
        for well in &attrs.plate.wells {
            let (row_name, col_name) = well.split()?;
            let row = members
                .get(row_name)
                .with_context(|| {
                    format!(
                        "Well '{}' was specified in plate metadata, but no member named \
                         '{}' was found in the group",
                        well.path, row_name
                    )
                })?
                .as_group()
                .with_context(|| {
                    format!(
                        "The node at '{}' referenced by plate metadata must be a group",
                        row_name
                    )
                })?;
            let spec = row
                .members
                .get(col_name)
                .with_context(|| {
                    format!(
                        "Well '{}' was specified in plate metadata, but the group '{}' \
                         has no member named '{}'",
                        well.path, row_name, col_name
                    )
                })?
                .as_group()
                .with_context(|| {
                    format!(
                        "The node at '{}' referenced by plate metadata must be a group",
                        well.path
                    )
                })?;
            WellGroup::from_spec(spec.clone()).with_context(|| {
                format!(
                    "The group at '{}' referenced by plate metadata does not carry valid \
                     well metadata",
                    well.path
                )
            })?;
        }
        Ok(PlateGroup { attrs, members })
    }

    pub fn attrs(&self) -> &PlateAttrs {
        &self.attrs
    }

    pub fn members(&self) -> &IndexMap<String, Node> {
        &self.members
    }

    /// Validate a declaration tree as a plate group.
    pub fn from_spec(spec: GroupSpec) -> Result<Self> {
        ensure!(
            spec.attributes.contains_key("plate"),
            "Failed to find mandatory 'plate' key in the attributes of the group"
        );
        let attrs: PlateAttrs = serde_json::from_value(Value::Object(spec.attributes))?;
        PlateGroup::new(attrs, spec.members)
    }

    /// The declaration tree this group persists as.
    pub fn to_spec(&self) -> Result<GroupSpec> {
        let attrs = match serde_json::to_value(&self.attrs)? {
            Value::Object(map) => map,
            _ => bail!("Plate attributes did not serialize to a JSON object"),
        };
        Ok(GroupSpec::new(attrs, self.members.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn grid() -> (Vec<PlateEntry>, Vec<PlateEntry>) {
        (
            vec![PlateEntry::new("A"), PlateEntry::new("B")],
            vec![PlateEntry::new("1"), PlateEntry::new("2")],
        )
    }

    #[test]
    fn well_paths_must_be_row_slash_column() {
        assert!(PlateWell::new("A/1", 0, 0).is_ok());
        for bad in ["A", "A/1/2", "/1", "A/", ""] {
            let err = PlateWell::new(bad, 0, 0).unwrap_err();
            assert!(err.to_string().contains("<row>/<column>"), "{}", bad);
        }
    }

    #[test]
    fn well_indices_must_point_at_their_names() {
        let (rows, columns) = grid();
        let wells = vec![PlateWell::new("A/2", 0, 0).unwrap()];
        let err = PlateMetadata::new(Vec::new(), rows, columns, 1, wells).unwrap_err();
        assert!(err.to_string().contains("columnIndex 0 refers to column '1'"));

        let (rows, columns) = grid();
        let wells = vec![PlateWell::new("B/1", 2, 0).unwrap()];
        let err = PlateMetadata::new(Vec::new(), rows, columns, 1, wells).unwrap_err();
        assert!(err.to_string().contains("only declares 2 rows"));
    }

    #[test]
    fn row_names_must_be_unique() {
        let rows = vec![PlateEntry::new("A"), PlateEntry::new("A")];
        let columns = vec![PlateEntry::new("1")];
        let err = PlateMetadata::new(Vec::new(), rows, columns, 1, Vec::new()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Row names must be unique. Names [A] are repeated."
        );
    }

    #[test]
    fn acquisition_fields_must_be_positive() {
        assert!(Acquisition::new(0, None, 1).is_err());
        assert!(Acquisition::new(1, None, 0).is_err());
        assert!(Acquisition::new(1, Some("run".to_string()), 2).is_ok());
    }

    #[test]
    fn acquisition_ids_must_be_unique() {
        let acqs = vec![
            Acquisition::new(1, None, 1).unwrap(),
            Acquisition::new(1, None, 2).unwrap(),
        ];
        let (rows, columns) = grid();
        let err = PlateMetadata::new(acqs, rows, columns, 1, Vec::new()).unwrap_err();
        assert!(err.to_string().contains("Acquisition ids must be unique"));
    }

    #[test]
    fn wire_shape() {
        let (rows, columns) = grid();
        let meta = PlateMetadata::new(
            vec![Acquisition::new(1, None, 2).unwrap()],
            rows,
            columns,
            2,
            vec![PlateWell::new("A/1", 0, 0).unwrap()],
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(&meta).unwrap(),
            json!({
                "version": "0.4",
                "acquisitions": [{"id": 1, "maximumfieldcount": 2}],
                "columns": [{"name": "1"}, {"name": "2"}],
                "rows": [{"name": "A"}, {"name": "B"}],
                "field_count": 2,
                "wells": [{"path": "A/1", "rowIndex": 0, "columnIndex": 0}],
            })
        );
    }
}
