use ngff::v04::{
    Axis, BuildConfig, LabelGroup, MultiscaleGroup, PlateAttrs, PlateEntry, PlateGroup,
    PlateMetadata, PlateWell, SpaceUnit, WellAttrs, WellGroup, WellImage, WellMetadata,
};
use ngff::{GroupSpec, MetadataError, Node};

use indexmap::IndexMap;
use ndarray::Array2;
use serde_json::json;

/// Declaration of a group carrying a valid two-level pyramid.
fn image_spec() -> GroupSpec {
    let arrays = vec![Array2::<u16>::zeros((10, 10)), Array2::<u16>::zeros((5, 5))];
    MultiscaleGroup::from_arrays(
        &arrays,
        &["s0", "s1"],
        vec![
            Axis::space("y", SpaceUnit::Micrometer).unwrap(),
            Axis::space("x", SpaceUnit::Micrometer).unwrap(),
        ],
        &[vec![1.0, 1.0], vec![2.0, 2.0]],
        &[vec![0.0, 0.0], vec![0.5, 0.5]],
        BuildConfig::default(),
    )
    .unwrap()
    .to_spec()
    .unwrap()
}

fn well_spec() -> GroupSpec {
    let attrs = WellAttrs::new(WellMetadata::new(vec![WellImage::new("0", None).unwrap()]).unwrap());
    let mut members = IndexMap::new();
    members.insert("0".to_string(), Node::Group(image_spec()));
    WellGroup::new(attrs, members).unwrap().to_spec().unwrap()
}

#[test]
fn well_groups_resolve_every_image() {
    let attrs = WellAttrs::new(
        WellMetadata::new(vec![
            WellImage::new("0", Some(1)).unwrap(),
            WellImage::new("1", Some(2)).unwrap(),
        ])
        .unwrap(),
    );
    let mut members = IndexMap::new();
    members.insert("0".to_string(), Node::Group(image_spec()));
    members.insert("1".to_string(), Node::Group(image_spec()));

    let well = WellGroup::new(attrs, members).unwrap();
    assert_eq!(well.attrs().well.images.len(), 2);

    let spec = well.to_spec().unwrap();
    let back = WellGroup::from_spec(spec).unwrap();
    assert_eq!(back, well);
}

#[test]
fn well_groups_reject_missing_images() {
    let attrs = WellAttrs::new(WellMetadata::new(vec![WellImage::new("3", None).unwrap()]).unwrap());
    let err = WellGroup::new(attrs, IndexMap::new()).unwrap_err();
    assert!(err.to_string().contains("no member with that name"));
}

#[test]
fn well_groups_demand_multiscale_members() {
    // a member that is not a group at all
    let attrs = WellAttrs::new(WellMetadata::new(vec![WellImage::new("0", None).unwrap()]).unwrap());
    let mut members = IndexMap::new();
    members.insert(
        "0".to_string(),
        Node::Array(ngff::ArraySpec::new(ngff::DataType::UInt8, [5, 5], [5, 5])),
    );
    let err = WellGroup::new(attrs.clone(), members).unwrap_err();
    assert!(err.to_string().contains("must be a group"));

    // a group without multiscale metadata
    let mut members = IndexMap::new();
    members.insert("0".to_string(), Node::Group(GroupSpec::default()));
    let err = WellGroup::new(attrs, members).unwrap_err();
    assert!(err
        .to_string()
        .contains("does not carry valid multiscale metadata"));
}

#[test]
fn well_attrs_parse_from_json() {
    let attrs: WellAttrs = serde_json::from_value(json!({
        "well": {
            "version": "0.4",
            "images": [{"path": "0", "acquisition": 1}, {"path": "1"}],
        },
    }))
    .unwrap();
    assert_eq!(attrs.well.images[0].acquisition, Some(1));
    assert_eq!(attrs.well.images[1].acquisition, None);
}

#[test]
fn plate_groups_resolve_wells_through_rows() {
    let meta = PlateMetadata::new(
        Vec::new(),
        vec![PlateEntry::new("A"), PlateEntry::new("B")],
        vec![PlateEntry::new("1")],
        1,
        vec![
            PlateWell::new("A/1", 0, 0).unwrap(),
            PlateWell::new("B/1", 1, 0).unwrap(),
        ],
    )
    .unwrap();

    let mut row_a = GroupSpec::default();
    row_a.members.insert("1".to_string(), Node::Group(well_spec()));
    let mut row_b = GroupSpec::default();
    row_b.members.insert("1".to_string(), Node::Group(well_spec()));
    let mut members = IndexMap::new();
    members.insert("A".to_string(), Node::Group(row_a));
    members.insert("B".to_string(), Node::Group(row_b));

    let plate = PlateGroup::new(PlateAttrs::new(meta), members).unwrap();
    assert_eq!(plate.attrs().plate.wells.len(), 2);

    let spec = plate.to_spec().unwrap();
    let back = PlateGroup::from_spec(spec).unwrap();
    assert_eq!(back, plate);
}

#[test]
fn plate_groups_report_unresolved_wells() {
    let meta = PlateMetadata::new(
        Vec::new(),
        vec![PlateEntry::new("A")],
        vec![PlateEntry::new("1")],
        1,
        vec![PlateWell::new("A/1", 0, 0).unwrap()],
    )
    .unwrap();

    // no row group at all
    let err = PlateGroup::new(PlateAttrs::new(meta.clone()), IndexMap::new()).unwrap_err();
    assert!(err.to_string().contains("no member named 'A'"));

    // a row group without the column
    let mut members = IndexMap::new();
    members.insert("A".to_string(), Node::Group(GroupSpec::default()));
    let err = PlateGroup::new(PlateAttrs::new(meta.clone()), members).unwrap_err();
    assert!(err.to_string().contains("has no member named '1'"));

    // a column group without well metadata
    let mut row = GroupSpec::default();
    row.members
        .insert("1".to_string(), Node::Group(GroupSpec::default()));
    let mut members = IndexMap::new();
    members.insert("A".to_string(), Node::Group(row));
    let err = PlateGroup::new(PlateAttrs::new(meta), members).unwrap_err();
    assert!(err.to_string().contains("does not carry valid well metadata"));
}

#[test]
fn plate_attrs_parse_from_json() {
    let attrs: PlateAttrs = serde_json::from_value(json!({
        "plate": {
            "version": "0.4",
            "name": "test",
            "acquisitions": [{"id": 1, "maximumfieldcount": 2}],
            "columns": [{"name": "1"}, {"name": "2"}],
            "rows": [{"name": "A"}],
            "field_count": 2,
            "wells": [
                {"path": "A/1", "rowIndex": 0, "columnIndex": 0},
                {"path": "A/2", "rowIndex": 0, "columnIndex": 1},
            ],
        },
    }))
    .unwrap();
    assert_eq!(attrs.plate.name.as_deref(), Some("test"));
    assert_eq!(attrs.plate.wells[1].column_index, 1);
}

#[test]
fn label_groups_validate_their_pyramid() {
    let mut spec = image_spec();
    spec.attributes.insert(
        "image-label".to_string(),
        json!({
            "version": "0.4",
            "colors": [{"label-value": 1, "rgba": [255, 0, 0, 255]}],
        }),
    );

    let label = LabelGroup::from_spec(spec.clone()).unwrap();
    assert_eq!(
        label.attrs().image_label.colors.as_ref().unwrap()[0].label_value,
        1
    );

    // the underlying arrays are still cross-checked
    spec.members.shift_remove("s0");
    let err = LabelGroup::from_spec(spec).unwrap_err();
    assert_eq!(
        err.downcast_ref::<MetadataError>(),
        Some(&MetadataError::MissingArray {
            index: 0,
            path: "s0".to_string(),
        })
    );
}

#[test]
fn label_groups_require_both_attribute_keys() {
    let err = LabelGroup::from_spec(image_spec()).unwrap_err();
    assert!(err.to_string().contains("image-label"));

    let mut spec = GroupSpec::default();
    spec.attributes
        .insert("image-label".to_string(), json!({"version": "0.4"}));
    let err = LabelGroup::from_spec(spec).unwrap_err();
    assert!(err.to_string().contains("multiscales"));
}
