//! Models for version 0.4 of the OME-NGFF specification.

pub mod axis;
pub mod label;
pub mod multiscale;
pub mod plate;
pub mod transform;
pub mod well;

pub use axis::{Axis, AxisType, SpaceUnit, TimeUnit};
pub use label::{ImageLabel, LabelAttrs, LabelColor, LabelGroup, LabelProperty, LabelSource};
pub use multiscale::{
    check_members, BuildConfig, Dataset, MultiscaleAttrs, MultiscaleGroup, MultiscaleMetadata,
};
pub use plate::{Acquisition, PlateAttrs, PlateEntry, PlateGroup, PlateMetadata, PlateWell};
pub use transform::{compose_transforms, transpose_transforms, CoordinateTransform};
pub use well::{WellAttrs, WellGroup, WellImage, WellMetadata};

/// The version tag carried by every v0.4 metadata document.
pub const VERSION: &str = "0.4";
