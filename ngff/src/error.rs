use thiserror::Error;

/// Failures raised while constructing or validating NGFF metadata.
///
/// Construction of any metadata value either fully succeeds or fails with
/// the first violation found; there is no partial-success mode. Every
/// variant identifies the offending entity so the message can be surfaced
/// to users as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    /// A single entity's own field failed a local constraint, before any
    /// cross-entity check ran.
    #[error("{0}")]
    FieldShape(String),

    /// A dataset path with no corresponding array member in the hierarchy.
    #[error(
        "Dataset '{path}' was specified in multiscale metadata (multiscales[{index}]), \
         but no array with that name was found in the hierarchy. All arrays referenced \
         in multiscale metadata must be contained in the group"
    )]
    MissingArray { index: usize, path: String },

    /// A dataset path resolving to a subgroup instead of an array.
    #[error(
        "The node at '{path}' referenced by multiscale metadata (multiscales[{index}]) \
         should be an array, but a group was found there instead"
    )]
    UnexpectedGroup { index: usize, path: String },

    /// A scale or translation vector whose length disagrees with the rank
    /// of the array it applies to.
    #[error(
        "The '{transform}' transform of dataset '{path}' has dimensionality {tform_ndim}, \
         which does not match the dimensionality of the array found at that path \
         ({array_ndim}). Transform dimensionality must match array dimensionality"
    )]
    DimensionalityMismatch {
        path: String,
        transform: &'static str,
        tform_ndim: usize,
        array_ndim: usize,
    },

    /// An axis sequence whose length disagrees with the rank of an array
    /// referenced by the same document.
    #[error(
        "The multiscale metadata (multiscales[{index}]) declares {axes} axes, which \
         does not match the dimensionality of the array found at '{path}' ({array_ndim})"
    )]
    AxesCardinalityMismatch {
        index: usize,
        path: String,
        axes: usize,
        array_ndim: usize,
    },
}
