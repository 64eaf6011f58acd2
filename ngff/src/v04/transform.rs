//! Coordinate transformations. A dataset carries an ordered sequence of
//! transforms mapping its index space to physical space; a multiscale
//! document may carry another sequence that applies to every dataset.

use crate::error::MetadataError;
use crate::util::duplicates;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// A coordinate transformation, discriminated on the wire by its `type`.
///
/// `Scale` and `Translation` carry their parameters inline and declare a
/// dimensionality. `Path` defers its parameters to another node in the
/// hierarchy, so its dimensionality cannot be resolved locally. `Identity`
/// matches any dimensionality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", try_from = "RawTransform")]
pub enum CoordinateTransform {
    Identity,
    Scale { scale: Vec<f64> },
    Translation { translation: Vec<f64> },
    Path { path: String },
}

impl CoordinateTransform {
    /// The wire name of this variant.
    pub fn kind(&self) -> &'static str {
        match self {
            CoordinateTransform::Identity => "identity",
            CoordinateTransform::Scale { .. } => "scale",
            CoordinateTransform::Translation { .. } => "translation",
            CoordinateTransform::Path { .. } => "path",
        }
    }

    /// The dimensionality this transform declares, when it declares one.
    pub fn ndim(&self) -> Option<usize> {
        match self {
            CoordinateTransform::Scale { scale } => Some(scale.len()),
            CoordinateTransform::Translation { translation } => Some(translation.len()),
            CoordinateTransform::Identity | CoordinateTransform::Path { .. } => None,
        }
    }

    /// Build the scale + translation pair used by a dataset entry.
    pub fn scale_translation(
        scale: Vec<f64>,
        translation: Vec<f64>,
    ) -> Result<[CoordinateTransform; 2], MetadataError> {
        if scale.is_empty() {
            return Err(MetadataError::FieldShape(
                "Not enough values in scale. Got 0, expected at least 1.".to_string(),
            ));
        }
        if translation.is_empty() {
            return Err(MetadataError::FieldShape(
                "Not enough values in translation. Got 0, expected at least 1.".to_string(),
            ));
        }
        if scale.len() != translation.len() {
            return Err(MetadataError::FieldShape(format!(
                "Length of scale and translation do not match. scale has length = {}, \
                 but translation has length = {}.",
                scale.len(),
                translation.len()
            )));
        }
        Ok([
            CoordinateTransform::Scale { scale },
            CoordinateTransform::Translation { translation },
        ])
    }
}

/// Scale and translation vectors must be non-empty.
pub(crate) fn ensure_nonempty(transforms: &[CoordinateTransform]) -> Result<(), MetadataError> {
    for t in transforms {
        if t.ndim() == Some(0) {
            return Err(MetadataError::FieldShape(format!(
                "Not enough values in {}. Got 0, expected at least 1.",
                t.kind()
            )));
        }
    }
    Ok(())
}

/// Whenever a sequence contains a scale or translation transform, it must
/// contain exactly one scale, and it must come first. Sequences made of
/// identity or path transforms only are accepted as-is.
pub(crate) fn ensure_scale_first(transforms: &[CoordinateTransform]) -> Result<(), MetadataError> {
    if transforms.is_empty() {
        return Err(MetadataError::FieldShape(
            "coordinateTransformations must contain at least one transform".to_string(),
        ));
    }
    if !transforms.iter().any(|t| t.ndim().is_some()) {
        return Ok(());
    }
    let num_scales = transforms
        .iter()
        .filter(|t| matches!(t, CoordinateTransform::Scale { .. }))
        .count();
    if num_scales != 1 {
        return Err(MetadataError::FieldShape(format!(
            "Invalid number of scale transforms: got {}, expected 1.",
            num_scales
        )));
    }
    if !matches!(transforms[0], CoordinateTransform::Scale { .. }) {
        return Err(MetadataError::FieldShape(format!(
            "The first element of coordinateTransformations must be a scale transform. \
             Got a '{}' transform instead.",
            transforms[0].kind()
        )));
    }
    Ok(())
}

/// All scale and translation transforms in one sequence must declare the
/// same dimensionality.
pub(crate) fn ensure_dimensionality(
    transforms: &[CoordinateTransform],
) -> Result<(), MetadataError> {
    let ndims: Vec<usize> = transforms.iter().filter_map(|t| t.ndim()).collect();
    if !ndims.iter().all_equal() {
        return Err(MetadataError::FieldShape(format!(
            "The transforms have inconsistent dimensionality. Got transforms with \
             dimensionality = [{}].",
            ndims.iter().join(", ")
        )));
    }
    Ok(())
}

/// Merge a further scale and translation into a transform sequence.
///
/// Scale values multiply into the existing scale transform and translation
/// values add onto the first existing translation transform; a sequence
/// without one gains it, with the missing scale treated as ones and the
/// missing translation as zeros. Identity transforms are absorbed. Passing
/// `None` for both parameters returns the sequence unchanged.
pub fn compose_transforms(
    transforms: &[CoordinateTransform],
    scale: Option<&[f64]>,
    translation: Option<&[f64]>,
) -> Result<Vec<CoordinateTransform>, MetadataError> {
    let param_ndim = match scale.or(translation) {
        Some(values) => values.len(),
        None => return Ok(transforms.to_vec()),
    };
    ensure_dimensionality(transforms)?;
    if transforms
        .iter()
        .any(|t| matches!(t, CoordinateTransform::Path { .. }))
    {
        return Err(MetadataError::FieldShape(
            "Cannot compose scale or translation values onto a 'path' transform.".to_string(),
        ));
    }
    let ndim = transforms
        .iter()
        .find_map(|t| t.ndim())
        .unwrap_or(param_ndim);
    if let Some(values) = scale {
        if values.len() != ndim {
            return Err(MetadataError::FieldShape(format!(
                "Cannot compose a scale of length {} onto transforms of dimensionality {}.",
                values.len(),
                ndim
            )));
        }
    }
    if let Some(values) = translation {
        if values.len() != ndim {
            return Err(MetadataError::FieldShape(format!(
                "Cannot compose a translation of length {} onto transforms of dimensionality {}.",
                values.len(),
                ndim
            )));
        }
    }

    let ones = vec![1.0; ndim];
    let old_scale = transforms
        .iter()
        .find_map(|t| match t {
            CoordinateTransform::Scale { scale } => Some(scale.as_slice()),
            _ => None,
        })
        .unwrap_or(&ones);
    let new_scale = old_scale
        .iter()
        .zip(scale.unwrap_or(&ones))
        .map(|(a, b)| a * b)
        .collect();
    let mut out = vec![CoordinateTransform::Scale { scale: new_scale }];

    let mut old_translations = transforms.iter().filter_map(|t| match t {
        CoordinateTransform::Translation { translation } => Some(translation),
        _ => None,
    });
    if let Some(values) = translation {
        let zeros = vec![0.0; ndim];
        let first = old_translations
            .next()
            .map_or(zeros.as_slice(), |v| v.as_slice());
        let merged = first.iter().zip(values).map(|(a, b)| a + b).collect();
        out.push(CoordinateTransform::Translation {
            translation: merged,
        });
    }
    for rest in old_translations {
        out.push(CoordinateTransform::Translation {
            translation: rest.clone(),
        });
    }
    Ok(out)
}

/// Permute the vectors of a transform sequence, where `order[i]` names the
/// old position of new position `i`. Identity transforms pass through
/// unchanged; path transforms cannot be permuted.
pub fn transpose_transforms(
    transforms: &[CoordinateTransform],
    order: &[usize],
) -> Result<Vec<CoordinateTransform>, MetadataError> {
    if !duplicates(order.iter().copied()).is_empty() {
        return Err(MetadataError::FieldShape(format!(
            "Axis order [{}] contains repeated values.",
            order.iter().join(", ")
        )));
    }
    transforms
        .iter()
        .map(|t| match t {
            CoordinateTransform::Scale { scale } => Ok(CoordinateTransform::Scale {
                scale: permute(scale, order, "scale")?,
            }),
            CoordinateTransform::Translation { translation } => {
                Ok(CoordinateTransform::Translation {
                    translation: permute(translation, order, "translation")?,
                })
            }
            CoordinateTransform::Identity => Ok(CoordinateTransform::Identity),
            CoordinateTransform::Path { .. } => Err(MetadataError::FieldShape(
                "Cannot transpose a 'path' transform.".to_string(),
            )),
        })
        .collect()
}

fn permute(values: &[f64], order: &[usize], kind: &str) -> Result<Vec<f64>, MetadataError> {
    if order.len() != values.len() {
        return Err(MetadataError::FieldShape(format!(
            "Axis order [{}] has length {}, but the {} transform has dimensionality {}.",
            order.iter().join(", "),
            order.len(),
            kind,
            values.len()
        )));
    }
    order
        .iter()
        .map(|&i| {
            values.get(i).copied().ok_or_else(|| {
                MetadataError::FieldShape(format!(
                    "Axis order [{}] is out of range for a {} transform of dimensionality {}.",
                    order.iter().join(", "),
                    kind,
                    values.len()
                ))
            })
        })
        .collect()
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTransform {
    #[serde(rename = "type")]
    kind: String,
    scale: Option<Vec<f64>>,
    translation: Option<Vec<f64>>,
    path: Option<String>,
}

impl TryFrom<RawTransform> for CoordinateTransform {
    type Error = MetadataError;

    fn try_from(raw: RawTransform) -> Result<Self, Self::Error> {
        fn unexpected(field: &str, kind: &str) -> MetadataError {
            MetadataError::FieldShape(format!(
                "Unexpected field '{}' on a transform of type '{}'",
                field, kind
            ))
        }
        fn missing(field: &str, kind: &str) -> MetadataError {
            MetadataError::FieldShape(format!(
                "A transform of type '{}' must carry a '{}' field",
                kind, field
            ))
        }

        let tform = match raw.kind.as_str() {
            "identity" => {
                if raw.scale.is_some() {
                    return Err(unexpected("scale", "identity"));
                }
                if raw.translation.is_some() {
                    return Err(unexpected("translation", "identity"));
                }
                if raw.path.is_some() {
                    return Err(unexpected("path", "identity"));
                }
                CoordinateTransform::Identity
            }
            "scale" => {
                if raw.translation.is_some() {
                    return Err(unexpected("translation", "scale"));
                }
                if raw.path.is_some() {
                    return Err(unexpected("path", "scale"));
                }
                let scale = raw.scale.ok_or_else(|| missing("scale", "scale"))?;
                CoordinateTransform::Scale { scale }
            }
            "translation" => {
                if raw.scale.is_some() {
                    return Err(unexpected("scale", "translation"));
                }
                if raw.path.is_some() {
                    return Err(unexpected("path", "translation"));
                }
                let translation = raw
                    .translation
                    .ok_or_else(|| missing("translation", "translation"))?;
                CoordinateTransform::Translation { translation }
            }
            "path" => {
                if raw.scale.is_some() {
                    return Err(unexpected("scale", "path"));
                }
                if raw.translation.is_some() {
                    return Err(unexpected("translation", "path"));
                }
                let path = raw.path.ok_or_else(|| missing("path", "path"))?;
                if path.is_empty() {
                    return Err(MetadataError::FieldShape(
                        "A transform of type 'path' must carry a non-empty path".to_string(),
                    ));
                }
                CoordinateTransform::Path { path }
            }
            other => {
                return Err(MetadataError::FieldShape(format!(
                    "Unknown transform type '{}'. Expected one of 'identity', 'scale', \
                     'translation', or 'path'",
                    other
                )))
            }
        };
        ensure_nonempty(std::slice::from_ref(&tform))?;
        Ok(tform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_shape() {
        let tform = CoordinateTransform::Scale {
            scale: vec![1.0, 2.0],
        };
        assert_eq!(
            serde_json::to_value(&tform).unwrap(),
            json!({"type": "scale", "scale": [1.0, 2.0]})
        );
        assert_eq!(
            serde_json::to_value(CoordinateTransform::Identity).unwrap(),
            json!({"type": "identity"})
        );
    }

    #[test]
    fn parse_rejects_mixed_fields() {
        let res: Result<CoordinateTransform, _> = serde_json::from_value(json!({
            "type": "scale",
            "scale": [1.0],
            "translation": [0.0],
        }));
        assert!(res.is_err());

        let res: Result<CoordinateTransform, _> = serde_json::from_value(json!({
            "type": "identity",
            "scale": [1.0],
        }));
        assert!(res.is_err());
    }

    #[test]
    fn parse_rejects_unknown_types_and_fields() {
        let res: Result<CoordinateTransform, _> =
            serde_json::from_value(json!({"type": "rotation", "rotation": [1.0]}));
        assert!(res.is_err());

        let res: Result<CoordinateTransform, _> =
            serde_json::from_value(json!({"type": "scale", "scale": [1.0], "extra": 1}));
        assert!(res.is_err());
    }

    #[test]
    fn parse_rejects_empty_vectors() {
        let res: Result<CoordinateTransform, _> =
            serde_json::from_value(json!({"type": "scale", "scale": []}));
        assert!(res.is_err());
    }

    #[test]
    fn scale_translation_checks_lengths() {
        let err = CoordinateTransform::scale_translation(vec![1.0, 1.0], vec![0.0]).unwrap_err();
        assert!(err.to_string().contains("do not match"));

        let err = CoordinateTransform::scale_translation(vec![], vec![0.0]).unwrap_err();
        assert!(err.to_string().contains("Not enough values in scale"));
    }

    #[test]
    fn scale_must_come_first() {
        let ok = [
            CoordinateTransform::Scale {
                scale: vec![1.0, 1.0],
            },
            CoordinateTransform::Translation {
                translation: vec![0.0, 0.0],
            },
        ];
        assert!(ensure_scale_first(&ok).is_ok());

        let swapped = [ok[1].clone(), ok[0].clone()];
        assert!(ensure_scale_first(&swapped).is_err());

        let no_scale = [ok[1].clone()];
        assert!(ensure_scale_first(&no_scale).is_err());

        let two_scales = [ok[0].clone(), ok[0].clone()];
        assert!(ensure_scale_first(&two_scales).is_err());

        // identity- and path-only sequences are fine
        assert!(ensure_scale_first(&[CoordinateTransform::Identity]).is_ok());
        assert!(ensure_scale_first(&[CoordinateTransform::Path {
            path: "params".to_string()
        }])
        .is_ok());

        assert!(ensure_scale_first(&[]).is_err());
    }

    #[test]
    fn dimensionality_must_agree() {
        let bad = [
            CoordinateTransform::Scale {
                scale: vec![1.0, 1.0],
            },
            CoordinateTransform::Translation {
                translation: vec![0.0, 0.0, 0.0],
            },
        ];
        let err = ensure_dimensionality(&bad).unwrap_err();
        assert!(err
            .to_string()
            .contains("The transforms have inconsistent dimensionality"));
    }

    fn scale_translation(scale: Vec<f64>, translation: Vec<f64>) -> Vec<CoordinateTransform> {
        CoordinateTransform::scale_translation(scale, translation)
            .unwrap()
            .to_vec()
    }

    #[test]
    fn compose_multiplies_scales_and_adds_translations() {
        let old = scale_translation(vec![0.0, 1.0, 2.0], vec![2.0, 3.0, 4.0]);
        let out =
            compose_transforms(&old, Some(&[2.0, 2.0, 2.0]), Some(&[1.5, 1.5, 1.5])).unwrap();
        assert_eq!(
            out,
            scale_translation(vec![0.0, 2.0, 4.0], vec![3.5, 4.5, 5.5])
        );

        // either parameter may be omitted
        assert_eq!(compose_transforms(&old, None, None).unwrap(), old);
        let out = compose_transforms(&old, Some(&[2.0, 2.0, 2.0]), None).unwrap();
        assert_eq!(out[1], old[1]);
        let out = compose_transforms(&old, None, Some(&[1.0, 1.0, 1.0])).unwrap();
        assert_eq!(out[0], old[0]);
    }

    #[test]
    fn compose_grows_a_missing_translation() {
        let old = vec![CoordinateTransform::Scale {
            scale: vec![2.0, 2.0],
        }];
        let out = compose_transforms(&old, None, Some(&[1.0, 0.5])).unwrap();
        assert_eq!(out, scale_translation(vec![2.0, 2.0], vec![1.0, 0.5]));

        let out = compose_transforms(&old, Some(&[3.0, 3.0]), None).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn compose_absorbs_identity_sequences() {
        let old = vec![CoordinateTransform::Identity];
        let out = compose_transforms(&old, Some(&[2.0, 3.0]), None).unwrap();
        assert_eq!(
            out,
            vec![CoordinateTransform::Scale {
                scale: vec![2.0, 3.0]
            }]
        );

        // a missing scale behaves as ones
        let out = compose_transforms(&old, None, Some(&[1.0, 1.0])).unwrap();
        assert_eq!(out, scale_translation(vec![1.0, 1.0], vec![1.0, 1.0]));

        assert_eq!(compose_transforms(&old, None, None).unwrap(), old);
    }

    #[test]
    fn compose_checks_parameter_lengths() {
        let old = vec![CoordinateTransform::Scale {
            scale: vec![2.0, 2.0],
        }];
        let err = compose_transforms(&old, Some(&[2.0]), None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot compose a scale of length 1 onto transforms of dimensionality 2."
        );
        let err = compose_transforms(&old, None, Some(&[0.0, 0.0, 0.0])).unwrap_err();
        assert!(err.to_string().contains("translation of length 3"));

        let path = vec![CoordinateTransform::Path {
            path: "params".to_string(),
        }];
        let err = compose_transforms(&path, Some(&[1.0]), None).unwrap_err();
        assert!(err.to_string().contains("'path'"));
    }

    #[test]
    fn transpose_permutes_every_vector() {
        let old = scale_translation(vec![1.0, 2.0, 3.0], vec![2.0, 3.0, 4.0]);
        let out = transpose_transforms(&old, &[0, 2, 1]).unwrap();
        assert_eq!(
            out,
            scale_translation(vec![1.0, 3.0, 2.0], vec![2.0, 4.0, 3.0])
        );

        // identity passes through untouched
        let out = transpose_transforms(&[CoordinateTransform::Identity], &[1, 0]).unwrap();
        assert_eq!(out, vec![CoordinateTransform::Identity]);
    }

    #[test]
    fn transpose_rejects_bad_orders() {
        let old = scale_translation(vec![1.0, 2.0], vec![0.0, 0.0]);
        let err = transpose_transforms(&old, &[0, 0]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Axis order [0, 0] contains repeated values."
        );

        let err = transpose_transforms(&old, &[0]).unwrap_err();
        assert!(err.to_string().contains("has length 1"));

        let err = transpose_transforms(&old, &[0, 2]).unwrap_err();
        assert!(err.to_string().contains("out of range"));

        let path = vec![CoordinateTransform::Path {
            path: "params".to_string(),
        }];
        assert!(transpose_transforms(&path, &[0, 1]).is_err());
    }
}
