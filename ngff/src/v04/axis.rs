//! Axis metadata. One `Axis` names one dimension of a multiscale image and
//! optionally declares its type and physical unit. Unit and type problems
//! the NGFF spec phrases as SHOULD are reported as warnings, never errors.

use crate::error::MetadataError;
use crate::v04::VERSION;

use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Axis types distinguished by the NGFF specification. Any other `type`
/// string is treated as a custom type.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AxisType {
    Space,
    Time,
    Channel,
}

impl AxisType {
    pub fn from_name(name: &str) -> Option<AxisType> {
        match name {
            "space" => Some(AxisType::Space),
            "time" => Some(AxisType::Time),
            "channel" => Some(AxisType::Channel),
            _ => None,
        }
    }
}

impl Display for AxisType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AxisType::Space => "space",
            AxisType::Time => "time",
            AxisType::Channel => "channel",
        };
        write!(f, "{}", name)
    }
}

/// Units the NGFF specification recommends for space axes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SpaceUnit {
    Angstrom,
    Attometer,
    Centimeter,
    Decimeter,
    Exameter,
    Femtometer,
    Foot,
    Gigameter,
    Hectometer,
    Inch,
    Kilometer,
    Megameter,
    Meter,
    Micrometer,
    Mile,
    Millimeter,
    Nanometer,
    Parsec,
    Petameter,
    Picometer,
    Terameter,
    Yard,
    Yoctometer,
    Yottameter,
    Zeptometer,
    Zettameter,
}

impl SpaceUnit {
    pub fn from_name(name: &str) -> Option<SpaceUnit> {
        let unit = match name {
            "angstrom" => SpaceUnit::Angstrom,
            "attometer" => SpaceUnit::Attometer,
            "centimeter" => SpaceUnit::Centimeter,
            "decimeter" => SpaceUnit::Decimeter,
            "exameter" => SpaceUnit::Exameter,
            "femtometer" => SpaceUnit::Femtometer,
            "foot" => SpaceUnit::Foot,
            "gigameter" => SpaceUnit::Gigameter,
            "hectometer" => SpaceUnit::Hectometer,
            "inch" => SpaceUnit::Inch,
            "kilometer" => SpaceUnit::Kilometer,
            "megameter" => SpaceUnit::Megameter,
            "meter" => SpaceUnit::Meter,
            "micrometer" => SpaceUnit::Micrometer,
            "mile" => SpaceUnit::Mile,
            "millimeter" => SpaceUnit::Millimeter,
            "nanometer" => SpaceUnit::Nanometer,
            "parsec" => SpaceUnit::Parsec,
            "petameter" => SpaceUnit::Petameter,
            "picometer" => SpaceUnit::Picometer,
            "terameter" => SpaceUnit::Terameter,
            "yard" => SpaceUnit::Yard,
            "yoctometer" => SpaceUnit::Yoctometer,
            "yottameter" => SpaceUnit::Yottameter,
            "zeptometer" => SpaceUnit::Zeptometer,
            "zettameter" => SpaceUnit::Zettameter,
            _ => return None,
        };
        Some(unit)
    }
}

impl Display for SpaceUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SpaceUnit::Angstrom => "angstrom",
            SpaceUnit::Attometer => "attometer",
            SpaceUnit::Centimeter => "centimeter",
            SpaceUnit::Decimeter => "decimeter",
            SpaceUnit::Exameter => "exameter",
            SpaceUnit::Femtometer => "femtometer",
            SpaceUnit::Foot => "foot",
            SpaceUnit::Gigameter => "gigameter",
            SpaceUnit::Hectometer => "hectometer",
            SpaceUnit::Inch => "inch",
            SpaceUnit::Kilometer => "kilometer",
            SpaceUnit::Megameter => "megameter",
            SpaceUnit::Meter => "meter",
            SpaceUnit::Micrometer => "micrometer",
            SpaceUnit::Mile => "mile",
            SpaceUnit::Millimeter => "millimeter",
            SpaceUnit::Nanometer => "nanometer",
            SpaceUnit::Parsec => "parsec",
            SpaceUnit::Petameter => "petameter",
            SpaceUnit::Picometer => "picometer",
            SpaceUnit::Terameter => "terameter",
            SpaceUnit::Yard => "yard",
            SpaceUnit::Yoctometer => "yoctometer",
            SpaceUnit::Yottameter => "yottameter",
            SpaceUnit::Zeptometer => "zeptometer",
            SpaceUnit::Zettameter => "zettameter",
        };
        write!(f, "{}", name)
    }
}

/// Units the NGFF specification recommends for time axes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TimeUnit {
    Attosecond,
    Centisecond,
    Day,
    Decisecond,
    Exasecond,
    Femtosecond,
    Gigasecond,
    Hectosecond,
    Hour,
    Kilosecond,
    Megasecond,
    Microsecond,
    Millisecond,
    Minute,
    Nanosecond,
    Petasecond,
    Picosecond,
    Second,
    Terasecond,
    Yoctosecond,
    Yottasecond,
    Zeptosecond,
    Zettasecond,
}

impl TimeUnit {
    pub fn from_name(name: &str) -> Option<TimeUnit> {
        let unit = match name {
            "attosecond" => TimeUnit::Attosecond,
            "centisecond" => TimeUnit::Centisecond,
            "day" => TimeUnit::Day,
            "decisecond" => TimeUnit::Decisecond,
            "exasecond" => TimeUnit::Exasecond,
            "femtosecond" => TimeUnit::Femtosecond,
            "gigasecond" => TimeUnit::Gigasecond,
            "hectosecond" => TimeUnit::Hectosecond,
            "hour" => TimeUnit::Hour,
            "kilosecond" => TimeUnit::Kilosecond,
            "megasecond" => TimeUnit::Megasecond,
            "microsecond" => TimeUnit::Microsecond,
            "millisecond" => TimeUnit::Millisecond,
            "minute" => TimeUnit::Minute,
            "nanosecond" => TimeUnit::Nanosecond,
            "petasecond" => TimeUnit::Petasecond,
            "picosecond" => TimeUnit::Picosecond,
            "second" => TimeUnit::Second,
            "terasecond" => TimeUnit::Terasecond,
            "yoctosecond" => TimeUnit::Yoctosecond,
            "yottasecond" => TimeUnit::Yottasecond,
            "zeptosecond" => TimeUnit::Zeptosecond,
            "zettasecond" => TimeUnit::Zettasecond,
            _ => return None,
        };
        Some(unit)
    }
}

impl Display for TimeUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TimeUnit::Attosecond => "attosecond",
            TimeUnit::Centisecond => "centisecond",
            TimeUnit::Day => "day",
            TimeUnit::Decisecond => "decisecond",
            TimeUnit::Exasecond => "exasecond",
            TimeUnit::Femtosecond => "femtosecond",
            TimeUnit::Gigasecond => "gigasecond",
            TimeUnit::Hectosecond => "hectosecond",
            TimeUnit::Hour => "hour",
            TimeUnit::Kilosecond => "kilosecond",
            TimeUnit::Megasecond => "megasecond",
            TimeUnit::Microsecond => "microsecond",
            TimeUnit::Millisecond => "millisecond",
            TimeUnit::Minute => "minute",
            TimeUnit::Nanosecond => "nanosecond",
            TimeUnit::Petasecond => "petasecond",
            TimeUnit::Picosecond => "picosecond",
            TimeUnit::Second => "second",
            TimeUnit::Terasecond => "terasecond",
            TimeUnit::Yoctosecond => "yoctosecond",
            TimeUnit::Yottasecond => "yottasecond",
            TimeUnit::Zeptosecond => "zeptosecond",
            TimeUnit::Zettasecond => "zettasecond",
        };
        write!(f, "{}", name)
    }
}

/// Metadata for one dimension of a multiscale image.
///
/// `type` and `unit` are optional on the wire and omitted when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAxis")]
pub struct Axis {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAxis {
    name: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    unit: Option<String>,
}

impl TryFrom<RawAxis> for Axis {
    type Error = MetadataError;

    fn try_from(raw: RawAxis) -> Result<Self, Self::Error> {
        Axis::new(raw.name, raw.kind.as_deref(), raw.unit.as_deref())
    }
}

impl Axis {
    /// Construct an axis, warning about SHOULD-violations.
    pub fn new(
        name: impl Into<String>,
        kind: Option<&str>,
        unit: Option<&str>,
    ) -> Result<Self, MetadataError> {
        let axis = Axis {
            name: name.into(),
            kind: kind.map(str::to_string),
            unit: unit.map(str::to_string),
        };
        if axis.name.is_empty() {
            return Err(MetadataError::FieldShape(
                "Axis names must be non-empty strings".to_string(),
            ));
        }
        check_type_unit(&axis);
        Ok(axis)
    }

    /// A space axis with a recognized unit.
    pub fn space(name: impl Into<String>, unit: SpaceUnit) -> Result<Self, MetadataError> {
        Axis::new(name, Some("space"), Some(&unit.to_string()))
    }

    /// A time axis with a recognized unit.
    pub fn time(name: impl Into<String>, unit: TimeUnit) -> Result<Self, MetadataError> {
        Axis::new(name, Some("time"), Some(&unit.to_string()))
    }

    /// A channel axis. Channel axes carry no unit.
    pub fn channel(name: impl Into<String>) -> Result<Self, MetadataError> {
        Axis::new(name, Some("channel"), None)
    }

    /// The recognized axis type, when the `type` field names one.
    pub fn axis_type(&self) -> Option<AxisType> {
        self.kind.as_deref().and_then(AxisType::from_name)
    }
}

/// Warn when an axis goes against a SHOULD statement of the NGFF spec:
/// unrecognized units for space or time axes, missing types, missing units.
fn check_type_unit(axis: &Axis) {
    let unit = axis.unit.as_deref();
    match axis.kind.as_deref() {
        Some(kind) => match AxisType::from_name(kind) {
            Some(AxisType::Space) => {
                if let Some(u) = unit {
                    if SpaceUnit::from_name(u).is_none() {
                        warn!(
                            "Unit '{}' is not recognized as a standard unit for an axis with type 'space'.",
                            u
                        );
                    }
                }
            }
            Some(AxisType::Time) => {
                if let Some(u) = unit {
                    if TimeUnit::from_name(u).is_none() {
                        warn!(
                            "Unit '{}' is not recognized as a standard unit for an axis with type 'time'.",
                            u
                        );
                    }
                }
            }
            Some(AxisType::Channel) => {}
            None => {
                warn!(
                    "Unknown axis type '{}'. Version {} of the OME-NGFF spec states that the \
                     'type' field of an axis should be one of 'space', 'time', or 'channel'.",
                    kind, VERSION
                );
            }
        },
        None => {
            warn!(
                "The 'type' field of axis '{}' is unset. Version {} of the OME-NGFF spec states \
                 that the 'type' field of an axis should be set to a string.",
                axis.name, VERSION
            );
        }
    }
    if unit.is_none() {
        warn!(
            "The 'unit' field of axis '{}' is unset. Version {} of the OME-NGFF spec states \
             that the 'unit' field of an axis should be set to a string.",
            axis.name, VERSION
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_fields_are_omitted() {
        let ax = Axis::new("foo", None, None).unwrap();
        assert_eq!(serde_json::to_value(&ax).unwrap(), json!({"name": "foo"}));

        let ax = Axis::space("x", SpaceUnit::Meter).unwrap();
        assert_eq!(
            serde_json::to_value(&ax).unwrap(),
            json!({"name": "x", "type": "space", "unit": "meter"})
        );
    }

    #[test]
    fn empty_names_are_rejected() {
        assert!(matches!(
            Axis::new("", Some("space"), None),
            Err(MetadataError::FieldShape(_))
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let res: Result<Axis, _> =
            serde_json::from_value(json!({"name": "x", "scale": [1.0, 1.0]}));
        assert!(res.is_err());
    }

    #[test]
    fn axis_types_parse_from_names() {
        assert_eq!(AxisType::from_name("space"), Some(AxisType::Space));
        assert_eq!(AxisType::from_name("time"), Some(AxisType::Time));
        assert_eq!(AxisType::from_name("channel"), Some(AxisType::Channel));
        assert_eq!(AxisType::from_name("frequency"), None);
        assert_eq!(AxisType::Channel.to_string(), "channel");

        assert_eq!(
            Axis::time("t", TimeUnit::Second).unwrap().axis_type(),
            Some(AxisType::Time)
        );
        // custom types are allowed but carry no recognized axis type
        let custom = Axis::new("f", Some("frequency"), None).unwrap();
        assert_eq!(custom.axis_type(), None);
    }

    #[test]
    fn unit_names_round_trip() {
        assert_eq!(SpaceUnit::from_name("micrometer"), Some(SpaceUnit::Micrometer));
        assert_eq!(SpaceUnit::from_name("lightyear"), None);
        assert_eq!(TimeUnit::from_name("millisecond"), Some(TimeUnit::Millisecond));
        assert_eq!(TimeUnit::from_name("fortnight"), None);
        assert_eq!(SpaceUnit::Micrometer.to_string(), "micrometer");
        assert_eq!(TimeUnit::Second.to_string(), "second");
    }
}
