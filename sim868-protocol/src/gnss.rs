use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Fields of a `+CGNSINF` report, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GnssField {
    RunStatus,
    FixStatus,
    UtcDatetime,
    Latitude,
    Longitude,
    MslAltitude,
    SpeedOverGround,
    CourseOverGround,
    FixMode,
    Reserved1,
    Hdop,
    Pdop,
    Vdop,
    Reserved2,
    SatellitesInView,
    GnssSatellitesUsed,
    GlonassSatellitesUsed,
    Reserved3,
    CnoMax,
    Hpa,
    Vpa,
}

impl GnssField {
    pub const COUNT: usize = 21;

    pub const ALL: [GnssField; Self::COUNT] = [
        Self::RunStatus,
        Self::FixStatus,
        Self::UtcDatetime,
        Self::Latitude,
        Self::Longitude,
        Self::MslAltitude,
        Self::SpeedOverGround,
        Self::CourseOverGround,
        Self::FixMode,
        Self::Reserved1,
        Self::Hdop,
        Self::Pdop,
        Self::Vdop,
        Self::Reserved2,
        Self::SatellitesInView,
        Self::GnssSatellitesUsed,
        Self::GlonassSatellitesUsed,
        Self::Reserved3,
        Self::CnoMax,
        Self::Hpa,
        Self::Vpa,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::RunStatus => "gnss_run_status",
            Self::FixStatus => "fix_status",
            Self::UtcDatetime => "utc_datetime",
            Self::Latitude => "latitude",
            Self::Longitude => "longitude",
            Self::MslAltitude => "msl_altitude",
            Self::SpeedOverGround => "speed_over_ground",
            Self::CourseOverGround => "course_over_ground",
            Self::FixMode => "fix_mode",
            Self::Reserved1 => "reserved1",
            Self::Hdop => "hdop",
            Self::Pdop => "pdop",
            Self::Vdop => "vdop",
            Self::Reserved2 => "reserved2",
            Self::SatellitesInView => "gnss_satellites_in_view",
            Self::GnssSatellitesUsed => "gnss_satellites_used",
            Self::GlonassSatellitesUsed => "glonass_satellites_used",
            Self::Reserved3 => "reserved3",
            Self::CnoMax => "c/n0_max",
            Self::Hpa => "hpa",
            Self::Vpa => "vpa",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for GnssField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A numeric GNSS value. Integers stay integers; anything with a fraction is a float.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    /// Integer first, then float. `None` if the text is neither.
    pub fn parse(text: &str) -> Option<Self> {
        text.parse::<i64>()
            .map(Self::Int)
            .or_else(|_| text.parse::<f64>().map(Self::Float))
            .ok()
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::Float(v) => v,
        }
    }

    pub fn as_i64(self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(v),
            Self::Float(_) => None,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Int(v) => serializer.serialize_i64(*v),
            Self::Float(v) => serializer.serialize_f64(*v),
        }
    }
}

/// One GNSS reading. Every field is present in the same order; missing ones are `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GnssFix {
    values: [Option<Number>; GnssField::COUNT],
}

impl GnssFix {
    pub fn new(values: [Option<Number>; GnssField::COUNT]) -> Self {
        Self { values }
    }

    pub fn get(&self, field: GnssField) -> Option<Number> {
        self.values[field.index()]
    }

    pub(crate) fn set(&mut self, field: GnssField, value: Option<Number>) {
        self.values[field.index()] = value;
    }

    /// Fields with their values, in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (GnssField, Option<Number>)> + '_ {
        GnssField::ALL.iter().map(|&field| (field, self.get(field)))
    }

    pub fn is_running(&self) -> bool {
        self.get(GnssField::RunStatus).and_then(Number::as_i64) == Some(1)
    }

    pub fn has_fix(&self) -> bool {
        self.get(GnssField::FixStatus).and_then(Number::as_i64) == Some(1)
    }

    /// Decimal degrees, negative south.
    pub fn latitude(&self) -> Option<f64> {
        self.get(GnssField::Latitude).map(Number::as_f64)
    }

    /// Decimal degrees, negative west.
    pub fn longitude(&self) -> Option<f64> {
        self.get(GnssField::Longitude).map(Number::as_f64)
    }

    /// Meters above mean sea level.
    pub fn altitude(&self) -> Option<f64> {
        self.get(GnssField::MslAltitude).map(Number::as_f64)
    }

    /// Km/h.
    pub fn speed(&self) -> Option<f64> {
        self.get(GnssField::SpeedOverGround).map(Number::as_f64)
    }

    /// Degrees.
    pub fn course(&self) -> Option<f64> {
        self.get(GnssField::CourseOverGround).map(Number::as_f64)
    }

    pub fn hdop(&self) -> Option<f64> {
        self.get(GnssField::Hdop).map(Number::as_f64)
    }

    pub fn satellites_in_view(&self) -> Option<i64> {
        self.get(GnssField::SatellitesInView).and_then(Number::as_i64)
    }
}

impl Serialize for GnssFix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(GnssField::COUNT))?;
        for (field, value) in self.iter() {
            map.serialize_entry(field.name(), &value)?;
        }
        map.end()
    }
}
