use geo::{MultiPolygon, Point};
use std::fmt;

/// Boundary levels, finest to coarsest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Level {
    Subbarrio,
    Barrio,
    County,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Subbarrio, Level::Barrio, Level::County];

    /// Label used inside classification paths.
    pub fn label(self) -> &'static str {
        match self {
            Level::Subbarrio => "Subbarrio",
            Level::Barrio => "Barrio",
            Level::County => "County",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Level::Subbarrio => "subbarrio",
            Level::Barrio => "barrio",
            Level::County => "county",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Area {
    pub name: String,
    pub geometry: MultiPolygon<f64>,
}

#[derive(Debug, Clone)]
pub struct Property {
    pub id: String,
    pub address: Option<String>,
    // (lon, lat); None when either coordinate is absent or unusable
    pub location: Option<Point<f64>>,
    // Passthrough columns in configured order
    pub fields: Vec<(String, String)>,
}

/// Names of the polygons containing a point, one independent lookup per level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Containment {
    pub subbarrio: Option<String>,
    pub barrio: Option<String>,
    pub county: Option<String>,
}

impl Containment {
    pub fn get(&self, level: Level) -> Option<&str> {
        match level {
            Level::Subbarrio => self.subbarrio.as_deref(),
            Level::Barrio => self.barrio.as_deref(),
            Level::County => self.county.as_deref(),
        }
    }

    /// `"Subbarrio: A > Barrio: X > County: C"`, skipping levels with no match.
    pub fn classification_path(&self) -> String {
        Level::ALL
            .iter()
            .filter_map(|&level| self.get(level).map(|name| format!("{}: {}", level.label(), name)))
            .collect::<Vec<_>>()
            .join(" > ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FinalLevel {
    Subbarrio,
    Barrio,
    County,
    Unassigned,
}

impl FinalLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            FinalLevel::Subbarrio => "subbarrio",
            FinalLevel::Barrio => "barrio",
            FinalLevel::County => "county",
            FinalLevel::Unassigned => "unassigned",
        }
    }
}

impl fmt::Display for FinalLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final, occupancy-validated placement of a property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    Subbarrio(String),
    Barrio(String),
    County(String),
    Unassigned,
}

impl Assignment {
    pub fn level(&self) -> FinalLevel {
        match self {
            Assignment::Subbarrio(_) => FinalLevel::Subbarrio,
            Assignment::Barrio(_) => FinalLevel::Barrio,
            Assignment::County(_) => FinalLevel::County,
            Assignment::Unassigned => FinalLevel::Unassigned,
        }
    }

    pub fn area(&self) -> Option<&str> {
        match self {
            Assignment::Subbarrio(name) | Assignment::Barrio(name) | Assignment::County(name) => Some(name),
            Assignment::Unassigned => None,
        }
    }
}

/// A property that had coordinates, with its per-level containment.
#[derive(Debug, Clone)]
pub struct LocatedProperty {
    pub property: Property,
    pub point: Point<f64>,
    pub containment: Containment,
}

#[derive(Debug, Clone)]
pub struct ClassifiedProperty {
    pub property: Property,
    pub point: Point<f64>,
    pub containment: Containment,
    pub assignment: Assignment,
}

impl ClassifiedProperty {
    pub fn classification_path(&self) -> String {
        self.containment.classification_path()
    }
}
