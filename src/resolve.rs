use crate::types::{Area, Containment, Level, LocatedProperty, Property};
use geo::algorithm::contains::Contains;
use geo::bounding_rect::BoundingRect;
use geo::Point;
use rayon::prelude::*;
use rstar::{RTree, RTreeObject, AABB};
use tracing::info;

// Bounding box of one area, pointing back into the layer's ordered Vec
#[derive(Debug)]
struct AreaEnvelope {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for AreaEnvelope {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// Ordered, immutable set of named polygons for one level.
#[derive(Debug)]
pub struct PolygonLayer {
    level: Level,
    areas: Vec<Area>,
    tree: RTree<AreaEnvelope>,
}

impl PolygonLayer {
    pub fn new(level: Level, areas: Vec<Area>) -> Self {
        // Empty geometries have no bounding box and can never contain a point
        let envelopes: Vec<AreaEnvelope> = areas
            .iter()
            .enumerate()
            .filter_map(|(index, area)| {
                let rect = area.geometry.bounding_rect()?;
                Some(AreaEnvelope {
                    index,
                    aabb: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
                })
            })
            .collect();

        PolygonLayer {
            level,
            areas,
            tree: RTree::bulk_load(envelopes),
        }
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    /// First area, in layer order, whose geometry contains `point`.
    ///
    /// The R-tree only narrows candidates. Overlapping areas resolve to the lowest
    /// index, exactly as a front-to-back scan of the layer would.
    pub fn locate(&self, point: &Point<f64>) -> Option<&Area> {
        let envelope = AABB::from_point([point.x(), point.y()]);

        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|candidate| candidate.index)
            .filter(|&index| self.areas[index].geometry.contains(point))
            .min()
            .map(|index| &self.areas[index])
    }
}

/// The three boundary layers, queried independently of one another.
pub struct Layers {
    pub subbarrio: PolygonLayer,
    pub barrio: PolygonLayer,
    pub county: PolygonLayer,
}

impl Layers {
    pub fn get(&self, level: Level) -> &PolygonLayer {
        match level {
            Level::Subbarrio => &self.subbarrio,
            Level::Barrio => &self.barrio,
            Level::County => &self.county,
        }
    }

    /// One lookup per level against the full layer. A barrio match is not restricted
    /// to the subbarrio match (or vice versa).
    pub fn contain(&self, point: &Point<f64>) -> Containment {
        let name = |level: Level| self.get(level).locate(point).map(|area| area.name.clone());
        Containment {
            subbarrio: name(Level::Subbarrio),
            barrio: name(Level::Barrio),
            county: name(Level::County),
        }
    }
}

/// Resolves every property that has a location. Properties without one are dropped.
/// Output keeps input order.
pub fn resolve(properties: Vec<Property>, layers: &Layers) -> Vec<LocatedProperty> {
    let total = properties.len();

    let located: Vec<LocatedProperty> = properties
        .into_par_iter()
        .filter_map(|property| {
            let point = property.location?;
            let containment = layers.contain(&point);
            Some(LocatedProperty { property, point, containment })
        })
        .collect();

    info!(
        total,
        located = located.len(),
        missing_coordinates = total - located.len(),
        "resolved property containment"
    );

    located
}
