use crate::types::{Assignment, ClassifiedProperty, FinalLevel, Level, LocatedProperty};
use std::collections::HashMap;
use tracing::{debug, info};

pub const DEFAULT_MIN_PROPERTIES: usize = 2;

/// How many located properties each area of one level initially contains.
#[derive(Debug, Clone, Default)]
pub struct AreaCounts {
    counts: HashMap<String, usize>,
}

impl AreaCounts {
    pub fn tally(located: &[LocatedProperty], level: Level) -> Self {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for record in located {
            if let Some(name) = record.containment.get(level) {
                *counts.entry(name.to_string()).or_default() += 1;
            }
        }
        AreaCounts { counts }
    }

    pub fn get(&self, name: &str) -> usize {
        self.counts.get(name).copied().unwrap_or(0)
    }

    pub fn is_valid(&self, name: &str, min_properties: usize) -> bool {
        self.get(name) >= min_properties
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub records: Vec<ClassifiedProperty>,
    pub subbarrio_counts: AreaCounts,
    pub barrio_counts: AreaCounts,
    pub min_properties: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub subbarrio: usize,
    pub barrio: usize,
    pub county: usize,
    pub unassigned: usize,
}

impl Classification {
    pub fn summary(&self) -> Summary {
        let mut summary = Summary { total: self.records.len(), ..Summary::default() };
        for record in &self.records {
            match record.assignment.level() {
                FinalLevel::Subbarrio => summary.subbarrio += 1,
                FinalLevel::Barrio => summary.barrio += 1,
                FinalLevel::County => summary.county += 1,
                FinalLevel::Unassigned => summary.unassigned += 1,
            }
        }
        summary
    }

    pub fn by_level(&self, level: FinalLevel) -> impl Iterator<Item = &ClassifiedProperty> {
        self.records.iter().filter(move |r| r.assignment.level() == level)
    }
}

/// Two passes: tally subbarrio and barrio occupancy over every located property,
/// then place each property at the finest level whose area meets `min_properties`.
///
/// Both tallies are taken before any placement, so a property demoted from its
/// subbarrio still counts toward that subbarrio (and its barrio) for everyone else.
/// Counties have no occupancy threshold.
pub fn classify(located: Vec<LocatedProperty>, min_properties: usize) -> Classification {
    let subbarrio_counts = AreaCounts::tally(&located, Level::Subbarrio);
    let barrio_counts = AreaCounts::tally(&located, Level::Barrio);

    debug!(
        subbarrios = subbarrio_counts.len(),
        barrios = barrio_counts.len(),
        min_properties,
        "tallied area occupancy"
    );

    let records: Vec<ClassifiedProperty> = located
        .into_iter()
        .map(|record| {
            let assignment = assign(&record, &subbarrio_counts, &barrio_counts, min_properties);
            ClassifiedProperty {
                property: record.property,
                point: record.point,
                containment: record.containment,
                assignment,
            }
        })
        .collect();

    let classification = Classification {
        records,
        subbarrio_counts,
        barrio_counts,
        min_properties,
    };

    let summary = classification.summary();
    info!(
        total = summary.total,
        subbarrio = summary.subbarrio,
        barrio = summary.barrio,
        county = summary.county,
        unassigned = summary.unassigned,
        "classified properties"
    );

    classification
}

fn assign(
    record: &LocatedProperty,
    subbarrio_counts: &AreaCounts,
    barrio_counts: &AreaCounts,
    min_properties: usize,
) -> Assignment {
    let c = &record.containment;

    if let Some(name) = c.subbarrio.as_deref().filter(|n| subbarrio_counts.is_valid(n, min_properties)) {
        return Assignment::Subbarrio(name.to_string());
    }
    if let Some(name) = c.barrio.as_deref().filter(|n| barrio_counts.is_valid(n, min_properties)) {
        return Assignment::Barrio(name.to_string());
    }
    match &c.county {
        Some(name) => Assignment::County(name.clone()),
        None => Assignment::Unassigned,
    }
}
