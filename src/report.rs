use crate::classify::{Classification, Summary};
use crate::config::ColumnConfig;
use crate::types::{ClassifiedProperty, FinalLevel};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tracing::info;

const SECTIONS: [(FinalLevel, &str); 3] = [
    (FinalLevel::Subbarrio, "Properties in Subbarrios"),
    (FinalLevel::Barrio, "Properties in Barrios (not in any Subbarrio or in Subbarrios with <{min} properties)"),
    (FinalLevel::County, "Properties in Counties (not in any valid Barrio or Subbarrio)"),
];

/// Markdown report grouping properties by their final area.
pub fn render_report(classification: &Classification) -> String {
    let min = classification.min_properties;
    let mut out = String::new();

    out.push_str("# Properties Clustered by Geographic Boundaries\n\n");
    out.push_str(&format!(
        "(Minimum {} properties per subbarrio/barrio, otherwise moved to higher level)\n\n",
        min
    ));

    for (level, heading) in SECTIONS {
        out.push_str(&format!("## {}\n\n", heading.replace("{min}", &min.to_string())));

        // Groups sorted by area name, members in input order
        let mut groups: BTreeMap<&str, Vec<&ClassifiedProperty>> = BTreeMap::new();
        for record in classification.by_level(level) {
            if let Some(area) = record.assignment.area() {
                groups.entry(area).or_default().push(record);
            }
        }

        for (area, members) in groups {
            out.push_str(&format!("### {} ({} properties)\n\n", area, members.len()));
            for record in members {
                push_entry(&mut out, record);
            }
            out.push('\n');
        }
    }

    let unclassified: Vec<&ClassifiedProperty> = classification.by_level(FinalLevel::Unassigned).collect();
    if !unclassified.is_empty() {
        out.push_str("## Unclassified Properties\n\n");
        for record in unclassified {
            push_entry(&mut out, record);
        }
    }

    out
}

fn push_entry(out: &mut String, record: &ClassifiedProperty) {
    out.push_str(&format!("- {} | {}\n", record.property.id, record.classification_path()));
    out.push_str(&format!(
        "  Address: {}\n",
        record.property.address.as_deref().unwrap_or("No address")
    ));
}

pub fn write_report(path: &Path, classification: &Classification) -> Result<()> {
    fs::write(path, render_report(classification))
        .with_context(|| format!("Failed to write report: {:?}", path))?;
    info!(path = ?path, "wrote cluster report");
    Ok(())
}

/// One row per classified property: input columns, the three containment results,
/// the final placement and the path, then coordinates.
pub fn write_classifications<W: Write>(
    writer: W,
    classification: &Classification,
    columns: &ColumnConfig,
) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    let field_names: Vec<&str> = classification.records.first()
        .map(|r| r.property.fields.iter().map(|(name, _)| name.as_str()).collect())
        .unwrap_or_default();

    let mut header: Vec<&str> = vec![columns.id.as_str(), columns.address.as_str()];
    header.extend(field_names.iter().copied());
    header.extend([
        "initial_subbarrio",
        "initial_barrio",
        "initial_county",
        "final_level",
        "final_area",
        "classification_path",
        columns.latitude.as_str(),
        columns.longitude.as_str(),
    ]);
    wtr.write_record(&header)?;

    for record in &classification.records {
        let c = &record.containment;
        let mut row: Vec<String> = vec![
            record.property.id.clone(),
            record.property.address.clone().unwrap_or_default(),
        ];
        row.extend(record.property.fields.iter().map(|(_, value)| value.clone()));
        row.extend([
            c.subbarrio.clone().unwrap_or_default(),
            c.barrio.clone().unwrap_or_default(),
            c.county.clone().unwrap_or_default(),
            record.assignment.level().to_string(),
            record.assignment.area().unwrap_or_default().to_string(),
            record.classification_path(),
            record.point.y().to_string(),
            record.point.x().to_string(),
        ]);
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn write_classifications_csv(path: &Path, classification: &Classification, columns: &ColumnConfig) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create CSV file: {:?}", path))?;
    write_classifications(file, classification, columns)
        .with_context(|| format!("Failed to write classifications: {:?}", path))?;
    info!(path = ?path, rows = classification.records.len(), "wrote classification CSV");
    Ok(())
}

pub fn print_summary(summary: &Summary) {
    println!("Total properties analyzed: {}", summary.total);
    println!("- In subbarrios: {}", summary.subbarrio);
    println!("- In barrios only: {}", summary.barrio);
    println!("- In counties only: {}", summary.county);
    println!("- Unclassified: {}", summary.unassigned);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{classify, DEFAULT_MIN_PROPERTIES};
    use crate::types::{Containment, LocatedProperty, Property};
    use geo::Point;

    fn located(id: &str, address: Option<&str>, s: Option<&str>, b: Option<&str>, c: Option<&str>) -> LocatedProperty {
        LocatedProperty {
            property: Property {
                id: id.to_string(),
                address: address.map(String::from),
                location: Some(Point::new(-66.5, 18.2)),
                fields: vec![("Catastro".to_string(), format!("cat-{}", id))],
            },
            point: Point::new(-66.5, 18.2),
            containment: Containment {
                subbarrio: s.map(String::from),
                barrio: b.map(String::from),
                county: c.map(String::from),
            },
        }
    }

    fn sample() -> Classification {
        classify(
            vec![
                located("P-2", Some("Calle 2"), Some("Pueblo"), Some("Pueblo barrio"), Some("Arecibo")),
                located("P-1", None, Some("Pueblo"), Some("Pueblo barrio"), Some("Arecibo")),
                located("P-3", Some("Calle 3"), None, None, Some("Ponce")),
                located("P-4", None, None, None, None),
            ],
            DEFAULT_MIN_PROPERTIES,
        )
    }

    #[test]
    fn report_groups_by_final_area() {
        let report = render_report(&sample());

        assert!(report.starts_with("# Properties Clustered by Geographic Boundaries"));
        assert!(report.contains("### Pueblo (2 properties)"));
        assert!(report.contains("### Ponce (1 properties)"));
        assert!(report.contains("- P-3 | County: Ponce\n  Address: Calle 3"));
        assert!(report.contains("- P-1 | Subbarrio: Pueblo > Barrio: Pueblo barrio > County: Arecibo\n  Address: No address"));
        assert!(report.contains("Subbarrios with <2 properties"));

        // Members keep input order within their group
        let p2 = report.find("- P-2").unwrap();
        let p1 = report.find("- P-1").unwrap();
        assert!(p2 < p1);
    }

    #[test]
    fn report_layout_is_exact() {
        let single = classify(vec![located("P-3", Some("Calle 3"), None, None, Some("Ponce"))], DEFAULT_MIN_PROPERTIES);
        assert_eq!(
            render_report(&single),
            "# Properties Clustered by Geographic Boundaries\n\n\
(Minimum 2 properties per subbarrio/barrio, otherwise moved to higher level)\n\n\
## Properties in Subbarrios\n\n\
## Properties in Barrios (not in any Subbarrio or in Subbarrios with <2 properties)\n\n\
## Properties in Counties (not in any valid Barrio or Subbarrio)\n\n\
### Ponce (1 properties)\n\n\
- P-3 | County: Ponce\n\
  Address: Calle 3\n\n"
        );
    }

    #[test]
    fn unclassified_section_only_when_needed() {
        let report = render_report(&sample());
        assert!(report.contains("## Unclassified Properties\n\n- P-4 | \n"));

        let all_placed = classify(vec![located("P-3", None, None, None, Some("Ponce"))], DEFAULT_MIN_PROPERTIES);
        assert!(!render_report(&all_placed).contains("Unclassified"));
    }

    #[test]
    fn csv_has_classification_columns() {
        let mut buf = Vec::new();
        write_classifications(&mut buf, &sample(), &ColumnConfig::default()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();

        assert_eq!(
            lines.next().unwrap(),
            "Número Control,Dirección Física,Catastro,initial_subbarrio,initial_barrio,initial_county,\
final_level,final_area,classification_path,crim.latitude,crim.longitude"
        );
        assert_eq!(
            lines.next().unwrap(),
            "P-2,Calle 2,cat-P-2,Pueblo,Pueblo barrio,Arecibo,subbarrio,Pueblo,\
Subbarrio: Pueblo > Barrio: Pueblo barrio > County: Arecibo,18.2,-66.5"
        );
        assert_eq!(lines.nth(2).unwrap(), "P-4,,cat-P-4,,,,unassigned,,,18.2,-66.5");
    }

    #[test]
    fn summary_counts_match_report() {
        let summary = sample().summary();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.subbarrio, 2);
        assert_eq!(summary.county, 1);
        assert_eq!(summary.unassigned, 1);
    }
}
