use anyhow::Result;
use beamline_common::{ParameterRecord, Session, ValidityReport};
use log::{error, info};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

// One row per record, flat enough for CSV
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecordRow {
    pub section: String,
    pub owner: String,
    pub name: String,
    pub value: String,
    pub errors: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct SessionReport {
    #[serde(flatten)]
    pub validity: ValidityReport,
    pub kin_energy_mev: f64,
    pub records: Vec<RecordRow>,
}

impl SessionReport {
    pub fn collect(session: &Session) -> Self {
        let mut records = Vec::new();

        for (_, record) in session.inputs.records() {
            records.push(row("inputs", "", record));
        }
        for record in &session.distribution.parameters {
            records.push(row("distribution", &session.distribution.selected, record));
        }
        for (index, element) in session.lattice.elements.iter().enumerate() {
            let owner = format!("{}[{}]", element.type_name, index);
            for record in &element.parameters {
                records.push(row("lattice", &owner, record));
            }
        }
        for group in &session.space_charge.grid {
            records.push(row("space_charge", "", &group.n_cell));
            records.push(row("space_charge", "", &group.blocking_factor));
        }
        for (index, field) in session.space_charge.prob_relative.fields().iter().enumerate() {
            records.push(RecordRow {
                section: "space_charge".into(),
                owner: String::new(),
                name: format!("prob_relative[{}]", index),
                value: field.raw.clone(),
                errors: field.errors.join("; "),
            });
        }

        SessionReport { validity: session.validity(), kin_energy_mev: session.inputs.kin_energy_mev(), records }
    }
}

fn row(section: &str, owner: &str, record: &ParameterRecord) -> RecordRow {
    RecordRow {
        section: section.to_string(),
        owner: owner.to_string(),
        name: record.name.clone(),
        value: record.value.to_string(),
        errors: record.error_text(),
    }
}

/// Writes the report in the requested format ("json" or "csv").
pub fn write_report(report: &SessionReport, path: &Path, format: &str) -> Result<()> {
    match format {
        "json" => write_json(report, path),
        "csv" => {
            let mut writer = csv::Writer::from_path(path)
                .map_err(|e| anyhow::anyhow!("Error creating report file '{}': {}", path.display(), e))?;
            for record in &report.records {
                writer.serialize(record)?;
            }
            writer.flush()?;
            info!("Record report saved to {} ({} rows)", path.display(), report.records.len());
            Ok(())
        }
        _ => {
            error!("Unknown report format: {}. Using JSON instead.", format);
            write_json(report, path)
        }
    }
}

fn write_json(report: &SessionReport, path: &Path) -> Result<()> {
    let json_string = serde_json::to_string_pretty(report)?;
    let mut file = File::create(path)
        .map_err(|e| anyhow::anyhow!("Error creating report file '{}': {}", path.display(), e))?;
    file.write_all(json_string.as_bytes())?;
    info!("Validity report saved to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use beamline_common::Event;

    #[test]
    fn test_rows_cover_every_section() {
        let mut session = Session::new();
        session.apply(Event::AddElement("Drift".into())).unwrap();
        let report = SessionReport::collect(&session);
        assert!(report.records.iter().any(|r| r.section == "inputs" && r.name == "npart"));
        assert!(report.records.iter().any(|r| r.owner == "Drift[0]" && r.errors == "Must be a float"));
        assert!(report.records.iter().any(|r| r.name == "prob_relative[0]" && r.value == "1.1"));
        assert!(!report.validity.can_run);
    }

    #[test]
    fn test_csv_and_json_output() {
        let dir = tempfile::tempdir().unwrap();
        let report = SessionReport::collect(&Session::new());

        let csv_path = dir.path().join("report.csv");
        write_report(&report, &csv_path, "csv").unwrap();
        let text = std::fs::read_to_string(&csv_path).unwrap();
        assert!(text.starts_with("section,owner,name,value,errors"));

        let json_path = dir.path().join("report.json");
        write_report(&report, &json_path, "yaml").unwrap();
        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(value["can_run"], false);
        assert_eq!(value["errors"][0], "beta_x: Must be a float");
    }
}
