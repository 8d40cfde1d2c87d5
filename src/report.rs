// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Experiment reports.
//!
//! A report echoes the settings, lists what each chamber holds, and then
//! simulates a run with the design's targets present: which chambers fire,
//! and for each assay type how many of its chambers fired. A type all of
//! whose chambers fire is called positive; if its target was not present,
//! the call is false.
//!
//! The same content is available as lines of text and as JSON.

use crate::allocation::Allocation;
use crate::design::{AssayType, Chamber, ExperimentDesign};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Positive,
    FalsePositive,
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallKind::Positive => write!(f, "POSITIVE CALL"),
            CallKind::FalsePositive => write!(f, "POSITIVE CALL (FALSE)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub chambers: usize,
    pub max_targets: usize,
    pub assay_types: String,
    pub replicas: Vec<String>,
    pub dont_mix: String,
    pub targets_present: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChamberRow {
    pub chamber: Chamber,
    pub occupants: Vec<String>,
}

/// How one assay type fared in the simulated run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Calling {
    pub assay: String,
    pub fired: usize,
    pub deployed: usize,
    pub percent: usize,
    pub call: Option<CallKind>,
}

impl fmt::Display for Calling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} out of {} chambers that contain <{}> fired. ({:03}%)",
            self.fired, self.deployed, self.assay, self.percent
        )?;
        if let Some(call) = self.call {
            write!(f, " {}", call)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub settings: Settings,
    pub chambers: Vec<ChamberRow>,
    pub firing_chambers: Vec<Chamber>,
    /// Highest percentage first.
    pub calling: Vec<Calling>,
}

pub struct ExperimentReporter<'a> {
    design: &'a ExperimentDesign,
    alloc: &'a Allocation,
}

impl<'a> ExperimentReporter<'a> {
    pub fn new(design: &'a ExperimentDesign, alloc: &'a Allocation) -> Self {
        Self { design, alloc }
    }

    pub fn report(&self) -> Report {
        let design = self.design;
        let present = design.targets_present();
        let fired = self.alloc.chambers_containing_any(present);

        let chambers = design
            .all_chambers()
            .iter()
            .map(|chamber| {
                let mut occupants: Vec<String> =
                    self.alloc.occupants(chamber).map(|a| design.label(a)).collect();
                occupants.sort();
                ChamberRow { chamber, occupants }
            })
            .collect();

        let mut calling: Vec<Calling> = design
            .assay_types_in_priority_order()
            .filter_map(|t| {
                let deployed = self.alloc.chambers_for(t);
                let count = deployed.intersection(fired).len();
                (count > 0).then(|| self.calling(t, count, deployed.len()))
            })
            .collect();
        calling.sort_by(|a, b| b.percent.cmp(&a.percent));

        Report {
            settings: Settings {
                chambers: design.num_chambers(),
                max_targets: design.max_targets(),
                assay_types: design.all_assay_types_as_single_string(),
                replicas: design.format_all_assays(),
                dont_mix: design.dontmix_as_single_string(),
                targets_present: design.format_types(present),
            },
            chambers,
            firing_chambers: fired.iter().collect(),
            calling,
        }
    }

    fn calling(&self, assay_type: AssayType, fired: usize, deployed: usize) -> Calling {
        let call = (fired == deployed).then(|| {
            if self.design.targets_present().contains(assay_type) {
                CallKind::Positive
            } else {
                CallKind::FalsePositive
            }
        });
        Calling {
            assay: self.design.name(assay_type).to_string(),
            fired,
            deployed,
            percent: 100 * fired / deployed,
            call,
        }
    }

    /// The report as text, one line per element.
    pub fn lines(&self) -> Vec<String> {
        let report = self.report();
        let mut lines = vec!["Assay Replicas To Be Allocated:".to_string()];
        lines.extend(report.settings.replicas.iter().cloned());
        lines.push(String::new());
        lines.push(format!("Chambers: {}", report.settings.chambers));
        lines.push(format!(
            "Simultaneous targets: {}",
            report.settings.max_targets
        ));
        lines.push(format!("Dont mix: {}", report.settings.dont_mix));
        lines.push(format!(
            "Simulated targets present: {}",
            report.settings.targets_present
        ));
        lines.push(String::new());
        lines.push("Allocation...".to_string());
        lines.extend(self.alloc.format_chambers(self.design));
        lines.push(String::new());
        let firing: Vec<String> = report.firing_chambers.iter().map(|c| c.to_string()).collect();
        lines.push(format!("Firing chambers: {}", firing.join(" ")).trim_end().to_string());
        lines.push(format!(
            "Only the targets: {} should get 100%",
            report.settings.targets_present
        ));
        lines.push(String::new());
        lines.extend(report.calling.iter().map(Calling::to_string));
        lines
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.report())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::{Assay, ChamberSet};

    fn fixture() -> (ExperimentDesign, Allocation) {
        let design = ExperimentDesign::builder()
            .chambers(4)
            .max_targets(1)
            .assay("A", 2)
            .assay("B", 2)
            .assay("C", 2)
            .target_present("A")
            .build()
            .unwrap();
        let mut alloc = Allocation::new(&design);
        for (i, chambers) in [[1, 2], [1, 3], [2, 4]].iter().enumerate() {
            alloc
                .reserve(AssayType::new(i), ChamberSet::from_numbers(chambers))
                .unwrap();
        }
        (design, alloc)
    }

    #[test]
    fn test_calling() {
        let (design, alloc) = fixture();
        let report = ExperimentReporter::new(&design, &alloc).report();

        assert_eq!(
            report.firing_chambers,
            vec![Chamber::new(1), Chamber::new(2)]
        );
        let lines: Vec<String> = report.calling.iter().map(|c| c.to_string()).collect();
        assert_eq!(
            lines,
            vec![
                "2 out of 2 chambers that contain <A> fired. (100%) POSITIVE CALL",
                "1 out of 2 chambers that contain <B> fired. (050%)",
                "1 out of 2 chambers that contain <C> fired. (050%)",
            ]
        );
    }

    #[test]
    fn test_false_call() {
        let (design, _) = fixture();
        // C sits only in chambers that also hold A.
        let mut alloc = Allocation::new(&design);
        alloc
            .reserve(AssayType::new(0), ChamberSet::from_numbers(&[1, 2]))
            .unwrap();
        let c = AssayType::new(2);
        alloc.place(Assay::new(c, 1), Chamber::new(1)).unwrap();
        alloc.place(Assay::new(c, 2), Chamber::new(2)).unwrap();

        let report = ExperimentReporter::new(&design, &alloc).report();
        let calling = report.calling.iter().find(|c| c.assay == "C").unwrap();
        assert_eq!(calling.call, Some(CallKind::FalsePositive));
        assert_eq!(
            calling.to_string(),
            "2 out of 2 chambers that contain <C> fired. (100%) POSITIVE CALL (FALSE)"
        );
    }

    #[test]
    fn test_lines() {
        let (design, alloc) = fixture();
        let lines = ExperimentReporter::new(&design, &alloc).lines();
        assert_eq!(lines[0], "Assay Replicas To Be Allocated:");
        assert!(lines.contains(&"Dont mix: ".to_string()));
        assert!(lines.contains(&"Simulated targets present: {A}".to_string()));
        assert!(lines.contains(&"001 A1,B1".to_string()));
        assert!(lines.contains(&"Firing chambers: 001 002".to_string()));
        assert!(lines.contains(&"Only the targets: {A} should get 100%".to_string()));
    }

    #[test]
    fn test_json() {
        let (design, alloc) = fixture();
        let json = ExperimentReporter::new(&design, &alloc).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["settings"]["chambers"], 4);
        assert_eq!(value["firing_chambers"], serde_json::json!([1, 2]));
        assert_eq!(value["chambers"][0]["occupants"], serde_json::json!(["A1", "B1"]));
        assert_eq!(value["calling"][0]["call"], "positive");
    }
}
