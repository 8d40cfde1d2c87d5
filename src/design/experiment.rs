// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! The experiment mandate.
//!
//! An `ExperimentDesign` says which assay types must be deployed, how many
//! replicas each needs, how many chambers are available, which pairs must
//! never share a chamber, and the simultaneous-targets bound the allocation
//! must hold up against. It is built once, validated, and never changes.
//!
//! Assay types are held in priority order (names ascending), which is the
//! order every allocator places them in.

use super::assay::{letter_name, Assay, AssayType, TypeSet, MAX_ASSAY_TYPES};
use super::chamber_set::{ChamberSet, MAX_CHAMBERS};
use crate::error::{ConfigError, DesignError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Validated, immutable experiment mandate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentDesign {
    /// Assay names in priority order; the index is the `AssayType`.
    names: Vec<String>,
    /// Replica count by type index.
    replicas: Vec<usize>,
    num_chambers: usize,
    max_targets: usize,
    dont_mix: Vec<(AssayType, AssayType)>,
    /// Don't-mix partners by type index.
    partners: Vec<TypeSet>,
    targets_present: TypeSet,
}

impl ExperimentDesign {
    pub fn builder() -> DesignBuilder {
        DesignBuilder::default()
    }

    /// Build a design from numeric parameters, naming the assays A, B, C...
    ///
    /// The i-th don't-mix pair joins the last and first assays still unpaired
    /// in priority order, so 14 assays with 2 pairs give {N,A} and {M,B}. The
    /// simulated targets present are the first `targets_present` assays.
    pub fn from_params(params: &DesignParams) -> Result<Self, DesignError> {
        if params.assays > MAX_ASSAY_TYPES {
            return Err(DesignError::TooManyAssayTypes {
                requested: params.assays,
                max: MAX_ASSAY_TYPES,
            });
        }
        let mut names: Vec<String> = (0..params.assays).map(letter_name).collect();
        names.sort();

        if params.dontmix > names.len() / 2 {
            return Err(DesignError::TooManyDontMixPairs {
                requested: params.dontmix,
                max: names.len() / 2,
            });
        }
        if params.targets_present > names.len() {
            return Err(DesignError::TooManyTargetsPresent {
                requested: params.targets_present,
                max: names.len(),
            });
        }

        let replicas = params.replicas.unwrap_or(params.max_targets + 1);
        let mut builder = ExperimentDesign::builder()
            .chambers(params.chambers)
            .max_targets(params.max_targets);
        for name in &names {
            builder = builder.assay(name, replicas);
        }

        let mut unpaired = names.clone();
        for _ in 0..params.dontmix {
            let last = unpaired.remove(unpaired.len() - 1);
            let first = unpaired.remove(0);
            builder = builder.dont_mix(&last, &first);
        }

        for name in names.iter().take(params.targets_present) {
            builder = builder.target_present(name);
        }

        builder.build()
    }

    /// The reference experiment: 14 assays A..N with replicas cycling 2, 3, 4,
    /// 8 chambers, don't-mix {A,H} and {C,L}, and G, H simulated as present.
    pub fn reference_example() -> Self {
        let mut builder = ExperimentDesign::builder().chambers(8).max_targets(2);
        for i in 0..14 {
            builder = builder.assay(&letter_name(i), 2 + (i % 3));
        }
        builder
            .dont_mix("A", "H")
            .dont_mix("C", "L")
            .target_present("G")
            .target_present("H")
            .build()
            .unwrap_or_else(|e| unreachable!("reference example is valid: {}", e))
    }

    // ------------------------------------------------------------------------
    // Assay-type queries
    // ------------------------------------------------------------------------

    pub fn num_assay_types(&self) -> usize {
        self.names.len()
    }

    /// Assay types in the order they should be allocated.
    pub fn assay_types_in_priority_order(&self) -> impl Iterator<Item = AssayType> {
        (0..self.names.len()).map(AssayType::new)
    }

    /// Every assay type, as a set.
    pub fn all_assay_types(&self) -> TypeSet {
        TypeSet::first_n(self.names.len())
    }

    pub fn name(&self, assay_type: AssayType) -> &str {
        &self.names[assay_type.index()]
    }

    pub fn type_named(&self, name: &str) -> Option<AssayType> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(AssayType::new)
    }

    pub fn replicas(&self, assay_type: AssayType) -> usize {
        self.replicas[assay_type.index()]
    }

    /// Total number of replicas the design asks for across all types.
    pub fn total_replicas(&self) -> usize {
        self.replicas.iter().sum()
    }

    /// The simultaneous-targets bound.
    pub fn max_targets(&self) -> usize {
        self.max_targets
    }

    pub fn dont_mix(&self) -> &[(AssayType, AssayType)] {
        &self.dont_mix
    }

    pub fn dont_mix_partners(&self, assay_type: AssayType) -> TypeSet {
        self.partners[assay_type.index()]
    }

    /// Simulated targets present (reporting only, never used to allocate).
    pub fn targets_present(&self) -> TypeSet {
        self.targets_present
    }

    // ------------------------------------------------------------------------
    // Chamber queries
    // ------------------------------------------------------------------------

    pub fn num_chambers(&self) -> usize {
        self.num_chambers
    }

    pub fn all_chambers(&self) -> ChamberSet {
        ChamberSet::first_n(self.num_chambers)
    }

    /// Is it legal to add an assay of this type to a chamber already holding
    /// `mixture`? Not if the type is already there, nor if it would meet a
    /// don't-mix partner.
    pub fn can_go_into(&self, assay_type: AssayType, mixture: TypeSet) -> bool {
        !mixture.contains(assay_type) && !mixture.intersects(self.dont_mix_partners(assay_type))
    }

    // ------------------------------------------------------------------------
    // Formatting
    // ------------------------------------------------------------------------

    /// Label for one replica, e.g. "B3".
    pub fn label(&self, assay: Assay) -> String {
        format!("{}{}", self.name(assay.assay_type), assay.replica)
    }

    /// Names of a set of types, e.g. "{A,D,F}".
    pub fn format_types(&self, types: TypeSet) -> String {
        let names: Vec<&str> = types.iter().map(|t| self.name(t)).collect();
        format!("{{{}}}", names.join(","))
    }

    /// "ABCD", or "ABC ... N" when there are seven or more.
    pub fn all_assay_types_as_single_string(&self) -> String {
        let letters: String = self.names.concat();
        if self.names.len() < 7 {
            return letters;
        }
        let start: Vec<&str> = self.names.iter().take(3).map(String::as_str).collect();
        format!("{} ... {}", start.concat(), self.names[self.names.len() - 1])
    }

    /// Don't-mix pairs as "AH CL", each pair in name order.
    pub fn dontmix_as_single_string(&self) -> String {
        let pairs: Vec<String> = self
            .dont_mix
            .iter()
            .map(|&(a, b)| {
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                format!("{}{}", self.name(lo), self.name(hi))
            })
            .collect();
        pairs.join(" ")
    }

    /// One line per assay type giving its replica count.
    pub fn format_all_assays(&self) -> Vec<String> {
        self.assay_types_in_priority_order()
            .map(|t| format!("<{}> x {}", self.name(t), self.replicas(t)))
            .collect()
    }
}

/// Incremental construction of an `ExperimentDesign`.
///
/// Nothing is checked until `build`.
#[derive(Debug, Clone, Default)]
pub struct DesignBuilder {
    assays: Vec<(String, usize)>,
    chambers: usize,
    max_targets: Option<usize>,
    dont_mix: Vec<(String, String)>,
    targets_present: Vec<String>,
}

impl DesignBuilder {
    /// Declare an assay type and how many replicas it needs.
    pub fn assay(mut self, name: &str, replicas: usize) -> Self {
        self.assays.push((name.to_string(), replicas));
        self
    }

    pub fn chambers(mut self, chambers: usize) -> Self {
        self.chambers = chambers;
        self
    }

    /// Simultaneous-targets bound (defaults to 1).
    pub fn max_targets(mut self, max_targets: usize) -> Self {
        self.max_targets = Some(max_targets);
        self
    }

    pub fn dont_mix(mut self, a: &str, b: &str) -> Self {
        self.dont_mix.push((a.to_string(), b.to_string()));
        self
    }

    pub fn target_present(mut self, name: &str) -> Self {
        self.targets_present.push(name.to_string());
        self
    }

    pub fn build(self) -> Result<ExperimentDesign, DesignError> {
        if self.chambers == 0 {
            return Err(DesignError::NoChambers);
        }
        if self.chambers > MAX_CHAMBERS {
            return Err(DesignError::TooManyChambers {
                requested: self.chambers,
                max: MAX_CHAMBERS,
            });
        }
        if self.assays.len() > MAX_ASSAY_TYPES {
            return Err(DesignError::TooManyAssayTypes {
                requested: self.assays.len(),
                max: MAX_ASSAY_TYPES,
            });
        }
        let max_targets = self.max_targets.unwrap_or(1);
        if max_targets == 0 {
            return Err(DesignError::ZeroTargetBound);
        }

        let mut by_name: BTreeMap<String, usize> = BTreeMap::new();
        for (name, replicas) in self.assays {
            if replicas == 0 {
                return Err(DesignError::ZeroReplicas { name });
            }
            if by_name.contains_key(&name) {
                return Err(DesignError::DuplicateAssayType { name });
            }
            by_name.insert(name, replicas);
        }
        // BTreeMap iteration gives the priority order.
        let names: Vec<String> = by_name.keys().cloned().collect();
        let replicas: Vec<usize> = by_name.values().copied().collect();

        let lookup = |name: &str, context: &'static str| -> Result<AssayType, DesignError> {
            names
                .iter()
                .position(|n| n == name)
                .map(AssayType::new)
                .ok_or_else(|| DesignError::UnknownAssayType {
                    name: name.to_string(),
                    context,
                })
        };

        let mut dont_mix = Vec::with_capacity(self.dont_mix.len());
        let mut partners = vec![TypeSet::empty(); names.len()];
        for (a, b) in &self.dont_mix {
            let ta = lookup(a, "don't-mix pair")?;
            let tb = lookup(b, "don't-mix pair")?;
            if ta == tb {
                return Err(DesignError::SelfDontMix { name: a.clone() });
            }
            partners[ta.index()].insert(tb);
            partners[tb.index()].insert(ta);
            dont_mix.push((ta, tb));
        }

        let mut targets_present = TypeSet::empty();
        for name in &self.targets_present {
            targets_present.insert(lookup(name, "targets present")?);
        }

        Ok(ExperimentDesign {
            names,
            replicas,
            num_chambers: self.chambers,
            max_targets,
            dont_mix,
            partners,
            targets_present,
        })
    }
}

/// Numeric construction inputs, as collected by a front end.
///
/// Loadable from JSON, e.g. `{"assays": 14, "chambers": 8, "max_targets": 2}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignParams {
    pub assays: usize,
    pub chambers: usize,
    pub max_targets: usize,
    /// Replicas per assay type; `max_targets + 1` when absent.
    #[serde(default)]
    pub replicas: Option<usize>,
    #[serde(default)]
    pub dontmix: usize,
    #[serde(default)]
    pub targets_present: usize,
}

impl DesignParams {
    pub fn new(assays: usize, chambers: usize, max_targets: usize) -> Self {
        Self {
            assays,
            chambers,
            max_targets,
            replicas: None,
            dontmix: 0,
            targets_present: 0,
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_example() {
        let design = ExperimentDesign::reference_example();
        assert_eq!(design.num_assay_types(), 14);
        assert!(design.type_named("A").is_some());
        assert!(design.type_named("N").is_some());
        assert!(design.type_named("O").is_none());

        let replicas = |name: &str| design.replicas(design.type_named(name).unwrap());
        assert_eq!(replicas("A"), 2);
        assert_eq!(replicas("B"), 3);
        assert_eq!(replicas("C"), 4);
        assert_eq!(replicas("D"), 2);
        assert_eq!(replicas("N"), 3);
        assert_eq!(design.total_replicas(), 41);

        assert_eq!(design.num_chambers(), 8);
        assert_eq!(design.dontmix_as_single_string(), "AH CL");
        assert_eq!(design.format_types(design.targets_present()), "{G,H}");
    }

    #[test]
    fn test_from_params() {
        let mut params = DesignParams::new(14, 8, 2);
        params.dontmix = 2;
        params.targets_present = 2;
        let design = ExperimentDesign::from_params(&params).unwrap();

        assert_eq!(design.num_assay_types(), 14);
        let a = design.type_named("A").unwrap();
        assert_eq!(design.replicas(a), 3);
        assert_eq!(design.max_targets(), 2);
        assert_eq!(design.dont_mix().len(), 2);
        assert_eq!(design.name(design.dont_mix()[0].0), "N");
        assert_eq!(design.name(design.dont_mix()[0].1), "A");
        assert_eq!(design.name(design.dont_mix()[1].0), "M");
        assert_eq!(design.name(design.dont_mix()[1].1), "B");
        assert_eq!(design.format_types(design.targets_present()), "{A,B}");
    }

    #[test]
    fn test_from_params_explicit_replicas() {
        let mut params = DesignParams::new(3, 5, 2);
        params.replicas = Some(4);
        let design = ExperimentDesign::from_params(&params).unwrap();
        assert!(design.assay_types_in_priority_order().all(|t| design.replicas(t) == 4));
    }

    #[test]
    fn test_from_params_rejects_too_many_pairs() {
        let mut params = DesignParams::new(3, 5, 2);
        params.dontmix = 2;
        assert_eq!(
            ExperimentDesign::from_params(&params),
            Err(DesignError::TooManyDontMixPairs {
                requested: 2,
                max: 1
            })
        );
    }

    #[test]
    fn test_zero_chambers_is_invalid() {
        let params = DesignParams::new(2, 0, 2);
        assert_eq!(
            ExperimentDesign::from_params(&params),
            Err(DesignError::NoChambers)
        );
    }

    #[test]
    fn test_zero_replicas_is_invalid() {
        let mut params = DesignParams::new(2, 4, 2);
        params.replicas = Some(0);
        assert_eq!(
            ExperimentDesign::from_params(&params),
            Err(DesignError::ZeroReplicas {
                name: "A".to_string()
            })
        );
    }

    #[test]
    fn test_zero_target_bound_is_invalid() {
        let result = ExperimentDesign::builder()
            .chambers(4)
            .max_targets(0)
            .assay("A", 1)
            .build();
        assert_eq!(result, Err(DesignError::ZeroTargetBound));
    }

    #[test]
    fn test_zero_assays_is_valid() {
        let design = ExperimentDesign::from_params(&DesignParams::new(0, 5, 1)).unwrap();
        assert_eq!(design.num_assay_types(), 0);
        assert!(design.all_assay_types().is_empty());
    }

    #[test]
    fn test_unknown_names_are_rejected() {
        let result = ExperimentDesign::builder()
            .chambers(4)
            .assay("A", 2)
            .dont_mix("A", "Z")
            .build();
        assert_eq!(
            result,
            Err(DesignError::UnknownAssayType {
                name: "Z".to_string(),
                context: "don't-mix pair"
            })
        );

        let result = ExperimentDesign::builder()
            .chambers(4)
            .assay("A", 2)
            .target_present("Q")
            .build();
        assert!(matches!(
            result,
            Err(DesignError::UnknownAssayType { .. })
        ));
    }

    #[test]
    fn test_duplicate_and_self_pairs_are_rejected() {
        let result = ExperimentDesign::builder()
            .chambers(4)
            .assay("A", 2)
            .assay("A", 3)
            .build();
        assert!(matches!(result, Err(DesignError::DuplicateAssayType { .. })));

        let result = ExperimentDesign::builder()
            .chambers(4)
            .assay("A", 2)
            .dont_mix("A", "A")
            .build();
        assert!(matches!(result, Err(DesignError::SelfDontMix { .. })));
    }

    #[test]
    fn test_priority_order_is_alphabetical() {
        let design = ExperimentDesign::builder()
            .chambers(4)
            .assay("cheese", 2)
            .assay("chalk", 2)
            .assay("bread", 2)
            .build()
            .unwrap();
        let order: Vec<&str> = design
            .assay_types_in_priority_order()
            .map(|t| design.name(t))
            .collect();
        assert_eq!(order, vec!["bread", "chalk", "cheese"]);
    }

    #[test]
    fn test_can_go_into() {
        let design = ExperimentDesign::reference_example();
        let t = |name: &str| design.type_named(name).unwrap();
        let mix = |names: &[&str]| TypeSet::from_types(&names.iter().map(|n| t(n)).collect::<Vec<_>>());

        // Same type already present.
        assert!(!design.can_go_into(t("E"), mix(&["E"])));
        assert!(design.can_go_into(t("E"), mix(&["F"])));
        // Don't-mix, both directions.
        assert!(!design.can_go_into(t("A"), mix(&["H"])));
        assert!(!design.can_go_into(t("H"), mix(&["A"])));
        // Control: a don't-mix member beside an unrelated type.
        assert!(design.can_go_into(t("A"), mix(&["E"])));
    }

    #[test]
    fn test_single_string_summaries() {
        let design = ExperimentDesign::reference_example();
        assert_eq!(design.all_assay_types_as_single_string(), "ABC ... N");
        let small = ExperimentDesign::from_params(&DesignParams::new(4, 4, 1)).unwrap();
        assert_eq!(small.all_assay_types_as_single_string(), "ABCD");
        assert_eq!(small.format_all_assays()[0], "<A> x 2");
    }

    #[test]
    fn test_params_json() {
        let params: DesignParams =
            serde_json::from_str(r#"{"assays": 4, "chambers": 6, "max_targets": 2}"#).unwrap();
        assert_eq!(params, DesignParams::new(4, 6, 2));
    }

    #[test]
    fn test_absent_replica_count_defaults_to_bound_plus_one() {
        let params: DesignParams =
            serde_json::from_str(r#"{"assays": 3, "chambers": 6, "max_targets": 3}"#).unwrap();
        assert_eq!(params.replicas, None);
        let design = ExperimentDesign::from_params(&params).unwrap();
        assert!(design.assay_types_in_priority_order().all(|t| design.replicas(t) == 4));
    }
}
