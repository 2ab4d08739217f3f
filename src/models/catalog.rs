//! The survey catalogue: families, species, functions and protocols.
//!
//! The catalogue is the mostly-static recipe book of the planning core.
//! Solvers receive it as an immutable snapshot and resolve the non-owning
//! references held by visits against it.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::models::visit::PartOfDay;

pub type FamilyId = i64;
pub type SpeciesId = i64;
pub type FunctionId = i64;
pub type ProtocolId = i64;
pub type PvwId = i64;

/// Taxonomic bucket. Priority 1 is the highest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Family {
    pub id: FamilyId,
    pub name: String,
    pub priority: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Species {
    pub id: SpeciesId,
    pub family_id: FamilyId,
    pub name: String,
    pub abbreviation: Option<String>,
    pub latin_name: Option<String>,
}

/// Survey purpose, e.g. "Nest" or "SMP Kraamverblijf".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub id: FunctionId,
    pub name: String,
}

impl Function {
    /// Names prefixed with `SMP` designate specialized monitoring work.
    pub fn is_smp(&self) -> bool {
        self.name.trim_start().starts_with("SMP")
    }
}

/// Reference frame for a protocol's start or end time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimingReference {
    Sunrise,
    Sunset,
    SunsetToSunrise,
    Daytime,
    AbsoluteTime,
}

/// Parameterised survey recipe.
///
/// Many fields are optional and constrain planning only when present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Protocol {
    pub id: ProtocolId,
    pub species_id: SpeciesId,
    pub function_id: FunctionId,

    pub number_of_visits: Option<i32>,
    pub visit_duration_hours: Option<f64>,
    pub min_period_between_visits_value: Option<i32>,
    pub min_period_between_visits_unit: Option<String>,

    pub start_timing_reference: Option<TimingReference>,
    pub start_time_relative_minutes: Option<i32>,
    pub start_time_absolute_from: Option<NaiveTime>,
    pub end_timing_reference: Option<TimingReference>,
    pub end_time_relative_minutes: Option<i32>,

    pub min_temperature_celsius: Option<i32>,
    pub max_wind_force_bft: Option<i32>,
    pub max_precipitation: Option<String>,
    pub visit_conditions_text: Option<String>,

    pub requires_morning_visit: bool,
    pub requires_evening_visit: bool,
    pub requires_june_visit: bool,
    pub requires_maternity_period_visit: bool,

    pub visit_windows: Vec<ProtocolVisitWindow>,
}

impl Protocol {
    /// Minimum gap between consecutive visits of this protocol, in days.
    pub fn min_gap_days(&self) -> i64 {
        crate::models::calendar::days_from_min_period(
            self.min_period_between_visits_value,
            self.min_period_between_visits_unit.as_deref(),
        )
    }
}

/// One required occurrence inside a protocol.
///
/// Stored window dates use year 2000 as a pattern year; solvers rewrite
/// them to the current year before use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolVisitWindow {
    pub id: PvwId,
    pub protocol_id: ProtocolId,
    pub visit_index: u32,
    pub window_from: NaiveDate,
    pub window_to: NaiveDate,
    pub required: bool,
    pub label: Option<String>,
}

/// Catalogue validation failures, surfaced to the caller as bad input.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("protocol {protocol_id} has no visit windows")]
    MissingWindows { protocol_id: ProtocolId },
    #[error("protocol {protocol_id} has duplicate visit index {visit_index}")]
    DuplicateVisitIndex { protocol_id: ProtocolId, visit_index: u32 },
    #[error("protocol {protocol_id} window {visit_index}: window_from after window_to")]
    InvalidWindow { protocol_id: ProtocolId, visit_index: u32 },
    #[error("protocol {protocol_id} references unknown species {species_id}")]
    UnknownSpecies { protocol_id: ProtocolId, species_id: SpeciesId },
    #[error("protocol {protocol_id} references unknown function {function_id}")]
    UnknownFunction { protocol_id: ProtocolId, function_id: FunctionId },
    #[error("species {species_id} references unknown family {family_id}")]
    UnknownFamily { species_id: SpeciesId, family_id: FamilyId },
}

/// Consolidated timing for a protocol after exception resolution.
#[derive(Debug, Clone)]
pub struct EffectiveTiming {
    pub start_timing_reference: Option<TimingReference>,
    pub start_time_absolute_from: Option<NaiveTime>,
    pub start_time_relative_minutes: Option<i32>,
    pub visit_duration_hours: Option<f64>,
}

/// Immutable catalogue snapshot shared with the solvers.
///
/// Entities live in dense vectors; lookups go through id indexes so that
/// visits and protocols can hold plain ids instead of owning references.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    families: Vec<Family>,
    species: Vec<Species>,
    functions: Vec<Function>,
    protocols: Vec<Protocol>,

    family_idx: HashMap<FamilyId, usize>,
    species_idx: HashMap<SpeciesId, usize>,
    function_idx: HashMap<FunctionId, usize>,
    protocol_idx: HashMap<ProtocolId, usize>,
    pvw_idx: HashMap<PvwId, (ProtocolId, usize)>,
}

impl Catalog {
    pub fn new(
        families: Vec<Family>,
        species: Vec<Species>,
        functions: Vec<Function>,
        protocols: Vec<Protocol>,
    ) -> Result<Self, CatalogError> {
        let mut pvw_idx = HashMap::new();
        for p in &protocols {
            for (w_idx, w) in p.visit_windows.iter().enumerate() {
                pvw_idx.insert(w.id, (p.id, w_idx));
            }
        }
        let catalog = Self {
            family_idx: families.iter().enumerate().map(|(i, f)| (f.id, i)).collect(),
            species_idx: species.iter().enumerate().map(|(i, s)| (s.id, i)).collect(),
            function_idx: functions.iter().enumerate().map(|(i, f)| (f.id, i)).collect(),
            protocol_idx: protocols.iter().enumerate().map(|(i, p)| (p.id, i)).collect(),
            pvw_idx,
            families,
            species,
            functions,
            protocols,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        for sp in &self.species {
            if !self.family_idx.contains_key(&sp.family_id) {
                return Err(CatalogError::UnknownFamily {
                    species_id: sp.id,
                    family_id: sp.family_id,
                });
            }
        }
        for p in &self.protocols {
            if !self.species_idx.contains_key(&p.species_id) {
                return Err(CatalogError::UnknownSpecies {
                    protocol_id: p.id,
                    species_id: p.species_id,
                });
            }
            if !self.function_idx.contains_key(&p.function_id) {
                return Err(CatalogError::UnknownFunction {
                    protocol_id: p.id,
                    function_id: p.function_id,
                });
            }
            if p.visit_windows.is_empty() {
                return Err(CatalogError::MissingWindows { protocol_id: p.id });
            }
            let mut seen = HashSet::new();
            for w in &p.visit_windows {
                if !seen.insert(w.visit_index) {
                    return Err(CatalogError::DuplicateVisitIndex {
                        protocol_id: p.id,
                        visit_index: w.visit_index,
                    });
                }
                if w.window_from > w.window_to {
                    return Err(CatalogError::InvalidWindow {
                        protocol_id: p.id,
                        visit_index: w.visit_index,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn families(&self) -> &[Family] {
        &self.families
    }

    pub fn protocols(&self) -> &[Protocol] {
        &self.protocols
    }

    pub fn family(&self, id: FamilyId) -> Option<&Family> {
        self.family_idx.get(&id).map(|&i| &self.families[i])
    }

    pub fn species(&self, id: SpeciesId) -> Option<&Species> {
        self.species_idx.get(&id).map(|&i| &self.species[i])
    }

    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        self.function_idx.get(&id).map(|&i| &self.functions[i])
    }

    pub fn protocol(&self, id: ProtocolId) -> Option<&Protocol> {
        self.protocol_idx.get(&id).map(|&i| &self.protocols[i])
    }

    /// Resolve a protocol visit window by id, together with its protocol.
    pub fn visit_window(&self, id: PvwId) -> Option<(&Protocol, &ProtocolVisitWindow)> {
        let (protocol_id, w_idx) = self.pvw_idx.get(&id)?;
        let p = self.protocol(*protocol_id)?;
        Some((p, &p.visit_windows[*w_idx]))
    }

    pub fn species_of(&self, p: &Protocol) -> Option<&Species> {
        self.species(p.species_id)
    }

    pub fn function_of(&self, p: &Protocol) -> Option<&Function> {
        self.function(p.function_id)
    }

    pub fn family_of_species(&self, id: SpeciesId) -> Option<&Family> {
        self.species(id).and_then(|sp| self.family(sp.family_id))
    }

    pub fn family_of_protocol(&self, p: &Protocol) -> Option<&Family> {
        self.family_of_species(p.species_id)
    }

    /// Normalised family name of a protocol's species.
    ///
    /// Variant spellings of the bat and swallow families collapse to
    /// "vleermuis" and "zwaluw".
    pub fn normalized_family_name(&self, p: &Protocol) -> String {
        self.family_of_protocol(p)
            .map(|f| normalize_family_name(&f.name))
            .unwrap_or_default()
    }

    pub fn is_smp_protocol(&self, p: &Protocol) -> bool {
        self.function_of(p).map(Function::is_smp).unwrap_or(false)
    }

    /// Resolve the effective timing of a protocol for a specific visit
    /// occurrence, applying the MV and RD Paarverblijf exceptions.
    pub fn effective_timing(
        &self,
        p: &Protocol,
        visit_index: Option<u32>,
        part_of_day: Option<PartOfDay>,
    ) -> EffectiveTiming {
        let mut eff = EffectiveTiming {
            start_timing_reference: p.start_timing_reference,
            start_time_absolute_from: p.start_time_absolute_from,
            start_time_relative_minutes: p.start_time_relative_minutes,
            visit_duration_hours: p.visit_duration_hours,
        };

        let fn_name = self.function_of(p).map(|f| f.name.as_str()).unwrap_or("");
        let sp = self.species_of(p);
        let sp_abbr = sp.and_then(|s| s.abbreviation.as_deref()).unwrap_or("");
        let sp_name = sp.map(|s| s.name.as_str()).unwrap_or("");

        let is_paarverblijf = fn_name == "Paarverblijf";
        let is_mv = sp_abbr == "MV" || sp_name == "MV";
        let is_rd = sp_abbr == "RD";

        // MV Paarverblijf in the evening pins the start to sunset.
        if is_paarverblijf && is_mv && part_of_day == Some(PartOfDay::Avond) {
            eff.start_timing_reference = Some(TimingReference::Sunset);
            eff.start_time_relative_minutes = Some(0);
        }

        // RD Paarverblijf visit 1 is an absolute 23:00 start.
        if is_paarverblijf && is_rd && visit_index == Some(1) {
            eff.start_timing_reference = Some(TimingReference::AbsoluteTime);
            eff.start_time_absolute_from = NaiveTime::from_hms_opt(23, 0, 0);
        }

        eff
    }
}

/// Collapse family name spellings for compatibility comparisons.
pub fn normalize_family_name(name: &str) -> String {
    let n = name.trim().to_lowercase();
    if n.contains("vleer") {
        "vleermuis".to_string()
    } else if n.contains("zwaluw") {
        "zwaluw".to_string()
    } else {
        n
    }
}
