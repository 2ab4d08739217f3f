//! Skill tag projection.
//!
//! Every visit projects onto exactly one capacity bucket (its *skill
//! tag*), every researcher onto a set of tags. The seasonal planner
//! matches aggregate demand against aggregate supply through these tags.

use std::collections::BTreeSet;

use crate::models::{Catalog, User, Visit};

pub const SKILL_VRFG: &str = "VR/FG";
pub const SKILL_UNKNOWN: &str = "?";

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn first_function_name(catalog: &Catalog, visit: &Visit) -> String {
    visit
        .function_ids
        .first()
        .and_then(|id| catalog.function(*id))
        .map(|f| f.name.trim().to_string())
        .unwrap_or_default()
}

/// True when any function name of the visit contains one of the needles
/// (case-insensitive).
pub fn any_function_contains(catalog: &Catalog, visit: &Visit, needles: &[&str]) -> bool {
    visit.function_ids.iter().any(|id| {
        catalog
            .function(*id)
            .map(|f| {
                let name = f.name.to_lowercase();
                needles.iter().any(|n| name.contains(&n.to_lowercase()))
            })
            .unwrap_or(false)
    })
}

fn first_family_name(catalog: &Catalog, visit: &Visit) -> Option<String> {
    let species_id = visit.species_ids.first()?;
    let family = catalog.family_of_species(*species_id)?;
    Some(family.name.trim().to_lowercase())
}

/// Deterministic skill tag a visit competes for.
pub fn required_skill_tag(catalog: &Catalog, visit: &Visit) -> String {
    let fn_name = first_function_name(catalog, visit);
    if fn_name.trim_start().to_uppercase().starts_with("SMP") {
        let fam = first_family_name(catalog, visit).unwrap_or_default();
        return match fam.as_str() {
            "vleermuis" => "SMP Vleermuis".to_string(),
            "zwaluw" => "SMP Gierzwaluw".to_string(),
            "zangvogel" => "SMP Huismus".to_string(),
            other => format!("SMP {}", capitalize(other)),
        };
    }

    if any_function_contains(catalog, visit, &["Vliegroute", "Foerageergebied"]) {
        return SKILL_VRFG.to_string();
    }

    match first_family_name(catalog, visit) {
        Some(raw) if !raw.is_empty() => match raw.as_str() {
            "langoren" => "Langoor".to_string(),
            "schijfhoren" => "Schijfhoren".to_string(),
            "zwaluw" => "Zwaluw".to_string(),
            "vlinder" | "grote vos" | "iepenpage" => "Vlinder".to_string(),
            other => capitalize(other),
        },
        _ => SKILL_UNKNOWN.to_string(),
    }
}

/// All skill tags a researcher can serve, derived from their boolean
/// qualification flags. Returned sorted for deterministic iteration.
pub fn user_skill_set(user: &User) -> BTreeSet<String> {
    let q = &user.qualifications;
    let mut skills = BTreeSet::new();

    if q.smp_vleermuis {
        skills.insert("SMP Vleermuis".to_string());
    }
    if q.smp_gierzwaluw {
        skills.insert("SMP Gierzwaluw".to_string());
    }
    if q.smp_huismus {
        skills.insert("SMP Huismus".to_string());
    }

    if q.vrfg {
        skills.insert(SKILL_VRFG.to_string());
    }

    if q.langoor {
        skills.insert("Langoor".to_string());
    }
    if q.schijfhoren {
        skills.insert("Schijfhoren".to_string());
    }
    if q.zwaluw {
        skills.insert("Zwaluw".to_string());
    }
    // Butterfly species share the Vlinder bucket.
    if q.vlinder || q.teunisbloempijlstaart {
        skills.insert("Vlinder".to_string());
    }
    if q.vleermuis {
        skills.insert("Vleermuis".to_string());
    }
    if q.zangvogel {
        skills.insert("Zangvogel".to_string());
    }
    if q.roofvogel {
        skills.insert("Roofvogel".to_string());
    }
    if q.pad {
        skills.insert("Pad".to_string());
    }
    if q.biggenkruid {
        skills.insert("Biggenkruid".to_string());
    }

    skills
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::{Family, Function, Protocol, ProtocolVisitWindow, TimingReference};
    use crate::models::user::{ContractType, Language, Qualifications};
    use crate::models::visit::{PartOfDay, VisitStatus};
    use crate::models::Species;
    use chrono::NaiveDate;

    fn catalog_with(function_name: &str, family_name: &str) -> Catalog {
        let families = vec![Family { id: 1, name: family_name.into(), priority: Some(1) }];
        let species = vec![Species {
            id: 1,
            family_id: 1,
            name: "Soort".into(),
            abbreviation: None,
            latin_name: None,
        }];
        let functions = vec![Function { id: 1, name: function_name.into() }];
        let protocols = vec![Protocol {
            id: 1,
            species_id: 1,
            function_id: 1,
            number_of_visits: Some(1),
            visit_duration_hours: Some(1.0),
            min_period_between_visits_value: None,
            min_period_between_visits_unit: None,
            start_timing_reference: Some(TimingReference::Sunset),
            start_time_relative_minutes: Some(0),
            start_time_absolute_from: None,
            end_timing_reference: None,
            end_time_relative_minutes: None,
            min_temperature_celsius: None,
            max_wind_force_bft: None,
            max_precipitation: None,
            visit_conditions_text: None,
            requires_morning_visit: false,
            requires_evening_visit: false,
            requires_june_visit: false,
            requires_maternity_period_visit: false,
            visit_windows: vec![ProtocolVisitWindow {
                id: 1,
                protocol_id: 1,
                visit_index: 1,
                window_from: NaiveDate::from_ymd_opt(2000, 6, 1).unwrap(),
                window_to: NaiveDate::from_ymd_opt(2000, 7, 1).unwrap(),
                required: true,
                label: None,
            }],
        }];
        Catalog::new(families, species, functions, protocols).unwrap()
    }

    fn visit() -> Visit {
        Visit {
            id: 1,
            cluster_id: 1,
            group_id: None,
            visit_nr: 1,
            from_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            to_date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            duration_minutes: None,
            part_of_day: Some(PartOfDay::Avond),
            start_time_text: None,
            required_researchers: 1,
            expertise_level: None,
            min_temperature_celsius: None,
            max_wind_force_bft: None,
            max_precipitation: None,
            wbc: false,
            fiets: false,
            hub: false,
            dvp: false,
            sleutel: false,
            vog: false,
            requires_morning_visit: false,
            requires_evening_visit: false,
            requires_june_visit: false,
            requires_maternity_period_visit: false,
            remarks_planning: None,
            remarks_field: None,
            provisional_week: None,
            provisional_locked: false,
            planned_week: None,
            planned_date: None,
            priority: false,
            custom_function_name: None,
            custom_species_name: None,
            status: VisitStatus::Open,
            function_ids: vec![1],
            species_ids: vec![1],
            protocol_visit_window_ids: vec![],
            researcher_ids: vec![],
        }
    }

    #[test]
    fn test_smp_tags_per_family() {
        assert_eq!(
            required_skill_tag(&catalog_with("SMP Kraamverblijf", "Vleermuis"), &visit()),
            "SMP Vleermuis"
        );
        assert_eq!(
            required_skill_tag(&catalog_with("SMP Nest", "Zwaluw"), &visit()),
            "SMP Gierzwaluw"
        );
        assert_eq!(
            required_skill_tag(&catalog_with("SMP Nest", "Zangvogel"), &visit()),
            "SMP Huismus"
        );
    }

    #[test]
    fn test_vrfg_tag() {
        assert_eq!(
            required_skill_tag(&catalog_with("Vliegroute onderzoek", "Vleermuis"), &visit()),
            "VR/FG"
        );
        assert_eq!(
            required_skill_tag(&catalog_with("Foerageergebied", "Vleermuis"), &visit()),
            "VR/FG"
        );
    }

    #[test]
    fn test_family_fallback_tags() {
        assert_eq!(required_skill_tag(&catalog_with("Nest", "Vleermuis"), &visit()), "Vleermuis");
        assert_eq!(required_skill_tag(&catalog_with("Nest", "langoren"), &visit()), "Langoor");
        assert_eq!(required_skill_tag(&catalog_with("Nest", "Grote vos"), &visit()), "Vlinder");
    }

    #[test]
    fn test_user_skill_set_sorted_and_complete() {
        let user = User {
            id: 1,
            email: "a@b.nl".into(),
            full_name: "Test".into(),
            contract: ContractType::Zzp,
            experience_bat: None,
            language: Language::Nl,
            address: None,
            deleted: false,
            qualifications: Qualifications {
                smp_vleermuis: true,
                vrfg: true,
                vleermuis: true,
                teunisbloempijlstaart: true,
                ..Default::default()
            },
        };
        let skills: Vec<String> = user_skill_set(&user).into_iter().collect();
        assert_eq!(skills, vec!["SMP Vleermuis", "VR/FG", "Vleermuis", "Vlinder"]);
    }
}
