//! Derivation of visit properties from the constituent protocols:
//! weather floor, effective duration, Dutch start-time text and remarks.

use chrono::Timelike;
use std::collections::BTreeMap;

use crate::models::catalog::{Catalog, Protocol, TimingReference};
use crate::models::visit::PartOfDay;

/// Precipitation labels ordered from most permissive to strictest.
const PRECIPITATION_ORDER: [&str; 4] = [
    "motregen",
    "geen regen",
    "droog",
    "geen neerslag, geen mist boven watergangen",
];

/// Remarks phrases that survive into planning remarks.
const REMARKS_ALLOWLIST: [&str; 11] = [
    "1x in de kraamperiode",
    "eventueel 1 ochtend",
    "ten minste 1 ochtend",
    "enkel ochtend bezoeken",
    "1 ochtend",
    "relatief warme avonden, bij voorkeur na regen of een weersomslag",
    "zo mogelijk 1 ochtend",
    "1 ronde in juni",
    "'s avonds",
    "'s ochtends",
    "bij voorkeur niet na (hevige) regenbuien",
];

/// Pick the strictest precipitation bound among the options.
///
/// Unknown labels lose to known ones; among only unknown labels the
/// shortest (then lexicographically first) wins.
pub fn strictest_precipitation(options: &[&str]) -> Option<String> {
    if options.is_empty() {
        return None;
    }
    let rank = |label: &str| {
        let norm = label.trim().to_lowercase();
        PRECIPITATION_ORDER.iter().position(|o| *o == norm)
    };
    let known = options
        .iter()
        .filter_map(|o| rank(o).map(|r| (r, *o)))
        .max_by_key(|(r, _)| *r);
    if let Some((_, label)) = known {
        return Some(label.to_string());
    }
    options
        .iter()
        .min_by_key(|o| (o.len(), **o))
        .map(|o| o.to_string())
}

/// Relative start minutes of a protocol against its timing reference.
pub fn start_time_minutes(p: &Protocol) -> Option<i32> {
    match p.start_timing_reference? {
        TimingReference::Sunrise | TimingReference::Sunset => p.start_time_relative_minutes,
        _ => None,
    }
}

/// Relative end minutes; an end anchored at sunrise inverts its offset.
pub fn end_time_minutes(p: &Protocol) -> Option<i32> {
    let rel = p.end_time_relative_minutes?;
    match p.end_timing_reference {
        Some(TimingReference::Sunrise) => Some(-rel),
        _ => Some(rel),
    }
}

/// Round minutes to half hours and render as a Dutch hour count
/// ("1", "1,5", "2").
fn format_half_hours(minutes: i32) -> String {
    let half_steps = ((minutes.abs() as f64) / 30.0).round() as i32;
    let whole = half_steps / 2;
    if half_steps % 2 == 0 {
        format!("{}", whole)
    } else {
        format!("{},5", whole)
    }
}

/// Dutch start text for a relative start minute within a part of day.
pub fn start_time_text_for(part: PartOfDay, minutes: Option<i32>) -> Option<String> {
    if part == PartOfDay::Dag && minutes.is_none() {
        return Some("Overdag".to_string());
    }
    let minutes = minutes?;

    match part {
        PartOfDay::Ochtend => {
            if minutes == 0 {
                Some("Zonsopkomst".to_string())
            } else {
                let direction = if minutes > 0 { "na" } else { "voor" };
                Some(format!("{} uur {} zonsopkomst", format_half_hours(minutes), direction))
            }
        }
        PartOfDay::Avond => {
            if minutes == 0 {
                Some("Zonsondergang".to_string())
            } else {
                let direction = if minutes > 0 { "na" } else { "voor" };
                Some(format!("{} uur {} zonsondergang", format_half_hours(minutes), direction))
            }
        }
        PartOfDay::Dag => {
            Some(format!("{} uur na zonsopkomst", format_half_hours(minutes)))
        }
    }
}

/// Duration and start-time text for one composed visit.
pub struct TimingProperties {
    pub duration_minutes: Option<i32>,
    pub start_time_text: Option<String>,
}

/// Derive the effective duration and start text for a group of protocols
/// sharing a visit.
///
/// `visit_indices` maps protocol id to the visit index covered by this
/// visit, for exception resolution.
pub fn derive_timing(
    catalog: &Catalog,
    protocols: &[&Protocol],
    part: Option<PartOfDay>,
    visit_indices: &BTreeMap<i64, u32>,
) -> TimingProperties {
    let timings: Vec<_> = protocols
        .iter()
        .map(|p| catalog.effective_timing(p, visit_indices.get(&p.id).copied(), part))
        .collect();

    let base_duration = timings
        .iter()
        .filter_map(|t| t.visit_duration_hours)
        .fold(None::<f64>, |acc, d| Some(acc.map_or(d, |a| a.max(d))))
        .map(|hours| (hours * 60.0) as i32);

    let is_massawinter = |p: &Protocol| {
        catalog
            .function_of(p)
            .map(|f| f.name == "Massawinterverblijfplaats")
            .unwrap_or(false)
    };
    let is_mv_paarverblijf = |p: &Protocol| {
        let fn_ok = catalog
            .function_of(p)
            .map(|f| f.name == "Paarverblijf")
            .unwrap_or(false);
        let sp = catalog.species_of(p);
        let mv = sp
            .map(|s| s.abbreviation.as_deref() == Some("MV") || s.name == "MV")
            .unwrap_or(false);
        fn_ok && mv
    };

    let has_massawinter = protocols.iter().any(|p| is_massawinter(p));
    let has_mv_paarverblijf = protocols.iter().any(|p| is_mv_paarverblijf(p));

    // Massawinterverblijfplaats overrides the whole derivation.
    if has_massawinter {
        if protocols.len() == 1 {
            return TimingProperties {
                duration_minutes: base_duration,
                start_time_text: Some("00:00".to_string()),
            };
        }
        if has_mv_paarverblijf {
            return TimingProperties {
                duration_minutes: base_duration,
                start_time_text: Some("Zonsondergang".to_string()),
            };
        }
        return TimingProperties {
            duration_minutes: Some(120),
            start_time_text: Some("00:00".to_string()),
        };
    }

    let duration = combined_duration(protocols, part).or(base_duration);
    let start_text = combined_start_text(catalog, protocols, &timings, part, duration);

    TimingProperties { duration_minutes: duration, start_time_text: start_text }
}

/// Effective duration covering the full span of diverse start/end times.
fn combined_duration(protocols: &[&Protocol], part: Option<PartOfDay>) -> Option<i32> {
    let starts: Vec<i32> = protocols.iter().filter_map(|p| start_time_minutes(p)).collect();
    let ends: Vec<i32> = protocols.iter().filter_map(|p| end_time_minutes(p)).collect();

    match part {
        Some(PartOfDay::Ochtend) => {
            // Morning span: earliest start (explicit, or recovered from
            // end minus duration) to latest end.
            let mut all_starts = starts.clone();
            for p in protocols {
                if let (Some(end), Some(hours)) = (end_time_minutes(p), p.visit_duration_hours) {
                    all_starts.push(end - (hours * 60.0) as i32);
                }
            }
            let earliest = all_starts.iter().min()?;
            let latest = ends.iter().max()?;
            Some((latest - earliest).max(0))
        }
        Some(PartOfDay::Avond) => {
            // Evening span: earliest start to latest end (explicit, or
            // start plus duration).
            let mut all_ends = ends.clone();
            for p in protocols {
                if let (Some(start), Some(hours)) = (start_time_minutes(p), p.visit_duration_hours)
                {
                    all_ends.push(start + (hours * 60.0) as i32);
                }
            }
            let earliest = starts.iter().min()?;
            let latest = all_ends.iter().max()?;
            Some((latest - earliest).max(0))
        }
        _ => None,
    }
}

fn combined_start_text(
    catalog: &Catalog,
    protocols: &[&Protocol],
    timings: &[crate::models::catalog::EffectiveTiming],
    part: Option<PartOfDay>,
    duration: Option<i32>,
) -> Option<String> {
    // An absolute start anywhere in the bucket wins.
    for eff in timings {
        if eff.start_timing_reference == Some(TimingReference::AbsoluteTime) {
            if let Some(t) = eff.start_time_absolute_from {
                return Some(format!("{:02}:{:02}", t.hour(), t.minute()));
            }
        }
    }

    // Huismus work starts shortly after sunrise regardless of the rest.
    let has_hm = protocols.iter().any(|p| {
        catalog
            .species_of(p)
            .map(|s| s.abbreviation.as_deref() == Some("HM"))
            .unwrap_or(false)
    });
    if has_hm {
        return Some("1-2 uur na zonsopkomst".to_string());
    }

    // MV Paarverblijf has fixed phrasing per part of day.
    let has_mv_paarverblijf = protocols.iter().any(|p| {
        let fn_ok = catalog
            .function_of(p)
            .map(|f| f.name == "Paarverblijf")
            .unwrap_or(false);
        let mv = catalog
            .species_of(p)
            .map(|s| s.abbreviation.as_deref() == Some("MV") || s.name == "MV")
            .unwrap_or(false);
        fn_ok && mv
    });
    if has_mv_paarverblijf {
        match part {
            Some(PartOfDay::Avond) => return Some("Zonsondergang".to_string()),
            Some(PartOfDay::Ochtend) => return Some("3 uur voor zonsopgang".to_string()),
            _ => {}
        }
    }

    // Butterflies fly in the warm hours.
    let has_vlinder = protocols.iter().any(|p| {
        catalog
            .family_of_protocol(p)
            .map(|f| f.name == "Vlinder")
            .unwrap_or(false)
    });
    if has_vlinder {
        return Some(
            "Tussen 10:00 en 15:00 starten (evt. om 09:00 starten als het dan al 22 graden is en zonnig)"
                .to_string(),
        );
    }

    let part = part?;
    let starts: Vec<i32> = protocols.iter().filter_map(|p| start_time_minutes(p)).collect();
    let ends: Vec<i32> = protocols.iter().filter_map(|p| end_time_minutes(p)).collect();

    let minutes = match part {
        PartOfDay::Ochtend => match (ends.iter().max(), duration) {
            (Some(latest_end), Some(dur)) => Some(latest_end - dur),
            _ => starts.iter().min().copied(),
        },
        PartOfDay::Dag => starts.iter().min().copied(),
        PartOfDay::Avond => starts.iter().min().copied().or_else(|| ends.iter().min().copied()),
    };

    start_time_text_for(part, minutes)
}

/// Planning remarks: only whitelisted phrases survive, deduplicated in
/// allowlist order.
pub fn extract_whitelisted_remarks(texts: &[&str]) -> Vec<String> {
    let lowered: Vec<String> = texts.iter().map(|t| t.to_lowercase()).collect();
    let mut kept = Vec::new();
    for phrase in REMARKS_ALLOWLIST {
        let needle = phrase.to_lowercase();
        if lowered.iter().any(|t| t.contains(&needle)) {
            kept.push(phrase.to_string());
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strictest_precipitation_ranking() {
        let options = ["motregen", "droog", "geen regen"];
        assert_eq!(strictest_precipitation(&options).as_deref(), Some("droog"));
        let options = ["motregen", "geen neerslag, geen mist boven watergangen"];
        assert_eq!(
            strictest_precipitation(&options).as_deref(),
            Some("geen neerslag, geen mist boven watergangen")
        );
        assert_eq!(strictest_precipitation(&[]), None);
    }

    #[test]
    fn test_strictest_precipitation_unknown_labels() {
        let options = ["zware regen toegestaan", "mist"];
        assert_eq!(strictest_precipitation(&options).as_deref(), Some("mist"));
    }

    #[test]
    fn test_format_half_hours_rounds() {
        assert_eq!(format_half_hours(60), "2");
        assert_eq!(format_half_hours(90), "3");
        assert_eq!(format_half_hours(30), "1");
        assert_eq!(format_half_hours(45), "1,5");
        assert_eq!(format_half_hours(-90), "3");
    }

    #[test]
    fn test_start_time_text_evening() {
        assert_eq!(
            start_time_text_for(PartOfDay::Avond, Some(0)).as_deref(),
            Some("Zonsondergang")
        );
        assert_eq!(
            start_time_text_for(PartOfDay::Avond, Some(30)).as_deref(),
            Some("0,5 uur na zonsondergang")
        );
        assert_eq!(
            start_time_text_for(PartOfDay::Avond, Some(-60)).as_deref(),
            Some("1 uur voor zonsondergang")
        );
    }

    #[test]
    fn test_start_time_text_morning_and_day() {
        assert_eq!(
            start_time_text_for(PartOfDay::Ochtend, Some(0)).as_deref(),
            Some("Zonsopkomst")
        );
        assert_eq!(
            start_time_text_for(PartOfDay::Ochtend, Some(-90)).as_deref(),
            Some("1,5 uur voor zonsopkomst")
        );
        assert_eq!(start_time_text_for(PartOfDay::Dag, None).as_deref(), Some("Overdag"));
    }

    #[test]
    fn test_remarks_allowlist_filters_and_dedupes() {
        let texts = [
            "Bezoeken op relatief warme avonden, bij voorkeur na regen of een weersomslag",
            "waarvan ten minste 1 ochtend en 1 ronde in juni",
            "vrije tekst zonder keywords",
        ];
        let kept = extract_whitelisted_remarks(&texts);
        assert!(kept.contains(&"ten minste 1 ochtend".to_string()));
        assert!(kept.contains(&"1 ronde in juni".to_string()));
        assert!(kept
            .contains(&"relatief warme avonden, bij voorkeur na regen of een weersomslag".to_string()));
        assert!(!kept.iter().any(|k| k.contains("vrije tekst")));
    }
}
