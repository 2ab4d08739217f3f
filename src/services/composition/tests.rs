use chrono::{NaiveDate, NaiveTime};
use std::collections::BTreeSet;

use super::*;
use crate::models::catalog::{
    Catalog, Family, Function, Protocol, ProtocolVisitWindow, Species, TimingReference,
};
use crate::models::visit::{Cluster, PartOfDay};
use crate::settings::SolverSettings;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

struct Fixture {
    families: Vec<Family>,
    species: Vec<Species>,
    functions: Vec<Function>,
    protocols: Vec<Protocol>,
}

impl Fixture {
    fn new() -> Self {
        Self { families: vec![], species: vec![], functions: vec![], protocols: vec![] }
    }

    fn family(&mut self, id: i64, name: &str, priority: i32) -> i64 {
        self.families.push(Family { id, name: name.into(), priority: Some(priority) });
        id
    }

    fn species(&mut self, id: i64, family_id: i64, name: &str, abbr: Option<&str>) -> i64 {
        self.species.push(Species {
            id,
            family_id,
            name: name.into(),
            abbreviation: abbr.map(Into::into),
            latin_name: None,
        });
        id
    }

    fn function(&mut self, id: i64, name: &str) -> i64 {
        self.functions.push(Function { id, name: name.into() });
        id
    }

    fn protocol(&mut self, id: i64, species_id: i64, function_id: i64) -> &mut Protocol {
        self.protocols.push(Protocol {
            id,
            species_id,
            function_id,
            number_of_visits: None,
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
            visit_windows: vec![],
        });
        self.protocols.last_mut().unwrap()
    }

    fn build(self) -> Catalog {
        Catalog::new(self.families, self.species, self.functions, self.protocols).unwrap()
    }
}

fn window(id: i64, protocol_id: i64, idx: u32, from: NaiveDate, to: NaiveDate) -> ProtocolVisitWindow {
    ProtocolVisitWindow {
        id,
        protocol_id,
        visit_index: idx,
        window_from: from,
        window_to: to,
        required: true,
        label: None,
    }
}

fn cluster() -> Cluster {
    Cluster { id: 1, project_id: 1, cluster_number: 1, address: None, deleted: false }
}

fn today() -> NaiveDate {
    d(2025, 4, 1)
}

fn run(catalog: &Catalog, protocol_ids: &[i64]) -> CompositionOutcome {
    compose(
        catalog,
        &cluster(),
        protocol_ids,
        today(),
        1,
        &CompositionDefaults::default(),
        &SolverSettings::default(),
    )
    .unwrap()
}

#[test]
fn test_coverage_every_window_exactly_once() {
    let mut fx = Fixture::new();
    let fam = fx.family(1, "Vleermuis", 1);
    let sp = fx.species(1, fam, "Gewone dwergvleermuis", Some("GD"));
    let func = fx.function(1, "Kraamverblijf");
    {
        let p = fx.protocol(1, sp, func);
        p.min_period_between_visits_value = Some(10);
        p.min_period_between_visits_unit = Some("days".into());
        p.visit_windows = vec![
            window(1, 1, 1, d(2000, 5, 15), d(2000, 7, 15)),
            window(2, 1, 2, d(2000, 5, 15), d(2000, 7, 15)),
        ];
    }
    let catalog = fx.build();

    let outcome = run(&catalog, &[1]);
    assert_eq!(outcome.visits.len(), 2);
    let mut covered: Vec<i64> = outcome
        .visits
        .iter()
        .flat_map(|v| v.protocol_visit_window_ids.clone())
        .collect();
    covered.sort_unstable();
    assert_eq!(covered, vec![1, 2]);
}

#[test]
fn test_smp_and_regular_never_merge() {
    // B1: SMP-Kraam and Nest on the same bat family, overlapping windows.
    let mut fx = Fixture::new();
    let fam = fx.family(1, "Vleermuis", 1);
    let sp = fx.species(1, fam, "Gewone dwergvleermuis", Some("GD"));
    let smp = fx.function(1, "SMP Kraamverblijf");
    let nest = fx.function(2, "Nest");
    fx.protocol(1, sp, smp).visit_windows = vec![window(1, 1, 1, d(2000, 6, 1), d(2000, 7, 15))];
    fx.protocol(2, sp, nest).visit_windows = vec![window(2, 2, 1, d(2000, 6, 1), d(2000, 7, 15))];
    let catalog = fx.build();

    let outcome = run(&catalog, &[1, 2]);
    assert_eq!(outcome.visits.len(), 2, "SMP and non-SMP must stay separate");
}

#[test]
fn test_allow_listed_cross_family_merge() {
    // B2: bat nest + swallow nest, both sunset, identical windows.
    let mut fx = Fixture::new();
    let bats = fx.family(1, "Vleermuis", 1);
    let swallows = fx.family(2, "Zwaluw", 2);
    let gd = fx.species(1, bats, "Gewone dwergvleermuis", Some("GD"));
    let gz = fx.species(2, swallows, "Gierzwaluw", Some("GZ"));
    let nest = fx.function(1, "Nest");
    fx.protocol(1, gd, nest).visit_windows = vec![window(1, 1, 1, d(2000, 6, 1), d(2000, 7, 1))];
    fx.protocol(2, gz, nest).visit_windows = vec![window(2, 2, 1, d(2000, 6, 1), d(2000, 7, 1))];
    let catalog = fx.build();

    let outcome = run(&catalog, &[1, 2]);
    assert_eq!(outcome.visits.len(), 1, "vleermuis+zwaluw is an allowed merge");
    assert_eq!(outcome.visits[0].part_of_day, Some(PartOfDay::Avond));
    assert_eq!(outcome.visits[0].species_ids.len(), 2);
}

#[test]
fn test_cross_family_outside_allow_list_stays_separate() {
    let mut fx = Fixture::new();
    let bats = fx.family(1, "Vleermuis", 1);
    let birds = fx.family(2, "Roofvogel", 3);
    let gd = fx.species(1, bats, "Gewone dwergvleermuis", Some("GD"));
    let bz = fx.species(2, birds, "Buizerd", Some("BZ"));
    let nest = fx.function(1, "Nest");
    fx.protocol(1, gd, nest).visit_windows = vec![window(1, 1, 1, d(2000, 6, 1), d(2000, 7, 1))];
    fx.protocol(2, bz, nest).visit_windows = vec![window(2, 2, 1, d(2000, 6, 1), d(2000, 7, 1))];
    let catalog = fx.build();

    let outcome = run(&catalog, &[1, 2]);
    assert_eq!(outcome.visits.len(), 2);
}

#[test]
fn test_rugstreeppad_functions_never_merge() {
    let mut fx = Fixture::new();
    let fam = fx.family(1, "Pad", 2);
    let rd = fx.species(1, fam, "Rugstreeppad", Some("RD"));
    let f1 = fx.function(1, "Roepactiviteit");
    let f2 = fx.function(2, "Eieren en larven");
    fx.protocol(1, rd, f1).visit_windows = vec![window(1, 1, 1, d(2000, 5, 1), d(2000, 7, 1))];
    fx.protocol(2, rd, f2).visit_windows = vec![window(2, 2, 1, d(2000, 5, 1), d(2000, 7, 1))];
    let catalog = fx.build();

    let outcome = run(&catalog, &[1, 2]);
    assert_eq!(outcome.visits.len(), 2);
}

#[test]
fn test_massawinter_with_paarverblijf_non_mv() {
    // B3: Massawinterverblijfplaats (1h) + non-MV Paarverblijf (2h, sunset)
    // fixes duration to 120 minutes and a midnight start.
    let mut fx = Fixture::new();
    let fam = fx.family(1, "Vleermuis", 1);
    let gd = fx.species(1, fam, "Gewone dwergvleermuis", Some("GD"));
    let massa = fx.function(1, "Massawinterverblijfplaats");
    let paar = fx.function(2, "Paarverblijf");
    {
        let p = fx.protocol(1, gd, massa);
        p.visit_duration_hours = Some(1.0);
        p.start_timing_reference = Some(TimingReference::AbsoluteTime);
        p.start_time_absolute_from = NaiveTime::from_hms_opt(0, 0, 0);
        p.visit_windows = vec![window(1, 1, 1, d(2000, 8, 15), d(2000, 10, 1))];
    }
    {
        let p = fx.protocol(2, gd, paar);
        p.visit_duration_hours = Some(2.0);
        p.start_timing_reference = Some(TimingReference::Sunset);
        p.visit_windows = vec![window(2, 2, 1, d(2000, 8, 15), d(2000, 10, 1))];
    }
    let catalog = fx.build();

    let outcome = run(&catalog, &[1, 2]);
    assert_eq!(outcome.visits.len(), 1);
    let v = &outcome.visits[0];
    assert_eq!(v.duration_minutes, Some(120));
    assert_eq!(v.start_time_text.as_deref(), Some("00:00"));
}

#[test]
fn test_sequencing_gap_respected_in_windows() {
    let mut fx = Fixture::new();
    let fam = fx.family(1, "Vleermuis", 1);
    let gd = fx.species(1, fam, "Paarverblijf soort", Some("PS"));
    let func = fx.function(1, "Kraamverblijf");
    {
        let p = fx.protocol(1, gd, func);
        p.min_period_between_visits_value = Some(3);
        p.min_period_between_visits_unit = Some("weken".into());
        p.visit_windows = vec![
            window(1, 1, 1, d(2000, 5, 1), d(2000, 8, 1)),
            window(2, 1, 2, d(2000, 5, 1), d(2000, 8, 1)),
        ];
    }
    let catalog = fx.build();

    let outcome = run(&catalog, &[1]);
    assert_eq!(outcome.visits.len(), 2);
    let mut visits = outcome.visits;
    visits.sort_by_key(|v| v.from_date);
    let gap = (visits[1].from_date - visits[0].from_date).num_days();
    assert!(gap >= 21, "expected >= 21 day gap, got {}", gap);
}

#[test]
fn test_weather_aggregation_strictest() {
    let mut fx = Fixture::new();
    let fam = fx.family(1, "Vleermuis", 1);
    let gd = fx.species(1, fam, "A", Some("A"));
    let ls = fx.species(2, fam, "B", Some("B"));
    let nest = fx.function(1, "Nest");
    {
        let p = fx.protocol(1, gd, nest);
        p.min_temperature_celsius = Some(8);
        p.max_wind_force_bft = Some(4);
        p.max_precipitation = Some("motregen".into());
        p.visit_windows = vec![window(1, 1, 1, d(2000, 6, 1), d(2000, 7, 1))];
    }
    {
        let p = fx.protocol(2, ls, nest);
        p.min_temperature_celsius = Some(12);
        p.max_wind_force_bft = Some(3);
        p.max_precipitation = Some("droog".into());
        p.visit_windows = vec![window(2, 2, 1, d(2000, 6, 1), d(2000, 7, 1))];
    }
    let catalog = fx.build();

    let outcome = run(&catalog, &[1, 2]);
    assert_eq!(outcome.visits.len(), 1);
    let v = &outcome.visits[0];
    assert_eq!(v.min_temperature_celsius, Some(12));
    assert_eq!(v.max_wind_force_bft, Some(3));
    assert_eq!(v.max_precipitation.as_deref(), Some("droog"));
}

#[test]
fn test_short_overlap_prevents_merge() {
    let mut fx = Fixture::new();
    let fam = fx.family(1, "Vleermuis", 1);
    let a = fx.species(1, fam, "A", Some("A"));
    let b = fx.species(2, fam, "B", Some("B"));
    let nest = fx.function(1, "Nest");
    fx.protocol(1, a, nest).visit_windows = vec![window(1, 1, 1, d(2000, 6, 1), d(2000, 6, 20))];
    fx.protocol(2, b, nest).visit_windows = vec![window(2, 2, 1, d(2000, 6, 15), d(2000, 7, 15))];
    let catalog = fx.build();

    // Only 5 days of shared window: below the 10-day minimum.
    let outcome = run(&catalog, &[1, 2]);
    assert_eq!(outcome.visits.len(), 2);
}

#[test]
fn test_morning_flag_pins_first_visit() {
    let mut fx = Fixture::new();
    let fam = fx.family(1, "Vleermuis", 1);
    let sp = fx.species(1, fam, "A", Some("A"));
    let func = fx.function(1, "Kraamverblijf");
    {
        let p = fx.protocol(1, sp, func);
        p.start_timing_reference = Some(TimingReference::SunsetToSunrise);
        p.requires_morning_visit = true;
        p.visit_windows = vec![
            window(1, 1, 1, d(2000, 5, 1), d(2000, 7, 1)),
            window(2, 1, 2, d(2000, 5, 1), d(2000, 7, 1)),
        ];
    }
    let catalog = fx.build();
    let mut warnings = Vec::new();
    let requests = generate_requests(&catalog, &[1], 2025, &mut warnings);
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[0].part_options,
        Some(BTreeSet::from([PartOfDay::Ochtend])),
        "first occurrence is pinned to the morning"
    );
    assert_eq!(
        requests[1].part_options,
        Some(BTreeSet::from([PartOfDay::Ochtend, PartOfDay::Avond])),
        "later occurrences stay flexible"
    );
}

#[test]
fn test_infeasible_when_gap_exceeds_window() {
    let mut fx = Fixture::new();
    let fam = fx.family(1, "Vleermuis", 1);
    let sp = fx.species(1, fam, "A", Some("A"));
    let func = fx.function(1, "Kraamverblijf");
    {
        let p = fx.protocol(1, sp, func);
        p.min_period_between_visits_value = Some(3);
        p.min_period_between_visits_unit = Some("months".into());
        p.visit_windows = vec![
            window(1, 1, 1, d(2000, 6, 1), d(2000, 6, 20)),
            window(2, 1, 2, d(2000, 6, 10), d(2000, 6, 30)),
        ];
    }
    let catalog = fx.build();

    let err = compose(
        &catalog,
        &cluster(),
        &[1],
        today(),
        1,
        &CompositionDefaults::default(),
        &SolverSettings::default(),
    )
    .unwrap_err();
    assert!(matches!(err, CompositionError::Infeasible { .. }));
}

#[test]
fn test_idempotent_up_to_group_id() {
    let mut fx = Fixture::new();
    let bats = fx.family(1, "Vleermuis", 1);
    let swallows = fx.family(2, "Zwaluw", 2);
    let gd = fx.species(1, bats, "GD", Some("GD"));
    let gz = fx.species(2, swallows, "GZ", Some("GZ"));
    let nest = fx.function(1, "Nest");
    let kraam = fx.function(2, "Kraamverblijf");
    fx.protocol(1, gd, nest).visit_windows = vec![window(1, 1, 1, d(2000, 5, 15), d(2000, 7, 15))];
    fx.protocol(2, gz, nest).visit_windows = vec![window(2, 2, 1, d(2000, 6, 1), d(2000, 7, 20))];
    {
        let p = fx.protocol(3, gd, kraam);
        p.min_period_between_visits_value = Some(2);
        p.min_period_between_visits_unit = Some("weeks".into());
        p.visit_windows = vec![
            window(3, 3, 1, d(2000, 5, 1), d(2000, 8, 1)),
            window(4, 3, 2, d(2000, 5, 1), d(2000, 8, 1)),
        ];
    }
    let catalog = fx.build();

    let first = run(&catalog, &[1, 2, 3]);
    let second = run(&catalog, &[1, 2, 3]);
    let shape = |o: &CompositionOutcome| {
        let mut s: Vec<_> = o
            .visits
            .iter()
            .map(|v| {
                let mut pvws = v.protocol_visit_window_ids.clone();
                pvws.sort_unstable();
                (v.from_date, v.to_date, v.part_of_day, pvws)
            })
            .collect();
        s.sort();
        s
    };
    assert_eq!(shape(&first), shape(&second));
    assert_ne!(first.visits[0].group_id, second.visits[0].group_id);
}

#[test]
fn test_visit_numbering_chronological() {
    let mut fx = Fixture::new();
    let fam = fx.family(1, "Vleermuis", 1);
    let sp = fx.species(1, fam, "A", Some("A"));
    let func = fx.function(1, "Kraamverblijf");
    {
        let p = fx.protocol(1, sp, func);
        p.min_period_between_visits_value = Some(20);
        p.min_period_between_visits_unit = Some("days".into());
        p.visit_windows = vec![
            window(1, 1, 1, d(2000, 5, 1), d(2000, 8, 1)),
            window(2, 1, 2, d(2000, 5, 1), d(2000, 8, 1)),
        ];
    }
    let catalog = fx.build();

    let outcome = run(&catalog, &[1]);
    let mut visits = outcome.visits;
    visits.sort_by_key(|v| v.visit_nr);
    assert_eq!(visits[0].visit_nr, 1);
    assert_eq!(visits[1].visit_nr, 2);
    assert!(visits[0].from_date <= visits[1].from_date);
}
