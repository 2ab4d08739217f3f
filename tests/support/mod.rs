//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use chrono::NaiveDate;
use std::collections::HashMap;

use vwp_rust::db::LocalRepository;
use vwp_rust::models::availability::AvailabilityWeek;
use vwp_rust::models::catalog::{
    Catalog, Family, Function, Protocol, ProtocolVisitWindow, Species, TimingReference,
};
use vwp_rust::models::user::{
    BatExperience, ContractType, Language, Qualifications, User, UserId,
};
use vwp_rust::models::visit::{Cluster, PartOfDay, Project, Visit, VisitStatus};

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub fn window(
    id: i64,
    protocol_id: i64,
    idx: u32,
    from: NaiveDate,
    to: NaiveDate,
) -> ProtocolVisitWindow {
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

pub fn protocol(id: i64, species_id: i64, function_id: i64) -> Protocol {
    Protocol {
        id,
        species_id,
        function_id,
        number_of_visits: None,
        visit_duration_hours: Some(2.0),
        min_period_between_visits_value: None,
        min_period_between_visits_unit: None,
        start_timing_reference: Some(TimingReference::Sunset),
        start_time_relative_minutes: Some(0),
        start_time_absolute_from: None,
        end_timing_reference: None,
        end_time_relative_minutes: None,
        min_temperature_celsius: Some(10),
        max_wind_force_bft: Some(4),
        max_precipitation: Some("droog".into()),
        visit_conditions_text: None,
        requires_morning_visit: false,
        requires_evening_visit: false,
        requires_june_visit: false,
        requires_maternity_period_visit: false,
        visit_windows: vec![],
    }
}

/// Catalogue with a bat and a swallow family and a two-visit bat protocol
/// (21 day gap) plus a single-visit swallow protocol.
pub fn standard_catalog() -> Catalog {
    let families = vec![
        Family { id: 1, name: "Vleermuis".into(), priority: Some(1) },
        Family { id: 2, name: "Zwaluw".into(), priority: Some(2) },
    ];
    let species = vec![
        Species {
            id: 1,
            family_id: 1,
            name: "Gewone dwergvleermuis".into(),
            abbreviation: Some("GD".into()),
            latin_name: Some("Pipistrellus pipistrellus".into()),
        },
        Species {
            id: 2,
            family_id: 2,
            name: "Gierzwaluw".into(),
            abbreviation: Some("GZ".into()),
            latin_name: Some("Apus apus".into()),
        },
    ];
    let functions = vec![
        Function { id: 1, name: "Kraamverblijf".into() },
        Function { id: 2, name: "Nest".into() },
    ];

    let mut bat = protocol(1, 1, 1);
    bat.min_period_between_visits_value = Some(21);
    bat.min_period_between_visits_unit = Some("days".into());
    bat.visit_windows = vec![
        window(1, 1, 1, d(2000, 5, 15), d(2000, 7, 15)),
        window(2, 1, 2, d(2000, 5, 15), d(2000, 7, 15)),
    ];

    let mut swallow = protocol(2, 2, 2);
    swallow.visit_windows = vec![window(3, 2, 1, d(2000, 6, 1), d(2000, 7, 10))];

    Catalog::new(families, species, functions, vec![bat, swallow]).unwrap()
}

pub fn bat_user(id: i64) -> User {
    User {
        id,
        email: format!("onderzoeker{}@veldwerk.nl", id),
        full_name: format!("Onderzoeker {}", id),
        contract: ContractType::Zzp,
        experience_bat: Some(BatExperience::Senior),
        language: Language::Nl,
        address: Some("Stationsweg 1, Leiden".into()),
        deleted: false,
        qualifications: Qualifications { vleermuis: true, zwaluw: true, ..Default::default() },
    }
}

pub fn availability_rows(
    user_id: UserId,
    weeks: impl IntoIterator<Item = u32>,
    buckets: (u32, u32, u32, u32),
) -> Vec<AvailabilityWeek> {
    weeks
        .into_iter()
        .map(|week| AvailabilityWeek {
            user_id,
            week,
            morning_days: buckets.0,
            daytime_days: buckets.1,
            nighttime_days: buckets.2,
            flex_days: buckets.3,
        })
        .collect()
}

pub fn availability_map(
    rows: &[AvailabilityWeek],
) -> HashMap<(UserId, u32), AvailabilityWeek> {
    rows.iter().map(|a| ((a.user_id, a.week), a.clone())).collect()
}

pub fn open_visit(id: i64, cluster_id: i64, from: NaiveDate, to: NaiveDate) -> Visit {
    Visit {
        id,
        cluster_id,
        group_id: None,
        visit_nr: id as u32,
        from_date: from,
        to_date: to,
        duration_minutes: Some(120),
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

/// Repository seeded with the standard catalogue, one project/cluster and
/// one bat-qualified researcher.
pub fn seeded_repository() -> LocalRepository {
    let repo = LocalRepository::new();
    repo.seed_catalog(standard_catalog());
    repo.seed_project(Project {
        id: 1,
        name: "Wijk aan Zee".into(),
        location: Some("Wijk aan Zee".into()),
        quote: false,
    });
    repo.seed_cluster(Cluster {
        id: 1,
        project_id: 1,
        cluster_number: 1,
        address: Some("Dorpsduinen 12".into()),
        deleted: false,
    });
    repo.seed_user(bat_user(1));
    repo
}
