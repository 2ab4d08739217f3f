//! Cluster duplication: copy a cluster's visits onto a new cluster with
//! fresh series identity.

use std::collections::HashMap;
use uuid::Uuid;

use crate::models::visit::{Cluster, ClusterId, Visit, VisitStatus};

/// Clone the visits of a source cluster for a freshly created duplicate.
///
/// Every original series (`group_id` cohort) gets a new id, `visit_nr`
/// restarts at 1, and the crew is cleared; windows, durations, weather
/// bounds, flags and catalogue relations carry over unchanged.
pub fn duplicate_cluster_visits(source_visits: &[Visit], new_cluster_id: ClusterId) -> Vec<Visit> {
    let mut ordered: Vec<&Visit> = source_visits.iter().collect();
    ordered.sort_by_key(|v| v.visit_nr);

    let mut group_map: HashMap<Uuid, Uuid> = HashMap::new();
    let mut clones = Vec::with_capacity(ordered.len());
    let mut next_nr = 1;

    for v in ordered {
        let group_id = v.group_id.map(|old| *group_map.entry(old).or_insert_with(Uuid::new_v4));
        let mut clone = v.clone();
        clone.id = 0;
        clone.cluster_id = new_cluster_id;
        clone.group_id = group_id;
        clone.visit_nr = next_nr;
        clone.researcher_ids.clear();
        clone.status = VisitStatus::Open;
        next_nr += 1;
        clones.push(clone);
    }
    clones
}

/// New cluster row for a duplication run.
pub fn duplicate_cluster(source: &Cluster, new_number: i32, new_address: String) -> Cluster {
    Cluster {
        id: 0,
        project_id: source.project_id,
        cluster_number: new_number,
        address: Some(new_address),
        deleted: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::visit::PartOfDay;
    use chrono::NaiveDate;

    fn visit(id: i64, nr: u32, group: Option<Uuid>) -> Visit {
        Visit {
            id,
            cluster_id: 1,
            group_id: group,
            visit_nr: nr,
            from_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            to_date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            duration_minutes: Some(90),
            part_of_day: Some(PartOfDay::Avond),
            start_time_text: Some("Zonsondergang".into()),
            required_researchers: 2,
            expertise_level: None,
            min_temperature_celsius: Some(10),
            max_wind_force_bft: Some(4),
            max_precipitation: None,
            wbc: true,
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
            protocol_visit_window_ids: vec![1],
            researcher_ids: vec![7, 8],
        }
    }

    #[test]
    fn test_duplication_remaps_series_and_clears_crew() {
        let series_a = Uuid::new_v4();
        let series_b = Uuid::new_v4();
        let visits = vec![
            visit(1, 1, Some(series_a)),
            visit(2, 2, Some(series_a)),
            visit(3, 3, Some(series_b)),
        ];

        let clones = duplicate_cluster_visits(&visits, 99);
        assert_eq!(clones.len(), 3);
        assert!(clones.iter().all(|c| c.cluster_id == 99));
        assert!(clones.iter().all(|c| c.researcher_ids.is_empty()));
        assert_eq!(clones.iter().map(|c| c.visit_nr).collect::<Vec<_>>(), vec![1, 2, 3]);

        // Series structure is preserved under fresh ids.
        assert_eq!(clones[0].group_id, clones[1].group_id);
        assert_ne!(clones[0].group_id, clones[2].group_id);
        assert_ne!(clones[0].group_id, Some(series_a));

        // Content carries over.
        assert_eq!(clones[0].duration_minutes, Some(90));
        assert!(clones[0].wbc);
        assert_eq!(clones[0].protocol_visit_window_ids, vec![1]);
    }
}
