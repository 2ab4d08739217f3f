//! Researcher qualification rules for weekly assignment.

use tracing::warn;

use crate::models::catalog::{normalize_family_name, Catalog};
use crate::models::user::User;
use crate::models::visit::Visit;
use crate::services::skills::any_function_contains;

/// Family (or species) name -> required qualification flag.
fn family_flag(user: &User, key: &str) -> Option<bool> {
    let q = &user.qualifications;
    let flag = match key {
        "biggenkruid" => q.biggenkruid,
        "langoren" => q.langoor,
        "pad" => q.pad,
        "roofvogel" => q.roofvogel,
        "schijfhoren" => q.schijfhoren,
        "vleermuis" => q.vleermuis,
        // Butterfly species share one flag.
        "vlinder" | "grote vos" | "iepenpage" => q.vlinder,
        "teunisbloempijlstaart" => q.teunisbloempijlstaart,
        "huismus" => q.zangvogel,
        "zangvogel" => q.zangvogel,
        "zwaluw" => q.zwaluw,
        _ => return None,
    };
    Some(flag)
}

fn first_function_is_smp(catalog: &Catalog, visit: &Visit) -> bool {
    visit
        .function_ids
        .first()
        .and_then(|id| catalog.function(*id))
        .map(|f| f.name.trim_start().to_uppercase().starts_with("SMP"))
        .unwrap_or(false)
}

/// True when the user may be assigned to the visit.
///
/// Rules:
/// - the user must hold the family flag for every species on the visit;
///   for SMP visits the specialised `smp_*` flag replaces the family check
/// - `Vliegroute`/`Foerageergebied` functions require `vrfg`
/// - a bat expertise requirement must be met on the Junior < Medior <
///   Senior scale
/// - each of the hub/fiets/wbc/dvp/vog visit flags requires the matching
///   user flag (`sleutel` is covered by intern capacity, not here)
pub fn qualifies_user_for_visit(catalog: &Catalog, user: &User, visit: &Visit) -> bool {
    let is_smp = first_function_is_smp(catalog, visit);
    let mut smp_ok = false;

    if is_smp {
        let fam_name = visit
            .species_ids
            .first()
            .and_then(|id| catalog.family_of_species(*id))
            .map(|f| normalize_family_name(&f.name))
            .unwrap_or_default();
        let q = &user.qualifications;
        smp_ok = match fam_name.as_str() {
            "vleermuis" => q.smp_vleermuis,
            "zwaluw" => q.smp_gierzwaluw,
            "huismus" | "zangvogel" => q.smp_huismus,
            other => {
                warn!(family = other, visit = visit.id, "unknown SMP family; cannot qualify");
                return false;
            }
        };
        if !smp_ok {
            return false;
        }
    }

    if !is_smp || !smp_ok {
        for sp_id in &visit.species_ids {
            let Some(sp) = catalog.species(*sp_id) else { continue };
            let key = catalog
                .family(sp.family_id)
                .map(|f| f.name.trim().to_lowercase())
                .unwrap_or_else(|| sp.name.trim().to_lowercase());
            if let Some(false) = family_flag(user, &key) {
                return false;
            }
            // Species-name enforcement as an extra safety net.
            let sp_key = sp.name.trim().to_lowercase();
            if let Some(false) = family_flag(user, &sp_key) {
                return false;
            }
        }
    }

    // Bat expertise requirement.
    if let Some(required) = visit.expertise_level {
        let has_bat_species = visit.species_ids.iter().any(|id| {
            catalog
                .family_of_species(*id)
                .map(|f| normalize_family_name(&f.name) == "vleermuis")
                .unwrap_or(false)
        });
        if has_bat_species && required.expertise_rank() > 0 {
            let user_rank = user.experience_bat.map(|e| e.expertise_rank()).unwrap_or(0);
            if user_rank < required.expertise_rank() {
                return false;
            }
        }
    }

    if any_function_contains(catalog, visit, &["Vliegroute", "Foerageergebied"])
        && !user.qualifications.vrfg
    {
        return false;
    }

    let q = &user.qualifications;
    let flag_pairs = [
        (visit.hub, q.hub),
        (visit.fiets, q.fiets),
        (visit.wbc, q.wbc),
        (visit.dvp, q.dvp),
        (visit.vog, q.vog),
    ];
    if flag_pairs.iter().any(|(needed, held)| *needed && !held) {
        return false;
    }

    true
}
