//! Researchers and their qualifications.

use serde::{Deserialize, Serialize};

pub type UserId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractType {
    Intern,
    Flex,
    Zzp,
}

/// Bat-work experience ladder.
///
/// Only Junior/Medior/Senior participate in the expertise ordering used by
/// visit requirements; Nieuw and GZ rank below Junior there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatExperience {
    Nieuw,
    Junior,
    Medior,
    Senior,
    Gz,
}

impl BatExperience {
    /// Rank on the Junior(1) < Medior(2) < Senior(3) scale; 0 otherwise.
    pub fn expertise_rank(&self) -> u8 {
        match self {
            BatExperience::Junior => 1,
            BatExperience::Medior => 2,
            BatExperience::Senior => 3,
            BatExperience::Nieuw | BatExperience::Gz => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    Nl,
    En,
}

/// Boolean qualification flags carried by a researcher.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Qualifications {
    pub smp_huismus: bool,
    pub smp_vleermuis: bool,
    pub smp_gierzwaluw: bool,
    pub vrfg: bool,
    pub hub: bool,
    pub fiets: bool,
    pub wbc: bool,
    pub dvp: bool,
    pub sleutel: bool,
    pub vog: bool,
    pub pad: bool,
    pub langoor: bool,
    pub roofvogel: bool,
    pub vleermuis: bool,
    pub zwaluw: bool,
    pub vlinder: bool,
    pub teunisbloempijlstaart: bool,
    pub zangvogel: bool,
    pub biggenkruid: bool,
    pub schijfhoren: bool,
}

/// A field worker. Soft-deletable; deleted users are invisible to the
/// solvers and their e-mail uniqueness constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    pub contract: ContractType,
    pub experience_bat: Option<BatExperience>,
    pub language: Language,
    pub address: Option<String>,
    pub deleted: bool,
    pub qualifications: Qualifications,
}

impl User {
    pub fn is_intern(&self) -> bool {
        self.contract == ContractType::Intern
    }

    /// Needs supervision on multi-person bat visits.
    pub fn needs_supervision(&self) -> bool {
        self.experience_bat == Some(BatExperience::Junior) || self.contract == ContractType::Flex
    }

    /// Can supervise: Senior or Medior experience, or an intern who is not
    /// a junior.
    pub fn is_supervisor(&self) -> bool {
        matches!(
            self.experience_bat,
            Some(BatExperience::Senior) | Some(BatExperience::Medior)
        ) || (self.contract == ContractType::Intern
            && self.experience_bat != Some(BatExperience::Junior))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(contract: ContractType, exp: Option<BatExperience>) -> User {
        User {
            id: 1,
            email: "a@b.nl".into(),
            full_name: "Test".into(),
            contract,
            experience_bat: exp,
            language: Language::Nl,
            address: None,
            deleted: false,
            qualifications: Qualifications::default(),
        }
    }

    #[test]
    fn test_supervisor_definition() {
        assert!(user(ContractType::Zzp, Some(BatExperience::Senior)).is_supervisor());
        assert!(user(ContractType::Zzp, Some(BatExperience::Medior)).is_supervisor());
        assert!(user(ContractType::Intern, Some(BatExperience::Nieuw)).is_supervisor());
        assert!(user(ContractType::Intern, None).is_supervisor());
        assert!(!user(ContractType::Intern, Some(BatExperience::Junior)).is_supervisor());
        assert!(!user(ContractType::Flex, Some(BatExperience::Junior)).is_supervisor());
    }

    #[test]
    fn test_needs_supervision() {
        assert!(user(ContractType::Zzp, Some(BatExperience::Junior)).needs_supervision());
        assert!(user(ContractType::Flex, Some(BatExperience::Senior)).needs_supervision());
        assert!(!user(ContractType::Zzp, Some(BatExperience::Senior)).needs_supervision());
    }

    #[test]
    fn test_expertise_rank_ordering() {
        assert!(BatExperience::Senior.expertise_rank() > BatExperience::Medior.expertise_rank());
        assert!(BatExperience::Medior.expertise_rank() > BatExperience::Junior.expertise_rank());
        assert_eq!(BatExperience::Gz.expertise_rank(), 0);
    }
}
