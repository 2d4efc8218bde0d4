//! Install workflow phases.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A phase of the install workflow.
///
/// Phases form a fixed ordered list; operation units declare the phases
/// they participate in and the scheduler dispatches them per phase. The
/// mutating phases Add, Activate and Deactivate have their pre-phase run
/// automatically first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Checks before an upgrade workflow starts.
    #[serde(rename = "Pre-Upgrade")]
    PreUpgrade,
    /// Checks before packages are added.
    #[serde(rename = "Pre-Add")]
    PreAdd,
    /// Copy packages from the repository onto the device.
    Add,
    /// Checks before packages are activated.
    #[serde(rename = "Pre-Activate")]
    PreActivate,
    /// Activate added packages (may reload the device).
    Activate,
    /// Checks before packages are deactivated.
    #[serde(rename = "Pre-Deactivate")]
    PreDeactivate,
    /// Deactivate packages.
    Deactivate,
    /// Checks before packages are removed.
    #[serde(rename = "Pre-Remove")]
    PreRemove,
    /// Remove inactive packages from the device.
    Remove,
    /// Commit the active set so it survives reloads.
    Commit,
}

/// The fixed ordered phase list.
pub const INSTALL_PHASES: [Phase; 10] = [
    Phase::PreUpgrade,
    Phase::PreAdd,
    Phase::Add,
    Phase::PreActivate,
    Phase::Activate,
    Phase::PreDeactivate,
    Phase::Deactivate,
    Phase::PreRemove,
    Phase::Remove,
    Phase::Commit,
];

impl Phase {
    /// Returns the phase name as used in job descriptions and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::PreUpgrade => "Pre-Upgrade",
            Phase::PreAdd => "Pre-Add",
            Phase::Add => "Add",
            Phase::PreActivate => "Pre-Activate",
            Phase::Activate => "Activate",
            Phase::PreDeactivate => "Pre-Deactivate",
            Phase::Deactivate => "Deactivate",
            Phase::PreRemove => "Pre-Remove",
            Phase::Remove => "Remove",
            Phase::Commit => "Commit",
        }
    }

    /// Returns the pre-phase run automatically before this phase, if any.
    ///
    /// Only Add, Activate and Deactivate carry an auto-pre phase.
    pub fn auto_pre(&self) -> Option<Phase> {
        match self {
            Phase::Add => Some(Phase::PreAdd),
            Phase::Activate => Some(Phase::PreActivate),
            Phase::Deactivate => Some(Phase::PreDeactivate),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a phase name.
#[derive(Debug, Error)]
#[error("unknown phase '{0}'")]
pub struct PhaseParseError(pub String);

impl FromStr for Phase {
    type Err = PhaseParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        INSTALL_PHASES
            .iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| PhaseParseError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order() {
        assert_eq!(INSTALL_PHASES[0], Phase::PreUpgrade);
        assert_eq!(INSTALL_PHASES[9], Phase::Commit);
        assert_eq!(INSTALL_PHASES.len(), 10);
    }

    #[test]
    fn test_auto_pre_mapping() {
        assert_eq!(Phase::Add.auto_pre(), Some(Phase::PreAdd));
        assert_eq!(Phase::Activate.auto_pre(), Some(Phase::PreActivate));
        assert_eq!(Phase::Deactivate.auto_pre(), Some(Phase::PreDeactivate));
        assert_eq!(Phase::Commit.auto_pre(), None);
        assert_eq!(Phase::PreAdd.auto_pre(), None);
    }

    #[test]
    fn test_parse_round_trip() {
        for phase in INSTALL_PHASES {
            assert_eq!(phase.as_str().parse::<Phase>().unwrap(), phase);
        }
        assert_eq!("pre-activate".parse::<Phase>().unwrap(), Phase::PreActivate);
        assert!("Reboot".parse::<Phase>().is_err());
    }
}
