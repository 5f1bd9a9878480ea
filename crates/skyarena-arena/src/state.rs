//! Arena status and lifecycle flags.

use std::fmt;

// ---------------------------------------------------------------------------
// ArenaStatus
// ---------------------------------------------------------------------------

/// Where an arena's round is. The round logic drives the transitions;
/// the registry only compares against [`ArenaStatus::Starting`].
///
/// ```text
/// Setup → Waiting → Starting → Running → Ending → Restarting → Waiting …
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ArenaStatus {
    #[default]
    Setup,
    Waiting,
    Starting,
    Running,
    Ending,
    Restarting,
}

impl ArenaStatus {
    /// Whether players may still be sent here (`<= Starting`).
    pub fn accepts_players(self) -> bool {
        self <= Self::Starting
    }
}

impl fmt::Display for ArenaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Setup => "Setup",
            Self::Waiting => "Waiting",
            Self::Starting => "Starting",
            Self::Running => "Running",
            Self::Ending => "Ending",
            Self::Restarting => "Restarting",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ArenaFlags
// ---------------------------------------------------------------------------

/// One lifecycle flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArenaFlag {
    InSetupMode,
    Crashed,
    Disabled,
}

/// Independent lifecycle flags. Any set flag keeps the arena out of
/// random selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaFlags {
    pub in_setup_mode: bool,
    pub crashed: bool,
    pub disabled: bool,
}

impl ArenaFlags {
    pub fn has(&self, flag: ArenaFlag) -> bool {
        match flag {
            ArenaFlag::InSetupMode => self.in_setup_mode,
            ArenaFlag::Crashed => self.crashed,
            ArenaFlag::Disabled => self.disabled,
        }
    }

    pub fn set(&mut self, flag: ArenaFlag, on: bool) {
        match flag {
            ArenaFlag::InSetupMode => self.in_setup_mode = on,
            ArenaFlag::Crashed => self.crashed = on,
            ArenaFlag::Disabled => self.disabled = on,
        }
    }

    /// Whether any flag is set.
    pub fn any(&self) -> bool {
        self.in_setup_mode || self.crashed || self.disabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_order_matches_round_progression() {
        assert!(ArenaStatus::Setup < ArenaStatus::Waiting);
        assert!(ArenaStatus::Waiting < ArenaStatus::Starting);
        assert!(ArenaStatus::Starting < ArenaStatus::Running);
        assert!(ArenaStatus::Ending < ArenaStatus::Restarting);
    }

    #[test]
    fn test_status_accepts_players() {
        assert!(ArenaStatus::Setup.accepts_players());
        assert!(ArenaStatus::Waiting.accepts_players());
        assert!(ArenaStatus::Starting.accepts_players());
        assert!(!ArenaStatus::Running.accepts_players());
        assert!(!ArenaStatus::Ending.accepts_players());
        assert!(!ArenaStatus::Restarting.accepts_players());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ArenaStatus::Starting.to_string(), "Starting");
        assert_eq!(ArenaStatus::default(), ArenaStatus::Setup);
    }

    #[test]
    fn test_flags_are_independent() {
        let mut flags = ArenaFlags::default();
        assert!(!flags.any());

        flags.set(ArenaFlag::Crashed, true);
        flags.set(ArenaFlag::Disabled, true);
        assert!(flags.has(ArenaFlag::Crashed));
        assert!(!flags.has(ArenaFlag::InSetupMode));

        flags.set(ArenaFlag::Crashed, false);
        assert!(flags.any(), "disabled is still set");
        flags.set(ArenaFlag::Disabled, false);
        assert!(!flags.any());
    }
}
