//! Canned device output for install orchestration tests.

/// `show install active summary` with a full ASR9K package set.
pub const SHOW_INSTALL_ACTIVE_FULL: &str = "\
RP/0/RSP0/CPU0:R2#show install active summary
Mon Feb 15 04:37:12.485 UTC
Default Profile:
  SDRs:
    Owner
  Active Packages:
    disk0:asr9k-mini-px-5.3.3
    disk0:asr9k-mpls-px-5.3.3
    disk0:asr9k-mcast-px-5.3.3
    disk0:asr9k-mgbl-px-5.3.3
";

/// `show install active summary` missing the mpls package.
pub const SHOW_INSTALL_ACTIVE_PARTIAL: &str = "\
RP/0/RSP0/CPU0:R2#show install active summary
Mon Feb 15 04:37:12.485 UTC
Default Profile:
  SDRs:
    Owner
  Active Packages:
    disk0:asr9k-mini-px-5.3.3
    disk0:asr9k-mcast-px-5.3.3
";

/// Status answer when nothing is running.
pub const NO_INSTALL_IN_PROGRESS: &str = "No install operation in progress";

/// An add command accepted into the background as operation 12.
pub const ADD_ACCEPTED: &str = "\
May 24 18:54:12 Install operation 12 started by root:
 install add source tftp://223.255.254.254/images ncs6k-mpls.pkg-6.1.0.07I
May 24 18:54:12 Install operation will continue in the background
";

/// An operation rejected by the device.
pub const OPERATION_ABORTED: &str = "\
May 23 22:57:46 Install operation 28 started by iox:
  install remove ncs6k-5.2.5.47I.CSCux97367-0.0.15.i
May 23 22:57:48 Error:    Cannot proceed with the remove operation
May 23 22:57:48 Install operation 28 aborted
";

/// An activate answered with the reload confirmation prompt.
pub const ACTIVATE_REBOOT_PROMPT: &str = "\
May 24 19:02:01 Install operation 9 started by root:
 install activate disk0:asr9k-mpls-px-5.3.3
This install operation will reload the sdr, continue?[yes/no]:[yes]
";

/// A clean install log for operation 12.
pub const INSTALL_LOG_OK: &str = "\
May 24 18:54:30 Install operation 12 completed successfully
";

/// Install log of operation 12 naming the package it added.
pub const INSTALL_LOG_PACKAGES_ADDED: &str = "\
May 24 18:54:20 Install operation 12 started by root:
May 24 18:54:20 Packages added:
May 24 18:54:20     ncs6k-mini-x-6.1.0
May 24 18:54:30 Install operation 12 finished successfully
";

/// An activate answered with the no-impact warning: the packages are
/// already in the requested state.
pub const NO_IMPACT_OPERATION: &str = "\
May 24 19:10:00 Install operation 14 started by root:
 install activate id 12
WARNING! This was a NO IMPACT OPERATION
";

/// A commit accepted into the background as operation 13.
pub const COMMIT_ACCEPTED: &str = "\
May 24 19:30:00 Install operation 13 started by root:
 install commit
May 24 19:30:01 Install operation will continue in the background
";

/// Builds the success line for an operation id.
pub fn operation_success(op_id: &str) -> String {
    format!("Install operation {op_id} finished successfully")
}

/// Builds a progress line for an operation id.
pub fn operation_progress(op_id: &str, percent: u32) -> String {
    format!("The install operation {op_id} is {percent}% complete")
}

/// `admin show platform` with every node stable.
pub const SHOW_PLATFORM_OK: &str = "\
Node            Type                      State            Config State
-----------------------------------------------------------------------------
0/RSP0/CPU0     A9K-RSP440-TR(Active)     IOS XR RUN       PWR,NSHUT,MON
0/RSP1/CPU0     A9K-RSP440-TR(Standby)    READY            PWR,NSHUT,MON
0/0/CPU0        A9K-40GE-E                IOS XR RUN       PWR,NSHUT,MON
";

/// `admin show platform` with a line card still booting.
pub const SHOW_PLATFORM_BOOTING: &str = "\
Node            Type                      State            Config State
-----------------------------------------------------------------------------
0/RSP0/CPU0     A9K-RSP440-TR(Active)     IOS XR RUN       PWR,NSHUT,MON
0/RSP1/CPU0     A9K-RSP440-TR(Standby)    READY            PWR,NSHUT,MON
0/0/CPU0        A9K-40GE-E                IN-RESET         PWR,NSHUT,MON
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_helpers() {
        assert_eq!(
            operation_success("12"),
            "Install operation 12 finished successfully"
        );
        assert_eq!(
            operation_progress("17", 45),
            "The install operation 17 is 45% complete"
        );
    }
}
