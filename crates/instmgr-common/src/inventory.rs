//! Node inventory parsing from the platform status report.
//!
//! The `show platform` report is a fixed-column table: node name, card
//! type, state and configuration state. Only data rows (lines starting
//! with a digit, e.g. `0/RSP0/CPU0`) are parsed; headers and separators
//! are skipped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// States accepted as stable after a reload.
///
/// A CPU node outside this set keeps the reload barrier down; `FAILED` is
/// accepted because a card that was already failed before the operation is
/// not a regression the install should wait on.
pub const ACCEPTED_NODE_STATES: &[&str] = &[
    "IOS XR RUN",
    "PRESENT",
    "UNPOWERED",
    "READY",
    "FAILED",
    "OK",
    "ADMIN DOWN",
    "DISABLED",
];

/// One row of the platform status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEntry {
    /// Card type (e.g. `A9K-RSP440-TR(Active)`).
    pub node_type: String,
    /// Operational state (e.g. `IOS XR RUN`).
    pub state: String,
    /// Configuration state (e.g. `PWR,NSHUT,MON`).
    pub config_state: String,
}

/// Returns the trimmed text of a fixed column, tolerating short lines.
fn column(line: &str, start: usize, end: Option<usize>) -> &str {
    let end = end.map_or(line.len(), |e| e.min(line.len()));
    line.get(start..end).map(str::trim).unwrap_or_default()
}

/// Parses a fixed-column platform status report into a node inventory.
///
/// Column layout: name `0..15`, type `16..41`, state `42..58`, config
/// state `59..`. Rows whose name does not start with a digit are skipped.
pub fn parse_show_platform(output: &str) -> BTreeMap<String, NodeEntry> {
    let mut inventory = BTreeMap::new();
    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || !trimmed.starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }
        let node = column(line, 0, Some(15)).to_string();
        let entry = NodeEntry {
            node_type: column(line, 16, Some(41)).to_string(),
            state: column(line, 42, Some(58)).to_string(),
            config_state: column(line, 59, None).to_string(),
        };
        inventory.insert(node, entry);
    }
    inventory
}

/// Returns true when every CPU node is in an accepted state.
///
/// Non-CPU rows (fans, power trays) are not gated on.
pub fn validate_node_states(inventory: &BTreeMap<String, NodeEntry>) -> bool {
    inventory
        .iter()
        .filter(|(node, _)| node.contains("CPU"))
        .all(|(_, entry)| ACCEPTED_NODE_STATES.contains(&entry.state.as_str()))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const REPORT: &str = "\
Node            Type                      State            Config State
-----------------------------------------------------------------------------
0/RSP0/CPU0     A9K-RSP440-TR(Active)     IOS XR RUN       PWR,NSHUT,MON
0/RSP1/CPU0     A9K-RSP440-TR(Standby)    READY            PWR,NSHUT,MON
0/0/CPU0        A9K-40GE-E                IOS XR RUN       PWR,NSHUT,MON
0/FT0/SP        ASR-9006-FAN              READY            PWR,NSHUT,MON
";

    #[test]
    fn test_parse_fixed_columns() {
        let inventory = parse_show_platform(REPORT);
        assert_eq!(inventory.len(), 4);

        let rsp = &inventory["0/RSP0/CPU0"];
        assert_eq!(rsp.node_type, "A9K-RSP440-TR(Active)");
        assert_eq!(rsp.state, "IOS XR RUN");
        assert_eq!(rsp.config_state, "PWR,NSHUT,MON");

        let standby = &inventory["0/RSP1/CPU0"];
        assert_eq!(standby.state, "READY");
    }

    #[test]
    fn test_headers_and_noise_are_skipped() {
        let inventory = parse_show_platform(
            "RP/0/RSP0/CPU0:router#admin show platform\nMon Feb 15 04:37:12.485 UTC\n",
        );
        assert!(inventory.is_empty());
    }

    #[test]
    fn test_validate_accepts_stable_states() {
        let inventory = parse_show_platform(REPORT);
        assert!(validate_node_states(&inventory));
    }

    #[test]
    fn test_validate_rejects_unstable_cpu_node() {
        let report = REPORT.replace(
            "A9K-40GE-E                IOS XR RUN ",
            "A9K-40GE-E                IN-RESET   ",
        );
        let inventory = parse_show_platform(&report);
        assert_eq!(inventory["0/0/CPU0"].state, "IN-RESET");
        assert!(!validate_node_states(&inventory));
    }

    #[test]
    fn test_non_cpu_nodes_are_not_gated() {
        let report = REPORT.replace(
            "ASR-9006-FAN              READY      ",
            "ASR-9006-FAN              IN-RESET   ",
        );
        let inventory = parse_show_platform(&report);
        assert!(validate_node_states(&inventory));
    }

    #[test]
    fn test_short_lines_do_not_panic() {
        let inventory = parse_show_platform("0/0/CPU0\n");
        assert_eq!(inventory["0/0/CPU0"].state, "");
    }
}
