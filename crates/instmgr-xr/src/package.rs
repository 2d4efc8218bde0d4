//! Software package identity model.
//!
//! Install workflows constantly decide "what is already on the device
//! versus what must change" from raw package tokens: file names, internal
//! names, `disk0:` prefixed paths, and whole `show install active` reports.
//! [`SoftwarePackage`] parses one token into a structured, comparable
//! identity; invalid tokens (free text, separators, unrelated files) are
//! dropped silently, never reported as errors, because callers routinely
//! feed mixed token streams.
//!
//! Naming grammars differ per family. A few examples:
//!
//! ```text
//! disk0:asr9k-mini-px-4.3.2                  base image, architecture px
//! asr9k-px-4.3.2.sp2-1.0.0                   service pack 2, revision 1.0.0
//! disk0:asr9k-px-5.3.3.CSCux61372-0.0.5      SMU for defect CSCux61372
//! ncs6k-mcast-5.2.4                          feature package
//! ncs6k-5.2.5.CSCuy47880-1.0.0               SMU, dotted version grammar
//! asr9k-mcast-x64-2.0.0.0-r61116I.x86_64.rpm compact release grammar
//! ```

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use once_cell::sync::Lazy;
use regex::Regex;

/// Known platform tags, matched as `<tag>-` substrings.
///
/// First match wins; keep more specific names first since some family
/// names are near-prefixes of others.
const PLATFORMS: &[&str] = &["ncs5500", "ncs6k", "ncs5k", "ncs1k", "asr9k"];

/// Package kinds for the NCS families. Order matters: first match wins.
const NCS_KINDS: &[&str] = &[
    "sysadmin", "full", "mini", "mcast", "mgbl", "mpls", "k9sec", "doc", "li", "xr",
];

/// Package kinds for the ASR9K family. `mpls-te-rsvp` must precede `mpls`.
const ASR9K_KINDS: &[&str] = &[
    "bgp",
    "eigrp",
    "full",
    "isis",
    "k9sec",
    "li",
    "m2m",
    "mcast",
    "mgbl",
    "mini",
    "xr",
    "mpls-te-rsvp",
    "mpls",
    "optic",
    "ospf",
    "parser",
];

/// Dotted version: `5.2.4`, `5.2.5.47I`, `6.1.1.16I`.
static DOTTED_VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+\.\d+\.\d+(\.\d+\w+)?").expect("Invalid regex pattern"));

/// Compact release: a run-together digit form such as `61116`.
static COMPACT_VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{3,}").expect("Invalid regex pattern"));

/// Defect identifier: vendor prefix, two letters, five digits.
static SMU_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"CSC[a-z]{2}\d{5}").expect("Invalid regex pattern"));

/// Service-pack marker: `sp`, `sp2`, `fp10`, as a standalone segment.
static SP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(sp|fp)\d{0,2}\b").expect("Invalid regex pattern"));

/// Four-part revision used by ASR9K RPM names: `-2.0.0.0-`.
static ASR9K_SUBVERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-(\d+\.\d+\.\d+\.\d+)-").expect("Invalid regex pattern"));

/// Revision following an SMU or service-pack marker: `…CSCuy47880-0.0.4`.
static MARKER_SUBVERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:CSC|\b(?:sp|fp)\d{0,2}\b).*(\d+\.\d+\.\d+)").expect("Invalid regex pattern")
});

fn kinds_for(platform: &str) -> &'static [&'static str] {
    match platform {
        "asr9k" => ASR9K_KINDS,
        _ => NCS_KINDS,
    }
}

/// True for the kinds that all denote the whole base image.
fn is_base_image(kind: &str) -> bool {
    matches!(kind, "xr" | "mini" | "full")
}

fn detect_platform(name: &str) -> Option<&'static str> {
    PLATFORMS
        .iter()
        .find(|p| name.contains(&format!("{p}-")))
        .copied()
}

fn detect_kind(name: &str, platform: &str) -> Option<&'static str> {
    kinds_for(platform)
        .iter()
        .find(|k| name.contains(&format!("-{k}-")))
        .copied()
}

fn detect_architecture(name: &str) -> Option<&'static str> {
    if name.contains("-px-") {
        Some("px")
    } else if name.contains("-p-") {
        Some("p")
    } else {
        None
    }
}

/// The ASR9K grammar accepts a dotted version only when it is not
/// immediately continued by another numeric component or a dash (those
/// belong to a package revision, not the release), and otherwise falls
/// back to the compact run-together release form.
fn asr9k_version(name: &str) -> Option<String> {
    for m in DOTTED_VERSION_RE.find_iter(name) {
        let rest = &name[m.end()..];
        let continues_numeric = rest.as_bytes().first() == Some(&b'.')
            && rest.as_bytes().get(1).is_some_and(u8::is_ascii_digit);
        if !continues_numeric && !rest.starts_with('-') {
            return Some(m.as_str().to_string());
        }
    }
    COMPACT_VERSION_RE.find(name).map(|m| m.as_str().to_string())
}

fn detect_version(name: &str, platform: &str) -> Option<String> {
    match platform {
        "asr9k" => asr9k_version(name),
        _ => DOTTED_VERSION_RE.find(name).map(|m| m.as_str().to_string()),
    }
}

/// Sub-versions denote a revision *of* a fix or service pack, so one is
/// extracted only when such a marker is present.
fn detect_subversion(name: &str, platform: &str, has_marker: bool) -> Option<String> {
    if !has_marker {
        return None;
    }
    if platform == "asr9k" {
        if let Some(c) = ASR9K_SUBVERSION_RE.captures(name) {
            return Some(c[1].to_string());
        }
    }
    MARKER_SUBVERSION_RE
        .captures(name)
        .map(|c| c[1].to_string())
}

/// Structured identity of one software package token.
///
/// Immutable once parsed. Equality treats the base-image kinds (`xr`,
/// `mini`, `full`) as interchangeable and skips the sub-version when
/// either side lacks one.
#[derive(Debug, Clone)]
pub struct SoftwarePackage {
    name: String,
    platform: &'static str,
    kind: Option<&'static str>,
    architecture: Option<&'static str>,
    version: String,
    smu: Option<String>,
    sp: Option<String>,
    subversion: Option<String>,
}

impl SoftwarePackage {
    /// Parses a raw token into an identity.
    ///
    /// Returns `None` for anything that is not a package: an identity is
    /// valid only when platform and version resolve and at least one of
    /// kind, fix identifier or service-pack marker resolves.
    pub fn parse(token: &str) -> Option<Self> {
        let platform = detect_platform(token)?;
        let version = detect_version(token, platform)?;
        let kind = detect_kind(token, platform);
        let smu = SMU_RE.find(token).map(|m| m.as_str().to_string());
        let sp = SP_RE.find(token).map(|m| m.as_str().to_string());
        if kind.is_none() && smu.is_none() && sp.is_none() {
            return None;
        }
        let subversion = detect_subversion(token, platform, smu.is_some() || sp.is_some());
        Some(Self {
            name: token.to_string(),
            platform,
            kind,
            architecture: detect_architecture(token),
            version,
            smu,
            sp,
            subversion,
        })
    }

    /// The raw token this identity was parsed from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Platform tag.
    pub fn platform(&self) -> &str {
        self.platform
    }

    /// Package kind, when the token names one.
    pub fn kind(&self) -> Option<&str> {
        self.kind
    }

    /// Architecture tag (`px`/`p`), when present.
    pub fn architecture(&self) -> Option<&str> {
        self.architecture
    }

    /// Release version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Fix (defect) identifier, when the token is an SMU.
    pub fn smu(&self) -> Option<&str> {
        self.smu.as_deref()
    }

    /// Service-pack marker, when present.
    pub fn sp(&self) -> Option<&str> {
        self.sp.as_deref()
    }

    /// Revision of the fix or service pack, when present.
    pub fn subversion(&self) -> Option<&str> {
        self.subversion.as_deref()
    }

    /// True when this identity denotes the whole base image.
    pub fn is_base_image(&self) -> bool {
        self.kind.is_some_and(is_base_image)
    }

    /// Parses a token stream into a deduplicated identity set.
    ///
    /// Invalid tokens are dropped silently.
    pub fn from_tokens<I, S>(tokens: I) -> HashSet<SoftwarePackage>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tokens
            .into_iter()
            .filter_map(|t| Self::parse(t.as_ref()))
            .collect()
    }

    /// Parses a whole command report (e.g. `show install active`) into an
    /// identity set by splitting on whitespace.
    pub fn from_show_output(output: &str) -> HashSet<SoftwarePackage> {
        Self::from_tokens(output.split_whitespace())
    }
}

impl fmt::Display for SoftwarePackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl PartialEq for SoftwarePackage {
    fn eq(&self, other: &Self) -> bool {
        let kind_same = match (self.kind, other.kind) {
            (Some(a), Some(b)) => a == b || (is_base_image(a) && is_base_image(b)),
            (a, b) => a == b,
        };
        let subversion_same = match (&self.subversion, &other.subversion) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        self.platform == other.platform
            && kind_same
            && self.version == other.version
            && self.smu == other.smu
            && self.sp == other.sp
            && subversion_same
    }
}

impl Eq for SoftwarePackage {}

impl Hash for SoftwarePackage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.platform.hash(state);
        // Base-image kinds are interchangeable for equality and must land
        // in the same bucket; the sub-version is skipped when absent on
        // either side and so cannot be hashed at all.
        self.kind
            .map(|k| if is_base_image(k) { "xr" } else { k })
            .hash(state);
        self.version.hash(state);
        self.smu.hash(state);
        self.sp.hash(state);
    }
}

/// Result of comparing the current and desired package sets.
#[derive(Debug, Default)]
pub struct PackageDiff {
    /// Desired but not currently present.
    pub to_add: HashSet<SoftwarePackage>,
    /// Currently present but not desired.
    pub to_remove: HashSet<SoftwarePackage>,
}

/// Computes `desired − current` and `current − desired`.
pub fn diff(
    current: &HashSet<SoftwarePackage>,
    desired: &HashSet<SoftwarePackage>,
) -> PackageDiff {
    PackageDiff {
        to_add: desired.difference(current).cloned().collect(),
        to_remove: current.difference(desired).cloned().collect(),
    }
}
