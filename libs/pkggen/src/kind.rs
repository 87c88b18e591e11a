//! Package kinds and the naming and templates tied to each.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PackageError;
use crate::request::StoryId;

/// Base name shared by every generated LSB wrapper package.
pub const PACKAGE_BASE: &str = "EXTR-lsbwrapper";

/// The flavour of LSB wrapper to generate.
///
/// The first four behave as healthy services once installed; the failing
/// kinds exist to drive fault scenarios in the cluster under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageKind {
    /// Plain start/stop/status wrapper.
    Standard,
    /// Wrapper whose status check also pings loopback.
    Ping,
    /// Wrapper that fails every other start.
    FailingFlaky,
    /// Fixed build of the failing wrapper, shipped as an upgrade.
    FailingStable,
    /// Wrapper that serves HTTP.
    Http,
    /// Wrapper that lingers before going offline on stop.
    DelayedOffline,
}

impl PackageKind {
    /// Every kind, in CLI order.
    pub const ALL: [PackageKind; 6] = [
        PackageKind::Standard,
        PackageKind::Ping,
        PackageKind::FailingFlaky,
        PackageKind::FailingStable,
        PackageKind::Http,
        PackageKind::DelayedOffline,
    ];

    /// Stable selector name.
    pub const fn as_str(self) -> &'static str {
        match self {
            PackageKind::Standard => "standard",
            PackageKind::Ping => "ping",
            PackageKind::FailingFlaky => "fail",
            PackageKind::FailingStable => "fail-fixed",
            PackageKind::Http => "http",
            PackageKind::DelayedOffline => "delay",
        }
    }

    /// Package name prefix for this kind.
    ///
    /// The two failing kinds share a prefix so that the stable build upgrades
    /// the flaky one in place.
    pub const fn name_prefix(self) -> &'static str {
        match self {
            PackageKind::Standard | PackageKind::Ping => "EXTR-lsbwrapper",
            PackageKind::FailingFlaky | PackageKind::FailingStable => "EXTR-lsbwrapper-fail",
            PackageKind::Http => "EXTR-lsbwrapper-http",
            PackageKind::DelayedOffline => "EXTR-lsbwrapper-delay",
        }
    }

    /// Name of the script template rendered for this kind.
    pub const fn script_template(self) -> &'static str {
        match self {
            PackageKind::Standard => "lsb_service.sh",
            PackageKind::Ping => "lsb_service_ping.sh",
            PackageKind::FailingFlaky => "lsb_service_fail.sh",
            PackageKind::FailingStable => "lsb_service_fail_fixed.sh",
            PackageKind::Http => "lsb_service_http.sh",
            PackageKind::DelayedOffline => "lsb_service_delay.sh",
        }
    }

    /// True for kinds selected through the "invalid" CLI flag.
    pub const fn is_failing(self) -> bool {
        matches!(self, PackageKind::FailingFlaky | PackageKind::FailingStable)
    }

    /// Deterministic package name for a story and sequence number.
    pub fn package_name(self, story: &StoryId, sequence: u32) -> String {
        format!("{}-{}-{}", self.name_prefix(), story, sequence)
    }

    /// Init script and unit name for a package: the lowercased package name.
    pub fn service_name(self, story: &StoryId, sequence: u32) -> String {
        self.package_name(story, sequence).to_lowercase()
    }
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageKind {
    type Err = PackageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PackageKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| PackageError::UnknownKind(s.to_string()))
    }
}
