//! Template rendering for package sources.
//!
//! The generator never touches a template engine directly. It asks a
//! [`TemplateProvider`] to render a named template against [`TemplateVars`],
//! which keeps rendering swappable in tests.

use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;

use crate::error::GenerateError;
use crate::kind::PackageKind;
use crate::request::{PackageVersion, StoryId};

/// Template for the systemd unit installed next to the init script.
pub const UNIT_TEMPLATE: &str = "service.unit";

/// Template for the distutils build script driving `bdist_rpm`.
pub const SETUP_TEMPLATE: &str = "setup.py";

/// First port used by HTTP packages; the sequence number is added to it.
pub const HTTP_BASE_PORT: u16 = 8000;

/// Seconds a delayed-offline package waits before stopping.
pub const STOP_DELAY_SECS: u32 = 20;

/// Every template compiled into the binary, keyed by name.
const EMBEDDED: &[(&str, &str)] = &[
    ("lsb_base.sh", include_str!("../templates/lsb_base.sh.j2")),
    ("lsb_service.sh", include_str!("../templates/lsb_service.sh.j2")),
    (
        "lsb_service_ping.sh",
        include_str!("../templates/lsb_service_ping.sh.j2"),
    ),
    (
        "lsb_service_fail.sh",
        include_str!("../templates/lsb_service_fail.sh.j2"),
    ),
    (
        "lsb_service_fail_fixed.sh",
        include_str!("../templates/lsb_service_fail_fixed.sh.j2"),
    ),
    (
        "lsb_service_http.sh",
        include_str!("../templates/lsb_service_http.sh.j2"),
    ),
    (
        "lsb_service_delay.sh",
        include_str!("../templates/lsb_service_delay.sh.j2"),
    ),
    (UNIT_TEMPLATE, include_str!("../templates/service.unit.j2")),
    (SETUP_TEMPLATE, include_str!("../templates/setup.py.j2")),
];

/// Variables available to every template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateVars {
    pub package_name: String,
    pub service_name: String,
    pub script_file: String,
    pub unit_file: String,
    pub story: String,
    pub sequence: u32,
    pub version: String,
    pub kind: &'static str,
    /// Only set for HTTP packages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_port: Option<u16>,
    pub stop_delay_secs: u32,
}

impl TemplateVars {
    /// Derives the variables for one artifact.
    ///
    /// Fails for an HTTP package whose port would pass 65535.
    pub fn for_artifact(
        kind: PackageKind,
        story: &StoryId,
        sequence: u32,
        version: &PackageVersion,
    ) -> Result<Self, GenerateError> {
        let http_port = match kind {
            PackageKind::Http => Some(port_for(sequence)?),
            _ => None,
        };
        let package_name = kind.package_name(story, sequence);
        let service_name = kind.service_name(story, sequence);
        let unit_file = format!("{service_name}.service");

        Ok(Self {
            script_file: service_name.clone(),
            package_name,
            service_name,
            unit_file,
            story: story.to_string(),
            sequence,
            version: version.to_string(),
            kind: kind.as_str(),
            http_port,
            stop_delay_secs: STOP_DELAY_SECS,
        })
    }
}

fn port_for(sequence: u32) -> Result<u16, GenerateError> {
    u32::from(HTTP_BASE_PORT)
        .checked_add(sequence)
        .and_then(|port| u16::try_from(port).ok())
        .ok_or(GenerateError::PortOutOfRange { sequence })
}

/// Renders named templates.
pub trait TemplateProvider {
    /// Render the template called `name` with `vars`.
    fn render(&self, name: &'static str, vars: &TemplateVars) -> Result<String, GenerateError>;
}

/// Templates compiled into the binary, loaded once into a minijinja environment.
pub struct EmbeddedTemplates {
    env: Environment<'static>,
}

impl EmbeddedTemplates {
    /// Load every embedded template.
    ///
    /// Undefined variables are errors, so a template that references a
    /// variable the generator does not supply fails loudly.
    pub fn new() -> Result<Self, GenerateError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);

        for &(name, source) in EMBEDDED {
            env.add_template(name, source)
                .map_err(|source| GenerateError::Template { name, source })?;
        }

        Ok(Self { env })
    }
}

impl TemplateProvider for EmbeddedTemplates {
    fn render(&self, name: &'static str, vars: &TemplateVars) -> Result<String, GenerateError> {
        self.env
            .get_template(name)
            .and_then(|template| template.render(vars))
            .map_err(|source| GenerateError::Template { name, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(kind: PackageKind) -> TemplateVars {
        TemplateVars::for_artifact(
            kind,
            &StoryId::parse("777").unwrap(),
            2,
            &PackageVersion::parse("1.2").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_vars_naming() {
        let v = vars(PackageKind::DelayedOffline);
        assert_eq!(v.package_name, "EXTR-lsbwrapper-delay-777-2");
        assert_eq!(v.service_name, "extr-lsbwrapper-delay-777-2");
        assert_eq!(v.unit_file, "extr-lsbwrapper-delay-777-2.service");
        assert_eq!(v.http_port, None);
        assert_eq!(vars(PackageKind::Http).http_port, Some(8002));
    }

    #[test]
    fn test_http_port_range() {
        let story = StoryId::parse("777").unwrap();
        let version = PackageVersion::default();

        let last = TemplateVars::for_artifact(PackageKind::Http, &story, 57535, &version).unwrap();
        assert_eq!(last.http_port, Some(u16::MAX));

        for sequence in [57536, u32::MAX] {
            let err = TemplateVars::for_artifact(PackageKind::Http, &story, sequence, &version)
                .unwrap_err();
            assert!(matches!(err, GenerateError::PortOutOfRange { sequence: s } if s == sequence));
        }

        // other kinds have no port to run out of
        let vars = TemplateVars::for_artifact(PackageKind::Ping, &story, u32::MAX, &version).unwrap();
        assert_eq!(vars.sequence, u32::MAX);
    }

    #[test]
    fn test_every_kind_renders() {
        let templates = EmbeddedTemplates::new().unwrap();
        for kind in PackageKind::ALL {
            let script = templates.render(kind.script_template(), &vars(kind)).unwrap();
            assert!(script.starts_with("#!/bin/bash"), "{kind}");
            assert!(script.contains("NAME=\"extr-lsbwrapper"), "{kind}");
            assert!(script.contains("# Provides:"), "{kind}");
        }
    }

    #[test]
    fn test_kind_specific_bodies() {
        let templates = EmbeddedTemplates::new().unwrap();

        let http = templates
            .render(PackageKind::Http.script_template(), &vars(PackageKind::Http))
            .unwrap();
        assert!(http.contains("PORT=8002"));
        assert!(http.contains("http.server"));

        let delay = templates
            .render(
                PackageKind::DelayedOffline.script_template(),
                &vars(PackageKind::DelayedOffline),
            )
            .unwrap();
        assert!(delay.contains("sleep \"$STOP_DELAY\""));
        assert!(delay.contains("kill \"$(cat \"$PIDFILE\")\""));

        let flaky = templates
            .render(
                PackageKind::FailingFlaky.script_template(),
                &vars(PackageKind::FailingFlaky),
            )
            .unwrap();
        let fixed = templates
            .render(
                PackageKind::FailingStable.script_template(),
                &vars(PackageKind::FailingStable),
            )
            .unwrap();
        assert!(flaky.contains("Failed to start"));
        assert!(!fixed.contains("Failed to start"));
    }

    #[test]
    fn test_unit_and_setup_render() {
        let templates = EmbeddedTemplates::new().unwrap();
        let v = vars(PackageKind::Standard);

        let unit = templates.render(UNIT_TEMPLATE, &v).unwrap();
        assert!(unit.contains("ExecStart=/etc/init.d/extr-lsbwrapper-777-2 start"));

        let setup = templates.render(SETUP_TEMPLATE, &v).unwrap();
        assert!(setup.contains("name=\"EXTR-lsbwrapper-777-2\""));
        assert!(setup.contains("version=\"1.2\""));
    }

    #[test]
    fn test_unknown_template_is_error() {
        let templates = EmbeddedTemplates::new().unwrap();
        let err = templates
            .render("missing.sh", &vars(PackageKind::Standard))
            .unwrap_err();
        assert!(matches!(err, GenerateError::Template { name: "missing.sh", .. }));
    }
}
