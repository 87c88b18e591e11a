//! Deterministic fixture construction.

use std::collections::BTreeMap;

use tracing::debug;
use vcsfx_pkggen::{PackageKind, StoryId};

use crate::model::{Entity, FixtureDocument, FixtureOptions};

const CLUSTER_VPATH: &str = "/deployments/d1/clusters/c1/services";
const SOFTWARE_VPATH: &str = "/software/items";
const NODES: [&str; 2] = ["n1", "n2"];
const NETWORK: &str = "traffic1";

/// Builds a fixture document for one story.
///
/// Every application gets its own package, service, and HA config; vips hang
/// off applications. Application sequence numbers run across clustered
/// services, so package names never collide within a story.
#[derive(Debug, Clone)]
pub struct FixtureBuilder {
    story: StoryId,
    clustered_services: u32,
    apps_per_service: u32,
    vips_per_app: u32,
    package_kind: PackageKind,
}

impl FixtureBuilder {
    pub fn new(story: StoryId) -> Self {
        Self {
            story,
            clustered_services: 1,
            apps_per_service: 1,
            vips_per_app: 0,
            package_kind: PackageKind::Standard,
        }
    }

    pub fn clustered_services(mut self, count: u32) -> Self {
        self.clustered_services = count;
        self
    }

    pub fn apps_per_service(mut self, count: u32) -> Self {
        self.apps_per_service = count;
        self
    }

    pub fn vips_per_app(mut self, count: u32) -> Self {
        self.vips_per_app = count;
        self
    }

    /// Kind whose package names the applications install.
    pub fn package_kind(mut self, kind: PackageKind) -> Self {
        self.package_kind = kind;
        self
    }

    pub fn build(&self) -> FixtureDocument {
        let story = &self.story;
        let mut doc = FixtureDocument {
            default: defaults(),
            packages: Vec::new(),
            options: FixtureOptions {
                story: story.to_string(),
                cs_length: 0,
                app_length: 0,
                vip_length: 0,
            },
            cs: Vec::new(),
            service: Vec::new(),
            ha_service_config: Vec::new(),
            vip: Vec::new(),
        };

        let mut app_seq = 0u32;
        for cs_index in 1..=self.clustered_services {
            let cs_id = format!("CS_{story}_{cs_index}");
            let cs_vpath = format!("{CLUSTER_VPATH}/{cs_id}");
            doc.cs.push(Entity::new(
                &cs_id,
                &cs_vpath,
                None,
                options([
                    ("active", "1".to_string()),
                    ("standby", "1".to_string()),
                    ("name", cs_id.to_lowercase()),
                    ("node_list", node_list(cs_index)),
                ]),
            ));

            let mut vip_in_cs = 0u32;
            for app_index in 1..=self.apps_per_service {
                app_seq += 1;
                let package_name = self.package_kind.package_name(story, app_seq);
                let service_name = self.package_kind.service_name(story, app_seq);
                let app_id = format!("APP_{story}_{cs_index}_{app_index}");

                doc.packages.push(Entity::new(
                    format!("PKG_{story}_{app_seq}"),
                    format!("{SOFTWARE_VPATH}/{package_name}"),
                    None,
                    options([("name", package_name)]),
                ));

                doc.service.push(Entity::new(
                    &app_id,
                    format!("{cs_vpath}/applications/{app_id}"),
                    Some(cs_id.clone()),
                    options([("service_name", service_name)]),
                ));

                let hsc_id = format!("HSC_{story}_{cs_index}_{app_index}");
                doc.ha_service_config.push(Entity::new(
                    &hsc_id,
                    format!("{cs_vpath}/ha_configs/{hsc_id}"),
                    Some(app_id.clone()),
                    options([
                        ("status_interval", "10".to_string()),
                        ("status_timeout", "10".to_string()),
                        ("restart_limit", "2".to_string()),
                        ("startup_retry_limit", "2".to_string()),
                    ]),
                ));

                for vip_index in 1..=self.vips_per_app {
                    vip_in_cs += 1;
                    doc.vip.push(Entity::new(
                        format!("VIP_{story}_{app_seq}_{vip_index}"),
                        format!("{cs_vpath}/ipaddresses/ip{app_seq}_{vip_index}"),
                        Some(app_id.clone()),
                        options([
                            ("network_name", NETWORK.to_string()),
                            ("ipaddress", format!("10.10.{cs_index}.{vip_in_cs}")),
                        ]),
                    ));
                }
            }
        }

        doc.options.cs_length = doc.cs.len() as u64;
        doc.options.app_length = doc.service.len() as u64;
        doc.options.vip_length = doc.vip.len() as u64;

        debug!(
            story = %story,
            cs = doc.options.cs_length,
            apps = doc.options.app_length,
            vips = doc.options.vip_length,
            "fixture built"
        );
        doc
    }
}

fn defaults() -> BTreeMap<String, String> {
    options([
        ("network_name", NETWORK.to_string()),
        ("status_interval", "10".to_string()),
        ("status_timeout", "10".to_string()),
        ("restart_limit", "2".to_string()),
        ("startup_retry_limit", "2".to_string()),
    ])
}

/// Failover pairs alternate which node is primary.
fn node_list(cs_index: u32) -> String {
    if cs_index % 2 == 1 {
        format!("{},{}", NODES[0], NODES[1])
    } else {
        format!("{},{}", NODES[1], NODES[0])
    }
}

fn options<const N: usize>(pairs: [(&str, String); N]) -> BTreeMap<String, String> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}
