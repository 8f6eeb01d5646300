//! Turns a [`StatusSnapshot`] into the text report or a JSON document.

use super::error::{JsonSnafu, Result};
use super::{AppSummary, StatusIcon, StatusSnapshot};
use snafu::ResultExt;
use std::fmt::Write;
use tabled::object::Segment;
use tabled::{Alignment, Modify, Style, Table, Tabled, Width};

/// The full snapshot as pretty-printed JSON, for scripting against the status output.
pub fn render_json(snapshot: &StatusSnapshot) -> Result<String> {
    serde_json::to_string_pretty(snapshot).context(JsonSnafu)
}

/// The human readable report, section by section. `width` bounds the apps table.
pub fn render_text(snapshot: &StatusSnapshot, width: usize) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Cluster: {}", snapshot.cluster_name);
    for node in &snapshot.nodes {
        let _ = writeln!(
            out,
            "  {} {} ({})",
            ready_icon(node.ready),
            node.name,
            node.role
        );
    }
    if let Some(registry) = &snapshot.registry {
        match (&registry.running, &registry.address) {
            (true, Some(address)) => {
                let _ = writeln!(out, "  [OK] registry ({})", address);
            }
            (true, None) => {
                let _ = writeln!(out, "  [OK] registry");
            }
            (false, _) => {
                let _ = writeln!(out, "  [FAIL] registry (not running)");
            }
        }
    }

    if !snapshot.addons.is_empty() {
        let _ = writeln!(out, "\nAddons:");
        for addon in &snapshot.addons {
            match &addon.version {
                Some(version) => {
                    let _ = writeln!(
                        out,
                        "  {} {} ({})",
                        ready_icon(addon.ready),
                        addon.name,
                        version
                    );
                }
                None => {
                    let _ = writeln!(out, "  {} {}", ready_icon(addon.ready), addon.name);
                }
            }
        }
    }

    if !snapshot.sources.is_empty() || !snapshot.kustomizations.is_empty() {
        let _ = writeln!(out, "\nGitOps:");
        for source in &snapshot.sources {
            match &source.revision {
                Some(revision) => {
                    let _ = writeln!(out, "  {} {} @ {}", source.icon, source.name, revision);
                }
                None => {
                    let _ = writeln!(out, "  {} {}", source.icon, source.name);
                }
            }
        }
        for kustomization in &snapshot.kustomizations {
            let _ = write!(out, "  {} {}", kustomization.icon, kustomization.name);
            if kustomization.icon != StatusIcon::Ok {
                if let Some(message) = &kustomization.message {
                    let _ = write!(out, ": {}", message);
                }
            }
            let _ = writeln!(out);
        }
    }

    if !snapshot.apps.is_empty() {
        let _ = writeln!(out, "\nApps:");
        let _ = writeln!(out, "{}", apps_table(&snapshot.apps, width));
        for app in &snapshot.apps {
            for url in &app.urls {
                let _ = writeln!(out, "  {}: {}", app.name, url);
            }
        }
    }

    let _ = writeln!(out, "\nHealth: {}", snapshot.health.summary);
    for issue in &snapshot.health.issues {
        let _ = writeln!(out, "  {}", issue);
    }

    out
}

fn ready_icon(ready: bool) -> &'static str {
    if ready {
        "[OK]"
    } else {
        "[FAIL]"
    }
}

fn apps_table(apps: &[AppSummary], width: usize) -> String {
    let mut rows = Vec::new();
    for app in apps {
        for workload in &app.workloads {
            rows.push(AppRow {
                app: app.name.clone(),
                namespace: app.namespace.clone(),
                stack: app.stack.clone(),
                workload: format!("{}/{}", workload.kind.to_lowercase(), workload.name),
                ready: workload.replicas.clone(),
                version: workload.version.clone(),
            });
        }
        for service in &app.services {
            let state = if service.pending {
                "pending".to_string()
            } else {
                service.external.clone().unwrap_or_default()
            };
            rows.push(AppRow {
                app: app.name.clone(),
                namespace: app.namespace.clone(),
                stack: app.stack.clone(),
                workload: format!("service/{}", service.name),
                ready: service.service_type.clone(),
                version: if state.is_empty() { None } else { Some(state) },
            });
        }
    }
    rows.sort_by(|a, b| a.app.cmp(&b.app).then_with(|| a.workload.cmp(&b.workload)));

    Table::new(rows)
        .with(Style::blank())
        .with(Modify::new(Segment::all()).with(Alignment::left()))
        .with(Width::truncate(width))
        .with(Width::increase(width))
        .to_string()
}

#[derive(Tabled, Default, Clone)]
struct AppRow {
    #[tabled(rename = "APP")]
    app: String,
    #[tabled(rename = "NAMESPACE")]
    namespace: String,
    #[tabled(rename = "STACK")]
    #[tabled(display_with = "display_option")]
    stack: Option<String>,
    #[tabled(rename = "RESOURCE")]
    workload: String,
    #[tabled(rename = "READY")]
    ready: String,
    #[tabled(rename = "VERSION")]
    #[tabled(display_with = "display_option")]
    version: Option<String>,
}

fn display_option(o: &Option<String>) -> String {
    match o {
        Some(value) => value.clone(),
        None => "".to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::status::{
        AddonSummary, HealthReport, KustomizationSummary, NodeSummary, ServiceSummary,
        SourceSummary, WorkloadSummary,
    };

    fn snapshot() -> StatusSnapshot {
        StatusSnapshot {
            cluster_name: "hostk8s".to_string(),
            nodes: vec![NodeSummary {
                name: "hostk8s-control-plane".to_string(),
                role: "control-plane".to_string(),
                ready: true,
            }],
            registry: None,
            addons: vec![AddonSummary {
                name: "metrics-server".to_string(),
                ready: true,
                version: Some("v0.7.2".to_string()),
            }],
            sources: vec![SourceSummary {
                name: "flux-system-sample".to_string(),
                icon: StatusIcon::Ok,
                revision: Some("main@sha1:abcdef0".to_string()),
            }],
            kustomizations: vec![KustomizationSummary {
                name: "bootstrap-sample".to_string(),
                icon: StatusIcon::Waiting,
                stack: Some("sample".to_string()),
                message: Some("dependency 'flux-system/certs' is not ready".to_string()),
            }],
            apps: vec![AppSummary {
                name: "voting-app".to_string(),
                namespace: "default".to_string(),
                stack: None,
                workloads: vec![WorkloadSummary {
                    name: "vote".to_string(),
                    kind: "Deployment".to_string(),
                    replicas: "1/2".to_string(),
                    ready: false,
                    version: Some("v1.0.3".to_string()),
                }],
                services: vec![ServiceSummary {
                    name: "vote".to_string(),
                    service_type: "LoadBalancer".to_string(),
                    external: None,
                    pending: true,
                }],
                urls: vec!["http://localhost:8080/vote".to_string()],
            }],
            health: HealthReport {
                healthy: false,
                summary: "0 of 1 components ready".to_string(),
                issues: Vec::new(),
            },
        }
    }

    #[test]
    fn text_report_contains_all_sections() {
        let text = render_text(&snapshot(), 120);
        assert!(text.contains("Cluster: hostk8s"));
        assert!(text.contains("[OK] hostk8s-control-plane (control-plane)"));
        assert!(text.contains("[OK] metrics-server (v0.7.2)"));
        assert!(text.contains("[OK] flux-system-sample @ main@sha1:abcdef0"));
        assert!(text
            .contains("[WAITING] bootstrap-sample: dependency 'flux-system/certs' is not ready"));
        assert!(text.contains("voting-app"));
        assert!(text.contains("pending"));
        assert!(text.contains("voting-app: http://localhost:8080/vote"));
        assert!(text.contains("Health: 0 of 1 components ready"));
    }

    #[test]
    fn apps_table_is_bounded_by_the_terminal_width() {
        let snap = snapshot();
        for width in [40, 80, 120] {
            let table = apps_table(&snap.apps, width);
            for line in table.lines() {
                assert!(
                    line.chars().count() <= width,
                    "line wider than {}: '{}'",
                    width,
                    line
                );
            }
        }
    }

    #[test]
    fn apps_table_lists_workloads_and_services() {
        let table = apps_table(&snapshot().apps, 120);
        assert!(table.contains("RESOURCE"));
        assert!(table.contains("deployment/vote"));
        assert!(table.contains("service/vote"));
        assert!(table.contains("LoadBalancer"));
        assert!(table.contains("pending"));
    }

    #[test]
    fn json_report_round_trips() {
        let json = render_json(&snapshot()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["cluster_name"], "hostk8s");
        assert_eq!(value["apps"][0]["workloads"][0]["replicas"], "1/2");
        assert_eq!(value["health"]["healthy"], false);
    }
}
