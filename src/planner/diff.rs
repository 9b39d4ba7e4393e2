//! Diff planner.
//!
//! Compares one application's desired state with its observed state and
//! produces the ordered [`ChangeSet`] that converges them. Planning is a pure
//! function of its inputs: the same spec, snapshot and digest always give the
//! same operations in the same order.

use std::collections::BTreeMap;
use tracing::debug;

use crate::config::{
    ApplicationSpec, DeprecatedField, HealthCheck, Lifecycle, RouteSource, RouteSpec,
    format_megabytes,
};
use crate::remote::{ActualState, LifecycleRecord, ScaleDimension};

use super::plan::{ChangeOp, ChangeSet, FieldDiff, FieldShape, Marker};

/// Computes change sets.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiffPlanner;

/// Operations grouped by phase before they are laid out in order.
#[derive(Default)]
struct Phases {
    create: Vec<ChangeOp>,
    config: Vec<ChangeOp>,
    route_adds: Vec<ChangeOp>,
    route_removals: Vec<ChangeOp>,
    upload: Option<ChangeOp>,
}

impl DiffPlanner {
    /// Creates a planner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Plans the operations converging `actual` to `spec`.
    ///
    /// `artifact_digest` is the digest of the bits to deploy; `None` means no
    /// bits are uploaded.
    #[must_use]
    pub fn plan(
        &self,
        spec: &ApplicationSpec,
        actual: &ActualState,
        artifact_digest: Option<&str>,
    ) -> ChangeSet {
        let exists = actual.exists();
        let docker = spec.is_docker();
        let mut changeset = ChangeSet::empty(&spec.name, !docker);
        let mut phases = Phases::default();

        changeset.annotations.push(name_annotation(spec, exists));

        if !exists {
            phases.create.push(ChangeOp::CreateApp {
                lifecycle: spec.lifecycle.clone(),
            });
        }

        let lifecycle_changed = self.diff_lifecycle(spec, actual, &mut phases, &mut changeset);
        let env_changed = self.diff_env(spec, actual, &mut phases, &mut changeset);
        self.diff_health_check(spec, actual, &mut phases, &mut changeset);
        self.diff_scale(spec, actual, &mut phases, &mut changeset);
        self.diff_routes(spec, actual, &mut phases, &mut changeset);

        let new_digest = artifact_digest
            .filter(|digest| !docker && actual.package_digest() != Some(*digest));
        let bits_changed = new_digest.is_some();
        phases.upload = new_digest.map(|digest| ChangeOp::UploadBits {
            before: actual.package_digest().map(ToString::to_string),
            digest: digest.to_string(),
        });

        let needs_restart = if docker {
            exists && (lifecycle_changed || env_changed)
        } else {
            !exists || bits_changed || lifecycle_changed || env_changed || !actual.has_droplet
        };

        let stop = exists && actual.is_started() && needs_restart;
        let start = !spec.no_start && (!exists || !actual.is_started() || stop);

        debug!(
            "Plan for '{}': exists={exists} restart={needs_restart} stop={stop} start={start}",
            spec.name
        );

        let mut ops = phases.create;
        if stop {
            ops.push(ChangeOp::Stop);
        }
        ops.extend(phases.config);
        ops.extend(phases.route_adds);
        ops.extend(phases.route_removals);
        ops.extend(phases.upload);
        if start {
            if !docker {
                ops.push(ChangeOp::Stage);
            }
            ops.push(ChangeOp::Start);
        }

        changeset.ops = ops;
        changeset
    }

    /// Returns true if the lifecycle changes on an existing application.
    fn diff_lifecycle(
        &self,
        spec: &ApplicationSpec,
        actual: &ActualState,
        phases: &mut Phases,
        changeset: &mut ChangeSet,
    ) -> bool {
        let current_lifecycle = actual.app.as_ref().map(|a| &a.lifecycle);

        match &spec.lifecycle {
            Lifecycle::Buildpack { buildpacks } => {
                let Some(desired) = buildpacks else {
                    return false;
                };
                let current = actual.buildpacks();

                let mut annotation = FieldDiff::new("buildpacks", FieldShape::List);
                for i in 0..desired.len().max(current.len()) {
                    match (current.get(i), desired.get(i)) {
                        (Some(old), Some(new)) if old == new => annotation.push(Marker::Unchanged, new),
                        (old, new) => {
                            if let Some(old) = old {
                                annotation.push(Marker::Removed, old);
                            }
                            if let Some(new) = new {
                                annotation.push(Marker::Added, new);
                            }
                        }
                    }
                }
                annotation.deprecations = deprecations(spec, &[DeprecatedField::Buildpack]);
                changeset.annotations.push(annotation);

                let switching = matches!(current_lifecycle, Some(LifecycleRecord::Docker { .. }));
                let changed =
                    current_lifecycle.is_some() && (switching || current != desired.as_slice());
                if changed {
                    phases.config.push(ChangeOp::SetBuildpacks {
                        before: current.to_vec(),
                        after: desired.clone(),
                    });
                }
                changed
            }
            Lifecycle::Docker { image, username } => {
                let current = actual.docker_image();
                let mut annotation = FieldDiff::new("docker image", FieldShape::Scalar);
                if current == Some(image.as_str()) {
                    annotation.push(Marker::Unchanged, image);
                } else {
                    if let Some(old) = current {
                        annotation.push(Marker::Removed, old);
                    }
                    annotation.push(Marker::Added, image);
                }
                changeset.annotations.push(annotation);

                if current == Some(image.as_str()) {
                    return false;
                }
                phases.config.push(ChangeOp::SetDockerImage {
                    before: current.map(ToString::to_string),
                    image: image.clone(),
                    username: username.clone(),
                });
                actual.exists()
            }
        }
    }

    /// Returns true if any variable is new or changed.
    fn diff_env(
        &self,
        spec: &ApplicationSpec,
        actual: &ActualState,
        phases: &mut Phases,
        changeset: &mut ChangeSet,
    ) -> bool {
        if spec.env.is_empty() {
            return false;
        }

        let mut annotation = FieldDiff::new("env", FieldShape::List);
        let mut before = BTreeMap::new();
        let mut vars = BTreeMap::new();

        for (key, value) in &spec.env {
            let current = actual.env.get(key);
            if current == Some(value) {
                annotation.push(Marker::Unchanged, key);
                continue;
            }
            if current.is_some() {
                annotation.push(Marker::Removed, key);
            }
            annotation.push(Marker::Added, key);
            before.insert(key.clone(), current.cloned());
            vars.insert(key.clone(), value.clone());
        }
        changeset.annotations.push(annotation);

        if vars.is_empty() {
            return false;
        }
        phases.config.push(ChangeOp::SetEnv { before, vars });
        true
    }

    fn diff_health_check(
        &self,
        spec: &ApplicationSpec,
        actual: &ActualState,
        phases: &mut Phases,
        changeset: &mut ChangeSet,
    ) {
        let Some(desired) = &spec.health_check else {
            return;
        };
        let current: Option<&HealthCheck> =
            actual.process.as_ref().and_then(|p| p.health_check.as_ref());

        let mut annotation = scalar_annotation(
            "health check",
            current.map(ToString::to_string),
            desired.to_string(),
        );
        annotation.deprecations = deprecations(spec, &[DeprecatedField::HealthCheckNone]);
        changeset.annotations.push(annotation);

        if current != Some(desired) {
            phases.config.push(ChangeOp::SetHealthCheck {
                before: current.cloned(),
                after: desired.clone(),
            });
        }
    }

    fn diff_scale(
        &self,
        spec: &ApplicationSpec,
        actual: &ActualState,
        phases: &mut Phases,
        changeset: &mut ChangeSet,
    ) {
        let process = actual.process.as_ref();
        let dimensions = [
            (
                ScaleDimension::Instances,
                spec.instances.map(u64::from),
                process.map(|p| u64::from(p.instances)),
            ),
            (
                ScaleDimension::Memory,
                spec.memory_mb,
                process.map(|p| p.memory_mb),
            ),
            (ScaleDimension::Disk, spec.disk_mb, process.map(|p| p.disk_mb)),
        ];

        for (dimension, desired, current) in dimensions {
            let Some(desired) = desired else {
                continue;
            };

            let display = |v: u64| match dimension {
                ScaleDimension::Instances => v.to_string(),
                ScaleDimension::Memory | ScaleDimension::Disk => format_megabytes(v),
            };
            changeset.annotations.push(scalar_annotation(
                &dimension.to_string(),
                current.map(display),
                display(desired),
            ));

            if current != Some(desired) {
                phases.config.push(ChangeOp::Scale {
                    dimension,
                    before: current,
                    after: desired,
                });
            }
        }
    }

    fn diff_routes(
        &self,
        spec: &ApplicationSpec,
        actual: &ActualState,
        phases: &mut Phases,
        changeset: &mut ChangeSet,
    ) {
        let mut annotation = FieldDiff::new("routes", FieldShape::List);
        annotation.deprecations = deprecations(
            spec,
            &[
                DeprecatedField::Host,
                DeprecatedField::Hosts,
                DeprecatedField::Domain,
                DeprecatedField::Domains,
            ],
        );

        let keep_existing =
            spec.routes.source == RouteSource::Default && !actual.mapped_routes.is_empty();

        if keep_existing {
            for record in &actual.mapped_routes {
                annotation.push(Marker::Unchanged, record.route.to_string());
            }
        } else {
            for route in &spec.routes.routes {
                self.add_route(route, actual, phases, &mut annotation);
            }

            for record in &actual.mapped_routes {
                if spec.routes.contains(&record.route) {
                    continue;
                }
                if spec.routes.source == RouteSource::Flag {
                    annotation.push(Marker::Unchanged, record.route.to_string());
                    continue;
                }
                annotation.push(Marker::Removed, record.route.to_string());
                phases.route_removals.push(ChangeOp::UnmapRoute {
                    route: record.route.clone(),
                    route_guid: record.guid.clone(),
                });
                if record.other_destinations == 0 {
                    phases.route_removals.push(ChangeOp::DeleteRoute {
                        route: record.route.clone(),
                        route_guid: record.guid.clone(),
                    });
                }
            }
        }

        if !annotation.entries.is_empty() || !annotation.deprecations.is_empty() {
            changeset.annotations.push(annotation);
        }
    }

    fn add_route(
        &self,
        route: &RouteSpec,
        actual: &ActualState,
        phases: &mut Phases,
        annotation: &mut FieldDiff,
    ) {
        if actual.mapped(route).is_some() {
            annotation.push(Marker::Unchanged, route.to_string());
            return;
        }

        annotation.push(Marker::Added, route.to_string());
        match actual.known(route) {
            Some(record) => phases.route_adds.push(ChangeOp::MapRoute {
                route: route.clone(),
                route_guid: Some(record.guid.clone()),
            }),
            None => {
                phases.route_adds.push(ChangeOp::CreateRoute {
                    route: route.clone(),
                });
                phases.route_adds.push(ChangeOp::MapRoute {
                    route: route.clone(),
                    route_guid: None,
                });
            }
        }
    }
}

fn name_annotation(spec: &ApplicationSpec, exists: bool) -> FieldDiff {
    let mut annotation = FieldDiff::new("name", FieldShape::Scalar);
    let marker = if exists { Marker::Unchanged } else { Marker::Added };
    annotation.push(marker, &spec.name);
    annotation
}

fn scalar_annotation(field: &str, current: Option<String>, desired: String) -> FieldDiff {
    let mut annotation = FieldDiff::new(field, FieldShape::Scalar);
    match current {
        Some(old) if old == desired => annotation.push(Marker::Unchanged, desired),
        Some(old) => {
            annotation.push(Marker::Removed, old);
            annotation.push(Marker::Added, desired);
        }
        None => annotation.push(Marker::Added, desired),
    }
    annotation
}

fn deprecations(spec: &ApplicationSpec, fields: &[DeprecatedField]) -> Vec<String> {
    spec.deprecations
        .iter()
        .filter(|d| fields.contains(&d.field))
        .map(|d| d.message.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Deprecation, HealthCheckType, RouteSet};
    use crate::planner::plan::OpKind;
    use crate::remote::{AppRecord, AppState, PackageRecord, ProcessRecord, RouteRecord};

    const DIGEST: &str = "d1";

    fn route(host: &str) -> RouteSpec {
        RouteSpec::http(host, "example.com")
    }

    fn spec_with(routes: Vec<RouteSpec>, source: RouteSource) -> ApplicationSpec {
        ApplicationSpec::new("web", RouteSet::new(routes, source))
    }

    fn default_spec() -> ApplicationSpec {
        spec_with(vec![route("web")], RouteSource::Default)
    }

    fn record(host: &str, guid: &str, others: usize) -> RouteRecord {
        RouteRecord {
            guid: guid.to_string(),
            route: route(host),
            other_destinations: others,
        }
    }

    /// A started app that matches `default_spec` after a previous push.
    fn deployed() -> ActualState {
        ActualState {
            app: Some(AppRecord {
                guid: String::from("app-1"),
                name: String::from("web"),
                state: AppState::Started,
                lifecycle: LifecycleRecord::Buildpacks(Vec::new()),
            }),
            process: Some(ProcessRecord {
                guid: String::from("p-1"),
                instances: 1,
                memory_mb: 256,
                disk_mb: 1024,
                health_check: None,
            }),
            env: BTreeMap::new(),
            mapped_routes: vec![record("web", "r-1", 0)],
            known_routes: Vec::new(),
            package: Some(PackageRecord {
                guid: String::from("pkg-1"),
                digest: Some(DIGEST.to_string()),
                image: None,
            }),
            has_droplet: true,
        }
    }

    #[test]
    fn test_new_app_full_sequence() {
        let cs = DiffPlanner::new().plan(&default_spec(), &ActualState::absent(), Some(DIGEST));
        assert_eq!(
            cs.kinds(),
            vec![
                OpKind::CreateApp,
                OpKind::CreateRoute,
                OpKind::MapRoute,
                OpKind::UploadBits,
                OpKind::Stage,
                OpKind::Start,
            ]
        );
        assert!(cs.check_ordering().is_ok());
    }

    #[test]
    fn test_unchanged_app_is_empty() {
        let planner = DiffPlanner::new();
        let cs = planner.plan(&default_spec(), &deployed(), Some(DIGEST));
        assert!(cs.is_empty(), "{cs}");
    }

    #[test]
    fn test_planning_is_deterministic() {
        let planner = DiffPlanner::new();
        let mut spec = spec_with(vec![route("b"), route("a")], RouteSource::Explicit);
        spec.instances = Some(3);
        let a = planner.plan(&spec, &deployed(), Some("d2"));
        let b = planner.plan(&spec, &deployed(), Some("d2"));
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_buildpack_reorder_is_positional() {
        let mut spec = default_spec();
        spec.lifecycle = Lifecycle::Buildpack {
            buildpacks: Some(vec![String::from("b"), String::from("a")]),
        };
        let mut actual = deployed();
        if let Some(app) = actual.app.as_mut() {
            app.lifecycle = LifecycleRecord::Buildpacks(vec![String::from("a"), String::from("b")]);
        }

        let cs = DiffPlanner::new().plan(&spec, &actual, Some(DIGEST));
        assert_eq!(cs.count(OpKind::SetBuildpacks), 1);

        let buildpacks = cs
            .annotations
            .iter()
            .find(|a| a.field == "buildpacks")
            .unwrap();
        let markers: Vec<(Marker, &str)> = buildpacks
            .entries
            .iter()
            .map(|e| (e.marker, e.value.as_str()))
            .collect();
        assert_eq!(
            markers,
            vec![
                (Marker::Removed, "a"),
                (Marker::Added, "b"),
                (Marker::Removed, "b"),
                (Marker::Added, "a"),
            ]
        );

        assert_eq!(
            cs.kinds(),
            vec![OpKind::Stop, OpKind::SetBuildpacks, OpKind::Stage, OpKind::Start]
        );
        assert!(cs.check_ordering().is_ok());
    }

    #[test]
    fn test_new_bits_restage_running_app() {
        let cs = DiffPlanner::new().plan(&default_spec(), &deployed(), Some("d2"));
        assert_eq!(
            cs.kinds(),
            vec![OpKind::Stop, OpKind::UploadBits, OpKind::Stage, OpKind::Start]
        );
    }

    #[test]
    fn test_scale_only_leaves_app_running() {
        let mut spec = default_spec();
        spec.instances = Some(3);
        spec.memory_mb = Some(256);

        let cs = DiffPlanner::new().plan(&spec, &deployed(), Some(DIGEST));
        assert_eq!(cs.kinds(), vec![OpKind::Scale]);
        assert!(matches!(
            cs.ops[0],
            ChangeOp::Scale {
                dimension: ScaleDimension::Instances,
                before: Some(1),
                after: 3
            }
        ));

        let memory = cs.annotations.iter().find(|a| a.field == "memory").unwrap();
        assert!(!memory.is_changed());
    }

    #[test]
    fn test_routes_keep_first_appearance_order() {
        let spec = spec_with(vec![route("zeta"), route("alpha")], RouteSource::Explicit);
        let cs = DiffPlanner::new().plan(&spec, &ActualState::absent(), None);

        let created: Vec<String> = cs
            .ops
            .iter()
            .filter(|op| op.kind() == OpKind::CreateRoute)
            .filter_map(|op| op.route().map(ToString::to_string))
            .collect();
        assert_eq!(created, vec!["zeta.example.com", "alpha.example.com"]);
    }

    #[test]
    fn test_explicit_routes_replace_mapped_ones() {
        let spec = spec_with(vec![route("new")], RouteSource::Explicit);
        let mut actual = deployed();
        actual.mapped_routes.push(record("shared", "r-2", 1));

        let cs = DiffPlanner::new().plan(&spec, &actual, Some(DIGEST));
        assert_eq!(
            cs.kinds(),
            vec![
                OpKind::CreateRoute,
                OpKind::MapRoute,
                OpKind::UnmapRoute,
                OpKind::DeleteRoute,
                OpKind::UnmapRoute,
            ]
        );
        assert!(cs.check_ordering().is_ok());
    }

    #[test]
    fn test_flag_routes_are_added_alongside_mapped_ones() {
        let spec = spec_with(vec![route("second")], RouteSource::Flag);
        let cs = DiffPlanner::new().plan(&spec, &deployed(), Some(DIGEST));

        assert_eq!(cs.kinds(), vec![OpKind::CreateRoute, OpKind::MapRoute]);
        let routes = cs.annotations.iter().find(|a| a.field == "routes").unwrap();
        assert!(routes
            .entries
            .iter()
            .any(|e| e.marker == Marker::Unchanged && e.value == "web.example.com"));
        assert!(!routes.entries.iter().any(|e| e.marker == Marker::Removed));
    }

    #[test]
    fn test_every_plan_satisfies_ordering() {
        let desired: Vec<ApplicationSpec> = {
            let mut explicit = spec_with(vec![route("new"), route("web")], RouteSource::Explicit);
            explicit.env.insert(String::from("MODE"), String::from("prod"));
            explicit.instances = Some(3);

            let mut no_route = default_spec();
            no_route.routes = RouteSet::no_route();
            no_route.memory_mb = Some(512);

            let mut no_start = spec_with(vec![route("other")], RouteSource::Explicit);
            no_start.no_start = true;
            no_start.disk_mb = Some(2048);

            let mut docker = spec_with(vec![route("web")], RouteSource::Flag);
            docker.lifecycle = Lifecycle::Docker {
                image: String::from("nginx:1"),
                username: None,
            };

            let mut buildpacks = spec_with(vec![route("web")], RouteSource::Explicit);
            buildpacks.lifecycle = Lifecycle::Buildpack {
                buildpacks: Some(vec![String::from("go_buildpack")]),
            };
            buildpacks.health_check = Some(HealthCheck {
                check_type: HealthCheckType::Http,
                endpoint: Some(String::from("/health")),
            });

            vec![
                default_spec(),
                explicit,
                no_route,
                no_start,
                docker,
                buildpacks,
                spec_with(vec![route("flagged")], RouteSource::Flag),
            ]
        };

        let actuals: Vec<ActualState> = {
            let stopped = {
                let mut a = deployed();
                if let Some(app) = a.app.as_mut() {
                    app.state = AppState::Stopped;
                }
                a
            };
            let no_droplet = ActualState {
                has_droplet: false,
                ..deployed()
            };
            let crowded = {
                let mut a = deployed();
                a.mapped_routes.push(record("old", "r-2", 0));
                a.mapped_routes.push(record("shared", "r-3", 2));
                a.known_routes.push(record("new", "r-4", 1));
                a
            };
            vec![ActualState::absent(), deployed(), stopped, no_droplet, crowded]
        };

        let planner = DiffPlanner::new();
        let mut restage_with_removals = false;
        for spec in &desired {
            for actual in &actuals {
                for digest in [Some(DIGEST), Some("d2"), None] {
                    let cs = planner.plan(spec, actual, digest);
                    assert!(cs.check_ordering().is_ok(), "ordering violated:\n{cs}");
                    restage_with_removals |= cs.count(OpKind::Stop) > 0
                        && cs.count(OpKind::UnmapRoute) > 0
                        && cs.count(OpKind::SetEnv) + cs.count(OpKind::Scale) > 0;
                }
            }
        }
        assert!(restage_with_removals);
    }

    #[test]
    fn test_existing_route_is_mapped_not_created() {
        let spec = spec_with(vec![route("web")], RouteSource::Explicit);
        let actual = ActualState {
            known_routes: vec![record("web", "r-9", 1)],
            ..ActualState::absent()
        };

        let cs = DiffPlanner::new().plan(&spec, &actual, None);
        assert_eq!(cs.count(OpKind::CreateRoute), 0);
        assert!(cs.ops.contains(&ChangeOp::MapRoute {
            route: route("web"),
            route_guid: Some(String::from("r-9")),
        }));
    }

    #[test]
    fn test_default_routes_yield_to_existing_mappings() {
        let spec = spec_with(vec![route("web")], RouteSource::Default);
        let mut actual = deployed();
        actual.mapped_routes = vec![record("custom", "r-5", 0)];

        let cs = DiffPlanner::new().plan(&spec, &actual, Some(DIGEST));
        assert!(cs.is_empty());
    }

    #[test]
    fn test_no_route_unmaps_everything() {
        let mut spec = default_spec();
        spec.routes = RouteSet::no_route();

        let cs = DiffPlanner::new().plan(&spec, &deployed(), Some(DIGEST));
        assert_eq!(cs.kinds(), vec![OpKind::UnmapRoute, OpKind::DeleteRoute]);
    }

    #[test]
    fn test_no_start_stops_without_start() {
        let mut spec = default_spec();
        spec.no_start = true;

        let cs = DiffPlanner::new().plan(&spec, &deployed(), Some("d2"));
        assert_eq!(cs.kinds(), vec![OpKind::Stop, OpKind::UploadBits]);

        let fresh = DiffPlanner::new().plan(&spec, &ActualState::absent(), Some(DIGEST));
        assert_eq!(fresh.count(OpKind::Start), 0);
        assert_eq!(fresh.count(OpKind::Stage), 0);
    }

    #[test]
    fn test_stopped_app_is_staged_and_started() {
        let mut actual = deployed();
        if let Some(app) = actual.app.as_mut() {
            app.state = AppState::Stopped;
        }
        let cs = DiffPlanner::new().plan(&default_spec(), &actual, Some(DIGEST));
        assert_eq!(cs.kinds(), vec![OpKind::Stage, OpKind::Start]);
    }

    #[test]
    fn test_env_change_restages() {
        let mut spec = default_spec();
        spec.env.insert(String::from("MODE"), String::from("prod"));
        let mut actual = deployed();
        actual.env.insert(String::from("MODE"), String::from("dev"));
        actual.env.insert(String::from("OTHER"), String::from("x"));

        let cs = DiffPlanner::new().plan(&spec, &actual, Some(DIGEST));
        assert_eq!(
            cs.kinds(),
            vec![OpKind::Stop, OpKind::SetEnv, OpKind::Stage, OpKind::Start]
        );
        if let ChangeOp::SetEnv { vars, before } = &cs.ops[1] {
            assert_eq!(vars.len(), 1);
            assert_eq!(before.get("MODE"), Some(&Some(String::from("dev"))));
        }
    }

    #[test]
    fn test_docker_app_skips_upload_and_stage() {
        let mut spec = default_spec();
        spec.lifecycle = Lifecycle::Docker {
            image: String::from("nginx:1.27"),
            username: None,
        };

        let cs = DiffPlanner::new().plan(&spec, &ActualState::absent(), Some(DIGEST));
        assert_eq!(
            cs.kinds(),
            vec![
                OpKind::CreateApp,
                OpKind::SetDockerImage,
                OpKind::CreateRoute,
                OpKind::MapRoute,
                OpKind::Start,
            ]
        );
        assert!(cs.check_ordering().is_ok());
    }

    #[test]
    fn test_health_check_change() {
        let mut spec = default_spec();
        spec.health_check = Some(HealthCheck {
            check_type: HealthCheckType::Http,
            endpoint: Some(String::from("/health")),
        });
        spec.deprecations.push(Deprecation {
            field: DeprecatedField::Buildpack,
            message: String::from("buildpack is deprecated"),
        });

        let cs = DiffPlanner::new().plan(&spec, &deployed(), Some(DIGEST));
        assert_eq!(cs.kinds(), vec![OpKind::SetHealthCheck]);
    }

    #[test]
    fn test_deprecation_attached_to_unchanged_field() {
        let mut spec = default_spec();
        spec.lifecycle = Lifecycle::Buildpack {
            buildpacks: Some(Vec::new()),
        };
        spec.deprecations.push(Deprecation {
            field: DeprecatedField::Buildpack,
            message: String::from("buildpack is deprecated"),
        });

        let cs = DiffPlanner::new().plan(&spec, &deployed(), Some(DIGEST));
        assert!(cs.is_empty());
        let buildpacks = cs
            .annotations
            .iter()
            .find(|a| a.field == "buildpacks")
            .unwrap();
        assert_eq!(buildpacks.deprecations, vec![String::from("buildpack is deprecated")]);
    }
}
