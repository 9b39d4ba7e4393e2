//! Desired-state resolution.
//!
//! Merges manifest blocks, command-line flags and platform defaults into one
//! [`ApplicationSpec`] per application. Resolution is pure: the platform
//! defaults are fetched beforehand and handed in as a value.

use crate::error::ResolutionError;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

use super::manifest::{Manifest, RawApplication};
use super::spec::{
    ApplicationSpec, DeprecatedField, Deprecation, DomainInfo, DomainKind, HealthCheck,
    HealthCheckType, Lifecycle, RouteSet, RouteSource, RouteSpec, parse_megabytes,
};
use super::validator::ManifestValidator;

/// Buildpack flag values that reset an application to auto-detection.
const AUTODETECT_BUILDPACKS: &[&str] = &["null", "default"];

/// Command-line overrides for a push.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushFlags {
    /// Application name argument.
    pub app_name: Option<String>,
    /// Repeated `-b` values, in order.
    pub buildpacks: Vec<String>,
    /// Docker image.
    pub docker_image: Option<String>,
    /// Docker registry username.
    pub docker_username: Option<String>,
    /// Hostname for the route.
    pub hostname: Option<String>,
    /// Domain for the route.
    pub domain: Option<String>,
    /// Path for the route.
    pub route_path: Option<String>,
    /// Disables routing.
    pub no_route: bool,
    /// Prevents starting the application.
    pub no_start: bool,
    /// Path to the application bits.
    pub path: Option<PathBuf>,
    /// Instance count.
    pub instances: Option<u32>,
    /// Memory quantity.
    pub memory: Option<String>,
    /// Disk quantity.
    pub disk: Option<String>,
    /// Health check type.
    pub health_check_type: Option<String>,
    /// Health check HTTP endpoint.
    pub health_check_endpoint: Option<String>,
}

impl PushFlags {
    /// Returns true if any flag other than the application name is set.
    #[must_use]
    pub fn has_overrides(&self) -> bool {
        !self.buildpacks.is_empty()
            || self.docker_image.is_some()
            || self.docker_username.is_some()
            || self.has_route_overrides()
            || self.no_route
            || self.no_start
            || self.path.is_some()
            || self.instances.is_some()
            || self.memory.is_some()
            || self.disk.is_some()
            || self.health_check_type.is_some()
            || self.health_check_endpoint.is_some()
    }

    /// Returns true if a hostname, domain or route path flag is set.
    #[must_use]
    pub const fn has_route_overrides(&self) -> bool {
        self.hostname.is_some() || self.domain.is_some() || self.route_path.is_some()
    }
}

/// Platform-provided defaults used during resolution.
#[derive(Debug, Clone, Default)]
pub struct PlatformDefaults {
    /// Domains visible in the targeted org.
    pub domains: Vec<DomainInfo>,
    /// Default shared domain for generated routes.
    pub default_domain: Option<String>,
    /// Buildpack applied when an application names none.
    pub fallback_buildpack: Option<String>,
}

impl PlatformDefaults {
    /// Builds defaults from the domain list, using the first HTTP domain as default.
    #[must_use]
    pub fn from_domains(domains: Vec<DomainInfo>) -> Self {
        let default_domain = domains
            .iter()
            .find(|d| d.kind == DomainKind::Http)
            .map(|d| d.name.clone());
        Self {
            domains,
            default_domain,
            fallback_buildpack: None,
        }
    }

    /// Sets the fallback buildpack.
    #[must_use]
    pub fn with_fallback_buildpack(mut self, buildpack: impl Into<String>) -> Self {
        self.fallback_buildpack = Some(buildpack.into());
        self
    }

    /// Looks up a domain by name, case-insensitively.
    #[must_use]
    pub fn domain(&self, name: &str) -> Option<&DomainInfo> {
        self.domains.iter().find(|d| d.name.eq_ignore_ascii_case(name))
    }
}

/// The result of resolving a push.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// One spec per application, in manifest order.
    pub specs: Vec<ApplicationSpec>,
    /// Deprecation and validation warnings for the diagnostic stream.
    pub warnings: Vec<String>,
}

/// Resolves manifest, flags and defaults into application specs.
#[derive(Debug)]
pub struct DesiredStateResolver<'a> {
    defaults: &'a PlatformDefaults,
}

impl<'a> DesiredStateResolver<'a> {
    /// Creates a resolver over the given platform defaults.
    #[must_use]
    pub const fn new(defaults: &'a PlatformDefaults) -> Self {
        Self { defaults }
    }

    /// Resolves the push input.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolutionError`] on contradictory or invalid input.
    pub fn resolve(
        &self,
        manifest: Option<&Manifest>,
        flags: &PushFlags,
    ) -> Result<Resolution, ResolutionError> {
        let mut warnings = Vec::new();

        let blocks: Vec<(RawApplication, bool)> = match manifest {
            Some(m) if !m.applications.is_empty() => {
                let validation = ManifestValidator::new().validate(m)?;
                warnings.extend(validation.warnings);
                Self::select_blocks(m, flags)?
            }
            _ => {
                let name = flags
                    .app_name
                    .clone()
                    .ok_or(ResolutionError::MissingAppName)?;
                let block = RawApplication {
                    name: Some(name),
                    ..RawApplication::default()
                };
                vec![(block, true)]
            }
        };

        let mut specs = Vec::with_capacity(blocks.len());
        for (block, apply_flags) in &blocks {
            let overrides = apply_flags.then_some(flags);
            let spec = self.resolve_application(block, overrides)?;
            warnings.extend(spec.deprecations.iter().map(|d| d.message.clone()));
            specs.push(spec);
        }

        info!("Resolved {} application(s)", specs.len());
        Ok(Resolution { specs, warnings })
    }

    /// Picks the manifest blocks to push, and whether flags apply to each.
    fn select_blocks(
        manifest: &Manifest,
        flags: &PushFlags,
    ) -> Result<Vec<(RawApplication, bool)>, ResolutionError> {
        let apps = &manifest.applications;

        if let Some(name) = &flags.app_name {
            if apps.len() == 1 {
                let mut block = apps[0].clone();
                block.name = Some(name.clone());
                return Ok(vec![(block, true)]);
            }
            let block = apps
                .iter()
                .find(|a| a.name.as_deref() == Some(name.as_str()))
                .ok_or_else(|| ResolutionError::AppNotInManifest { name: name.clone() })?;
            return Ok(vec![(block.clone(), true)]);
        }

        if apps.len() > 1 && flags.has_overrides() {
            return Err(ResolutionError::FlagsWithMultipleApps);
        }

        let apply_flags = apps.len() == 1;
        Ok(apps.iter().map(|a| (a.clone(), apply_flags)).collect())
    }

    /// Resolves one application block with optional flag overrides.
    fn resolve_application(
        &self,
        block: &RawApplication,
        flags: Option<&PushFlags>,
    ) -> Result<ApplicationSpec, ResolutionError> {
        let name = block.name_or_empty().trim().to_string();
        let mut deprecations = Vec::new();

        let lifecycle = self.resolve_lifecycle(&name, block, flags, &mut deprecations)?;
        let routes = self.resolve_routes(&name, block, flags, &mut deprecations)?;

        let instances = flags.and_then(|f| f.instances).or(block.instances);
        let memory = flags
            .and_then(|f| f.memory.clone())
            .or_else(|| block.memory.as_ref().map(ToString::to_string));
        let disk = flags
            .and_then(|f| f.disk.clone())
            .or_else(|| block.disk_quota.as_ref().map(ToString::to_string));

        let env: BTreeMap<String, String> = block
            .env
            .iter()
            .flatten()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect();

        let health_check = Self::resolve_health_check(&name, block, flags, &mut deprecations)?;

        let spec = ApplicationSpec {
            path: flags.and_then(|f| f.path.clone()).or_else(|| block.path.clone()),
            lifecycle,
            routes,
            instances,
            memory_mb: parse_quantity(&name, "memory", memory.as_deref())?,
            disk_mb: parse_quantity(&name, "disk_quota", disk.as_deref())?,
            env,
            health_check,
            no_start: flags.is_some_and(|f| f.no_start) || block.no_start == Some(true),
            deprecations,
            name,
        };

        debug!(
            "Resolved '{}': {} route(s), lifecycle {:?}",
            spec.name,
            spec.routes.routes.len(),
            spec.lifecycle
        );
        Ok(spec)
    }

    /// Resolves buildpacks or docker image.
    fn resolve_lifecycle(
        &self,
        app: &str,
        block: &RawApplication,
        flags: Option<&PushFlags>,
        deprecations: &mut Vec<Deprecation>,
    ) -> Result<Lifecycle, ResolutionError> {
        if block.buildpack.is_some() {
            deprecations.push(Deprecation {
                field: DeprecatedField::Buildpack,
                message: String::from(
                    "Deprecation warning: Use of buildpack attribute in manifest is deprecated in favor of 'buildpacks'.",
                ),
            });
        }

        let flag_buildpacks = flags.map(|f| f.buildpacks.as_slice()).unwrap_or_default();
        let buildpacks = if flag_buildpacks.is_empty() {
            block
                .buildpacks
                .clone()
                .or_else(|| block.buildpack.clone().map(|b| vec![b]))
                .map(|list| normalize_buildpacks(app, &list))
                .transpose()?
        } else {
            Some(normalize_buildpacks(app, flag_buildpacks)?)
        };

        let docker = flags
            .and_then(|f| f.docker_image.clone())
            .map(|image| (image, flags.and_then(|f| f.docker_username.clone())))
            .or_else(|| block.docker.clone().map(|d| (d.image, d.username)));

        match (docker, buildpacks) {
            (Some(_), Some(_)) => Err(ResolutionError::DockerWithBuildpacks {
                app: app.to_string(),
            }),
            (Some((image, username)), None) => Ok(Lifecycle::Docker { image, username }),
            (None, buildpacks) => Ok(Lifecycle::Buildpack {
                buildpacks: buildpacks
                    .or_else(|| self.defaults.fallback_buildpack.clone().map(|b| vec![b])),
            }),
        }
    }

    /// Resolves the desired route set.
    fn resolve_routes(
        &self,
        app: &str,
        block: &RawApplication,
        flags: Option<&PushFlags>,
        deprecations: &mut Vec<Deprecation>,
    ) -> Result<RouteSet, ResolutionError> {
        if flags.is_some_and(|f| f.no_route) || block.no_route == Some(true) {
            return Ok(RouteSet::no_route());
        }

        if let Some(flags) = flags.filter(|f| f.has_route_overrides()) {
            let route = self.flag_route(app, flags)?;
            return Ok(RouteSet::new([route], RouteSource::Flag));
        }

        if let Some(raw_routes) = &block.routes {
            let routes = raw_routes
                .iter()
                .map(|r| self.parse_route(app, &r.route))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(RouteSet::new(routes, RouteSource::Explicit));
        }

        if block.has_legacy_route_fields() {
            return self.legacy_routes(app, block, deprecations);
        }

        let routes = self
            .defaults
            .default_domain
            .as_ref()
            .map(|domain| RouteSpec::http(app.to_lowercase(), domain.to_lowercase()));
        Ok(RouteSet::new(routes, RouteSource::Default))
    }

    /// Builds the single route described by `--hostname`, `--domain` and `--route-path`.
    fn flag_route(&self, app: &str, flags: &PushFlags) -> Result<RouteSpec, ResolutionError> {
        let domain_name = flags
            .domain
            .clone()
            .or_else(|| self.defaults.default_domain.clone())
            .ok_or_else(|| ResolutionError::UnknownDomain {
                app: app.to_string(),
                domain: String::from("<default>"),
            })?;
        let domain = self.lookup_domain(app, &domain_name)?;

        match domain.kind {
            DomainKind::Tcp => {
                if flags.hostname.as_deref().is_some_and(|h| !h.is_empty()) {
                    return Err(ResolutionError::HostnameWithTcpDomain {
                        app: app.to_string(),
                        domain: domain.name.clone(),
                    });
                }
                if flags.route_path.is_some() {
                    return Err(ResolutionError::InvalidRoute {
                        app: app.to_string(),
                        route: domain.name.clone(),
                        reason: String::from("a path cannot be used with a TCP domain"),
                    });
                }
                Ok(RouteSpec::bare(domain.name.to_lowercase()))
            }
            DomainKind::Http => {
                let host = flags.hostname.as_deref().unwrap_or(app).to_lowercase();
                let mut route = if host.is_empty() {
                    RouteSpec::bare(domain.name.to_lowercase())
                } else {
                    RouteSpec::http(host, domain.name.to_lowercase())
                };
                route.path = flags.route_path.as_deref().map(normalize_path);
                Ok(route)
            }
        }
    }

    /// Expands the deprecated `host`/`hosts`/`domain`/`domains` fields.
    fn legacy_routes(
        &self,
        app: &str,
        block: &RawApplication,
        deprecations: &mut Vec<Deprecation>,
    ) -> Result<RouteSet, ResolutionError> {
        let fields = [
            (DeprecatedField::Host, "host", block.host.is_some()),
            (DeprecatedField::Hosts, "hosts", block.hosts.is_some()),
            (DeprecatedField::Domain, "domain", block.domain.is_some()),
            (DeprecatedField::Domains, "domains", block.domains.is_some()),
        ];
        for (field, attr, present) in fields {
            if present {
                deprecations.push(Deprecation {
                    field,
                    message: format!(
                        "Deprecation warning: Specifying app manifest attribute '{attr}' is deprecated; use 'routes' instead."
                    ),
                });
            }
        }

        let mut hosts: Vec<String> = block.host.iter().chain(block.hosts.iter().flatten()).cloned().collect();
        if hosts.is_empty() {
            hosts.push(app.to_string());
        }

        let mut domains: Vec<String> =
            block.domain.iter().chain(block.domains.iter().flatten()).cloned().collect();
        if domains.is_empty() {
            domains.extend(self.defaults.default_domain.clone());
        }

        let mut routes = Vec::new();
        for domain_name in &domains {
            let domain = self.lookup_domain(app, domain_name)?;
            if domain.kind == DomainKind::Tcp {
                if block.host.is_some() || block.hosts.is_some() {
                    return Err(ResolutionError::HostnameWithTcpDomain {
                        app: app.to_string(),
                        domain: domain.name.clone(),
                    });
                }
                routes.push(RouteSpec::bare(domain.name.to_lowercase()));
                continue;
            }
            for host in &hosts {
                routes.push(RouteSpec::http(host.to_lowercase(), domain.name.to_lowercase()));
            }
        }

        Ok(RouteSet::new(routes, RouteSource::Explicit))
    }

    /// Parses a `host.domain[:port][/path]` string against the known domains.
    ///
    /// The longest known domain that is a suffix of the host part wins.
    ///
    /// # Errors
    ///
    /// Returns an error if no known domain matches or the parts do not fit the
    /// domain kind.
    pub fn parse_route(&self, app: &str, raw: &str) -> Result<RouteSpec, ResolutionError> {
        let invalid = |reason: &str| ResolutionError::InvalidRoute {
            app: app.to_string(),
            route: raw.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = raw.trim().to_lowercase();
        let (authority, path) = match trimmed.find('/') {
            Some(idx) => (&trimmed[..idx], Some(trimmed[idx..].to_string())),
            None => (trimmed.as_str(), None),
        };
        let (fqdn, port) = match authority.rsplit_once(':') {
            Some((fqdn, port)) => {
                let port = port.parse::<u16>().map_err(|_| invalid("invalid port"))?;
                (fqdn, Some(port))
            }
            None => (authority, None),
        };
        if fqdn.is_empty() {
            return Err(invalid("missing domain"));
        }

        let domain = self
            .defaults
            .domains
            .iter()
            .filter(|d| {
                let name = d.name.to_lowercase();
                fqdn == name || fqdn.ends_with(&format!(".{name}"))
            })
            .max_by_key(|d| d.name.len())
            .ok_or_else(|| ResolutionError::UnknownDomain {
                app: app.to_string(),
                domain: fqdn.to_string(),
            })?;

        let host = fqdn
            .strip_suffix(&domain.name.to_lowercase())
            .and_then(|prefix| prefix.strip_suffix('.'))
            .filter(|h| !h.is_empty())
            .map(str::to_string);

        match domain.kind {
            DomainKind::Tcp => {
                if host.is_some() {
                    return Err(ResolutionError::HostnameWithTcpDomain {
                        app: app.to_string(),
                        domain: domain.name.clone(),
                    });
                }
                if path.is_some() {
                    return Err(invalid("a path cannot be used with a TCP domain"));
                }
            }
            DomainKind::Http => {
                if port.is_some() {
                    return Err(invalid("a port can only be used with a TCP domain"));
                }
            }
        }

        Ok(RouteSpec {
            host,
            domain: domain.name.to_lowercase(),
            path,
            port,
        })
    }

    /// Resolves the health check from flags and manifest.
    fn resolve_health_check(
        app: &str,
        block: &RawApplication,
        flags: Option<&PushFlags>,
        deprecations: &mut Vec<Deprecation>,
    ) -> Result<Option<HealthCheck>, ResolutionError> {
        let raw_type = flags
            .and_then(|f| f.health_check_type.clone())
            .or_else(|| block.health_check_type.clone());
        let endpoint = flags
            .and_then(|f| f.health_check_endpoint.clone())
            .or_else(|| block.health_check_http_endpoint.clone());

        let Some(raw_type) = raw_type else {
            if endpoint.is_some() {
                return Err(endpoint_error(app));
            }
            return Ok(None);
        };

        let (check_type, deprecated) =
            HealthCheckType::parse(&raw_type).map_err(|message| ResolutionError::InvalidField {
                app: app.to_string(),
                field: String::from("health-check-type"),
                message,
            })?;
        if deprecated {
            deprecations.push(Deprecation {
                field: DeprecatedField::HealthCheckNone,
                message: String::from(
                    "Deprecation warning: Value 'none' for health-check-type is deprecated in favor of 'process'.",
                ),
            });
        }

        if endpoint.is_some() && check_type != HealthCheckType::Http {
            return Err(endpoint_error(app));
        }

        Ok(Some(HealthCheck {
            check_type,
            endpoint: endpoint.as_deref().map(normalize_path),
        }))
    }

    /// Looks up a domain, failing when the platform does not know it.
    fn lookup_domain(&self, app: &str, name: &str) -> Result<&DomainInfo, ResolutionError> {
        self.defaults
            .domain(name)
            .ok_or_else(|| ResolutionError::UnknownDomain {
                app: app.to_string(),
                domain: name.to_string(),
            })
    }
}

/// Maps buildpack names, turning a lone `null`/`default` into auto-detection.
fn normalize_buildpacks(app: &str, list: &[String]) -> Result<Vec<String>, ResolutionError> {
    let is_reset = |b: &String| AUTODETECT_BUILDPACKS.contains(&b.as_str());

    if list.iter().any(is_reset) {
        if list.len() > 1 {
            return Err(ResolutionError::InvalidField {
                app: app.to_string(),
                field: String::from("buildpacks"),
                message: String::from("'null' or 'default' cannot be combined with other buildpacks"),
            });
        }
        return Ok(Vec::new());
    }

    Ok(list.to_vec())
}

fn parse_quantity(app: &str, field: &str, value: Option<&str>) -> Result<Option<u64>, ResolutionError> {
    value
        .map(|v| {
            parse_megabytes(v).map_err(|_| ResolutionError::InvalidQuantity {
                app: app.to_string(),
                field: field.to_string(),
                value: v.to_string(),
            })
        })
        .transpose()
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

fn endpoint_error(app: &str) -> ResolutionError {
    ResolutionError::InvalidField {
        app: app.to_string(),
        field: String::from("health-check-http-endpoint"),
        message: String::from("only valid with health-check-type http"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::manifest::ManifestLoader;

    fn defaults() -> PlatformDefaults {
        PlatformDefaults::from_domains(vec![
            DomainInfo {
                guid: String::from("d-1"),
                name: String::from("example.com"),
                kind: DomainKind::Http,
            },
            DomainInfo {
                guid: String::from("d-2"),
                name: String::from("apps.example.com"),
                kind: DomainKind::Http,
            },
            DomainInfo {
                guid: String::from("d-3"),
                name: String::from("tcp.example.com"),
                kind: DomainKind::Tcp,
            },
        ])
    }

    fn manifest(yaml: &str) -> Manifest {
        ManifestLoader::new().parse_yaml(yaml).unwrap()
    }

    fn named(name: &str) -> PushFlags {
        PushFlags {
            app_name: Some(name.to_string()),
            ..PushFlags::default()
        }
    }

    #[test]
    fn test_singular_buildpack_is_coerced_with_warning() {
        let d = defaults();
        let m = manifest(
            r"
applications:
  - name: site
    buildpack: staticfile_buildpack
",
        );
        let resolution = DesiredStateResolver::new(&d)
            .resolve(Some(&m), &PushFlags::default())
            .unwrap();
        let spec = &resolution.specs[0];

        assert_eq!(spec.buildpacks(), Some(&[String::from("staticfile_buildpack")][..]));
        assert!(spec.is_deprecated(DeprecatedField::Buildpack));
        assert!(resolution.warnings[0].starts_with("Deprecation warning: Use of buildpack"));
    }

    #[test]
    fn test_plural_buildpacks_without_warning() {
        let d = defaults();
        let m = manifest(
            r"
applications:
  - name: site
    buildpacks: [a, b]
",
        );
        let resolution = DesiredStateResolver::new(&d)
            .resolve(Some(&m), &PushFlags::default())
            .unwrap();
        let spec = &resolution.specs[0];

        assert_eq!(spec.buildpacks(), Some(&[String::from("a"), String::from("b")][..]));
        assert!(spec.deprecations.is_empty());
        assert!(resolution.warnings.is_empty());
    }

    #[test]
    fn test_buildpack_flags_replace_manifest() {
        let d = defaults();
        let m = manifest(
            r"
applications:
  - name: site
    buildpacks: [ruby_buildpack]
",
        );
        let flags = PushFlags {
            buildpacks: vec![String::from("php_buildpack"), String::from("go_buildpack")],
            ..PushFlags::default()
        };
        let resolution = DesiredStateResolver::new(&d).resolve(Some(&m), &flags).unwrap();

        assert_eq!(
            resolution.specs[0].buildpacks(),
            Some(&[String::from("php_buildpack"), String::from("go_buildpack")][..])
        );
    }

    #[test]
    fn test_null_and_default_reset_to_autodetect() {
        let d = defaults();
        let m = manifest(
            r"
applications:
  - name: site
    buildpacks: [ruby_buildpack]
",
        );
        for reset in ["null", "default"] {
            let flags = PushFlags {
                buildpacks: vec![reset.to_string()],
                ..PushFlags::default()
            };
            let resolution = DesiredStateResolver::new(&d).resolve(Some(&m), &flags).unwrap();
            assert_eq!(resolution.specs[0].buildpacks(), Some(&[][..]));
        }
    }

    #[test]
    fn test_null_combined_with_buildpack_rejected() {
        let d = defaults();
        let flags = PushFlags {
            buildpacks: vec![String::from("null"), String::from("go_buildpack")],
            ..named("app")
        };
        let err = DesiredStateResolver::new(&d).resolve(None, &flags).unwrap_err();
        assert!(matches!(err, ResolutionError::InvalidField { field, .. } if field == "buildpacks"));
    }

    #[test]
    fn test_default_route_uses_lowercased_name() {
        let d = defaults();
        let resolution = DesiredStateResolver::new(&d).resolve(None, &named("MyApp")).unwrap();
        let routes = &resolution.specs[0].routes;

        assert_eq!(routes.source, RouteSource::Default);
        assert_eq!(routes.routes, vec![RouteSpec::http("myapp", "example.com")]);
    }

    #[test]
    fn test_hostname_flag_replaces_default_route() {
        let d = defaults();
        let flags = PushFlags {
            hostname: Some(String::from("Foo")),
            ..named("myapp")
        };
        let resolution = DesiredStateResolver::new(&d).resolve(None, &flags).unwrap();
        let routes = &resolution.specs[0].routes;

        assert_eq!(routes.source, RouteSource::Flag);
        assert_eq!(routes.routes, vec![RouteSpec::http("foo", "example.com")]);
        assert!(!routes.contains(&RouteSpec::http("myapp", "example.com")));
    }

    #[test]
    fn test_hostname_with_tcp_domain_rejected() {
        let d = defaults();
        let flags = PushFlags {
            hostname: Some(String::from("foo")),
            domain: Some(String::from("tcp.example.com")),
            ..named("myapp")
        };
        let err = DesiredStateResolver::new(&d).resolve(None, &flags).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The route is invalid: a hostname cannot be used with a TCP domain."
        );
    }

    #[test]
    fn test_tcp_domain_without_hostname_is_hostless() {
        let d = defaults();
        let flags = PushFlags {
            domain: Some(String::from("tcp.example.com")),
            ..named("myapp")
        };
        let resolution = DesiredStateResolver::new(&d).resolve(None, &flags).unwrap();
        assert_eq!(resolution.specs[0].routes.routes, vec![RouteSpec::bare("tcp.example.com")]);
    }

    #[test]
    fn test_route_flags_replace_manifest_routes() {
        let d = defaults();
        let m = manifest(
            r"
applications:
  - name: web
    routes:
      - route: web.example.com
",
        );
        let flags = PushFlags {
            domain: Some(String::from("apps.example.com")),
            route_path: Some(String::from("api")),
            ..PushFlags::default()
        };
        let resolution = DesiredStateResolver::new(&d).resolve(Some(&m), &flags).unwrap();
        assert_eq!(
            resolution.specs[0].routes.routes,
            vec![RouteSpec::http("web", "apps.example.com").with_path("/api")]
        );
    }

    #[test]
    fn test_parse_route_longest_domain_suffix() {
        let d = defaults();
        let resolver = DesiredStateResolver::new(&d);

        let route = resolver.parse_route("web", "web.apps.example.com/v1").unwrap();
        assert_eq!(route.host.as_deref(), Some("web"));
        assert_eq!(route.domain, "apps.example.com");
        assert_eq!(route.path.as_deref(), Some("/v1"));

        let bare = resolver.parse_route("web", "apps.example.com").unwrap();
        assert_eq!(bare, RouteSpec::bare("apps.example.com"));

        let tcp = resolver.parse_route("web", "tcp.example.com:1024").unwrap();
        assert_eq!(tcp.port, Some(1024));
        assert!(tcp.host.is_none());
    }

    #[test]
    fn test_parse_route_errors() {
        let d = defaults();
        let resolver = DesiredStateResolver::new(&d);

        assert!(matches!(
            resolver.parse_route("web", "web.unknown.org"),
            Err(ResolutionError::UnknownDomain { .. })
        ));
        assert!(matches!(
            resolver.parse_route("web", "web.tcp.example.com:1024"),
            Err(ResolutionError::HostnameWithTcpDomain { .. })
        ));
        assert!(matches!(
            resolver.parse_route("web", "web.example.com:8080"),
            Err(ResolutionError::InvalidRoute { .. })
        ));
    }

    #[test]
    fn test_manifest_routes_keep_authoring_order() {
        let d = defaults();
        let m = manifest(
            r"
applications:
  - name: web
    routes:
      - route: zeta.example.com
      - route: alpha.example.com
      - route: zeta.example.com
",
        );
        let resolution = DesiredStateResolver::new(&d)
            .resolve(Some(&m), &PushFlags::default())
            .unwrap();
        let hosts: Vec<_> = resolution.specs[0]
            .routes
            .routes
            .iter()
            .filter_map(|r| r.host.as_deref())
            .collect();
        assert_eq!(hosts, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_legacy_route_fields_expand_with_deprecations() {
        let d = defaults();
        let m = manifest(
            r"
applications:
  - name: web
    hosts: [a, b]
    domain: apps.example.com
",
        );
        let resolution = DesiredStateResolver::new(&d)
            .resolve(Some(&m), &PushFlags::default())
            .unwrap();
        let spec = &resolution.specs[0];

        assert_eq!(
            spec.routes.routes,
            vec![
                RouteSpec::http("a", "apps.example.com"),
                RouteSpec::http("b", "apps.example.com"),
            ]
        );
        assert!(spec.is_deprecated(DeprecatedField::Hosts));
        assert!(spec.is_deprecated(DeprecatedField::Domain));
        assert_eq!(resolution.warnings.len(), 2);
    }

    #[test]
    fn test_no_route() {
        let d = defaults();
        let flags = PushFlags {
            no_route: true,
            ..named("worker")
        };
        let resolution = DesiredStateResolver::new(&d).resolve(None, &flags).unwrap();
        assert_eq!(resolution.specs[0].routes, RouteSet::no_route());
    }

    #[test]
    fn test_flags_with_multiple_apps_rejected() {
        let d = defaults();
        let m = manifest(
            r"
applications:
  - name: a
  - name: b
",
        );
        let flags = PushFlags {
            instances: Some(2),
            ..PushFlags::default()
        };
        let err = DesiredStateResolver::new(&d).resolve(Some(&m), &flags).unwrap_err();
        assert!(matches!(err, ResolutionError::FlagsWithMultipleApps));

        let selected = DesiredStateResolver::new(&d)
            .resolve(Some(&m), &PushFlags { instances: Some(2), ..named("b") })
            .unwrap();
        assert_eq!(selected.specs.len(), 1);
        assert_eq!(selected.specs[0].name, "b");
        assert_eq!(selected.specs[0].instances, Some(2));
    }

    #[test]
    fn test_app_selection_errors() {
        let d = defaults();
        let m = manifest(
            r"
applications:
  - name: a
  - name: b
",
        );
        let err = DesiredStateResolver::new(&d).resolve(Some(&m), &named("c")).unwrap_err();
        assert!(matches!(err, ResolutionError::AppNotInManifest { name } if name == "c"));

        let err = DesiredStateResolver::new(&d)
            .resolve(None, &PushFlags::default())
            .unwrap_err();
        assert!(matches!(err, ResolutionError::MissingAppName));
    }

    #[test]
    fn test_name_argument_renames_single_app_manifest() {
        let d = defaults();
        let m = manifest(
            r"
applications:
  - name: original
    instances: 3
",
        );
        let resolution = DesiredStateResolver::new(&d).resolve(Some(&m), &named("renamed")).unwrap();
        assert_eq!(resolution.specs[0].name, "renamed");
        assert_eq!(resolution.specs[0].instances, Some(3));
    }

    #[test]
    fn test_quantities_and_env() {
        let d = defaults();
        let m = manifest(
            r"
applications:
  - name: web
    memory: 1G
    disk_quota: 512MB
    env:
      PORT: 8080
",
        );
        let resolution = DesiredStateResolver::new(&d)
            .resolve(Some(&m), &PushFlags { memory: Some(String::from("2G")), ..PushFlags::default() })
            .unwrap();
        let spec = &resolution.specs[0];
        assert_eq!(spec.memory_mb, Some(2048));
        assert_eq!(spec.disk_mb, Some(512));
        assert_eq!(spec.env.get("PORT").map(String::as_str), Some("8080"));

        let err = DesiredStateResolver::new(&d)
            .resolve(None, &PushFlags { disk: Some(String::from("5T")), ..named("x") })
            .unwrap_err();
        assert!(matches!(err, ResolutionError::InvalidQuantity { .. }));
    }

    #[test]
    fn test_docker_flag_with_manifest_buildpacks_rejected() {
        let d = defaults();
        let m = manifest(
            r"
applications:
  - name: web
    buildpacks: [go_buildpack]
",
        );
        let flags = PushFlags {
            docker_image: Some(String::from("nginx")),
            ..PushFlags::default()
        };
        let err = DesiredStateResolver::new(&d).resolve(Some(&m), &flags).unwrap_err();
        assert!(matches!(err, ResolutionError::DockerWithBuildpacks { .. }));
    }

    #[test]
    fn test_fallback_buildpack() {
        let d = defaults().with_fallback_buildpack("binary_buildpack");
        let resolution = DesiredStateResolver::new(&d).resolve(None, &named("app")).unwrap();
        assert_eq!(
            resolution.specs[0].buildpacks(),
            Some(&[String::from("binary_buildpack")][..])
        );
    }

    #[test]
    fn test_health_check_none_alias() {
        let d = defaults();
        let flags = PushFlags {
            health_check_type: Some(String::from("none")),
            ..named("app")
        };
        let resolution = DesiredStateResolver::new(&d).resolve(None, &flags).unwrap();
        let spec = &resolution.specs[0];
        assert_eq!(
            spec.health_check.as_ref().map(|h| h.check_type),
            Some(HealthCheckType::Process)
        );
        assert!(spec.is_deprecated(DeprecatedField::HealthCheckNone));
    }
}
