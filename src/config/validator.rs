//! Manifest validation.
//!
//! Structural checks on raw application blocks that do not need platform
//! knowledge. Every problem is collected before the first one is reported,
//! so the log shows the whole picture while the caller gets a single error.

use crate::error::ResolutionError;
use std::collections::HashSet;
use tracing::{debug, warn};

use super::manifest::{Manifest, RawApplication};
use super::spec::{HealthCheckType, parse_megabytes};

/// Validator for manifest documents.
#[derive(Debug, Default)]
pub struct ManifestValidator;

/// Validation result containing every problem found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Errors, in document order.
    pub errors: Vec<ResolutionError>,
    /// Non-fatal issues.
    pub warnings: Vec<String>,
}

impl ManifestValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a manifest.
    ///
    /// # Errors
    ///
    /// Returns the first error found, after logging all of them.
    pub fn validate(&self, manifest: &Manifest) -> Result<ValidationResult, ResolutionError> {
        let mut result = ValidationResult::default();
        let mut seen_names = HashSet::new();

        for (i, app) in manifest.applications.iter().enumerate() {
            match app.name.as_deref().map(str::trim) {
                None | Some("") => result.errors.push(ResolutionError::InvalidField {
                    app: format!("applications[{i}]"),
                    field: String::from("name"),
                    message: String::from("application name cannot be empty"),
                }),
                Some(name) => {
                    if !seen_names.insert(name) {
                        result.errors.push(ResolutionError::DuplicateApplication {
                            name: name.to_string(),
                        });
                    }
                }
            }

            Self::validate_application(app, &mut result);
        }

        for warning in &result.warnings {
            warn!("{warning}");
        }

        if result.errors.is_empty() {
            debug!("Manifest validation passed");
            Ok(result)
        } else {
            for error in &result.errors {
                debug!("Manifest validation error: {error}");
            }
            Err(result.errors.swap_remove(0))
        }
    }

    /// Validates one application block.
    fn validate_application(app: &RawApplication, result: &mut ValidationResult) {
        let name = app.name_or_empty().to_string();

        if let (Some(single), Some(list)) = (&app.buildpack, &app.buildpacks) {
            let equivalent = list.len() == 1 && list[0] == *single;
            if !equivalent {
                result.errors.push(ResolutionError::ConflictingBuildpackFields { app: name.clone() });
            }
        }

        if app.docker.is_some() && (app.buildpack.is_some() || app.buildpacks.is_some()) {
            result.errors.push(ResolutionError::DockerWithBuildpacks { app: name.clone() });
        }

        if app.routes.is_some() && app.has_legacy_route_fields() {
            result.errors.push(ResolutionError::RoutesWithLegacyFields { app: name.clone() });
        }

        if app.no_route == Some(true) && app.routes.as_ref().is_some_and(|r| !r.is_empty()) {
            result
                .warnings
                .push(format!("Application '{name}': 'no-route' set, declared routes are ignored"));
        }

        if app.instances == Some(0) && app.no_start != Some(true) {
            result
                .warnings
                .push(format!("Application '{name}': 0 instances requested, nothing will run"));
        }

        for (field, value) in [("memory", &app.memory), ("disk_quota", &app.disk_quota)] {
            if let Some(value) = value {
                let text = value.to_string();
                if parse_megabytes(&text).is_err() {
                    result.errors.push(ResolutionError::InvalidQuantity {
                        app: name.clone(),
                        field: field.to_string(),
                        value: text,
                    });
                }
            }
        }

        Self::validate_health_check(app, &name, result);
    }

    /// Validates the health check type and endpoint pairing.
    fn validate_health_check(app: &RawApplication, name: &str, result: &mut ValidationResult) {
        let check_type = match app.health_check_type.as_deref().map(HealthCheckType::parse) {
            None => None,
            Some(Ok((check_type, _))) => Some(check_type),
            Some(Err(message)) => {
                result.errors.push(ResolutionError::InvalidField {
                    app: name.to_string(),
                    field: String::from("health-check-type"),
                    message,
                });
                return;
            }
        };

        if app.health_check_http_endpoint.is_some() && check_type != Some(HealthCheckType::Http) {
            result.errors.push(ResolutionError::InvalidField {
                app: name.to_string(),
                field: String::from("health-check-http-endpoint"),
                message: String::from("only valid with health-check-type http"),
            });
        }
    }
}
