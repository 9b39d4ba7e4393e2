//! Diff rendering.
//!
//! Turns the field annotations of a [`ChangeSet`] into display lines. Scalar
//! fields render as `+ instances: 3`; list fields render a header followed by
//! one line per element, in planner order:
//!
//! ```text
//!   routes:
//! +   web.example.com
//! -   old.example.com
//! ```
//!
//! Deprecation warnings are returned separately so they can go to the
//! diagnostic stream.

use serde::Serialize;
use std::fmt;

use crate::planner::{ChangeSet, FieldShape, Marker};

/// One display line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffLine {
    /// Change marker.
    pub marker: Marker,
    /// Whether this line is an element under a list header.
    pub element: bool,
    /// Line content without marker or indentation.
    pub content: String,
}

impl fmt::Display for DiffLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let indent = if self.element { "  " } else { "" };
        write!(f, "{} {indent}{}", self.marker.symbol(), self.content)
    }
}

/// Rendered diff for one application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderedDiff {
    /// Primary output lines.
    pub lines: Vec<DiffLine>,
    /// Warnings for the diagnostic stream.
    pub warnings: Vec<String>,
}

impl RenderedDiff {
    /// Renders the lines as text, one per line.
    #[must_use]
    pub fn to_text(&self) -> String {
        self.lines
            .iter()
            .map(|line| format!("{line}\n"))
            .collect()
    }
}

/// Renders change sets.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiffRenderer;

impl DiffRenderer {
    /// Creates a renderer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Renders the annotations of `changeset`.
    #[must_use]
    pub fn render(&self, changeset: &ChangeSet) -> RenderedDiff {
        let mut rendered = RenderedDiff::default();

        for field in &changeset.annotations {
            for warning in &field.deprecations {
                if !rendered.warnings.contains(warning) {
                    rendered.warnings.push(warning.clone());
                }
            }

            match field.shape {
                FieldShape::Scalar => {
                    for entry in &field.entries {
                        rendered.lines.push(DiffLine {
                            marker: entry.marker,
                            element: false,
                            content: format!("{}: {}", field.field, entry.value),
                        });
                    }
                }
                FieldShape::List if field.entries.is_empty() => {}
                FieldShape::List => {
                    rendered.lines.push(DiffLine {
                        marker: Marker::Unchanged,
                        element: false,
                        content: format!("{}:", field.field),
                    });
                    for entry in &field.entries {
                        rendered.lines.push(DiffLine {
                            marker: entry.marker,
                            element: true,
                            content: entry.value.clone(),
                        });
                    }
                }
            }
        }

        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::FieldDiff;

    fn changeset(annotations: Vec<FieldDiff>) -> ChangeSet {
        let mut cs = ChangeSet::empty("web", true);
        cs.annotations = annotations;
        cs
    }

    #[test]
    fn test_list_field_renders_header_and_elements() {
        let mut routes = FieldDiff::new("routes", FieldShape::List);
        routes.push(Marker::Unchanged, "web.example.com");
        routes.push(Marker::Added, "api.example.com");
        routes.push(Marker::Removed, "old.example.com");

        let text = DiffRenderer::new().render(&changeset(vec![routes])).to_text();
        assert_eq!(
            text,
            "  routes:\n    web.example.com\n+   api.example.com\n-   old.example.com\n"
        );
    }

    #[test]
    fn test_scalar_field() {
        let mut instances = FieldDiff::new("instances", FieldShape::Scalar);
        instances.push(Marker::Removed, "1");
        instances.push(Marker::Added, "3");

        let rendered = DiffRenderer::new().render(&changeset(vec![instances]));
        let lines: Vec<String> = rendered.lines.iter().map(ToString::to_string).collect();
        assert_eq!(lines, vec!["- instances: 1", "+ instances: 3"]);
    }

    #[test]
    fn test_deprecations_go_to_warnings_once() {
        let message = String::from("Deprecation warning: host is deprecated");
        let mut routes = FieldDiff::new("routes", FieldShape::List);
        routes.push(Marker::Unchanged, "web.example.com");
        routes.deprecations = vec![message.clone(), message.clone()];

        let rendered = DiffRenderer::new().render(&changeset(vec![routes]));
        assert_eq!(rendered.warnings, vec![message.clone()]);
        assert!(rendered.lines.iter().all(|l| !l.content.contains("Deprecation")));
    }

    #[test]
    fn test_empty_list_is_omitted() {
        let rendered = DiffRenderer::new().render(&changeset(vec![FieldDiff::new(
            "routes",
            FieldShape::List,
        )]));
        assert!(rendered.lines.is_empty());
    }

    #[test]
    fn test_planned_new_app_renders_routes_as_added() {
        use crate::config::{ApplicationSpec, RouteSet, RouteSource, RouteSpec};
        use crate::planner::DiffPlanner;
        use crate::remote::ActualState;

        let spec = ApplicationSpec::new(
            "web",
            RouteSet::new([RouteSpec::http("web", "example.com")], RouteSource::Default),
        );
        let cs = DiffPlanner::new().plan(&spec, &ActualState::absent(), None);
        let text = DiffRenderer::new().render(&cs).to_text();

        assert!(text.starts_with("+ name: web\n"));
        assert!(text.contains("  routes:\n+   web.example.com\n"));
    }
}
