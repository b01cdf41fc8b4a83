//! Template URI substitution
//!
//! Implicit tiling locates subtrees and contents through templates such as
//! `subtrees/{level}/{x}/{y}.subtree`. Problems with a template are reported
//! as issues; substitution continues on a best-effort basis.

use super::coordinates::TreeCoordinates;
use crate::issues::{IssueKind, IssueSink, ValidationIssue};

/// A problem found while substituting a template
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateProblem {
    pub kind: IssueKind,
    pub message: String,
}

/// Result of a substitution
#[derive(Debug, Clone, PartialEq)]
pub struct Substitution {
    /// The substituted URI; `None` when the template cannot be parsed
    pub uri: Option<String>,
    pub problems: Vec<TemplateProblem>,
}

fn variables(coordinates: &TreeCoordinates) -> Vec<(&'static str, u64)> {
    let mut vars = vec![
        ("level", u64::from(coordinates.level())),
        ("x", coordinates.x()),
        ("y", coordinates.y()),
    ];
    if let Some(z) = coordinates.z() {
        vars.push(("z", z));
    }
    vars
}

/// Substitute `{level}`, `{x}`, `{y}` and for octrees `{z}` in `template`
pub fn substitute(template: &str, coordinates: &TreeCoordinates) -> Substitution {
    let vars = variables(coordinates);
    let mut used = vec![false; vars.len()];
    let mut problems = Vec::new();
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            problems.push(TemplateProblem {
                kind: IssueKind::TemplateUriMalformed,
                message: format!("template URI '{}' has an unterminated '{{'", template),
            });
            return Substitution { uri: None, problems };
        };
        let name = &after[..close];
        match vars.iter().position(|(var, _)| *var == name) {
            Some(i) => {
                out.push_str(&vars[i].1.to_string());
                used[i] = true;
            }
            None => {
                problems.push(TemplateProblem {
                    kind: IssueKind::TemplateUriInvalidVariable,
                    message: format!(
                        "template URI '{}' references '{{{}}}', which is not defined for {}",
                        template,
                        name,
                        coordinates.scheme()
                    ),
                });
                out.push('{');
                out.push_str(name);
                out.push('}');
            }
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);

    for ((name, _), used) in vars.iter().zip(used) {
        if !used {
            problems.push(TemplateProblem {
                kind: IssueKind::TemplateUriMissingVariable,
                message: format!("template URI '{}' does not contain '{{{}}}'", template, name),
            });
        }
    }

    Substitution {
        uri: Some(out),
        problems,
    }
}

/// Substitute and report problems at `path`
pub fn substitute_reporting(
    template: &str,
    coordinates: &TreeCoordinates,
    path: &str,
    issues: &dyn IssueSink,
) -> Option<String> {
    let substitution = substitute(template, coordinates);
    for problem in substitution.problems {
        issues.add_issue(ValidationIssue::new(problem.kind, path, problem.message));
    }
    substitution.uri
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::implicit::coordinates::{OctreeCoordinates, QuadtreeCoordinates};
    use crate::issues::IssueCollector;

    fn quad(level: u32, x: u64, y: u64) -> TreeCoordinates {
        TreeCoordinates::Quadtree(QuadtreeCoordinates::new(level, x, y))
    }

    #[test]
    fn test_quadtree_substitution() {
        let s = substitute("subtrees/{level}/{x}/{y}.subtree", &quad(3, 5, 1));
        assert_eq!(s.uri.as_deref(), Some("subtrees/3/5/1.subtree"));
        assert!(s.problems.is_empty());
    }

    #[test]
    fn test_octree_substitution_repeats_variables() {
        let c = TreeCoordinates::Octree(OctreeCoordinates::new(2, 1, 2, 3));
        let s = substitute("{level}_{x}_{y}_{z}/{level}.glb", &c);
        assert_eq!(s.uri.as_deref(), Some("2_1_2_3/2.glb"));
        assert!(s.problems.is_empty());
    }

    #[test]
    fn test_z_in_quadtree_is_invalid() {
        let s = substitute("{level}/{x}/{y}/{z}.glb", &quad(1, 0, 1));
        assert_eq!(s.uri.as_deref(), Some("1/0/1/{z}.glb"));
        assert_eq!(s.problems.len(), 1);
        assert_eq!(s.problems[0].kind, IssueKind::TemplateUriInvalidVariable);
    }

    #[test]
    fn test_missing_variable_is_reported() {
        let s = substitute("tiles/{level}/{x}.glb", &quad(1, 1, 0));
        assert_eq!(s.uri.as_deref(), Some("tiles/1/1.glb"));
        assert_eq!(s.problems.len(), 1);
        assert_eq!(s.problems[0].kind, IssueKind::TemplateUriMissingVariable);
    }

    #[test]
    fn test_unterminated_brace() {
        let issues = IssueCollector::new();
        let uri = substitute_reporting("tiles/{level/{x}", &quad(0, 0, 0), "/root", &issues);
        assert!(uri.is_some());
        let uri = substitute_reporting("tiles/{x}/{level", &quad(0, 0, 0), "/root", &issues);
        assert_eq!(uri, None);
        assert_eq!(issues.count_of(IssueKind::TemplateUriMalformed), 1);
    }
}
