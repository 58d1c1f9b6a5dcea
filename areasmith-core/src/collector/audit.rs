//! Structural audit of area relations.
//!
//! A relation-only scan that flags members the assembler would silently
//! ignore: way members with roles other than `outer`, `inner` or empty, and
//! non-way members of multipolygons.

use std::fmt;

use crate::entity::{EntityKind, Relation};

use super::MemberRole;

/// What is wrong with one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationIssueKind {
    /// A way member with a role the assembler does not understand.
    WrongRole {
        /// Role as written.
        role: String,
    },
    /// A node or relation member of a multipolygon.
    NonWayMember {
        /// Family of the member.
        kind: EntityKind,
        /// Member id.
        member_id: i64,
        /// Role as written.
        role: String,
    },
}

/// One issue found on a relation.
///
/// # Examples
/// ```
/// use areasmith_core::{EntityKind, RelationIssue, RelationIssueKind};
///
/// let issue = RelationIssue {
///     relation_id: 8,
///     kind: RelationIssueKind::NonWayMember {
///         kind: EntityKind::Node,
///         member_id: 3,
///         role: "label".into(),
///     },
/// };
/// assert_eq!(issue.to_string(), "r8 non-way member n3 (role='label')");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationIssue {
    pub relation_id: i64,
    pub kind: RelationIssueKind,
}

impl fmt::Display for RelationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            RelationIssueKind::WrongRole { role } => {
                write!(f, "r{} wrong role '{role}'", self.relation_id)
            }
            RelationIssueKind::NonWayMember {
                kind,
                member_id,
                role,
            } => write!(
                f,
                "r{} non-way member {}{member_id} (role='{role}')",
                self.relation_id,
                kind.as_char()
            ),
        }
    }
}

/// Outcome of a relation audit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    /// Multipolygon and boundary relations inspected.
    pub relations_checked: u64,
    /// Issues in stream order.
    pub issues: Vec<RelationIssue>,
    /// Relations with at least one issue, each once, in stream order.
    pub offending: Vec<Relation>,
}

/// Collects [`RelationIssue`]s from a relation stream.
#[derive(Debug, Default)]
pub struct RelationAudit {
    report: AuditReport,
}

impl RelationAudit {
    /// Inspect one relation. Relations other than multipolygons and
    /// boundaries are ignored.
    pub fn handle(&mut self, relation: &Relation) {
        let multipolygon = match relation.relation_type() {
            Some("multipolygon") => true,
            Some("boundary") => false,
            _ => return,
        };
        self.report.relations_checked += 1;
        let issues_before = self.report.issues.len();
        for member in &relation.members {
            let kind = if member.kind != EntityKind::Way {
                if !multipolygon {
                    continue;
                }
                RelationIssueKind::NonWayMember {
                    kind: member.kind,
                    member_id: member.id,
                    role: member.role.clone(),
                }
            } else if MemberRole::parse(&member.role).is_none() {
                RelationIssueKind::WrongRole {
                    role: member.role.clone(),
                }
            } else {
                continue;
            };
            self.report.issues.push(RelationIssue {
                relation_id: relation.id,
                kind,
            });
        }
        if self.report.issues.len() > issues_before {
            self.report.offending.push(relation.clone());
        }
    }

    /// Area relations inspected so far.
    pub const fn relations_checked(&self) -> u64 {
        self.report.relations_checked
    }

    /// Everything found.
    pub fn finish(self) -> AuditReport {
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Member, collect_tags};
    use rstest::rstest;

    fn relation(kind: &str, members: Vec<Member>) -> Relation {
        Relation {
            id: 4,
            members,
            tags: collect_tags([("type", kind)]),
        }
    }

    #[rstest]
    fn multipolygons_report_roles_and_non_way_members() {
        let mut audit = RelationAudit::default();
        audit.handle(&relation(
            "multipolygon",
            vec![
                Member::new(1, EntityKind::Way, "outer"),
                Member::new(2, EntityKind::Way, "outter"),
                Member::new(3, EntityKind::Node, ""),
            ],
        ));
        let report = audit.finish();
        let lines: Vec<String> = report.issues.iter().map(ToString::to_string).collect();
        assert_eq!(
            lines,
            vec![
                String::from("r4 wrong role 'outter'"),
                String::from("r4 non-way member n3 (role='')"),
            ]
        );
        let offending: Vec<i64> = report.offending.iter().map(|relation| relation.id).collect();
        assert_eq!(offending, vec![4]);
    }

    #[rstest]
    fn boundaries_accept_non_way_members() {
        let mut audit = RelationAudit::default();
        audit.handle(&relation(
            "boundary",
            vec![
                Member::new(3, EntityKind::Node, "admin_centre"),
                Member::new(5, EntityKind::Relation, "subarea"),
                Member::new(2, EntityKind::Way, "label"),
            ],
        ));
        assert_eq!(audit.relations_checked(), 1);
        let report = audit.finish();
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].to_string(), "r4 wrong role 'label'");
    }

    #[rstest]
    fn other_relations_are_skipped() {
        let mut audit = RelationAudit::default();
        audit.handle(&relation("route", vec![Member::new(2, EntityKind::Way, "forward")]));
        assert_eq!(audit.relations_checked(), 0);
        assert_eq!(audit.finish(), AuditReport::default());
    }
}
