//! Lint checks for a resolved scene.
//!
//! Runs after placement to catch mechanical defects that the search should
//! have ruled out: overlapping objects, objects poking out of the room and
//! objects left without a position.

use std::collections::HashSet;
use std::fmt;

use super::types::{Room, SceneObject};

/// A lint warning about a scene defect
#[derive(Debug)]
pub struct LintWarning {
    pub category: LintCategory,
    pub message: String,
}

/// Category of lint defect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintCategory {
    Overlap,
    Containment,
    Unplaced,
}

impl fmt::Display for LintCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LintCategory::Overlap => write!(f, "overlap"),
            LintCategory::Containment => write!(f, "containment"),
            LintCategory::Unplaced => write!(f, "unplaced"),
        }
    }
}

impl fmt::Display for LintWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}

/// Run all lint checks on a resolved scene.
pub fn check(objects: &[SceneObject], room: &Room) -> Vec<LintWarning> {
    let mut warnings = Vec::new();
    check_unplaced(objects, &mut warnings);
    check_containment(objects, room, &mut warnings);
    check_overlaps(objects, &mut warnings);
    warnings
}

fn check_unplaced(objects: &[SceneObject], warnings: &mut Vec<LintWarning>) {
    for obj in objects.iter().filter(|o| o.position.is_none()) {
        warnings.push(LintWarning {
            category: LintCategory::Unplaced,
            message: format!("\"{}\" has no position", obj.id),
        });
    }
}

fn check_containment(objects: &[SceneObject], room: &Room, warnings: &mut Vec<LintWarning>) {
    let envelope = room.envelope();
    for obj in objects {
        let Some(bounds) = obj.bounds() else {
            continue;
        };
        if !envelope.contains(&bounds) {
            warnings.push(LintWarning {
                category: LintCategory::Containment,
                message: format!(
                    "\"{}\" extends outside the room: x [{:.2}, {:.2}], y [{:.2}, {:.2}], z [{:.2}, {:.2}]",
                    obj.id,
                    bounds.x.min,
                    bounds.x.max,
                    bounds.y.min,
                    bounds.y.max,
                    bounds.z.min,
                    bounds.z.max
                ),
            });
        }
    }
}

fn check_overlaps(objects: &[SceneObject], warnings: &mut Vec<LintWarning>) {
    // Declared support pairs touch by construction
    let stacked: HashSet<(&str, &str)> = objects
        .iter()
        .flat_map(|o| {
            o.object_relations()
                .iter()
                .filter(|r| r.preposition.is_support())
                .map(move |r| (o.id.as_str(), r.target.as_str()))
        })
        .collect();

    let placed: Vec<_> = objects
        .iter()
        .filter_map(|o| o.bounds().map(|b| (o, b)))
        .collect();
    for (i, (a, a_bounds)) in placed.iter().enumerate() {
        for (b, b_bounds) in placed.iter().skip(i + 1) {
            if stacked.contains(&(a.id.as_str(), b.id.as_str()))
                || stacked.contains(&(b.id.as_str(), a.id.as_str()))
            {
                continue;
            }
            if a_bounds.overlaps(b_bounds) {
                warnings.push(LintWarning {
                    category: LintCategory::Overlap,
                    message: format!("\"{}\" overlaps \"{}\"", a.id, b.id),
                });
            }
        }
    }
}
