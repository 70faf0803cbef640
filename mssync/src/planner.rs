//! Foreign-key-aware execution planning.
//!
//! Tables are layered with Kahn's algorithm over the foreign-key subgraph
//! induced by the selection, parents before children: inserts into a child
//! must be able to see its parents. Cycles (self-references included) cannot
//! be layered and are emitted together as one final level.

use std::collections::{HashMap, HashSet};

use mssync_tds::{ForeignKey, TableRef};
use tracing::debug;

/// Orders the selected tables into execution levels.
///
/// Every table in level `n` only references tables in levels `< n`. Tables
/// with no foreign-key edges inside the selection form the first level.
pub fn plan_levels(selection: &[TableRef], edges: &[ForeignKey]) -> Vec<Vec<TableRef>> {
    let selected: HashSet<&TableRef> = selection.iter().collect();

    // parent → children, restricted to the selection; self-edges count as
    // cycles and keep their table out of every layer.
    let mut children: HashMap<&TableRef, Vec<&TableRef>> = HashMap::new();
    let mut in_degree: HashMap<&TableRef, usize> = selection.iter().map(|t| (t, 0)).collect();
    let mut seen_edges: HashSet<(String, String)> = HashSet::new();

    for edge in edges {
        let (Some(child), Some(parent)) = (
            selected.get(&edge.child).copied(),
            selected.get(&edge.parent).copied(),
        ) else {
            continue;
        };
        if !seen_edges.insert((child.lookup_key(), parent.lookup_key())) {
            continue;
        }
        children.entry(parent).or_default().push(child);
        *in_degree.entry(child).or_default() += 1;
    }

    let mut levels: Vec<Vec<TableRef>> = Vec::new();
    let mut remaining = selection.len();

    let mut current: Vec<&TableRef> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(table, _)| *table)
        .collect();

    while !current.is_empty() {
        current.sort_by_key(|t| t.lookup_key());
        remaining -= current.len();

        let mut next: Vec<&TableRef> = Vec::new();
        for table in &current {
            for child in children.get(table).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree -= 1;
                    if *degree == 0 {
                        next.push(*child);
                    }
                }
            }
        }

        levels.push(current.iter().map(|t| (*t).clone()).collect());
        current = next;
    }

    // Whatever is left sits on a cycle; run it last, in one level.
    if remaining > 0 {
        let placed: HashSet<&TableRef> = levels.iter().flatten().collect();
        let mut cyclic: Vec<TableRef> = selection
            .iter()
            .filter(|t| !placed.contains(t))
            .cloned()
            .collect();
        cyclic.sort_by_key(|t| t.lookup_key());
        debug!(tables = cyclic.len(), "foreign-key cycle, scheduling as final level");
        levels.push(cyclic);
    }

    levels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(name: &str) -> TableRef {
        TableRef::parse(name)
    }

    fn fk(child: &str, parent: &str) -> ForeignKey {
        ForeignKey {
            child: t(child),
            parent: t(parent),
        }
    }

    #[test]
    fn tables_without_edges_form_one_level() {
        let selection = vec![t("dbo.A"), t("dbo.B"), t("dbo.C")];
        let levels = plan_levels(&selection, &[]);
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].len(), 3);
    }

    #[test]
    fn parents_run_before_children() {
        let selection = vec![t("dbo.L"), t("dbo.O")];
        let levels = plan_levels(&selection, &[fk("dbo.L", "dbo.O")]);
        assert_eq!(levels, vec![vec![t("dbo.O")], vec![t("dbo.L")]]);
    }

    #[test]
    fn chains_layer_transitively() {
        let selection = vec![t("dbo.C"), t("dbo.B"), t("dbo.A")];
        let edges = vec![fk("dbo.B", "dbo.A"), fk("dbo.C", "dbo.B")];
        let levels = plan_levels(&selection, &edges);
        assert_eq!(
            levels,
            vec![vec![t("dbo.A")], vec![t("dbo.B")], vec![t("dbo.C")]]
        );
    }

    #[test]
    fn edges_to_unselected_tables_are_ignored() {
        let selection = vec![t("dbo.A")];
        let levels = plan_levels(&selection, &[fk("dbo.A", "dbo.Unselected")]);
        assert_eq!(levels, vec![vec![t("dbo.A")]]);
    }

    #[test]
    fn cycles_are_emitted_as_a_final_level() {
        let selection = vec![t("dbo.A"), t("dbo.B"), t("dbo.Root")];
        let edges = vec![
            fk("dbo.A", "dbo.B"),
            fk("dbo.B", "dbo.A"),
            fk("dbo.A", "dbo.Root"),
        ];
        let levels = plan_levels(&selection, &edges);
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0], vec![t("dbo.Root")]);
        assert_eq!(levels[1], vec![t("dbo.A"), t("dbo.B")]);
    }

    #[test]
    fn self_reference_lands_in_the_final_level() {
        let selection = vec![t("dbo.Tree"), t("dbo.Other")];
        let levels = plan_levels(&selection, &[fk("dbo.Tree", "dbo.Tree")]);
        assert_eq!(levels, vec![vec![t("dbo.Other")], vec![t("dbo.Tree")]]);
    }

    #[test]
    fn duplicate_edges_do_not_inflate_in_degrees() {
        let selection = vec![t("dbo.L"), t("dbo.O")];
        let edges = vec![fk("dbo.L", "dbo.O"), fk("dbo.L", "dbo.O")];
        let levels = plan_levels(&selection, &edges);
        assert_eq!(levels, vec![vec![t("dbo.O")], vec![t("dbo.L")]]);
    }

    #[test]
    fn diamond_shares_a_level() {
        // A ← B, A ← C, (B, C) ← D
        let selection = vec![t("dbo.D"), t("dbo.C"), t("dbo.B"), t("dbo.A")];
        let edges = vec![
            fk("dbo.B", "dbo.A"),
            fk("dbo.C", "dbo.A"),
            fk("dbo.D", "dbo.B"),
            fk("dbo.D", "dbo.C"),
        ];
        let levels = plan_levels(&selection, &edges);
        assert_eq!(
            levels,
            vec![
                vec![t("dbo.A")],
                vec![t("dbo.B"), t("dbo.C")],
                vec![t("dbo.D")]
            ]
        );
    }
}
