//! Foreign-key dependency ordering of reflected tables.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use petgraph::algo;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use tracing::warn;

use crate::error::{MigrateError, Result};

use super::schema::Table;

/// Order tables so that every table comes after the tables its foreign keys
/// reference.
///
/// Edges run from the referenced table to the referencing table. Among tables
/// that are ready at the same time, the one with the smallest name goes first.
/// Self-references are ignored. Foreign keys that reference a table missing
/// from `tables` are logged and removed from the referencing table. The rest
/// are respelled with the exact table and column names they resolve to, as
/// SQLite matches those names case-insensitively.
///
/// # Errors
///
/// Returns `MigrateError::Reflection` naming the tables of any foreign-key
/// cycle.
pub fn dependency_order(mut tables: Vec<Table>) -> Result<Vec<Table>> {
    resolve_foreign_keys(&mut tables);

    let mut graph: DiGraph<String, ()> = DiGraph::with_capacity(tables.len(), 0);
    let mut index: HashMap<String, NodeIndex> = HashMap::with_capacity(tables.len());

    for table in &tables {
        let node = graph.add_node(table.name.clone());
        index.insert(table.name.to_lowercase(), node);
    }

    for table in &tables {
        let Some(&child) = index.get(&table.name.to_lowercase()) else {
            continue;
        };
        for parent_name in table.referenced_tables() {
            if let Some(&parent) = index.get(&parent_name.to_lowercase()) {
                graph.update_edge(parent, child, ());
            }
        }
    }

    let order = kahn_by_name(&graph);

    if order.len() < graph.node_count() {
        let mut cycles: Vec<String> = algo::tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| {
                let mut names: Vec<&str> = scc.iter().map(|n| graph[*n].as_str()).collect();
                names.sort_unstable();
                names.join(", ")
            })
            .collect();
        cycles.sort();
        return Err(MigrateError::Reflection(format!(
            "foreign key cycle between tables: {}",
            cycles.join("; ")
        )));
    }

    let mut slots: Vec<Option<Table>> = tables.into_iter().map(Some).collect();
    Ok(order
        .into_iter()
        .filter_map(|node| slots[node.index()].take())
        .collect())
}

fn resolve_foreign_keys(tables: &mut [Table]) {
    let known: HashMap<String, Table> = tables
        .iter()
        .map(|t| (t.name.to_lowercase(), t.clone()))
        .collect();

    for table in tables.iter_mut() {
        let name = table.name.clone();
        let this = known.get(&name.to_lowercase());
        table.foreign_keys.retain_mut(|fk| {
            let Some(parent) = known.get(&fk.ref_table.to_lowercase()) else {
                warn!(
                    "Table {} references missing table {}; ignoring that foreign key",
                    name, fk.ref_table
                );
                return false;
            };
            fk.ref_table = parent.name.clone();
            respell(&mut fk.ref_columns, parent);
            if let Some(this) = this {
                respell(&mut fk.columns, this);
            }
            true
        });
    }
}

fn respell(columns: &mut [String], table: &Table) {
    for column in columns.iter_mut() {
        if let Some(found) = table.column(column) {
            *column = found.name.clone();
        }
    }
}

/// Topological sort that always emits the ready node with the smallest name.
fn kahn_by_name(graph: &DiGraph<String, ()>) -> Vec<NodeIndex> {
    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|n| graph.neighbors_directed(n, Direction::Incoming).count())
        .collect();

    let mut ready: BinaryHeap<Reverse<(&str, NodeIndex)>> = graph
        .node_indices()
        .filter(|n| in_degree[n.index()] == 0)
        .map(|n| Reverse((graph[n].as_str(), n)))
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(Reverse((_, node))) = ready.pop() {
        order.push(node);
        for next in graph.neighbors_directed(node, Direction::Outgoing) {
            let degree = &mut in_degree[next.index()];
            *degree -= 1;
            if *degree == 0 {
                ready.push(Reverse((graph[next].as_str(), next)));
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{Column, ForeignKey};

    fn table(name: &str, refs: &[&str]) -> Table {
        let mut t = Table::new(name);
        for (i, r) in refs.iter().enumerate() {
            t.foreign_keys.push(ForeignKey {
                id: i as i64,
                columns: vec![format!("{}_id", r.to_lowercase())],
                ref_table: r.to_string(),
                ref_columns: vec![],
                on_delete: "NO ACTION".to_string(),
                on_update: "NO ACTION".to_string(),
            });
        }
        t
    }

    fn names(tables: &[Table]) -> Vec<&str> {
        tables.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn test_parents_precede_children() {
        let tables = vec![
            table("Scores", &["Connections"]),
            table("Evidence", &["Connections"]),
            table("Connections", &["Circuits"]),
            table("References", &[]),
            table("Circuits", &[]),
        ];
        let ordered = dependency_order(tables).unwrap();
        assert_eq!(
            names(&ordered),
            vec!["Circuits", "Connections", "Evidence", "References", "Scores"]
        );
    }

    #[test]
    fn test_order_independent_of_input_order() {
        let a = dependency_order(vec![table("b", &["a"]), table("a", &[]), table("c", &[])]).unwrap();
        let b = dependency_order(vec![table("c", &[]), table("a", &[]), table("b", &["a"])]).unwrap();
        assert_eq!(names(&a), names(&b));
        assert_eq!(names(&a), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_self_reference_does_not_block() {
        let ordered = dependency_order(vec![table("Circuits", &["Circuits"])]).unwrap();
        assert_eq!(names(&ordered), vec!["Circuits"]);
    }

    #[test]
    fn test_missing_reference_is_ignored() {
        let ordered = dependency_order(vec![table("Evidence", &["Gone"])]).unwrap();
        assert_eq!(names(&ordered), vec!["Evidence"]);
        assert!(ordered[0].foreign_keys.is_empty());
    }

    #[test]
    fn test_references_take_the_reflected_spelling() {
        let mut circuits = Table::new("Circuits");
        circuits
            .columns
            .push(Column::from_declared("circuit_id", "INTEGER", false, 1, 0));

        let mut links = Table::new("Links");
        links
            .columns
            .push(Column::from_declared("cid", "INTEGER", true, 0, 0));
        links.foreign_keys.push(ForeignKey {
            id: 0,
            columns: vec!["CID".into()],
            ref_table: "circuits".into(),
            ref_columns: vec!["CIRCUIT_ID".into()],
            on_delete: "NO ACTION".into(),
            on_update: "NO ACTION".into(),
        });

        let ordered = dependency_order(vec![links, circuits]).unwrap();
        assert_eq!(names(&ordered), vec!["Circuits", "Links"]);

        let fk = &ordered[1].foreign_keys[0];
        assert_eq!(fk.ref_table, "Circuits");
        assert_eq!(fk.ref_columns, vec!["circuit_id"]);
        assert_eq!(fk.columns, vec!["cid"]);
        assert_eq!(ordered[1].referenced_tables(), vec!["Circuits"]);
    }

    #[test]
    fn test_cycle_is_reported() {
        let err = dependency_order(vec![
            table("a", &["b"]),
            table("b", &["a"]),
            table("c", &[]),
        ])
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("cycle"), "{msg}");
        assert!(msg.contains("a, b"), "{msg}");
    }
}
