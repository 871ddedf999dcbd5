//! Dependency ordering of tables by foreign key edges.
//!
//! Depth-first search with an in-progress marker, emitting each table after
//! everything it references. A back edge (cycle) is dropped and reported
//! rather than treated as an error, so any foreign key graph yields a total
//! order. Edges to tables outside the schema and self references are ignored.

use std::collections::HashMap;

use tracing::warn;

use crate::core::schema::Table;

/// A foreign key edge skipped to break a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokenEdge {
    pub from_table: String,
    pub column: String,
    pub to_table: String,
}

/// Tables in load order plus any edges dropped to get there.
#[derive(Debug, Clone, Default)]
pub struct TableOrder {
    pub tables: Vec<String>,
    pub broken_edges: Vec<BrokenEdge>,
}

impl TableOrder {
    pub fn has_cycles(&self) -> bool {
        !self.broken_edges.is_empty()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Order tables so that referenced tables come before referencing ones.
///
/// Ties keep the input (introspection) order.
pub fn dependency_order(tables: &[Table]) -> TableOrder {
    let index: HashMap<&str, usize> = tables
        .iter()
        .enumerate()
        .map(|(i, t)| (t.name.as_str(), i))
        .collect();

    let mut marks = vec![Mark::Unvisited; tables.len()];
    let mut order = TableOrder {
        tables: Vec::with_capacity(tables.len()),
        broken_edges: Vec::new(),
    };

    for start in 0..tables.len() {
        if marks[start] != Mark::Unvisited {
            continue;
        }

        // Explicit stack of (table index, next foreign key position).
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        marks[start] = Mark::InProgress;

        while let Some(frame) = stack.last_mut() {
            let (current, next_fk) = *frame;
            let edges: Vec<(&str, &str)> = tables[current]
                .foreign_keys()
                .map(|(col, fk)| (col.name.as_str(), fk.table.as_str()))
                .collect();

            if next_fk >= edges.len() {
                marks[current] = Mark::Done;
                order.tables.push(tables[current].name.clone());
                stack.pop();
                continue;
            }
            frame.1 += 1;

            let (column, target) = edges[next_fk];
            let Some(&target_idx) = index.get(target) else {
                continue;
            };
            if target_idx == current {
                continue;
            }
            match marks[target_idx] {
                Mark::Unvisited => {
                    marks[target_idx] = Mark::InProgress;
                    stack.push((target_idx, 0));
                }
                Mark::InProgress => {
                    warn!(
                        "Foreign key cycle: ignoring edge {}.{} -> {} for load ordering",
                        tables[current].name, column, target
                    );
                    order.broken_edges.push(BrokenEdge {
                        from_table: tables[current].name.clone(),
                        column: column.to_string(),
                        to_table: target.to_string(),
                    });
                }
                Mark::Done => {}
            }
        }
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::Column;

    fn table(name: &str, refs: &[(&str, &str)]) -> Table {
        let mut t = Table::new(name);
        t.columns.push(Column::new("id", "integer").primary());
        for (col, target) in refs {
            t.columns
                .push(Column::new(*col, "integer").references(*target, "id"));
        }
        t
    }

    fn position(order: &TableOrder, name: &str) -> usize {
        order.tables.iter().position(|t| t == name).unwrap()
    }

    fn assert_total(order: &TableOrder, tables: &[Table]) {
        assert_eq!(order.tables.len(), tables.len());
        for t in tables {
            assert_eq!(
                order.tables.iter().filter(|n| **n == t.name).count(),
                1,
                "{} should appear exactly once",
                t.name
            );
        }
    }

    #[test]
    fn test_referenced_tables_come_first() {
        let tables = vec![
            table("comments", &[("post_id", "posts"), ("user_id", "users")]),
            table("posts", &[("user_id", "users")]),
            table("users", &[]),
        ];
        let order = dependency_order(&tables);
        assert_total(&order, &tables);
        assert!(!order.has_cycles());
        assert!(position(&order, "users") < position(&order, "posts"));
        assert!(position(&order, "posts") < position(&order, "comments"));
    }

    #[test]
    fn test_independent_tables_keep_input_order() {
        let tables = vec![table("b", &[]), table("a", &[]), table("c", &[])];
        let order = dependency_order(&tables);
        assert_eq!(order.tables, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_two_table_cycle_breaks_one_edge() {
        let tables = vec![
            table("employees", &[("department_id", "departments")]),
            table("departments", &[("manager_id", "employees")]),
        ];
        let order = dependency_order(&tables);
        assert_total(&order, &tables);
        assert_eq!(order.broken_edges.len(), 1);
        assert_eq!(order.broken_edges[0].from_table, "departments");
        assert_eq!(order.broken_edges[0].to_table, "employees");
        assert!(position(&order, "departments") < position(&order, "employees"));
    }

    #[test]
    fn test_longer_cycle_with_tail_terminates() {
        let tables = vec![
            table("a", &[("b_id", "b")]),
            table("b", &[("c_id", "c")]),
            table("c", &[("a_id", "a")]),
            table("d", &[("a_id", "a")]),
        ];
        let order = dependency_order(&tables);
        assert_total(&order, &tables);
        assert_eq!(order.broken_edges.len(), 1);
        assert!(position(&order, "a") < position(&order, "d"));
    }

    #[test]
    fn test_self_reference_and_missing_target_add_no_edge() {
        let tables = vec![
            table("nodes", &[("parent_id", "nodes")]),
            table("audit", &[("actor_id", "accounts")]),
        ];
        let order = dependency_order(&tables);
        assert_eq!(order.tables, vec!["nodes", "audit"]);
        assert!(!order.has_cycles());
    }

    #[test]
    fn test_dense_graph_is_total() {
        let names: Vec<String> = (0..12).map(|i| format!("t{}", i)).collect();
        let tables: Vec<Table> = (0..12)
            .map(|i| {
                let refs: Vec<(String, String)> = (0..12)
                    .filter(|j| (i * 7 + j * 3) % 4 == 0 && *j != i)
                    .map(|j| (format!("ref_{}", j), names[j].clone()))
                    .collect();
                let borrowed: Vec<(&str, &str)> =
                    refs.iter().map(|(c, t)| (c.as_str(), t.as_str())).collect();
                table(&names[i], &borrowed)
            })
            .collect();
        let order = dependency_order(&tables);
        assert_total(&order, &tables);
    }

    #[test]
    fn test_empty_input() {
        let order = dependency_order(&[]);
        assert!(order.tables.is_empty());
    }
}
