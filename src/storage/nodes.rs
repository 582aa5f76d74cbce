//! Node tree store: the admin-authored menu tree with cached materialized
//! paths.
//!
//! `path` is kept eagerly consistent: every create/update recomputes the
//! node's own path from its ancestor chain and then refreshes the whole
//! subtree below it. Both walks carry a visited set, so a parent cycle
//! (which only a broken admin write can produce) fails the save instead of
//! recursing forever.

use std::collections::{HashSet, VecDeque};

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::core::error::{AppError, AppResult};

/// Separator between segments of a materialized path.
pub const PATH_SEPARATOR: &str = " – ";

/// A menu-tree vertex.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: i64,
    /// Label shown on the parent's button for this node
    pub button_text: String,
    /// Body content sent on entry, optional
    pub text: Option<String>,
    /// Caption shown above the child-button rows
    pub nav_text: String,
    pub parent_id: Option<i64>,
    /// Name of a registered input flow to launch instead of showing children
    pub input_function: Option<String>,
    /// Cached materialized path from the root
    pub path: Option<String>,
    /// Sort key among siblings
    pub button_order: i64,
}

/// A content file attached to a node, streamed to users on entry.
#[derive(Debug, Clone)]
pub struct NodeFile {
    pub id: i64,
    pub node_id: i64,
    /// Path relative to FILES_ROOT
    pub file_path: String,
}

/// Field set for creating or updating a node (the admin surface's write
/// shape; also used by tests to seed trees).
#[derive(Debug, Clone)]
pub struct NodeParams {
    pub button_text: String,
    pub text: Option<String>,
    pub nav_text: String,
    pub parent_id: Option<i64>,
    pub input_function: Option<String>,
    pub button_order: i64,
}

impl NodeParams {
    pub fn new(button_text: impl Into<String>) -> Self {
        Self {
            button_text: button_text.into(),
            text: None,
            nav_text: "-".to_string(),
            parent_id: None,
            input_function: None,
            button_order: 0,
        }
    }
}

const NODE_COLUMNS: &str = "id, button_text, text, nav_text, parent_id, input_function, path, button_order";

fn node_from_row(row: &Row<'_>) -> rusqlite::Result<Node> {
    Ok(Node {
        id: row.get(0)?,
        button_text: row.get(1)?,
        text: row.get(2)?,
        nav_text: row.get(3)?,
        parent_id: row.get(4)?,
        input_function: row.get(5)?,
        path: row.get(6)?,
        button_order: row.get(7)?,
    })
}

pub fn get(conn: &Connection, id: i64) -> AppResult<Option<Node>> {
    let node = conn
        .query_row(
            &format!("SELECT {} FROM nodes WHERE id = ?1", NODE_COLUMNS),
            params![id],
            node_from_row,
        )
        .optional()?;
    Ok(node)
}

/// The tree root: the node without a parent. With a well-formed tree there
/// is exactly one; if the admin has produced several, the oldest wins.
pub fn root(conn: &Connection) -> AppResult<Option<Node>> {
    let node = conn
        .query_row(
            &format!(
                "SELECT {} FROM nodes WHERE parent_id IS NULL ORDER BY id LIMIT 1",
                NODE_COLUMNS
            ),
            [],
            node_from_row,
        )
        .optional()?;
    Ok(node)
}

/// Children of a node, in menu order.
pub fn children(conn: &Connection, id: i64) -> AppResult<Vec<Node>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM nodes WHERE parent_id = ?1 ORDER BY button_order, id",
        NODE_COLUMNS
    ))?;
    let rows = stmt.query_map(params![id], node_from_row)?;
    let mut nodes = Vec::new();
    for row in rows {
        nodes.push(row?);
    }
    Ok(nodes)
}

/// Content files attached to a node.
pub fn files(conn: &Connection, node_id: i64) -> AppResult<Vec<NodeFile>> {
    let mut stmt = conn.prepare("SELECT id, node_id, file_path FROM node_files WHERE node_id = ?1 ORDER BY id")?;
    let rows = stmt.query_map(params![node_id], |row| {
        Ok(NodeFile {
            id: row.get(0)?,
            node_id: row.get(1)?,
            file_path: row.get(2)?,
        })
    })?;
    let mut files = Vec::new();
    for row in rows {
        files.push(row?);
    }
    Ok(files)
}

/// Distinct `input_function` values present in the tree, for startup
/// validation against the closed flow registry.
pub fn input_functions(conn: &Connection) -> AppResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT DISTINCT input_function FROM nodes WHERE input_function IS NOT NULL")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut names = Vec::new();
    for row in rows {
        names.push(row?);
    }
    Ok(names)
}

pub fn create(conn: &Connection, node: &NodeParams) -> AppResult<Node> {
    conn.execute(
        "INSERT INTO nodes (button_text, text, nav_text, parent_id, input_function, button_order)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            node.button_text,
            node.text,
            node.nav_text,
            node.parent_id,
            node.input_function,
            node.button_order,
        ],
    )?;
    let id = conn.last_insert_rowid();
    refresh_paths(conn, id)?;
    get(conn, id)?.ok_or(AppError::NodeNotFound(id))
}

pub fn update(conn: &Connection, id: i64, node: &NodeParams) -> AppResult<Node> {
    let changed = conn.execute(
        "UPDATE nodes SET button_text = ?1, text = ?2, nav_text = ?3, parent_id = ?4,
                input_function = ?5, button_order = ?6
         WHERE id = ?7",
        params![
            node.button_text,
            node.text,
            node.nav_text,
            node.parent_id,
            node.input_function,
            node.button_order,
            id,
        ],
    )?;
    if changed == 0 {
        return Err(AppError::NodeNotFound(id));
    }
    refresh_paths(conn, id)?;
    get(conn, id)?.ok_or(AppError::NodeNotFound(id))
}

/// Deletes a node. Children are detached (their parent link goes NULL),
/// attached content files are removed with the node.
pub fn delete(conn: &Connection, id: i64) -> AppResult<()> {
    conn.execute("DELETE FROM nodes WHERE id = ?1", params![id])?;
    Ok(())
}

pub fn add_file(conn: &Connection, node_id: i64, file_path: &str) -> AppResult<NodeFile> {
    conn.execute(
        "INSERT INTO node_files (node_id, file_path) VALUES (?1, ?2)",
        params![node_id, file_path],
    )?;
    let id = conn.last_insert_rowid();
    Ok(NodeFile {
        id,
        node_id,
        file_path: file_path.to_string(),
    })
}

/// Derives a node's path from its ancestor chain. The visited set turns a
/// parent cycle into a hard validation error.
fn compute_path(conn: &Connection, node: &Node) -> AppResult<String> {
    let mut segments = vec![node.button_text.clone()];
    let mut seen = HashSet::from([node.id]);
    let mut cursor = node.parent_id;

    while let Some(parent_id) = cursor {
        if !seen.insert(parent_id) {
            return Err(AppError::Validation(format!(
                "cycle in node tree at node {}",
                parent_id
            )));
        }
        let parent = get(conn, parent_id)?.ok_or(AppError::NodeNotFound(parent_id))?;
        segments.push(parent.button_text.clone());
        cursor = parent.parent_id;
    }

    segments.reverse();
    Ok(segments.join(PATH_SEPARATOR))
}

/// Recomputes the cached path of `start_id` and every node below it.
///
/// Breadth-first over the subtree; a node seen twice means the subtree
/// loops back on itself and the walk aborts with a validation error.
pub fn refresh_paths(conn: &Connection, start_id: i64) -> AppResult<()> {
    let mut queue = VecDeque::from([start_id]);
    let mut seen = HashSet::new();

    while let Some(id) = queue.pop_front() {
        if !seen.insert(id) {
            return Err(AppError::Validation(format!("cycle in node tree at node {}", id)));
        }
        let node = get(conn, id)?.ok_or(AppError::NodeNotFound(id))?;
        let path = compute_path(conn, &node)?;
        conn.execute("UPDATE nodes SET path = ?1 WHERE id = ?2", params![path, id])?;
        for child in children(conn, id)? {
            queue.push_back(child.id);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::migrations::run_migrations_for_test;
    use pretty_assertions::assert_eq;

    fn test_conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations_for_test(&mut conn).unwrap();
        conn
    }

    fn child_of(parent: i64, label: &str, order: i64) -> NodeParams {
        NodeParams {
            parent_id: Some(parent),
            button_order: order,
            ..NodeParams::new(label)
        }
    }

    #[test]
    fn path_is_derived_from_ancestor_chain() {
        let conn = test_conn();
        let root = create(&conn, &NodeParams::new("Старт")).unwrap();
        let child = create(&conn, &child_of(root.id, "Тендеры", 0)).unwrap();
        let grandchild = create(&conn, &child_of(child.id, "Документы", 0)).unwrap();

        assert_eq!(root.path.as_deref(), Some("Старт"));
        assert_eq!(child.path.as_deref(), Some("Старт – Тендеры"));
        assert_eq!(grandchild.path.as_deref(), Some("Старт – Тендеры – Документы"));
    }

    #[test]
    fn renaming_an_ancestor_cascades_to_descendants() {
        let conn = test_conn();
        let root = create(&conn, &NodeParams::new("Старт")).unwrap();
        let child = create(&conn, &child_of(root.id, "Тендеры", 0)).unwrap();
        let grandchild = create(&conn, &child_of(child.id, "Документы", 0)).unwrap();

        update(&conn, root.id, &NodeParams::new("Начало")).unwrap();

        let child = get(&conn, child.id).unwrap().unwrap();
        let grandchild = get(&conn, grandchild.id).unwrap().unwrap();
        assert_eq!(child.path.as_deref(), Some("Начало – Тендеры"));
        assert_eq!(grandchild.path.as_deref(), Some("Начало – Тендеры – Документы"));
    }

    #[test]
    fn reparenting_moves_the_whole_subtree_path() {
        let conn = test_conn();
        let root = create(&conn, &NodeParams::new("Старт")).unwrap();
        let a = create(&conn, &child_of(root.id, "А", 0)).unwrap();
        let b = create(&conn, &child_of(root.id, "Б", 1)).unwrap();
        let leaf = create(&conn, &child_of(a.id, "Лист", 0)).unwrap();

        update(&conn, a.id, &child_of(b.id, "А", 0)).unwrap();

        let a = get(&conn, a.id).unwrap().unwrap();
        let leaf = get(&conn, leaf.id).unwrap().unwrap();
        assert_eq!(a.path.as_deref(), Some("Старт – Б – А"));
        assert_eq!(leaf.path.as_deref(), Some("Старт – Б – А – Лист"));
    }

    #[test]
    fn parent_cycle_fails_the_save_instead_of_looping() {
        let conn = test_conn();
        let root = create(&conn, &NodeParams::new("Старт")).unwrap();
        let child = create(&conn, &child_of(root.id, "А", 0)).unwrap();

        // Corrupt the tree behind the store's back, then try to recompute.
        conn.execute(
            "UPDATE nodes SET parent_id = ?1 WHERE id = ?2",
            params![child.id, root.id],
        )
        .unwrap();

        assert!(matches!(
            refresh_paths(&conn, root.id),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn children_are_ordered_by_button_order() {
        let conn = test_conn();
        let root = create(&conn, &NodeParams::new("Старт")).unwrap();
        create(&conn, &child_of(root.id, "Третий", 30)).unwrap();
        create(&conn, &child_of(root.id, "Первый", 10)).unwrap();
        create(&conn, &child_of(root.id, "Второй", 20)).unwrap();

        let labels: Vec<String> = children(&conn, root.id)
            .unwrap()
            .into_iter()
            .map(|n| n.button_text)
            .collect();
        assert_eq!(labels, vec!["Первый", "Второй", "Третий"]);
    }

    #[test]
    fn deleting_a_parent_detaches_children() {
        let conn = test_conn();
        let root = create(&conn, &NodeParams::new("Старт")).unwrap();
        let parent = create(&conn, &child_of(root.id, "Раздел", 0)).unwrap();
        let child = create(&conn, &child_of(parent.id, "Лист", 0)).unwrap();
        add_file(&conn, parent.id, "nodes_content/doc.pdf").unwrap();

        delete(&conn, parent.id).unwrap();

        let child = get(&conn, child.id).unwrap().unwrap();
        assert_eq!(child.parent_id, None);
        // Owned content files go away with the node.
        assert!(files(&conn, parent.id).unwrap().is_empty());
    }

    #[test]
    fn root_is_the_parentless_node() {
        let conn = test_conn();
        assert!(root(&conn).unwrap().is_none());
        let r = create(&conn, &NodeParams::new("Старт")).unwrap();
        create(&conn, &child_of(r.id, "А", 0)).unwrap();
        assert_eq!(root(&conn).unwrap().map(|n| n.id), Some(r.id));
    }
}
