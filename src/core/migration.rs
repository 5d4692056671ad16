// Scaffolding for alembic-style migration revision files. deckhand only
// writes the file; the migration tool itself interprets and runs it.

use chrono::Utc;
use heck::ToSnakeCase;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::template::{render_map, TemplateVars};

const REVISION_TEMPLATE: &str = r#""""{{title}}

Revision ID: {{revision}}
Revises: {{downRevision}}
Create Date: {{createDate}}

"""
from alembic import op
import sqlalchemy as sa

# revision identifiers, used by Alembic.
revision = '{{revision}}'
down_revision = {{downRevisionLiteral}}
branch_labels = {{branchLabels}}
depends_on = {{dependsOn}}


def upgrade() -> None:
    pass


def downgrade() -> None:
    pass
"#;

#[derive(Debug, Clone)]
pub struct RevisionFile {
    pub path: PathBuf,
    pub revision: String,
    pub down_revision: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewRevision {
    pub path: PathBuf,
    pub revision: String,
    pub down_revision: Option<String>,
}

/// Read the revision chain out of every `.py` file in the versions directory.
/// Files without a `revision =` assignment are ignored.
pub fn scan_versions(dir: &Path) -> Result<Vec<RevisionFile>> {
    let mut revisions = Vec::new();
    if !dir.exists() {
        return Ok(revisions);
    }

    let revision_re = Regex::new(r#"(?m)^revision\s*=\s*['"]([0-9A-Za-z_]+)['"]"#)
        .map_err(|e| Error::internal_unexpected(e.to_string()))?;
    let down_re = Regex::new(r#"(?m)^down_revision\s*=\s*['"]([0-9A-Za-z_]+)['"]"#)
        .map_err(|e| Error::internal_unexpected(e.to_string()))?;

    let entries = fs::read_dir(dir).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", dir.display())))
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("read {}", dir.display())))
        })?;
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "py") {
            continue;
        }

        let content = fs::read_to_string(&path).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
        })?;

        let Some(caps) = revision_re.captures(&content) else {
            continue;
        };
        let down_revision = down_re
            .captures(&content)
            .map(|caps| caps[1].to_string());

        revisions.push(RevisionFile {
            path,
            revision: caps[1].to_string(),
            down_revision,
        });
    }

    Ok(revisions)
}

/// The head is the one revision that no other revision revises. An empty
/// directory has no head; more than one head means the chain has diverged.
pub fn head(revisions: &[RevisionFile]) -> Result<Option<String>> {
    let revised: HashSet<&str> = revisions
        .iter()
        .filter_map(|r| r.down_revision.as_deref())
        .collect();

    let heads: Vec<&RevisionFile> = revisions
        .iter()
        .filter(|r| !revised.contains(r.revision.as_str()))
        .collect();

    match heads.len() {
        0 => Ok(None),
        1 => Ok(Some(heads[0].revision.clone())),
        _ => Err(Error::migration_head_ambiguous(
            heads.iter().map(|r| r.revision.clone()).collect(),
        )),
    }
}

/// Render a new revision file chained onto the current head.
pub fn new_revision(
    dir: &Path,
    title: &str,
    branch_labels: &[String],
    depends_on: &[String],
) -> Result<NewRevision> {
    if title.trim().is_empty() {
        return Err(Error::validation_invalid_argument(
            "title",
            "Migration title must not be empty",
            None,
            None,
        ));
    }

    let revisions = scan_versions(dir)?;
    let down_revision = head(&revisions)?;

    let revision = short_revision_id();
    let file_name = format!("{}_{}.py", revision, title.to_snake_case());
    let create_date = Utc::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string();

    let mut vars = HashMap::new();
    vars.insert(TemplateVars::TITLE.to_string(), title.to_string());
    vars.insert(TemplateVars::REVISION.to_string(), revision.clone());
    vars.insert(
        TemplateVars::DOWN_REVISION.to_string(),
        down_revision.clone().unwrap_or_default(),
    );
    vars.insert(
        TemplateVars::DOWN_REVISION_LITERAL.to_string(),
        py_optional_literal(down_revision.as_deref()),
    );
    vars.insert(
        TemplateVars::BRANCH_LABELS.to_string(),
        py_tuple_literal(branch_labels),
    );
    vars.insert(
        TemplateVars::DEPENDS_ON.to_string(),
        py_tuple_literal(depends_on),
    );
    vars.insert(TemplateVars::CREATE_DATE.to_string(), create_date);

    let rendered = render_map(REVISION_TEMPLATE, &vars);

    fs::create_dir_all(dir).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("create {}", dir.display())))
    })?;

    let path = dir.join(file_name);
    fs::write(&path, rendered).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("write {}", path.display())))
    })?;

    Ok(NewRevision {
        path,
        revision,
        down_revision,
    })
}

/// 12 hex chars, the alembic revision-id convention.
fn short_revision_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}

fn py_optional_literal(value: Option<&str>) -> String {
    match value {
        Some(v) => format!("'{}'", v),
        None => "None".to_string(),
    }
}

fn py_tuple_literal(values: &[String]) -> String {
    match values.len() {
        0 => "None".to_string(),
        1 => format!("('{}',)", values[0]),
        _ => format!(
            "({})",
            values
                .iter()
                .map(|v| format!("'{}'", v))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_revision(dir: &Path, revision: &str, down: Option<&str>) {
        let down_literal = py_optional_literal(down);
        let content = format!(
            "revision = '{}'\ndown_revision = {}\n",
            revision, down_literal
        );
        fs::write(dir.join(format!("{}_test.py", revision)), content).unwrap();
    }

    #[test]
    fn empty_directory_has_no_head() {
        let dir = tempfile::tempdir().unwrap();
        let revisions = scan_versions(dir.path()).unwrap();
        assert!(revisions.is_empty());
        assert_eq!(head(&revisions).unwrap(), None);
    }

    #[test]
    fn head_is_the_unrevised_revision() {
        let dir = tempfile::tempdir().unwrap();
        write_revision(dir.path(), "aaa111", None);
        write_revision(dir.path(), "bbb222", Some("aaa111"));

        let revisions = scan_versions(dir.path()).unwrap();
        assert_eq!(revisions.len(), 2);
        assert_eq!(head(&revisions).unwrap().as_deref(), Some("bbb222"));
    }

    #[test]
    fn diverged_chain_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_revision(dir.path(), "aaa111", None);
        write_revision(dir.path(), "bbb222", Some("aaa111"));
        write_revision(dir.path(), "ccc333", Some("aaa111"));

        let revisions = scan_versions(dir.path()).unwrap();
        let err = head(&revisions).unwrap_err();
        assert_eq!(err.code.as_str(), "migration.head_ambiguous");
    }

    #[test]
    fn new_revision_chains_onto_the_head() {
        let dir = tempfile::tempdir().unwrap();
        write_revision(dir.path(), "aaa111", None);

        let created =
            new_revision(dir.path(), "Add library items", &[], &[]).unwrap();
        assert_eq!(created.down_revision.as_deref(), Some("aaa111"));
        assert_eq!(created.revision.len(), 12);

        let content = fs::read_to_string(&created.path).unwrap();
        assert!(content.contains("\"\"\"Add library items"));
        assert!(content.contains(&format!("revision = '{}'", created.revision)));
        assert!(content.contains("down_revision = 'aaa111'"));
        assert!(content.contains("branch_labels = None"));
        assert!(content.contains("def upgrade() -> None:"));
        assert!(content.contains("def downgrade() -> None:"));

        let file_name = created.path.file_name().unwrap().to_string_lossy();
        assert!(file_name.ends_with("_add_library_items.py"));
    }

    #[test]
    fn branch_labels_render_as_python_tuples() {
        assert_eq!(py_tuple_literal(&[]), "None");
        assert_eq!(py_tuple_literal(&["data".to_string()]), "('data',)");
        assert_eq!(
            py_tuple_literal(&["data".to_string(), "schema".to_string()]),
            "('data', 'schema')"
        );
    }

    #[test]
    fn scaffolded_file_is_a_valid_parent() {
        let dir = tempfile::tempdir().unwrap();
        let first = new_revision(dir.path(), "initial tables", &[], &[]).unwrap();
        let second = new_revision(dir.path(), "add indexes", &[], &[]).unwrap();
        assert_eq!(second.down_revision.as_deref(), Some(first.revision.as_str()));
    }
}
