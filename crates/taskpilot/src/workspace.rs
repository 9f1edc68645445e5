use std::collections::BTreeSet;
use std::io;
use std::path::Path;

use strum::IntoEnumIterator;
use strum_macros::EnumIter;
use tracing::debug;

/// Workspace files that get echoed into the transcript when an agent creates them
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum ArtifactKind {
    Markdown,
    Text,
}

impl ArtifactKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Markdown => "md",
            ArtifactKind::Text => "txt",
        }
    }

    /// Classify a file purely by its extension
    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::iter().find(|kind| {
            name.strip_suffix(kind.extension())
                .is_some_and(|stem| stem.ends_with('.'))
        })
    }

    /// Format file contents as an assistant message
    pub fn render(&self, content: &str) -> String {
        match self {
            ArtifactKind::Markdown => format!("### 📄 Markdown File Created:\n\n{}", content),
            ArtifactKind::Text => format!("📝 Text File Created:\n\n```\n{}\n```", content),
        }
    }
}

/// Names of the entries in a directory at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceSnapshot {
    names: BTreeSet<String>,
}

impl WorkspaceSnapshot {
    /// List `dir`. A directory that does not exist yields an empty snapshot.
    pub async fn capture(dir: &Path) -> io::Result<Self> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e),
        };

        let mut names = BTreeSet::new();
        while let Some(entry) = entries.next_entry().await? {
            match entry.file_name().into_string() {
                Ok(name) => {
                    names.insert(name);
                }
                Err(name) => debug!("skipping non UTF-8 workspace entry {:?}", name),
            }
        }
        Ok(Self { names })
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names present in `later` but not in this snapshot, in sorted order
    pub fn new_entries<'a>(&'a self, later: &'a WorkspaceSnapshot) -> Vec<&'a str> {
        later
            .names
            .difference(&self.names)
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_artifact_kind_by_extension() {
        assert_eq!(ArtifactKind::from_file_name("report.md"), Some(ArtifactKind::Markdown));
        assert_eq!(ArtifactKind::from_file_name("notes.txt"), Some(ArtifactKind::Text));
        assert_eq!(ArtifactKind::from_file_name("run.log"), None);
        assert_eq!(ArtifactKind::from_file_name("readme"), None);
        assert_eq!(ArtifactKind::from_file_name("summd"), None);
        assert_eq!(ArtifactKind::from_file_name("archive.md.zip"), None);
    }

    #[test]
    fn test_render_keeps_literal_content() {
        let md = ArtifactKind::Markdown.render("# Title\n\nbody");
        assert!(md.starts_with("### 📄 Markdown File Created:"));
        assert!(md.ends_with("# Title\n\nbody"));

        let txt = ArtifactKind::Text.render("plain");
        assert_eq!(txt, "📝 Text File Created:\n\n```\nplain\n```");
    }

    #[test]
    fn test_new_entries_is_a_set_difference() {
        let before = WorkspaceSnapshot::from_names(["a.md"]);
        let after = WorkspaceSnapshot::from_names(["c.log", "a.md", "b.md"]);
        assert_eq!(before.new_entries(&after), vec!["b.md", "c.log"]);
        assert!(after.new_entries(&before).is_empty());
    }

    #[tokio::test]
    async fn test_capture_missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let snapshot = WorkspaceSnapshot::capture(&dir.path().join("missing"))
            .await
            .unwrap();
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn test_capture_lists_entry_names() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "a").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let snapshot = WorkspaceSnapshot::capture(dir.path()).await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains("a.md"));
        assert!(snapshot.contains("nested"));
    }
}
