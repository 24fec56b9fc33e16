//! Source-control context recorded on the scan at setup time.

use git2::Repository;
use std::path::Path;
use tracing::debug;

/// Branch and commit of the scanned working tree. Either field may be
/// absent: a detached HEAD has no branch name, an unborn repository has
/// neither.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GitContext {
    pub branch_name: Option<String>,
    pub commit_hash: Option<String>,
}

/// Reads branch and commit from the repository containing `path`.
///
/// Directories outside any repository, or repositories without a readable
/// HEAD, produce an empty context rather than an error; the scan proceeds
/// without source-control metadata.
pub fn discover_git_context(path: &Path) -> GitContext {
    let repo = match Repository::discover(path) {
        Ok(repo) => repo,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "no git repository found");
            return GitContext::default();
        }
    };

    // Bound to a local so the head reference drops before `repo`.
    let head = repo.head();
    match head {
        Ok(head) => {
            let branch_name = if head.is_branch() {
                head.shorthand().map(str::to_owned)
            } else {
                None
            };
            GitContext {
                branch_name,
                commit_hash: head.target().map(|oid| oid.to_string()),
            }
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "repository has no readable HEAD");
            GitContext::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;

    fn commit_file(repo: &Repository, name: &str, content: &str) {
        let workdir = repo.workdir().unwrap();
        std::fs::write(workdir.join(name), content).unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();

        let sig = Signature::now("tester", "tester@example.com").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
            .unwrap();
    }

    #[test]
    fn reads_branch_and_commit_from_repository() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        repo.set_head("refs/heads/main").unwrap();
        commit_file(&repo, "README.md", "hello");

        let context = discover_git_context(dir.path());
        assert_eq!(context.branch_name.as_deref(), Some("main"));
        let commit = context.commit_hash.unwrap();
        assert_eq!(commit.len(), 40);
        assert!(commit.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn unborn_repository_yields_empty_context() {
        let dir = tempfile::tempdir().unwrap();
        Repository::init(dir.path()).unwrap();

        let context = discover_git_context(dir.path());
        assert_eq!(context, GitContext::default());
    }

    #[test]
    fn non_repository_directory_yields_empty_context() {
        let dir = tempfile::tempdir().unwrap();

        let context = discover_git_context(dir.path());
        assert_eq!(context, GitContext::default());
    }

    #[test]
    fn discovery_walks_up_from_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        repo.set_head("refs/heads/main").unwrap();
        commit_file(&repo, "README.md", "hello");

        let nested = dir.path().join("src").join("deep");
        std::fs::create_dir_all(&nested).unwrap();

        let context = discover_git_context(&nested);
        assert_eq!(context.branch_name.as_deref(), Some("main"));
        assert!(context.commit_hash.is_some());
    }
}
