//! Local discovery of dependency manifests and hashable files.
//!
//! The walk prunes hidden entries, a built-in directory blacklist and any
//! user exclusion globs, then classifies remaining files against the
//! package-manager pattern table and the hashable extension set. Results
//! are sorted by path so repeated runs over the same tree are identical.

use crate::model::{DiscoveredFiles, FileMatchType, HashableFile, ManifestFile};
use glob::Pattern;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Manifest filename globs per package manager, matched against file names.
const MANIFEST_PATTERNS: &[(&str, &[&str])] = &[
    ("Cargo", &["Cargo.toml", "Cargo.lock"]),
    (
        "NPM",
        &[
            "package.json",
            "package-lock.json",
            "yarn.lock",
            "pnpm-lock.yaml",
        ],
    ),
    (
        "Python",
        &[
            "requirements*.txt",
            "Pipfile",
            "Pipfile.lock",
            "pyproject.toml",
            "poetry.lock",
        ],
    ),
    ("Maven", &["pom.xml"]),
    ("Gradle", &["build.gradle", "build.gradle.kts", "gradle.lockfile"]),
    ("NuGet", &["packages.config", "*.csproj", "packages.lock.json"]),
    ("Go", &["go.mod", "go.sum"]),
    ("Ruby", &["Gemfile", "Gemfile.lock"]),
    ("Composer", &["composer.json", "composer.lock"]),
];

/// Extensions collected for content hashing, for ecosystems that ship
/// artifacts without manifests.
const HASHABLE_EXTENSIONS: &[&str] = &["jar", "war", "ear", "dll", "exe", "apk", "aar"];

/// Directories never worth walking into.
const DIRECTORY_BLACKLIST: &[&str] = &[
    "node_modules",
    "target",
    "dist",
    "build",
    "__pycache__",
    ".venv",
    "venv",
    ".git",
    "vendor",
    "bin",
    "obj",
];

/// Walks `root` and classifies files under the requested match type.
pub fn discover_files(
    root: &Path,
    files_to_exclude: &[String],
    directories_to_exclude: &[String],
    package_managers: &[String],
    file_match_type: FileMatchType,
) -> DiscoveredFiles {
    let dir_excludes = compile_patterns(directories_to_exclude);
    let file_excludes = compile_patterns(files_to_exclude);
    let managers = active_managers(package_managers);

    let collect_manifests = matches!(
        file_match_type,
        FileMatchType::Manifest | FileMatchType::ManifestAndFileHash
    );
    let collect_hashes = matches!(
        file_match_type,
        FileMatchType::FileHash | FileMatchType::ManifestAndFileHash
    );

    let mut result = DiscoveredFiles::default();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| should_descend(entry, &dir_excludes));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if file_excludes.iter().any(|pattern| pattern.matches(&name)) {
            continue;
        }

        if collect_manifests {
            if let Some(manager) = match_manifest(&name, &managers) {
                result.manifest_files.push(ManifestFile {
                    path: entry.path().to_path_buf(),
                    name,
                    package_manager: manager.to_string(),
                });
                continue;
            }
        }

        if collect_hashes && has_hashable_extension(entry.path()) {
            match hash_file(entry.path()) {
                Ok(sha256) => result.hashable_files.push(HashableFile {
                    path: entry.path().to_path_buf(),
                    name,
                    sha256,
                }),
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "could not hash file")
                }
            }
        }
    }

    result.manifest_files.sort_by(|a, b| a.path.cmp(&b.path));
    result.hashable_files.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(
        manifests = result.manifest_files.len(),
        hashable = result.hashable_files.len(),
        "file discovery complete"
    );
    result
}

fn should_descend(entry: &DirEntry, excluded_dirs: &[Pattern]) -> bool {
    // The walk root itself is always entered, even when its name is hidden.
    if entry.depth() == 0 {
        return true;
    }
    let Some(name) = entry.file_name().to_str() else {
        return false;
    };
    if name.starts_with('.') {
        return false;
    }
    if entry.file_type().is_dir() {
        if DIRECTORY_BLACKLIST.contains(&name) {
            return false;
        }
        if excluded_dirs.iter().any(|pattern| pattern.matches(name)) {
            return false;
        }
    }
    true
}

fn compile_patterns(patterns: &[String]) -> Vec<Pattern> {
    patterns
        .iter()
        .filter_map(|raw| match Pattern::new(raw) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                warn!(pattern = raw, error = %e, "ignoring invalid exclusion pattern");
                None
            }
        })
        .collect()
}

/// Rows of the pattern table active for this run, with compiled globs.
/// An empty request selects every known package manager.
fn active_managers(requested: &[String]) -> Vec<(&'static str, Vec<Pattern>)> {
    MANIFEST_PATTERNS
        .iter()
        .filter(|(manager, _)| {
            requested.is_empty()
                || requested
                    .iter()
                    .any(|wanted| wanted.eq_ignore_ascii_case(manager))
        })
        .map(|(manager, patterns)| {
            let compiled = patterns
                .iter()
                .filter_map(|raw| Pattern::new(raw).ok())
                .collect();
            (*manager, compiled)
        })
        .collect()
}

fn match_manifest<'a>(
    name: &str,
    managers: &'a [(&'static str, Vec<Pattern>)],
) -> Option<&'a str> {
    managers
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|pattern| pattern.matches(name)))
        .map(|(manager, _)| *manager)
}

fn has_hashable_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            HASHABLE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

fn hash_file(path: &Path) -> Result<String, std::io::Error> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, relative: &str, content: &[u8]) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn names(files: &[ManifestFile]) -> Vec<&str> {
        files.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn finds_manifests_and_prunes_blacklisted_directories() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Cargo.toml", b"[package]");
        write(dir.path(), "web/package.json", b"{}");
        write(dir.path(), "node_modules/package.json", b"{}");
        write(dir.path(), "target/Cargo.toml", b"[package]");
        write(dir.path(), ".hidden/Cargo.toml", b"[package]");
        write(dir.path(), "README.md", b"docs");

        let found = discover_files(dir.path(), &[], &[], &[], FileMatchType::Manifest);

        assert_eq!(found.manifest_files.len(), 2);
        assert_eq!(names(&found.manifest_files), vec!["Cargo.toml", "package.json"]);
        assert!(found.hashable_files.is_empty());

        let managers: Vec<&str> = found
            .manifest_files
            .iter()
            .map(|f| f.package_manager.as_str())
            .collect();
        assert_eq!(managers, vec!["Cargo", "NPM"]);
    }

    #[test]
    fn manifest_mode_ignores_hashable_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "lib/app.jar", b"bytes");

        let found = discover_files(dir.path(), &[], &[], &[], FileMatchType::Manifest);
        assert!(found.is_empty());
    }

    #[test]
    fn hashable_files_get_content_digests() {
        let dir = tempfile::tempdir().unwrap();
        let content = b"jar bytes";
        write(dir.path(), "lib/app.jar", content);
        write(dir.path(), "Cargo.toml", b"[package]");

        let found = discover_files(
            dir.path(),
            &[],
            &[],
            &[],
            FileMatchType::ManifestAndFileHash,
        );

        assert_eq!(found.manifest_files.len(), 1);
        assert_eq!(found.hashable_files.len(), 1);

        let expected = format!("{:x}", Sha256::digest(content));
        assert_eq!(found.hashable_files[0].sha256, expected);
        assert_eq!(found.hashable_files[0].name, "app.jar");
    }

    #[test]
    fn file_hash_mode_ignores_manifests() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Cargo.toml", b"[package]");
        write(dir.path(), "app.dll", b"binary");

        let found = discover_files(dir.path(), &[], &[], &[], FileMatchType::FileHash);
        assert!(found.manifest_files.is_empty());
        assert_eq!(found.hashable_files.len(), 1);
    }

    #[test]
    fn package_manager_filter_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Cargo.toml", b"[package]");
        write(dir.path(), "package.json", b"{}");

        let found = discover_files(
            dir.path(),
            &[],
            &[],
            &["cargo".to_string()],
            FileMatchType::Manifest,
        );
        assert_eq!(names(&found.manifest_files), vec!["Cargo.toml"]);
    }

    #[test]
    fn exclusion_globs_filter_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Cargo.toml", b"[package]");
        write(dir.path(), "fixtures/package.json", b"{}");
        write(dir.path(), "yarn.lock", b"");

        let found = discover_files(
            dir.path(),
            &["yarn.*".to_string()],
            &["fixture*".to_string()],
            &[],
            FileMatchType::Manifest,
        );
        assert_eq!(names(&found.manifest_files), vec!["Cargo.toml"]);
    }

    #[test]
    fn glob_patterns_match_project_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Service.csproj", b"<Project/>");
        write(dir.path(), "requirements-dev.txt", b"pytest");

        let found = discover_files(dir.path(), &[], &[], &[], FileMatchType::Manifest);
        let managers: Vec<&str> = found
            .manifest_files
            .iter()
            .map(|f| f.package_manager.as_str())
            .collect();
        assert!(managers.contains(&"NuGet"));
        assert!(managers.contains(&"Python"));
    }

    #[test]
    fn output_is_sorted_by_path() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "zeta/Cargo.toml", b"[package]");
        write(dir.path(), "alpha/Cargo.toml", b"[package]");
        write(dir.path(), "Cargo.toml", b"[package]");

        let found = discover_files(dir.path(), &[], &[], &[], FileMatchType::Manifest);
        let paths: Vec<_> = found.manifest_files.iter().map(|f| f.path.clone()).collect();
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);
    }
}
