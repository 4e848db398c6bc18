//! Local git repository fixtures.
//!
//! Tests exercise the mirror cache and installer against real git
//! repositories built on the fly: initialized with `main` as the initial
//! branch, populated with design-library-shaped files, and addressed via
//! `file://` URLs (accepted in test mode only).

use std::fs;
use std::path::Path;

use git2::{IndexAddOption, Repository, RepositoryInitOptions, Signature};
use tempfile::TempDir;

/// A throwaway upstream repository.
pub struct FixtureRepo {
    /// Keeps the repository directory alive for the test's duration.
    pub dir: TempDir,

    /// `file://` URL of the repository.
    pub url: String,

    /// Directories of nested fixtures (submodules) that must outlive the
    /// parent repository.
    _children: Vec<TempDir>,
}

impl FixtureRepo {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Current commit SHA of `main`.
    pub fn head_sha(&self) -> String {
        let repo = Repository::open(self.path()).unwrap();
        let sha = repo.head().unwrap().peel_to_commit().unwrap().id().to_string();
        sha
    }

    /// Write files and commit them on `main`. Returns the new commit SHA.
    pub fn commit_files(&self, files: &[(&str, &str)], message: &str) -> String {
        write_files(self.path(), files);
        commit_all(self.path(), message)
    }

    /// Create a lightweight tag at HEAD.
    pub fn tag(&self, name: &str) {
        let repo = Repository::open(self.path()).unwrap();
        let head = repo.head().unwrap().peel(git2::ObjectType::Commit).unwrap();
        repo.tag_lightweight(name, &head, false).unwrap();
    }
}

/// A repository shaped like an analog design library: a top-level LICENSE
/// and a `lib/amplifiers` subtree.
pub fn basic_repo() -> FixtureRepo {
    repo_with_files(&[
        (
            "LICENSE",
            "MIT License\n\nPermission is hereby granted, free of charge, to any person\n",
        ),
        ("README.md", "# analog library fixture\n"),
        ("lib/amplifiers/ota.sch", "* two-stage OTA schematic\n"),
        ("lib/amplifiers/ota.sym", "v {xschem version=3.4.4}\n"),
        ("lib/bias/bandgap.sch", "* bandgap reference\n"),
    ])
}

/// A repository with the given files committed on `main`.
pub fn repo_with_files(files: &[(&str, &str)]) -> FixtureRepo {
    let dir = TempDir::new().unwrap();

    let mut opts = RepositoryInitOptions::new();
    opts.initial_head("main");
    Repository::init_opts(dir.path(), &opts).unwrap();

    write_files(dir.path(), files);
    commit_all(dir.path(), "initial import");

    let url = file_url(dir.path());
    FixtureRepo {
        dir,
        url,
        _children: Vec::new(),
    }
}

/// A repository vendoring a PDK fixture as a git submodule at `vendor/pdk`.
pub fn repo_with_submodule() -> FixtureRepo {
    let sub = repo_with_files(&[
        ("models/nmos.spice", ".model nmos_3v3 nmos level=14\n"),
        ("models/pmos.spice", ".model pmos_3v3 pmos level=14\n"),
    ]);

    let mut parent = basic_repo();
    {
        let repo = Repository::open(parent.path()).unwrap();
        let mut submodule = repo
            .submodule(&sub.url, Path::new("vendor/pdk"), true)
            .unwrap();
        submodule.clone(None).unwrap();
        submodule.add_finalize().unwrap();
    }
    // add_finalize already staged .gitmodules and the gitlink; commit the
    // index as-is so the submodule entry is not re-walked as plain files.
    commit_index(parent.path(), "vendor pdk submodule");

    parent._children.push(sub.dir);
    parent
}

/// `file://` URL for a local path.
pub fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (relative, contents) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
    }
}

/// Stage everything and commit on HEAD. Returns the commit SHA.
pub fn commit_all(repo_dir: &Path, message: &str) -> String {
    let repo = Repository::open(repo_dir).unwrap();
    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();
    commit_index(repo_dir, message)
}

/// Commit the staged index as-is. Returns the commit SHA.
pub fn commit_index(repo_dir: &Path, message: &str) -> String {
    let repo = Repository::open(repo_dir).unwrap();
    let mut index = repo.index().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();

    let signature = Signature::now("fixture", "fixture@example.com").unwrap();
    let parent = repo
        .head()
        .ok()
        .and_then(|head| head.peel_to_commit().ok());
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

    let oid = repo
        .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .unwrap();
    oid.to_string()
}
