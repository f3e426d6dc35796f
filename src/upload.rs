// Upload workflow: validate a request, copy its files into the checkout
// under the composed name, then commit and push them.

use crate::error::{Error, Result};
use crate::git::{Gateway, VersionControl};
use crate::layout::{IMAGES_DIR, LITEMATIC_DIR};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One upload attempt, built fresh from the form.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub base_name: String,
    /// Selected tags, in vocabulary order.
    pub selected_tags: Vec<String>,
    pub litematic_files: Vec<PathBuf>,
    pub image: Option<PathBuf>,
}

impl UploadRequest {
    /// `base_name[tag1 tag2]`, or just `base_name` without tags.
    pub fn composed_name(&self) -> String {
        compose_name(self.base_name.trim(), &self.selected_tags)
    }
}

/// Where to publish, taken from the repository settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Remote {
    pub url: String,
    pub token: String,
}

/// Progress reported while an upload runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PreparingRepository,
    CopyingFiles,
    Publishing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Stage::PreparingRepository => "Preparing repository...",
            Stage::CopyingFiles => "Copying files...",
            Stage::Publishing => "Committing and pushing...",
        };
        f.write_str(text)
    }
}

/// What a successful upload produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub name: String,
    pub files: Vec<PathBuf>,
    /// False when the files matched the remote and nothing was pushed.
    pub committed: bool,
}

pub fn compose_name(base_name: &str, tags: &[String]) -> String {
    if tags.is_empty() {
        base_name.to_string()
    } else {
        format!("{}[{}]", base_name, tags.join(" "))
    }
}

/// Check a request before anything touches disk or network.
pub fn validate(request: &UploadRequest, remote: &Remote) -> Result<()> {
    if request.base_name.trim().is_empty() {
        return Err(Error::Validation("Please enter a name".into()));
    }
    if !is_plain_file_name(request.base_name.trim()) {
        return Err(Error::Validation(
            "The name must not contain '/', '\\' or '..'".into(),
        ));
    }
    if let Some(tag) = request.selected_tags.iter().find(|t| !is_plain_file_name(t)) {
        return Err(Error::Validation(format!(
            "The tag \"{}\" must not contain '/', '\\' or '..'",
            tag
        )));
    }
    if request.litematic_files.is_empty() && request.image.is_none() {
        return Err(Error::Validation(
            "Please select at least one litematic file or an image".into(),
        ));
    }
    if remote.url.trim().is_empty() || remote.token.trim().is_empty() {
        return Err(Error::Validation(
            "Please save the repository URL and token first".into(),
        ));
    }
    Ok(())
}

/// Whether `part` stays a single file name inside the checkout.
fn is_plain_file_name(part: &str) -> bool {
    !part.contains('/') && !part.contains('\\') && !part.contains("..")
}

fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst).map_err(|err| {
        io::Error::new(
            err.kind(),
            format!("cannot copy {}: {}", src.display(), err),
        )
    })?;
    log::debug!("copied {} to {}", src.display(), dst.display());
    Ok(())
}

/// Drives one upload through the gateway.
#[derive(Debug)]
pub struct Uploader<V> {
    gateway: Gateway<V>,
}

impl<V: VersionControl> Uploader<V> {
    pub fn new(gateway: Gateway<V>) -> Self {
        Uploader { gateway }
    }

    pub fn gateway(&self) -> &Gateway<V> {
        &self.gateway
    }

    /// Run the whole workflow. The first failure aborts it; files already
    /// copied are left in place.
    pub fn upload(
        &self,
        request: &UploadRequest,
        remote: &Remote,
        mut on_stage: impl FnMut(Stage),
    ) -> Result<UploadOutcome> {
        validate(request, remote)?;
        let name = request.composed_name();

        on_stage(Stage::PreparingRepository);
        self.gateway
            .ensure_repository(remote.url.trim(), remote.token.trim())?;

        on_stage(Stage::CopyingFiles);
        let files = self.copy_files(request, &name)?;

        on_stage(Stage::Publishing);
        let committed = self
            .gateway
            .commit_and_push(&format!("Add {}", name), &files)?;

        Ok(UploadOutcome {
            name,
            files,
            committed,
        })
    }

    fn copy_files(&self, request: &UploadRequest, name: &str) -> Result<Vec<PathBuf>> {
        let root = self.gateway.root();
        let litematic_dir = root.join(LITEMATIC_DIR);
        let images_dir = root.join(IMAGES_DIR);
        fs::create_dir_all(&litematic_dir)?;
        fs::create_dir_all(&images_dir)?;

        if request.litematic_files.len() > 1 {
            log::warn!(
                "{} litematic files selected, all are written to {}.litematic and the last one wins",
                request.litematic_files.len(),
                name
            );
        }

        let mut files = Vec::new();
        for src in &request.litematic_files {
            let dst = litematic_dir.join(format!("{}.litematic", name));
            copy_file(src, &dst)?;
            if !files.contains(&dst) {
                files.push(dst);
            }
        }

        if let Some(src) = &request.image {
            let dst = images_dir.join(format!("{}.png", name));
            copy_file(src, &dst)?;
            files.push(dst);
        }

        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::fake::FakeVcs;

    fn remote() -> Remote {
        Remote {
            url: "https://github.com/example/schematics.git".into(),
            token: "tok".into(),
        }
    }

    fn uploader(root: &Path, pending: bool) -> Uploader<FakeVcs> {
        let vcs = FakeVcs {
            pending,
            ..FakeVcs::default()
        };
        Uploader::new(Gateway::new(vcs, root))
    }

    #[test]
    fn name_without_tags_is_base_name() {
        assert_eq!(compose_name("Foo", &[]), "Foo");
    }

    #[test]
    fn tags_are_bracketed_and_space_joined() {
        let tags = vec!["tag1".to_string(), "tag2".to_string()];
        assert_eq!(compose_name("Foo", &tags), "Foo[tag1 tag2]");
    }

    #[test]
    fn empty_name_fails_without_touching_the_gateway() {
        let dir = tempfile::tempdir().unwrap();
        let up = uploader(dir.path(), true);
        let request = UploadRequest {
            base_name: "   ".into(),
            litematic_files: vec![dir.path().join("a.litematic")],
            ..UploadRequest::default()
        };

        let mut stages = Vec::new();
        let err = up.upload(&request, &remote(), |s| stages.push(s)).unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert!(stages.is_empty());
        assert!(up.gateway().vcs().calls().is_empty());
    }

    #[test]
    fn request_without_files_fails_validation() {
        let request = UploadRequest {
            base_name: "Sorter".into(),
            ..UploadRequest::default()
        };
        let err = validate(&request, &remote()).unwrap_err();
        assert!(matches!(err, Error::Validation(ref m) if m.contains("litematic")));
    }

    #[test]
    fn names_with_path_components_fail_without_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let checkout = dir.path().join("nested").join(".repo");
        let src = dir.path().join("input.litematic");
        fs::write(&src, b"schematic").unwrap();
        let up = uploader(&checkout, true);

        for name in ["../../../x", "A/B", "A\\B", ".."] {
            let request = UploadRequest {
                base_name: name.into(),
                litematic_files: vec![src.clone()],
                ..UploadRequest::default()
            };
            let err = up.upload(&request, &remote(), |_| {}).unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{} was accepted", name);
        }

        let request = UploadRequest {
            base_name: "Sorter".into(),
            selected_tags: vec!["a/b".into()],
            litematic_files: vec![src],
            ..UploadRequest::default()
        };
        let err = up.upload(&request, &remote(), |_| {}).unwrap_err();
        assert!(matches!(err, Error::Validation(ref m) if m.contains("a/b")));

        assert!(up.gateway().vcs().calls().is_empty());
        assert!(!dir.path().join("x.litematic").exists());
        assert!(!checkout.exists());
    }

    #[test]
    fn missing_repository_settings_fail_validation() {
        let request = UploadRequest {
            base_name: "Sorter".into(),
            image: Some(PathBuf::from("preview.png")),
            ..UploadRequest::default()
        };
        let no_token = Remote {
            token: String::new(),
            ..remote()
        };
        let err = validate(&request, &no_token).unwrap_err();
        assert!(matches!(err, Error::Validation(ref m) if m.contains("repository")));
    }

    #[test]
    fn upload_copies_under_composed_name_and_publishes() {
        let dir = tempfile::tempdir().unwrap();
        let checkout = dir.path().join(".repo");
        let src = dir.path().join("input.litematic");
        let img = dir.path().join("shot.png");
        fs::write(&src, b"schematic").unwrap();
        fs::write(&img, b"png").unwrap();

        let up = uploader(&checkout, true);
        let request = UploadRequest {
            base_name: "Sorter".into(),
            selected_tags: vec!["分盒器".into()],
            litematic_files: vec![src.clone()],
            image: Some(img.clone()),
        };

        let mut stages = Vec::new();
        let outcome = up.upload(&request, &remote(), |s| stages.push(s)).unwrap();

        assert_eq!(outcome.name, "Sorter[分盒器]");
        assert!(outcome.committed);
        let lit = checkout.join("files/litematic/Sorter[分盒器].litematic");
        let png = checkout.join("files/images/Sorter[分盒器].png");
        assert_eq!(outcome.files, vec![lit.clone(), png.clone()]);
        assert_eq!(fs::read(&lit).unwrap(), b"schematic");
        assert_eq!(fs::read(&png).unwrap(), b"png");
        assert!(src.exists(), "sources are copied, not moved");
        assert_eq!(
            stages,
            vec![
                Stage::PreparingRepository,
                Stage::CopyingFiles,
                Stage::Publishing
            ]
        );

        let calls = up.gateway().vcs().calls();
        assert!(calls.contains(&"commit Add Sorter[分盒器]".to_string()));
        assert!(calls.contains(&"push origin HEAD:main".to_string()));
    }

    #[test]
    fn several_litematics_collapse_onto_one_destination() {
        let dir = tempfile::tempdir().unwrap();
        let checkout = dir.path().join(".repo");
        let first = dir.path().join("first.litematic");
        let second = dir.path().join("second.litematic");
        fs::write(&first, b"first").unwrap();
        fs::write(&second, b"second").unwrap();

        let up = uploader(&checkout, true);
        let request = UploadRequest {
            base_name: "Pair".into(),
            litematic_files: vec![first, second],
            ..UploadRequest::default()
        };
        let outcome = up.upload(&request, &remote(), |_| {}).unwrap();

        let dst = checkout.join("files/litematic/Pair.litematic");
        assert_eq!(outcome.files, vec![dst.clone()]);
        assert_eq!(fs::read(dst).unwrap(), b"second");
    }

    #[test]
    fn unchanged_files_are_not_committed() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("shot.png");
        fs::write(&img, b"png").unwrap();

        let up = uploader(&dir.path().join(".repo"), false);
        let request = UploadRequest {
            base_name: "Same".into(),
            image: Some(img),
            ..UploadRequest::default()
        };
        let outcome = up.upload(&request, &remote(), |_| {}).unwrap();

        assert!(!outcome.committed);
        assert!(!up
            .gateway()
            .vcs()
            .calls()
            .iter()
            .any(|c| c.starts_with("commit") || c.starts_with("push")));
    }

    #[test]
    fn missing_source_file_aborts_before_publishing() {
        let dir = tempfile::tempdir().unwrap();
        let up = uploader(&dir.path().join(".repo"), true);
        let request = UploadRequest {
            base_name: "Ghost".into(),
            litematic_files: vec![dir.path().join("does-not-exist.litematic")],
            ..UploadRequest::default()
        };
        let err = up.upload(&request, &remote(), |_| {}).unwrap_err();

        match &err {
            Error::Io(_) => assert!(err.to_string().contains("does-not-exist.litematic")),
            other => panic!("expected an io error, got {:?}", other),
        }
        assert!(!up
            .gateway()
            .vcs()
            .calls()
            .iter()
            .any(|c| c.starts_with("add")));
    }
}
