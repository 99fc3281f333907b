use anyhow::{Context, Result, anyhow};
use git2::{
    AutotagOption, BranchType, Commit, ConfigLevel, Cred, ErrorCode, FetchOptions, FileFavor,
    Index, IndexConflict, MergeOptions, PushOptions, RemoteCallbacks, Repository, Signature,
    build::CheckoutBuilder,
};
use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{BranchMode, BranchResolution, Identity, MergeFavor, PushOutcome, Remote, Vcs};

/// [`Vcs`] implementation backed by libgit2.
///
/// The remote is kept in memory and used as an anonymous remote, so the
/// credential-bearing URL is never written to `.git/config`.
pub struct Git2Backend {
    repo: Repository,
    remote: Option<Remote>,
    identity: Option<Identity>,
}

impl Git2Backend {
    /// Open the working copy containing `path`, searching parent directories.
    ///
    /// # Errors
    /// Returns an error if `path` is not inside a git repository.
    pub fn discover(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path)
            .with_context(|| format!("not a git repository: {}", path.display()))?;
        Ok(Self {
            repo,
            remote: None,
            identity: None,
        })
    }

    /// Root of the working tree; every staged path is relative to it.
    pub fn workdir(&self) -> Result<PathBuf> {
        self.repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| anyhow!("bare repositories have no working tree"))
    }

    fn remote(&self) -> Result<&Remote> {
        self.remote
            .as_ref()
            .ok_or_else(|| anyhow!("no remote configured"))
    }

    fn signature(&self) -> Result<Signature<'static>> {
        match &self.identity {
            Some(id) => Ok(Signature::now(&id.name, &id.email)?),
            None => self
                .repo
                .signature()
                .context("no commit identity configured (user.name / user.email)"),
        }
    }

    /// The commit HEAD points at, or `None` on an unborn branch.
    fn head_commit(&self) -> Result<Option<Commit<'_>>> {
        match self.repo.head() {
            Ok(head) => Ok(Some(head.peel_to_commit()?)),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn head_name(&self) -> Option<String> {
        self.repo
            .find_reference("HEAD")
            .ok()
            .and_then(|h| h.symbolic_target().map(str::to_string))
    }

    /// `git checkout -B <branch>`: point the branch at HEAD and switch to it,
    /// leaving the index and working tree as they are.
    fn reset_branch(&self, branch: &str) -> Result<BranchResolution> {
        let refname = format!("refs/heads/{}", branch);
        if self.head_name().as_deref() == Some(refname.as_str()) {
            return Ok(BranchResolution::Reset);
        }
        if let Some(head) = self.head_commit()? {
            self.repo
                .branch(branch, &head, true)
                .with_context(|| format!("git branch -f {}", branch))?;
        }
        self.repo.set_head(&refname)?;
        Ok(BranchResolution::Reset)
    }

    /// Resolution order:
    /// 1. Local branch (`refs/heads/<branch>`) → check it out
    /// 2. Remote branch (`refs/remotes/origin/<branch>`) → create a local tracking branch
    /// 3. Neither → create the branch at HEAD (or on an unborn HEAD)
    fn resolve_branch(&self, branch: &str) -> Result<BranchResolution> {
        let refname = format!("refs/heads/{}", branch);

        if let Ok(local) = self.repo.find_branch(branch, BranchType::Local) {
            let tip = local.get().peel_to_commit()?;
            if self.head_name().as_deref() != Some(refname.as_str()) {
                self.repo
                    .checkout_tree(tip.as_object(), Some(CheckoutBuilder::new().safe()))
                    .with_context(|| format!("git checkout {}", branch))?;
                self.repo.set_head(&refname)?;
            }
            return Ok(BranchResolution::Existing);
        }

        if let Ok(remote_ref) = self
            .repo
            .find_reference(&format!("refs/remotes/origin/{}", branch))
        {
            let tip = remote_ref.peel_to_commit()?;
            let mut local = self.repo.branch(branch, &tip, false)?;
            if let Err(e) = local.set_upstream(Some(&format!("origin/{}", branch))) {
                debug!("upstream for {} not recorded: {}", branch, e.message());
            }
            self.repo
                .checkout_tree(tip.as_object(), Some(CheckoutBuilder::new().safe()))
                .with_context(|| format!("git checkout -b {} origin/{}", branch, branch))?;
            self.repo.set_head(&refname)?;
            return Ok(BranchResolution::TrackingRemote);
        }

        if let Some(head) = self.head_commit()? {
            self.repo
                .branch(branch, &head, false)
                .with_context(|| format!("git checkout -b {}", branch))?;
        }
        self.repo.set_head(&refname)?;
        Ok(BranchResolution::Fresh)
    }

    /// Settle one index conflict by taking the `favor` side whole. A side
    /// that deleted the path removes it from the index and the working tree.
    fn take_side(&self, index: &mut Index, conflict: IndexConflict, favor: MergeFavor) -> Result<()> {
        let raw = [&conflict.ancestor, &conflict.our, &conflict.their]
            .into_iter()
            .flatten()
            .map(|e| e.path.clone())
            .next()
            .ok_or_else(|| anyhow!("index conflict without any entry"))?;
        let favored = match favor {
            MergeFavor::Theirs => conflict.their,
            MergeFavor::Ours => conflict.our,
        };
        let rel = PathBuf::from(String::from_utf8(raw).context("non UTF-8 path in index")?);
        let full = self.workdir()?.join(&rel);

        index.conflict_remove(&rel)?;
        match favored {
            Some(mut entry) => {
                debug!("{}: keeping the {} version", rel.display(), favor);
                if let Some(parent) = full.parent() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("failed to create {}", parent.display()))?;
                }
                fs::write(&full, self.repo.find_blob(entry.id)?.content())
                    .with_context(|| format!("failed to write {}", full.display()))?;
                entry.flags &= !STAGE_MASK;
                index.add(&entry)?;
            }
            None => {
                warn!(
                    "{} was deleted on the {} side; dropping it from the merge",
                    rel.display(),
                    favor
                );
                match fs::remove_file(&full) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => {
                        return Err(e).with_context(|| format!("failed to remove {}", full.display()));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Stage bits of an index entry's flags.
const STAGE_MASK: u16 = 0x3000;

/// Credentials callback answering with the token once; a second request
/// means the server refused it.
fn callbacks(remote: &Remote) -> RemoteCallbacks<'_> {
    let mut cb = RemoteCallbacks::new();
    let mut asked = false;
    cb.credentials(move |_url, _username_from_url, _allowed| {
        if asked {
            return Err(git2::Error::from_str("access token was rejected"));
        }
        asked = true;
        Cred::userpass_plaintext(remote.user(), remote.token().expose())
    });
    cb
}

/// Turn a libgit2 error into one that cannot leak the token.
fn scrubbed(remote: &Remote, err: git2::Error) -> anyhow::Error {
    anyhow!(remote.token().scrub(err.message()))
}

impl Vcs for Git2Backend {
    fn configure_identity(&mut self, identity: &Identity) -> Result<()> {
        info!("> git config user.name {}", identity.name);
        info!("> git config user.email {}", identity.email);
        let mut cfg = self
            .repo
            .config()?
            .open_level(ConfigLevel::Local)
            .context("open local git config")?;
        cfg.set_str("user.name", &identity.name)?;
        cfg.set_str("user.email", &identity.email)?;
        self.identity = Some(identity.clone());
        Ok(())
    }

    fn set_remote(&mut self, remote: Remote) -> Result<()> {
        debug!("remote: {}", remote);
        self.remote = Some(remote);
        Ok(())
    }

    fn fetch(&mut self, branch: &str) -> Result<()> {
        let remote = self.remote()?;
        info!("> git fetch {} {}", remote, branch);
        let mut anon = self
            .repo
            .remote_anonymous(&remote.authenticated_url())
            .map_err(|e| scrubbed(remote, e))?;

        let mut fo = FetchOptions::new();
        fo.remote_callbacks(callbacks(remote));
        fo.download_tags(AutotagOption::None);

        let spec = format!("+refs/heads/{0}:refs/remotes/origin/{0}", branch);
        anon.fetch(&[spec.as_str()], Some(&mut fo), None)
            .map_err(|e| scrubbed(remote, e))
            .with_context(|| format!("git fetch {}", branch))?;
        Ok(())
    }

    fn checkout_branch(&mut self, branch: &str, mode: BranchMode) -> Result<BranchResolution> {
        let resolution = match mode {
            BranchMode::Reset => self.reset_branch(branch)?,
            BranchMode::Resolve => self.resolve_branch(branch)?,
        };
        info!("> git checkout {} ({})", branch, resolution);
        Ok(resolution)
    }

    fn stage(&mut self, path: &Path) -> Result<()> {
        info!("> git add {}", path.display());
        let mut index = self.repo.index()?;
        index
            .add_path(path)
            .with_context(|| format!("git add {}", path.display()))?;
        index.write()?;
        Ok(())
    }

    fn commit(&mut self, message: &str) -> Result<String> {
        info!("> git commit -m {:?}", message);
        let mut index = self.repo.index()?;
        let tree = self.repo.find_tree(index.write_tree()?)?;
        let sig = self.signature()?;
        let parents: Vec<Commit<'_>> = self.head_commit()?.into_iter().collect();
        let parent_refs: Vec<&Commit<'_>> = parents.iter().collect();
        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .context("git commit")?;
        Ok(oid.to_string())
    }

    fn push(&mut self, branch: &str) -> Result<PushOutcome> {
        let remote = self.remote()?;
        info!("> git push {} HEAD:refs/heads/{}", remote, branch);
        let mut anon = self
            .repo
            .remote_anonymous(&remote.authenticated_url())
            .map_err(|e| scrubbed(remote, e))?;

        let rejected: RefCell<Option<String>> = RefCell::new(None);
        let mut cb = callbacks(remote);
        cb.push_update_reference(|refname, status| {
            if let Some(msg) = status {
                *rejected.borrow_mut() = Some(format!("{}: {}", refname, msg));
            }
            Ok(())
        });
        let mut po = PushOptions::new();
        po.remote_callbacks(cb);

        let spec = format!("refs/heads/{0}:refs/heads/{0}", branch);
        let pushed = anon.push(&[spec.as_str()], Some(&mut po));
        drop(po);

        match pushed {
            Ok(()) => {}
            Err(e) if e.code() == ErrorCode::NotFastForward => {
                return Ok(PushOutcome::Rejected(remote.token().scrub(e.message())));
            }
            Err(e) => {
                return Err(scrubbed(remote, e)).with_context(|| format!("git push {}", branch));
            }
        }

        Ok(match rejected.into_inner() {
            Some(reason) => PushOutcome::Rejected(remote.token().scrub(&reason)),
            None => PushOutcome::Accepted,
        })
    }

    fn pull_merge(&mut self, branch: &str, favor: MergeFavor) -> Result<()> {
        self.fetch(branch)?;
        info!("> git pull --no-rebase -X {} {}", favor, branch);

        let tracking = format!("refs/remotes/origin/{}", branch);
        let remote_ref = self
            .repo
            .find_reference(&tracking)
            .with_context(|| format!("remote branch {} not found after fetch", branch))?;
        let theirs = self.repo.reference_to_annotated_commit(&remote_ref)?;
        let (analysis, _) = self.repo.merge_analysis(&[&theirs])?;

        if analysis.is_up_to_date() {
            debug!("already up to date with origin/{}", branch);
            return Ok(());
        }

        let local = format!("refs/heads/{}", branch);
        if analysis.is_fast_forward() || analysis.is_unborn() {
            match self.repo.find_reference(&local) {
                Ok(mut r) => {
                    r.set_target(theirs.id(), "pull: fast-forward")?;
                }
                Err(_) => {
                    self.repo
                        .reference(&local, theirs.id(), true, "pull: fast-forward")?;
                }
            }
            self.repo.set_head(&local)?;
            self.repo
                .checkout_head(Some(CheckoutBuilder::new().force()))?;
            return Ok(());
        }

        warn!(
            "origin/{} moved ahead; merging with conflicts resolved toward {}",
            branch, favor
        );
        let head = self
            .head_commit()?
            .ok_or_else(|| anyhow!("HEAD has no commit to merge into"))?;
        let their_commit = self.repo.find_commit(theirs.id())?;

        let mut mo = MergeOptions::new();
        mo.file_favor(match favor {
            MergeFavor::Theirs => FileFavor::Theirs,
            MergeFavor::Ours => FileFavor::Ours,
        });
        self.repo
            .merge(&[&theirs], Some(&mut mo), Some(CheckoutBuilder::new().safe()))
            .with_context(|| format!("git merge origin/{}", branch))?;

        // file favor only settles content conflicts; modify/delete and
        // add/add pairs are left in the index
        let mut index = self.repo.index()?;
        if index.has_conflicts() {
            let conflicts = index.conflicts()?.collect::<Result<Vec<_>, _>>()?;
            for conflict in conflicts {
                self.take_side(&mut index, conflict, favor)?;
            }
            index.write()?;
        }

        let tree = self.repo.find_tree(index.write_tree()?)?;
        let sig = self.signature()?;
        self.repo.commit(
            Some("HEAD"),
            &sig,
            &sig,
            &format!("Merge remote-tracking branch 'origin/{}'", branch),
            &tree,
            &[&head, &their_commit],
        )?;
        self.repo.cleanup_state()?;
        Ok(())
    }
}
