use std::fs;
use std::io;
use std::path::Path;

use tempfile::TempDir;

/// Ephemeral working directory for one run.
///
/// Created before the checkout step and removed when dropped, so a run's
/// sandbox disappears whether it succeeded, failed, or panicked mid-step.
#[derive(Debug)]
pub struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    pub fn create() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("relais-run-").tempdir()?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Recursively copy `source` into `dest`, returning the number of files
/// copied. VCS metadata directories are left behind.
pub fn copy_tree(source: &Path, dest: &Path) -> io::Result<usize> {
    let mut copied = 0;

    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let name = entry.file_name();

        if file_type.is_dir() {
            if name == ".git" || name == ".hg" {
                continue;
            }
            let target = dest.join(&name);
            fs::create_dir_all(&target)?;
            copied += copy_tree(&entry.path(), &target)?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), dest.join(&name))?;
            copied += 1;
        }
        // symlinks are skipped: the snapshot must not reach outside itself
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn project_fixture() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("requirements.txt"), "requests==2.32.3\n").unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/bot.py"), "print('hi')\n").unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();
        dir
    }

    #[test]
    fn copy_tree_snapshots_files_but_not_vcs_metadata() {
        let project = project_fixture();
        let sandbox = Sandbox::create().unwrap();

        let copied = copy_tree(project.path(), sandbox.path()).unwrap();

        assert_eq!(copied, 2);
        assert!(sandbox.path().join("requirements.txt").is_file());
        assert!(sandbox.path().join("src/bot.py").is_file());
        assert!(!sandbox.path().join(".git").exists());
    }

    #[test]
    fn sandbox_is_removed_on_drop() {
        let path: PathBuf;
        {
            let sandbox = Sandbox::create().unwrap();
            path = sandbox.path().to_path_buf();
            assert!(path.is_dir());
        }
        assert!(!path.exists());
    }
}
