use super::ShellError;
use std::path::{Path, PathBuf};

const ENTRY_NAME: &str = "island.desktop";

pub fn autostart_dir() -> Result<PathBuf, ShellError> {
    dirs::config_dir()
        .map(|dir| dir.join("autostart"))
        .ok_or(ShellError::NoConfigDir)
}

pub fn is_installed() -> bool {
    autostart_dir()
        .map(|dir| dir.join(ENTRY_NAME).exists())
        .unwrap_or(false)
}

pub fn desktop_entry(executable: &Path) -> String {
    format!(
        "[Desktop Entry]\n\
         Type=Application\n\
         Name=Island\n\
         Comment=Now-playing pill overlay\n\
         Exec=\"{}\" serve\n\
         Terminal=false\n\
         NoDisplay=true\n\
         X-GNOME-Autostart-enabled=true\n",
        executable.display()
    )
}

pub fn install() -> Result<PathBuf, ShellError> {
    let executable = std::env::current_exe().map_err(ShellError::ExecutableError)?;
    install_in(&autostart_dir()?, &executable)
}

pub fn install_in(dir: &Path, executable: &Path) -> Result<PathBuf, ShellError> {
    let path = dir.join(ENTRY_NAME);
    std::fs::create_dir_all(dir)
        .and_then(|_| std::fs::write(&path, desktop_entry(executable)))
        .map_err(|source| ShellError::WriteError {
            path: path.clone(),
            source,
        })?;

    tracing::info!("Installed autostart entry at {:?}", path);
    Ok(path)
}

/// Returns whether an entry was there to remove.
pub fn remove() -> Result<bool, ShellError> {
    remove_in(&autostart_dir()?)
}

pub fn remove_in(dir: &Path) -> Result<bool, ShellError> {
    let path = dir.join(ENTRY_NAME);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(ShellError::WriteError { path, source }),
    }
}

/// Printed when the entry cannot be written for the user.
pub fn manual_instructions() -> String {
    let executable = std::env::current_exe()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|_| "island".to_string());

    format!(
        "Add `{} serve` to your session's startup applications,\n\
         or save the following as ~/.config/autostart/{}:\n\n{}",
        executable,
        ENTRY_NAME,
        desktop_entry(Path::new(&executable))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_writes_desktop_entry() {
        let dir = tempfile::tempdir().unwrap();
        let autostart = dir.path().join("autostart");

        let path = install_in(&autostart, Path::new("/usr/bin/island")).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("[Desktop Entry]"));
        assert!(contents.contains("Exec=\"/usr/bin/island\" serve"));
    }

    #[test]
    fn remove_reports_whether_entry_existed() {
        let dir = tempfile::tempdir().unwrap();
        install_in(dir.path(), Path::new("/usr/bin/island")).unwrap();

        assert!(remove_in(dir.path()).unwrap());
        assert!(!remove_in(dir.path()).unwrap());
    }

    #[test]
    fn unwritable_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("autostart");
        std::fs::write(&blocker, "not a directory").unwrap();

        let result = install_in(&blocker, Path::new("/usr/bin/island"));

        assert!(matches!(result, Err(ShellError::WriteError { .. })));
    }
}
