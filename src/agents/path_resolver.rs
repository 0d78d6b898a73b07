// Vendor CLI binary lookup

use crate::models::AgentType;
use std::path::{Path, PathBuf};

pub struct CliPathResolver;

impl CliPathResolver {
    /// Locate the binary for an agent, well-known install dirs first, then PATH
    pub fn resolve(agent: AgentType) -> Option<PathBuf> {
        Self::resolve_program(agent.binary_name())
    }

    /// Locate an arbitrary program; absolute or relative paths are taken as-is
    pub fn resolve_program(program: &str) -> Option<PathBuf> {
        if program.contains(std::path::MAIN_SEPARATOR) {
            let path = PathBuf::from(program);
            return path.exists().then_some(path);
        }

        Self::find_in(program, &Self::install_dirs()).or_else(|| match which::which(program) {
            Ok(path) => {
                log::info!("[CliPathResolver] Found {} on PATH at: {:?}", program, path);
                Some(path)
            }
            Err(_) => None,
        })
    }

    /// Directories npm and Homebrew install global CLIs into
    fn install_dirs() -> Vec<PathBuf> {
        let mut dirs_to_check = Vec::new();
        if let Some(home) = dirs::home_dir() {
            dirs_to_check.push(home.join(".npm-global/bin"));
        }
        dirs_to_check.push(PathBuf::from("/usr/local/bin"));
        dirs_to_check.push(PathBuf::from("/opt/homebrew/bin"));
        dirs_to_check
    }

    fn find_in(name: &str, search_dirs: &[PathBuf]) -> Option<PathBuf> {
        search_dirs
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| is_file(candidate))
            .inspect(|path| log::info!("[CliPathResolver] Found {} at: {:?}", name, path))
    }
}

fn is_file(path: &Path) -> bool {
    path.metadata().map(|m| m.is_file()).unwrap_or(false)
}
