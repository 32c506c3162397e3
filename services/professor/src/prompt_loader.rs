//! Loads per-persona system-prompt overrides from a directory of `.md` files
//! at startup. A file named `<persona-key>.md` replaces that persona's
//! built-in prompt; personas without a file keep their default. The resulting
//! mapping is read-only for the life of the process.

use anasagashi_core::persona::Persona;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub fn load_prompt_overrides(dir_path: &Path) -> Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();

    // A missing override directory just means built-in prompts everywhere.
    if !dir_path.is_dir() {
        tracing::debug!("No prompt override directory at {}", dir_path.display());
        return Ok(prompts);
    }

    for entry in fs::read_dir(dir_path)
        .with_context(|| format!("Failed to read prompts directory: {}", dir_path.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem for prompt file")?
                .to_string();

            if Persona::from_key(&prompt_key).is_none() {
                tracing::warn!("Ignoring prompt file for unknown persona '{prompt_key}'");
                continue;
            }

            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read prompt file: {}", path.display()))?;

            prompts.insert(prompt_key, content);
        }
    }

    Ok(prompts)
}

/// Override if present, built-in default otherwise.
pub fn resolve_prompt(overrides: &HashMap<String, String>, persona: Persona) -> String {
    overrides
        .get(persona.key())
        .cloned()
        .unwrap_or_else(|| persona.profile().system_prompt.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn loads_only_known_persona_md_files() -> Result<()> {
        let dir = tempdir()?;
        let dir_path = dir.path();

        let mut file1 = File::create(dir_path.join("nitpicker.md"))?;
        writeln!(file1, "You pick every nit.")?;

        let mut file2 = File::create(dir_path.join("theorist.md"))?;
        writeln!(file2, "Definitions first.")?;

        // Unknown persona and wrong extension should both be ignored.
        let mut stray = File::create(dir_path.join("dean.md"))?;
        writeln!(stray, "not a persona")?;
        let mut ignored = File::create(dir_path.join("statistician.txt"))?;
        writeln!(ignored, "wrong extension")?;
        std::fs::create_dir(dir_path.join("subdir"))?;

        let prompts = load_prompt_overrides(dir_path)?;

        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts.get("nitpicker").unwrap(), "You pick every nit.\n");
        assert!(prompts.get("dean").is_none());
        assert!(prompts.get("statistician").is_none());

        Ok(())
    }

    #[test]
    fn missing_directory_means_no_overrides() {
        let prompts =
            load_prompt_overrides(Path::new("nonexistent_dir_for_testing_prompts")).unwrap();
        assert!(prompts.is_empty());
    }

    #[test]
    fn resolve_falls_back_to_builtin() {
        let mut overrides = HashMap::new();
        overrides.insert("nitpicker".to_string(), "Custom nit prompt.".to_string());

        assert_eq!(
            resolve_prompt(&overrides, Persona::Nitpicker),
            "Custom nit prompt."
        );
        assert_eq!(
            resolve_prompt(&overrides, Persona::Theorist),
            Persona::Theorist.profile().system_prompt
        );
    }
}
