use std::io;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest: {0}")]
    Io(#[from] io::Error),
    #[error("manifest line {line}: invalid package specifier `{specifier}`")]
    InvalidSpecifier { line: usize, specifier: String },
}

/// A validated dependency manifest: one package specifier per line, `#`
/// comments and blank lines ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub specifiers: Vec<String>,
}

// name, optional [extras], optional version constraints, optional ;marker
static SPECIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?",
        r"(?:\[[A-Za-z0-9._-]+(?:\s*,\s*[A-Za-z0-9._-]+)*\])?",
        r"\s*",
        r"(?:(?:===|==|!=|<=|>=|~=|<|>)\s*[A-Za-z0-9.*+!_-]+",
        r"(?:\s*,\s*(?:===|==|!=|<=|>=|~=|<|>)\s*[A-Za-z0-9.*+!_-]+)*)?",
        r"\s*(?:;.*)?$",
    ))
    .expect("specifier pattern is valid")
});

impl Manifest {
    /// Validate manifest contents without touching the installer.
    ///
    /// Validation happens before any install process is spawned, so a
    /// malformed line stops the run while the sandbox is still pristine.
    pub fn parse(contents: &str) -> Result<Self, ManifestError> {
        let mut specifiers = Vec::new();

        for (index, raw_line) in contents.lines().enumerate() {
            let line = match raw_line.split_once('#') {
                Some((before, _)) => before.trim(),
                None => raw_line.trim(),
            };
            if line.is_empty() {
                continue;
            }
            if !SPECIFIER.is_match(line) {
                return Err(ManifestError::InvalidSpecifier {
                    line: index + 1,
                    specifier: line.to_string(),
                });
            }
            specifiers.push(line.to_string());
        }

        Ok(Self { specifiers })
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specifiers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_pinned_specifiers() {
        let manifest = Manifest::parse(
            "requests==2.32.3\n\
             beautifulsoup4\n\
             playwright>=1.40,<2\n\
             transformers[torch]~=4.41\n",
        )
        .unwrap();

        assert_eq!(
            manifest.specifiers,
            vec![
                "requests==2.32.3",
                "beautifulsoup4",
                "playwright>=1.40,<2",
                "transformers[torch]~=4.41",
            ]
        );
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let manifest = Manifest::parse(
            "# scraping\nrequests==2.32.3\n\nfeedparser  # rss feeds\n",
        )
        .unwrap();
        assert_eq!(manifest.specifiers, vec!["requests==2.32.3", "feedparser"]);
    }

    #[test]
    fn reports_the_malformed_line() {
        let err = Manifest::parse("requests\n???not a package???\n").unwrap_err();
        match err {
            ManifestError::InvalidSpecifier { line, specifier } => {
                assert_eq!(line, 2);
                assert_eq!(specifier, "???not a package???");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_option_lines() {
        assert!(Manifest::parse("--extra-index-url https://example.invalid\n").is_err());
    }

    #[test]
    fn empty_manifest_is_valid() {
        assert!(Manifest::parse("# nothing yet\n").unwrap().is_empty());
    }
}
