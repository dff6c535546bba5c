use crate::domain::errors::{CollectError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One repository to collect from, identified as `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub owner: String,
    pub repo: String,
}

impl Target {
    /// Parses a single `owner/name` line.
    ///
    /// The line must contain exactly one `/` with a non-empty owner and name
    /// on either side, and no embedded whitespace.
    pub fn parse(line: &str) -> Result<Self> {
        let trimmed = line.trim();
        if trimmed.chars().any(char::is_whitespace) {
            return Err(CollectError::config(format!(
                "invalid repository '{trimmed}': whitespace is not allowed"
            )));
        }
        let mut parts = trimmed.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty() => {
                Ok(Self {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                })
            }
            _ => Err(CollectError::config(format!(
                "invalid repository '{trimmed}': expected owner/name"
            ))),
        }
    }

    /// Parses a repository list, one `owner/name` per line.
    ///
    /// Blank lines and lines starting with `#` are skipped. Order is
    /// preserved. Any malformed line fails the whole list.
    pub fn parse_list(source: &str) -> Result<Vec<Self>> {
        source
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(Self::parse)
            .collect()
    }

    /// Repository as `owner/name`
    pub fn full_name(&self) -> String {
        self.to_string()
    }

    /// Filesystem-safe directory name, `owner__name`
    pub fn dir_name(&self) -> String {
        format!("{}__{}", self.owner, self.repo)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_valid_line_in_order() -> anyhow::Result<()> {
        let source = "acme/api\n# dashboards are collected elsewhere\n\nacme/web\n  acme/cli  \n";
        let targets = Target::parse_list(source)?;
        let names: Vec<String> = targets.iter().map(Target::full_name).collect();
        assert_eq!(names, vec!["acme/api", "acme/web", "acme/cli"]);
        Ok(())
    }

    #[test]
    fn empty_and_comment_only_lists_parse_to_nothing() -> anyhow::Result<()> {
        assert!(Target::parse_list("")?.is_empty());
        assert!(Target::parse_list("# nothing yet\n\n   \n")?.is_empty());
        Ok(())
    }

    #[test]
    fn rejects_lines_without_a_single_slash() {
        assert!(Target::parse("acme").is_err());
        assert!(Target::parse("acme/api/extra").is_err());
        assert!(Target::parse("/api").is_err());
        assert!(Target::parse("acme/").is_err());
        assert!(Target::parse("acme /api").is_err());
    }

    #[test]
    fn malformed_line_fails_the_whole_list() {
        let result = Target::parse_list("acme/api\nbroken line\nacme/web\n");
        assert!(matches!(result, Err(CollectError::Config(_))));
    }

    #[test]
    fn dir_name_replaces_the_separator() -> anyhow::Result<()> {
        let target = Target::parse("acme/api")?;
        assert_eq!(target.dir_name(), "acme__api");
        Ok(())
    }
}
