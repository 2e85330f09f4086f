//! Include/exclude filtering of module ids.

use regex::Regex;

use super::ConfigError;
use crate::address;

/// Compiled include/exclude lists.
///
/// Virtual code modules always pass so the server pass reaches the
/// transform regardless of user patterns.
#[derive(Debug, Clone)]
pub struct SourceFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl SourceFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, ConfigError> {
        Ok(Self {
            include: compile("include", include)?,
            exclude: compile("exclude", exclude)?,
        })
    }

    pub fn matches(&self, id: &str) -> bool {
        if address::is_virtual_module(id) {
            return true;
        }
        if self.exclude.iter().any(|re| re.is_match(id)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|re| re.is_match(id))
    }
}

fn compile(field: &'static str, patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| ConfigError::Pattern {
                field,
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> SourceFilter {
        SourceFilter::new(&[r"\.(t|j)sx?$".into()], &["node_modules".into()]).unwrap()
    }

    #[test]
    fn test_include_exclude() {
        let filter = filter();
        assert!(filter.matches("/src/app.tsx"));
        assert!(filter.matches("/src/util.js"));
        assert!(!filter.matches("/src/style.css"));
        assert!(!filter.matches("/node_modules/lib/index.js"));
    }

    #[test]
    fn test_virtual_module_always_passes() {
        let filter = SourceFilter::new(&["^never$".into()], &[".*".into()]).unwrap();
        assert!(filter.matches("/@toad/module/src/app.tsx"));
        assert!(!filter.matches("/@toad/style/src/app.css"));
    }

    #[test]
    fn test_bad_pattern_reports_field() {
        let err = SourceFilter::new(&[], &["(".into()]).unwrap_err();
        assert!(matches!(err, ConfigError::Pattern { field: "exclude", .. }));
    }
}
