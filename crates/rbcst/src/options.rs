use serde::Deserialize;

pub const DEFAULT_MAX_DEPTH: usize = 256;

pub const TRACE_PARSE_VAR: &str = "RBCST_TRACE_PARSE";
pub const TRACE_LEX_VAR: &str = "RBCST_TRACE_LEX";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParseOptions {
    /// Ceiling on parser recursion; exceeding it aborts the parse.
    pub max_depth: usize,
    pub trace: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            trace: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct OptionsFile {
    #[serde(default)]
    parse: Option<ParseOptions>,
}

impl ParseOptions {
    /// Reads the `[parse]` table of a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        let file: OptionsFile = toml::from_str(text)?;
        Ok(file.parse.unwrap_or_default())
    }

    /// Turns tracing on when `RBCST_TRACE_PARSE=1` is set.
    pub fn with_env_overrides(mut self) -> Self {
        self.trace |= trace_enabled(TRACE_PARSE_VAR);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

pub fn trace_enabled(var: &str) -> bool {
    std::env::var(var).is_ok_and(|v| v == "1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_parse_table_overrides_defaults() {
        let options = ParseOptions::from_toml_str("[parse]\nmax_depth = 64\n").expect("options");
        assert_eq!(options.max_depth, 64);
    }

    #[test]
    fn defaults_do_not_read_the_environment() {
        let options = ParseOptions::default();
        assert_eq!(options.max_depth, DEFAULT_MAX_DEPTH);
        assert!(!options.trace);
        let traced = ParseOptions::from_toml_str("[parse]\ntrace = true\n").expect("options");
        assert!(traced.trace);
        assert!(traced.with_env_overrides().trace);
    }

    #[test]
    fn missing_table_keeps_defaults() {
        let options = ParseOptions::from_toml_str("").expect("options");
        assert_eq!(options.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ParseOptions::from_toml_str("[parse]\nmax_dept = 3\n");
        assert!(err.is_err(), "expected error for misspelled key");
    }
}
