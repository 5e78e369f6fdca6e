//! Session-wide compile-time configuration (SPEC_FULL.md §3.2). A
//! `SessionConfig` is immutable for the lifetime of the `Session` that
//! owns it — nothing in the pipeline mutates it mid-compile, so any
//! element size computed early (e.g. a pointer type's width) stays
//! valid for the whole compilation.

use serde::Deserialize;

use crate::diagnostics::CoreError;

/// Target pointer width in bytes. Only 32- and 64-bit targets are
/// supported by this front-end; anything else is rejected at config
/// parse time rather than silently misbehaving later during type
/// sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerWidth {
    Bits32,
    Bits64,
}

impl PointerWidth {
    pub fn bytes(self) -> u32 {
        match self {
            PointerWidth::Bits32 => 4,
            PointerWidth::Bits64 => 8,
        }
    }
}

impl Default for PointerWidth {
    fn default() -> PointerWidth {
        PointerWidth::Bits64
    }
}

/// The raw, `serde`-deserializable shape of a `[session]` TOML table.
/// Kept separate from `SessionConfig` so every field can be optional in
/// the file while `SessionConfig` itself always has concrete values.
#[derive(Debug, Default, Deserialize)]
struct RawSessionConfig {
    pointer_width: Option<u32>,
    search_paths: Option<Vec<std::path::PathBuf>>,
    default_integer_type: Option<String>,
    log_level: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSessionDocument {
    session: Option<RawSessionConfig>,
}

/// The set of compile-time knobs fixed for one `Session`: pointer
/// width, extra module search paths, the type integer literals infer
/// to (`u32` by default — see the open question in SPEC_FULL.md §9),
/// and the minimum `log` level the core will emit at.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub pointer_width: PointerWidth,
    pub search_paths: Vec<std::path::PathBuf>,
    pub default_integer_type: String,
    pub log_level: Option<log::LevelFilter>,
}

impl Default for SessionConfig {
    fn default() -> SessionConfig {
        SessionConfig {
            pointer_width: PointerWidth::default(),
            search_paths: Vec::new(),
            default_integer_type: "u32".to_string(),
            log_level: None,
        }
    }
}

impl SessionConfig {
    /// Parses a `[session]` TOML table into a `SessionConfig`, layering
    /// it over `SessionConfig::default()` for any field the document
    /// omits. This is a pure function: no filesystem access, so the
    /// core stays testable without touching disk (SPEC_FULL.md §3.2).
    pub fn from_toml_str(document: &str) -> Result<SessionConfig, CoreError> {
        let raw: RawSessionDocument = toml::from_str(document)
            .map_err(|e| CoreError::InvalidConfig(e.to_string()))?;

        let mut config = SessionConfig::default();
        let Some(raw) = raw.session else { return Ok(config) };

        if let Some(bits) = raw.pointer_width {
            config.pointer_width = match bits {
                32 => PointerWidth::Bits32,
                64 => PointerWidth::Bits64,
                other => {
                    return Err(CoreError::InvalidConfig(format!(
                        "unsupported pointer_width: {other} (expected 32 or 64)"
                    )))
                }
            };
        }
        if let Some(paths) = raw.search_paths {
            config.search_paths = paths;
        }
        if let Some(ty) = raw.default_integer_type {
            config.default_integer_type = ty;
        }
        if let Some(level) = raw.log_level {
            config.log_level = Some(
                level
                    .parse()
                    .map_err(|_| CoreError::InvalidConfig(format!("unrecognized log_level: {level}")))?,
            );
        }

        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_to_u32_and_64_bit_pointers() {
        let config = SessionConfig::default();
        assert_eq!(config.default_integer_type, "u32");
        assert_eq!(config.pointer_width.bytes(), 8);
    }

    #[test]
    fn overrides_default_integer_type_from_toml() {
        let config = SessionConfig::from_toml_str(
            "[session]\ndefault_integer_type = \"i32\"\n",
        )
        .unwrap();
        assert_eq!(config.default_integer_type, "i32");
        // untouched fields keep their defaults
        assert_eq!(config.pointer_width.bytes(), 8);
    }

    #[test]
    fn rejects_unsupported_pointer_width() {
        let err = SessionConfig::from_toml_str("[session]\npointer_width = 16\n").unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));
    }

    #[test]
    fn empty_document_is_all_defaults() {
        let config = SessionConfig::from_toml_str("").unwrap();
        assert_eq!(config.default_integer_type, "u32");
    }
}
