use crate::{
    comparer::{KeyComparer, StringComparer},
    error::Error,
    kind::ObjectKind,
};
use sqlmeta_config::{Config, DEFAULT_COLLATION};
use std::collections::BTreeSet;

///
/// Settings
///
/// Immutable runtime view of a session's configuration. Built once and
/// shared by reference (`Rc<Settings>`) with every collection in a graph.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Settings {
    collation: String,
    comparer: KeyComparer,
    design_mode: bool,
    accept_duplicates: BTreeSet<ObjectKind>,
    check_server_name: bool,
}

impl Settings {
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let accept_duplicates = config
            .collections
            .accept_duplicate_names
            .iter()
            .map(|name| {
                ObjectKind::from_type_name(name)
                    .ok_or_else(|| Error::config(format!("unknown object kind '{name}' in accept_duplicate_names")))
            })
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(Self {
            comparer: KeyComparer::new(StringComparer::from_collation(&config.session.collation)),
            collation: config.session.collation.clone(),
            design_mode: config.session.design_mode,
            accept_duplicates,
            check_server_name: config.dependency.check_server_name,
        })
    }

    /// Settings for a session with the given collation and otherwise default options.
    #[must_use]
    pub fn with_collation(collation: &str) -> Self {
        Self {
            collation: collation.to_string(),
            comparer: KeyComparer::new(StringComparer::from_collation(collation)),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn design_mode(mut self, design_mode: bool) -> Self {
        self.design_mode = design_mode;
        self
    }

    /// Let members of `kind` share an identity.
    #[must_use]
    pub fn accept_duplicate_names(mut self, kind: ObjectKind) -> Self {
        self.accept_duplicates.insert(kind);
        self
    }

    #[must_use]
    pub fn collation(&self) -> &str {
        &self.collation
    }

    #[must_use]
    pub const fn comparer(&self) -> KeyComparer {
        self.comparer
    }

    #[must_use]
    pub const fn is_design_mode(&self) -> bool {
        self.design_mode
    }

    #[must_use]
    pub fn accepts_duplicate_names(&self, kind: ObjectKind) -> bool {
        self.accept_duplicates.contains(&kind)
    }

    #[must_use]
    pub const fn check_server_name(&self) -> bool {
        self.check_server_name
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            collation: DEFAULT_COLLATION.to_string(),
            comparer: KeyComparer::default(),
            design_mode: false,
            accept_duplicates: BTreeSet::new(),
            check_server_name: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{comparer::CaseSensitivity, error::ErrorClass};

    #[test]
    fn from_config_resolves_kind_names_and_collation() {
        let config = Config::from_toml_str(
            r#"
            [session]
            collation = "Latin1_General_CS_AS"

            [collections]
            accept_duplicate_names = ["Column"]
            "#,
        )
        .expect("config should parse");

        let settings = Settings::from_config(&config).expect("settings should build");

        assert_eq!(settings.comparer().strings().case(), CaseSensitivity::Sensitive);
        assert!(settings.accepts_duplicate_names(ObjectKind::Column));
        assert!(!settings.accepts_duplicate_names(ObjectKind::Table));
        assert!(settings.check_server_name());
    }

    #[test]
    fn unknown_kind_name_is_a_config_error() {
        let config = Config::from_toml_str("[collections]\naccept_duplicate_names = [\"Widget\"]\n")
            .expect("config should parse");

        let err = Settings::from_config(&config).expect_err("unknown kind should fail");

        assert_eq!(err.class, ErrorClass::Config);
        assert!(err.message.contains("Widget"), "message: {}", err.message);
    }

    #[test]
    fn default_settings_are_case_insensitive() {
        let settings = Settings::default();

        assert_eq!(settings.collation(), DEFAULT_COLLATION);
        assert_eq!(settings.comparer().strings().case(), CaseSensitivity::Insensitive);
        assert!(!settings.is_design_mode());
    }
}
