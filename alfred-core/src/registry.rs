//! Alias registries: the permitted voice and avatar aliases, used for membership checks.

use std::collections::BTreeSet;

use crate::config::ConfigProvider;
use crate::error::{Capability, RenderError, RenderResult};

/// Read-only set of aliases for one capability.
#[derive(Debug, Clone)]
pub struct AliasRegistry {
    capability: Capability,
    aliases: BTreeSet<String>,
}

impl AliasRegistry {
    pub fn new<I, S>(capability: Capability, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            capability,
            aliases: aliases.into_iter().map(Into::into).collect(),
        }
    }

    pub fn empty(capability: Capability) -> Self {
        Self::new(capability, std::iter::empty::<String>())
    }

    pub fn voices_from(config: &dyn ConfigProvider) -> Self {
        Self::new(Capability::Voice, config.list_voice_aliases())
    }

    pub fn avatars_from(config: &dyn ConfigProvider) -> Self {
        Self::new(Capability::Avatar, config.list_avatar_aliases())
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.aliases.contains(alias)
    }

    /// Fails with `UnknownAlias` naming this registry when `alias` is absent.
    pub fn require(&self, alias: &str) -> RenderResult<()> {
        if self.contains(alias) {
            Ok(())
        } else {
            Err(RenderError::UnknownAlias {
                alias: alias.to_string(),
                registry: self.capability.as_str().to_string(),
            })
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.aliases.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
