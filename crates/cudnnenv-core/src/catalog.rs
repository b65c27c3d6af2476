use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::archive::ArchiveType;
use crate::platform::Platform;

/// How the files inside a release archive map onto a version directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveLayout {
    /// The archive already carries `cuda/include` and `cuda/<libdir>`.
    Nested,
    /// Legacy archives ship every file under a single `root` directory; headers
    /// go to `cuda/include` and everything else to `cuda/<lib_dir>`.
    Flat { root: String, lib_dir: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRecipe {
    pub url: String,
    pub sha256: String,
    pub archive_type: ArchiveType,
    pub layout: ArchiveLayout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    platform: Platform,
    recipes: BTreeMap<String, InstallRecipe>,
    aliases: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogDocument {
    #[serde(default)]
    versions: BTreeMap<String, RecipeEntry>,
    #[serde(default)]
    aliases: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecipeEntry {
    url: String,
    sha256: String,
    archive: Option<String>,
    #[serde(default)]
    layout: LayoutKind,
    root: Option<String>,
}

#[derive(Debug, Default, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum LayoutKind {
    #[default]
    Nested,
    Flat,
}

impl Catalog {
    /// The release table compiled into the binary for `platform`.
    pub fn embedded(platform: Platform) -> Result<Self> {
        Self::from_toml_str(platform.embedded_catalog(), platform)
            .with_context(|| format!("embedded {} catalog is invalid", platform.as_str()))
    }

    pub fn from_path(path: &Path, platform: Platform) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog: {}", path.display()))?;
        Self::from_toml_str(&raw, platform)
            .with_context(|| format!("failed to load catalog: {}", path.display()))
    }

    pub fn from_toml_str(input: &str, platform: Platform) -> Result<Self> {
        let document: CatalogDocument =
            toml::from_str(input).context("failed to parse cudnnenv catalog")?;

        let mut recipes = BTreeMap::new();
        for (id, entry) in document.versions {
            let recipe = build_recipe(&entry, platform)
                .with_context(|| format!("invalid catalog entry '{id}'"))?;
            recipes.insert(id, recipe);
        }

        for (alias, target) in &document.aliases {
            if recipes.contains_key(alias) {
                return Err(anyhow!(
                    "alias '{alias}' shadows a catalog version with the same name"
                ));
            }
            if !recipes.contains_key(target) {
                return Err(anyhow!(
                    "alias '{alias}' points at unknown version '{target}'"
                ));
            }
        }

        Ok(Self {
            platform,
            recipes,
            aliases: document.aliases,
        })
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Resolves `id` directly or through one alias hop.
    pub fn lookup(&self, id: &str) -> Option<&InstallRecipe> {
        if let Some(recipe) = self.recipes.get(id) {
            return Some(recipe);
        }
        self.aliases
            .get(id)
            .and_then(|target| self.recipes.get(target))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lookup(id).is_some()
    }

    /// Every id the catalog answers to, aliases included, sorted.
    pub fn ids(&self) -> Vec<String> {
        self.recipes
            .keys()
            .chain(self.aliases.keys())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

fn build_recipe(entry: &RecipeEntry, platform: Platform) -> Result<InstallRecipe> {
    validate_sha256_hex(&entry.sha256)?;

    let archive_type = match &entry.archive {
        Some(archive) => ArchiveType::parse(archive).ok_or_else(|| {
            anyhow!("unsupported archive type '{archive}'; supported: tar.gz, tar.xz")
        })?,
        None => ArchiveType::infer_from_path(&entry.url).ok_or_else(|| {
            anyhow!(
                "could not infer archive type from URL '{}'; set archive explicitly",
                entry.url
            )
        })?,
    };

    let layout = match (entry.layout, &entry.root) {
        (LayoutKind::Nested, None) => ArchiveLayout::Nested,
        (LayoutKind::Nested, Some(root)) => {
            return Err(anyhow!(
                "root '{root}' is only meaningful with layout = \"flat\""
            ));
        }
        (LayoutKind::Flat, Some(root)) if !root.trim().is_empty() => ArchiveLayout::Flat {
            root: root.clone(),
            lib_dir: platform.lib_dir().to_string(),
        },
        (LayoutKind::Flat, _) => {
            return Err(anyhow!("layout = \"flat\" requires a non-empty root"));
        }
    };

    Ok(InstallRecipe {
        url: entry.url.clone(),
        sha256: entry.sha256.to_ascii_lowercase(),
        archive_type,
        layout,
    })
}

fn validate_sha256_hex(value: &str) -> Result<()> {
    if value.len() != 64 || !value.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return Err(anyhow!(
            "sha256 must be 64 hexadecimal characters, got '{value}'"
        ));
    }
    Ok(())
}
