use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Faction;
use crate::units::{ArtefactAbility, JumonAbility};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JumonTemplate {
    pub name: String,
    pub faction: Faction,
    pub attack: i32,
    pub defense: i32,
    pub movement: i32,
    #[serde(default)]
    pub ability: JumonAbility,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArtefactTemplate {
    pub name: String,
    #[serde(default)]
    pub ability: ArtefactAbility,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unsupported catalog version {0}")]
    UnsupportedVersion(u8),
    #[error("duplicate catalog entry `{0}`")]
    Duplicate(String),
    #[error("jumon `{0}` has negative stats")]
    InvalidStats(String),
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    version: u8,
    jumons: Vec<JumonTemplate>,
    #[serde(default)]
    artefacts: Vec<ArtefactTemplate>,
}

/// Read-only registry of stat blocks, shared by every match.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    jumons: BTreeMap<String, JumonTemplate>,
    artefacts: BTreeMap<String, ArtefactTemplate>,
}

impl Catalog {
    pub fn new(
        jumons: Vec<JumonTemplate>,
        artefacts: Vec<ArtefactTemplate>,
    ) -> Result<Self, CatalogError> {
        let mut catalog = Self::default();
        for template in jumons {
            if template.attack < 0 || template.defense < 0 || template.movement < 0 {
                return Err(CatalogError::InvalidStats(template.name));
            }
            let key = catalog_key(&template.name);
            if catalog.jumons.contains_key(&key) {
                return Err(CatalogError::Duplicate(template.name));
            }
            catalog.jumons.insert(key, template);
        }
        for template in artefacts {
            let key = catalog_key(&template.name);
            if catalog.artefacts.contains_key(&key) {
                return Err(CatalogError::Duplicate(template.name));
            }
            catalog.artefacts.insert(key, template);
        }
        Ok(catalog)
    }

    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(text)?;
        if file.version != 1 {
            return Err(CatalogError::UnsupportedVersion(file.version));
        }
        Self::new(file.jumons, file.artefacts)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn builtin() -> Self {
        let jumon = |name: &str, faction, attack, defense, movement, ability| JumonTemplate {
            name: name.to_string(),
            faction,
            attack,
            defense,
            movement,
            ability,
        };
        let artefact = |name: &str, ability| ArtefactTemplate {
            name: name.to_string(),
            ability,
        };
        let jumons = vec![
            jumon("Ember", Faction::Red, 4, 2, 2, JumonAbility::Plain),
            jumon("Cinderhorn", Faction::Red, 5, 3, 1, JumonAbility::Berserker),
            jumon("Tidecaller", Faction::Blue, 3, 3, 2, JumonAbility::Tempest),
            jumon("Shellback", Faction::Blue, 2, 5, 1, JumonAbility::Guardian),
            jumon("Thornling", Faction::Green, 3, 2, 3, JumonAbility::Leaper),
            jumon("Mossgiant", Faction::Green, 4, 4, 1, JumonAbility::Plain),
            jumon("Sunspark", Faction::Yellow, 3, 2, 3, JumonAbility::Herald),
            jumon("Galehound", Faction::Yellow, 4, 1, 4, JumonAbility::Charger),
            jumon("Umbral", Faction::Purple, 4, 3, 2, JumonAbility::Plain),
            jumon("Voidmaw", Faction::Purple, 5, 2, 2, JumonAbility::Berserker),
            jumon("Pebble", Faction::Green, 1, 1, 2, JumonAbility::Plain),
            jumon("Wisp", Faction::Blue, 2, 1, 4, JumonAbility::Leaper),
        ];
        let artefacts = vec![
            artefact("Sword", ArtefactAbility::Sword),
            artefact("Shield", ArtefactAbility::Shield),
            artefact("Banner", ArtefactAbility::Banner),
            artefact("Crown", ArtefactAbility::Crown),
            artefact("Trinket", ArtefactAbility::Plain),
        ];
        let mut catalog = Self::default();
        for template in jumons {
            catalog.jumons.insert(catalog_key(&template.name), template);
        }
        for template in artefacts {
            catalog
                .artefacts
                .insert(catalog_key(&template.name), template);
        }
        catalog
    }

    pub fn resolve_jumon(&self, name: &str) -> Option<&JumonTemplate> {
        self.jumons.get(&catalog_key(name))
    }

    pub fn resolve_artefact(&self, name: &str) -> Option<&ArtefactTemplate> {
        self.artefacts.get(&catalog_key(name))
    }

    pub fn jumon_names(&self) -> Vec<String> {
        self.jumons.values().map(|t| t.name.clone()).collect()
    }

    pub fn artefact_names(&self) -> Vec<String> {
        self.artefacts.values().map(|t| t.name.clone()).collect()
    }
}

fn catalog_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_is_case_and_whitespace_insensitive() {
        let catalog = Catalog::builtin();
        let template = catalog.resolve_jumon("  eMbEr ").expect("ember exists");
        assert_eq!(template.name, "Ember");
        assert_eq!(template.faction, Faction::Red);
        assert!(catalog.resolve_artefact("SWORD").is_some());
        assert!(catalog.resolve_jumon("nobody").is_none());
    }

    #[test]
    fn from_json_reads_abilities_and_defaults() {
        let raw = r#"{
  "version": 1,
  "jumons": [
    {"name": "A", "faction": "red", "attack": 3, "defense": 2, "movement": 2},
    {"name": "B", "faction": "blue", "attack": 1, "defense": 4, "movement": 1, "ability": "guardian"}
  ],
  "artefacts": [{"name": "Sword", "ability": "sword"}]
}"#;
        let catalog = Catalog::from_json(raw).expect("catalog parses");
        assert_eq!(
            catalog.resolve_jumon("a").map(|t| t.ability),
            Some(JumonAbility::Plain)
        );
        assert_eq!(
            catalog.resolve_jumon("b").map(|t| t.ability),
            Some(JumonAbility::Guardian)
        );
        assert_eq!(catalog.artefact_names(), vec!["Sword".to_string()]);
    }

    #[test]
    fn from_json_rejects_duplicates_and_bad_versions() {
        let dup = r#"{"version":1,"jumons":[
            {"name":"A","faction":"red","attack":1,"defense":1,"movement":1},
            {"name":"a","faction":"red","attack":1,"defense":1,"movement":1}]}"#;
        assert!(matches!(
            Catalog::from_json(dup),
            Err(CatalogError::Duplicate(_))
        ));

        let version = r#"{"version":2,"jumons":[]}"#;
        assert!(matches!(
            Catalog::from_json(version),
            Err(CatalogError::UnsupportedVersion(2))
        ));

        let negative = r#"{"version":1,"jumons":[
            {"name":"A","faction":"red","attack":-1,"defense":1,"movement":1}]}"#;
        assert!(matches!(
            Catalog::from_json(negative),
            Err(CatalogError::InvalidStats(_))
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        let path = std::env::temp_dir()
            .join(format!("jumon-catalog-missing-{}", std::process::id()))
            .join("catalog.json");
        assert!(matches!(
            Catalog::load(&path),
            Err(CatalogError::Io { .. })
        ));
    }
}
