use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ids::RoleId;

/// One entry of the static team registry: a team name mapped to the platform
/// role that represents membership and the crest shown on offer documents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    pub role_id: RoleId,
    pub image_url: String,
}

/// On-disk record shape. Field names match the registry file as deployed
/// (`teams.json`), so existing files load unchanged.
#[derive(Debug, Deserialize)]
struct TeamRecord {
    #[serde(rename = "roleID")]
    role_id: String,
    #[serde(rename = "imageURL")]
    image_url: String,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("could not read registry file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse registry file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: serde_json::Error },
    #[error("registry entry `{team}` is invalid: {reason}")]
    InvalidEntry { team: String, reason: String },
}

/// Static lookup table loaded once at startup. Teams are held sorted
/// lexicographically by name, so every first-match scan over the registry is
/// deterministic even when a member somehow holds multiple team roles.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TeamRegistry {
    teams: Vec<Team>,
}

impl TeamRegistry {
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| RegistryError::ReadFile { path: path.to_path_buf(), source })?;

        let records: BTreeMap<String, TeamRecord> = serde_json::from_str(&raw)
            .map_err(|source| RegistryError::ParseFile { path: path.to_path_buf(), source })?;

        let mut teams = Vec::with_capacity(records.len());
        for (name, record) in records {
            if name.trim().is_empty() {
                return Err(RegistryError::InvalidEntry {
                    team: name,
                    reason: "team name must not be blank".to_owned(),
                });
            }
            if record.role_id.trim().is_empty() {
                return Err(RegistryError::InvalidEntry {
                    team: name,
                    reason: "roleID must not be blank".to_owned(),
                });
            }
            teams.push(Team {
                name,
                role_id: RoleId(record.role_id),
                image_url: record.image_url,
            });
        }

        Ok(Self::from_teams(teams))
    }

    pub fn from_teams(mut teams: Vec<Team>) -> Self {
        teams.sort_by(|a, b| a.name.cmp(&b.name));
        Self { teams }
    }

    pub fn get(&self, name: &str) -> Option<&Team> {
        self.teams.iter().find(|team| team.name == name)
    }

    /// The first team (lexicographic by name) whose membership role appears in
    /// `held`. This is the lookup behind both the offer precondition and the
    /// release operation.
    pub fn team_for_roles(&self, held: &[RoleId]) -> Option<&Team> {
        self.teams.iter().find(|team| held.contains(&team.role_id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Team> {
        self.teams.iter()
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    /// Role ids shared by more than one team. Uniqueness is assumed rather
    /// than enforced at load; the operator CLI surfaces violations.
    pub fn duplicate_role_ids(&self) -> Vec<RoleId> {
        let mut duplicates = Vec::new();
        for (index, team) in self.teams.iter().enumerate() {
            let seen_earlier = self.teams[..index].iter().any(|other| other.role_id == team.role_id);
            if seen_earlier && !duplicates.contains(&team.role_id) {
                duplicates.push(team.role_id.clone());
            }
        }
        duplicates
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{Team, TeamRegistry};
    use crate::domain::ids::RoleId;

    fn team(name: &str, role_id: &str) -> Team {
        Team {
            name: name.to_string(),
            role_id: RoleId(role_id.to_string()),
            image_url: format!("https://cdn.example/{name}.png"),
        }
    }

    #[test]
    fn loads_registry_file_with_deployed_field_names() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{
                "Viperio": {{"roleID": "1001", "imageURL": "https://cdn.example/viperio.png"}},
                "Azuras": {{"roleID": "1002", "imageURL": "https://cdn.example/azuras.png"}}
            }}"#
        )
        .expect("write registry");

        let registry = TeamRegistry::load(file.path()).expect("registry should load");

        assert_eq!(registry.len(), 2);
        let azuras = registry.get("Azuras").expect("Azuras present");
        assert_eq!(azuras.role_id, RoleId("1002".to_string()));
        assert_eq!(azuras.image_url, "https://cdn.example/azuras.png");
    }

    #[test]
    fn load_rejects_blank_role_id() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"Viperio": {{"roleID": "  ", "imageURL": "x"}}}}"#)
            .expect("write registry");

        let error = TeamRegistry::load(file.path()).expect_err("blank roleID should fail");
        assert!(error.to_string().contains("roleID"));
    }

    #[test]
    fn load_fails_for_missing_file() {
        let error = TeamRegistry::load(std::path::Path::new("/nonexistent/teams.json"))
            .expect_err("missing file should fail");
        assert!(error.to_string().contains("could not read"));
    }

    #[test]
    fn team_lookup_is_lexicographic_regardless_of_insertion_order() {
        let registry = TeamRegistry::from_teams(vec![
            team("Zephyr", "z-role"),
            team("Azuras", "a-role"),
            team("Viperio", "v-role"),
        ]);

        let names: Vec<&str> = registry.iter().map(|team| team.name.as_str()).collect();
        assert_eq!(names, vec!["Azuras", "Viperio", "Zephyr"]);
    }

    #[test]
    fn team_for_roles_prefers_lexicographically_first_match() {
        let registry = TeamRegistry::from_teams(vec![
            team("Zephyr", "z-role"),
            team("Azuras", "a-role"),
        ]);
        let held = vec![RoleId("z-role".to_string()), RoleId("a-role".to_string())];

        let matched = registry.team_for_roles(&held).expect("one team should match");
        assert_eq!(matched.name, "Azuras");
    }

    #[test]
    fn team_for_roles_returns_none_without_membership() {
        let registry = TeamRegistry::from_teams(vec![team("Azuras", "a-role")]);
        assert!(registry.team_for_roles(&[RoleId("other".to_string())]).is_none());
    }

    #[test]
    fn duplicate_role_ids_reports_shared_roles_once() {
        let registry = TeamRegistry::from_teams(vec![
            team("Azuras", "shared"),
            team("Viperio", "shared"),
            team("Zephyr", "unique"),
        ]);

        assert_eq!(registry.duplicate_role_ids(), vec![RoleId("shared".to_string())]);
    }
}
