//! Input data model: people to provision and where each department lives.
//!
//! Both are read once at the start of a run and never mutated afterwards.
use std::collections::HashMap;

use serde::Deserialize;

/// One roster row. Cells may be blank or padded; the provisioning loop does
/// the trimming and validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PersonRecord {
    #[serde(rename = "FirstName", default)]
    pub first_name: String,
    #[serde(rename = "LastName", default)]
    pub last_name: String,
    #[serde(rename = "DepartmentID", default)]
    pub department_id: String,
}

impl PersonRecord {
    pub fn new(first_name: &str, last_name: &str, department_id: &str) -> Self {
        Self {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            department_id: department_id.to_string(),
        }
    }
}

/// Department code to OU path. Codes compare trimmed and case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepartmentMap {
    placements: HashMap<String, String>,
}

fn department_key(id: &str) -> String {
    id.trim().to_uppercase()
}

impl DepartmentMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a placement unless the code is blank or already mapped.
    /// Returns whether the pair was stored.
    pub fn insert(&mut self, department_id: &str, ou_path: &str) -> bool {
        let key = department_key(department_id);
        if key.is_empty() || self.placements.contains_key(&key) {
            return false;
        }
        self.placements.insert(key, ou_path.trim().to_string());
        true
    }

    /// Placement path for a department. Blank paths count as absent.
    pub fn placement(&self, department_id: &str) -> Option<&str> {
        self.placements
            .get(&department_key(department_id))
            .map(String::as_str)
            .filter(|p| !p.is_empty())
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for DepartmentMap {
    fn from_iter<T: IntoIterator<Item = (&'a str, &'a str)>>(iter: T) -> Self {
        let mut map = DepartmentMap::new();
        for (id, path) in iter {
            map.insert(id, path);
        }
        map
    }
}
