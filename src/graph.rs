//! Class-level reference graphs and their JSON persistence.
//!
//! A graph file is a JSON array of [`Jar`]s. The closure analysis loads one or
//! more of them, merges classes by name and regroups them by namespace.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::Path;

use crate::namespace::{self, Namespace};

/// One class and the types it references, duplicates included.
///
/// Identity is the class name alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassRecord {
    pub name: String,
    pub references: Vec<String>,
}

impl PartialEq for ClassRecord {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ClassRecord {}

impl Hash for ClassRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// A named group of classes: an archive when scanned, a namespace after
/// [`split_by_namespace`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jar {
    pub name: String,
    pub classes: Vec<ClassRecord>,
}

impl Jar {
    pub fn contains(&self, class_name: &str) -> bool {
        self.classes.iter().any(|c| c.name == class_name)
    }
}

pub fn load_jars(path: &Path) -> Result<Vec<Jar>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read graph file: {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse graph file: {}", path.display()))
}

pub fn save_jars(path: &Path, jars: &[Jar]) -> Result<()> {
    let text = serde_json::to_string_pretty(jars)?;
    std::fs::write(path, text)
        .with_context(|| format!("failed to write graph file: {}", path.display()))
}

/// Flattens the classes of every jar, keeping the first position of each
/// name and the reference list of its last occurrence.
pub fn merge_classes(jars: &[Jar]) -> Vec<ClassRecord> {
    let mut merged: Vec<ClassRecord> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for class in jars.iter().flat_map(|j| &j.classes) {
        match positions.get(&class.name) {
            Some(&i) => merged[i].references = class.references.clone(),
            None => {
                positions.insert(class.name.clone(), merged.len());
                merged.push(class.clone());
            }
        }
    }
    merged
}

/// Regroups classes by the namespace their own name falls in. Classes outside
/// every namespace are dropped; groups follow namespace declaration order.
pub fn split_by_namespace(classes: &[ClassRecord]) -> Vec<Jar> {
    let mut groups: HashMap<Namespace, Vec<ClassRecord>> = HashMap::new();
    for class in classes {
        if let Some(ns) = namespace::classify(&class.name) {
            groups.entry(ns).or_default().push(class.clone());
        }
    }
    Namespace::ALL
        .iter()
        .filter_map(|ns| {
            groups.remove(ns).map(|classes| Jar {
                name: ns.name().to_string(),
                classes,
            })
        })
        .collect()
}
