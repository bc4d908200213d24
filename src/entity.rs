//! CURIE entity identifiers and namespace-based type classification.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{KgbridgeError, Result};

fn curie_regex() -> &'static Regex {
    static CURIE: OnceLock<Regex> = OnceLock::new();
    CURIE.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9._-]*:\S+$").expect("Invalid CURIE regex")
    })
}

/// A validated `NAMESPACE:LOCALID` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    /// Parse and validate a CURIE. Surrounding whitespace is trimmed.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if !curie_regex().is_match(trimmed) {
            return Err(KgbridgeError::InvalidInput(format!(
                "'{}' is not a CURIE (expected NAMESPACE:LOCALID, e.g. HGNC:2908)",
                raw
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Namespace prefix, e.g. `HGNC` for `HGNC:2908`.
    pub fn namespace(&self) -> &str {
        namespace_of(&self.0)
    }

    pub fn entity_type(&self) -> EntityType {
        EntityType::classify(&self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for EntityId {
    type Error = KgbridgeError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// Namespace prefix of a raw id string. Ids without a colon have an empty namespace.
pub fn namespace_of(id: &str) -> &str {
    id.split_once(':').map(|(ns, _)| ns).unwrap_or("")
}

/// Coarse entity category used by renderers to colour nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Gene,
    Protein,
    Disease,
    Phenotype,
    Chemical,
    BiologicalProcess,
    Pathway,
    Anatomy,
    Organism,
    Variant,
    Concept,
    Other,
}

/// Namespace prefix (upper-cased) to entity type.
const NAMESPACE_TYPES: &[(&str, EntityType)] = &[
    ("HGNC", EntityType::Gene),
    ("NCBIGENE", EntityType::Gene),
    ("ENSEMBL", EntityType::Gene),
    ("UNIPROTKB", EntityType::Protein),
    ("PR", EntityType::Protein),
    ("MONDO", EntityType::Disease),
    ("DOID", EntityType::Disease),
    ("OMIM", EntityType::Disease),
    ("ORPHANET", EntityType::Disease),
    ("HP", EntityType::Phenotype),
    ("CHEBI", EntityType::Chemical),
    ("CHEMBL.COMPOUND", EntityType::Chemical),
    ("DRUGBANK", EntityType::Chemical),
    ("PUBCHEM.COMPOUND", EntityType::Chemical),
    ("UNII", EntityType::Chemical),
    ("GO", EntityType::BiologicalProcess),
    ("REACT", EntityType::Pathway),
    ("KEGG.PATHWAY", EntityType::Pathway),
    ("WIKIPATHWAYS", EntityType::Pathway),
    ("UBERON", EntityType::Anatomy),
    ("CL", EntityType::Anatomy),
    ("NCBITAXON", EntityType::Organism),
    ("CAID", EntityType::Variant),
    ("DBSNP", EntityType::Variant),
    ("CLINVAR", EntityType::Variant),
    ("UMLS", EntityType::Concept),
    ("MESH", EntityType::Concept),
    ("NCIT", EntityType::Concept),
];

impl EntityType {
    /// Classify a raw id by its namespace prefix (case-insensitive).
    pub fn classify(id: &str) -> Self {
        let namespace = namespace_of(id).to_ascii_uppercase();
        NAMESPACE_TYPES
            .iter()
            .find(|(ns, _)| *ns == namespace)
            .map(|(_, ty)| *ty)
            .unwrap_or(EntityType::Other)
    }
}

/// Validate seed ids, dropping duplicates while keeping first-seen order.
pub fn parse_seeds<S: AsRef<str>>(raw: &[S]) -> Result<Vec<EntityId>> {
    let mut seeds: Vec<EntityId> = Vec::with_capacity(raw.len());
    for value in raw {
        let id = EntityId::parse(value.as_ref())?;
        if !seeds.contains(&id) {
            seeds.push(id);
        }
    }
    if seeds.len() < 2 {
        return Err(KgbridgeError::InvalidInput(format!(
            "at least 2 distinct seed entities are required, got {}",
            seeds.len()
        )));
    }
    Ok(seeds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_curie() {
        let id = EntityId::parse(" HGNC:2908 ").unwrap();
        assert_eq!(id.as_str(), "HGNC:2908");
        assert_eq!(id.namespace(), "HGNC");
        assert_eq!(id.entity_type(), EntityType::Gene);
    }

    #[test]
    fn test_parse_rejects_missing_namespace() {
        assert!(EntityId::parse("2908").is_err());
        assert!(EntityId::parse(":2908").is_err());
        assert!(EntityId::parse("HGNC:").is_err());
        assert!(EntityId::parse("HGNC: 2908").is_err());
    }

    #[test]
    fn test_classify_case_insensitive() {
        assert_eq!(EntityType::classify("NCBIGene:1017"), EntityType::Gene);
        assert_eq!(EntityType::classify("UMLS:C0037083"), EntityType::Concept);
        assert_eq!(EntityType::classify("CHEMBL.COMPOUND:CHEMBL25"), EntityType::Chemical);
        assert_eq!(EntityType::classify("FOO:1"), EntityType::Other);
        assert_eq!(EntityType::classify("no-namespace"), EntityType::Other);
    }

    #[test]
    fn test_parse_seeds_dedupes() {
        let seeds = parse_seeds(&["HGNC:1", "HGNC:2", "HGNC:1"]).unwrap();
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[0].as_str(), "HGNC:1");
    }

    #[test]
    fn test_parse_seeds_requires_two() {
        let err = parse_seeds(&["HGNC:1", "HGNC:1"]).unwrap_err();
        assert!(matches!(err, KgbridgeError::InvalidInput(_)));
        assert!(parse_seeds::<&str>(&[]).is_err());
    }

    #[test]
    fn test_parse_seeds_rejects_malformed() {
        let err = parse_seeds(&["HGNC:1", "BRCA1"]).unwrap_err();
        assert!(err.to_string().contains("BRCA1"));
    }

    #[test]
    fn test_entity_type_serializes_snake_case() {
        let json = serde_json::to_string(&EntityType::BiologicalProcess).unwrap();
        assert_eq!(json, "\"biological_process\"");
    }
}
