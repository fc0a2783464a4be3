//! Immutable description of offices and documents (component A).

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BureauError;

/// Static description of one office: its service capacity and break cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficeSpec {
    /// Unique office name.
    pub name: String,
    /// Number of parallel workers ("counters"). Must be at least 1.
    pub counters: usize,
    /// Minimum per-task service delay.
    pub min_service: Duration,
    /// Maximum per-task service delay. Must be >= `min_service`.
    pub max_service: Duration,
    /// Duration of a break once taken. May be zero.
    pub break_duration: Duration,
}

impl OfficeSpec {
    /// Build a new office spec, rejecting obviously inconsistent bounds.
    pub fn new(
        name: impl Into<String>,
        counters: usize,
        min_service: Duration,
        max_service: Duration,
        break_duration: Duration,
    ) -> Result<Self, BureauError> {
        let name = name.into();
        if counters == 0 {
            return Err(BureauError::ConfigError(format!(
                "office '{name}' must have at least one counter"
            )));
        }
        if max_service < min_service {
            return Err(BureauError::ConfigError(format!(
                "office '{name}' has max_service < min_service"
            )));
        }
        Ok(Self {
            name,
            counters,
            min_service,
            max_service,
            break_duration,
        })
    }
}

/// Static description of one document: its issuing office and prerequisites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSpec {
    /// Unique document name.
    pub name: String,
    /// The office that issues this document.
    pub issuing_office: String,
    /// Prerequisite document names, in the order they should be resolved.
    pub dependencies: Vec<String>,
}

impl DocumentSpec {
    /// Build a new document spec with no further validation (cross-references
    /// and acyclicity are checked once, by [`Configuration::new`]).
    pub fn new(
        name: impl Into<String>,
        issuing_office: impl Into<String>,
        dependencies: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            issuing_office: issuing_office.into(),
            dependencies,
        }
    }
}

/// A customer's request: which documents to obtain, and how long to wait
/// before arriving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    /// Unique customer identifier.
    pub id: String,
    /// Documents requested, in the order a customer context fans them out.
    pub requested_documents: Vec<String>,
    /// Delay before the customer's workflow begins.
    pub arrival_delay: Duration,
}

impl CustomerProfile {
    /// Build a customer profile.
    pub fn new(
        id: impl Into<String>,
        requested_documents: Vec<String>,
        arrival_delay: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            requested_documents,
            arrival_delay,
        }
    }
}

/// Immutable, validated view of a running system's offices and documents.
///
/// Constructed once and shared read-only (via `Arc`) by every other
/// component. Lookups are O(1).
#[derive(Debug, Clone)]
pub struct Configuration {
    offices: HashMap<String, OfficeSpec>,
    documents: HashMap<String, DocumentSpec>,
}

impl Configuration {
    /// Validate and construct a configuration from two lists.
    ///
    /// Rejects duplicate names within either list, documents naming an
    /// office or dependency that does not exist, and cyclic dependency
    /// graphs (detected via a topological sort / Kahn's algorithm).
    pub fn new(
        offices: Vec<OfficeSpec>,
        documents: Vec<DocumentSpec>,
    ) -> Result<Self, BureauError> {
        let mut office_map = HashMap::with_capacity(offices.len());
        for office in offices {
            let name = office.name.clone();
            if office_map.insert(name.clone(), office).is_some() {
                return Err(BureauError::ConfigError(format!(
                    "duplicate office name '{name}'"
                )));
            }
        }

        let mut document_map = HashMap::with_capacity(documents.len());
        for document in documents {
            let name = document.name.clone();
            if document_map.insert(name.clone(), document).is_some() {
                return Err(BureauError::ConfigError(format!(
                    "duplicate document name '{name}'"
                )));
            }
        }

        for document in document_map.values() {
            if !office_map.contains_key(&document.issuing_office) {
                return Err(BureauError::ConfigError(format!(
                    "document '{}' names unknown issuing office '{}'",
                    document.name, document.issuing_office
                )));
            }
            for dep in &document.dependencies {
                if !document_map.contains_key(dep) {
                    return Err(BureauError::ConfigError(format!(
                        "document '{}' names unknown dependency '{}'",
                        document.name, dep
                    )));
                }
            }
        }

        Self::check_acyclic(&document_map)?;

        Ok(Self {
            offices: office_map,
            documents: document_map,
        })
    }

    /// Kahn's algorithm over the `(doc -> deps)` graph; any document left
    /// unvisited once the frontier is exhausted sits on a cycle.
    fn check_acyclic(documents: &HashMap<String, DocumentSpec>) -> Result<(), BureauError> {
        // A document can "start" once all its dependencies have been
        // resolved; track remaining unresolved deps per document and peel
        // off leaves, same as a standard topological sort.
        let mut remaining_deps: HashMap<&str, HashSet<&str>> = documents
            .values()
            .map(|d| (d.name.as_str(), d.dependencies.iter().map(String::as_str).collect()))
            .collect();

        let mut queue: VecDeque<&str> = remaining_deps
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(name, _)| *name)
            .collect();

        let mut visited: HashSet<&str> = HashSet::new();
        while let Some(name) = queue.pop_front() {
            if !visited.insert(name) {
                continue;
            }
            for (other, deps) in remaining_deps.iter_mut() {
                if deps.remove(name) && deps.is_empty() && !visited.contains(other) {
                    queue.push_back(other);
                }
            }
        }

        if visited.len() != documents.len() {
            let cyclic: Vec<&str> = documents
                .keys()
                .map(String::as_str)
                .filter(|name| !visited.contains(name))
                .collect();
            return Err(BureauError::ConfigError(format!(
                "dependency cycle detected among documents: {}",
                cyclic.join(", ")
            )));
        }

        Ok(())
    }

    /// Look up an office spec by name.
    #[must_use]
    pub fn office(&self, name: &str) -> Option<&OfficeSpec> {
        self.offices.get(name)
    }

    /// Look up a document spec by name.
    #[must_use]
    pub fn document(&self, name: &str) -> Option<&DocumentSpec> {
        self.documents.get(name)
    }

    /// All office specs, in unspecified order.
    pub fn offices(&self) -> impl Iterator<Item = &OfficeSpec> {
        self.offices.values()
    }
}
