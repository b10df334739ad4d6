//! Filter criteria and membership specifications consumed by the compiler.

use crate::term::Term;
use crate::{CompileError, CompileResult};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Criteria describing one logical entity.
///
/// An empty filter places no constraint on the entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityFilter {
    /// Allowed `sbol:type` values.
    pub types: BTreeSet<String>,
    /// Allowed `sbol:role` values (always OR semantics).
    pub roles: BTreeSet<String>,
    /// Require every type instead of any one of them.
    pub all_types: bool,
    /// Extra `predicate -> value` constraints, in declaration order.
    pub custom_properties: Vec<(String, Term)>,
    /// Criteria for an entity contained by this one.
    pub sub: Option<Box<EntityFilter>>,
    /// Explicit identities this entity may take when it is a sub-entity.
    pub definitions: BTreeSet<String>,
    /// Required `rdf:type`; also selects the containment idiom for `sub`.
    pub rdf_type: Option<String>,
}

impl EntityFilter {
    /// Creates an empty, fully permissive filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an allowed type.
    #[must_use]
    pub fn with_type(mut self, iri: impl Into<String>) -> Self {
        let _ = self.types.insert(iri.into());
        self
    }

    /// Adds an allowed role.
    #[must_use]
    pub fn with_role(mut self, iri: impl Into<String>) -> Self {
        let _ = self.roles.insert(iri.into());
        self
    }

    /// Switches types to AND semantics.
    #[must_use]
    pub fn all_types(mut self) -> Self {
        self.all_types = true;
        self
    }

    /// Adds a custom property; `<...>` values are IRIs, others literals.
    #[must_use]
    pub fn with_property(mut self, predicate: impl Into<String>, value: &str) -> Self {
        self.custom_properties
            .push((predicate.into(), Term::parse(value)));
        self
    }

    /// Sets the sub-entity criteria.
    #[must_use]
    pub fn with_sub(mut self, sub: EntityFilter) -> Self {
        self.sub = Some(Box::new(sub));
        self
    }

    /// Adds an allowed definition identity.
    #[must_use]
    pub fn with_definition(mut self, iri: impl Into<String>) -> Self {
        let _ = self.definitions.insert(iri.into());
        self
    }

    /// Sets the required `rdf:type`.
    #[must_use]
    pub fn with_rdf_type(mut self, iri: impl Into<String>) -> Self {
        self.rdf_type = Some(iri.into());
        self
    }

    /// Returns `true` when no criterion of this filter or its sub-entity is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
            && self.roles.is_empty()
            && self.custom_properties.is_empty()
            && self.definitions.is_empty()
            && self.rdf_type.is_none()
            && self.sub.as_ref().is_none_or(|sub| sub.is_empty())
    }
}

/// Traversal length of the `prov:wasDerivedFrom` chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PathCardinality {
    /// `*`
    ZeroOrMore,
    /// `+`
    OneOrMore,
    /// Exactly one hop; the empty token.
    #[default]
    One,
    /// Exactly `n` hops, written as a sequence path.
    Exactly(u8),
}

impl PathCardinality {
    /// Renders the predicate path for `predicate` with this cardinality.
    ///
    /// # Errors
    ///
    /// Returns `CompileError::InvalidCardinality` for `Exactly(0)`.
    pub fn path(self, predicate: &str) -> CompileResult<String> {
        match self {
            PathCardinality::ZeroOrMore => Ok(format!("{predicate}*")),
            PathCardinality::OneOrMore => Ok(format!("{predicate}+")),
            PathCardinality::One | PathCardinality::Exactly(1) => Ok(predicate.to_string()),
            PathCardinality::Exactly(0) => Err(CompileError::InvalidCardinality(
                "an exact path length must be at least 1".to_string(),
            )),
            PathCardinality::Exactly(n) => Ok(vec![predicate; usize::from(n)].join("/")),
        }
    }
}

impl FromStr for PathCardinality {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "*" => Ok(PathCardinality::ZeroOrMore),
            "+" => Ok(PathCardinality::OneOrMore),
            "" => Ok(PathCardinality::One),
            other => other
                .parse::<u8>()
                .map(PathCardinality::Exactly)
                .map_err(|_| CompileError::InvalidCardinality(other.to_string())),
        }
    }
}

impl fmt::Display for PathCardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathCardinality::ZeroOrMore => f.write_str("*"),
            PathCardinality::OneOrMore => f.write_str("+"),
            PathCardinality::One => Ok(()),
            PathCardinality::Exactly(n) => write!(f, "{n}"),
        }
    }
}

/// How a collection reaches its entities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MemberIdiom {
    /// `?collection sbol:member ?entity`
    #[default]
    Plain,
    /// The collection holds experiments; entities are reached through the
    /// experiment's provenance chain.
    ExperimentProvenance,
}

/// Which collections to search and how membership is expressed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Membership {
    /// Collections to search; empty leaves the collection unconstrained.
    pub collections: BTreeSet<String>,
    /// Explicit allow-list for the entity.
    pub members: BTreeSet<String>,
    /// Experiments to follow when the idiom is `ExperimentProvenance`.
    pub experiments: BTreeSet<String>,
    /// Length of the derived-from chain for `ExperimentProvenance`.
    pub member_cardinality: PathCardinality,
    /// Membership idiom.
    pub member_idiom: MemberIdiom,
}

impl Membership {
    /// Membership in any collection.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Membership in the given collections.
    #[must_use]
    pub fn of<I, S>(collections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            collections: collections.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Restricts the entity to an explicit allow-list.
    #[must_use]
    pub fn with_members<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.members.extend(members.into_iter().map(Into::into));
        self
    }

    /// Switches to the experiment provenance idiom.
    #[must_use]
    pub fn through_experiments<I, S>(mut self, experiments: I, cardinality: PathCardinality) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.experiments
            .extend(experiments.into_iter().map(Into::into));
        self.member_cardinality = cardinality;
        self.member_idiom = MemberIdiom::ExperimentProvenance;
        self
    }
}

/// Auxiliary values projected for the main entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Projection {
    /// `dcterms:title`, optional.
    Name,
    /// `dcterms:description`, optional.
    Description,
    /// Sequence elements, mandatory.
    Sequence,
    /// Sequence annotation definition and range, mandatory.
    Feature,
}

impl Projection {
    /// Variables this projection adds to the SELECT list.
    #[must_use]
    pub fn variables(self) -> &'static [&'static str] {
        match self {
            Projection::Name => &["name"],
            Projection::Description => &["description"],
            Projection::Sequence => &["sequence"],
            Projection::Feature => &["feature_definition", "feature_start", "feature_end"],
        }
    }
}

impl FromStr for Projection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "name" => Ok(Projection::Name),
            "description" => Ok(Projection::Description),
            "sequence" => Ok(Projection::Sequence),
            "feature" => Ok(Projection::Feature),
            _ => Err(format!("Unknown projection: {s}")),
        }
    }
}
