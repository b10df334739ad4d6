//! Top-level assembly of complete SELECT queries.

use crate::filter::{EntityFilter, MemberIdiom, Membership, Projection};
use crate::pattern::{GraphPattern, entity_pattern, experiment_pattern, indent, values_pattern};
use crate::term::var;
use crate::vocab::{SBOL_MEMBER, prefix_block};
use crate::{CompileError, CompileResult};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, warn};

/// Variable labels threaded through one compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labels {
    /// The projected entity.
    pub entity: String,
    /// The collection holding the entity.
    pub collection: String,
    /// The intermediate collection used at depth 2.
    pub sub_collection: String,
    /// The experiment used by the provenance idiom.
    pub experiment: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            entity: "design".to_string(),
            collection: "collection".to_string(),
            sub_collection: "sub_collection".to_string(),
            experiment: "experiment".to_string(),
        }
    }
}

/// What a label stands for within one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelRole {
    /// The projected entity.
    Entity,
    /// The collection.
    Collection,
    /// The depth-2 intermediate collection.
    SubCollection,
    /// The experiment.
    Experiment,
    /// An auxiliary projection such as `name`.
    Projection,
}

impl LabelRole {
    // Roles whose patterns introduce helper variables named `<label>_*`.
    fn derives_helpers(self) -> bool {
        matches!(self, LabelRole::Entity | LabelRole::Experiment)
    }
}

impl fmt::Display for LabelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LabelRole::Entity => "entity",
            LabelRole::Collection => "collection",
            LabelRole::SubCollection => "sub-collection",
            LabelRole::Experiment => "experiment",
            LabelRole::Projection => "projection",
        };
        f.write_str(name)
    }
}

/// Records which role each label plays and rejects inconsistent reuse.
///
/// Labels are never renamed: a label bound to two roles, or one that falls
/// into the `<label>_*` helper namespace of an entity or experiment, is an
/// error.
#[derive(Debug, Clone, Default)]
pub struct LabelRegistry {
    bound: BTreeMap<String, LabelRole>,
}

impl LabelRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `label` to `role`.
    ///
    /// # Errors
    ///
    /// - `CompileError::InvalidLabel` if the label is not a SPARQL variable name
    /// - `CompileError::LabelConflict` if the label is already bound to another
    ///   role or collides with another label's helper variables
    pub fn bind(&mut self, label: &str, role: LabelRole) -> CompileResult<()> {
        if label.is_empty() || !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(CompileError::InvalidLabel(label.to_string()));
        }
        if let Some(existing) = self.bound.get(label) {
            if *existing == role {
                return Ok(());
            }
            return Err(CompileError::LabelConflict {
                label: label.to_string(),
                first: existing.to_string(),
                second: role.to_string(),
            });
        }
        for (other, other_role) in &self.bound {
            if other_role.derives_helpers() && label.starts_with(&format!("{other}_")) {
                return Err(CompileError::LabelConflict {
                    label: label.to_string(),
                    first: format!("helper of {other_role} `{other}`"),
                    second: role.to_string(),
                });
            }
            if role.derives_helpers() && other.starts_with(&format!("{label}_")) {
                return Err(CompileError::LabelConflict {
                    label: other.clone(),
                    first: other_role.to_string(),
                    second: format!("helper of {role} `{label}`"),
                });
            }
        }
        let _ = self.bound.insert(label.to_string(), role);
        Ok(())
    }

    /// Role bound to `label`, if any.
    #[must_use]
    pub fn role(&self, label: &str) -> Option<LabelRole> {
        self.bound.get(label).copied()
    }
}

/// Everything needed to compile one design query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesignQuery {
    /// Criteria for the projected entity.
    pub filter: EntityFilter,
    /// Collections and membership idiom.
    pub membership: Membership,
    /// Auxiliary projections for the entity.
    pub projections: BTreeSet<Projection>,
    /// Variable labels.
    pub labels: Labels,
    /// 1: direct membership. 2: direct or through one sub-collection.
    pub entity_depth: u8,
}

impl Default for DesignQuery {
    fn default() -> Self {
        Self {
            filter: EntityFilter::default(),
            membership: Membership::default(),
            projections: BTreeSet::new(),
            labels: Labels::default(),
            entity_depth: 1,
        }
    }
}

impl DesignQuery {
    /// A depth-1 query over any collection.
    #[must_use]
    pub fn new(filter: EntityFilter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Sets the membership specification.
    #[must_use]
    pub fn with_membership(mut self, membership: Membership) -> Self {
        self.membership = membership;
        self
    }

    /// Adds an auxiliary projection.
    #[must_use]
    pub fn with_projection(mut self, projection: Projection) -> Self {
        let _ = self.projections.insert(projection);
        self
    }

    /// Replaces the variable labels.
    #[must_use]
    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    /// Sets the entity depth.
    #[must_use]
    pub fn with_depth(mut self, depth: u8) -> Self {
        self.entity_depth = depth;
        self
    }

    /// Compiles this query; see [`compile`].
    ///
    /// # Errors
    ///
    /// See [`compile`].
    pub fn compile(&self) -> CompileResult<CompiledQuery> {
        compile(self)
    }
}

/// Final query text and its projected variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledQuery {
    /// Full SPARQL text.
    pub text: String,
    /// Projected variables, in SELECT order.
    pub variables: Vec<String>,
}

impl CompiledQuery {
    /// The sentinel produced for unsupported entity depths.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns `true` for the unsupported-depth sentinel.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl fmt::Display for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

// Link from `from` (rendered node) to the entity under the requested idiom.
fn membership_pattern(
    from: &str,
    membership: &Membership,
    labels: &Labels,
) -> CompileResult<GraphPattern> {
    match membership.member_idiom {
        MemberIdiom::Plain => Ok(GraphPattern::triple(
            from,
            SBOL_MEMBER,
            &var(&labels.entity),
        )),
        MemberIdiom::ExperimentProvenance => {
            let (node, provenance) = experiment_pattern(
                &labels.experiment,
                &membership.experiments,
                membership.member_cardinality,
                &labels.entity,
            )?;
            Ok(GraphPattern::triple(from, SBOL_MEMBER, &node).then(provenance))
        }
    }
}

fn collection_values(labels: &Labels, membership: &Membership) -> GraphPattern {
    if membership.collections.is_empty() {
        GraphPattern::empty()
    } else {
        values_pattern(&labels.collection, &membership.collections)
    }
}

fn member_values(labels: &Labels, membership: &Membership) -> GraphPattern {
    if membership.members.is_empty() {
        GraphPattern::empty()
    } else {
        values_pattern(&labels.entity, &membership.members)
    }
}

/// Direct membership: the collection holds the entity.
///
/// # Errors
///
/// Propagates errors from the experiment provenance pattern.
pub fn collection_pattern(labels: &Labels, membership: &Membership) -> CompileResult<GraphPattern> {
    Ok(collection_values(labels, membership)
        .then(member_values(labels, membership))
        .then(membership_pattern(&var(&labels.collection), membership, labels)?))
}

/// Membership through one intermediate sub-collection.
///
/// # Errors
///
/// Propagates errors from the experiment provenance pattern.
pub fn nested_collection_pattern(
    labels: &Labels,
    membership: &Membership,
) -> CompileResult<GraphPattern> {
    Ok(collection_values(labels, membership)
        .then(member_values(labels, membership))
        .then(GraphPattern::triple(
            &var(&labels.collection),
            SBOL_MEMBER,
            &var(&labels.sub_collection),
        ))
        .then(membership_pattern(
            &var(&labels.sub_collection),
            membership,
            labels,
        )?))
}

fn projected_variables(query: &DesignQuery) -> Vec<String> {
    let mut variables = Vec::new();
    if query.membership.collections.len() != 1 {
        variables.push(query.labels.collection.clone());
    }
    for projection in &query.projections {
        variables.extend(projection.variables().iter().map(ToString::to_string));
    }
    variables.push(query.labels.entity.clone());
    let mut seen = BTreeSet::new();
    variables.retain(|v| seen.insert(v.clone()));
    variables
}

fn bind_labels(query: &DesignQuery) -> CompileResult<LabelRegistry> {
    let labels = &query.labels;
    let mut registry = LabelRegistry::new();
    registry.bind(&labels.entity, LabelRole::Entity)?;
    registry.bind(&labels.collection, LabelRole::Collection)?;
    if query.entity_depth == 2 {
        registry.bind(&labels.sub_collection, LabelRole::SubCollection)?;
    }
    if query.membership.member_idiom == MemberIdiom::ExperimentProvenance {
        registry.bind(&labels.experiment, LabelRole::Experiment)?;
    }
    for projection in &query.projections {
        for variable in projection.variables() {
            registry.bind(variable, LabelRole::Projection)?;
        }
    }
    Ok(registry)
}

/// Compiles a design query into SPARQL text.
///
/// Depth 1 emits one collection pattern plus one entity pattern. Depth 2
/// emits a `UNION` of direct membership and membership through a
/// sub-collection. Any other depth yields [`CompiledQuery::empty`].
///
/// Under-specified filters never fail; they widen to permissive patterns.
///
/// # Errors
///
/// - `CompileError::LabelConflict` / `CompileError::InvalidLabel` for
///   inconsistent labels
/// - `CompileError::UnknownRdfType` when a sub-entity is requested under an
///   `rdf:type` with no containment idiom
/// - `CompileError::InvalidCardinality` for a zero-length exact path
pub fn compile(query: &DesignQuery) -> CompileResult<CompiledQuery> {
    if !matches!(query.entity_depth, 1 | 2) {
        warn!("entity depth {} is not supported", query.entity_depth);
        return Ok(CompiledQuery::empty());
    }
    let _ = bind_labels(query)?;

    let labels = &query.labels;
    let entity = entity_pattern(&labels.entity, &query.filter, &query.projections)?;
    let direct = collection_pattern(labels, &query.membership)?.then(entity.clone());
    let body = if query.entity_depth == 1 {
        direct
    } else {
        direct.union(nested_collection_pattern(labels, &query.membership)?.then(entity))
    };

    let variables = projected_variables(query);
    let select = variables
        .iter()
        .map(|v| var(v))
        .collect::<Vec<_>>()
        .join(" ");
    let text = format!(
        "{}SELECT DISTINCT {select} WHERE {{\n{}}}\n",
        prefix_block(),
        indent(&body.text)
    );
    debug!("{}", text);
    Ok(CompiledQuery { text, variables })
}
