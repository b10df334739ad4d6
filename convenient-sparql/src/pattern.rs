//! Graph-pattern fragments and the builders that produce them.
//!
//! Every builder takes the labels it binds as explicit arguments. Helper
//! variables are named after the label that owns them (`design_type`,
//! `design_sub_instance`), so two fragments only share a variable when the
//! caller passed the same label to both.

use crate::filter::{EntityFilter, PathCardinality, Projection};
use crate::term::{iri, var};
use crate::vocab::{
    COMPONENT_DEFINITION, DC_DESCRIPTION, DC_TITLE, MODULE_DEFINITION, PROV_DERIVED_FROM,
    RDF_TYPE, SBOL_COMPONENT, SBOL_DEFINITION, SBOL_ELEMENTS, SBOL_END, SBOL_FUNCTIONAL_COMPONENT,
    SBOL_LOCATION, SBOL_MODULE, SBOL_ROLE, SBOL_SEQUENCE, SBOL_SEQUENCE_ANNOTATION, SBOL_START,
    SBOL_TYPE, SD2_BUILT, SD2_EXPERIMENTAL_DATA, expand,
};
use crate::{CompileError, CompileResult};
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// A snippet of SPARQL WHERE-block text plus the variables it mentions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphPattern {
    /// Variable labels (without `?`) appearing in `text`.
    pub vars: BTreeSet<String>,
    /// Newline-terminated pattern lines.
    pub text: String,
}

impl GraphPattern {
    /// The empty, constraint-free fragment.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a fragment from already rendered text, collecting its variables.
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        let mut text = text.into();
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        Self {
            vars: scan_vars(&text),
            text,
        }
    }

    /// A single `subject predicate object .` line.
    #[must_use]
    pub fn triple(subject: &str, predicate: &str, object: &str) -> Self {
        Self::from_text(format!("{subject} {predicate} {object} ."))
    }

    /// Returns `true` for a fragment that constrains nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Appends `other` after this fragment.
    #[must_use]
    pub fn then(mut self, other: GraphPattern) -> Self {
        self.text.push_str(&other.text);
        self.vars.extend(other.vars);
        self
    }

    /// Wraps the fragment in `OPTIONAL { ... }`.
    #[must_use]
    pub fn optional(self) -> Self {
        if self.is_empty() {
            return self;
        }
        Self {
            text: format!("OPTIONAL {{\n{}}}\n", indent(&self.text)),
            vars: self.vars,
        }
    }

    /// Joins two fragments as `{ self } UNION { other }`.
    #[must_use]
    pub fn union(self, other: GraphPattern) -> Self {
        let mut vars = self.vars;
        vars.extend(other.vars);
        Self {
            text: format!(
                "{{\n{}}} UNION {{\n{}}}\n",
                indent(&self.text),
                indent(&other.text)
            ),
            vars,
        }
    }
}

impl fmt::Display for GraphPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Indents every non-empty line by two spaces.
#[must_use]
pub fn indent(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                "\n".to_string()
            } else {
                format!("  {line}\n")
            }
        })
        .collect()
}

// Collects `?name` tokens outside of literals and IRI references.
fn scan_vars(text: &str) -> BTreeSet<String> {
    let mut vars = BTreeSet::new();
    let mut chars = text.chars().peekable();
    let mut in_literal = false;
    let mut in_iri = false;
    while let Some(c) = chars.next() {
        if in_literal {
            match c {
                '\\' => {
                    let _ = chars.next();
                }
                '"' => in_literal = false,
                _ => {}
            }
            continue;
        }
        if in_iri {
            in_iri = c != '>';
            continue;
        }
        match c {
            '"' => in_literal = true,
            '<' => in_iri = true,
            '?' => {
                let mut name = String::new();
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        name.push(next);
                        let _ = chars.next();
                    } else {
                        break;
                    }
                }
                if !name.is_empty() {
                    let _ = vars.insert(name);
                }
            }
            _ => {}
        }
    }
    vars
}

/// `VALUES (?label) { ... }` with one row per value.
#[must_use]
pub fn values_pattern<I, S>(label: &str, values: I) -> GraphPattern
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let rows: String = values
        .into_iter()
        .map(|value| format!("  ({})\n", iri(value.as_ref())))
        .collect();
    GraphPattern::from_text(format!("VALUES ({}) {{\n{rows}}}", var(label)))
}

// Single value or AND: one fixed-object line. Several values with OR: VALUES
// over `var_label` plus a line using that variable.
fn constrain(
    subject: &str,
    predicate: &str,
    var_label: &str,
    values: &BTreeSet<String>,
    conjunctive: bool,
) -> GraphPattern {
    if values.is_empty() {
        GraphPattern::empty()
    } else if values.len() == 1 || conjunctive {
        GraphPattern::triple(subject, predicate, &join_objects(values))
    } else {
        values_pattern(var_label, values).then(GraphPattern::triple(
            subject,
            predicate,
            &var(var_label),
        ))
    }
}

fn join_objects(values: &BTreeSet<String>) -> String {
    values
        .iter()
        .map(|value| iri(value))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Constrains `sbol:type` of `entity`.
///
/// No types gives the empty fragment. One type, or several with `all_types`,
/// gives a single fixed-object line. Several types without `all_types` bind
/// `?<entity>_type` through a `VALUES` block.
#[must_use]
pub fn type_pattern(entity: &str, types: &BTreeSet<String>, all_types: bool) -> GraphPattern {
    constrain(
        &var(entity),
        SBOL_TYPE,
        &format!("{entity}_type"),
        types,
        all_types,
    )
}

/// Constrains `sbol:role` of `entity`; several roles are always alternatives.
#[must_use]
pub fn role_pattern(entity: &str, roles: &BTreeSet<String>) -> GraphPattern {
    constrain(
        &var(entity),
        SBOL_ROLE,
        &format!("{entity}_role"),
        roles,
        false,
    )
}

/// Requires `rdf:type` of `entity`.
#[must_use]
pub fn rdf_type_pattern(entity: &str, rdf_type: Option<&str>) -> GraphPattern {
    match rdf_type {
        Some(rdf_type) => GraphPattern::triple(&var(entity), RDF_TYPE, &iri(rdf_type)),
        None => GraphPattern::empty(),
    }
}

/// One line per declared custom property.
#[must_use]
pub fn custom_pattern(entity: &str, properties: &[(String, crate::Term)]) -> GraphPattern {
    properties
        .iter()
        .fold(GraphPattern::empty(), |pattern, (predicate, value)| {
            pattern.then(GraphPattern::triple(
                &var(entity),
                &iri(predicate),
                &value.to_string(),
            ))
        })
}

/// Restricts what `instance` is a use of to an explicit identity set.
///
/// Uses the same single-versus-`VALUES` rule as [`role_pattern`], binding
/// `definition` when there is more than one identity.
#[must_use]
pub fn definition_pattern(
    instance: &str,
    definition: &str,
    definitions: &BTreeSet<String>,
) -> GraphPattern {
    constrain(&var(instance), SBOL_DEFINITION, definition, definitions, false)
}

/// Containment idioms connecting a parent definition to the definitions it uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    /// `sbol:component` of a component definition.
    Component,
    /// `sbol:functionalComponent` and `sbol:module` of a module definition.
    FunctionalOrModule,
    /// All three, when the parent type is not known.
    Any,
}

impl Containment {
    /// Picks the idiom for the parent's `rdf:type`.
    ///
    /// # Errors
    ///
    /// Returns `CompileError::UnknownRdfType` for a type that has no
    /// containment idiom.
    pub fn for_rdf_type(rdf_type: Option<&str>) -> CompileResult<Self> {
        let Some(rdf_type) = rdf_type else {
            return Ok(Containment::Any);
        };
        match expand(rdf_type).as_str() {
            COMPONENT_DEFINITION => Ok(Containment::Component),
            MODULE_DEFINITION => Ok(Containment::FunctionalOrModule),
            _ => Err(CompileError::UnknownRdfType(rdf_type.to_string())),
        }
    }

    /// Predicates linking the parent to its sub-entity instances.
    #[must_use]
    pub fn predicates(self) -> &'static [&'static str] {
        match self {
            Containment::Component => &[SBOL_COMPONENT],
            Containment::FunctionalOrModule => &[SBOL_FUNCTIONAL_COMPONENT, SBOL_MODULE],
            Containment::Any => &[SBOL_COMPONENT, SBOL_FUNCTIONAL_COMPONENT, SBOL_MODULE],
        }
    }
}

/// Connects `parent` to a contained entity matching `sub`.
///
/// The connecting predicate is enumerated with `VALUES`. The contained
/// entity is then either restricted to `sub.definitions` or, when that set is
/// empty, bound to `?<parent>_sub` and constrained by the rest of `sub`.
///
/// # Errors
///
/// Returns `CompileError::UnknownRdfType` when `parent_rdf_type` has no
/// containment idiom.
pub fn sub_entity_pattern(
    parent: &str,
    parent_rdf_type: Option<&str>,
    sub: &EntityFilter,
) -> CompileResult<GraphPattern> {
    if sub.is_empty() {
        return Ok(GraphPattern::empty());
    }
    let containment = Containment::for_rdf_type(parent_rdf_type)?;
    let link = format!("{parent}_sub_link");
    let instance = format!("{parent}_sub_instance");
    let sub_label = format!("{parent}_sub");

    let pattern = values_pattern(&link, containment.predicates()).then(GraphPattern::triple(
        &var(parent),
        &var(&link),
        &var(&instance),
    ));

    if sub.definitions.is_empty() {
        let nested = entity_pattern(&sub_label, sub, &BTreeSet::new())?;
        Ok(pattern
            .then(GraphPattern::triple(
                &var(&instance),
                SBOL_DEFINITION,
                &var(&sub_label),
            ))
            .then(nested))
    } else {
        Ok(pattern.then(definition_pattern(&instance, &sub_label, &sub.definitions)))
    }
}

/// Optional `dcterms:title`, projected as `?name`.
#[must_use]
pub fn name_pattern(entity: &str) -> GraphPattern {
    GraphPattern::triple(&var(entity), DC_TITLE, "?name").optional()
}

/// Optional `dcterms:description`, projected as `?description`.
#[must_use]
pub fn description_pattern(entity: &str) -> GraphPattern {
    GraphPattern::triple(&var(entity), DC_DESCRIPTION, "?description").optional()
}

/// Sequence elements, projected as `?sequence`. Entities without a sequence
/// drop out of the results.
#[must_use]
pub fn sequence_pattern(entity: &str) -> GraphPattern {
    let sequence = var(&format!("{entity}_sequence_ref"));
    GraphPattern::triple(&var(entity), SBOL_SEQUENCE, &sequence).then(GraphPattern::triple(
        &sequence,
        SBOL_ELEMENTS,
        "?sequence",
    ))
}

/// Sequence annotations with their definition and range, projected as
/// `?feature_definition`, `?feature_start` and `?feature_end`. Entities
/// without annotations drop out of the results.
#[must_use]
pub fn feature_pattern(entity: &str) -> GraphPattern {
    let feature = var(&format!("{entity}_feature"));
    let component = var(&format!("{entity}_feature_component"));
    let location = var(&format!("{entity}_feature_location"));
    GraphPattern::triple(&var(entity), SBOL_SEQUENCE_ANNOTATION, &feature)
        .then(GraphPattern::triple(&feature, SBOL_COMPONENT, &component))
        .then(GraphPattern::triple(
            &component,
            SBOL_DEFINITION,
            "?feature_definition",
        ))
        .then(GraphPattern::triple(&feature, SBOL_LOCATION, &location))
        .then(GraphPattern::triple(&location, SBOL_START, "?feature_start"))
        .then(GraphPattern::triple(&location, SBOL_END, "?feature_end"))
}

/// Assembles every fragment describing one entity.
///
/// Returns the empty fragment when neither the filter nor the projections
/// ask for anything.
///
/// # Errors
///
/// Propagates `CompileError::UnknownRdfType` from the sub-entity pattern.
pub fn entity_pattern(
    entity: &str,
    filter: &EntityFilter,
    projections: &BTreeSet<Projection>,
) -> CompileResult<GraphPattern> {
    let sub = match &filter.sub {
        Some(sub) => sub_entity_pattern(entity, filter.rdf_type.as_deref(), sub)?,
        None => GraphPattern::empty(),
    };
    let mut pattern = type_pattern(entity, &filter.types, filter.all_types)
        .then(role_pattern(entity, &filter.roles))
        .then(sub)
        .then(rdf_type_pattern(entity, filter.rdf_type.as_deref()));
    for projection in projections {
        pattern = pattern.then(match projection {
            Projection::Name => name_pattern(entity),
            Projection::Description => description_pattern(entity),
            Projection::Sequence => sequence_pattern(entity),
            Projection::Feature => feature_pattern(entity),
        });
    }
    Ok(pattern.then(custom_pattern(entity, &filter.custom_properties)))
}

/// Resolves the experiment node: unconstrained variable, fixed IRI, or a
/// variable enumerated with `VALUES`.
#[must_use]
pub fn experiment_anchor(label: &str, experiments: &BTreeSet<String>) -> (String, GraphPattern) {
    match experiments.len() {
        0 => (var(label), GraphPattern::empty()),
        1 => (join_objects(experiments), GraphPattern::empty()),
        _ => (var(label), values_pattern(label, experiments)),
    }
}

/// Follows an experiment's provenance chain down to `entity`:
/// experiment, experimental data, `prov:wasDerivedFrom` repeated per
/// `cardinality`, the built condition, then the entity.
///
/// # Errors
///
/// Returns `CompileError::InvalidCardinality` for a zero-length exact path.
pub fn experiment_pattern(
    label: &str,
    experiments: &BTreeSet<String>,
    cardinality: PathCardinality,
    entity: &str,
) -> CompileResult<(String, GraphPattern)> {
    let (node, anchor) = experiment_anchor(label, experiments);
    let data = var(&format!("{label}_data"));
    let condition = var(&format!("{label}_condition"));
    let path = cardinality.path(PROV_DERIVED_FROM)?;
    debug!("experiment provenance path {} for {}", path, node);
    let pattern = anchor
        .then(GraphPattern::triple(&node, SD2_EXPERIMENTAL_DATA, &data))
        .then(GraphPattern::triple(&data, &path, &condition))
        .then(GraphPattern::triple(&condition, SD2_BUILT, &var(entity)));
    Ok((node, pattern))
}
