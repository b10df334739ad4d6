//! Vocabulary emitted by the pattern compiler.
//!
//! Predicates are written as prefixed names; [`PREFIXES`] declares every
//! namespace they use and is placed ahead of each compiled query.

/// `PREFIX` declarations emitted ahead of every compiled query.
pub const PREFIXES: &[(&str, &str)] = &[
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("dcterms", "http://purl.org/dc/terms/"),
    ("prov", "http://www.w3.org/ns/prov#"),
    ("sbol", "http://sbols.org/v2#"),
    ("sd2", "http://sd2e.org#"),
];

/// `sbol:type`
pub const SBOL_TYPE: &str = "sbol:type";
/// `sbol:role`
pub const SBOL_ROLE: &str = "sbol:role";
/// `sbol:member`
pub const SBOL_MEMBER: &str = "sbol:member";
/// `sbol:definition`
pub const SBOL_DEFINITION: &str = "sbol:definition";
/// `sbol:component`
pub const SBOL_COMPONENT: &str = "sbol:component";
/// `sbol:functionalComponent`
pub const SBOL_FUNCTIONAL_COMPONENT: &str = "sbol:functionalComponent";
/// `sbol:module`
pub const SBOL_MODULE: &str = "sbol:module";
/// `sbol:sequence`
pub const SBOL_SEQUENCE: &str = "sbol:sequence";
/// `sbol:elements`
pub const SBOL_ELEMENTS: &str = "sbol:elements";
/// `sbol:sequenceAnnotation`
pub const SBOL_SEQUENCE_ANNOTATION: &str = "sbol:sequenceAnnotation";
/// `sbol:location`
pub const SBOL_LOCATION: &str = "sbol:location";
/// `sbol:start`
pub const SBOL_START: &str = "sbol:start";
/// `sbol:end`
pub const SBOL_END: &str = "sbol:end";

/// `dcterms:title`
pub const DC_TITLE: &str = "dcterms:title";
/// `dcterms:description`
pub const DC_DESCRIPTION: &str = "dcterms:description";

/// `prov:wasDerivedFrom`
pub const PROV_DERIVED_FROM: &str = "prov:wasDerivedFrom";

/// `sd2:experimentalData`
pub const SD2_EXPERIMENTAL_DATA: &str = "sd2:experimentalData";
/// `sd2:built`
pub const SD2_BUILT: &str = "sd2:built";

/// `rdf:type`, written with the `a` keyword.
pub const RDF_TYPE: &str = "a";

/// Full IRI of `sbol:ComponentDefinition`.
pub const COMPONENT_DEFINITION: &str = "http://sbols.org/v2#ComponentDefinition";
/// Full IRI of `sbol:ModuleDefinition`.
pub const MODULE_DEFINITION: &str = "http://sbols.org/v2#ModuleDefinition";
/// Full IRI of `sbol:Collection`.
pub const COLLECTION: &str = "http://sbols.org/v2#Collection";

/// Commonly queried type and role IRIs.
pub mod catalog {
    /// BioPAX DNA region.
    pub const DNA_REGION: &str = "http://www.biopax.org/release/biopax-level3.owl#DnaRegion";
    /// BioPAX small molecule.
    pub const SMALL_MOLECULE: &str =
        "http://www.biopax.org/release/biopax-level3.owl#SmallMolecule";
    /// BioPAX protein.
    pub const PROTEIN: &str = "http://www.biopax.org/release/biopax-level3.owl#Protein";
    /// BioPAX complex.
    pub const COMPLEX: &str = "http://www.biopax.org/release/biopax-level3.owl#Complex";

    /// Sequence Ontology engineered region.
    pub const ENGINEERED_REGION: &str = "http://identifiers.org/so/SO:0000804";
    /// Sequence Ontology promoter.
    pub const PROMOTER: &str = "http://identifiers.org/so/SO:0000167";
    /// Sequence Ontology coding sequence.
    pub const CDS: &str = "http://identifiers.org/so/SO:0000316";
    /// Sequence Ontology terminator.
    pub const TERMINATOR: &str = "http://identifiers.org/so/SO:0000141";
    /// Sequence Ontology ribosome entry site.
    pub const RBS: &str = "http://identifiers.org/so/SO:0000139";
    /// Sequence Ontology plasmid vector.
    pub const PLASMID: &str = "http://identifiers.org/so/SO:0000755";

    /// NCIT strain.
    pub const STRAIN: &str = "http://purl.obolibrary.org/obo/NCIT_C14419";
    /// NCIT growth media.
    pub const MEDIA: &str = "http://purl.obolibrary.org/obo/NCIT_C85504";
    /// ChEBI effector, used for inducers.
    pub const INDUCER: &str = "http://identifiers.org/chebi/CHEBI:35224";
}

/// Expands a known prefixed name (`sbol:ModuleDefinition`) into its full IRI.
///
/// Angle brackets are stripped; anything that is not a known prefixed name is
/// returned as given.
#[must_use]
pub fn expand(name: &str) -> String {
    let trimmed = name
        .strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(name);
    if let Some((prefix, local)) = trimmed.split_once(':') {
        if let Some((_, ns)) = PREFIXES.iter().find(|(p, _)| *p == prefix) {
            return format!("{ns}{local}");
        }
    }
    trimmed.to_string()
}

/// Renders the `PREFIX` header block.
#[must_use]
pub fn prefix_block() -> String {
    PREFIXES
        .iter()
        .map(|(prefix, ns)| format!("PREFIX {prefix}: <{ns}>\n"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_prefixed_name() {
        assert_eq!(expand("sbol:ModuleDefinition"), MODULE_DEFINITION);
        assert_eq!(expand("<http://sbols.org/v2#Collection>"), COLLECTION);
        assert_eq!(expand("http://example.com/x"), "http://example.com/x");
        assert_eq!(expand("unknown:thing"), "unknown:thing");
    }

    #[test]
    fn test_prefix_block_declares_every_namespace() {
        let block = prefix_block();
        assert_eq!(block.lines().count(), PREFIXES.len());
        assert!(block.contains("PREFIX sbol: <http://sbols.org/v2#>"));
    }
}
