//! Typed edges of the property graph

use super::node::{Properties, PropertyValue};
use crate::normalize::{categorical, OfficerType};
use serde::{Deserialize, Serialize};

categorical! {
    /// Relationship types; raw scenario relationship types fold onto these
    RelType ("rel_type") {
        Owns => "OWNS",
        Controls => "CONTROLS",
        DirectorOf => "DIRECTOR_OF",
        OfficerOf => "OFFICER_OF",
        RegisteredAt => "REGISTERED_AT",
        OperatesIn => "OPERATES_IN",
        AssociatedWith => "ASSOCIATED_WITH",
        SubjectOf => "SUBJECT_OF",
        SharesAddressWith => "SHARES_ADDRESS_WITH",
        RelatedTo => "RELATED_TO",
        FamilyOf => "FAMILY_OF",
        AssociateOf => "ASSOCIATE_OF",
    }
    aliases {
        "BENEFICIAL_OWNER" => Owns,
        "SHAREHOLDER" => Owns,
        "OWNER" => Owns,
        "PARENT_COMPANY" => Owns,
        "AUTHORIZED_SIGNER" => Controls,
        "SIGNATORY" => Controls,
        "DIRECTOR" => DirectorOf,
        "FAMILY" => FamilyOf,
        "SPOUSE" => FamilyOf,
        "SIBLING" => FamilyOf,
        "BUSINESS_PARTNER" => AssociateOf,
        "PARTNER" => AssociateOf,
        "ASSOCIATE" => AssociateOf,
        "EMPLOYER" => RelatedTo,
        "GUARANTOR" => RelatedTo,
    }
}

impl RelType {
    /// Edge type from an officer to the company it serves
    pub fn for_officer(officer_type: OfficerType) -> Self {
        match officer_type {
            OfficerType::Ubo | OfficerType::Shareholder => RelType::Owns,
            OfficerType::Director => RelType::DirectorOf,
            _ => RelType::OfficerOf,
        }
    }

    /// Edge types that carry ownership or control upstream
    pub const OWNERSHIP: &'static [RelType] = &[RelType::Owns, RelType::Controls];
}

/// A directed, typed edge; at most one per (from, to, rel)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub rel: RelType,
    pub properties: Properties,
}

impl GraphEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, rel: RelType) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            rel,
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_optional(self, key: &str, value: Option<impl Into<PropertyValue>>) -> Self {
        match value {
            Some(value) => self.with_property(key, value),
            None => self,
        }
    }

    /// The endpoint that is not `node`
    pub fn other(&self, node: &str) -> &str {
        if self.from == node {
            &self.to
        } else {
            &self.from
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;

    #[test]
    fn raw_relationship_types_fold_onto_rel_types() {
        assert_eq!(normalize(Some("beneficial owner"), RelType::RelatedTo), RelType::Owns);
        assert_eq!(normalize(Some("family"), RelType::RelatedTo), RelType::FamilyOf);
        assert_eq!(normalize(Some("CONTROLS"), RelType::RelatedTo), RelType::Controls);
        assert_eq!(normalize(Some("pen pal"), RelType::RelatedTo), RelType::RelatedTo);
    }

    #[test]
    fn officer_roles() {
        assert_eq!(RelType::for_officer(OfficerType::Ubo), RelType::Owns);
        assert_eq!(RelType::for_officer(OfficerType::Director), RelType::DirectorOf);
        assert_eq!(RelType::for_officer(OfficerType::Cfo), RelType::OfficerOf);
    }
}
