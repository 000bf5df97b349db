//! Categorical normalization
//!
//! Free-form category strings from scenario documents are mapped onto fixed
//! enumerated domains. Normalization is total: any input, including garbage
//! or a missing value, produces a member of the target domain.
//!
//! Matching folds case and treats spaces and hyphens as underscores, so
//! `"money market"`, `"Money-Market"` and `"MONEY_MARKET"` are the same key.
//! Each domain carries an alias table consulted after the exact match.

use tracing::debug;

/// A fixed enumerated domain
pub trait Categorical: Copy + Eq + std::fmt::Debug + 'static {
    /// Domain name used in logs and schema constraints
    const DOMAIN: &'static str;
    /// Every member, in declaration order
    const VARIANTS: &'static [Self];
    /// Folded synonym -> member
    const ALIASES: &'static [(&'static str, Self)];

    /// Canonical stored text of the member
    fn as_str(&self) -> &'static str;
}

/// Fold a raw category string into its lookup key
pub fn fold(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}

/// Look up a raw value in a domain without falling back
pub fn lookup<D: Categorical>(raw: &str) -> Option<D> {
    let key = fold(raw);
    if key.is_empty() {
        return None;
    }
    D::VARIANTS
        .iter()
        .copied()
        .find(|v| v.as_str() == key)
        .or_else(|| {
            D::ALIASES
                .iter()
                .find(|(alias, _)| *alias == key)
                .map(|(_, v)| *v)
        })
}

/// Map a raw value into `D`, using `default` when it is missing or unknown
pub fn normalize<D: Categorical>(raw: Option<&str>, default: D) -> D {
    let Some(raw) = raw else {
        return default;
    };
    match lookup::<D>(raw) {
        Some(value) => value,
        None => {
            debug!(
                domain = D::DOMAIN,
                raw,
                fallback = default.as_str(),
                "unrecognized category value"
            );
            default
        }
    }
}

/// SQL `CHECK` expression restricting `column` to the members of `D`
pub fn check_clause<D: Categorical>(column: &str) -> String {
    let members: Vec<String> = D::VARIANTS
        .iter()
        .map(|v| format!("'{}'", v.as_str()))
        .collect();
    format!("CHECK ({} IN ({}))", column, members.join(", "))
}

/// Declares a categorical domain enum together with its alias table.
macro_rules! categorical {
    (
        $(#[$meta:meta])*
        $name:ident ($domain:literal) {
            $($variant:ident => $text:literal),+ $(,)?
        }
        aliases { $($alias:literal => $target:ident),* $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $crate::normalize::Categorical for $name {
            const DOMAIN: &'static str = $domain;
            const VARIANTS: &'static [Self] = &[$($name::$variant),+];
            const ALIASES: &'static [(&'static str, Self)] = &[$(($alias, $name::$target)),*];

            fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str($crate::normalize::Categorical::as_str(self))
            }
        }
    };
}

pub(crate) use categorical;

mod domains;

pub use domains::{
    AccountStatus, AccountType, AddressType, AlertSeverity, AlertStatus, Channel,
    CounterpartyType, Currency, CustomerSegment, CustomerStatus, CustomerType, Defaults,
    Direction, IdType, LegalForm, OfficerType, OwnershipType, RelationshipType, RiskRating,
    TxnType,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_handles_case_spaces_and_hyphens() {
        assert_eq!(fold("  money market "), "MONEY_MARKET");
        assert_eq!(fold("Money-Market"), "MONEY_MARKET");
        assert_eq!(fold(""), "");
    }

    #[test]
    fn exact_match_is_case_insensitive() {
        assert_eq!(normalize(Some("high"), RiskRating::Medium), RiskRating::High);
        assert_eq!(normalize(Some("Low"), RiskRating::Medium), RiskRating::Low);
    }

    #[test]
    fn unknown_value_falls_back_to_default() {
        assert_eq!(
            normalize(Some("EXTREMELY_SPICY"), RiskRating::Medium),
            RiskRating::Medium
        );
        assert_eq!(normalize::<RiskRating>(None, RiskRating::Low), RiskRating::Low);
        assert_eq!(normalize(Some("   "), RiskRating::Medium), RiskRating::Medium);
    }

    #[test]
    fn aliases_collapse_synonyms() {
        assert_eq!(normalize(Some("shell company"), LegalForm::Trust), LegalForm::Llc);
        assert_eq!(normalize(Some("COMPANY"), LegalForm::Trust), LegalForm::Llc);
        assert_eq!(normalize(Some("transfer"), TxnType::Fee), TxnType::Wire);
        assert_eq!(normalize(Some("deposit"), TxnType::Fee), TxnType::CashDeposit);
        assert_eq!(
            normalize(Some("works for"), RelationshipType::Family),
            RelationshipType::Employer
        );
        assert_eq!(normalize(Some("Personal"), AccountType::Loan), AccountType::Checking);
    }

    #[test]
    fn lookup_does_not_default() {
        assert_eq!(lookup::<Channel>("mobile"), Some(Channel::Mobile));
        assert_eq!(lookup::<Channel>("carrier pigeon"), None);
    }

    #[test]
    fn check_clause_lists_every_member() {
        let clause = check_clause::<Direction>("direction");
        assert_eq!(clause, "CHECK (direction IN ('CREDIT', 'DEBIT'))");
    }

    #[test]
    fn as_str_round_trips_through_lookup() {
        for v in TxnType::VARIANTS {
            assert_eq!(lookup::<TxnType>(v.as_str()), Some(*v));
        }
        for v in OfficerType::VARIANTS {
            assert_eq!(lookup::<OfficerType>(v.as_str()), Some(*v));
        }
    }
}
