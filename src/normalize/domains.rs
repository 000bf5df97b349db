//! Enumerated domains of the relational schema

use serde::{Deserialize, Serialize};

categorical! {
    /// Kind of customer
    CustomerType ("customer_type") {
        Person => "PERSON",
        Company => "COMPANY",
    }
    aliases {
        "INDIVIDUAL" => Person,
        "NATURAL_PERSON" => Person,
        "LLC" => Company,
        "CORPORATION" => Company,
        "SHELL_COMPANY" => Company,
        "HOLDING" => Company,
        "HOLDING_COMPANY" => Company,
        "BUSINESS" => Company,
        "PARTNERSHIP" => Company,
        "TRUST" => Company,
        "FOUNDATION" => Company,
        "NON_PROFIT" => Company,
        "SOLE_PROPRIETORSHIP" => Company,
    }
}

categorical! {
    RiskRating ("risk_rating") {
        Low => "LOW",
        Medium => "MEDIUM",
        High => "HIGH",
        Prohibited => "PROHIBITED",
    }
    aliases {
        "MED" => Medium,
        "VERY_HIGH" => High,
    }
}

categorical! {
    CustomerSegment ("customer_segment") {
        Retail => "RETAIL",
        Sme => "SME",
        Corporate => "CORPORATE",
        PrivateBanking => "PRIVATE_BANKING",
    }
    aliases {
        "SMB" => Sme,
        "HNW" => PrivateBanking,
        "WEALTH" => PrivateBanking,
    }
}

categorical! {
    CustomerStatus ("customer_status") {
        Active => "ACTIVE",
        Dormant => "DORMANT",
        Closed => "CLOSED",
        Blocked => "BLOCKED",
    }
    aliases {
        "INACTIVE" => Dormant,
        "SUSPENDED" => Blocked,
        "FROZEN" => Blocked,
    }
}

categorical! {
    /// Legal form of a company customer
    LegalForm ("legal_form") {
        Llc => "LLC",
        Corporation => "CORPORATION",
        Partnership => "PARTNERSHIP",
        SoleProprietorship => "SOLE_PROPRIETORSHIP",
        Trust => "TRUST",
        Foundation => "FOUNDATION",
        NonProfit => "NON_PROFIT",
    }
    aliases {
        "COMPANY" => Llc,
        "SHELL_COMPANY" => Llc,
        "BUSINESS" => Llc,
        "LTD" => Llc,
        "GMBH" => Llc,
        "CORP" => Corporation,
        "INC" => Corporation,
        "PLC" => Corporation,
        "NONPROFIT" => NonProfit,
        "CHARITY" => NonProfit,
    }
}

categorical! {
    AddressType ("address_type") {
        Residential => "RESIDENTIAL",
        Registered => "REGISTERED",
        Business => "BUSINESS",
        Mailing => "MAILING",
    }
    aliases {
        "HOME" => Residential,
        "OFFICE" => Business,
        "POSTAL" => Mailing,
    }
}

categorical! {
    IdType ("id_type") {
        Ssn => "SSN",
        Passport => "PASSPORT",
        DriversLicense => "DRIVERS_LICENSE",
        NationalId => "NATIONAL_ID",
        TaxId => "TAX_ID",
        Ein => "EIN",
        Lei => "LEI",
        RegistrationNumber => "REGISTRATION_NUMBER",
    }
    aliases {
        "TIN" => TaxId,
        "DRIVER_LICENSE" => DriversLicense,
        "DRIVING_LICENSE" => DriversLicense,
        "COMPANY_NUMBER" => RegistrationNumber,
        "ID_CARD" => NationalId,
    }
}

categorical! {
    /// Role of an officer or beneficial owner within a company
    OfficerType ("officer_type") {
        Director => "DIRECTOR",
        Shareholder => "SHAREHOLDER",
        Ubo => "UBO",
        Secretary => "SECRETARY",
        Ceo => "CEO",
        Cfo => "CFO",
        AuthorizedSignatory => "AUTHORIZED_SIGNATORY",
    }
    aliases {
        "BENEFICIAL_OWNER" => Ubo,
        "OWNER" => Ubo,
        "SIGNATORY" => AuthorizedSignatory,
        "NOMINEE_DIRECTOR" => Director,
    }
}

categorical! {
    AccountType ("account_type") {
        Checking => "CHECKING",
        Savings => "SAVINGS",
        MoneyMarket => "MONEY_MARKET",
        Cd => "CD",
        Loan => "LOAN",
        Mortgage => "MORTGAGE",
        CreditCard => "CREDIT_CARD",
        Brokerage => "BROKERAGE",
    }
    aliases {
        "BUSINESS" => Checking,
        "PERSONAL" => Checking,
        "CURRENT" => Checking,
        "CERTIFICATE_OF_DEPOSIT" => Cd,
        "INVESTMENT" => Brokerage,
    }
}

categorical! {
    AccountStatus ("account_status") {
        Active => "ACTIVE",
        Dormant => "DORMANT",
        Frozen => "FROZEN",
        Closed => "CLOSED",
    }
    aliases {
        "INACTIVE" => Dormant,
        "BLOCKED" => Frozen,
    }
}

categorical! {
    Currency ("currency") {
        Usd => "USD",
        Eur => "EUR",
        Gbp => "GBP",
        Chf => "CHF",
        Jpy => "JPY",
        Cad => "CAD",
        Aud => "AUD",
        Cny => "CNY",
        Hkd => "HKD",
        Sgd => "SGD",
        Aed => "AED",
    }
    aliases {
        "US$" => Usd,
        "DOLLAR" => Usd,
        "EURO" => Eur,
        "RMB" => Cny,
    }
}

categorical! {
    OwnershipType ("ownership_type") {
        Primary => "PRIMARY",
        Joint => "JOINT",
        AuthorizedUser => "AUTHORIZED_USER",
        Trustee => "TRUSTEE",
        Beneficiary => "BENEFICIARY",
    }
    aliases {
        "OWNER" => Primary,
        "CO_OWNER" => Joint,
    }
}

categorical! {
    TxnType ("txn_type") {
        Wire => "WIRE",
        Ach => "ACH",
        CashDeposit => "CASH_DEPOSIT",
        CashWithdrawal => "CASH_WITHDRAWAL",
        CheckDeposit => "CHECK_DEPOSIT",
        CheckIssued => "CHECK_ISSUED",
        InternalTransfer => "INTERNAL_TRANSFER",
        CardPurchase => "CARD_PURCHASE",
        Atm => "ATM",
        Fee => "FEE",
        Interest => "INTEREST",
    }
    aliases {
        "TRANSFER" => Wire,
        "WIRE_TRANSFER" => Wire,
        "DEPOSIT" => CashDeposit,
        "WITHDRAWAL" => CashWithdrawal,
        "CHECK" => CheckIssued,
        "CARD" => CardPurchase,
        "PURCHASE" => CardPurchase,
    }
}

categorical! {
    Channel ("channel") {
        Branch => "BRANCH",
        Online => "ONLINE",
        Mobile => "MOBILE",
        Atm => "ATM",
        Phone => "PHONE",
        Api => "API",
    }
    aliases {
        "INTERNET" => Online,
        "WEB" => Online,
        "TELLER" => Branch,
    }
}

categorical! {
    /// Customer-to-customer relationship kind
    RelationshipType ("relationship_type") {
        BusinessPartner => "BUSINESS_PARTNER",
        Family => "FAMILY",
        Employer => "EMPLOYER",
        BeneficialOwner => "BENEFICIAL_OWNER",
        AuthorizedSigner => "AUTHORIZED_SIGNER",
        Guarantor => "GUARANTOR",
    }
    aliases {
        "CONTROLS" => BeneficialOwner,
        "OWNS" => BeneficialOwner,
        "WORKS_FOR" => Employer,
        "EMPLOYEE" => Employer,
        "RELATED_TO" => Family,
        "FAMILY_MEMBER" => Family,
        "ASSOCIATE" => BusinessPartner,
        "PARTNER" => BusinessPartner,
    }
}

categorical! {
    CounterpartyType ("counterparty_type") {
        Individual => "INDIVIDUAL",
        Business => "BUSINESS",
        Bank => "BANK",
        Government => "GOVERNMENT",
        Unknown => "UNKNOWN",
    }
    aliases {
        "PERSON" => Individual,
        "COMPANY" => Business,
        "CORPORATE" => Business,
        "FINANCIAL_INSTITUTION" => Bank,
    }
}

categorical! {
    AlertSeverity ("severity") {
        Low => "LOW",
        Medium => "MEDIUM",
        High => "HIGH",
        Critical => "CRITICAL",
    }
    aliases {
        "MED" => Medium,
    }
}

categorical! {
    AlertStatus ("alert_status") {
        New => "NEW",
        InReview => "IN_REVIEW",
        Escalated => "ESCALATED",
        Closed => "CLOSED",
        SarFiled => "SAR_FILED",
    }
    aliases {
        "OPEN" => New,
        "INVESTIGATING" => InReview,
    }
}

categorical! {
    /// Booking direction of a transaction, always inferred
    Direction ("txn_direction") {
        Credit => "CREDIT",
        Debit => "DEBIT",
    }
    aliases {
        "IN" => Credit,
        "OUT" => Debit,
    }
}

/// Per-domain fallbacks applied when input is missing or unrecognized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub customer_type: CustomerType,
    pub risk_rating: RiskRating,
    pub customer_status: CustomerStatus,
    pub legal_form: LegalForm,
    pub id_type: IdType,
    pub officer_type: OfficerType,
    pub account_type: AccountType,
    pub account_status: AccountStatus,
    pub currency: Currency,
    pub txn_type: TxnType,
    pub channel: Channel,
    pub relationship_type: RelationshipType,
    pub counterparty_type: CounterpartyType,
    pub alert_severity: AlertSeverity,
    pub alert_status: AlertStatus,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            customer_type: CustomerType::Person,
            risk_rating: RiskRating::Medium,
            customer_status: CustomerStatus::Active,
            legal_form: LegalForm::Llc,
            id_type: IdType::Passport,
            officer_type: OfficerType::Director,
            account_type: AccountType::Checking,
            account_status: AccountStatus::Active,
            currency: Currency::Usd,
            txn_type: TxnType::Wire,
            channel: Channel::Online,
            relationship_type: RelationshipType::BusinessPartner,
            counterparty_type: CounterpartyType::Unknown,
            alert_severity: AlertSeverity::Medium,
            alert_status: AlertStatus::New,
        }
    }
}
