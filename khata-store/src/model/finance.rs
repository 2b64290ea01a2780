//! Finance Models - Personal Finance Entity Catalog
//!
//! `TigerStyle`: Explicit enums, constructors that validate, builders for
//! the long tail of optional fields.
//!
//! Every type here is a plain serde struct. Persistence comes from the
//! [`Model`] impl at the bottom of the file, which binds each type to its
//! logical store name. Soft deletion is a regular boolean field
//! (`is_deleted`): filtering on it is a query concern, not a storage one,
//! so deleted records stay reachable by primary key.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::TRANSACTION_CURRENCY_DEFAULT;

use super::{datetime, impl_model};

// =============================================================================
// Enums
// =============================================================================

/// Kinds of money movement a transaction can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Money coming in
    Income,
    /// Money going out
    Expense,
    /// Moving money between own accounts
    Transfer,
    /// Lending money to a contact
    DebtGiven,
    /// Borrowing money from a contact
    DebtReceived,
    /// Paying back borrowed money
    DebtRepayment,
    /// Collecting lent money
    DebtCollection,
}

impl TransactionType {
    /// Get string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "INCOME",
            Self::Expense => "EXPENSE",
            Self::Transfer => "TRANSFER",
            Self::DebtGiven => "DEBT_GIVEN",
            Self::DebtReceived => "DEBT_RECEIVED",
            Self::DebtRepayment => "DEBT_REPAYMENT",
            Self::DebtCollection => "DEBT_COLLECTION",
        }
    }

    /// Get all transaction types in order.
    #[must_use]
    pub fn all() -> &'static [TransactionType] {
        &[
            Self::Income,
            Self::Expense,
            Self::Transfer,
            Self::DebtGiven,
            Self::DebtReceived,
            Self::DebtRepayment,
            Self::DebtCollection,
        ]
    }

    /// Whether this type involves a debt contact.
    #[must_use]
    pub fn is_debt(&self) -> bool {
        matches!(
            self,
            Self::DebtGiven | Self::DebtReceived | Self::DebtRepayment | Self::DebtCollection
        )
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a transaction was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Physical cash
    Cash,
    /// Unified Payments Interface
    Upi,
    /// Credit card
    CreditCard,
    /// Debit card
    DebitCard,
    /// Online banking transfer
    NetBanking,
    /// Direct bank transfer (NEFT/IMPS/RTGS)
    BankTransfer,
    /// Mobile wallet
    Wallet,
    /// Cheque
    Cheque,
    /// Anything else
    Other,
}

impl PaymentMethod {
    /// Get string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "CASH",
            Self::Upi => "UPI",
            Self::CreditCard => "CREDIT_CARD",
            Self::DebitCard => "DEBIT_CARD",
            Self::NetBanking => "NET_BANKING",
            Self::BankTransfer => "BANK_TRANSFER",
            Self::Wallet => "WALLET",
            Self::Cheque => "CHEQUE",
            Self::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How often a recurring transaction or budget period repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecurrenceFrequency {
    /// Every day
    Daily,
    /// Every week
    Weekly,
    /// Every month
    Monthly,
    /// Every three months
    Quarterly,
    /// Every year
    Yearly,
}

impl RecurrenceFrequency {
    /// Get string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Quarterly => "QUARTERLY",
            Self::Yearly => "YEARLY",
        }
    }
}

impl std::fmt::Display for RecurrenceFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kinds of accounts money lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    /// Bank account
    Bank,
    /// Credit card account
    CreditCard,
    /// Cash on hand
    Cash,
    /// Mobile wallet balance
    Wallet,
    /// Investment account
    Investment,
}

impl AccountType {
    /// Get string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bank => "BANK",
            Self::CreditCard => "CREDIT_CARD",
            Self::Cash => "CASH",
            Self::Wallet => "WALLET",
            Self::Investment => "INVESTMENT",
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which side of the ledger a category belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryType {
    /// Income categories (salary, interest, ...)
    Income,
    /// Expense categories (food, travel, ...)
    Expense,
}

impl CategoryType {
    /// Get string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl std::fmt::Display for CategoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Subdocuments
// =============================================================================

/// Where a transaction happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Human-readable address
    pub address: String,
}

impl Location {
    /// Create a location.
    ///
    /// # Panics
    /// Panics if coordinates are out of range or the address is empty.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, address: String) -> Self {
        // Preconditions
        assert!((-90.0..=90.0).contains(&latitude), "latitude out of range");
        assert!(
            (-180.0..=180.0).contains(&longitude),
            "longitude out of range"
        );
        assert!(!address.is_empty(), "address cannot be empty");

        Self {
            latitude,
            longitude,
            address,
        }
    }
}

/// A file attached to a transaction (receipt, invoice, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// Original file name
    pub file_name: String,
    /// MIME type
    pub file_type: String,
    /// Size in bytes
    pub file_size: u64,
    /// Where the file is stored
    pub file_url: String,
    /// Upload timestamp
    #[serde(with = "datetime")]
    pub uploaded_at: DateTime<Utc>,
}

impl Attachment {
    /// Create an attachment with a fresh id.
    #[must_use]
    pub fn new(file_name: String, file_type: String, file_size: u64, file_url: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            file_name,
            file_type,
            file_size,
            file_url,
            uploaded_at: Utc::now(),
        }
    }
}

/// One participant's share of a split transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitShare {
    /// Contact who owes this share
    pub contact_id: String,
    /// Share amount
    pub amount: f64,
    /// Share as a percentage of the total, if tracked that way
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    /// Whether this share has been settled
    #[serde(default)]
    pub settled: bool,
}

impl SplitShare {
    /// Create an unsettled share.
    ///
    /// # Panics
    /// Panics if the amount is not positive.
    #[must_use]
    pub fn new(contact_id: String, amount: f64) -> Self {
        assert!(amount > 0.0, "share amount must be positive");

        Self {
            contact_id,
            amount,
            percentage: None,
            settled: false,
        }
    }
}

/// Schedule for a recurring transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringConfig {
    /// How often the transaction repeats
    pub frequency: RecurrenceFrequency,
    /// Repeat every N periods (1 = every period)
    #[serde(default = "default_interval")]
    pub interval: u32,
    /// First occurrence
    pub start_date: NaiveDate,
    /// Last occurrence, if the schedule ends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    /// Stop after this many occurrences, if bounded that way
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurrences: Option<u32>,
}

impl RecurringConfig {
    /// Create a schedule repeating every period from `start_date`.
    #[must_use]
    pub fn new(frequency: RecurrenceFrequency, start_date: NaiveDate) -> Self {
        Self {
            frequency,
            interval: 1,
            start_date,
            end_date: None,
            occurrences: None,
        }
    }

    /// Bound the schedule by an end date.
    #[must_use]
    pub fn with_end_date(mut self, end_date: NaiveDate) -> Self {
        debug_assert!(end_date >= self.start_date, "schedule cannot end before it starts");
        self.end_date = Some(end_date);
        self
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A single money movement.
///
/// The central model of the system. Required fields go through [`new`];
/// the long tail of optional detail is attached with `with_*` builders.
/// Optional fields serialize only when present, so "field is absent"
/// is observable in filters.
///
/// [`new`]: Transaction::new
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Primary key, assigned on first save
    #[serde(default)]
    pub pk: String,
    /// Sort key, assigned on first save
    #[serde(default)]
    pub sk: String,
    /// What kind of movement this is
    pub transaction_type: TransactionType,
    /// Amount in `currency` units, always positive
    pub amount: f64,
    /// ISO 4217 currency code
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Calendar date the transaction happened
    pub transaction_date: NaiveDate,
    /// Category this transaction belongs to
    pub category_id: String,
    /// Short human description
    pub description: String,
    /// Free-form notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Lowercased tags for filtering
    #[serde(default)]
    pub tags: Vec<String>,
    /// How it was paid
    pub payment_method: PaymentMethod,
    /// Account money left
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_account_id: Option<String>,
    /// Account money arrived in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_account_id: Option<String>,
    /// UPI app used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upi_provider_id: Option<String>,
    /// UPI reference returned by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upi_transaction_id: Option<String>,
    /// Last four digits of the card used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_last_four_digits: Option<String>,
    /// Cheque number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cheque_number: Option<String>,
    /// Bank or external reference number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_number: Option<String>,
    /// Debt counterparty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    /// When a debt falls due
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// Whether a debt has been settled
    #[serde(default)]
    pub is_paid: bool,
    /// Whether this transaction repeats
    #[serde(default)]
    pub is_recurring: bool,
    /// Schedule, when recurring
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_config: Option<RecurringConfig>,
    /// Whether this is claimable against tax
    #[serde(default)]
    pub is_tax_deductible: bool,
    /// Tax bucket, when deductible
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_category: Option<String>,
    /// Where it happened
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// Receipts and other files
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Shares owed by others
    #[serde(default)]
    pub splits: Vec<SplitShare>,
    /// Fee charged for a transfer
    #[serde(default)]
    pub transfer_fee: f64,
    /// Other leg of a transfer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_transaction_id: Option<String>,
    /// Who recorded it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// Soft-deletion marker
    #[serde(default)]
    pub is_deleted: bool,
    /// Flagged as a suspected duplicate
    #[serde(default)]
    pub is_duplicate: bool,
    /// Creation timestamp
    #[serde(with = "datetime")]
    pub created_at: DateTime<Utc>,
    /// Last-write timestamp
    #[serde(with = "datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a transaction dated today with required fields only.
    ///
    /// # Panics
    /// Panics if the amount is not positive and finite, or if
    /// `category_id` or `description` is empty.
    #[must_use]
    pub fn new(
        transaction_type: TransactionType,
        amount: f64,
        category_id: String,
        description: String,
        payment_method: PaymentMethod,
    ) -> Self {
        // Preconditions
        assert!(amount.is_finite(), "amount must be finite");
        assert!(amount > 0.0, "amount must be positive");
        assert!(!category_id.is_empty(), "category_id cannot be empty");
        assert!(!description.is_empty(), "description cannot be empty");

        let now = Utc::now();
        Self {
            pk: String::new(),
            sk: String::new(),
            transaction_type,
            amount,
            currency: default_currency(),
            transaction_date: now.date_naive(),
            category_id,
            description,
            notes: None,
            tags: Vec::new(),
            payment_method,
            from_account_id: None,
            to_account_id: None,
            upi_provider_id: None,
            upi_transaction_id: None,
            card_last_four_digits: None,
            cheque_number: None,
            reference_number: None,
            contact_id: None,
            due_date: None,
            is_paid: false,
            is_recurring: false,
            recurring_config: None,
            is_tax_deductible: false,
            tax_category: None,
            location: None,
            attachments: Vec::new(),
            splits: Vec::new(),
            transfer_fee: 0.0,
            linked_transaction_id: None,
            created_by: None,
            is_deleted: false,
            is_duplicate: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the currency code.
    #[must_use]
    pub fn with_currency(mut self, currency: String) -> Self {
        self.currency = currency;
        self
    }

    /// Set the transaction date.
    #[must_use]
    pub fn with_transaction_date(mut self, date: NaiveDate) -> Self {
        self.transaction_date = date;
        self
    }

    /// Set free-form notes.
    #[must_use]
    pub fn with_notes(mut self, notes: String) -> Self {
        self.notes = Some(notes);
        self
    }

    /// Set tags, lowercasing and dropping blanks.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags
            .into_iter()
            .map(|tag| tag.trim().to_lowercase())
            .filter(|tag| !tag.is_empty())
            .collect();
        self
    }

    /// Set the account money left.
    #[must_use]
    pub fn with_from_account(mut self, account_id: String) -> Self {
        self.from_account_id = Some(account_id);
        self
    }

    /// Set the account money arrived in.
    #[must_use]
    pub fn with_to_account(mut self, account_id: String) -> Self {
        self.to_account_id = Some(account_id);
        self
    }

    /// Set the debt counterparty.
    #[must_use]
    pub fn with_contact(mut self, contact_id: String) -> Self {
        self.contact_id = Some(contact_id);
        self
    }

    /// Set when a debt falls due.
    #[must_use]
    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Attach a recurrence schedule and mark the transaction recurring.
    #[must_use]
    pub fn with_recurring(mut self, config: RecurringConfig) -> Self {
        self.is_recurring = true;
        self.recurring_config = Some(config);
        self
    }

    /// Set where it happened.
    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Add an attachment.
    #[must_use]
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Add a split share.
    #[must_use]
    pub fn with_split(mut self, split: SplitShare) -> Self {
        self.splits.push(split);
        self
    }

    /// Set the transfer fee.
    ///
    /// # Panics
    /// Panics if the fee is negative.
    #[must_use]
    pub fn with_transfer_fee(mut self, fee: f64) -> Self {
        assert!(fee >= 0.0, "transfer fee cannot be negative");
        self.transfer_fee = fee;
        self
    }

    /// Record who created it.
    #[must_use]
    pub fn with_created_by(mut self, user_id: String) -> Self {
        self.created_by = Some(user_id);
        self
    }

    /// Whether this transaction involves a debt contact.
    #[must_use]
    pub fn is_debt(&self) -> bool {
        self.transaction_type.is_debt()
    }

    /// Whether this transaction moves money between own accounts.
    #[must_use]
    pub fn is_transfer(&self) -> bool {
        self.transaction_type == TransactionType::Transfer
    }
}

// =============================================================================
// Category
// =============================================================================

/// A bucket transactions are classified into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    /// Primary key, assigned on first save
    #[serde(default)]
    pub pk: String,
    /// Sort key, assigned on first save
    #[serde(default)]
    pub sk: String,
    /// Display name
    pub name: String,
    /// Income or expense side
    pub category_type: CategoryType,
    /// Icon identifier for clients
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Display color (hex)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Parent category for subcategories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Soft-deletion marker
    #[serde(default)]
    pub is_deleted: bool,
    /// Creation timestamp
    #[serde(with = "datetime")]
    pub created_at: DateTime<Utc>,
    /// Last-write timestamp
    #[serde(with = "datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Category {
    /// Create a category.
    ///
    /// # Panics
    /// Panics if the name is empty.
    #[must_use]
    pub fn new(name: String, category_type: CategoryType) -> Self {
        assert!(!name.is_empty(), "name cannot be empty");

        let now = Utc::now();
        Self {
            pk: String::new(),
            sk: String::new(),
            name,
            category_type,
            icon: None,
            color: None,
            parent_id: None,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the icon identifier.
    #[must_use]
    pub fn with_icon(mut self, icon: String) -> Self {
        self.icon = Some(icon);
        self
    }

    /// Set the display color.
    #[must_use]
    pub fn with_color(mut self, color: String) -> Self {
        self.color = Some(color);
        self
    }

    /// Make this a subcategory of `parent_id`.
    #[must_use]
    pub fn with_parent(mut self, parent_id: String) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

// =============================================================================
// Account
// =============================================================================

/// A place money lives (bank account, card, cash, wallet).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Primary key, assigned on first save
    #[serde(default)]
    pub pk: String,
    /// Sort key, assigned on first save
    #[serde(default)]
    pub sk: String,
    /// Display name
    pub name: String,
    /// Kind of account
    pub account_type: AccountType,
    /// Current balance
    #[serde(default)]
    pub balance: f64,
    /// ISO 4217 currency code
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Preselected account in clients
    #[serde(default)]
    pub is_default: bool,
    /// Soft-deletion marker
    #[serde(default)]
    pub is_deleted: bool,
    /// Creation timestamp
    #[serde(with = "datetime")]
    pub created_at: DateTime<Utc>,
    /// Last-write timestamp
    #[serde(with = "datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create an account with zero balance.
    ///
    /// # Panics
    /// Panics if the name is empty.
    #[must_use]
    pub fn new(name: String, account_type: AccountType) -> Self {
        assert!(!name.is_empty(), "name cannot be empty");

        let now = Utc::now();
        Self {
            pk: String::new(),
            sk: String::new(),
            name,
            account_type,
            balance: 0.0,
            currency: default_currency(),
            is_default: false,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the opening balance.
    #[must_use]
    pub fn with_balance(mut self, balance: f64) -> Self {
        self.balance = balance;
        self
    }

    /// Set the currency code.
    #[must_use]
    pub fn with_currency(mut self, currency: String) -> Self {
        self.currency = currency;
        self
    }
}

// =============================================================================
// Contact
// =============================================================================

/// A person money is owed to or by.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    /// Primary key, assigned on first save
    #[serde(default)]
    pub pk: String,
    /// Sort key, assigned on first save
    #[serde(default)]
    pub sk: String,
    /// Display name
    pub name: String,
    /// Phone number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Email address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Known UPI handles
    #[serde(default)]
    pub upi_ids: Vec<String>,
    /// Soft-deletion marker
    #[serde(default)]
    pub is_deleted: bool,
    /// Creation timestamp
    #[serde(with = "datetime")]
    pub created_at: DateTime<Utc>,
    /// Last-write timestamp
    #[serde(with = "datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    /// Create a contact.
    ///
    /// # Panics
    /// Panics if the name is empty.
    #[must_use]
    pub fn new(name: String) -> Self {
        assert!(!name.is_empty(), "name cannot be empty");

        let now = Utc::now();
        Self {
            pk: String::new(),
            sk: String::new(),
            name,
            phone: None,
            email: None,
            upi_ids: Vec::new(),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the phone number.
    #[must_use]
    pub fn with_phone(mut self, phone: String) -> Self {
        self.phone = Some(phone);
        self
    }

    /// Set the email address.
    #[must_use]
    pub fn with_email(mut self, email: String) -> Self {
        self.email = Some(email);
        self
    }

    /// Add a known UPI handle.
    #[must_use]
    pub fn with_upi_id(mut self, upi_id: String) -> Self {
        self.upi_ids.push(upi_id);
        self
    }
}

// =============================================================================
// Budget
// =============================================================================

/// A spending limit over a period, across one or more categories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    /// Primary key, assigned on first save
    #[serde(default)]
    pub pk: String,
    /// Sort key, assigned on first save
    #[serde(default)]
    pub sk: String,
    /// Display name
    pub name: String,
    /// Limit in `currency` units
    pub amount: f64,
    /// First day of the period
    pub period_start: NaiveDate,
    /// Last day of the period
    pub period_end: NaiveDate,
    /// Categories the limit covers; empty means all
    #[serde(default)]
    pub category_ids: Vec<String>,
    /// ISO 4217 currency code
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Soft-deletion marker
    #[serde(default)]
    pub is_deleted: bool,
    /// Creation timestamp
    #[serde(with = "datetime")]
    pub created_at: DateTime<Utc>,
    /// Last-write timestamp
    #[serde(with = "datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Budget {
    /// Create a budget covering all categories.
    ///
    /// # Panics
    /// Panics if the name is empty, the amount is not positive, or the
    /// period ends before it starts.
    #[must_use]
    pub fn new(name: String, amount: f64, period_start: NaiveDate, period_end: NaiveDate) -> Self {
        // Preconditions
        assert!(!name.is_empty(), "name cannot be empty");
        assert!(amount > 0.0, "amount must be positive");
        assert!(period_end >= period_start, "period cannot end before it starts");

        let now = Utc::now();
        Self {
            pk: String::new(),
            sk: String::new(),
            name,
            amount,
            period_start,
            period_end,
            category_ids: Vec::new(),
            currency: default_currency(),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Restrict the budget to specific categories.
    #[must_use]
    pub fn with_categories(mut self, category_ids: Vec<String>) -> Self {
        self.category_ids = category_ids;
        self
    }
}

// =============================================================================
// UpiProvider
// =============================================================================

/// A UPI app known to clients (for picking payment apps and parsing handles).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpiProvider {
    /// Primary key, assigned on first save
    #[serde(default)]
    pub pk: String,
    /// Sort key, assigned on first save
    #[serde(default)]
    pub sk: String,
    /// Display name
    pub name: String,
    /// Android package name
    pub package_name: String,
    /// Handle suffixes this provider issues, e.g. `@okaxis`
    #[serde(default)]
    pub handle_suffixes: Vec<String>,
    /// Whether clients should offer this provider
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Creation timestamp
    #[serde(with = "datetime")]
    pub created_at: DateTime<Utc>,
    /// Last-write timestamp
    #[serde(with = "datetime")]
    pub updated_at: DateTime<Utc>,
}

impl UpiProvider {
    /// Create an active provider.
    ///
    /// # Panics
    /// Panics if the name or package name is empty.
    #[must_use]
    pub fn new(name: String, package_name: String) -> Self {
        // Preconditions
        assert!(!name.is_empty(), "name cannot be empty");
        assert!(!package_name.is_empty(), "package name cannot be empty");

        let now = Utc::now();
        Self {
            pk: String::new(),
            sk: String::new(),
            name,
            package_name,
            handle_suffixes: Vec::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a handle suffix this provider issues.
    #[must_use]
    pub fn with_handle_suffix(mut self, suffix: String) -> Self {
        self.handle_suffixes.push(suffix);
        self
    }
}

// =============================================================================
// Store bindings
// =============================================================================

impl_model!(Transaction, "transactions");
impl_model!(Category, "categories");
impl_model!(Account, "accounts");
impl_model!(Contact, "contacts");
impl_model!(Budget, "budgets");
impl_model!(UpiProvider, "upi_providers");

fn default_currency() -> String {
    TRANSACTION_CURRENCY_DEFAULT.to_string()
}

fn default_true() -> bool {
    true
}

fn default_interval() -> u32 {
    1
}
