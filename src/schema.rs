//! Column names and labels shared by every stage

pub const INVOICE: &str = "Invoice";
pub const STOCK_CODE: &str = "StockCode";
pub const DESCRIPTION: &str = "Description";
pub const QUANTITY: &str = "Quantity";
pub const INVOICE_DATE: &str = "InvoiceDate";
pub const COUNTRY: &str = "Country";

/// Price column as it appears in the raw source
pub const RAW_PRICE: &str = "Price";
/// Customer column as it appears in the raw source
pub const RAW_CUSTOMER_ID: &str = "Customer ID";

pub const UNIT_PRICE: &str = "UnitPrice";
pub const CUSTOMER_ID: &str = "CustomerID";

pub const WEEKDAY: &str = "Weekday";
pub const YEAR: &str = "Year";
pub const MONTH: &str = "Month";
pub const DAY: &str = "Day";
pub const TIME: &str = "Time";
pub const TOTAL_PRICE: &str = "TotalPrice";
pub const TYPE: &str = "Type";

/// Columns every raw table must carry, in canonical order
pub const RAW_COLUMNS: [&str; 8] = [
    INVOICE,
    STOCK_CODE,
    DESCRIPTION,
    QUANTITY,
    INVOICE_DATE,
    RAW_PRICE,
    RAW_CUSTOMER_ID,
    COUNTRY,
];

/// Column order of the clean table
pub const CLEAN_COLUMNS: [&str; 8] = [
    INVOICE,
    STOCK_CODE,
    DESCRIPTION,
    QUANTITY,
    INVOICE_DATE,
    UNIT_PRICE,
    CUSTOMER_ID,
    COUNTRY,
];

/// Column order of the enriched table
pub const ENRICHED_COLUMNS: [&str; 15] = [
    INVOICE,
    TYPE,
    INVOICE_DATE,
    WEEKDAY,
    YEAR,
    MONTH,
    DAY,
    TIME,
    CUSTOMER_ID,
    COUNTRY,
    STOCK_CODE,
    DESCRIPTION,
    QUANTITY,
    UNIT_PRICE,
    TOTAL_PRICE,
];

/// Sentinel for an unknown customer
pub const UNKNOWN_CUSTOMER: i64 = 0;

/// Invoice prefix marking a cancellation
pub const CANCELLATION_PREFIX: &str = "C";

/// Transaction classification assigned during enrichment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionType {
    Sale,
    Return,
    Cancellation,
}

impl TransactionType {
    pub const ALL: [Self; 3] = [Self::Sale, Self::Return, Self::Cancellation];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sale => "Sale",
            Self::Return => "Return",
            Self::Cancellation => "Cancellation",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
