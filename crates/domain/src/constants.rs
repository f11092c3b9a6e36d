//! Domain constants
//!
//! Field-name fallback chains for source documents and the fixed codes used
//! when talking to the target ledger.

// Source document field chains, in priority order.
pub const DATE_FIELDS: [&str; 4] = ["documentDate", "issueDate", "invoiceDate", "dateCreated"];
pub const AMOUNT_FIELDS: [&str; 4] = ["totalAmount", "amount", "totalPrice", "total"];
pub const DOCUMENT_NUMBER_FIELDS: [&str; 2] = ["documentNumber", "invoiceNumber"];
pub const EXTERNAL_ID_FIELD: &str = "eic";
pub const BUYER_NAME_FIELD: &str = "buyerName";
pub const BUYER_TAX_ID_FIELD: &str = "buyerTaxId";
pub const SELLER_NAME_FIELD: &str = "sellerName";
pub const SELLER_TAX_ID_FIELD: &str = "sellerTaxId";
pub const VAT_RATE_FIELD: &str = "vatRate";
pub const PDF_FIELD: &str = "pdf";

/// Counterparty used when a sales document carries no buyer.
pub const DEFAULT_CUSTOMER_NAME: &str = "Retail Customer";
/// Counterparty used when a purchase document carries no seller.
pub const DEFAULT_VENDOR_NAME: &str = "Unknown Vendor";

// Target ledger limits and codes
pub const MAX_EXTERNAL_ID_LENGTH: usize = 31;
pub const NON_TAXABLE_CODE: &str = "NON";
pub const TAXABLE_CODE: &str = "TAX";
pub const EXTERNAL_ID_FIELD_NAME: &str = "EIC";

/// Tokens expiring within this window are refreshed before a job starts.
pub const TOKEN_REFRESH_WINDOW_SECS: i64 = 600;

pub const DEFAULT_SALES_ITEM_ID: &str = "1";
pub const DEFAULT_EXPENSE_ACCOUNT_ID: &str = "1";
