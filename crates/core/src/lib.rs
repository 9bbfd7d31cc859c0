pub mod field;
pub mod form;
pub mod money;
pub mod period;
pub mod tariff;

pub use field::{BillField, Confidence, FieldCandidate};
pub use form::BillForm;
pub use money::Mxn;
pub use period::{format_bill_date, month_from_abbr, parse_bill_date, BillingPeriod};
pub use tariff::{normalize_tariff_code, Tariff};
