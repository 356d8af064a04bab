use crate::types::DataType;

/// Maps remote field tags to a data type.
///
/// Precedence is fixed: date-like tags win over text, text over integer, integer over
/// numeric.
pub fn classify<S: AsRef<str>>(tags: &[S]) -> DataType {
    let has = |tag: &str| tags.iter().any(|t| t.as_ref() == tag);

    if has("$timestamp") || has("$date") {
        DataType::Date
    } else if has("$text") {
        DataType::Text
    } else if has("$integer") {
        DataType::Int
    } else if has("$numeric") {
        DataType::Decimal
    } else {
        DataType::Unknown
    }
}
