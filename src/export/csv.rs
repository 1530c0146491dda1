use super::{ExportError, cell_text};
use crate::definitions::FieldConfig;
use crate::search::{Row, SearchType};

#[must_use]
pub fn csv_file_name(search_type: SearchType) -> String {
    format!("{}Search.csv", search_type.slug())
}

/// Header row of column headers, then one line per row.
///
/// Fields are quoted only when they contain a comma, a quote or a line break, with embedded
/// quotes doubled.
///
/// # Errors
/// Fails only if the writer cannot produce UTF-8.
pub fn export_csv(fields: &[FieldConfig], rows: &[Row]) -> Result<String, ExportError> {
    let mut writer = ::csv::WriterBuilder::new()
        .quote_style(::csv::QuoteStyle::Necessary)
        .terminator(::csv::Terminator::CRLF)
        .from_writer(Vec::new());

    let format_err = |err: ::csv::Error| ExportError::Format(err.to_string());
    writer
        .write_record(fields.iter().map(FieldConfig::header))
        .map_err(format_err)?;
    for row in rows {
        writer
            .write_record(
                fields
                    .iter()
                    .map(|field| row.get(&field.name).map(cell_text).unwrap_or_default()),
            )
            .map_err(format_err)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| ExportError::Format(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| ExportError::Format(err.to_string()))
}
