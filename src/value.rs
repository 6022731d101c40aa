//! Row representation and field-splitting.

use regex::Regex;

/// A single parsed record: exactly `column_count` string fields.
///
/// Missing trailing fields are empty strings; fields beyond `column_count`
/// are merged into the last one, matching a bounded (limited) split.
pub type Row = Vec<String>;

/// Splits `line` on `delimiter` into exactly `column_count` fields.
///
/// This is a bounded split: once `column_count - 1` delimiters have been
/// consumed, whatever remains of `line` becomes the last field verbatim
/// (so a field's content can itself contain characters the delimiter regex
/// would otherwise match, as long as it's past the last real boundary).
/// Missing trailing fields are padded with empty strings.
pub fn split_bounded(line: &str, delimiter: &Regex, column_count: usize) -> Row {
    if column_count == 0 {
        return Vec::new();
    }

    let mut fields: Row = Vec::with_capacity(column_count);
    let mut rest = line;

    while fields.len() + 1 < column_count {
        match delimiter.find(rest) {
            Some(m) => {
                fields.push(rest[..m.start()].to_string());
                rest = &rest[m.end()..];
            }
            None => break,
        }
    }

    fields.push(rest.to_string());

    while fields.len() < column_count {
        fields.push(String::new());
    }

    fields
}

/// Extends `row` with the schema's constant-valued columns, so downstream
/// consumers see them as ordinary trailing fields.
pub fn with_constants(mut row: Row, constants: &[String]) -> Row {
    row.extend(constants.iter().cloned());
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    fn re(pattern: &str) -> Regex {
        Regex::new(pattern).unwrap()
    }

    #[test]
    fn splits_exact_field_count() {
        let row = split_bounded("1,Alice,30", &re(r"\s*,\s*"), 3);
        assert_eq!(row, vec!["1", "Alice", "30"]);
    }

    #[test]
    fn pads_missing_trailing_fields() {
        let row = split_bounded("1,Alice", &re(r"\s*,\s*"), 3);
        assert_eq!(row, vec!["1", "Alice", ""]);
    }

    #[test]
    fn merges_extra_fields_into_last() {
        let row = split_bounded("1,Alice,30,extra,more", &re(r"\s*,\s*"), 3);
        assert_eq!(row, vec!["1", "Alice", "30,extra,more"]);
    }

    #[test]
    fn trims_whitespace_around_delimiter() {
        let row = split_bounded("1 ,  Alice ,30", &re(r"\s*,\s*"), 3);
        assert_eq!(row, vec!["1", "Alice", "30"]);
    }

    #[test]
    fn appends_constant_columns() {
        let row = with_constants(vec!["1".into(), "Alice".into()], &["public".into()]);
        assert_eq!(row, vec!["1", "Alice", "public"]);
    }
}
