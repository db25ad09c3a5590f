use std::fs;
use std::path::Path;

use csv::ReaderBuilder;
use serde_json::{Map, Value};

use crate::error::ConvertError;
use crate::model::Tabular;

pub type TabularConverter = fn(&Path) -> Result<Tabular, ConvertError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Tsv,
    Txt,
    Json,
    /// Bank statement laid out on a fixed column template.
    Pdf,
}

impl SourceFormat {
    pub const ALL: [SourceFormat; 5] = [
        SourceFormat::Csv,
        SourceFormat::Tsv,
        SourceFormat::Txt,
        SourceFormat::Json,
        SourceFormat::Pdf,
    ];

    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "tsv" => Some(Self::Tsv),
            "txt" => Some(Self::Txt),
            "json" => Some(Self::Json),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConvertError> {
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .unwrap_or_default();
        Self::from_extension(extension)
            .ok_or_else(|| ConvertError::UnsupportedFormat(format!("'{extension}'")))
    }

    /// Converter for the plain tabular formats; `None` for statement PDFs,
    /// which go through record reconstruction instead.
    #[must_use]
    pub fn tabular_converter(self) -> Option<TabularConverter> {
        match self {
            Self::Csv => Some(convert_csv),
            Self::Tsv => Some(convert_tsv),
            Self::Txt => Some(convert_txt),
            Self::Json => Some(convert_json),
            Self::Pdf => None,
        }
    }

    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Tsv => "tsv",
            Self::Txt => "txt",
            Self::Json => "json",
            Self::Pdf => "pdf",
        }
    }
}

fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{FEFF}').unwrap_or(text)
}

fn cell(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_delimited(text: &str, delimiter: u8) -> Result<Tabular, ConvertError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(strip_bom(text).as_bytes());

    let headers = reader
        .headers()?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(cell).collect());
    }

    Ok(Tabular { headers, rows })
}

fn read_text(path: &Path) -> Result<String, ConvertError> {
    let text = fs::read_to_string(path)?;
    if strip_bom(&text).trim().is_empty() {
        return Err(ConvertError::EmptyInput(path.display().to_string()));
    }
    Ok(text)
}

pub fn convert_csv(path: &Path) -> Result<Tabular, ConvertError> {
    parse_delimited(&read_text(path)?, b',')
}

pub fn convert_tsv(path: &Path) -> Result<Tabular, ConvertError> {
    parse_delimited(&read_text(path)?, b'\t')
}

/// A delimiter fits when every row has the header's width and that width is
/// at least two.
fn consistent(table: &Tabular) -> bool {
    let width = table.headers.len();
    width >= 2 && table.rows.iter().all(|row| row.len() == width)
}

/// Tries comma, then tab; otherwise one `Content` row per line.
pub fn convert_txt(path: &Path) -> Result<Tabular, ConvertError> {
    let text = read_text(path)?;
    for delimiter in [b',', b'\t'] {
        if let Ok(table) = parse_delimited(&text, delimiter)
            && consistent(&table)
        {
            return Ok(table);
        }
    }

    Ok(Tabular {
        headers: vec!["Content".to_string()],
        rows: strip_bom(&text)
            .lines()
            .map(|line| vec![cell(line)])
            .collect(),
    })
}

fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => cell(text),
        Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_) => {
            Some(value.to_string())
        }
    }
}

fn objects_to_table(objects: &[Map<String, Value>]) -> Tabular {
    let mut headers: Vec<String> = Vec::new();
    for object in objects {
        for key in object.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let rows = objects
        .iter()
        .map(|object| {
            headers
                .iter()
                .map(|key| object.get(key).and_then(render_value))
                .collect()
        })
        .collect();

    Tabular { headers, rows }
}

fn array_to_table(items: &[Value]) -> Result<Tabular, ConvertError> {
    if items.iter().all(Value::is_object) {
        let objects = items
            .iter()
            .filter_map(Value::as_object)
            .cloned()
            .collect::<Vec<_>>();
        return Ok(objects_to_table(&objects));
    }

    if items.iter().any(|item| item.is_object() || item.is_array()) {
        return Err(ConvertError::InvalidJson(
            "array mixes objects with other values".to_string(),
        ));
    }

    Ok(Tabular {
        headers: vec!["value".to_string()],
        rows: items.iter().map(|item| vec![render_value(item)]).collect(),
    })
}

/// Arrays of objects become one row per object. For a top-level object the
/// first array-valued field is used, falling back to the object itself as a
/// single row.
pub fn convert_json(path: &Path) -> Result<Tabular, ConvertError> {
    let text = read_text(path)?;
    let value: Value = serde_json::from_str(strip_bom(&text))?;
    match value {
        Value::Array(items) => array_to_table(&items),
        Value::Object(object) => {
            if let Some(items) = object.values().find_map(Value::as_array) {
                return array_to_table(items);
            }
            Ok(objects_to_table(&[object]))
        }
        other => Err(ConvertError::InvalidJson(format!(
            "top-level value must be an array or object, got {other}"
        ))),
    }
}
