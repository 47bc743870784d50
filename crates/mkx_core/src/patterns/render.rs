//! Placeholder substitution for output filenames.
//!
//! Templates are literal text mixed with `{Name}` or `{Name:FORMAT}`
//! tokens. Unknown tokens, and tokens that have no value for the segment
//! being named, are copied through verbatim.

use crate::models::Segment;

use super::types::FileContext;

/// A resolved placeholder value.
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    /// Inserted without sanitizing.
    Raw(String),
}

/// Render a template for one segment.
///
/// Pure: identical inputs always produce identical output.
pub fn render(template: &str, segment: &Segment, ctx: &FileContext) -> String {
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let close = match after.find(['{', '}']) {
            Some(i) if after.as_bytes()[i] == b'}' => i,
            // Unterminated or nested brace: emit the '{' as literal text
            _ => {
                out.push('{');
                rest = after;
                continue;
            }
        };

        let token = &after[..close];
        let (name, format) = match token.split_once(':') {
            Some((n, f)) => (n, Some(f)),
            None => (token, None),
        };

        match resolve(name, segment, ctx) {
            Some(value) => out.push_str(&format_value(&value, format)),
            None => {
                out.push('{');
                out.push_str(token);
                out.push('}');
            }
        }

        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}

fn resolve(name: &str, segment: &Segment, ctx: &FileContext) -> Option<Value> {
    match name {
        "FilenameNoExt" => return Some(Value::Text(ctx.file_stem())),
        "Filename" => return Some(Value::Text(ctx.file_name())),
        "DirSeparator" => return Some(Value::Raw(std::path::MAIN_SEPARATOR.to_string())),
        _ => {}
    }

    match segment {
        Segment::Track(t) => match name {
            "TrackNumber" => Some(Value::Int(t.number as i64)),
            "TrackID" => Some(Value::Int(t.id as i64)),
            "TrackName" => Some(Value::Text(t.name.clone())),
            "Language" => Some(Value::Text(t.language.clone())),
            "LanguageIETF" => t.language_ietf.clone().map(Value::Text),
            "CodecID" => Some(Value::Text(t.codec_id.clone())),
            "Delay" => Some(Value::Int(t.delay_ms)),
            "EffectiveDelay" => Some(Value::Int(t.effective_delay_ms)),
            "TrackForced" => Some(Value::Int(i64::from(t.forced))),
            "PixelWidth" => t.pixel_width.map(|v| Value::Int(i64::from(v))),
            "PixelHeight" => t.pixel_height.map(|v| Value::Int(i64::from(v))),
            "SamplingFrequency" => t.sampling_frequency.map(Value::Float),
            "Channels" => t.channels.map(|v| Value::Int(i64::from(v))),
            _ => None,
        },
        Segment::Attachment(a) => match name {
            "AttachmentID" => Some(Value::Int(a.id as i64)),
            "AttachmentFilename" => Some(Value::Text(a.file_name.clone())),
            "MimeType" => Some(Value::Text(a.mime_type.clone())),
            "AttachmentFileSize" => Some(Value::Int(a.size as i64)),
            _ => None,
        },
        Segment::Chapter(_) | Segment::Info(_) => None,
    }
}

/// Zero-padding width for a format token (`0`, `00` or `000`).
fn pad_width(format: Option<&str>) -> Option<usize> {
    match format {
        Some("0") => Some(1),
        Some("00") => Some(2),
        Some("000") => Some(3),
        _ => None,
    }
}

fn format_value(value: &Value, format: Option<&str>) -> String {
    match value {
        Value::Int(v) => match pad_width(format) {
            Some(width) => format!("{:0width$}", v, width = width),
            None => v.to_string(),
        },
        // Formatting is locale independent: '.' decimal point, no grouping
        Value::Float(v) => {
            if v.is_finite() && v.fract() == 0.0 {
                format!("{}", *v as i64)
            } else {
                sanitize(&v.to_string())
            }
        }
        Value::Text(s) => sanitize(s),
        Value::Raw(s) => s.clone(),
    }
}

/// Replace characters that are illegal in file names with `_`.
pub fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            _ => c,
        })
        .collect()
}
