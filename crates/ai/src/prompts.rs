//! Prompt builder.
//!
//! Every structured tool has one static field table. The table renders the
//! schema description embedded in the prompt, the `responseSchema` sent in
//! structured mode, and a sample document the tests deserialize into the
//! matching payload type, so the three can't drift apart.

use serde_json::{json, Map, Value};

use crate::catalog;
use crate::error::AiError;
use crate::tools::video::extract_video_id;
use crate::types::{ToolKind, ToolRequest};

// ============================================================================
// Schema Tables
// ============================================================================

/// Primitive or nested type of a schema field.
#[derive(Debug, Clone, Copy)]
pub enum FieldType {
    String,
    Number,
    StringList,
    Object(&'static [SchemaField]),
    ObjectList(&'static [SchemaField]),
}

/// One named field of a tool's JSON payload.
#[derive(Debug, Clone, Copy)]
pub struct SchemaField {
    pub name: &'static str,
    pub ty: FieldType,
    pub required: bool,
    /// Example value or short guidance shown to the model.
    pub hint: &'static str,
}

const fn field(name: &'static str, ty: FieldType, hint: &'static str) -> SchemaField {
    SchemaField {
        name,
        ty,
        required: true,
        hint,
    }
}

const fn optional(name: &'static str, ty: FieldType, hint: &'static str) -> SchemaField {
    SchemaField {
        name,
        ty,
        required: false,
        hint,
    }
}

const CURRENT_WEATHER_FIELDS: &[SchemaField] = &[
    field("temp_c", FieldType::Number, "Celsius"),
    field("condition", FieldType::String, "e.g. Partly cloudy"),
    field("humidity", FieldType::Number, "percent"),
    field("wind_kph", FieldType::Number, ""),
    field("feels_like_c", FieldType::Number, "Celsius"),
];

const FORECAST_DAY_FIELDS: &[SchemaField] = &[
    field("date", FieldType::String, "Day"),
    field("max_temp_c", FieldType::Number, ""),
    field("min_temp_c", FieldType::Number, ""),
    field("condition", FieldType::String, ""),
];

pub const WEATHER_FIELDS: &[SchemaField] = &[
    field("location", FieldType::String, "City, Country"),
    field("current", FieldType::Object(CURRENT_WEATHER_FIELDS), ""),
    field("forecast", FieldType::ObjectList(FORECAST_DAY_FIELDS), "5 days"),
    field("summary", FieldType::String, "Short summary"),
];

pub const VIDEO_FIELDS: &[SchemaField] = &[
    field("title", FieldType::String, "Exact video title"),
    field("channel", FieldType::String, "Channel name"),
    field("views", FieldType::String, "View count (approx)"),
    field("description", FieldType::String, "Short description, max 150 chars"),
];

pub const TRANSLATION_FIELDS: &[SchemaField] = &[
    field("translatedText", FieldType::String, ""),
    optional("detectedLanguage", FieldType::String, "Source language name"),
];

pub const MATH_FIELDS: &[SchemaField] = &[
    field("topic", FieldType::String, "e.g. Calculus"),
    field("result", FieldType::String, "Final answer"),
    field("steps", FieldType::StringList, "One explanation per step"),
];

pub const RECIPE_FIELDS: &[SchemaField] = &[
    field("title", FieldType::String, "Recipe title"),
    field("description", FieldType::String, "Short appetizing description"),
    field("ingredients", FieldType::StringList, "With quantities"),
    field("instructions", FieldType::StringList, "One step per entry"),
    field("prepTime", FieldType::String, "e.g. 30 mins"),
    field("calories", FieldType::String, "e.g. 500 kcal"),
];

/// Field table for a tool; `None` for image, which has no JSON payload.
pub fn schema_for(kind: ToolKind) -> Option<&'static [SchemaField]> {
    match kind {
        ToolKind::Weather => Some(WEATHER_FIELDS),
        ToolKind::Video => Some(VIDEO_FIELDS),
        ToolKind::Translate => Some(TRANSLATION_FIELDS),
        ToolKind::Math => Some(MATH_FIELDS),
        ToolKind::Recipe => Some(RECIPE_FIELDS),
        ToolKind::Image => None,
    }
}

/// Human-readable schema description embedded in prompts.
pub fn describe_schema(fields: &[SchemaField]) -> String {
    let mut out = String::new();
    write_object(&mut out, fields, 0);
    out
}

fn write_object(out: &mut String, fields: &[SchemaField], depth: usize) {
    out.push_str("{\n");
    for (i, f) in fields.iter().enumerate() {
        out.push_str(&"  ".repeat(depth + 1));
        out.push('"');
        out.push_str(f.name);
        out.push_str("\": ");
        match f.ty {
            FieldType::String => out.push_str("string"),
            FieldType::Number => out.push_str("number"),
            FieldType::StringList => out.push_str("[string]"),
            FieldType::Object(inner) => write_object(out, inner, depth + 1),
            FieldType::ObjectList(inner) => {
                out.push('[');
                write_object(out, inner, depth + 1);
                out.push(']');
            }
        }
        if i + 1 < fields.len() {
            out.push(',');
        }
        let mut notes = Vec::new();
        if !f.required {
            notes.push("optional");
        }
        if !f.hint.is_empty() {
            notes.push(f.hint);
        }
        if !notes.is_empty() {
            out.push_str(" // ");
            out.push_str(&notes.join(", "));
        }
        out.push('\n');
    }
    out.push_str(&"  ".repeat(depth));
    out.push('}');
}

/// Gemini `responseSchema` (OpenAPI subset) for structured mode.
pub fn response_schema(fields: &[SchemaField]) -> Value {
    let mut properties = Map::new();
    for f in fields {
        properties.insert(f.name.to_string(), field_schema(f.ty));
    }
    let required: Vec<&str> = fields.iter().filter(|f| f.required).map(|f| f.name).collect();
    let ordering: Vec<&str> = fields.iter().map(|f| f.name).collect();
    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": required,
        "propertyOrdering": ordering,
    })
}

fn field_schema(ty: FieldType) -> Value {
    match ty {
        FieldType::String => json!({ "type": "STRING" }),
        FieldType::Number => json!({ "type": "NUMBER" }),
        FieldType::StringList => json!({ "type": "ARRAY", "items": { "type": "STRING" } }),
        FieldType::Object(inner) => response_schema(inner),
        FieldType::ObjectList(inner) => json!({ "type": "ARRAY", "items": response_schema(inner) }),
    }
}

/// A document that satisfies the table, with every optional field present.
pub fn sample_document(fields: &[SchemaField]) -> Value {
    let mut doc = Map::new();
    for f in fields {
        let value = match f.ty {
            FieldType::String => json!("sample"),
            FieldType::Number => json!(1.5),
            FieldType::StringList => json!(["sample"]),
            FieldType::Object(inner) => sample_document(inner),
            FieldType::ObjectList(inner) => json!([sample_document(inner)]),
        };
        doc.insert(f.name.to_string(), value);
    }
    Value::Object(doc)
}

// ============================================================================
// Prompts
// ============================================================================

const JSON_ONLY: &str = "Return VALID JSON ONLY, matching the schema below. \
Do not wrap the JSON in Markdown code blocks and do not add any other text.";

/// Quote user input as a JSON string literal so it can't break the prompt.
fn quoted(input: &str) -> String {
    Value::String(input.trim().to_string()).to_string()
}

fn with_schema(task: String, fields: &[SchemaField]) -> String {
    format!("{}\n{}\nSchema:\n{}", task, JSON_ONLY, describe_schema(fields))
}

pub fn weather_prompt(query: &str) -> String {
    with_schema(
        format!(
            "Get the real-time weather and a 5-day forecast for: {}.\n\
Use Google Search to get current data.",
            quoted(query)
        ),
        WEATHER_FIELDS,
    )
}

pub fn video_prompt(video_id: &str) -> String {
    with_schema(
        format!(
            "Search for the YouTube video with ID {}.\n\
I need the exact details for this specific video.",
            quoted(video_id)
        ),
        VIDEO_FIELDS,
    )
}

pub fn translate_prompt(text: &str, target_language: &str) -> String {
    with_schema(
        format!(
            "Translate the input to {}. Detect the source language.\nInput: {}",
            target_language.trim(),
            quoted(text)
        ),
        TRANSLATION_FIELDS,
    )
}

pub fn math_prompt(problem: &str) -> String {
    with_schema(
        format!("Solve this math problem step-by-step: {}.", quoted(problem)),
        MATH_FIELDS,
    )
}

pub fn recipe_prompt(dish: &str) -> String {
    with_schema(
        format!("Create a detailed cooking recipe for: {}.", quoted(dish)),
        RECIPE_FIELDS,
    )
}

/// Image prompts are the user's description as-is.
pub fn image_prompt(description: &str) -> String {
    description.trim().to_string()
}

/// Build the prompt for a tool request. Every executor goes through here.
///
/// Fails with `InvalidInput` on blank input or an unusable video reference.
/// A translate request without a target language uses the catalog default.
pub fn build_prompt(request: &ToolRequest) -> Result<String, AiError> {
    let input = request.input.trim();
    if input.is_empty() {
        return Err(AiError::invalid_input(format!(
            "Input for {} must not be empty",
            request.kind
        )));
    }

    let prompt = match request.kind {
        ToolKind::Weather => weather_prompt(input),
        ToolKind::Video => {
            let video_id = extract_video_id(input)
                .ok_or_else(|| AiError::invalid_input("Not a valid YouTube video URL or id"))?;
            video_prompt(&video_id)
        }
        ToolKind::Translate => translate_prompt(input, &target_language(request)),
        ToolKind::Math => math_prompt(input),
        ToolKind::Recipe => recipe_prompt(input),
        ToolKind::Image => image_prompt(input),
    };
    Ok(prompt)
}

/// Requested target language, or the catalog default.
pub fn target_language(request: &ToolRequest) -> String {
    request
        .target_language
        .as_deref()
        .map(str::trim)
        .filter(|lang| !lang.is_empty())
        .unwrap_or(catalog::default_target_language())
        .to_string()
}
