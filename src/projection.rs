//! Sparse, relation-aware projections of recipes driven by the `select` and
//! `include` query parameters.
//!
//! Parsing validates the raw parameters up front; shaping is pure and works on
//! an intermediate [`Document`] so the same code serves single recipes and lists.

use std::collections::BTreeSet;

use serde_json::{json, Map, Value};

use crate::catalog::RecipeAggregate;
use crate::error::{AppError, AppResult};

/// JSON object produced for one recipe.
pub type Document = Map<String, Value>;

pub type FieldSet = BTreeSet<BaseField>;
pub type IncludeSet = BTreeSet<Include>;

/// A token accepted by one of the comma-separated projection parameters.
trait Token: Copy + Ord + Sized + 'static {
    const ALL: &'static [Self];

    fn as_str(self) -> &'static str;

    fn parse(raw: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == raw)
    }

    fn allowed() -> String {
        Self::ALL
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Scalar recipe columns a client may `select`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BaseField {
    Id,
    Title,
    Description,
    CookingTime,
    Difficulty,
}

impl Token for BaseField {
    const ALL: &'static [Self] = &[
        BaseField::Id,
        BaseField::Title,
        BaseField::Description,
        BaseField::CookingTime,
        BaseField::Difficulty,
    ];

    fn as_str(self) -> &'static str {
        match self {
            BaseField::Id => "id",
            BaseField::Title => "title",
            BaseField::Description => "description",
            BaseField::CookingTime => "cooking_time",
            BaseField::Difficulty => "difficulty",
        }
    }
}

impl BaseField {
    pub fn name(self) -> &'static str {
        self.as_str()
    }

    pub fn all() -> FieldSet {
        Self::ALL.iter().copied().collect()
    }
}

/// Relations a client may `include`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Include {
    Cuisine,
    Ingredients,
    Allergens,
}

impl Token for Include {
    const ALL: &'static [Self] = &[Include::Cuisine, Include::Ingredients, Include::Allergens];

    fn as_str(self) -> &'static str {
        match self {
            Include::Cuisine => "cuisine",
            Include::Ingredients => "ingredients",
            Include::Allergens => "allergens",
        }
    }
}

impl Include {
    pub fn name(self) -> &'static str {
        self.as_str()
    }
}

/// Splits on commas, trims, drops empty tokens. Returns every unknown token
/// (first-seen order, no repeats) as the error.
fn parse_tokens<T: Token>(raw: Option<&str>) -> Result<Option<BTreeSet<T>>, Vec<String>> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(raw) => raw,
    };

    let mut parsed = BTreeSet::new();
    let mut invalid: Vec<String> = Vec::new();

    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match T::parse(part) {
            Some(token) => {
                parsed.insert(token);
            }
            None if !invalid.iter().any(|seen| seen == part) => invalid.push(part.to_string()),
            None => {}
        }
    }

    if !invalid.is_empty() {
        return Err(invalid);
    }
    // "," or " , " carries no tokens and counts as absent.
    Ok(if parsed.is_empty() { None } else { Some(parsed) })
}

/// Parses `select`. Absent or blank means every base field.
pub fn parse_select(raw: Option<&str>) -> AppResult<FieldSet> {
    match parse_tokens::<BaseField>(raw) {
        Ok(fields) => Ok(fields.unwrap_or_else(BaseField::all)),
        Err(invalid) => Err(AppError::InvalidField {
            invalid: invalid.join(", "),
            allowed: BaseField::allowed(),
        }),
    }
}

/// Parses `include`. Absent or blank means no relations.
pub fn parse_include(raw: Option<&str>) -> AppResult<IncludeSet> {
    match parse_tokens::<Include>(raw) {
        Ok(includes) => Ok(includes.unwrap_or_default()),
        Err(invalid) => Err(AppError::InvalidInclude {
            invalid: invalid.join(", "),
            allowed: Include::allowed(),
        }),
    }
}

/// Intermediate form of a recipe: all base fields plus the requested relations only.
pub fn recipe_document(aggregate: &RecipeAggregate, include: &IncludeSet) -> Document {
    let recipe = &aggregate.recipe;
    let mut doc = Document::new();
    doc.insert("id".into(), json!(recipe.id));
    doc.insert("title".into(), json!(recipe.title));
    doc.insert("description".into(), json!(recipe.description));
    doc.insert("cooking_time".into(), json!(recipe.cooking_time));
    doc.insert("difficulty".into(), json!(recipe.difficulty));

    if include.contains(&Include::Cuisine) {
        if let Some(cuisine) = &aggregate.cuisine {
            doc.insert("cuisine".into(), json!({ "id": cuisine.id, "name": cuisine.name }));
        }
    }

    if include.contains(&Include::Allergens) {
        let allergens: Vec<Value> = aggregate
            .allergens
            .iter()
            .map(|a| json!({ "id": a.id, "name": a.name }))
            .collect();
        doc.insert("allergens".into(), Value::Array(allergens));
    }

    if include.contains(&Include::Ingredients) {
        let lines: Vec<Value> = aggregate
            .ingredients
            .iter()
            .map(|l| {
                json!({
                    "id": l.ingredient.id,
                    "name": l.ingredient.name,
                    "quantity": l.line.quantity,
                    "measurement": l.line.measurement,
                })
            })
            .collect();
        doc.insert("ingredients".into(), Value::Array(lines));
    }

    doc
}

/// Whitelist projection of `doc`. Keys that were not asked for are absent, never null.
pub fn build_recipe_response(doc: &Document, select: &FieldSet, include: &IncludeSet) -> Document {
    let mut out = Document::new();

    for field in select {
        if let Some(value) = doc.get(field.name()) {
            out.insert(field.name().to_string(), value.clone());
        }
    }

    if include.contains(&Include::Cuisine) {
        if let Some(cuisine) = doc.get("cuisine").filter(|c| !c.is_null()) {
            out.insert("cuisine".into(), cuisine.clone());
        }
    }

    for list in [Include::Allergens, Include::Ingredients] {
        if include.contains(&list) {
            let value = doc
                .get(list.name())
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new()));
            out.insert(list.name().to_string(), value);
        }
    }

    out
}

pub fn build_recipes_response_list(
    docs: &[Document],
    select: &FieldSet,
    include: &IncludeSet,
) -> Vec<Document> {
    docs.iter()
        .map(|doc| build_recipe_response(doc, select, include))
        .collect()
}

pub fn project_recipe(
    aggregate: &RecipeAggregate,
    select: &FieldSet,
    include: &IncludeSet,
) -> Document {
    build_recipe_response(&recipe_document(aggregate, include), select, include)
}

pub fn project_recipes(
    aggregates: &[RecipeAggregate],
    select: &FieldSet,
    include: &IncludeSet,
) -> Vec<Document> {
    aggregates
        .iter()
        .map(|aggregate| project_recipe(aggregate, select, include))
        .collect()
}
