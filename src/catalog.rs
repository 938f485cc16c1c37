use std::collections::BTreeSet;

use sea_orm::sea_query::{Expr, Func, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, LoaderTrait,
    ModelTrait, Order, PaginatorTrait, QueryFilter, QueryOrder, Select, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::entities::{
    allergen, cuisine, ingredient, recipe, recipe_allergen, recipe_ingredient, user, Allergen,
    Cuisine, Ingredient, Measurement, Recipe, RecipeAllergen, RecipeIngredient, User,
};
use crate::error::{AppError, AppResult};
use crate::projection::{Include, IncludeSet};

/// A recipe together with whichever related rows were loaded for it.
#[derive(Clone, Debug, PartialEq)]
pub struct RecipeAggregate {
    pub recipe: recipe::Model,
    pub author: Option<user::Model>,
    pub cuisine: Option<cuisine::Model>,
    pub allergens: Vec<allergen::Model>,
    pub ingredients: Vec<IngredientLine>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IngredientLine {
    pub line: recipe_ingredient::Model,
    pub ingredient: ingredient::Model,
}

/// Which relations to fetch alongside recipes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Relations {
    pub author: bool,
    pub cuisine: bool,
    pub allergens: bool,
    pub ingredients: bool,
}

impl Relations {
    pub fn all() -> Self {
        Self {
            author: true,
            cuisine: true,
            allergens: true,
            ingredients: true,
        }
    }

    pub fn for_include(include: &IncludeSet) -> Self {
        Self {
            author: false,
            cuisine: include.contains(&Include::Cuisine),
            allergens: include.contains(&Include::Allergens),
            ingredients: include.contains(&Include::Ingredients),
        }
    }
}

pub async fn load_aggregates<C: ConnectionTrait>(
    db: &C,
    recipes: Vec<recipe::Model>,
    relations: Relations,
) -> AppResult<Vec<RecipeAggregate>> {
    if recipes.is_empty() {
        return Ok(Vec::new());
    }
    let count = recipes.len();

    let mut authors = if relations.author {
        recipes.load_one(User, db).await?
    } else {
        vec![None; count]
    };
    let mut cuisines = if relations.cuisine {
        recipes.load_one(Cuisine, db).await?
    } else {
        vec![None; count]
    };
    let mut allergens = if relations.allergens {
        recipes.load_many_to_many(Allergen, RecipeAllergen, db).await?
    } else {
        vec![Vec::new(); count]
    };
    let mut lines = if relations.ingredients {
        load_ingredient_lines(db, &recipes).await?
    } else {
        vec![Vec::new(); count]
    };

    let mut aggregates = Vec::with_capacity(count);
    for (i, recipe) in recipes.into_iter().enumerate() {
        let mut recipe_allergens = std::mem::take(&mut allergens[i]);
        recipe_allergens.sort_by_key(|a| a.id);
        aggregates.push(RecipeAggregate {
            recipe,
            author: authors[i].take(),
            cuisine: cuisines[i].take(),
            allergens: recipe_allergens,
            ingredients: std::mem::take(&mut lines[i]),
        });
    }
    Ok(aggregates)
}

async fn load_ingredient_lines<C: ConnectionTrait>(
    db: &C,
    recipes: &[recipe::Model],
) -> AppResult<Vec<Vec<IngredientLine>>> {
    let per_recipe = recipes.load_many(RecipeIngredient, db).await?;

    // One ingredient query for every line of every recipe.
    let flat: Vec<recipe_ingredient::Model> = per_recipe.iter().flatten().cloned().collect();
    let mut ingredients = flat.load_one(Ingredient, db).await?.into_iter();

    let mut result = Vec::with_capacity(per_recipe.len());
    for lines in per_recipe {
        let mut group: Vec<IngredientLine> = lines
            .into_iter()
            .zip(ingredients.by_ref())
            .filter_map(|(line, ingredient)| {
                ingredient.map(|ingredient| IngredientLine { line, ingredient })
            })
            .collect();
        // Stored order is insertion order.
        group.sort_by_key(|l| l.line.id);
        result.push(group);
    }
    Ok(result)
}

pub async fn find_aggregate<C: ConnectionTrait>(
    db: &C,
    recipe_id: i32,
    relations: Relations,
) -> AppResult<RecipeAggregate> {
    let recipe = Recipe::find_by_id(recipe_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Recipe", recipe_id))?;
    load_aggregates(db, vec![recipe], relations)
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("Recipe", recipe_id))
}

fn recipes_containing(ingredient_ids: Vec<i32>) -> sea_orm::sea_query::SimpleExpr {
    // IN (subquery) keeps one row per recipe however many lines match.
    recipe::Column::Id.in_subquery(
        Query::select()
            .column(recipe_ingredient::Column::RecipeId)
            .from(RecipeIngredient)
            .and_where(recipe_ingredient::Column::IngredientId.is_in(ingredient_ids))
            .to_owned(),
    )
}

/// Recipes that use `ingredient_id`, each exactly once, by ascending id.
pub async fn recipes_with_ingredient<C: ConnectionTrait>(
    db: &C,
    ingredient_id: i32,
) -> AppResult<Vec<recipe::Model>> {
    Ok(Recipe::find()
        .filter(recipes_containing(vec![ingredient_id]))
        .order_by_asc(recipe::Column::Id)
        .all(db)
        .await?)
}

// ============================================================================
// Filtering & pagination
// ============================================================================

/// Raw recipe list filters as they arrive in the query string.
#[derive(Debug, Default, Deserialize)]
pub struct RecipeFilter {
    #[serde(rename = "name__like")]
    pub name_like: Option<String>,
    /// Comma-separated ingredient ids; a recipe matches if it uses any of them.
    pub ingredient_id: Option<String>,
    /// Comma-separated `id` / `difficulty`, `-` prefix for descending.
    pub order_by: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortField {
    Id,
    Difficulty,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, PartialEq)]
pub struct ParsedFilter {
    pub name_like: Option<String>,
    pub ingredient_ids: Vec<i32>,
    pub order: Vec<(SortField, SortDirection)>,
}

impl RecipeFilter {
    pub fn parse(&self) -> AppResult<ParsedFilter> {
        let name_like = self
            .name_like
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let ingredient_ids = match self.ingredient_id.as_deref() {
            None => Vec::new(),
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<i32>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| {
                    AppError::Validation(
                        "ingredient_id must be a comma-separated list of integers".into(),
                    )
                })?,
        };

        let raw_order = self.order_by.as_deref().unwrap_or("-id");
        let mut order = Vec::new();
        for token in raw_order.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (name, direction) = match token.strip_prefix('-') {
                Some(name) => (name, SortDirection::Desc),
                None => (token.strip_prefix('+').unwrap_or(token), SortDirection::Asc),
            };
            let field = match name {
                "id" => SortField::Id,
                "difficulty" => SortField::Difficulty,
                other => {
                    return Err(AppError::Validation(format!(
                        "Invalid order_by field: {other}. Allowed: id, difficulty"
                    )))
                }
            };
            order.push((field, direction));
        }
        if order.is_empty() {
            order.push((SortField::Id, SortDirection::Desc));
        }

        Ok(ParsedFilter {
            name_like,
            ingredient_ids,
            order,
        })
    }
}

impl ParsedFilter {
    pub fn apply(&self, mut query: Select<Recipe>) -> Select<Recipe> {
        if let Some(needle) = &self.name_like {
            query = query.filter(
                Expr::expr(Func::lower(Expr::col((Recipe, recipe::Column::Title))))
                    .like(format!("%{}%", needle.to_lowercase())),
            );
        }
        if !self.ingredient_ids.is_empty() {
            query = query.filter(recipes_containing(self.ingredient_ids.clone()));
        }
        for (field, direction) in &self.order {
            let column = match field {
                SortField::Id => recipe::Column::Id,
                SortField::Difficulty => recipe::Column::Difficulty,
            };
            let order = match direction {
                SortDirection::Asc => Order::Asc,
                SortDirection::Desc => Order::Desc,
            };
            query = query.order_by(column, order);
        }
        query
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

pub const MAX_PER_PAGE: u64 = 100;

pub async fn list_recipes(
    db: &DatabaseConnection,
    filter: &ParsedFilter,
    page: u64,
    per_page: u64,
) -> AppResult<Page<RecipeRead>> {
    let page = page.max(1);
    let per_page = per_page.clamp(1, MAX_PER_PAGE);
    // The offset ends up as a signed 64-bit SQL value.
    (page - 1)
        .checked_mul(per_page)
        .filter(|offset| *offset <= i64::MAX as u64)
        .ok_or_else(|| AppError::Validation(format!("page {page} is out of range")))?;

    let paginator = filter.apply(Recipe::find()).paginate(db, per_page);
    let totals = paginator.num_items_and_pages().await?;
    let recipes = paginator.fetch_page(page - 1).await?;
    let aggregates = load_aggregates(db, recipes, Relations::all()).await?;

    Ok(Page {
        items: aggregates.into_iter().map(RecipeRead::from).collect(),
        total: totals.number_of_items,
        page,
        per_page,
        total_pages: totals.number_of_pages,
    })
}

// ============================================================================
// Full read model
// ============================================================================

#[derive(Debug, Serialize, PartialEq)]
pub struct AuthorRead {
    pub id: i32,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct NamedRead {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct IngredientRead {
    pub ingredient_id: i32,
    pub name: String,
    pub quantity: f64,
    pub measurement: i32,
    pub measurement_label: &'static str,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RecipeRead {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub cooking_time: i32,
    pub difficulty: i32,
    pub author: Option<AuthorRead>,
    pub cuisine: Option<NamedRead>,
    pub allergens: Vec<NamedRead>,
    pub ingredients: Vec<IngredientRead>,
}

impl From<RecipeAggregate> for RecipeRead {
    fn from(aggregate: RecipeAggregate) -> Self {
        let recipe = aggregate.recipe;
        Self {
            id: recipe.id,
            title: recipe.title,
            description: recipe.description,
            cooking_time: recipe.cooking_time,
            difficulty: recipe.difficulty,
            author: aggregate.author.map(|u| AuthorRead {
                id: u.id,
                first_name: u.first_name,
                last_name: u.last_name,
            }),
            cuisine: aggregate.cuisine.map(|c| NamedRead {
                id: c.id,
                name: c.name,
            }),
            allergens: aggregate
                .allergens
                .into_iter()
                .map(|a| NamedRead {
                    id: a.id,
                    name: a.name,
                })
                .collect(),
            ingredients: aggregate
                .ingredients
                .into_iter()
                .map(|l| IngredientRead {
                    ingredient_id: l.ingredient.id,
                    name: l.ingredient.name,
                    quantity: l.line.quantity,
                    measurement: l.line.measurement,
                    measurement_label: Measurement::label_for(l.line.measurement),
                })
                .collect(),
        }
    }
}

// ============================================================================
// Writes
// ============================================================================

#[derive(Clone, Debug, Deserialize)]
pub struct IngredientInput {
    pub ingredient_id: i32,
    pub quantity: f64,
    pub measurement: i32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RecipeInput {
    pub title: String,
    pub description: String,
    pub cooking_time: i32,
    #[serde(default = "default_difficulty")]
    pub difficulty: i32,
    pub cuisine_id: Option<i32>,
    #[serde(default)]
    pub allergen_ids: Vec<i32>,
    #[serde(default)]
    pub ingredients: Vec<IngredientInput>,
}

fn default_difficulty() -> i32 {
    1
}

impl RecipeInput {
    pub fn validate(&self) -> AppResult<()> {
        if self.title.trim().is_empty() {
            return Err(AppError::Validation("title must not be empty".into()));
        }
        if self.cooking_time < 0 {
            return Err(AppError::Validation("cooking_time must not be negative".into()));
        }
        if !(1..=5).contains(&self.difficulty) {
            return Err(AppError::Validation("difficulty must be between 1 and 5".into()));
        }
        if let Some(bad) = self
            .ingredients
            .iter()
            .find(|i| !(i.quantity.is_finite() && i.quantity >= 0.0))
        {
            return Err(AppError::Validation(format!(
                "quantity for ingredient {} must be a non-negative number",
                bad.ingredient_id
            )));
        }
        Ok(())
    }
}

/// Fails with `NotFound` unless every referenced cuisine, allergen and ingredient exists.
async fn check_references<C: ConnectionTrait>(db: &C, input: &RecipeInput) -> AppResult<()> {
    if let Some(cuisine_id) = input.cuisine_id {
        if Cuisine::find_by_id(cuisine_id).one(db).await?.is_none() {
            return Err(AppError::not_found("Cuisine", cuisine_id));
        }
    }

    let wanted: BTreeSet<i32> = input.allergen_ids.iter().copied().collect();
    if !wanted.is_empty() {
        let found: BTreeSet<i32> = Allergen::find()
            .filter(allergen::Column::Id.is_in(wanted.iter().copied()))
            .all(db)
            .await?
            .into_iter()
            .map(|a| a.id)
            .collect();
        if let Some(missing) = wanted.difference(&found).next() {
            return Err(AppError::not_found("Allergen", *missing));
        }
    }

    let wanted: BTreeSet<i32> = input.ingredients.iter().map(|i| i.ingredient_id).collect();
    if !wanted.is_empty() {
        let found: BTreeSet<i32> = Ingredient::find()
            .filter(ingredient::Column::Id.is_in(wanted.iter().copied()))
            .all(db)
            .await?
            .into_iter()
            .map(|i| i.id)
            .collect();
        if let Some(missing) = wanted.difference(&found).next() {
            return Err(AppError::not_found("Ingredient", *missing));
        }
    }

    Ok(())
}

async fn write_relations<C: ConnectionTrait>(
    db: &C,
    recipe_id: i32,
    input: &RecipeInput,
) -> AppResult<()> {
    let allergen_ids: BTreeSet<i32> = input.allergen_ids.iter().copied().collect();
    if !allergen_ids.is_empty() {
        RecipeAllergen::insert_many(allergen_ids.into_iter().map(|allergen_id| {
            recipe_allergen::ActiveModel {
                recipe_id: Set(recipe_id),
                allergen_id: Set(allergen_id),
            }
        }))
        .exec_without_returning(db)
        .await?;
    }

    // One insert per line so ids follow the submitted order.
    for item in &input.ingredients {
        recipe_ingredient::ActiveModel {
            recipe_id: Set(recipe_id),
            ingredient_id: Set(item.ingredient_id),
            quantity: Set(item.quantity),
            measurement: Set(item.measurement),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

pub async fn create_recipe(
    db: &DatabaseConnection,
    author_id: i32,
    input: &RecipeInput,
) -> AppResult<i32> {
    input.validate()?;

    let txn = db.begin().await?;
    check_references(&txn, input).await?;

    let created = recipe::ActiveModel {
        title: Set(input.title.clone()),
        description: Set(input.description.clone()),
        cooking_time: Set(input.cooking_time),
        difficulty: Set(input.difficulty),
        author_id: Set(author_id),
        cuisine_id: Set(input.cuisine_id),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    write_relations(&txn, created.id, input).await?;
    txn.commit().await?;

    tracing::info!(recipe_id = created.id, author_id, "recipe created");
    Ok(created.id)
}

async fn owned_recipe<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    recipe_id: i32,
    verb: &str,
) -> AppResult<recipe::Model> {
    let recipe = Recipe::find_by_id(recipe_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Recipe", recipe_id))?;
    if recipe.author_id != user_id {
        return Err(AppError::Forbidden(format!(
            "Not authorized to {verb} this recipe"
        )));
    }
    Ok(recipe)
}

/// Replaces the recipe's fields, cuisine, allergen set and ingredient lines.
pub async fn update_recipe(
    db: &DatabaseConnection,
    user_id: i32,
    recipe_id: i32,
    input: &RecipeInput,
) -> AppResult<()> {
    input.validate()?;

    let txn = db.begin().await?;
    let recipe = owned_recipe(&txn, user_id, recipe_id, "update").await?;
    check_references(&txn, input).await?;

    let mut active: recipe::ActiveModel = recipe.into();
    active.title = Set(input.title.clone());
    active.description = Set(input.description.clone());
    active.cooking_time = Set(input.cooking_time);
    active.difficulty = Set(input.difficulty);
    active.cuisine_id = Set(input.cuisine_id);
    active.update(&txn).await?;

    RecipeAllergen::delete_many()
        .filter(recipe_allergen::Column::RecipeId.eq(recipe_id))
        .exec(&txn)
        .await?;
    RecipeIngredient::delete_many()
        .filter(recipe_ingredient::Column::RecipeId.eq(recipe_id))
        .exec(&txn)
        .await?;
    write_relations(&txn, recipe_id, input).await?;

    txn.commit().await?;
    tracing::info!(recipe_id, user_id, "recipe updated");
    Ok(())
}

pub async fn delete_recipe(db: &DatabaseConnection, user_id: i32, recipe_id: i32) -> AppResult<()> {
    let recipe = owned_recipe(db, user_id, recipe_id, "delete").await?;
    recipe.delete(db).await?;
    tracing::info!(recipe_id, user_id, "recipe deleted");
    Ok(())
}
