use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One ingredient line of a recipe. Lines keep insertion order through `id`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "recipe_ingredients")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub recipe_id: i32,
    pub ingredient_id: i32,
    pub quantity: f64,
    /// Raw measurement code, see [`Measurement`].
    pub measurement: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::recipe::Entity",
        from = "Column::RecipeId",
        to = "super::recipe::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Recipe,
    #[sea_orm(
        belongs_to = "super::ingredient::Entity",
        from = "Column::IngredientId",
        to = "super::ingredient::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Ingredient,
}

impl Related<super::recipe::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Recipe.def()
    }
}

impl Related<super::ingredient::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ingredient.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Measurement units an ingredient quantity is expressed in.
///
/// Stored as a plain integer so new codes can be added without a migration;
/// codes this build does not know render as `"?"`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Measurement {
    Grams = 1,
    Pieces = 2,
    Milliliters = 3,
}

impl Measurement {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Measurement::Grams),
            2 => Some(Measurement::Pieces),
            3 => Some(Measurement::Milliliters),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Measurement::Grams => "г",
            Measurement::Pieces => "шт",
            Measurement::Milliliters => "мл",
        }
    }

    pub fn label_for(code: i32) -> &'static str {
        Self::from_code(code).map(Self::label).unwrap_or("?")
    }
}
