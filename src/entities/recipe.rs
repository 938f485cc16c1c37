use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "recipes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub cooking_time: i32,
    /// 1 (trivial) to 5 (hard), enforced by a check constraint.
    pub difficulty: i32,
    pub author_id: i32,
    pub cuisine_id: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AuthorId",
        to = "super::user::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Author,
    #[sea_orm(
        belongs_to = "super::cuisine::Entity",
        from = "Column::CuisineId",
        to = "super::cuisine::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    Cuisine,
    #[sea_orm(has_many = "super::recipe_ingredient::Entity")]
    RecipeIngredient,
    #[sea_orm(has_many = "super::recipe_allergen::Entity")]
    RecipeAllergen,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Related<super::cuisine::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cuisine.def()
    }
}

impl Related<super::recipe_ingredient::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RecipeIngredient.def()
    }
}

impl Related<super::recipe_allergen::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RecipeAllergen.def()
    }
}

impl Related<super::allergen::Entity> for Entity {
    fn to() -> RelationDef {
        super::recipe_allergen::Relation::Allergen.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::recipe_allergen::Relation::Recipe.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
