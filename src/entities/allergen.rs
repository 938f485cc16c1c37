use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "allergens")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::recipe_allergen::Entity")]
    RecipeAllergen,
}

impl Related<super::recipe_allergen::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RecipeAllergen.def()
    }
}

impl Related<super::recipe::Entity> for Entity {
    fn to() -> RelationDef {
        super::recipe_allergen::Relation::Recipe.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::recipe_allergen::Relation::Allergen.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
