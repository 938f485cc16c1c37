use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Recipes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Recipes::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Recipes::Title).string_len(255).not_null())
                    .col(ColumnDef::new(Recipes::Description).text().not_null())
                    .col(ColumnDef::new(Recipes::CookingTime).integer().not_null())
                    .col(
                        ColumnDef::new(Recipes::Difficulty)
                            .integer()
                            .not_null()
                            .default(1)
                            .check(Expr::col(Recipes::Difficulty).between(1, 5)),
                    )
                    .col(ColumnDef::new(Recipes::AuthorId).integer().not_null())
                    .col(ColumnDef::new(Recipes::CuisineId).integer())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-recipe-author_id")
                            .from(Recipes::Table, Recipes::AuthorId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-recipe-cuisine_id")
                            .from(Recipes::Table, Recipes::CuisineId)
                            .to(Cuisines::Table, Cuisines::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RecipeAllergens::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RecipeAllergens::RecipeId).integer().not_null())
                    .col(ColumnDef::new(RecipeAllergens::AllergenId).integer().not_null())
                    .primary_key(
                        Index::create()
                            .col(RecipeAllergens::RecipeId)
                            .col(RecipeAllergens::AllergenId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-recipe_allergen-recipe_id")
                            .from(RecipeAllergens::Table, RecipeAllergens::RecipeId)
                            .to(Recipes::Table, Recipes::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-recipe_allergen-allergen_id")
                            .from(RecipeAllergens::Table, RecipeAllergens::AllergenId)
                            .to(Allergens::Table, Allergens::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RecipeIngredients::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RecipeIngredients::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RecipeIngredients::RecipeId).integer().not_null())
                    .col(
                        ColumnDef::new(RecipeIngredients::IngredientId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RecipeIngredients::Quantity)
                            .double()
                            .not_null()
                            .check(Expr::col(RecipeIngredients::Quantity).gte(0)),
                    )
                    .col(
                        ColumnDef::new(RecipeIngredients::Measurement)
                            .integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-recipe_ingredient-recipe_id")
                            .from(RecipeIngredients::Table, RecipeIngredients::RecipeId)
                            .to(Recipes::Table, Recipes::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-recipe_ingredient-ingredient_id")
                            .from(RecipeIngredients::Table, RecipeIngredients::IngredientId)
                            .to(Ingredients::Table, Ingredients::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_recipe_ingredients_ingredient_id")
                    .table(RecipeIngredients::Table)
                    .col(RecipeIngredients::IngredientId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RecipeIngredients::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RecipeAllergens::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Recipes::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Recipes {
    Table,
    Id,
    Title,
    Description,
    CookingTime,
    Difficulty,
    AuthorId,
    CuisineId,
}

#[derive(DeriveIden)]
enum RecipeAllergens {
    Table,
    RecipeId,
    AllergenId,
}

#[derive(DeriveIden)]
enum RecipeIngredients {
    Table,
    Id,
    RecipeId,
    IngredientId,
    Quantity,
    Measurement,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Cuisines {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Allergens {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Ingredients {
    Table,
    Id,
}
