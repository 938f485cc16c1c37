mod common;

use recipe_catalog::catalog::{
    self, IngredientInput, RecipeFilter, RecipeInput, RecipeRead, Relations,
};
use recipe_catalog::error::AppError;
use recipe_catalog::projection::{self, Include};
use sea_orm::DatabaseConnection;
use serde_json::json;

use common::{create_allergen, create_cuisine, create_ingredient, create_user, setup_db};

fn input(title: &str) -> RecipeInput {
    RecipeInput {
        title: title.to_string(),
        description: format!("{title}, the classic way"),
        cooking_time: 30,
        difficulty: 2,
        cuisine_id: None,
        allergen_ids: Vec::new(),
        ingredients: Vec::new(),
    }
}

fn line(ingredient_id: i32, quantity: f64, measurement: i32) -> IngredientInput {
    IngredientInput {
        ingredient_id,
        quantity,
        measurement,
    }
}

struct Fixture {
    author: i32,
    stranger: i32,
    italian: i32,
    gluten: i32,
    dairy: i32,
    pasta: i32,
    egg: i32,
    rice: i32,
}

async fn fixture(db: &DatabaseConnection) -> Fixture {
    Fixture {
        author: create_user(db, "author@example.com").await.id,
        stranger: create_user(db, "stranger@example.com").await.id,
        italian: create_cuisine(db, "Italian").await.id,
        gluten: create_allergen(db, "Gluten").await.id,
        dairy: create_allergen(db, "Dairy").await.id,
        pasta: create_ingredient(db, "Pasta").await.id,
        egg: create_ingredient(db, "Egg").await.id,
        rice: create_ingredient(db, "Rice").await.id,
    }
}

#[tokio::test]
async fn test_create_and_read_full_recipe() {
    let test = setup_db().await;
    let f = fixture(&test.db).await;

    let mut carbonara = input("Carbonara");
    carbonara.cuisine_id = Some(f.italian);
    carbonara.allergen_ids = vec![f.dairy, f.gluten, f.dairy];
    carbonara.ingredients = vec![line(f.pasta, 500.0, 1), line(f.egg, 3.0, 2)];

    let id = catalog::create_recipe(&test.db, f.author, &carbonara)
        .await
        .unwrap();
    let read = RecipeRead::from(
        catalog::find_aggregate(&test.db, id, Relations::all())
            .await
            .unwrap(),
    );

    assert_eq!(read.title, "Carbonara");
    assert_eq!(read.author.as_ref().map(|a| a.id), Some(f.author));
    assert_eq!(read.cuisine.as_ref().map(|c| c.name.as_str()), Some("Italian"));
    let allergen_ids: Vec<i32> = read.allergens.iter().map(|a| a.id).collect();
    assert_eq!(allergen_ids, vec![f.gluten, f.dairy]);
    assert_eq!(read.ingredients.len(), 2);
    assert_eq!(read.ingredients[0].name, "Pasta");
    assert_eq!(read.ingredients[0].measurement_label, "г");
    assert_eq!(read.ingredients[1].measurement_label, "шт");
}

#[tokio::test]
async fn test_recipes_with_ingredient_are_not_duplicated() {
    let test = setup_db().await;
    let f = fixture(&test.db).await;

    let mut twice = input("Egg pasta");
    twice.ingredients = vec![line(f.egg, 2.0, 2), line(f.pasta, 200.0, 1), line(f.egg, 1.0, 2)];
    let first = catalog::create_recipe(&test.db, f.author, &twice).await.unwrap();

    let mut once = input("Fried rice");
    once.ingredients = vec![line(f.rice, 300.0, 1), line(f.egg, 1.0, 2)];
    let second = catalog::create_recipe(&test.db, f.author, &once).await.unwrap();

    let mut without = input("Plain rice");
    without.ingredients = vec![line(f.rice, 100.0, 1)];
    catalog::create_recipe(&test.db, f.author, &without).await.unwrap();

    let ids: Vec<i32> = catalog::recipes_with_ingredient(&test.db, f.egg)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![first, second]);
}

#[tokio::test]
async fn test_projection_over_loaded_recipes() {
    let test = setup_db().await;
    let f = fixture(&test.db).await;

    let mut carbonara = input("Carbonara");
    carbonara.cuisine_id = Some(f.italian);
    carbonara.ingredients = vec![line(f.pasta, 500.0, 1)];
    let with_cuisine = catalog::create_recipe(&test.db, f.author, &carbonara)
        .await
        .unwrap();

    let mut plain = input("Buttered pasta");
    plain.ingredients = vec![line(f.pasta, 250.0, 1)];
    let without_cuisine = catalog::create_recipe(&test.db, f.author, &plain)
        .await
        .unwrap();

    let select = projection::parse_select(Some("title,id,title")).unwrap();
    let include = projection::parse_include(Some("cuisine, ingredients")).unwrap();
    assert!(include.contains(&Include::Cuisine));

    let recipes = catalog::recipes_with_ingredient(&test.db, f.pasta).await.unwrap();
    let aggregates =
        catalog::load_aggregates(&test.db, recipes, Relations::for_include(&include))
            .await
            .unwrap();
    let docs = projection::project_recipes(&aggregates, &select, &include);

    assert_eq!(
        serde_json::Value::Object(docs[0].clone()),
        json!({
            "id": with_cuisine,
            "title": "Carbonara",
            "cuisine": {"id": f.italian, "name": "Italian"},
            "ingredients": [{"id": f.pasta, "name": "Pasta", "quantity": 500.0, "measurement": 1}],
        })
    );
    assert_eq!(
        serde_json::Value::Object(docs[1].clone()),
        json!({
            "id": without_cuisine,
            "title": "Buttered pasta",
            "ingredients": [{"id": f.pasta, "name": "Pasta", "quantity": 250.0, "measurement": 1}],
        })
    );
}

#[tokio::test]
async fn test_relations_not_requested_are_not_loaded() {
    let test = setup_db().await;
    let f = fixture(&test.db).await;

    let mut recipe = input("Risotto");
    recipe.cuisine_id = Some(f.italian);
    recipe.allergen_ids = vec![f.dairy];
    recipe.ingredients = vec![line(f.rice, 200.0, 1)];
    let id = catalog::create_recipe(&test.db, f.author, &recipe).await.unwrap();

    let include = projection::parse_include(None).unwrap();
    let aggregate = catalog::find_aggregate(&test.db, id, Relations::for_include(&include))
        .await
        .unwrap();
    assert!(aggregate.author.is_none());
    assert!(aggregate.cuisine.is_none());
    assert!(aggregate.allergens.is_empty());
    assert!(aggregate.ingredients.is_empty());
}

#[tokio::test]
async fn test_only_author_may_update_or_delete() {
    let test = setup_db().await;
    let f = fixture(&test.db).await;

    let mut recipe = input("Omelette");
    recipe.allergen_ids = vec![f.dairy];
    recipe.ingredients = vec![line(f.egg, 3.0, 2)];
    let id = catalog::create_recipe(&test.db, f.author, &recipe).await.unwrap();

    let mut changed = input("Big omelette");
    changed.allergen_ids = vec![f.gluten];
    changed.ingredients = vec![line(f.egg, 5.0, 2), line(f.pasta, 50.0, 1)];

    let err = catalog::update_recipe(&test.db, f.stranger, id, &changed)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(ref m) if m == "Not authorized to update this recipe"));

    let err = catalog::delete_recipe(&test.db, f.stranger, id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    catalog::update_recipe(&test.db, f.author, id, &changed).await.unwrap();
    let read = RecipeRead::from(
        catalog::find_aggregate(&test.db, id, Relations::all())
            .await
            .unwrap(),
    );
    assert_eq!(read.title, "Big omelette");
    assert_eq!(read.allergens.len(), 1);
    assert_eq!(read.allergens[0].id, f.gluten);
    let quantities: Vec<f64> = read.ingredients.iter().map(|i| i.quantity).collect();
    assert_eq!(quantities, vec![5.0, 50.0]);

    catalog::delete_recipe(&test.db, f.author, id).await.unwrap();
    let err = catalog::find_aggregate(&test.db, id, Relations::all())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_unknown_references_are_not_found() {
    let test = setup_db().await;
    let f = fixture(&test.db).await;

    let mut bad_cuisine = input("Mystery");
    bad_cuisine.cuisine_id = Some(404);
    let err = catalog::create_recipe(&test.db, f.author, &bad_cuisine)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Cuisine with id 404 not found");

    let mut bad_ingredient = input("Mystery");
    bad_ingredient.ingredients = vec![line(f.egg, 1.0, 2), line(777, 1.0, 1)];
    let err = catalog::create_recipe(&test.db, f.author, &bad_ingredient)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Ingredient with id 777 not found");

    let mut bad_allergen = input("Mystery");
    bad_allergen.allergen_ids = vec![f.gluten, 55];
    let err = catalog::create_recipe(&test.db, f.author, &bad_allergen)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Allergen with id 55 not found");

    // Nothing was written by the failed attempts.
    let page = catalog::list_recipes(&test.db, &RecipeFilter::default().parse().unwrap(), 1, 10)
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_list_filters_and_paginates() {
    let test = setup_db().await;
    let f = fixture(&test.db).await;

    let mut ids = Vec::new();
    for (title, ingredient) in [
        ("Pasta al limone", f.pasta),
        ("Rice pudding", f.rice),
        ("Pasta e fagioli", f.pasta),
        ("Egg fried rice", f.rice),
    ] {
        let mut recipe = input(title);
        recipe.ingredients = vec![line(ingredient, 100.0, 1)];
        ids.push(catalog::create_recipe(&test.db, f.author, &recipe).await.unwrap());
    }

    let filter = RecipeFilter {
        name_like: Some("PASTA".into()),
        ingredient_id: None,
        order_by: None,
    }
    .parse()
    .unwrap();
    let page = catalog::list_recipes(&test.db, &filter, 1, 10).await.unwrap();
    let titles: Vec<&str> = page.items.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["Pasta e fagioli", "Pasta al limone"]);

    let filter = RecipeFilter {
        name_like: None,
        ingredient_id: Some(format!("{},{}", f.rice, f.rice)),
        order_by: Some("id".into()),
    }
    .parse()
    .unwrap();
    let page = catalog::list_recipes(&test.db, &filter, 1, 10).await.unwrap();
    let found: Vec<i32> = page.items.iter().map(|r| r.id).collect();
    assert_eq!(found, vec![ids[1], ids[3]]);

    let everything = RecipeFilter::default().parse().unwrap();
    let page = catalog::list_recipes(&test.db, &everything, 2, 3).await.unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, ids[0]);
}

#[tokio::test]
async fn test_invalid_input_is_rejected_before_writing() {
    let test = setup_db().await;
    let f = fixture(&test.db).await;

    let mut hard = input("Soufflé");
    hard.difficulty = 6;
    let err = catalog::create_recipe(&test.db, f.author, &hard).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let mut negative = input("Anti-soup");
    negative.ingredients = vec![line(f.egg, -1.0, 2)];
    let err = catalog::create_recipe(&test.db, f.author, &negative)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_page_beyond_addressable_range_is_rejected() {
    let test = setup_db().await;
    let everything = RecipeFilter::default().parse().unwrap();

    let err = catalog::list_recipes(&test.db, &everything, u64::MAX / 2, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = catalog::list_recipes(&test.db, &everything, u64::MAX, 100)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // Far past the last page but still addressable: just empty.
    let page = catalog::list_recipes(&test.db, &everything, 1_000_000, 10)
        .await
        .unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_ingredient_lines_stay_with_their_recipe() {
    let test = setup_db().await;
    let f = fixture(&test.db).await;

    let mut first = input("Egg fried rice");
    first.ingredients = vec![line(f.rice, 300.0, 1), line(f.egg, 2.0, 2)];
    let first = catalog::create_recipe(&test.db, f.author, &first).await.unwrap();

    let bare = catalog::create_recipe(&test.db, f.author, &input("Water")).await.unwrap();

    let mut third = input("Pasta frittata");
    third.ingredients = vec![line(f.egg, 4.0, 2), line(f.pasta, 100.0, 1), line(f.rice, 5.0, 1)];
    let third = catalog::create_recipe(&test.db, f.author, &third).await.unwrap();

    let filter = RecipeFilter {
        name_like: None,
        ingredient_id: None,
        order_by: Some("id".into()),
    }
    .parse()
    .unwrap();
    let page = catalog::list_recipes(&test.db, &filter, 1, 10).await.unwrap();

    let lines: Vec<(i32, Vec<&str>)> = page
        .items
        .iter()
        .map(|r| (r.id, r.ingredients.iter().map(|i| i.name.as_str()).collect()))
        .collect();
    assert_eq!(
        lines,
        vec![
            (first, vec!["Rice", "Egg"]),
            (bare, vec![]),
            (third, vec!["Egg", "Pasta", "Rice"]),
        ]
    );
}
