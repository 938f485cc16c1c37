pub use super::allergen::Entity as Allergen;
pub use super::cuisine::Entity as Cuisine;
pub use super::image::Entity as Image;
pub use super::ingredient::Entity as Ingredient;
pub use super::recipe::Entity as Recipe;
pub use super::recipe_allergen::Entity as RecipeAllergen;
pub use super::recipe_ingredient::Entity as RecipeIngredient;
pub use super::user::Entity as User;
pub use super::video_project::Entity as VideoProject;
