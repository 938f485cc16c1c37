pub mod allergen;
pub mod cuisine;
pub mod image;
pub mod ingredient;
pub mod recipe;
pub mod recipe_allergen;
pub mod recipe_ingredient;
pub mod user;
pub mod video_project;

pub use allergen::Entity as Allergen;
pub use cuisine::Entity as Cuisine;
pub use image::Entity as Image;
pub use ingredient::Entity as Ingredient;
pub use recipe::Entity as Recipe;
pub use recipe_allergen::Entity as RecipeAllergen;
pub use recipe_ingredient::{Entity as RecipeIngredient, Measurement};
pub use user::Entity as User;
pub use video_project::{Entity as VideoProject, VideoStatus};

pub mod prelude;
