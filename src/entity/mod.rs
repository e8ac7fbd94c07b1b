pub mod cart_items;
pub mod carts;
pub mod catalog_nodes;
pub mod landing_content;
pub mod order_items;
pub mod orders;
pub mod products;

pub use cart_items::Entity as CartItems;
pub use carts::Entity as Carts;
pub use catalog_nodes::Entity as CatalogNodes;
pub use landing_content::Entity as LandingContent;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
