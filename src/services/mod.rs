pub mod account_service;
pub mod admin_service;
pub mod cart_service;
pub mod catalog_service;
pub mod landing_service;
pub mod order_service;
pub mod product_service;
pub mod public_order_service;
pub mod reconcile_service;
