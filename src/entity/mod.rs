pub mod audit_logs;
pub mod notifications;
pub mod order_items;
pub mod orders;
pub mod product_ratings;
pub mod products;
pub mod user_addresses;
pub mod users;
pub mod wishlist_items;

pub use audit_logs::Entity as AuditLogs;
pub use notifications::Entity as Notifications;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use product_ratings::Entity as ProductRatings;
pub use products::Entity as Products;
pub use user_addresses::Entity as UserAddresses;
pub use users::Entity as Users;
pub use wishlist_items::Entity as WishlistItems;
