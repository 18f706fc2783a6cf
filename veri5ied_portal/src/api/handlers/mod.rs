pub mod health;
pub mod images;
pub mod products;
pub mod verify;
