pub mod inventory;
pub mod merchant;
pub mod order;
pub mod product;
pub mod subscription;
pub mod transition;
pub mod vault;
pub mod webhook;
