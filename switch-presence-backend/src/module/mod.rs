pub mod catalog;
pub mod dispatch;
pub mod gametdb;
pub mod handler;
pub mod presence;
pub mod resolver;
