pub mod builtins;
pub mod dispatch;
pub mod fixture;
pub mod input;
pub mod page;
pub mod panel;
pub mod reflect;
pub mod registry;
pub mod value;
