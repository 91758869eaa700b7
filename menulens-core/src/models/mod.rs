pub mod item;
pub mod table;
