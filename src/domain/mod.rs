// Domain layer - Entities shared by source and target instances
pub mod card;
pub mod collection;
pub mod dashboard;
pub mod identifier_map;
