// Dashboard migrator - Copies Metabase dashboards and their dependencies between instances
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
