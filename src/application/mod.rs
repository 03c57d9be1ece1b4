// Application layer - Migration use cases and the gateway port they depend on
pub mod card_classifier;
pub mod collection_resolver;
pub mod error;
pub mod metabase_gateway;
pub mod migration_service;
pub mod payload_assembler;
pub mod tab_resolver;

#[cfg(test)]
pub mod test_support;
