/// External provider integrations, grouped by gateway family. Each family
/// exposes a contract trait, concrete adapters and an enum-keyed factory.
pub mod delivery;
pub mod payments;
