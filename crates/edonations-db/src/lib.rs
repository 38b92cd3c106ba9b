pub mod migrations;
pub mod organization;
pub mod schema;
pub mod sponsor_store;

pub use migrations::{Migration, MigrationPlan, MigrationRunner};
pub use organization::{ORGANIZATION_MAX_LEN, Organization, OrganizationSet};
pub use sponsor_store::{NewSponsor, Sponsor, SponsorStore};
