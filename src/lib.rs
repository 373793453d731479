//! fixdb - fixture-backed in-memory database
//!
//! A file-backed, in-memory substitute for a relational data layer: load
//! structured fixture records, settle a typed schema per collection,
//! resolve cross-collection references at build time, and query the result
//! through a chainable, immutable queryset API with a `field__operator`
//! lookup DSL.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                     Collection build (once)                    │
//! ├────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐   ┌──────────────┐   ┌───────────────────┐   │
//! │  │   Fixture    │   │    Schema    │   │  Identity         │   │
//! │  │   Loader     │──▶│  (coerce /   │──▶│  (sequence,       │   │
//! │  │  (yaml, csv) │   │   infer)     │   │   content uuid)   │   │
//! │  └──────────────┘   └──────────────┘   └─────────┬─────────┘   │
//! │                                                  │             │
//! │                 ┌──────────────┐                 ▼             │
//! │                 │   Registry   │◀──── FK resolution            │
//! │                 │ (name→coll.) │      (build-time, once)       │
//! │                 └──────────────┘                               │
//! └───────────────────────────────┬────────────────────────────────┘
//! │                               ▼                                │
//! │  ┌──────────────────────────────────────────────────────────┐  │
//! │  │                  QuerySet engine (reads)                 │  │
//! │  │   all / filter / get / order_by / groupby / sum / fake   │  │
//! │  │      lookup operators: gt, lte, icontains, year, …       │  │
//! │  └──────────────────────────────────────────────────────────┘  │
//! │                               │                                │
//! │                               ▼                                │
//! │  ┌──────────────────────────────────────────────────────────┐  │
//! │  │   Composite view (read-only union over collections)      │  │
//! │  └──────────────────────────────────────────────────────────┘  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Collections are built once, synchronously, through
//! [`Collection::builder`]; after the build the schema, foreign keys and
//! base record set never change, so any number of threads may run queries
//! concurrently. The only mutators, [`Collection::create`] and
//! [`Collection::precreate_fake`], require single-writer discipline.
//!
//! ```no_run
//! use fixdb::{Collection, Fk, Registry};
//!
//! # fn main() -> fixdb::Result<()> {
//! let mut registry = Registry::new();
//!
//! let country = Collection::builder("Country")
//!     .fixture("fixtures/countries.yaml")
//!     .build(&registry)?;
//! let country = registry.register(country);
//!
//! let city = Collection::builder("City")
//!     .fk("country", Fk::with_fields("Country", "country_iso", "iso"))
//!     .fixture("fixtures/cities.yaml")
//!     .build(&registry)?;
//!
//! let krakow = city.objects().get([("name", "Krakow")])?;
//! let poland = krakow.related("country").unwrap();
//! assert_eq!(poland.attr("name"), "Poland".into());
//!
//! let european = country.objects().filter([("continent", "Europe")])?;
//! for record in european.order_by(["-country_code"]).iter() {
//!     println!("{}", record.attr("name"));
//! }
//! # Ok(())
//! # }
//! ```

pub mod collection;
pub mod composite;
pub mod error;
pub mod fixture;
pub mod identity;
pub mod json;
pub mod lookup;
pub mod naming;
pub mod query;
pub mod record;
pub mod registry;
pub mod schema;

pub use collection::{Collection, CollectionBuilder};
pub use composite::CompositeView;
pub use error::{Error, Result};
pub use fixture::FixtureFormat;
pub use json::RichJson;
pub use query::QuerySet;
pub use record::{Record, SourceRef, Value};
pub use registry::Registry;
pub use schema::{FieldDef, FieldType, Fk, Schema};
